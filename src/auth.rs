//! Login and logout.
//!
//! The login endpoint is the only writer of the session store and logout the
//! only clearer; every other component just reads the token.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::events::EventLog;
use crate::api::ApiClient;
use crate::identity::{self, UserId};
use crate::session::SessionStore;

/// Message shown when the server gives no `detail`.
pub const GENERIC_LOGIN_FAILURE: &str = "invalid credentials";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identificador: &'a str,
    contrasena: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

/// A freshly stored session.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub token: String,
    /// Best-effort id decoded from the token; may be absent.
    pub user_id: Option<UserId>,
}

/// Authenticate and persist the returned bearer token.
///
/// `identificador` is the user's full name as registered. On a non-2xx
/// response the error message is the server's `detail` or
/// [`GENERIC_LOGIN_FAILURE`]; the store is left untouched.
pub fn login(
    client: &ApiClient,
    session: &dyn SessionStore,
    log: &EventLog,
    identificador: &str,
    contrasena: &str,
) -> Result<UserSession> {
    let result = authenticate(client, identificador, contrasena).and_then(|token| {
        session.save(&token)?;
        Ok(token)
    });

    match result {
        Ok(token) => {
            let user_id = identity::extract_user_id(Some(&token));
            log.login(user_id);
            Ok(UserSession { token, user_id })
        }
        Err(e) => {
            log.login_failed(&e.to_string());
            Err(e)
        }
    }
}

fn authenticate(client: &ApiClient, identificador: &str, contrasena: &str) -> Result<String> {
    let request = LoginRequest {
        identificador,
        contrasena,
    };

    match client.post_json("/auth/login", &request) {
        Ok(resp) => {
            let body: LoginResponse = resp
                .into_json()
                .context("failed to parse login response")?;
            match body.access_token {
                Some(token) if !token.is_empty() => Ok(token),
                _ => anyhow::bail!("login response did not include an access token"),
            }
        }
        Err(ureq::Error::Status(_, resp)) => {
            let detail = resp
                .into_json::<ErrorBody>()
                .ok()
                .and_then(|body| body.detail)
                .and_then(detail_message);
            anyhow::bail!("{}", detail.unwrap_or_else(|| GENERIC_LOGIN_FAILURE.to_string()))
        }
        Err(e) => Err(e).context("could not reach the login endpoint"),
    }
}

/// `detail` is usually a string; validation errors send a list of objects
/// with a `msg` field.
fn detail_message(detail: Value) -> Option<String> {
    match detail {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Array(items) => {
            let msgs: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => None,
    }
}

/// Forget the stored token.
pub fn logout(session: &dyn SessionStore, log: &EventLog) -> Result<()> {
    session.clear().context("failed to clear the stored session")?;
    log.logout();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn detail_message_accepts_string_and_validation_list() {
        assert_eq!(
            detail_message(Value::String("Usuario no encontrado".into())),
            Some("Usuario no encontrado".to_string())
        );
        assert_eq!(
            detail_message(serde_json::json!([{"msg": "field required"}, {"msg": "too short"}])),
            Some("field required; too short".to_string())
        );
        assert_eq!(detail_message(Value::String("  ".into())), None);
        assert_eq!(detail_message(serde_json::json!(42)), None);
    }

    #[test]
    fn logout_twice_is_safe() {
        let store = MemorySessionStore::with_token("a.b.c");
        let log = EventLog::disabled();
        logout(&store, &log).unwrap();
        logout(&store, &log).unwrap();
        assert_eq!(store.read(), None);
    }

    #[test]
    fn unreachable_login_leaves_store_untouched() {
        let client = ApiClient::new("http://127.0.0.1:1", std::time::Duration::from_secs(2));
        let store = MemorySessionStore::with_token("old.token.here");
        let err = login(&client, &store, &EventLog::disabled(), "Ana", "pw").unwrap_err();
        assert!(err.to_string().contains("login endpoint"));
        assert_eq!(store.read().as_deref(), Some("old.token.here"));
    }
}
