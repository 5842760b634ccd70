//! JSON API handlers for the web dashboard.
//!
//! Each handler corresponds to a local endpoint and returns an [`ApiReply`];
//! the router turns it into an HTTP response.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::SubmitOutcome;
use crate::auth;
use crate::forms::{ForeignKeys, FormDraft, FormKind};
use crate::identity;

use super::WebState;

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    identificador: String,
    #[serde(default)]
    contrasena: String,
}

#[derive(Deserialize)]
struct FormRequest {
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
    /// Parcel a crop is attached to; config default otherwise.
    #[serde(default)]
    id_parcela: Option<u64>,
}

/// Render a field value sent by the page as draft text.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /api/login` — authenticate and store the token.
pub fn post_login(state: &mut WebState, body: Value) -> ApiReply {
    let Ok(req) = serde_json::from_value::<LoginRequest>(body) else {
        return ApiReply::error(400, "expected {identificador, contrasena}");
    };

    match auth::login(
        &state.api,
        state.session.as_ref(),
        &state.log,
        &req.identificador,
        &req.contrasena,
    ) {
        Ok(session) => ApiReply::ok(json!({ "user_id": session.user_id })),
        Err(e) => ApiReply {
            status: 401,
            body: json!({ "detail": e.to_string() }),
        },
    }
}

/// `POST /api/logout` — clear the stored token.
pub fn post_logout(state: &mut WebState) -> Result<ApiReply> {
    auth::logout(state.session.as_ref(), &state.log)?;
    Ok(ApiReply::ok(json!({ "logged_in": false })))
}

/// `GET /api/session` — whether a token is stored and who it names.
pub fn get_session(state: &WebState) -> ApiReply {
    let token = state.session.read();
    ApiReply::ok(json!({
        "logged_in": token.is_some(),
        "user_id": identity::extract_user_id(token.as_deref()),
    }))
}

/// `GET /api/dashboard[?refresh=1]` — chart data for the current session.
///
/// Refetches only when the session's user changed, unless `refresh` is set.
pub fn get_dashboard(state: &mut WebState, query: &str) -> ApiReply {
    let force = query
        .split('&')
        .any(|pair| matches!(pair, "refresh" | "refresh=1" | "refresh=true"));

    let view = if force {
        state.composer.refresh(state.session.as_ref(), &state.metrics)
    } else {
        state
            .composer
            .refresh_if_changed(state.session.as_ref(), &state.metrics)
    };

    match serde_json::to_value(view) {
        Ok(body) => ApiReply::ok(body),
        Err(e) => ApiReply::error(500, e.to_string()),
    }
}

/// `GET /api/parcels` — the current user's parcels, for the crop form.
pub fn get_parcels(state: &WebState) -> ApiReply {
    let keys = ForeignKeys::resolve(&state.config.forms, state.session.as_ref(), None);
    match state.api.list_parcels(keys.user_id) {
        Ok(parcels) => ApiReply::ok(json!({ "items": parcels, "default": keys.parcel_id })),
        Err(e) => ApiReply {
            status: 502,
            body: json!({ "items": [], "default": keys.parcel_id, "error": format!("{e:#}") }),
        },
    }
}

/// `GET /api/health` — reachability of the remote API.
pub fn get_health(state: &WebState) -> ApiReply {
    let (api_ok, detail) = match state.api.health() {
        Ok(status) => (true, status.status),
        Err(e) => (false, format!("{e:#}")),
    };
    ApiReply::ok(json!({
        "api_url": state.api.base_url(),
        "api_ok": api_ok,
        "detail": detail,
        "logged_in": state.session.read().is_some(),
    }))
}

/// `GET /api/forms/{kind}` — the current draft.
pub fn get_form(state: &WebState, kind: &str) -> ApiReply {
    let Ok(kind) = kind.parse::<FormKind>() else {
        return ApiReply::error(404, format!("unknown form '{kind}'"));
    };
    match state.drafts.get(&kind) {
        Some(draft) => draft_reply(200, draft, json!({})),
        None => ApiReply::error(404, format!("unknown form '{kind}'")),
    }
}

/// `POST /api/forms/{kind}` — update the draft with the page's fields and
/// submit it.
///
/// Success resets the draft; failure keeps it so the page can resubmit.
pub fn post_form(state: &mut WebState, kind: &str, body: Value) -> ApiReply {
    let Ok(kind) = kind.parse::<FormKind>() else {
        return ApiReply::error(404, format!("unknown form '{kind}'"));
    };
    let Ok(req) = serde_json::from_value::<FormRequest>(body) else {
        return ApiReply::error(400, "expected {fields: {...}}");
    };

    let keys = ForeignKeys::resolve(&state.config.forms, state.session.as_ref(), req.id_parcela);
    let draft = state
        .drafts
        .entry(kind)
        .or_insert_with(|| FormDraft::new(kind));

    let mut staged = draft.clone();
    for (name, value) in &req.fields {
        if let Err(e) = staged.set(name, field_text(value)) {
            return ApiReply::error(400, e.to_string());
        }
    }
    *draft = staged;

    match state.submitter.submit(draft, &keys) {
        SubmitOutcome::Success(record) => draft_reply(
            200,
            draft,
            json!({ "success": true, "message": "registered", "record": record }),
        ),
        SubmitOutcome::Failure(reason) => draft_reply(
            502,
            draft,
            json!({ "success": false, "message": reason }),
        ),
    }
}

fn draft_reply(status: u16, draft: &FormDraft, mut extra: Value) -> ApiReply {
    let view = serde_json::to_value(draft.view()).unwrap_or(Value::Null);
    if let Some(obj) = extra.as_object_mut() {
        obj.insert("draft".to_string(), view);
    }
    ApiReply {
        status,
        body: extra,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::events::EventLog;
    use crate::config::FintivaConfig;
    use crate::session::MemorySessionStore;

    fn offline_state() -> WebState {
        let mut config = FintivaConfig::default();
        config.api.base_url = "http://127.0.0.1:1".to_string();
        config.api.timeout_ms = 2000;
        WebState::new(config, Box::new(MemorySessionStore::new()), EventLog::disabled())
    }

    #[test]
    fn field_text_renders_scalars() {
        assert_eq!(field_text(&json!("12")), "12");
        assert_eq!(field_text(&json!(12.5)), "12.5");
        assert_eq!(field_text(&Value::Null), "");
    }

    #[test]
    fn unknown_form_is_404() {
        let mut state = offline_state();
        assert_eq!(get_form(&state, "usuarios").status, 404);
        assert_eq!(post_form(&mut state, "usuarios", json!({})).status, 404);
    }

    #[test]
    fn unknown_field_is_400_and_draft_untouched() {
        let mut state = offline_state();
        let reply = post_form(&mut state, "gastos", json!({"fields": {"agua": "1", "oro": "2"}}));
        assert_eq!(reply.status, 400);
        assert_eq!(state.drafts[&FormKind::Gastos].get("agua"), Some(""));
        assert!(state.drafts[&FormKind::Gastos].is_empty());
    }

    #[test]
    fn failed_submission_keeps_values_in_reply() {
        let mut state = offline_state();
        let reply = post_form(&mut state, "parcelas", json!({"fields": {"nombre_parcela": "Norte"}}));
        assert_eq!(reply.status, 502);
        assert_eq!(reply.body["success"], false);
        let fields = reply.body["draft"]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["name"], "nombre_parcela");
        assert_eq!(fields[0]["value"], "Norte");
    }

    #[test]
    fn session_and_logout() {
        let mut state = offline_state();
        state.session.save("a.b.c").unwrap();
        assert_eq!(get_session(&state).body["logged_in"], true);

        post_logout(&mut state).unwrap();
        let body = get_session(&state).body;
        assert_eq!(body["logged_in"], false);
        assert!(body["user_id"].is_null());
    }

    #[test]
    fn dashboard_without_session_is_unidentified() {
        let mut state = offline_state();
        let reply = get_dashboard(&mut state, "");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["state"], "unidentified");
        assert!(reply.body["parcel_crops"].as_array().unwrap().is_empty());
    }

    #[test]
    fn login_failure_is_401_with_detail() {
        let mut state = offline_state();
        let reply = post_login(&mut state, json!({"identificador": "Ana", "contrasena": "x"}));
        assert_eq!(reply.status, 401);
        assert!(reply.body["detail"].as_str().is_some());
    }
}
