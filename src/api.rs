//! HTTP client for the remote FINTIVA API.
//!
//! Uses the synchronous `ureq` client. Every method performs exactly one
//! request: nothing here retries or caches.
//!
//! Endpoints used by the crate:
//!
//! - `POST /auth/login` (see [`crate::auth`])
//! - `GET /metrics/gastos-trimestrales/{id}`, `GET /metrics/parcelas-cultivos/{id}`
//!   (see [`crate::metrics`])
//! - `POST /gastos`, `POST /cultivos`, `POST /parcelas` (see [`crate::forms`])
//! - `GET /usuarios/{id}/parcelas`, `GET /health`

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::schema::ApiConfig;
use crate::identity::UserId;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Result of a creation request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// 2xx. Carries the created record (`Null` if the body was not JSON).
    Success(Value),
    /// Non-2xx status or transport error, with a human-readable reason.
    Failure(String),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthStatus {
    pub status: String,
}

/// A parcel as returned by `GET /usuarios/{id}/parcelas`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Parcel {
    pub id_parcela: u64,
    pub id_usuario: u64,
    pub nombre_parcela: String,
    #[serde(default)]
    pub ubicacion: Option<String>,
    /// Stored as free text by the API; older records hold numbers.
    #[serde(default)]
    pub tamano: Option<Value>,
    #[serde(default)]
    pub tipo_tenencia: Option<String>,
    #[serde(default)]
    pub sistema_riego: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronous FINTIVA API client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
    timeout: Duration,
}

impl ApiClient {
    /// Build a client from the resolved `[api]` config.
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(base_url: &str, timeout: Duration) -> Self {
        // "localhost" may resolve to ::1 first while the API binds IPv4 only.
        let base_url = base_url
            .trim_end_matches('/')
            .replace("://localhost", "://127.0.0.1");
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url,
            agent,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET` a path and decode its JSON body. Non-2xx is an error.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let resp = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("GET {url} failed"))?;
        resp.into_json::<T>()
            .with_context(|| format!("failed to parse response from {url}"))
    }

    /// `POST` a JSON body. Status handling is left to the caller.
    pub(crate) fn post_json(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> std::result::Result<ureq::Response, ureq::Error> {
        self.agent
            .post(&self.url(path))
            .set("Content-Type", "application/json")
            .send_json(body)
    }

    /// Issue a creation request for `payload` against a resource path.
    ///
    /// Never returns an error: every failure becomes
    /// [`SubmitOutcome::Failure`] so form pages can show it and keep the
    /// draft.
    pub fn create(&self, path: &str, payload: &Value) -> SubmitOutcome {
        match self.post_json(path, payload) {
            Ok(resp) => {
                let body = resp.into_json::<Value>().unwrap_or(Value::Null);
                SubmitOutcome::Success(body)
            }
            Err(ureq::Error::Status(code, _)) => {
                SubmitOutcome::Failure(format!("the server rejected the request (HTTP {code})"))
            }
            Err(e) => SubmitOutcome::Failure(e.to_string()),
        }
    }

    /// Check that the API answers `GET /health` with `{"status": "ok"}`.
    pub fn health(&self) -> Result<HealthStatus> {
        let status: HealthStatus = self.get_json("/health")?;
        if status.status != "ok" {
            anyhow::bail!("API reported status '{}'", status.status);
        }
        Ok(status)
    }

    /// Parcels owned by a user.
    pub fn list_parcels(&self, user_id: UserId) -> Result<Vec<Parcel>> {
        self.get_json(&format!("/usuarios/{user_id}/parcelas"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_from_default_config() {
        let client = ApiClient::from_config(&ApiConfig::default());
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
        assert_eq!(client.timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn client_normalizes_base_url() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
        assert_eq!(client.url("/gastos"), "http://127.0.0.1:8000/gastos");
        assert_eq!(client.url("gastos"), "http://127.0.0.1:8000/gastos");
    }

    #[test]
    fn parcel_tolerates_missing_optional_fields() {
        let parcel: Parcel = serde_json::from_str(
            r#"{"id_parcela": 4, "id_usuario": 1, "nombre_parcela": "El Llano", "tamano": "2.5"}"#,
        )
        .unwrap();
        assert_eq!(parcel.id_parcela, 4);
        assert!(parcel.ubicacion.is_none());
        assert_eq!(parcel.tamano, Some(Value::String("2.5".into())));
    }

    #[test]
    fn unreachable_api_is_a_failure_outcome() {
        let client = ApiClient::new("http://127.0.0.1:1", Duration::from_secs(2));
        let outcome = client.create("/gastos", &serde_json::json!({"id_usuario": 1}));
        match outcome {
            SubmitOutcome::Failure(reason) => assert!(!reason.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
