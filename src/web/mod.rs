//! Embedded web dashboard for fintiva.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - The single-page app on `/`, `/login`, `/dashboard`, `/gastos`,
//!   `/cultivos` and `/parcelas`
//! - A local JSON API the page talks to, which in turn calls the remote
//!   FINTIVA API with the stored session
//!
//! Launched via `fintiva web` (default: `http://127.0.0.1:5173`).

mod api;
mod frontend;

use std::collections::HashMap;
use std::io::Cursor;

use anyhow::{Context, Result};
use serde_json::Value;
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::activity::events::EventLog;
use crate::api::ApiClient;
use crate::config::FintivaConfig;
use crate::dashboard::DashboardComposer;
use crate::forms::{FormDraft, FormKind, FormSubmitter};
use crate::metrics::MetricsClient;
use crate::session::{FileSessionStore, SessionStore};

pub use api::ApiReply;

/// Pages of the single-page app. All serve the same document.
pub const PAGES: [&str; 6] = ["/", "/login", "/dashboard", "/gastos", "/cultivos", "/parcelas"];

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

/// Everything the request handlers share. Owned by the request loop.
pub struct WebState {
    pub config: FintivaConfig,
    pub api: ApiClient,
    pub session: Box<dyn SessionStore>,
    pub log: EventLog,
    pub metrics: MetricsClient,
    pub submitter: FormSubmitter,
    pub composer: DashboardComposer,
    pub drafts: HashMap<FormKind, FormDraft>,
}

impl WebState {
    pub fn new(config: FintivaConfig, session: Box<dyn SessionStore>, log: EventLog) -> Self {
        let api = ApiClient::from_config(&config.api);
        let metrics = MetricsClient::new(api.clone(), log.clone());
        let submitter = FormSubmitter::new(api.clone(), log.clone());
        let composer = DashboardComposer::new(config.dashboard.sentinel_user_id);
        let drafts = FormKind::ALL
            .into_iter()
            .map(|kind| (kind, FormDraft::new(kind)))
            .collect();
        Self {
            config,
            api,
            session,
            log,
            metrics,
            submitter,
            composer,
            drafts,
        }
    }

    /// State backed by the configured session file and event log.
    pub fn from_config(config: FintivaConfig) -> Result<Self> {
        let session = FileSessionStore::from_config(&config.session)?;
        let log = EventLog::from_config(&config.logging);
        Ok(Self::new(config, Box::new(session), log))
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the web dashboard server on the given address.
///
/// Blocks the current thread. Handles requests sequentially (sufficient for
/// a local single-user dashboard). Errors are reported per request without
/// stopping the server.
pub fn serve(addr: &str, mut state: WebState, open: bool) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    println!("fintiva dashboard running at http://{addr}");
    println!("API: {}", state.api.base_url());
    println!("Press Ctrl+C to stop.\n");

    if open {
        let _ = open_browser(&format!("http://{addr}/dashboard"));
    }

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let body = if matches!(method, Method::Put | Method::Post | Method::Patch) {
            let mut buf = String::new();
            let _ = request.as_reader().read_to_string(&mut buf);
            Some(buf)
        } else {
            None
        };

        let response = match dispatch(&mut state, &method, &url, body.as_deref()) {
            Ok(resp) => resp,
            Err(e) => json_response(&ApiReply::error(500, format!("{e:#}"))),
        };
        let status = response.status_code().0;
        let _ = request.respond(response);

        println!(
            "{} {} {} {}",
            chrono::Local::now().format("%H:%M:%S"),
            method,
            url,
            status
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Dispatch an incoming request to the appropriate handler.
fn dispatch(
    state: &mut WebState,
    method: &Method,
    url: &str,
    body: Option<&str>,
) -> Result<Response<Cursor<Vec<u8>>>> {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));

    if *method == Method::Get && PAGES.contains(&path) {
        return Ok(serve_frontend());
    }

    let reply = route_api(state, method, path, query, body)?;
    Ok(json_response(&reply))
}

/// Route a local API call. Exposed for tests; the server wraps the reply in
/// an HTTP response.
pub fn route_api(
    state: &mut WebState,
    method: &Method,
    path: &str,
    query: &str,
    body: Option<&str>,
) -> Result<ApiReply> {
    let json_body = || -> Result<Value> {
        serde_json::from_str(body.unwrap_or("{}")).context("request body is not valid JSON")
    };

    match (method, path) {
        (&Method::Post, "/api/login") => Ok(api::post_login(state, json_body()?)),
        (&Method::Post, "/api/logout") => api::post_logout(state),
        (&Method::Get, "/api/session") => Ok(api::get_session(state)),
        (&Method::Get, "/api/dashboard") => Ok(api::get_dashboard(state, query)),
        (&Method::Get, "/api/parcels") => Ok(api::get_parcels(state)),
        (&Method::Get, "/api/health") => Ok(api::get_health(state)),
        (&Method::Get, p) if p.starts_with("/api/forms/") => {
            Ok(api::get_form(state, &p["/api/forms/".len()..]))
        }
        (&Method::Post, p) if p.starts_with("/api/forms/") => {
            Ok(api::post_form(state, &p["/api/forms/".len()..], json_body()?))
        }
        _ => Ok(ApiReply::error(404, "not found")),
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Serve the embedded single-page frontend.
fn serve_frontend() -> Response<Cursor<Vec<u8>>> {
    Response::from_data(frontend::INDEX_HTML.as_bytes().to_vec())
        .with_header(content_type_html())
        .with_status_code(StatusCode(200))
}

fn json_response(reply: &ApiReply) -> Response<Cursor<Vec<u8>>> {
    Response::from_data(reply.body.to_string().into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(reply.status))
}

/// JSON content type header.
fn content_type_json() -> Header {
    Header::from_bytes("Content-Type", "application/json; charset=utf-8").unwrap()
}

/// HTML content type header.
fn content_type_html() -> Header {
    Header::from_bytes("Content-Type", "text/html; charset=utf-8").unwrap()
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    fn offline_state() -> WebState {
        let mut config = FintivaConfig::default();
        config.api.base_url = "http://127.0.0.1:1".to_string();
        config.api.timeout_ms = 2000;
        WebState::new(config, Box::new(MemorySessionStore::new()), EventLog::disabled())
    }

    #[test]
    fn pages_serve_html() {
        let mut state = offline_state();
        for page in PAGES {
            let resp = dispatch(&mut state, &Method::Get, page, None).unwrap();
            assert_eq!(resp.status_code().0, 200, "page {page}");
        }
        let resp = dispatch(&mut state, &Method::Get, "/dashboard?x=1", None).unwrap();
        assert_eq!(resp.status_code().0, 200);
    }

    #[test]
    fn unknown_routes_are_404() {
        let mut state = offline_state();
        let reply = route_api(&mut state, &Method::Get, "/api/nope", "", None).unwrap();
        assert_eq!(reply.status, 404);
        let resp = dispatch(&mut state, &Method::Post, "/dashboard", Some("{}")).unwrap();
        assert_eq!(resp.status_code().0, 404);
    }

    #[test]
    fn malformed_json_body_is_an_error() {
        let mut state = offline_state();
        let result = route_api(&mut state, &Method::Post, "/api/login", "", Some("{nope"));
        assert!(result.is_err());
    }

    #[test]
    fn new_state_has_a_draft_per_form() {
        let state = offline_state();
        assert_eq!(state.drafts.len(), 3);
        assert!(state.drafts.values().all(FormDraft::is_empty));
    }
}
