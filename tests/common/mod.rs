//! Shared helpers for integration tests: a fake FINTIVA API on a loopback
//! port and token builders.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use fintiva::api::ApiClient;
use tiny_http::{Header, Response, Server, StatusCode};

/// A request as seen by the fake API.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

type Handler = dyn Fn(&Recorded) -> (u16, String) + Send + 'static;

/// Serves canned responses from a handler and records every request.
pub struct FakeApi {
    server: Arc<Server>,
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeApi {
    pub fn start(handler: impl Fn(&Recorded) -> (u16, String) + Send + 'static) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handler: Box<Handler> = Box::new(handler);
        let thread = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let recorded = Recorded {
                        method: request.method().to_string(),
                        path: request.url().to_string(),
                        content_type: request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("Content-Type"))
                            .map(|h| h.value.to_string()),
                        body,
                    };
                    let (status, reply) = handler(&recorded);
                    requests.lock().unwrap().push(recorded);

                    let response = Response::from_string(reply)
                        .with_status_code(StatusCode(status))
                        .with_header(
                            Header::from_bytes("Content-Type", "application/json").unwrap(),
                        );
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            base_url: format!("http://{addr}"),
            requests,
            thread: Some(thread),
        }
    }

    /// Answer every request with the same status and body.
    pub fn fixed(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::start(move |_| (status, body.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(5))
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// An unsigned token whose payload is `claims`.
pub fn token_with_claims(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// A token whose `sub` claim is the given user id, as a string.
pub fn token_for(user_id: u64) -> String {
    token_with_claims(serde_json::json!({ "sub": user_id.to_string() }))
}
