/// Configuration schema and defaults for the fintiva client.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[api]`, `[session]`, `[logging]`, `[web]`, `[forms]` and `[dashboard]`.
///
/// Every field has a sensible built-in default. Users only need to set the
/// values they want to override.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level fintiva configuration.
///
/// Maps directly to the `~/.fintiva/config.toml` and `.fintiva.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FintivaConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub web: WebConfig,
    pub forms: FormsConfig,
    pub dashboard: DashboardConfig,
}

// ---------------------------------------------------------------------------
// [api]
// ---------------------------------------------------------------------------

/// Remote FINTIVA API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [session]
// ---------------------------------------------------------------------------

/// Where the bearer token is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the token file. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: "~/.fintiva/session.token".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Event log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the JSONL event log is written.
    pub enabled: bool,
    /// Path to the event log file. `~` is expanded to the home directory.
    pub path: String,
    /// Log level: `"debug"`, `"info"`, `"warn"`, `"error"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.fintiva/events.jsonl".to_string(),
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Local dashboard server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub addr: String,
    /// Open the dashboard in the system browser on start.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5173".to_string(),
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [forms]
// ---------------------------------------------------------------------------

/// How the `id_usuario` foreign key of a submission is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnerSource {
    /// Derive from the stored token, falling back to `fixed_user_id`.
    #[default]
    Session,
    /// Always send `fixed_user_id`.
    Fixed,
}

impl std::fmt::Display for OwnerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Foreign keys attached to form submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    pub owner: OwnerSource,
    pub fixed_user_id: u64,
    /// Parcel a new crop is attached to unless overridden per submission.
    pub parcel_id: u64,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            owner: OwnerSource::default(),
            fixed_user_id: 1,
            parcel_id: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Identifier metrics are requested for when the session has no usable
    /// subject claim.
    pub sentinel_user_id: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sentinel_user_id: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML template
// ---------------------------------------------------------------------------

impl FintivaConfig {
    /// Annotated default config written by `fintiva config init`.
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG_TOML
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"# fintiva configuration
#
# Precedence (highest wins): FINTIVA_* env vars > .fintiva.toml > this file.

[api]
# Base URL of the FINTIVA API.
base_url = "http://127.0.0.1:8000"
timeout_ms = 10000

[session]
# Bearer token file. Removed by `fintiva logout`.
path = "~/.fintiva/session.token"

[logging]
enabled = true
path = "~/.fintiva/events.jsonl"
# debug | info | warn | error
level = "info"

[web]
addr = "127.0.0.1:5173"
open_browser = true

[forms]
# session: id_usuario comes from the logged-in token (falls back to fixed_user_id)
# fixed:   id_usuario is always fixed_user_id
owner = "session"
fixed_user_id = 1
parcel_id = 1

[dashboard]
sentinel_user_id = 0
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
