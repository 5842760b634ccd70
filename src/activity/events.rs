//! Structured event log: one JSON object per line.
//!
//! Every write is best-effort: a read-only home directory or a full disk must
//! never turn a successful login or submission into a failure.

use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::config::schema::LoggingConfig;
use crate::identity::UserId;

// ---------------------------------------------------------------------------
// Entry types
// ---------------------------------------------------------------------------

/// Severity of an event. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Login,
    LoginFailed,
    Logout,
    FormSubmitted,
    FormFailed,
    MetricsFetchFailed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Login => "login",
            Self::LoginFailed => "login_failed",
            Self::Logout => "logout",
            Self::FormSubmitted => "form_submitted",
            Self::FormFailed => "form_failed",
            Self::MetricsFetchFailed => "metrics_fetch_failed",
        };
        f.write_str(name)
    }
}

/// A single line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: String,
    pub level: Level,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<UserId>,
    /// Endpoint path or form name the event concerns.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

impl ActivityEvent {
    pub fn new(level: Level, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            level,
            kind,
            user_id: None,
            resource: None,
            detail: None,
        }
    }

    pub fn user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Appends [`ActivityEvent`]s to a JSONL file.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: Option<PathBuf>,
    min_level: Level,
    echo: bool,
}

impl EventLog {
    /// Build from the `[logging]` config section. At level `debug` every
    /// recorded event is echoed to stderr as well.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let min_level = Level::parse(&config.level).unwrap_or(Level::Info);
        let path = if config.enabled {
            config::expand_home(&config.path)
        } else {
            None
        };
        Self {
            path,
            min_level,
            echo: min_level == Level::Debug,
        }
    }

    /// A log that drops everything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            min_level: Level::Error,
            echo: false,
        }
    }

    /// A log writing every level to `path`.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            min_level: Level::Debug,
            echo: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event. Failures are silently ignored.
    pub fn record(&self, event: &ActivityEvent) {
        if event.level < self.min_level {
            return;
        }
        if self.echo {
            eprintln!("[fintiva] {}", describe(event));
        }
        let _ = self.append(event);
    }

    fn append(&self, event: &ActivityEvent) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{json}")?;

        Ok(())
    }

    // -- Convenience constructors --

    pub fn login(&self, user_id: Option<UserId>) {
        self.record(&ActivityEvent::new(Level::Info, EventKind::Login).user(user_id));
    }

    pub fn login_failed(&self, reason: &str) {
        self.record(&ActivityEvent::new(Level::Warn, EventKind::LoginFailed).detail(reason));
    }

    pub fn logout(&self) {
        self.record(&ActivityEvent::new(Level::Info, EventKind::Logout));
    }

    pub fn form_submitted(&self, form: &str, user_id: UserId) {
        self.record(
            &ActivityEvent::new(Level::Info, EventKind::FormSubmitted)
                .user(Some(user_id))
                .resource(form),
        );
    }

    pub fn form_failed(&self, form: &str, user_id: UserId, reason: &str) {
        self.record(
            &ActivityEvent::new(Level::Warn, EventKind::FormFailed)
                .user(Some(user_id))
                .resource(form)
                .detail(reason),
        );
    }

    pub fn metrics_fetch_failed(&self, endpoint: &str, user_id: UserId, error: &anyhow::Error) {
        self.record(
            &ActivityEvent::new(Level::Warn, EventKind::MetricsFetchFailed)
                .user(Some(user_id))
                .resource(endpoint)
                .detail(format!("{error:#}")),
        );
    }
}

/// One-line human rendering of an event.
pub fn describe(event: &ActivityEvent) -> String {
    let mut line = format!("{} {}", event.level, event.kind);
    if let Some(resource) = &event.resource {
        line.push_str(&format!(" {resource}"));
    }
    if let Some(user_id) = event.user_id {
        line.push_str(&format!(" user={user_id}"));
    }
    if let Some(detail) = &event.detail {
        line.push_str(&format!(": {detail}"));
    }
    line
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
