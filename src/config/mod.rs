//! Configuration system for fintiva.
//!
//! Provides a layered configuration hierarchy:
//!
//! 1. **Built-in defaults** — hardcoded in [`schema::FintivaConfig::default()`]
//! 2. **User global config** — `~/.fintiva/config.toml`
//! 3. **Project local config** — `.fintiva.toml` in the current working directory
//! 4. **Environment variables** — `FINTIVA_*` overrides (highest precedence)
//!
//! Later layers override earlier ones at the key level. Keys missing from a
//! TOML file keep the previous layer's values.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fintiva::config;
//!
//! let cfg = config::load();
//! let client = fintiva::api::ApiClient::from_config(&cfg.api);
//! ```

pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::FintivaConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved fintiva configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars. Malformed files are ignored so a broken config never blocks the
/// client.
pub fn load() -> FintivaConfig {
    let layers = [global_config_path(), project_config_path()];
    let mut config = load_layers(layers.iter().flatten().map(PathBuf::as_path));
    apply_env_overrides(&mut config);
    config
}

/// Merge the given TOML files over the built-in defaults, in order.
pub fn load_layers<'a>(paths: impl IntoIterator<Item = &'a Path>) -> FintivaConfig {
    let Ok(mut merged) = toml::Value::try_from(FintivaConfig::default()) else {
        return FintivaConfig::default();
    };

    for path in paths {
        if let Some(layer) = load_toml_value(path) {
            merge_values(&mut merged, layer);
        }
    }

    merged.try_into().unwrap_or_default()
}

/// Read a TOML file as an untyped value tree.
///
/// Returns `None` if the file doesn't exist or the content is malformed.
fn load_toml_value(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Deep-merge `overlay` into `base`: tables merge key by key, every other
/// value replaces the base value.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.fintiva/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".fintiva").join("config.toml"))
}

/// Path to the project local config: `.fintiva.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".fintiva.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    if path == "~" {
        return dirs::home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `FINTIVA_API_URL` — API base URL
/// - `FINTIVA_API_TIMEOUT_MS` — request timeout
/// - `FINTIVA_SESSION_PATH` — token file location
/// - `FINTIVA_LOG` — event log enabled (`1`/`true`/`yes`/`on`)
/// - `FINTIVA_LOG_LEVEL` — `debug`, `info`, `warn`, `error`
/// - `FINTIVA_WEB_ADDR` — local dashboard bind address
/// - `FINTIVA_FORMS_OWNER` — `session` or `fixed`
/// - `FINTIVA_USER_ID` — fixed `id_usuario` for submissions
/// - `FINTIVA_PARCEL_ID` — default `id_parcela` for crops
pub fn apply_env_overrides(config: &mut FintivaConfig) {
    if let Ok(val) = std::env::var("FINTIVA_API_URL")
        && !val.is_empty()
    {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("FINTIVA_API_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.api.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("FINTIVA_SESSION_PATH")
        && !val.is_empty()
    {
        config.session.path = val;
    }
    if let Ok(val) = std::env::var("FINTIVA_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("FINTIVA_LOG_LEVEL")
        && !val.is_empty()
    {
        config.logging.level = val.to_ascii_lowercase();
    }
    if let Ok(val) = std::env::var("FINTIVA_WEB_ADDR")
        && !val.is_empty()
    {
        config.web.addr = val;
    }
    if let Ok(val) = std::env::var("FINTIVA_FORMS_OWNER")
        && let Some(owner) = parse_owner(&val)
    {
        config.forms.owner = owner;
    }
    if let Ok(val) = std::env::var("FINTIVA_USER_ID")
        && let Ok(id) = val.parse::<u64>()
    {
        config.forms.fixed_user_id = id;
    }
    if let Ok(val) = std::env::var("FINTIVA_PARCEL_ID")
        && let Ok(id) = val.parse::<u64>()
    {
        config.forms.parcel_id = id;
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse an owner-source string.
fn parse_owner(val: &str) -> Option<schema::OwnerSource> {
    match val.to_ascii_lowercase().as_str() {
        "session" | "token" => Some(schema::OwnerSource::Session),
        "fixed" => Some(schema::OwnerSource::Fixed),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.fintiva/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.fintiva/ directory")?;
    }

    fs::write(&path, FintivaConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Supports dotted keys like `api.base_url`. The value is parsed according
/// to the type of the key's current (or default) value.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_in(&path, key, value)
}

/// [`set_config_value`] against an explicit file.
pub fn set_config_value_in(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut root = toml::Value::try_from(FintivaConfig::default())
        .context("failed to serialize default config")?;
    if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        let current: toml::Value =
            toml::from_str(&content).context("failed to parse config as TOML value")?;
        merge_values(&mut root, current);
    }

    set_toml_value(&mut root, key, value)?;

    // Reject values that no longer fit the schema.
    let _: FintivaConfig = root
        .clone()
        .try_into()
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(toml::Value::String(_)) => toml::Value::String(raw_value.to_string()),
        Some(_) => anyhow::bail!("'{key}' is a section, not a value"),
        None => anyhow::bail!("unknown config key '{key}'"),
    };

    table.insert((*leaf).to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
