//! CLI command implementations for fintiva.
//!
//! Provides subcommand handlers for:
//! - `fintiva login | logout | whoami` — session management
//! - `fintiva dashboard` — quarterly expenses and crops per parcel
//! - `fintiva submit <form> key=value...` — create gastos, cultivos, parcelas
//! - `fintiva parcels` — list the current user's parcels
//! - `fintiva activity` — recent entries of the event log
//! - `fintiva health` — check API reachability, config and session
//! - `fintiva web` — launch the web dashboard
//! - `fintiva config show|init|set|reset` — configuration management

use std::io::BufRead;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::activity::events::{self, EventLog};
use crate::activity::reporter;
use crate::api::{ApiClient, Parcel, SubmitOutcome};
use crate::auth;
use crate::config::{self, FintivaConfig};
use crate::dashboard::{DashboardComposer, DashboardState, DashboardView};
use crate::forms::{ForeignKeys, FormDraft, FormKind, FormSubmitter};
use crate::identity;
use crate::metrics::MetricsClient;
use crate::session::{FileSessionStore, SessionStore};
use crate::web;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Resolved config plus the pieces every command needs.
struct Runtime {
    config: FintivaConfig,
    api: ApiClient,
    session: FileSessionStore,
    log: EventLog,
}

fn runtime() -> Result<Runtime> {
    let config = config::load();
    let api = ApiClient::from_config(&config.api);
    let session = FileSessionStore::from_config(&config.session)?;
    let log = EventLog::from_config(&config.logging);
    Ok(Runtime {
        config,
        api,
        session,
        log,
    })
}

// ---------------------------------------------------------------------------
// fintiva login | logout | whoami
// ---------------------------------------------------------------------------

/// Authenticate and store the token. Reads the password from stdin when not
/// given on the command line.
pub fn run_login(user: &str, password: Option<String>) -> Result<()> {
    let ctx = runtime()?;
    let password = match password {
        Some(p) => p,
        None => read_password()?,
    };

    let session = auth::login(&ctx.api, &ctx.session, &ctx.log, user, &password)?;
    println!("{} Signed in as {}", "✓".green().bold(), user.bold());
    match session.user_id {
        Some(id) => println!("  {} {}", "User id:".dimmed(), id),
        None => println!(
            "  {}",
            "The token carries no user id; metrics will be empty.".yellow()
        ),
    }
    Ok(())
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Clear the stored token.
pub fn run_logout() -> Result<()> {
    let ctx = runtime()?;
    auth::logout(&ctx.session, &ctx.log)?;
    println!("{} Signed out", "✓".green().bold());
    Ok(())
}

/// Print the claims decoded from the stored token. The signature is not
/// checked; `exp` is shown for information only.
pub fn run_whoami() -> Result<()> {
    let ctx = runtime()?;
    let Some(token) = ctx.session.read() else {
        println!("{}", "Not signed in. Run `fintiva login`.".yellow());
        return Ok(());
    };
    let Some(claims) = identity::decode_claims(&token) else {
        println!("{}", "Signed in, but the token payload is unreadable.".yellow());
        return Ok(());
    };

    match claims.get("sub") {
        Some(sub) => println!("{} {}", "Subject:".bold(), claim_text(sub)),
        None => println!("{} {}", "Subject:".bold(), "(none)".dimmed()),
    }
    match identity::extract_user_id(Some(&token)) {
        Some(id) => println!("{} {}", "User id:".bold(), id),
        None => println!("{}", "The token carries no usable user id.".yellow()),
    }
    if let Some(exp) = claims.get("exp") {
        match format_expiry(exp) {
            Some(when) => println!("{} {} {}", "Expires:".bold(), when, "(not verified)".dimmed()),
            None => println!("{} {}", "Expires:".bold(), claim_text(exp)),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// fintiva dashboard
// ---------------------------------------------------------------------------

/// Fetch and print both dashboard series.
pub fn run_dashboard(format: OutputFormat) -> Result<()> {
    let ctx = runtime()?;
    let metrics = MetricsClient::new(ctx.api.clone(), ctx.log.clone());
    let mut composer = DashboardComposer::new(ctx.config.dashboard.sentinel_user_id);
    let view = composer.refresh(&ctx.session, &metrics);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Table => print_dashboard_table(&view),
    }
    Ok(())
}

fn print_dashboard_table(view: &DashboardView) {
    println!("{}", "FINTIVA Dashboard".bold().cyan());
    println!("{}", "=".repeat(50));
    match view.state {
        DashboardState::Unidentified => println!(
            "  {}",
            "No user id in the session; showing data for the anonymous id.".yellow()
        ),
        _ => {
            if let Some(id) = view.user_id {
                println!("  {} {}", "User id:".bold(), id);
            }
        }
    }
    println!();

    println!("{}", "Expenses per Quarter".bold().cyan());
    if view.quarterly_expenses.is_empty() {
        println!("  {}", "no data".dimmed());
    } else {
        let max = view
            .quarterly_expenses
            .iter()
            .map(|p| p.total)
            .fold(0.0_f64, f64::max);
        for point in &view.quarterly_expenses {
            println!(
                "  {:<12} {:>14} {}",
                truncate(&point.period, 12),
                format_amount(point.total),
                bar(point.total, max, 24).green()
            );
        }
    }
    println!();

    println!("{}", "Crops per Parcel".bold().cyan());
    if view.parcel_crops.is_empty() {
        println!("  {}", "no data".dimmed());
    } else {
        let max = view
            .parcel_crops
            .iter()
            .map(|p| p.crop_count)
            .max()
            .unwrap_or(0) as f64;
        for point in &view.parcel_crops {
            println!(
                "  {:<20} {:>6} {}",
                truncate(&point.parcel, 20),
                point.crop_count,
                bar(point.crop_count as f64, max, 24).yellow()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// fintiva submit
// ---------------------------------------------------------------------------

/// Build a draft from `key=value` assignments and submit it.
pub fn run_submit(form: &str, fields: &[String], parcela: Option<u64>) -> Result<()> {
    let kind: FormKind = form.parse()?;
    let ctx = runtime()?;

    let mut draft = FormDraft::new(kind);
    draft.apply_assignments(fields.iter().map(String::as_str))?;

    let keys = ForeignKeys::resolve(&ctx.config.forms, &ctx.session, parcela);
    let submitter = FormSubmitter::new(ctx.api.clone(), ctx.log.clone());

    match submitter.submit(&mut draft, &keys) {
        SubmitOutcome::Success(record) => {
            println!(
                "{} {} registered for user {}",
                "✓".green().bold(),
                kind.spec().title.bold(),
                keys.user_id
            );
            if !record.is_null() {
                println!("{}", serde_json::to_string_pretty(&record)?.dimmed());
            }
            Ok(())
        }
        SubmitOutcome::Failure(reason) => {
            anyhow::bail!("{} was not registered: {reason}", kind.spec().title)
        }
    }
}

// ---------------------------------------------------------------------------
// fintiva parcels
// ---------------------------------------------------------------------------

/// List the parcels of the user resolved for forms.
pub fn run_parcels(format: OutputFormat) -> Result<()> {
    let ctx = runtime()?;
    let keys = ForeignKeys::resolve(&ctx.config.forms, &ctx.session, None);
    let parcels = ctx.api.list_parcels(keys.user_id)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&parcels)?),
        OutputFormat::Table => print_parcels_table(&parcels, keys.user_id),
    }
    Ok(())
}

fn print_parcels_table(parcels: &[Parcel], user_id: u64) {
    if parcels.is_empty() {
        println!(
            "{}",
            format!("No parcels for user {user_id}. Create one with `fintiva submit parcelas`.")
                .yellow()
        );
        return;
    }

    println!("{}", format!("Parcels of user {user_id}").bold().cyan());
    println!(
        "  {:>4} {:<20} {:<16} {:>8} Irrigation",
        "Id", "Name", "Location", "Size"
    );
    println!("  {}", "-".repeat(64));
    for (i, p) in parcels.iter().enumerate() {
        let size = match &p.tamano {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) if !v.is_null() => v.to_string(),
            _ => "-".to_string(),
        };
        let line = format!(
            "  {:>4} {:<20} {:<16} {:>8} {}",
            p.id_parcela,
            truncate(&p.nombre_parcela, 20),
            truncate(p.ubicacion.as_deref().unwrap_or("-"), 16),
            truncate(&size, 8),
            p.sistema_riego.as_deref().unwrap_or("-"),
        );
        if i % 2 == 0 {
            println!("{}", line);
        } else {
            println!("{}", line.dimmed());
        }
    }
}

// ---------------------------------------------------------------------------
// fintiva activity
// ---------------------------------------------------------------------------

/// Summarize the event log.
pub fn run_activity(days: Option<u32>, limit: usize) -> Result<()> {
    let cfg = config::load();
    let log = EventLog::from_config(&cfg.logging);
    let Some(path) = log.path() else {
        println!(
            "{}",
            "Event logging is disabled (logging.enabled = false).".yellow()
        );
        return Ok(());
    };

    let events = reporter::read_events_since_days(path, days);
    if events.is_empty() {
        println!("{}", "No activity recorded yet.".yellow());
        return Ok(());
    }

    println!("{}", "FINTIVA Activity".bold().cyan());
    println!("{}", "=".repeat(50));
    println!("  {} {}", "Events:  ".bold(), events.len());
    println!("  {} {}", "Failures:".bold(), reporter::failures(&events));
    println!();

    for (kind, count) in reporter::count_by_kind(&events) {
        println!("  {:<24} {:>6}", kind, count);
    }
    println!();

    println!("{}", "Recent".bold().cyan());
    for event in reporter::latest(&events, limit) {
        let when = chrono::DateTime::parse_from_rfc3339(&event.timestamp)
            .map(|t| {
                t.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_else(|_| event.timestamp.clone());
        let line = events::describe(event);
        if event.level >= events::Level::Warn {
            println!("  {} {}", when.dimmed(), line.red());
        } else {
            println!("  {} {}", when.dimmed(), line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// fintiva health
// ---------------------------------------------------------------------------

/// Check API reachability, config files, session and log file.
pub fn run_health() -> Result<()> {
    println!("{}", "FINTIVA Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.fintiva/config.toml found"
        } else {
            "not found (run `fintiva config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".fintiva.toml found"
        } else {
            "none (optional)"
        },
    );

    let ctx = runtime()?;

    match ctx.api.health() {
        Ok(status) => print_health_item(
            "API",
            status.status == "ok",
            &format!("{} ({})", ctx.api.base_url(), status.status),
        ),
        Err(e) => print_health_item(
            "API",
            false,
            &format!("not reachable at {}: {e:#}", ctx.api.base_url()),
        ),
    }

    let token = ctx.session.read();
    let user_id = identity::extract_user_id(token.as_deref());
    print_health_item(
        "Session",
        token.is_some(),
        &match (token.is_some(), user_id) {
            (true, Some(id)) => format!("user {id}"),
            (true, None) => "token has no user id".to_string(),
            (false, _) => "not signed in".to_string(),
        },
    );
    print_health_item(
        "Forms owner",
        true,
        &format!(
            "{} (fallback user {}, parcel {})",
            ctx.config.forms.owner, ctx.config.forms.fixed_user_id, ctx.config.forms.parcel_id
        ),
    );

    match ctx.log.path() {
        Some(path) => {
            let exists = path.exists();
            let detail = if exists {
                format!("{} entries", reporter::read_all_events(path).len())
            } else {
                "no log file yet".to_string()
            };
            print_health_item("Event log", exists, &detail);
        }
        None => print_health_item("Event log", false, "disabled"),
    }

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<18} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// fintiva web
// ---------------------------------------------------------------------------

/// Serve the web dashboard until interrupted.
pub fn run_web(addr: Option<String>, open: bool) -> Result<()> {
    let cfg = config::load();
    let addr = addr.unwrap_or_else(|| cfg.web.addr.clone());
    let open = open && cfg.web.open_browser;
    let state = web::WebState::from_config(cfg)?;
    web::serve(&addr, state, open)
}

// ---------------------------------------------------------------------------
// fintiva config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective fintiva Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    if global_exists {
        println!("  {} {}", "✓".green(), "~/.fintiva/config.toml".dimmed());
    } else {
        println!(
            "  {} {}",
            "·".dimmed(),
            "~/.fintiva/config.toml (not found)".dimmed()
        );
    }
    if project_exists {
        println!("  {} {}", "✓".green(), ".fintiva.toml".dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), ".fintiva.toml (not found)".dimmed());
    }
    println!(
        "  {} {}",
        "·".dimmed(),
        "FINTIVA_* environment variables".dimmed()
    );

    Ok(())
}

/// Initialize a default config file at `~/.fintiva/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Format an amount with comma separators and two decimals.
fn format_amount(n: f64) -> String {
    let formatted = format!("{:.2}", n.abs());
    let (int, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::new();
    for (i, ch) in int.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let int: String = grouped.chars().rev().collect();
    let sign = if n < 0.0 { "-" } else { "" };
    format!("{sign}{int}.{frac}")
}

/// Horizontal bar of up to `width` cells, proportional to `value / max`.
fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let cells = ((value / max) * width as f64).round().max(1.0) as usize;
    "█".repeat(cells.min(width))
}

/// Local date and time for a JWT `exp` claim given in seconds since the epoch.
fn format_expiry(exp: &serde_json::Value) -> Option<String> {
    let secs = match exp.as_i64() {
        Some(secs) => secs,
        None => {
            let f = exp.as_f64()?;
            if !f.is_finite() || f.fract() != 0.0 || f.abs() > i64::MAX as f64 {
                return None;
            }
            f as i64
        }
    };
    let utc = chrono::DateTime::from_timestamp(secs, 0)?;
    Some(
        utc.with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
    )
}

/// Claim value without JSON quoting for strings.
fn claim_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(42.5), "42.50");
        assert_eq!(format_amount(1000.0), "1,000.00");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-1500.0), "-1,500.00");
    }

    #[test]
    fn test_bar() {
        assert_eq!(bar(0.0, 10.0, 10), "");
        assert_eq!(bar(5.0, 0.0, 10), "");
        assert_eq!(bar(10.0, 10.0, 10).chars().count(), 10);
        assert_eq!(bar(5.0, 10.0, 10).chars().count(), 5);
        assert_eq!(bar(0.01, 10.0, 10).chars().count(), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("Parcela Señorial", 8), "Parcela…");
    }

    #[test]
    fn test_format_expiry() {
        let expected = chrono::DateTime::from_timestamp(1_700_000_000, 0)
            .unwrap()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string();
        assert_eq!(format_expiry(&serde_json::json!(1_700_000_000)), Some(expected.clone()));
        assert_eq!(format_expiry(&serde_json::json!(1_700_000_000.0)), Some(expected));
        assert!(format_expiry(&serde_json::json!(1_700_000_000)).unwrap().starts_with("2023-11-1"));

        assert_eq!(format_expiry(&serde_json::json!("soon")), None);
        assert_eq!(format_expiry(&serde_json::json!(1.5)), None);
        assert_eq!(format_expiry(&serde_json::json!(i64::MAX)), None);
        assert_eq!(format_expiry(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_claim_text() {
        assert_eq!(claim_text(&serde_json::json!("42")), "42");
        assert_eq!(claim_text(&serde_json::json!(42)), "42");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str_opt(Some("csv")),
            OutputFormat::Table
        );
    }
}
