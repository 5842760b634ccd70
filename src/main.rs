use anyhow::Result;
use clap::{Parser, Subcommand};

use fintiva::cli;

#[derive(Debug, Parser)]
#[command(name = "fintiva")]
#[command(about = "Client for the FINTIVA microfinance API")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and store the session token
    Login {
        /// Full name as registered
        #[arg(long, short)]
        user: String,
        /// Password (read from stdin when omitted)
        #[arg(long, short)]
        password: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Show the subject, user id and expiry of the stored token
    Whoami,
    /// Show quarterly expenses and crops per parcel for the current user
    Dashboard {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Create a record: gastos, cultivos or parcelas
    Submit {
        /// Form to submit
        form: String,
        /// Field assignments, e.g. `agua=120 luz=45.5`
        #[arg(required = true)]
        fields: Vec<String>,
        /// Parcel a crop belongs to (defaults to `forms.parcel_id`)
        #[arg(long)]
        parcela: Option<u64>,
    },
    /// List the current user's parcels
    Parcels {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show recent client activity from the event log
    Activity {
        /// Only include the last N days
        #[arg(long)]
        days: Option<u32>,
        /// Number of recent events to list
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Check API reachability, config and session
    Health,
    /// Launch the web dashboard
    Web {
        /// Address to bind (defaults to `web.addr`)
        #[arg(long)]
        addr: Option<String>,
        /// Don't open a browser
        #[arg(long)]
        no_open: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective (merged) configuration
    Show,
    /// Write a default config to ~/.fintiva/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a single value, e.g. `api.base_url http://10.0.0.5:8000`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Login { user, password } => cli::run_login(&user, password),
        Commands::Logout => cli::run_logout(),
        Commands::Whoami => cli::run_whoami(),
        Commands::Dashboard { format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_dashboard(fmt)
        }
        Commands::Submit {
            form,
            fields,
            parcela,
        } => cli::run_submit(&form, &fields, parcela),
        Commands::Parcels { format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_parcels(fmt)
        }
        Commands::Activity { days, limit } => cli::run_activity(days, limit),
        Commands::Health => cli::run_health(),
        Commands::Web { addr, no_open } => cli::run_web(addr, !no_open),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
