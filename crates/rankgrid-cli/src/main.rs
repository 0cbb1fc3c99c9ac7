mod account;
mod check;
mod context;
mod present;
mod session_store;

use clap::{Parser, Subcommand};
use rankgrid_core::{AppConfig, ConfigError};
use tracing_subscriber::EnvFilter;

use crate::check::CheckCommands;
use crate::context::Context;

#[derive(Debug, Parser)]
#[command(name = "rankgrid")]
#[command(about = "Local ranking grid client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a ranking check for a business
    Check {
        #[command(subcommand)]
        command: CheckCommands,
    },
    /// Show the most recent saved grid for a business
    History {
        /// Business name as used in earlier checks
        name: String,
    },
    /// Print the grid points for a location without contacting the service
    Preview {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        #[arg(long, default_value = "3", value_parser = clap::value_parser!(u8).range(1..=10))]
        grid_size: u8,
        #[arg(long, default_value = "5.0")]
        radius: f64,
        #[arg(long, default_value = "15", value_parser = clap::value_parser!(u8).range(1..=20))]
        zoom: u8,
    },
    /// Start a session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "RANKGRID_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session and clear the saved login
    Logout,
    /// Show who is logged in
    Whoami,
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "RANKGRID_PASSWORD", hide_env_values = true)]
        password: String,
        /// Pricing plan id (see `rankgrid pricing`)
        #[arg(long, default_value = "basic")]
        plan: String,
    },
    /// List pricing plans
    Pricing,
    /// Show dashboard data
    Dashboard,
    /// Show ranking service status and endpoints
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = rankgrid_core::load_app_config();

    let log_level = config.as_ref().map_or("info", |c| c.log_level.as_str());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("rankgrid: run `rankgrid --help` for commands");
        return Ok(());
    };

    match command {
        Commands::Preview {
            lat,
            lng,
            grid_size,
            radius,
            zoom,
        } => {
            check::run_preview(lat, lng, grid_size, radius, zoom);
            Ok(())
        }
        Commands::Check { command } => check::run_check(&open(config)?, command).await,
        Commands::History { name } => check::run_history(&open(config)?, &name).await,
        Commands::Login { email, password } => {
            account::run_login(&open(config)?, &email, &password).await
        }
        Commands::Logout => account::run_logout(&open(config)?).await,
        Commands::Whoami => account::run_whoami(&open(config)?).await,
        Commands::Signup {
            email,
            password,
            plan,
        } => account::run_signup(&open(config)?, &email, &password, &plan).await,
        Commands::Pricing => account::run_pricing(&open(config)?).await,
        Commands::Dashboard => account::run_dashboard(&open(config)?).await,
        Commands::Info => account::run_info(&open(config)?).await,
    }
}

/// Commands that talk to the service need configuration; `preview` does not.
fn open(config: Result<AppConfig, ConfigError>) -> anyhow::Result<Context> {
    let config = config?;
    tracing::debug!(env = %config.env, base_url = %config.base_url, "configuration loaded");
    Context::open(config)
}
