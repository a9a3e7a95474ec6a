//! Cloud Rotator - Headless Daemon
//!
//! Owns the rotation service: polls quota for every account, switches the target
//! application away from a depleted account, and exposes account management on the
//! command line.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use rotator_core::modules::provider::OAuthClient;
use rotator_core::RotationService;

mod account_commands;
mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => {
            rotator_core::service::default_data_dir().context("Failed to get data directory")?
        },
    };

    let oauth = OAuthClient::from_env().unwrap_or_else(|e| {
        warn!("{}; token refresh and onboarding will fail", e);
        OAuthClient {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: String::new(),
        }
    });
    let service = RotationService::open(&data_dir, oauth).context("Failed to open rotator")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run(&service).await,
        Commands::Account(cmd) => commands::handle_account_command(&service, cmd).await,
        Commands::Switch { identifier } => commands::switch(&service, &identifier).await,
        Commands::Poll => commands::poll(&service).await,
        Commands::AutoSwitch { on, off } => commands::auto_switch(&service, on, off).await,
        Commands::Config { json } => commands::show_config(&service, json),
    }
}
