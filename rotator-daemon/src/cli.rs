use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rotator",
    about = "Cloud Rotator - keeps the target application on an account with quota left",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "ROTATOR_DATA_DIR", help = "Override the data directory")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the quota monitor until Ctrl-C (default if no command specified)")]
    Run,

    #[command(subcommand, about = "Manage cloud accounts")]
    Account(AccountCommands),

    #[command(about = "Switch the target application to an account")]
    Switch {
        #[arg(help = "Email or account ID")]
        identifier: String,
    },

    #[command(about = "Poll quota for every account once")]
    Poll,

    #[command(about = "Show or change the auto-switch flag")]
    AutoSwitch {
        #[arg(long, conflicts_with = "off", help = "Enable auto-switch")]
        on: bool,

        #[arg(long, conflicts_with = "on", help = "Disable auto-switch")]
        off: bool,
    },

    #[command(about = "Show the active configuration")]
    Config {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    #[command(about = "List all accounts with quota status")]
    List {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Add an account from an OAuth authorization code")]
    Add {
        #[arg(help = "Authorization code from the OAuth redirect")]
        code: String,
    },

    #[command(about = "Remove an account")]
    Remove {
        #[arg(help = "Email or account ID to remove")]
        identifier: String,
    },

    #[command(about = "Refresh quota for an account")]
    Refresh {
        #[arg(help = "Email or account ID (or 'all' for all accounts)")]
        identifier: String,
    },
}
