use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use rotator_core::RotationService;

use crate::account_commands;
use crate::cli::AccountCommands;

pub async fn handle_account_command(service: &RotationService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::List { json } => account_commands::list_accounts(service, json).await,
        AccountCommands::Add { code } => account_commands::add_account(service, &code).await,
        AccountCommands::Remove { identifier } => {
            account_commands::remove_account(service, &identifier).await
        },
        AccountCommands::Refresh { identifier } => {
            account_commands::refresh_quota(service, &identifier).await
        },
    }
}

/// Startup poll, then the timer, until Ctrl-C.
pub async fn run(service: &RotationService) -> Result<()> {
    info!("Cloud Rotator v{} starting", env!("CARGO_PKG_VERSION"));
    let _startup = service.init();
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    service.shutdown();
    Ok(())
}

pub async fn switch(service: &RotationService, identifier: &str) -> Result<()> {
    let account = account_commands::find_account(service, identifier).await?;
    println!("{}", format!("Switching to {}...", account.email).cyan());
    let switched = service.switch_cloud_account(&account.id).await?;
    println!("{} Active account: {}", "✓".green(), switched.email.green());
    Ok(())
}

pub async fn poll(service: &RotationService) -> Result<()> {
    if service.force_poll_cloud_monitor().await {
        println!("{} Quota poll finished", "✓".green());
    } else {
        println!("{}", "A poll is already running".yellow());
    }
    account_commands::list_accounts(service, false).await
}

pub async fn auto_switch(service: &RotationService, on: bool, off: bool) -> Result<()> {
    if on || off {
        // The runtime ends with this command, so the poll enabling starts is awaited here.
        if let Some(poll) = service.set_auto_switch_enabled(on).await? {
            if poll.await.context("Auto-switch poll panicked")? {
                println!("{} Quota poll finished", "✓".green());
            }
        }
    }
    let enabled = service.get_auto_switch_enabled().await?;
    let state = if enabled { "enabled".green() } else { "disabled".yellow() };
    println!("Auto-switch: {state}");
    Ok(())
}

pub fn show_config(service: &RotationService, json: bool) -> Result<()> {
    let config = service.config();
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }
    println!("{}", "Cloud Rotator Configuration".cyan().bold());
    println!("  Poll interval:     {}s", config.monitor.poll_interval_secs);
    println!("  Focus debounce:    {}s", config.monitor.focus_debounce_secs);
    println!("  Warning threshold: {}%", config.notifications.warning_threshold());
    println!("  Switch threshold:  {}%", config.notifications.switch_threshold());
    println!("  Notifications:     {}", config.notifications.enabled);
    println!("  Exit timeout:      {}s", config.switch.exit_timeout_secs);
    println!("  Target:            {}", config.target.display_name);
    Ok(())
}
