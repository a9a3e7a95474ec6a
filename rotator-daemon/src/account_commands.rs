use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use rotator_core::RotationService;
use rotator_types::{AccountStatus, CloudAccount};

pub async fn find_account(service: &RotationService, identifier: &str) -> Result<CloudAccount> {
    let accounts = service.list_accounts().await?;
    accounts
        .into_iter()
        .find(|a| a.email == identifier || a.id == identifier)
        .context("Account not found")
}

pub async fn list_accounts(service: &RotationService, json: bool) -> Result<()> {
    let accounts = service.list_accounts().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!("{}", "No accounts found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["", "Email", "Name", "Gemini", "Claude", "Average", "Status"]);

    for acc in &accounts {
        let status = match acc.status {
            AccountStatus::Active => Cell::new("Active").fg(Color::Green),
            AccountStatus::RateLimited => Cell::new("Rate limited").fg(Color::Yellow),
            AccountStatus::Expired => Cell::new("Expired").fg(Color::Red),
        };
        let average =
            if acc.quota.is_some() { format!("{:.1}%", acc.average_quota()) } else { "-".to_string() };

        table.add_row(vec![
            Cell::new(if acc.is_active { "*" } else { "" }),
            Cell::new(&acc.email),
            Cell::new(acc.display_name()),
            Cell::new(get_quota(acc, "gemini")),
            Cell::new(get_quota(acc, "claude")),
            Cell::new(average),
            status,
        ]);
    }

    println!("{table}");
    println!("\n{} accounts total", accounts.len());
    Ok(())
}

fn get_quota(acc: &CloudAccount, model: &str) -> String {
    acc.quota
        .as_ref()
        .and_then(|q| q.get_model_quota(model))
        .map_or_else(|| "-".to_string(), |m| format!("{}%", m.percentage))
}

pub async fn add_account(service: &RotationService, code: &str) -> Result<()> {
    println!("{}", "Exchanging authorization code...".cyan());
    let acc = service.add_account_from_code(code).await?;
    let note = if acc.is_active { " (active)" } else { "" };
    println!("{} Account added: {}{}", "✓".green(), acc.email.green(), note);
    Ok(())
}

pub async fn remove_account(service: &RotationService, identifier: &str) -> Result<()> {
    let acc = find_account(service, identifier).await?;
    service.delete_account(&acc.id).await?;
    println!("{} Account removed: {}", "✓".green(), acc.email.green());
    if acc.is_active {
        println!("{}", "No account is active until the next switch.".yellow());
    }
    Ok(())
}

pub async fn refresh_quota(service: &RotationService, identifier: &str) -> Result<()> {
    if identifier == "all" {
        return refresh_all_quotas(service).await;
    }
    let acc = find_account(service, identifier).await?;
    println!("{}", format!("Refreshing quota for {}...", acc.email).cyan());
    let acc = service.refresh_account_quota(&acc.id).await?;
    println!(
        "{} Quota refreshed for {} ({:.1}% average)",
        "✓".green(),
        acc.email.green(),
        acc.average_quota()
    );
    Ok(())
}

async fn refresh_all_quotas(service: &RotationService) -> Result<()> {
    let accounts = service.list_accounts().await?;
    let total = accounts.len();
    let mut success = 0;
    let mut failed = 0;

    for acc in accounts {
        print!("Refreshing {}... ", acc.email);
        match service.refresh_account_quota(&acc.id).await {
            Ok(_) => {
                println!("{}", "✓".green());
                success += 1;
            },
            Err(e) => {
                println!("{} ({})", "✗".red(), e);
                failed += 1;
            },
        }
    }
    println!("\n{}/{} accounts refreshed ({} failed)", success, total, failed);
    Ok(())
}
