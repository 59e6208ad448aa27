//! `voltdesk doctor` — Diagnose configuration and data files.

use std::path::Path;

use voltdesk_config::AppConfig;
use voltdesk_scorer::AnomalyModel;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 VoltDesk Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = Path::new("voltdesk.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — run `voltdesk onboard` (using defaults)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue found. Fix the config before anything else.");
            return Ok(());
        }
    };

    // Signing keys
    if config
        .auth
        .access_keys
        .iter()
        .any(|k| k.starts_with("insecure-dev-"))
    {
        println!("  ⚠️  Development signing keys in use — set auth.access_keys");
        issues += 1;
    } else {
        println!("  ✅ Signing keys configured");
    }

    // Database
    if config.database.url == ":memory:" || Path::new(&config.database.url).exists() {
        println!("  ✅ Database present: {}", config.database.url);
    } else {
        println!(
            "  ⚠️  Database not found at {} — run `voltdesk migrate`",
            config.database.url
        );
        issues += 1;
    }

    // Anomaly model
    match AnomalyModel::load(Path::new(&config.scorer.model_path)) {
        Ok(Some(_)) => println!("  ✅ Anomaly model loads: {}", config.scorer.model_path),
        Ok(None) => {
            println!(
                "  ⚠️  No anomaly model at {} — telemetry scoring will be disabled",
                config.scorer.model_path
            );
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Anomaly model broken: {e}");
            issues += 1;
        }
    }

    // Notification senders
    if config.email.smtp_host.is_some() || config.sms.account_sid.is_some() {
        println!("  ✅ At least one reset-token sender configured");
    } else {
        println!("  ⚠️  No email or SMS sender — reset tokens cannot be delivered");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
