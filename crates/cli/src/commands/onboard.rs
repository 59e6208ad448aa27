//! `voltdesk onboard` — First-time setup.

use std::path::Path;

use voltdesk_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("⚡ VoltDesk — First-Time Setup");
    println!("==============================\n");

    let config_path = Path::new("voltdesk.toml");
    if config_path.exists() {
        println!("  Config file exists: {}", config_path.display());
    } else {
        std::fs::write(config_path, AppConfig::default_toml())?;
        println!("✅ Created {}", config_path.display());
    }

    let config = AppConfig::load_from(config_path)?;

    let model_path = Path::new(&config.scorer.model_path);
    if let Some(model_dir) = model_path.parent()
        && !model_dir.as_os_str().is_empty()
        && !model_dir.exists()
    {
        std::fs::create_dir_all(model_dir)?;
        println!("✅ Created model directory: {}", model_dir.display());
    }

    println!("\nNext steps:");
    println!("  1. Edit voltdesk.toml — set auth keys and SMTP/SMS credentials");
    println!("  2. voltdesk migrate");
    println!("  3. voltdesk serve");

    Ok(())
}
