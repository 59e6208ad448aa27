//! `voltdesk migrate` — Create or update the database schema.

use voltdesk_config::AppConfig;
use voltdesk_store::SqliteStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🔄 Migrating database at {}", config.database.url);

    let store = SqliteStore::new(&config.database.url).await?;
    store.run_migrations().await?;

    println!("✅ Schema is up to date");
    Ok(())
}
