//! Load the demo catalogue
//!
//! Usage: cargo run --bin seed [YYYY-MM-DD]
//!
//! Creates the schema if needed, wipes existing rows and inserts the demo
//! partners, hotels, room rates and stored offers. Rates check in on the
//! given date (default: tomorrow) so searches from today find them.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use tracing::info;

use stayra::config::AppConfig;
use stayra::storage::{seed::seed_demo, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    stayra::init_tracing(config.log.json);

    let checkin = match std::env::args().nth(1) {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid check-in date {:?}", raw))?,
        None => Utc::now().date_naive() + Duration::days(1),
    };

    let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    store.migrate().await.context("Failed to apply migrations")?;

    info!(url = %config.database.url, %checkin, "Seeding demo data");
    let summary = seed_demo(&store, checkin).await.context("Seeding failed")?;

    info!(
        "Seeded {} partners, {} hotels, {} room types, {} rates, {} offers",
        summary.partners, summary.hotels, summary.room_types, summary.rates, summary.offers
    );
    Ok(())
}
