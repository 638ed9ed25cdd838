//! One-shot overdue sweep
//!
//! Marks overdue boletos and receivables for every active store, notifies
//! the customers and flushes deferred WhatsApp messages, then exits.
//! Meant for cron when the API runs with `API_OVERDUE_SWEEP_INTERVAL_SECS=0`.
//!
//! ```bash
//! 0 6 * * * API_DATABASE_URL=postgres://... overdue-sweep
//! ```

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use infra_db::{create_pool, DatabaseConfig};
use interface_api::config::ApiConfig;
use interface_api::jobs::OverdueJob;
use interface_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API configuration")?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let pool = create_pool(DatabaseConfig::for_sweep(config.database_url.clone()))
        .await
        .context("cannot connect to the database")?;
    let state = AppState::new(pool, config).context("cannot initialise application state")?;

    let report = OverdueJob::new(state, Duration::ZERO).run_once(Utc::now()).await?;
    tracing::info!(marked = report.total_marked(), skipped = report.skipped, "sweep complete");
    Ok(())
}
