//! Utility to export outreach messages as a CSV for bulk WhatsApp tools.
//!
//! Runs the pipeline without browser enrichment and without touching the
//! output tab; every message goes to `CSV_OUTPUT_PATH`
//! (default `whatsapp_leads.csv`).

use lead_outreach::config::Config;
use lead_outreach::pipeline;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CSV_PATH: &str = "whatsapp_leads.csv";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_outreach=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env()?;
    config.enrich = false;
    config.output_tab = None;
    let path = config
        .csv_output_path
        .get_or_insert_with(|| PathBuf::from(DEFAULT_CSV_PATH))
        .clone();

    let summary = pipeline::run(&config).await?;
    println!(
        "Exported {} messages to {} ({} skipped)",
        summary.processed,
        path.display(),
        summary.skipped
    );

    Ok(())
}
