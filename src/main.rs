use lead_outreach::config::Config;
use lead_outreach::pipeline;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point: runs the outreach pipeline once.
///
/// Loads configuration from the environment (and `.env`), reads the lead
/// tab, processes every pending lead and writes the results.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok when the run completes, even if some leads
///   could not be enriched or written; an error only for fatal setup failures.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_outreach=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let summary = pipeline::run(&config).await?;
    if summary.processed == 0 {
        tracing::warn!("⚠ No leads were processed");
    }

    Ok(())
}
