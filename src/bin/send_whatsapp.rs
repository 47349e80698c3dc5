//! Utility to send the messages in the output tab through WhatsApp Web.
//!
//! Opens Chrome with a persistent profile (`WHATSAPP_PROFILE_DIR`); the first
//! run needs the QR code scanned. Each lead's outreach status is updated to
//! `sent` or `failed` in both the output tab and the lead tab.

use lead_outreach::browser::BrowserOptions;
use lead_outreach::config::Config;
use lead_outreach::sheets::SheetsClient;
use lead_outreach::sink::outbox_from_values;
use lead_outreach::source::load_leads;
use lead_outreach::whatsapp::{send_pending, ChatDriver, ChromeChat};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_outreach=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let Some(outbox_tab) = config.output_tab.clone() else {
        anyhow::bail!("OUTPUT_TAB must name the tab holding the messages to send");
    };

    let (client, _) = SheetsClient::connect(&config).await?;
    let (source, _) = load_leads(&client, &config.source_tabs()).await?;
    let outbox = outbox_from_values(&client.read_tab(&outbox_tab).await?);
    if outbox.is_empty() {
        tracing::warn!("⚠ No messages in '{}'", outbox_tab);
        return Ok(());
    }
    tracing::info!("{} messages in '{}'", outbox.len(), outbox_tab);

    let options = BrowserOptions::for_whatsapp(&config);
    let timeout = config.navigation_timeout;
    let chat = tokio::task::spawn_blocking(move || ChromeChat::open(&options, timeout)).await??;
    let driver: Arc<dyn ChatDriver> = Arc::new(chat);

    let summary = send_pending(&config, &client, &source, &outbox_tab, &outbox, driver).await;
    println!(
        "Sent {}, failed {}, skipped {}",
        summary.sent, summary.failed, summary.skipped
    );

    Ok(())
}
