//! Utility to inspect the spreadsheet: lists its tabs and shows how each
//! tab's header maps onto lead fields.

use lead_outreach::config::Config;
use lead_outreach::sheets::SheetsClient;
use lead_outreach::source::{leads_from_values, HeaderMap};

/// Main entry point for the sheet inspection utility.
///
/// Connects with the configured credentials and prints one block per tab.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_outreach=warn".into()),
        )
        .init();

    let config = Config::from_env()?;
    let (client, tabs) = SheetsClient::connect(&config).await?;

    println!("Found {} tabs:", tabs.len());
    for tab in &tabs {
        println!("- {}", tab);

        let values = match client.read_tab(tab).await {
            Ok(values) => values,
            Err(e) => {
                println!("  (unreadable: {})", e);
                continue;
            }
        };

        let map = HeaderMap::from_header(&values.header);
        for (field, index) in map.mapped_fields() {
            println!("  - {:?} ← column {} '{}'", field, index + 1, values.header[index]);
        }
        let unmapped: Vec<&str> = values
            .header
            .iter()
            .filter(|h| lead_outreach::source::match_header(h).is_none())
            .map(String::as_str)
            .collect();
        if !unmapped.is_empty() {
            println!("  unmapped: {}", unmapped.join(", "));
        }
        println!(
            "  {} data rows, {} usable leads",
            values.rows.len(),
            leads_from_values(&values).len()
        );
        println!();
    }

    Ok(())
}
