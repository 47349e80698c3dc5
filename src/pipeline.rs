//! Orchestration: read leads, enrich, classify, compose, write.
//!
//! Leads are processed one at a time in source order with a fixed pause
//! between them. Per-lead problems never stop the run; only configuration
//! errors, the initial spreadsheet connection and the lead read are fatal.

use crate::browser::{BrowserOptions, ChromeFetcher, PageFetcher};
use crate::classifier::classify;
use crate::config::Config;
use crate::llm::LlmClient;
use crate::message::compose_message;
use crate::models::{EnrichmentResult, Lead, MessageSource, OutreachStatus, ProcessedLead};
use crate::probe::Prober;
use crate::sheets::SheetsClient;
use crate::sink::{CsvSink, SheetSink};
use crate::source::load_leads;
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub read: usize,
    pub skipped: usize,
    pub processed: usize,
    pub enriched: usize,
    pub llm_messages: usize,
    pub rows_written: usize,
    pub write_failures: usize,
}

/// Leads already contacted are never processed again; `ready` ones only
/// when `skip_ready` is set.
pub fn should_skip(lead: &Lead, skip_ready: bool) -> bool {
    match lead.outreach_status {
        OutreachStatus::Sent => true,
        OutreachStatus::Ready => skip_ready,
        OutreachStatus::Unset | OutreachStatus::Failed => false,
    }
}

/// Enrich (when a prober is given), classify and compose for one lead.
pub async fn process_lead(
    lead: &Lead,
    prober: Option<&Prober>,
    llm: Option<&LlmClient>,
) -> ProcessedLead {
    let enrichment = match prober {
        Some(prober) => prober.enrich(lead).await,
        None => EnrichmentResult::from_lead(lead),
    };
    let classification = classify(lead, &enrichment);
    let message = compose_message(lead, &enrichment, &classification, llm).await;

    tracing::debug!(
        "Lead {} classified as {} (priority {}, confidence {})",
        lead.id,
        classification.business_type,
        classification.priority.as_str(),
        classification.confidence
    );

    ProcessedLead {
        lead: lead.clone(),
        enrichment,
        classification,
        message,
    }
}

/// Where processed leads go. Both sinks are optional.
pub struct Sinks<'a, W: Write> {
    pub sheet: Option<SheetSink<'a>>,
    pub csv: Option<CsvSink<W>>,
}

/// Process `leads` in order, writing each result as soon as it is ready.
pub async fn process_leads<W: Write>(
    config: &Config,
    leads: &[Lead],
    prober: Option<&Prober>,
    llm: Option<&LlmClient>,
    sinks: &mut Sinks<'_, W>,
) -> (RunSummary, Vec<ProcessedLead>) {
    let mut summary = RunSummary {
        read: leads.len(),
        ..Default::default()
    };
    let mut results = Vec::new();

    for lead in leads {
        if should_skip(lead, config.skip_ready) {
            tracing::debug!("Skipping lead {} (status '{}')", lead.id, lead.outreach_status.as_str());
            summary.skipped += 1;
            continue;
        }
        if let Some(max) = config.max_leads {
            if summary.processed >= max {
                tracing::info!("Reached MAX_LEADS={}, stopping", max);
                break;
            }
        }
        if summary.processed > 0 && !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }

        tracing::info!(
            "[{}/{}] Processing {} ({})",
            summary.processed + 1,
            leads.len(),
            lead.display_name(),
            lead.id
        );
        let processed = process_lead(lead, prober, llm).await;
        summary.processed += 1;
        if processed.enrichment.website_checked || processed.enrichment.map_checked {
            summary.enriched += 1;
        }
        if processed.message.source == MessageSource::Llm {
            summary.llm_messages += 1;
        }

        if let Some(sheet) = &sinks.sheet {
            match sheet.write(&processed).await {
                Ok(()) => summary.rows_written += 1,
                Err(e) => {
                    tracing::error!("❌ {}", e);
                    summary.write_failures += 1;
                }
            }
        }
        if let Some(csv) = sinks.csv.as_mut() {
            if let Err(e) = csv.write(&processed) {
                tracing::error!("❌ CSV row for {} failed: {}", lead.id, e);
                summary.write_failures += 1;
            }
        }

        results.push(processed);
    }

    (summary, results)
}

fn build_prober(config: &Config) -> Option<Prober> {
    if !config.enrich {
        tracing::info!("Enrichment disabled");
        return None;
    }
    match ChromeFetcher::launch(&BrowserOptions::for_probe(config)) {
        Ok(fetcher) => {
            let fetcher: Arc<dyn PageFetcher> = Arc::new(fetcher);
            Some(Prober::new(fetcher, config))
        }
        Err(e) => {
            tracing::warn!("⚠ {}. Continuing without enrichment", e);
            None
        }
    }
}

fn build_llm(config: &Config) -> Option<LlmClient> {
    let llm_config = config.llm.as_ref()?;
    match LlmClient::new(llm_config) {
        Ok(client) => {
            tracing::info!("✓ LLM client ready");
            Some(client)
        }
        Err(e) => {
            tracing::warn!("⚠ {}. Using templates only", e);
            None
        }
    }
}

/// Run the whole pipeline with the settings in `config`.
pub async fn run(config: &Config) -> anyhow::Result<RunSummary> {
    let run_id = Uuid::new_v4();
    tracing::info!("Starting outreach run {}", run_id);

    let (client, tabs) = SheetsClient::connect(config).await?;
    let (loaded, report) = load_leads(&client, &config.source_tabs()).await?;
    tracing::debug!("Lead tab selection: {}", report);

    let prober = build_prober(config);
    let llm = build_llm(config);

    let sheet = match config.output_tab.as_deref() {
        Some(tab) => match SheetSink::prepare(&client, tab, &tabs).await {
            Ok(sink) => Some(sink),
            Err(e) => {
                tracing::error!("❌ {}. Results will not be written to the sheet", e);
                None
            }
        },
        None => None,
    };
    let csv = match config.csv_output_path.as_deref() {
        Some(path) => match CsvSink::create(path) {
            Ok(sink) => Some(sink),
            Err(e) => {
                tracing::error!("❌ {}", e);
                None
            }
        },
        None => None,
    };
    let mut sinks = Sinks { sheet, csv };

    let (mut summary, _) =
        process_leads(config, &loaded.leads, prober.as_ref(), llm.as_ref(), &mut sinks).await;

    if let Some(csv) = sinks.csv.take() {
        match csv.finish() {
            Ok((_, rows)) => tracing::info!("✓ CSV export finished ({} rows)", rows),
            Err(e) => {
                tracing::error!("❌ {}", e);
                summary.write_failures += 1;
            }
        }
    }

    log_summary(run_id, &summary);
    Ok(summary)
}

pub fn log_summary(run_id: Uuid, summary: &RunSummary) {
    tracing::info!(
        "Run {} done: {} read, {} skipped, {} processed, {} enriched, {} LLM messages, {} rows written, {} write failures",
        run_id,
        summary.read,
        summary.skipped,
        summary.processed,
        summary.enriched,
        summary.llm_messages,
        summary.rows_written,
        summary.write_failures
    );
    if summary.write_failures > 0 {
        tracing::warn!("⚠ {} rows could not be written", summary.write_failures);
    }
}
