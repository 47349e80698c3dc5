//! Result sinks: the output sheet tab and CSV exports for bulk WhatsApp tools.

use crate::errors::{AppError, ResultExt};
use crate::models::{Lead, OutreachStatus, ProcessedLead};
use crate::sheets::{column_letter, SheetsClient, TabValues};
use crate::source::{HeaderMap, LeadField, LoadedLeads, OUTREACH_STATUS_HEADER};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column layout of the output tab.
pub const OUTPUT_HEADER: &[&str] = &[
    "ID",
    "Negocio",
    "Contacto",
    "Teléfono",
    "WhatsApp",
    "Sitio web",
    "Tipo de negocio",
    "Puntos de dolor",
    "Servicios",
    "Prioridad",
    "Confianza",
    "Resumen de análisis",
    "Mensaje",
    "Origen",
    "Estado",
    "Huella",
    "Procesado",
];

const COL_ID: usize = 0;
const COL_BUSINESS: usize = 1;
const COL_PHONE: usize = 3;
const COL_MESSAGE: usize = 12;
const COL_STATUS: usize = 14;

/// Render one processed lead as an output-tab row.
pub fn output_row(processed: &ProcessedLead, processed_at: DateTime<Utc>) -> Vec<String> {
    let lead = &processed.lead;
    let classification = &processed.classification;
    let phone = lead.normalized_phone();

    vec![
        lead.id.clone(),
        lead.business_name.clone(),
        lead.contact_name.clone().unwrap_or_default(),
        phone.clone(),
        crate::contact::wa_me_link(&phone),
        lead.website.clone().unwrap_or_default(),
        classification.business_type.as_str().to_string(),
        classification.pain_points.join("; "),
        classification
            .services
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        classification.priority.as_str().to_string(),
        classification.confidence.to_string(),
        processed.enrichment.summary(),
        processed.message.text.clone(),
        processed.message.source.as_str().to_string(),
        OutreachStatus::Ready.as_str().to_string(),
        processed.message.fingerprint(),
        processed_at.to_rfc3339(),
    ]
}

/// Appends processed leads to the output tab.
pub struct SheetSink<'a> {
    client: &'a SheetsClient,
    tab: String,
}

impl<'a> SheetSink<'a> {
    /// Make `tab` ready for a new run: create it when absent, otherwise clear
    /// it. Either way the header row is rewritten.
    pub async fn prepare(
        client: &'a SheetsClient,
        tab: &str,
        existing_tabs: &[String],
    ) -> Result<SheetSink<'a>, AppError> {
        if existing_tabs.iter().any(|t| t == tab) {
            client
                .clear_tab(tab)
                .await
                .with_context(|| format!("Resetting output tab '{}'", tab))?;
        } else {
            client
                .add_tab(tab)
                .await
                .with_context(|| format!("Creating output tab '{}'", tab))?;
        }

        let header: Vec<String> = OUTPUT_HEADER.iter().map(|h| h.to_string()).collect();
        client
            .write_range(tab, "A1", &[header])
            .await
            .with_context(|| format!("Writing header to '{}'", tab))?;

        tracing::info!("✓ Output tab '{}' ready", tab);
        Ok(Self {
            client,
            tab: tab.to_string(),
        })
    }

    pub async fn write(&self, processed: &ProcessedLead) -> Result<(), AppError> {
        let row = output_row(processed, Utc::now());
        self.client
            .append_rows(&self.tab, &[row])
            .await
            .with_context(|| format!("Writing row for lead {}", processed.lead.id))
    }
}

/// Set a lead's outreach status in the source tab.
///
/// A source tab without a status column gets an `Outreach Status` header in
/// its first free column, so the outcome is never dropped.
pub async fn update_outreach_status(
    client: &SheetsClient,
    source: &LoadedLeads,
    lead: &Lead,
    status: OutreachStatus,
) -> Result<bool, AppError> {
    let existing = HeaderMap::from_header(&source.header)
        .index_of(LeadField::OutreachStatus)
        .and_then(|i| source.header.get(i));

    let mut header = source.header.clone();
    let column = match existing {
        Some(column) => column.clone(),
        None => {
            let cell = format!("{}1", column_letter(header.len()));
            client
                .write_range(&source.tab, &cell, &[vec![OUTREACH_STATUS_HEADER.to_string()]])
                .await
                .with_context(|| format!("Adding status column to '{}'", source.tab))?;
            tracing::debug!("Added '{}' column at {} in '{}'", OUTREACH_STATUS_HEADER, cell, source.tab);
            header.push(OUTREACH_STATUS_HEADER.to_string());
            OUTREACH_STATUS_HEADER.to_string()
        }
    };

    let written = client
        .update_row_fields(
            &source.tab,
            &header,
            lead.row_number,
            &[(column.as_str(), status.as_str().to_string())],
        )
        .await
        .with_context(|| format!("Updating outreach status of lead {}", lead.id))?;

    if written > 0 {
        tracing::info!("✓ Lead {} marked '{}'", lead.id, status.as_str());
    }
    Ok(written > 0)
}

/// A message waiting in the output tab.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    /// 1-based row in the output tab.
    pub row_number: usize,
    pub lead_id: String,
    pub business_name: String,
    pub phone: String,
    pub message: String,
    pub status: OutreachStatus,
}

/// Read back the rows written by [`SheetSink`], skipping rows with no
/// phone or message.
pub fn outbox_from_values(values: &TabValues) -> Vec<OutboxEntry> {
    let cell = |row: &[String], i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();

    values
        .rows
        .iter()
        .enumerate()
        .filter_map(|(offset, row)| {
            let entry = OutboxEntry {
                row_number: offset + 2,
                lead_id: cell(row, COL_ID),
                business_name: cell(row, COL_BUSINESS),
                phone: cell(row, COL_PHONE),
                message: cell(row, COL_MESSAGE),
                status: OutreachStatus::parse(&cell(row, COL_STATUS)),
            };
            (!entry.phone.is_empty() && !entry.message.is_empty()).then_some(entry)
        })
        .collect()
}

/// Record a send outcome on the output tab row.
pub async fn mark_outbox_entry(
    client: &SheetsClient,
    tab: &str,
    entry: &OutboxEntry,
    status: OutreachStatus,
) -> Result<(), AppError> {
    let header: Vec<String> = OUTPUT_HEADER.iter().map(|h| h.to_string()).collect();
    client
        .update_row_fields(
            tab,
            &header,
            entry.row_number,
            &[(OUTPUT_HEADER[COL_STATUS], status.as_str().to_string())],
        )
        .await?;
    Ok(())
}

/// Row shape for bulk WhatsApp tools.
#[derive(Debug, Serialize)]
pub struct CsvRow<'a> {
    pub name: &'a str,
    pub phone: String,
    pub whatsapp_link: String,
    pub message: &'a str,
    pub business_type: &'a str,
    pub priority: &'a str,
    pub website: &'a str,
    pub contact: &'a str,
}

impl<'a> CsvRow<'a> {
    pub fn from_processed(processed: &'a ProcessedLead) -> Self {
        let phone = processed.lead.normalized_phone();
        Self {
            name: processed.lead.display_name(),
            whatsapp_link: crate::contact::wa_me_link(&phone),
            phone,
            message: &processed.message.text,
            business_type: processed.classification.business_type.as_str(),
            priority: processed.classification.priority.as_str(),
            website: processed.lead.website.as_deref().unwrap_or_default(),
            contact: processed.lead.contact_name.as_deref().unwrap_or_default(),
        }
    }
}

/// Streams rows into a CSV file with a header line.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("Creating CSV {}", path.display()))?;
        tracing::info!("Writing CSV to {}", path.display());
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> Self {
        let writer = csv::WriterBuilder::new().has_headers(true).from_writer(inner);
        Self { writer, rows: 0 }
    }

    pub fn write(&mut self, processed: &ProcessedLead) -> Result<(), AppError> {
        self.writer.serialize(CsvRow::from_processed(processed))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and hand back the underlying writer with the row count.
    pub fn finish(self) -> Result<(W, usize), AppError> {
        let rows = self.rows;
        let inner = self
            .writer
            .into_inner()
            .map_err(|e| AppError::Csv(format!("Flushing CSV failed: {}", e)))?;
        Ok((inner, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::models::{EnrichmentResult, Message, MessageSource};

    fn processed() -> ProcessedLead {
        let lead = Lead {
            id: "L7".to_string(),
            row_number: 8,
            business_name: "Restaurante El Sabor".to_string(),
            contact_name: Some("Ana".to_string()),
            phone: "998 123 4567".to_string(),
            website: None,
            industry: Some("food".to_string()),
            qualification: Some("hot".to_string()),
            outreach_status: OutreachStatus::Unset,
        };
        let enrichment = EnrichmentResult::from_lead(&lead);
        let classification = classify(&lead, &enrichment);
        ProcessedLead {
            message: Message {
                lead_id: lead.id.clone(),
                text: "Hola, \"equipo\"\nSaludos".to_string(),
                source: MessageSource::Template,
            },
            lead,
            enrichment,
            classification,
        }
    }

    #[test]
    fn test_output_row_matches_header() {
        let row = output_row(&processed(), Utc::now());
        assert_eq!(row.len(), OUTPUT_HEADER.len());
        assert_eq!(row[COL_ID], "L7");
        assert_eq!(row[COL_PHONE], "529981234567");
        assert_eq!(row[4], "https://wa.me/529981234567");
        assert_eq!(row[6], "restaurant");
        assert_eq!(row[COL_STATUS], "ready");
        assert_eq!(row[13], "template");
    }

    #[test]
    fn test_outbox_round_trips_output_rows() {
        let row = output_row(&processed(), Utc::now());
        let values = TabValues {
            header: OUTPUT_HEADER.iter().map(|h| h.to_string()).collect(),
            rows: vec![row, vec!["L8".to_string(), "Sin teléfono".to_string()]],
        };
        let outbox = outbox_from_values(&values);

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].row_number, 2);
        assert_eq!(outbox[0].lead_id, "L7");
        assert_eq!(outbox[0].status, OutreachStatus::Ready);
    }

    #[test]
    fn test_csv_sink_quotes_multiline_messages() {
        let mut sink = CsvSink::from_writer(Vec::new());
        sink.write(&processed()).unwrap();
        let (bytes, rows) = sink.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(rows, 1);
        assert!(text.starts_with(
            "name,phone,whatsapp_link,message,business_type,priority,website,contact\n"
        ));
        assert!(text.contains("\"Hola, \"\"equipo\"\"\nSaludos\""));
        assert!(text.contains("529981234567,https://wa.me/529981234567"));
    }

    #[test]
    fn test_csv_sink_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("lead-outreach-{}", uuid::Uuid::new_v4()));
        let path = dir.join("out").join("leads.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        sink.write(&processed()).unwrap();
        sink.finish().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().next().unwrap().split(',').count(), 8);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
