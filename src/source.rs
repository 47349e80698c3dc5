//! Lead source adapter: maps spreadsheet rows onto typed [`Lead`] records.
//!
//! Headers are matched once, case- and accent-insensitively, against alias
//! lists; the rest of the crate never sees raw rows.

use crate::contact::fold_text;
use crate::errors::AppError;
use crate::models::{Lead, OutreachStatus};
use crate::ranked::{AttemptOutcome, ProbeReport};
use crate::sheets::{SheetsClient, TabValues};

/// Internal lead fields a column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    Id,
    BusinessName,
    ContactName,
    Phone,
    Website,
    Industry,
    Qualification,
    OutreachStatus,
}

/// Header aliases, already folded. Checked in this order.
const HEADER_ALIASES: &[(LeadField, &[&str])] = &[
    (LeadField::Id, &["id", "lead id", "lead_id", "folio"]),
    (
        LeadField::BusinessName,
        &[
            "business name", "business", "nombre del negocio", "negocio", "nombre", "name",
            "empresa", "company", "title", "titulo", "razon social",
        ],
    ),
    (
        LeadField::ContactName,
        &["contact name", "contact", "contacto", "owner", "dueno", "propietario", "responsable"],
    ),
    (
        LeadField::Phone,
        &[
            "phone", "phone number", "telefono", "tel", "celular", "whatsapp", "movil", "numero",
        ],
    ),
    (
        LeadField::Website,
        &["website", "web", "sitio web", "sitio", "pagina web", "url", "site"],
    ),
    (
        LeadField::Industry,
        &["industry", "category", "categoria", "giro", "rubro", "sector", "tipo"],
    ),
    (
        LeadField::Qualification,
        &[
            "qualification", "status", "lead status", "calificacion", "estado", "tag", "etiqueta",
            "temperatura",
        ],
    ),
    (
        LeadField::OutreachStatus,
        &[
            "outreach status", "outreach", "estado de envio", "estado envio", "envio",
            "message status", "mensaje enviado",
        ],
    ),
];

/// Column header written for the outreach status when updating a source row.
pub const OUTREACH_STATUS_HEADER: &str = "Outreach Status";

fn normalize_header(raw: &str) -> String {
    fold_text(raw)
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which lead field a header maps to, if any.
pub fn match_header(raw: &str) -> Option<LeadField> {
    let normalized = normalize_header(raw);
    HEADER_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&normalized.as_str()))
        .map(|(field, _)| *field)
}

/// Column index per lead field. The first matching column wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    columns: Vec<(LeadField, usize)>,
}

impl HeaderMap {
    pub fn from_header(header: &[String]) -> Self {
        let mut columns: Vec<(LeadField, usize)> = Vec::new();
        for (index, name) in header.iter().enumerate() {
            if let Some(field) = match_header(name) {
                if !columns.iter().any(|(f, _)| *f == field) {
                    columns.push((field, index));
                }
            }
        }
        Self { columns }
    }

    pub fn index_of(&self, field: LeadField) -> Option<usize> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, i)| *i)
    }

    /// Trimmed cell for `field`, empty when the column or cell is missing.
    pub fn get<'a>(&self, row: &'a [String], field: LeadField) -> &'a str {
        self.index_of(field)
            .and_then(|i| row.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    pub fn mapped_fields(&self) -> Vec<(LeadField, usize)> {
        self.columns.clone()
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Map tab values to leads, dropping rows without a business name and phone.
pub fn leads_from_values(values: &TabValues) -> Vec<Lead> {
    let map = HeaderMap::from_header(&values.header);
    let mut leads = Vec::new();
    let mut dropped = 0;

    for (offset, row) in values.rows.iter().enumerate() {
        // Header is row 1
        let row_number = offset + 2;
        let business_name = map.get(row, LeadField::BusinessName);
        let phone = map.get(row, LeadField::Phone);

        if business_name.is_empty() && phone.is_empty() {
            dropped += 1;
            continue;
        }

        let id = match map.get(row, LeadField::Id) {
            "" => format!("row-{}", row_number),
            id => id.to_string(),
        };

        leads.push(Lead {
            id,
            row_number,
            business_name: business_name.to_string(),
            contact_name: optional(map.get(row, LeadField::ContactName)),
            phone: phone.to_string(),
            website: optional(map.get(row, LeadField::Website)),
            industry: optional(map.get(row, LeadField::Industry)),
            qualification: optional(map.get(row, LeadField::Qualification)),
            outreach_status: OutreachStatus::parse(map.get(row, LeadField::OutreachStatus)),
        });
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} rows without business name or phone", dropped);
    }
    leads
}

/// Leads read from a tab, plus which tab and the header it had.
#[derive(Debug, Clone)]
pub struct LoadedLeads {
    pub tab: String,
    pub header: Vec<String>,
    pub leads: Vec<Lead>,
}

/// Read leads from the first tab in `tabs` that is available.
///
/// Each tab is tried once, in order. Only `SourceUnavailable` moves on to
/// the next tab; any other error is returned immediately.
pub async fn load_leads(
    client: &SheetsClient,
    tabs: &[String],
) -> Result<(LoadedLeads, ProbeReport<String>), AppError> {
    let mut report: ProbeReport<String> = ProbeReport::new();

    for tab in tabs {
        match client.read_tab(tab).await {
            Ok(values) if values.header.is_empty() => {
                tracing::warn!("Tab '{}' is empty, trying next", tab);
                report.record(tab.as_str(), AttemptOutcome::NotFound);
            }
            Ok(values) => {
                report.record(tab.as_str(), AttemptOutcome::Succeeded);
                report.value = Some(tab.clone());
                let leads = leads_from_values(&values);
                tracing::info!("✓ Loaded {} leads from tab '{}'", leads.len(), tab);
                return Ok((
                    LoadedLeads {
                        tab: tab.clone(),
                        header: values.header,
                        leads,
                    },
                    report,
                ));
            }
            Err(e) if e.is_source_unavailable() => {
                tracing::warn!("Tab '{}' unavailable: {}", tab, e);
                report.record(tab.as_str(), AttemptOutcome::Failed(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::SourceUnavailable(format!(
        "no lead tab available ({})",
        report
    )))
}
