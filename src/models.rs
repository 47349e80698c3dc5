use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Lead ============

/// Outreach state of a lead, stored in the source tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutreachStatus {
    #[default]
    Unset,
    Ready,
    Sent,
    Failed,
}

impl OutreachStatus {
    /// Parses a free-form status cell. Unknown values are treated as unset.
    pub fn parse(raw: &str) -> Self {
        match crate::contact::fold_text(raw).trim() {
            "ready" | "listo" | "pendiente" => OutreachStatus::Ready,
            "sent" | "enviado" | "enviada" => OutreachStatus::Sent,
            "failed" | "fallido" | "error" => OutreachStatus::Failed,
            _ => OutreachStatus::Unset,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutreachStatus::Unset => "",
            OutreachStatus::Ready => "ready",
            OutreachStatus::Sent => "sent",
            OutreachStatus::Failed => "failed",
        }
    }
}

/// A business lead read from the source tab.
///
/// Every field except `outreach_status` is fixed at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Value of the `ID` column, or `row-<n>` when the sheet has none.
    pub id: String,
    /// 1-based sheet row (the header is row 1).
    pub row_number: usize,
    pub business_name: String,
    pub contact_name: Option<String>,
    /// Phone as typed in the sheet.
    pub phone: String,
    pub website: Option<String>,
    pub industry: Option<String>,
    /// Qualification tag ("hot", "qualified", ...), used only for priority.
    pub qualification: Option<String>,
    pub outreach_status: OutreachStatus,
}

impl Lead {
    /// Digit-only phone prefixed with the Mexican country code.
    pub fn normalized_phone(&self) -> String {
        crate::contact::normalize_phone(&self.phone)
    }

    /// Name used in greetings: the business name, else the contact name.
    pub fn display_name(&self) -> &str {
        if !self.business_name.trim().is_empty() {
            self.business_name.trim()
        } else {
            self.contact_name.as_deref().map(str::trim).unwrap_or("")
        }
    }
}

// ============ Enrichment ============

/// Presence on a channel we cannot actually verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Present,
    Absent,
    #[default]
    Unknown,
}

pub const ISSUE_NO_WEBSITE: &str = "Sin sitio web";
pub const ISSUE_WEBSITE_INACCESSIBLE: &str = "Sitio web inaccesible";
pub const ISSUE_NOT_MOBILE_FRIENDLY: &str = "Sitio web no adaptado a celulares";
pub const ISSUE_NOT_ON_MAPS: &str = "No aparece en Google Maps";
pub const ISSUE_NO_CONTACT_FORM: &str = "Sin formulario de contacto";
pub const ISSUE_FEW_REVIEWS: &str = "Pocas reseñas en Google Maps";

/// Signals gathered about one lead. Never persisted except as `summary()`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub has_website: bool,
    pub mobile_friendly: bool,
    pub has_map_listing: bool,
    pub rating: Option<f32>,
    pub review_count: u32,
    pub issues: Vec<String>,
    /// The website was loaded and inspected.
    pub website_checked: bool,
    /// The map search ran and its page was inspected.
    pub map_checked: bool,
    pub website_accessible: bool,
    pub has_contact_form: bool,
    pub has_booking: bool,
    pub detected_type: Option<BusinessType>,
    /// Always `Unknown`: there is no real social-media check behind it.
    pub social_presence: Presence,
}

impl EnrichmentResult {
    /// Result for a lead that was not probed: only the website field is judged.
    pub fn from_lead(lead: &Lead) -> Self {
        if crate::contact::is_plausible_website(lead.website.as_deref()) {
            Self {
                has_website: true,
                ..Default::default()
            }
        } else {
            Self {
                has_website: false,
                issues: vec![ISSUE_NO_WEBSITE.to_string()],
                ..Default::default()
            }
        }
    }

    pub fn has_issue(&self, issue: &str) -> bool {
        self.issues.iter().any(|i| i == issue)
    }

    pub fn push_issue(&mut self, issue: &str) {
        if !self.has_issue(issue) {
            self.issues.push(issue.to_string());
        }
    }

    /// One-line text form written to the sink.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        parts.push(if self.has_website {
            if self.website_checked {
                let mut traits = vec![if self.mobile_friendly { "móvil" } else { "no móvil" }];
                if self.has_booking {
                    traits.push("reservas en línea");
                }
                format!("Web: sí ({})", traits.join(", "))
            } else {
                "Web: sí".to_string()
            }
        } else {
            "Web: no".to_string()
        });

        if self.map_checked {
            if self.has_map_listing {
                match self.rating {
                    Some(rating) => parts.push(format!(
                        "Maps: {:.1}★ ({} reseñas)",
                        rating, self.review_count
                    )),
                    None => parts.push("Maps: sí".to_string()),
                }
            } else {
                parts.push("Maps: no".to_string());
            }
        }

        if !self.issues.is_empty() {
            parts.push(format!("Problemas: {}", self.issues.join(", ")));
        }

        parts.join(" | ")
    }
}

// ============ Classification ============

/// Closed business-type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    Restaurant,
    Hotel,
    Spa,
    Health,
    Retail,
    Generic,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::Restaurant => "restaurant",
            BusinessType::Hotel => "hotel",
            BusinessType::Spa => "spa",
            BusinessType::Health => "health",
            BusinessType::Retail => "retail",
            BusinessType::Generic => "generic",
        }
    }

    /// Spanish label used in messages and sheet rows.
    pub fn label_es(&self) -> &'static str {
        match self {
            BusinessType::Restaurant => "restaurante",
            BusinessType::Hotel => "hotel",
            BusinessType::Spa => "spa y belleza",
            BusinessType::Health => "salud",
            BusinessType::Retail => "comercio",
            BusinessType::Generic => "negocio",
        }
    }
}

impl fmt::Display for BusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Services offered in the outreach message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTag {
    WebsiteDesign,
    OnlineBooking,
    GoogleMaps,
    SocialMedia,
    WhatsappAutomation,
    OnlineStore,
}

impl ServiceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTag::WebsiteDesign => "website_design",
            ServiceTag::OnlineBooking => "online_booking",
            ServiceTag::GoogleMaps => "google_maps",
            ServiceTag::SocialMedia => "social_media",
            ServiceTag::WhatsappAutomation => "whatsapp_automation",
            ServiceTag::OnlineStore => "online_store",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence >= 80 {
            Priority::High
        } else if confidence >= 60 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub business_type: BusinessType,
    pub pain_points: Vec<String>,
    pub services: Vec<ServiceTag>,
    pub priority: Priority,
    /// 0-100.
    pub confidence: u8,
}

impl ClassificationResult {
    pub fn top_service(&self) -> ServiceTag {
        self.services
            .first()
            .copied()
            .unwrap_or(ServiceTag::WebsiteDesign)
    }
}

// ============ Message ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Template,
    Llm,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSource::Template => "template",
            MessageSource::Llm => "llm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub lead_id: String,
    pub text: String,
    pub source: MessageSource,
}

impl Message {
    /// Short SHA-256 fingerprint of the text, used to spot re-sends.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }
}

/// Everything produced for one lead, ready for a sink.
#[derive(Debug, Clone)]
pub struct ProcessedLead {
    pub lead: Lead,
    pub enrichment: EnrichmentResult,
    pub classification: ClassificationResult,
    pub message: Message,
}
