//! Business-type classification and pain-point selection.
//!
//! A single canonical rule table maps keywords to a business type, each type
//! to its Spanish pain points and recommended services. Everything here is a
//! pure function of its inputs: the same lead and enrichment always produce
//! the same `ClassificationResult`.

use crate::contact::fold_text;
use crate::models::{
    BusinessType, ClassificationResult, EnrichmentResult, Lead, Priority, ServiceTag,
    ISSUE_NO_WEBSITE,
};

/// Keyword rules in match priority order. The first type with a hit wins.
///
/// Keywords are already folded (lowercase, no accents) and match as a
/// prefix of any word, so "restaurante" also matches "restaurantes" while
/// "spa" does not match "espacio".
pub const KEYWORD_RULES: &[(BusinessType, &[&str])] = &[
    (
        BusinessType::Restaurant,
        &[
            "restaurante", "restaurant", "food", "comida", "cocina", "cafe", "cafeteria",
            "taqueria", "tacos", "pizzeria", "pizza", "mariscos", "marisqueria", "bistro",
            "cantina", "fonda", "loncheria", "panaderia", "bakery", "grill", "sushi", "burger",
            "hamburguesa", "antojitos", "cevicheria",
        ],
    ),
    (
        BusinessType::Hotel,
        &[
            "hotel", "hostal", "hostel", "resort", "posada", "suites", "villas", "hospedaje",
            "lodging", "boutique hotel", "bed and breakfast", "airbnb", "motel",
        ],
    ),
    (
        BusinessType::Spa,
        &[
            "spa", "salon", "belleza", "beauty", "estetica", "barberia", "barber", "masaje",
            "massage", "nails", "unas", "peluqueria", "wellness", "cosmetologia", "pestanas",
        ],
    ),
    (
        BusinessType::Health,
        &[
            "dental", "dentista", "odontologia", "clinica", "clinic", "medico", "medica",
            "doctor", "dr.", "salud", "health", "consultorio", "hospital", "farmacia",
            "veterinaria", "fisioterapia", "optica", "laboratorio", "nutriologo", "psicologo",
            "pediatra", "ortodoncia",
        ],
    ),
    (
        BusinessType::Retail,
        &[
            "tienda", "boutique", "shop", "store", "retail", "moda", "ropa", "zapateria",
            "joyeria", "ferreteria", "papeleria", "abarrotes", "minisuper", "mueble",
            "accesorios", "regalos", "libreria", "jugueteria", "floreria",
        ],
    ),
];

/// Fixed pain points per business type.
pub fn pain_points_for(business_type: BusinessType) -> &'static [&'static str] {
    match business_type {
        BusinessType::Restaurant => &[
            PAIN_NO_RESERVATIONS,
            "Menú sin versión digital para compartir por WhatsApp",
            "Dependencia de plataformas de delivery con comisiones altas",
        ],
        BusinessType::Hotel => &[
            "Reservas dependientes de OTAs con comisiones del 15-25%",
            "Sin motor de reservas directas en su sitio",
            "Poca presencia frente a turistas que buscan en línea",
        ],
        BusinessType::Spa => &[
            "Citas gestionadas a mano por mensaje o teléfono",
            "Sin agenda en línea disponible las 24 horas",
            "Poca visibilidad de sus servicios y precios en redes",
        ],
        BusinessType::Health => &[
            "Agenda de citas manual que genera ausencias",
            "Pacientes nuevos no lo encuentran en internet",
            "Sin recordatorios automáticos de citas",
        ],
        BusinessType::Retail => &[
            "Sin tienda en línea para vender fuera del horario",
            "Catálogo de productos no visible en internet",
            "Competencia con tiendas que ya venden en línea",
        ],
        BusinessType::Generic => &[
            "Presencia digital limitada frente a la competencia",
            "Clientes potenciales no lo encuentran en Google",
        ],
    }
}

pub const PAIN_NO_RESERVATIONS: &str = "Sin sistema de reservaciones en línea";
pub const PAIN_NO_WEBSITE: &str = "Sin sitio web propio";
pub const PAIN_NOT_MOBILE: &str = "Su sitio no se ve bien en celulares";
pub const PAIN_NOT_ON_MAPS: &str = "No aparece en Google Maps";
pub const PAIN_SITE_DOWN: &str = "Su sitio web no carga correctamente";
pub const PAIN_FEW_REVIEWS: &str = "Pocas reseñas en Google frente a la competencia";

/// Recommended services per business type, most relevant first.
pub fn services_for(business_type: BusinessType) -> &'static [ServiceTag] {
    match business_type {
        BusinessType::Restaurant => &[
            ServiceTag::OnlineBooking,
            ServiceTag::WebsiteDesign,
            ServiceTag::GoogleMaps,
        ],
        BusinessType::Hotel => &[
            ServiceTag::OnlineBooking,
            ServiceTag::WebsiteDesign,
            ServiceTag::SocialMedia,
        ],
        BusinessType::Spa => &[
            ServiceTag::OnlineBooking,
            ServiceTag::SocialMedia,
            ServiceTag::WhatsappAutomation,
        ],
        BusinessType::Health => &[
            ServiceTag::OnlineBooking,
            ServiceTag::WebsiteDesign,
            ServiceTag::GoogleMaps,
        ],
        BusinessType::Retail => &[
            ServiceTag::OnlineStore,
            ServiceTag::SocialMedia,
            ServiceTag::GoogleMaps,
        ],
        BusinessType::Generic => &[
            ServiceTag::WebsiteDesign,
            ServiceTag::GoogleMaps,
            ServiceTag::WhatsappAutomation,
        ],
    }
}

pub const BASE_CONFIDENCE: u8 = 50;
pub const MAX_CONFIDENCE: u8 = 100;

/// Qualification-tag signals and their fixed increments.
const QUALIFICATION_SIGNALS: &[(&[&str], u8)] = &[
    (&["hot", "caliente"], 25),
    (&["qualified", "calificado", "calificada"], 15),
    (&["warm", "tibio", "interesado", "interesada"], 10),
];

const KEYWORD_MATCH_BONUS: u8 = 5;

/// Reviews below this count on a found listing add a reviews pain point.
pub const FEW_REVIEWS_THRESHOLD: u32 = 10;

pub(crate) fn keyword_matches(folded: &str, keyword: &str) -> bool {
    if keyword.contains(' ') || keyword.contains('.') {
        return folded.contains(keyword);
    }
    folded
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.starts_with(keyword))
}

/// First business type whose keyword set matches `text`, if any.
pub fn guess_business_type(text: &str) -> Option<BusinessType> {
    let folded = fold_text(text);
    KEYWORD_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| keyword_matches(&folded, k)))
        .map(|(business_type, _)| *business_type)
}

/// Classify from the business name and industry, falling back to the type
/// detected on the lead's website, then to `Generic`.
pub fn classify_business_type(lead: &Lead, enrichment: &EnrichmentResult) -> BusinessType {
    let text = format!(
        "{} {}",
        lead.business_name,
        lead.industry.as_deref().unwrap_or_default()
    );
    guess_business_type(&text)
        .or(enrichment.detected_type)
        .unwrap_or(BusinessType::Generic)
}

/// Additive confidence score from the qualification tag, clamped to 100.
pub fn confidence_score(qualification: Option<&str>, matched_keyword: bool) -> u8 {
    let mut score = BASE_CONFIDENCE as u32;
    if let Some(tag) = qualification {
        let folded = fold_text(tag);
        for (needles, increment) in QUALIFICATION_SIGNALS {
            if needles.iter().any(|n| folded.contains(n)) {
                score += *increment as u32;
            }
        }
    }
    if matched_keyword {
        score += KEYWORD_MATCH_BONUS as u32;
    }
    score.min(MAX_CONFIDENCE as u32) as u8
}

/// Pain points derived from enrichment, in a fixed order.
fn enrichment_pain_points(enrichment: &EnrichmentResult) -> Vec<&'static str> {
    let mut pains = Vec::new();
    if !enrichment.has_website || enrichment.has_issue(ISSUE_NO_WEBSITE) {
        pains.push(PAIN_NO_WEBSITE);
    } else if enrichment.website_checked {
        if !enrichment.website_accessible {
            pains.push(PAIN_SITE_DOWN);
        } else if !enrichment.mobile_friendly {
            pains.push(PAIN_NOT_MOBILE);
        }
    }
    if enrichment.map_checked {
        if !enrichment.has_map_listing {
            pains.push(PAIN_NOT_ON_MAPS);
        } else if enrichment.rating.is_some() && enrichment.review_count < FEW_REVIEWS_THRESHOLD {
            pains.push(PAIN_FEW_REVIEWS);
        }
    }
    pains
}

/// Classify a lead. Never fails: unknown data degrades to `Generic`.
pub fn classify(lead: &Lead, enrichment: &EnrichmentResult) -> ClassificationResult {
    let name_and_industry = format!(
        "{} {}",
        lead.business_name,
        lead.industry.as_deref().unwrap_or_default()
    );
    let keyword_type = guess_business_type(&name_and_industry);
    let business_type = classify_business_type(lead, enrichment);

    let mut pain_points: Vec<String> = pain_points_for(business_type)
        .iter()
        .map(|p| p.to_string())
        .collect();
    for pain in enrichment_pain_points(enrichment) {
        if !pain_points.iter().any(|p| p == pain) {
            pain_points.push(pain.to_string());
        }
    }

    let mut services: Vec<ServiceTag> = services_for(business_type).to_vec();
    if !enrichment.has_website {
        services.retain(|s| *s != ServiceTag::WebsiteDesign);
        services.insert(0, ServiceTag::WebsiteDesign);
    }

    let confidence = confidence_score(lead.qualification.as_deref(), keyword_type.is_some());

    ClassificationResult {
        business_type,
        pain_points,
        services,
        priority: Priority::from_confidence(confidence),
        confidence,
    }
}
