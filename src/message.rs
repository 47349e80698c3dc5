//! Spanish outreach message synthesis.
//!
//! The template path is deterministic and bounded by
//! [`MAX_TEMPLATE_MESSAGE_CHARS`]. The LLM path lives in [`crate::llm`] and
//! always falls back to [`render_template`].

use crate::classifier::{
    pain_points_for, PAIN_FEW_REVIEWS, PAIN_NOT_MOBILE, PAIN_NOT_ON_MAPS, PAIN_NO_WEBSITE,
    PAIN_SITE_DOWN,
};
use crate::llm::LlmClient;
use crate::models::{
    BusinessType, ClassificationResult, EnrichmentResult, Lead, Message, MessageSource, Priority,
    ServiceTag,
};

/// Fixed signature closing every message.
pub const SIGNATURE: &str =
    "Saludos,\nAlex Jego\nDiseño web y marketing digital\nWhatsApp: +52 998 202 3263";

/// Upper bound for template-generated messages, in characters.
pub const MAX_TEMPLATE_MESSAGE_CHARS: usize = 1500;

const MAX_NAME_CHARS: usize = 60;

/// Display name and the three fixed benefits of a service.
pub fn service_pitch(service: ServiceTag) -> (&'static str, [&'static str; 3]) {
    match service {
        ServiceTag::WebsiteDesign => (
            "un sitio web profesional",
            [
                "Aparece en Google cuando lo buscan",
                "Diseño adaptado a celulares",
                "Botón directo a WhatsApp para recibir clientes",
            ],
        ),
        ServiceTag::OnlineBooking => (
            "un sistema de reservaciones en línea",
            [
                "Reservas y citas las 24 horas, sin llamadas",
                "Confirmaciones y recordatorios automáticos",
                "Menos ausencias y una agenda siempre ordenada",
            ],
        ),
        ServiceTag::GoogleMaps => (
            "la optimización de su ficha en Google Maps",
            [
                "Aparece en las primeras posiciones de su zona",
                "Ficha completa con fotos, horarios y reseñas",
                "Más llamadas y visitas desde el mapa",
            ],
        ),
        ServiceTag::SocialMedia => (
            "la gestión de sus redes sociales",
            [
                "Publicaciones profesionales cada semana",
                "Contenido pensado para atraer clientes locales",
                "Reporte mensual de resultados",
            ],
        ),
        ServiceTag::WhatsappAutomation => (
            "la automatización de su WhatsApp",
            [
                "Respuestas automáticas a preguntas frecuentes",
                "Atención inmediata aunque esté ocupado",
                "Catálogo y precios al alcance de un mensaje",
            ],
        ),
        ServiceTag::OnlineStore => (
            "una tienda en línea",
            [
                "Venda las 24 horas, incluso con la tienda cerrada",
                "Pagos con tarjeta y envíos a domicilio",
                "Catálogo fácil de actualizar desde el celular",
            ],
        ),
    }
}

pub fn social_proof(business_type: BusinessType) -> &'static str {
    match business_type {
        BusinessType::Restaurant => {
            "Hace poco ayudamos a un restaurante de la zona a recibir más de 40 reservaciones en línea al mes."
        }
        BusinessType::Hotel => {
            "Un hotel boutique con el que trabajamos aumentó sus reservas directas y pagó menos comisiones."
        }
        BusinessType::Spa => {
            "Un spa con el que trabajamos llenó su agenda de fin de semana con citas en línea."
        }
        BusinessType::Health => {
            "Una clínica dental que atendemos redujo a la mitad sus citas perdidas con recordatorios automáticos."
        }
        BusinessType::Retail => {
            "Una boutique local empezó a vender en línea en menos de dos semanas."
        }
        BusinessType::Generic => {
            "Hemos ayudado a más de 30 negocios locales a conseguir clientes desde internet."
        }
    }
}

pub fn urgency(priority: Priority) -> Option<&'static str> {
    match priority {
        Priority::High => Some(
            "Esta semana tengo solo 2 espacios para proyectos nuevos, por eso le escribo directamente.",
        ),
        Priority::Medium => Some(
            "Este mes la configuración inicial no tiene costo para negocios de la zona.",
        ),
        Priority::Low => None,
    }
}

fn observation(pain: &str) -> Option<&'static str> {
    match pain {
        PAIN_NO_WEBSITE => Some(
            "Además, noté que todavía no cuenta con sitio web propio, así que quien lo busca en Google no encuentra dónde conocerlo.",
        ),
        PAIN_SITE_DOWN => Some("Además, intenté entrar a su sitio web y no cargó correctamente."),
        PAIN_NOT_MOBILE => Some(
            "Además, su sitio no se adapta bien a celulares, que es desde donde llega la mayoría de sus clientes.",
        ),
        PAIN_NOT_ON_MAPS => Some("Además, no encontré su negocio en Google Maps."),
        PAIN_FEW_REVIEWS => {
            Some("Además, su ficha de Google tiene pocas reseñas frente a la competencia.")
        }
        _ => None,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// First pain point that came from enrichment rather than the category table.
fn first_enrichment_pain(classification: &ClassificationResult) -> Option<&str> {
    let category_len = pain_points_for(classification.business_type).len();
    classification
        .pain_points
        .get(category_len)
        .map(String::as_str)
}

/// Render the deterministic template message.
///
/// Sections, in order: greeting, top pain point (plus the first enrichment
/// observation), the top service's benefits, social proof, urgency, call to
/// action and the signature. Optional sections are dropped from the end of
/// that list if the message would exceed [`MAX_TEMPLATE_MESSAGE_CHARS`].
pub fn render_template(lead: &Lead, classification: &ClassificationResult) -> String {
    let business = truncate_chars(lead.display_name(), MAX_NAME_CHARS);
    let business = if business.is_empty() {
        "su negocio".to_string()
    } else {
        business
    };

    let greeting = match lead
        .contact_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        Some(contact) => format!(
            "¡Hola, {}! 👋 Le escribo por {}.",
            truncate_chars(contact, 40),
            business
        ),
        None => format!("¡Hola, equipo de {}! 👋", business),
    };

    let top_pain = classification
        .pain_points
        .first()
        .map(|p| lowercase_first(p))
        .unwrap_or_else(|| "poca presencia en internet".to_string());
    let pain_paragraph = format!(
        "Revisé cómo se ve {} en internet y noté algo que a muchos negocios de {} les cuesta clientes: {}.",
        business,
        classification.business_type.label_es(),
        top_pain
    );
    let observation_line = first_enrichment_pain(classification).and_then(observation);

    let (service_name, benefits) = service_pitch(classification.top_service());
    let mut services_paragraph = format!("Le propongo {}:", service_name);
    for benefit in benefits {
        services_paragraph.push_str(&format!("\n✅ {}", benefit));
    }

    let proof = social_proof(classification.business_type);
    let urgency_line = urgency(classification.priority);
    let cta = format!(
        "¿Le parece si le muestro en una llamada de 10 minutos cómo funcionaría para {}? Puede responder a este mensaje.",
        business
    );

    let assemble = |observation_line: Option<&str>,
                    proof: Option<&str>,
                    urgency_line: Option<&str>,
                    pain_paragraph: &str| {
        let mut pain = pain_paragraph.to_string();
        if let Some(obs) = observation_line {
            pain.push(' ');
            pain.push_str(obs);
        }
        let mut sections: Vec<String> = vec![greeting.clone(), pain, services_paragraph.clone()];
        sections.extend(proof.map(String::from));
        sections.extend(urgency_line.map(String::from));
        sections.push(cta.clone());
        sections.push(SIGNATURE.to_string());
        sections.join("\n\n")
    };

    // Drop optional sections last-to-first until the message fits.
    let candidates = [
        (observation_line, Some(proof), urgency_line),
        (observation_line, Some(proof), None),
        (observation_line, None, None),
        (None, None, None),
    ];
    for (obs, proof, urgency_line) in candidates {
        let text = assemble(obs, proof, urgency_line, &pain_paragraph);
        if text.chars().count() <= MAX_TEMPLATE_MESSAGE_CHARS {
            return text;
        }
    }

    // Unreachable with the capped name lengths; keep the signature intact anyway.
    let budget = MAX_TEMPLATE_MESSAGE_CHARS - SIGNATURE.chars().count() - 2;
    format!(
        "{}\n\n{}",
        truncate_chars(&pain_paragraph, budget),
        SIGNATURE
    )
}

/// Build the message for a lead, trying the LLM first when one is configured.
///
/// Never fails: any LLM problem falls back to the template without retrying.
pub async fn compose_message(
    lead: &Lead,
    enrichment: &EnrichmentResult,
    classification: &ClassificationResult,
    llm: Option<&LlmClient>,
) -> Message {
    if let Some(client) = llm {
        match client.personalize(lead, enrichment, classification).await {
            Ok(text) => {
                return Message {
                    lead_id: lead.id.clone(),
                    text,
                    source: MessageSource::Llm,
                }
            }
            Err(e) => {
                tracing::warn!(
                    "LLM message failed for {} ({}), using template: {}",
                    lead.id,
                    lead.business_name,
                    e
                );
            }
        }
    }

    Message {
        lead_id: lead.id.clone(),
        text: render_template(lead, classification),
        source: MessageSource::Template,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::models::OutreachStatus;

    fn lead(name: &str, contact: Option<&str>, qualification: Option<&str>) -> Lead {
        Lead {
            id: "row-2".to_string(),
            row_number: 2,
            business_name: name.to_string(),
            contact_name: contact.map(String::from),
            phone: "9981234567".to_string(),
            website: None,
            industry: None,
            qualification: qualification.map(String::from),
            outreach_status: OutreachStatus::Unset,
        }
    }

    #[test]
    fn test_sections_appear_in_order() {
        let lead = lead("Hotel Caribe", None, Some("hot"));
        let classification = classify(&lead, &EnrichmentResult::from_lead(&lead));
        let text = render_template(&lead, &classification);

        let greeting = text.find("¡Hola, equipo de Hotel Caribe!").unwrap();
        let pain = text.find("Revisé cómo se ve").unwrap();
        let benefits = text.find("✅").unwrap();
        let proof = text.find(social_proof(BusinessType::Hotel)).unwrap();
        let urgency_pos = text.find("Esta semana tengo solo 2 espacios").unwrap();
        let cta = text.find("¿Le parece si").unwrap();
        let signature = text.find(SIGNATURE).unwrap();

        assert!(greeting < pain);
        assert!(pain < benefits);
        assert!(benefits < proof);
        assert!(proof < urgency_pos);
        assert!(urgency_pos < cta);
        assert!(cta < signature);
        assert!(text.ends_with(SIGNATURE));
    }

    #[test]
    fn test_low_priority_has_no_urgency() {
        let lead = lead("Hotel Caribe", None, None);
        let mut classification = classify(&lead, &EnrichmentResult::from_lead(&lead));
        classification.priority = Priority::Low;
        let text = render_template(&lead, &classification);

        assert!(!text.contains("Esta semana tengo"));
        assert!(!text.contains("no tiene costo"));
    }

    #[test]
    fn test_contact_name_greeting() {
        let lead = lead("Spa Maya", Some("Lucía"), None);
        let classification = classify(&lead, &EnrichmentResult::from_lead(&lead));
        let text = render_template(&lead, &classification);
        assert!(text.starts_with("¡Hola, Lucía! 👋 Le escribo por Spa Maya."));
    }

    #[test]
    fn test_three_benefits_of_top_service() {
        let lead = lead("Spa Maya", None, None);
        let classification = classify(&lead, &EnrichmentResult::from_lead(&lead));
        let text = render_template(&lead, &classification);
        let (_, benefits) = service_pitch(classification.top_service());

        assert_eq!(text.matches("✅").count(), 3);
        for benefit in benefits {
            assert!(text.contains(benefit));
        }
    }

    #[test]
    fn test_long_names_stay_within_limit() {
        let long_name = "Restaurante ".to_string() + &"Muy Largo ".repeat(50);
        let lead = lead(&long_name, Some(&"Nombre ".repeat(30)), Some("hot"));
        let classification = classify(&lead, &EnrichmentResult::from_lead(&lead));
        let text = render_template(&lead, &classification);

        assert!(text.chars().count() <= MAX_TEMPLATE_MESSAGE_CHARS);
        assert!(text.contains(SIGNATURE));
    }

    #[test]
    fn test_empty_name_falls_back() {
        let lead = lead("", None, None);
        let classification = classify(&lead, &EnrichmentResult::from_lead(&lead));
        let text = render_template(&lead, &classification);
        assert!(text.contains("su negocio"));
    }

    #[tokio::test]
    async fn test_compose_without_llm_uses_template() {
        let lead = lead("Boutique Coral", None, None);
        let enrichment = EnrichmentResult::from_lead(&lead);
        let classification = classify(&lead, &enrichment);
        let message = compose_message(&lead, &enrichment, &classification, None).await;

        assert_eq!(message.source, MessageSource::Template);
        assert_eq!(message.lead_id, "row-2");
        assert_eq!(message.text, render_template(&lead, &classification));
    }
}
