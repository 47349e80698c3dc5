use crate::config::LlmConfig;
use crate::errors::AppError;
use crate::message::SIGNATURE;
use crate::models::{ClassificationResult, EnrichmentResult, Lead};
use failsafe::{backoff, failure_policy, CircuitBreaker, Config as BreakerConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token budget for one outreach message.
pub const MAX_TOKENS: u32 = 350;
pub const TEMPERATURE: f32 = 0.7;

pub const SYSTEM_PROMPT: &str = "Eres un experto en ventas de servicios de marketing digital \
para pequeños negocios en México. Escribes mensajes de WhatsApp en español, cálidos, \
profesionales y breves (máximo 120 palabras), tratando de usted al cliente. No inventes datos \
del negocio que no se te den. No incluyas firma: se agrega después.";

type LlmBreaker =
    failsafe::StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates the circuit breaker guarding the LLM endpoint.
///
/// - **Failure threshold**: 3 consecutive failures opens the circuit.
/// - **Backoff**: exponential from 60s to 10min before the next attempt.
///
/// While open, messages go straight to the template path.
pub fn create_llm_circuit_breaker() -> LlmBreaker {
    let backoff_strategy = backoff::exponential(Duration::from_secs(60), Duration::from_secs(600));
    let failure_policy = failure_policy::consecutive_failures(3, backoff_strategy);

    BreakerConfig::new().failure_policy(failure_policy).build()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    breaker: LlmBreaker,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create LLM client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            breaker: create_llm_circuit_breaker(),
        })
    }

    /// Send a system + user prompt and return the completion text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("LLM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "LLM returned status {}: {}",
                status, error_text
            )));
        }

        let completion: ChatResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse LLM response: {}", e))
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AppError::ExternalApiError(
                "LLM returned an empty completion".to_string(),
            ));
        }

        Ok(text)
    }

    /// Generate a personalized message, with the signature appended if missing.
    ///
    /// A single attempt; callers fall back to the template on `Err`.
    pub async fn personalize(
        &self,
        lead: &Lead,
        enrichment: &EnrichmentResult,
        classification: &ClassificationResult,
    ) -> Result<String, AppError> {
        if !self.breaker.is_call_permitted() {
            return Err(AppError::ExternalApiError(
                "LLM circuit open after repeated failures".to_string(),
            ));
        }

        let prompt = build_user_prompt(lead, enrichment, classification);
        let result = self.complete(SYSTEM_PROMPT, &prompt).await;

        // Record the outcome with the breaker
        let outcome: Result<(), ()> = if result.is_ok() { Ok(()) } else { Err(()) };
        let _ = self.breaker.call(|| outcome);

        let text = result?;
        Ok(with_signature(&text))
    }
}

/// Fixed prompt template filled with the lead and its classification.
pub fn build_user_prompt(
    lead: &Lead,
    enrichment: &EnrichmentResult,
    classification: &ClassificationResult,
) -> String {
    let mut prompt = String::new();
    prompt.push_str("Escribe un mensaje de primer contacto por WhatsApp para este negocio.\n\n");
    prompt.push_str(&format!("Negocio: {}\n", lead.display_name()));
    if let Some(contact) = lead.contact_name.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Contacto: {}\n", contact.trim()));
    }
    if let Some(industry) = lead.industry.as_deref().filter(|i| !i.trim().is_empty()) {
        prompt.push_str(&format!("Giro: {}\n", industry.trim()));
    }
    prompt.push_str(&format!(
        "Tipo de negocio: {}\n",
        classification.business_type.label_es()
    ));
    prompt.push_str(&format!("Análisis: {}\n", enrichment.summary()));
    prompt.push_str("Problemas detectados:\n");
    for pain in classification.pain_points.iter().take(4) {
        prompt.push_str(&format!("- {}\n", pain));
    }
    let (service_name, benefits) = crate::message::service_pitch(classification.top_service());
    prompt.push_str(&format!("Servicio a ofrecer: {}\n", service_name));
    prompt.push_str(&format!("Beneficios: {}\n", benefits.join("; ")));
    prompt.push_str(
        "\nMenciona el problema principal, el servicio y termina invitando a una llamada de 10 minutos.",
    );
    prompt
}

/// Append the fixed signature unless the completion already carries it.
pub fn with_signature(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.contains(SIGNATURE) {
        trimmed.to_string()
    } else {
        format!("{}\n\n{}", trimmed, SIGNATURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::Error;

    #[test]
    fn test_breaker_opens_after_three_failures() {
        let cb = create_llm_circuit_breaker();

        for _ in 0..3 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("llm down"));
            assert!(result.is_err());
        }

        assert!(!cb.is_call_permitted());
    }

    #[test]
    fn test_with_signature_appends_once() {
        let signed = with_signature("Hola, ¿cómo está?");
        assert!(signed.ends_with(SIGNATURE));
        assert_eq!(with_signature(&signed), signed);
    }

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(&LlmConfig {
            api_key: "key".to_string(),
            base_url: "https://example.com/v1/".to_string(),
            model: "gpt-4o-mini".to_string(),
        });
        assert!(client.is_ok());
    }
}
