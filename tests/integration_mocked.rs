/// Integration tests with mocked external APIs
/// Tests the Sheets and LLM workflows without hitting real external services
use lead_outreach::classifier::classify;
use lead_outreach::config::{Config, LlmConfig, SheetsCredentials};
use lead_outreach::errors::AppError;
use lead_outreach::llm::LlmClient;
use lead_outreach::message::{compose_message, SIGNATURE};
use lead_outreach::models::{EnrichmentResult, Lead, MessageSource, OutreachStatus};
use lead_outreach::pipeline;
use lead_outreach::sheets::SheetsClient;
use lead_outreach::sink::{update_outreach_status, SheetSink, OUTPUT_HEADER};
use lead_outreach::source::{load_leads, LoadedLeads};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHEET_ID: &str = "sheet123";

/// Helper function to create test config
fn create_test_config(sheets_base_url: String) -> Config {
    Config {
        spreadsheet_id: SHEET_ID.to_string(),
        credentials: SheetsCredentials::AccessToken("test-token".to_string()),
        sheets_base_url,
        lead_tab: "Leads".to_string(),
        fallback_tabs: vec!["Sheet1".to_string()],
        output_tab: Some("Mensajes".to_string()),
        csv_output_path: None,
        max_leads: None,
        enrich: false,
        skip_ready: false,
        city: "Cancún".to_string(),
        delay: Duration::ZERO,
        navigation_timeout: Duration::from_secs(2),
        chrome_path: None,
        headless: true,
        whatsapp_profile_dir: ".whatsapp-profile".into(),
        llm: None,
    }
}

fn leads_body() -> serde_json::Value {
    serde_json::json!({
        "range": "'Leads'!A1:F4",
        "majorDimension": "ROWS",
        "values": [
            ["ID", "Business Name", "Phone", "Website", "Industry", "Outreach Status"],
            ["L1", "Restaurante El Sabor", "9981234567", "", "food"],
            ["L2", "Hotel Caribe", "998 765 4321", "hotelcaribe.mx", "", "sent"],
            ["L3", "Spa Maya", "+52 1 998 111 2233", "", "", ""]
        ]
    })
}

fn lead() -> Lead {
    Lead {
        id: "L1".to_string(),
        row_number: 2,
        business_name: "Restaurante El Sabor".to_string(),
        contact_name: None,
        phone: "9981234567".to_string(),
        website: None,
        industry: Some("food".to_string()),
        qualification: None,
        outreach_status: OutreachStatus::Unset,
    }
}

#[tokio::test]
async fn test_load_leads_from_primary_tab() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sheet123/values/%27Leads%27$"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(leads_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let client = SheetsClient::new(&config).unwrap();
    let (loaded, report) = load_leads(&client, &config.source_tabs()).await.unwrap();

    assert_eq!(loaded.tab, "Leads");
    assert_eq!(loaded.leads.len(), 3);
    assert_eq!(loaded.leads[0].business_name, "Restaurante El Sabor");
    assert_eq!(loaded.leads[1].outreach_status, OutreachStatus::Sent);
    assert_eq!(loaded.leads[2].normalized_phone(), "529981112233");
    assert_eq!(report.winning_strategy(), Some("Leads"));
}

#[tokio::test]
async fn test_load_leads_falls_back_when_tab_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"/values/%27Leads%27$"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "code": 400, "message": "Unable to parse range: 'Leads'" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"/values/%27Sheet1%27$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(leads_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let client = SheetsClient::new(&config).unwrap();
    let (loaded, report) = load_leads(&client, &config.source_tabs()).await.unwrap();

    assert_eq!(loaded.tab, "Sheet1");
    assert_eq!(report.attempts.len(), 2);
    assert!(report.to_string().starts_with("Leads: failed"));
}

#[tokio::test]
async fn test_load_leads_fails_when_every_tab_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"/values/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let client = SheetsClient::new(&config).unwrap();
    let err = load_leads(&client, &config.source_tabs()).await.unwrap_err();

    assert!(err.is_source_unavailable());
    assert!(err.to_string().contains("Sheet1"));
}

#[tokio::test]
async fn test_sheet_sink_creates_tab_and_appends_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet123:batchUpdate"))
        .and(body_partial_json(serde_json::json!({
            "requests": [{ "addSheet": { "properties": { "title": "Mensajes" } } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/values/%27Mensajes%27%21A1$"))
        .and(body_partial_json(serde_json::json!({ "values": [OUTPUT_HEADER] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"/values/%27Mensajes%27:append$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let client = SheetsClient::new(&config).unwrap();
    let sink = SheetSink::prepare(&client, "Mensajes", &["Leads".to_string()])
        .await
        .unwrap();

    let lead = lead();
    let enrichment = EnrichmentResult::from_lead(&lead);
    let classification = classify(&lead, &enrichment);
    let message = compose_message(&lead, &enrichment, &classification, None).await;
    let processed = lead_outreach::models::ProcessedLead {
        lead,
        enrichment,
        classification,
        message,
    };

    sink.write(&processed).await.unwrap();
    sink.write(&processed).await.unwrap();
}

#[tokio::test]
async fn test_sheet_sink_counts_failed_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r":clear$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r":append$"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let client = SheetsClient::new(&config).unwrap();
    // Tab already exists: cleared instead of created
    let sink = SheetSink::prepare(&client, "Mensajes", &["Mensajes".to_string()])
        .await
        .unwrap();

    let mut sinks: pipeline::Sinks<'_, Vec<u8>> = pipeline::Sinks {
        sheet: Some(sink),
        csv: None,
    };
    let (summary, results) =
        pipeline::process_leads(&config, &[lead()], None, None, &mut sinks).await;

    // The failed row is counted; the lead itself is still processed
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.write_failures, 1);
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_update_outreach_status_targets_status_cell() {
    let mock_server = MockServer::start().await;

    // Outreach Status is the 6th column (F); lead L1 is on row 2
    Mock::given(method("PUT"))
        .and(path_regex(r"/values/%27Leads%27%21F2$"))
        .and(body_partial_json(serde_json::json!({ "values": [["sent"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let client = SheetsClient::new(&config).unwrap();
    let source = LoadedLeads {
        tab: "Leads".to_string(),
        header: ["ID", "Business Name", "Phone", "Website", "Industry", "Outreach Status"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        leads: vec![lead()],
    };

    let updated = update_outreach_status(&client, &source, &source.leads[0], OutreachStatus::Sent)
        .await
        .unwrap();
    assert!(updated);
}

#[tokio::test]
async fn test_update_outreach_status_adds_missing_status_column() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/values/%27Leads%27%21D1$"))
        .and(body_partial_json(serde_json::json!({ "values": [["Outreach Status"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/values/%27Leads%27%21D2$"))
        .and(body_partial_json(serde_json::json!({ "values": [["failed"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let client = SheetsClient::new(&config).unwrap();
    let source = LoadedLeads {
        tab: "Leads".to_string(),
        header: ["ID", "Business Name", "Phone"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        leads: vec![lead()],
    };

    let updated =
        update_outreach_status(&client, &source, &source.leads[0], OutreachStatus::Failed)
            .await
            .unwrap();
    assert!(updated);
}

#[tokio::test]
async fn test_llm_message_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer llm-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "max_tokens": 350
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "¡Hola, equipo de Restaurante El Sabor! Vi que aún no tienen reservaciones en línea."
                }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let llm = LlmClient::new(&LlmConfig {
        api_key: "llm-key".to_string(),
        base_url: mock_server.uri(),
        model: "gpt-4o-mini".to_string(),
    })
    .unwrap();

    let lead = lead();
    let enrichment = EnrichmentResult::from_lead(&lead);
    let classification = classify(&lead, &enrichment);
    let message = compose_message(&lead, &enrichment, &classification, Some(&llm)).await;

    assert_eq!(message.source, MessageSource::Llm);
    assert!(message.text.starts_with("¡Hola, equipo de Restaurante El Sabor!"));
    assert!(message.text.ends_with(SIGNATURE));
}

#[tokio::test]
async fn test_llm_failure_falls_back_to_template() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream overloaded"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let llm = LlmClient::new(&LlmConfig {
        api_key: "llm-key".to_string(),
        base_url: mock_server.uri(),
        model: "gpt-4o-mini".to_string(),
    })
    .unwrap();

    let lead = lead();
    let enrichment = EnrichmentResult::from_lead(&lead);
    let classification = classify(&lead, &enrichment);

    let direct = llm.personalize(&lead, &enrichment, &classification).await;
    assert!(matches!(direct, Err(AppError::ExternalApiError(_))));

    let message = compose_message(&lead, &enrichment, &classification, Some(&llm)).await;
    assert_eq!(message.source, MessageSource::Template);
    assert!(message.text.contains("Alex Jego"));
}

#[tokio::test]
async fn test_llm_empty_completion_falls_back() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "   " } }]
        })))
        .mount(&mock_server)
        .await;

    let llm = LlmClient::new(&LlmConfig {
        api_key: "llm-key".to_string(),
        base_url: mock_server.uri(),
        model: "gpt-4o-mini".to_string(),
    })
    .unwrap();

    let lead = lead();
    let enrichment = EnrichmentResult::from_lead(&lead);
    let classification = classify(&lead, &enrichment);
    let message = compose_message(&lead, &enrichment, &classification, Some(&llm)).await;

    assert_eq!(message.source, MessageSource::Template);
}

#[tokio::test]
async fn test_pipeline_run_writes_pending_leads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sheets": [{ "properties": { "title": "Leads" } }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"/values/%27Leads%27$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(leads_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet123:batchUpdate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/values/%27Mensajes%27%21A1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    // L2 is already sent: only L1 and L3 are written
    Mock::given(method("POST"))
        .and(path_regex(r"/values/%27Mensajes%27:append$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let summary = pipeline::run(&config).await.unwrap();

    assert_eq!(summary.read, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.enriched, 0);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.write_failures, 0);
}
