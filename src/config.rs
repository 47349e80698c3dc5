use std::path::PathBuf;
use std::time::Duration;

/// How the Sheets client authenticates.
#[derive(Debug, Clone)]
pub enum SheetsCredentials {
    /// Path to a service-account JSON key file (`client_email` + `private_key`).
    ServiceAccountFile(PathBuf),
    /// A pre-issued OAuth access token.
    AccessToken(String),
}

/// Settings for the optional LLM personalization path.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub spreadsheet_id: String,
    pub credentials: SheetsCredentials,
    pub sheets_base_url: String,
    pub lead_tab: String,
    pub fallback_tabs: Vec<String>,
    pub output_tab: Option<String>,
    pub csv_output_path: Option<PathBuf>,
    pub max_leads: Option<usize>,
    pub enrich: bool,
    pub skip_ready: bool,
    pub city: String,
    pub delay: Duration,
    pub navigation_timeout: Duration,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub whatsapp_profile_dir: PathBuf,
    pub llm: Option<LlmConfig>,
}

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_FALLBACK_TABS: &[&str] = &["Leads", "Sheet1", "Hoja 1", "Hoja1", "Prospectos"];

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let credentials = match std::env::var("GOOGLE_ACCESS_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            Some(token) => SheetsCredentials::AccessToken(token),
            None => {
                let path = std::env::var("GOOGLE_CREDENTIALS_PATH")
                    .unwrap_or_else(|_| "credentials.json".to_string());
                if path.trim().is_empty() {
                    anyhow::bail!("GOOGLE_CREDENTIALS_PATH cannot be empty");
                }
                SheetsCredentials::ServiceAccountFile(PathBuf::from(path))
            }
        };

        let llm = match std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            Some(api_key) => Some(LlmConfig {
                api_key,
                base_url: std::env::var("LLM_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: std::env::var("LLM_MODEL")
                    .unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            }),
            None => None,
        };

        let config = Self {
            spreadsheet_id: std::env::var("SPREADSHEET_ID")
                .or_else(|_| std::env::var("GOOGLE_SHEET_ID"))
                .map_err(|_| {
                    anyhow::anyhow!("SPREADSHEET_ID or GOOGLE_SHEET_ID environment variable required")
                })
                .and_then(|id| {
                    if id.trim().is_empty() {
                        anyhow::bail!("SPREADSHEET_ID cannot be empty");
                    }
                    Ok(id)
                })?,
            credentials,
            sheets_base_url: std::env::var("SHEETS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_SHEETS_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            lead_tab: std::env::var("LEAD_TAB").unwrap_or_else(|_| "Leads".to_string()),
            fallback_tabs: std::env::var("FALLBACK_TABS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_else(|_| {
                    DEFAULT_FALLBACK_TABS.iter().map(|s| s.to_string()).collect()
                }),
            output_tab: std::env::var("OUTPUT_TAB")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .or_else(|| Some("Mensajes".to_string())),
            csv_output_path: std::env::var("CSV_OUTPUT_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            max_leads: match std::env::var("MAX_LEADS") {
                Ok(raw) if !raw.trim().is_empty() => Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| anyhow::anyhow!("MAX_LEADS must be a positive number"))?,
                ),
                _ => None,
            },
            enrich: parse_flag("ENRICH", true)?,
            skip_ready: parse_flag("SKIP_READY", false)?,
            city: std::env::var("CITY").unwrap_or_else(|_| "Cancún".to_string()),
            delay: Duration::from_millis(
                std::env::var("DELAY_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("DELAY_MS must be a number of milliseconds"))?,
            ),
            navigation_timeout: Duration::from_secs(
                std::env::var("NAVIGATION_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("NAVIGATION_TIMEOUT_SECS must be a number"))?,
            ),
            chrome_path: std::env::var("CHROME_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            headless: parse_flag("HEADLESS", true)?,
            whatsapp_profile_dir: PathBuf::from(
                std::env::var("WHATSAPP_PROFILE_DIR")
                    .unwrap_or_else(|_| ".whatsapp-profile".to_string()),
            ),
            llm,
        };

        if config.navigation_timeout.is_zero() {
            anyhow::bail!("NAVIGATION_TIMEOUT_SECS must be greater than zero");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Spreadsheet: {}", config.spreadsheet_id);
        tracing::debug!(
            "Lead tab: {} (fallbacks: {:?})",
            config.lead_tab,
            config.fallback_tabs
        );
        tracing::debug!("Enrichment enabled: {}", config.enrich);
        if let Some(ref llm) = config.llm {
            tracing::info!("LLM personalization enabled: {} ({})", llm.model, llm.base_url);
        }

        Ok(config)
    }

    /// The lead tab followed by every fallback tab not equal to it, in order.
    pub fn source_tabs(&self) -> Vec<String> {
        let mut tabs = vec![self.lead_tab.clone()];
        for tab in &self.fallback_tabs {
            if !tabs.iter().any(|t| t.eq_ignore_ascii_case(tab)) {
                tabs.push(tab.clone());
            }
        }
        tabs
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(name: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{} must be true or false, got '{}'", name, other),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_drops_empty() {
        assert_eq!(
            parse_list(" Leads, Hoja 1 ,,Sheet1 "),
            vec!["Leads", "Hoja 1", "Sheet1"]
        );
    }

    #[test]
    fn test_source_tabs_dedupes_lead_tab() {
        let config = Config {
            spreadsheet_id: "sheet".to_string(),
            credentials: SheetsCredentials::AccessToken("t".to_string()),
            sheets_base_url: DEFAULT_SHEETS_BASE_URL.to_string(),
            lead_tab: "leads".to_string(),
            fallback_tabs: vec!["Leads".to_string(), "Sheet1".to_string()],
            output_tab: None,
            csv_output_path: None,
            max_leads: None,
            enrich: false,
            skip_ready: false,
            city: "Cancún".to_string(),
            delay: Duration::ZERO,
            navigation_timeout: Duration::from_secs(12),
            chrome_path: None,
            headless: true,
            whatsapp_profile_dir: PathBuf::from(".whatsapp-profile"),
            llm: None,
        };

        assert_eq!(config.source_tabs(), vec!["leads", "Sheet1"]);
    }
}
