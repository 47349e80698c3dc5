//! Headless Chrome access behind the [`PageFetcher`] trait.
//!
//! `headless_chrome` is a blocking API; async callers go through
//! [`fetch_page`], which runs the fetch on the blocking pool under a timeout.

use crate::config::Config;
use crate::errors::AppError;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Rendered state of a page after navigation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub html: String,
    /// `document.body.innerText`, empty when the page has no body.
    pub text: String,
    pub final_url: String,
}

/// Loads a page and returns its rendered snapshot.
///
/// Implementations block; they are only called from `spawn_blocking`.
pub trait PageFetcher: Send + Sync {
    /// Navigate to `url`, optionally waiting for `wait_for` to appear.
    fn fetch(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<PageSnapshot, AppError>;
}

/// Launch settings, taken from `Config`.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Persistent profile directory. `None` uses a throwaway profile.
    pub profile_dir: Option<PathBuf>,
}

impl BrowserOptions {
    /// Options for the enrichment probe: throwaway profile.
    pub fn for_probe(config: &Config) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            profile_dir: None,
        }
    }

    /// Options for the WhatsApp sender: visible window, persistent profile
    /// so the QR login survives between runs.
    pub fn for_whatsapp(config: &Config) -> Self {
        Self {
            headless: false,
            chrome_path: config.chrome_path.clone(),
            profile_dir: Some(config.whatsapp_profile_dir.clone()),
        }
    }
}

pub fn launch_browser(options: &BrowserOptions) -> Result<Browser, AppError> {
    let args: Vec<&OsStr> = vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--lang=es-MX"),
        OsStr::new("--no-first-run"),
    ];

    let browser = Browser::new(LaunchOptions {
        headless: options.headless,
        path: options.chrome_path.clone(),
        user_data_dir: options.profile_dir.clone(),
        window_size: Some((1366, 900)),
        idle_browser_timeout: Duration::from_secs(300),
        args,
        ..Default::default()
    })
    .map_err(|e| AppError::Browser(format!("Failed to launch Chrome: {}", e)))?;

    tracing::info!(
        "✓ Chrome launched (headless: {}, profile: {})",
        options.headless,
        options
            .profile_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "temporary".to_string())
    );
    Ok(browser)
}

const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// One Chrome process shared by every probe of a run.
/// Each fetch opens and closes its own tab.
pub struct ChromeFetcher {
    browser: Browser,
}

impl ChromeFetcher {
    pub fn new(browser: Browser) -> Self {
        Self { browser }
    }

    pub fn launch(options: &BrowserOptions) -> Result<Self, AppError> {
        Ok(Self::new(launch_browser(options)?))
    }
}

impl PageFetcher for ChromeFetcher {
    fn fetch(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<PageSnapshot, AppError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to open tab: {}", e)))?;
        tab.set_default_timeout(timeout);

        let result = (|| -> Result<PageSnapshot, AppError> {
            tab.navigate_to(url)
                .and_then(|t| t.wait_until_navigated())
                .map_err(|e| AppError::Browser(format!("Navigation to {} failed: {}", url, e)))?;

            if let Some(selector) = wait_for {
                // Missing element is not fatal: the snapshot tells the caller
                if let Err(e) = tab.wait_for_element_with_custom_timeout(selector, timeout) {
                    tracing::debug!("Element '{}' not found on {}: {}", selector, url, e);
                }
            }

            let html = tab
                .get_content()
                .map_err(|e| AppError::Browser(format!("Reading content failed: {}", e)))?;
            let text = tab
                .evaluate(BODY_TEXT_JS, false)
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();

            Ok(PageSnapshot {
                html,
                text,
                final_url: tab.get_url(),
            })
        })();

        if let Err(e) = tab.close(true) {
            tracing::debug!("Closing tab failed: {}", e);
        }
        result
    }
}

/// Run a blocking fetch on the blocking pool, bounded by `timeout`.
///
/// The outer timeout gets a small grace period over the navigation timeout
/// so the fetcher's own error wins when both fire.
pub async fn fetch_page(
    fetcher: Arc<dyn PageFetcher>,
    url: String,
    wait_for: Option<String>,
    timeout: Duration,
) -> Result<PageSnapshot, AppError> {
    let target = url.clone();
    let task = tokio::task::spawn_blocking(move || {
        fetcher.fetch(&url, wait_for.as_deref(), timeout)
    });

    match tokio::time::timeout(timeout + Duration::from_secs(2), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(AppError::Browser(format!(
            "Fetch task for {} failed: {}",
            target, join_error
        ))),
        Err(_) => Err(AppError::Timeout(format!(
            "{} did not load within {}s",
            target,
            timeout.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowFetcher;

    impl PageFetcher for SlowFetcher {
        fn fetch(&self, _: &str, _: Option<&str>, _: Duration) -> Result<PageSnapshot, AppError> {
            std::thread::sleep(Duration::from_secs(3));
            Ok(PageSnapshot::default())
        }
    }

    struct EchoFetcher;

    impl PageFetcher for EchoFetcher {
        fn fetch(
            &self,
            url: &str,
            wait_for: Option<&str>,
            _: Duration,
        ) -> Result<PageSnapshot, AppError> {
            Ok(PageSnapshot {
                html: format!("<html>{}</html>", wait_for.unwrap_or("")),
                text: String::new(),
                final_url: url.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_page_passes_through() {
        let snapshot = fetch_page(
            Arc::new(EchoFetcher),
            "https://example.mx".to_string(),
            Some("body".to_string()),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(snapshot.final_url, "https://example.mx");
        assert_eq!(snapshot.html, "<html>body</html>");
    }

    #[tokio::test]
    async fn test_fetch_page_times_out() {
        let result = fetch_page(
            Arc::new(SlowFetcher),
            "https://slow.example.mx".to_string(),
            None,
            Duration::from_millis(10),
        )
        .await;

        assert!(matches!(result, Err(AppError::Timeout(_))));
    }
}
