//! WhatsApp Web sender.
//!
//! Chats are opened and messages sent through ranked strategies. Each
//! attempt is recorded, so a failed delivery says which strategies were
//! tried and why each one gave up.

use crate::browser::{launch_browser, BrowserOptions};
use crate::config::Config;
use crate::contact::{fold_text, is_dialable, whatsapp_web_send_url};
use crate::errors::AppError;
use crate::models::OutreachStatus;
use crate::ranked::ProbeReport;
use crate::sheets::SheetsClient;
use crate::sink::{mark_outbox_entry, update_outreach_status, OutboxEntry};
use crate::source::LoadedLeads;
use headless_chrome::{Browser, Tab};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WHATSAPP_WEB_URL: &str = "https://web.whatsapp.com/";

/// How long to wait for the QR login on a fresh profile.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(180);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

const CHAT_LIST_SELECTOR: &str = "div#pane-side";
const COMPOSE_SELECTOR: &str = "footer div[contenteditable='true']";
const NEW_CHAT_SELECTORS: &[&str] = &[
    "span[data-icon='new-chat-outline']",
    "div[title='Nuevo chat']",
    "div[title='New chat']",
];
const SEND_BUTTON_SELECTORS: &[&str] = &[
    "span[data-icon='send']",
    "button[aria-label='Enviar']",
    "button[aria-label='Send']",
];

/// Folded fragments of the popup shown for a number without WhatsApp.
const INVALID_NUMBER_MARKERS: &[&str] = &[
    "no es valido",
    "no esta en whatsapp",
    "is invalid",
    "isn't on whatsapp",
];

pub fn is_invalid_number_text(page_text: &str) -> bool {
    let folded = fold_text(page_text);
    INVALID_NUMBER_MARKERS.iter().any(|m| folded.contains(m))
}

/// Browser operations the sender needs. Each returns `Ok(false)` when the
/// strategy ran but could not do its job.
///
/// Implementations block.
pub trait ChatDriver: Send + Sync {
    /// Open the chat through the send URL with the text pre-filled.
    fn open_chat_by_url(&self, phone: &str, text: &str) -> Result<bool, AppError>;
    /// Open the chat through the new-chat search and type the text.
    fn open_chat_by_search(&self, phone: &str, text: &str) -> Result<bool, AppError>;
    fn click_send_button(&self) -> Result<bool, AppError>;
    fn press_enter(&self) -> Result<bool, AppError>;
}

type Step<'a> = Box<dyn FnOnce() -> Result<Option<()>, AppError> + 'a>;

fn step<'a>(f: impl FnOnce() -> Result<bool, AppError> + 'a) -> Step<'a> {
    Box::new(move || f().map(|done| done.then_some(())))
}

/// Attempts made to deliver one message.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub open_chat: ProbeReport<()>,
    /// `None` when no chat could be opened.
    pub send: Option<ProbeReport<()>>,
}

impl Delivery {
    pub fn sent(&self) -> bool {
        self.send.as_ref().map(|r| r.succeeded()).unwrap_or(false)
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "open chat [{}]", self.open_chat)?;
        if let Some(send) = &self.send {
            write!(f, ", send [{}]", send)?;
        }
        Ok(())
    }
}

/// Deliver one message with whichever strategies work.
pub fn deliver(driver: &dyn ChatDriver, phone: &str, text: &str) -> Delivery {
    let open_chat = ProbeReport::run(vec![
        ("direct-url", step(|| driver.open_chat_by_url(phone, text))),
        ("new-chat-search", step(|| driver.open_chat_by_search(phone, text))),
    ]);
    if !open_chat.succeeded() {
        return Delivery {
            open_chat,
            send: None,
        };
    }

    let send = ProbeReport::run(vec![
        ("send-button", step(|| driver.click_send_button())),
        ("enter-key", step(|| driver.press_enter())),
    ]);
    Delivery {
        open_chat,
        send: Some(send),
    }
}

/// WhatsApp Web in a Chrome window with a persistent profile.
pub struct ChromeChat {
    // Keeps the Chrome process alive for the tab
    _browser: Browser,
    tab: Arc<Tab>,
    timeout: Duration,
}

impl ChromeChat {
    /// Launch Chrome and wait until WhatsApp Web shows the chat list.
    pub fn open(options: &BrowserOptions, timeout: Duration) -> Result<Self, AppError> {
        let browser = launch_browser(options)?;
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to open tab: {}", e)))?;
        tab.set_default_timeout(timeout);

        tab.navigate_to(WHATSAPP_WEB_URL)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| AppError::Browser(format!("Opening WhatsApp Web failed: {}", e)))?;

        tracing::info!("Waiting for WhatsApp Web login (scan the QR code if asked)...");
        tab.wait_for_element_with_custom_timeout(CHAT_LIST_SELECTOR, LOGIN_TIMEOUT)
            .map_err(|_| {
                AppError::Browser(format!(
                    "WhatsApp Web not logged in after {}s",
                    LOGIN_TIMEOUT.as_secs()
                ))
            })?;
        tracing::info!("✓ WhatsApp Web session ready");

        Ok(Self {
            _browser: browser,
            tab,
            timeout,
        })
    }

    fn browser_err(action: &str, e: impl fmt::Display) -> AppError {
        AppError::Browser(format!("{}: {}", action, e))
    }

    fn body_text(&self) -> String {
        self.tab
            .evaluate("document.body ? document.body.innerText : ''", false)
            .ok()
            .and_then(|r| r.value)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Poll until the compose box shows up or the number is rejected.
    fn wait_for_compose_box(&self) -> Result<bool, AppError> {
        let deadline = Instant::now() + self.timeout;
        while Instant::now() < deadline {
            if self.tab.find_element(COMPOSE_SELECTOR).is_ok() {
                return Ok(true);
            }
            if is_invalid_number_text(&self.body_text()) {
                tracing::warn!("⚠ WhatsApp rejected the number");
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        Err(AppError::Timeout(format!(
            "compose box did not appear within {}s",
            self.timeout.as_secs()
        )))
    }

    fn insert_text(&self, text: &str) -> Result<(), AppError> {
        let encoded = serde_json::to_string(text)?;
        let script = format!(
            "(() => {{ const box = document.querySelector(\"{}\"); \
             if (!box) return false; box.focus(); \
             document.execCommand('insertText', false, {}); return true; }})()",
            COMPOSE_SELECTOR, encoded
        );
        let inserted = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Self::browser_err("Typing message", e))?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if inserted {
            Ok(())
        } else {
            Err(AppError::Browser("compose box disappeared".to_string()))
        }
    }
}

impl ChatDriver for ChromeChat {
    fn open_chat_by_url(&self, phone: &str, text: &str) -> Result<bool, AppError> {
        self.tab
            .navigate_to(&whatsapp_web_send_url(phone, text))
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| Self::browser_err("Opening send URL", e))?;
        self.wait_for_compose_box()
    }

    fn open_chat_by_search(&self, phone: &str, text: &str) -> Result<bool, AppError> {
        self.tab
            .navigate_to(WHATSAPP_WEB_URL)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| Self::browser_err("Opening WhatsApp Web", e))?;

        let new_chat = NEW_CHAT_SELECTORS
            .iter()
            .find_map(|s| self.tab.wait_for_element_with_custom_timeout(s, self.timeout).ok());
        let Some(button) = new_chat else {
            return Ok(false);
        };
        button
            .click()
            .map_err(|e| Self::browser_err("Clicking new chat", e))?;

        std::thread::sleep(POLL_INTERVAL);
        self.tab
            .type_str(phone)
            .map_err(|e| Self::browser_err("Typing phone", e))?;
        std::thread::sleep(Duration::from_secs(2));
        self.tab
            .press_key("Enter")
            .map_err(|e| Self::browser_err("Selecting contact", e))?;

        if !self.wait_for_compose_box()? {
            return Ok(false);
        }
        self.insert_text(text)?;
        Ok(true)
    }

    fn click_send_button(&self) -> Result<bool, AppError> {
        for selector in SEND_BUTTON_SELECTORS {
            if let Ok(button) = self
                .tab
                .wait_for_element_with_custom_timeout(selector, Duration::from_secs(3))
            {
                button
                    .click()
                    .map_err(|e| Self::browser_err("Clicking send", e))?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn press_enter(&self) -> Result<bool, AppError> {
        let compose = self
            .tab
            .find_element(COMPOSE_SELECTOR)
            .map_err(|e| Self::browser_err("Finding compose box", e))?;
        compose
            .click()
            .map_err(|e| Self::browser_err("Focusing compose box", e))?;
        self.tab
            .press_key("Enter")
            .map_err(|e| Self::browser_err("Pressing Enter", e))?;
        Ok(true)
    }
}

/// Counts for one sender run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Send every pending outbox entry, one at a time.
///
/// After each attempt the outbox row and the lead's source row are marked
/// `sent` or `failed`. Status write failures are logged, not fatal.
pub async fn send_pending(
    config: &Config,
    client: &SheetsClient,
    source: &LoadedLeads,
    outbox_tab: &str,
    outbox: &[OutboxEntry],
    driver: Arc<dyn ChatDriver>,
) -> SendSummary {
    let mut summary = SendSummary::default();

    for entry in outbox {
        let lead = source.leads.iter().find(|l| l.id == entry.lead_id);
        let already_sent = entry.status == OutreachStatus::Sent
            || lead.map(|l| l.outreach_status == OutreachStatus::Sent).unwrap_or(false);
        if already_sent {
            summary.skipped += 1;
            continue;
        }
        if !is_dialable(&entry.phone) {
            tracing::warn!("⚠ Skipping {}: phone '{}' is not dialable", entry.lead_id, entry.phone);
            summary.skipped += 1;
            continue;
        }

        summary.pending += 1;
        if summary.pending > 1 {
            tokio::time::sleep(config.delay).await;
        }

        let bound = send_bound(config.navigation_timeout);
        let status = match send_one(driver.clone(), entry, bound).await {
            Ok(delivery) if delivery.sent() => {
                tracing::info!("✓ Sent to {} ({}): {}", entry.business_name, entry.phone, delivery);
                summary.sent += 1;
                OutreachStatus::Sent
            }
            Ok(delivery) => {
                tracing::error!("❌ Not sent to {}: {}", entry.business_name, delivery);
                summary.failed += 1;
                OutreachStatus::Failed
            }
            Err(e) => {
                tracing::error!("❌ Not sent to {}: {}", entry.business_name, e);
                summary.failed += 1;
                OutreachStatus::Failed
            }
        };

        if let Err(e) = mark_outbox_entry(client, outbox_tab, entry, status).await {
            tracing::warn!("⚠ Could not update outbox row {}: {}", entry.row_number, e);
        }
        if let Some(lead) = lead {
            if let Err(e) = update_outreach_status(client, source, lead, status).await {
                tracing::warn!("⚠ {}", e);
            }
        }
    }

    tracing::info!(
        "Sender finished: {} sent, {} failed, {} skipped",
        summary.sent,
        summary.failed,
        summary.skipped
    );
    summary
}

/// Upper bound before a send is reported as slow. Both chat strategies may
/// each use the full navigation timeout.
fn send_bound(navigation_timeout: Duration) -> Duration {
    navigation_timeout * 3 + Duration::from_secs(10)
}

/// Run one delivery on the blocking pool.
///
/// Past `bound` the task is still awaited: it owns the chat tab and may yet
/// send the message, so the next lead must not start and the recorded status
/// must come from what the task actually did.
async fn send_one(
    driver: Arc<dyn ChatDriver>,
    entry: &OutboxEntry,
    bound: Duration,
) -> Result<Delivery, AppError> {
    let phone = entry.phone.clone();
    let text = entry.message.clone();
    let mut task = tokio::task::spawn_blocking(move || deliver(driver.as_ref(), &phone, &text));

    let joined = match tokio::time::timeout(bound, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!(
                "⚠ Sending to {} is taking over {}s, waiting for the browser to finish",
                entry.phone,
                bound.as_secs()
            );
            task.await
        }
    };
    joined.map_err(|e| AppError::Browser(format!("Send task failed: {}", e)))
}
