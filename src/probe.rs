//! Enrichment probe: website inspection and map-listing inspection.
//!
//! Neither sub-probe returns an error. Anything that goes wrong is logged and
//! folded into the `EnrichmentResult` as "no data" (or, for an unreachable
//! website, the inaccessible issue).

use crate::browser::{fetch_page, PageFetcher, PageSnapshot};
use crate::classifier::{guess_business_type, keyword_matches, FEW_REVIEWS_THRESHOLD};
use crate::config::Config;
use crate::contact::{fold_text, normalize_website};
use crate::models::{
    BusinessType, EnrichmentResult, Lead, ISSUE_FEW_REVIEWS, ISSUE_NOT_MOBILE_FRIENDLY,
    ISSUE_NOT_ON_MAPS, ISSUE_NO_CONTACT_FORM, ISSUE_WEBSITE_INACCESSIBLE,
};
use crate::ranked::ProbeReport;
use moka::future::Cache;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;

pub const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// Folded phrases that indicate online booking on a website. Single words
/// match as word prefixes, so bare "reserva" is left out: it would hit the
/// "derechos reservados" footer.
const BOOKING_VOCABULARY: &[&str] = &[
    "reserva tu", "reserva su", "reserva ya", "reserva ahora", "reserva en linea",
    "reservar", "reservacion", "booking", "book now", "agenda tu cita", "agendar",
    "agenda una cita", "citas en linea", "opentable", "check availability",
    "disponibilidad",
];

/// Selectors for a result card. The first one that matches is used.
const RESULT_CARD_SELECTORS: &[&str] = &[
    "div[role='feed'] div[role='article']",
    "div[role='article']",
    "div.Nv2PK",
    "div[role='main'] h1.DUwDvf",
];

/// What the website inspection found in a rendered page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebsiteInspection {
    pub mobile_friendly: bool,
    pub has_contact_form: bool,
    pub has_booking: bool,
    pub detected_type: Option<BusinessType>,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Inspect a rendered website. Pure: no I/O.
pub fn inspect_website_html(html: &str, text: &str) -> WebsiteInspection {
    let document = Html::parse_document(html);

    let mobile_friendly = selector("meta[name='viewport']")
        .map(|s| {
            document.select(&s).any(|meta| {
                meta.value()
                    .attr("content")
                    .map(|c| c.replace(' ', "").to_lowercase().contains("width=device-width"))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);

    let has_contact_form = selector("form")
        .map(|s| {
            document.select(&s).any(|form| {
                let action = form.value().attr("action").unwrap_or_default().to_lowercase();
                let has_fields = selector("input[type='email'], input[type='tel'], textarea")
                    .map(|fields| form.select(&fields).next().is_some())
                    .unwrap_or(false);
                has_fields || action.contains("contact")
            })
        })
        .unwrap_or(false);

    // Rendered text, else the text nodes of the parsed document
    let visible_text = if text.trim().is_empty() {
        document.root_element().text().collect::<Vec<_>>().join(" ")
    } else {
        text.to_string()
    };
    let title = selector("title")
        .and_then(|s| document.select(&s).next())
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();

    let folded = fold_text(&visible_text);
    let has_booking = BOOKING_VOCABULARY.iter().any(|w| keyword_matches(&folded, w));
    let detected_type = guess_business_type(&format!("{} {}", title, visible_text));

    WebsiteInspection {
        mobile_friendly,
        has_contact_form,
        has_booking,
        detected_type,
    }
}

/// Rating and review count read off a result card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub stars: f32,
    pub reviews: u32,
}

/// Outcome of inspecting a map search page.
#[derive(Debug, Clone, PartialEq)]
pub struct MapListing {
    pub listed: bool,
    pub rating: Option<Rating>,
    /// Which extraction strategies ran, and which one produced the rating.
    pub extraction: String,
}

fn parse_stars(raw: &str) -> Option<f32> {
    let stars: f32 = raw.trim().replace(',', ".").parse().ok()?;
    (0.0..=5.0).contains(&stars).then_some(stars)
}

fn parse_count(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// A lone `d.d` / `d,d` figure. The surrounding guards keep it from matching
/// inside a thousands-separated count such as "1,234".
fn rating_regex() -> Result<Regex, String> {
    Regex::new(r"(?:^|[^\d.,])(\d[.,]\d)(?:[^\d.,]|[.,](?:\D|$)|$)").map_err(|e| e.to_string())
}

fn reviews_regex() -> Result<Regex, String> {
    Regex::new(r"\(?\s*(\d{1,3}(?:[.,]\d{3})*|\d+)\s*\)?\s*(?:reseñas|reseña|opiniones|reviews|review)")
        .map_err(|e| e.to_string())
}

/// `aria-label="4.5 estrellas 120 reseñas"` on the stars image.
fn rating_from_aria_label(card: ElementRef) -> Result<Option<Rating>, String> {
    let stars_image = Selector::parse("span[role='img'][aria-label]").map_err(|e| e.to_string())?;
    let stars_re = rating_regex()?;
    let reviews_re = reviews_regex()?;

    for element in card.select(&stars_image) {
        let label = element.value().attr("aria-label").unwrap_or_default();
        let stars = stars_re
            .captures(label)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_stars(m.as_str()));
        let reviews = reviews_re
            .captures(label)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_count(m.as_str()));
        if let (Some(stars), Some(reviews)) = (stars, reviews) {
            return Ok(Some(Rating { stars, reviews }));
        }
    }
    Ok(None)
}

/// Result-list markup: `span.MW4etd` holds the rating, `span.UY7F9` "(120)".
fn rating_from_list_spans(card: ElementRef) -> Result<Option<Rating>, String> {
    let rating_span = Selector::parse("span.MW4etd").map_err(|e| e.to_string())?;
    let reviews_span = Selector::parse("span.UY7F9").map_err(|e| e.to_string())?;

    let stars = card
        .select(&rating_span)
        .next()
        .and_then(|e| parse_stars(&e.text().collect::<String>()));
    let reviews = card
        .select(&reviews_span)
        .next()
        .and_then(|e| parse_count(&e.text().collect::<String>()));

    Ok(match (stars, reviews) {
        (Some(stars), Some(reviews)) => Some(Rating { stars, reviews }),
        (Some(stars), None) => Some(Rating { stars, reviews: 0 }),
        _ => None,
    })
}

/// Place-page header: `div.F7nice` with text like "4.6(1,234)".
fn rating_from_place_header(card: ElementRef) -> Result<Option<Rating>, String> {
    let header = Selector::parse("div.F7nice").map_err(|e| e.to_string())?;
    let re = Regex::new(r"(\d[.,]\d)\s*\(\s*([\d.,]+)\s*\)").map_err(|e| e.to_string())?;

    let Some(element) = card.select(&header).next() else {
        return Ok(None);
    };
    let text = element.text().collect::<String>();
    Ok(re.captures(&text).and_then(|c| {
        let stars = parse_stars(c.get(1)?.as_str())?;
        let reviews = parse_count(c.get(2)?.as_str())?;
        Some(Rating { stars, reviews })
    }))
}

/// Last resort: regexes over the card's text.
fn rating_from_card_text(card: ElementRef) -> Result<Option<Rating>, String> {
    let text = card.text().collect::<Vec<_>>().join(" ");
    let stars = rating_regex()?
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_stars(m.as_str()));
    let reviews = reviews_regex()?
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_count(m.as_str()));

    Ok(stars.map(|stars| Rating {
        stars,
        reviews: reviews.unwrap_or(0),
    }))
}

type RatingStrategy = fn(ElementRef) -> Result<Option<Rating>, String>;

/// Extraction strategies in the order they are tried.
const RATING_STRATEGIES: &[(&str, RatingStrategy)] = &[
    ("aria-label", rating_from_aria_label),
    ("list-spans", rating_from_list_spans),
    ("place-header", rating_from_place_header),
    ("card-text", rating_from_card_text),
];

fn first_result_card(document: &Html) -> Option<ElementRef<'_>> {
    RESULT_CARD_SELECTORS.iter().find_map(|css| {
        let s = selector(css)?;
        let element = document.select(&s).next()?;
        // A bare place title stands in for its surrounding panel
        if element.value().name() == "h1" {
            selector("div[role='main']").and_then(|main| document.select(&main).next())
        } else {
            Some(element)
        }
    })
}

/// Inspect a rendered map search page. Pure: no I/O.
///
/// No result card means "not listed". A card without a readable rating is
/// still a listing.
pub fn parse_map_listing(html: &str) -> MapListing {
    let document = Html::parse_document(html);

    let Some(card) = first_result_card(&document) else {
        return MapListing {
            listed: false,
            rating: None,
            extraction: "no result card".to_string(),
        };
    };

    let report: ProbeReport<Rating> = ProbeReport::run(
        RATING_STRATEGIES
            .iter()
            .map(|(name, strategy)| (*name, move || strategy(card))),
    );

    MapListing {
        listed: true,
        rating: report.value,
        extraction: report.to_string(),
    }
}

pub fn map_search_url(business_name: &str, city: &str) -> String {
    let query = format!("{} {}", business_name.trim(), city.trim());
    format!("{}{}", MAPS_SEARCH_URL, urlencoding::encode(query.trim()))
}

/// Runs both sub-probes for a lead, caching by (website, business name).
pub struct Prober {
    fetcher: Arc<dyn PageFetcher>,
    city: String,
    timeout: Duration,
    cache: Cache<String, EnrichmentResult>,
}

impl Prober {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Self {
        Self::with_settings(fetcher, &config.city, config.navigation_timeout)
    }

    pub fn with_settings(fetcher: Arc<dyn PageFetcher>, city: &str, timeout: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(5_000)
            .build();
        Self {
            fetcher,
            city: city.to_string(),
            timeout,
            cache,
        }
    }

    fn cache_key(lead: &Lead) -> String {
        format!(
            "{}|{}",
            normalize_website(lead.website.as_deref()).unwrap_or_default(),
            fold_text(&lead.business_name)
        )
    }

    /// Enrich one lead. Never fails.
    pub async fn enrich(&self, lead: &Lead) -> EnrichmentResult {
        let key = Self::cache_key(lead);
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!("Probe cache hit for {}", lead.business_name);
            return cached;
        }

        let mut result = EnrichmentResult::from_lead(lead);

        if let Some(url) = normalize_website(lead.website.as_deref()) {
            self.inspect_website(&url, &mut result).await;
        }
        if !lead.business_name.trim().is_empty() {
            self.inspect_map_listing(&lead.business_name, &mut result).await;
        }

        tracing::info!("✓ Enriched {}: {}", lead.business_name, result.summary());
        self.cache.insert(key, result.clone()).await;
        result
    }

    async fn inspect_website(&self, url: &str, result: &mut EnrichmentResult) {
        result.website_checked = true;

        match fetch_page(
            self.fetcher.clone(),
            url.to_string(),
            Some("body".to_string()),
            self.timeout,
        )
        .await
        {
            Ok(PageSnapshot { html, text, .. }) => {
                apply_website_inspection(&inspect_website_html(&html, &text), result);
            }
            Err(e) => {
                tracing::warn!("⚠ Website {} not reachable: {}", url, e);
                result.website_accessible = false;
                result.push_issue(ISSUE_WEBSITE_INACCESSIBLE);
            }
        }
    }

    async fn inspect_map_listing(&self, business_name: &str, result: &mut EnrichmentResult) {
        let url = map_search_url(business_name, &self.city);

        match fetch_page(
            self.fetcher.clone(),
            url,
            Some("div[role='main'], div[role='feed']".to_string()),
            self.timeout,
        )
        .await
        {
            Ok(snapshot) => {
                let listing = parse_map_listing(&snapshot.html);
                tracing::debug!("Map listing for {}: {}", business_name, listing.extraction);
                apply_map_listing(&listing, result);
            }
            Err(e) => {
                // No data rather than "not listed"
                tracing::warn!("⚠ Map search for {} failed: {}", business_name, e);
            }
        }
    }
}

pub fn apply_website_inspection(inspection: &WebsiteInspection, result: &mut EnrichmentResult) {
    result.website_checked = true;
    result.website_accessible = true;
    result.mobile_friendly = inspection.mobile_friendly;
    result.has_contact_form = inspection.has_contact_form;
    result.has_booking = inspection.has_booking;
    result.detected_type = inspection.detected_type;

    if !inspection.mobile_friendly {
        result.push_issue(ISSUE_NOT_MOBILE_FRIENDLY);
    }
    if !inspection.has_contact_form {
        result.push_issue(ISSUE_NO_CONTACT_FORM);
    }
}

pub fn apply_map_listing(listing: &MapListing, result: &mut EnrichmentResult) {
    result.map_checked = true;
    result.has_map_listing = listing.listed;

    if !listing.listed {
        result.push_issue(ISSUE_NOT_ON_MAPS);
        return;
    }
    if let Some(rating) = listing.rating {
        result.rating = Some(rating.stars);
        result.review_count = rating.reviews;
        if rating.reviews < FEW_REVIEWS_THRESHOLD {
            result.push_issue(ISSUE_FEW_REVIEWS);
        }
    }
}
