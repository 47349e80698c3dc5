//! Contact-field normalization: phone numbers, website URLs and the
//! accent-insensitive text folding shared by header matching and keyword rules.

use phonenumber::country::Id as CountryId;
use phonenumber::Mode;

/// Country calling code prepended to every normalized phone.
pub const COUNTRY_CODE: &str = "52";

/// Lowercases and strips Spanish diacritics so "Clínica" matches "clinica".
pub fn fold_text(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Normalize a free-form phone to digits with the Mexican country code.
///
/// Numbers that parse as valid for the MX region are formatted as E.164
/// without the leading `+`. Anything else falls back to stripping
/// non-digits and prefixing `52`, so the result is never empty.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() >= 8 {
        if let Ok(number) = phonenumber::parse(Some(CountryId::MX), raw) {
            if phonenumber::is_valid(&number) && number.code().value() == 52 {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("✓ Valid MX phone: {} → {}", raw, formatted);
                return formatted.trim_start_matches('+').to_string();
            }
        }
    }

    // Legacy mobile prefix: 52 1 + ten digits
    if digits.len() == 13 && digits.starts_with("521") {
        return format!("{}{}", COUNTRY_CODE, &digits[3..]);
    }
    if digits.len() == 12 && digits.starts_with(COUNTRY_CODE) {
        return digits;
    }

    if digits.len() != 10 {
        tracing::warn!("⚠ Phone '{}' is not a 10-digit MX number, using best effort", raw);
    }
    format!("{}{}", COUNTRY_CODE, digits)
}

/// Whether the normalized phone looks dialable (country code + 10 digits).
pub fn is_dialable(normalized: &str) -> bool {
    normalized.len() == 12
        && normalized.starts_with(COUNTRY_CODE)
        && normalized.chars().all(|c| c.is_ascii_digit())
}

const NO_WEBSITE_MARKERS: &[&str] = &[
    "-", "n/a", "na", "no", "none", "ninguno", "ninguna", "sin sitio", "sin web", "no tiene",
];

/// Returns a full `http(s)` URL when the cell looks like a website.
pub fn normalize_website(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || NO_WEBSITE_MARKERS.contains(&fold_text(trimmed).as_str()) {
        return None;
    }
    if trimmed.chars().any(char::is_whitespace) {
        return None;
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = url::Url::parse(&candidate).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?;
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return None;
    }
    let tld = labels.last().copied().unwrap_or_default();
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(parsed.to_string())
}

pub fn is_plausible_website(raw: Option<&str>) -> bool {
    normalize_website(raw).is_some()
}

/// Click-to-chat link for CSV exports.
pub fn wa_me_link(normalized_phone: &str) -> String {
    format!("https://wa.me/{}", normalized_phone)
}

/// WhatsApp Web URL that opens a chat with the text pre-filled.
pub fn whatsapp_web_send_url(normalized_phone: &str, text: &str) -> String {
    format!(
        "https://web.whatsapp.com/send?phone={}&text={}",
        normalized_phone,
        urlencoding::encode(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_text_strips_accents() {
        assert_eq!(fold_text("Clínica Dental Señor"), "clinica dental senor");
        assert_eq!(fold_text("CAFÉ"), "cafe");
    }

    #[test]
    fn test_normalize_ten_digit_phone() {
        assert_eq!(normalize_phone("9981234567"), "529981234567");
        assert_eq!(normalize_phone("(998) 123-4567"), "529981234567");
    }

    #[test]
    fn test_normalize_phone_with_country_code() {
        assert_eq!(normalize_phone("+52 998 123 4567"), "529981234567");
        assert_eq!(normalize_phone("5219981234567"), "529981234567");
    }

    #[test]
    fn test_normalize_malformed_phone_is_best_effort() {
        assert_eq!(normalize_phone("abc"), "52");
        assert_eq!(normalize_phone(""), "52");
        assert_eq!(normalize_phone("ext 123"), "52123");
    }

    #[test]
    fn test_is_dialable() {
        assert!(is_dialable("529981234567"));
        assert!(!is_dialable("52"));
        assert!(!is_dialable("52998123"));
    }

    #[test]
    fn test_normalize_website() {
        assert_eq!(
            normalize_website(Some("elsabor.mx")).as_deref(),
            Some("https://elsabor.mx/")
        );
        assert_eq!(
            normalize_website(Some("http://www.hotel.com/inicio")).as_deref(),
            Some("http://www.hotel.com/inicio")
        );
        assert_eq!(normalize_website(Some("")), None);
        assert_eq!(normalize_website(Some("N/A")), None);
        assert_eq!(normalize_website(Some("no tiene")), None);
        assert_eq!(normalize_website(Some("localhost")), None);
        assert_eq!(normalize_website(Some("ftp://files.example.com")), None);
        assert_eq!(normalize_website(None), None);
    }

    #[test]
    fn test_whatsapp_web_send_url_encodes_text() {
        let url = whatsapp_web_send_url("529981234567", "Hola, ¿qué tal?");
        assert!(url.starts_with("https://web.whatsapp.com/send?phone=529981234567&text="));
        assert!(!url.contains(' '));
    }
}
