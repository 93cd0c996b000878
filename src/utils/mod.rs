//! Utility functions and helpers.

pub mod http;
pub mod retry;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Extract a board's numeric posting ID from a vacancy URL.
pub fn extract_posting_id(url: &str) -> Option<String> {
    // dou: /vacancies/123456/, djinni: /jobs/123456-python-dev/
    let patterns = [
        regex::Regex::new(r"/vacancies/(\d+)").ok()?,
        regex::Regex::new(r"/jobs/(\d+)").ok()?,
    ];

    for pattern in &patterns {
        if let Some(caps) = pattern.captures(url) {
            if let Some(id) = caps.get(1) {
                return Some(id.as_str().to_string());
            }
        }
    }
    None
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.globallogic.com/career-search-page/").unwrap();
        assert_eq!(
            resolve_url(&base, "/careers/python-irc1/"),
            "https://www.globallogic.com/careers/python-irc1/"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_extract_posting_id() {
        assert_eq!(
            extract_posting_id("https://jobs.dou.ua/companies/acme/vacancies/271828/"),
            Some("271828".to_string())
        );
        assert_eq!(
            extract_posting_id("https://djinni.co/jobs/31415-python-developer/"),
            Some("31415".to_string())
        );
        assert_eq!(extract_posting_id("https://example.com/about"), None);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("привіт світ", 6), "привіт");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
