//! Posting normalization.
//!
//! Turns a board's [`RawPosting`] into a canonical [`Posting`] whose
//! [`IdentityKey`] survives re-scrapes with cosmetic differences: case,
//! runs of whitespace, trailing slashes, URL fragments and tracking params.

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{IdentityKey, Posting, RawPosting, WorkModel};

/// Category used when a board did not assign one.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Normalize one raw record. Pure; performs no I/O.
///
/// # Errors
///
/// [`AppError::MalformedInput`] when the title is blank or neither a URL
/// nor a site ID is present.
pub fn normalize(raw: &RawPosting) -> Result<Posting> {
    let title = clean_text(raw.title.as_deref())
        .ok_or_else(|| AppError::malformed(&raw.source, "missing title"))?;

    let url = raw.url.as_deref().and_then(link_url);
    let site_id = clean_text(raw.site_id.as_deref());

    let locator = match (&site_id, url.as_deref().and_then(canonical_url)) {
        (Some(id), _) => format!("id:{}", id.to_lowercase()),
        (None, Some(canonical)) => format!("url:{canonical}"),
        (None, None) => {
            return Err(AppError::malformed(
                &raw.source,
                format!("'{title}' has neither URL nor site ID"),
            ));
        }
    };

    let company = clean_text(raw.company.as_deref());
    let source = raw.source.trim().to_lowercase();
    let identity_key = identity_key(&source, &title, company.as_deref(), &locator);

    Ok(Posting {
        identity_key,
        source,
        title,
        company,
        url: url.unwrap_or_default(),
        location: clean_text(raw.location.as_deref()),
        experience_level: clean_text(raw.experience_level.as_deref()),
        work_model: raw.work_model.as_deref().and_then(WorkModel::parse),
        category: clean_text(raw.category.as_deref())
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        salary: clean_text(raw.salary.as_deref()),
        summary: clean_text(raw.summary.as_deref()),
        published: clean_text(raw.published.as_deref()),
        scraped_at: raw.scraped_at,
    })
}

/// Fingerprint the stable fields of a posting.
///
/// Title and company are compared case-insensitively; the locator is
/// already canonical.
pub fn identity_key(source: &str, title: &str, company: Option<&str>, locator: &str) -> IdentityKey {
    let title = title.to_lowercase();
    let company = company.unwrap_or("").to_lowercase();

    let mut hasher = Sha256::new();
    for part in [source, title.as_str(), company.as_str(), locator] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    IdentityKey::new(hex::encode(hasher.finalize()))
}

/// The link as delivered to users: trimmed, fragment dropped, otherwise
/// as scraped. Returns `None` for blank input.
pub fn link_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let link = match Url::parse(trimmed) {
        Ok(mut url) if url.has_host() => {
            url.set_fragment(None);
            url.to_string()
        }
        _ => trimmed.split('#').next().unwrap_or(trimmed).to_string(),
    };
    (!link.is_empty()).then_some(link)
}

/// Canonical form of a posting URL, used only for identity.
///
/// Absolute URLs are parsed so tracking params and fragments can be dropped.
/// Schemeless ones (`site/jobs/42`) are kept verbatim apart from case and
/// slashes. Returns `None` for blank input.
pub fn canonical_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let canonical = match Url::parse(trimmed) {
        Ok(mut url) if url.has_host() => {
            url.set_fragment(None);
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !k.starts_with("utm_"))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(kept);
            }
            url.to_string()
        }
        _ => trimmed.split('#').next().unwrap_or(trimmed).to_string(),
    };

    let canonical = canonical.to_lowercase();
    let canonical = canonical.trim_end_matches('/');
    if canonical.is_empty() {
        None
    } else {
        Some(canonical.to_string())
    }
}

/// Collapse whitespace; `None` for blank input.
fn clean_text(text: Option<&str>) -> Option<String> {
    let collapsed = text?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}
