//! Job posting data structures.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deterministic fingerprint used for deduplication.
///
/// Hex-encoded SHA-256 over the normalized stable fields of a posting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Wrap an already computed key (e.g. one read back from the store).
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the work is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkModel {
    Remote,
    Hybrid,
    OnSite,
    Freelance,
}

impl WorkModel {
    /// Parse the loose spellings boards use ("On-site", "onsite", "office").
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase().replace(['-', '_', ' '], "");
        match lowered.as_str() {
            "remote" | "віддалено" => Some(Self::Remote),
            "hybrid" => Some(Self::Hybrid),
            "onsite" | "office" => Some(Self::OnSite),
            "freelance" => Some(Self::Freelance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Hybrid => "hybrid",
            Self::OnSite => "on-site",
            Self::Freelance => "freelance",
        }
    }
}

impl fmt::Display for WorkModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as produced by a board, before normalization.
///
/// Every field is optional because boards differ in what they expose;
/// the normalizer decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosting {
    /// Board the record came from (e.g. "dou")
    pub source: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub url: Option<String>,
    /// Board-assigned identifier, when the board exposes one
    pub site_id: Option<String>,
    pub location: Option<String>,
    pub experience_level: Option<String>,
    pub work_model: Option<String>,
    /// Routing category assigned by the board configuration
    pub category: Option<String>,
    pub salary: Option<String>,
    pub summary: Option<String>,
    /// Board-provided publication date, verbatim
    pub published: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl RawPosting {
    /// Start an empty record for `source` scraped at `scraped_at`.
    pub fn new(source: impl Into<String>, scraped_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            scraped_at,
            ..Self::default()
        }
    }
}

/// A canonical posting with a stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub identity_key: IdentityKey,
    pub source: String,
    pub title: String,
    pub company: Option<String>,
    /// Canonical URL (or empty when only a site ID was available)
    pub url: String,
    pub location: Option<String>,
    pub experience_level: Option<String>,
    pub work_model: Option<WorkModel>,
    pub category: String,
    pub salary: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Posting {
    /// Format the posting for display using a template.
    ///
    /// Supported placeholders:
    /// - `{source}`, `{category}`, `{title}`, `{company}`, `{url}`
    /// - `{location}`, `{experience}`, `{work_model}`, `{salary}`
    /// - `{summary}`, `{published}`
    ///
    /// Missing optional fields render as `N/A`.
    pub fn format(&self, template: &str) -> String {
        fn or_na(value: Option<&str>) -> &str {
            value.filter(|v| !v.is_empty()).unwrap_or("N/A")
        }

        let work_model = self.work_model.map(|w| w.as_str());

        template
            .replace("{source}", &self.source)
            .replace("{category}", &self.category)
            .replace("{title}", &self.title)
            .replace("{company}", or_na(self.company.as_deref()))
            .replace("{url}", or_na(Some(self.url.as_str())))
            .replace("{location}", or_na(self.location.as_deref()))
            .replace("{experience}", or_na(self.experience_level.as_deref()))
            .replace("{work_model}", or_na(work_model))
            .replace("{salary}", or_na(self.salary.as_deref()))
            .replace("{summary}", or_na(self.summary.as_deref()))
            .replace("{published}", or_na(self.published.as_deref()))
    }
}
