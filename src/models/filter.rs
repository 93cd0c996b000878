//! Search criteria shared by all boards.

use serde::{Deserialize, Serialize};

use crate::models::{Posting, WorkModel};

/// Caller-supplied criteria for a board.
///
/// Boards translate what they can into query parameters; [`SearchFilter::matches`]
/// re-checks the scraped result locally for the fields a posting actually carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Search keywords passed to the board (e.g. "python")
    #[serde(default)]
    pub keywords: Option<String>,

    /// Experience level in the board's own vocabulary (e.g. "0-1", "1-3+years")
    #[serde(default)]
    pub experience: Option<String>,

    /// Location or city filter
    #[serde(default)]
    pub location: Option<String>,

    /// Accepted work models; empty accepts all
    #[serde(default)]
    pub work_models: Vec<WorkModel>,

    /// Title must contain at least one of these terms; empty accepts all
    #[serde(default)]
    pub require_terms: Vec<String>,
}

impl SearchFilter {
    /// Check a normalized posting against the criteria.
    ///
    /// Fields the posting does not carry are not held against it.
    pub fn matches(&self, posting: &Posting) -> bool {
        if !self.require_terms.is_empty() {
            let title = posting.title.to_lowercase();
            let hit = self
                .require_terms
                .iter()
                .any(|term| title.contains(&term.to_lowercase()));
            if !hit {
                return false;
            }
        }

        if let (Some(model), false) = (posting.work_model, self.work_models.is_empty()) {
            if !self.work_models.contains(&model) {
                return false;
            }
        }

        // "remote" as a location means the work model, not a place
        if let (Some(wanted), Some(actual)) = (self.location.as_deref(), posting.location.as_deref())
        {
            let wanted = wanted.to_lowercase();
            if wanted != "remote" && !actual.to_lowercase().contains(&wanted) {
                return false;
            }
        }

        true
    }
}
