//! Category registry records.
//!
//! Categories are versionless, never mutated, and referenced from notes by
//! name only. A category with no referencing notes is still valid.

use crate::store::{DocId, StoredDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static INNER_WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Persisted body of one category document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDocument {
    pub name: String,
}

/// Category as seen by readers, including its store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: DocId,
    pub name: String,
}

impl Category {
    /// Decodes a category from a stored document.
    pub fn from_stored(stored: &StoredDocument) -> Result<Self, serde_json::Error> {
        let document: CategoryDocument = serde_json::from_value(stored.data.clone())?;
        Ok(Self {
            id: stored.id,
            name: document.name,
        })
    }
}

/// Normalizes one category name.
///
/// Returns `None` for empty or whitespace-only input. Inner whitespace runs
/// collapse to one space.
pub fn normalize_category_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(INNER_WHITESPACE_RE.replace_all(trimmed, " ").into_owned())
}

#[cfg(test)]
mod tests {
    use super::normalize_category_name;

    #[test]
    fn normalize_rejects_blank_names() {
        assert_eq!(normalize_category_name(""), None);
        assert_eq!(normalize_category_name(" \t\n "), None);
    }

    #[test]
    fn normalize_trims_and_collapses_whitespace() {
        assert_eq!(
            normalize_category_name("  Side   Projects \t").as_deref(),
            Some("Side Projects")
        );
        assert_eq!(normalize_category_name("Work").as_deref(), Some("Work"));
    }
}
