//! The single persisted record describing the last successful check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::snapshot::{Document, Listing};

/// Last known state of the listing, overwritten after every successful check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default, alias = "hasStar")]
    pub has_marker: bool,
    #[serde(default, alias = "text")]
    pub summary_text: String,
    /// Documents keyed by url.
    #[serde(default)]
    pub documents: BTreeMap<String, Document>,
    #[serde(default, alias = "lastCheck")]
    pub last_check: Option<DateTime<Utc>>,
}

impl PersistedState {
    /// Build the record that replaces the stored one after a successful check.
    pub fn from_listing(listing: &Listing, checked_at: DateTime<Utc>) -> Self {
        let documents = listing
            .documents()
            .unwrap_or_default()
            .iter()
            .map(|doc| (doc.url.clone(), doc.clone()))
            .collect();

        Self {
            has_marker: listing.has_marker,
            summary_text: listing.summary_text.clone(),
            documents,
            last_check: Some(checked_at),
        }
    }

    pub fn contains_document(&self, url: &str) -> bool {
        self.documents.contains_key(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_listing_keys_documents_by_url() {
        let listing = Listing::with_documents(
            true,
            vec![
                Document::new("Bases", "Bases", "u1", "01/12/2025"),
                Document::new("Listas", "Admitidos", "u2", "02/12/2025"),
                Document::new("Listas", "Admitidos (corrección)", "u2", "03/12/2025"),
            ],
        );
        let state = PersistedState::from_listing(&listing, Utc::now());
        assert!(state.has_marker);
        assert_eq!(state.documents.len(), 2);
        assert!(state.contains_document("u1"));
        assert!(state.last_check.is_some());
    }

    #[test]
    fn test_legacy_record_keys() {
        let json = r#"{"hasStar":true,"text":"CONVOCATORIA EXTERNA","lastCheck":"2025-11-20T10:00:00.000Z"}"#;
        let state: PersistedState = serde_json::from_str(json).unwrap();
        assert!(state.has_marker);
        assert_eq!(state.summary_text, "CONVOCATORIA EXTERNA");
        assert!(state.documents.is_empty());
        assert!(state.last_check.is_some());
    }

    #[test]
    fn test_empty_object_is_default() {
        let state: PersistedState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, PersistedState::default());
    }
}
