//! Change detection — previous persisted state vs. the fresh listing.

use starwatch_core::types::{ChangeEvent, Document, Listing, PersistedState, TrackedContent};
use std::collections::HashSet;

/// Compare `current` against `previous` and pick the single event to report.
///
/// Precedence: document additions/removals, then the marker's false→true
/// edge, then (free-text listings only) a non-empty summary change.
pub fn detect_change(previous: &PersistedState, current: &Listing) -> ChangeEvent {
    let marker_raised = !previous.has_marker && current.has_marker;

    match &current.content {
        TrackedContent::Documents(documents) => {
            let (added, removed) = diff_documents(previous, documents);
            if !added.is_empty() || !removed.is_empty() {
                ChangeEvent::DocumentsChanged { added, removed }
            } else if marker_raised {
                ChangeEvent::MarkerRaised
            } else {
                ChangeEvent::NoChange
            }
        }
        TrackedContent::FreeText => {
            if marker_raised {
                ChangeEvent::MarkerRaised
            } else if !current.summary_text.is_empty()
                && current.summary_text != previous.summary_text
            {
                ChangeEvent::TextChanged {
                    text: current.summary_text.clone(),
                    has_marker: current.has_marker,
                }
            } else {
                ChangeEvent::NoChange
            }
        }
    }
}

/// Set difference by url: `(current \ previous, previous \ current)`.
/// Added keeps the listing's order; removed follows the stored url order.
fn diff_documents(previous: &PersistedState, current: &[Document]) -> (Vec<Document>, Vec<Document>) {
    let current_urls: HashSet<&str> = current.iter().map(|doc| doc.url.as_str()).collect();

    let mut reported = HashSet::new();
    let added = current
        .iter()
        .filter(|doc| !previous.contains_document(&doc.url))
        .filter(|doc| reported.insert(doc.url.clone()))
        .cloned()
        .collect();

    let removed = previous
        .documents
        .values()
        .filter(|doc| !current_urls.contains(doc.url.as_str()))
        .cloned()
        .collect();

    (added, removed)
}
