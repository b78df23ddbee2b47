//! Point-in-time reads of the watched listing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A supporting document attached to the announcement.
///
/// Identity is the `url`: two documents are the same entity iff their urls
/// match, whatever the other fields say.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub section: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub is_new: bool,
}

impl Document {
    pub fn new(
        section: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
            url: url.into(),
            date: date.into(),
            is_new: false,
        }
    }
}

/// What the snapshot source tracks besides the marker and summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedContent {
    /// Only the summary text of the announcement row is tracked.
    FreeText,
    /// The announcement's document list is tracked.
    Documents(Vec<Document>),
}

/// The announcement as it currently appears on the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub has_marker: bool,
    pub summary_text: String,
    pub content: TrackedContent,
    /// Screenshot of the announcement, if the source captured one.
    pub image: Option<PathBuf>,
}

impl Listing {
    pub fn free_text(has_marker: bool, summary_text: impl Into<String>) -> Self {
        Self {
            has_marker,
            summary_text: summary_text.into(),
            content: TrackedContent::FreeText,
            image: None,
        }
    }

    pub fn with_documents(has_marker: bool, documents: Vec<Document>) -> Self {
        Self {
            has_marker,
            summary_text: String::new(),
            content: TrackedContent::Documents(documents),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<PathBuf>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_summary(mut self, summary_text: impl Into<String>) -> Self {
        self.summary_text = summary_text.into();
        self
    }

    /// Tracked documents, or `None` when only free text is tracked.
    pub fn documents(&self) -> Option<&[Document]> {
        match &self.content {
            TrackedContent::Documents(docs) => Some(docs),
            TrackedContent::FreeText => None,
        }
    }
}

/// A single structured read of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// The announcement is not on the listing right now.
    NotFound,
    Found(Listing),
}

impl Snapshot {
    pub fn is_found(&self) -> bool {
        matches!(self, Snapshot::Found(_))
    }
}
