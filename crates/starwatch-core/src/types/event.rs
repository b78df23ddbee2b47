//! Detected changes and the notifications composed from them.

use std::path::PathBuf;

use super::snapshot::Document;

/// The single outcome of comparing a fresh listing with the stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    DocumentsChanged {
        added: Vec<Document>,
        removed: Vec<Document>,
    },
    MarkerRaised,
    TextChanged {
        text: String,
        has_marker: bool,
    },
    NoChange,
}

impl ChangeEvent {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::DocumentsChanged { .. } => "documents_changed",
            ChangeEvent::MarkerRaised => "marker_raised",
            ChangeEvent::TextChanged { .. } => "text_changed",
            ChangeEvent::NoChange => "no_change",
        }
    }
}

/// A composed message ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Telegram-flavoured HTML.
    pub text: String,
    pub image: Option<PathBuf>,
}

impl Notification {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), image: None }
    }
}
