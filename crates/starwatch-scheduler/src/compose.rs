//! Notification composer — turns a change event into an HTML message.

use regex::Regex;
use starwatch_core::config::ListingConfig;
use starwatch_core::types::{ChangeEvent, Document, Listing, Notification};
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[a-zA-Z][^>]*>").expect("tag regex is valid")
});

/// Builds notification texts for the watched listing.
#[derive(Debug, Clone)]
pub struct Composer {
    listing_url: String,
    title: String,
}

impl Composer {
    pub fn new(listing: &ListingConfig) -> Self {
        Self {
            listing_url: listing.url.clone(),
            title: listing.title.clone(),
        }
    }

    /// `None` for [`ChangeEvent::NoChange`]; the caller must not dispatch then.
    pub fn compose(&self, event: &ChangeEvent, listing: &Listing) -> Option<Notification> {
        let text = match event {
            ChangeEvent::NoChange => return None,
            ChangeEvent::DocumentsChanged { added, removed } => self.documents_changed(added, removed),
            ChangeEvent::MarkerRaised => self.marker_raised(listing),
            ChangeEvent::TextChanged { text, has_marker } => self.text_changed(text, *has_marker),
        };

        Some(Notification {
            text,
            image: listing.image.clone(),
        })
    }

    fn source_link(&self) -> String {
        format!(
            "🔗 <a href=\"{}\">Ver convocatoria</a>",
            escape_html(&self.listing_url)
        )
    }

    fn documents_changed(&self, added: &[Document], removed: &[Document]) -> String {
        let mut out = format!(
            "📄 <b>CAMBIOS EN LA DOCUMENTACIÓN</b> 📄\n<i>{}</i>\n",
            escape_html(&self.title)
        );

        if !added.is_empty() {
            out.push_str(&format!("\n🆕 <b>Documentos nuevos ({}):</b>\n", added.len()));
            for doc in added {
                let flag = if doc.is_new { " ⭐" } else { "" };
                out.push_str(&format!(
                    "• <b>{}</b>: <a href=\"{}\">{}</a>{}{}\n",
                    escape_html(&doc.section),
                    escape_html(&doc.url),
                    escape_html(&doc.name),
                    date_suffix(&doc.date),
                    flag,
                ));
            }
        }

        if !removed.is_empty() {
            out.push_str(&format!("\n🗑 <b>Documentos retirados ({}):</b>\n", removed.len()));
            for doc in removed {
                out.push_str(&format!(
                    "• <b>{}</b>: {}{}\n",
                    escape_html(&doc.section),
                    escape_html(&doc.name),
                    date_suffix(&doc.date),
                ));
            }
        }

        out.push('\n');
        out.push_str(&self.source_link());
        out
    }

    fn marker_raised(&self, listing: &Listing) -> String {
        let mut out = String::from(
            "🚀 <b>¡HAY NOVEDADES EN ENAIRE!</b> 🚀\n\n⭐ Se ha detectado la <b>estrella de actualización</b>.\n",
        );
        if !listing.summary_text.is_empty() {
            out.push_str(&format!(
                "\n📝 <b>Contenido:</b>\n<i>{}</i>\n",
                escape_html(&listing.summary_text)
            ));
        }
        out.push('\n');
        out.push_str(&self.source_link());
        out
    }

    fn text_changed(&self, text: &str, has_marker: bool) -> String {
        format!(
            "📢 <b>CAMBIO EN LA CONVOCATORIA</b> 📢\n\nEl texto ha sido modificado.\n\n🆕 <b>Nuevo contenido:</b>\n<i>{}</i>\n\n⭐ <b>Estrella:</b> {}\n\n{}",
            escape_html(text),
            marker_label(has_marker),
            self.source_link(),
        )
    }
}

fn date_suffix(date: &str) -> String {
    if date.trim().is_empty() {
        String::new()
    } else {
        format!(" ({})", escape_html(date.trim()))
    }
}

pub fn marker_label(has_marker: bool) -> &'static str {
    if has_marker { "ACTIVA ✅" } else { "NO DETECTADA ❌" }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plain-text rendition of an HTML message, for channels without markup.
pub fn plain_text(html: &str) -> String {
    TAG_RE
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
