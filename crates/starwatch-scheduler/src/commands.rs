//! Command handler — on-demand status and subscription management.
//!
//! Status checks read the listing live and never touch the persisted state,
//! so they may run alongside a scheduled check.

use chrono::Duration;
use starwatch_core::traits::SnapshotSource;
use starwatch_core::types::{Command, Document, Snapshot};
use std::sync::Arc;

use crate::compose::escape_html;
use crate::cooldown::CooldownTable;
use crate::engine::fetch_with_timeout;
use crate::registry::{RemoveOutcome, SubscribeOutcome, SubscriberRegistry};

/// Live status of the announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub has_marker: bool,
    pub summary_text: String,
    /// `None` when the source only tracks free text.
    pub documents: Option<Vec<Document>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    CoolingDown { remaining: Duration },
    Status(StatusReport),
    NotFound,
    FetchFailed,
    Subscribed { already: bool },
    Unsubscribed { was_subscribed: bool },
    UnsubscribeRefused,
    Stats { subscribers: usize },
    Forbidden,
    Help,
}

impl CommandReply {
    /// HTML text sent back to the requester.
    pub fn text(&self) -> String {
        match self {
            CommandReply::CoolingDown { remaining } => format!(
                "⏳ Espera {} s antes de volver a consultar.",
                remaining.num_seconds().max(1)
            ),
            CommandReply::Status(report) => status_text(report),
            CommandReply::NotFound => "No se encuentra la convocatoria. ❌".into(),
            CommandReply::FetchFailed => "Error al consultar la web. ❌".into(),
            CommandReply::Subscribed { already: false } => {
                "✅ Suscripción activada. Recibirás un aviso cuando haya novedades.".into()
            }
            CommandReply::Subscribed { already: true } => "ℹ️ Ya estabas suscrito.".into(),
            CommandReply::Unsubscribed { was_subscribed: true } => {
                "👋 Suscripción cancelada. Usa /subscribe para volver.".into()
            }
            CommandReply::Unsubscribed { was_subscribed: false } => "ℹ️ No estabas suscrito.".into(),
            CommandReply::UnsubscribeRefused => {
                "⛔ El administrador no puede darse de baja.".into()
            }
            CommandReply::Stats { subscribers } => {
                format!("📊 <b>Suscriptores:</b> {subscribers}")
            }
            CommandReply::Forbidden => "⛔ Comando reservado al administrador.".into(),
            CommandReply::Help => concat!(
                "<b>Comandos</b>\n",
                "/star — comprobar ahora si hay estrella\n",
                "/subscribe — recibir avisos\n",
                "/unsubscribe — dejar de recibir avisos\n",
                "/stats — número de suscriptores (admin)"
            )
            .into(),
        }
    }
}

fn status_text(report: &StatusReport) -> String {
    let mut out = if report.has_marker {
        String::from("SÍ hay estrella de novedades. ⭐")
    } else {
        String::from("No hay estrella en este momento. ❌")
    };

    if let Some(docs) = &report.documents {
        out.push_str(&format!("\n\n📄 <b>Documentos publicados:</b> {}", docs.len()));
        for doc in docs.iter().filter(|d| d.is_new) {
            out.push_str(&format!(
                "\n🆕 <a href=\"{}\">{}</a>",
                escape_html(&doc.url),
                escape_html(&doc.name)
            ));
        }
    } else if !report.summary_text.is_empty() {
        out.push_str(&format!("\n\n<i>{}</i>", escape_html(&report.summary_text)));
    }
    out
}

pub struct CommandHandler {
    source: Arc<dyn SnapshotSource>,
    registry: Arc<SubscriberRegistry>,
    cooldown: CooldownTable,
    fetch_timeout: std::time::Duration,
}

impl CommandHandler {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        registry: Arc<SubscriberRegistry>,
        cooldown: CooldownTable,
        fetch_timeout: std::time::Duration,
    ) -> Self {
        Self {
            source,
            registry,
            cooldown,
            fetch_timeout,
        }
    }

    pub async fn handle(&self, requester: &str, command: Command) -> CommandReply {
        self.handle_with_ack(requester, command, || async {}).await
    }

    /// Like [`handle`](Self::handle), but awaits `ack` once a status request
    /// passes the cooldown and before the live fetch starts.
    pub async fn handle_with_ack<F, Fut>(&self, requester: &str, command: Command, ack: F) -> CommandReply
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!("Command {command} from {requester}");
        match command {
            Command::CheckStatus => self.check_status(requester, ack).await,
            Command::Subscribe => CommandReply::Subscribed {
                already: self.registry.add(requester) == SubscribeOutcome::AlreadySubscribed,
            },
            Command::Unsubscribe => match self.registry.remove(requester) {
                RemoveOutcome::Removed => CommandReply::Unsubscribed { was_subscribed: true },
                RemoveOutcome::NotSubscribed => CommandReply::Unsubscribed { was_subscribed: false },
                RemoveOutcome::NotPermitted => CommandReply::UnsubscribeRefused,
            },
            Command::Stats if self.registry.is_admin(requester) => CommandReply::Stats {
                subscribers: self.registry.count(),
            },
            Command::Stats => CommandReply::Forbidden,
            Command::Help => CommandReply::Help,
        }
    }

    async fn check_status<F, Fut>(&self, requester: &str, ack: F) -> CommandReply
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if let Err(remaining) = self.cooldown.try_acquire(requester) {
            tracing::debug!("Status request from {requester} rejected, {}s left", remaining.num_seconds());
            return CommandReply::CoolingDown { remaining };
        }
        self.cooldown.prune();
        ack().await;

        match fetch_with_timeout(self.source.as_ref(), self.fetch_timeout).await {
            Ok(Snapshot::Found(listing)) => CommandReply::Status(StatusReport {
                has_marker: listing.has_marker,
                documents: listing.documents().map(<[Document]>::to_vec),
                summary_text: listing.summary_text,
            }),
            Ok(Snapshot::NotFound) => CommandReply::NotFound,
            Err(e) => {
                tracing::warn!("On-demand check for {requester} failed: {e}");
                CommandReply::FetchFailed
            }
        }
    }
}
