//! Starwatch configuration — `~/.starwatch/config.toml` plus env overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StarwatchError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StarwatchConfig {
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub ntfy: NtfyConfig,
}

/// The watched listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Link included in notifications.
    #[serde(default = "default_listing_url")]
    pub url: String,
    /// Base for resolving relative document links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Human name of the announcement, used in message headings.
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_listing_url() -> String {
    "https://empleo.enaire.es/empleo/PFSrv?accion=avisos&codigo=20251120&titulo=CONVOCATORIA%20EXTERNA%20CONTROLADORES%202025".into()
}
fn default_base_url() -> String {
    "https://empleo.enaire.es/empleo/".into()
}
fn default_title() -> String {
    "CONVOCATORIA EXTERNA CONTROLADORES 2025".into()
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: default_listing_url(),
            base_url: default_base_url(),
            title: default_title(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_interval_minutes() -> u64 { 10 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_minutes: default_interval_minutes() }
    }
}

/// Upper bound for `schedule.interval_minutes` (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// Upper bound for `commands.cooldown_seconds` (one day).
pub const MAX_COOLDOWN_SECONDS: u64 = 24 * 60 * 60;

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.min(MAX_INTERVAL_MINUTES) * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Minimum seconds between on-demand status checks per recipient.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

fn default_cooldown_seconds() -> u64 { 60 }

impl Default for CommandsConfig {
    fn default() -> Self {
        Self { cooldown_seconds: default_cooldown_seconds() }
    }
}

impl CommandsConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_seconds.min(MAX_COOLDOWN_SECONDS) as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_fetch_seconds")]
    pub fetch_seconds: u64,
    #[serde(default = "default_send_seconds")]
    pub send_seconds: u64,
}

fn default_fetch_seconds() -> u64 { 90 }
fn default_send_seconds() -> u64 { 30 }

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch_seconds: default_fetch_seconds(),
            send_seconds: default_send_seconds(),
        }
    }
}

impl TimeoutConfig {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_seconds)
    }

    pub fn send(&self) -> Duration {
        Duration::from_secs(self.send_seconds)
    }
}

/// Where the state and subscriber records live. `~` is expanded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub state_path: Option<String>,
    pub subscribers_path: Option<String>,
}

impl StorageConfig {
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| StarwatchConfig::home_dir().join("state.json"))
    }

    pub fn subscribers_path(&self) -> PathBuf {
        self.subscribers_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| StarwatchConfig::home_dir().join("subscribers.json"))
    }
}

/// External extractor that prints a snapshot as JSON on stdout
/// (`node scraper.js` prints `Result: {...}` after its log lines).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_program")]
    pub program: String,
    #[serde(default = "default_source_args")]
    pub args: Vec<String>,
    pub workdir: Option<String>,
}

fn default_source_program() -> String { "node".into() }
fn default_source_args() -> Vec<String> { vec!["scraper.js".into()] }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            program: default_source_program(),
            args: default_source_args(),
            workdir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Chat id of the administrative recipient.
    #[serde(default)]
    pub admin_chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

fn default_api_base() -> String { "https://api.telegram.org".into() }
fn default_poll_timeout() -> u64 { 30 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_chat_id: String::new(),
            api_base: default_api_base(),
            poll_timeout_seconds: default_poll_timeout(),
        }
    }
}

/// Secondary push channel (ntfy.sh compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NtfyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ntfy_server")]
    pub server: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_ntfy_priority")]
    pub priority: u8,
    #[serde(default = "default_ntfy_tags")]
    pub tags: Vec<String>,
}

fn default_ntfy_server() -> String { "https://ntfy.sh".into() }
fn default_ntfy_priority() -> u8 { 4 }
fn default_ntfy_tags() -> Vec<String> { vec!["star".into()] }

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: default_ntfy_server(),
            topic: String::new(),
            priority: default_ntfy_priority(),
            tags: default_ntfy_tags(),
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

impl StarwatchConfig {
    /// `~/.starwatch`, or `$STARWATCH_HOME` when set.
    pub fn home_dir() -> PathBuf {
        if let Ok(home) = std::env::var("STARWATCH_HOME") {
            return expand_path(&home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".starwatch")
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load from the default path, falling back to defaults, then apply env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Write to the default path, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `CHECK_INTERVAL_MINUTES`
    /// and `NTFY_TOPIC` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(chat) = lookup("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()) {
            self.telegram.admin_chat_id = chat;
        }
        if let Some(minutes) = lookup("CHECK_INTERVAL_MINUTES") {
            match minutes.trim().parse::<u64>() {
                Ok(m) if m > 0 => self.schedule.interval_minutes = m,
                _ => tracing::warn!("Ignoring invalid CHECK_INTERVAL_MINUTES={minutes}"),
            }
        }
        if let Some(topic) = lookup("NTFY_TOPIC").filter(|v| !v.is_empty()) {
            self.ntfy.topic = topic;
            self.ntfy.enabled = true;
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.interval_minutes == 0 {
            return Err(StarwatchError::config("schedule.interval_minutes must be > 0"));
        }
        if self.schedule.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(StarwatchError::config(format!(
                "schedule.interval_minutes must be at most {MAX_INTERVAL_MINUTES}"
            )));
        }
        if self.commands.cooldown_seconds > MAX_COOLDOWN_SECONDS {
            return Err(StarwatchError::config(format!(
                "commands.cooldown_seconds must be at most {MAX_COOLDOWN_SECONDS}"
            )));
        }
        if self.timeouts.fetch_seconds == 0 || self.timeouts.send_seconds == 0 {
            return Err(StarwatchError::config("timeouts must be > 0"));
        }
        if self.ntfy.enabled && self.ntfy.topic.trim().is_empty() {
            return Err(StarwatchError::config("ntfy.enabled requires ntfy.topic"));
        }
        if !(1..=5).contains(&self.ntfy.priority) {
            return Err(StarwatchError::config("ntfy.priority must be between 1 and 5"));
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), plus Telegram credentials.
    pub fn validate_telegram(&self) -> Result<()> {
        self.validate()?;
        if self.telegram.bot_token.trim().is_empty() {
            return Err(StarwatchError::config(
                "telegram.bot_token (or TELEGRAM_BOT_TOKEN) must be set",
            ));
        }
        if self.telegram.admin_chat_id.trim().is_empty() {
            return Err(StarwatchError::config(
                "telegram.admin_chat_id (or TELEGRAM_CHAT_ID) must be set",
            ));
        }
        Ok(())
    }
}
