//! # Starwatch CLI
//!
//! Watches a job listing for an announcement's update marker and documents,
//! and tells Telegram subscribers when something changes.
//!
//! Usage:
//!   starwatch run                       # Scheduler + Telegram commands until Ctrl+C
//!   starwatch check                     # One check, broadcasting any change
//!   starwatch status                    # Live status, no state change
//!   starwatch subscribers list          # Show subscribers
//!   starwatch config init               # Write a default config

mod bot;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use starwatch_channels::{ExtractorSource, NtfyPublisher, TelegramChannel};
use starwatch_core::StarwatchConfig;
use starwatch_core::traits::{Clock, PublishOptions, SnapshotSource, SystemClock};
use starwatch_scheduler::compose::plain_text;
use starwatch_scheduler::{
    BroadcastDispatcher, CheckOutcome, CommandHandler, Composer, CooldownTable, Monitor,
    RemoveOutcome, Scheduler, SecondaryChannel, StateStore, SubscribeOutcome, SubscriberRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "starwatch",
    version,
    about = "⭐ Starwatch — listing change detector with Telegram notifications"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the Telegram command loop
    Run,

    /// Run one check now and broadcast any change
    Check,

    /// Query the listing live without touching stored state
    Status,

    /// Manage subscribers
    Subscribers {
        #[command(subcommand)]
        action: SubscribersAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show paths and settings
    Info,
}

#[derive(Subcommand)]
enum SubscribersAction {
    /// List subscribers
    List,
    /// Add a chat id
    Add { id: String },
    /// Remove a chat id
    Remove { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(StarwatchConfig::default_path)
}

fn open_registry(config: &StarwatchConfig) -> Arc<SubscriberRegistry> {
    Arc::new(SubscriberRegistry::open(
        config.storage.subscribers_path(),
        config.telegram.admin_chat_id.trim(),
    ))
}

fn snapshot_source(config: &StarwatchConfig) -> Arc<dyn SnapshotSource> {
    Arc::new(ExtractorSource::new(config.source.clone(), &config.listing.base_url))
}

/// Everything `run` and `check` share.
struct Engine {
    monitor: Arc<Monitor>,
    registry: Arc<SubscriberRegistry>,
    telegram: Arc<TelegramChannel>,
    source: Arc<dyn SnapshotSource>,
    clock: Arc<dyn Clock>,
}

fn build_engine(config: &StarwatchConfig) -> Result<Engine> {
    config.validate_telegram()?;

    let registry = open_registry(config);
    if let Err(e) = registry.flush() {
        tracing::warn!("Could not write subscriber record: {e}");
    }

    let telegram = Arc::new(TelegramChannel::new(config.telegram.clone(), config.timeouts.send()));
    let mut dispatcher = BroadcastDispatcher::new(telegram.clone(), registry.clone(), config.timeouts.send());
    if config.ntfy.enabled {
        tracing::info!("Secondary channel: ntfy topic {}", config.ntfy.topic);
        dispatcher = dispatcher.with_secondary(SecondaryChannel {
            publisher: Arc::new(NtfyPublisher::new(config.ntfy.server.clone(), config.timeouts.send())),
            topic: config.ntfy.topic.clone(),
            options: PublishOptions {
                title: Some(config.listing.title.clone()),
                priority: Some(config.ntfy.priority),
                tags: config.ntfy.tags.clone(),
            },
        });
    }

    let source = snapshot_source(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let monitor = Arc::new(Monitor::new(
        source.clone(),
        StateStore::new(config.storage.state_path()),
        Composer::new(&config.listing),
        dispatcher,
        clock.clone(),
        config.timeouts.fetch(),
    ));

    Ok(Engine {
        monitor,
        registry,
        telegram,
        source,
        clock,
    })
}

fn command_handler(
    config: &StarwatchConfig,
    source: Arc<dyn SnapshotSource>,
    registry: Arc<SubscriberRegistry>,
    clock: Arc<dyn Clock>,
) -> CommandHandler {
    let cooldown = CooldownTable::new(config.commands.cooldown(), clock);
    CommandHandler::new(source, registry, cooldown, config.timeouts.fetch())
}

async fn run(config: StarwatchConfig) -> Result<()> {
    let engine = build_engine(&config)?;
    let handler = Arc::new(command_handler(
        &config,
        engine.source.clone(),
        engine.registry.clone(),
        engine.clock.clone(),
    ));

    println!("⭐ Starwatch v{}", env!("CARGO_PKG_VERSION"));
    println!("   Watching: {}", config.listing.title);
    println!("   Every {} min, {} subscribers", config.schedule.interval_minutes, engine.registry.count());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Scheduler::new(engine.monitor.clone(), config.schedule.interval());
    let scheduler_task = {
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(rx).await })
    };

    let commands = bot::CommandLoop::new(engine.telegram.clone(), handler);
    let commands_task = tokio::spawn(async move { commands.run(shutdown_rx).await });

    println!("\nRunning. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    shutdown_tx.send(true).ok();

    let (scheduler_result, commands_result) = futures::join!(scheduler_task, commands_task);
    scheduler_result.context("scheduler task failed")?;
    commands_result.context("command loop task failed")?;

    println!("\n👋 Starwatch stopped.");
    Ok(())
}

async fn check(config: StarwatchConfig) -> Result<()> {
    let engine = build_engine(&config)?;
    match engine.monitor.run_check().await? {
        CheckOutcome::NotFound => println!("❌ Announcement not found on the listing"),
        CheckOutcome::Checked { event, broadcast } => {
            println!("✅ Check done: {}", event.kind());
            if let Some(report) = broadcast {
                println!("   Delivered: {}/{}", report.delivered.len(), report.attempted());
                for (recipient, e) in &report.failed {
                    println!("   ⚠️  {recipient}: {e}");
                }
                if let Some(ok) = report.secondary_ok {
                    println!("   Secondary channel: {}", if ok { "ok" } else { "failed" });
                }
            }
        }
    }
    Ok(())
}

async fn status(config: StarwatchConfig) -> Result<()> {
    config.validate()?;
    let registry = open_registry(&config);
    let handler = command_handler(&config, snapshot_source(&config), registry, Arc::new(SystemClock));
    let reply = handler.handle("cli", starwatch_core::types::Command::CheckStatus).await;
    println!("{}", plain_text(&reply.text()));
    Ok(())
}

fn subscribers(config: &StarwatchConfig, action: SubscribersAction) -> Result<()> {
    let registry = open_registry(config);
    match action {
        SubscribersAction::List => {
            println!("👥 Subscribers ({})", registry.count());
            for id in registry.members() {
                let marker = if registry.is_admin(&id) { " (admin)" } else { "" };
                println!("  - {id}{marker}");
            }
        }
        SubscribersAction::Add { id } => match registry.add(id.trim()) {
            SubscribeOutcome::Added => println!("✅ Added {id}"),
            SubscribeOutcome::AlreadySubscribed => println!("ℹ️  {id} is already subscribed"),
        },
        SubscribersAction::Remove { id } => match registry.remove(id.trim()) {
            RemoveOutcome::Removed => println!("✅ Removed {id}"),
            RemoveOutcome::NotSubscribed => println!("ℹ️  {id} is not subscribed"),
            RemoveOutcome::NotPermitted => anyhow::bail!("the admin chat cannot be removed"),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "starwatch=debug,starwatch_core=debug,starwatch_channels=debug,starwatch_scheduler=debug"
    } else {
        "starwatch=info,starwatch_core=info,starwatch_channels=info,starwatch_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let path = config_path(&cli);
    let config = StarwatchConfig::load_from(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;

    match cli.command {
        Commands::Run => run(config).await?,
        Commands::Check => check(config).await?,
        Commands::Status => status(config).await?,
        Commands::Subscribers { action } => subscribers(&config, action)?,

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let content = toml::to_string_pretty(&config)?;
                println!("{content}");
            }
            ConfigAction::Init { force } => {
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                StarwatchConfig::default().save_to(&path)?;
                println!("✅ Config saved to: {}", path.display());
                println!("\n📋 Next steps:");
                println!("  1. Set telegram.bot_token and telegram.admin_chat_id (or TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID)");
                println!("  2. Point [source] at the extractor program");
                println!("  3. Start watching: starwatch run");
            }
        },

        Commands::Info => {
            println!("⭐ Starwatch v{}", env!("CARGO_PKG_VERSION"));
            println!("   Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
            println!("   Config: {}", path.display());
            println!("   Listing: {}", config.listing.url);
            println!("   Interval: {} min", config.schedule.interval_minutes);
            println!("   Cooldown: {} s", config.commands.cooldown_seconds);
            println!("   State: {}", config.storage.state_path().display());
            println!("   Subscribers: {}", config.storage.subscribers_path().display());
            println!("   Telegram: {}", if config.telegram.bot_token.is_empty() { "not configured" } else { "configured" });
            println!("   ntfy: {}", if config.ntfy.enabled { config.ntfy.topic.as_str() } else { "disabled" });
        }
    }

    Ok(())
}
