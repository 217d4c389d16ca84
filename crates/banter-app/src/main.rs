//! Banter application binary - composition root.
//!
//! 1. Load `.env` and the TOML configuration
//! 2. Initialize logging
//! 3. Build the cache, analytics sink, persona registry, and message source
//! 4. Register global hotkeys and start the orchestrator loop
//! 5. On shutdown, release hotkeys and close the analytics session

mod cli;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use banter_analytics::{AnalyticsSink, CostRates, NullAnalytics, SqliteAnalytics};
use banter_audio::{
    AudioPlayer, BeepCue, CommandPlayer, ElevenLabsSynthesizer, FeedbackCue, SilentCue,
    SpeechSynthesizer,
};
use banter_cache::ResponseCache;
use banter_core::config::{BanterConfig, ProviderKind, TyperKind};
use banter_core::error::BanterError;
use banter_core::events::TriggerKind;
use banter_dispatch::{
    event_channel, DebugTyper, FileContextObserver, HotkeyListener, KeyboardTyper, Orchestrator,
    Typer, TyperSettings,
};
use banter_generation::{
    FixedSource, GenerationService, GenerationSettings, MessageSource, OpenAiClient, RandomSource,
};
use banter_persona::{load_or_fallback, PersonaRegistry, PersonaWatcher};

use cli::{AnalyticsAction, CacheAction, CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Relative paths in the config are relative to the data directory.
fn resolve_in(data_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_cache(config: &BanterConfig, data_dir: &Path) -> Result<Arc<ResponseCache>, BanterError> {
    let dir = resolve_in(data_dir, &config.cache.dir);
    let cache = ResponseCache::new(
        &dir,
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.enabled,
    )?;
    if !cache.is_enabled() {
        tracing::info!("Response cache disabled");
    }
    Ok(Arc::new(cache))
}

fn open_analytics(config: &BanterConfig, data_dir: &Path) -> Result<SqliteAnalytics, BanterError> {
    let path = resolve_in(data_dir, &config.analytics.db_path);
    let db = SqliteAnalytics::open(
        &path,
        CostRates::from(&config.analytics),
        config.analytics.retention_days,
    )?;
    tracing::info!(path = %path.display(), session = db.session_id(), "Analytics database opened");
    Ok(db)
}

/// The sink handed to collaborators, plus the concrete database when there
/// is one so the session can be closed at exit.
fn build_analytics(
    config: &BanterConfig,
    data_dir: &Path,
) -> (Arc<dyn AnalyticsSink>, Option<Arc<SqliteAnalytics>>) {
    let null: Arc<dyn AnalyticsSink> = Arc::new(NullAnalytics);
    if !config.analytics.enabled {
        tracing::info!("Analytics disabled in config");
        return (null, None);
    }
    match open_analytics(config, data_dir) {
        Ok(db) => {
            let db = Arc::new(db);
            let sink: Arc<dyn AnalyticsSink> = db.clone();
            (sink, Some(db))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Analytics unavailable, continuing without");
            (null, None)
        }
    }
}

fn build_feedback(config: &BanterConfig) -> Arc<dyn FeedbackCue> {
    if config.feedback.enabled {
        Arc::new(BeepCue::new())
    } else {
        Arc::new(SilentCue)
    }
}

/// Pick the message source. Only the generation service has personas, so
/// only it gets a hot-reload watcher.
fn build_source(
    config: &BanterConfig,
    data_dir: &Path,
    cache: Arc<ResponseCache>,
    analytics: Arc<dyn AnalyticsSink>,
    feedback: Arc<dyn FeedbackCue>,
) -> Result<(Arc<dyn MessageSource>, Option<PersonaWatcher>), BanterError> {
    let generation = &config.generation;
    match generation.provider {
        ProviderKind::Fixed => {
            tracing::info!("Using fixed message source");
            let source: Arc<dyn MessageSource> =
                Arc::new(FixedSource::new(generation.fixed_message.clone()));
            Ok((source, None))
        }
        ProviderKind::Random => {
            tracing::info!(
                messages = generation.random_messages.len(),
                "Using random message source"
            );
            let source: Arc<dyn MessageSource> =
                Arc::new(RandomSource::new(generation.random_messages.clone()));
            Ok((source, None))
        }
        ProviderKind::Openai => {
            let personas_path = resolve_in(data_dir, &generation.personas_file);
            let registry = Arc::new(PersonaRegistry::with_default(
                load_or_fallback(&personas_path),
                generation.default_persona.as_deref(),
                generation.history_size,
            ));
            tracing::info!(
                personas = registry.len(),
                current = %registry.current().name,
                "Persona registry ready"
            );

            let api_key = generation.resolved_api_key();
            if api_key.is_none() && !config.general.dry_run {
                tracing::warn!("No OpenAI API key configured; generation requests will fail");
            }
            let client = OpenAiClient::new(
                &generation.api_base_url,
                api_key,
                generation.model.clone(),
                Duration::from_secs(generation.request_timeout_secs),
            )?;

            let watcher = match PersonaWatcher::spawn(&personas_path, Arc::clone(&registry)) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Persona hot-reload disabled");
                    None
                }
            };

            let source: Arc<dyn MessageSource> = Arc::new(GenerationService::new(
                registry,
                cache,
                Arc::new(client),
                analytics,
                feedback,
                GenerationSettings::from_config(&config.general, generation),
            ));
            Ok((source, watcher))
        }
    }
}

fn build_typer(config: &BanterConfig) -> Result<Arc<dyn Typer>, BanterError> {
    match config.typer.kind {
        TyperKind::Debug => Ok(Arc::new(DebugTyper)),
        TyperKind::Keyboard => {
            let settings = TyperSettings::from_config(&config.typer, config.general.dry_run);
            Ok(Arc::new(KeyboardTyper::new(settings)?))
        }
    }
}

fn build_voice(
    config: &BanterConfig,
    analytics: Arc<dyn AnalyticsSink>,
) -> Option<(Arc<dyn SpeechSynthesizer>, Arc<dyn AudioPlayer>)> {
    if !config.voice.enabled {
        tracing::info!("Voice output disabled in config");
        return None;
    }
    let timeout = Duration::from_secs(config.generation.request_timeout_secs);
    let synthesizer = ElevenLabsSynthesizer::from_config(&config.voice, timeout, analytics)?;
    let player = match CommandPlayer::from_command_line(&config.voice.player_command) {
        Ok(player) => player,
        Err(e) => {
            tracing::warn!(error = %e, "Voice output disabled");
            return None;
        }
    };
    tracing::info!(player = %player.program(), "Voice output ready");
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(synthesizer);
    let player: Arc<dyn AudioPlayer> = Arc::new(player);
    Some((synthesizer, player))
}

fn run_maintenance(
    command: Command,
    config: &BanterConfig,
    config_path: &Path,
    data_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Cache { action } => {
            let cache = build_cache(config, data_dir)?;
            match action {
                CacheAction::Stats => {
                    println!("{}", serde_json::to_string_pretty(&cache.stats()?)?);
                }
                CacheAction::Clear => {
                    let removed = cache.clear_all()?;
                    println!("Removed {} cache entries", removed);
                }
                CacheAction::ClearExpired => {
                    let removed = cache.clear_expired()?;
                    println!("Removed {} expired cache entries", removed);
                }
            }
        }
        Command::Analytics {
            action: AnalyticsAction::Stats,
        } => {
            let db = open_analytics(config, data_dir)?;
            let stats = db.lifetime_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            println!("Total cost: ${:.4}", stats.total_cost());
        }
        Command::InitConfig { force } => {
            if config_path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                )
                .into());
            }
            config.save(config_path)?;
            println!("Wrote {}", config_path.display());
        }
    }
    Ok(())
}

async fn run(config: BanterConfig, data_dir: PathBuf) -> Result<(), Box<dyn Error>> {
    let cache = build_cache(&config, &data_dir)?;
    let (analytics, analytics_db) = build_analytics(&config, &data_dir);
    let feedback = build_feedback(&config);

    let (source, watcher) = build_source(
        &config,
        &data_dir,
        cache,
        Arc::clone(&analytics),
        Arc::clone(&feedback),
    )?;
    let typer = build_typer(&config)?;

    let (publisher, consumer) = event_channel();
    let listener = HotkeyListener::start(&config.hotkeys, publisher.clone())?;
    for (key, kind) in listener.bindings() {
        tracing::info!(key = %key, event = %kind, "Hotkey bound");
    }

    let ctrl_c_publisher = publisher.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received");
            ctrl_c_publisher.publish_kind(TriggerKind::Shutdown);
        }
    });
    drop(publisher);

    let mut orchestrator = Orchestrator::new(consumer, source, typer, feedback).on_shutdown(move || {
        drop(listener);
        drop(watcher);
    });
    if let Some((synthesizer, player)) = build_voice(&config, Arc::clone(&analytics)) {
        orchestrator = orchestrator
            .with_synthesizer(synthesizer)
            .with_player(player);
    }
    if let Some(file) = &config.vision.context_file {
        let path = resolve_in(&data_dir, file);
        tracing::info!(path = %path.display(), "Observed context enabled");
        orchestrator = orchestrator.with_observer(Arc::new(FileContextObserver::new(path)));
    }

    tracing::info!(dry_run = config.general.dry_run, "Banter ready");
    let processed = orchestrator.run().await;

    if let Some(db) = analytics_db {
        if let Err(e) = db.finish() {
            tracing::warn!(error = %e, "Failed to close analytics session");
        }
        match db.session_stats() {
            Ok(stats) => tracing::info!(
                api_calls = stats.api_calls,
                tts_requests = stats.tts_requests,
                errors = stats.errors,
                cost = stats.total_cost(),
                "Session summary"
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to read session stats"),
        }
    }
    tracing::info!(processed, "Banter stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is normal.
    let dotenv = dotenvy::dotenv();

    let args = CliArgs::parse();
    let config_path = args.resolve_config_path();
    let loaded = BanterConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => BanterConfig::default(),
    };
    if args.dry_run {
        config.general.dry_run = true;
    }

    init_tracing(
        &args.resolve_log_level(&config.general.log_level),
        args.json_logs,
    );
    tracing::info!("Starting Banter v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }
    match loaded {
        Ok(_) => tracing::info!(path = %config_path.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_path.display(),
            error = %e,
            "Using default configuration"
        ),
    }

    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    match args.command {
        Some(command) => run_maintenance(command, &config, &config_path, &data_dir),
        None => run(config, data_dir).await,
    }
}
