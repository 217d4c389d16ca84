//! End-to-end behaviour of the channel, registry, cache, and generation
//! service wired together the way the binary wires them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use banter_analytics::NullAnalytics;
use banter_audio::RecordingCue;
use banter_cache::{CacheParams, ManualClock, ResponseCache};
use banter_core::error::BanterError;
use banter_core::events::TriggerKind;
use banter_core::types::{GenerationMode, Persona};
use banter_dispatch::{event_channel, Orchestrator, OrchestratorState, Typer};
use banter_generation::{
    Completion, CompletionClient, CompletionRequest, GenerationError, GenerationService,
    GenerationSettings, MessageSource, DRY_RUN_MARKER,
};
use banter_persona::{reload_from_file, PersonaRegistry, ReloadOutcome};

// =============================================================================
// Doubles
// =============================================================================

/// Replies with the persona style it finds in the system prompt, so tests
/// can tell which persona a line was generated for.
struct ScriptedClient {
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedClient {
    fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let system = &request.messages[0].content;
        let style = system
            .lines()
            .find_map(|line| line.strip_prefix("Persona/Style: "))
            .unwrap_or("unknown");
        Ok(Completion {
            text: format!("line in style {}", style),
            input_tokens: 12,
            output_tokens: 6,
        })
    }

    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }
}

/// Records each message along with the persona index current at send time.
struct RecordingTyper {
    registry: Arc<PersonaRegistry>,
    sent: Mutex<Vec<(usize, String)>>,
}

impl RecordingTyper {
    fn new(registry: Arc<PersonaRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<(usize, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Typer for RecordingTyper {
    async fn send(&self, message: &str) -> Result<(), BanterError> {
        self.sent
            .lock()
            .unwrap()
            .push((self.registry.current_index(), message.to_string()));
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct World {
    dir: TempDir,
    registry: Arc<PersonaRegistry>,
    cache: Arc<ResponseCache>,
    cue: RecordingCue,
}

fn personas() -> Vec<Persona> {
    vec![
        Persona::new("Tactician", "calm"),
        Persona::new("Hype", "loud"),
        Persona::new("Salty", "bitter"),
    ]
}

fn world() -> World {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(
        ResponseCache::new(dir.path().join("cache"), Duration::from_secs(3600), true).unwrap(),
    );
    World {
        registry: Arc::new(PersonaRegistry::new(personas(), 5)),
        cache,
        cue: RecordingCue::new(),
        dir,
    }
}

fn service(world: &World, client: Arc<ScriptedClient>, dry_run: bool) -> Arc<GenerationService> {
    Arc::new(
        GenerationService::new(
            world.registry.clone(),
            world.cache.clone(),
            client,
            Arc::new(NullAnalytics),
            Arc::new(world.cue.clone()),
            GenerationSettings {
                dry_run,
                ..GenerationSettings::default()
            },
        )
        .with_scenarios(vec!["Round 1 is starting.".to_string()]),
    )
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn events_from_many_threads_keep_per_producer_order() {
    let (publisher, mut consumer) = event_channel();
    let producers: Vec<_> = [TriggerKind::NextPersona, TriggerKind::PrevPersona]
        .into_iter()
        .map(|kind| {
            let publisher = publisher.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    publisher
                        .publish(banter_core::events::TriggerEvent::with_payload(
                            kind,
                            i.to_string(),
                        ))
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    drop(publisher);

    let mut next_seen = Vec::new();
    let mut prev_seen = Vec::new();
    while let Some(event) = consumer.consume().await {
        let n: usize = event.payload().unwrap().parse().unwrap();
        match event.kind() {
            TriggerKind::NextPersona => next_seen.push(n),
            TriggerKind::PrevPersona => prev_seen.push(n),
            other => panic!("unexpected event {other}"),
        }
    }
    assert_eq!(next_seen, (0..50).collect::<Vec<_>>());
    assert_eq!(prev_seen, (0..50).collect::<Vec<_>>());
}

#[test]
fn next_then_prev_returns_to_start_and_wraps() {
    let registry = PersonaRegistry::new(personas(), 5);
    assert_eq!(registry.next(), 1);
    assert_eq!(registry.prev(), 0);
    assert_eq!(registry.prev(), 2);
    assert_eq!(registry.next(), 0);
}

#[tokio::test]
async fn switching_persona_clears_history() {
    let w = world();
    let client = ScriptedClient::new();
    let service = service(&w, client.clone(), false);

    service
        .get_message(GenerationMode::Text, Some("first fight"))
        .await;
    service
        .get_message(GenerationMode::Text, Some("second fight"))
        .await;
    assert_eq!(w.registry.history_len(), 2);

    let switchable = service.as_switchable().unwrap();
    assert_eq!(switchable.next_mode(), 1);
    assert_eq!(w.registry.history_len(), 0);
    assert_eq!(w.cue.switches(), vec![1]);
}

#[test]
fn cache_params_order_does_not_matter() {
    let w = world();
    let a = CacheParams::new()
        .with("persona", "Hype")
        .with("context", "ace")
        .with("mode", "text");
    let b = CacheParams::new()
        .with("mode", "text")
        .with("context", "ace")
        .with("persona", "Hype");
    w.cache.set(&a, "what a round").unwrap();
    assert_eq!(w.cache.get(&b).as_deref(), Some("what a round"));
}

#[test]
fn cache_entries_expire_after_ttl() {
    let dir = TempDir::new().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let cache =
        ResponseCache::with_clock(dir.path(), Duration::from_secs(10), true, clock.clone()).unwrap();
    let params = CacheParams::new().with("persona", "Salty");

    cache.set(&params, "ugh").unwrap();
    clock.advance(chrono::Duration::seconds(5));
    assert_eq!(cache.get(&params).as_deref(), Some("ugh"));
    clock.advance(chrono::Duration::seconds(10));
    assert_eq!(cache.get(&params), None);
}

#[tokio::test]
async fn cache_hit_skips_client_and_leaves_history_alone() {
    let w = world();
    let client = ScriptedClient::new();
    let service = service(&w, client.clone(), false);

    let first = service
        .get_message(GenerationMode::Text, Some("bomb planted"))
        .await;
    assert_eq!(first, "line in style calm");
    assert_eq!(client.calls(), 1);
    let history_before = w.registry.history();

    let second = service
        .get_message(GenerationMode::Text, Some("bomb planted"))
        .await;
    assert_eq!(second, first);
    assert_eq!(client.calls(), 1);
    assert_eq!(w.registry.history(), history_before);
}

#[tokio::test]
async fn dry_run_never_calls_client() {
    let w = world();
    let client = ScriptedClient::new();
    let service = service(&w, client.clone(), true);

    let line = service.get_message(GenerationMode::Voice, None).await;
    assert!(line.starts_with(DRY_RUN_MARKER));
    assert!(line.contains("Tactician"));
    assert_eq!(client.calls(), 0);
}

#[test]
fn hot_reload_preserves_or_resets_current_persona() {
    let w = world();
    let path = w.dir.path().join("personas.json");
    w.registry.next();
    w.registry.push_history(w.registry.snapshot().epoch(), "old line");

    std::fs::write(
        &path,
        r#"[{"name": "Rookie", "prompt": "nervous"}, {"name": "Hype", "prompt": "louder"}]"#,
    )
    .unwrap();
    let outcome = reload_from_file(&w.registry, &path).unwrap();
    assert_eq!(
        outcome,
        ReloadOutcome::Preserved {
            name: "Hype".into(),
            index: 1
        }
    );
    assert_eq!(w.registry.current().style_for(Default::default()), "louder");
    assert_eq!(w.registry.history_len(), 0);

    std::fs::write(&path, r#"[{"name": "Coach", "prompt": "patient"}]"#).unwrap();
    let outcome = reload_from_file(&w.registry, &path).unwrap();
    assert_eq!(
        outcome,
        ReloadOutcome::Reset {
            previous: "Hype".into()
        }
    );
    assert_eq!(w.registry.current_index(), 0);
    assert_eq!(w.registry.current().name, "Coach");

    std::fs::write(&path, "{ not json").unwrap();
    assert!(reload_from_file(&w.registry, &path).is_err());
    assert_eq!(w.registry.current().name, "Coach");
}

#[tokio::test]
async fn next_typed_shutdown_types_second_persona_once() {
    let w = world();
    let client = ScriptedClient::new();
    let service = service(&w, client.clone(), false);
    let typer = RecordingTyper::new(w.registry.clone());
    let (publisher, consumer) = event_channel();
    let orchestrator = Orchestrator::new(
        consumer,
        service,
        typer.clone(),
        Arc::new(w.cue.clone()),
    );
    let handle = orchestrator.handle();

    publisher.publish_kind(TriggerKind::NextPersona);
    publisher.publish_kind(TriggerKind::GenerateTyped);
    publisher.publish_kind(TriggerKind::Shutdown);
    publisher.publish_kind(TriggerKind::GenerateTyped);

    assert_eq!(orchestrator.run().await, 2);
    assert_eq!(w.registry.current_index(), 1);
    assert_eq!(typer.sent(), vec![(1, "line in style loud".to_string())]);
    assert_eq!(client.calls(), 1);
    assert_eq!(handle.state(), OrchestratorState::Shutdown);
}

#[tokio::test]
async fn slow_generation_delays_queued_switch() {
    let w = world();
    let client = ScriptedClient::with_delay(Duration::from_millis(50));
    let service = service(&w, client.clone(), false);
    let typer = RecordingTyper::new(w.registry.clone());
    let (publisher, consumer) = event_channel();
    let orchestrator = Orchestrator::new(
        consumer,
        service,
        typer.clone(),
        Arc::new(w.cue.clone()),
    );

    publisher.publish_kind(TriggerKind::GenerateTyped);
    publisher.publish_kind(TriggerKind::NextPersona);
    publisher.publish_kind(TriggerKind::Shutdown);
    orchestrator.run().await;

    // The switch waited for the typed line to finish.
    assert_eq!(typer.sent(), vec![(0, "line in style calm".to_string())]);
    assert_eq!(w.registry.current_index(), 1);
}
