//! Persona-aware generation service.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use tracing::{error, info, warn};

use banter_analytics::{AnalyticsSink, ApiCallRecord};
use banter_audio::FeedbackCue;
use banter_cache::{CacheParams, ResponseCache};
use banter_core::config::{GeneralConfig, GenerationConfig};
use banter_core::types::{GenerationMode, Language};
use banter_persona::{PersonaRegistry, RegistrySnapshot};

use crate::client::{CompletionClient, CompletionRequest};
use crate::error::GenerationError;
use crate::prompt;
use crate::sanitize::sanitize;
use crate::source::{MessageSource, SwitchableSource};

/// Returned in place of a line when generation fails.
pub const ERROR_MESSAGE: &str = "Error generating message.";

/// Prefix of every line produced in dry-run mode.
pub const DRY_RUN_MARKER: &str = "[DRY-RUN]";

/// Tunables for [`GenerationService`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub language: Language,
    pub dry_run: bool,
    pub max_tokens_text: u32,
    pub max_tokens_voice: u32,
    pub temperature: f32,
    pub frequency_penalty: f32,
}

impl GenerationSettings {
    pub fn from_config(general: &GeneralConfig, generation: &GenerationConfig) -> Self {
        Self {
            language: general.language,
            dry_run: general.dry_run,
            max_tokens_text: generation.max_tokens_text,
            max_tokens_voice: generation.max_tokens_voice,
            temperature: generation.temperature,
            frequency_penalty: generation.frequency_penalty,
        }
    }

    fn max_tokens(&self, mode: GenerationMode) -> u32 {
        match mode {
            GenerationMode::Text => self.max_tokens_text,
            GenerationMode::Voice => self.max_tokens_voice,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&GeneralConfig::default(), &GenerationConfig::default())
    }
}

/// Where the context for a request came from.
struct ResolvedContext {
    text: String,
    observation_grounded: bool,
}

/// Generates lines in the current persona's style, backed by a response
/// cache and a rolling history of recent lines.
pub struct GenerationService {
    registry: Arc<PersonaRegistry>,
    cache: Arc<ResponseCache>,
    client: Arc<dyn CompletionClient>,
    analytics: Arc<dyn AnalyticsSink>,
    feedback: Arc<dyn FeedbackCue>,
    settings: GenerationSettings,
    scenarios: Vec<String>,
}

impl GenerationService {
    pub fn new(
        registry: Arc<PersonaRegistry>,
        cache: Arc<ResponseCache>,
        client: Arc<dyn CompletionClient>,
        analytics: Arc<dyn AnalyticsSink>,
        feedback: Arc<dyn FeedbackCue>,
        settings: GenerationSettings,
    ) -> Self {
        let scenarios = prompt::scenarios(settings.language)
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self {
            registry,
            cache,
            client,
            analytics,
            feedback,
            settings,
            scenarios,
        }
    }

    /// Replace the random scenario pool. An empty pool is ignored.
    pub fn with_scenarios(mut self, scenarios: Vec<String>) -> Self {
        if scenarios.is_empty() {
            warn!("Ignoring empty scenario pool");
        } else {
            self.scenarios = scenarios;
        }
        self
    }

    pub fn registry(&self) -> &Arc<PersonaRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn resolve_context(&self, context_override: Option<&str>) -> ResolvedContext {
        if let Some(observed) = context_override.map(str::trim).filter(|c| !c.is_empty()) {
            return ResolvedContext {
                text: observed.to_string(),
                observation_grounded: true,
            };
        }
        let text = self
            .scenarios
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_default();
        ResolvedContext {
            text,
            observation_grounded: false,
        }
    }

    fn cache_params(&self, persona: &str, context: &str, mode: GenerationMode) -> CacheParams {
        CacheParams::new()
            .with("persona", persona)
            .with("context", context)
            .with("mode", mode.as_str())
            .with("language", self.settings.language.code())
    }

    /// Prompt, call, record, and clean one line. Does not touch history or
    /// the cache.
    async fn generate(
        &self,
        snapshot: &RegistrySnapshot,
        context: &ResolvedContext,
        mode: GenerationMode,
    ) -> Result<String, GenerationError> {
        let language = self.settings.language;
        let persona = snapshot.current();

        let system = prompt::system_prompt(
            language,
            mode,
            persona.style_for(language),
            context.observation_grounded,
        );
        let user = prompt::user_prompt(language, &context.text);
        let history = self.registry.history();
        let request = CompletionRequest {
            messages: prompt::build_messages(system, &history, user),
            max_tokens: self.settings.max_tokens(mode),
            temperature: self.settings.temperature,
            frequency_penalty: self.settings.frequency_penalty,
        };

        let started = Instant::now();
        let completion = self.client.complete(&request).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        info!(
            latency_ms,
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            "Completion received"
        );
        self.analytics.track_api_call(ApiCallRecord {
            provider: self.client.provider().to_string(),
            model: self.client.model().to_string(),
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            latency_ms,
        });

        let line = sanitize(&completion.text);
        if line.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }
        Ok(line)
    }
}

#[async_trait]
impl MessageSource for GenerationService {
    async fn get_message(&self, mode: GenerationMode, context_override: Option<&str>) -> String {
        let snapshot = self.registry.snapshot();
        let persona_name = snapshot.current().name.clone();
        let context = self.resolve_context(context_override);

        info!(
            persona = %persona_name,
            mode = %mode,
            observed = context.observation_grounded,
            context = %context.text,
            "Generating line"
        );

        let params = self.cache_params(&persona_name, &context.text, mode);
        if let Some(cached) = self.cache.get(&params) {
            // Cached lines are deliberately kept out of the history buffer.
            info!(persona = %persona_name, "Serving cached line");
            return cached;
        }

        if self.settings.dry_run {
            let line = format!(
                "{} {} ({}) reacting to: {}",
                DRY_RUN_MARKER, persona_name, mode, context.text
            );
            info!(line = %line, "Dry run, skipping completion request");
            return line;
        }

        match self.generate(&snapshot, &context, mode).await {
            Ok(line) => {
                self.registry.push_history(snapshot.epoch(), line.as_str());
                if let Err(e) = self.cache.set(&params, &line) {
                    warn!(error = %e, "Failed to cache generated line");
                }
                info!(line = %line, "Generated line");
                line
            }
            Err(e) => {
                error!(persona = %persona_name, error = %e, "Generation failed");
                self.feedback.error();
                self.analytics.track_error("generation", &e.to_string());
                ERROR_MESSAGE.to_string()
            }
        }
    }

    fn as_switchable(&self) -> Option<&dyn SwitchableSource> {
        Some(self)
    }
}

impl SwitchableSource for GenerationService {
    fn next_mode(&self) -> usize {
        let index = self.registry.next();
        self.feedback.persona_switch(index);
        index
    }

    fn prev_mode(&self) -> usize {
        let index = self.registry.prev();
        self.feedback.persona_switch(index);
        index
    }

    fn current_mode_name(&self) -> String {
        self.registry.current().name
    }
}

impl std::fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationService")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .field("scenarios", &self.scenarios.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use banter_analytics::NullAnalytics;
    use banter_audio::RecordingCue;
    use banter_core::types::Persona;

    use crate::client::{ChatRole, Completion};

    /// Replies with a fixed text and records every request.
    struct ScriptedClient {
        reply: Result<String, ()>,
        calls: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> CompletionRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<Completion, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(Completion {
                    text: text.clone(),
                    input_tokens: 10,
                    output_tokens: 5,
                }),
                Err(()) => Err(GenerationError::Http("connection reset".into())),
            }
        }

        fn provider(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        registry: Arc<PersonaRegistry>,
        cache: Arc<ResponseCache>,
        cue: RecordingCue,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cache =
            Arc::new(ResponseCache::new(dir.path().join("cache"), Duration::from_secs(60), true).unwrap());
        let registry = Arc::new(PersonaRegistry::new(
            vec![
                Persona::new("Tactician", "Calls out angles."),
                Persona::new("Hype", "Loud and happy."),
                Persona::new("Salty", "Complains about everything."),
            ],
            5,
        ));
        Harness {
            _dir: dir,
            registry,
            cache,
            cue: RecordingCue::new(),
        }
    }

    fn service(h: &Harness, client: Arc<ScriptedClient>, settings: GenerationSettings) -> GenerationService {
        GenerationService::new(
            h.registry.clone(),
            h.cache.clone(),
            client,
            Arc::new(NullAnalytics),
            Arc::new(h.cue.clone()),
            settings,
        )
        .with_scenarios(vec!["The match just started.".to_string()])
    }

    #[tokio::test]
    async fn test_generates_sanitizes_and_records_history() {
        let h = harness();
        let client = ScriptedClient::replying("\"lets gooo \u{1F525} #R6\"");
        let service = service(&h, client.clone(), GenerationSettings::default());

        let line = service.get_message(GenerationMode::Text, None).await;
        assert_eq!(line, "lets gooo");
        assert_eq!(client.calls(), 1);
        assert_eq!(h.registry.history(), vec!["lets gooo"]);

        let request = client.last_request();
        assert_eq!(request.max_tokens, 60);
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("Calls out angles."));
        assert!(request.messages[1].content.contains("The match just started."));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_client_and_history() {
        let h = harness();
        let client = ScriptedClient::replying("fresh line");
        let service = service(&h, client.clone(), GenerationSettings::default());

        let params = service.cache_params("Tactician", "The match just started.", GenerationMode::Text);
        h.cache.set(&params, "cached line").unwrap();

        let line = service.get_message(GenerationMode::Text, None).await;
        assert_eq!(line, "cached line");
        assert_eq!(client.calls(), 0);
        assert_eq!(h.registry.history_len(), 0);
    }

    #[tokio::test]
    async fn test_second_request_hits_cache() {
        let h = harness();
        let client = ScriptedClient::replying("only once");
        let service = service(&h, client.clone(), GenerationSettings::default());

        assert_eq!(service.get_message(GenerationMode::Text, None).await, "only once");
        assert_eq!(service.get_message(GenerationMode::Text, None).await, "only once");
        assert_eq!(client.calls(), 1);
        assert_eq!(h.registry.history_len(), 1);
    }

    #[tokio::test]
    async fn test_history_replayed_as_assistant_turns() {
        let h = harness();
        let client = ScriptedClient::replying("third");
        let service = service(&h, client.clone(), GenerationSettings::default());
        let epoch = h.registry.snapshot().epoch();
        h.registry.push_history(epoch, "first");
        h.registry.push_history(epoch, "second");

        service.get_message(GenerationMode::Voice, Some("Enemy planted the defuser.")).await;

        let request = client.last_request();
        assert_eq!(request.max_tokens, 120);
        let roles: Vec<ChatRole> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::Assistant, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(request.messages[1].content, "first");
        assert!(request.messages[0].content.contains("Trust this observed data"));
        assert!(request.messages[3].content.contains("Enemy planted the defuser."));
        assert_eq!(h.registry.history(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_dry_run_never_calls_client() {
        let h = harness();
        let client = ScriptedClient::replying("unused");
        let settings = GenerationSettings {
            dry_run: true,
            ..GenerationSettings::default()
        };
        let service = service(&h, client.clone(), settings);

        let line = service.get_message(GenerationMode::Text, None).await;
        assert!(line.contains(DRY_RUN_MARKER));
        assert!(line.contains("Tactician"));
        assert_eq!(client.calls(), 0);
        assert_eq!(h.cache.stats().unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_failure_returns_error_message_and_cues() {
        let h = harness();
        let client = ScriptedClient::failing();
        let service = service(&h, client.clone(), GenerationSettings::default());

        let line = service.get_message(GenerationMode::Text, None).await;
        assert_eq!(line, ERROR_MESSAGE);
        assert_eq!(h.cue.errors(), 1);
        assert_eq!(h.registry.history_len(), 0);
        assert_eq!(h.cache.stats().unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_empty_output_is_a_failure() {
        let h = harness();
        let client = ScriptedClient::replying("#only #tags");
        let service = service(&h, client, GenerationSettings::default());
        assert_eq!(service.get_message(GenerationMode::Text, None).await, ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_blank_override_uses_scenario_pool() {
        let h = harness();
        let client = ScriptedClient::replying("ok");
        let service = service(&h, client.clone(), GenerationSettings::default());
        service.get_message(GenerationMode::Text, Some("   ")).await;
        let request = client.last_request();
        assert!(!request.messages[0].content.contains("Trust this observed data"));
        assert!(request.messages[1].content.contains("The match just started."));
    }

    #[test]
    fn test_switching_emits_cues() {
        let h = harness();
        let service = service(&h, ScriptedClient::replying("x"), GenerationSettings::default());
        let switchable = service.as_switchable().unwrap();

        assert_eq!(switchable.next_mode(), 1);
        assert_eq!(switchable.current_mode_name(), "Hype");
        assert_eq!(switchable.prev_mode(), 0);
        assert_eq!(switchable.prev_mode(), 2);
        assert_eq!(h.cue.switches(), vec![1, 0, 2]);
    }

    #[test]
    fn test_cache_params_cover_language() {
        let h = harness();
        let en = service(&h, ScriptedClient::replying("x"), GenerationSettings::default());
        let pt = service(
            &h,
            ScriptedClient::replying("x"),
            GenerationSettings {
                language: Language::Pt,
                ..GenerationSettings::default()
            },
        );
        let a = en.cache_params("P", "C", GenerationMode::Text);
        let b = pt.cache_params("P", "C", GenerationMode::Text);
        assert_ne!(a.key(), b.key());
    }
}
