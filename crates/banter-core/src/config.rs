use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BanterError, Result};
use crate::types::Language;

/// Top-level configuration for the Banter application.
///
/// Loaded from `~/.banter/config.toml` by default. Each section corresponds
/// to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BanterConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub hotkeys: HotkeyBindings,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub typer: TyperConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl BanterConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BanterConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BanterError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the cache, analytics database, and persona file.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Skip network calls and keyboard injection; log what would happen.
    pub dry_run: bool,
    /// Language for prompts and scenario pools.
    pub language: Language,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.banter".to_string(),
            log_level: "info".to_string(),
            dry_run: false,
            language: Language::En,
        }
    }
}

/// Global hotkey bindings. An empty string disables a binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyBindings {
    pub trigger_chat: String,
    pub trigger_voice: String,
    pub next_persona: String,
    pub prev_persona: String,
    pub quit: String,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            trigger_chat: "F6".to_string(),
            trigger_voice: "F9".to_string(),
            next_persona: "F8".to_string(),
            prev_persona: "F7".to_string(),
            quit: "Escape".to_string(),
        }
    }
}

/// Which message source backs the generate hotkeys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Persona-aware remote generation.
    #[default]
    Openai,
    /// Always the same configured message.
    Fixed,
    /// A random pick from a configured list.
    Random,
}

/// Text generation settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: ProviderKind,
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub api_base_url: String,
    /// API key. Falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub model: String,
    /// Persona definition file. Relative paths resolve against `data_dir`.
    pub personas_file: String,
    /// Persona selected at startup if present in the file.
    pub default_persona: Option<String>,
    /// Number of recent outputs replayed as conversation history.
    pub history_size: usize,
    pub max_tokens_text: u32,
    pub max_tokens_voice: u32,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub request_timeout_secs: u64,
    /// Message returned by the `fixed` provider.
    pub fixed_message: String,
    /// Pool used by the `random` provider.
    pub random_messages: Vec<String>,
}

impl GenerationConfig {
    /// The configured key, or `OPENAI_API_KEY` from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Openai,
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            personas_file: "personas.json".to_string(),
            default_persona: None,
            history_size: 5,
            max_tokens_text: 60,
            max_tokens_voice: 120,
            temperature: 1.0,
            frequency_penalty: 0.6,
            request_timeout_secs: 20,
            fixed_message: "Good luck have fun!".to_string(),
            random_messages: vec![
                "Good luck have fun!".to_string(),
                "Nice shot!".to_string(),
                "gg wp".to_string(),
            ],
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("provider", &self.provider)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("personas_file", &self.personas_file)
            .field("default_persona", &self.default_persona)
            .field("history_size", &self.history_size)
            .field("max_tokens_text", &self.max_tokens_text)
            .field("max_tokens_voice", &self.max_tokens_voice)
            .field("temperature", &self.temperature)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache directory. Relative paths resolve against `data_dir`.
    pub dir: String,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "cache".to_string(),
            ttl_secs: 3600,
        }
    }
}

/// How generated text is delivered to the foreground window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TyperKind {
    /// Simulated key presses.
    #[default]
    Keyboard,
    /// Log only.
    Debug,
}

/// Typing simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TyperConfig {
    pub kind: TyperKind,
    /// Key pressed to open the chat box before typing.
    pub open_chat_key: String,
    pub open_chat_delay_ms: u64,
    pub typing_interval_ms: u64,
    /// Messages longer than this many characters are truncated.
    pub max_message_length: usize,
}

impl Default for TyperConfig {
    fn default() -> Self {
        Self {
            kind: TyperKind::Keyboard,
            open_chat_key: "y".to_string(),
            open_chat_delay_ms: 200,
            typing_interval_ms: 10,
            max_message_length: 120,
        }
    }
}

/// Text-to-speech backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceProvider {
    #[default]
    Elevenlabs,
}

/// Speech synthesis and playback settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub provider: VoiceProvider,
    pub api_base_url: String,
    /// API key. Falls back to the `ELEVENLABS_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    /// Command line used to play a synthesized file; the path is appended.
    pub player_command: String,
}

impl VoiceConfig {
    /// The configured key, or `ELEVENLABS_API_KEY` from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("ELEVENLABS_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: VoiceProvider::Elevenlabs,
            api_base_url: "https://api.elevenlabs.io/v1".to_string(),
            api_key: None,
            voice_id: String::new(),
            model_id: "eleven_multilingual_v2".to_string(),
            player_command: "ffplay -nodisp -autoexit -loglevel quiet".to_string(),
        }
    }
}

impl fmt::Debug for VoiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("player_command", &self.player_command)
            .finish()
    }
}

/// Live observation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Text file holding the latest observation of the screen, written by an
    /// external recognizer. Unset disables observation.
    pub context_file: Option<String>,
}

/// Usage analytics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    /// Database path. Relative paths resolve against `data_dir`.
    pub db_path: String,
    /// Records older than this are purged at startup. Zero keeps everything.
    pub retention_days: u32,
    pub cost_per_1k_input: f64,
    pub cost_per_1k_output: f64,
    pub tts_cost_per_1k_chars: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: "analytics.db".to_string(),
            retention_days: 30,
            cost_per_1k_input: 0.0005,
            cost_per_1k_output: 0.0015,
            tts_cost_per_1k_chars: 0.30,
        }
    }
}

/// Audio acknowledgement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub enabled: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
