//! ElevenLabs text-to-speech over HTTP.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{error, info, warn};

use banter_analytics::{AnalyticsSink, TtsRecord};
use banter_core::config::VoiceConfig;

use crate::{AudioHandle, SpeechSynthesizer};

const PROVIDER: &str = "elevenlabs";

/// Synthesizes speech with the ElevenLabs API and stores the clip in a
/// temporary MP3 file.
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
    analytics: Arc<dyn AnalyticsSink>,
}

impl ElevenLabsSynthesizer {
    /// Returns `None` when no API key or voice is configured.
    pub fn from_config(
        config: &VoiceConfig,
        timeout: Duration,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Option<Self> {
        let Some(api_key) = config.resolved_api_key() else {
            warn!("Voice enabled but no ElevenLabs API key configured");
            return None;
        };
        if config.voice_id.trim().is_empty() {
            warn!("Voice enabled but no voice_id configured");
            return None;
        }

        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to build HTTP client for speech synthesis");
                return None;
            }
        };

        Some(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            analytics,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/text-to-speech/{}", self.api_base_url, self.voice_id)
    }

    async fn request(&self, text: &str) -> Result<Vec<u8>, String> {
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, detail));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;
        if bytes.is_empty() {
            return Err("empty audio response".to_string());
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Option<AudioHandle> {
        if text.trim().is_empty() {
            return None;
        }

        let started = Instant::now();
        let audio = match self.request(text).await {
            Ok(audio) => audio,
            Err(e) => {
                error!(error = %e, "Speech synthesis failed");
                self.analytics.track_error("tts", &e);
                return None;
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let handle = match write_temp_clip(&audio) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed to store synthesized audio");
                return None;
            }
        };

        info!(
            chars = text.chars().count(),
            bytes = audio.len(),
            latency_ms,
            "Speech synthesized"
        );
        self.analytics.track_tts(TtsRecord {
            provider: PROVIDER.to_string(),
            char_count: text.chars().count(),
            latency_ms,
        });
        Some(handle)
    }
}

impl std::fmt::Debug for ElevenLabsSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsSynthesizer")
            .field("api_base_url", &self.api_base_url)
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

fn write_temp_clip(audio: &[u8]) -> std::io::Result<AudioHandle> {
    let mut file = tempfile::Builder::new()
        .prefix("banter-tts-")
        .suffix(".mp3")
        .tempfile()?;
    file.write_all(audio)?;
    file.flush()?;
    Ok(AudioHandle::temporary(file.into_temp_path()))
}
