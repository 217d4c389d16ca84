//! Message sources and the persona-switching capability.

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use banter_core::types::GenerationMode;

/// Anything that can produce a line for the dispatcher.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Produce a line for `mode`. `context_override` is a live observation
    /// that replaces the random scenario when present.
    ///
    /// Never fails: errors are reported through logs and cues and turned
    /// into a fixed fallback string.
    async fn get_message(&self, mode: GenerationMode, context_override: Option<&str>) -> String;

    /// Persona switching, for sources that support it.
    fn as_switchable(&self) -> Option<&dyn SwitchableSource> {
        None
    }
}

/// Sources with a current persona that can be cycled.
pub trait SwitchableSource: Send + Sync {
    /// Advance to the next persona; returns the new index.
    fn next_mode(&self) -> usize;

    /// Step back to the previous persona; returns the new index.
    fn prev_mode(&self) -> usize;

    fn current_mode_name(&self) -> String;
}

/// Always returns the same message.
#[derive(Debug, Clone)]
pub struct FixedSource {
    message: String,
}

impl FixedSource {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl MessageSource for FixedSource {
    async fn get_message(&self, _mode: GenerationMode, _context: Option<&str>) -> String {
        self.message.clone()
    }
}

/// Picks uniformly from a list. An empty list yields an empty string.
#[derive(Debug, Clone)]
pub struct RandomSource {
    messages: Vec<String>,
}

impl RandomSource {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl MessageSource for RandomSource {
    async fn get_message(&self, _mode: GenerationMode, _context: Option<&str>) -> String {
        self.messages
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_default()
    }
}
