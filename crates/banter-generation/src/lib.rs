//! Banter Generation crate - persona-aware line generation.
//!
//! Combines the persona registry, the response cache, and a remote
//! completion client into a [`MessageSource`]. Simpler fixed and random
//! sources are provided for setups without a completion API.

pub mod client;
pub mod error;
pub mod prompt;
pub mod sanitize;
pub mod service;
pub mod source;

pub use client::{ChatMessage, ChatRole, Completion, CompletionClient, CompletionRequest, OpenAiClient};
pub use error::GenerationError;
pub use sanitize::sanitize;
pub use service::{GenerationService, GenerationSettings, DRY_RUN_MARKER, ERROR_MESSAGE};
pub use source::{FixedSource, MessageSource, RandomSource, SwitchableSource};
