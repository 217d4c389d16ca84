//! Persona definitions, the live persona registry, and its hot-reload watcher.

pub mod error;
pub mod loader;
pub mod registry;
pub mod watcher;

pub use error::PersonaError;
pub use loader::{load_candidate, load_or_fallback, parse_personas};
pub use registry::{PersonaRegistry, RegistrySnapshot, ReloadOutcome};
pub use watcher::{reload_from_file, PersonaWatcher};
