//! Banter Dispatch crate - event channel, orchestrator, and OS-facing
//! collaborators.
//!
//! Hotkey callbacks run on their own threads and only publish
//! [`TriggerEvent`](banter_core::TriggerEvent)s. A single
//! [`Orchestrator`] drains the channel and processes events strictly one at
//! a time.

pub mod channel;
pub mod hotkey;
pub mod observer;
pub mod orchestrator;
pub mod state;
pub mod typer;

pub use channel::{event_channel, EventConsumer, EventPublisher};
pub use hotkey::{binding_table, HotkeyListener};
pub use observer::{ContextObserver, FileContextObserver};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use state::{OrchestratorState, StateMachine};
pub use typer::{truncate_message, DebugTyper, KeyboardTyper, Typer, TyperSettings};
