use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a producer asks the orchestrator to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Generate a line and type it into the foreground application.
    GenerateTyped,
    /// Generate a line, synthesize it, and play it back.
    GenerateSpoken,
    /// Switch to the next persona.
    NextPersona,
    /// Switch to the previous persona.
    PrevPersona,
    /// Stop the dispatch loop.
    Shutdown,
}

impl TriggerKind {
    /// Returns a stable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            TriggerKind::GenerateTyped => "generate_typed",
            TriggerKind::GenerateSpoken => "generate_spoken",
            TriggerKind::NextPersona => "next_persona",
            TriggerKind::PrevPersona => "prev_persona",
            TriggerKind::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// A unit of work enqueued by a producer thread.
///
/// Immutable once created: fields are private and only exposed through
/// accessors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerEvent {
    id: Uuid,
    kind: TriggerKind,
    payload: Option<String>,
    created_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload: None,
            created_at: Utc::now(),
        }
    }

    /// Create an event carrying an opaque payload (e.g. the hotkey that fired it).
    pub fn with_payload(kind: TriggerKind, payload: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
            ..Self::new(kind)
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
