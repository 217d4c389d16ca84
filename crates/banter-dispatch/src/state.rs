//! Orchestrator state machine with validated transitions.
//!
//! - Idle -> Processing(kind) (event received)
//! - Processing(kind) -> Idle (event handled)
//! - Idle -> Shutdown, Processing -> Shutdown (terminal)

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use banter_core::error::BanterError;
use banter_core::events::TriggerKind;

/// Operational state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrchestratorState {
    /// Waiting for the next event.
    Idle,
    /// Handling one event.
    Processing(TriggerKind),
    /// Loop ended; nothing else will be processed.
    Shutdown,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorState::Idle => write!(f, "Idle"),
            OrchestratorState::Processing(kind) => write!(f, "Processing({})", kind),
            OrchestratorState::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl OrchestratorState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &OrchestratorState) -> bool {
        matches!(
            (self, target),
            (OrchestratorState::Idle, OrchestratorState::Processing(_))
                | (OrchestratorState::Processing(_), OrchestratorState::Idle)
                | (OrchestratorState::Idle, OrchestratorState::Shutdown)
                | (OrchestratorState::Processing(_), OrchestratorState::Shutdown)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorState::Shutdown)
    }
}

/// Shared, observable orchestrator state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<OrchestratorState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(OrchestratorState::Idle)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> OrchestratorState {
        *self.lock()
    }

    /// Attempt to transition to the target state.
    pub fn transition(&self, target: OrchestratorState) -> Result<(), BanterError> {
        let mut state = self.lock();
        if state.can_transition_to(&target) {
            tracing::debug!("Orchestrator state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(BanterError::Dispatch(format!(
                "Invalid state transition: {} -> {}",
                *state, target
            )))
        }
    }

    /// Move to `Shutdown` from whatever state the loop stopped in.
    pub fn shut_down(&self) {
        let mut state = self.lock();
        if !state.is_terminal() {
            tracing::debug!("Orchestrator state: {} -> Shutdown", *state);
            *state = OrchestratorState::Shutdown;
        }
    }
}
