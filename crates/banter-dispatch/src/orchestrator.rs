//! The single consumer that turns trigger events into typed or spoken lines.
//!
//! Events are handled strictly one at a time, in arrival order. A slow
//! generation delays everything queued behind it; nothing is preempted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use banter_audio::{AudioPlayer, FeedbackCue, SpeechSynthesizer};
use banter_core::events::{TriggerEvent, TriggerKind};
use banter_core::types::GenerationMode;
use banter_generation::{MessageSource, ERROR_MESSAGE};

use crate::channel::EventConsumer;
use crate::observer::ContextObserver;
use crate::state::{OrchestratorState, StateMachine};
use crate::typer::Typer;

type CleanupFn = Box<dyn FnOnce() + Send>;

/// Read-only view of a running orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorHandle {
    state: StateMachine,
    processed: Arc<AtomicU64>,
}

impl OrchestratorHandle {
    pub fn state(&self) -> OrchestratorState {
        self.state.current()
    }

    /// Events fully handled so far, not counting the shutdown request.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }
}

/// Collaborators shared by every dispatch.
#[derive(Clone)]
struct Dispatcher {
    source: Arc<dyn MessageSource>,
    typer: Arc<dyn Typer>,
    feedback: Arc<dyn FeedbackCue>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    player: Option<Arc<dyn AudioPlayer>>,
    observer: Option<Arc<dyn ContextObserver>>,
}

/// Runs the registered cleanup actions however the loop exits, including
/// when the `run` future is dropped mid-await.
struct CleanupGuard(Vec<CleanupFn>);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        for cleanup in self.0.drain(..) {
            cleanup();
        }
        debug!("Orchestrator cleanup complete");
    }
}

pub struct Orchestrator {
    consumer: EventConsumer,
    dispatcher: Dispatcher,
    cleanup: Vec<CleanupFn>,
    handle: OrchestratorHandle,
}

impl Orchestrator {
    pub fn new(
        consumer: EventConsumer,
        source: Arc<dyn MessageSource>,
        typer: Arc<dyn Typer>,
        feedback: Arc<dyn FeedbackCue>,
    ) -> Self {
        Self {
            consumer,
            dispatcher: Dispatcher {
                source,
                typer,
                feedback,
                synthesizer: None,
                player: None,
                observer: None,
            },
            cleanup: Vec::new(),
            handle: OrchestratorHandle::default(),
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.dispatcher.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_player(mut self, player: Arc<dyn AudioPlayer>) -> Self {
        self.dispatcher.player = Some(player);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ContextObserver>) -> Self {
        self.dispatcher.observer = Some(observer);
        self
    }

    /// Register an action to run once the loop has stopped, e.g. releasing
    /// hotkeys. Actions run in registration order.
    pub fn on_shutdown(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self.cleanup.push(Box::new(cleanup));
        self
    }

    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    /// Drain the channel until a shutdown event arrives or every publisher
    /// is gone. Returns the number of events handled.
    pub async fn run(mut self) -> u64 {
        let _guard = CleanupGuard(std::mem::take(&mut self.cleanup));
        let state = self.handle.state.clone();
        info!("Orchestrator started");

        while let Some(event) = self.consumer.consume().await {
            let kind = event.kind();
            if kind == TriggerKind::Shutdown {
                info!(pending = self.consumer.pending(), "Shutdown requested");
                break;
            }

            if let Err(e) = state.transition(OrchestratorState::Processing(kind)) {
                warn!(error = %e, "Unexpected orchestrator state");
            }
            self.dispatcher.dispatch(event).await;
            self.handle.processed.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = state.transition(OrchestratorState::Idle) {
                warn!(error = %e, "Unexpected orchestrator state");
            }
        }

        state.shut_down();
        let processed = self.handle.processed();
        info!(processed, "Orchestrator stopped");
        processed
    }
}

impl Dispatcher {
    /// Handle one event on a worker task so a panicking collaborator is
    /// contained. The loop still waits for it to finish.
    async fn dispatch(&self, event: TriggerEvent) {
        let dispatcher = self.clone();
        let kind = event.kind();
        debug!(event = %kind, id = %event.id(), payload = ?event.payload(), "Dispatching event");

        let task = tokio::spawn(async move { dispatcher.handle(kind).await });
        if let Err(e) = task.await {
            error!(event = %kind, error = %e, "Event handler crashed");
            self.feedback.error();
        }
    }

    async fn handle(&self, kind: TriggerKind) {
        match kind {
            TriggerKind::GenerateTyped => self.generate_typed().await,
            TriggerKind::GenerateSpoken => self.generate_spoken().await,
            TriggerKind::NextPersona => self.switch_persona(true),
            TriggerKind::PrevPersona => self.switch_persona(false),
            TriggerKind::Shutdown => {}
        }
    }

    async fn observed_context(&self) -> Option<String> {
        let observer = self.observer.as_ref()?;
        let context = observer.get_context().await;
        if context.trim().is_empty() {
            None
        } else {
            debug!(chars = context.len(), "Using observed context");
            Some(context)
        }
    }

    /// Generate a line, or `None` when the source already reported failure.
    async fn generate(&self, mode: GenerationMode) -> Option<String> {
        let context = self.observed_context().await;
        self.feedback.success();
        let text = self.source.get_message(mode, context.as_deref()).await;
        if text.trim().is_empty() || text == ERROR_MESSAGE {
            warn!(mode = %mode.as_str(), "No usable line generated");
            return None;
        }
        Some(text)
    }

    async fn generate_typed(&self) {
        let Some(text) = self.generate(GenerationMode::Text).await else {
            return;
        };
        if let Err(e) = self.typer.send(&text).await {
            error!(error = %e, "Failed to type message");
            self.feedback.error();
        }
    }

    async fn generate_spoken(&self) {
        let (Some(synthesizer), Some(player)) = (&self.synthesizer, &self.player) else {
            warn!("Voice trigger ignored: speech synthesis or playback not configured");
            self.feedback.warning();
            return;
        };

        let Some(text) = self.generate(GenerationMode::Voice).await else {
            return;
        };
        let Some(audio) = synthesizer.synthesize(&text).await else {
            error!("Speech synthesis produced no audio");
            self.feedback.error();
            return;
        };
        if let Err(e) = player.play(audio).await {
            error!(error = %e, "Audio playback failed");
            self.feedback.error();
        }
    }

    fn switch_persona(&self, forward: bool) {
        let Some(switchable) = self.source.as_switchable() else {
            debug!("Message source has no personas to switch");
            return;
        };
        let index = if forward {
            switchable.next_mode()
        } else {
            switchable.prev_mode()
        };
        info!(index, persona = %switchable.current_mode_name(), "Persona switched");
    }
}
