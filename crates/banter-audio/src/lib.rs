//! Banter Audio crate - speech synthesis, playback, and feedback cues.
//!
//! Provides the collaborator traits the dispatcher speaks to, concrete
//! implementations (HTTP text-to-speech, an external-command player, beep
//! cues), and in-memory doubles for testing without audio hardware.

pub mod cue;
pub mod player;
pub mod tts;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tempfile::TempPath;

use banter_core::error::BanterError;

pub use cue::{persona_switch_frequency, BeepCue, SilentCue, Tone};
pub use player::CommandPlayer;
pub use tts::ElevenLabsSynthesizer;

// =============================================================================
// Audio handle
// =============================================================================

/// A synthesized clip ready for playback.
///
/// Temporary clips are deleted from disk when the handle is dropped.
#[derive(Debug)]
pub struct AudioHandle {
    path: PathBuf,
    _temp: Option<TempPath>,
}

impl AudioHandle {
    /// Wrap a temporary file that is removed when the handle goes away.
    pub fn temporary(temp: TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            _temp: Some(temp),
        }
    }

    /// Refer to an existing file that is left in place.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _temp: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Turns text into a playable clip.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`. Failures are logged and reported as `None`.
    async fn synthesize(&self, text: &str) -> Option<AudioHandle>;
}

/// Plays a synthesized clip.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: AudioHandle) -> Result<(), BanterError>;
}

/// Fire-and-forget acknowledgement sounds.
pub trait FeedbackCue: Send + Sync {
    fn success(&self);

    fn error(&self);

    fn warning(&self);

    /// Played after a persona switch; the tone depends on the new index.
    fn persona_switch(&self, index: usize);
}

// =============================================================================
// Test doubles
// =============================================================================

/// Synthesizer that returns a handle to a fixed path, or nothing.
#[derive(Debug, Default)]
pub struct MockSynthesizer {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A synthesizer whose every call yields `None`.
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Texts passed to `synthesize`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Option<AudioHandle> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        if self.fail {
            None
        } else {
            Some(AudioHandle::from_path("mock.mp3"))
        }
    }
}

/// Player that records what it was asked to play.
#[derive(Debug, Default)]
pub struct MockPlayer {
    fail: bool,
    played: Mutex<Vec<PathBuf>>,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AudioPlayer for MockPlayer {
    async fn play(&self, audio: AudioHandle) -> Result<(), BanterError> {
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(audio.path().to_path_buf());
        if self.fail {
            Err(BanterError::Audio("mock playback failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Counts cues instead of playing them.
#[derive(Debug, Default, Clone)]
pub struct RecordingCue {
    inner: Arc<CueCounts>,
}

#[derive(Debug, Default)]
struct CueCounts {
    success: AtomicUsize,
    error: AtomicUsize,
    warning: AtomicUsize,
    switches: Mutex<Vec<usize>>,
}

impl RecordingCue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> usize {
        self.inner.success.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.inner.error.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> usize {
        self.inner.warning.load(Ordering::SeqCst)
    }

    /// Indices passed to `persona_switch`, in order.
    pub fn switches(&self) -> Vec<usize> {
        self.inner
            .switches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FeedbackCue for RecordingCue {
    fn success(&self) {
        self.inner.success.fetch_add(1, Ordering::SeqCst);
    }

    fn error(&self) {
        self.inner.error.fetch_add(1, Ordering::SeqCst);
    }

    fn warning(&self) {
        self.inner.warning.fetch_add(1, Ordering::SeqCst);
    }

    fn persona_switch(&self, index: usize) {
        self.inner
            .switches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(index);
    }
}
