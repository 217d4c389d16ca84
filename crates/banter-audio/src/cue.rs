//! Beep feedback.
//!
//! On Windows tones are played through the Win32 `Beep` API on a detached
//! thread so the caller never waits for them. Elsewhere they are only logged.

use tracing::debug;

use crate::FeedbackCue;

const MAX_SWITCH_FREQUENCY: u32 = 3000;

/// A single tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

impl Tone {
    pub const SUCCESS: Tone = Tone {
        frequency_hz: 1000,
        duration_ms: 150,
    };
    pub const ERROR: Tone = Tone {
        frequency_hz: 400,
        duration_ms: 500,
    };
    pub const WARNING: Tone = Tone {
        frequency_hz: 600,
        duration_ms: 250,
    };
}

/// Tone frequency for a persona index: 400 Hz plus 150 Hz per step, capped.
pub fn persona_switch_frequency(index: usize) -> u32 {
    let index = u32::try_from(index).unwrap_or(u32::MAX);
    400u32
        .saturating_add(index.saturating_mul(150))
        .min(MAX_SWITCH_FREQUENCY)
}

/// Plays short beeps for each cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct BeepCue;

impl BeepCue {
    pub fn new() -> Self {
        Self
    }

    fn play(&self, label: &'static str, tone: Tone) {
        debug!(
            cue = label,
            frequency_hz = tone.frequency_hz,
            duration_ms = tone.duration_ms,
            "Feedback cue"
        );
        beep(tone);
    }
}

impl FeedbackCue for BeepCue {
    fn success(&self) {
        self.play("success", Tone::SUCCESS);
    }

    fn error(&self) {
        self.play("error", Tone::ERROR);
    }

    fn warning(&self) {
        self.play("warning", Tone::WARNING);
    }

    fn persona_switch(&self, index: usize) {
        self.play(
            "persona_switch",
            Tone {
                frequency_hz: persona_switch_frequency(index),
                duration_ms: 200,
            },
        );
    }
}

#[cfg(target_os = "windows")]
fn beep(tone: Tone) {
    use windows_sys::Win32::System::Diagnostics::Debug::Beep;

    let spawned = std::thread::Builder::new()
        .name("feedback-beep".to_string())
        .spawn(move || {
            // SAFETY: Beep takes two plain integers and has no memory effects.
            let ok = unsafe { Beep(tone.frequency_hz, tone.duration_ms) };
            if ok == 0 {
                tracing::warn!(frequency_hz = tone.frequency_hz, "Beep failed");
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Failed to spawn beep thread");
    }
}

#[cfg(not(target_os = "windows"))]
fn beep(_tone: Tone) {}

/// Cues that do nothing, used when feedback is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCue;

impl FeedbackCue for SilentCue {
    fn success(&self) {}

    fn error(&self) {}

    fn warning(&self) {}

    fn persona_switch(&self, _index: usize) {}
}
