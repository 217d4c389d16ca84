//! Hot-reload of the persona definition file.
//!
//! The parent directory is watched rather than the file itself so editors
//! that save by replacing the file are still picked up. Bursts of events are
//! coalesced by a debounce window before the file is re-read.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::error::PersonaError;
use crate::loader::load_candidate;
use crate::registry::{PersonaRegistry, ReloadOutcome};

/// Default quiet period before a reload fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Idle wait when no reload is pending.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

enum WatchMessage {
    Fs(Event),
    Stop,
}

/// Re-read `path` and, if it validates, swap it into `registry`.
///
/// On any error the registry is left untouched.
pub fn reload_from_file(
    registry: &PersonaRegistry,
    path: &Path,
) -> Result<ReloadOutcome, PersonaError> {
    let candidate = load_candidate(path)?;
    registry
        .replace(candidate)
        .ok_or(PersonaError::NoValidEntries)
}

/// Background watcher bound to one persona file.
///
/// Dropping the handle stops the watcher and joins its thread.
pub struct PersonaWatcher {
    path: PathBuf,
    stop_tx: Sender<WatchMessage>,
    thread: Option<JoinHandle<()>>,
}

impl PersonaWatcher {
    /// Start watching `path` with the default debounce window.
    pub fn spawn(path: impl Into<PathBuf>, registry: Arc<PersonaRegistry>) -> Result<Self, PersonaError> {
        Self::spawn_with_debounce(path, registry, DEFAULT_DEBOUNCE)
    }

    pub fn spawn_with_debounce(
        path: impl Into<PathBuf>,
        registry: Arc<PersonaRegistry>,
        debounce: Duration,
    ) -> Result<Self, PersonaError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| PersonaError::Watch(format!("{} has no file name", path.display())))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(WatchMessage::Fs(event));
                }
                Err(e) => warn!(error = %e, "Persona watcher error"),
            },
            Config::default(),
        )
        .map_err(|e| PersonaError::Watch(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| PersonaError::Watch(format!("{}: {}", dir.display(), e)))?;

        let thread_path = path.clone();
        let thread = std::thread::Builder::new()
            .name("persona-watcher".to_string())
            .spawn(move || {
                // Keep the watcher alive for as long as the loop runs.
                let _watcher = watcher;
                run_loop(rx, &thread_path, &file_name, &registry, debounce);
            })
            .map_err(|e| PersonaError::Watch(format!("Failed to spawn watcher thread: {}", e)))?;

        info!(path = %path.display(), debounce_ms = debounce.as_millis() as u64, "Watching persona file");

        Ok(Self {
            path,
            stop_tx: tx,
            thread: Some(thread),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop watching and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.stop_tx.send(WatchMessage::Stop);
            if thread.join().is_err() {
                error!("Persona watcher thread panicked");
            }
            debug!(path = %self.path.display(), "Persona watcher stopped");
        }
    }
}

impl Drop for PersonaWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(
    rx: mpsc::Receiver<WatchMessage>,
    path: &Path,
    file_name: &OsString,
    registry: &PersonaRegistry,
    debounce: Duration,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let wait = deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        match rx.recv_timeout(wait) {
            Ok(WatchMessage::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(WatchMessage::Fs(event)) => {
                if is_relevant(&event, file_name) {
                    debug!(kind = ?event.kind, "Persona file changed");
                    deadline = Some(Instant::now() + debounce);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if deadline.take().is_some() {
                    match reload_from_file(registry, path) {
                        Ok(outcome) => info!(?outcome, "Personas hot-reloaded"),
                        Err(e) => error!(
                            path = %path.display(),
                            error = %e,
                            "Persona reload rejected, keeping previous personas"
                        ),
                    }
                }
            }
        }
    }
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    );
    kind_matches
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
