//! Global hotkeys that publish trigger events.
//!
//! On Windows, a dedicated thread owns a `GlobalHotKeyManager`, pumps the
//! thread's message queue, and publishes one [`TriggerEvent`] per key press.
//! On non-Windows, the listener is an inert stub.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use banter_core::config::HotkeyBindings;
use banter_core::error::BanterError;
use banter_core::events::TriggerKind;

use crate::channel::EventPublisher;

/// Pair each configured key with the trigger it fires. Blank bindings are
/// disabled and left out.
pub fn binding_table(bindings: &HotkeyBindings) -> Vec<(String, TriggerKind)> {
    [
        (&bindings.trigger_chat, TriggerKind::GenerateTyped),
        (&bindings.trigger_voice, TriggerKind::GenerateSpoken),
        (&bindings.next_persona, TriggerKind::NextPersona),
        (&bindings.prev_persona, TriggerKind::PrevPersona),
        (&bindings.quit, TriggerKind::Shutdown),
    ]
    .into_iter()
    .filter(|(key, _)| !key.trim().is_empty())
    .map(|(key, kind)| (key.trim().to_string(), kind))
    .collect()
}

/// Background hotkey listener. Unregisters everything when dropped.
pub struct HotkeyListener {
    table: Vec<(String, TriggerKind)>,
    registered: usize,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    /// Register `bindings` and start publishing presses to `publisher`.
    ///
    /// Keys that fail to parse or register are skipped with a warning; the
    /// listener only fails if the OS hotkey manager cannot be created.
    #[cfg(target_os = "windows")]
    pub fn start(bindings: &HotkeyBindings, publisher: EventPublisher) -> Result<Self, BanterError> {
        let table = binding_table(bindings);
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread_table = table.clone();
        let thread_stop = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || win::run(thread_table, publisher, thread_stop, ready_tx))
            .map_err(|e| BanterError::Hotkey(format!("Failed to spawn hotkey thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(registered)) => {
                tracing::info!(registered, total = table.len(), "Global hotkeys registered");
                Ok(Self {
                    table,
                    registered,
                    stop,
                    thread: Some(thread),
                })
            }
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(BanterError::Hotkey(message))
            }
            Err(_) => {
                let _ = thread.join();
                Err(BanterError::Hotkey(
                    "Hotkey thread exited before reporting".into(),
                ))
            }
        }
    }

    /// Stub listener for non-Windows platforms.
    #[cfg(not(target_os = "windows"))]
    pub fn start(bindings: &HotkeyBindings, publisher: EventPublisher) -> Result<Self, BanterError> {
        drop(publisher);
        tracing::warn!("Global hotkeys are only available on Windows");
        Ok(Self {
            table: binding_table(bindings),
            registered: 0,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }

    /// Configured bindings, including any that failed to register.
    pub fn bindings(&self) -> &[(String, TriggerKind)] {
        &self.table
    }

    /// Number of keys the OS accepted.
    pub fn registered(&self) -> usize {
        self.registered
    }

    /// Stop the listener thread and release every hotkey.
    pub fn unregister(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Hotkey thread panicked");
            }
            tracing::info!("Global hotkeys unregistered");
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(target_os = "windows")]
mod win {
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::Sender;
    use std::sync::Arc;
    use std::time::Duration;

    use global_hotkey::hotkey::HotKey;
    use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    use banter_core::events::{TriggerEvent, TriggerKind};

    use crate::channel::EventPublisher;

    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    pub(super) fn run(
        table: Vec<(String, TriggerKind)>,
        publisher: EventPublisher,
        stop: Arc<AtomicBool>,
        ready: Sender<Result<usize, String>>,
    ) {
        let manager = match GlobalHotKeyManager::new() {
            Ok(manager) => manager,
            Err(e) => {
                let _ = ready.send(Err(format!("Failed to create hotkey manager: {}", e)));
                return;
            }
        };

        let mut by_id: HashMap<u32, (String, TriggerKind)> = HashMap::new();
        let mut hotkeys = Vec::new();
        for (key, kind) in table {
            let hotkey = match HotKey::from_str(&key) {
                Ok(hotkey) => hotkey,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to parse hotkey");
                    continue;
                }
            };
            if let Err(e) = manager.register(hotkey) {
                tracing::warn!(key = %key, error = %e, "Failed to register hotkey");
                continue;
            }
            tracing::debug!(key = %key, event = %kind, "Hotkey registered");
            by_id.insert(hotkey.id(), (key, kind));
            hotkeys.push(hotkey);
        }
        let _ = ready.send(Ok(hotkeys.len()));

        let receiver = GlobalHotKeyEvent::receiver();
        while !stop.load(Ordering::SeqCst) {
            pump_messages();
            while let Ok(event) = receiver.try_recv() {
                if event.state() != HotKeyState::Pressed {
                    continue;
                }
                if let Some((key, kind)) = by_id.get(&event.id()) {
                    if let Err(e) = publisher.publish(TriggerEvent::with_payload(*kind, key.clone())) {
                        tracing::warn!(error = %e, "Dropping hotkey press");
                    }
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        for hotkey in hotkeys {
            let _ = manager.unregister(hotkey);
        }
    }

    fn pump_messages() {
        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            while PeekMessageW(&mut msg, 0, 0, 0, PM_REMOVE) != 0 {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}
