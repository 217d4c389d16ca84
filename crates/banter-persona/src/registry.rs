//! The live persona registry.
//!
//! Readers take an `Arc` to an immutable [`RegistrySnapshot`]. Every change
//! (switch or reload) builds a new snapshot and swaps it in under a short
//! lock, so a reader on another thread sees either the old or the new
//! snapshot and never a mix.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use banter_core::types::Persona;

/// An immutable view of the registry at one point in time.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    personas: Arc<[Persona]>,
    current_index: usize,
    epoch: u64,
}

impl RegistrySnapshot {
    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> &Persona {
        &self.personas[self.current_index]
    }

    /// Changes whenever the current persona or the persona set changes.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.personas.iter().position(|p| p.name == name)
    }
}

/// What a reload did to the current persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The previously active persona survived and stays current.
    Preserved { name: String, index: usize },
    /// The previously active persona is gone; index reset to 0.
    Reset { previous: String },
}

struct Inner {
    snapshot: Arc<RegistrySnapshot>,
    history: VecDeque<String>,
}

/// Ordered personas with a current pointer and a bounded history of recent
/// outputs for the current persona.
pub struct PersonaRegistry {
    inner: Mutex<Inner>,
    history_size: usize,
}

impl PersonaRegistry {
    /// Build a registry starting at index 0. An empty list is replaced by the
    /// fallback persona.
    pub fn new(personas: Vec<Persona>, history_size: usize) -> Self {
        let personas = if personas.is_empty() {
            warn!("No personas supplied, using default persona");
            vec![Persona::fallback()]
        } else {
            personas
        };

        Self {
            inner: Mutex::new(Inner {
                snapshot: Arc::new(RegistrySnapshot {
                    personas: personas.into(),
                    current_index: 0,
                    epoch: 0,
                }),
                history: VecDeque::with_capacity(history_size),
            }),
            history_size,
        }
    }

    /// Build a registry and select `default_name` if it is present.
    pub fn with_default(
        personas: Vec<Persona>,
        default_name: Option<&str>,
        history_size: usize,
    ) -> Self {
        let registry = Self::new(personas, history_size);
        if let Some(name) = default_name {
            if !registry.select_by_name(name) {
                warn!(persona = %name, "Default persona not found, starting at index 0");
            }
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent snapshot.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.lock().snapshot.clone()
    }

    pub fn current(&self) -> Persona {
        self.snapshot().current().clone()
    }

    pub fn current_index(&self) -> usize {
        self.snapshot().current_index
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Advance to the next persona, wrapping around. Clears history.
    pub fn next(&self) -> usize {
        self.switch(|index, len| (index + 1) % len)
    }

    /// Step back to the previous persona, wrapping around. Clears history.
    pub fn prev(&self) -> usize {
        self.switch(|index, len| (index + len - 1) % len)
    }

    /// Select a persona by name. Returns false if no persona has that name.
    pub fn select_by_name(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let Some(index) = inner.snapshot.position_of(name) else {
            return false;
        };
        let personas = inner.snapshot.personas.clone();
        Self::publish(&mut inner, personas, index);
        true
    }

    fn switch(&self, step: impl FnOnce(usize, usize) -> usize) -> usize {
        let mut inner = self.lock();
        let len = inner.snapshot.len();
        let index = step(inner.snapshot.current_index, len);
        let personas = inner.snapshot.personas.clone();
        Self::publish(&mut inner, personas, index);
        let snapshot = &inner.snapshot;
        info!(
            index,
            persona = %snapshot.current().name,
            "Persona switched"
        );
        index
    }

    /// Swap in a validated candidate list.
    ///
    /// The previously active persona stays current if its name is still
    /// present; otherwise the index resets to 0. History is always cleared.
    /// An empty candidate is ignored.
    pub fn replace(&self, personas: Vec<Persona>) -> Option<ReloadOutcome> {
        if personas.is_empty() {
            warn!("Ignoring empty persona reload");
            return None;
        }

        let candidate: Arc<[Persona]> = personas.into();
        let mut inner = self.lock();
        let previous = inner.snapshot.current().name.clone();

        let outcome = match candidate.iter().position(|p| p.name == previous) {
            Some(index) => ReloadOutcome::Preserved {
                name: previous,
                index,
            },
            None => {
                warn!(persona = %previous, "Active persona removed by reload, resetting to first");
                ReloadOutcome::Reset { previous }
            }
        };
        let index = match &outcome {
            ReloadOutcome::Preserved { index, .. } => *index,
            ReloadOutcome::Reset { .. } => 0,
        };

        Self::publish(&mut inner, candidate, index);
        info!(
            count = inner.snapshot.len(),
            index,
            epoch = inner.snapshot.epoch,
            "Persona registry reloaded"
        );
        Some(outcome)
    }

    fn publish(inner: &mut Inner, personas: Arc<[Persona]>, current_index: usize) {
        let epoch = inner.snapshot.epoch + 1;
        inner.snapshot = Arc::new(RegistrySnapshot {
            personas,
            current_index,
            epoch,
        });
        inner.history.clear();
    }

    /// Recent outputs, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Append an output produced under snapshot `epoch`.
    ///
    /// Returns false and drops the line if the registry has moved on since.
    pub fn push_history(&self, epoch: u64, line: impl Into<String>) -> bool {
        let mut inner = self.lock();
        if inner.snapshot.epoch != epoch {
            debug!(
                epoch,
                current = inner.snapshot.epoch,
                "Dropping history line from a stale snapshot"
            );
            return false;
        }
        if self.history_size == 0 {
            return true;
        }
        while inner.history.len() >= self.history_size {
            inner.history.pop_front();
        }
        inner.history.push_back(line.into());
        true
    }
}

impl std::fmt::Debug for PersonaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("PersonaRegistry")
            .field("snapshot", &inner.snapshot)
            .field("history_len", &inner.history.len())
            .field("history_size", &self.history_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personas(names: &[&str]) -> Vec<Persona> {
        names
            .iter()
            .map(|n| Persona::new(*n, format!("{} style", n)))
            .collect()
    }

    fn registry(names: &[&str]) -> PersonaRegistry {
        PersonaRegistry::new(personas(names), 5)
    }

    #[test]
    fn test_empty_registry_uses_fallback() {
        let registry = PersonaRegistry::new(Vec::new(), 5);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.current(), Persona::fallback());
    }

    #[test]
    fn test_next_and_prev_wrap() {
        let registry = registry(&["A", "B", "C"]);
        assert_eq!(registry.next(), 1);
        assert_eq!(registry.next(), 2);
        assert_eq!(registry.next(), 0);
        assert_eq!(registry.prev(), 2);
        assert_eq!(registry.current().name, "C");
    }

    #[test]
    fn test_next_then_prev_round_trips() {
        for count in 1..=4 {
            let names: Vec<String> = (0..count).map(|i| format!("P{}", i)).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let registry = registry(&refs);
            for _ in 0..count {
                let start = registry.current_index();
                registry.next();
                registry.prev();
                assert_eq!(registry.current_index(), start);
                registry.prev();
                registry.next();
                assert_eq!(registry.current_index(), start);
                registry.next();
            }
        }
    }

    #[test]
    fn test_switch_clears_history() {
        let registry = registry(&["A", "B"]);
        let epoch = registry.snapshot().epoch();
        assert!(registry.push_history(epoch, "gg"));
        assert_eq!(registry.history_len(), 1);

        registry.next();
        assert_eq!(registry.history_len(), 0);

        let epoch = registry.snapshot().epoch();
        registry.push_history(epoch, "nice");
        registry.prev();
        assert!(registry.history().is_empty());
    }

    #[test]
    fn test_single_persona_switch_still_clears_history() {
        let registry = registry(&["Solo"]);
        registry.push_history(registry.snapshot().epoch(), "x");
        assert_eq!(registry.next(), 0);
        assert_eq!(registry.history_len(), 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let registry = PersonaRegistry::new(personas(&["A"]), 3);
        let epoch = registry.snapshot().epoch();
        for i in 0..5 {
            registry.push_history(epoch, format!("line {}", i));
        }
        assert_eq!(registry.history(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_stale_history_is_dropped() {
        let registry = registry(&["A", "B"]);
        let epoch = registry.snapshot().epoch();
        registry.replace(personas(&["A", "B"]));
        assert!(!registry.push_history(epoch, "late"));
        assert_eq!(registry.history_len(), 0);
    }

    #[test]
    fn test_reload_preserves_current_persona() {
        let registry = registry(&["A", "B", "C"]);
        registry.next();
        registry.push_history(registry.snapshot().epoch(), "line");

        let outcome = registry.replace(personas(&["C", "X", "B"])).unwrap();
        assert_eq!(
            outcome,
            ReloadOutcome::Preserved {
                name: "B".into(),
                index: 2
            }
        );
        assert_eq!(registry.current_index(), 2);
        assert_eq!(registry.current().name, "B");
        assert_eq!(registry.history_len(), 0);
    }

    #[test]
    fn test_reload_resets_when_current_removed() {
        let registry = registry(&["A", "B", "C"]);
        registry.next();

        let outcome = registry.replace(personas(&["X", "Y"])).unwrap();
        assert_eq!(
            outcome,
            ReloadOutcome::Reset {
                previous: "B".into()
            }
        );
        assert_eq!(registry.current_index(), 0);
        assert_eq!(registry.current().name, "X");
    }

    #[test]
    fn test_empty_reload_is_ignored() {
        let registry = registry(&["A", "B"]);
        registry.next();
        let before = registry.snapshot();
        assert!(registry.replace(Vec::new()).is_none());
        assert_eq!(registry.snapshot().epoch(), before.epoch());
        assert_eq!(registry.current().name, "B");
    }

    #[test]
    fn test_with_default() {
        let registry = PersonaRegistry::with_default(personas(&["A", "B", "C"]), Some("C"), 5);
        assert_eq!(registry.current_index(), 2);

        let registry = PersonaRegistry::with_default(personas(&["A", "B"]), Some("Z"), 5);
        assert_eq!(registry.current_index(), 0);
    }

    #[test]
    fn test_old_snapshot_is_unchanged_after_swap() {
        let registry = registry(&["A", "B"]);
        let old = registry.snapshot();
        registry.replace(personas(&["X"]));
        assert_eq!(old.current().name, "A");
        assert_eq!(old.len(), 2);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_reload_and_reads_see_whole_snapshots() {
        let registry = Arc::new(registry(&["A", "B", "C"]));
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let set = if i % 2 == 0 {
                        personas(&["A", "B", "C"])
                    } else {
                        personas(&["X", "Y"])
                    };
                    registry.replace(set);
                }
            })
        };

        for _ in 0..500 {
            let snapshot = registry.snapshot();
            assert!(snapshot.current_index() < snapshot.len());
            let names: Vec<&str> = snapshot.personas().iter().map(|p| p.name.as_str()).collect();
            assert!(names == ["A", "B", "C"] || names == ["X", "Y"]);
        }
        writer.join().unwrap();
    }
}
