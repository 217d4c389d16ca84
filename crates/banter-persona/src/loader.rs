//! Persona definition file parsing.
//!
//! The file is a JSON array of `{"name": ..., "prompt": ...}` objects where
//! `prompt` (alias `style`) is either a string or a map of language code to
//! string. Bad entries are skipped; a file with no usable entry is rejected.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use banter_core::types::{Persona, StyleText};

use crate::error::PersonaError;

#[derive(Debug, Deserialize)]
struct PersonaEntry {
    name: Option<String>,
    #[serde(alias = "style")]
    prompt: Option<StyleText>,
}

/// Parse a persona file's contents into a validated candidate list.
pub fn parse_personas(content: &str) -> Result<Vec<Persona>, PersonaError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| PersonaError::Parse(e.to_string()))?;
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        _ => return Err(PersonaError::NotAnArray),
    };

    let mut seen = HashSet::new();
    let mut personas = Vec::with_capacity(entries.len());

    for (position, raw) in entries.into_iter().enumerate() {
        let entry: PersonaEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(position, error = %e, "Skipping malformed persona entry");
                continue;
            }
        };

        let name = match entry.name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!(position, "Skipping persona entry without a name");
                continue;
            }
        };

        let style = match entry.prompt {
            Some(style) if !style.is_blank() => style,
            _ => {
                warn!(position, persona = %name, "Skipping persona without a style");
                continue;
            }
        };

        if !seen.insert(name.clone()) {
            warn!(position, persona = %name, "Skipping duplicate persona name");
            continue;
        }

        personas.push(Persona { name, style });
    }

    if personas.is_empty() {
        return Err(PersonaError::NoValidEntries);
    }
    Ok(personas)
}

/// Read and validate a persona file without touching any live registry.
pub fn load_candidate(path: &Path) -> Result<Vec<Persona>, PersonaError> {
    let content = std::fs::read_to_string(path).map_err(|source| PersonaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_personas(&content)
}

/// Load personas for startup, substituting the single fallback persona when
/// the file is missing, unreadable, or empty.
pub fn load_or_fallback(path: &Path) -> Vec<Persona> {
    match load_candidate(path) {
        Ok(personas) => {
            info!(count = personas.len(), path = %path.display(), "Personas loaded");
            personas
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Using default persona");
            vec![Persona::fallback()]
        }
    }
}
