use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Output channel a generated line is destined for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Typed into the foreground application's chat box.
    #[default]
    Text,
    /// Synthesized and played as speech.
    Voice,
}

impl GenerationMode {
    /// Stable identifier used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Text => "text",
            GenerationMode::Voice => "voice",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language used for prompts, scenario pools, and persona style resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// English (default).
    #[default]
    En,
    /// Brazilian Portuguese.
    Pt,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Pt => "pt",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Personas
// =============================================================================

/// Style instructions for a persona, either shared or per language.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleText {
    /// One style string used for every language.
    Single(String),
    /// Style strings keyed by language code.
    Localized(BTreeMap<String, String>),
}

impl StyleText {
    /// Resolve the style for `language`.
    ///
    /// Localized styles fall back to English, then to the first entry in key
    /// order.
    pub fn resolve(&self, language: Language) -> &str {
        match self {
            StyleText::Single(text) => text,
            StyleText::Localized(map) => map
                .get(language.code())
                .or_else(|| map.get(Language::En.code()))
                .or_else(|| map.values().next())
                .map(String::as_str)
                .unwrap_or(""),
        }
    }

    /// Returns true when no language resolves to a non-blank style.
    pub fn is_blank(&self) -> bool {
        match self {
            StyleText::Single(text) => text.trim().is_empty(),
            StyleText::Localized(map) => map.values().all(|v| v.trim().is_empty()),
        }
    }
}

/// A named style profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Unique name within a registry snapshot.
    pub name: String,
    /// Persona-specific instruction text.
    pub style: StyleText,
}

impl Persona {
    pub fn new(name: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            style: StyleText::Single(style.into()),
        }
    }

    /// The synthetic persona used when no definitions are available.
    pub fn fallback() -> Self {
        Self::new("Default", "Style: Helpful teammate.")
    }

    /// Style text for the given language.
    pub fn style_for(&self, language: Language) -> &str {
        self.style.resolve(language)
    }
}
