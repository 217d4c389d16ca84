//! Live context for grounding generated lines.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

/// Reports what is happening on screen right now.
#[async_trait]
pub trait ContextObserver: Send + Sync {
    /// Current observation, or an empty string when nothing useful is known.
    async fn get_context(&self) -> String;
}

/// Reads the observation from a text file another process keeps updated.
#[derive(Debug, Clone)]
pub struct FileContextObserver {
    path: PathBuf,
}

impl FileContextObserver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContextObserver for FileContextObserver {
    async fn get_context(&self) -> String {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                let trimmed = text.trim();
                debug!(chars = trimmed.len(), "Observed context loaded");
                trimmed.to_string()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read context file");
                String::new()
            }
        }
    }
}
