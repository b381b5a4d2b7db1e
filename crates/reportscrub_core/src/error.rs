// error.rs: error taxonomy for the scrubbing engine
use std::path::PathBuf;

use thiserror::Error;

use crate::category::Category;

#[derive(Debug, Error)]
pub enum ScrubError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8 text", path.display())]
    NotText { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid regex pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Cannot use word list {}: {reason}", path.display())]
    WordList { path: PathBuf, reason: String },

    #[error("No unused fake {category} values left")]
    Exhausted { category: Category },

    /// A fake value was about to be issued to a second original token.
    #[error("Fake {category} value {fake:?} is already issued")]
    Collision { category: Category, fake: String },

    /// Two different fake values were produced for the same original token.
    #[error("Conflicting fake {category} values for {original:?}")]
    Inconsistent { category: Category, original: String },
}

impl ScrubError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScrubError::Io { path: path.into(), source }
    }

    /// File-level errors are isolated to one file; everything else aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScrubError::Io { .. } | ScrubError::NotText { .. })
    }
}

pub type Result<T, E = ScrubError> = std::result::Result<T, E>;
