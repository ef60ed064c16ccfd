use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("cannot scan {}: {reason}", root.display())]
    Scan { root: PathBuf, reason: String },

    #[error("{0}")]
    Engine(String),

    #[error("No songs found in the selected directory")]
    NoTracks,

    #[error("Music is paused, cannot skip")]
    Paused,

    #[error("failed to access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot read tags of {}: {reason}", path.display())]
    Metadata { path: PathBuf, reason: String },

    #[error("{0}")]
    Video(String),
}

impl PlayerError {
    pub fn engine(err: anyhow::Error) -> Self {
        Self::Engine(format!("{err:#}"))
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Persistence errors cover both I/O and malformed documents.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Serialize { .. })
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
