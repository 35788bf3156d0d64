use std::path::PathBuf;

use crate::playback::PlaybackState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load media {path}: {reason}")]
    Media { path: PathBuf, reason: String },

    #[error("invalid stimulus parameters: {0}")]
    InvalidParams(String),

    #[error("unsupported data format '{0}'")]
    UnsupportedFormat(String),

    #[error("there are no stimuli left to play")]
    Exhausted,

    #[error("stimulus index {index} is out of range (paradigm holds {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("paradigm has already been played ({0:?})")]
    AlreadyPlayed(PlaybackState),

    #[error("display surface is closed")]
    SurfaceClosed,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn media(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Media {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }
}
