use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a single playback pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Finished,
    Aborted,
}

impl PlaybackState {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        })
    }
}
