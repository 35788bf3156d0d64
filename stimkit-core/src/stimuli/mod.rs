//! The built-in stimulus variants and their parameter structs.
//!
//! Parameter structs deserialize from a named object or from a positional
//! array in declaration order; trailing positional values may be left out.

mod audio;
mod image;
mod pause;
mod rating;
mod text;
mod video;
mod wait_key;
mod wait_ttl;

use std::time::Duration;

pub use audio::{Audio, AudioParams};
pub use image::{Image, ImageParams};
pub use pause::{Pause, PauseParams};
pub use rating::{VideoRating, VideoRatingParams};
pub use text::{Text, TextParams};
pub use video::{Video, VideoParams};
pub use wait_key::{KeyEvent, WaitForKey, WaitForKeyParams};
pub use wait_ttl::{WaitForTtl, WaitForTtlParams};

use crate::key::KeyPress;
use crate::stimulus::Row;

pub(crate) fn response_row(kind: &str, onset: Option<Duration>, press: &KeyPress) -> Row {
    let mut row = Row::new();
    row.insert("kind".into(), kind.into());
    row.insert("key".into(), press.key.as_str().into());
    row.insert("time".into(), press.at.as_secs_f64().into());
    if let Some(onset) = onset {
        row.insert(
            "rt".into(),
            press.at.saturating_sub(onset).as_secs_f64().into(),
        );
    }
    row
}
