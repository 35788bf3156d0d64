//! Building blocks for presenting stimulus sequences: the [`Stimulus`]
//! contract, the [`Surface`] a stimulus draws into, key handling, media
//! clips and the built-in stimulus variants.

pub mod error;
pub mod headless;
pub mod input;
pub mod key;
pub mod media;
pub mod playback;
pub mod rating;
pub mod stimuli;
pub mod stimulus;
pub mod surface;

pub use error::{Error, Result};
pub use headless::{DrawCall, HeadlessBackend, HeadlessLog, HeadlessSurface};
pub use key::{Key, KeyPress, KeySet};
pub use media::{Frame, MediaLoader, MovieClip, NoMedia, SoundClip, SoundSource};
pub use playback::PlaybackState;
pub use rating::{RatingInput, RatingScale};
pub use stimulus::{Outcome, Row, Stimulus, StimulusFactory};
pub use surface::{Area, Backend, ImageBlock, Rgba, Surface, TextBlock, WindowConfig, WindowSize};
