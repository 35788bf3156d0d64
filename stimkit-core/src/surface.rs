use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::{Key, KeyPress};
use crate::media::{Frame, MediaLoader, SoundClip};
use crate::rating::RatingScale;

/// The shared display context every stimulus draws into.
///
/// Positions and sizes are in norm units: `-1.0..=1.0` on both axes, origin
/// at the centre, y pointing up. Drawing goes to a back buffer that becomes
/// visible on [`Surface::flip`].
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Fill the back buffer with the window colour.
    fn clear(&mut self);
    fn draw_text(&mut self, text: &TextBlock);
    fn draw_image(&mut self, image: &ImageBlock) -> Result<()>;
    fn draw_frame(&mut self, frame: &Frame, area: &Area);
    fn draw_rating_scale(&mut self, scale: &RatingScale);
    fn flip(&mut self) -> Result<()>;

    /// Drain the key presses received since the last poll.
    fn poll_keys(&mut self) -> Vec<KeyPress>;
    fn clear_events(&mut self);
    fn close_requested(&self) -> bool;
    /// The reserved key that ends the whole paradigm.
    fn quit_key(&self) -> Option<&Key>;

    /// Time since the surface opened.
    fn now(&self) -> Duration;
    /// Wait up to `d` while keeping the window responsive.
    fn idle(&mut self, d: Duration) -> Result<()>;

    fn media(&self) -> &dyn MediaLoader;
    fn play_sound(&mut self, clip: &SoundClip) -> Result<()>;
    fn stop_sound(&mut self);

    fn close(&mut self);
}

/// Opens display surfaces. A paradigm opens at most one per playback.
pub trait Backend {
    type Surface: Surface + 'static;

    fn open(&mut self, config: &WindowConfig, quit_key: Option<Key>) -> Result<Self::Surface>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColorSpec", into = "[u8; 4]")]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);

    pub fn named(name: &str) -> Option<Self> {
        let rgb = match name.trim().to_lowercase().as_str() {
            "black" => [0, 0, 0],
            "white" => [255, 255, 255],
            "grey" | "gray" => [128, 128, 128],
            "red" => [255, 0, 0],
            "green" => [0, 128, 0],
            "blue" => [0, 0, 255],
            "yellow" => [255, 255, 0],
            hex if hex.starts_with('#') && hex.len() == 7 => {
                let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
                [channel(1)?, channel(3)?, channel(5)?]
            }
            _ => return None,
        };
        Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ColorSpec {
    Name(String),
    Rgb([u8; 3]),
    Rgba([u8; 4]),
}

impl TryFrom<ColorSpec> for Rgba {
    type Error = String;

    fn try_from(spec: ColorSpec) -> std::result::Result<Self, Self::Error> {
        match spec {
            ColorSpec::Name(name) => Rgba::named(&name).ok_or(format!("unknown color '{name}'")),
            ColorSpec::Rgb([r, g, b]) => Ok(Rgba([r, g, b, 255])),
            ColorSpec::Rgba(c) => Ok(Rgba(c)),
        }
    }
}

impl From<Rgba> for [u8; 4] {
    fn from(c: Rgba) -> Self {
        c.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SizeSpec", into = "SizeSpec")]
pub enum WindowSize {
    Windowed { width: u32, height: u32 },
    FullScreen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SizeSpec {
    Dims([u32; 2]),
    Named(String),
}

impl TryFrom<SizeSpec> for WindowSize {
    type Error = String;

    fn try_from(spec: SizeSpec) -> std::result::Result<Self, Self::Error> {
        match spec {
            SizeSpec::Dims([width, height]) if width > 0 && height > 0 => {
                Ok(WindowSize::Windowed { width, height })
            }
            SizeSpec::Dims(dims) => Err(format!("window dimensions must be non-zero, got {dims:?}")),
            SizeSpec::Named(name) if matches!(name.as_str(), "full_screen" | "fullscr") => {
                Ok(WindowSize::FullScreen)
            }
            SizeSpec::Named(name) => Err(format!("unknown window size '{name}'")),
        }
    }
}

impl From<WindowSize> for SizeSpec {
    fn from(size: WindowSize) -> Self {
        match size {
            WindowSize::Windowed { width, height } => SizeSpec::Dims([width, height]),
            WindowSize::FullScreen => SizeSpec::Named("full_screen".to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub size: WindowSize,
    pub color: Rgba,
    pub title: String,
    /// TrueType font used for text; common system fonts are tried when unset.
    pub font: Option<PathBuf>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: WindowSize::Windowed {
                width: 720,
                height: 480,
            },
            color: Rgba::BLACK,
            title: "stimkit".to_owned(),
            font: None,
        }
    }
}

/// Placement of an image or movie frame. `size: None` keeps the source's
/// pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub center: (f32, f32),
    pub size: Option<(f32, f32)>,
}

impl Area {
    pub fn centered(size: Option<(f32, f32)>) -> Self {
        Self {
            center: (0.0, 0.0),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub pos: (f32, f32),
    /// Letter height in norm units.
    pub height: f32,
    pub color: Rgba,
    pub wrap_width: Option<f32>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pos: (0.0, 0.0),
            height: 0.1,
            color: Rgba::WHITE,
            wrap_width: None,
        }
    }

    pub fn at(mut self, pos: (f32, f32)) -> Self {
        self.pos = pos;
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub path: PathBuf,
    pub area: Area,
}

/// Longest duration any stimulus may ask for: one day.
pub const MAX_SECONDS: f64 = 86_400.0;

/// Convert a duration in seconds, rejecting negative, non-finite and
/// out-of-range values.
pub fn seconds(value: f64) -> Result<Duration> {
    if value > MAX_SECONDS {
        return Err(Error::invalid(format!(
            "duration of {value}s exceeds the {MAX_SECONDS}s limit"
        )));
    }
    Duration::try_from_secs_f64(value).map_err(|_| {
        Error::invalid(format!(
            "duration must be a finite, non-negative number of seconds, got {value}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_parse_from_names_hex_and_arrays() {
        let c: Rgba = serde_json::from_str(r#""Black""#).unwrap();
        assert_eq!(c, Rgba::BLACK);
        let c: Rgba = serde_json::from_str(r##""#ff8000""##).unwrap();
        assert_eq!(c, Rgba([255, 128, 0, 255]));
        let c: Rgba = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(c, Rgba([1, 2, 3, 255]));
        let c: Rgba = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(c, Rgba([1, 2, 3, 4]));
        assert!(serde_json::from_str::<Rgba>(r#""mauve""#).is_err());
    }

    #[test]
    fn window_size_accepts_dimensions_or_full_screen() {
        let s: WindowSize = serde_json::from_str("[1024, 768]").unwrap();
        assert_eq!(
            s,
            WindowSize::Windowed {
                width: 1024,
                height: 768
            }
        );
        let s: WindowSize = serde_json::from_str(r#""fullscr""#).unwrap();
        assert_eq!(s, WindowSize::FullScreen);
        assert!(serde_json::from_str::<WindowSize>("[0, 768]").is_err());
    }

    #[test]
    fn window_config_fills_in_defaults() {
        let cfg: WindowConfig = serde_json::from_str(r#"{"color": "white"}"#).unwrap();
        assert_eq!(cfg.color, Rgba::WHITE);
        assert_eq!(
            cfg.size,
            WindowSize::Windowed {
                width: 720,
                height: 480
            }
        );
    }

    #[test]
    fn seconds_rejects_negative_and_nan() {
        assert_eq!(seconds(1.5).unwrap(), Duration::from_millis(1500));
        assert!(matches!(seconds(-1.0), Err(Error::InvalidParams(_))));
        assert!(seconds(f64::NAN).is_err());
        assert!(seconds(MAX_SECONDS).is_ok());
        assert!(matches!(seconds(1.8e19), Err(Error::InvalidParams(_))));
        assert!(seconds(f64::INFINITY).is_err());
    }
}
