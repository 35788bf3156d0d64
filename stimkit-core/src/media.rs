use std::f64::consts::TAU;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const TONE_SAMPLE_RATE: u32 = 44_100;
/// Longest tone that will be synthesized.
pub const MAX_TONE_SECS: f64 = 600.0;
const FADE_SECS: f64 = 0.005;

/// Decodes media files for a surface. Implemented by the rendering backend.
pub trait MediaLoader {
    fn load_sound(&self, path: &Path) -> Result<SoundClip>;
    fn load_movie(&self, path: &Path) -> Result<MovieClip>;
}

/// Loader for surfaces that cannot decode anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMedia;

impl MediaLoader for NoMedia {
    fn load_sound(&self, path: &Path) -> Result<SoundClip> {
        Err(Error::media(path, "no media decoder available"))
    }

    fn load_movie(&self, path: &Path) -> Result<MovieClip> {
        Err(Error::media(path, "no media decoder available"))
    }
}

/// What an audio stimulus plays: a pure tone in Hz, a note name such as
/// `"A"` or `"C#5"`, or a sound file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SoundSpec", into = "SoundSpec")]
pub enum SoundSource {
    Tone(f64),
    Note(String),
    File(PathBuf),
}

impl SoundSource {
    /// Frequency of synthesized sources; `None` for files.
    pub fn frequency(&self) -> Option<f64> {
        match self {
            SoundSource::Tone(hz) => Some(*hz),
            SoundSource::Note(name) => note_frequency(name),
            SoundSource::File(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SoundSpec {
    Hz(f64),
    Name(String),
}

impl From<SoundSpec> for SoundSource {
    fn from(spec: SoundSpec) -> Self {
        match spec {
            SoundSpec::Hz(hz) => SoundSource::Tone(hz),
            SoundSpec::Name(name) if note_frequency(&name).is_some() => SoundSource::Note(name),
            SoundSpec::Name(name) => SoundSource::File(PathBuf::from(name)),
        }
    }
}

impl From<SoundSource> for SoundSpec {
    fn from(source: SoundSource) -> Self {
        match source {
            SoundSource::Tone(hz) => SoundSpec::Hz(hz),
            SoundSource::Note(name) => SoundSpec::Name(name),
            SoundSource::File(path) => SoundSpec::Name(path.to_string_lossy().into_owned()),
        }
    }
}

/// Equal-tempered frequency of a note name: letter, optional `#`/`b`,
/// optional octave (default 4). A4 is 440 Hz.
pub fn note_frequency(name: &str) -> Option<f64> {
    let mut chars = name.trim().chars().peekable();
    let semitone = match chars.next()?.to_ascii_uppercase() {
        'C' => -9,
        'D' => -7,
        'E' => -5,
        'F' => -4,
        'G' => -2,
        'A' => 0,
        'B' => 2,
        _ => return None,
    };
    let accidental = match chars.peek() {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    if accidental != 0 {
        chars.next();
    }
    let rest: String = chars.collect();
    let octave = if rest.is_empty() {
        4
    } else {
        rest.parse::<i32>().ok().filter(|o| (0..=9).contains(o))?
    };
    let offset = semitone + accidental + 12 * (octave - 4);
    Some(440.0 * 2f64.powf(offset as f64 / 12.0))
}

/// Decoded audio as interleaved `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Arc<[f32]>,
}

impl SoundClip {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(Error::invalid("sound clips need a sample rate and channels"));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples: samples.into(),
        })
    }

    /// A mono sine tone with short linear fades so it starts and stops
    /// without clicks.
    pub fn tone(hz: f64, secs: f64, sample_rate: u32) -> Result<Self> {
        if !(hz.is_finite() && hz > 0.0) {
            return Err(Error::invalid(format!("tone frequency must be positive, got {hz}")));
        }
        let secs = crate::surface::seconds(secs)?.as_secs_f64();
        if secs > MAX_TONE_SECS {
            return Err(Error::invalid(format!(
                "tone of {secs}s is longer than {MAX_TONE_SECS}s"
            )));
        }
        let len = secs * sample_rate as f64;
        let len = len.round() as usize;
        let fade = ((FADE_SECS * sample_rate as f64) as usize).min(len / 2).max(1);
        let samples = (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                let edge = i.min(len - 1 - i);
                let gain = (edge as f64 / fade as f64).min(1.0);
                ((TAU * hz * t).sin() * gain) as f32
            })
            .collect();
        Self::new(sample_rate, 1, samples)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    pub fn with_volume(self, volume: f32) -> Self {
        if (volume - 1.0).abs() < f32::EPSILON {
            return self;
        }
        let samples: Vec<f32> = self.samples.iter().map(|s| s * volume).collect();
        Self {
            samples: samples.into(),
            ..self
        }
    }
}

/// One decoded picture in straight (non-premultiplied) RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(Error::invalid(format!(
                "frame of {width}x{height} needs {expected} bytes, got {}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba: rgba.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieFrame {
    pub frame: Frame,
    pub delay: Duration,
}

/// A fully decoded movie: frames with their display durations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieClip {
    pub frames: Vec<MovieFrame>,
}

impl MovieClip {
    pub fn duration(&self) -> Duration {
        self.frames.iter().map(|f| f.delay).sum()
    }

    /// The frame on screen `t` after the movie started, or `None` once it
    /// has finished.
    pub fn frame_at(&self, t: Duration) -> Option<&Frame> {
        let mut end = Duration::ZERO;
        for f in &self.frames {
            end += f.delay;
            if t < end {
                return Some(&f.frame);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_map_to_equal_temperament() {
        assert_eq!(note_frequency("A"), Some(440.0));
        assert_eq!(note_frequency("a5"), Some(880.0));
        let c4 = note_frequency("C").unwrap();
        assert!((c4 - 261.6256).abs() < 1e-3);
        let cs = note_frequency("C#").unwrap();
        let db = note_frequency("Db").unwrap();
        assert!((cs - db).abs() < 1e-9);
        assert_eq!(note_frequency("H"), None);
        assert_eq!(note_frequency("beep.wav"), None);
    }

    #[test]
    fn sources_deserialize_by_shape() {
        let s: SoundSource = serde_json::from_str("440").unwrap();
        assert_eq!(s, SoundSource::Tone(440.0));
        let s: SoundSource = serde_json::from_str(r#""C#""#).unwrap();
        assert_eq!(s, SoundSource::Note("C#".into()));
        let s: SoundSource = serde_json::from_str(r#""sounds/ding.wav""#).unwrap();
        assert_eq!(s, SoundSource::File("sounds/ding.wav".into()));
        assert_eq!(s.frequency(), None);
    }

    #[test]
    fn tone_has_requested_length_and_fades() {
        let clip = SoundClip::tone(440.0, 0.5, 1000).unwrap();
        assert_eq!(clip.frames(), 500);
        assert_eq!(clip.duration(), Duration::from_millis(500));
        assert_eq!(clip.samples[0], 0.0);
        assert!(clip.samples.iter().all(|s| s.abs() <= 1.0));
        assert!(SoundClip::tone(0.0, 0.5, 1000).is_err());
    }

    #[test]
    fn overlong_tones_are_refused_before_allocating() {
        assert!(matches!(
            SoundClip::tone(440.0, MAX_TONE_SECS + 1.0, TONE_SAMPLE_RATE),
            Err(Error::InvalidParams(_))
        ));
        assert!(SoundClip::tone(440.0, 1.8e19, TONE_SAMPLE_RATE).is_err());
    }

    #[test]
    fn volume_scales_samples() {
        let clip = SoundClip::new(10, 1, vec![0.5, -1.0]).unwrap().with_volume(0.5);
        assert_eq!(&*clip.samples, &[0.25, -0.5]);
    }

    #[test]
    fn movie_frames_follow_their_delays() {
        let frame = |v: u8| Frame::new(1, 1, vec![v, v, v, 255]).unwrap();
        let clip = MovieClip {
            frames: vec![
                MovieFrame {
                    frame: frame(1),
                    delay: Duration::from_millis(100),
                },
                MovieFrame {
                    frame: frame(2),
                    delay: Duration::from_millis(50),
                },
            ],
        };
        assert_eq!(clip.duration(), Duration::from_millis(150));
        assert_eq!(clip.frame_at(Duration::ZERO).unwrap().rgba[0], 1);
        assert_eq!(clip.frame_at(Duration::from_millis(120)).unwrap().rgba[0], 2);
        assert!(clip.frame_at(Duration::from_millis(150)).is_none());
    }

    #[test]
    fn frames_check_their_buffer_size() {
        assert!(Frame::new(2, 2, vec![0; 15]).is_err());
        assert!(Frame::new(2, 2, vec![0; 16]).is_ok());
    }
}
