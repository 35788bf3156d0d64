use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::input;
use crate::media::{SoundClip, SoundSource, TONE_SAMPLE_RATE};
use crate::stimulus::{Outcome, Stimulus};
use crate::surface::{Surface, TextBlock};

fn default_tone_secs() -> f64 {
    0.5
}

fn unit_volume() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    pub value: SoundSource,
    #[serde(default)]
    pub text: Option<String>,
    /// Length of synthesized tones; files play in full.
    #[serde(default = "default_tone_secs")]
    pub secs: f64,
    #[serde(default = "unit_volume")]
    pub volume: f32,
}

impl AudioParams {
    pub fn new(value: SoundSource) -> Self {
        Self {
            value,
            text: None,
            secs: default_tone_secs(),
            volume: unit_volume(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Plays a sound to completion, optionally with text on screen.
pub struct Audio<'s> {
    surface: &'s mut dyn Surface,
    params: AudioParams,
}

impl<'s> Audio<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: AudioParams) -> Self {
        Self { surface, params }
    }

    fn clip(&self) -> Result<SoundClip> {
        let clip = match &self.params.value {
            SoundSource::File(path) => self.surface.media().load_sound(path)?,
            source => {
                let hz = source
                    .frequency()
                    .ok_or_else(|| Error::invalid(format!("cannot synthesize {source:?}")))?;
                SoundClip::tone(hz, self.params.secs, TONE_SAMPLE_RATE)?
            }
        };
        Ok(clip.with_volume(self.params.volume))
    }
}

impl Stimulus for Audio<'_> {
    fn kind(&self) -> &str {
        "audio"
    }

    fn show(&mut self) -> Result<Outcome> {
        let clip = self.clip()?;
        self.surface.clear();
        if let Some(text) = &self.params.text {
            self.surface.draw_text(&TextBlock::new(text.clone()));
        }
        self.surface.flip()?;
        self.surface.play_sound(&clip)?;
        let outcome = input::hold(&mut *self.surface, clip.duration())?;
        self.surface.stop_sound();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DrawCall, HeadlessBackend};
    use crate::surface::{Backend, WindowConfig};
    use std::time::Duration;

    #[test]
    fn tones_play_for_their_length() {
        let mut backend = HeadlessBackend::new().with_frame_interval(Duration::ZERO);
        let log = backend.log();
        let mut surface = backend.open(&WindowConfig::default(), None).unwrap();
        let params: AudioParams = serde_json::from_str(r#"["A", "Listen"]"#).unwrap();
        let outcome = Audio::new(&mut surface, params).show().unwrap();
        assert_eq!(outcome, Outcome::Finished);
        assert_eq!(surface.now(), Duration::from_millis(500));
        let calls = log.calls();
        assert!(calls.contains(&DrawCall::Text("Listen".into())));
        assert!(calls.contains(&DrawCall::SoundStarted(Duration::from_millis(500))));
        assert_eq!(calls.last(), Some(&DrawCall::SoundStopped));
    }

    #[test]
    fn files_need_a_media_loader() {
        let mut backend = HeadlessBackend::new();
        let mut surface = backend.open(&WindowConfig::default(), None).unwrap();
        let params = AudioParams::new(SoundSource::File("ding.wav".into()));
        let err = Audio::new(&mut surface, params).show().unwrap_err();
        assert!(matches!(err, Error::Media { .. }));
    }
}
