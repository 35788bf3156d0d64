use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input;
use crate::key::{KeyPress, KeySet};
use crate::stimulus::{Outcome, Row, Stimulus};
use crate::surface::{Rgba, Surface, TextBlock, seconds};

pub(crate) fn default_duration() -> f64 {
    2.0
}

fn default_height() -> f32 {
    0.1
}

fn default_color() -> Rgba {
    Rgba::WHITE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
    pub text: String,
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Keys that must be pressed after `duration` before moving on.
    #[serde(default)]
    pub keys: Option<KeySet>,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default = "default_color")]
    pub color: Rgba,
    #[serde(default)]
    pub pos: (f32, f32),
    #[serde(default)]
    pub wrap_width: Option<f32>,
}

impl TextParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration: default_duration(),
            keys: None,
            height: default_height(),
            color: default_color(),
            pos: (0.0, 0.0),
            wrap_width: None,
        }
    }

    pub fn duration(mut self, secs: f64) -> Self {
        self.duration = secs;
        self
    }

    pub fn keys(mut self, keys: impl Into<KeySet>) -> Self {
        self.keys = Some(keys.into());
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    pub fn color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    pub fn pos(mut self, pos: (f32, f32)) -> Self {
        self.pos = pos;
        self
    }

    pub(crate) fn block(&self) -> TextBlock {
        TextBlock {
            text: self.text.clone(),
            pos: self.pos,
            height: self.height,
            color: self.color,
            wrap_width: self.wrap_width,
        }
    }
}

/// Text on screen for a fixed time, optionally followed by a key wait.
pub struct Text<'s> {
    surface: &'s mut dyn Surface,
    params: TextParams,
    onset: Option<Duration>,
    response: Option<KeyPress>,
}

impl<'s> Text<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: TextParams) -> Self {
        Self {
            surface,
            params,
            onset: None,
            response: None,
        }
    }
}

impl Stimulus for Text<'_> {
    fn kind(&self) -> &str {
        "text"
    }

    fn show(&mut self) -> Result<Outcome> {
        let duration = seconds(self.params.duration)?;
        self.surface.clear();
        self.surface.draw_text(&self.params.block());
        self.surface.flip()?;
        self.onset = Some(self.surface.now());

        let mut outcome = input::hold(&mut *self.surface, duration)?;
        if outcome.is_quit() {
            return Ok(outcome);
        }
        if let Some(keys) = &self.params.keys {
            outcome = input::wait_for_keys(&mut *self.surface, keys)?;
            if outcome.is_quit() {
                return Ok(outcome);
            }
            self.response = outcome.response().cloned();
        }
        self.surface.clear();
        self.surface.flip()?;
        Ok(outcome)
    }

    fn record(&self) -> Option<Row> {
        let press = self.response.as_ref()?;
        let mut row = super::response_row(self.kind(), self.onset, press);
        row.insert("text".into(), self.params.text.clone().into());
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DrawCall, HeadlessBackend};
    use crate::key::Key;
    use crate::surface::{Backend, WindowConfig};

    #[test]
    fn positional_and_named_arguments_agree() {
        let positional: TextParams = serde_json::from_str(r#"["Hello", 1.0]"#).unwrap();
        let named: TextParams =
            serde_json::from_str(r#"{"text": "Hello", "duration": 1.0}"#).unwrap();
        assert_eq!(positional, named);
        assert_eq!(positional, TextParams::new("Hello").duration(1.0));
    }

    #[test]
    fn duration_defaults_to_two_seconds() {
        let p: TextParams = serde_json::from_str(r#"["Here's some more text"]"#).unwrap();
        assert_eq!(p.duration, 2.0);
        assert_eq!(p.keys, None);
    }

    #[test]
    fn shows_text_for_its_duration() {
        let mut backend = HeadlessBackend::new().with_frame_interval(Duration::ZERO);
        let log = backend.log();
        let mut surface = backend.open(&WindowConfig::default(), None).unwrap();
        let mut text = Text::new(&mut surface, TextParams::new("Hello").duration(1.0));
        assert_eq!(text.show().unwrap(), Outcome::Finished);
        assert!(text.record().is_none());
        drop(text);
        assert_eq!(surface.now(), Duration::from_secs(1));
        assert_eq!(log.texts(), vec!["Hello".to_owned()]);
        assert_eq!(
            log.calls(),
            vec![
                DrawCall::Clear,
                DrawCall::Text("Hello".into()),
                DrawCall::Flip,
                DrawCall::Clear,
                DrawCall::Flip
            ]
        );
    }

    #[test]
    fn waits_for_a_key_and_records_the_response() {
        let mut backend = HeadlessBackend::new()
            .with_frame_interval(Duration::ZERO)
            .press("space", 1.5);
        let mut surface = backend.open(&WindowConfig::default(), None).unwrap();
        let mut text = Text::new(
            &mut surface,
            TextParams::new("Press space").duration(1.0).keys(["space"]),
        );
        let outcome = text.show().unwrap();
        assert_eq!(outcome.response().unwrap().key, Key::new("space"));
        let row = text.record().unwrap();
        assert_eq!(row["rt"], 1.5);
        assert_eq!(row["text"], "Press space");
    }
}
