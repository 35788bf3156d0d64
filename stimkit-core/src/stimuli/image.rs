use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input;
use crate::key::{KeyPress, KeySet};
use crate::stimulus::{Outcome, Row, Stimulus};
use crate::surface::{Area, ImageBlock, Surface, TextBlock, seconds};

fn default_text_size() -> f32 {
    0.15
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    pub image: PathBuf,
    pub duration: f64,
    /// Caption shown near the top of the screen.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_text_size")]
    pub text_size: f32,
    #[serde(default)]
    pub keys: Option<KeySet>,
    /// Size in norm units; the image's own pixel size when unset.
    #[serde(default)]
    pub size: Option<(f32, f32)>,
}

impl ImageParams {
    pub fn new(image: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            image: image.into(),
            duration,
            text: None,
            text_size: default_text_size(),
            keys: None,
            size: None,
        }
    }

    pub fn caption(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn keys(mut self, keys: impl Into<KeySet>) -> Self {
        self.keys = Some(keys.into());
        self
    }
}

pub struct Image<'s> {
    surface: &'s mut dyn Surface,
    params: ImageParams,
    onset: Option<Duration>,
    response: Option<KeyPress>,
}

impl<'s> Image<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: ImageParams) -> Self {
        Self {
            surface,
            params,
            onset: None,
            response: None,
        }
    }
}

impl Stimulus for Image<'_> {
    fn kind(&self) -> &str {
        "image"
    }

    fn show(&mut self) -> Result<Outcome> {
        let duration = seconds(self.params.duration)?;
        self.surface.clear();
        self.surface.draw_image(&ImageBlock {
            path: self.params.image.clone(),
            area: Area::centered(self.params.size),
        })?;
        if let Some(text) = &self.params.text {
            let caption = TextBlock::new(text.clone())
                .at((0.0, 0.7))
                .height(self.params.text_size);
            self.surface.draw_text(&caption);
        }
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
        row.insert(
            "image".into(),
            self.params.image.to_string_lossy().into_owned().into(),
        );
        Some(row)
    }
}
