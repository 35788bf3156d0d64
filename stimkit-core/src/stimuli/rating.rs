use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::input;
use crate::key::{Key, KeyPress};
use crate::rating::{RatingInput, RatingScale};
use crate::stimulus::{Outcome, Row, Stimulus};
use crate::surface::{Area, Surface, TextBlock};

fn default_dimensions() -> (f32, f32) {
    super::video::DEFAULT_MOVIE_SIZE
}

fn default_ticks() -> Vec<i32> {
    (1..=9).collect()
}

fn default_description() -> String {
    "Very negative  . . .  Very positive".to_owned()
}

fn default_header_size() -> f32 {
    0.15
}

fn default_scale_width() -> f32 {
    1.6
}

fn default_marker_start() -> i32 {
    5
}

fn default_low() -> i32 {
    1
}

fn default_high() -> i32 {
    9
}

fn default_accept_key() -> Key {
    Key::new(Key::RETURN)
}

fn yes() -> bool {
    true
}

fn default_prompt() -> String {
    "Rate the clip, then press return".to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRatingParams {
    pub movie: PathBuf,
    /// Where the continuous rating history is written as CSV.
    #[serde(default)]
    pub destination_path: Option<PathBuf>,
    #[serde(default = "default_dimensions")]
    pub movie_dimensions: (f32, f32),
    #[serde(default = "default_ticks")]
    pub tick_marks: Vec<i32>,
    #[serde(default = "default_description")]
    pub rating_description: String,
    #[serde(default)]
    pub header_text: Option<String>,
    #[serde(default = "default_header_size")]
    pub header_size: f32,
    #[serde(default = "default_scale_width")]
    pub scale_width: f32,
    #[serde(default = "default_marker_start")]
    pub marker_start: i32,
    #[serde(default = "default_low")]
    pub low: i32,
    #[serde(default = "default_high")]
    pub high: i32,
    #[serde(default = "default_accept_key")]
    pub accept_key: Key,
    /// Ask for a final rating once the movie ends.
    #[serde(default = "yes")]
    pub final_prompt: bool,
    #[serde(default = "default_prompt")]
    pub prompt_text: String,
}

impl VideoRatingParams {
    pub fn new(movie: impl Into<PathBuf>) -> Self {
        Self {
            movie: movie.into(),
            destination_path: None,
            movie_dimensions: default_dimensions(),
            tick_marks: default_ticks(),
            rating_description: default_description(),
            header_text: None,
            header_size: default_header_size(),
            scale_width: default_scale_width(),
            marker_start: default_marker_start(),
            low: default_low(),
            high: default_high(),
            accept_key: default_accept_key(),
            final_prompt: true,
            prompt_text: default_prompt(),
        }
    }

    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination_path = Some(path.into());
        self
    }

    pub fn scale(&self) -> RatingScale {
        let mut scale = RatingScale::new(self.low, self.high);
        scale.tick_marks = self.tick_marks.clone();
        scale.description = self.rating_description.clone();
        scale.accept_key = self.accept_key.clone();
        scale.stretch = self.scale_width;
        scale.with_marker_start(self.marker_start)
    }
}

/// A movie with a live rating scale underneath, followed by a prompt for a
/// final rating.
pub struct VideoRating<'s> {
    surface: &'s mut dyn Surface,
    params: VideoRatingParams,
    scale: RatingScale,
    final_rating: Option<(i32, KeyPress)>,
    prompt_onset: Option<Duration>,
}

impl<'s> VideoRating<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: VideoRatingParams) -> Self {
        let scale = params.scale();
        Self {
            surface,
            params,
            scale,
            final_rating: None,
            prompt_onset: None,
        }
    }

    fn header(&self) -> Option<TextBlock> {
        self.params.header_text.as_ref().map(|text| {
            TextBlock::new(text.clone())
                .at((0.0, 0.7))
                .height(self.params.header_size)
        })
    }

    /// Returns `false` when the quit key or a window close was seen.
    fn feed_keys(&mut self, quit: Option<&Key>, start: Duration, accept: bool) -> bool {
        if self.surface.close_requested() {
            return false;
        }
        for press in self.surface.poll_keys() {
            if quit == Some(&press.key) {
                return false;
            }
            let at = press.at.saturating_sub(start).as_secs_f64();
            if let RatingInput::Accepted(value) = self.scale.press(&press.key, at) {
                if accept && self.final_rating.is_none() {
                    self.final_rating = Some((value, press));
                }
            }
        }
        true
    }

    /// Show the prompt until a final rating is accepted.
    fn prompt(
        &mut self,
        header: Option<&TextBlock>,
        quit: Option<&Key>,
        start: Duration,
    ) -> Result<Outcome> {
        let prompt = TextBlock::new(self.params.prompt_text.clone()).height(0.08);
        self.surface.clear_events();
        self.prompt_onset = Some(self.surface.now());
        while self.final_rating.is_none() {
            self.surface.clear();
            self.surface.draw_text(&prompt);
            self.surface.draw_rating_scale(&self.scale);
            if let Some(header) = header {
                self.surface.draw_text(header);
            }
            input::flip_paced(&mut *self.surface)?;
            if !self.feed_keys(quit, start, true) {
                return Ok(Outcome::Quit);
            }
        }
        let press = self.final_rating.as_ref().map(|(_, press)| press.clone());
        Ok(press.map_or(Outcome::Finished, Outcome::Responded))
    }

    fn write_history(&self) -> Result<()> {
        let Some(dest) = &self.params.destination_path else {
            return Ok(());
        };
        if self.scale.history().is_empty() {
            info!("rating history is empty, nothing written");
            return Ok(());
        }
        std::fs::write(dest, self.scale.history_csv())?;
        info!(path = %dest.display(), changes = self.scale.history().len(), "wrote rating history");
        Ok(())
    }
}

impl Stimulus for VideoRating<'_> {
    fn kind(&self) -> &str {
        "video_rating"
    }

    fn show(&mut self) -> Result<Outcome> {
        let movie = self.surface.media().load_movie(&self.params.movie)?;
        let area = Area::centered(Some(self.params.movie_dimensions));
        let header = self.header();
        let quit = self.surface.quit_key().cloned();
        self.scale.reset();
        self.surface.clear_events();

        let start = self.surface.now();
        loop {
            if !self.feed_keys(quit.as_ref(), start, false) {
                return Ok(Outcome::Quit);
            }
            let t = self.surface.now().saturating_sub(start);
            let Some(frame) = movie.frame_at(t) else {
                break;
            };
            self.surface.clear();
            self.surface.draw_frame(frame, &area);
            self.surface.draw_rating_scale(&self.scale);
            if let Some(header) = &header {
                self.surface.draw_text(header);
            }
            input::flip_paced(&mut *self.surface)?;
        }

        let outcome = if self.params.final_prompt {
            self.prompt(header.as_ref(), quit.as_ref(), start)?
        } else {
            Outcome::Finished
        };
        if !outcome.is_quit() {
            self.surface.clear();
            self.surface.flip()?;
        }
        self.write_history()?;
        Ok(outcome)
    }

    fn record(&self) -> Option<Row> {
        let (value, press) = self.final_rating.as_ref()?;
        let mut row = super::response_row(self.kind(), self.prompt_onset, press);
        row.insert(
            "movie".into(),
            self.params.movie.to_string_lossy().into_owned().into(),
        );
        row.insert("rating".into(), (*value).into());
        row.insert("changes".into(), self.scale.history().len().into());
        Some(row)
    }
}
