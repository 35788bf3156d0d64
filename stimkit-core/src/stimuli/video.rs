use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input::{self, Scan};
use crate::stimulus::{Outcome, Stimulus};
use crate::surface::{Area, Surface};

/// Half the window in each direction.
pub(crate) const DEFAULT_MOVIE_SIZE: (f32, f32) = (1.0, 1.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    pub movie: PathBuf,
    /// Size in norm units.
    #[serde(default)]
    pub movie_dimensions: Option<(f32, f32)>,
}

impl VideoParams {
    pub fn new(movie: impl Into<PathBuf>) -> Self {
        Self {
            movie: movie.into(),
            movie_dimensions: None,
        }
    }
}

/// Plays a movie once, start to finish.
pub struct Video<'s> {
    surface: &'s mut dyn Surface,
    params: VideoParams,
}

impl<'s> Video<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: VideoParams) -> Self {
        Self { surface, params }
    }
}

impl Stimulus for Video<'_> {
    fn kind(&self) -> &str {
        "video"
    }

    fn show(&mut self) -> Result<Outcome> {
        let movie = self.surface.media().load_movie(&self.params.movie)?;
        let area = Area::centered(Some(
            self.params.movie_dimensions.unwrap_or(DEFAULT_MOVIE_SIZE),
        ));
        let start = self.surface.now();
        loop {
            if input::scan(&mut *self.surface, None) == Scan::Quit {
                return Ok(Outcome::Quit);
            }
            let t = self.surface.now().saturating_sub(start);
            let Some(frame) = movie.frame_at(t) else {
                break;
            };
            self.surface.clear();
            self.surface.draw_frame(frame, &area);
            input::flip_paced(&mut *self.surface)?;
        }
        self.surface.clear();
        self.surface.flip()?;
        Ok(Outcome::Finished)
    }
}
