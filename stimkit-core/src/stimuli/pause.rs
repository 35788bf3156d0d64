use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input;
use crate::stimulus::{Outcome, Stimulus};
use crate::surface::{Surface, seconds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseParams {
    pub duration: f64,
}

impl PauseParams {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

/// A blank screen for a fixed time.
pub struct Pause<'s> {
    surface: &'s mut dyn Surface,
    params: PauseParams,
}

impl<'s> Pause<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: PauseParams) -> Self {
        Self { surface, params }
    }
}

impl Stimulus for Pause<'_> {
    fn kind(&self) -> &str {
        "pause"
    }

    fn show(&mut self) -> Result<Outcome> {
        let duration = seconds(self.params.duration)?;
        self.surface.clear();
        self.surface.flip()?;
        input::hold(&mut *self.surface, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::headless::HeadlessBackend;
    use crate::surface::{Backend, WindowConfig};
    use std::time::Duration;

    #[test]
    fn integer_durations_are_accepted() {
        let p: PauseParams = serde_json::from_str("[2]").unwrap();
        assert_eq!(p, PauseParams::new(2.0));
    }

    #[test]
    fn blanks_the_screen_for_the_duration() {
        let mut backend = HeadlessBackend::new().with_frame_interval(Duration::ZERO);
        let log = backend.log();
        let mut surface = backend.open(&WindowConfig::default(), None).unwrap();
        let outcome = Pause::new(&mut surface, PauseParams::new(1.0)).show().unwrap();
        assert_eq!(outcome, Outcome::Finished);
        assert_eq!(surface.now(), Duration::from_secs(1));
        assert!(log.texts().is_empty());
    }

    #[test]
    fn negative_durations_fail() {
        let mut backend = HeadlessBackend::new();
        let mut surface = backend.open(&WindowConfig::default(), None).unwrap();
        let err = Pause::new(&mut surface, PauseParams::new(-1.0)).show().unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }
}
