use std::fmt::Write as _;

use crate::key::Key;

/// Result of feeding one key press to a [`RatingScale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingInput {
    Moved(i32),
    Accepted(i32),
    Ignored,
}

/// A Likert-style scale with a movable marker.
///
/// Left/right step the marker, digit keys jump to that value, the accept
/// key submits. Every marker change is logged with its time.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingScale {
    pub low: i32,
    pub high: i32,
    pub tick_marks: Vec<i32>,
    pub description: String,
    pub marker_start: i32,
    pub accept_key: Key,
    /// Centre of the scale line, norm units.
    pub pos: (f32, f32),
    /// Length of the scale line, norm units.
    pub stretch: f32,
    marker: i32,
    history: Vec<(i32, f64)>,
}

impl RatingScale {
    pub fn new(low: i32, high: i32) -> Self {
        let (low, high) = (low.min(high), low.max(high));
        let start = low + (high - low) / 2;
        Self {
            low,
            high,
            tick_marks: (low..=high).collect(),
            description: String::new(),
            marker_start: start,
            accept_key: Key::new(Key::RETURN),
            pos: (0.0, -0.75),
            stretch: 1.5,
            marker: start,
            history: Vec::new(),
        }
    }

    pub fn with_marker_start(mut self, start: i32) -> Self {
        self.marker_start = start;
        self.reset();
        self
    }

    pub fn marker(&self) -> i32 {
        self.marker
    }

    pub fn history(&self) -> &[(i32, f64)] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.marker = self.marker_start.clamp(self.low, self.high);
        self.history.clear();
    }

    /// Fraction along the line (0 at `low`, 1 at `high`) of a value.
    pub fn fraction(&self, value: i32) -> f32 {
        if self.high == self.low {
            return 0.5;
        }
        (value - self.low) as f32 / (self.high - self.low) as f32
    }

    pub fn press(&mut self, key: &Key, at_secs: f64) -> RatingInput {
        if *key == self.accept_key {
            return RatingInput::Accepted(self.marker);
        }
        let target = match key.as_str() {
            Key::LEFT => self.marker - 1,
            Key::RIGHT => self.marker + 1,
            _ => match key.digit() {
                Some(d) if (self.low..=self.high).contains(&d) => d,
                _ => return RatingInput::Ignored,
            },
        };
        let target = target.clamp(self.low, self.high);
        if target == self.marker {
            return RatingInput::Ignored;
        }
        self.marker = target;
        self.history.push((target, at_secs));
        RatingInput::Moved(target)
    }

    /// The history as `Rating,Time` CSV, times rounded to 8 decimals.
    pub fn history_csv(&self) -> String {
        let mut out = String::from("Rating,Time\n");
        for (rating, time) in &self.history {
            let rounded = (time * 1e8).round() / 1e8;
            let _ = writeln!(out, "{rating},{rounded}");
        }
        out
    }
}
