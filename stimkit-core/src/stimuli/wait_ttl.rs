use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input::POLL_INTERVAL;
use crate::key::Key;
use crate::stimulus::{Outcome, Row, Stimulus};
use crate::surface::{Surface, TextBlock};

/// Scanner trigger boxes commonly emit a `5` keystroke per TTL pulse.
fn default_trigger() -> Key {
    Key::new("5")
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitForTtlParams {
    #[serde(default = "default_trigger")]
    pub trigger: Key,
    /// Pulses to receive before continuing.
    #[serde(default = "one")]
    pub count: u32,
    #[serde(default)]
    pub text: Option<String>,
}

impl Default for WaitForTtlParams {
    fn default() -> Self {
        Self {
            trigger: default_trigger(),
            count: 1,
            text: None,
        }
    }
}

/// Block until the hardware trigger has pulsed `count` times.
pub struct WaitForTtl<'s> {
    surface: &'s mut dyn Surface,
    params: WaitForTtlParams,
    pulses: Vec<Duration>,
}

impl<'s> WaitForTtl<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: WaitForTtlParams) -> Self {
        Self {
            surface,
            params,
            pulses: Vec::new(),
        }
    }
}

impl Stimulus for WaitForTtl<'_> {
    fn kind(&self) -> &str {
        "wait_for_ttl"
    }

    fn show(&mut self) -> Result<Outcome> {
        if let Some(text) = &self.params.text {
            self.surface.clear();
            self.surface.draw_text(&TextBlock::new(text.clone()));
            self.surface.flip()?;
        }
        let quit = self.surface.quit_key().cloned();
        let wanted = self.params.count.max(1) as usize;
        self.surface.clear_events();
        loop {
            if self.surface.close_requested() {
                return Ok(Outcome::Quit);
            }
            for press in self.surface.poll_keys() {
                if quit.as_ref() == Some(&press.key) {
                    return Ok(Outcome::Quit);
                }
                if press.key == self.params.trigger && self.pulses.len() < wanted {
                    self.pulses.push(press.at);
                }
            }
            if self.pulses.len() >= wanted {
                return Ok(Outcome::Finished);
            }
            self.surface.idle(POLL_INTERVAL)?;
        }
    }

    fn record(&self) -> Option<Row> {
        let first = self.pulses.first()?;
        let mut row = Row::new();
        row.insert("kind".into(), self.kind().into());
        row.insert("trigger".into(), self.params.trigger.as_str().into());
        row.insert("pulses".into(), self.pulses.len().into());
        row.insert("time".into(), first.as_secs_f64().into());
        Some(row)
    }
}
