use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::input;
use crate::key::{KeyPress, KeySet};
use crate::stimulus::{Outcome, Row, Stimulus};
use crate::surface::Surface;

/// What happens once an allowed key is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEvent {
    #[default]
    Continue,
    Nothing,
    /// End the whole paradigm.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaitForKeyParams {
    #[serde(default)]
    pub keys: KeySet,
    #[serde(default)]
    pub event: KeyEvent,
}

impl WaitForKeyParams {
    pub fn new(keys: impl Into<KeySet>) -> Self {
        Self {
            keys: keys.into(),
            event: KeyEvent::Continue,
        }
    }

    pub fn event(mut self, event: KeyEvent) -> Self {
        self.event = event;
        self
    }
}

/// Block until one of a set of keys is pressed. Draws nothing.
pub struct WaitForKey<'s> {
    surface: &'s mut dyn Surface,
    params: WaitForKeyParams,
    onset: Option<Duration>,
    response: Option<KeyPress>,
}

impl<'s> WaitForKey<'s> {
    pub fn new(surface: &'s mut dyn Surface, params: WaitForKeyParams) -> Self {
        Self {
            surface,
            params,
            onset: None,
            response: None,
        }
    }
}

impl Stimulus for WaitForKey<'_> {
    fn kind(&self) -> &str {
        "wait_for_key"
    }

    fn show(&mut self) -> Result<Outcome> {
        self.onset = Some(self.surface.now());
        let outcome = input::wait_for_keys(&mut *self.surface, &self.params.keys)?;
        let Outcome::Responded(press) = outcome else {
            return Ok(outcome);
        };
        self.response = Some(press.clone());
        if self.params.event == KeyEvent::Exit {
            info!(key = %press.key, "exit requested");
            return Ok(Outcome::Quit);
        }
        Ok(Outcome::Responded(press))
    }

    fn record(&self) -> Option<Row> {
        self.response
            .as_ref()
            .map(|press| super::response_row(self.kind(), self.onset, press))
    }
}
