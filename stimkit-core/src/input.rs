//! Keyboard polling shared by the stimulus variants.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::key::{KeyPress, KeySet};
use crate::stimulus::Outcome;
use crate::surface::Surface;

pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub enum Scan {
    Matched(KeyPress),
    Quit,
    Nothing,
}

/// Drain pending presses. The quit key (or a window close) anywhere in the
/// batch wins over an allowed key; otherwise the earliest allowed press is
/// returned.
pub fn scan(surface: &mut dyn Surface, allowed: Option<&KeySet>) -> Scan {
    if surface.close_requested() {
        return Scan::Quit;
    }
    let quit = surface.quit_key().cloned();
    let presses = surface.poll_keys();
    if quit.is_some_and(|q| presses.iter().any(|p| p.key == q)) {
        return Scan::Quit;
    }
    match allowed {
        Some(keys) => presses
            .into_iter()
            .find(|p| keys.contains(&p.key))
            .map_or(Scan::Nothing, Scan::Matched),
        None => Scan::Nothing,
    }
}

/// Keep the current display up for `d`, ending early on quit.
pub fn hold(surface: &mut dyn Surface, d: Duration) -> Result<Outcome> {
    let deadline = surface
        .now()
        .checked_add(d)
        .ok_or_else(|| Error::invalid(format!("hold of {d:?} overflows the surface clock")))?;
    loop {
        if scan(surface, None) == Scan::Quit {
            return Ok(Outcome::Quit);
        }
        let now = surface.now();
        if now >= deadline {
            return Ok(Outcome::Finished);
        }
        surface.idle((deadline - now).min(POLL_INTERVAL))?;
    }
}

/// Flip, then yield one poll interval when the flip did not block on the
/// display. Frame loops use this so they never spin.
pub fn flip_paced(surface: &mut dyn Surface) -> Result<()> {
    let before = surface.now();
    surface.flip()?;
    if surface.now().saturating_sub(before) < POLL_INTERVAL {
        surface.idle(POLL_INTERVAL)?;
    }
    Ok(())
}

/// Discard earlier input, then block until one of `keys` is pressed.
pub fn wait_for_keys(surface: &mut dyn Surface, keys: &KeySet) -> Result<Outcome> {
    surface.clear_events();
    loop {
        match scan(surface, Some(keys)) {
            Scan::Matched(press) => return Ok(Outcome::Responded(press)),
            Scan::Quit => return Ok(Outcome::Quit),
            Scan::Nothing => surface.idle(POLL_INTERVAL)?,
        }
    }
}
