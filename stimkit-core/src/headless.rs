//! A window-less backend driven by a virtual clock and scripted key presses.
//!
//! Every draw call is appended to a shared [`HeadlessLog`], so callers can
//! inspect what a paradigm would have shown. Flipping advances the clock by
//! one frame interval, the way a vsync-locked window would.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use stimkit_timing::{ManualTimer, Timer};

use crate::error::{Error, Result};
use crate::key::{Key, KeyPress};
use crate::media::{Frame, MediaLoader, NoMedia, SoundClip};
use crate::rating::RatingScale;
use crate::surface::{Area, Backend, ImageBlock, Surface, TextBlock, WindowConfig, WindowSize};

const FULL_SCREEN: (u32, u32) = (1920, 1080);

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Clear,
    Text(String),
    Image(PathBuf),
    Frame { width: u32, height: u32 },
    RatingScale { marker: i32 },
    Flip,
    SoundStarted(Duration),
    SoundStopped,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessLog(Arc<Mutex<Vec<DrawCall>>>);

impl HeadlessLog {
    fn lock(&self) -> MutexGuard<'_, Vec<DrawCall>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, call: DrawCall) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<DrawCall> {
        self.lock().clone()
    }

    pub fn flips(&self) -> usize {
        self.lock().iter().filter(|c| **c == DrawCall::Flip).count()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                DrawCall::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }
}

pub struct HeadlessBackend {
    clock: ManualTimer,
    script: Vec<KeyPress>,
    log: HeadlessLog,
    media: Arc<dyn MediaLoader>,
    frame_interval: Duration,
    limit: Duration,
    opened: Arc<AtomicUsize>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            clock: ManualTimer::new(),
            script: Vec::new(),
            log: HeadlessLog::default(),
            media: Arc::new(NoMedia),
            frame_interval: Duration::from_nanos(16_666_667),
            limit: Duration::from_secs(600),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Schedule a key press `at_secs` after the surface opens.
    pub fn press(mut self, key: impl Into<Key>, at_secs: f64) -> Self {
        let at = Duration::from_nanos((at_secs.max(0.0) * 1e9).round() as u64);
        self.script.push(KeyPress::new(key, at));
        self.script.sort_by_key(|p| p.at);
        self
    }

    pub fn with_media(mut self, loader: impl MediaLoader + 'static) -> Self {
        self.media = Arc::new(loader);
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Virtual time after which idling fails instead of waiting forever for
    /// input that was never scripted.
    pub fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }

    pub fn log(&self) -> HeadlessLog {
        self.log.clone()
    }

    pub fn clock(&self) -> ManualTimer {
        self.clock.clone()
    }

    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HeadlessBackend {
    type Surface = HeadlessSurface;

    fn open(&mut self, config: &WindowConfig, quit_key: Option<Key>) -> Result<HeadlessSurface> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let size = match config.size {
            WindowSize::Windowed { width, height } => (width, height),
            WindowSize::FullScreen => FULL_SCREEN,
        };
        Ok(HeadlessSurface {
            size,
            clock: self.clock.clone(),
            pending: self.script.clone().into(),
            log: self.log.clone(),
            media: Arc::clone(&self.media),
            quit_key,
            frame_interval: self.frame_interval,
            limit: self.limit,
            closed: false,
        })
    }
}

pub struct HeadlessSurface {
    size: (u32, u32),
    clock: ManualTimer,
    pending: std::collections::VecDeque<KeyPress>,
    log: HeadlessLog,
    media: Arc<dyn MediaLoader>,
    quit_key: Option<Key>,
    frame_interval: Duration,
    limit: Duration,
    closed: bool,
}

impl HeadlessSurface {
    fn advance(&mut self, d: Duration) -> Result<()> {
        if self.closed {
            return Err(Error::SurfaceClosed);
        }
        self.clock.sleep(d);
        if self.clock.since_start() > self.limit {
            return Err(Error::Backend(anyhow::anyhow!(
                "headless clock passed {:?} with {} scripted key presses left",
                self.limit,
                self.pending.len()
            )));
        }
        Ok(())
    }
}

impl Surface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self) {
        self.log.push(DrawCall::Clear);
    }

    fn draw_text(&mut self, text: &TextBlock) {
        self.log.push(DrawCall::Text(text.text.clone()));
    }

    fn draw_image(&mut self, image: &ImageBlock) -> Result<()> {
        self.log.push(DrawCall::Image(image.path.clone()));
        Ok(())
    }

    fn draw_frame(&mut self, frame: &Frame, _area: &Area) {
        self.log.push(DrawCall::Frame {
            width: frame.width,
            height: frame.height,
        });
    }

    fn draw_rating_scale(&mut self, scale: &RatingScale) {
        self.log.push(DrawCall::RatingScale {
            marker: scale.marker(),
        });
    }

    fn flip(&mut self) -> Result<()> {
        self.log.push(DrawCall::Flip);
        self.clock.record_frame(self.frame_interval);
        self.advance(self.frame_interval)
    }

    fn poll_keys(&mut self) -> Vec<KeyPress> {
        let now = self.now();
        let mut due = Vec::new();
        while self.pending.front().is_some_and(|p| p.at <= now) {
            due.extend(self.pending.pop_front());
        }
        due
    }

    fn clear_events(&mut self) {
        self.poll_keys();
    }

    fn close_requested(&self) -> bool {
        false
    }

    fn quit_key(&self) -> Option<&Key> {
        self.quit_key.as_ref()
    }

    fn now(&self) -> Duration {
        self.clock.since_start()
    }

    fn idle(&mut self, d: Duration) -> Result<()> {
        self.advance(d)
    }

    fn media(&self) -> &dyn MediaLoader {
        &*self.media
    }

    fn play_sound(&mut self, clip: &SoundClip) -> Result<()> {
        self.log.push(DrawCall::SoundStarted(clip.duration()));
        Ok(())
    }

    fn stop_sound(&mut self) {
        self.log.push(DrawCall::SoundStopped);
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.push(DrawCall::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presses_become_visible_once_due() {
        let mut backend = HeadlessBackend::new().press("b", 0.2).press("a", 0.1);
        let mut s = backend.open(&WindowConfig::default(), None).unwrap();
        assert!(s.poll_keys().is_empty());
        s.idle(Duration::from_millis(150)).unwrap();
        let keys: Vec<_> = s.poll_keys().into_iter().map(|p| p.key).collect();
        assert_eq!(keys, vec![Key::new("a")]);
        s.idle(Duration::from_millis(100)).unwrap();
        assert_eq!(s.poll_keys().len(), 1);
    }

    #[test]
    fn flipping_advances_one_frame() {
        let mut backend =
            HeadlessBackend::new().with_frame_interval(Duration::from_millis(10));
        let log = backend.log();
        let mut s = backend.open(&WindowConfig::default(), None).unwrap();
        s.clear();
        s.flip().unwrap();
        assert_eq!(s.now(), Duration::from_millis(10));
        assert_eq!(log.calls(), vec![DrawCall::Clear, DrawCall::Flip]);
    }

    #[test]
    fn idling_past_the_limit_fails() {
        let mut backend = HeadlessBackend::new().with_limit(Duration::from_secs(1));
        let mut s = backend.open(&WindowConfig::default(), None).unwrap();
        assert!(s.idle(Duration::from_secs(2)).is_err());
    }

    #[test]
    fn full_screen_uses_a_fixed_size() {
        let mut backend = HeadlessBackend::new();
        let cfg = WindowConfig {
            size: WindowSize::FullScreen,
            ..WindowConfig::default()
        };
        let s = backend.open(&cfg, None).unwrap();
        assert_eq!(s.size(), FULL_SCREEN);
        assert_eq!(backend.times_opened(), 1);
    }
}
