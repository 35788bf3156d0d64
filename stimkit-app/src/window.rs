use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use pixels::{Pixels, SurfaceTexture};
use stimkit_core::rating::RatingScale;
use stimkit_core::{
    Area, Backend, Error, Frame, ImageBlock, Key, KeyPress, MediaLoader, Result, SoundClip,
    Surface, TextBlock, WindowConfig, WindowSize,
};
use stimkit_render::{SkiaCanvas, load_font};
use stimkit_timing::{HighPrecisionTimer, Timer};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key as WinitKey, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use crate::audio::AudioOut;

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// winit only allows one event loop per process. The backend keeps it
/// here between surfaces.
type LoopSlot = Rc<RefCell<Option<EventLoop<()>>>>;

/// Opens real windows rendered through pixels.
pub struct WindowBackend {
    event_loop: LoopSlot,
    media: Arc<dyn MediaLoader>,
}

impl WindowBackend {
    pub fn new(media: impl MediaLoader + 'static) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new()?;
        Ok(Self {
            event_loop: Rc::new(RefCell::new(Some(event_loop))),
            media: Arc::new(media),
        })
    }
}

impl Backend for WindowBackend {
    type Surface = WindowSurface;

    fn open(&mut self, config: &WindowConfig, quit_key: Option<Key>) -> Result<WindowSurface> {
        let mut event_loop = self
            .event_loop
            .borrow_mut()
            .take()
            .ok_or_else(|| Error::Backend(anyhow!("a window is already open")))?;
        let mut shell = Shell::new(attributes(config));

        match create_window(&mut event_loop, &mut shell, config) {
            Ok(gfx) => Ok(WindowSurface {
                event_loop: Some(event_loop),
                slot: Rc::clone(&self.event_loop),
                shell,
                gfx: Some(gfx),
                audio: None,
                media: Arc::clone(&self.media),
                quit_key,
                last_flip: None,
            }),
            Err(e) => {
                *self.event_loop.borrow_mut() = Some(event_loop);
                Err(Error::Backend(e))
            }
        }
    }
}

fn attributes(config: &WindowConfig) -> WindowAttributes {
    let attrs = Window::default_attributes()
        .with_title(config.title.clone())
        .with_resizable(false);
    match config.size {
        WindowSize::Windowed { width, height } => {
            attrs.with_inner_size(PhysicalSize::new(width, height))
        }
        WindowSize::FullScreen => attrs.with_fullscreen(Some(Fullscreen::Borderless(None))),
    }
}

/// Pump the loop until `resumed` has created the window, then attach the
/// pixel buffer and canvas to it.
fn create_window(
    event_loop: &mut EventLoop<()>,
    shell: &mut Shell,
    config: &WindowConfig,
) -> anyhow::Result<Graphics> {
    let deadline = Instant::now() + OPEN_TIMEOUT;
    let window = loop {
        if let PumpStatus::Exit(code) =
            event_loop.pump_app_events(Some(Duration::from_millis(10)), shell)
        {
            return Err(anyhow!("event loop exited with code {code} while opening"));
        }
        if let Some(err) = shell.create_error.take() {
            return Err(err).context("creating window");
        }
        if let Some(window) = &shell.window {
            break Arc::clone(window);
        }
        if Instant::now() > deadline {
            return Err(anyhow!("window was not created within {OPEN_TIMEOUT:?}"));
        }
    };

    let size = window.inner_size();
    let texture = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
    let pixels = Pixels::new(size.width, size.height, texture)?;

    let font = match load_font(config.font.as_deref()) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "text will not be drawn");
            None
        }
    };
    let canvas = SkiaCanvas::new(size.width, size.height, config.color, font)?;

    if config.size == WindowSize::FullScreen {
        window.set_cursor_visible(false);
    }
    info!(
        width = size.width,
        height = size.height,
        scale = window.scale_factor(),
        refresh_hz = window
            .current_monitor()
            .and_then(|m| m.refresh_rate_millihertz())
            .map(|mhz| mhz as f64 / 1000.0),
        "window opened"
    );
    Ok(Graphics {
        window,
        pixels,
        canvas,
    })
}

/// Receives winit callbacks between pumps.
struct Shell {
    attributes: WindowAttributes,
    window: Option<Arc<Window>>,
    create_error: Option<winit::error::OsError>,
    timer: HighPrecisionTimer,
    keys: Vec<KeyPress>,
    resized: Option<PhysicalSize<u32>>,
    close_requested: bool,
}

impl Shell {
    fn new(attributes: WindowAttributes) -> Self {
        Self {
            attributes,
            window: None,
            create_error: None,
            timer: HighPrecisionTimer::new(),
            keys: Vec::new(),
            resized: None,
            close_requested: false,
        }
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            match event_loop.create_window(self.attributes.clone()) {
                Ok(window) => self.window = Some(Arc::new(window)),
                Err(e) => self.create_error = Some(e),
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                if let Some(key) = key_from_winit(&event.logical_key) {
                    let at = self.timer.since_start();
                    debug!(key = %key, secs = at.as_secs_f64(), "key pressed");
                    self.keys.push(KeyPress { key, at });
                }
            }
            WindowEvent::Resized(size) => self.resized = Some(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.resized = Some(window.inner_size());
                }
            }
            _ => {}
        }
    }
}

/// Map a winit logical key to the lower-case names scripts use.
pub fn key_from_winit(key: &WinitKey) -> Option<Key> {
    let name = match key {
        WinitKey::Character(s) => return Some(Key::new(s.as_str())),
        WinitKey::Named(named) => match named {
            NamedKey::Escape => "escape",
            NamedKey::Enter => "return",
            NamedKey::Space => "space",
            NamedKey::Tab => "tab",
            NamedKey::Backspace => "backspace",
            NamedKey::Delete => "delete",
            NamedKey::ArrowLeft => "left",
            NamedKey::ArrowRight => "right",
            NamedKey::ArrowUp => "up",
            NamedKey::ArrowDown => "down",
            NamedKey::Shift => "shift",
            NamedKey::Control => "ctrl",
            NamedKey::Alt => "alt",
            other => return Some(Key::new(format!("{other:?}"))),
        },
        _ => return None,
    };
    Some(Key::new(name))
}

struct Graphics {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    canvas: SkiaCanvas,
}

/// A live window. Dropping it without [`Surface::close`] also releases the
/// window.
pub struct WindowSurface {
    event_loop: Option<EventLoop<()>>,
    slot: LoopSlot,
    shell: Shell,
    gfx: Option<Graphics>,
    audio: Option<AudioOut>,
    media: Arc<dyn MediaLoader>,
    quit_key: Option<Key>,
    last_flip: Option<u64>,
}

impl WindowSurface {
    /// Deliver pending window events without blocking.
    fn pump(&mut self) -> Result<()> {
        let Some(event_loop) = self.event_loop.as_mut() else {
            return Err(Error::SurfaceClosed);
        };
        if let PumpStatus::Exit(_) = event_loop.pump_app_events(Some(Duration::ZERO), &mut self.shell)
        {
            self.shell.close_requested = true;
        }
        if let Some(size) = self.shell.resized.take() {
            self.resize(size);
        }
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some(gfx) = self.gfx.as_mut() else {
            return;
        };
        if size.width == 0 || size.height == 0 {
            return;
        }
        let result = gfx
            .pixels
            .resize_surface(size.width, size.height)
            .and_then(|_| gfx.pixels.resize_buffer(size.width, size.height))
            .map_err(anyhow::Error::from)
            .and_then(|_| gfx.canvas.resize(size.width, size.height));
        match result {
            Ok(()) => info!(width = size.width, height = size.height, "window resized"),
            Err(e) => warn!(error = %format!("{e:#}"), "resize failed"),
        }
    }

    fn gfx(&mut self) -> Result<&mut Graphics> {
        self.gfx.as_mut().ok_or(Error::SurfaceClosed)
    }
}

impl Surface for WindowSurface {
    fn size(&self) -> (u32, u32) {
        self.gfx
            .as_ref()
            .map_or((0, 0), |g| (g.canvas.width(), g.canvas.height()))
    }

    fn clear(&mut self) {
        if let Some(gfx) = self.gfx.as_mut() {
            gfx.canvas.clear();
        }
    }

    fn draw_text(&mut self, text: &TextBlock) {
        if let Some(gfx) = self.gfx.as_mut() {
            gfx.canvas.draw_text(text);
        }
    }

    fn draw_image(&mut self, image: &ImageBlock) -> Result<()> {
        self.gfx()?
            .canvas
            .draw_image(image)
            .map_err(|e| Error::media(&image.path, format!("{e:#}")))
    }

    fn draw_frame(&mut self, frame: &Frame, area: &Area) {
        if let Some(gfx) = self.gfx.as_mut() {
            gfx.canvas.draw_frame(frame, area);
        }
    }

    fn draw_rating_scale(&mut self, scale: &RatingScale) {
        if let Some(gfx) = self.gfx.as_mut() {
            gfx.canvas.draw_rating_scale(scale);
        }
    }

    fn flip(&mut self) -> Result<()> {
        let gfx = self.gfx()?;
        gfx.canvas.copy_to(gfx.pixels.frame_mut());
        gfx.pixels.render().map_err(|e| Error::Backend(e.into()))?;

        let now = self.shell.timer.now();
        if let Some(prev) = self.last_flip.replace(now) {
            let interval = Duration::from_nanos(now.saturating_sub(prev));
            self.shell.timer.record_frame(interval);
        }
        self.pump()
    }

    fn poll_keys(&mut self) -> Vec<KeyPress> {
        if let Err(e) = self.pump() {
            debug!(error = %e, "polling a closed window");
        }
        std::mem::take(&mut self.shell.keys)
    }

    fn clear_events(&mut self) {
        self.poll_keys();
    }

    fn close_requested(&self) -> bool {
        self.shell.close_requested
    }

    fn quit_key(&self) -> Option<&Key> {
        self.quit_key.as_ref()
    }

    fn now(&self) -> Duration {
        self.shell.timer.since_start()
    }

    fn idle(&mut self, d: Duration) -> Result<()> {
        self.pump()?;
        self.shell.timer.sleep(d);
        Ok(())
    }

    fn media(&self) -> &dyn MediaLoader {
        &*self.media
    }

    fn play_sound(&mut self, clip: &SoundClip) -> Result<()> {
        if self.audio.is_none() {
            self.audio = Some(AudioOut::open().map_err(Error::Backend)?);
        }
        if let Some(audio) = &self.audio {
            audio.play(clip);
        }
        Ok(())
    }

    fn stop_sound(&mut self) {
        if let Some(audio) = &self.audio {
            audio.stop();
        }
    }

    fn close(&mut self) {
        self.stop_sound();
        self.audio = None;
        let Some(gfx) = self.gfx.take() else {
            return;
        };
        gfx.window.set_cursor_visible(true);

        let stats = self.shell.timer.calibration_stats();
        info!(
            frames = stats.frames,
            avg_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            min_ms = stats.min_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            fps = stats.effective_fps,
            "window closed"
        );

        // Drop the pixel buffer before the window it renders into
        drop(gfx.pixels);
        drop(gfx.window);
        self.shell.window = None;
        if let Some(mut event_loop) = self.event_loop.take() {
            // Let the platform process the destroyed window
            let _ = event_loop.pump_app_events(Some(Duration::ZERO), &mut self.shell);
            *self.slot.borrow_mut() = Some(event_loop);
        }
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        self.close();
    }
}
