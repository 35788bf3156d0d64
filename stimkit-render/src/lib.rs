//! Software rendering and media decoding for windowed surfaces.

pub mod canvas;
pub mod layout;
pub mod media;
pub mod text;

pub use canvas::{SkiaCanvas, pixmap_from_rgba};
pub use layout::NormSpace;
pub use media::FileMediaLoader;
pub use text::{TextCache, find_system_font, load_font, render_text_pixmap};
