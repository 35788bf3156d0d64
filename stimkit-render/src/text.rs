use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use string_cache::DefaultAtom as Atom;
use tiny_skia::{Pixmap, PremultipliedColorU8};
use tracing::debug;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONTS.iter().map(PathBuf::from).find(|p| p.is_file())
}

/// Load the font at `path`, or the first common system font when `None`.
pub fn load_font(path: Option<&Path>) -> Result<FontVec> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => find_system_font().ok_or_else(|| anyhow!("no system font found"))?,
    };
    let bytes = std::fs::read(&path).with_context(|| format!("reading font {}", path.display()))?;
    let font = FontVec::try_from_vec(bytes)
        .map_err(|e| anyhow!("parsing font {}: {e}", path.display()))?;
    debug!(path = %path.display(), "font loaded");
    Ok(font)
}

/// Greedy word wrap. Explicit newlines always break; words longer than
/// `max_width` get a line of their own.
pub fn wrap_words(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{line} {word}");
            if measure(&candidate) <= max_width {
                line = candidate;
            } else {
                lines.push(std::mem::replace(&mut line, word.to_owned()));
            }
        }
        lines.push(line);
    }
    lines
}

fn line_width<F: Font>(font: &F, scale: PxScale, line: &str) -> f32 {
    let sf = font.as_scaled(scale);
    let mut width = 0.0;
    let mut prev = None;
    for ch in line.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = prev {
            width += sf.kern(prev, id);
        }
        width += sf.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Rasterize `text` into a tight, transparent, premultiplied pixmap. Lines
/// are centred on each other. Returns `None` for text with no visible
/// glyphs.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: [u8; 4],
    wrap_px: Option<f32>,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);
    let lines = match wrap_px {
        Some(max) => wrap_words(text, max, |s| line_width(font, scale, s)),
        None => text.split('\n').map(str::to_owned).collect(),
    };
    let widths: Vec<f32> = lines.iter().map(|l| line_width(font, scale, l)).collect();
    let block_width = widths.iter().copied().fold(0.0, f32::max);
    let line_height = sf.height() + sf.line_gap();

    // Layout with each baseline one line below the previous
    let mut glyphs = Vec::<Glyph>::new();
    for (row, (line, width)) in lines.iter().zip(&widths).enumerate() {
        let mut pen_x = (block_width - width) * 0.5;
        let baseline = sf.ascent() + row as f32 * line_height;
        let mut prev = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = prev {
                pen_x += sf.kern(prev, id);
            }
            glyphs.push(Glyph {
                id,
                scale,
                position: point(pen_x, baseline),
            });
            pen_x += sf.h_advance(id);
            prev = Some(id);
        }
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i64;
            let iy = (y as f32 + b.min.y - min_y).floor() as i64;
            if ix < 0 || iy < 0 || ix >= w as i64 || iy >= h as i64 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Source premultiplied by coverage, then Porter-Duff over
            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let src = [
                (color[0] as f32 * a) as u8,
                (color[1] as f32 * a) as u8,
                (color[2] as f32 * a) as u8,
                (a * 255.0) as u8,
            ];
            let bg = dst[i];
            let inv = 1.0 - a;
            let over = |s: u8, d: u8| s.saturating_add((d as f32 * inv) as u8);
            let r = over(src[0], bg.red());
            let g = over(src[1], bg.green());
            let b = over(src[2], bg.blue());
            let alpha = over(src[3], bg.alpha());
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(alpha), g.min(alpha), b.min(alpha), alpha) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    text: Atom,
    size: u32,
    color: [u8; 4],
    wrap: Option<u32>,
}

/// Rendered text pixmaps, keyed by interned string and style. Paradigms
/// redraw the same few strings every frame, so each is rasterized once.
pub struct TextCache {
    font: FontVec,
    map: HashMap<TextKey, Option<Arc<Pixmap>>>,
}

impl TextCache {
    pub fn new(font: FontVec) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get_or_render(
        &mut self,
        text: &str,
        size_px: f32,
        color: [u8; 4],
        wrap_px: Option<f32>,
    ) -> Option<Arc<Pixmap>> {
        let key = TextKey {
            text: Atom::from(text),
            size: size_px.to_bits(),
            color,
            wrap: wrap_px.map(f32::to_bits),
        };
        if let Some(pm) = self.map.get(&key) {
            return pm.clone();
        }
        let pm = render_text_pixmap(text, size_px, &self.font, color, wrap_px).map(Arc::new);
        self.map.insert(key, pm.clone());
        pm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> f32 {
        s.chars().count() as f32
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_words("the quick brown fox", 10.0, chars);
        assert_eq!(lines, ["the quick", "brown fox"]);
    }

    #[test]
    fn newlines_and_long_words_break() {
        let lines = wrap_words("a\nextraordinarily long", 5.0, chars);
        assert_eq!(lines, ["a", "extraordinarily", "long"]);
    }

    #[test]
    fn cache_renders_each_string_once() {
        let Ok(font) = load_font(None) else {
            return;
        };
        let mut cache = TextCache::new(font);
        let a = cache.get_or_render("Hello", 24.0, [255; 4], None).unwrap();
        let b = cache.get_or_render("Hello", 24.0, [255; 4], None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.get_or_render("   ", 24.0, [255; 4], None).is_none());
        assert_eq!(cache.len(), 2);

        let wide = cache.get_or_render("one two three four", 24.0, [255; 4], None).unwrap();
        let tall = cache
            .get_or_render("one two three four", 24.0, [255; 4], Some(60.0))
            .unwrap();
        assert!(tall.height() > wide.height());
        assert!(tall.width() < wide.width());
    }
}
