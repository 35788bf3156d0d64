use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::FontVec;
use anyhow::{Context, Result, anyhow};
use bytemuck::{cast_slice, cast_slice_mut, try_cast_slice};
use stimkit_core::{Area, Frame, ImageBlock, RatingScale, Rgba, TextBlock};
use tiny_skia::{
    Color, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};
use tracing::warn;

use crate::layout::NormSpace;
use crate::text::TextCache;

const SCALE_COLOR: [u8; 4] = [255, 255, 255, 255];
const MARKER_COLOR: [u8; 4] = [230, 60, 60, 255];

/// Build a premultiplied pixmap from straight RGBA bytes.
pub fn pixmap_from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Pixmap> {
    let mut pm = Pixmap::new(width, height)?;
    let src: &[[u8; 4]] = try_cast_slice(rgba).ok()?;
    let dst: &mut [[u8; 4]] = cast_slice_mut(pm.data_mut());
    if src.len() != dst.len() {
        return None;
    }
    for (d, &[r, g, b, a]) in dst.iter_mut().zip(src) {
        let mul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        *d = [mul(r), mul(g), mul(b), a];
    }
    Some(pm)
}

fn color(c: Rgba) -> Color {
    let [r, g, b, a] = c.0;
    Color::from_rgba8(r, g, b, a)
}

fn paint(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint
}

/// Off-screen drawing target for one window. Everything is drawn into a
/// premultiplied pixmap that the window copies into its frame buffer on flip.
pub struct SkiaCanvas {
    canvas: Pixmap,
    space: NormSpace,
    background: Rgba,
    text: Option<TextCache>,
    images: HashMap<PathBuf, Arc<Pixmap>>,
    warned_no_font: bool,
}

impl SkiaCanvas {
    pub fn new(width: u32, height: u32, background: Rgba, font: Option<FontVec>) -> Result<Self> {
        let canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        let mut canvas = Self {
            space: NormSpace::new(canvas.width(), canvas.height()),
            canvas,
            background,
            text: font.map(TextCache::new),
            images: HashMap::new(),
            warned_no_font: false,
        };
        canvas.clear();
        Ok(canvas)
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn data(&self) -> &[u8] {
        self.canvas.data()
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        self.space = NormSpace::new(self.canvas.width(), self.canvas.height());
        self.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.canvas.fill(color(self.background));
    }

    /// Copy the canvas into an RGBA frame buffer of the same size.
    pub fn copy_to(&self, frame: &mut [u8]) {
        let data = self.canvas.data();
        if frame.len() == data.len() {
            frame.copy_from_slice(data);
        }
    }

    pub fn draw_text(&mut self, block: &TextBlock) {
        let size_px = self.space.height_px(block.height).max(1.0);
        let wrap_px = block.wrap_width.map(|w| self.space.width_px(w));
        let center = self.space.to_px(block.pos);
        self.draw_text_px(&block.text, size_px, block.color.0, wrap_px, center);
    }

    fn draw_text_px(
        &mut self,
        text: &str,
        size_px: f32,
        rgba: [u8; 4],
        wrap_px: Option<f32>,
        center: (f32, f32),
    ) {
        let Some(cache) = self.text.as_mut() else {
            if !self.warned_no_font {
                warn!("no font loaded, text will not be drawn");
                self.warned_no_font = true;
            }
            return;
        };
        if let Some(pm) = cache.get_or_render(text, size_px, rgba, wrap_px) {
            self.blit(&pm, center);
        }
    }

    pub fn draw_image(&mut self, block: &ImageBlock) -> Result<()> {
        let pm = match self.images.get(&block.path) {
            Some(pm) => Arc::clone(pm),
            None => {
                let pm = Arc::new(load_pixmap(&block.path)?);
                self.images.insert(block.path.clone(), Arc::clone(&pm));
                pm
            }
        };
        self.draw_pixmap(&pm, &block.area);
        Ok(())
    }

    pub fn draw_frame(&mut self, frame: &Frame, area: &Area) {
        match pixmap_from_rgba(frame.width, frame.height, &frame.rgba) {
            Some(pm) => self.draw_pixmap(&pm, area),
            None => warn!(width = frame.width, height = frame.height, "skipping malformed frame"),
        }
    }

    /// Draw `pm` scaled into `area`, or at its own size when the area has none.
    fn draw_pixmap(&mut self, pm: &Pixmap, area: &Area) {
        let (w, h) = match area.size {
            Some(size) => self.space.size_px(size),
            None => (pm.width() as f32, pm.height() as f32),
        };
        let (cx, cy) = self.space.to_px(area.center);
        let transform = Transform::from_row(
            w / pm.width() as f32,
            0.0,
            0.0,
            h / pm.height() as f32,
            cx - w * 0.5,
            cy - h * 0.5,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.canvas
            .draw_pixmap(0, 0, pm.as_ref(), &paint, transform, None);
    }

    pub fn draw_rating_scale(&mut self, scale: &RatingScale) {
        let (cx, cy) = self.space.to_px(scale.pos);
        let half = self.space.width_px(scale.stretch) * 0.5;
        let (x0, x1) = (cx - half, cx + half);
        let tick = self.space.height_px(0.03);
        let x_of = |value: i32| x0 + scale.fraction(value) * (x1 - x0);

        let mut pb = PathBuilder::new();
        pb.move_to(x0, cy);
        pb.line_to(x1, cy);
        for &value in &scale.tick_marks {
            let x = x_of(value);
            pb.move_to(x, cy - tick);
            pb.line_to(x, cy + tick);
        }
        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: 2.0,
                ..Stroke::default()
            };
            self.canvas.stroke_path(
                &path,
                &paint(SCALE_COLOR),
                &stroke,
                Transform::identity(),
                None,
            );
        }

        let label_px = self.space.height_px(0.06);
        for &value in &scale.tick_marks {
            let label = value.to_string();
            let at = (x_of(value), cy - tick - label_px);
            self.draw_text_px(&label, label_px, SCALE_COLOR, None, at);
        }
        if !scale.description.is_empty() {
            self.draw_text_px(
                &scale.description,
                label_px,
                SCALE_COLOR,
                None,
                (cx, cy + tick + label_px),
            );
        }

        if let Some(marker) = PathBuilder::from_circle(x_of(scale.marker()), cy, tick * 1.2) {
            self.canvas.fill_path(
                &marker,
                &paint(MARKER_COLOR),
                tiny_skia::FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    /// Alpha-blend a premultiplied pixmap centred on `center`, clipped to
    /// the canvas.
    pub fn blit(&mut self, pm: &Pixmap, center: (f32, f32)) {
        let (w, h) = (pm.width() as i64, pm.height() as i64);
        let (cw, ch) = (self.canvas.width() as i64, self.canvas.height() as i64);
        let x0 = (center.0 - w as f32 * 0.5).floor() as i64;
        let y0 = (center.1 - h as f32 * 0.5).floor() as i64;

        let dst_x = x0.max(0);
        let dst_y = y0.max(0);
        let dst_x_end = (x0 + w).min(cw);
        let dst_y_end = (y0 + h).min(ch);
        if dst_x_end <= dst_x || dst_y_end <= dst_y {
            return;
        }
        let copy_w = (dst_x_end - dst_x) as usize;
        let copy_h = (dst_y_end - dst_y) as usize;
        let src_x = (dst_x - x0) as usize;
        let src_y = (dst_y - y0) as usize;
        let (dst_x, dst_y, w, cw) = (dst_x as usize, dst_y as usize, w as usize, cw as usize);

        let src: &[[u8; 4]] = cast_slice(pm.data());
        let dst: &mut [[u8; 4]] = cast_slice_mut(self.canvas.data_mut());

        let fully_opaque = (0..copy_h).all(|row| {
            let start = (src_y + row) * w + src_x;
            src[start..start + copy_w].iter().all(|px| px[3] == 255)
        });

        for row in 0..copy_h {
            let s = (src_y + row) * w + src_x;
            let d = (dst_y + row) * cw + dst_x;
            let (src_row, dst_row) = (&src[s..s + copy_w], &mut dst[d..d + copy_w]);
            if fully_opaque {
                dst_row.copy_from_slice(src_row);
                continue;
            }
            for (dp, sp) in dst_row.iter_mut().zip(src_row) {
                let inv = 255 - sp[3] as u32;
                for c in 0..4 {
                    dp[c] = (sp[c] as u32 + (dp[c] as u32 * inv + 127) / 255).min(255) as u8;
                }
            }
        }
    }

    /// Read one pixel back as premultiplied RGBA.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let px = self.canvas.pixel(x, y)?;
        Some([px.red(), px.green(), px.blue(), px.alpha()])
    }
}

fn load_pixmap(path: &Path) -> Result<Pixmap> {
    let img = image::open(path)
        .with_context(|| format!("opening image {}", path.display()))?
        .to_rgba8();
    pixmap_from_rgba(img.width(), img.height(), img.as_raw())
        .ok_or_else(|| anyhow!("image {} is empty", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> SkiaCanvas {
        SkiaCanvas::new(100, 80, Rgba([0, 0, 0, 255]), None).unwrap()
    }

    #[test]
    fn clear_fills_the_background() {
        let mut c = SkiaCanvas::new(4, 4, Rgba([10, 20, 30, 255]), None).unwrap();
        c.canvas.fill(Color::from_rgba8(255, 0, 0, 255));
        c.clear();
        assert_eq!(c.pixel(0, 0), Some([10, 20, 30, 255]));
        let mut frame = vec![0u8; 4 * 4 * 4];
        c.copy_to(&mut frame);
        assert_eq!(&frame[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn frames_are_scaled_into_their_area() {
        let mut c = canvas();
        let frame = Frame::new(2, 2, vec![255; 16]).unwrap();
        c.draw_frame(&frame, &Area::centered(Some((0.5, 0.5))));
        // The area covers x 37.5..62.5 and y 30..50
        assert_eq!(c.pixel(50, 40), Some([255, 255, 255, 255]));
        assert_eq!(c.pixel(5, 5), Some([0, 0, 0, 255]));
        assert_eq!(c.pixel(20, 40), Some([0, 0, 0, 255]));
    }

    #[test]
    fn blits_clip_at_the_edges() {
        let mut c = canvas();
        let src = pixmap_from_rgba(10, 10, &[200; 400]).unwrap();
        c.blit(&src, (0.0, 0.0));
        c.blit(&src, (100.0, 80.0));
        c.blit(&src, (-50.0, -50.0));
        assert_eq!(c.pixel(0, 0).unwrap()[3], 255);
        assert_ne!(c.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_ne!(c.pixel(99, 79), Some([0, 0, 0, 255]));
        assert_eq!(c.pixel(50, 40), Some([0, 0, 0, 255]));
    }

    #[test]
    fn premultiplies_straight_alpha() {
        let pm = pixmap_from_rgba(1, 1, &[255, 255, 255, 0]).unwrap();
        assert_eq!(pm.data(), &[0, 0, 0, 0]);
        assert!(pixmap_from_rgba(2, 2, &[0; 4]).is_none());
    }

    #[test]
    fn rating_marker_moves_with_the_value() {
        let mut scale = RatingScale::new(1, 9);
        let mut a = canvas();
        a.draw_rating_scale(&scale);
        scale.press(&stimkit_core::Key::new("9"), 0.0);
        let mut b = canvas();
        b.draw_rating_scale(&scale);
        assert_ne!(a.data(), b.data());
        // The marker at 9 sits at the right end of the line
        let (x, y) = NormSpace::new(100, 80).to_px((0.75, -0.75));
        assert_eq!(b.pixel(x as u32, y as u32).map(|p| p[0]), Some(MARKER_COLOR[0]));
    }
}
