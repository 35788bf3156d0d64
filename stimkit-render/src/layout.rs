/// Maps norm units onto a pixel grid.
///
/// Norm units run from -1 to 1 on both axes with the origin at the centre
/// of the window and y pointing up; pixels start top-left with y pointing
/// down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormSpace {
    pub width: f32,
    pub height: f32,
}

impl NormSpace {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn to_px(&self, (x, y): (f32, f32)) -> (f32, f32) {
        ((x + 1.0) * 0.5 * self.width, (1.0 - y) * 0.5 * self.height)
    }

    pub fn width_px(&self, w: f32) -> f32 {
        w * 0.5 * self.width
    }

    pub fn height_px(&self, h: f32) -> f32 {
        h * 0.5 * self.height
    }

    pub fn size_px(&self, (w, h): (f32, f32)) -> (f32, f32) {
        (self.width_px(w), self.height_px(h))
    }
}
