use super::frame::Frame;
use super::geometry::NormalizedRect;

/// Clockwise rotation that must be applied to the stored (encoded) frame
/// to display it upright, as recorded in the container's transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    /// Snaps an arbitrary angle in degrees to the nearest quarter turn.
    pub fn from_degrees(angle: i32) -> Self {
        match angle.rem_euclid(360) {
            45..=134 => Orientation::Right,
            135..=224 => Orientation::Down,
            225..=315 => Orientation::Left,
            _ => Orientation::Up,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            Orientation::Up => Orientation::Up,
            Orientation::Right => Orientation::Left,
            Orientation::Down => Orientation::Down,
            Orientation::Left => Orientation::Right,
        }
    }

    pub fn swaps_axes(&self) -> bool {
        matches!(self, Orientation::Right | Orientation::Left)
    }

    /// Maps a rectangle from upright (display) space to stored-frame space.
    pub fn to_stored(&self, r: &NormalizedRect) -> NormalizedRect {
        match self {
            Orientation::Up => *r,
            Orientation::Right => NormalizedRect::new(r.y, 1.0 - r.x - r.width, r.height, r.width),
            Orientation::Down => {
                NormalizedRect::new(1.0 - r.x - r.width, 1.0 - r.y - r.height, r.width, r.height)
            }
            Orientation::Left => NormalizedRect::new(1.0 - r.y - r.height, r.x, r.height, r.width),
        }
    }

    /// Maps a rectangle from stored-frame space to upright space.
    pub fn to_upright(&self, r: &NormalizedRect) -> NormalizedRect {
        self.inverse().to_stored(r)
    }

    /// Returns a copy of the stored frame rotated so that it displays upright.
    pub fn upright_frame(&self, frame: &Frame) -> Frame {
        if *self == Orientation::Up {
            return frame.clone();
        }

        let w = frame.width() as usize;
        let h = frame.height() as usize;
        let c = frame.channels() as usize;
        let (out_w, out_h) = if self.swaps_axes() { (h, w) } else { (w, h) };
        let src = frame.data();
        let mut out = vec![0u8; src.len()];

        for uy in 0..out_h {
            for ux in 0..out_w {
                let (sx, sy) = match self {
                    Orientation::Right => (uy, h - 1 - ux),
                    Orientation::Down => (w - 1 - ux, h - 1 - uy),
                    Orientation::Left => (w - 1 - uy, ux),
                    Orientation::Up => (ux, uy),
                };
                let s = (sy * w + sx) * c;
                let d = (uy * out_w + ux) * c;
                out[d..d + c].copy_from_slice(&src[s..s + c]);
            }
        }

        Frame::new(out, out_w as u32, out_h as u32, frame.channels(), frame.index())
            .with_pts(frame.pts())
    }
}
