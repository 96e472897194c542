use serde::{Deserialize, Serialize};

/// A rectangle expressed as fractions (0..1) of the frame's width and
/// height, independent of pixel resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Euclidean distance between the two rectangle centers.
    pub fn center_distance(&self, other: &NormalizedRect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).hypot(ay - by)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> NormalizedRect {
        NormalizedRect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Finite, positive-sized, and overlapping the unit square.
    pub fn is_well_formed(&self) -> bool {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.width > 0.0
            && self.height > 0.0
            && self.x < 1.0
            && self.y < 1.0
            && self.x + self.width > 0.0
            && self.y + self.height > 0.0
    }
}
