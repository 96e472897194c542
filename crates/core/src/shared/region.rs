use super::geometry::NormalizedRect;

/// Default symmetric expansion applied around a face before pixelation.
pub const DEFAULT_EXPANSION: f64 = 0.35;

/// A pixel-space rectangle, clamped to the frame it was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    /// Converts a normalized rectangle to pixels, grows it symmetrically
    /// around its center by `expansion` (0.35 = 35% larger on each axis),
    /// and clamps it to the frame.
    ///
    /// Returns `None` when nothing of the expanded rectangle lies inside
    /// the frame.
    pub fn from_normalized(
        rect: &NormalizedRect,
        frame_w: u32,
        frame_h: u32,
        expansion: f64,
    ) -> Option<PixelRegion> {
        if ![rect.x, rect.y, rect.width, rect.height, expansion]
            .iter()
            .all(|v| v.is_finite())
        {
            return None;
        }
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        let (cx, cy) = rect.center();
        let half_w = rect.width * fw * (1.0 + expansion) / 2.0;
        let half_h = rect.height * fh * (1.0 + expansion) / 2.0;

        let x1 = (cx * fw - half_w).floor().max(0.0);
        let y1 = (cy * fh - half_h).floor().max(0.0);
        let x2 = (cx * fw + half_w).ceil().min(fw);
        let y2 = (cy * fh + half_h).ceil().min(fh);

        if !(x2 > x1 && y2 > y1) {
            return None;
        }

        Some(PixelRegion {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }
}
