use crate::shared::geometry::NormalizedRect;

/// One detector result for one frame, in upright normalized coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceObservation {
    pub bbox: NormalizedRect,
    pub confidence: f64,
}

impl FaceObservation {
    pub fn new(bbox: NormalizedRect, confidence: f64) -> Self {
        Self { bbox, confidence }
    }

    pub fn is_well_formed(&self) -> bool {
        self.bbox.is_well_formed() && (0.0..=1.0).contains(&self.confidence)
    }
}
