use crate::shared::error::DetectionError;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

use super::face_observation::FaceObservation;

/// Domain interface for face detection.
///
/// `orientation` is the container transform of the stored frame; results
/// are normalized to the upright frame. Implementations may be stateful
/// (e.g. caching between frames), hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        orientation: Orientation,
    ) -> Result<Vec<FaceObservation>, DetectionError>;
}
