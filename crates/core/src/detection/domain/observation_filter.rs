use crate::shared::constants::DEFAULT_CONFIDENCE_FLOOR;
use crate::shared::error::DetectionError;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

use super::face_detector::FaceDetector;
use super::face_observation::FaceObservation;

/// Guards the tracker against detector misbehaviour.
///
/// A failing call, or a result containing any malformed observation, is
/// treated as "no faces in this frame". Surviving observations below the
/// confidence floor are dropped.
#[derive(Clone, Copy, Debug)]
pub struct ObservationFilter {
    confidence_floor: f64,
}

impl ObservationFilter {
    pub fn new(confidence_floor: f64) -> Self {
        Self { confidence_floor }
    }

    pub fn confidence_floor(&self) -> f64 {
        self.confidence_floor
    }

    /// Runs the detector on one frame and returns only usable observations.
    pub fn detect(
        &self,
        detector: &mut dyn FaceDetector,
        frame: &Frame,
        orientation: Orientation,
    ) -> Vec<FaceObservation> {
        self.accept(detector.detect(frame, orientation), frame.index())
    }

    pub fn accept(
        &self,
        result: Result<Vec<FaceObservation>, DetectionError>,
        frame_index: usize,
    ) -> Vec<FaceObservation> {
        let observations = match result.and_then(validate) {
            Ok(observations) => observations,
            Err(e) => {
                log::warn!("Frame {frame_index}: {e}; continuing without faces");
                return Vec::new();
            }
        };

        observations
            .into_iter()
            .filter(|o| o.confidence >= self.confidence_floor)
            .collect()
    }
}

impl Default for ObservationFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_FLOOR)
    }
}

fn validate(observations: Vec<FaceObservation>) -> Result<Vec<FaceObservation>, DetectionError> {
    match observations.iter().find(|o| !o.is_well_formed()) {
        Some(bad) => Err(DetectionError(format!("malformed observation {bad:?}"))),
        None => Ok(observations),
    }
}
