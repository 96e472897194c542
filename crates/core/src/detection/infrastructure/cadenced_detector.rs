use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_observation::FaceObservation;
use crate::shared::error::{DetectionError, InputValidationError};
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

/// Decorator that runs detection only on frames whose index is a multiple
/// of `interval`, returning the last detection result in between.
///
/// The tracker still runs on every frame, so cached observations keep
/// matched tracks Active and predicted motion is only used once a face
/// actually drops out of the detector's results.
pub struct CadencedDetector {
    inner: Box<dyn FaceDetector>,
    interval: usize,
    cached: Vec<FaceObservation>,
}

impl CadencedDetector {
    pub fn new(inner: Box<dyn FaceDetector>, interval: usize) -> Result<Self, InputValidationError> {
        if interval < 1 {
            return Err(InputValidationError::InvalidCadence(interval));
        }
        Ok(Self {
            inner,
            interval,
            cached: Vec::new(),
        })
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    fn is_sampled(&self, frame: &Frame) -> bool {
        frame.index() % self.interval == 0
    }
}

impl FaceDetector for CadencedDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        orientation: Orientation,
    ) -> Result<Vec<FaceObservation>, DetectionError> {
        if !self.is_sampled(frame) {
            return Ok(self.cached.clone());
        }
        match self.inner.detect(frame, orientation) {
            Ok(observations) => {
                self.cached = observations.clone();
                Ok(observations)
            }
            Err(e) => {
                // A failed sample must not keep replaying faces from before it.
                self.cached.clear();
                Err(e)
            }
        }
    }
}
