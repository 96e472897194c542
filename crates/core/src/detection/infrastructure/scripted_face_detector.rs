use std::collections::HashMap;
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_observation::FaceObservation;
use crate::shared::error::DetectionError;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

/// Replays pre-computed observations by frame index.
///
/// Used when detections already exist for the clip (an earlier analysis
/// pass, or a scripted sequence in tests). Frames without an entry yield no
/// faces; frames scripted to fail yield a `DetectionError`.
pub struct ScriptedFaceDetector {
    script: Arc<HashMap<usize, Result<Vec<FaceObservation>, DetectionError>>>,
}

impl ScriptedFaceDetector {
    pub fn new(script: Arc<HashMap<usize, Result<Vec<FaceObservation>, DetectionError>>>) -> Self {
        Self { script }
    }

    /// Builds a script where every listed frame succeeds.
    pub fn from_observations<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<FaceObservation>)>,
    {
        let script = frames.into_iter().map(|(i, obs)| (i, Ok(obs))).collect();
        Self::new(Arc::new(script))
    }
}

impl FaceDetector for ScriptedFaceDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        _orientation: Orientation,
    ) -> Result<Vec<FaceObservation>, DetectionError> {
        self.script
            .get(&frame.index())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
