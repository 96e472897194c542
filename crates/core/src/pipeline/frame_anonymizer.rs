use std::time::Instant;

use crate::compositing::domain::region_compositor::RegionCompositor;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_tracker::{FaceTracker, RenderTarget, TrackEvent};
use crate::detection::domain::observation_filter::ObservationFilter;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;
use crate::shared::orientation::Orientation;

use super::pipeline_logger::PipelineLogger;

/// What happened to one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub observations: usize,
    pub events: Vec<TrackEvent>,
    /// Targets in upright space, before mapping to the stored frame.
    pub targets: Vec<RenderTarget>,
    pub composited: usize,
}

/// Detect → track → composite for one job's frames, in order.
///
/// The tracker works in upright normalized space; rectangles are mapped
/// back to the stored frame before pixelation so pixel data is never
/// rotated.
pub struct FrameAnonymizer {
    detector: Box<dyn FaceDetector>,
    filter: ObservationFilter,
    tracker: FaceTracker,
    compositor: Box<dyn RegionCompositor>,
    orientation: Orientation,
}

impl FrameAnonymizer {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        filter: ObservationFilter,
        tracker: FaceTracker,
        compositor: Box<dyn RegionCompositor>,
        orientation: Orientation,
    ) -> Self {
        Self {
            detector,
            filter,
            tracker,
            compositor,
            orientation,
        }
    }

    pub fn tracker(&self) -> &FaceTracker {
        &self.tracker
    }

    pub fn process(&mut self, frame: &mut Frame, logger: &mut dyn PipelineLogger) -> FrameReport {
        let index = frame.index();

        let started = Instant::now();
        let observations = self
            .filter
            .detect(self.detector.as_mut(), frame, self.orientation);
        logger.timing("detect", elapsed_ms(started));

        let started = Instant::now();
        let events = self.tracker.update(index, &observations);
        let targets = self.tracker.render_targets(index);
        logger.timing("track", elapsed_ms(started));

        let rects: Vec<NormalizedRect> = targets
            .iter()
            .map(|t| self.orientation.to_stored(&t.rect))
            .collect();
        let started = Instant::now();
        let composited = self.compositor.composite(frame, &rects);
        logger.timing("composite", elapsed_ms(started));

        logger.metric("observations", observations.len() as f64);
        logger.metric("rendered_faces", targets.len() as f64);

        FrameReport {
            observations: observations.len(),
            events,
            targets,
            composited,
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
