use crate::shared::error::CompositingError;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;

/// Domain interface for obscuring face regions within a frame.
///
/// Rectangles are normalized to the stored frame. Implementations modify
/// the frame in place.
pub trait RegionCompositor: Send {
    fn composite_region(
        &self,
        frame: &mut Frame,
        rect: &NormalizedRect,
    ) -> Result<(), CompositingError>;

    /// Composites every rectangle in order; where two regions overlap the
    /// later one wins. A region that fails is logged and skipped.
    ///
    /// Returns the number of regions actually composited.
    fn composite(&self, frame: &mut Frame, rects: &[NormalizedRect]) -> usize {
        let mut applied = 0;
        for rect in rects {
            match self.composite_region(frame, rect) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("Frame {}: skipping region {rect:?}: {e}", frame.index()),
            }
        }
        applied
    }
}
