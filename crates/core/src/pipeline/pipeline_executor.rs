use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::shared::error::AnonymizeError;
use crate::shared::video_asset::VideoAsset;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

use super::frame_anonymizer::FrameAnonymizer;
use super::pipeline_logger::PipelineLogger;

/// Per-run controls.
pub struct PipelineConfig {
    /// Called after each written frame with `(frames_done, total_frames)`.
    /// Returning `false` requests cancellation.
    pub on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    /// Checked at the top of every frame iteration and by the audio loop.
    pub cancelled: Arc<AtomicBool>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The sink was finalized after both streams finished.
    Completed { frames: usize, audio_packets: usize },
    /// The sink was aborted; nothing is left at the output path.
    Cancelled { frames: usize },
}

/// Runs the read → anonymize → write loop over an opened source.
///
/// Implementations own opening, finalizing and, on any failure or
/// cancellation, aborting the sink.
pub trait PipelineExecutor: Send {
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        anonymizer: FrameAnonymizer,
        asset: &VideoAsset,
        output_path: &Path,
        config: PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<PipelineOutcome, AnonymizeError>;
}
