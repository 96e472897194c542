use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::compositing::domain::region_compositor::RegionCompositor;
use crate::compositing::infrastructure::pixelate_compositor::PixelateCompositor;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_tracker::FaceTracker;
use crate::detection::domain::observation_filter::ObservationFilter;
use crate::detection::infrastructure::cadenced_detector::CadencedDetector;
use crate::shared::constants::OUTPUT_EXTENSION;
use crate::shared::error::{AnonymizeError, InputValidationError, SourceError};
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;
use crate::video::infrastructure::ffmpeg_sink::FfmpegSink;
use crate::video::infrastructure::ffmpeg_source::FfmpegSource;

use super::frame_anonymizer::FrameAnonymizer;
use super::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use super::input_validator::{validate_dimensions, validate_file};
use super::output_result::OutputResult;
use super::pipeline_executor::{PipelineConfig, PipelineExecutor, PipelineOutcome};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use super::processing_config::ProcessingConfig;

type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Anonymizes the faces in one recorded video.
///
/// Validates the input, then runs detect → track → pixelate → encode into
/// a fresh file in the scratch directory while audio is copied through.
/// Every run gets its own `FaceTracker`. Single-use: `execute` consumes
/// the source, sink and detector, so a second call fails.
pub struct AnonymizeFacesUseCase {
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn FrameSink>>,
    detector: Option<Box<dyn FaceDetector>>,
    compositor: Option<Box<dyn RegionCompositor>>,
    executor: Box<dyn PipelineExecutor>,
    config: ProcessingConfig,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<ProgressFn>,
    cancelled: Arc<AtomicBool>,
}

impl AnonymizeFacesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        detector: Box<dyn FaceDetector>,
        executor: Box<dyn PipelineExecutor>,
        config: ProcessingConfig,
    ) -> Self {
        Self {
            source: Some(source),
            sink: Some(sink),
            detector: Some(detector),
            compositor: None,
            executor,
            config,
            logger: Box::new(NullPipelineLogger),
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// FFmpeg decode/encode on the threaded executor.
    pub fn with_ffmpeg(detector: Box<dyn FaceDetector>, config: ProcessingConfig) -> Self {
        let executor = ThreadedPipelineExecutor::with_capacity(config.channel_capacity);
        Self::new(
            Box::new(FfmpegSource::new()),
            Box::new(FfmpegSink::new()),
            detector,
            Box::new(executor),
            config,
        )
    }

    /// Overrides the pixelation compositor built from the config.
    pub fn with_compositor(mut self, compositor: Box<dyn RegionCompositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn with_cancel_token(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn execute(&mut self, input: &Path) -> OutputResult {
        match self.run(input) {
            Ok(Some(path)) => OutputResult::Success { path },
            Ok(None) => OutputResult::Cancelled,
            Err(error) => {
                log::warn!("Anonymizing {} failed: {error}", input.display());
                OutputResult::Failed { error }
            }
        }
    }

    /// `Ok(None)` when cancelled.
    fn run(&mut self, input: &Path) -> Result<Option<PathBuf>, AnonymizeError> {
        let mut source = self.source.take().ok_or(AnonymizeError::AlreadyExecuted)?;
        let sink = self.sink.take().ok_or(AnonymizeError::AlreadyExecuted)?;
        let detector = self.detector.take().ok_or(AnonymizeError::AlreadyExecuted)?;

        self.config.validate()?;
        validate_file(input)?;
        let asset = source.open(input).map_err(|e| match e {
            SourceError::NoVideoTrack => InputValidationError::NoVideoTrack.into(),
            other => AnonymizeError::from(other),
        })?;
        if let Err(e) = validate_dimensions(&asset, self.config.max_dimension) {
            source.close();
            return Err(e.into());
        }

        self.logger.info(&format!(
            "Anonymizing {} ({}x{}, {} frames, rotated {}°, audio: {})",
            input.display(),
            asset.width,
            asset.height,
            asset.total_frames,
            asset.orientation.degrees(),
            asset.has_audio
        ));

        let detector: Box<dyn FaceDetector> = match self.config.cadence.interval() {
            Some(interval) => Box::new(CadencedDetector::new(detector, interval)?),
            None => detector,
        };
        let compositor = self.compositor.take().unwrap_or_else(|| -> Box<dyn RegionCompositor> {
            Box::new(PixelateCompositor::new(
                self.config.blur_intensity,
                &self.config.compositor,
            ))
        });
        let anonymizer = FrameAnonymizer::new(
            detector,
            ObservationFilter::new(self.config.confidence_floor),
            FaceTracker::new(self.config.tracker),
            compositor,
            asset.orientation,
        );

        let output = scratch_output(&self.config.scratch_dir())?;
        let pipeline_config = PipelineConfig {
            on_progress: self.on_progress.take(),
            cancelled: self.cancelled.clone(),
        };

        let outcome = self.executor.execute(
            source,
            sink,
            anonymizer,
            &asset,
            &output,
            pipeline_config,
            self.logger.as_mut(),
        );
        self.logger.summary();

        match outcome {
            Ok(PipelineOutcome::Completed {
                frames,
                audio_packets,
            }) => {
                if let Err(e) = verify_output(&output, self.config.min_output_bytes) {
                    discard(&output);
                    return Err(e);
                }
                self.logger.info(&format!(
                    "Wrote {} ({frames} frames, {audio_packets} audio packets)",
                    output.display()
                ));
                Ok(Some(output))
            }
            Ok(PipelineOutcome::Cancelled { .. }) => {
                discard(&output);
                Ok(None)
            }
            Err(e) => {
                discard(&output);
                Err(e)
            }
        }
    }
}

/// Reserves a uniquely named output file in `dir`.
fn scratch_output(dir: &Path) -> Result<PathBuf, AnonymizeError> {
    tempfile::Builder::new()
        .prefix("anonymized-")
        .suffix(&format!(".{OUTPUT_EXTENSION}"))
        .tempfile_in(dir)
        .map_err(AnonymizeError::Scratch)?
        .into_temp_path()
        .keep()
        .map_err(|e| AnonymizeError::Scratch(e.error))
}

fn verify_output(path: &Path, min_bytes: u64) -> Result<(), AnonymizeError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() >= min_bytes => Ok(()),
        _ => Err(AnonymizeError::OutputVerification(path.to_path_buf())),
    }
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {e}", path.display());
        }
    }
}
