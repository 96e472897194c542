use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::frame_anonymizer::{elapsed_ms, FrameAnonymizer};
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor, PipelineOutcome};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::processing_config::DEFAULT_CHANNEL_CAPACITY;
use crate::shared::audio_sample::AudioSample;
use crate::shared::error::{AnonymizeError, EncodingError, SourceError};
use crate::shared::frame::Frame;
use crate::shared::video_asset::VideoAsset;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::{AudioStream, FrameSource};

enum SinkCommand {
    Video(Frame),
    Audio(AudioSample),
    VideoFinished,
    AudioFinished,
}

#[derive(Default)]
struct WriterReport {
    frames: usize,
    audio_packets: usize,
    write_ms: Vec<f64>,
    video_finished: bool,
    audio_finished: bool,
}

enum VideoEnd {
    Finished,
    Cancelled(usize),
    /// Stopped because the audio loop failed.
    Halted,
}

type WriterResult = (Box<dyn FrameSink>, Result<WriterReport, EncodingError>);

/// Runs one job on three threads:
///
/// `caller [decode → anonymize] ─┐`
/// `audio  [demux]              ─┴→ writer [sink]`
///
/// The writer owns the sink and is fed through one bounded channel, so
/// neither stream can run unboundedly ahead of encoding. The container is
/// finalized only after both the video and the audio loop have reported
/// completion.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
        mut anonymizer: FrameAnonymizer,
        asset: &VideoAsset,
        output_path: &Path,
        config: PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<PipelineOutcome, AnonymizeError> {
        if let Err(e) = sink.open(output_path, asset) {
            sink.abort();
            source.close();
            return Err(e.into());
        }

        let audio = if asset.has_audio {
            match source.open_audio() {
                Ok(audio) => audio,
                Err(e) => {
                    sink.abort();
                    source.close();
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let (tx, rx) = crossbeam_channel::bounded::<SinkCommand>(self.channel_capacity);
        let halt = Arc::new(AtomicBool::new(false));

        let writer_handle = spawn_writer(sink, rx);
        let audio_handle = spawn_audio(audio, tx.clone(), config.cancelled.clone(), halt.clone());

        let video = run_video_loop(
            source.as_mut(),
            &mut anonymizer,
            &tx,
            asset.total_frames,
            &config,
            &halt,
            logger,
        );
        if video.is_err() {
            halt.store(true, Ordering::Relaxed);
        }
        drop(tx);

        let audio = audio_handle.join();
        let writer = writer_handle.join();
        source.close();

        let (mut sink, written) = writer.map_err(|_| AnonymizeError::WorkerPanicked("writer"))?;
        let outcome = settle(video, audio, written, logger);

        match outcome {
            Ok(PipelineOutcome::Completed { .. }) => {
                if let Err(e) = sink.finish() {
                    sink.abort();
                    return Err(e.into());
                }
            }
            Ok(PipelineOutcome::Cancelled { frames }) => {
                log::info!("Cancelled after {frames} frames; discarding output");
                sink.abort();
            }
            Err(_) => sink.abort(),
        }
        outcome
    }
}

/// Combines the three loops' results. A writer failure takes precedence
/// since it is what stops the other two.
fn settle(
    video: Result<VideoEnd, AnonymizeError>,
    audio: std::thread::Result<Result<usize, SourceError>>,
    written: Result<WriterReport, EncodingError>,
    logger: &mut dyn PipelineLogger,
) -> Result<PipelineOutcome, AnonymizeError> {
    let report = written?;
    for ms in &report.write_ms {
        logger.timing("write", *ms);
    }
    let video = video?;
    audio.map_err(|_| AnonymizeError::WorkerPanicked("audio"))??;

    match video {
        VideoEnd::Cancelled(frames) => Ok(PipelineOutcome::Cancelled { frames }),
        VideoEnd::Halted => Err(EncodingError::from("video loop halted").into()),
        VideoEnd::Finished => {
            if !(report.video_finished && report.audio_finished) {
                return Err(EncodingError::from("writer stopped before both streams finished").into());
            }
            Ok(PipelineOutcome::Completed {
                frames: report.frames,
                audio_packets: report.audio_packets,
            })
        }
    }
}

fn run_video_loop(
    source: &mut dyn FrameSource,
    anonymizer: &mut FrameAnonymizer,
    tx: &Sender<SinkCommand>,
    total_frames: usize,
    config: &PipelineConfig,
    halt: &AtomicBool,
    logger: &mut dyn PipelineLogger,
) -> Result<VideoEnd, AnonymizeError> {
    let writer_gone = || EncodingError::from("writer stopped unexpectedly");
    let mut frames = 0usize;

    for frame_result in source.frames() {
        if config.cancelled.load(Ordering::Relaxed) {
            return Ok(VideoEnd::Cancelled(frames));
        }
        if halt.load(Ordering::Relaxed) {
            return Ok(VideoEnd::Halted);
        }

        let mut frame = frame_result?;
        let report = anonymizer.process(&mut frame, logger);
        for event in &report.events {
            log::debug!("{event:?}");
        }
        tx.send(SinkCommand::Video(frame)).map_err(|_| writer_gone())?;

        frames += 1;
        logger.progress(frames, total_frames);
        if let Some(ref on_progress) = config.on_progress {
            if !on_progress(frames, total_frames) {
                config.cancelled.store(true, Ordering::Relaxed);
            }
        }
    }

    if config.cancelled.load(Ordering::Relaxed) {
        return Ok(VideoEnd::Cancelled(frames));
    }
    tx.send(SinkCommand::VideoFinished).map_err(|_| writer_gone())?;
    Ok(VideoEnd::Finished)
}

fn spawn_audio(
    audio: Option<Box<dyn AudioStream>>,
    tx: Sender<SinkCommand>,
    cancelled: Arc<AtomicBool>,
    halt: Arc<AtomicBool>,
) -> JoinHandle<Result<usize, SourceError>> {
    std::thread::spawn(move || {
        let mut packets = 0usize;
        for sample in audio.into_iter().flatten() {
            if cancelled.load(Ordering::Relaxed) || halt.load(Ordering::Relaxed) {
                return Ok(packets);
            }
            let sample = match sample {
                Ok(sample) => sample,
                Err(e) => {
                    halt.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            };
            if tx.send(SinkCommand::Audio(sample)).is_err() {
                return Ok(packets);
            }
            packets += 1;
        }
        let _ = tx.send(SinkCommand::AudioFinished);
        Ok(packets)
    })
}

fn spawn_writer(mut sink: Box<dyn FrameSink>, rx: Receiver<SinkCommand>) -> JoinHandle<WriterResult> {
    std::thread::spawn(move || {
        let result = drain_commands(sink.as_mut(), rx);
        (sink, result)
    })
}

fn drain_commands(
    sink: &mut dyn FrameSink,
    rx: Receiver<SinkCommand>,
) -> Result<WriterReport, EncodingError> {
    let mut report = WriterReport::default();
    for command in rx {
        match command {
            SinkCommand::Video(frame) => {
                let started = Instant::now();
                sink.write_frame(&frame)?;
                report.write_ms.push(elapsed_ms(started));
                report.frames += 1;
            }
            SinkCommand::Audio(sample) => {
                sink.write_audio(&sample)?;
                report.audio_packets += 1;
            }
            SinkCommand::VideoFinished => report.video_finished = true,
            SinkCommand::AudioFinished => report.audio_finished = true,
        }
        if report.video_finished && report.audio_finished {
            break;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::detection::domain::face_observation::FaceObservation;
    use crate::detection::domain::face_tracker::FaceTracker;
    use crate::detection::domain::observation_filter::ObservationFilter;
    use crate::detection::infrastructure::scripted_face_detector::ScriptedFaceDetector;
    use crate::pipeline::pipeline_logger::{LogPipelineLogger, NullPipelineLogger};
    use crate::pipeline::test_doubles::{
        asset, audio_samples, gradient_frames, RecordingCompositor, RecordingSink, StubSource,
    };
    use crate::shared::geometry::NormalizedRect;
    use crate::shared::orientation::Orientation;
    use std::sync::Mutex;

    fn anonymizer_with(detector: Box<dyn FaceDetector>) -> (FrameAnonymizer, RecordingCompositor) {
        let compositor = RecordingCompositor::new();
        let anonymizer = FrameAnonymizer::new(
            detector,
            ObservationFilter::default(),
            FaceTracker::default(),
            Box::new(compositor.clone()),
            Orientation::Up,
        );
        (anonymizer, compositor)
    }

    fn no_faces() -> FrameAnonymizer {
        anonymizer_with(Box::new(ScriptedFaceDetector::from_observations([]))).0
    }

    fn run(
        source: StubSource,
        sink: &RecordingSink,
        anonymizer: FrameAnonymizer,
        has_audio: bool,
        frames: usize,
        config: PipelineConfig,
    ) -> Result<PipelineOutcome, AnonymizeError> {
        let dir = tempfile::tempdir().unwrap();
        ThreadedPipelineExecutor::with_capacity(2).execute(
            Box::new(source),
            Box::new(sink.clone()),
            anonymizer,
            &asset(16, 16, frames, has_audio),
            &dir.path().join("out.mp4"),
            config,
            &mut NullPipelineLogger,
        )
    }

    #[test]
    fn test_writes_all_frames_in_order_with_timestamps() {
        let frames = gradient_frames(12, 16, 16);
        let sink = RecordingSink::new();

        let outcome = run(
            StubSource::new(asset(16, 16, 12, false), frames.clone()),
            &sink,
            no_faces(),
            false,
            12,
            PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::Completed {
                frames: 12,
                audio_packets: 0
            }
        );
        let log = sink.log();
        assert!(log.finished);
        assert!(!log.aborted);
        let indices: Vec<usize> = log.frames.iter().map(|f| f.index()).collect();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
        let pts: Vec<Option<i64>> = log.frames.iter().map(|f| f.pts()).collect();
        assert_eq!(pts, frames.iter().map(|f| f.pts()).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_faces_output_pixels_identical() {
        let frames = gradient_frames(6, 16, 16);
        let sink = RecordingSink::new();

        run(
            StubSource::new(asset(16, 16, 6, false), frames.clone()),
            &sink,
            no_faces(),
            false,
            6,
            PipelineConfig::default(),
        )
        .unwrap();

        let log = sink.log();
        for (written, original) in log.frames.iter().zip(&frames) {
            assert_eq!(written.data(), original.data());
        }
    }

    #[test]
    fn test_audio_passed_through_verbatim() {
        let samples = audio_samples(40);
        let sink = RecordingSink::new();

        let outcome = run(
            StubSource::new(asset(16, 16, 5, true), gradient_frames(5, 16, 16))
                .with_audio(samples.clone()),
            &sink,
            no_faces(),
            true,
            5,
            PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::Completed {
                frames: 5,
                audio_packets: 40
            }
        );
        assert_eq!(sink.log().audio, samples);
    }

    #[test]
    fn test_audio_ignored_when_asset_has_none() {
        let sink = RecordingSink::new();
        run(
            StubSource::new(asset(16, 16, 3, false), gradient_frames(3, 16, 16))
                .with_audio(audio_samples(4)),
            &sink,
            no_faces(),
            false,
            3,
            PipelineConfig::default(),
        )
        .unwrap();
        assert!(sink.log().audio.is_empty());
    }

    #[test]
    fn test_faces_are_composited_on_their_frames() {
        let face = FaceObservation::new(NormalizedRect::new(0.4, 0.4, 0.2, 0.2), 0.9);
        let detector = ScriptedFaceDetector::from_observations([(2, vec![face])]);
        let (anonymizer, compositor) = anonymizer_with(Box::new(detector));

        run(
            StubSource::new(asset(16, 16, 12, false), gradient_frames(12, 16, 16)),
            &RecordingSink::new(),
            anonymizer,
            false,
            12,
            PipelineConfig::default(),
        )
        .unwrap();

        // Seen at 2, kept until max_age (5) frames unseen, evicted at 8.
        assert_eq!(compositor.frames(), (2..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_write_failure_aborts_and_is_fatal() {
        let sink = RecordingSink::new().failing_at_frame(3);

        let result = run(
            StubSource::new(asset(16, 16, 20, true), gradient_frames(20, 16, 16))
                .with_audio(audio_samples(50)),
            &sink,
            no_faces(),
            true,
            20,
            PipelineConfig::default(),
        );

        assert!(matches!(result, Err(AnonymizeError::Encoding(_))));
        let log = sink.log();
        assert!(log.aborted);
        assert!(!log.finished);
        assert_eq!(log.frames.len(), 3);
    }

    #[test]
    fn test_finish_failure_aborts() {
        let sink = RecordingSink::new().failing_finish();
        let result = run(
            StubSource::new(asset(16, 16, 2, false), gradient_frames(2, 16, 16)),
            &sink,
            no_faces(),
            false,
            2,
            PipelineConfig::default(),
        );
        assert!(matches!(result, Err(AnonymizeError::Encoding(_))));
        assert!(sink.log().aborted);
    }

    #[test]
    fn test_decode_error_is_fatal() {
        let sink = RecordingSink::new();
        let source = StubSource::new(asset(16, 16, 5, false), gradient_frames(5, 16, 16))
            .with_decode_error_at(2);
        let closed = source.closed_flag();

        let result = run(source, &sink, no_faces(), false, 5, PipelineConfig::default());

        assert!(matches!(result, Err(AnonymizeError::Source(_))));
        assert!(sink.log().aborted);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_sink_open_failure_closes_source() {
        let sink = RecordingSink::new().failing_open();
        let source = StubSource::new(asset(16, 16, 3, false), gradient_frames(3, 16, 16));
        let closed = source.closed_flag();

        let result = run(source, &sink, no_faces(), false, 3, PipelineConfig::default());

        assert!(matches!(result, Err(AnonymizeError::Encoding(_))));
        assert!(sink.log().aborted);
        assert!(sink.log().frames.is_empty());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_audio_open_failure_closes_source() {
        let sink = RecordingSink::new();
        let source = StubSource::new(asset(16, 16, 3, true), gradient_frames(3, 16, 16))
            .failing_audio_open();
        let closed = source.closed_flag();

        let result = run(source, &sink, no_faces(), true, 3, PipelineConfig::default());

        assert!(matches!(result, Err(AnonymizeError::Source(_))));
        assert!(sink.log().aborted);
        assert!(sink.log().frames.is_empty());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_audio_error_is_fatal() {
        let sink = RecordingSink::new();
        let result = run(
            StubSource::new(asset(16, 16, 5, true), gradient_frames(5, 16, 16))
                .with_audio(audio_samples(3))
                .with_audio_error(),
            &sink,
            no_faces(),
            true,
            5,
            PipelineConfig::default(),
        );
        assert!(matches!(result, Err(AnonymizeError::Source(_))));
        assert!(sink.log().aborted);
        assert!(!sink.log().finished);
    }

    #[test]
    fn test_progress_callback_can_cancel() {
        let sink = RecordingSink::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let config = PipelineConfig {
            on_progress: Some(Box::new(move |done, total| {
                seen.lock().unwrap().push((done, total));
                done < 3
            })),
            ..PipelineConfig::default()
        };

        let outcome = run(
            StubSource::new(asset(16, 16, 10, true), gradient_frames(10, 16, 16))
                .with_audio(audio_samples(100)),
            &sink,
            no_faces(),
            true,
            10,
            config,
        )
        .unwrap();

        assert_eq!(outcome, PipelineOutcome::Cancelled { frames: 3 });
        assert_eq!(*calls.lock().unwrap(), vec![(1, 10), (2, 10), (3, 10)]);
        let log = sink.log();
        assert!(log.aborted);
        assert!(!log.finished);
    }

    #[test]
    fn test_cancelled_before_start_writes_nothing() {
        let sink = RecordingSink::new();
        let config = PipelineConfig::default();
        config.cancelled.store(true, Ordering::Relaxed);

        let outcome = run(
            StubSource::new(asset(16, 16, 4, false), gradient_frames(4, 16, 16)),
            &sink,
            no_faces(),
            false,
            4,
            config,
        )
        .unwrap();

        assert_eq!(outcome, PipelineOutcome::Cancelled { frames: 0 });
        assert!(sink.log().frames.is_empty());
        assert!(sink.log().aborted);
    }

    #[test]
    fn test_output_deleted_on_abort() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let sink = RecordingSink::new().failing_at_frame(0);

        let result = ThreadedPipelineExecutor::new().execute(
            Box::new(StubSource::new(asset(16, 16, 2, false), gradient_frames(2, 16, 16))),
            Box::new(sink.clone()),
            no_faces(),
            &asset(16, 16, 2, false),
            &output,
            PipelineConfig::default(),
            &mut NullPipelineLogger,
        );

        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_write_timings_logged() {
        let mut logger = LogPipelineLogger::new(100);
        let dir = tempfile::tempdir().unwrap();

        ThreadedPipelineExecutor::new()
            .execute(
                Box::new(StubSource::new(asset(16, 16, 4, false), gradient_frames(4, 16, 16))),
                Box::new(RecordingSink::new()),
                no_faces(),
                &asset(16, 16, 4, false),
                &dir.path().join("out.mp4"),
                PipelineConfig::default(),
                &mut logger,
            )
            .unwrap();

        assert_eq!(logger.timing_for("write").unwrap().count, 4);
        assert_eq!(logger.timing_for("detect").unwrap().count, 4);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(ThreadedPipelineExecutor::with_capacity(0).channel_capacity, 1);
    }
}
