//! In-memory sources, sinks, detectors and compositors for pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::compositing::domain::region_compositor::RegionCompositor;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_observation::FaceObservation;
use crate::shared::audio_sample::AudioSample;
use crate::shared::error::{CompositingError, DetectionError, EncodingError, SourceError};
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;
use crate::shared::orientation::Orientation;
use crate::shared::video_asset::{TimeBase, VideoAsset};
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::{AudioStream, FrameSource};

pub fn asset(width: u32, height: u32, total_frames: usize, has_audio: bool) -> VideoAsset {
    VideoAsset {
        width,
        height,
        fps: 30.0,
        time_base: TimeBase::new(1, 30),
        duration_secs: total_frames as f64 / 30.0,
        total_frames,
        orientation: Orientation::Up,
        has_audio,
        codec: "stub".into(),
        source_path: None,
    }
}

pub fn gray_frame(index: usize, width: u32, height: u32, value: u8) -> Frame {
    Frame::new(
        vec![value; (width * height * 3) as usize],
        width,
        height,
        3,
        index,
    )
    .with_pts(Some(index as i64))
}

/// Frames whose pixels differ from one another so reordering is visible.
pub fn gradient_frames(count: usize, width: u32, height: u32) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let data = (0..(width * height * 3) as usize)
                .map(|p| ((p + i * 7) % 256) as u8)
                .collect();
            Frame::new(data, width, height, 3, i).with_pts(Some(i as i64 * 2))
        })
        .collect()
}

pub fn audio_samples(count: usize) -> Vec<AudioSample> {
    (0..count)
        .map(|i| AudioSample {
            data: vec![i as u8, 0xA5, (i * 3) as u8],
            pts: Some(i as i64 * 1024),
            dts: Some(i as i64 * 1024),
            duration: 1024,
            time_base: TimeBase::new(1, 48_000),
            is_key: true,
        })
        .collect()
}

pub struct StubSource {
    asset: Result<VideoAsset, SourceError>,
    frames: Vec<Result<Frame, SourceError>>,
    audio: Vec<Result<AudioSample, SourceError>>,
    fail_audio_open: bool,
    closed: Arc<AtomicBool>,
}

impl StubSource {
    pub fn new(asset: VideoAsset, frames: Vec<Frame>) -> Self {
        Self {
            asset: Ok(asset),
            frames: frames.into_iter().map(Ok).collect(),
            audio: Vec::new(),
            fail_audio_open: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing_open(error: SourceError) -> Self {
        Self {
            asset: Err(error),
            frames: Vec::new(),
            audio: Vec::new(),
            fail_audio_open: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_audio(mut self, samples: Vec<AudioSample>) -> Self {
        self.audio = samples.into_iter().map(Ok).collect();
        self
    }

    /// Replaces frame `at` with a decode error.
    pub fn with_decode_error_at(mut self, at: usize) -> Self {
        self.frames[at] = Err(SourceError::Decode("corrupt packet".into()));
        self
    }

    pub fn with_audio_error(mut self) -> Self {
        self.audio.push(Err(SourceError::Decode("bad audio packet".into())));
        self
    }

    pub fn failing_audio_open(mut self) -> Self {
        self.fail_audio_open = true;
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl FrameSource for StubSource {
    fn open(&mut self, _path: &Path) -> Result<VideoAsset, SourceError> {
        self.asset.clone()
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, SourceError>> + '_> {
        Box::new(self.frames.drain(..))
    }

    fn open_audio(&self) -> Result<Option<Box<dyn AudioStream>>, SourceError> {
        if self.fail_audio_open {
            return Err(SourceError::Open("audio stream unavailable".into()));
        }
        if self.audio.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(self.audio.clone().into_iter())))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub opened: Option<PathBuf>,
    pub frames: Vec<Frame>,
    pub audio: Vec<AudioSample>,
    pub finished: bool,
    pub aborted: bool,
}

/// Records everything it is given. `finish` writes `output_bytes` bytes to
/// the output path; `abort` deletes it.
#[derive(Clone)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    fail_open: bool,
    fail_at_frame: Option<usize>,
    fail_finish: bool,
    output_bytes: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(SinkLog::default())),
            fail_open: false,
            fail_at_frame: None,
            fail_finish: false,
            output_bytes: 4096,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_at_frame(mut self, frame: usize) -> Self {
        self.fail_at_frame = Some(frame);
        self
    }

    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    pub fn with_output_bytes(mut self, bytes: usize) -> Self {
        self.output_bytes = bytes;
        self
    }

    pub fn log(&self) -> MutexGuard<'_, SinkLog> {
        self.log.lock().unwrap()
    }
}

impl FrameSink for RecordingSink {
    fn open(&mut self, path: &Path, _asset: &VideoAsset) -> Result<(), EncodingError> {
        if self.fail_open {
            return Err("no encoder".into());
        }
        std::fs::write(path, b"").map_err(|e| EncodingError(e.to_string()))?;
        self.log().opened = Some(path.to_path_buf());
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodingError> {
        let mut log = self.log();
        if self.fail_at_frame == Some(log.frames.len()) {
            return Err("disk full".into());
        }
        log.frames.push(frame.clone());
        Ok(())
    }

    fn write_audio(&mut self, sample: &AudioSample) -> Result<(), EncodingError> {
        self.log().audio.push(sample.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodingError> {
        if self.fail_finish {
            return Err("trailer write failed".into());
        }
        let mut log = self.log();
        if let Some(path) = &log.opened {
            std::fs::write(path, vec![0u8; self.output_bytes])
                .map_err(|e| EncodingError(e.to_string()))?;
        }
        log.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        let mut log = self.log();
        log.aborted = true;
        if let Some(path) = &log.opened {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Records `(frame index, rect)` for every region it is asked to composite.
#[derive(Clone, Default)]
pub struct RecordingCompositor {
    calls: Arc<Mutex<Vec<(usize, NormalizedRect)>>>,
}

impl RecordingCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(usize, NormalizedRect)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn frames(&self) -> Vec<usize> {
        let mut frames: Vec<usize> = self.calls().iter().map(|(i, _)| *i).collect();
        frames.dedup();
        frames
    }
}

impl RegionCompositor for RecordingCompositor {
    fn composite_region(
        &self,
        frame: &mut Frame,
        rect: &NormalizedRect,
    ) -> Result<(), CompositingError> {
        self.calls.lock().unwrap().push((frame.index(), *rect));
        Ok(())
    }
}

/// Returns the same observations on every frame and records which frames
/// it was called on.
#[derive(Clone, Default)]
pub struct RecordingDetector {
    observations: Vec<FaceObservation>,
    seen: Arc<Mutex<Vec<usize>>>,
}

impl RecordingDetector {
    pub fn new(observations: Vec<FaceObservation>) -> Self {
        Self {
            observations,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen(&self) -> Vec<usize> {
        self.seen.lock().unwrap().clone()
    }
}

impl FaceDetector for RecordingDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        _orientation: Orientation,
    ) -> Result<Vec<FaceObservation>, DetectionError> {
        self.seen.lock().unwrap().push(frame.index());
        Ok(self.observations.clone())
    }
}
