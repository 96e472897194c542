use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::shared::error::AnonymizeError;

use super::anonymize_faces_use_case::AnonymizeFacesUseCase;
use super::output_result::OutputResult;

/// A running anonymization job.
pub struct JobHandle {
    cancelled: Arc<AtomicBool>,
    thread: JoinHandle<OutputResult>,
}

impl JobHandle {
    /// Requests cooperative cancellation; takes effect at the next frame.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the job ends.
    pub fn wait(self) -> OutputResult {
        self.thread.join().unwrap_or_else(|_| OutputResult::Failed {
            error: AnonymizeError::WorkerPanicked("job"),
        })
    }
}

/// Runs `use_case` on `input` on its own background thread.
pub fn spawn_job(mut use_case: AnonymizeFacesUseCase, input: PathBuf) -> JobHandle {
    let cancelled = use_case.cancel_token();
    let thread = std::thread::spawn(move || {
        log::info!("Job started for {}", input.display());
        let result = use_case.execute(&input);
        match &result {
            OutputResult::Success { path } => log::info!("Job finished: {}", path.display()),
            OutputResult::Failed { error } => log::warn!("Job failed: {error}"),
            OutputResult::Cancelled => log::info!("Job cancelled"),
        }
        result
    });
    JobHandle { cancelled, thread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::detection::domain::face_observation::FaceObservation;
    use crate::detection::infrastructure::scripted_face_detector::ScriptedFaceDetector;
    use crate::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
    use crate::pipeline::processing_config::ProcessingConfig;
    use crate::pipeline::test_doubles::{
        asset, gradient_frames, RecordingCompositor, RecordingSink, StubSource,
    };
    use crate::shared::error::DetectionError;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::NormalizedRect;
    use crate::shared::orientation::Orientation;
    use crossbeam_channel::{Receiver, Sender};

    /// Blocks on frame 0 until the test releases it.
    struct GateDetector {
        gate: Receiver<()>,
        started: Sender<()>,
    }

    impl FaceDetector for GateDetector {
        fn detect(
            &mut self,
            frame: &Frame,
            _orientation: Orientation,
        ) -> Result<Vec<FaceObservation>, DetectionError> {
            if frame.index() == 0 {
                let _ = self.started.send(());
                let _ = self.gate.recv();
            }
            Ok(Vec::new())
        }
    }

    fn input_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("input.mp4");
        std::fs::write(&path, b"video").unwrap();
        path
    }

    fn use_case(
        dir: &tempfile::TempDir,
        detector: Box<dyn FaceDetector>,
        sink: &RecordingSink,
    ) -> AnonymizeFacesUseCase {
        AnonymizeFacesUseCase::new(
            Box::new(StubSource::new(asset(16, 16, 50, false), gradient_frames(50, 16, 16))),
            Box::new(sink.clone()),
            detector,
            Box::new(ThreadedPipelineExecutor::new()),
            ProcessingConfig::default().with_scratch_dir(dir.path()),
        )
    }

    #[test]
    fn test_job_runs_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let (release, gate) = crossbeam_channel::unbounded();
        let (started, _started_rx) = crossbeam_channel::unbounded();
        release.send(()).unwrap();
        let sink = RecordingSink::new();

        let handle = spawn_job(
            use_case(&dir, Box::new(GateDetector { gate, started }), &sink),
            input_file(&dir),
        );

        let result = handle.wait();
        assert!(result.is_success(), "{result:?}");
        assert_eq!(sink.log().frames.len(), 50);
    }

    #[test]
    fn test_cancel_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let (release, gate) = crossbeam_channel::unbounded();
        let (started, started_rx) = crossbeam_channel::unbounded();
        let sink = RecordingSink::new();

        let handle = spawn_job(
            use_case(&dir, Box::new(GateDetector { gate, started }), &sink),
            input_file(&dir),
        );
        started_rx.recv().unwrap();
        handle.cancel();
        release.send(()).unwrap();

        assert!(matches!(handle.wait(), OutputResult::Cancelled));
        assert_eq!(sink.log().frames.len(), 1);
        assert!(sink.log().aborted);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("input.mp4")]);
    }

    #[test]
    fn test_jobs_do_not_share_tracker_state() {
        let dir = tempfile::tempdir().unwrap();
        let face = FaceObservation::new(NormalizedRect::new(0.4, 0.4, 0.2, 0.2), 0.9);
        let run = |detector: Box<dyn FaceDetector>| {
            let compositor = RecordingCompositor::new();
            let uc = use_case(&dir, detector, &RecordingSink::new())
                .with_compositor(Box::new(compositor.clone()));
            let result = spawn_job(uc, input_file(&dir)).wait();
            assert!(result.is_success());
            compositor.frames()
        };

        let first = run(Box::new(ScriptedFaceDetector::from_observations([(
            0,
            vec![face],
        )])));
        let second = run(Box::new(ScriptedFaceDetector::from_observations([])));

        assert_eq!(first, (0..=5).collect::<Vec<_>>());
        assert!(second.is_empty());
    }
}
