use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for pipeline orchestration events.
///
/// The use case reports through this trait so the embedding application
/// decides where progress and timings go.
pub trait PipelineLogger: Send {
    fn progress(&mut self, current: usize, total: usize);

    /// Duration of one named stage for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time value, e.g. observations per frame.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-job report. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: usize,
    pub total: f64,
    pub max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Forwards to the `log` facade.
///
/// Progress is logged every `every_frames` frames and on the last frame.
/// Stage timings and metrics are aggregated and reported by `summary`.
pub struct LogPipelineLogger {
    every_frames: usize,
    started: Instant,
    frames: usize,
    timings: BTreeMap<String, Aggregate>,
    metrics: BTreeMap<String, Aggregate>,
}

impl LogPipelineLogger {
    pub fn new(every_frames: usize) -> Self {
        Self {
            every_frames: every_frames.max(1),
            started: Instant::now(),
            frames: 0,
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn timing_for(&self, stage: &str) -> Option<&Aggregate> {
        self.timings.get(stage)
    }

    pub fn metric_for(&self, name: &str) -> Option<&Aggregate> {
        self.metrics.get(name)
    }

    /// `None` until a timing or metric has been recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Anonymized {} frames in {elapsed:.1}s",
            self.frames
        )];
        for (stage, agg) in &self.timings {
            lines.push(format!(
                "  {stage:<10} mean {:6.2}ms  max {:7.2}ms  total {:8.0}ms",
                agg.mean(),
                agg.max,
                agg.total
            ));
        }
        for (name, agg) in &self.metrics {
            lines.push(format!(
                "  {name:<15} mean {:.2}  max {:.0}",
                agg.mean(),
                agg.max
            ));
        }
        if self.frames > 0 && elapsed > 0.0 {
            lines.push(format!("  {:.1} fps", self.frames as f64 / elapsed));
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = current;
        if current % self.every_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Anonymizing: {current}/{total} frames ({pct:.0}%)");
        } else {
            log::info!("Anonymizing: {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("detect", 5.0);
        logger.metric("observations", 2.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timings_aggregate_per_stage() {
        let mut logger = LogPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("write", 4.0);

        let detect = logger.timing_for("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.mean(), 25.0);
        assert_relative_eq!(detect.max, 30.0);
        assert_eq!(logger.timing_for("write").unwrap().count, 1);
        assert!(logger.timing_for("track").is_none());
    }

    #[test]
    fn test_metrics_aggregate() {
        let mut logger = LogPipelineLogger::new(10);
        logger.metric("rendered_faces", 1.0);
        logger.metric("rendered_faces", 2.0);
        logger.metric("rendered_faces", 0.0);

        let faces = logger.metric_for("rendered_faces").unwrap();
        assert_relative_eq!(faces.mean(), 1.0);
        assert_relative_eq!(faces.max, 2.0);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = LogPipelineLogger::new(10);
        logger.progress(12, 12);
        logger.timing("composite", 1.5);
        logger.timing("detect", 9.0);
        logger.metric("observations", 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Anonymized 12 frames"));
        assert!(summary.contains("composite"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("observations"));
    }

    #[test]
    fn test_summary_empty_is_none() {
        assert!(LogPipelineLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frame_count() {
        let mut logger = LogPipelineLogger::new(0);
        assert_eq!(logger.every_frames, 1);
        for i in 1..=7 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames, 7);
    }

    #[test]
    fn test_aggregate_mean_of_nothing_is_zero() {
        assert_relative_eq!(Aggregate::default().mean(), 0.0);
    }
}
