use std::path::PathBuf;

use super::orientation::Orientation;

/// A rational time base (`num / den` seconds per tick), as used by the
/// container for timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn seconds(&self, ticks: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ticks as f64 * self.num as f64 / self.den as f64
    }
}

/// Properties of an opened input video. Immutable once the source is open;
/// owned by the orchestrator for the lifetime of one job.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoAsset {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub time_base: TimeBase,
    pub duration_secs: f64,
    pub total_frames: usize,
    pub orientation: Orientation,
    pub has_audio: bool,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoAsset {
    /// Duration of one frame at the nominal frame rate, or 0 when unknown.
    pub fn frame_interval_secs(&self) -> f64 {
        if self.fps > 0.0 {
            1.0 / self.fps
        } else {
            0.0
        }
    }
}
