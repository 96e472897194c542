use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compositing::infrastructure::pixelate_compositor::CompositorConfig;
use crate::detection::domain::face_tracker::TrackerConfig;
use crate::shared::constants::{
    DEFAULT_BLUR_INTENSITY, DEFAULT_CONFIDENCE_FLOOR, MAX_BLUR_INTENSITY, MAX_VIDEO_DIMENSION,
    MIN_OUTPUT_BYTES,
};
use crate::shared::error::InputValidationError;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

const CONFIG_DIR: &str = "FaceVeil";
const CONFIG_FILE: &str = "processing.json";

/// How often the detector actually runs.
///
/// `EveryNth` trades tracking smoothness for throughput: detection runs on
/// frames whose index is a multiple of `interval` and the frames in between
/// reuse that frame's observations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DetectionCadence {
    #[default]
    EveryFrame,
    EveryNth { interval: usize },
}

impl DetectionCadence {
    /// Detection interval in frames; `None` when every frame is detected.
    pub fn interval(&self) -> Option<usize> {
        match self {
            DetectionCadence::EveryFrame => None,
            DetectionCadence::EveryNth { interval } => Some(*interval),
        }
    }
}

/// Parameters of one anonymization job, including the tunable constants of
/// the tracker and the compositor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Pixelation strength, 0..=100.
    pub blur_intensity: u32,
    pub cadence: DetectionCadence,
    pub confidence_floor: f64,
    pub max_dimension: u32,
    pub min_output_bytes: u64,
    /// Directory for the output file. `None` uses the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub channel_capacity: usize,
    pub tracker: TrackerConfig,
    pub compositor: CompositorConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            blur_intensity: DEFAULT_BLUR_INTENSITY,
            cadence: DetectionCadence::EveryFrame,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            max_dimension: MAX_VIDEO_DIMENSION,
            min_output_bytes: MIN_OUTPUT_BYTES,
            scratch_dir: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            tracker: TrackerConfig::default(),
            compositor: CompositorConfig::default(),
        }
    }
}

impl ProcessingConfig {
    pub fn with_blur_intensity(mut self, intensity: u32) -> Self {
        self.blur_intensity = intensity;
        self
    }

    pub fn with_cadence(mut self, cadence: DetectionCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<(), InputValidationError> {
        if self.blur_intensity > MAX_BLUR_INTENSITY {
            return Err(InputValidationError::BlurIntensityOutOfRange(
                self.blur_intensity,
            ));
        }
        if let DetectionCadence::EveryNth { interval } = self.cadence {
            if interval == 0 {
                return Err(InputValidationError::InvalidCadence(interval));
            }
        }
        Ok(())
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Platform location of the saved calibration.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Saved calibration, or defaults when none exists or it cannot be parsed.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Option<Self> {
        let json = fs::read_to_string(path).ok()?;
        match Self::from_json(&json) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring unreadable config {}: {e}", path.display());
                None
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no config directory on this platform",
            )),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = self.to_json().map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}
