pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Observations below this confidence are discarded before tracking.
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.3;

/// Largest accepted width or height of the input video, in pixels.
pub const MAX_VIDEO_DIMENSION: u32 = 10_000;

/// An output smaller than this is treated as a failed encode.
pub const MIN_OUTPUT_BYTES: u64 = 1024;

pub const MAX_BLUR_INTENSITY: u32 = 100;

pub const DEFAULT_BLUR_INTENSITY: u32 = 50;

pub const OUTPUT_EXTENSION: &str = "mp4";
