//! Error taxonomy for an anonymization job.
//!
//! Fatal kinds (`InputValidationError`, `SourceError`, `EncodingError`)
//! end the job and are wrapped by `AnonymizeError`. `DetectionError` and
//! `CompositingError` are per-frame / per-region and are absorbed by the
//! pipeline after logging.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputValidationError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read input file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("input file is empty: {0}")]
    Empty(PathBuf),
    #[error("input has no video track")]
    NoVideoTrack,
    #[error("invalid video dimensions {width}x{height} (each side must be 1..={max})")]
    InvalidDimensions { width: u32, height: u32, max: u32 },
    #[error("blur intensity {0} is outside 0..=100")]
    BlurIntensityOutOfRange(u32),
    #[error("detection interval must be >= 1, got {0}")]
    InvalidCadence(usize),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("face detection failed: {0}")]
pub struct DetectionError(pub String);

impl From<String> for DetectionError {
    fn from(message: String) -> Self {
        DetectionError(message)
    }
}

impl From<&str> for DetectionError {
    fn from(message: &str) -> Self {
        DetectionError(message.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositingError {
    #[error("region lies outside the frame")]
    EmptyRegion,
    #[error("frame buffer does not match its dimensions: {0}")]
    FrameLayout(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("encoding failed: {0}")]
pub struct EncodingError(pub String);

impl From<ffmpeg_next::Error> for EncodingError {
    fn from(e: ffmpeg_next::Error) -> Self {
        EncodingError(e.to_string())
    }
}

impl From<&str> for EncodingError {
    fn from(message: &str) -> Self {
        EncodingError(message.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("no video stream found")]
    NoVideoTrack,
    #[error("cannot open source: {0}")]
    Open(String),
    #[error("decoding failed: {0}")]
    Decode(String),
}

impl From<ffmpeg_next::Error> for SourceError {
    fn from(e: ffmpeg_next::Error) -> Self {
        SourceError::Decode(e.to_string())
    }
}

/// Fatal failure of an anonymization job.
#[derive(Error, Debug)]
pub enum AnonymizeError {
    #[error(transparent)]
    InputValidation(#[from] InputValidationError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("output file missing or truncated: {0}")]
    OutputVerification(PathBuf),
    #[error("cannot create scratch output: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
    #[error("pipeline already executed")]
    AlreadyExecuted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_wraps_transparently() {
        let err: AnonymizeError = InputValidationError::NoVideoTrack.into();
        assert_eq!(err.to_string(), "input has no video track");
        assert!(matches!(
            err,
            AnonymizeError::InputValidation(InputValidationError::NoVideoTrack)
        ));
    }

    #[test]
    fn test_invalid_dimensions_message() {
        let err = InputValidationError::InvalidDimensions {
            width: 0,
            height: 720,
            max: 10_000,
        };
        assert!(err.to_string().contains("0x720"));
    }

    #[test]
    fn test_encoding_error_from_ffmpeg() {
        let err: EncodingError = ffmpeg_next::Error::Eof.into();
        assert!(!err.0.is_empty());
    }

    #[test]
    fn test_detection_error_from_str() {
        let err: DetectionError = "model crashed".into();
        assert_eq!(err.to_string(), "face detection failed: model crashed");
    }
}
