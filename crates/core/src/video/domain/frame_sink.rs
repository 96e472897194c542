use std::path::Path;

use crate::shared::audio_sample::AudioSample;
use crate::shared::error::EncodingError;
use crate::shared::frame::Frame;
use crate::shared::video_asset::VideoAsset;

/// Encodes processed frames and passthrough audio into one output file.
///
/// Frames are stored as decoded; the asset's orientation is written to the
/// output track's metadata instead of being applied to the pixels. Each
/// write goes straight to the container, nothing is buffered for later.
pub trait FrameSink: Send {
    fn open(&mut self, path: &Path, asset: &VideoAsset) -> Result<(), EncodingError>;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodingError>;

    fn write_audio(&mut self, sample: &AudioSample) -> Result<(), EncodingError>;

    /// Flushes the encoder and seals the container. Called once, after both
    /// the video and audio streams have finished.
    fn finish(&mut self) -> Result<(), EncodingError>;

    /// Drops any encoder state and deletes the partially written file.
    fn abort(&mut self);
}
