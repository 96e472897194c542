use std::path::Path;

use crate::shared::audio_sample::AudioSample;
use crate::shared::error::SourceError;
use crate::shared::frame::Frame;
use crate::shared::video_asset::VideoAsset;

/// Demuxes an input video into decoded frames plus a raw audio stream.
///
/// Implementations handle codec and container details while the pipeline
/// works with the abstract `Frame`, `AudioSample` and `VideoAsset` types.
pub trait FrameSource: Send {
    /// Opens the file and returns its properties.
    fn open(&mut self, path: &Path) -> Result<VideoAsset, SourceError>;

    /// Decoded frames in presentation order, each carrying its source
    /// timestamp.
    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, SourceError>> + '_>;

    /// A second, independent reader over the audio track, so audio can be
    /// pulled concurrently with `frames`. `None` when the asset has no audio.
    fn open_audio(&self) -> Result<Option<Box<dyn AudioStream>>, SourceError>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}

/// Raw audio packets in demux order, never decoded.
pub trait AudioStream: Iterator<Item = Result<AudioSample, SourceError>> + Send {}

impl<T> AudioStream for T where T: Iterator<Item = Result<AudioSample, SourceError>> + Send {}
