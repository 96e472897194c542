use std::path::Path;

use crate::shared::audio_sample::AudioSample;
use crate::shared::error::SourceError;
use crate::shared::video_asset::TimeBase;

/// Demuxes the best audio stream of a file into raw packets.
///
/// Owns its own input context so it can run on a different thread than the
/// video decoder reading the same file.
pub struct FfmpegAudioStream {
    ictx: ffmpeg_next::format::context::Input,
    stream_index: usize,
    time_base: TimeBase,
}

// Safety: the input context is owned exclusively by this stream and only
// touched from the thread currently iterating it.
unsafe impl Send for FfmpegAudioStream {}

impl FfmpegAudioStream {
    /// Opens `path` for audio. `Ok(None)` when the file has no audio stream.
    pub fn open(path: &Path) -> Result<Option<Self>, SourceError> {
        ffmpeg_next::init().map_err(|e| SourceError::Open(e.to_string()))?;
        let ictx = ffmpeg_next::format::input(path)
            .map_err(|e| SourceError::Open(format!("{}: {e}", path.display())))?;

        let Some(stream) = ictx.streams().best(ffmpeg_next::media::Type::Audio) else {
            return Ok(None);
        };
        let stream_index = stream.index();
        let tb = stream.time_base();
        let time_base = TimeBase::new(tb.numerator(), tb.denominator());

        Ok(Some(Self {
            ictx,
            stream_index,
            time_base,
        }))
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }
}

impl Iterator for FfmpegAudioStream {
    type Item = Result<AudioSample, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (stream, packet) = self.ictx.packets().next()?;
            if stream.index() != self.stream_index {
                continue;
            }
            return Some(Ok(AudioSample {
                data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                pts: packet.pts(),
                dts: packet.dts(),
                duration: packet.duration(),
                time_base: self.time_base,
                is_key: packet.is_key(),
            }));
        }
    }
}
