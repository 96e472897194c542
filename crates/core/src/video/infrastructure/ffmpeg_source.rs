use std::path::{Path, PathBuf};

use crate::shared::error::SourceError;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;
use crate::shared::video_asset::{TimeBase, VideoAsset};
use crate::video::domain::frame_source::{AudioStream, FrameSource};

use super::ffmpeg_audio_stream::FfmpegAudioStream;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`] that
/// keeps the decoder's timestamp. Audio is not touched here; `open_audio`
/// hands out a separate demuxer for it.
pub struct FfmpegSource {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
    asset: Option<VideoAsset>,
}

// Safety: FfmpegSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
            asset: None,
        }
    }

    fn source_path(&self) -> Option<&PathBuf> {
        self.asset.as_ref().and_then(|a| a.source_path.as_ref())
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegSource {
    fn open(&mut self, path: &Path) -> Result<VideoAsset, SourceError> {
        ffmpeg_next::init().map_err(|e| SourceError::Open(e.to_string()))?;

        let ictx = ffmpeg_next::format::input(path)
            .map_err(|e| SourceError::Open(format!("{}: {e}", path.display())))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(SourceError::NoVideoTrack)?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let tb = stream.time_base();
        let time_base = TimeBase::new(tb.numerator(), tb.denominator());

        let duration_secs = if ictx.duration() > 0 {
            ictx.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
        } else {
            time_base.seconds(stream.duration().max(0))
        };
        let total_frames = match stream.frames() {
            n if n > 0 => n as usize,
            _ => (duration_secs * fps).round() as usize,
        };

        let asset = VideoAsset {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            time_base,
            duration_secs,
            total_frames,
            orientation: Orientation::from_degrees(extract_rotation(&stream)),
            has_audio: ictx.streams().best(ffmpeg_next::media::Type::Audio).is_some(),
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        log::debug!(
            "Opened {}: {}x{} @ {:.2} fps, {:?}, audio={}",
            path.display(),
            asset.width,
            asset.height,
            asset.fps,
            asset.orientation,
            asset.has_audio
        );

        self.video_stream_index = video_stream_index;
        self.asset = Some(asset.clone());
        self.input_ctx = Some(ictx);

        Ok(asset)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, SourceError>> + '_> {
        let video_stream_index = self.video_stream_index;
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err(SourceError::Open(
                "FfmpegSource: not opened".into(),
            ))));
        };

        match FrameDecoder::new(ictx, video_stream_index) {
            Ok(decoder) => Box::new(FfmpegFrameIter {
                ictx,
                decoder,
                video_stream_index,
                frame_index: 0,
                flushing: false,
                done: false,
            }),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn open_audio(&self) -> Result<Option<Box<dyn AudioStream>>, SourceError> {
        let has_audio = self.asset.as_ref().is_some_and(|a| a.has_audio);
        let Some(path) = self.source_path().filter(|_| has_audio) else {
            return Ok(None);
        };
        let stream = FfmpegAudioStream::open(path)?;
        Ok(stream.map(|s| Box::new(s) as Box<dyn AudioStream>))
    }

    fn close(&mut self) {
        self.input_ctx = None;
        self.asset = None;
    }
}

/// Decoder plus RGB24 converter for the selected video stream.
struct FrameDecoder {
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
}

impl FrameDecoder {
    fn new(
        ictx: &ffmpeg_next::format::context::Input,
        video_stream_index: usize,
    ) -> Result<Self, SourceError> {
        let stream = ictx
            .stream(video_stream_index)
            .ok_or(SourceError::NoVideoTrack)?;
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            decoder,
            scaler,
            width,
            height,
        })
    }
}

/// Lazy iterator that decodes video frames one at a time, avoiding the need
/// to buffer the entire video in memory.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: FrameDecoder,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, SourceError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.decoder.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(e.into()));
        }

        let (width, height) = (self.decoder.width, self.decoder.height);
        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index)
            .with_pts(decoded.timestamp().or(decoded.pts()));
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if let Err(e) = self.decoder.decoder.send_packet(&packet) {
                log::warn!("Skipping undecodable video packet: {e}");
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Clockwise rotation, in degrees, needed to display the stream upright.
///
/// Tries the codec parameters' coded side data, then the stream side data
/// (DisplayMatrix), then falls back to the `"rotate"` metadata tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    if let Some(angle) = coded_display_matrix(stream).and_then(|m| parse_display_matrix(&m)) {
        return angle;
    }

    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return angle;
            }
        }
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0)
}

fn coded_display_matrix(stream: &ffmpeg_next::format::stream::Stream) -> Option<Vec<u8>> {
    unsafe {
        let par = (*stream.as_ptr()).codecpar;
        if par.is_null() {
            return None;
        }
        let side_data = ffmpeg_next::ffi::av_packet_side_data_get(
            (*par).coded_side_data,
            (*par).nb_coded_side_data,
            ffmpeg_next::ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
        );
        if side_data.is_null() || (*side_data).data.is_null() {
            return None;
        }
        Some(std::slice::from_raw_parts((*side_data).data, (*side_data).size).to_vec())
    }
}

/// Parses a 3x3 display matrix (9 x i32, 16.16 fixed-point, little-endian)
/// into the clockwise rotation it applies.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }

    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m01 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;
    if m00 == 0.0 && m01 == 0.0 {
        return None;
    }

    Some(m01.atan2(m00).to_degrees().round() as i32)
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
