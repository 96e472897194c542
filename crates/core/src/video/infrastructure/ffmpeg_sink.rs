use std::path::{Path, PathBuf};

use ffmpeg_next::{Rational, Rescale};

use crate::shared::audio_sample::AudioSample;
use crate::shared::error::EncodingError;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;
use crate::shared::video_asset::{TimeBase, VideoAsset};
use crate::video::domain::frame_sink::FrameSink;

/// Largest time-base denominator the MPEG-4 Part 2 encoder accepts.
const MAX_MPEG4_TIME_BASE_DEN: i32 = 65_535;

const FALLBACK_FPS: i32 = 30;

/// Encodes frames to MPEG-4 and stream-copies the source's audio track.
///
/// Frame timestamps from the source are kept (rescaled to an exact coarser
/// time base if the encoder cannot use the source's). The source orientation
/// is written as the output track's display matrix.
pub struct FfmpegSink {
    output_path: Option<PathBuf>,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    source_time_base: Rational,
    encoder_time_base: Rational,
    ticks_per_frame: i64,
    last_pts: Option<i64>,
    video_stream_index: usize,
    audio_stream_index: Option<usize>,
    frames_written: usize,
}

// Safety: FfmpegSink is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSink {}

impl FfmpegSink {
    pub fn new() -> Self {
        Self {
            output_path: None,
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            source_time_base: Rational(1, FALLBACK_FPS),
            encoder_time_base: Rational(1, FALLBACK_FPS),
            ticks_per_frame: 1,
            last_pts: None,
            video_stream_index: 0,
            audio_stream_index: None,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Output pts for a frame, in encoder ticks, strictly after the last one.
    fn next_pts(&mut self, frame: &Frame) -> i64 {
        let candidate = match frame.pts() {
            Some(pts) if self.source_time_base == self.encoder_time_base => pts,
            Some(pts) => pts.rescale(self.source_time_base, self.encoder_time_base),
            None => frame.index() as i64 * self.ticks_per_frame,
        };
        let pts = match self.last_pts {
            Some(last) if candidate <= last => last + 1,
            _ => candidate,
        };
        self.last_pts = Some(pts);
        pts
    }

    fn drain_encoder(&mut self) -> Result<(), EncodingError> {
        let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) else {
            return Err("FfmpegSink: not opened".into());
        };
        let ost_time_base = octx
            .stream(self.video_stream_index)
            .ok_or("FfmpegSink: missing video stream")?
            .time_base();

        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.video_stream_index);
            encoded.rescale_ts(self.encoder_time_base, ost_time_base);
            encoded.write_interleaved(octx)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.octx = None;
        self.encoder = None;
        self.scaler = None;
        self.audio_stream_index = None;
        self.last_pts = None;
    }
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FfmpegSink {
    fn open(&mut self, path: &Path, asset: &VideoAsset) -> Result<(), EncodingError> {
        ffmpeg_next::init()?;

        self.width = asset.width;
        self.height = asset.height;
        self.output_path = Some(path.to_path_buf());
        self.frames_written = 0;
        self.last_pts = None;

        let fps = match asset.fps.round() as i32 {
            f if f > 0 => f,
            _ => FALLBACK_FPS,
        };
        self.source_time_base = to_rational(asset.time_base);
        self.encoder_time_base =
            encoder_time_base(asset.time_base, asset.fps).unwrap_or(Rational(1, fps));
        self.ticks_per_frame = (self.encoder_time_base.denominator() as i64
            / (self.encoder_time_base.numerator().max(1) as i64 * fps as i64))
            .max(1);

        let mut octx = ffmpeg_next::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        // MPEG4 as a widely available encoder
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;

        let mut ost = octx.add_stream(Some(codec))?;
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder_ctx.set_width(asset.width);
        encoder_ctx.set_height(asset.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(self.encoder_time_base);
        encoder_ctx.set_frame_rate(Some(Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        ost.set_time_base(self.encoder_time_base);
        if asset.orientation != Orientation::Up {
            attach_display_matrix(&mut ost, asset.orientation)?;
        }
        self.video_stream_index = ost.index();

        self.audio_stream_index = match (&asset.source_path, asset.has_audio) {
            (Some(source), true) => add_audio_stream(&mut octx, source)?,
            _ => None,
        };

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            asset.width,
            asset.height,
            ffmpeg_next::format::Pixel::YUV420P,
            asset.width,
            asset.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);

        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodingError> {
        if self.encoder.is_none() {
            return Err("FfmpegSink: not opened".into());
        }
        if frame.width() != self.width || frame.height() != self.height || frame.channels() != 3 {
            return Err(EncodingError(format!(
                "frame {} is {}x{}x{}, expected {}x{}x3",
                frame.index(),
                frame.width(),
                frame.height(),
                frame.channels(),
                self.width,
                self.height
            )));
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb_frame.stride(0);
        let row_bytes = self.width as usize * 3;
        let dst = rgb_frame.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_bytes).enumerate() {
            dst[row * stride..row * stride + row_bytes].copy_from_slice(src);
        }

        let pts = self.next_pts(frame);
        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&rgb_frame, &mut yuv_frame)?;
        }
        yuv_frame.set_pts(Some(pts));

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.send_frame(&yuv_frame)?;
        }
        self.drain_encoder()?;
        self.frames_written += 1;
        Ok(())
    }

    fn write_audio(&mut self, sample: &AudioSample) -> Result<(), EncodingError> {
        let octx = self.octx.as_mut().ok_or("FfmpegSink: not opened")?;
        let index = self
            .audio_stream_index
            .ok_or("FfmpegSink: output has no audio stream")?;
        let ost_time_base = octx
            .stream(index)
            .ok_or("FfmpegSink: missing audio stream")?
            .time_base();

        let mut packet = ffmpeg_next::Packet::copy(&sample.data);
        packet.set_pts(sample.pts);
        packet.set_dts(sample.dts);
        packet.set_duration(sample.duration);
        if sample.is_key {
            packet.set_flags(ffmpeg_next::codec::packet::Flags::KEY);
        }
        packet.set_stream(index);
        packet.set_position(-1);
        packet.rescale_ts(to_rational(sample.time_base), ost_time_base);
        packet.write_interleaved(octx)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodingError> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err("FfmpegSink: not opened".into());
        };
        encoder.send_eof()?;
        self.drain_encoder()?;
        if let Some(octx) = self.octx.as_mut() {
            octx.write_trailer()?;
        }
        log::debug!(
            "Finalized {} ({} frames)",
            self.output_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            self.frames_written
        );
        self.reset();
        Ok(())
    }

    fn abort(&mut self) {
        self.reset();
        if let Some(path) = self.output_path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("Removed partial output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove partial output {}: {e}", path.display()),
            }
        }
    }
}

fn to_rational(tb: TimeBase) -> Rational {
    Rational(tb.num, tb.den)
}

/// A time base the MPEG-4 encoder accepts that still represents the source
/// frame timestamps exactly.
///
/// The source time base itself when its denominator fits. Otherwise the
/// finest coarsening `num / (den / k)` whose factor `k` divides both the
/// denominator and the nominal frame duration in source ticks, so 1/90000 at
/// 29.97 fps becomes 1/30000. `None` when no such factor exists.
fn encoder_time_base(source: TimeBase, fps: f64) -> Option<Rational> {
    if source.num <= 0 || source.den <= 0 {
        return None;
    }
    if source.den <= MAX_MPEG4_TIME_BASE_DEN {
        return Some(to_rational(source));
    }

    let den = i64::from(source.den);
    let frame_ticks = if fps > 0.0 {
        (den as f64 / (f64::from(source.num) * fps)).round() as i64
    } else {
        0
    };
    let common = if frame_ticks > 0 { gcd(den, frame_ticks) } else { den };

    (2..=common)
        .filter(|k| common % k == 0)
        .find(|k| den / k <= i64::from(MAX_MPEG4_TIME_BASE_DEN))
        .map(|k| Rational(source.num, (den / k) as i32))
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

/// 3x3 display matrix (16.16 fixed point, last entry 2.30) that shows the
/// stored frame rotated clockwise by `orientation`.
pub(crate) fn display_matrix(orientation: Orientation) -> [i32; 9] {
    const ONE: i32 = 1 << 16;
    let (cos, sin) = match orientation {
        Orientation::Up => (ONE, 0),
        Orientation::Right => (0, ONE),
        Orientation::Down => (-ONE, 0),
        Orientation::Left => (0, -ONE),
    };
    [cos, sin, 0, -sin, cos, 0, 0, 0, 1 << 30]
}

/// Adds the orientation to the stream's coded side data, where the MP4
/// muxer reads the track matrix from. Must run after the codec parameters
/// are set and before the header is written.
pub(crate) fn attach_display_matrix(
    ost: &mut ffmpeg_next::format::stream::StreamMut<'_>,
    orientation: Orientation,
) -> Result<(), EncodingError> {
    let bytes: Vec<u8> = display_matrix(orientation)
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();

    unsafe {
        let par = (*ost.as_mut_ptr()).codecpar;
        if par.is_null() {
            return Err("FfmpegSink: stream has no codec parameters".into());
        }
        let side_data = ffmpeg_next::ffi::av_packet_side_data_new(
            &mut (*par).coded_side_data,
            &mut (*par).nb_coded_side_data,
            ffmpeg_next::ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
            bytes.len(),
            0,
        );
        if side_data.is_null() || (*side_data).data.is_null() {
            return Err("FfmpegSink: could not allocate display matrix".into());
        }
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), (*side_data).data, bytes.len());
    }
    Ok(())
}

/// Adds an output stream with the source's audio codec parameters for
/// stream copy. Returns its index, or `None` if the source has no audio.
fn add_audio_stream(
    octx: &mut ffmpeg_next::format::context::Output,
    source: &Path,
) -> Result<Option<usize>, EncodingError> {
    let ictx = ffmpeg_next::format::input(source)?;
    let Some(stream) = ictx.streams().best(ffmpeg_next::media::Type::Audio) else {
        return Ok(None);
    };

    let mut ost = octx.add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))?;
    ost.set_parameters(stream.parameters());
    ost.set_time_base(stream.time_base());
    unsafe {
        (*ost.parameters().as_mut_ptr()).codec_tag = 0;
    }
    Ok(Some(ost.index()))
}
