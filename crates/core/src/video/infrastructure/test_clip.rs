//! Synthetic MPEG-4 clips for ffmpeg-backed tests.

use std::path::Path;

use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::{Pixel, Sample};
use ffmpeg_next::{codec, encoder, format, software, ChannelLayout, Packet, Rational};

use crate::shared::orientation::Orientation;
use crate::video::infrastructure::ffmpeg_sink::attach_display_matrix;

const AUDIO_RATE: i32 = 48_000;

#[derive(Clone, Debug)]
pub struct TestClip {
    pub frames: usize,
    pub width: u32,
    pub height: u32,
    pub fps: i32,
    pub audio: bool,
    pub orientation: Orientation,
}

impl TestClip {
    pub fn new(frames: usize, width: u32, height: u32) -> Self {
        Self {
            frames,
            width,
            height,
            fps: 30,
            audio: false,
            orientation: Orientation::Up,
        }
    }

    pub fn with_audio(mut self) -> Self {
        self.audio = true;
        self
    }

    /// Stores a display matrix so players show the clip rotated.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_fps(mut self, fps: i32) -> Self {
        self.fps = fps;
        self
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.fps as f64
    }
}

/// Gray level of frame `i` in a synthetic clip.
pub fn frame_value(i: usize) -> u8 {
    ((i * 40) % 256) as u8
}

/// Writes an MPEG-4 clip of flat gray frames, plus a mono AAC tone track
/// covering the same duration when `clip.audio` is set.
pub fn create_test_video(path: &Path, clip: &TestClip) {
    ffmpeg_next::init().unwrap();
    let mut octx = format::output(path).unwrap();
    let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

    let video_codec = encoder::find(codec::Id::MPEG4).unwrap();
    let mut vost = octx.add_stream(Some(video_codec)).unwrap();
    let video_index = vost.index();
    let mut venc = codec::context::Context::new_with_codec(video_codec)
        .encoder()
        .video()
        .unwrap();
    venc.set_width(clip.width);
    venc.set_height(clip.height);
    venc.set_format(Pixel::YUV420P);
    venc.set_time_base(Rational(1, clip.fps));
    venc.set_frame_rate(Some(Rational(clip.fps, 1)));
    if global_header {
        venc.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut venc = venc.open_with(ffmpeg_next::Dictionary::new()).unwrap();
    vost.set_parameters(&venc);
    if clip.orientation != Orientation::Up {
        attach_display_matrix(&mut vost, clip.orientation).unwrap();
    }

    let mut audio = if clip.audio {
        let audio_codec = encoder::find(codec::Id::AAC).unwrap();
        let mut aost = octx.add_stream(Some(audio_codec)).unwrap();
        let audio_index = aost.index();
        let mut aenc = codec::context::Context::new_with_codec(audio_codec)
            .encoder()
            .audio()
            .unwrap();
        aenc.set_rate(AUDIO_RATE);
        aenc.set_channel_layout(ChannelLayout::MONO);
        aenc.set_format(Sample::F32(SampleType::Planar));
        aenc.set_time_base(Rational(1, AUDIO_RATE));
        if global_header {
            aenc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let aenc = aenc.open_as(audio_codec).unwrap();
        aost.set_parameters(&aenc);
        Some((aenc, audio_index))
    } else {
        None
    };

    octx.write_header().unwrap();

    let mut scaler = software::scaling::Context::get(
        Pixel::RGB24,
        clip.width,
        clip.height,
        Pixel::YUV420P,
        clip.width,
        clip.height,
        software::scaling::Flags::BILINEAR,
    )
    .unwrap();

    let video_tb = Rational(1, clip.fps);
    for i in 0..clip.frames {
        let mut rgb = ffmpeg_next::util::frame::video::Video::new(
            Pixel::RGB24,
            clip.width,
            clip.height,
        );
        let stride = rgb.stride(0);
        let data = rgb.data_mut(0);
        for row in 0..clip.height as usize {
            data[row * stride..row * stride + clip.width as usize * 3].fill(frame_value(i));
        }
        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb, &mut yuv).unwrap();
        yuv.set_pts(Some(i as i64));
        venc.send_frame(&yuv).unwrap();
        drain(&mut venc, &mut octx, video_index, video_tb);
    }
    venc.send_eof().unwrap();
    drain(&mut venc, &mut octx, video_index, video_tb);

    if let Some((ref mut aenc, audio_index)) = audio {
        let frame_size = match aenc.frame_size() {
            0 => 1024,
            n => n as usize,
        };
        let total = (clip.duration_secs() * AUDIO_RATE as f64) as usize;
        let audio_tb = Rational(1, AUDIO_RATE);
        let mut written = 0usize;
        while written < total {
            let n = frame_size.min(total - written);
            let mut frame = ffmpeg_next::util::frame::audio::Audio::new(
                Sample::F32(SampleType::Planar),
                n,
                ChannelLayout::MONO,
            );
            frame.set_rate(AUDIO_RATE as u32);
            frame.set_pts(Some(written as i64));
            let plane = frame.data_mut(0);
            for (k, bytes) in plane.chunks_exact_mut(4).take(n).enumerate() {
                let t = (written + k) as f32 / AUDIO_RATE as f32;
                let v = (t * 440.0 * std::f32::consts::TAU).sin() * 0.2;
                bytes.copy_from_slice(&v.to_le_bytes());
            }
            aenc.send_frame(&frame).unwrap();
            drain(aenc, &mut octx, audio_index, audio_tb);
            written += n;
        }
        aenc.send_eof().unwrap();
        drain(aenc, &mut octx, audio_index, audio_tb);
    }

    octx.write_trailer().unwrap();
}

fn drain<E>(enc: &mut E, octx: &mut format::context::Output, index: usize, enc_tb: Rational)
where
    E: std::ops::DerefMut<Target = encoder::Encoder>,
{
    let ost_tb = octx.stream(index).unwrap().time_base();
    let mut packet = Packet::empty();
    while enc.receive_packet(&mut packet).is_ok() {
        packet.set_stream(index);
        packet.rescale_ts(enc_tb, ost_tb);
        packet.write_interleaved(octx).unwrap();
    }
}
