pub mod ffmpeg_audio_stream;
pub mod ffmpeg_sink;
pub mod ffmpeg_source;

#[cfg(test)]
pub(crate) mod test_clip;
