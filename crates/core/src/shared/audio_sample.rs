use super::video_asset::TimeBase;

/// One compressed audio packet copied verbatim from the source track.
///
/// Passthrough never decodes the payload: timestamps and bytes travel from
/// the source's audio stream to the sink unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSample {
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub time_base: TimeBase,
    pub is_key: bool,
}

impl AudioSample {
    /// Presentation time in seconds, when the packet carries one.
    pub fn presentation_secs(&self) -> Option<f64> {
        self.pts.map(|pts| self.time_base.seconds(pts))
    }
}
