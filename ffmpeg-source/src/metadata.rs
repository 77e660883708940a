//! Media file metadata, in the spirit of ffprobe.

use std::fmt;

use crate::input::AvInput;

/// Summary of the video track of a file.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    /// Duration in microseconds; 0 if unknown.
    pub duration_us: i64,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    /// Codec name, e.g. "h264"
    pub codec_name: String,
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "codec_name={}", self.codec_name)?;
        writeln!(f, "width={}", self.width)?;
        writeln!(f, "height={}", self.height)?;
        writeln!(f, "fps={:.3}", self.fps)?;
        write!(f, "duration_sec={:.3}", self.duration_us as f64 / 1_000_000.0)
    }
}

/// Opens a file and describes its best video track.
pub fn probe(path: &str) -> anyhow::Result<VideoInfo> {
    let input = AvInput::new(path)?;
    let stream = input.best_video()?;
    Ok(VideoInfo {
        duration_us: input.duration_us(&stream),
        width: stream.width(),
        height: stream.height(),
        fps: stream.fps(),
        codec_name: format!("{:?}", stream.codec_id()).to_lowercase(),
    })
}
