//! Synchronous FFmpeg helpers for pulling still frames out of video files.
//!
//! Two access styles are provided: [`retriever::FrameRetriever`] seeks to an
//! arbitrary timestamp and returns the closest decoded picture as RGBA, and
//! [`stream_decoder::StreamDecoder`] runs a continuous demux/decode loop that
//! hands out planar YUV pictures with their strides.

/// Registers FFmpeg components. Call once at startup.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod decoder;
pub mod frame;
pub mod hw;
pub mod input;
pub mod metadata;
pub mod packet;
pub mod retriever;
pub mod scaler;
pub mod stream;
pub mod stream_decoder;

/// Converts a timestamp in `time_base` units to microseconds.
pub fn ts_to_us(ts: i64, time_base: ffmpeg_next::Rational) -> i64 {
    let num = time_base.numerator() as i128;
    let den = time_base.denominator() as i128;
    if den == 0 {
        return 0;
    }
    (ts as i128 * num * 1_000_000 / den) as i64
}
