use std::collections::HashMap;
use std::path::Path;

use crate::{packet::RawPacket, stream::AvStream};

pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: HashMap<usize, AvStream>,
}

unsafe impl Send for AvInput {}

impl AvInput {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let input = ffmpeg_next::format::input(&Path::new(url))
            .map_err(|e| anyhow::anyhow!("open input {}: {}", url, e))?;

        let mut streams = HashMap::new();
        for stream in input.streams() {
            streams.insert(stream.index(), AvStream::from(stream));
        }

        Ok(Self {
            inner: input,
            streams,
        })
    }

    pub fn streams(&self) -> &HashMap<usize, AvStream> {
        &self.streams
    }

    /// The stream FFmpeg considers the best video track.
    pub fn best_video(&self) -> anyhow::Result<AvStream> {
        let index = self
            .inner
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .map(|s| s.index())
            .ok_or_else(|| anyhow::anyhow!("no video track"))?;
        self.streams
            .get(&index)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("stream {} not found", index))
    }

    /// Container duration in microseconds, falling back to the stream duration.
    pub fn duration_us(&self, stream: &AvStream) -> i64 {
        let d = self.inner.duration();
        if d != ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 && d > 0 {
            // AV_TIME_BASE = 1_000_000
            return d;
        }
        stream.duration_us().unwrap_or(0)
    }

    pub fn read_packet(&mut self) -> Option<RawPacket> {
        self.inner
            .packets()
            .next()
            .map(|(stream, packet)| (packet, stream.time_base()).into())
    }

    /// Seeks to the last key frame at or before `position_us`.
    pub fn seek_us(&mut self, position_us: i64) -> anyhow::Result<()> {
        let target = position_us.max(0);
        self.inner
            .seek(target, ..target)
            .map_err(|e| anyhow::anyhow!("seek to {}us: {}", target, e))
    }
}
