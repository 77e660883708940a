//! Video decode engine.
//!
//! ```text
//! Uninitialized ──start()──► FastSeek
//!       ▲            └─────► Stream(Ready ⇄ Draining) ──EOS──► rewind ──► Ready
//!       └──────────── release()
//! ```
//!
//! The engine is not reentrant: callers serialize `next_frame` themselves.

use std::sync::Arc;

use anyhow::Context as _;
use ffmpeg_source::frame::YuvPicture;
use image::RgbaImage;

use crate::config::DecodeStrategy;
use crate::media::convert::{nv21_to_rgba, planar_to_nv21};
use crate::media::types::Size;

pub mod ffmpeg;
#[cfg(test)]
pub(crate) mod fake;

pub const MIN_SEEK_STEP_US: i64 = 15_000;
pub const DEFAULT_SEEK_STEP_US: i64 = 33_000;

/// Pulls made by one stream-decode `next_frame` call before it falls back
/// to a single fast-seek fetch. Keeps painter loops from stalling on a
/// decoder that is starved or stuck.
pub const STREAM_ATTEMPT_BUDGET: usize = 8;

/// Random-access frame extraction.
pub trait SeekBackend: Send {
    fn duration_us(&self) -> i64;

    /// Closest frame to `position_us`.
    fn frame_at(&mut self, position_us: i64) -> anyhow::Result<Option<RgbaImage>>;
}

pub enum StreamPull {
    Picture(YuvPicture),
    Pending,
    EndOfStream,
}

/// Sequential demux/decode.
pub trait StreamBackend: Send {
    fn duration_us(&self) -> i64;

    fn pull(&mut self) -> anyhow::Result<StreamPull>;

    /// Back to the sync point at time zero with a clean decoder.
    fn rewind(&mut self) -> anyhow::Result<()>;
}

/// Opens backends for a locator.
pub trait MediaOpener: Send + Sync {
    fn open_seek(&self, locator: &str) -> anyhow::Result<Box<dyn SeekBackend>>;

    fn open_stream(&self, locator: &str, hardware: bool) -> anyhow::Result<Box<dyn StreamBackend>>;
}

/// Sampling position for fast-seek playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeekCursor {
    duration_us: i64,
    step_us: i64,
    position_us: i64,
}

impl SeekCursor {
    pub fn new(duration_us: i64, fps: u32) -> Self {
        Self {
            duration_us: duration_us.max(0),
            step_us: Self::step_for_fps(fps),
            position_us: 0,
        }
    }

    /// `1_000_000 / fps` microseconds, never below [`MIN_SEEK_STEP_US`].
    pub fn step_for_fps(fps: u32) -> i64 {
        if fps == 0 {
            return DEFAULT_SEEK_STEP_US;
        }
        (1_000_000 / fps as i64).max(MIN_SEEK_STEP_US)
    }

    pub fn position_us(&self) -> i64 {
        self.position_us
    }

    pub fn step_us(&self) -> i64 {
        self.step_us
    }

    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    /// Returns the position to sample, then moves one step ahead, wrapping
    /// to zero once the end of the source is reached. An unknown (zero)
    /// duration never wraps.
    pub fn advance(&mut self) -> i64 {
        let at = self.position_us;
        self.position_us += self.step_us;
        if self.duration_us > 0 && self.position_us >= self.duration_us {
            self.position_us = 0;
        }
        at
    }

    pub fn sync_to(&mut self, position_us: i64) {
        self.position_us = match self.duration_us {
            0 => position_us.max(0),
            duration => position_us.clamp(0, duration),
        };
    }

    pub fn reset(&mut self) {
        self.position_us = 0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    /// Waiting to feed input.
    Ready,
    /// Input fed, output not yet available.
    Draining,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineMode {
    Uninitialized,
    FastSeek,
    Stream(StreamPhase),
}

enum EngineState {
    Uninitialized,
    FastSeek {
        backend: Box<dyn SeekBackend>,
        cursor: SeekCursor,
    },
    Stream {
        backend: Box<dyn StreamBackend>,
        cursor: SeekCursor,
        phase: StreamPhase,
        /// Opened on the first stall.
        fallback: Option<Box<dyn SeekBackend>>,
    },
}

/// Decode state for one video source.
pub struct VideoDecodeEngine {
    opener: Arc<dyn MediaOpener>,
    locator: String,
    strategy: DecodeStrategy,
    fps: u32,
    hardware: bool,
    state: EngineState,
}

impl VideoDecodeEngine {
    pub fn new(
        opener: Arc<dyn MediaOpener>,
        locator: impl Into<String>,
        strategy: DecodeStrategy,
        fps: u32,
        hardware: bool,
    ) -> Self {
        Self {
            opener,
            locator: locator.into(),
            strategy,
            fps,
            hardware,
            state: EngineState::Uninitialized,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn mode(&self) -> EngineMode {
        match &self.state {
            EngineState::Uninitialized => EngineMode::Uninitialized,
            EngineState::FastSeek { .. } => EngineMode::FastSeek,
            EngineState::Stream { phase, .. } => EngineMode::Stream(*phase),
        }
    }

    pub fn position_us(&self) -> Option<i64> {
        match &self.state {
            EngineState::Uninitialized => None,
            EngineState::FastSeek { cursor, .. } | EngineState::Stream { cursor, .. } => {
                Some(cursor.position_us())
            }
        }
    }

    /// Opens the preferred backend. Stream decode falls back to fast seek
    /// when it cannot be set up; fast seek failing means the source is unusable.
    pub fn start(&mut self) -> anyhow::Result<()> {
        self.release();

        if self.strategy == DecodeStrategy::StreamDecode {
            match self.opener.open_stream(&self.locator, self.hardware) {
                Ok(backend) => {
                    let cursor = SeekCursor::new(backend.duration_us(), self.fps);
                    log::info!(
                        "video {}: stream decode, duration {}us",
                        self.locator,
                        cursor.duration_us()
                    );
                    self.state = EngineState::Stream {
                        backend,
                        cursor,
                        phase: StreamPhase::Ready,
                        fallback: None,
                    };
                    return Ok(());
                }
                Err(e) => log::info!(
                    "video {}: stream decode unavailable, using fast seek: {:#}",
                    self.locator,
                    e
                ),
            }
        }

        let backend = self
            .opener
            .open_seek(&self.locator)
            .with_context(|| format!("open {}", self.locator))?;
        let cursor = SeekCursor::new(backend.duration_us(), self.fps);
        log::info!(
            "video {}: fast seek, duration {}us, step {}us",
            self.locator,
            cursor.duration_us(),
            cursor.step_us()
        );
        self.state = EngineState::FastSeek { backend, cursor };
        Ok(())
    }

    /// Next frame of looping playback. `Ok(None)` before `start` or after `release`.
    pub fn next_frame(&mut self) -> anyhow::Result<Option<RgbaImage>> {
        let Self {
            opener,
            locator,
            state,
            ..
        } = self;

        match state {
            EngineState::Uninitialized => Ok(None),
            EngineState::FastSeek { backend, cursor } => backend.frame_at(cursor.advance()),
            EngineState::Stream {
                backend,
                cursor,
                phase,
                fallback,
            } => {
                for _ in 0..STREAM_ATTEMPT_BUDGET {
                    match backend.pull() {
                        Ok(StreamPull::Picture(picture)) => {
                            *phase = StreamPhase::Ready;
                            cursor.sync_to(picture.pts_us);
                            if let Some(frame) = picture_to_rgba(&picture) {
                                return Ok(Some(frame));
                            }
                        }
                        Ok(StreamPull::Pending) => *phase = StreamPhase::Draining,
                        Ok(StreamPull::EndOfStream) => {
                            if let Err(e) = backend.rewind() {
                                log::warn!("video {}: rewind failed: {:#}", locator, e);
                                break;
                            }
                            *phase = StreamPhase::Ready;
                            cursor.reset();
                            log::debug!("video {}: looped", locator);
                        }
                        Err(e) => {
                            log::warn!("video {}: stream pull failed: {:#}", locator, e);
                            break;
                        }
                    }
                }

                log::debug!(
                    "video {}: no picture after {} pulls, fetching by seek",
                    locator,
                    STREAM_ATTEMPT_BUDGET
                );
                if fallback.is_none() {
                    *fallback = Some(opener.open_seek(locator)?);
                }
                match fallback.as_mut() {
                    Some(seek) => seek.frame_at(cursor.advance()),
                    None => Ok(None),
                }
            }
        }
    }

    /// Drops all decoder resources. Safe to call in any state, any number of times.
    pub fn release(&mut self) {
        if !matches!(self.state, EngineState::Uninitialized) {
            log::debug!("video {}: released", self.locator);
        }
        self.state = EngineState::Uninitialized;
    }
}

impl Drop for VideoDecodeEngine {
    fn drop(&mut self) {
        self.release();
    }
}

fn picture_to_rgba(picture: &YuvPicture) -> Option<RgbaImage> {
    let nv21 = planar_to_nv21(picture);
    nv21_to_rgba(&nv21, Size::new(picture.width, picture.height))
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
