//! Scripted backends for exercising the engine and pipeline without media files.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use ffmpeg_source::frame::{Plane, YuvPicture};
use image::{Rgba, RgbaImage};

use super::{MediaOpener, SeekBackend, StreamBackend, StreamPull};

pub const FRAME_WIDTH: u32 = 8;
pub const FRAME_HEIGHT: u32 = 4;

/// Gray 4:2:0 picture with tightly packed planes.
pub fn gray_picture(width: u32, height: u32, luma: u8, pts_us: i64) -> YuvPicture {
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    YuvPicture {
        width,
        height,
        pts_us,
        y: Plane {
            data: Bytes::from(vec![luma; w * h]),
            row_stride: w,
            pixel_stride: 1,
        },
        u: Plane {
            data: Bytes::from(vec![128; cw * ch]),
            row_stride: cw,
            pixel_stride: 1,
        },
        v: Plane {
            data: Bytes::from(vec![128; cw * ch]),
            row_stride: cw,
            pixel_stride: 1,
        },
    }
}

#[derive(Default)]
pub struct Calls {
    pub seek_positions: Mutex<Vec<i64>>,
    pub seek_opens: AtomicUsize,
    pub stream_opens: AtomicUsize,
    pub pulls: AtomicUsize,
    pub rewinds: AtomicUsize,
}

impl Calls {
    pub fn positions(&self) -> Vec<i64> {
        self.seek_positions.lock().unwrap().clone()
    }
}

struct FakeSeek {
    duration_us: i64,
    calls: Arc<Calls>,
}

impl SeekBackend for FakeSeek {
    fn duration_us(&self) -> i64 {
        self.duration_us
    }

    fn frame_at(&mut self, position_us: i64) -> anyhow::Result<Option<RgbaImage>> {
        self.calls.seek_positions.lock().unwrap().push(position_us);
        Ok(Some(RgbaImage::from_pixel(
            FRAME_WIDTH,
            FRAME_HEIGHT,
            Rgba([0, 0, 255, 255]),
        )))
    }
}

struct FakeStream {
    duration_us: i64,
    rewind_fails: bool,
    script: Arc<Mutex<VecDeque<StreamPull>>>,
    calls: Arc<Calls>,
}

impl StreamBackend for FakeStream {
    fn duration_us(&self) -> i64 {
        self.duration_us
    }

    fn pull(&mut self) -> anyhow::Result<StreamPull> {
        self.calls.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StreamPull::Pending))
    }

    fn rewind(&mut self) -> anyhow::Result<()> {
        self.calls.rewinds.fetch_add(1, Ordering::SeqCst);
        if self.rewind_fails {
            anyhow::bail!("seek to sync point failed");
        }
        Ok(())
    }
}

/// Opener whose backends follow a script. An exhausted stream script keeps
/// answering `Pending`.
pub struct FakeOpener {
    pub duration_us: i64,
    pub seek_fails: bool,
    pub stream_fails: bool,
    pub rewind_fails: bool,
    pub script: Arc<Mutex<VecDeque<StreamPull>>>,
    pub calls: Arc<Calls>,
}

impl FakeOpener {
    pub fn new(duration_us: i64) -> Self {
        Self {
            duration_us,
            seek_fails: false,
            stream_fails: false,
            rewind_fails: false,
            script: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn push(&self, pull: StreamPull) {
        self.script.lock().unwrap().push_back(pull);
    }
}

impl MediaOpener for FakeOpener {
    fn open_seek(&self, locator: &str) -> anyhow::Result<Box<dyn SeekBackend>> {
        self.calls.seek_opens.fetch_add(1, Ordering::SeqCst);
        if self.seek_fails {
            anyhow::bail!("cannot read {}", locator);
        }
        Ok(Box::new(FakeSeek {
            duration_us: self.duration_us,
            calls: self.calls.clone(),
        }))
    }

    fn open_stream(&self, locator: &str, _hardware: bool) -> anyhow::Result<Box<dyn StreamBackend>> {
        self.calls.stream_opens.fetch_add(1, Ordering::SeqCst);
        if self.stream_fails {
            anyhow::bail!("no video track in {}", locator);
        }
        Ok(Box::new(FakeStream {
            duration_us: self.duration_us,
            rewind_fails: self.rewind_fails,
            script: self.script.clone(),
            calls: self.calls.clone(),
        }))
    }
}
