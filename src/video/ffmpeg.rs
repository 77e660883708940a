//! Backends over the `ffmpeg-source` crate.

use ffmpeg_source::frame::RgbaPicture;
use ffmpeg_source::retriever::FrameRetriever;
use ffmpeg_source::stream_decoder::{StreamDecoder, StreamEvent};
use image::RgbaImage;

use super::{MediaOpener, SeekBackend, StreamBackend, StreamPull};

/// Opens video files through FFmpeg. `ffmpeg_source::init` must have run.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegOpener;

impl MediaOpener for FfmpegOpener {
    fn open_seek(&self, locator: &str) -> anyhow::Result<Box<dyn SeekBackend>> {
        Ok(Box::new(FfmpegSeek(FrameRetriever::open(locator)?)))
    }

    fn open_stream(&self, locator: &str, hardware: bool) -> anyhow::Result<Box<dyn StreamBackend>> {
        Ok(Box::new(FfmpegStream(StreamDecoder::open(locator, hardware)?)))
    }
}

struct FfmpegSeek(FrameRetriever);

impl SeekBackend for FfmpegSeek {
    fn duration_us(&self) -> i64 {
        self.0.duration_us()
    }

    fn frame_at(&mut self, position_us: i64) -> anyhow::Result<Option<RgbaImage>> {
        self.0.frame_at(position_us)?.map(into_image).transpose()
    }
}

struct FfmpegStream(StreamDecoder);

impl StreamBackend for FfmpegStream {
    fn duration_us(&self) -> i64 {
        self.0.duration_us()
    }

    fn pull(&mut self) -> anyhow::Result<StreamPull> {
        Ok(match self.0.pull()? {
            StreamEvent::Picture(picture) => StreamPull::Picture(picture),
            StreamEvent::Pending => StreamPull::Pending,
            StreamEvent::EndOfStream => StreamPull::EndOfStream,
        })
    }

    fn rewind(&mut self) -> anyhow::Result<()> {
        self.0.rewind()
    }
}

fn into_image(picture: RgbaPicture) -> anyhow::Result<RgbaImage> {
    let (width, height) = (picture.width, picture.height);
    RgbaImage::from_raw(width, height, picture.data)
        .ok_or_else(|| anyhow::anyhow!("rgba buffer does not match {}x{}", width, height))
}
