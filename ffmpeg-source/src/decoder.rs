use ffmpeg_next::Rational;

use crate::{packet::RawPacket, stream::AvStream};

pub struct Decoder {
    stream: AvStream,
    inner: ffmpeg_next::codec::decoder::Video,
    decoder_time_base: Rational,
    hardware: bool,
}

unsafe impl Send for Decoder {}

impl Decoder {
    /// Opens a software decoder for `stream`.
    pub fn new(stream: &AvStream) -> anyhow::Result<Self> {
        Self::open(stream, None)
    }

    /// Opens a hardware decoder when one is available, otherwise software.
    pub fn new_preferring_hardware(stream: &AvStream) -> anyhow::Result<Self> {
        if let Some(codec) = crate::hw::find_hw_decoder(stream.codec_id()) {
            match Self::open(stream, Some(codec)) {
                Ok(decoder) => return Ok(decoder),
                Err(e) => log::warn!("hardware decoder unusable, using software: {:#}", e),
            }
        }
        Self::open(stream, None)
    }

    fn open(stream: &AvStream, codec: Option<ffmpeg_next::Codec>) -> anyhow::Result<Self> {
        if !stream.is_video() {
            return Err(anyhow::anyhow!("unsupported stream type"));
        }

        let mut decoder_ctx = ffmpeg_next::codec::Context::new();
        unsafe {
            (*decoder_ctx.as_mut_ptr()).time_base = stream.time_base().into();
        }
        decoder_ctx.set_parameters(stream.parameters().clone())?;

        let hardware = codec.is_some();
        let video_decoder = match codec {
            Some(codec) => decoder_ctx.decoder().open_as(codec)?.video()?,
            None => decoder_ctx.decoder().video()?,
        };
        let decoder_time_base = video_decoder.time_base();

        if video_decoder.format() == ffmpeg_next::format::Pixel::None
            || video_decoder.width() == 0
            || video_decoder.height() == 0
        {
            return Err(anyhow::anyhow!("missing codec parameters"));
        }

        Ok(Self {
            stream: stream.clone(),
            inner: video_decoder,
            decoder_time_base,
            hardware,
        })
    }

    pub fn send_packet(&mut self, mut packet: RawPacket) -> anyhow::Result<()> {
        let time_base = packet.time_base();
        let packet = packet.get_mut();
        packet.rescale_ts(time_base, self.decoder_time_base);
        self.inner.send_packet(packet)?;
        Ok(())
    }

    pub fn send_eof(&mut self) -> anyhow::Result<()> {
        self.inner.send_eof()?;
        Ok(())
    }

    /// Returns `Ok(None)` when the decoder needs more input or is drained.
    pub fn receive_frame(&mut self) -> anyhow::Result<Option<ffmpeg_next::frame::Video>> {
        let mut frame = ffmpeg_next::frame::Video::empty();
        match self.inner.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Drops buffered frames and clears the end-of-stream state.
    pub fn flush(&mut self) {
        self.inner.flush();
    }

    /// Presentation time of `frame` in microseconds.
    pub fn frame_time_us(&self, frame: &ffmpeg_next::frame::Video) -> i64 {
        frame
            .timestamp()
            .or_else(|| frame.pts())
            .map(|ts| crate::ts_to_us(ts, self.decoder_time_base))
            .unwrap_or(0)
    }

    pub fn stream_index(&self) -> usize {
        self.stream.index()
    }

    pub fn is_hardware(&self) -> bool {
        self.hardware
    }
}
