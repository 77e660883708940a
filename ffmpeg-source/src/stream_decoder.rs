use ffmpeg_next::format::Pixel;

use crate::{
    decoder::Decoder,
    frame::{YuvPicture, yuv_picture},
    input::AvInput,
    scaler::Scaler,
};

/// Result of one [`StreamDecoder::pull`] step.
pub enum StreamEvent {
    Picture(YuvPicture),
    /// Input was consumed but no picture is ready yet.
    Pending,
    EndOfStream,
}

/// Sequential demux/decode loop over the best video track.
pub struct StreamDecoder {
    input: AvInput,
    decoder: Decoder,
    scaler: Scaler,
    duration_us: i64,
    input_done: bool,
}

impl StreamDecoder {
    pub fn open(url: &str, prefer_hardware: bool) -> anyhow::Result<Self> {
        let input = AvInput::new(url)?;
        let stream = input.best_video()?;
        let decoder = if prefer_hardware {
            Decoder::new_preferring_hardware(&stream)?
        } else {
            Decoder::new(&stream)?
        };
        let duration_us = input.duration_us(&stream);
        log::info!(
            "stream decoder: {} {}x{} @ {:.2}fps, {} decoder",
            url,
            stream.width(),
            stream.height(),
            stream.fps(),
            if decoder.is_hardware() { "hardware" } else { "software" }
        );
        Ok(Self {
            input,
            decoder,
            scaler: Scaler::new(Pixel::YUV420P),
            duration_us,
            input_done: false,
        })
    }

    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    /// Drains one ready picture, or feeds at most one packet and tries again.
    pub fn pull(&mut self) -> anyhow::Result<StreamEvent> {
        if let Some(event) = self.drain_one()? {
            return Ok(event);
        }
        if self.input_done {
            return Ok(StreamEvent::EndOfStream);
        }

        match self.input.read_packet() {
            Some(packet) if packet.index() == self.decoder.stream_index() => {
                self.decoder.send_packet(packet)?;
            }
            Some(_) => return Ok(StreamEvent::Pending),
            None => {
                self.decoder.send_eof()?;
                self.input_done = true;
            }
        }

        Ok(self.drain_one()?.unwrap_or(StreamEvent::Pending))
    }

    /// Seeks back to the sync point at time zero and resets the decoder.
    pub fn rewind(&mut self) -> anyhow::Result<()> {
        self.input.seek_us(0)?;
        self.decoder.flush();
        self.input_done = false;
        Ok(())
    }

    fn drain_one(&mut self) -> anyhow::Result<Option<StreamEvent>> {
        match self.decoder.receive_frame()? {
            Some(frame) => {
                let pts_us = self.decoder.frame_time_us(&frame);
                let picture = yuv_picture(&frame, pts_us, &mut self.scaler)?;
                Ok(Some(StreamEvent::Picture(picture)))
            }
            None => Ok(None),
        }
    }
}
