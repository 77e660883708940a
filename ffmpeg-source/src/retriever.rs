use ffmpeg_next::format::Pixel;

use crate::{
    decoder::Decoder,
    frame::{RgbaPicture, rgba_picture},
    input::AvInput,
    scaler::Scaler,
};

/// Random-access frame extraction: every call seeks and decodes up to the
/// requested timestamp.
pub struct FrameRetriever {
    input: AvInput,
    decoder: Decoder,
    scaler: Scaler,
    duration_us: i64,
}

impl FrameRetriever {
    pub fn open(url: &str) -> anyhow::Result<Self> {
        let input = AvInput::new(url)?;
        let stream = input.best_video()?;
        let decoder = Decoder::new(&stream)?;
        let duration_us = input.duration_us(&stream);
        log::debug!(
            "retriever: {} {}x{} duration {}us",
            url,
            stream.width(),
            stream.height(),
            duration_us
        );
        Ok(Self {
            input,
            decoder,
            scaler: Scaler::new(Pixel::RGBA),
            duration_us,
        })
    }

    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    /// Decodes the first frame presented at or after `position_us`, or the
    /// last frame of the file when the position lies beyond it.
    pub fn frame_at(&mut self, position_us: i64) -> anyhow::Result<Option<RgbaPicture>> {
        self.input.seek_us(position_us)?;
        self.decoder.flush();

        let mut last = None;
        let mut eof = false;
        loop {
            while let Some(frame) = self.decoder.receive_frame()? {
                let at = self.decoder.frame_time_us(&frame);
                if at >= position_us {
                    return rgba_picture(&frame, &mut self.scaler).map(Some);
                }
                last = Some(frame);
            }
            if eof {
                break;
            }
            match self.input.read_packet() {
                Some(packet) if packet.index() == self.decoder.stream_index() => {
                    if let Err(e) = self.decoder.send_packet(packet) {
                        log::warn!("retriever: send packet: {:#}", e);
                    }
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof()?;
                    eof = true;
                }
            }
        }

        match last {
            Some(frame) => rgba_picture(&frame, &mut self.scaler).map(Some),
            None => Ok(None),
        }
    }
}
