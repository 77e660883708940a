use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context, Flags};

/// Converts decoded frames to one output pixel format at their native size.
/// The sws context is rebuilt whenever the input geometry or format changes.
pub struct Scaler {
    context: Option<Context>,
    key: (Pixel, u32, u32),
    output: Pixel,
}

unsafe impl Send for Scaler {}

impl Scaler {
    pub fn new(output: Pixel) -> Self {
        Self {
            context: None,
            key: (Pixel::None, 0, 0),
            output,
        }
    }

    pub fn run(&mut self, frame: &ffmpeg_next::frame::Video) -> anyhow::Result<ffmpeg_next::frame::Video> {
        let key = (frame.format(), frame.width(), frame.height());
        if self.context.is_none() || self.key != key {
            let context = Context::get(
                key.0,
                key.1,
                key.2,
                self.output,
                key.1,
                key.2,
                Flags::BILINEAR,
            )?;
            self.context = Some(context);
            self.key = key;
        }

        let mut dst = ffmpeg_next::frame::Video::empty();
        match self.context.as_mut() {
            Some(context) => context.run(frame, &mut dst)?,
            None => return Err(anyhow::anyhow!("scaler not initialized")),
        }
        dst.set_pts(frame.pts());
        Ok(dst)
    }
}
