use ffmpeg_next::{Rational, codec::Parameters, ffi::AVCodecParameters, format::stream, media};

/// Owned description of a demuxed stream, detached from its input context.
#[derive(Clone)]
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    fps: f32,
    width: u32,
    height: u32,
    duration_us: Option<i64>,
}

// `Parameters` holds a raw pointer it owns exclusively.
unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

impl AvStream {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn is_video(&self) -> bool {
        self.parameters.medium() == media::Type::Video
    }

    pub fn codec_id(&self) -> ffmpeg_next::codec::Id {
        self.parameters.id()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Average frame rate, 0 when the container does not know it.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Stream duration in microseconds, if the container reports one.
    pub fn duration_us(&self) -> Option<i64> {
        self.duration_us
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        let parameters = stream.parameters();
        let (width, height) = unsafe {
            let raw = parameters.as_ptr() as *const AVCodecParameters;
            ((*raw).width.max(0) as u32, (*raw).height.max(0) as u32)
        };
        let rate = stream.avg_frame_rate();
        let fps = match rate.denominator() {
            0 => 0.0,
            den => rate.numerator() as f32 / den as f32,
        };
        let time_base = stream.time_base();
        let duration_us = Some(stream.duration())
            .filter(|d| *d != ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 && *d > 0)
            .map(|d| crate::ts_to_us(d, time_base))
            .filter(|d| *d > 0);
        Self {
            index: stream.index(),
            parameters,
            time_base,
            fps,
            width,
            height,
            duration_us,
        }
    }
}
