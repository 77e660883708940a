//! Source frames in, caller-shaped frames out.
//!
//! Every call re-reads the settings. The decoded source is only rebuilt when
//! the [`SourceSignature`] changes, so frame-rate or output-format edits take
//! effect without reopening the media.

use std::borrow::Cow;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use image::RgbaImage;

use crate::config::{OrientationPolicy, SettingsStore, SourceConfig, SourceSignature};
use crate::media::convert::{encode_jpeg, nv21_to_i420, rgba_to_nv21, rgba_to_yuv420_into};
use crate::media::size::negotiate;
use crate::media::transform::{scale_frame, FrameTransform, Rotation};
use crate::media::types::{EncodedFrame, FramePayload, OutputFormat, PlanarFrameMut, PlaneData, Size};
use crate::source::{self, DecodedSource, SourceAccess};
use crate::video::MediaOpener;

#[derive(Default)]
struct PipelineState {
    signature: Option<SourceSignature>,
    config: SourceConfig,
    source: Option<Arc<DecodedSource>>,
}

pub struct FramePipeline {
    settings: Arc<dyn SettingsStore>,
    access: Arc<dyn SourceAccess>,
    opener: Arc<dyn MediaOpener>,
    state: RwLock<PipelineState>,
}

impl FramePipeline {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        access: Arc<dyn SourceAccess>,
        opener: Arc<dyn MediaOpener>,
    ) -> Self {
        Self {
            settings,
            access,
            opener,
            state: RwLock::new(PipelineState::default()),
        }
    }

    /// Re-reads settings and swaps the source if its signature changed.
    /// Returns whether a source is active afterwards.
    pub fn refresh(&self) -> bool {
        self.snapshot().1.is_some()
    }

    fn snapshot(&self) -> (SourceConfig, Option<Arc<DecodedSource>>) {
        let config = self.settings.read();
        let signature = config.signature();
        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if state.signature == signature && state.config == config {
                return (config, state.source.clone());
            }
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.signature != signature {
            if let Some(old) = state.source.take() {
                old.release();
            }
            state.source = signature.as_ref().and_then(|_| {
                source::resolve(&config, self.access.as_ref(), &self.opener).map(Arc::new)
            });
            match &signature {
                Some(sig) if state.source.is_some() => {
                    log::info!("source switched to {:?} {}", sig.kind, sig.locator)
                }
                Some(sig) => log::warn!("source {} unavailable", sig.locator),
                None => log::info!("substitution inactive"),
            }
            state.signature = signature;
        }
        state.config = config.clone();
        (config, state.source.clone())
    }

    pub fn current_config(&self) -> SourceConfig {
        self.snapshot().0
    }

    pub fn has_source(&self) -> bool {
        self.refresh()
    }

    /// The next source frame scaled into the negotiated box for `width`x`height`.
    pub fn acquire_frame(&self, width: u32, height: u32) -> Option<RgbaImage> {
        self.acquire(Size::new(width, height)).map(|(_, frame)| frame)
    }

    fn acquire(&self, requested: Size) -> Option<(SourceConfig, RgbaImage)> {
        let (config, source) = self.snapshot();
        let source = source?;
        let frame = source_frame(&config, &source)?;
        let size = negotiate(requested, config.manual_width, config.manual_height);
        let scaled = scale_frame(&frame, size, config.scale_mode);
        Some((config, scaled))
    }

    /// One frame encoded as `format`, or `None` when substitution does not apply.
    pub fn produce_frame(&self, width: u32, height: u32, format: OutputFormat) -> Option<EncodedFrame> {
        let (config, frame) = self.acquire(Size::new(width, height))?;
        let size = Size::new(frame.width(), frame.height());
        let payload = match format {
            OutputFormat::Nv21 => FramePayload::Packed(Bytes::from(rgba_to_nv21(&frame))),
            OutputFormat::Jpeg => {
                let jpeg = encode_jpeg(&frame);
                if jpeg.is_empty() {
                    return None;
                }
                FramePayload::Packed(Bytes::from(jpeg))
            }
            OutputFormat::Yuv420 => {
                let chroma_width = size.chroma().width as usize;
                let [y, u, v] = match nv21_to_i420(&rgba_to_nv21(&frame), size) {
                    Ok(planes) => planes,
                    Err(e) => {
                        log::warn!("yuv420 conversion failed: {:#}", e);
                        return None;
                    }
                };
                FramePayload::Planar {
                    y: PlaneData {
                        data: Bytes::from(y),
                        row_stride: size.width as usize,
                        pixel_stride: 1,
                    },
                    u: PlaneData {
                        data: Bytes::from(u),
                        row_stride: chroma_width,
                        pixel_stride: 1,
                    },
                    v: PlaneData {
                        data: Bytes::from(v),
                        row_stride: chroma_width,
                        pixel_stride: 1,
                    },
                }
            }
        };
        let encoded = EncodedFrame {
            size,
            format,
            payload,
        };
        if config.verbose {
            log::debug!(
                "produced {} {} ({} bytes) for {}x{}",
                format,
                size,
                encoded.len(),
                width,
                height
            );
        }
        Some(encoded)
    }

    /// Writes the next frame into caller planes. `false` leaves them untouched.
    pub fn fill_yuv420(&self, dst: &mut PlanarFrameMut<'_>) -> bool {
        let Some((_, frame)) = self.acquire(dst.size) else {
            return false;
        };
        match rgba_to_yuv420_into(&frame, dst) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("cannot fill {} yuv420 image: {:#}", dst.size, e);
                false
            }
        }
    }

    /// Drops the source. The next call resolves it again.
    pub fn release(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(source) = state.source.take() {
            source.release();
        }
        state.signature = None;
        state.config = SourceConfig::default();
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.release();
    }
}

fn source_frame<'a>(config: &SourceConfig, source: &'a DecodedSource) -> Option<Cow<'a, RgbaImage>> {
    match source {
        DecodedSource::Still(image) => Some(Cow::Borrowed(image.as_ref())),
        DecodedSource::Video(engine) => {
            let frame = match engine.lock().unwrap_or_else(|e| e.into_inner()).next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return None,
                Err(e) => {
                    log::warn!("video frame unavailable: {:#}", e);
                    return None;
                }
            };
            let rotation = match config.orientation {
                OrientationPolicy::Auto => Rotation::None,
                OrientationPolicy::Fixed(degrees) => Rotation::from_degrees(degrees as i32),
            };
            let transform = FrameTransform::new(rotation, config.mirror);
            if transform.is_identity() {
                Some(Cow::Owned(frame))
            } else {
                Some(Cow::Owned(transform.apply(&frame)))
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
