//! The process-wide substitution context shared by every adapter.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use tokio::runtime::{Handle, Runtime};

use crate::config::{ApiPriority, SettingsStore, SourceConfig, DEFAULT_FPS};
use crate::diagnostics::{DiagnosticsSink, DiagnosticsSnapshot, FpsMeter};
use crate::media::types::{EncodedFrame, OutputFormat, PlanarFrameMut, Size};
use crate::pipeline::FramePipeline;
use crate::scheduler::{DeliveryScheduler, FrameProvider};
use crate::session::{SessionHandle, SessionRegistry};
use crate::source::FileAccess;
use crate::target::DeliveryTarget;
use crate::video::ffmpeg::FfmpegOpener;

/// Size used when neither the caller nor the settings name one.
pub const DEFAULT_CAPTURE_SIZE: Size = Size::new(1280, 720);

/// Pixel format reported for painted surfaces.
pub const PREVIEW_FORMAT: &str = "Preview";

/// Camera API surface a request came through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraApi {
    Legacy,
    Session,
    Analysis,
}

impl CameraApi {
    /// Name published as the diagnostics active path.
    pub fn path(&self) -> &'static str {
        match self {
            CameraApi::Legacy => "Legacy",
            CameraApi::Session => "Session",
            CameraApi::Analysis => "Analysis",
        }
    }

    fn priority(&self) -> ApiPriority {
        match self {
            CameraApi::Legacy => ApiPriority::Legacy,
            CameraApi::Session => ApiPriority::Session,
            CameraApi::Analysis => ApiPriority::Analysis,
        }
    }
}

/// Shared by camera and painters to publish deliveries.
struct DeliveryRecorder {
    diagnostics: Arc<DiagnosticsSink>,
    meter: FpsMeter,
}

impl DeliveryRecorder {
    fn mark(&self, api: CameraApi, size: Option<Size>, pixel_format: &str, fps: u32, measured: Option<f32>) {
        self.diagnostics.update(|previous| DiagnosticsSnapshot {
            active_path: api.path().to_string(),
            preview_size: size.or(previous.preview_size),
            pixel_format: Some(pixel_format.to_string()),
            requested_fps: fps,
            measured_fps: measured.unwrap_or(previous.measured_fps),
        });
    }

    fn delivered(&self, api: CameraApi, size: Size, pixel_format: &str, fps: u32) {
        let measured = self.meter.tick();
        self.mark(api, Some(size), pixel_format, fps, measured);
    }
}

pub struct VirtualCamera {
    pipeline: Arc<FramePipeline>,
    scheduler: Arc<DeliveryScheduler>,
    sessions: Arc<SessionRegistry>,
    recorder: Arc<DeliveryRecorder>,
    next_owner: AtomicU64,
    // Dropped last: painters sleep on it.
    _runtime: Option<Runtime>,
}

impl VirtualCamera {
    /// Builds its own single-worker runtime for painter timing.
    pub fn new(pipeline: FramePipeline) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("vcam-timer")
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        let mut camera = Self::with_runtime(pipeline, handle);
        camera._runtime = Some(runtime);
        Ok(camera)
    }

    /// Uses an existing multi-thread runtime.
    pub fn with_runtime(pipeline: FramePipeline, runtime: Handle) -> Self {
        let scheduler = Arc::new(DeliveryScheduler::new(runtime));
        Self {
            pipeline: Arc::new(pipeline),
            sessions: Arc::new(SessionRegistry::new(scheduler.clone())),
            scheduler,
            recorder: Arc::new(DeliveryRecorder {
                diagnostics: Arc::new(DiagnosticsSink::new()),
                meter: FpsMeter::new(),
            }),
            next_owner: AtomicU64::new(1),
            _runtime: None,
        }
    }

    /// File-backed sources decoded with FFmpeg.
    pub fn from_settings(settings: Arc<dyn SettingsStore>) -> anyhow::Result<Self> {
        Self::new(FramePipeline::new(
            settings,
            Arc::new(FileAccess),
            Arc::new(FfmpegOpener),
        ))
    }

    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.pipeline
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn scheduler(&self) -> &Arc<DeliveryScheduler> {
        &self.scheduler
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsSink> {
        &self.recorder.diagnostics
    }

    pub fn config(&self) -> SourceConfig {
        self.pipeline.current_config()
    }

    /// Fresh owner id for an adapter's session handles.
    pub fn allocate_owner(&self) -> u64 {
        self.next_owner.fetch_add(1, Ordering::Relaxed)
    }

    pub fn api_enabled(&self, api: CameraApi) -> bool {
        Self::allows(&self.config(), api)
    }

    fn allows(config: &SourceConfig, api: CameraApi) -> bool {
        config.enabled
            && (config.api_priority == ApiPriority::Auto || config.api_priority == api.priority())
    }

    /// One encoded frame for `api`, or `None` to let the real camera answer.
    pub fn produce_frame(
        &self,
        api: CameraApi,
        width: u32,
        height: u32,
        format: OutputFormat,
    ) -> Option<EncodedFrame> {
        let config = self.config();
        if !Self::allows(&config, api) {
            return None;
        }
        let frame = self.pipeline.produce_frame(width, height, format)?;
        self.recorder
            .delivered(api, Size::new(width, height), format.name(), config.fps);
        Some(frame)
    }

    /// Fills caller planes for `api`. `false` when nothing was written.
    pub fn fill_yuv420(&self, api: CameraApi, dst: &mut PlanarFrameMut<'_>) -> bool {
        let config = self.config();
        if !Self::allows(&config, api) || !self.pipeline.fill_yuv420(dst) {
            return false;
        }
        self.recorder
            .delivered(api, dst.size, OutputFormat::Yuv420.name(), config.fps);
        true
    }

    /// Publishes `api` as the active path without counting a delivery.
    pub fn mark_active(&self, api: CameraApi, size: Option<Size>, pixel_format: &str) {
        let fps = self.config().fps;
        self.recorder.mark(api, size, pixel_format, fps, None);
    }

    /// Starts repainting `target` for the session `handle`. Frames are sized by
    /// the session's negotiated size, then the manual override, then `fallback`.
    pub fn start_painting(
        &self,
        api: CameraApi,
        handle: SessionHandle,
        target: Arc<dyn DeliveryTarget>,
        fallback: Size,
    ) -> bool {
        if !self.api_enabled(api) {
            return false;
        }
        let provider = Arc::new(SessionFrames {
            api,
            handle,
            fallback,
            pipeline: self.pipeline.clone(),
            sessions: self.sessions.clone(),
            recorder: self.recorder.clone(),
            fps: AtomicU32::new(DEFAULT_FPS),
            last_size: Mutex::new(fallback),
        });
        match self.scheduler.start(target, provider) {
            Ok(()) => true,
            Err(e) => {
                log::error!("cannot start painter for {:?}: {:#}", handle, e);
                false
            }
        }
    }

    /// Stops every painter and drops the source.
    pub fn shutdown(&self) {
        self.scheduler.stop_all();
        self.pipeline.release();
        self.recorder.diagnostics.reset();
    }
}

impl Drop for VirtualCamera {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Size a painter renders at.
pub fn painter_size(session: Option<Size>, config: &SourceConfig, fallback: Size) -> Size {
    let session = session.filter(|s| !s.is_empty());
    let pick = |session: Option<u32>, manual: u32, fallback: u32| {
        session
            .or(Some(manual).filter(|m| *m > 0))
            .unwrap_or(fallback)
    };
    Size::new(
        pick(session.map(|s| s.width), config.manual_width, fallback.width),
        pick(session.map(|s| s.height), config.manual_height, fallback.height),
    )
}

struct SessionFrames {
    api: CameraApi,
    handle: SessionHandle,
    fallback: Size,
    pipeline: Arc<FramePipeline>,
    sessions: Arc<SessionRegistry>,
    recorder: Arc<DeliveryRecorder>,
    fps: AtomicU32,
    last_size: Mutex<Size>,
}

impl FrameProvider for SessionFrames {
    fn next_frame(&self) -> Option<RgbaImage> {
        let config = self.pipeline.current_config();
        self.fps.store(config.fps, Ordering::Relaxed);
        let size = painter_size(self.sessions.size(self.handle), &config, self.fallback);
        *self.last_size.lock().unwrap_or_else(|e| e.into_inner()) = size;
        self.pipeline.acquire_frame(size.width, size.height)
    }

    fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    fn on_posted(&self) {
        let size = *self.last_size.lock().unwrap_or_else(|e| e.into_inner());
        self.recorder
            .delivered(self.api, size, PREVIEW_FORMAT, self.fps());
    }
}

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use image::{Rgba, RgbaImage};

    use super::VirtualCamera;
    use crate::config::{SourceConfig, StaticSettings};
    use crate::pipeline::FramePipeline;
    use crate::source::fake::MemoryAccess;
    use crate::video::fake::FakeOpener;

    pub const STILL: &str = "/still.png";
    pub const STILL_COLOR: Rgba<u8> = Rgba([200, 40, 40, 255]);

    pub struct TestCamera {
        pub camera: Arc<VirtualCamera>,
        pub settings: Arc<StaticSettings>,
    }

    /// Camera over a 64x32 in-memory still at [`STILL`].
    pub fn camera(config: SourceConfig) -> TestCamera {
        let settings = Arc::new(StaticSettings::new(SourceConfig {
            source_locator: Some(STILL.to_string()),
            ..config
        }));
        let access = Arc::new(MemoryAccess::new());
        access.insert_png(STILL, &RgbaImage::from_pixel(64, 32, STILL_COLOR));
        let pipeline = FramePipeline::new(
            settings.clone(),
            access,
            Arc::new(FakeOpener::new(1_000_000)),
        );
        TestCamera {
            camera: Arc::new(VirtualCamera::new(pipeline).unwrap()),
            settings,
        }
    }

    pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }
}
