//! Use-case style camera: analysis frames, still capture and preview surfaces.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::camera::{CameraApi, VirtualCamera, DEFAULT_CAPTURE_SIZE, PREVIEW_FORMAT};
use crate::media::types::{EncodedFrame, FramePayload, OutputFormat, PlaneData, Size};
use crate::session::SessionHandle;
use crate::target::DeliveryTarget;

/// Planar frame handed to an analyzer in place of the real one.
#[derive(Clone, Debug)]
pub struct AnalysisFrame {
    pub size: Size,
    pub timestamp_ns: i64,
    pub y: PlaneData,
    pub u: PlaneData,
    pub v: PlaneData,
}

impl AnalysisFrame {
    fn from_encoded(frame: EncodedFrame, timestamp_ns: i64) -> Option<Self> {
        match frame.payload {
            FramePayload::Planar { y, u, v } => Some(Self {
                size: frame.size,
                timestamp_ns,
                y,
                u,
                v,
            }),
            FramePayload::Packed(_) => None,
        }
    }
}

pub struct AnalysisAdapter {
    camera: Arc<VirtualCamera>,
    owner: u64,
    next_slot: AtomicU32,
}

impl AnalysisAdapter {
    pub fn new(camera: Arc<VirtualCamera>) -> Self {
        let owner = camera.allocate_owner();
        Self {
            camera,
            owner,
            next_slot: AtomicU32::new(0),
        }
    }

    /// Substitute for an incoming analysis image of `width`x`height`. The
    /// upstream timestamp is carried over.
    pub fn analyze(&self, width: u32, height: u32, timestamp_ns: i64) -> Option<AnalysisFrame> {
        let frame = self
            .camera
            .produce_frame(CameraApi::Analysis, width, height, OutputFormat::Yuv420)?;
        AnalysisFrame::from_encoded(frame, timestamp_ns)
    }

    /// Captured still at the manual size, or [`DEFAULT_CAPTURE_SIZE`] per
    /// dimension when no override is set.
    pub fn take_picture(&self) -> Option<AnalysisFrame> {
        let config = self.camera.config();
        let size = Size::new(
            Some(config.manual_width)
                .filter(|w| *w > 0)
                .unwrap_or(DEFAULT_CAPTURE_SIZE.width),
            Some(config.manual_height)
                .filter(|h| *h > 0)
                .unwrap_or(DEFAULT_CAPTURE_SIZE.height),
        );
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        let frame = self.camera.produce_frame(
            CameraApi::Analysis,
            size.width,
            size.height,
            OutputFormat::Yuv420,
        )?;
        AnalysisFrame::from_encoded(frame, timestamp_ns)
    }

    /// Paints a requested preview surface and returns the placeholder to give
    /// the real camera instead. `None` keeps the surface with the camera.
    pub fn provide_surface(
        &self,
        surface: Arc<dyn DeliveryTarget>,
    ) -> Option<Arc<dyn DeliveryTarget>> {
        let config = self.camera.config();
        if !config.inject_preview || !self.camera.api_enabled(CameraApi::Analysis) {
            return None;
        }

        let handle = SessionHandle::new(self.owner, self.next_slot.fetch_add(1, Ordering::Relaxed));
        let sessions = self.camera.sessions();
        sessions.activate(handle, surface.clone(), false);
        if !self
            .camera
            .start_painting(CameraApi::Analysis, handle, surface, DEFAULT_CAPTURE_SIZE)
        {
            sessions.teardown(handle);
            return None;
        }
        self.camera
            .mark_active(CameraApi::Analysis, None, PREVIEW_FORMAT);
        let placeholder: Arc<dyn DeliveryTarget> = sessions.obtain_placeholder(handle);
        Some(placeholder)
    }

    /// Stops every surface this adapter paints.
    pub fn unbind(&self) {
        self.camera.sessions().teardown_owner(self.owner);
    }
}

impl Drop for AnalysisAdapter {
    fn drop(&mut self) {
        self.unbind();
    }
}

#[cfg(test)]
#[path = "analysis_test.rs"]
mod analysis_test;
