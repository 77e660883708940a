//! Polling-style camera: preview callbacks, a preview surface and still capture.

use std::sync::{Arc, Mutex};

use crate::camera::{CameraApi, VirtualCamera, DEFAULT_CAPTURE_SIZE};
use crate::media::types::{OutputFormat, Size};
use crate::session::SessionHandle;
use crate::target::DeliveryTarget;

const PREVIEW_SLOT: u32 = 0;

/// One opened legacy camera.
pub struct LegacyAdapter {
    camera: Arc<VirtualCamera>,
    owner: u64,
    picture_size: Mutex<Option<Size>>,
}

impl LegacyAdapter {
    pub fn new(camera: Arc<VirtualCamera>) -> Self {
        let owner = camera.allocate_owner();
        Self {
            camera,
            owner,
            picture_size: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.owner, PREVIEW_SLOT)
    }

    pub fn set_preview_size(&self, width: u32, height: u32) {
        self.camera
            .sessions()
            .update_size(self.handle(), Size::new(width, height));
    }

    pub fn set_picture_size(&self, width: u32, height: u32) {
        *self.picture_size.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(Size::new(width, height));
    }

    /// Replaces a preview callback's NV21 payload. The caller's buffer is
    /// reused when its length matches, otherwise it is swapped for a new one.
    pub fn deliver_preview(&self, buffer: &mut Vec<u8>, width: u32, height: u32) -> bool {
        let Some(frame) =
            self.camera
                .produce_frame(CameraApi::Legacy, width, height, OutputFormat::Nv21)
        else {
            return false;
        };
        let bytes = frame.to_bytes();
        if buffer.len() == bytes.len() {
            buffer.copy_from_slice(&bytes);
        } else {
            *buffer = bytes.to_vec();
        }
        self.set_preview_size(width, height);
        true
    }

    /// The app's texture becomes the painted target, wrapped and therefore
    /// owned by us. Returns the placeholder to hand to the real camera, or
    /// `None` when substitution does not apply.
    pub fn set_preview_texture(
        &self,
        texture: Option<Arc<dyn DeliveryTarget>>,
    ) -> Option<Arc<dyn DeliveryTarget>> {
        self.attach(texture, true)
    }

    /// Like [`set_preview_texture`](Self::set_preview_texture), but the
    /// display surface stays owned by the app.
    pub fn set_preview_display(
        &self,
        display: Option<Arc<dyn DeliveryTarget>>,
    ) -> Option<Arc<dyn DeliveryTarget>> {
        self.attach(display.filter(|d| d.is_valid()), false)
    }

    fn attach(
        &self,
        target: Option<Arc<dyn DeliveryTarget>>,
        owned: bool,
    ) -> Option<Arc<dyn DeliveryTarget>> {
        let Some(target) = target else {
            self.camera.sessions().teardown(self.handle());
            return None;
        };
        if !self.camera.api_enabled(CameraApi::Legacy) {
            return None;
        }

        let handle = self.handle();
        let sessions = self.camera.sessions();
        sessions.activate(handle, target.clone(), owned);
        self.camera
            .start_painting(CameraApi::Legacy, handle, target, DEFAULT_CAPTURE_SIZE);
        self.camera.mark_active(
            CameraApi::Legacy,
            sessions.size(handle),
            OutputFormat::Nv21.name(),
        );
        let placeholder: Arc<dyn DeliveryTarget> = sessions.obtain_placeholder(handle);
        Some(placeholder)
    }

    /// Resumes painting the attached surface.
    pub fn start_preview(&self) -> bool {
        let handle = self.handle();
        match self.camera.sessions().target(handle) {
            Some(target) if target.is_valid() => {
                self.camera
                    .start_painting(CameraApi::Legacy, handle, target, DEFAULT_CAPTURE_SIZE)
            }
            _ => false,
        }
    }

    pub fn stop_preview(&self) {
        self.camera.sessions().pause(self.handle());
    }

    /// JPEG at the picture size, or [`DEFAULT_CAPTURE_SIZE`] when none was set.
    pub fn take_picture(&self) -> Option<Vec<u8>> {
        let size = self
            .picture_size
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unwrap_or(DEFAULT_CAPTURE_SIZE);
        let frame =
            self.camera
                .produce_frame(CameraApi::Legacy, size.width, size.height, OutputFormat::Jpeg)?;
        log::info!("legacy picture replaced: {} bytes", frame.len());
        Some(frame.to_bytes().to_vec())
    }

    pub fn release(&self) {
        self.camera.sessions().teardown_owner(self.owner);
    }
}

impl Drop for LegacyAdapter {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "legacy_test.rs"]
mod legacy_test;
