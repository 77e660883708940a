//! Capture-session camera: preview outputs are swapped for placeholders and
//! painted directly, reader images are filled in place.

use std::sync::Arc;

use crate::camera::{CameraApi, VirtualCamera, DEFAULT_CAPTURE_SIZE, PREVIEW_FORMAT};
use crate::media::types::{OutputFormat, PlanarFrameMut, PlaneMut, Size};
use crate::session::SessionHandle;
use crate::target::{DeliveryTarget, TargetKind};

#[derive(Clone, Debug, Default)]
pub struct ReaderPlane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl ReaderPlane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }
}

/// An image acquired from a reader output. NV21 and JPEG images carry a
/// single plane, YUV420 images three.
#[derive(Clone, Debug)]
pub struct ReaderImage {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub planes: Vec<ReaderPlane>,
}

/// One camera device and the capture session currently configured on it.
pub struct CaptureSessionAdapter {
    camera: Arc<VirtualCamera>,
    owner: u64,
}

impl CaptureSessionAdapter {
    pub fn new(camera: Arc<VirtualCamera>) -> Self {
        let owner = camera.allocate_owner();
        Self { camera, owner }
    }

    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// Returns the outputs to configure on the real device. With preview
    /// injection on, every valid preview output is painted by us and replaced
    /// by a placeholder; reader outputs are left alone.
    pub fn create_capture_session(
        &self,
        outputs: Vec<Arc<dyn DeliveryTarget>>,
    ) -> Vec<Arc<dyn DeliveryTarget>> {
        let config = self.camera.config();
        if !config.inject_preview || !self.camera.api_enabled(CameraApi::Session) {
            return outputs;
        }
        self.close_session();

        let sessions = self.camera.sessions();
        let mut replaced = 0;
        let outputs = outputs
            .into_iter()
            .enumerate()
            .map(|(slot, target)| {
                if target.kind() != TargetKind::Preview || !target.is_valid() {
                    return target;
                }
                let handle = SessionHandle::new(self.owner, slot as u32);
                sessions.activate(handle, target.clone(), false);
                if !self.camera.start_painting(
                    CameraApi::Session,
                    handle,
                    target.clone(),
                    DEFAULT_CAPTURE_SIZE,
                ) {
                    sessions.teardown(handle);
                    return target;
                }
                replaced += 1;
                let placeholder: Arc<dyn DeliveryTarget> = sessions.obtain_placeholder(handle);
                placeholder
            })
            .collect();

        if replaced > 0 {
            log::info!("capture session: {} preview output(s) replaced", replaced);
            self.camera
                .mark_active(CameraApi::Session, None, PREVIEW_FORMAT);
        }
        outputs
    }

    /// Overwrites a reader image with a substituted frame.
    pub fn fill_image(&self, image: &mut ReaderImage) -> bool {
        let size = Size::new(image.width, image.height);
        match image.format {
            OutputFormat::Yuv420 => {
                let count = image.planes.len();
                let [y, u, v, ..] = image.planes.as_mut_slice() else {
                    log::warn!("yuv420 image with {} planes", count);
                    return false;
                };
                let mut dst = PlanarFrameMut {
                    size,
                    y: PlaneMut::new(&mut y.data, y.row_stride, y.pixel_stride),
                    u: PlaneMut::new(&mut u.data, u.row_stride, u.pixel_stride),
                    v: PlaneMut::new(&mut v.data, v.row_stride, v.pixel_stride),
                };
                self.camera.fill_yuv420(CameraApi::Session, &mut dst)
            }
            format @ (OutputFormat::Nv21 | OutputFormat::Jpeg) => {
                let Some(plane) = image.planes.first_mut() else {
                    log::warn!("{} image without planes", format);
                    return false;
                };
                let Some(frame) =
                    self.camera
                        .produce_frame(CameraApi::Session, size.width, size.height, format)
                else {
                    return false;
                };
                let bytes = frame.to_bytes();
                if plane.data.len() < bytes.len() {
                    log::warn!(
                        "{} plane holds {} bytes, frame needs {}",
                        format,
                        plane.data.len(),
                        bytes.len()
                    );
                    return false;
                }
                plane.data[..bytes.len()].copy_from_slice(&bytes);
                true
            }
        }
    }

    /// Stops painting and forgets every output of this device.
    pub fn close_session(&self) {
        self.camera.sessions().teardown_owner(self.owner);
    }
}

impl Drop for CaptureSessionAdapter {
    fn drop(&mut self) {
        self.close_session();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
