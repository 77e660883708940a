use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image::{imageops, imageops::FilterType, Rgba, RgbaImage};

use crate::media::types::Size;

pub const PLACEHOLDER_SIZE: Size = Size::new(16, 16);
pub const CLEAR_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// On-screen preview surface.
    Preview,
    /// Buffer queue read back by the caller.
    ImageReader,
    Placeholder,
}

/// Pixels handed out by [`DeliveryTarget::lock_canvas`].
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(size: Size) -> Self {
        Self {
            image: RgbaImage::from_pixel(size.width, size.height, CLEAR_COLOR),
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    pub fn clear(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    /// Draws `frame` stretched over the whole canvas.
    pub fn draw_stretched(&mut self, frame: &RgbaImage) {
        let size = self.size();
        if size.is_empty() {
            return;
        }
        if frame.dimensions() == (size.width, size.height) {
            imageops::replace(&mut self.image, frame, 0, 0);
        } else {
            let scaled = imageops::resize(frame, size.width, size.height, FilterType::Triangle);
            imageops::replace(&mut self.image, &scaled, 0, 0);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// A paintable destination owned by someone else.
///
/// `lock_canvas` grants exclusive paint access until the canvas is given
/// back through `unlock_and_post`.
pub trait DeliveryTarget: Send + Sync {
    fn kind(&self) -> TargetKind {
        TargetKind::Preview
    }

    fn is_valid(&self) -> bool;

    /// Current surface size.
    fn size(&self) -> Size;

    fn lock_canvas(&self) -> anyhow::Result<Canvas>;

    fn unlock_and_post(&self, canvas: Canvas) -> anyhow::Result<()>;

    /// Frees the underlying resource. Only called for targets the pipeline owns.
    fn release(&self) {}
}

pub type TargetKey = usize;

/// Identity of a target, stable for as long as the `Arc` is alive.
pub fn target_key(target: &Arc<dyn DeliveryTarget>) -> TargetKey {
    Arc::as_ptr(target) as *const () as usize
}

/// Minimal always-valid stand-in handed back to the caller while the real
/// target is painted out of band.
#[derive(Default)]
pub struct PlaceholderTarget {
    released: AtomicBool,
}

impl PlaceholderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }
}

impl DeliveryTarget for PlaceholderTarget {
    fn kind(&self) -> TargetKind {
        TargetKind::Placeholder
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn size(&self) -> Size {
        PLACEHOLDER_SIZE
    }

    fn lock_canvas(&self) -> anyhow::Result<Canvas> {
        Ok(Canvas::new(PLACEHOLDER_SIZE))
    }

    fn unlock_and_post(&self, _canvas: Canvas) -> anyhow::Result<()> {
        Ok(())
    }

    fn release(&self) {
        self.released.store(true, Ordering::Relaxed);
    }
}

/// Surface backed by memory: keeps the last posted image and counts posts.
pub struct MemoryTarget {
    kind: TargetKind,
    size: Mutex<Size>,
    last: Mutex<Option<RgbaImage>>,
    painting: AtomicBool,
    posts: AtomicU64,
    valid: AtomicBool,
    released: AtomicBool,
}

impl MemoryTarget {
    pub fn new(size: Size) -> Self {
        Self::with_kind(size, TargetKind::Preview)
    }

    pub fn with_kind(size: Size, kind: TargetKind) -> Self {
        Self {
            kind,
            size: Mutex::new(size),
            last: Mutex::new(None),
            painting: AtomicBool::new(false),
            posts: AtomicU64::new(0),
            valid: AtomicBool::new(true),
            released: AtomicBool::new(false),
        }
    }

    pub fn resize(&self, size: Size) {
        *self.size.lock().unwrap_or_else(|e| e.into_inner()) = size;
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn posts(&self) -> u64 {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> Option<RgbaImage> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl DeliveryTarget for MemoryTarget {
    fn kind(&self) -> TargetKind {
        self.kind
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && !self.is_released()
    }

    fn size(&self) -> Size {
        *self.size.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_canvas(&self) -> anyhow::Result<Canvas> {
        if !self.is_valid() {
            anyhow::bail!("surface is no longer valid");
        }
        if self.painting.swap(true, Ordering::SeqCst) {
            anyhow::bail!("surface already locked");
        }
        Ok(Canvas::new(self.size()))
    }

    fn unlock_and_post(&self, canvas: Canvas) -> anyhow::Result<()> {
        if !self.painting.swap(false, Ordering::SeqCst) {
            anyhow::bail!("surface was not locked");
        }
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(canvas.into_image());
        self.posts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
