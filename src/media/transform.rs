use image::{imageops, imageops::FilterType, RgbaImage};

use super::types::Size;
use crate::config::ScaleMode;

/// Clockwise rotation in quarter turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Any value that is not a multiple of 90 maps to no rotation.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Rotation::Rotate90,
            180 => Rotation::Rotate180,
            270 => Rotation::Rotate270,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }
}

/// Rotation followed by an optional horizontal mirror.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTransform {
    pub rotation: Rotation,
    pub mirror: bool,
}

impl FrameTransform {
    pub fn new(rotation: Rotation, mirror: bool) -> Self {
        Self { rotation, mirror }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation == Rotation::None && !self.mirror
    }

    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let rotated = match self.rotation {
            Rotation::None => image.clone(),
            Rotation::Rotate90 => imageops::rotate90(image),
            Rotation::Rotate180 => imageops::rotate180(image),
            Rotation::Rotate270 => imageops::rotate270(image),
        };
        if self.mirror {
            imageops::flip_horizontal(&rotated)
        } else {
            rotated
        }
    }
}

fn scale_dimension(value: u32, ratio: f64) -> u32 {
    ((value as f64 * ratio).round() as u32).max(1)
}

/// Maps `src` into the `target` box.
///
/// `Fit` scales uniformly by the smaller ratio and never crops, so the
/// result may be smaller than the box. `CenterCrop` scales by the larger
/// ratio and crops around the centre to exactly `target`.
pub fn scale_frame(src: &RgbaImage, target: Size, mode: ScaleMode) -> RgbaImage {
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 || target.is_empty() {
        return RgbaImage::new(target.width, target.height);
    }
    let ratio_w = target.width as f64 / src_w as f64;
    let ratio_h = target.height as f64 / src_h as f64;

    match mode {
        ScaleMode::Fit => {
            let ratio = ratio_w.min(ratio_h);
            let width = scale_dimension(src_w, ratio).min(target.width);
            let height = scale_dimension(src_h, ratio).min(target.height);
            resize(src, width, height)
        }
        ScaleMode::CenterCrop => {
            let ratio = ratio_w.max(ratio_h);
            let width = scale_dimension(src_w, ratio).max(target.width);
            let height = scale_dimension(src_h, ratio).max(target.height);
            let scaled = resize(src, width, height);
            let x = (width - target.width) / 2;
            let y = (height - target.height) / 2;
            imageops::crop_imm(&scaled, x, y, target.width, target.height).to_image()
        }
    }
}

fn resize(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if src.dimensions() == (width, height) {
        return src.clone();
    }
    imageops::resize(src, width, height, FilterType::Triangle)
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;
