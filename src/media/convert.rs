//! Colour conversion between RGBA, NV21, planar YUV and JPEG.
//!
//! Luma and chroma use the integer BT.601 studio-swing coefficients:
//!
//! ```text
//! Y = ((66R + 129G + 25B + 128) >> 8) + 16
//! U = ((-38R - 74G + 112B + 128) >> 8) + 128
//! V = ((112R - 94G - 18B + 128) >> 8) + 128
//! ```
//!
//! Chroma is sampled from the top-left pixel of each 2x2 block.

use std::borrow::Cow;

use anyhow::Context as _;
use ffmpeg_source::frame::YuvPicture;
use image::{imageops::FilterType, RgbaImage};
use jpeg_encoder::{ColorType, Encoder};

use super::types::{PlanarFrameMut, Size};

pub const JPEG_QUALITY: u8 = 90;

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

fn luma(r: i32, g: i32, b: i32) -> u8 {
    clamp_u8(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16)
}

fn chroma_u(r: i32, g: i32, b: i32) -> u8 {
    clamp_u8(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128)
}

fn chroma_v(r: i32, g: i32, b: i32) -> u8 {
    clamp_u8(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128)
}

/// Byte length of an NV21 buffer for `size`.
pub fn nv21_len(size: Size) -> usize {
    size.area() + 2 * size.chroma().area()
}

pub fn rgba_to_nv21(image: &RgbaImage) -> Vec<u8> {
    let size = Size::new(image.width(), image.height());
    let width = size.width as usize;
    let chroma_width = size.chroma().width as usize;

    let mut out = vec![0u8; nv21_len(size)];
    let (y_plane, vu_plane) = out.split_at_mut(size.area());
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;
        let (r, g, b) = (r as i32, g as i32, b as i32);
        let (x, y) = (x as usize, y as usize);
        y_plane[y * width + x] = luma(r, g, b);
        if x % 2 == 0 && y % 2 == 0 {
            let index = ((y / 2) * chroma_width + x / 2) * 2;
            vu_plane[index] = chroma_v(r, g, b);
            vu_plane[index + 1] = chroma_u(r, g, b);
        }
    }
    out
}

/// Splits an NV21 buffer into tightly packed Y, U and V planes.
pub fn nv21_to_i420(nv21: &[u8], size: Size) -> anyhow::Result<[Vec<u8>; 3]> {
    if nv21.len() < nv21_len(size) {
        anyhow::bail!("nv21 buffer of {} bytes is too short for {}", nv21.len(), size);
    }
    let (y, vu) = nv21.split_at(size.area());
    let chroma = size.chroma().area();
    let mut u = Vec::with_capacity(chroma);
    let mut v = Vec::with_capacity(chroma);
    for pair in vu[..chroma * 2].chunks_exact(2) {
        v.push(pair[0]);
        u.push(pair[1]);
    }
    Ok([y.to_vec(), u, v])
}

/// Writes `image` into caller-provided planes, honouring each plane's strides.
/// The image is stretched first when its size differs from the destination.
pub fn rgba_to_yuv420_into(image: &RgbaImage, dst: &mut PlanarFrameMut<'_>) -> anyhow::Result<()> {
    let size = dst.size;
    if size.is_empty() {
        anyhow::bail!("empty destination");
    }
    let source = if image.dimensions() == (size.width, size.height) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(image::imageops::resize(
            image,
            size.width,
            size.height,
            FilterType::Triangle,
        ))
    };

    let (width, height) = (size.width as usize, size.height as usize);
    let chroma = size.chroma();
    let (chroma_width, chroma_height) = (chroma.width as usize, chroma.height as usize);
    for (name, plane, cols, rows) in [
        ("y", &dst.y, width, height),
        ("u", &dst.u, chroma_width, chroma_height),
        ("v", &dst.v, chroma_width, chroma_height),
    ] {
        let needed = plane.required_len(cols, rows);
        if plane.data.len() < needed {
            anyhow::bail!(
                "{} plane holds {} bytes, {} needed for {}",
                name,
                plane.data.len(),
                needed,
                size
            );
        }
    }

    let nv21 = rgba_to_nv21(&source);
    for row in 0..height {
        for col in 0..width {
            dst.y.put(col, row, nv21[row * width + col]);
        }
    }
    let vu = &nv21[size.area()..];
    for row in 0..chroma_height {
        for col in 0..chroma_width {
            let index = (row * chroma_width + col) * 2;
            dst.v.put(col, row, vu[index]);
            dst.u.put(col, row, vu[index + 1]);
        }
    }
    Ok(())
}

fn try_encode_jpeg(data: &[u8], width: u32, height: u32, color: ColorType) -> anyhow::Result<Vec<u8>> {
    let width = u16::try_from(width).with_context(|| format!("width {} too large for jpeg", width))?;
    let height =
        u16::try_from(height).with_context(|| format!("height {} too large for jpeg", height))?;
    let mut out = Vec::new();
    Encoder::new(&mut out, JPEG_QUALITY).encode(data, width, height, color)?;
    Ok(out)
}

/// JPEG at [`JPEG_QUALITY`]. Returns an empty buffer if encoding fails.
pub fn encode_jpeg(image: &RgbaImage) -> Vec<u8> {
    match try_encode_jpeg(image.as_raw(), image.width(), image.height(), ColorType::Rgba) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("jpeg encode of {}x{} failed: {:#}", image.width(), image.height(), e);
            Vec::new()
        }
    }
}

/// Gathers a decoded 4:2:0 picture into an NV21 buffer, reading every plane
/// through its own row and pixel stride.
pub fn planar_to_nv21(picture: &YuvPicture) -> Vec<u8> {
    let size = Size::new(picture.width, picture.height);
    let (width, height) = (size.width as usize, size.height as usize);
    let chroma = size.chroma();

    let mut out = Vec::with_capacity(nv21_len(size));
    for row in 0..height {
        for col in 0..width {
            out.push(picture.y.sample(col, row));
        }
    }
    for row in 0..chroma.height as usize {
        for col in 0..chroma.width as usize {
            out.push(picture.v.sample(col, row));
            out.push(picture.u.sample(col, row));
        }
    }
    out
}

/// Decodes NV21 to RGBA through a JPEG round trip.
pub fn nv21_to_rgba(nv21: &[u8], size: Size) -> Option<RgbaImage> {
    if size.is_empty() || nv21.len() < nv21_len(size) {
        log::warn!("nv21 buffer of {} bytes does not match {}", nv21.len(), size);
        return None;
    }
    let (width, height) = (size.width as usize, size.height as usize);
    let chroma_width = size.chroma().width as usize;
    let (y_plane, vu_plane) = nv21.split_at(size.area());

    let mut ycbcr = Vec::with_capacity(size.area() * 3);
    for row in 0..height {
        for col in 0..width {
            let index = ((row / 2) * chroma_width + col / 2) * 2;
            ycbcr.push(y_plane[row * width + col]);
            ycbcr.push(vu_plane[index + 1]);
            ycbcr.push(vu_plane[index]);
        }
    }

    let jpeg = match try_encode_jpeg(&ycbcr, size.width, size.height, ColorType::Ycbcr) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            log::warn!("nv21 to jpeg failed: {:#}", e);
            return None;
        }
    };
    match image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg) {
        Ok(decoded) => Some(decoded.to_rgba8()),
        Err(e) => {
            log::warn!("decode intermediate jpeg: {}", e);
            None
        }
    }
}

#[cfg(test)]
#[path = "convert_test.rs"]
mod convert_test;
