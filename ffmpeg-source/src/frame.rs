use bytes::Bytes;
use ffmpeg_next::format::Pixel;

use crate::scaler::Scaler;

/// One image plane with the strides needed to address its samples.
#[derive(Clone, Debug)]
pub struct Plane {
    pub data: Bytes,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn sample(&self, col: usize, row: usize) -> u8 {
        self.data
            .get(row * self.row_stride + col * self.pixel_stride)
            .copied()
            .unwrap_or(0)
    }
}

/// Decoded 4:2:0 picture. Chroma planes are half resolution.
#[derive(Clone, Debug)]
pub struct YuvPicture {
    pub width: u32,
    pub height: u32,
    pub pts_us: i64,
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
}

/// Tightly packed RGBA picture (`width * 4` bytes per row).
#[derive(Clone, Debug)]
pub struct RgbaPicture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Exposes a decoded frame as 4:2:0 planes. Planar and semi-planar frames are
/// referenced as-is; other layouts go through `scaler` (which must target YUV420P).
pub fn yuv_picture(
    frame: &ffmpeg_next::frame::Video,
    pts_us: i64,
    scaler: &mut Scaler,
) -> anyhow::Result<YuvPicture> {
    let plane = |index: usize, offset: usize, pixel_stride: usize| {
        let data = frame.data(index);
        Plane {
            data: Bytes::copy_from_slice(data.get(offset..).unwrap_or_default()),
            row_stride: frame.stride(index),
            pixel_stride,
        }
    };

    let (y, u, v) = match frame.format() {
        Pixel::YUV420P | Pixel::YUVJ420P => (plane(0, 0, 1), plane(1, 0, 1), plane(2, 0, 1)),
        Pixel::NV12 => (plane(0, 0, 1), plane(1, 0, 2), plane(1, 1, 2)),
        Pixel::NV21 => (plane(0, 0, 1), plane(1, 1, 2), plane(1, 0, 2)),
        other => {
            log::debug!("converting {:?} frame to yuv420p", other);
            let converted = scaler.run(frame)?;
            if converted.format() != Pixel::YUV420P {
                return Err(anyhow::anyhow!("scaler produced {:?}", converted.format()));
            }
            return yuv_picture(&converted, pts_us, scaler);
        }
    };

    Ok(YuvPicture {
        width: frame.width(),
        height: frame.height(),
        pts_us,
        y,
        u,
        v,
    })
}

/// Copies a decoded frame into a packed RGBA buffer, converting through
/// `scaler` (which must target RGBA) unless the frame already is RGBA.
pub fn rgba_picture(
    frame: &ffmpeg_next::frame::Video,
    scaler: &mut Scaler,
) -> anyhow::Result<RgbaPicture> {
    let converted;
    let rgba = if frame.format() == Pixel::RGBA {
        frame
    } else {
        converted = scaler.run(frame)?;
        &converted
    };

    let width = rgba.width();
    let height = rgba.height();
    let row_len = width as usize * 4;
    let stride = rgba.stride(0);
    let src = rgba.data(0);
    let mut data = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = src
            .get(start..start + row_len)
            .ok_or_else(|| anyhow::anyhow!("rgba plane too short at row {}", row))?;
        data.extend_from_slice(line);
    }

    Ok(RgbaPicture {
        width,
        height,
        data,
    })
}
