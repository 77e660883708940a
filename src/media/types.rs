use std::fmt::{Display, Formatter};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Chroma plane size for 4:2:0 subsampling (odd dimensions round up).
    pub fn chroma(&self) -> Size {
        Size::new(self.width.div_ceil(2), self.height.div_ceil(2))
    }
}

impl Display for Size {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format a caller asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Y plane followed by interleaved V/U at quarter resolution.
    #[default]
    Nv21,
    /// Three 4:2:0 planes.
    Yuv420,
    /// Baseline JPEG.
    Jpeg,
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Nv21 => "NV21",
            OutputFormat::Yuv420 => "YUV_420_888",
            OutputFormat::Jpeg => "JPEG",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned plane of an encoded frame.
#[derive(Clone, Debug)]
pub struct PlaneData {
    pub data: Bytes,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

#[derive(Clone, Debug)]
pub enum FramePayload {
    Packed(Bytes),
    Planar {
        y: PlaneData,
        u: PlaneData,
        v: PlaneData,
    },
}

/// A frame ready to hand to a caller.
#[derive(Clone, Debug)]
pub struct EncodedFrame {
    pub size: Size,
    pub format: OutputFormat,
    pub payload: FramePayload,
}

impl EncodedFrame {
    pub fn len(&self) -> usize {
        match &self.payload {
            FramePayload::Packed(data) => data.len(),
            FramePayload::Planar { y, u, v } => y.data.len() + u.data.len() + v.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contiguous bytes; planar payloads are concatenated Y, U, V.
    pub fn to_bytes(&self) -> Bytes {
        match &self.payload {
            FramePayload::Packed(data) => data.clone(),
            FramePayload::Planar { y, u, v } => {
                let mut out = BytesMut::with_capacity(self.len());
                out.extend_from_slice(&y.data);
                out.extend_from_slice(&u.data);
                out.extend_from_slice(&v.data);
                out.freeze()
            }
        }
    }
}

/// Caller-owned plane to write samples into.
pub struct PlaneMut<'a> {
    pub data: &'a mut [u8],
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl<'a> PlaneMut<'a> {
    pub fn new(data: &'a mut [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Bytes needed to address `cols x rows` samples with these strides.
    pub fn required_len(&self, cols: usize, rows: usize) -> usize {
        if cols == 0 || rows == 0 {
            return 0;
        }
        (rows - 1) * self.row_stride + (cols - 1) * self.pixel_stride + 1
    }

    pub fn put(&mut self, col: usize, row: usize, value: u8) {
        self.data[row * self.row_stride + col * self.pixel_stride] = value;
    }
}

/// Destination for planar 4:2:0 output. Chroma planes may use different strides.
pub struct PlanarFrameMut<'a> {
    pub size: Size,
    pub y: PlaneMut<'a>,
    pub u: PlaneMut<'a>,
    pub v: PlaneMut<'a>,
}
