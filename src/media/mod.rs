//! Pixel-level building blocks: sizes, format conversion and geometry.

pub mod convert;
pub mod size;
pub mod transform;
pub mod types;
