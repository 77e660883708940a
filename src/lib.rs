//! Camera frame substitution.
//!
//! A [`camera::VirtualCamera`] answers camera requests with frames taken from
//! a still image or a looping video instead of a sensor. Requests arrive
//! through the typed adapters in [`adapters`], either as one-shot pulls
//! ("give me an NV21 frame of this size") or as delivery targets that are
//! repainted continuously by the [`scheduler`].
//!
//! ```text
//! SettingsStore ─► FramePipeline ─► source (still | VideoDecodeEngine)
//!                       │
//!                       ├─► scale / orient / mirror ─► NV21 | YUV420 | JPEG
//!                       │
//!   adapters ──► VirtualCamera ──► SessionRegistry ──► DeliveryScheduler ─► targets
//!                       │
//!                       └─► DiagnosticsSink
//! ```

pub mod adapters;
pub mod camera;
pub mod config;
pub mod diagnostics;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod target;
pub mod video;

pub use camera::{CameraApi, VirtualCamera};
pub use config::{SettingsStore, SourceConfig};
pub use media::types::{EncodedFrame, OutputFormat, Size};
pub use pipeline::FramePipeline;
