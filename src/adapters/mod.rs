//! Typed entry points for the three camera API styles.
//!
//! Each adapter owns a set of [`SessionHandle`](crate::session::SessionHandle)s
//! allocated from the camera and maps its API's calls onto the shared
//! [`VirtualCamera`](crate::camera::VirtualCamera). When substitution does not
//! apply an adapter returns `None`/`false` and the caller keeps the real
//! camera's output.

pub mod analysis;
pub mod legacy;
pub mod session;

pub use analysis::{AnalysisAdapter, AnalysisFrame};
pub use legacy::LegacyAdapter;
pub use session::{CaptureSessionAdapter, ReaderImage, ReaderPlane};
