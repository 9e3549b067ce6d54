//! Graphics backend implementations

pub mod headless;

pub use headless::{DrawCall, DrawKind, FramebufferRecord, HeadlessBackend, RenderState};
