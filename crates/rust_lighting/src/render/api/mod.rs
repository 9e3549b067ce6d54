//! Rendering API
//!
//! The backend trait and the handle types that cross it.

pub mod handles;
pub mod render_backend;

pub use handles::*;
pub use render_backend::{GraphicsBackend, SharedBackend};
