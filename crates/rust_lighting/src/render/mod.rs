//! Rendering module
//!
//! Everything between the application and the graphics API:
//! - `api`: the [`GraphicsBackend`] abstraction and its handle types
//! - `backends`: concrete backends (an in-memory recorder ships with the crate)
//! - `primitives`: meshes, materials and models as the passes consume them
//! - `shaders`: embedded GLSL programs and custom source overrides
//! - `systems`: the lighting context, shadow and lighting passes, skyboxes

pub mod api;
pub mod backends;
pub mod primitives;
pub mod shaders;
pub mod systems;

pub use api::{GraphicsBackend, SharedBackend};

/// Errors that can occur during rendering operations
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Context or program setup failed
    ///
    /// Raised when the backend cannot provide the resources every lighting
    /// context depends on, such as the default texture.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// Resource creation or management failed
    ///
    /// Covers textures, cubemaps and framebuffers that the backend refused to
    /// create, and image sources it could not resolve.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
