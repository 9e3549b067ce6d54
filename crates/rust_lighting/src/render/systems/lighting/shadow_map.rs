//! Depth render targets for shadow casting lights

use crate::render::api::{
    Attachment, AttachmentTarget, FramebufferId, SharedBackend, TextureFilter, TextureId, TextureInfo,
    TextureParameter, TextureWrap,
};
use crate::render::{RenderError, RenderResult};

/// Depth target shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowTarget {
    /// Single 2D depth texture (directional and spot lights)
    Planar,
    /// Six-face depth cubemap (omni lights)
    Cube,
}

/// Snapshot of a shadow map for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapInfo {
    /// Depth texture description
    pub texture: TextureInfo,
    /// Framebuffer the depth texture is attached to
    pub framebuffer: FramebufferId,
    /// Square resolution
    pub resolution: i32,
    /// Target shape
    pub target: ShadowTarget,
}

/// Depth texture plus framebuffer, released on drop
pub struct ShadowMap {
    backend: SharedBackend,
    framebuffer: FramebufferId,
    depth: TextureId,
    resolution: i32,
    target: ShadowTarget,
}

impl std::fmt::Debug for ShadowMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowMap")
            .field("framebuffer", &self.framebuffer)
            .field("depth", &self.depth)
            .field("resolution", &self.resolution)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl ShadowMap {
    /// Allocate a depth target of `resolution` x `resolution`
    ///
    /// An incomplete framebuffer is logged but still returned.
    pub fn new(backend: &SharedBackend, target: ShadowTarget, resolution: i32) -> RenderResult<Self> {
        if resolution <= 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "Shadow map resolution must be positive, got {resolution}"
            )));
        }

        let mut gpu = backend.borrow_mut();
        let framebuffer = gpu
            .load_framebuffer(resolution, resolution)
            .ok_or_else(|| RenderError::ResourceCreationFailed("Shadow framebuffer allocation failed".to_string()))?;

        let depth = match target {
            ShadowTarget::Cube => gpu.load_depth_cubemap(resolution),
            ShadowTarget::Planar => gpu.load_depth_texture(resolution, resolution),
        };
        let Some(depth) = depth else {
            gpu.unload_framebuffer(framebuffer);
            return Err(RenderError::ResourceCreationFailed(format!(
                "Shadow depth {target:?} allocation failed ({resolution}x{resolution})"
            )));
        };

        match target {
            ShadowTarget::Cube => {
                for parameter in [
                    TextureParameter::MinFilter(TextureFilter::Nearest),
                    TextureParameter::MagFilter(TextureFilter::Nearest),
                    TextureParameter::WrapS(TextureWrap::ClampToEdge),
                    TextureParameter::WrapT(TextureWrap::ClampToEdge),
                    TextureParameter::WrapR(TextureWrap::ClampToEdge),
                ] {
                    gpu.set_texture_parameter(depth, parameter);
                }
                gpu.framebuffer_attach(framebuffer, depth, Attachment::Depth, AttachmentTarget::Cubemap);
                gpu.framebuffer_disable_color(framebuffer);
            }
            ShadowTarget::Planar => {
                gpu.set_texture_parameter(depth, TextureParameter::WrapS(TextureWrap::ClampToEdge));
                gpu.set_texture_parameter(depth, TextureParameter::WrapT(TextureWrap::ClampToEdge));
                gpu.framebuffer_attach(framebuffer, depth, Attachment::Depth, AttachmentTarget::Texture2D);
            }
        }

        if gpu.framebuffer_complete(framebuffer) {
            log::debug!(
                "SHADOW: [FBO {}] {target:?} shadow map created ({resolution}x{resolution})",
                framebuffer.0
            );
        } else {
            log::error!("SHADOW: [FBO {}] Framebuffer is not complete", framebuffer.0);
        }

        Ok(Self { backend: backend.clone(), framebuffer, depth, resolution, target })
    }

    /// Square resolution
    pub const fn resolution(&self) -> i32 {
        self.resolution
    }

    /// Target shape
    pub const fn target(&self) -> ShadowTarget {
        self.target
    }

    /// Framebuffer to render depth into
    pub const fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    /// Depth texture or cubemap
    pub const fn depth_texture(&self) -> TextureId {
        self.depth
    }

    /// Size of one texel in UV units
    pub fn texel_size(&self) -> f32 {
        1.0 / self.resolution as f32
    }

    /// Inspection snapshot
    pub fn info(&self) -> Option<ShadowMapInfo> {
        let texture = self.backend.try_borrow().ok()?.texture_info(self.depth)?;
        Some(ShadowMapInfo {
            texture,
            framebuffer: self.framebuffer,
            resolution: self.resolution,
            target: self.target,
        })
    }
}

impl Drop for ShadowMap {
    fn drop(&mut self) {
        let Ok(mut gpu) = self.backend.try_borrow_mut() else {
            log::error!("SHADOW: [FBO {}] Backend busy during release, shadow map leaked", self.framebuffer.0);
            return;
        };
        gpu.unload_texture(self.depth);
        gpu.unload_framebuffer(self.framebuffer);
        log::debug!("SHADOW: [FBO {}] Shadow map released", self.framebuffer.0);
    }
}
