//! Backend abstraction trait for the lighting passes
//!
//! The passes drive an immediate-mode, GL-style API: programs with named
//! uniform slots, textures and framebuffers addressed by id, a legacy matrix
//! stack and a handful of fixed-function toggles. Anything that can answer
//! these calls can host the lighting system.

use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::math::{Mat4, Vec4};
use crate::render::RenderResult;

use super::handles::{
    Attachment, AttachmentTarget, BufferId, FramebufferId, MatrixMode, PixelFormat, ProgramHandle,
    ShaderLocation, TextureId, TextureInfo, TextureParameter, TextureTarget, UniformValue,
    VertexArrayId, VertexAttributeType,
};

/// Backend shared between the lighting context and the resources it hands out
///
/// Shadow maps and skyboxes keep a clone so they can release their GPU
/// objects when dropped.
pub type SharedBackend = Rc<RefCell<dyn GraphicsBackend>>;

/// Graphics API consumed by the lighting system
pub trait GraphicsBackend {
    // === Programs ===

    /// Compile and link a program; `None` when compilation fails
    fn load_program(&mut self, vertex_source: &str, fragment_source: &str) -> Option<ProgramHandle>;

    /// Release a program
    fn unload_program(&mut self, program: ProgramHandle);

    /// Look up a vertex attribute by name
    fn attribute_location(&self, program: ProgramHandle, name: &str) -> ShaderLocation;

    /// Look up a uniform by name
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> ShaderLocation;

    /// Bind a program for drawing
    fn enable_program(&mut self, program: ProgramHandle);

    /// Unbind the current program
    fn disable_program(&mut self);

    /// Upload a uniform value to `program`
    ///
    /// Uploads against [`ShaderLocation::NOT_FOUND`] must be ignored.
    fn set_uniform(&mut self, program: ProgramHandle, location: ShaderLocation, value: UniformValue);

    // === Textures ===

    /// The backend's 1x1 white texture
    fn default_texture(&self) -> Option<TextureInfo>;

    /// Description of a live texture
    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo>;

    /// Load a 2D texture from an image path
    fn load_texture_from_file(&mut self, path: &str) -> RenderResult<TextureInfo>;

    /// Load a cubemap from a single image holding all six faces (layout auto-detected)
    fn load_cubemap_from_file(&mut self, path: &str) -> RenderResult<TextureInfo>;

    /// Allocate an empty color cubemap
    fn load_cubemap(&mut self, size: i32, format: PixelFormat) -> Option<TextureId>;

    /// Allocate a sampleable 2D depth texture
    fn load_depth_texture(&mut self, width: i32, height: i32) -> Option<TextureId>;

    /// Allocate a depth renderbuffer
    fn load_depth_renderbuffer(&mut self, width: i32, height: i32) -> Option<TextureId>;

    /// Allocate a six-face depth cubemap
    fn load_depth_cubemap(&mut self, size: i32) -> Option<TextureId>;

    /// Set a sampling parameter
    fn set_texture_parameter(&mut self, texture: TextureId, parameter: TextureParameter);

    /// Release a texture, cubemap or renderbuffer
    fn unload_texture(&mut self, texture: TextureId);

    /// Select the active texture unit
    fn active_texture_slot(&mut self, slot: u32);

    /// Bind a texture to the active unit
    fn enable_texture(&mut self, target: TextureTarget, texture: TextureId);

    /// Unbind the active unit's texture
    fn disable_texture(&mut self, target: TextureTarget);

    // === Framebuffers ===

    /// Create a framebuffer object
    fn load_framebuffer(&mut self, width: i32, height: i32) -> Option<FramebufferId>;

    /// Attach a texture or renderbuffer
    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferId,
        texture: TextureId,
        attachment: Attachment,
        target: AttachmentTarget,
    );

    /// Disable color draw and read buffers (depth-only rendering)
    fn framebuffer_disable_color(&mut self, framebuffer: FramebufferId);

    /// Completeness check
    fn framebuffer_complete(&mut self, framebuffer: FramebufferId) -> bool;

    /// Render into `framebuffer`
    fn enable_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Render into the default framebuffer
    fn disable_framebuffer(&mut self);

    /// Release a framebuffer (attachments are released separately)
    fn unload_framebuffer(&mut self, framebuffer: FramebufferId);

    // === Geometry ===

    /// Create a vertex array object
    fn load_vertex_array(&mut self) -> Option<VertexArrayId>;

    /// Bind a vertex array; `false` when vertex arrays are unsupported
    fn enable_vertex_array(&mut self, vertex_array: VertexArrayId) -> bool;

    /// Unbind the current vertex array
    fn disable_vertex_array(&mut self);

    /// Release a vertex array
    fn unload_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// Upload vertex data
    fn load_vertex_buffer(&mut self, data: &[u8], dynamic: bool) -> Option<BufferId>;

    /// Upload index data
    fn load_index_buffer(&mut self, data: &[u8], dynamic: bool) -> Option<BufferId>;

    /// Bind a vertex buffer
    fn enable_vertex_buffer(&mut self, buffer: BufferId);

    /// Unbind the vertex buffer
    fn disable_vertex_buffer(&mut self);

    /// Bind an index buffer
    fn enable_index_buffer(&mut self, buffer: BufferId);

    /// Unbind the index buffer
    fn disable_index_buffer(&mut self);

    /// Release a vertex or index buffer
    fn unload_buffer(&mut self, buffer: BufferId);

    /// Describe the bound buffer's layout for an attribute
    fn set_vertex_attribute(
        &mut self,
        location: ShaderLocation,
        components: i32,
        kind: VertexAttributeType,
        normalized: bool,
    );

    /// Enable an attribute array
    fn enable_vertex_attribute(&mut self, location: ShaderLocation);

    /// Disable an attribute array
    fn disable_vertex_attribute(&mut self, location: ShaderLocation);

    /// Constant value for an attribute with no bound array
    fn set_vertex_attribute_default(&mut self, location: ShaderLocation, value: Vec4);

    /// Draw non-indexed triangles
    fn draw_arrays(&mut self, first: i32, count: i32);

    /// Draw indexed triangles
    fn draw_elements(&mut self, first: i32, count: i32);

    /// Draw the backend's internal unit cube (used for cubemap generation)
    fn draw_unit_cube(&mut self);

    /// Submit any batched immediate-mode geometry
    fn flush_batch(&mut self);

    // === Fixed-function state ===

    /// Set the viewport rectangle
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    /// Select the matrix stack subsequent matrix calls operate on
    fn matrix_mode(&mut self, mode: MatrixMode);

    /// Push the current matrix
    fn push_matrix(&mut self);

    /// Pop the current matrix
    fn pop_matrix(&mut self);

    /// Reset the current matrix to identity
    fn load_identity(&mut self);

    /// Post-multiply the current matrix (`current = current * matrix`)
    fn mult_matrix(&mut self, matrix: &Mat4);

    /// Current model-view matrix
    fn modelview_matrix(&self) -> Mat4;

    /// Replace the model-view matrix
    fn set_modelview_matrix(&mut self, matrix: Mat4);

    /// Current projection matrix
    fn projection_matrix(&self) -> Mat4;

    /// Replace the projection matrix
    fn set_projection_matrix(&mut self, matrix: Mat4);

    /// Transform accumulated by push/pop inside model-view mode
    fn transform_matrix(&self) -> Mat4;

    /// Toggle depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Toggle depth writes
    fn set_depth_mask(&mut self, enabled: bool);

    /// Toggle color blending
    fn set_color_blend(&mut self, enabled: bool);

    /// Toggle backface culling
    fn set_backface_culling(&mut self, enabled: bool);

    /// Clear color and depth of the bound framebuffer
    fn clear_screen_buffers(&mut self);

    // === Display ===

    /// Whether side-by-side stereo rendering is active
    fn is_stereo_enabled(&self) -> bool;

    /// View offset for one eye
    fn stereo_view_offset(&self, eye: usize) -> Mat4;

    /// Projection for one eye
    fn stereo_projection(&self, eye: usize) -> Mat4;

    /// Window size in screen coordinates
    fn screen_size(&self) -> (i32, i32);

    /// Default framebuffer size in pixels
    fn framebuffer_size(&self) -> (i32, i32);
}
