//! In-memory graphics backend
//!
//! Tracks every object the lighting system creates and records every uniform
//! upload, draw call and state toggle, without touching a GPU. Tests use it to
//! check resource lifetimes and upload traffic; the demo app uses it to run a
//! frame headless.
//!
//! Uniform and attribute names resolve when the root identifier (the part
//! before any `[` or `.`) appears in the program source, mirroring how a GLSL
//! compiler strips unused declarations only coarsely. Names can additionally
//! be hidden to simulate uniforms the compiler optimized away.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::api::{
    Attachment, AttachmentTarget, BufferId, FramebufferId, GraphicsBackend, MatrixMode, PixelFormat,
    ProgramHandle, ShaderLocation, TextureId, TextureInfo, TextureKind, TextureParameter,
    TextureTarget, UniformValue, VertexArrayId, VertexAttributeType,
};
use crate::render::{RenderError, RenderResult};

/// Default window size
const DEFAULT_SCREEN_SIZE: (i32, i32) = (800, 450);

/// Half inter-pupillary distance used for the stereo view offsets
const STEREO_HALF_IPD: f32 = 0.032;

/// Kind of draw submitted to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    /// `draw_arrays`
    Arrays,
    /// `draw_elements`
    Elements,
    /// `draw_unit_cube`
    UnitCube,
}

/// Snapshot of one draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// What was drawn
    pub kind: DrawKind,
    /// Vertex or index count
    pub count: i32,
    /// Program bound at submission
    pub program: Option<ProgramHandle>,
    /// Framebuffer bound at submission, `None` for the screen
    pub framebuffer: Option<FramebufferId>,
    /// Viewport at submission
    pub viewport: (i32, i32, i32, i32),
    /// Texture units in use, sorted by unit
    pub textures: Vec<(u32, TextureTarget, TextureId)>,
}

/// Fixed-function toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    /// Depth testing
    pub depth_test: bool,
    /// Depth writes
    pub depth_mask: bool,
    /// Color blending
    pub color_blend: bool,
    /// Backface culling
    pub backface_culling: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_mask: true,
            color_blend: true,
            backface_culling: true,
        }
    }
}

/// A live framebuffer and its attachments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FramebufferRecord {
    /// Size requested at creation
    pub size: (i32, i32),
    /// Depth attachment
    pub depth: Option<(TextureId, AttachmentTarget)>,
    /// Color attachments by channel
    pub color: HashMap<u32, (TextureId, AttachmentTarget)>,
    /// Whether draw/read color buffers were disabled
    pub color_disabled: bool,
}

#[derive(Debug)]
struct ProgramRecord {
    source: String,
    locations: RefCell<HashMap<String, ShaderLocation>>,
}

#[derive(Debug)]
struct TextureRecord {
    info: TextureInfo,
    parameters: Vec<TextureParameter>,
}

/// Backend that records instead of rendering
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: u32,
    next_location: RefCell<i32>,
    default_texture: TextureInfo,

    programs: HashMap<ProgramHandle, ProgramRecord>,
    textures: HashMap<TextureId, TextureRecord>,
    framebuffers: HashMap<FramebufferId, FramebufferRecord>,
    vertex_arrays: HashSet<VertexArrayId>,
    buffers: HashMap<BufferId, usize>,
    images: HashMap<String, (i32, i32)>,
    hidden_names: HashSet<String>,

    vertex_arrays_supported: bool,
    stereo: bool,
    screen_size: (i32, i32),

    bound_program: Option<ProgramHandle>,
    bound_framebuffer: Option<FramebufferId>,
    active_slot: u32,
    bound_textures: HashMap<u32, (TextureTarget, TextureId)>,
    render_state: RenderState,
    viewport: (i32, i32, i32, i32),
    matrix_mode: MatrixMode,
    modelview: Mat4,
    projection: Mat4,
    matrix_stack: Vec<(MatrixMode, Mat4)>,

    uniform_values: HashMap<(ProgramHandle, ShaderLocation), UniformValue>,
    upload_counts: HashMap<(ProgramHandle, ShaderLocation), usize>,
    draw_calls: Vec<DrawCall>,
    flush_count: usize,
    clear_count: usize,
    invalid_releases: usize,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Create a backend with an 800x450 screen and vertex array support
    pub fn new() -> Self {
        let default_texture = TextureInfo {
            id: TextureId(1),
            width: 1,
            height: 1,
            kind: TextureKind::Texture2D,
            format: PixelFormat::R8G8B8A8,
        };

        Self {
            next_id: 2,
            next_location: RefCell::new(0),
            default_texture,
            programs: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            vertex_arrays: HashSet::new(),
            buffers: HashMap::new(),
            images: HashMap::new(),
            hidden_names: HashSet::new(),
            vertex_arrays_supported: true,
            stereo: false,
            screen_size: DEFAULT_SCREEN_SIZE,
            bound_program: None,
            bound_framebuffer: None,
            active_slot: 0,
            bound_textures: HashMap::new(),
            render_state: RenderState::default(),
            viewport: (0, 0, DEFAULT_SCREEN_SIZE.0, DEFAULT_SCREEN_SIZE.1),
            matrix_mode: MatrixMode::ModelView,
            modelview: Mat4::identity(),
            projection: Mat4::identity(),
            matrix_stack: Vec::new(),
            uniform_values: HashMap::new(),
            upload_counts: HashMap::new(),
            draw_calls: Vec::new(),
            flush_count: 0,
            clear_count: 0,
            invalid_releases: 0,
        }
    }

    /// Set the screen and default framebuffer size
    pub fn with_screen_size(mut self, width: i32, height: i32) -> Self {
        self.screen_size = (width, height);
        self.viewport = (0, 0, width, height);
        self
    }

    /// Enable side-by-side stereo rendering
    pub fn with_stereo(mut self, enabled: bool) -> Self {
        self.stereo = enabled;
        self
    }

    /// Report vertex arrays as unsupported, forcing buffer-by-buffer binding
    pub fn without_vertex_arrays(mut self) -> Self {
        self.vertex_arrays_supported = false;
        self
    }

    /// Make `name` resolve to [`ShaderLocation::NOT_FOUND`] in every program
    pub fn hide_name(&mut self, name: &str) {
        self.hidden_names.insert(name.to_string());
    }

    /// Register an image so file loads of `path` succeed with the given size
    pub fn register_image(&mut self, path: &str, width: i32, height: i32) {
        self.images.insert(path.to_string(), (width, height));
    }

    /// Last value uploaded to `name` in `program`
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        let location = self.resolved_location(program, name)?;
        self.uniform_values.get(&(program, location)).copied()
    }

    /// Number of uploads to `name` in `program`
    pub fn upload_count(&self, program: ProgramHandle, name: &str) -> usize {
        self.resolved_location(program, name)
            .and_then(|location| self.upload_counts.get(&(program, location)).copied())
            .unwrap_or(0)
    }

    /// Total uploads across all programs and locations
    pub fn total_uploads(&self) -> usize {
        self.upload_counts.values().sum()
    }

    /// Draw calls in submission order
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    /// Forget recorded draw calls and upload counts
    pub fn clear_recording(&mut self) {
        self.draw_calls.clear();
        self.upload_counts.clear();
        self.flush_count = 0;
        self.clear_count = 0;
    }

    /// Live textures, excluding the default texture
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Live framebuffers
    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Live vertex and index buffers
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Live vertex arrays
    pub fn live_vertex_array_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Live programs
    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    /// Releases of ids that were not live (double frees)
    pub fn invalid_release_count(&self) -> usize {
        self.invalid_releases
    }

    /// Framebuffer record
    pub fn framebuffer(&self, framebuffer: FramebufferId) -> Option<&FramebufferRecord> {
        self.framebuffers.get(&framebuffer)
    }

    /// Sampling parameters set on a texture, in call order
    pub fn texture_parameters(&self, texture: TextureId) -> &[TextureParameter] {
        self.textures.get(&texture).map_or(&[], |record| record.parameters.as_slice())
    }

    /// Current fixed-function toggles
    pub fn render_state(&self) -> RenderState {
        self.render_state
    }

    /// Current viewport
    pub fn current_viewport(&self) -> (i32, i32, i32, i32) {
        self.viewport
    }

    /// Currently bound framebuffer
    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bound_framebuffer
    }

    /// Currently bound program
    pub fn bound_program(&self) -> Option<ProgramHandle> {
        self.bound_program
    }

    /// Depth of the matrix stack
    pub fn matrix_stack_depth(&self) -> usize {
        self.matrix_stack.len()
    }

    /// Number of `flush_batch` calls
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    /// Number of `clear_screen_buffers` calls
    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_texture(&mut self, width: i32, height: i32, kind: TextureKind, format: PixelFormat) -> TextureId {
        let id = TextureId(self.allocate_id());
        let info = TextureInfo { id, width, height, kind, format };
        self.textures.insert(id, TextureRecord { info, parameters: Vec::new() });
        id
    }

    fn image_size(&self, path: &str) -> RenderResult<(i32, i32)> {
        if let Some(&size) = self.images.get(path) {
            return Ok(size);
        }
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| RenderError::ResourceCreationFailed(format!("Failed to load image '{path}': {e}")))?;
        Ok((width as i32, height as i32))
    }

    fn resolved_location(&self, program: ProgramHandle, name: &str) -> Option<ShaderLocation> {
        let record = self.programs.get(&program)?;
        let locations = record.locations.borrow();
        locations.get(name).copied().filter(|location| location.is_found())
    }

    fn lookup(&self, program: ProgramHandle, name: &str) -> ShaderLocation {
        let Some(record) = self.programs.get(&program) else {
            return ShaderLocation::NOT_FOUND;
        };
        if let Some(&location) = record.locations.borrow().get(name) {
            return location;
        }

        let root = name.split(['[', '.']).next().unwrap_or(name);
        let location = if self.hidden_names.contains(name) || root.is_empty() || !record.source.contains(root) {
            ShaderLocation::NOT_FOUND
        } else {
            let mut next = self.next_location.borrow_mut();
            let location = ShaderLocation(*next);
            *next += 1;
            location
        };
        record.locations.borrow_mut().insert(name.to_string(), location);
        location
    }

    fn release<K: std::hash::Hash + Eq, V>(map: &mut HashMap<K, V>, key: &K, invalid: &mut usize) {
        if map.remove(key).is_none() {
            *invalid += 1;
        }
    }

    fn current_matrix_mut(&mut self) -> &mut Mat4 {
        match self.matrix_mode {
            MatrixMode::Projection => &mut self.projection,
            MatrixMode::ModelView => &mut self.modelview,
        }
    }

    fn record_draw(&mut self, kind: DrawKind, count: i32) {
        let mut textures: Vec<_> = self
            .bound_textures
            .iter()
            .map(|(&slot, &(target, id))| (slot, target, id))
            .collect();
        textures.sort_by_key(|&(slot, _, _)| slot);

        self.draw_calls.push(DrawCall {
            kind,
            count,
            program: self.bound_program,
            framebuffer: self.bound_framebuffer,
            viewport: self.viewport,
            textures,
        });
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn load_program(&mut self, vertex_source: &str, fragment_source: &str) -> Option<ProgramHandle> {
        if vertex_source.trim().is_empty() || fragment_source.trim().is_empty() {
            log::warn!("SHADER: Empty source, program not linked");
            return None;
        }
        let handle = ProgramHandle(self.allocate_id());
        self.programs.insert(
            handle,
            ProgramRecord {
                source: format!("{vertex_source}\n{fragment_source}"),
                locations: RefCell::new(HashMap::new()),
            },
        );
        log::debug!("SHADER: [ID {}] Program loaded", handle.0);
        Some(handle)
    }

    fn unload_program(&mut self, program: ProgramHandle) {
        Self::release(&mut self.programs, &program, &mut self.invalid_releases);
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> ShaderLocation {
        self.lookup(program, name)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> ShaderLocation {
        self.lookup(program, name)
    }

    fn enable_program(&mut self, program: ProgramHandle) {
        self.bound_program = Some(program);
    }

    fn disable_program(&mut self) {
        self.bound_program = None;
    }

    fn set_uniform(&mut self, program: ProgramHandle, location: ShaderLocation, value: UniformValue) {
        if !location.is_found() || !self.programs.contains_key(&program) {
            return;
        }
        self.uniform_values.insert((program, location), value);
        *self.upload_counts.entry((program, location)).or_insert(0) += 1;
    }

    fn default_texture(&self) -> Option<TextureInfo> {
        Some(self.default_texture)
    }

    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo> {
        if texture == self.default_texture.id {
            return Some(self.default_texture);
        }
        self.textures.get(&texture).map(|record| record.info)
    }

    fn load_texture_from_file(&mut self, path: &str) -> RenderResult<TextureInfo> {
        let (width, height) = self.image_size(path)?;
        let id = self.insert_texture(width, height, TextureKind::Texture2D, PixelFormat::R8G8B8A8);
        self.texture_info(id)
            .ok_or_else(|| RenderError::ResourceCreationFailed(format!("Texture '{path}' vanished")))
    }

    fn load_cubemap_from_file(&mut self, path: &str) -> RenderResult<TextureInfo> {
        let (width, height) = self.image_size(path)?;
        let face = if width * 6 == height {
            width
        } else if height * 6 == width {
            height
        } else if width * 4 == height * 3 {
            width / 3
        } else if width * 3 == height * 4 {
            width / 4
        } else {
            return Err(RenderError::ResourceCreationFailed(format!(
                "Cubemap image '{path}' ({width}x{height}) has no recognizable face layout"
            )));
        };
        let id = self.insert_texture(face, face, TextureKind::Cubemap, PixelFormat::R8G8B8A8);
        self.texture_info(id)
            .ok_or_else(|| RenderError::ResourceCreationFailed(format!("Cubemap '{path}' vanished")))
    }

    fn load_cubemap(&mut self, size: i32, format: PixelFormat) -> Option<TextureId> {
        (size > 0).then(|| self.insert_texture(size, size, TextureKind::Cubemap, format))
    }

    fn load_depth_texture(&mut self, width: i32, height: i32) -> Option<TextureId> {
        (width > 0 && height > 0).then(|| self.insert_texture(width, height, TextureKind::Depth2D, PixelFormat::Depth))
    }

    fn load_depth_renderbuffer(&mut self, width: i32, height: i32) -> Option<TextureId> {
        (width > 0 && height > 0)
            .then(|| self.insert_texture(width, height, TextureKind::DepthRenderbuffer, PixelFormat::Depth))
    }

    fn load_depth_cubemap(&mut self, size: i32) -> Option<TextureId> {
        (size > 0).then(|| self.insert_texture(size, size, TextureKind::DepthCubemap, PixelFormat::Depth))
    }

    fn set_texture_parameter(&mut self, texture: TextureId, parameter: TextureParameter) {
        if let Some(record) = self.textures.get_mut(&texture) {
            record.parameters.push(parameter);
        }
    }

    fn unload_texture(&mut self, texture: TextureId) {
        if texture == self.default_texture.id {
            return;
        }
        Self::release(&mut self.textures, &texture, &mut self.invalid_releases);
        self.bound_textures.retain(|_, &mut (_, id)| id != texture);
    }

    fn active_texture_slot(&mut self, slot: u32) {
        self.active_slot = slot;
    }

    fn enable_texture(&mut self, target: TextureTarget, texture: TextureId) {
        self.bound_textures.insert(self.active_slot, (target, texture));
    }

    fn disable_texture(&mut self, target: TextureTarget) {
        if matches!(self.bound_textures.get(&self.active_slot), Some(&(bound, _)) if bound == target) {
            self.bound_textures.remove(&self.active_slot);
        }
    }

    fn load_framebuffer(&mut self, width: i32, height: i32) -> Option<FramebufferId> {
        let id = FramebufferId(self.allocate_id());
        self.framebuffers.insert(id, FramebufferRecord { size: (width, height), ..FramebufferRecord::default() });
        Some(id)
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferId,
        texture: TextureId,
        attachment: Attachment,
        target: AttachmentTarget,
    ) {
        let Some(record) = self.framebuffers.get_mut(&framebuffer) else {
            return;
        };
        match attachment {
            Attachment::Depth => record.depth = Some((texture, target)),
            Attachment::Color(channel) => {
                record.color.insert(channel, (texture, target));
            }
        }
    }

    fn framebuffer_disable_color(&mut self, framebuffer: FramebufferId) {
        if let Some(record) = self.framebuffers.get_mut(&framebuffer) {
            record.color_disabled = true;
        }
    }

    fn framebuffer_complete(&mut self, framebuffer: FramebufferId) -> bool {
        let Some(record) = self.framebuffers.get(&framebuffer) else {
            return false;
        };
        let live = |&(id, _): &(TextureId, AttachmentTarget)| self.textures.contains_key(&id);
        let depth_ok = record.depth.as_ref().map_or(true, live);
        let color_ok = record.color.values().all(live);
        let has_attachment = record.depth.is_some() || !record.color.is_empty();
        has_attachment && depth_ok && color_ok
    }

    fn enable_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.bound_framebuffer = Some(framebuffer);
    }

    fn disable_framebuffer(&mut self) {
        self.bound_framebuffer = None;
    }

    fn unload_framebuffer(&mut self, framebuffer: FramebufferId) {
        Self::release(&mut self.framebuffers, &framebuffer, &mut self.invalid_releases);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn load_vertex_array(&mut self) -> Option<VertexArrayId> {
        if !self.vertex_arrays_supported {
            return None;
        }
        let id = VertexArrayId(self.allocate_id());
        self.vertex_arrays.insert(id);
        Some(id)
    }

    fn enable_vertex_array(&mut self, vertex_array: VertexArrayId) -> bool {
        self.vertex_arrays_supported && self.vertex_arrays.contains(&vertex_array)
    }

    fn disable_vertex_array(&mut self) {}

    fn unload_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if !self.vertex_arrays.remove(&vertex_array) {
            self.invalid_releases += 1;
        }
    }

    fn load_vertex_buffer(&mut self, data: &[u8], _dynamic: bool) -> Option<BufferId> {
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, data.len());
        Some(id)
    }

    fn load_index_buffer(&mut self, data: &[u8], dynamic: bool) -> Option<BufferId> {
        self.load_vertex_buffer(data, dynamic)
    }

    fn enable_vertex_buffer(&mut self, _buffer: BufferId) {}

    fn disable_vertex_buffer(&mut self) {}

    fn enable_index_buffer(&mut self, _buffer: BufferId) {}

    fn disable_index_buffer(&mut self) {}

    fn unload_buffer(&mut self, buffer: BufferId) {
        Self::release(&mut self.buffers, &buffer, &mut self.invalid_releases);
    }

    fn set_vertex_attribute(
        &mut self,
        _location: ShaderLocation,
        _components: i32,
        _kind: VertexAttributeType,
        _normalized: bool,
    ) {
    }

    fn enable_vertex_attribute(&mut self, _location: ShaderLocation) {}

    fn disable_vertex_attribute(&mut self, _location: ShaderLocation) {}

    fn set_vertex_attribute_default(&mut self, _location: ShaderLocation, _value: Vec4) {}

    fn draw_arrays(&mut self, _first: i32, count: i32) {
        self.record_draw(DrawKind::Arrays, count);
    }

    fn draw_elements(&mut self, _first: i32, count: i32) {
        self.record_draw(DrawKind::Elements, count);
    }

    fn draw_unit_cube(&mut self) {
        self.record_draw(DrawKind::UnitCube, 36);
    }

    fn flush_batch(&mut self) {
        self.flush_count += 1;
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.viewport = (x, y, width, height);
    }

    fn matrix_mode(&mut self, mode: MatrixMode) {
        self.matrix_mode = mode;
    }

    fn push_matrix(&mut self) {
        let current = *self.current_matrix_mut();
        self.matrix_stack.push((self.matrix_mode, current));
    }

    fn pop_matrix(&mut self) {
        match self.matrix_stack.pop() {
            Some((mode, matrix)) => match mode {
                MatrixMode::Projection => self.projection = matrix,
                MatrixMode::ModelView => self.modelview = matrix,
            },
            None => log::warn!("Matrix stack underflow"),
        }
    }

    fn load_identity(&mut self) {
        *self.current_matrix_mut() = Mat4::identity();
    }

    fn mult_matrix(&mut self, matrix: &Mat4) {
        let current = self.current_matrix_mut();
        *current *= matrix;
    }

    fn modelview_matrix(&self) -> Mat4 {
        self.modelview
    }

    fn set_modelview_matrix(&mut self, matrix: Mat4) {
        self.modelview = matrix;
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    fn set_projection_matrix(&mut self, matrix: Mat4) {
        self.projection = matrix;
    }

    fn transform_matrix(&self) -> Mat4 {
        // No immediate-mode batching, so nothing accumulates between push/pop.
        Mat4::identity()
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.render_state.depth_test = enabled;
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.render_state.depth_mask = enabled;
    }

    fn set_color_blend(&mut self, enabled: bool) {
        self.render_state.color_blend = enabled;
    }

    fn set_backface_culling(&mut self, enabled: bool) {
        self.render_state.backface_culling = enabled;
    }

    fn clear_screen_buffers(&mut self) {
        self.clear_count += 1;
    }

    fn is_stereo_enabled(&self) -> bool {
        self.stereo
    }

    fn stereo_view_offset(&self, eye: usize) -> Mat4 {
        let offset = if eye == 0 { STEREO_HALF_IPD } else { -STEREO_HALF_IPD };
        Mat4::new_translation(&Vec3::new(offset, 0.0, 0.0))
    }

    fn stereo_projection(&self, _eye: usize) -> Mat4 {
        self.projection
    }

    fn screen_size(&self) -> (i32, i32) {
        self.screen_size
    }

    fn framebuffer_size(&self) -> (i32, i32) {
        self.screen_size
    }
}
