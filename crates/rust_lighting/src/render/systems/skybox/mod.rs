//! Skybox loading, irradiance generation and drawing
//!
//! A [`Skybox`] owns an environment cubemap, its diffuse irradiance cubemap
//! and a unit cube to draw it with. LDR skyboxes come from a single image
//! holding all six faces; HDR skyboxes come from an equirectangular panorama
//! rendered into a cubemap. Either way the irradiance map is convolved right
//! after loading so it can be bound to the lighting program's irradiance slot.

use std::cell::Cell;

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::api::{
    Attachment, AttachmentTarget, BufferId, CubemapFace, PixelFormat, ShaderLocation, SharedBackend, TextureFilter,
    TextureId, TextureInfo, TextureParameter, TextureTarget, UniformValue, VertexArrayId, VertexAttributeType,
};
use crate::render::shaders::ShaderKind;
use crate::render::systems::lighting::{AuxUniform, LightingContext};
use crate::render::{RenderError, RenderResult};

/// Cube corner positions
const CUBE_POSITIONS: [[f32; 3]; 8] = [
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
];

/// Triangle indices into [`CUBE_POSITIONS`]
const CUBE_INDICES: [u16; 36] = [
    0, 1, 2, 2, 3, 0, // front
    1, 5, 6, 6, 2, 1, // right
    5, 4, 7, 7, 6, 5, // back
    4, 0, 3, 3, 7, 4, // left
    3, 2, 6, 6, 7, 3, // top
    4, 5, 1, 1, 0, 4, // bottom
];

/// Smallest irradiance face size
const MIN_IRRADIANCE_SIZE: i32 = 8;

/// Depth range for cubemap face rendering
const CUBEMAP_NEAR: f32 = 0.1;
const CUBEMAP_FAR: f32 = 10.0;

/// Skybox program state kept by the lighting context
#[derive(Debug, Default)]
pub struct SkyboxRenderer {
    last_drawn: Cell<Option<(TextureId, bool)>>,
}

impl SkyboxRenderer {
    /// Cubemap drawn last, if any
    pub fn last_cubemap(&self) -> Option<TextureId> {
        self.last_drawn.get().map(|(cubemap, _)| cubemap)
    }

    /// Record `cubemap` as drawn; `true` when the id or the HDR flag differs
    /// from the last draw (released ids get reused)
    fn switch_to(&self, cubemap: TextureId, is_hdr: bool) -> bool {
        let drawn = Some((cubemap, is_hdr));
        self.last_drawn.replace(drawn) != drawn
    }
}

/// Unit cube for skybox drawing
struct CubeGeometry {
    backend: SharedBackend,
    vertex_array: Option<VertexArrayId>,
    positions: BufferId,
    indices: BufferId,
}

impl CubeGeometry {
    fn upload(backend: &SharedBackend, position: ShaderLocation) -> RenderResult<Self> {
        let mut gpu = backend.borrow_mut();
        let vertex_array = gpu.load_vertex_array();
        if let Some(vao) = vertex_array {
            gpu.enable_vertex_array(vao);
        }

        let Some(positions) = gpu.load_vertex_buffer(bytemuck::cast_slice(&CUBE_POSITIONS), false) else {
            if let Some(vao) = vertex_array {
                gpu.unload_vertex_array(vao);
            }
            return Err(RenderError::ResourceCreationFailed("Skybox vertex buffer allocation failed".to_string()));
        };
        if position.is_found() {
            gpu.set_vertex_attribute(position, 3, VertexAttributeType::Float, false);
            gpu.enable_vertex_attribute(position);
        }

        let Some(indices) = gpu.load_index_buffer(bytemuck::cast_slice(&CUBE_INDICES), false) else {
            gpu.unload_buffer(positions);
            if let Some(vao) = vertex_array {
                gpu.unload_vertex_array(vao);
            }
            return Err(RenderError::ResourceCreationFailed("Skybox index buffer allocation failed".to_string()));
        };
        gpu.disable_vertex_array();

        Ok(Self { backend: backend.clone(), vertex_array, positions, indices })
    }
}

impl Drop for CubeGeometry {
    fn drop(&mut self) {
        let Ok(mut gpu) = self.backend.try_borrow_mut() else {
            log::error!("SKYBOX: Backend busy during release, cube geometry leaked");
            return;
        };
        if let Some(vao) = self.vertex_array.take() {
            gpu.unload_vertex_array(vao);
        }
        gpu.unload_buffer(self.positions);
        gpu.unload_buffer(self.indices);
    }
}

/// Environment cubemap plus irradiance, released on drop
pub struct Skybox {
    geometry: CubeGeometry,
    cubemap: TextureInfo,
    irradiance: TextureInfo,
    is_hdr: bool,
}

impl std::fmt::Debug for Skybox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skybox")
            .field("cubemap", &self.cubemap)
            .field("irradiance", &self.irradiance)
            .field("is_hdr", &self.is_hdr)
            .finish_non_exhaustive()
    }
}

impl Skybox {
    /// Environment cubemap
    pub const fn cubemap(&self) -> TextureInfo {
        self.cubemap
    }

    /// Diffuse irradiance cubemap
    pub const fn irradiance(&self) -> TextureInfo {
        self.irradiance
    }

    /// Whether the cubemap holds HDR data (tone mapped when drawn)
    pub const fn is_hdr(&self) -> bool {
        self.is_hdr
    }

    /// Release every backend object now
    pub fn unload(self) {
        drop(self);
    }
}

impl Drop for Skybox {
    fn drop(&mut self) {
        let Ok(mut gpu) = self.geometry.backend.try_borrow_mut() else {
            log::error!("SKYBOX: Backend busy during release, cubemaps leaked");
            return;
        };
        gpu.unload_texture(self.cubemap.id);
        gpu.unload_texture(self.irradiance.id);
        log::debug!("SKYBOX: [ID {}] Skybox released", self.cubemap.id.0);
    }
}

/// Source sampled while rendering into a cubemap
struct CubemapSource {
    kind: ShaderKind,
    sampler: AuxUniform,
    texture: TextureId,
    target: TextureTarget,
}

impl LightingContext {
    /// Load a skybox from an image holding all six faces
    ///
    /// The face layout (vertical or horizontal strip, or cross) is detected
    /// from the image proportions.
    pub fn load_skybox(&self, path: &str) -> RenderResult<Skybox> {
        let geometry = CubeGeometry::upload(&self.backend, self.programs[ShaderKind::Skybox.index()].position())?;
        let cubemap = self.backend.borrow_mut().load_cubemap_from_file(path)?;
        self.finish_skybox(geometry, cubemap, false)
    }

    /// Load a skybox from an equirectangular HDR panorama
    ///
    /// The panorama is rendered into a `size` x `size` cubemap stored as
    /// `format`, then released.
    pub fn load_skybox_hdr(&self, path: &str, size: i32, format: PixelFormat) -> RenderResult<Skybox> {
        let geometry = CubeGeometry::upload(&self.backend, self.programs[ShaderKind::Skybox.index()].position())?;
        let panorama = self.backend.borrow_mut().load_texture_from_file(path)?;

        let source = CubemapSource {
            kind: ShaderKind::EquirectangularToCubemap,
            sampler: AuxUniform::EquirectangularMap,
            texture: panorama.id,
            target: TextureTarget::Texture2D,
        };
        let cubemap = self.render_to_cubemap(&source, size, format, &[]);
        self.backend.borrow_mut().unload_texture(panorama.id);

        self.finish_skybox(geometry, cubemap?, true)
    }

    fn finish_skybox(&self, geometry: CubeGeometry, cubemap: TextureInfo, is_hdr: bool) -> RenderResult<Skybox> {
        let irradiance = match self.generate_irradiance(&cubemap) {
            Ok(irradiance) => irradiance,
            Err(e) => {
                self.backend.borrow_mut().unload_texture(cubemap.id);
                return Err(e);
            }
        };
        log::info!(
            "SKYBOX: [ID {}] Skybox loaded ({}x{}, irradiance {}x{}, hdr={is_hdr})",
            cubemap.id.0,
            cubemap.width,
            cubemap.height,
            irradiance.width,
            irradiance.height
        );
        Ok(Skybox { geometry, cubemap, irradiance, is_hdr })
    }

    fn generate_irradiance(&self, cubemap: &TextureInfo) -> RenderResult<TextureInfo> {
        let size = (cubemap.width / 16).max(MIN_IRRADIANCE_SIZE);
        let source = CubemapSource {
            kind: ShaderKind::IrradianceConvolution,
            sampler: AuxUniform::EnvironmentMap,
            texture: cubemap.id,
            target: TextureTarget::Cubemap,
        };
        self.render_to_cubemap(
            &source,
            size,
            cubemap.format,
            &[
                TextureParameter::MinFilter(TextureFilter::Linear),
                TextureParameter::MagFilter(TextureFilter::Linear),
            ],
        )
    }

    fn render_to_cubemap(
        &self,
        source: &CubemapSource,
        size: i32,
        format: PixelFormat,
        parameters: &[TextureParameter],
    ) -> RenderResult<TextureInfo> {
        let program = self.programs[source.kind.index()];
        let handle = program.handle.ok_or_else(|| {
            RenderError::ResourceCreationFailed(format!("The {} program is unavailable", source.kind))
        })?;

        let mut gpu = self.backend.borrow_mut();
        let cubemap = gpu
            .load_cubemap(size, format)
            .ok_or_else(|| RenderError::ResourceCreationFailed(format!("Cubemap allocation failed ({size}x{size})")))?;
        for &parameter in parameters {
            gpu.set_texture_parameter(cubemap, parameter);
        }

        let Some(framebuffer) = gpu.load_framebuffer(size, size) else {
            gpu.unload_texture(cubemap);
            return Err(RenderError::ResourceCreationFailed("Cubemap framebuffer allocation failed".to_string()));
        };
        let Some(depth) = gpu.load_depth_renderbuffer(size, size) else {
            gpu.unload_framebuffer(framebuffer);
            gpu.unload_texture(cubemap);
            return Err(RenderError::ResourceCreationFailed("Cubemap depth buffer allocation failed".to_string()));
        };
        gpu.framebuffer_attach(framebuffer, depth, Attachment::Depth, AttachmentTarget::Renderbuffer);
        gpu.framebuffer_attach(
            framebuffer,
            cubemap,
            Attachment::Color(0),
            AttachmentTarget::CubemapFace(CubemapFace::PositiveX),
        );
        if !gpu.framebuffer_complete(framebuffer) {
            log::warn!("SKYBOX: [FBO {}] Cubemap framebuffer is not complete", framebuffer.0);
        }

        let projection = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, CUBEMAP_NEAR, CUBEMAP_FAR);
        gpu.enable_program(handle);
        gpu.set_uniform(handle, program.uniform(AuxUniform::MatProjection), UniformValue::Mat4(projection));
        gpu.set_uniform(handle, program.uniform(source.sampler), UniformValue::Int(0));
        gpu.active_texture_slot(0);
        gpu.enable_texture(source.target, source.texture);

        gpu.viewport(0, 0, size, size);
        gpu.set_backface_culling(false);
        gpu.enable_framebuffer(framebuffer);

        for face in CubemapFace::ALL {
            let view = Mat4::look_at(Vec3::zeros(), face.direction(), face.up());
            gpu.set_uniform(handle, program.uniform(AuxUniform::MatView), UniformValue::Mat4(view));
            gpu.framebuffer_attach(framebuffer, cubemap, Attachment::Color(0), AttachmentTarget::CubemapFace(face));
            gpu.clear_screen_buffers();
            gpu.draw_unit_cube();
        }

        gpu.disable_program();
        gpu.disable_texture(source.target);
        gpu.disable_framebuffer();
        gpu.unload_texture(depth);
        gpu.unload_framebuffer(framebuffer);

        let (width, height) = gpu.framebuffer_size();
        gpu.viewport(0, 0, width, height);
        gpu.set_backface_culling(true);

        gpu.texture_info(cubemap)
            .ok_or_else(|| RenderError::ResourceCreationFailed(format!("Cubemap [ID {}] vanished", cubemap.0)))
    }

    /// Draw `skybox` behind the scene
    ///
    /// Uses the current model-view rotation and projection; depth writes and
    /// backface culling are suspended for the draw.
    pub fn draw_skybox(&self, skybox: &Skybox) {
        let program = self.programs[ShaderKind::Skybox.index()];
        let Some(handle) = program.handle else {
            log::warn!("SKYBOX: {} program unavailable, skybox skipped", ShaderKind::Skybox);
            return;
        };

        let mut gpu = self.backend.borrow_mut();
        if self.skybox_renderer.switch_to(skybox.cubemap.id, skybox.is_hdr) {
            gpu.set_uniform(handle, program.uniform(AuxUniform::DoGamma), UniformValue::from(skybox.is_hdr));
        }

        gpu.set_backface_culling(false);
        gpu.set_depth_mask(false);
        gpu.enable_program(handle);

        let view = gpu.modelview_matrix();
        let projection = gpu.projection_matrix();
        gpu.set_uniform(handle, program.uniform(AuxUniform::EnvironmentMap), UniformValue::Int(0));
        gpu.active_texture_slot(0);
        gpu.enable_texture(TextureTarget::Cubemap, skybox.cubemap.id);

        let geometry = &skybox.geometry;
        let bound_vertex_array = geometry.vertex_array.is_some_and(|vao| gpu.enable_vertex_array(vao));
        if !bound_vertex_array {
            let position = program.position();
            gpu.enable_vertex_buffer(geometry.positions);
            gpu.set_vertex_attribute(position, 3, VertexAttributeType::Float, false);
            gpu.enable_vertex_attribute(position);
            gpu.enable_index_buffer(geometry.indices);
        }

        let eye_count = if gpu.is_stereo_enabled() { 2 } else { 1 };
        for eye in 0..eye_count {
            let (eye_view, eye_projection) = if eye_count == 1 {
                (view, projection)
            } else {
                let (width, height) = gpu.framebuffer_size();
                gpu.viewport(eye as i32 * width / 2, 0, width / 2, height);
                (gpu.stereo_view_offset(eye) * view, gpu.stereo_projection(eye))
            };
            gpu.set_uniform(handle, program.uniform(AuxUniform::MatView), UniformValue::Mat4(eye_view.rotation_only()));
            gpu.set_uniform(handle, program.uniform(AuxUniform::MatProjection), UniformValue::Mat4(eye_projection));
            gpu.draw_elements(0, CUBE_INDICES.len() as i32);
        }
        if eye_count > 1 {
            let (width, height) = gpu.framebuffer_size();
            gpu.viewport(0, 0, width, height);
        }

        gpu.disable_texture(TextureTarget::Cubemap);
        gpu.disable_vertex_array();
        gpu.disable_vertex_buffer();
        gpu.disable_index_buffer();
        gpu.disable_program();

        gpu.set_modelview_matrix(view);
        gpu.set_projection_matrix(projection);
        gpu.set_backface_culling(true);
        gpu.set_depth_mask(true);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::render::api::{GraphicsBackend, TextureKind};
    use crate::render::backends::{DrawKind, HeadlessBackend};

    fn setup() -> (Rc<RefCell<HeadlessBackend>>, LightingContext) {
        let mut headless = HeadlessBackend::new();
        headless.register_image("sky_cross.png", 1024, 768);
        headless.register_image("sky_strip.png", 64, 384);
        headless.register_image("sky.hdr", 2048, 1024);
        headless.register_image("bad_layout.png", 500, 300);
        let headless = Rc::new(RefCell::new(headless));
        let context = LightingContext::new(headless.clone(), 1).expect("context");
        (headless, context)
    }

    #[test]
    fn test_cube_indices_stay_in_range() {
        assert!(CUBE_INDICES.iter().all(|&i| (i as usize) < CUBE_POSITIONS.len()));
    }

    #[test]
    fn test_load_ldr_skybox() {
        let (headless, context) = setup();
        let skybox = context.load_skybox("sky_cross.png").expect("skybox");

        assert!(!skybox.is_hdr());
        assert_eq!(skybox.cubemap().width, 256);
        assert_eq!(skybox.cubemap().kind, TextureKind::Cubemap);
        assert_eq!(skybox.irradiance().width, 16);

        let state = headless.borrow();
        assert_eq!(state.live_texture_count(), 2);
        assert_eq!(state.live_framebuffer_count(), 0);
        assert_eq!(state.live_vertex_array_count(), 1);
        assert_eq!(state.live_buffer_count(), 2);
        assert_eq!(state.draw_calls().iter().filter(|d| d.kind == DrawKind::UnitCube).count(), 6);
        assert!(state
            .texture_parameters(skybox.irradiance().id)
            .contains(&TextureParameter::MinFilter(TextureFilter::Linear)));
        assert!(state.render_state().backface_culling);
    }

    #[test]
    fn test_irradiance_size_has_a_floor() {
        let (_, context) = setup();
        let skybox = context.load_skybox("sky_strip.png").expect("skybox");
        assert_eq!(skybox.cubemap().width, 64);
        assert_eq!(skybox.irradiance().width, 8);
    }

    #[test]
    fn test_failed_load_leaks_nothing() {
        let (headless, context) = setup();
        assert!(context.load_skybox("missing.png").is_err());
        assert!(context.load_skybox("bad_layout.png").is_err());

        let state = headless.borrow();
        assert_eq!(state.live_texture_count(), 0);
        assert_eq!(state.live_vertex_array_count(), 0);
        assert_eq!(state.live_buffer_count(), 0);
    }

    #[test]
    fn test_load_hdr_skybox() {
        let (headless, context) = setup();
        let skybox = context.load_skybox_hdr("sky.hdr", 512, PixelFormat::R32G32B32).expect("skybox");

        assert!(skybox.is_hdr());
        assert_eq!(skybox.cubemap().width, 512);
        assert_eq!(skybox.cubemap().format, PixelFormat::R32G32B32);
        assert_eq!(skybox.irradiance().width, 32);

        let state = headless.borrow();
        // Panorama and both depth renderbuffers are gone.
        assert_eq!(state.live_texture_count(), 2);
        assert_eq!(state.live_framebuffer_count(), 0);
        assert_eq!(state.draw_calls().iter().filter(|d| d.kind == DrawKind::UnitCube).count(), 12);
        assert_eq!(state.invalid_release_count(), 0);
    }

    #[test]
    fn test_draw_uploads_gamma_flag_on_cubemap_change() {
        let (headless, context) = setup();
        let ldr = context.load_skybox("sky_cross.png").expect("skybox");
        let hdr = context.load_skybox_hdr("sky.hdr", 128, PixelFormat::R32G32B32).expect("skybox");
        let program = context.program(ShaderKind::Skybox).expect("skybox program");
        headless.borrow_mut().clear_recording();

        context.draw_skybox(&ldr);
        context.draw_skybox(&ldr);
        assert_eq!(headless.borrow().upload_count(program, "doGamma"), 1);
        assert_eq!(headless.borrow().uniform(program, "doGamma"), Some(UniformValue::Int(0)));

        context.draw_skybox(&hdr);
        assert_eq!(headless.borrow().upload_count(program, "doGamma"), 2);
        assert_eq!(headless.borrow().uniform(program, "doGamma"), Some(UniformValue::Int(1)));
        assert_eq!(context.skybox_renderer.last_cubemap(), Some(hdr.cubemap().id));
    }

    #[test]
    fn test_reused_cubemap_id_with_new_gamma_flag_switches() {
        let renderer = SkyboxRenderer::default();
        let cubemap = TextureId(7);
        assert!(renderer.switch_to(cubemap, false));
        assert!(!renderer.switch_to(cubemap, false));
        assert!(renderer.switch_to(cubemap, true));
        assert!(!renderer.switch_to(cubemap, true));
        assert_eq!(renderer.last_cubemap(), Some(cubemap));
    }

    #[test]
    fn test_draw_restores_state() {
        let (headless, context) = setup();
        let skybox = context.load_skybox("sky_cross.png").expect("skybox");
        let view = Mat4::new_translation(&Vec3::new(3.0, 0.0, 0.0));
        headless.borrow_mut().set_modelview_matrix(view);
        headless.borrow_mut().clear_recording();

        context.draw_skybox(&skybox);

        let state = headless.borrow();
        let draw = &state.draw_calls()[0];
        assert_eq!(draw.kind, DrawKind::Elements);
        assert_eq!(draw.count, 36);
        assert_eq!(draw.textures, vec![(0, TextureTarget::Cubemap, skybox.cubemap().id)]);

        let render_state = state.render_state();
        assert!(render_state.backface_culling);
        assert!(render_state.depth_mask);
        assert_eq!(state.modelview_matrix(), view);

        let program = context.program(ShaderKind::Skybox).expect("skybox program");
        assert_eq!(state.uniform(program, "matView"), Some(UniformValue::Mat4(Mat4::identity())));
    }

    #[test]
    fn test_unload_releases_everything_once() {
        let (headless, context) = setup();
        let skybox = context.load_skybox_hdr("sky.hdr", 256, PixelFormat::R32G32B32).expect("skybox");
        skybox.unload();

        let state = headless.borrow();
        assert_eq!(state.live_texture_count(), 0);
        assert_eq!(state.live_vertex_array_count(), 0);
        assert_eq!(state.live_buffer_count(), 0);
        assert_eq!(state.invalid_release_count(), 0);
    }
}
