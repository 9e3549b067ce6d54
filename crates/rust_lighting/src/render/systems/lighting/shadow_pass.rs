//! Shadow depth pass
//!
//! Renders scene depth from a light into its shadow map. The caller supplies
//! the geometry through a callback that receives a [`ShadowCaster`]; the pass
//! runs the callback once per face for omni lights and once otherwise.

use crate::config::DepthRange;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::api::{
    Attachment, AttachmentTarget, CubemapFace, MatrixMode, ProgramHandle, SharedBackend, UniformValue,
    VertexAttributeType,
};
use crate::render::primitives::{GpuMesh, Model};
use crate::render::shaders::ShaderKind;

use super::context::LightingContext;
use super::error::{LightingError, LightingResult};
use super::light::LightKind;
use super::uniforms::{AuxProgram, AuxUniform, LightUniform, LightingUniform};

/// Draw callback handed to [`LightingContext::update_shadow_map`]
pub type ShadowDrawFn<'f> = dyn FnMut(&mut ShadowCaster<'_>) + 'f;

/// Depth-only drawing surface passed to the shadow callback
pub struct ShadowCaster<'a> {
    backend: &'a SharedBackend,
    program: AuxProgram,
}

impl std::fmt::Debug for ShadowCaster<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowCaster").field("program", &self.program).finish_non_exhaustive()
    }
}

impl<'a> ShadowCaster<'a> {
    pub(crate) const fn new(backend: &'a SharedBackend, program: AuxProgram) -> Self {
        Self { backend, program }
    }

    /// Depth program bound for this pass, `None` if it failed to load
    pub const fn program(&self) -> Option<ProgramHandle> {
        self.program.handle
    }

    /// Render a mesh's depth with `transform` applied
    pub fn cast_mesh(&mut self, mesh: &GpuMesh, transform: &Mat4) {
        let Some(program) = self.program.handle else {
            log::warn!("SHADOW: Depth program unavailable, mesh skipped");
            return;
        };

        let mut gpu = self.backend.borrow_mut();
        gpu.enable_program(program);

        let modelview = gpu.modelview_matrix();
        let projection = gpu.projection_matrix();
        let model = gpu.transform_matrix() * transform;

        let mat_model = self.program.uniform(AuxUniform::MatModel);
        if mat_model.is_found() {
            gpu.set_uniform(program, mat_model, UniformValue::Mat4(model));
        }

        let position = self.program.position();
        let bound_vertex_array = mesh.vertex_array().is_some_and(|vao| gpu.enable_vertex_array(vao));
        if !bound_vertex_array {
            gpu.enable_vertex_buffer(mesh.buffers().positions);
            gpu.set_vertex_attribute(position, 3, VertexAttributeType::Float, false);
            gpu.enable_vertex_attribute(position);
            if let Some(indices) = mesh.buffers().indices {
                gpu.enable_index_buffer(indices);
            }
        }

        let eye_count = if gpu.is_stereo_enabled() { 2 } else { 1 };
        for eye in 0..eye_count {
            let mvp = if eye_count == 1 {
                projection * modelview * model
            } else {
                let (width, height) = gpu.framebuffer_size();
                gpu.viewport(eye as i32 * width / 2, 0, width / 2, height);
                gpu.stereo_projection(eye) * gpu.stereo_view_offset(eye) * modelview * model
            };
            gpu.set_uniform(program, self.program.uniform(AuxUniform::Mvp), UniformValue::Mat4(mvp));

            if mesh.is_indexed() {
                gpu.draw_elements(0, mesh.triangle_count() * 3);
            } else {
                gpu.draw_arrays(0, mesh.vertex_count());
            }
        }

        gpu.disable_vertex_array();
        gpu.disable_vertex_buffer();
        gpu.disable_index_buffer();
        gpu.disable_program();

        gpu.set_modelview_matrix(modelview);
        gpu.set_projection_matrix(projection);
    }

    /// Cast every mesh of `model` at `position` with uniform `scale`
    pub fn cast_model(&mut self, model: &Model, position: Vec3, scale: f32) {
        self.cast_model_ex(model, position, Vec3::y(), 0.0, Vec3::repeat(scale));
    }

    /// Cast every mesh of `model` with a full scale, rotation and translation
    pub fn cast_model_ex(&mut self, model: &Model, position: Vec3, axis: Vec3, angle_deg: f32, scale: Vec3) {
        let transform = Mat4::from_srt(scale, axis, angle_deg, position) * model.transform;
        for mesh in &model.meshes {
            self.cast_mesh(mesh, &transform);
        }
    }
}

impl LightingContext {
    /// Render depth from light `index` into its shadow map
    ///
    /// `draw` is invoked once per pass and should cast every occluder. Fails
    /// with an error log (and does nothing) when the callback is missing, the
    /// index is out of range or the light has no shadow map.
    pub fn update_shadow_map(&self, index: usize, draw: Option<&mut ShadowDrawFn<'_>>) {
        if let Err(e) = self.try_update_shadow_map(index, draw) {
            log::error!("SHADOW: {e}");
        }
    }

    fn try_update_shadow_map(&self, index: usize, draw: Option<&mut ShadowDrawFn<'_>>) -> LightingResult<()> {
        let draw = draw.ok_or(LightingError::MissingDrawCallback)?;
        let light = self.light(index)?;
        let map = light.shadow.as_ref().ok_or(LightingError::ShadowNotEnabled(index))?;

        let resolution = map.resolution();
        let framebuffer = map.framebuffer();
        let depth = map.depth_texture();
        let DepthRange { near, far } = self.config.depth_range;
        let is_omni = matches!(light.kind, LightKind::Omni);

        let projection = if is_omni {
            Mat4::perspective(utils::deg_to_rad(90.0), 1.0, near, far)
        } else {
            let extent = self.config.shadow_ortho_extent;
            Mat4::orthographic(-extent, extent, -extent, extent, near, far)
        };

        {
            let mut gpu = self.backend.borrow_mut();
            gpu.flush_batch();
            gpu.enable_framebuffer(framebuffer);
            gpu.viewport(0, 0, resolution, resolution);

            gpu.matrix_mode(MatrixMode::Projection);
            gpu.push_matrix();
            gpu.load_identity();
            gpu.mult_matrix(&projection);
            gpu.matrix_mode(MatrixMode::ModelView);

            gpu.set_depth_test(true);
            gpu.set_color_blend(false);
        }

        if is_omni {
            let program = self.programs[ShaderKind::DepthCubemap.index()];
            self.push_aux(ShaderKind::DepthCubemap, AuxUniform::LightPosition, light.position);
            self.push_aux(ShaderKind::DepthCubemap, AuxUniform::FarPlane, far);
            self.push_global(LightingUniform::FarPlane, far);

            for face in CubemapFace::ALL {
                self.backend.borrow_mut().framebuffer_attach(
                    framebuffer,
                    depth,
                    Attachment::Depth,
                    AttachmentTarget::CubemapFace(face),
                );
                let view = Mat4::look_at(light.position, light.position + face.direction(), face.up());
                self.render_depth_pass(&view, program, draw);
            }
        } else {
            let view = Mat4::look_at(light.position, light.position + light.direction, Vec3::y());
            self.push_light(index, LightUniform::ViewProjection, projection * view);
            self.render_depth_pass(&view, self.programs[ShaderKind::Depth.index()], draw);
        }

        let mut gpu = self.backend.borrow_mut();
        gpu.set_color_blend(true);
        gpu.disable_framebuffer();
        let (width, height) = gpu.framebuffer_size();
        gpu.viewport(0, 0, width, height);
        gpu.matrix_mode(MatrixMode::Projection);
        gpu.pop_matrix();
        gpu.matrix_mode(MatrixMode::ModelView);
        gpu.load_identity();
        Ok(())
    }

    fn render_depth_pass(&self, view: &Mat4, program: AuxProgram, draw: &mut ShadowDrawFn<'_>) {
        {
            let mut gpu = self.backend.borrow_mut();
            gpu.load_identity();
            gpu.mult_matrix(view);
            gpu.clear_screen_buffers();
        }

        let mut caster = ShadowCaster::new(&self.backend, program);
        draw(&mut caster);

        self.backend.borrow_mut().flush_batch();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::render::backends::{DrawKind, HeadlessBackend};
    use crate::render::primitives::{Material, Mesh};
    use crate::foundation::math::Point3;
    use crate::render::systems::lighting::{LightProperty, LightType};
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-4;

    fn setup(light_count: usize) -> (Rc<RefCell<HeadlessBackend>>, LightingContext) {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        let context = LightingContext::new(headless.clone(), light_count).expect("context");
        (headless, context)
    }

    fn cube_model(backend: &SharedBackend) -> Model {
        let mesh = Mesh::cube(1.0).upload(backend).expect("mesh upload");
        Model::from_mesh(mesh, Material::default())
    }

    #[test]
    fn test_missing_callback_is_rejected() {
        let (headless, mut context) = setup(1);
        context.enable_shadow(0, 256);
        headless.borrow_mut().clear_recording();

        context.update_shadow_map(0, None);
        assert_eq!(headless.borrow().flush_count(), 0);
    }

    #[test]
    fn test_unshadowed_light_is_rejected() {
        let (headless, context) = setup(1);
        let mut calls = 0;
        context.update_shadow_map(0, Some(&mut |_: &mut ShadowCaster<'_>| calls += 1));
        context.update_shadow_map(3, Some(&mut |_: &mut ShadowCaster<'_>| calls += 1));
        assert_eq!(calls, 0);
        assert_eq!(headless.borrow().flush_count(), 0);
    }

    #[test]
    fn test_directional_pass_renders_once() {
        let (headless, mut context) = setup(2);
        context.set_light_vec3(1, LightProperty::Position, Vec3::new(0.0, 10.0, 0.0));
        context.set_light_target(1, 0.0, 0.0, 0.0);
        context.enable_shadow(1, 1024);
        let backend = context.backend().clone();
        let model = cube_model(&backend);
        headless.borrow_mut().clear_recording();

        let mut passes = 0;
        context.update_shadow_map(
            1,
            Some(&mut |caster: &mut ShadowCaster<'_>| {
                passes += 1;
                caster.cast_model(&model, Vec3::zeros(), 1.0);
            }),
        );
        assert_eq!(passes, 1);

        let state = headless.borrow();
        let framebuffer = context.shadow_map(1).expect("shadow map").framebuffer;
        let draws = state.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].kind, DrawKind::Elements);
        assert_eq!(draws[0].count, 36);
        assert_eq!(draws[0].framebuffer, Some(framebuffer));
        assert_eq!(draws[0].viewport, (0, 0, 1024, 1024));
        assert_eq!(draws[0].program, context.program(ShaderKind::Depth));

        // Pass state is unwound.
        assert_eq!(state.bound_framebuffer(), None);
        assert_eq!(state.current_viewport(), (0, 0, 800, 450));
        assert_eq!(state.matrix_stack_depth(), 0);
        assert!(state.render_state().color_blend);
        assert!(state.render_state().depth_test);
        assert_eq!(state.flush_count(), 2);

        let lighting = context.program(ShaderKind::Lighting).expect("lighting program");
        let Some(UniformValue::Mat4(light_space)) = state.uniform(lighting, "matLights[1]") else {
            panic!("light-space matrix not uploaded");
        };
        // The origin is 10 units in front of the light, inside the ortho box.
        let origin = light_space.transform_point(&Point3::origin());
        assert!(origin.coords.iter().all(|c| c.abs() <= 1.0 + EPSILON));
    }

    #[test]
    fn test_omni_pass_renders_six_faces() {
        let (headless, mut context) = setup(1);
        context.set_light_type(0, LightType::Omni);
        context.set_light_xyz(0, LightProperty::Position, 1.0, 2.0, 3.0);
        context.enable_shadow(0, 512);
        let backend = context.backend().clone();
        let model = cube_model(&backend);
        headless.borrow_mut().clear_recording();

        let mut passes = 0;
        context.update_shadow_map(
            0,
            Some(&mut |caster: &mut ShadowCaster<'_>| {
                passes += 1;
                caster.cast_mesh(&model.meshes[0], &Mat4::identity());
            }),
        );
        assert_eq!(passes, 6);

        let state = headless.borrow();
        assert_eq!(state.draw_calls().len(), 6);
        assert_eq!(state.clear_count(), 6);
        assert!(state.draw_calls().iter().all(|d| d.program == context.program(ShaderKind::DepthCubemap)));

        let info = context.shadow_map(0).expect("shadow map");
        let fbo = state.framebuffer(info.framebuffer).expect("framebuffer");
        assert_eq!(
            fbo.depth,
            Some((info.texture.id, AttachmentTarget::CubemapFace(CubemapFace::NegativeZ)))
        );

        let depth_cubemap = context.program(ShaderKind::DepthCubemap).expect("depth cubemap program");
        assert_eq!(state.uniform(depth_cubemap, "lightPos"), Some(UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0))));
        let lighting = context.program(ShaderKind::Lighting).expect("lighting program");
        assert_eq!(state.uniform(lighting, "farPlane"), Some(UniformValue::Float(1000.0)));
    }

    #[test]
    fn test_cast_model_ex_uploads_composed_transform() {
        let (headless, mut context) = setup(1);
        context.set_light_type(0, LightType::Omni);
        context.enable_shadow(0, 64);
        let backend = context.backend().clone();
        let model = cube_model(&backend).with_transform(Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)));

        context.update_shadow_map(
            0,
            Some(&mut |caster: &mut ShadowCaster<'_>| {
                caster.cast_model_ex(&model, Vec3::new(5.0, 0.0, 0.0), Vec3::y(), 90.0, Vec3::repeat(2.0));
            }),
        );

        let program = context.program(ShaderKind::DepthCubemap).expect("depth cubemap program");
        let Some(UniformValue::Mat4(model_matrix)) = headless.borrow().uniform(program, "matModel") else {
            panic!("model matrix not uploaded");
        };
        let origin = model_matrix.transform_point(&Point3::origin());
        assert_relative_eq!(origin.coords, Vec3::new(5.0, 2.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_cast_without_vertex_arrays_binds_buffers() {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new().without_vertex_arrays()));
        let mut context = LightingContext::new(headless.clone(), 1).expect("context");
        context.enable_shadow(0, 128);
        let backend = context.backend().clone();
        let model = cube_model(&backend);

        context.update_shadow_map(
            0,
            Some(&mut |caster: &mut ShadowCaster<'_>| caster.cast_model(&model, Vec3::zeros(), 1.0)),
        );
        assert_eq!(headless.borrow().draw_calls().len(), 1);
        assert_eq!(headless.borrow().draw_calls()[0].count, 36);
    }
}
