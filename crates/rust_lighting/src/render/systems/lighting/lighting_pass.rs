//! Shaded geometry pass
//!
//! Draws meshes through the lighting program: material constants and
//! matrices are uploaded, used material maps are bound to the unit matching
//! their slot, and every enabled shadow caster's depth map is bound to unit
//! `SHADOW_MAP_FIRST_UNIT + light index`.

use crate::foundation::color::Color;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::api::{
    GraphicsBackend, ProgramHandle, ShaderLocation, TextureId, TextureTarget, UniformValue, VertexAttributeType,
};
use crate::render::primitives::{GpuMesh, Material, MaterialMap, MaterialMapIndex, Model, MATERIAL_MAP_COUNT};
use crate::render::shaders::ShaderKind;

use super::context::LightingContext;
use super::light::LightKind;
use super::uniforms::{LightUniform, LightingUniform, VertexAttribute};

/// First texture unit used for shadow maps
pub const SHADOW_MAP_FIRST_UNIT: u32 = MATERIAL_MAP_COUNT as u32;

fn upload(gpu: &mut dyn GraphicsBackend, program: ProgramHandle, location: ShaderLocation, value: impl Into<UniformValue>) {
    if location.is_found() {
        gpu.set_uniform(program, location, value.into());
    }
}

impl LightingContext {
    fn resolved_map<'m>(&'m self, material: &'m Material, slot: MaterialMapIndex) -> &'m MaterialMap {
        if self.used_default_maps[slot.index()] {
            &self.default_maps[slot.index()]
        } else {
            material.map(slot)
        }
    }

    /// Draw a mesh with `material`, `transform` applied on top of the current
    /// transform stack
    pub fn draw_mesh(&self, mesh: &GpuMesh, material: &Material, transform: &Mat4) {
        let Some(program) = self.program(ShaderKind::Lighting) else {
            log::warn!("LIGHTING: {} program unavailable, mesh skipped", ShaderKind::Lighting);
            return;
        };
        let locations = &self.locations;
        let mut gpu = self.backend.borrow_mut();
        gpu.enable_program(program);

        // Material constants
        let map = |slot| self.resolved_map(material, slot);
        let gpu_ref: &mut dyn GraphicsBackend = &mut *gpu;
        for (uniform, value) in [
            (LightingUniform::ColorDiffuse, map(MaterialMapIndex::Albedo).color.to_vec4()),
            (LightingUniform::ColorSpecular, map(MaterialMapIndex::Metalness).color.to_vec4()),
            (LightingUniform::ColorEmission, map(MaterialMapIndex::Emission).color.to_vec4()),
        ] {
            upload(gpu_ref, program, locations.global(uniform), value);
        }
        for (uniform, value) in [
            (LightingUniform::MetalnessScale, map(MaterialMapIndex::Metalness).value),
            (LightingUniform::RoughnessScale, map(MaterialMapIndex::Roughness).value),
            (LightingUniform::AoLightAffect, map(MaterialMapIndex::Occlusion).value),
            (LightingUniform::HeightScale, map(MaterialMapIndex::Height).value),
        ] {
            upload(gpu_ref, program, locations.global(uniform), value);
        }

        // Matrices
        let view = gpu_ref.modelview_matrix();
        let projection = gpu_ref.projection_matrix();
        let model = gpu_ref.transform_matrix() * transform;
        upload(gpu_ref, program, locations.global(LightingUniform::MatView), view);
        upload(gpu_ref, program, locations.global(LightingUniform::MatProjection), projection);
        upload(gpu_ref, program, locations.global(LightingUniform::MatModel), model);
        upload(gpu_ref, program, locations.global(LightingUniform::MatNormal), model.normal_matrix());

        // Textures
        let mut bound_units: Vec<(u32, TextureTarget)> = Vec::new();
        for slot in MaterialMapIndex::ALL {
            if !self.used_maps[slot.index()] {
                continue;
            }
            let texture_id = map(slot).texture_id();
            if texture_id == 0 {
                continue;
            }
            let unit = slot.index() as u32;
            let target = if slot.is_cubemap() { TextureTarget::Cubemap } else { TextureTarget::Texture2D };
            gpu_ref.active_texture_slot(unit);
            gpu_ref.enable_texture(target, TextureId(texture_id));
            upload(gpu_ref, program, locations.map_texture(slot), unit as i32);
            bound_units.push((unit, target));
        }

        for (index, light) in self.lights.iter().enumerate() {
            let Some(shadow) = light.shadow.as_ref().filter(|_| light.enabled) else {
                continue;
            };
            let unit = SHADOW_MAP_FIRST_UNIT + index as u32;
            let (target, sampler) = match light.kind {
                LightKind::Omni => (TextureTarget::Cubemap, LightUniform::ShadowCubemap),
                _ => (TextureTarget::Texture2D, LightUniform::ShadowMap),
            };
            gpu_ref.active_texture_slot(unit);
            gpu_ref.enable_texture(target, shadow.depth_texture());
            upload(gpu_ref, program, locations.light(index, sampler), unit as i32);
            bound_units.push((unit, target));
        }

        // Vertex state
        let buffers = *mesh.buffers();
        let bound_vertex_array = mesh.vertex_array().is_some_and(|vao| gpu_ref.enable_vertex_array(vao));
        if !bound_vertex_array {
            let mut bind = |attribute: VertexAttribute, buffer, components| {
                let location = locations.attribute(attribute);
                if location.is_found() {
                    gpu_ref.enable_vertex_buffer(buffer);
                    gpu_ref.set_vertex_attribute(location, components, VertexAttributeType::Float, false);
                    gpu_ref.enable_vertex_attribute(location);
                }
            };
            bind(VertexAttribute::Position, buffers.positions, 3);
            bind(VertexAttribute::TexCoord, buffers.tex_coords, 2);
            bind(VertexAttribute::Normal, buffers.normals, 3);
            bind(VertexAttribute::Tangent, buffers.tangents, 4);
            if let Some(tex_coords2) = buffers.tex_coords2 {
                bind(VertexAttribute::TexCoord2, tex_coords2, 2);
            }

            let color = locations.attribute(VertexAttribute::Color);
            if color.is_found() {
                match buffers.colors {
                    Some(colors) => {
                        gpu_ref.enable_vertex_buffer(colors);
                        gpu_ref.set_vertex_attribute(color, 4, VertexAttributeType::UnsignedByte, true);
                        gpu_ref.enable_vertex_attribute(color);
                    }
                    None => {
                        gpu_ref.set_vertex_attribute_default(color, Vec4::new(1.0, 1.0, 1.0, 1.0));
                        gpu_ref.disable_vertex_attribute(color);
                    }
                }
            }

            if let Some(indices) = buffers.indices {
                gpu_ref.enable_index_buffer(indices);
            }
        }

        // Draw
        let eye_count = if gpu_ref.is_stereo_enabled() { 2 } else { 1 };
        for eye in 0..eye_count {
            let mvp = if eye_count == 1 {
                projection * view * model
            } else {
                let (width, height) = gpu_ref.framebuffer_size();
                gpu_ref.viewport(eye as i32 * width / 2, 0, width / 2, height);
                gpu_ref.stereo_projection(eye) * gpu_ref.stereo_view_offset(eye) * view * model
            };
            upload(gpu_ref, program, locations.global(LightingUniform::Mvp), mvp);

            if mesh.is_indexed() {
                gpu_ref.draw_elements(0, mesh.triangle_count() * 3);
            } else {
                gpu_ref.draw_arrays(0, mesh.vertex_count());
            }
        }

        // Unbind
        for (unit, target) in bound_units {
            gpu_ref.active_texture_slot(unit);
            gpu_ref.disable_texture(target);
        }
        gpu_ref.disable_vertex_array();
        gpu_ref.disable_vertex_buffer();
        gpu_ref.disable_index_buffer();
        gpu_ref.disable_program();

        gpu_ref.set_modelview_matrix(view);
        gpu_ref.set_projection_matrix(projection);
    }

    /// Draw every mesh of `model` at `position` with uniform `scale` and a
    /// diffuse `tint`
    pub fn draw_model(&self, model: &Model, position: Vec3, scale: f32, tint: Color) {
        self.draw_model_ex(model, position, Vec3::y(), 0.0, Vec3::repeat(scale), tint);
    }

    /// Draw every mesh of `model` with a full scale, rotation and translation
    ///
    /// The tint multiplies each material's albedo color for this draw only.
    pub fn draw_model_ex(&self, model: &Model, position: Vec3, axis: Vec3, angle_deg: f32, scale: Vec3, tint: Color) {
        let transform = Mat4::from_srt(scale, axis, angle_deg, position) * model.transform;
        for (mesh, mut material) in model.parts() {
            let albedo = material.map_mut(MaterialMapIndex::Albedo);
            albedo.color = albedo.color.tinted(tint);
            self.draw_mesh(mesh, &material, &transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::foundation::math::Point3;
    use crate::render::api::SharedBackend;
    use crate::render::backends::{DrawKind, HeadlessBackend};
    use crate::render::primitives::Mesh;
    use crate::render::systems::lighting::LightType;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn setup(headless: HeadlessBackend, light_count: usize) -> (Rc<RefCell<HeadlessBackend>>, LightingContext) {
        let headless = Rc::new(RefCell::new(headless));
        let context = LightingContext::new(headless.clone(), light_count).expect("context");
        (headless, context)
    }

    fn cube(backend: &SharedBackend) -> GpuMesh {
        Mesh::cube(1.0).upload(backend).expect("mesh upload")
    }

    fn lighting(context: &LightingContext) -> ProgramHandle {
        context.program(ShaderKind::Lighting).expect("lighting program")
    }

    #[test]
    fn test_material_constants_are_uploaded() {
        let (headless, context) = setup(HeadlessBackend::new(), 1);
        let mesh = cube(context.backend());
        let material = Material::default()
            .with_albedo(Color::rgb(255, 0, 0))
            .with_map(MaterialMapIndex::Roughness, MaterialMap::default().with_value(0.25));

        context.draw_mesh(&mesh, &material, &Mat4::identity());

        let state = headless.borrow();
        let program = lighting(&context);
        assert_eq!(state.uniform(program, "maps[0].color"), Some(UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 1.0))));
        assert_eq!(state.uniform(program, "maps[3].value"), Some(UniformValue::Float(0.25)));
        assert_eq!(state.draw_calls().len(), 1);
        assert_eq!(state.draw_calls()[0].kind, DrawKind::Elements);
        assert_eq!(state.draw_calls()[0].count, 36);
        assert_eq!(state.bound_program(), None);
    }

    #[test]
    fn test_default_maps_override_material() {
        let (headless, mut context) = setup(HeadlessBackend::new(), 1);
        let mesh = cube(context.backend());
        context.use_default_map(MaterialMapIndex::Height, true);
        let material = Material::default().with_map(MaterialMapIndex::Height, MaterialMap::default().with_value(0.9));

        context.draw_mesh(&mesh, &material, &Mat4::identity());
        assert_eq!(headless.borrow().uniform(lighting(&context), "maps[6].value"), Some(UniformValue::Float(0.05)));
    }

    #[test]
    fn test_used_maps_bind_to_their_slot() {
        let (headless, mut context) = setup(HeadlessBackend::new(), 1);
        let mesh = cube(context.backend());
        let albedo = headless.borrow().default_texture().expect("default texture");
        let irradiance = headless.borrow_mut().load_cubemap(32, crate::render::api::PixelFormat::R32G32B32A32);
        let irradiance = headless.borrow().texture_info(irradiance.expect("cubemap")).expect("info");

        context.use_map(MaterialMapIndex::Irradiance, true);
        let material = Material::default()
            .with_map(MaterialMapIndex::Albedo, MaterialMap::default().with_texture(albedo))
            .with_map(MaterialMapIndex::Irradiance, MaterialMap::default().with_texture(irradiance))
            .with_map(MaterialMapIndex::Normal, MaterialMap::default().with_texture(albedo));

        context.draw_mesh(&mesh, &material, &Mat4::identity());

        let state = headless.borrow();
        let textures = &state.draw_calls()[0].textures;
        assert_eq!(
            textures,
            &vec![(0, TextureTarget::Texture2D, albedo.id), (8, TextureTarget::Cubemap, irradiance.id)]
        );
        assert_eq!(state.uniform(lighting(&context), "cubemaps[1].texture"), Some(UniformValue::Int(8)));
    }

    #[test]
    fn test_shadow_maps_bind_after_material_units() {
        let (headless, mut context) = setup(HeadlessBackend::new(), 3);
        let mesh = cube(context.backend());
        context.set_light_type(0, LightType::Omni);
        for index in 0..3 {
            context.enable_shadow(index, 128);
        }
        context.use_light(0, true);
        context.use_light(2, true);

        context.draw_mesh(&mesh, &Material::default(), &Mat4::identity());

        let state = headless.borrow();
        let units: Vec<_> = state.draw_calls()[0].textures.iter().map(|&(unit, target, _)| (unit, target)).collect();
        assert_eq!(units, vec![(11, TextureTarget::Cubemap), (13, TextureTarget::Texture2D)]);

        let program = lighting(&context);
        assert_eq!(state.uniform(program, "lights[0].shadowCubemap"), Some(UniformValue::Int(11)));
        assert_eq!(state.uniform(program, "lights[2].shadowMap"), Some(UniformValue::Int(13)));
        assert_eq!(state.uniform(program, "lights[1].shadowMap"), None);
    }

    #[test]
    fn test_textures_are_unbound_after_draw() {
        let (headless, mut context) = setup(HeadlessBackend::new(), 1);
        let mesh = cube(context.backend());
        context.enable_shadow(0, 64);
        context.use_light(0, true);

        context.draw_mesh(&mesh, &Material::default(), &Mat4::identity());
        context.draw_model(&Model::from_mesh(cube(context.backend()), Material::default()), Vec3::zeros(), 1.0, Color::WHITE);

        let state = headless.borrow();
        assert_eq!(state.draw_calls().len(), 2);
        assert_eq!(state.draw_calls()[1].textures.len(), 1);
    }

    #[test]
    fn test_matrices_and_normal_matrix() {
        let (headless, context) = setup(HeadlessBackend::new(), 1);
        let mesh = cube(context.backend());
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        headless.borrow_mut().set_modelview_matrix(view);
        let transform = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0));

        context.draw_mesh(&mesh, &Material::default(), &transform);

        let state = headless.borrow();
        let program = lighting(&context);
        let Some(UniformValue::Mat4(normal)) = state.uniform(program, "matNormal") else {
            panic!("normal matrix not uploaded");
        };
        assert_relative_eq!(normal[(0, 0)], 0.5, epsilon = EPSILON);

        let Some(UniformValue::Mat4(mvp)) = state.uniform(program, "mvp") else {
            panic!("mvp not uploaded");
        };
        let p = mvp.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.coords, Vec3::new(2.0, 0.0, -5.0), epsilon = EPSILON);
        assert_eq!(state.modelview_matrix(), view);
    }

    #[test]
    fn test_stereo_draws_each_eye() {
        let (headless, context) = setup(HeadlessBackend::new().with_stereo(true), 1);
        let mesh = cube(context.backend());
        context.draw_mesh(&mesh, &Material::default(), &Mat4::identity());

        let state = headless.borrow();
        let viewports: Vec<_> = state.draw_calls().iter().map(|d| d.viewport).collect();
        assert_eq!(viewports, vec![(0, 0, 400, 450), (400, 0, 400, 450)]);
    }

    #[test]
    fn test_buffer_fallback_without_vertex_arrays() {
        let (headless, context) = setup(HeadlessBackend::new().without_vertex_arrays(), 1);
        let mesh = cube(context.backend());
        context.draw_mesh(&mesh, &Material::default(), &Mat4::identity());
        assert_eq!(headless.borrow().draw_calls().len(), 1);
        assert_eq!(headless.borrow().draw_calls()[0].count, 36);
    }

    #[test]
    fn test_tint_applies_to_a_copy() {
        let (headless, context) = setup(HeadlessBackend::new(), 1);
        let material = Material::default().with_albedo(Color::rgb(200, 100, 50));
        let model = Model::from_mesh(cube(context.backend()), material);

        context.draw_model_ex(&model, Vec3::new(1.0, 0.0, 0.0), Vec3::y(), 45.0, Vec3::repeat(1.0), Color::rgb(255, 0, 128));

        let Some(UniformValue::Vec4(diffuse)) = headless.borrow().uniform(lighting(&context), "maps[0].color") else {
            panic!("diffuse color not uploaded");
        };
        let expected = Color::new(200, 0, 25, 255).to_vec4();
        assert_relative_eq!(diffuse, expected, epsilon = EPSILON);
        assert_eq!(model.materials[0].map(MaterialMapIndex::Albedo).color, Color::rgb(200, 100, 50));
    }

    #[test]
    fn test_missing_program_skips_draw() {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        let context = LightingContext::builder(1)
            .with_shader_code(ShaderKind::Lighting, "", "")
            .build(headless.clone())
            .expect("context");
        let mesh = cube(context.backend());
        context.draw_mesh(&mesh, &Material::default(), &Mat4::identity());
        assert!(headless.borrow().draw_calls().is_empty());
    }
}
