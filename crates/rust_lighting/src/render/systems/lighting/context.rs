//! Lighting context
//!
//! Owns the light array, the six programs and their location tables, the
//! ambient and view globals, and the per-slot material map bookkeeping.
//! Every setter updates the cached value first and then mirrors exactly the
//! uniforms that changed into the lighting program; getters only read the
//! cache.
//!
//! Light operations take an index. An index past the light count is logged
//! as an error and the call does nothing (getters return a default).

use std::collections::HashMap;

use crate::config::{LightingConfig, MAX_LIGHTS};
use crate::foundation::color::Color;
use crate::foundation::math::{utils, Vec3};
use crate::render::api::{ProgramHandle, ShaderLocation, SharedBackend, UniformValue};
use crate::render::primitives::{MaterialMap, MaterialMapIndex, MATERIAL_MAP_COUNT};
use crate::render::shaders::{ShaderKind, ShaderSources};
use crate::render::systems::skybox::SkyboxRenderer;
use crate::render::{RenderError, RenderResult};

use super::error::{LightingError, LightingResult};
use super::light::{self, LightKind, LightProperty, LightState, LightType};
use super::shadow_map::{ShadowMap, ShadowMapInfo, ShadowTarget};
use super::uniforms::{AuxProgram, AuxUniform, LightUniform, LightingLocations, LightingUniform};

/// Default ambient color (linear RGB)
const DEFAULT_AMBIENT: f32 = 0.1;

/// Configures and builds a [`LightingContext`]
#[derive(Debug, Clone, Default)]
pub struct LightingContextBuilder {
    config: LightingConfig,
    shader_overrides: HashMap<ShaderKind, ShaderSources>,
}

impl LightingContextBuilder {
    /// Builder for a context with `light_count` lights and default settings
    pub fn new(light_count: usize) -> Self {
        Self {
            config: LightingConfig::default().with_light_count(light_count),
            shader_overrides: HashMap::new(),
        }
    }

    /// Take every setting, light count included, from `config`
    pub fn with_config(mut self, config: &LightingConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Replace the embedded sources of one program
    ///
    /// Custom sources are used verbatim; the light count is not substituted.
    pub fn with_shader_code(self, kind: ShaderKind, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.with_shader_sources(kind, ShaderSources::new(vertex, fragment))
    }

    /// Replace the embedded sources of one program
    pub fn with_shader_sources(mut self, kind: ShaderKind, sources: ShaderSources) -> Self {
        self.shader_overrides.insert(kind, sources);
        self
    }

    /// Load the programs and initialize every light
    ///
    /// Programs that fail to load are logged and left unset. The only hard
    /// failure is a backend without a default texture.
    pub fn build(self, backend: SharedBackend) -> RenderResult<LightingContext> {
        let light_count = if self.config.light_count > MAX_LIGHTS {
            log::warn!(
                "LIGHTING: Light count {} exceeds the supported maximum, clamping to {MAX_LIGHTS}",
                self.config.light_count
            );
            MAX_LIGHTS
        } else {
            self.config.light_count
        };

        let default_texture = backend.borrow().default_texture().ok_or_else(|| {
            RenderError::InitializationFailed("Backend provides no default texture".to_string())
        })?;

        let mut programs = [AuxProgram::default(); ShaderKind::ALL.len()];
        let locations = {
            let mut gpu = backend.borrow_mut();
            for kind in ShaderKind::ALL {
                let sources = self
                    .shader_overrides
                    .get(&kind)
                    .cloned()
                    .unwrap_or_else(|| ShaderSources::embedded(kind, light_count));
                let handle = gpu.load_program(&sources.vertex, &sources.fragment);
                if handle.is_none() {
                    log::warn!("LIGHTING: {}", LightingError::ShaderUnavailable(kind));
                }
                programs[kind.index()] = AuxProgram::resolve(&*gpu, handle);
            }
            LightingLocations::resolve(&*gpu, programs[ShaderKind::Lighting.index()].handle, light_count)
        };

        let mut default_maps = [MaterialMap::default().with_texture(default_texture); MATERIAL_MAP_COUNT];
        default_maps[MaterialMapIndex::Albedo.index()].color = Color::WHITE;
        default_maps[MaterialMapIndex::Metalness.index()].value = 0.5;
        default_maps[MaterialMapIndex::Roughness.index()].value = 0.5;
        default_maps[MaterialMapIndex::Occlusion.index()].value = 0.0;
        default_maps[MaterialMapIndex::Emission.index()].color = Color::BLACK;
        default_maps[MaterialMapIndex::Height.index()].value = 0.05;

        let mut context = LightingContext {
            backend,
            config: self.config,
            programs,
            locations,
            lights: (0..light_count).map(|_| LightState::default()).collect(),
            ambient: Vec3::repeat(DEFAULT_AMBIENT),
            view_position: Vec3::zeros(),
            parallax_layers: (0, 0),
            used_maps: [false; MATERIAL_MAP_COUNT],
            used_default_maps: [false; MATERIAL_MAP_COUNT],
            default_maps,
            skybox_renderer: SkyboxRenderer::default(),
        };
        context.config.light_count = light_count;
        context.upload_initial_state();

        log::info!("LIGHTING: Context created with {light_count} lights");
        Ok(context)
    }
}

/// Lights, programs and shading globals for one renderer
pub struct LightingContext {
    pub(crate) backend: SharedBackend,
    pub(crate) config: LightingConfig,
    pub(crate) programs: [AuxProgram; ShaderKind::ALL.len()],
    pub(crate) locations: LightingLocations,
    pub(crate) lights: Vec<LightState>,
    ambient: Vec3,
    view_position: Vec3,
    parallax_layers: (i32, i32),
    pub(crate) used_maps: [bool; MATERIAL_MAP_COUNT],
    pub(crate) used_default_maps: [bool; MATERIAL_MAP_COUNT],
    pub(crate) default_maps: [MaterialMap; MATERIAL_MAP_COUNT],
    pub(crate) skybox_renderer: SkyboxRenderer,
}

impl std::fmt::Debug for LightingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightingContext")
            .field("config", &self.config)
            .field("programs", &self.programs)
            .field("lights", &self.lights)
            .field("ambient", &self.ambient)
            .field("view_position", &self.view_position)
            .field("parallax_layers", &self.parallax_layers)
            .finish_non_exhaustive()
    }
}

impl Drop for LightingContext {
    fn drop(&mut self) {
        match self.backend.try_borrow_mut() {
            Ok(mut gpu) => {
                for handle in self.programs.iter().filter_map(|program| program.handle) {
                    gpu.unload_program(handle);
                }
            }
            Err(_) => log::error!("LIGHTING: Backend busy during teardown, programs leaked"),
        }
        for light in &mut self.lights {
            light.shadow = None;
        }
        self.lights.clear();
        log::info!("LIGHTING: Context destroyed");
    }
}

fn report(result: LightingResult<()>) {
    match result {
        Ok(()) => {}
        Err(e @ LightingError::InvalidLight { .. }) => log::error!("LIGHTING: {e}"),
        Err(e) => log::warn!("LIGHTING: {e}"),
    }
}

fn report_get<T>(result: LightingResult<T>, default: T) -> T {
    result.unwrap_or_else(|e| {
        report(Err(e));
        default
    })
}

impl LightingContext {
    /// Context with `light_count` lights and default settings
    pub fn new(backend: SharedBackend, light_count: usize) -> RenderResult<Self> {
        LightingContextBuilder::new(light_count).build(backend)
    }

    /// Builder for custom settings or shader sources
    pub fn builder(light_count: usize) -> LightingContextBuilder {
        LightingContextBuilder::new(light_count)
    }

    /// Release programs, then shadow maps, then lights
    pub fn destroy(self) {
        drop(self);
    }

    /// Backend the context renders through
    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    /// Settings the context was built with (light count already clamped)
    pub const fn config(&self) -> &LightingConfig {
        &self.config
    }

    /// Program handle for `kind`, `None` if it failed to load
    pub const fn program(&self, kind: ShaderKind) -> Option<ProgramHandle> {
        self.programs[kind as usize].handle
    }

    /// Number of lights
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    // === Uploads ===

    pub(crate) fn push(&self, location: ShaderLocation, value: impl Into<UniformValue>) {
        let Some(program) = self.program(ShaderKind::Lighting) else {
            return;
        };
        if location.is_found() {
            let value = value.into();
            log::trace!("LIGHTING: location {} <- {value:?}", location.0);
            self.backend.borrow_mut().set_uniform(program, location, value);
        }
    }

    pub(crate) fn push_global(&self, uniform: LightingUniform, value: impl Into<UniformValue>) {
        self.push(self.locations.global(uniform), value);
    }

    pub(crate) fn push_light(&self, index: usize, uniform: LightUniform, value: impl Into<UniformValue>) {
        self.push(self.locations.light(index, uniform), value);
    }

    pub(crate) fn push_aux(&self, kind: ShaderKind, uniform: AuxUniform, value: impl Into<UniformValue>) {
        let program = &self.programs[kind.index()];
        let location = program.uniform(uniform);
        if let (Some(handle), true) = (program.handle, location.is_found()) {
            self.backend.borrow_mut().set_uniform(handle, location, value.into());
        }
    }

    fn upload_initial_state(&mut self) {
        self.push_global(LightingUniform::ColorAmbient, self.ambient);

        self.used_maps[MaterialMapIndex::Albedo.index()] = true;
        self.push(self.locations.map_active(MaterialMapIndex::Albedo), true);

        for index in 0..self.lights.len() {
            let light = &self.lights[index];
            let (direction, color, energy, specular) = (light.direction, light.color, light.energy, light.specular);
            let (inner, outer) = light.cutoff_cosines();
            let constant = light.attenuation.constant;

            self.push_light(index, LightUniform::Direction, direction);
            self.push_light(index, LightUniform::Color, color);
            self.push_light(index, LightUniform::Energy, energy);
            self.push_light(index, LightUniform::Specular, specular);
            self.push_light(index, LightUniform::InnerCutoff, inner);
            self.push_light(index, LightUniform::OuterCutoff, outer);
            self.push_light(index, LightUniform::Constant, constant);
        }

        self.push_aux(ShaderKind::DepthCubemap, AuxUniform::FarPlane, self.config.depth_range.far);
    }

    // === Globals ===

    /// Set the camera position used for specular and parallax
    pub fn set_view_position(&mut self, position: Vec3) {
        self.view_position = position;
        self.push_global(LightingUniform::ViewPosition, position);
    }

    /// Set the camera position from components
    pub fn set_view_position_xyz(&mut self, x: f32, y: f32, z: f32) {
        self.set_view_position(Vec3::new(x, y, z));
    }

    /// Camera position
    pub const fn view_position(&self) -> Vec3 {
        self.view_position
    }

    /// Set the flat ambient color
    pub fn set_ambient_color(&mut self, color: Color) {
        self.ambient = color.to_linear_rgb();
        self.push_global(LightingUniform::ColorAmbient, self.ambient);
    }

    /// Flat ambient color, rounded to bytes
    pub fn ambient_color(&self) -> Color {
        Color::from_linear_rgb(self.ambient)
    }

    /// Flat ambient color as uploaded
    pub const fn ambient_linear(&self) -> Vec3 {
        self.ambient
    }

    /// Set the deep parallax layer range
    ///
    /// Deep parallax is used when `min > 0` and `max > 1`; otherwise the
    /// single-sample offset applies. Only changed components are uploaded.
    pub fn set_parallax_layers(&mut self, min: i32, max: i32) {
        let (old_min, old_max) = self.parallax_layers;
        self.parallax_layers = (min, max);
        if min != old_min {
            self.push_global(LightingUniform::ParallaxMinLayers, min);
        }
        if max != old_max {
            self.push_global(LightingUniform::ParallaxMaxLayers, max);
        }
    }

    /// Deep parallax layer range as `(min, max)`
    pub const fn parallax_layers(&self) -> (i32, i32) {
        self.parallax_layers
    }

    // === Material maps ===

    /// Enable or disable sampling of a material map slot
    pub fn use_map(&mut self, map: MaterialMapIndex, active: bool) {
        let slot = &mut self.used_maps[map.index()];
        if *slot != active {
            *slot = active;
            self.push(self.locations.map_active(map), active);
        }
    }

    /// Whether a slot is sampled
    pub const fn is_map_used(&self, map: MaterialMapIndex) -> bool {
        self.used_maps[map as usize]
    }

    /// Source a slot from the context default map instead of the material
    pub fn use_default_map(&mut self, map: MaterialMapIndex, active: bool) {
        self.used_default_maps[map.index()] = active;
    }

    /// Whether a slot is sourced from the context default map
    pub const fn is_default_map_used(&self, map: MaterialMapIndex) -> bool {
        self.used_default_maps[map as usize]
    }

    /// Replace a slot's default map
    pub fn set_default_map(&mut self, map: MaterialMapIndex, value: MaterialMap) {
        self.default_maps[map.index()] = value;
    }

    /// A slot's default map
    pub const fn default_map(&self, map: MaterialMapIndex) -> MaterialMap {
        self.default_maps[map as usize]
    }

    // === Lights ===

    pub(crate) fn light(&self, index: usize) -> LightingResult<&LightState> {
        let count = self.lights.len();
        self.lights.get(index).ok_or(LightingError::InvalidLight { index, count })
    }

    fn light_mut(&mut self, index: usize) -> LightingResult<&mut LightState> {
        let count = self.lights.len();
        self.lights.get_mut(index).ok_or(LightingError::InvalidLight { index, count })
    }

    /// Enable or disable a light
    pub fn use_light(&mut self, index: usize, enabled: bool) {
        report(self.try_use_light(index, enabled));
    }

    fn try_use_light(&mut self, index: usize, enabled: bool) -> LightingResult<()> {
        let light = self.light_mut(index)?;
        if light.enabled != enabled {
            light.enabled = enabled;
            self.push_light(index, LightUniform::Enabled, enabled);
        }
        Ok(())
    }

    /// Flip a light's enabled flag
    pub fn toggle_light(&mut self, index: usize) {
        let result = self.light(index).map(|light| light.enabled);
        match result {
            Ok(enabled) => self.use_light(index, !enabled),
            Err(e) => report(Err(e)),
        }
    }

    /// Whether a light is enabled
    pub fn is_light_used(&self, index: usize) -> bool {
        report_get(self.light(index).map(|light| light.enabled), false)
    }

    /// Change a light's type
    ///
    /// A shadowed light keeps casting shadows: its map is rebuilt for the new
    /// type at the same resolution. A spot light's cone is remembered while
    /// the light has another type.
    pub fn set_light_type(&mut self, index: usize, light_type: LightType) {
        report(self.try_set_light_type(index, light_type));
    }

    fn try_set_light_type(&mut self, index: usize, light_type: LightType) -> LightingResult<()> {
        let light = self.light_mut(index)?;
        if light.kind.light_type() == light_type {
            return Ok(());
        }

        let old_cutoffs = light.cutoff_cosines();
        let resolution = light.shadow.as_ref().map(ShadowMap::resolution);
        light.set_type(light_type);
        let new_cutoffs = light.cutoff_cosines();

        self.push_light(index, LightUniform::Type, light_type);
        self.push_cutoffs(index, old_cutoffs, new_cutoffs);

        if let Some(resolution) = resolution {
            self.try_disable_shadow(index)?;
            self.try_enable_shadow(index, resolution)?;
        }
        Ok(())
    }

    /// A light's type
    pub fn light_type(&self, index: usize) -> LightType {
        report_get(self.light(index).map(|light| light.kind.light_type()), LightType::Directional)
    }

    fn push_cutoffs(&self, index: usize, old: (f32, f32), new: (f32, f32)) {
        if old.0 != new.0 {
            self.push_light(index, LightUniform::InnerCutoff, new.0);
        }
        if old.1 != new.1 {
            self.push_light(index, LightUniform::OuterCutoff, new.1);
        }
    }

    /// Set a scalar property
    ///
    /// [`LightProperty::Color`] sets all three channels; cutoffs are degrees
    /// and only apply to spot lights.
    pub fn set_light_value(&mut self, index: usize, property: LightProperty, value: f32) {
        report(self.try_set_light_value(index, property, value));
    }

    fn try_set_light_value(&mut self, index: usize, property: LightProperty, value: f32) -> LightingResult<()> {
        let light = self.light_mut(index)?;

        let (slot, uniform) = match property {
            LightProperty::Color => return self.try_set_light_vec3(index, property, Vec3::repeat(value)),
            LightProperty::InnerCutoff | LightProperty::OuterCutoff => {
                let Some(cone) = light.kind.cone() else {
                    return Err(LightingError::UnsupportedProperty { property, operation: "non-spot lights" });
                };
                let old = light.cutoff_cosines();
                light.kind = LightKind::Spot(if property == LightProperty::InnerCutoff {
                    cone.with_inner(value)
                } else {
                    cone.with_outer(value)
                });
                let new = light.cutoff_cosines();
                self.push_cutoffs(index, old, new);
                return Ok(());
            }
            LightProperty::Energy => (&mut light.energy, LightUniform::Energy),
            LightProperty::Specular => (&mut light.specular, LightUniform::Specular),
            LightProperty::Size => (&mut light.size, LightUniform::Size),
            LightProperty::AttenuationConstant => (&mut light.attenuation.constant, LightUniform::Constant),
            LightProperty::AttenuationLinear => (&mut light.attenuation.linear, LightUniform::Linear),
            LightProperty::AttenuationQuadratic => (&mut light.attenuation.quadratic, LightUniform::Quadratic),
            LightProperty::Position | LightProperty::Direction | LightProperty::AttenuationClq => {
                return Err(LightingError::UnsupportedProperty { property, operation: "set_light_value" });
            }
        };

        let value = if property == LightProperty::Size { value.max(0.0) } else { value };
        if *slot != value {
            *slot = value;
            self.push_light(index, uniform, value);
        }
        Ok(())
    }

    /// A scalar property; cutoffs read -1 on lights without a cone
    pub fn light_value(&self, index: usize, property: LightProperty) -> f32 {
        let result = self.light(index).and_then(|light| match property {
            LightProperty::Energy => Ok(light.energy),
            LightProperty::Specular => Ok(light.specular),
            LightProperty::Size => Ok(light.size),
            LightProperty::InnerCutoff => Ok(light.inner_cutoff()),
            LightProperty::OuterCutoff => Ok(light.outer_cutoff()),
            LightProperty::AttenuationConstant => Ok(light.attenuation.constant),
            LightProperty::AttenuationLinear => Ok(light.attenuation.linear),
            LightProperty::AttenuationQuadratic => Ok(light.attenuation.quadratic),
            LightProperty::Position | LightProperty::Direction | LightProperty::Color | LightProperty::AttenuationClq => {
                Err(LightingError::UnsupportedProperty { property, operation: "light_value" })
            }
        });
        report_get(result, 0.0)
    }

    /// Set a vector property from components
    pub fn set_light_xyz(&mut self, index: usize, property: LightProperty, x: f32, y: f32, z: f32) {
        self.set_light_vec3(index, property, Vec3::new(x, y, z));
    }

    /// Set a vector property
    ///
    /// Directions are normalized; a zero direction is ignored.
    pub fn set_light_vec3(&mut self, index: usize, property: LightProperty, value: Vec3) {
        report(self.try_set_light_vec3(index, property, value));
    }

    fn try_set_light_vec3(&mut self, index: usize, property: LightProperty, value: Vec3) -> LightingResult<()> {
        let light = self.light_mut(index)?;
        match property {
            LightProperty::Position => {
                if light.position != value {
                    light.position = value;
                    self.push_light(index, LightUniform::Position, value);
                }
            }
            LightProperty::Direction => {
                let direction = utils::normalize_or_zero(value);
                if direction == Vec3::zeros() {
                    log::warn!("LIGHTING: Ignoring zero-length direction for light [ID {index}]");
                } else if light.direction != direction {
                    light.direction = direction;
                    self.push_light(index, LightUniform::Direction, direction);
                }
            }
            LightProperty::Color => {
                if light.color != value {
                    light.color = value;
                    self.push_light(index, LightUniform::Color, value);
                }
            }
            LightProperty::AttenuationClq => {
                let old = light.attenuation;
                light.attenuation.constant = value.x;
                light.attenuation.linear = value.y;
                light.attenuation.quadratic = value.z;
                if old.constant != value.x {
                    self.push_light(index, LightUniform::Constant, value.x);
                }
                if old.linear != value.y {
                    self.push_light(index, LightUniform::Linear, value.y);
                }
                if old.quadratic != value.z {
                    self.push_light(index, LightUniform::Quadratic, value.z);
                }
            }
            _ => return Err(LightingError::UnsupportedProperty { property, operation: "set_light_vec3" }),
        }
        Ok(())
    }

    /// A vector property
    pub fn light_vec3(&self, index: usize, property: LightProperty) -> Vec3 {
        let result = self.light(index).and_then(|light| match property {
            LightProperty::Position => Ok(light.position),
            LightProperty::Direction => Ok(light.direction),
            LightProperty::Color => Ok(light.color),
            LightProperty::AttenuationClq => Ok(light.attenuation.to_vec3()),
            _ => Err(LightingError::UnsupportedProperty { property, operation: "light_vec3" }),
        });
        report_get(result, Vec3::zeros())
    }

    /// Set the color from bytes (`c / 255` per channel)
    pub fn set_light_color(&mut self, index: usize, color: Color) {
        self.set_light_vec3(index, LightProperty::Color, color.to_linear_rgb());
    }

    /// Color rounded to the nearest byte per channel
    pub fn light_color(&self, index: usize) -> Color {
        report_get(self.light(index).map(|light| Color::from_linear_rgb(light.color)), Color::new(0, 0, 0, 0))
    }

    /// Set both spot cutoffs in degrees; `inner` is clamped to `outer`
    pub fn set_spot_cone(&mut self, index: usize, inner_deg: f32, outer_deg: f32) {
        report(self.try_set_spot_cone(index, inner_deg, outer_deg));
    }

    fn try_set_spot_cone(&mut self, index: usize, inner_deg: f32, outer_deg: f32) -> LightingResult<()> {
        let light = self.light_mut(index)?;
        if light.kind.cone().is_none() {
            return Err(LightingError::UnsupportedProperty {
                property: LightProperty::InnerCutoff,
                operation: "non-spot lights",
            });
        }
        let old = light.cutoff_cosines();
        light.kind = LightKind::Spot(light::SpotCone::new(inner_deg, outer_deg));
        let new = light.cutoff_cosines();
        self.push_cutoffs(index, old, new);
        Ok(())
    }

    /// Move a light by an offset
    pub fn translate_light(&mut self, index: usize, x: f32, y: f32, z: f32) {
        self.translate_light_v(index, Vec3::new(x, y, z));
    }

    /// Move a light by an offset vector
    pub fn translate_light_v(&mut self, index: usize, offset: Vec3) {
        let position = self.light(index).map(|light| light.position + offset);
        match position {
            Ok(position) => self.set_light_vec3(index, LightProperty::Position, position),
            Err(e) => report(Err(e)),
        }
    }

    fn rotate_direction(&mut self, index: usize, rotate: impl FnOnce(Vec3) -> Option<Vec3>) {
        let rotated = self.light(index).map(|light| rotate(light.direction));
        match rotated {
            Ok(Some(direction)) => self.set_light_vec3(index, LightProperty::Direction, direction),
            Ok(None) => log::warn!("LIGHTING: Ignoring rotation about a zero axis for light [ID {index}]"),
            Err(e) => report(Err(e)),
        }
    }

    /// Rotate a light's direction about +X (counter-clockwise, right-handed)
    pub fn rotate_light_x(&mut self, index: usize, degrees: f32) {
        self.rotate_direction(index, |d| Some(light::rotate_x(d, degrees)));
    }

    /// Rotate a light's direction about +Y (counter-clockwise, right-handed)
    pub fn rotate_light_y(&mut self, index: usize, degrees: f32) {
        self.rotate_direction(index, |d| Some(light::rotate_y(d, degrees)));
    }

    /// Rotate a light's direction about +Z (counter-clockwise, right-handed)
    pub fn rotate_light_z(&mut self, index: usize, degrees: f32) {
        self.rotate_direction(index, |d| Some(light::rotate_z(d, degrees)));
    }

    /// Rotate a light's direction about an arbitrary axis
    pub fn rotate_light(&mut self, index: usize, axis: Vec3, degrees: f32) {
        self.rotate_direction(index, |d| light::rotate_axis(d, axis, degrees));
    }

    /// Aim a light at a point
    pub fn set_light_target(&mut self, index: usize, x: f32, y: f32, z: f32) {
        self.set_light_target_v(index, Vec3::new(x, y, z));
    }

    /// Aim a light at a point
    ///
    /// A target on the light's own position leaves the direction unchanged.
    pub fn set_light_target_v(&mut self, index: usize, target: Vec3) {
        report(self.try_set_light_target(index, target));
    }

    fn try_set_light_target(&mut self, index: usize, target: Vec3) -> LightingResult<()> {
        let light = self.light_mut(index)?;
        let previous = light.direction;
        match light.look_at(target) {
            Some(direction) if direction != previous => self.push_light(index, LightUniform::Direction, direction),
            Some(_) => {}
            None => log::warn!("LIGHTING: Target coincides with light [ID {index}] position, direction kept"),
        }
        Ok(())
    }

    /// Point the light is aimed at
    pub fn light_target(&self, index: usize) -> Vec3 {
        report_get(self.light(index).map(LightState::target), Vec3::zeros())
    }

    // === Shadows ===

    /// Enable shadow casting with a `resolution` x `resolution` map
    ///
    /// An existing map is kept when it already has this resolution and the
    /// right shape for the light's type, and rebuilt otherwise. A rebuilt map
    /// resets the depth bias to the type's default; a kept map keeps it.
    pub fn enable_shadow(&mut self, index: usize, resolution: i32) {
        report(self.try_enable_shadow(index, resolution));
    }

    fn try_enable_shadow(&mut self, index: usize, resolution: i32) -> LightingResult<()> {
        self.light(index)?;
        if resolution <= 0 {
            return Err(LightingError::InvalidResolution(resolution));
        }

        let backend = self.backend.clone();
        let (omni_bias, planar_bias) = (self.config.omni_shadow_bias, self.config.planar_shadow_bias);
        let light = self.light_mut(index)?;
        let (target, bias) = match light.kind {
            LightKind::Omni => (ShadowTarget::Cube, omni_bias),
            _ => (ShadowTarget::Planar, planar_bias),
        };

        let reusable = light
            .shadow
            .as_ref()
            .is_some_and(|map| map.resolution() == resolution && map.target() == target);
        if !reusable {
            let was_enabled = light.shadow.take().is_some();
            match ShadowMap::new(&backend, target, resolution) {
                Ok(map) => light.shadow = Some(map),
                Err(e) => {
                    log::error!("SHADOW: [LIGHT {index}] {e}");
                    if was_enabled {
                        self.push_light(index, LightUniform::Shadow, false);
                    }
                    return Ok(());
                }
            }
            light.shadow_bias = bias;
        }
        let bias = light.shadow_bias;

        self.push_light(index, LightUniform::ShadowMapTexelSize, 1.0 / resolution as f32);
        self.push_light(index, LightUniform::DepthBias, bias);
        self.push_light(index, LightUniform::Shadow, true);
        Ok(())
    }

    /// Disable shadow casting and release the map; no-op when already disabled
    pub fn disable_shadow(&mut self, index: usize) {
        report(self.try_disable_shadow(index));
    }

    fn try_disable_shadow(&mut self, index: usize) -> LightingResult<()> {
        let light = self.light_mut(index)?;
        if light.shadow.take().is_some() {
            self.push_light(index, LightUniform::Shadow, false);
        }
        Ok(())
    }

    /// Whether a light casts shadows
    pub fn is_shadow_enabled(&self, index: usize) -> bool {
        report_get(self.light(index).map(LightState::is_shadow_enabled), false)
    }

    /// Override the depth bias
    pub fn set_shadow_bias(&mut self, index: usize, bias: f32) {
        report(self.try_set_shadow_bias(index, bias));
    }

    fn try_set_shadow_bias(&mut self, index: usize, bias: f32) -> LightingResult<()> {
        let light = self.light_mut(index)?;
        if light.shadow_bias != bias {
            light.shadow_bias = bias;
            self.push_light(index, LightUniform::DepthBias, bias);
        }
        Ok(())
    }

    /// Depth bias
    pub fn shadow_bias(&self, index: usize) -> f32 {
        report_get(self.light(index).map(|light| light.shadow_bias), 0.0)
    }

    /// Shadow map snapshot, `None` without shadows
    pub fn shadow_map(&self, index: usize) -> Option<ShadowMapInfo> {
        report_get(self.light(index).map(|light| light.shadow.as_ref().and_then(ShadowMap::info)), None)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::render::api::TextureKind;
    use crate::render::backends::HeadlessBackend;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn setup(light_count: usize) -> (Rc<RefCell<HeadlessBackend>>, LightingContext) {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        let context = LightingContext::new(headless.clone(), light_count).expect("context");
        (headless, context)
    }

    fn lighting(context: &LightingContext) -> ProgramHandle {
        context.program(ShaderKind::Lighting).expect("lighting program")
    }

    #[test]
    fn test_creation_defaults_and_uploads() {
        let (headless, context) = setup(4);
        let program = lighting(&context);
        let state = headless.borrow();

        assert_eq!(context.light_count(), 4);
        assert_eq!(state.live_program_count(), ShaderKind::ALL.len());
        assert_eq!(state.uniform(program, "colAmbient"), Some(UniformValue::Vec3(Vec3::repeat(0.1))));
        assert_eq!(state.uniform(program, "maps[0].active"), Some(UniformValue::Int(1)));
        assert_eq!(state.uniform(program, "lights[3].innerCutOff"), Some(UniformValue::Float(-1.0)));
        assert_eq!(state.uniform(program, "lights[2].constant"), Some(UniformValue::Float(1.0)));

        let depth_cubemap = context.program(ShaderKind::DepthCubemap).expect("depth cubemap program");
        assert_eq!(state.uniform(depth_cubemap, "farPlane"), Some(UniformValue::Float(1000.0)));

        assert_eq!(context.light_type(0), LightType::Directional);
        assert!(!context.is_light_used(0));
        assert!(!context.is_shadow_enabled(0));
        assert_eq!(context.light_value(1, LightProperty::Energy), 1.0);
        assert_eq!(context.light_color(1), Color::WHITE);
        assert_eq!(context.default_map(MaterialMapIndex::Height).value, 0.05);
        assert_eq!(context.default_map(MaterialMapIndex::Emission).color, Color::BLACK);
    }

    #[test]
    fn test_default_direction_is_uploaded() {
        let (headless, mut context) = setup(2);
        let program = lighting(&context);
        let forward = Vec3::new(0.0, 0.0, -1.0);
        assert_eq!(headless.borrow().uniform(program, "lights[1].direction"), Some(UniformValue::Vec3(forward)));

        context.set_light_vec3(1, LightProperty::Direction, forward);
        assert_eq!(headless.borrow().uniform(program, "lights[1].direction"), Some(UniformValue::Vec3(forward)));
        assert_eq!(context.light_vec3(1, LightProperty::Direction), forward);
    }

    #[test]
    fn test_light_count_is_clamped() {
        let (_, context) = setup(250);
        assert_eq!(context.light_count(), MAX_LIGHTS);
        assert_eq!(context.config().light_count, MAX_LIGHTS);
    }

    #[test]
    fn test_missing_program_fails_soft() {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        let mut context = LightingContext::builder(2)
            .with_shader_code(ShaderKind::Lighting, "", "")
            .build(headless.clone())
            .expect("context");

        assert!(context.program(ShaderKind::Lighting).is_none());
        assert!(context.program(ShaderKind::Depth).is_some());

        context.set_light_value(0, LightProperty::Energy, 3.0);
        assert_eq!(context.light_value(0, LightProperty::Energy), 3.0);
        // Only the depth-cubemap far plane reached a program.
        assert_eq!(headless.borrow().total_uploads(), 1);
    }

    #[test]
    fn test_custom_sources_are_used_verbatim() {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        let context = LightingContext::builder(2)
            .with_shader_code(ShaderKind::Lighting, "uniform vec3 viewPos;", "void main() {}")
            .build(headless.clone())
            .expect("context");

        assert!(!context.locations.global(LightingUniform::ColorAmbient).is_found());
        assert!(context.locations.global(LightingUniform::ViewPosition).is_found());
    }

    #[test]
    fn test_red_directional_scenario() {
        let (_, mut context) = setup(4);
        context.set_light_type(0, LightType::Directional);
        context.set_light_color(0, Color::rgb(255, 0, 0));
        context.set_light_value(0, LightProperty::Energy, 2.0);

        assert_relative_eq!(context.light_vec3(0, LightProperty::Color), Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
        assert_eq!(context.light_value(0, LightProperty::Energy), 2.0);
    }

    #[test]
    fn test_color_round_trip_within_one_step() {
        let (_, mut context) = setup(1);
        context.set_light_vec3(0, LightProperty::Color, Vec3::new(0.2, 0.55, 0.999));
        let color = context.light_color(0);
        context.set_light_color(0, color);
        let back = context.light_vec3(0, LightProperty::Color);
        for (channel, expected) in [0.2, 0.55, 0.999].into_iter().enumerate() {
            assert!((back[channel] - expected).abs() <= 1.0 / 255.0);
        }

        context.set_light_value(0, LightProperty::Color, 0.5);
        assert_eq!(context.light_vec3(0, LightProperty::Color), Vec3::repeat(0.5));
    }

    #[test]
    fn test_type_round_trip_keeps_shadow_resolution() {
        let (_, mut context) = setup(2);
        context.enable_shadow(1, 256);

        for light_type in [LightType::Omni, LightType::Spot, LightType::Directional, LightType::Omni] {
            context.set_light_type(1, light_type);
            assert_eq!(context.light_type(1), light_type);
            assert!(context.is_shadow_enabled(1));

            let info = context.shadow_map(1).expect("shadow map");
            assert_eq!(info.resolution, 256);
            let expected = if light_type == LightType::Omni { ShadowTarget::Cube } else { ShadowTarget::Planar };
            assert_eq!(info.target, expected);
        }
    }

    #[test]
    fn test_type_change_without_shadow_stays_unshadowed() {
        let (_, mut context) = setup(1);
        context.set_light_type(0, LightType::Spot);
        assert!(!context.is_shadow_enabled(0));
        assert_eq!(context.light_type(0), LightType::Spot);
    }

    #[test]
    fn test_omni_shadow_is_cubemap() {
        let (_, mut context) = setup(1);
        context.set_light_type(0, LightType::Omni);
        context.enable_shadow(0, 512);

        let info = context.shadow_map(0).expect("shadow map");
        assert_eq!((info.texture.width, info.texture.height), (512, 512));
        assert_eq!(info.texture.kind, TextureKind::DepthCubemap);
        assert!(info.texture.is_cubemap());
        assert_eq!(context.shadow_bias(0), 0.05);
    }

    #[test]
    fn test_enable_disable_enable_does_not_leak() {
        let (headless, mut context) = setup(1);
        let baseline = (headless.borrow().live_texture_count(), headless.borrow().live_framebuffer_count());

        context.enable_shadow(0, 1024);
        let first = context.shadow_map(0).expect("shadow map");
        context.disable_shadow(0);
        assert_eq!(
            (headless.borrow().live_texture_count(), headless.borrow().live_framebuffer_count()),
            baseline
        );

        context.enable_shadow(0, 1024);
        let second = context.shadow_map(0).expect("shadow map");
        assert_eq!(second.resolution, first.resolution);
        assert_eq!(second.target, first.target);
        assert_eq!(second.texture.kind, first.texture.kind);
        assert_eq!(headless.borrow().live_texture_count(), baseline.0 + 1);
        assert_eq!(context.shadow_bias(0), 0.0002);
    }

    #[test]
    fn test_resolution_change_rebuilds_map() {
        let (headless, mut context) = setup(1);
        context.enable_shadow(0, 512);
        let first = context.shadow_map(0).expect("shadow map");
        context.enable_shadow(0, 512);
        assert_eq!(context.shadow_map(0).expect("shadow map").texture.id, first.texture.id);

        context.enable_shadow(0, 2048);
        let resized = context.shadow_map(0).expect("shadow map");
        assert_eq!(resized.texture.width, 2048);
        assert_ne!(resized.texture.id, first.texture.id);
        assert_eq!(headless.borrow().live_texture_count(), 1);
    }

    #[test]
    fn test_reenable_at_same_resolution_keeps_bias() {
        let (headless, mut context) = setup(1);
        let program = lighting(&context);
        context.enable_shadow(0, 512);
        context.set_shadow_bias(0, 0.123);
        context.enable_shadow(0, 512);
        assert_eq!(context.shadow_bias(0), 0.123);
        assert_eq!(headless.borrow().uniform(program, "lights[0].depthBias"), Some(UniformValue::Float(0.123)));

        context.enable_shadow(0, 1024);
        assert_eq!(context.shadow_bias(0), 0.0002);

        context.set_shadow_bias(0, 0.123);
        context.set_light_type(0, LightType::Omni);
        assert_eq!(context.shadow_bias(0), 0.05);
        assert_eq!(headless.borrow().uniform(program, "lights[0].depthBias"), Some(UniformValue::Float(0.05)));
    }

    #[test]
    fn test_invalid_resolution_is_rejected() {
        let (_, mut context) = setup(1);
        context.enable_shadow(0, 0);
        assert!(!context.is_shadow_enabled(0));
    }

    #[test]
    fn test_double_disable_is_harmless() {
        let (headless, mut context) = setup(1);
        let program = lighting(&context);
        context.enable_shadow(0, 128);
        context.disable_shadow(0);
        let uploads = headless.borrow().upload_count(program, "lights[0].shadow");
        context.disable_shadow(0);

        let state = headless.borrow();
        assert_eq!(state.invalid_release_count(), 0);
        assert_eq!(state.upload_count(program, "lights[0].shadow"), uploads);
        assert_eq!(state.uniform(program, "lights[0].shadow"), Some(UniformValue::Int(0)));
    }

    #[test]
    fn test_target_round_trip() {
        let (_, mut context) = setup(1);
        context.set_light_vec3(0, LightProperty::Position, Vec3::new(2.0, 5.0, -1.0));
        let target = Vec3::new(-3.0, 0.0, 4.0);
        context.set_light_target_v(0, target);
        assert_relative_eq!(context.light_target(0), target, epsilon = EPSILON);
        assert_relative_eq!(context.light_vec3(0, LightProperty::Direction).norm(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_rotate_about_y() {
        let (headless, mut context) = setup(1);
        context.rotate_light_y(0, 90.0);
        let direction = context.light_vec3(0, LightProperty::Direction);
        assert_relative_eq!(direction, Vec3::new(-1.0, 0.0, 0.0), epsilon = EPSILON);

        let program = lighting(&context);
        let Some(UniformValue::Vec3(uploaded)) = headless.borrow().uniform(program, "lights[0].direction") else {
            panic!("direction not uploaded");
        };
        assert_relative_eq!(uploaded, direction, epsilon = EPSILON);

        context.rotate_light(0, Vec3::new(0.0, 1.0, 0.0), -90.0);
        assert_relative_eq!(context.light_vec3(0, LightProperty::Direction), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_translate_moves_position() {
        let (_, mut context) = setup(1);
        context.translate_light(0, 1.0, 2.0, 3.0);
        context.translate_light_v(0, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(context.light_vec3(0, LightProperty::Position), Vec3::new(2.0, 2.0, 3.0));
    }

    #[test]
    fn test_spot_cutoffs_upload_cosines() {
        let (headless, mut context) = setup(1);
        let program = lighting(&context);
        context.set_light_type(0, LightType::Spot);
        context.set_spot_cone(0, 20.0, 30.0);

        assert_eq!(context.light_value(0, LightProperty::InnerCutoff), 20.0);
        let state = headless.borrow();
        let Some(UniformValue::Float(inner)) = state.uniform(program, "lights[0].innerCutOff") else {
            panic!("inner cutoff not uploaded");
        };
        let Some(UniformValue::Float(outer)) = state.uniform(program, "lights[0].outerCutOff") else {
            panic!("outer cutoff not uploaded");
        };
        assert_relative_eq!(inner, utils::deg_to_rad(20.0).cos(), epsilon = EPSILON);
        assert!(inner >= outer);
    }

    #[test]
    fn test_spot_cone_survives_type_round_trip() {
        let (headless, mut context) = setup(1);
        let program = lighting(&context);
        context.set_light_type(0, LightType::Spot);
        context.set_spot_cone(0, 20.0, 30.0);

        context.set_light_type(0, LightType::Omni);
        assert_eq!(context.light_value(0, LightProperty::InnerCutoff), -1.0);
        assert_eq!(headless.borrow().uniform(program, "lights[0].outerCutOff"), Some(UniformValue::Float(-1.0)));

        context.set_light_type(0, LightType::Spot);
        assert_eq!(context.light_value(0, LightProperty::InnerCutoff), 20.0);
        assert_eq!(context.light_value(0, LightProperty::OuterCutoff), 30.0);
        let state = headless.borrow();
        let Some(UniformValue::Float(outer)) = state.uniform(program, "lights[0].outerCutOff") else {
            panic!("outer cutoff not uploaded");
        };
        assert_relative_eq!(outer, utils::deg_to_rad(30.0).cos(), epsilon = EPSILON);
    }

    #[test]
    fn test_inner_cutoff_clamped_to_outer() {
        let (_, mut context) = setup(1);
        context.set_light_type(0, LightType::Spot);
        context.set_spot_cone(0, 10.0, 25.0);
        context.set_light_value(0, LightProperty::InnerCutoff, 40.0);
        assert_eq!(context.light_value(0, LightProperty::InnerCutoff), 25.0);

        context.set_light_value(0, LightProperty::OuterCutoff, 15.0);
        assert_eq!(context.light_value(0, LightProperty::OuterCutoff), 15.0);
        assert_eq!(context.light_value(0, LightProperty::InnerCutoff), 15.0);
    }

    #[test]
    fn test_cutoff_on_non_spot_is_ignored() {
        let (_, mut context) = setup(1);
        context.set_light_value(0, LightProperty::InnerCutoff, 10.0);
        assert_eq!(context.light_value(0, LightProperty::InnerCutoff), -1.0);
    }

    #[test]
    fn test_unchanged_values_are_not_reuploaded() {
        let (headless, mut context) = setup(1);
        let program = lighting(&context);
        context.set_light_value(0, LightProperty::Energy, 4.0);
        context.set_light_value(0, LightProperty::Energy, 4.0);
        assert_eq!(headless.borrow().upload_count(program, "lights[0].energy"), 2);

        context.set_light_xyz(0, LightProperty::AttenuationClq, 1.0, 0.09, 0.0);
        let state = headless.borrow();
        assert_eq!(state.upload_count(program, "lights[0].constant"), 1);
        assert_eq!(state.upload_count(program, "lights[0].linear"), 1);
        assert_eq!(state.upload_count(program, "lights[0].quadratic"), 0);
    }

    #[test]
    fn test_parallax_pushes_changed_components_only() {
        let (headless, mut context) = setup(1);
        let program = lighting(&context);
        context.set_parallax_layers(8, 32);
        context.set_parallax_layers(8, 64);

        let state = headless.borrow();
        assert_eq!(state.upload_count(program, "parallaxMinLayers"), 1);
        assert_eq!(state.upload_count(program, "parallaxMaxLayers"), 2);
        assert_eq!(context.parallax_layers(), (8, 64));
    }

    #[test]
    fn test_use_map_pushes_on_change() {
        let (headless, mut context) = setup(1);
        let program = lighting(&context);
        context.use_map(MaterialMapIndex::Normal, true);
        context.use_map(MaterialMapIndex::Normal, true);
        context.use_map(MaterialMapIndex::Irradiance, true);

        let state = headless.borrow();
        assert_eq!(state.upload_count(program, "maps[2].active"), 1);
        assert_eq!(state.uniform(program, "cubemaps[1].active"), Some(UniformValue::Int(1)));
        assert!(context.is_map_used(MaterialMapIndex::Normal));
    }

    #[test]
    fn test_unresolved_location_skips_upload() {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        headless.borrow_mut().hide_name("lights[0].size");
        let mut context = LightingContext::new(headless.clone(), 1).expect("context");

        let before = headless.borrow().total_uploads();
        context.set_light_value(0, LightProperty::Size, 2.0);
        assert_eq!(headless.borrow().total_uploads(), before);
        assert_eq!(context.light_value(0, LightProperty::Size), 2.0);
    }

    #[test]
    fn test_invalid_index_is_a_no_op() {
        let (headless, mut context) = setup(2);
        let before = headless.borrow().total_uploads();

        context.use_light(5, true);
        context.set_light_value(2, LightProperty::Energy, 9.0);
        context.enable_shadow(7, 512);
        context.rotate_light_x(9, 45.0);

        assert_eq!(headless.borrow().total_uploads(), before);
        assert!(!context.is_light_used(5));
        assert_eq!(context.light_value(2, LightProperty::Energy), 0.0);
        assert_eq!(context.light_color(3), Color::new(0, 0, 0, 0));
        assert!(context.shadow_map(7).is_none());
    }

    #[test]
    fn test_toggle_and_ambient() {
        let (_, mut context) = setup(1);
        context.toggle_light(0);
        assert!(context.is_light_used(0));
        context.toggle_light(0);
        assert!(!context.is_light_used(0));

        context.set_ambient_color(Color::rgb(51, 102, 153));
        assert_eq!(context.ambient_color(), Color::rgb(51, 102, 153));
        assert_relative_eq!(context.ambient_linear(), Vec3::new(0.2, 0.4, 0.6), epsilon = EPSILON);
    }

    #[test]
    fn test_config_biases_apply() {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        let config = LightingConfig { planar_shadow_bias: 0.001, ..LightingConfig::default() }.with_light_count(1);
        let mut context = LightingContext::builder(0).with_config(&config).build(headless).expect("context");
        context.enable_shadow(0, 64);
        assert_eq!(context.shadow_bias(0), 0.001);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let (headless, mut context) = setup(3);
        context.set_light_type(1, LightType::Omni);
        context.enable_shadow(0, 128);
        context.enable_shadow(1, 128);
        context.destroy();

        let state = headless.borrow();
        assert_eq!(state.live_program_count(), 0);
        assert_eq!(state.live_texture_count(), 0);
        assert_eq!(state.live_framebuffer_count(), 0);
        assert_eq!(state.invalid_release_count(), 0);
    }
}
