//! Uniform location tables
//!
//! Every name a pass uploads to is resolved once, right after the program
//! links, into an array indexed by a closed enum. A name the program does not
//! expose stays [`ShaderLocation::NOT_FOUND`] and uploads to it are skipped.

use crate::render::api::{GraphicsBackend, ProgramHandle, ShaderLocation};
use crate::render::primitives::{MaterialMapIndex, MATERIAL_MAP_COUNT};

/// Global uniforms of the lighting program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightingUniform {
    /// `mvp`
    Mvp,
    /// `matView`
    MatView,
    /// `matProjection`
    MatProjection,
    /// `matModel`
    MatModel,
    /// `matNormal`
    MatNormal,
    /// `colAmbient`
    ColorAmbient,
    /// `viewPos`
    ViewPosition,
    /// `parallaxMinLayers`
    ParallaxMinLayers,
    /// `parallaxMaxLayers`
    ParallaxMaxLayers,
    /// `farPlane`
    FarPlane,
    /// Albedo map color
    ColorDiffuse,
    /// Metalness map color
    ColorSpecular,
    /// Emission map color
    ColorEmission,
    /// Metalness map value
    MetalnessScale,
    /// Roughness map value
    RoughnessScale,
    /// Occlusion map value (how much AO darkens direct light)
    AoLightAffect,
    /// Height map value
    HeightScale,
}

impl LightingUniform {
    /// Number of variants
    pub const COUNT: usize = 17;

    /// Every variant, in table order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Mvp,
        Self::MatView,
        Self::MatProjection,
        Self::MatModel,
        Self::MatNormal,
        Self::ColorAmbient,
        Self::ViewPosition,
        Self::ParallaxMinLayers,
        Self::ParallaxMaxLayers,
        Self::FarPlane,
        Self::ColorDiffuse,
        Self::ColorSpecular,
        Self::ColorEmission,
        Self::MetalnessScale,
        Self::RoughnessScale,
        Self::AoLightAffect,
        Self::HeightScale,
    ];

    /// GLSL name
    pub fn name(self) -> String {
        let map_field = |map: MaterialMapIndex, field: &str| format!("{}.{field}", map.uniform_base());
        match self {
            Self::Mvp => "mvp".to_string(),
            Self::MatView => "matView".to_string(),
            Self::MatProjection => "matProjection".to_string(),
            Self::MatModel => "matModel".to_string(),
            Self::MatNormal => "matNormal".to_string(),
            Self::ColorAmbient => "colAmbient".to_string(),
            Self::ViewPosition => "viewPos".to_string(),
            Self::ParallaxMinLayers => "parallaxMinLayers".to_string(),
            Self::ParallaxMaxLayers => "parallaxMaxLayers".to_string(),
            Self::FarPlane => "farPlane".to_string(),
            Self::ColorDiffuse => map_field(MaterialMapIndex::Albedo, "color"),
            Self::ColorSpecular => map_field(MaterialMapIndex::Metalness, "color"),
            Self::ColorEmission => map_field(MaterialMapIndex::Emission, "color"),
            Self::MetalnessScale => map_field(MaterialMapIndex::Metalness, "value"),
            Self::RoughnessScale => map_field(MaterialMapIndex::Roughness, "value"),
            Self::AoLightAffect => map_field(MaterialMapIndex::Occlusion, "value"),
            Self::HeightScale => map_field(MaterialMapIndex::Height, "value"),
        }
    }
}

/// Vertex attributes of the lighting program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    /// `vertexPosition`
    Position,
    /// `vertexTexCoord`
    TexCoord,
    /// `vertexTexCoord2`
    TexCoord2,
    /// `vertexNormal`
    Normal,
    /// `vertexTangent`
    Tangent,
    /// `vertexColor`
    Color,
}

impl VertexAttribute {
    /// Number of variants
    pub const COUNT: usize = 6;

    /// Every variant, in table order
    pub const ALL: [Self; Self::COUNT] =
        [Self::Position, Self::TexCoord, Self::TexCoord2, Self::Normal, Self::Tangent, Self::Color];

    /// GLSL name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "vertexPosition",
            Self::TexCoord => "vertexTexCoord",
            Self::TexCoord2 => "vertexTexCoord2",
            Self::Normal => "vertexNormal",
            Self::Tangent => "vertexTangent",
            Self::Color => "vertexColor",
        }
    }
}

/// Per-light uniforms, `lights[i].*` plus `matLights[i]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightUniform {
    /// Omni shadow cubemap sampler
    ShadowCubemap,
    /// Directional/spot shadow map sampler
    ShadowMap,
    /// Light-space view-projection (`matLights[i]`)
    ViewProjection,
    /// World position
    Position,
    /// Direction
    Direction,
    /// Linear color
    Color,
    /// Energy
    Energy,
    /// Specular multiplier
    Specular,
    /// Size
    Size,
    /// Inner cutoff cosine
    InnerCutoff,
    /// Outer cutoff cosine
    OuterCutoff,
    /// Constant attenuation
    Constant,
    /// Linear attenuation
    Linear,
    /// Quadratic attenuation
    Quadratic,
    /// Shadow map texel size
    ShadowMapTexelSize,
    /// Shadow depth bias
    DepthBias,
    /// Light type
    Type,
    /// Shadow flag
    Shadow,
    /// Enabled flag
    Enabled,
}

impl LightUniform {
    /// Number of variants
    pub const COUNT: usize = 19;

    /// Every variant, in table order
    pub const ALL: [Self; Self::COUNT] = [
        Self::ShadowCubemap,
        Self::ShadowMap,
        Self::ViewProjection,
        Self::Position,
        Self::Direction,
        Self::Color,
        Self::Energy,
        Self::Specular,
        Self::Size,
        Self::InnerCutoff,
        Self::OuterCutoff,
        Self::Constant,
        Self::Linear,
        Self::Quadratic,
        Self::ShadowMapTexelSize,
        Self::DepthBias,
        Self::Type,
        Self::Shadow,
        Self::Enabled,
    ];

    /// GLSL name for light `index`
    pub fn name(self, index: usize) -> String {
        let field = match self {
            Self::ViewProjection => return format!("matLights[{index}]"),
            Self::ShadowCubemap => "shadowCubemap",
            Self::ShadowMap => "shadowMap",
            Self::Position => "position",
            Self::Direction => "direction",
            Self::Color => "color",
            Self::Energy => "energy",
            Self::Specular => "specular",
            Self::Size => "size",
            Self::InnerCutoff => "innerCutOff",
            Self::OuterCutoff => "outerCutOff",
            Self::Constant => "constant",
            Self::Linear => "linear",
            Self::Quadratic => "quadratic",
            Self::ShadowMapTexelSize => "shadowMapTxlSz",
            Self::DepthBias => "depthBias",
            Self::Type => "type",
            Self::Shadow => "shadow",
            Self::Enabled => "enabled",
        };
        format!("lights[{index}].{field}")
    }
}

/// Uniforms of the auxiliary programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxUniform {
    /// `mvp`
    Mvp,
    /// `matModel`
    MatModel,
    /// `matView`
    MatView,
    /// `matProjection`
    MatProjection,
    /// `lightPos`
    LightPosition,
    /// `farPlane`
    FarPlane,
    /// `doGamma`
    DoGamma,
    /// `environmentMap`
    EnvironmentMap,
    /// `equirectangularMap`
    EquirectangularMap,
}

impl AuxUniform {
    /// Number of variants
    pub const COUNT: usize = 9;

    /// Every variant, in table order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Mvp,
        Self::MatModel,
        Self::MatView,
        Self::MatProjection,
        Self::LightPosition,
        Self::FarPlane,
        Self::DoGamma,
        Self::EnvironmentMap,
        Self::EquirectangularMap,
    ];

    /// GLSL name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mvp => "mvp",
            Self::MatModel => "matModel",
            Self::MatView => "matView",
            Self::MatProjection => "matProjection",
            Self::LightPosition => "lightPos",
            Self::FarPlane => "farPlane",
            Self::DoGamma => "doGamma",
            Self::EnvironmentMap => "environmentMap",
            Self::EquirectangularMap => "equirectangularMap",
        }
    }
}

/// Resolved locations of an auxiliary program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuxProgram {
    /// Program handle, `None` when it failed to load
    pub handle: Option<ProgramHandle>,
    uniforms: [ShaderLocation; AuxUniform::COUNT],
    position: ShaderLocation,
}

impl AuxProgram {
    /// Resolve every auxiliary name against `handle`
    pub fn resolve(backend: &dyn GraphicsBackend, handle: Option<ProgramHandle>) -> Self {
        let mut program = Self { handle, ..Self::default() };
        if let Some(handle) = handle {
            for uniform in AuxUniform::ALL {
                program.uniforms[uniform as usize] = backend.uniform_location(handle, uniform.name());
            }
            program.position = backend.attribute_location(handle, VertexAttribute::Position.name());
        }
        program
    }

    /// Location of `uniform`
    pub const fn uniform(&self, uniform: AuxUniform) -> ShaderLocation {
        self.uniforms[uniform as usize]
    }

    /// Location of `vertexPosition`
    pub const fn position(&self) -> ShaderLocation {
        self.position
    }
}

/// Resolved locations of the lighting program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightingLocations {
    globals: [ShaderLocation; LightingUniform::COUNT],
    attributes: [ShaderLocation; VertexAttribute::COUNT],
    map_textures: [ShaderLocation; MATERIAL_MAP_COUNT],
    map_active: [ShaderLocation; MATERIAL_MAP_COUNT],
    lights: Vec<[ShaderLocation; LightUniform::COUNT]>,
}

impl LightingLocations {
    /// Table where every lookup is [`ShaderLocation::NOT_FOUND`]
    pub fn unresolved(light_count: usize) -> Self {
        Self {
            globals: [ShaderLocation::NOT_FOUND; LightingUniform::COUNT],
            attributes: [ShaderLocation::NOT_FOUND; VertexAttribute::COUNT],
            map_textures: [ShaderLocation::NOT_FOUND; MATERIAL_MAP_COUNT],
            map_active: [ShaderLocation::NOT_FOUND; MATERIAL_MAP_COUNT],
            lights: vec![[ShaderLocation::NOT_FOUND; LightUniform::COUNT]; light_count],
        }
    }

    /// Resolve every name against the lighting program
    pub fn resolve(backend: &dyn GraphicsBackend, program: Option<ProgramHandle>, light_count: usize) -> Self {
        let mut table = Self::unresolved(light_count);
        let Some(program) = program else {
            return table;
        };

        for uniform in LightingUniform::ALL {
            table.globals[uniform as usize] = backend.uniform_location(program, &uniform.name());
        }
        for attribute in VertexAttribute::ALL {
            table.attributes[attribute as usize] = backend.attribute_location(program, attribute.name());
        }
        for map in MaterialMapIndex::ALL {
            let base = map.uniform_base();
            table.map_textures[map.index()] = backend.uniform_location(program, &format!("{base}.texture"));
            table.map_active[map.index()] = backend.uniform_location(program, &format!("{base}.active"));
        }
        for (index, light) in table.lights.iter_mut().enumerate() {
            for uniform in LightUniform::ALL {
                light[uniform as usize] = backend.uniform_location(program, &uniform.name(index));
            }
        }

        table
    }

    /// Location of a global uniform
    pub const fn global(&self, uniform: LightingUniform) -> ShaderLocation {
        self.globals[uniform as usize]
    }

    /// Location of a vertex attribute
    pub const fn attribute(&self, attribute: VertexAttribute) -> ShaderLocation {
        self.attributes[attribute as usize]
    }

    /// Location of a material map's sampler
    pub const fn map_texture(&self, map: MaterialMapIndex) -> ShaderLocation {
        self.map_textures[map as usize]
    }

    /// Location of a material map's `active` flag
    pub const fn map_active(&self, map: MaterialMapIndex) -> ShaderLocation {
        self.map_active[map as usize]
    }

    /// Location of a per-light uniform; `NOT_FOUND` past the light count
    pub fn light(&self, index: usize, uniform: LightUniform) -> ShaderLocation {
        self.lights.get(index).map_or(ShaderLocation::NOT_FOUND, |light| light[uniform as usize])
    }
}
