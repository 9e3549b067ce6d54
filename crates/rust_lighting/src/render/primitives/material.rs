//! Material maps as the lighting program samples them

use crate::foundation::color::Color;
use crate::render::api::TextureInfo;

/// Number of material map slots the lighting program declares
pub const MATERIAL_MAP_COUNT: usize = 11;

/// Material map slot
///
/// The discriminant doubles as the texture unit the slot binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialMapIndex {
    /// Base color
    Albedo = 0,
    /// Metalness (blue channel)
    Metalness = 1,
    /// Tangent-space normals
    Normal = 2,
    /// Roughness (green channel)
    Roughness = 3,
    /// Ambient occlusion
    Occlusion = 4,
    /// Emission
    Emission = 5,
    /// Height for parallax mapping
    Height = 6,
    /// Specular reflection cubemap
    Cubemap = 7,
    /// Diffuse irradiance cubemap
    Irradiance = 8,
    /// Prefiltered specular cubemap
    Prefilter = 9,
    /// BRDF lookup table
    Brdf = 10,
}

impl MaterialMapIndex {
    /// Every slot in texture unit order
    pub const ALL: [Self; MATERIAL_MAP_COUNT] = [
        Self::Albedo,
        Self::Metalness,
        Self::Normal,
        Self::Roughness,
        Self::Occlusion,
        Self::Emission,
        Self::Height,
        Self::Cubemap,
        Self::Irradiance,
        Self::Prefilter,
        Self::Brdf,
    ];

    /// Slot index, also the texture unit
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the slot samples a cubemap
    pub const fn is_cubemap(self) -> bool {
        matches!(self, Self::Cubemap | Self::Irradiance | Self::Prefilter)
    }

    /// Name of the uniform array element backing the slot
    ///
    /// Cubemap slots live in `cubemaps[0..3]`; the remaining slots are packed
    /// in order into `maps[0..8]`, so the BRDF slot lands in `maps[7]`.
    pub fn uniform_base(self) -> String {
        match self {
            Self::Cubemap => "cubemaps[0]".to_string(),
            Self::Irradiance => "cubemaps[1]".to_string(),
            Self::Prefilter => "cubemaps[2]".to_string(),
            Self::Brdf => "maps[7]".to_string(),
            other => format!("maps[{}]", other.index()),
        }
    }
}

/// One material map: optional texture plus constant color and value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialMap {
    /// Texture sampled for this slot
    pub texture: Option<TextureInfo>,

    /// Constant color multiplied with the sample
    pub color: Color,

    /// Scalar parameter (metalness, roughness, AO influence, height scale)
    pub value: f32,
}

impl Default for MaterialMap {
    fn default() -> Self {
        Self { texture: None, color: Color::WHITE, value: 0.0 }
    }
}

impl MaterialMap {
    /// Map with a texture
    pub fn with_texture(mut self, texture: TextureInfo) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Map with a color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Map with a scalar value
    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    /// Texture id, 0 when no texture is set
    pub fn texture_id(&self) -> u32 {
        self.texture.map_or(0, |t| t.id.0)
    }
}

/// Full set of material maps
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Material {
    /// Maps indexed by [`MaterialMapIndex`]
    pub maps: [MaterialMap; MATERIAL_MAP_COUNT],
}

impl Material {
    /// Map for a slot
    pub fn map(&self, index: MaterialMapIndex) -> &MaterialMap {
        &self.maps[index.index()]
    }

    /// Mutable map for a slot
    pub fn map_mut(&mut self, index: MaterialMapIndex) -> &mut MaterialMap {
        &mut self.maps[index.index()]
    }

    /// Replace a slot's map
    pub fn with_map(mut self, index: MaterialMapIndex, map: MaterialMap) -> Self {
        self.maps[index.index()] = map;
        self
    }

    /// Shorthand for setting the albedo color
    pub fn with_albedo(mut self, color: Color) -> Self {
        self.map_mut(MaterialMapIndex::Albedo).color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_packing() {
        assert_eq!(MaterialMapIndex::Albedo.uniform_base(), "maps[0]");
        assert_eq!(MaterialMapIndex::Height.uniform_base(), "maps[6]");
        assert_eq!(MaterialMapIndex::Cubemap.uniform_base(), "cubemaps[0]");
        assert_eq!(MaterialMapIndex::Prefilter.uniform_base(), "cubemaps[2]");
        assert_eq!(MaterialMapIndex::Brdf.uniform_base(), "maps[7]");
    }

    #[test]
    fn test_cubemap_slots() {
        let cubemaps: Vec<_> = MaterialMapIndex::ALL.into_iter().filter(|m| m.is_cubemap()).collect();
        assert_eq!(
            cubemaps,
            vec![MaterialMapIndex::Cubemap, MaterialMapIndex::Irradiance, MaterialMapIndex::Prefilter]
        );
    }
}
