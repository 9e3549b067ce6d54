//! Shader sources for the lighting system
//!
//! Every program the lighting context builds has an embedded GLSL 330
//! source pair. Applications can replace any of them with their own sources
//! before the context is created, either from strings or from files.

use std::fmt;
use std::path::Path;

use crate::render::{RenderError, RenderResult};

const LIGHTING_VS: &str = include_str!("../../../shaders/lighting.vert");
const LIGHTING_FS: &str = include_str!("../../../shaders/lighting.frag");
const DEPTH_VS: &str = include_str!("../../../shaders/depth.vert");
const DEPTH_FS: &str = include_str!("../../../shaders/depth.frag");
const DEPTH_CUBEMAP_VS: &str = include_str!("../../../shaders/depth_cubemap.vert");
const DEPTH_CUBEMAP_FS: &str = include_str!("../../../shaders/depth_cubemap.frag");
const CUBEMAP_VS: &str = include_str!("../../../shaders/cubemap.vert");
const EQUIRECTANGULAR_FS: &str = include_str!("../../../shaders/equirectangular_to_cubemap.frag");
const IRRADIANCE_FS: &str = include_str!("../../../shaders/irradiance_convolution.frag");
const SKYBOX_VS: &str = include_str!("../../../shaders/skybox.vert");
const SKYBOX_FS: &str = include_str!("../../../shaders/skybox.frag");

/// Placeholder substituted with the light count in the embedded lighting program
const LIGHT_COUNT_TOKEN: &str = "{{NUM_LIGHTS}}";

/// The programs a lighting context owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Main PBR program
    Lighting,
    /// Depth-only program for directional and spot shadow maps
    Depth,
    /// Linear-distance depth program for omni shadow cubemaps
    DepthCubemap,
    /// Equirectangular panorama to cubemap conversion
    EquirectangularToCubemap,
    /// Diffuse irradiance convolution
    IrradianceConvolution,
    /// Skybox backdrop
    Skybox,
}

impl ShaderKind {
    /// Every kind, in load order
    pub const ALL: [Self; 6] = [
        Self::Lighting,
        Self::Depth,
        Self::DepthCubemap,
        Self::EquirectangularToCubemap,
        Self::IrradianceConvolution,
        Self::Skybox,
    ];

    /// Position in [`Self::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lighting => "lighting",
            Self::Depth => "depth",
            Self::DepthCubemap => "depth cubemap",
            Self::EquirectangularToCubemap => "equirectangular to cubemap",
            Self::IrradianceConvolution => "irradiance convolution",
            Self::Skybox => "skybox",
        };
        f.write_str(name)
    }
}

/// Vertex and fragment source pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    /// Vertex shader source
    pub vertex: String,
    /// Fragment shader source
    pub fragment: String,
}

impl ShaderSources {
    /// Create a source pair
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self { vertex: vertex.into(), fragment: fragment.into() }
    }

    /// Read a source pair from disk
    ///
    /// Relative paths that do not exist are also tried under `shaders/`.
    pub fn from_files(vertex_path: &str, fragment_path: &str) -> RenderResult<Self> {
        Ok(Self::new(read_source(vertex_path)?, read_source(fragment_path)?))
    }

    /// The embedded sources for `kind`
    ///
    /// `light_count` sizes the light arrays of the lighting program and is
    /// ignored for the other kinds.
    pub fn embedded(kind: ShaderKind, light_count: usize) -> Self {
        match kind {
            ShaderKind::Lighting => {
                let count = light_count.to_string();
                Self::new(LIGHTING_VS.replace(LIGHT_COUNT_TOKEN, &count), LIGHTING_FS.replace(LIGHT_COUNT_TOKEN, &count))
            }
            ShaderKind::Depth => Self::new(DEPTH_VS, DEPTH_FS),
            ShaderKind::DepthCubemap => Self::new(DEPTH_CUBEMAP_VS, DEPTH_CUBEMAP_FS),
            ShaderKind::EquirectangularToCubemap => Self::new(CUBEMAP_VS, EQUIRECTANGULAR_FS),
            ShaderKind::IrradianceConvolution => Self::new(CUBEMAP_VS, IRRADIANCE_FS),
            ShaderKind::Skybox => Self::new(SKYBOX_VS, SKYBOX_FS),
        }
    }
}

fn read_source(path: &str) -> RenderResult<String> {
    let resolved = if Path::new(path).exists() {
        Path::new(path).to_path_buf()
    } else {
        Path::new("shaders").join(path)
    };
    std::fs::read_to_string(&resolved)
        .map_err(|e| RenderError::ResourceCreationFailed(format!("Failed to read shader '{path}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_count_substitution() {
        let sources = ShaderSources::embedded(ShaderKind::Lighting, 7);
        assert!(sources.vertex.contains("#define NUM_LIGHTS 7"));
        assert!(sources.fragment.contains("#define NUM_LIGHTS 7"));
        assert!(!sources.fragment.contains(LIGHT_COUNT_TOKEN));
    }

    #[test]
    fn test_cubemap_programs_share_vertex_stage() {
        let equirect = ShaderSources::embedded(ShaderKind::EquirectangularToCubemap, 0);
        let irradiance = ShaderSources::embedded(ShaderKind::IrradianceConvolution, 0);
        assert_eq!(equirect.vertex, irradiance.vertex);
        assert!(irradiance.fragment.contains("sampleDelta = 0.025"));
    }

    #[test]
    fn test_every_kind_has_sources() {
        for kind in ShaderKind::ALL {
            let sources = ShaderSources::embedded(kind, 4);
            assert!(sources.vertex.starts_with("#version 330"), "{kind}");
            assert!(sources.fragment.starts_with("#version 330"), "{kind}");
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(ShaderSources::from_files("no_such.vert", "no_such.frag").is_err());
    }
}
