//! Lighting system
//!
//! Multi-light PBR shading with per-light shadow maps. A [`LightingContext`]
//! owns the shading programs and the light array; the shadow pass renders
//! depth into each light's map and the lighting pass draws meshes with every
//! active light, map and shadow bound.

pub mod active;
pub mod context;
pub mod error;
pub mod light;
pub mod lighting_pass;
pub mod shading;
pub mod shadow_map;
pub mod shadow_pass;
pub mod uniforms;

pub use active::{active, clear_active, set_active, with_active, SharedContext};
pub use context::{LightingContext, LightingContextBuilder};
pub use error::{LightingError, LightingResult};
pub use light::{Attenuation, LightKind, LightProperty, LightState, LightType, SpotCone};
pub use lighting_pass::SHADOW_MAP_FIRST_UNIT;
pub use shadow_map::{ShadowMap, ShadowMapInfo, ShadowTarget};
pub use shadow_pass::{ShadowCaster, ShadowDrawFn};
pub use uniforms::{
    AuxProgram, AuxUniform, LightUniform, LightingLocations, LightingUniform, VertexAttribute,
};
