//! # Rust Lighting
//!
//! Multi-light physically based shading with shadow mapping and skyboxes,
//! written against an abstract graphics backend.
//!
//! ## Features
//!
//! - **Light array**: up to 99 directional, omni and spot lights per context
//! - **Shadows**: 2D depth maps with PCF, depth cubemaps for omni lights
//! - **Materials**: albedo, metalness, normal, roughness, occlusion, emission,
//!   height (parallax) and image-based ambient maps
//! - **Skyboxes**: LDR cross/strip images and HDR panoramas, with irradiance
//!   convolution
//! - **Headless backend**: an in-memory recorder for tests and tools
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use rust_lighting::prelude::*;
//!
//! let backend: SharedBackend = Rc::new(RefCell::new(HeadlessBackend::new()));
//! let mut lighting = LightingContext::new(backend.clone(), 2)?;
//!
//! lighting.set_light_type(0, LightType::Omni);
//! lighting.set_light_xyz(0, LightProperty::Position, 0.0, 4.0, 0.0);
//! lighting.use_light(0, true);
//! lighting.enable_shadow(0, 512);
//!
//! let cube = Model::from_mesh(Mesh::cube(1.0).upload(&backend)?, Material::default());
//! lighting.update_shadow_map(0, Some(&mut |caster: &mut ShadowCaster<'_>| {
//!     caster.cast_model(&cube, Vec3::zeros(), 1.0);
//! }));
//! lighting.draw_model(&cube, Vec3::zeros(), 1.0, Color::WHITE);
//! # Ok::<(), RenderError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for lighting users
pub mod prelude {
    pub use crate::{
        config::{Config, LightingConfig, MAX_LIGHTS},
        foundation::{
            color::Color,
            math::{Mat4, Vec2, Vec3},
        },
        render::{
            api::{PixelFormat, TextureInfo},
            backends::HeadlessBackend,
            primitives::{Material, MaterialMap, MaterialMapIndex, Mesh, Model},
            shaders::ShaderKind,
            systems::{
                lighting::{
                    LightProperty, LightType, LightingContext, LightingContextBuilder, LightingError,
                    ShadowCaster, ShadowDrawFn,
                },
                skybox::Skybox,
            },
            GraphicsBackend, RenderError, RenderResult, SharedBackend,
        },
    };
}
