//! Per-light state
//!
//! [`LightState`] is the CPU-side copy of one light. The context mirrors each
//! change to the lighting program; nothing here talks to the backend except
//! the owned [`ShadowMap`], which releases itself on drop.

use crate::foundation::math::{constants, utils, Quat, Vec3};
use crate::render::api::UniformValue;

use super::shadow_map::ShadowMap;

/// Light type as the lighting program encodes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightType {
    /// Parallel rays along the light direction
    #[default]
    Directional = 0,
    /// Point light radiating in every direction
    Omni = 1,
    /// Cone-limited point light
    Spot = 2,
}

impl From<LightType> for UniformValue {
    fn from(value: LightType) -> Self {
        Self::Int(value as i32)
    }
}

/// Spot cone in degrees, always `inner <= outer`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotCone {
    inner_deg: f32,
    outer_deg: f32,
}

impl SpotCone {
    /// Cone that lets every direction through (both cosines are -1)
    pub const UNBOUNDED: Self = Self { inner_deg: 180.0, outer_deg: 180.0 };

    /// Create a cone
    ///
    /// Angles are clamped to `[0, 180]`. An inner angle wider than the outer
    /// one is clamped to the outer angle, leaving a hard-edged cone.
    pub fn new(inner_deg: f32, outer_deg: f32) -> Self {
        let outer_deg = outer_deg.clamp(0.0, 180.0);
        let inner_deg = inner_deg.clamp(0.0, 180.0);
        if inner_deg > outer_deg {
            log::warn!("Spot inner cutoff {inner_deg} exceeds outer cutoff {outer_deg}, clamping");
        }
        Self { inner_deg: inner_deg.min(outer_deg), outer_deg }
    }

    /// Inner angle in degrees
    pub const fn inner_deg(&self) -> f32 {
        self.inner_deg
    }

    /// Outer angle in degrees
    pub const fn outer_deg(&self) -> f32 {
        self.outer_deg
    }

    /// Cosine of the inner angle, as uploaded
    pub fn cos_inner(&self) -> f32 {
        utils::deg_to_rad(self.inner_deg).cos()
    }

    /// Cosine of the outer angle, as uploaded
    pub fn cos_outer(&self) -> f32 {
        utils::deg_to_rad(self.outer_deg).cos()
    }

    /// Copy with a new inner angle, clamped to the outer one
    pub fn with_inner(self, inner_deg: f32) -> Self {
        Self::new(inner_deg, self.outer_deg)
    }

    /// Copy with a new outer angle; the inner angle shrinks to stay inside it
    pub fn with_outer(self, outer_deg: f32) -> Self {
        let outer_deg = outer_deg.clamp(0.0, 180.0);
        Self { inner_deg: self.inner_deg.min(outer_deg), outer_deg }
    }
}

impl Default for SpotCone {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Light type with the data only that type uses
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LightKind {
    /// Directional light
    #[default]
    Directional,
    /// Omni light
    Omni,
    /// Spot light and its cone
    Spot(SpotCone),
}

impl LightKind {
    /// Discriminant uploaded to the lighting program
    pub const fn light_type(&self) -> LightType {
        match self {
            Self::Directional => LightType::Directional,
            Self::Omni => LightType::Omni,
            Self::Spot(_) => LightType::Spot,
        }
    }

    /// Kind for a type, with an unbounded cone for spots
    pub fn from_type(light_type: LightType) -> Self {
        match light_type {
            LightType::Directional => Self::Directional,
            LightType::Omni => Self::Omni,
            LightType::Spot => Self::Spot(SpotCone::default()),
        }
    }

    /// Spot cone, if any
    pub const fn cone(&self) -> Option<SpotCone> {
        match self {
            Self::Spot(cone) => Some(*cone),
            _ => None,
        }
    }
}

/// Addressable light properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightProperty {
    /// World position (vector)
    Position,
    /// Unit direction (vector)
    Direction,
    /// Linear RGB color (vector, or scalar broadcast to all channels)
    Color,
    /// Radiance multiplier
    Energy,
    /// Specular multiplier
    Specular,
    /// Light radius used to soften N·L
    Size,
    /// Spot inner cutoff in degrees
    InnerCutoff,
    /// Spot outer cutoff in degrees
    OuterCutoff,
    /// Constant attenuation
    AttenuationConstant,
    /// Linear attenuation
    AttenuationLinear,
    /// Quadratic attenuation
    AttenuationQuadratic,
    /// Constant, linear and quadratic attenuation together (vector)
    AttenuationClq,
}

/// Inverse attenuation terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Constant term
    pub constant: f32,
    /// Linear term
    pub linear: f32,
    /// Quadratic term
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.0, quadratic: 0.0 }
    }
}

impl Attenuation {
    /// Terms as `(constant, linear, quadratic)`
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.constant, self.linear, self.quadratic)
    }

    /// `1 / (c + l*d + q*d^2)`
    pub fn factor(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }
}

/// One light's state
#[derive(Debug)]
pub struct LightState {
    /// Type and type-specific data
    pub kind: LightKind,
    /// World position
    pub position: Vec3,
    /// Unit direction
    pub direction: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Radiance multiplier
    pub energy: f32,
    /// Specular multiplier
    pub specular: f32,
    /// Light radius, never negative
    pub size: f32,
    /// Attenuation terms
    pub attenuation: Attenuation,
    /// Whether the light contributes
    pub enabled: bool,
    /// Depth bias used when sampling the shadow map
    pub shadow_bias: f32,
    /// Distance from the position to the last target set
    pub target_distance: f32,
    /// Shadow map, present exactly when shadows are enabled
    pub shadow: Option<ShadowMap>,
    /// Cone restored when the light becomes a spot again
    pub last_cone: SpotCone,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, 0.0, -1.0),
            color: Vec3::new(1.0, 1.0, 1.0),
            energy: 1.0,
            specular: 1.0,
            size: 0.0,
            attenuation: Attenuation::default(),
            enabled: false,
            shadow_bias: 0.0,
            target_distance: 1.0,
            shadow: None,
            last_cone: SpotCone::default(),
        }
    }
}

impl LightState {
    /// Whether a shadow map is attached
    pub const fn is_shadow_enabled(&self) -> bool {
        self.shadow.is_some()
    }

    /// Switch type, keeping the spot cone across non-spot types
    pub fn set_type(&mut self, light_type: LightType) {
        if let Some(cone) = self.kind.cone() {
            self.last_cone = cone;
        }
        self.kind = match light_type {
            LightType::Spot => LightKind::Spot(self.last_cone),
            other => LightKind::from_type(other),
        };
    }

    /// Inner cutoff in degrees, -1 for lights without a cone
    pub fn inner_cutoff(&self) -> f32 {
        self.kind.cone().map_or(-1.0, |cone| cone.inner_deg())
    }

    /// Outer cutoff in degrees, -1 for lights without a cone
    pub fn outer_cutoff(&self) -> f32 {
        self.kind.cone().map_or(-1.0, |cone| cone.outer_deg())
    }

    /// Cosines uploaded for the cutoffs; lights without a cone upload -1
    pub fn cutoff_cosines(&self) -> (f32, f32) {
        self.kind.cone().map_or((-1.0, -1.0), |cone| (cone.cos_inner(), cone.cos_outer()))
    }

    /// Point the light at `target`; `None` when the target sits on the light
    pub fn look_at(&mut self, target: Vec3) -> Option<Vec3> {
        let offset = target - self.position;
        let distance = offset.norm();
        if distance <= constants::LENGTH_EPSILON {
            return None;
        }
        self.direction = offset / distance;
        self.target_distance = distance;
        Some(self.direction)
    }

    /// Point the light was last aimed at
    pub fn target(&self) -> Vec3 {
        self.position + self.direction * self.target_distance
    }
}

/// Rotate `v` about +X by `degrees`, counter-clockwise looking toward the origin
pub fn rotate_x(v: Vec3, degrees: f32) -> Vec3 {
    let (s, c) = utils::deg_to_rad(degrees).sin_cos();
    Vec3::new(v.x, v.y * c - v.z * s, v.y * s + v.z * c)
}

/// Rotate `v` about +Y by `degrees`, counter-clockwise looking toward the origin
pub fn rotate_y(v: Vec3, degrees: f32) -> Vec3 {
    let (s, c) = utils::deg_to_rad(degrees).sin_cos();
    Vec3::new(v.x * c + v.z * s, v.y, -v.x * s + v.z * c)
}

/// Rotate `v` about +Z by `degrees`, counter-clockwise looking toward the origin
pub fn rotate_z(v: Vec3, degrees: f32) -> Vec3 {
    let (s, c) = utils::deg_to_rad(degrees).sin_cos();
    Vec3::new(v.x * c - v.y * s, v.x * s + v.y * c, v.z)
}

/// Rotate `v` about an arbitrary axis; `None` for a zero axis
pub fn rotate_axis(v: Vec3, axis: Vec3, degrees: f32) -> Option<Vec3> {
    let axis = nalgebra::Unit::try_new(axis, constants::LENGTH_EPSILON)?;
    let rotation = Quat::from_axis_angle(&axis, utils::deg_to_rad(degrees));
    Some(utils::normalize_or_zero(rotation * v))
}
