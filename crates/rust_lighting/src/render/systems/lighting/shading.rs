//! CPU reference of the lighting fragment program
//!
//! Each term the GLSL lighting shader evaluates is exposed here as a plain
//! function so scene code can predict lighting without a GPU and tests can
//! pin the math down. Samplers are passed as closures over texture
//! coordinates.

use std::f32::consts::PI;

use crate::foundation::math::{utils, Vec2, Vec3};

use super::light::{Attenuation, LightKind, LightState};

/// Specular reflectance used for dielectrics
pub const DIELECTRIC_SPECULAR: f32 = 0.5;

/// Floor applied to `N·V` before it is used as a divisor
pub const MIN_N_DOT_V: f32 = 1e-4;

/// GGX normal distribution `D`
pub fn distribution_ggx(cos_theta: f32, alpha: f32) -> f32 {
    let a = cos_theta * alpha;
    let k = alpha / (1.0 - cos_theta * cos_theta + a * a);
    k * k / PI
}

/// Height-correlated Smith visibility `0.5 / mix(2·NL·NV, NL + NV, α)`
pub fn geometry_smith(n_dot_l: f32, n_dot_v: f32, alpha: f32) -> f32 {
    0.5 / utils::lerp(2.0 * n_dot_l * n_dot_v, n_dot_l + n_dot_v, alpha)
}

/// Schlick weight `(1 - u)^5`
pub fn schlick_fresnel(u: f32) -> f32 {
    let m = 1.0 - u;
    let m2 = m * m;
    m2 * m2 * m
}

/// Reflectance at normal incidence
pub fn compute_f0(metalness: f32, specular: f32, albedo: Vec3) -> Vec3 {
    let dielectric = 0.16 * specular * specular;
    Vec3::repeat(dielectric).lerp(&albedo, metalness)
}

/// Grazing reflectance derived from F0
pub fn compute_f90(f0: Vec3) -> f32 {
    (50.0 * f0.y).clamp(0.0, 1.0)
}

/// Extra cosine added for area lights of radius `size` at `distance`
pub fn size_softening(size: f32, distance: f32) -> f32 {
    if size <= 0.0 {
        return 0.0;
    }
    let t = size / distance.max(0.001);
    (1.0 - 1.0 / (1.0 + t * t).sqrt()).max(0.0)
}

/// Burley diffuse BRDF, already multiplied by the clamped `N·L`
pub fn burley_diffuse(n_dot_l: f32, n_dot_v: f32, l_dot_h: f32, roughness: f32) -> f32 {
    let fd90_minus_1 = 2.0 * l_dot_h * l_dot_h * roughness - 0.5;
    let fd_v = 1.0 + fd90_minus_1 * schlick_fresnel(n_dot_v);
    let fd_l = 1.0 + fd90_minus_1 * schlick_fresnel(n_dot_l);
    fd_v * fd_l * n_dot_l / PI
}

/// Spot falloff for `theta = dot(L, -direction)` between the cutoff cosines
///
/// Equal cutoffs give a hard edge.
pub fn spot_intensity(theta: f32, cos_inner: f32, cos_outer: f32) -> f32 {
    let epsilon = cos_inner - cos_outer;
    if epsilon.abs() <= f32::EPSILON {
        return if theta >= cos_outer { 1.0 } else { 0.0 };
    }
    utils::smoothstep(0.0, 1.0, (theta - cos_outer) / epsilon)
}

/// Distance attenuation
pub fn attenuation(terms: &Attenuation, distance: f32) -> f32 {
    terms.factor(distance)
}

/// Slope-scaled bias of the cubemap shadow test
pub fn omni_shadow_bias(bias: f32, n_dot_l: f32) -> f32 {
    bias * (1.0 - n_dot_l).max(0.05)
}

/// Cubemap shadow test; `closest` is the stored depth already scaled by the far plane
pub fn omni_shadow(current: f32, closest: f32, bias: f32, n_dot_l: f32) -> f32 {
    if current - omni_shadow_bias(bias, n_dot_l) > closest {
        0.0
    } else {
        1.0
    }
}

/// Bias of the 2D shadow test
pub fn planar_shadow_bias(bias: f32, n_dot_l: f32) -> f32 {
    (bias * (1.0 - n_dot_l)).max(0.000_02) + 0.000_01
}

/// 2D shadow test with 3x3 percentage-closer filtering
///
/// `coords` are light-space coordinates already remapped to `[0, 1]`.
/// Fragments past the far plane or outside the map on either axis are lit.
pub fn planar_shadow(
    coords: Vec3,
    texel_size: f32,
    bias: f32,
    n_dot_l: f32,
    depth_at: impl Fn(Vec2) -> f32,
) -> f32 {
    let depth = coords.z - planar_shadow_bias(bias, n_dot_l);
    let outside = |c: f32| !(0.0..=1.0).contains(&c);
    if depth > 1.0 || outside(coords.x) || outside(coords.y) {
        return 1.0;
    }

    let mut lit = 0.0;
    for x in -1..=1 {
        for y in -1..=1 {
            let offset = Vec2::new(x as f32, y as f32) * texel_size;
            if depth_at(coords.xy() + offset) >= depth {
                lit += 1.0;
            }
        }
    }
    lit / 9.0
}

/// Single-step parallax offset; `height_at` returns the raw height map value
pub fn parallax(uv: Vec2, view: Vec3, scale: f32, height_at: impl Fn(Vec2) -> f32) -> Vec2 {
    let height = 1.0 - height_at(uv);
    uv - view.xy() / view.z * height * scale
}

/// Layered parallax occlusion mapping
pub fn deep_parallax(
    uv: Vec2,
    view: Vec3,
    scale: f32,
    (min_layers, max_layers): (i32, i32),
    height_at: impl Fn(Vec2) -> f32,
) -> Vec2 {
    let layers = utils::lerp(max_layers as f32, min_layers as f32, view.z.abs()).max(1.0);
    let layer_depth = 1.0 / layers;
    let delta = view.xy() / view.z * scale / layers;

    let mut current_uv = uv;
    let mut current_layer = 0.0;
    let mut current_depth = 1.0 - height_at(current_uv);
    let mut steps = 0;
    while current_layer < current_depth && steps <= max_layers.max(1) {
        current_uv += delta;
        current_layer += layer_depth;
        current_depth = 1.0 - height_at(current_uv);
        steps += 1;
    }

    let previous_uv = current_uv - delta;
    let after = current_depth + current_layer;
    let before = 1.0 - height_at(previous_uv) - current_layer - layer_depth;
    let weight = after / (after - before);
    previous_uv * weight + current_uv * (1.0 - weight)
}

/// Parallax-mapped coordinates, `None` when the fragment is discarded
///
/// Layered mapping is used when `min > 0` and `max > 1`.
pub fn parallax_uv(
    uv: Vec2,
    view: Vec3,
    scale: f32,
    layers: (i32, i32),
    height_at: impl Fn(Vec2) -> f32,
) -> Option<Vec2> {
    let mapped = if layers.0 > 0 && layers.1 > 1 {
        deep_parallax(uv, view, scale, layers, height_at)
    } else {
        parallax(uv, view, scale, height_at)
    };
    let inside = (0.0..=1.0).contains(&mapped.x) && (0.0..=1.0).contains(&mapped.y);
    inside.then_some(mapped)
}

/// Ambient term from an irradiance sample
pub fn irradiance_ambient(f0: Vec3, n_dot_v: f32, metalness: f32, irradiance: Vec3) -> Vec3 {
    let ks = f0 + (Vec3::repeat(1.0) - f0) * schlick_fresnel(n_dot_v);
    let kd = (Vec3::repeat(1.0) - ks) * (1.0 - metalness);
    kd.component_mul(&irradiance)
}

/// Factor applied to direct light by an occlusion sample
pub fn occlusion_light_affect(ao: f32, light_affect: f32) -> f32 {
    utils::lerp(1.0, ao, light_affect)
}

/// Blend direct specular toward a cubemap reflection
pub fn reflection_mix(specular: Vec3, reflection: Vec3, roughness: f32) -> Vec3 {
    specular.lerp(&reflection, 1.0 - roughness)
}

/// Reinhard tone map followed by gamma 2.2, as the skybox applies to HDR maps
pub fn skybox_tone_map(color: Vec3) -> Vec3 {
    color
        .component_div(&(color + Vec3::repeat(1.0)))
        .map(|c| c.powf(1.0 / 2.2))
}

/// Surface parameters of one fragment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    /// World position
    pub position: Vec3,
    /// Unit normal
    pub normal: Vec3,
    /// Unit vector toward the viewer
    pub view: Vec3,
    /// Linear base color
    pub albedo: Vec3,
    /// Metalness in `[0, 1]`
    pub metalness: f32,
    /// Roughness in `[0, 1]`
    pub roughness: f32,
}

impl Surface {
    /// Reflectance at normal incidence
    pub fn f0(&self) -> Vec3 {
        compute_f0(self.metalness, DIELECTRIC_SPECULAR, self.albedo)
    }

    /// Clamped `N·V`
    pub fn n_dot_v(&self) -> f32 {
        self.normal.dot(&self.view).max(MIN_N_DOT_V)
    }
}

/// Diffuse and specular radiance from one light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    /// Diffuse radiance, before the albedo multiply
    pub diffuse: Vec3,
    /// Specular radiance
    pub specular: Vec3,
}

impl Contribution {
    /// No light
    pub fn zero() -> Self {
        Self { diffuse: Vec3::zeros(), specular: Vec3::zeros() }
    }
}

/// Radiance `light` sends toward the viewer, scaled by a precomputed `shadow` factor
///
/// Disabled lights contribute nothing.
pub fn shade_light(surface: &Surface, light: &LightState, shadow: f32) -> Contribution {
    if !light.enabled {
        return Contribution::zero();
    }

    let (l, size_a) = match light.kind {
        LightKind::Directional => (utils::normalize_or_zero(-light.direction), 0.0),
        LightKind::Omni | LightKind::Spot(_) => {
            let to_light = light.position - surface.position;
            (utils::normalize_or_zero(to_light), size_softening(light.size, to_light.norm()))
        }
    };

    let n = surface.normal;
    let n_dot_v = surface.n_dot_v();
    let n_dot_l = (size_a + n.dot(&l)).clamp(0.0, 1.0);
    let h = utils::normalize_or_zero(surface.view + l);
    let n_dot_h = (size_a + n.dot(&h)).clamp(0.0, 1.0);
    let l_dot_h = (size_a + l.dot(&h)).clamp(0.0, 1.0);
    let radiance = light.color * light.energy;

    let diffuse = if surface.metalness < 1.0 {
        radiance * burley_diffuse(n_dot_l, n_dot_v, l_dot_h, surface.roughness)
    } else {
        Vec3::zeros()
    };

    let specular = if surface.roughness > 0.0 {
        let alpha = surface.roughness * surface.roughness;
        let d = distribution_ggx(n_dot_h, alpha);
        let g = geometry_smith(n_dot_l, n_dot_v, alpha);
        let f0 = surface.f0();
        let f = f0 + (Vec3::repeat(compute_f90(f0)) - f0) * schlick_fresnel(l_dot_h);
        f.component_mul(&radiance) * (n_dot_l * d * g * light.specular)
    } else {
        Vec3::zeros()
    };

    let intensity = match light.kind {
        LightKind::Spot(cone) => {
            let theta = l.dot(&utils::normalize_or_zero(-light.direction));
            spot_intensity(theta, cone.cos_inner(), cone.cos_outer())
        }
        _ => 1.0,
    };
    let distance = (light.position - surface.position).norm();
    let factor = intensity * attenuation(&light.attenuation, distance) * shadow;

    Contribution { diffuse: diffuse * factor, specular: specular * factor }
}
