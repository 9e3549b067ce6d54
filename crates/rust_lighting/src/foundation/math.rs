//! Math utilities and types
//!
//! Type aliases over nalgebra plus the handful of matrix builders the
//! lighting passes need. All projections follow the OpenGL clip-space
//! convention (right-handed view space, depth in `[-1, 1]`), which is what the
//! embedded GLSL programs expect when they remap light-space depth with
//! `p * 0.5 + 0.5`.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;

    /// Lengths below this are treated as zero when normalizing
    pub const LENGTH_EPSILON: f32 = 1e-6;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Hermite smoothstep with GLSL semantics
    pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
        let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }

    /// Normalize `v`, returning zero for degenerate input instead of NaN
    pub fn normalize_or_zero(v: Vec3) -> Vec3 {
        let length = v.norm();
        if length > constants::LENGTH_EPSILON {
            v / length
        } else {
            Vec3::zeros()
        }
    }

    /// Pick an up vector that is not parallel to `forward`
    ///
    /// Returns `preferred` unless it is (anti)parallel to `forward`, in which
    /// case +Z is used. Keeps look-at matrices well defined for lights that
    /// point straight up or down.
    pub fn stable_up(forward: Vec3, preferred: Vec3) -> Vec3 {
        if forward.cross(&preferred).norm() > constants::LENGTH_EPSILON {
            preferred
        } else {
            Vec3::new(0.0, 0.0, 1.0)
        }
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a perspective projection matrix (`fov_y` in radians)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    ///
    /// A zero-length view direction yields a translation-only view.
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Compose `translation * rotation * scale`, rotation given as axis + degrees
    fn from_srt(scale: Vec3, axis: Vec3, angle_deg: f32, position: Vec3) -> Mat4;

    /// Copy of this matrix with the translation stripped
    fn rotation_only(&self) -> Mat4;

    /// `transpose(inverse(self))`, identity when the matrix is singular
    fn normal_matrix(&self) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = target - eye;
        if forward.norm() <= constants::LENGTH_EPSILON {
            return Mat4::new_translation(&-eye);
        }
        let up = utils::stable_up(forward.normalize(), up);
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn from_srt(scale: Vec3, axis: Vec3, angle_deg: f32, position: Vec3) -> Mat4 {
        let rotation = match Unit::try_new(axis, constants::LENGTH_EPSILON) {
            Some(axis) => Mat4::from_axis_angle(&axis, utils::deg_to_rad(angle_deg)),
            None => Mat4::identity(),
        };
        Mat4::new_translation(&position) * rotation * Mat4::new_nonuniform_scaling(&scale)
    }

    fn rotation_only(&self) -> Mat4 {
        let mut m = *self;
        m[(0, 3)] = 0.0;
        m[(1, 3)] = 0.0;
        m[(2, 3)] = 0.0;
        m
    }

    fn normal_matrix(&self) -> Mat4 {
        self.try_inverse().map_or_else(Mat4::identity, |inv| inv.transpose())
    }
}
