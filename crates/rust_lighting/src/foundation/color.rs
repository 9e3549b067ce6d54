//! 8-bit RGBA colors and their linear float form
//!
//! Light and material colors are authored as bytes and uploaded as floats in
//! `[0, 1]`. Byte to float is `c / 255`; float to byte clamps and rounds to the
//! nearest integer, so a round trip is exact for byte input and within half a
//! step (`0.5 / 255`) for arbitrary float input.

use serde::{Deserialize, Serialize};

use super::math::{Vec3, Vec4};

/// RGBA color with 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Opaque black
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque red
    pub const RED: Self = Self::rgb(255, 0, 0);
    /// Opaque green
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    /// Opaque blue
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    /// Opaque mid gray
    pub const GRAY: Self = Self::rgb(130, 130, 130);

    /// Create a color from all four channels
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// RGB channels as floats in `[0, 1]`
    pub fn to_linear_rgb(self) -> Vec3 {
        Vec3::new(to_unit(self.r), to_unit(self.g), to_unit(self.b))
    }

    /// RGBA channels as floats in `[0, 1]`
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(to_unit(self.r), to_unit(self.g), to_unit(self.b), to_unit(self.a))
    }

    /// Opaque color from float RGB, clamped and rounded per channel
    pub fn from_linear_rgb(rgb: Vec3) -> Self {
        Self::rgb(to_byte(rgb.x), to_byte(rgb.y), to_byte(rgb.z))
    }

    /// Per-channel `(self * tint) / 255` in integer arithmetic
    pub const fn tinted(self, tint: Self) -> Self {
        Self::new(
            mul_channel(self.r, tint.r),
            mul_channel(self.g, tint.g),
            mul_channel(self.b, tint.b),
            mul_channel(self.a, tint.a),
        )
    }
}

fn to_unit(c: u8) -> f32 {
    f32::from(c) / 255.0
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

const fn mul_channel(a: u8, b: u8) -> u8 {
    ((a as u16 * b as u16) / 255) as u8
}
