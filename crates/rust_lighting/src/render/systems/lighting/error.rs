//! Lighting system errors
//!
//! None of these abort a frame. Operations that hit one log it and fall back
//! to a no-op (or a default return value); the enum exists so the log lines
//! and the tests share one vocabulary.

use crate::render::shaders::ShaderKind;

use super::light::LightProperty;

/// Errors raised by light and shadow operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LightingError {
    /// Light index past the configured light count
    #[error("Light [ID {index}] out of bounds (light count {count})")]
    InvalidLight {
        /// Requested index
        index: usize,
        /// Configured light count
        count: usize,
    },

    /// Shadow update requested without a draw callback
    #[error("No draw callback supplied for the shadow map update")]
    MissingDrawCallback,

    /// Shadow update requested for a light that casts no shadow
    #[error("Light [ID {0}] does not have shadow casting enabled")]
    ShadowNotEnabled(usize),

    /// Shadow map resolution must be positive
    #[error("Invalid shadow map resolution {0}")]
    InvalidResolution(i32),

    /// Property not accepted by the operation or the light's current type
    #[error("Property {property:?} is not supported by {operation}")]
    UnsupportedProperty {
        /// Offending property
        property: LightProperty,
        /// Operation that rejected it
        operation: &'static str,
    },

    /// Program failed to load at context creation
    #[error("The {0} program is unavailable")]
    ShaderUnavailable(ShaderKind),
}

/// Result type for lighting operations
pub type LightingResult<T> = Result<T, LightingError>;
