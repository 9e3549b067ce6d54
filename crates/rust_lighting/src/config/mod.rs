//! Configuration system
//!
//! Settings that size and tune a [`LightingContext`](crate::render::systems::lighting::LightingContext)
//! before it is built. Files are TOML or RON, picked by extension.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// Largest light count the embedded lighting program is built for
pub const MAX_LIGHTS: usize = 99;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;

        match format {
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Format::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::from_path(path)? {
            Format::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

enum Format {
    Toml,
    Ron,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Near/far clip distances shared by the shadow and lighting programs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    /// Near plane distance
    pub near: f32,
    /// Far plane distance, also used to rescale omni shadow depths
    pub far: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self { near: 0.01, far: 1000.0 }
    }
}

/// Lighting context settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Number of light slots, clamped to [`MAX_LIGHTS`]
    pub light_count: usize,

    /// Depth range for shadow projections
    pub depth_range: DepthRange,

    /// Half extent of the orthographic box used for directional and spot shadows
    pub shadow_ortho_extent: f32,

    /// Depth bias applied when an omni light's shadow map is (re)built
    pub omni_shadow_bias: f32,

    /// Depth bias applied when a directional or spot light's shadow map is (re)built
    pub planar_shadow_bias: f32,

    /// Default `env_logger` filter used by applications
    pub log_level: String,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            light_count: 4,
            depth_range: DepthRange::default(),
            shadow_ortho_extent: 10.0,
            omni_shadow_bias: 0.05,
            planar_shadow_bias: 0.0002,
            log_level: "info".to_string(),
        }
    }
}

impl Config for LightingConfig {}

impl LightingConfig {
    /// Set the number of light slots
    pub fn with_light_count(mut self, light_count: usize) -> Self {
        self.light_count = light_count;
        self
    }

    /// Set the depth range
    pub fn with_depth_range(mut self, near: f32, far: f32) -> Self {
        self.depth_range = DepthRange { near, far };
        self
    }

    /// Set the orthographic shadow half extent
    pub fn with_shadow_ortho_extent(mut self, extent: f32) -> Self {
        self.shadow_ortho_extent = extent;
        self
    }

    /// Light count after clamping to [`MAX_LIGHTS`]
    pub fn clamped_light_count(&self) -> usize {
        self.light_count.min(MAX_LIGHTS)
    }
}
