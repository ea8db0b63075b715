use crate::engine::RenderSettings;
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io(_) => ErrorKind::Io,
            ConfigError::Json(_) => ErrorKind::Parse,
            ConfigError::Invalid(_) => ErrorKind::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Startup defaults for a viewer. Every field falls back to its default when
/// missing from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
    pub inertia: InertiaConfig,
    pub animation: AnimationConfig,
    pub render: RenderSettings,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.05,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub min_pitch_degrees: f64,
    pub max_pitch_degrees: f64,
    /// Omitted means yaw is unconstrained.
    pub yaw_range_degrees: Option<[f64; 2]>,
    pub min_distance: f64,
    pub max_distance: f64,
    pub initial_distance: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            min_pitch_degrees: -89.0,
            max_pitch_degrees: 89.0,
            yaw_range_degrees: None,
            min_distance: 0.05,
            max_distance: 100.0,
            initial_distance: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InertiaConfig {
    pub enabled: bool,
    pub damping: f64,
    pub sensitivity: f64,
}

impl Default for InertiaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            damping: 0.9,
            sensitivity: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub speed: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Master switch for the wireframe and bounding-box overlays.
    pub features_enabled: bool,
    /// Verbose per-frame and gesture logging.
    pub logging: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            features_enabled: true,
            logging: false,
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        crate::camera::CameraRig::from_config(self)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if !self.animation.speed.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "animation speed must be finite, got {}",
                self.animation.speed
            )));
        }
        if !matches!(self.render.msaa_samples, 1 | 2 | 4) {
            return Err(ConfigError::Invalid(format!(
                "msaa_samples must be 1, 2 or 4, got {}",
                self.render.msaa_samples
            )));
        }
        Ok(())
    }
}

pub fn save_config_to_file(config: &ViewerConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_config_from_file(path: &Path) -> Result<ViewerConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: ViewerConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}
