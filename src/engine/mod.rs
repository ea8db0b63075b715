//! Boundary to the real-time renderer.
//!
//! The viewer never rasterises anything itself. It drives an implementation
//! of [`RenderEngine`] with camera poses, committed scenes and environment
//! payloads, and the engine owns every GPU-side resource.

mod headless;

pub use headless::{HeadlessEngine, InstalledScene, Submission};

use crate::camera::CameraPose;
use crate::environment::EquirectImage;
use crate::error::ErrorKind;
use crate::overlay::{LineMesh, OverlayKind};
use crate::scene::CommittedScene;
use serde::{Deserialize, Serialize};

/// Opaque host handle for an output surface (texture id, window id, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTarget(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMapping {
    #[default]
    EngineDefault,
    Filmic,
}

/// View-level quality switches, applied as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// 1 (off), 2 or 4.
    pub msaa_samples: u8,
    pub shadows: bool,
    pub tone_mapping: ToneMapping,
    pub dynamic_resolution: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            msaa_samples: 1,
            shadows: true,
            tone_mapping: ToneMapping::EngineDefault,
            dynamic_resolution: false,
        }
    }
}

/// Engine-owned environment texture set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentHandle(pub u64);

/// Payload for [`RenderEngine::create_environment`]. KTX payloads are
/// validated KTX1/KTX2 containers.
#[derive(Debug, Clone, Copy)]
pub enum EnvironmentSource<'a> {
    IndirectLightKtx(&'a [u8]),
    SkyboxKtx(&'a [u8]),
    /// Usable as both indirect light and skybox.
    Equirect(&'a EquirectImage),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no render target is bound")]
    TargetNotBound,
    #[error("render target {0:?} has zero area")]
    EmptyTarget(RenderTarget),
    #[error("engine rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
    #[error("unknown environment handle {0:?}")]
    UnknownEnvironment(EnvironmentHandle),
    #[error("engine has been destroyed")]
    Destroyed,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Destroyed => ErrorKind::Lifecycle,
            EngineError::TargetNotBound
            | EngineError::EmptyTarget(_)
            | EngineError::Rejected { .. }
            | EngineError::UnknownEnvironment(_) => ErrorKind::Engine,
        }
    }
}

pub trait RenderEngine {
    fn bind_target(&mut self, target: RenderTarget, width: u32, height: u32) -> Result<(), EngineError>;

    fn resize_target(&mut self, target: RenderTarget, width: u32, height: u32) -> Result<(), EngineError>;

    /// Replaces the displayed model. Must either install the whole scene or
    /// leave the previous one untouched.
    fn install_scene(&mut self, scene: &CommittedScene) -> Result<(), EngineError>;

    fn remove_scene(&mut self);

    fn apply_render_settings(&mut self, settings: &RenderSettings) -> Result<(), EngineError>;

    /// Uploads environment textures. The handle stays valid until released,
    /// whether or not it is bound.
    fn create_environment(&mut self, source: EnvironmentSource<'_>) -> Result<EnvironmentHandle, EngineError>;

    /// `None` unbinds. The handle must come from an indirect-light or
    /// equirect source.
    fn set_indirect_light(&mut self, handle: Option<EnvironmentHandle>) -> Result<(), EngineError>;

    /// `None` unbinds. The handle must come from a skybox or equirect source.
    fn set_skybox(&mut self, handle: Option<EnvironmentHandle>) -> Result<(), EngineError>;

    /// Frees the textures, unbinding them first if bound.
    fn release_environment(&mut self, handle: EnvironmentHandle);

    fn set_skybox_visible(&mut self, visible: bool);

    /// Replaces the line overlay of `kind`; `None` hides it.
    fn set_debug_lines(&mut self, kind: OverlayKind, lines: Option<&LineMesh>) -> Result<(), EngineError>;

    /// Poses the installed model at `seconds` into animation `track` for the
    /// next render.
    fn apply_animation(&mut self, track: usize, seconds: f64);

    fn render(&mut self, pose: &CameraPose) -> Result<(), EngineError>;

    /// Releases every engine resource. Later calls fail with
    /// [`EngineError::Destroyed`].
    fn destroy(&mut self);
}
