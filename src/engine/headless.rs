use super::{EngineError, EnvironmentHandle, EnvironmentSource, RenderEngine, RenderSettings, RenderTarget};
use crate::camera::CameraPose;
use crate::overlay::{LineMesh, OverlayKind};
use crate::scene::CommittedScene;
use std::collections::{BTreeMap, HashMap, VecDeque};

const DEFAULT_HISTORY_LIMIT: usize = 256;

/// What the engine believes is on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledScene {
    pub generation: u64,
    pub blob_len: usize,
    pub resource_ids: Vec<String>,
    pub animation_count: usize,
}

/// One recorded render call.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub frame: u64,
    pub target: RenderTarget,
    pub viewport: (u32, u32),
    pub pose: CameraPose,
    pub scene_generation: Option<u64>,
    pub animation: Option<(usize, f64)>,
    pub skybox_visible: bool,
    pub settings: RenderSettings,
    /// Segment count per visible overlay.
    pub overlay_segments: BTreeMap<OverlayKind, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StoredEnvironment {
    Ktx { bytes: usize, skybox: bool },
    Equirect { width: u32, height: u32 },
}

impl StoredEnvironment {
    fn lights(&self) -> bool {
        !matches!(self, StoredEnvironment::Ktx { skybox: true, .. })
    }

    fn is_skybox(&self) -> bool {
        !matches!(self, StoredEnvironment::Ktx { skybox: false, .. })
    }
}

/// Engine that renders nothing and records every call, for the CLI and tests.
#[derive(Debug)]
pub struct HeadlessEngine {
    target: Option<(RenderTarget, u32, u32)>,
    installed: Option<InstalledScene>,
    environments: HashMap<EnvironmentHandle, StoredEnvironment>,
    next_environment: u64,
    indirect_light: Option<EnvironmentHandle>,
    skybox: Option<EnvironmentHandle>,
    skybox_visible: bool,
    settings: RenderSettings,
    overlays: BTreeMap<OverlayKind, usize>,
    pending_animation: Option<(usize, f64)>,
    history: VecDeque<Submission>,
    history_limit: usize,
    frames: u64,
    fail_next_install: bool,
    fail_renders: bool,
    destroyed: bool,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            target: None,
            installed: None,
            environments: HashMap::new(),
            next_environment: 1,
            indirect_light: None,
            skybox: None,
            skybox_visible: true,
            settings: RenderSettings::default(),
            overlays: BTreeMap::new(),
            pending_animation: None,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
            frames: 0,
            fail_next_install: false,
            fail_renders: false,
            destroyed: false,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn history(&self) -> impl Iterator<Item = &Submission> {
        self.history.iter()
    }

    pub fn last_submission(&self) -> Option<&Submission> {
        self.history.back()
    }

    pub fn installed(&self) -> Option<&InstalledScene> {
        self.installed.as_ref()
    }

    pub fn target(&self) -> Option<(RenderTarget, u32, u32)> {
        self.target
    }

    pub fn has_indirect_light(&self) -> bool {
        self.indirect_light.is_some()
    }

    pub fn has_skybox(&self) -> bool {
        self.skybox.is_some()
    }

    /// Size of the equirect image bound as indirect light, if any.
    pub fn equirect_size(&self) -> Option<(u32, u32)> {
        match self.indirect_light.and_then(|handle| self.environments.get(&handle)) {
            Some(StoredEnvironment::Equirect { width, height }) => Some((*width, *height)),
            Some(StoredEnvironment::Ktx { .. }) | None => None,
        }
    }

    /// Byte size of the KTX bound in the indirect-light and skybox slots.
    pub fn ktx_sizes(&self) -> (usize, usize) {
        let size = |slot: Option<EnvironmentHandle>| match slot.and_then(|h| self.environments.get(&h)) {
            Some(StoredEnvironment::Ktx { bytes, .. }) => *bytes,
            Some(StoredEnvironment::Equirect { .. }) | None => 0,
        };
        (size(self.indirect_light), size(self.skybox))
    }

    /// Environments created and not yet released.
    pub fn live_environments(&self) -> usize {
        self.environments.len()
    }

    pub fn environments_created(&self) -> u64 {
        self.next_environment - 1
    }

    pub fn skybox_visible(&self) -> bool {
        self.skybox_visible
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn overlay_segments(&self, kind: OverlayKind) -> Option<usize> {
        self.overlays.get(&kind).copied()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Makes the next `install_scene` fail, leaving the current scene as is.
    pub fn fail_next_install(&mut self) {
        self.fail_next_install = true;
    }

    pub fn set_fail_renders(&mut self, fail: bool) {
        self.fail_renders = fail;
    }

    fn ensure_alive(&self) -> Result<(), EngineError> {
        if self.destroyed {
            Err(EngineError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn resolve(
        &self,
        handle: Option<EnvironmentHandle>,
        operation: &'static str,
        usable: fn(&StoredEnvironment) -> bool,
    ) -> Result<Option<EnvironmentHandle>, EngineError> {
        let Some(handle) = handle else {
            return Ok(None);
        };
        let stored = self
            .environments
            .get(&handle)
            .ok_or(EngineError::UnknownEnvironment(handle))?;
        if !usable(stored) {
            return Err(EngineError::Rejected {
                operation,
                reason: format!("environment {handle:?} has the wrong texture kind"),
            });
        }
        Ok(Some(handle))
    }
}

impl RenderEngine for HeadlessEngine {
    fn bind_target(&mut self, target: RenderTarget, width: u32, height: u32) -> Result<(), EngineError> {
        self.ensure_alive()?;
        if width == 0 || height == 0 {
            return Err(EngineError::EmptyTarget(target));
        }
        self.target = Some((target, width, height));
        Ok(())
    }

    fn resize_target(&mut self, target: RenderTarget, width: u32, height: u32) -> Result<(), EngineError> {
        self.ensure_alive()?;
        if self.target.is_none() {
            return Err(EngineError::TargetNotBound);
        }
        self.bind_target(target, width, height)
    }

    fn install_scene(&mut self, scene: &CommittedScene) -> Result<(), EngineError> {
        self.ensure_alive()?;
        if std::mem::take(&mut self.fail_next_install) {
            return Err(EngineError::Rejected {
                operation: "install_scene",
                reason: "injected failure".to_string(),
            });
        }
        self.installed = Some(InstalledScene {
            generation: scene.generation(),
            blob_len: scene.blob().len(),
            resource_ids: scene.resources().ids().map(str::to_owned).collect(),
            animation_count: scene.tracks().len(),
        });
        self.pending_animation = None;
        Ok(())
    }

    fn remove_scene(&mut self) {
        self.installed = None;
        self.pending_animation = None;
    }

    fn apply_render_settings(&mut self, settings: &RenderSettings) -> Result<(), EngineError> {
        self.ensure_alive()?;
        if !matches!(settings.msaa_samples, 1 | 2 | 4) {
            return Err(EngineError::Rejected {
                operation: "apply_render_settings",
                reason: format!("unsupported sample count {}", settings.msaa_samples),
            });
        }
        self.settings = *settings;
        Ok(())
    }

    fn create_environment(&mut self, source: EnvironmentSource<'_>) -> Result<EnvironmentHandle, EngineError> {
        self.ensure_alive()?;
        let stored = match source {
            EnvironmentSource::IndirectLightKtx(ktx) => StoredEnvironment::Ktx {
                bytes: ktx.len(),
                skybox: false,
            },
            EnvironmentSource::SkyboxKtx(ktx) => StoredEnvironment::Ktx {
                bytes: ktx.len(),
                skybox: true,
            },
            EnvironmentSource::Equirect(image) => StoredEnvironment::Equirect {
                width: image.width,
                height: image.height,
            },
        };
        let handle = EnvironmentHandle(self.next_environment);
        self.next_environment += 1;
        self.environments.insert(handle, stored);
        Ok(handle)
    }

    fn set_indirect_light(&mut self, handle: Option<EnvironmentHandle>) -> Result<(), EngineError> {
        self.ensure_alive()?;
        self.indirect_light = self.resolve(handle, "set_indirect_light", StoredEnvironment::lights)?;
        Ok(())
    }

    fn set_skybox(&mut self, handle: Option<EnvironmentHandle>) -> Result<(), EngineError> {
        self.ensure_alive()?;
        self.skybox = self.resolve(handle, "set_skybox", StoredEnvironment::is_skybox)?;
        Ok(())
    }

    fn release_environment(&mut self, handle: EnvironmentHandle) {
        if self.indirect_light == Some(handle) {
            self.indirect_light = None;
        }
        if self.skybox == Some(handle) {
            self.skybox = None;
        }
        self.environments.remove(&handle);
    }

    fn set_skybox_visible(&mut self, visible: bool) {
        self.skybox_visible = visible;
    }

    fn set_debug_lines(&mut self, kind: OverlayKind, lines: Option<&LineMesh>) -> Result<(), EngineError> {
        self.ensure_alive()?;
        match lines {
            Some(lines) => {
                if lines.indices.iter().any(|&i| i as usize >= lines.positions.len()) {
                    return Err(EngineError::Rejected {
                        operation: "set_debug_lines",
                        reason: "line index out of range".to_string(),
                    });
                }
                self.overlays.insert(kind, lines.segment_count());
            }
            None => {
                self.overlays.remove(&kind);
            }
        }
        Ok(())
    }

    fn apply_animation(&mut self, track: usize, seconds: f64) {
        if self.installed.is_some() {
            self.pending_animation = Some((track, seconds));
        }
    }

    fn render(&mut self, pose: &CameraPose) -> Result<(), EngineError> {
        self.ensure_alive()?;
        let (target, width, height) = self.target.ok_or(EngineError::TargetNotBound)?;
        if self.fail_renders {
            return Err(EngineError::Rejected {
                operation: "render",
                reason: "injected failure".to_string(),
            });
        }
        self.frames += 1;
        let submission = Submission {
            frame: self.frames,
            target,
            viewport: (width, height),
            pose: *pose,
            scene_generation: self.installed.as_ref().map(|scene| scene.generation),
            animation: self.pending_animation.take(),
            skybox_visible: self.skybox_visible && self.has_skybox(),
            settings: self.settings,
            overlay_segments: self.overlays.clone(),
        };
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(submission);
        Ok(())
    }

    fn destroy(&mut self) {
        self.installed = None;
        self.target = None;
        self.environments.clear();
        self.indirect_light = None;
        self.skybox = None;
        self.overlays.clear();
        self.pending_animation = None;
        self.destroyed = true;
    }
}
