//! The render/pause facade a host drives once per display tick.
//!
//! A [`Viewer`] owns the camera rig, animation player, frame clock, the
//! committed scene and any in-flight load. All calls are expected from one
//! thread in call order; the host serialises `render_frame` against
//! `setup`/`resize`/`destroy_renderer`.
//!
//! Every operation fails with [`ViewerError::Destroyed`] after
//! `destroy_renderer`. The exceptions are the host-side introspection calls
//! (`is_destroyed`, `viewport`, `is_paused`, `has_pending_load`, `scene`,
//! `wants_continuous_rendering`, `drain_events` and the engine accessors),
//! which report the cleared state instead.

use crate::animation::{AnimationError, AnimationPlayer, AnimationSnapshot};
use crate::assets::{LoadError, ModelDocument, PendingLoad, ResourceMap};
use crate::camera::{CameraError, CameraPose, CameraRig, OrbitState};
use crate::clock::FrameClock;
use crate::config::{ConfigError, DebugConfig, ViewerConfig};
use crate::engine::{
    EngineError, EnvironmentHandle, EnvironmentSource, RenderEngine, RenderSettings, RenderTarget, ToneMapping,
};
use crate::environment::{self, EnvironmentCache, EnvironmentError, EnvironmentKind};
use crate::error::ErrorKind;
use crate::overlay::{self, OverlayKind};
use crate::scene::CommittedScene;
use glam::DVec3;
use std::collections::{BTreeSet, VecDeque};

const MIN_FRAMING_RADIUS: f64 = 0.05;
const WORLD_ORIGIN_RADIUS: f64 = 1.0;
const MAX_QUEUED_EVENTS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("renderer has been destroyed")]
    Destroyed,
    #[error("{operation} requires a bound render target; call setup first")]
    NoTarget { operation: &'static str },
    #[error("{operation} rejected while a model load is pending")]
    LoadPending { operation: &'static str },
    #[error("{operation} needs debug features, which this viewer was created without")]
    DebugFeaturesDisabled { operation: &'static str },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Animation(#[from] AnimationError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ViewerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ViewerError::Destroyed | ViewerError::NoTarget { .. } => ErrorKind::Lifecycle,
            ViewerError::LoadPending { .. } | ViewerError::DebugFeaturesDisabled { .. } => ErrorKind::Misuse,
            ViewerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ViewerError::Load(err) => err.kind(),
            ViewerError::Camera(err) => err.kind(),
            ViewerError::Animation(err) => err.kind(),
            ViewerError::Environment(err) => err.kind(),
            ViewerError::Engine(err) => err.kind(),
            ViewerError::Config(err) => err.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Notifications the host collects with [`Viewer::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    ModelLoaded {
        generation: u64,
        animation_count: usize,
    },
    LoadFailed {
        reason: String,
    },
    /// Rendered frames per second over the last one-second window.
    Fps(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered,
    /// The tick was accepted but nothing advanced or rendered.
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Unbound,
    Bound {
        target: RenderTarget,
        width: u32,
        height: u32,
    },
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvironmentSlot {
    IndirectLight,
    Skybox,
}

pub struct Viewer<E: RenderEngine> {
    engine: E,
    surface: Surface,
    camera: CameraRig,
    animation: AnimationPlayer,
    clock: FrameClock,
    paused: bool,
    pending: Option<PendingLoad>,
    scene: Option<CommittedScene>,
    generation: u64,
    skybox_visible: bool,
    environments: EnvironmentCache,
    bound_light: Option<EnvironmentHandle>,
    bound_skybox: Option<EnvironmentHandle>,
    settings: RenderSettings,
    debug: DebugConfig,
    overlays: BTreeSet<OverlayKind>,
    last_pose: CameraPose,
    events: VecDeque<ViewerEvent>,
}

impl<E: RenderEngine> Viewer<E> {
    pub fn new(engine: E, config: &ViewerConfig) -> Result<Self> {
        config.validate()?;
        let camera = CameraRig::from_config(config)?;
        let last_pose = camera.pose();
        Ok(Self {
            engine,
            surface: Surface::Unbound,
            camera,
            animation: AnimationPlayer::new(config.animation.speed),
            clock: FrameClock::new(),
            paused: false,
            pending: None,
            scene: None,
            generation: 0,
            skybox_visible: true,
            environments: EnvironmentCache::new(),
            bound_light: None,
            bound_skybox: None,
            settings: config.render,
            debug: config.debug.clone(),
            overlays: BTreeSet::new(),
            last_pose,
            events: VecDeque::new(),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    // --- lifecycle -------------------------------------------------------

    pub fn setup(&mut self, target: RenderTarget, width: u32, height: u32) -> Result<()> {
        self.ensure_alive()?;
        self.ensure_no_pending("setup")?;
        validate_size(width, height)?;
        self.engine.bind_target(target, width, height)?;
        self.engine.apply_render_settings(&self.settings)?;
        self.surface = Surface::Bound {
            target,
            width,
            height,
        };
        log::info!("viewer bound to {target:?} at {width}x{height}");
        Ok(())
    }

    /// Rebinds the output size. Camera, constraints and scene are kept.
    pub fn resize(&mut self, target: RenderTarget, width: u32, height: u32) -> Result<()> {
        self.ensure_alive()?;
        self.ensure_no_pending("resize")?;
        if !matches!(self.surface, Surface::Bound { .. }) {
            return Err(ViewerError::NoTarget { operation: "resize" });
        }
        validate_size(width, height)?;
        self.engine.resize_target(target, width, height)?;
        self.surface = Surface::Bound {
            target,
            width,
            height,
        };
        log::info!("viewer resized to {width}x{height}");
        Ok(())
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        match self.surface {
            Surface::Bound { width, height, .. } => Some((width, height)),
            Surface::Unbound | Surface::Destroyed => None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.surface == Surface::Destroyed
    }

    pub fn destroy_renderer(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.pending = None;
        self.scene = None;
        self.animation.clear();
        self.events.clear();
        self.overlays.clear();
        self.bound_light = None;
        self.bound_skybox = None;
        let live = self.environments.clear();
        self.engine.destroy();
        self.surface = Surface::Destroyed;
        log::info!("renderer destroyed ({} cached environments dropped)", live.len());
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.ensure_alive()?;
        if self.paused != paused {
            log::debug!("paused={paused}");
        }
        self.paused = paused;
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Advances inertia and animation by the time since the previous tick and
    /// submits exactly one render. While paused the timestamp is still
    /// recorded so resuming does not produce a large jump.
    ///
    /// Nothing advances unless the engine accepts the render: after a failed
    /// render the next tick measures from the last successful one.
    pub fn render_frame(&mut self, timestamp_nanos: u64) -> Result<FrameStatus> {
        self.ensure_alive()?;
        if !matches!(self.surface, Surface::Bound { .. }) {
            return Err(ViewerError::NoTarget {
                operation: "render_frame",
            });
        }
        let mut clock = self.clock.clone();
        let elapsed = clock.tick(timestamp_nanos);
        if self.paused {
            self.clock = clock;
            return Ok(FrameStatus::Paused);
        }

        let mut camera = self.camera.clone();
        camera.advance(elapsed);
        let playback = self.animation.advanced(elapsed);
        let pose = camera.pose();
        if let Some(state) = playback {
            self.engine.apply_animation(state.index, state.time);
        }
        if let Err(err) = self.engine.render(&pose) {
            log::warn!("render failed, frame state kept: {err}");
            return Err(err.into());
        }
        if self.debug.logging {
            log::debug!("frame: {elapsed:.4}s elapsed, eye {:?}", pose.eye);
        }
        self.clock = clock;
        self.camera = camera;
        self.animation.commit(playback);
        self.last_pose = pose;

        if let Some(fps) = self.clock.sample_rendered_frame(timestamp_nanos) {
            log::debug!("fps {fps:.1}");
            self.push_event(ViewerEvent::Fps(fps));
        }
        Ok(FrameStatus::Rendered)
    }

    /// True while something would change between two identical ticks.
    pub fn wants_continuous_rendering(&self) -> bool {
        !self.is_destroyed() && (self.animation.is_playing() || self.camera.is_moving())
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain(..).collect()
    }

    /// Pose used by the most recent render, or the initial pose before any.
    pub fn camera_pose(&self) -> Result<CameraPose> {
        self.ensure_alive()?;
        Ok(self.last_pose)
    }

    /// Pose the next render would use if no further input arrived.
    pub fn current_pose(&self) -> Result<CameraPose> {
        self.ensure_alive()?;
        Ok(self.camera.pose())
    }

    pub fn orbit_state(&self) -> Result<OrbitState> {
        self.ensure_alive()?;
        Ok(self.camera.orbit().state())
    }

    // --- model loading ---------------------------------------------------

    /// Parses `blob` and returns the external resources it needs. The live
    /// scene is untouched; a previous pending load is replaced only when the
    /// new blob parses.
    pub fn begin_model_load(&mut self, blob: Vec<u8>) -> Result<Vec<String>> {
        self.ensure_alive()?;
        let pending = match PendingLoad::begin(blob) {
            Ok(pending) => pending,
            Err(err) => {
                log::warn!("begin_model_load failed: {err}");
                let err = LoadError::from(err);
                self.push_event(ViewerEvent::LoadFailed {
                    reason: err.to_string(),
                });
                return Err(err.into());
            }
        };
        if self.pending.is_some() {
            log::info!("discarding stale pending model load");
        }
        let required = pending.required().to_vec();
        log::info!(
            "model load begun: {} bytes, {} external resources, {} animations",
            pending.blob_len(),
            required.len(),
            pending.animation_count()
        );
        self.pending = Some(pending);
        Ok(required)
    }

    pub fn has_pending_load(&self) -> bool {
        self.pending.is_some()
    }

    /// Commits the pending load. On any failure the pending session is
    /// discarded and the previously displayed scene stays active.
    pub fn finish_model_load(&mut self, resources: ResourceMap) -> Result<()> {
        self.ensure_alive()?;
        let Some(pending) = self.pending.take() else {
            log::warn!("finish_model_load without a pending load");
            return Err(LoadError::NoPendingLoad.into());
        };
        let wireframe = self.overlays.contains(&OverlayKind::Wireframe);
        let scene = match pending.commit(resources, self.generation + 1, wireframe) {
            Ok(scene) => scene,
            Err(err) => {
                log::warn!("model load failed: {err}");
                self.push_event(ViewerEvent::LoadFailed {
                    reason: err.to_string(),
                });
                return Err(err.into());
            }
        };
        if let Err(err) = self.engine.install_scene(&scene) {
            log::error!("engine refused model: {err}");
            self.push_event(ViewerEvent::LoadFailed {
                reason: err.to_string(),
            });
            return Err(err.into());
        }

        self.generation = scene.generation();
        self.animation.load_tracks(scene.tracks().to_vec());
        let animation_count = scene.tracks().len();
        log::info!(
            "model committed: generation {}, {} resources, {} animations",
            self.generation,
            scene.resources().len(),
            animation_count
        );
        self.scene = Some(scene);
        self.frame_scene(false);
        self.sync_overlays();
        self.push_event(ViewerEvent::ModelLoaded {
            generation: self.generation,
            animation_count,
        });
        Ok(())
    }

    /// Drops the displayed scene and any pending load. Calling it again is a
    /// no-op.
    pub fn clear_scene(&mut self) -> Result<()> {
        self.ensure_alive()?;
        if self.pending.take().is_some() {
            log::info!("pending model load cancelled");
        }
        if self.scene.take().is_some() {
            log::info!("scene cleared");
        }
        self.engine.remove_scene();
        self.animation.clear();
        self.sync_overlays();
        Ok(())
    }

    pub fn scene(&self) -> Option<&CommittedScene> {
        self.scene.as_ref()
    }

    /// Recentres the orbit camera on the scene bounds, or on the world origin
    /// when asked or when there is nothing to frame.
    pub fn frame_model(&mut self, use_world_origin: bool) -> Result<()> {
        self.ensure_alive()?;
        self.frame_scene(use_world_origin);
        Ok(())
    }

    fn frame_scene(&mut self, use_world_origin: bool) {
        let bounds = self.scene.as_ref().and_then(CommittedScene::bounds);
        let (center, radius) = match bounds {
            Some(bounds) if !use_world_origin => (
                bounds.center(),
                bounds.half_extent().length().max(MIN_FRAMING_RADIUS),
            ),
            _ => (DVec3::ZERO, WORLD_ORIGIN_RADIUS),
        };
        self.camera.frame_sphere(center, radius);
    }

    // --- environment -----------------------------------------------------

    /// Binds a KTX indirect light. With a `key`, a light already uploaded
    /// under that key is reused and `ktx` is not looked at.
    pub fn set_environment_light(&mut self, ktx: &[u8], key: Option<&str>) -> Result<()> {
        self.ensure_alive()?;
        let handle = match self.cached_environment(EnvironmentKind::IndirectLight, key) {
            Some(handle) => handle,
            None => {
                let version = environment::validate_ktx(ktx)?;
                let handle = self
                    .engine
                    .create_environment(EnvironmentSource::IndirectLightKtx(ktx))?;
                self.environments
                    .insert(handle, EnvironmentKind::IndirectLight, key);
                log::info!("indirect light created from {version:?} ({} bytes)", ktx.len());
                handle
            }
        };
        self.bind_environment(EnvironmentSlot::IndirectLight, handle)
    }

    pub fn set_skybox(&mut self, ktx: &[u8], key: Option<&str>) -> Result<()> {
        self.ensure_alive()?;
        let handle = match self.cached_environment(EnvironmentKind::Skybox, key) {
            Some(handle) => handle,
            None => {
                let version = environment::validate_ktx(ktx)?;
                let handle = self.engine.create_environment(EnvironmentSource::SkyboxKtx(ktx))?;
                self.environments.insert(handle, EnvironmentKind::Skybox, key);
                log::info!("skybox created from {version:?} ({} bytes)", ktx.len());
                handle
            }
        };
        self.bind_environment(EnvironmentSlot::Skybox, handle)
    }

    /// Uses one Radiance HDR panorama for both indirect light and skybox.
    pub fn set_hdri(&mut self, hdr: &[u8], key: Option<&str>) -> Result<()> {
        self.ensure_alive()?;
        let handle = match self.cached_environment(EnvironmentKind::Hdri, key) {
            Some(handle) => handle,
            None => {
                let image = environment::decode_hdr(hdr)?;
                let handle = self.engine.create_environment(EnvironmentSource::Equirect(&image))?;
                self.environments.insert(handle, EnvironmentKind::Hdri, key);
                log::info!("environment created from {}x{} HDR", image.width, image.height);
                handle
            }
        };
        // One reference per slot.
        self.environments.retain(handle);
        if let Err(err) = self.bind_environment(EnvironmentSlot::IndirectLight, handle) {
            self.release_environment(handle);
            return Err(err);
        }
        self.bind_environment(EnvironmentSlot::Skybox, handle)
    }

    /// Shows or hides the skybox without discarding the loaded environment.
    pub fn set_environment_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_alive()?;
        self.skybox_visible = enabled;
        self.engine.set_skybox_visible(enabled);
        Ok(())
    }

    fn cached_environment(&mut self, kind: EnvironmentKind, key: Option<&str>) -> Option<EnvironmentHandle> {
        let key = key?;
        let handle = self.environments.lookup(kind, key)?;
        if self.debug.logging {
            log::debug!("reusing cached {kind:?} environment {key:?}");
        }
        Some(handle)
    }

    /// Binds `handle`, which carries one reference for the slot. The slot's
    /// previous environment loses its reference.
    fn bind_environment(&mut self, slot: EnvironmentSlot, handle: EnvironmentHandle) -> Result<()> {
        let bound = match slot {
            EnvironmentSlot::IndirectLight => self.engine.set_indirect_light(Some(handle)),
            EnvironmentSlot::Skybox => self.engine.set_skybox(Some(handle)),
        };
        if let Err(err) = bound {
            self.release_environment(handle);
            return Err(err.into());
        }
        if slot == EnvironmentSlot::Skybox {
            self.engine.set_skybox_visible(self.skybox_visible);
        }
        let current = match slot {
            EnvironmentSlot::IndirectLight => &mut self.bound_light,
            EnvironmentSlot::Skybox => &mut self.bound_skybox,
        };
        if let Some(previous) = current.replace(handle) {
            self.release_environment(previous);
        }
        Ok(())
    }

    fn release_environment(&mut self, handle: EnvironmentHandle) {
        if self.environments.release(handle) {
            self.engine.release_environment(handle);
            log::debug!("released environment {handle:?}");
        }
    }

    // --- render settings -------------------------------------------------

    /// Sample counts other than 2 and 4 turn multisampling off.
    pub fn set_msaa(&mut self, samples: u8) -> Result<()> {
        self.ensure_alive()?;
        let samples = match samples {
            2 | 4 => samples,
            _ => 1,
        };
        self.update_settings(|settings| settings.msaa_samples = samples)
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_alive()?;
        self.update_settings(|settings| settings.shadows = enabled)
    }

    pub fn set_tone_mapping_filmic(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.update_settings(|settings| settings.tone_mapping = ToneMapping::Filmic)
    }

    pub fn set_dynamic_resolution_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_alive()?;
        self.update_settings(|settings| settings.dynamic_resolution = enabled)
    }

    fn update_settings(&mut self, change: impl FnOnce(&mut RenderSettings)) -> Result<()> {
        let mut settings = self.settings;
        change(&mut settings);
        self.engine.apply_render_settings(&settings)?;
        self.settings = settings;
        log::debug!("render settings now {settings:?}");
        Ok(())
    }

    // --- debug -----------------------------------------------------------

    pub fn set_wireframe_enabled(&mut self, enabled: bool) -> Result<()> {
        self.set_overlay_enabled(OverlayKind::Wireframe, enabled, "set_wireframe_enabled")
    }

    pub fn set_bounding_boxes_enabled(&mut self, enabled: bool) -> Result<()> {
        self.set_overlay_enabled(OverlayKind::BoundingBox, enabled, "set_bounding_boxes_enabled")
    }

    pub fn set_debug_logging_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_alive()?;
        self.debug.logging = enabled;
        log::info!("debug logging {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    fn set_overlay_enabled(&mut self, kind: OverlayKind, enabled: bool, operation: &'static str) -> Result<()> {
        self.ensure_alive()?;
        if enabled && !self.debug.features_enabled {
            log::warn!("{operation} rejected: debug features are disabled");
            return Err(ViewerError::DebugFeaturesDisabled { operation });
        }
        if enabled {
            self.overlays.insert(kind);
            if kind == OverlayKind::Wireframe {
                self.extract_wireframe();
            }
        } else {
            self.overlays.remove(&kind);
        }
        self.sync_overlay(kind)?;
        if self.debug.logging {
            log::debug!("{kind:?} overlay enabled={enabled}");
        }
        Ok(())
    }

    /// Fills in the wireframe of a scene committed while the overlay was off.
    fn extract_wireframe(&mut self) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        if scene.wireframe().is_some() {
            return;
        }
        let decoded = ModelDocument::parse(scene.blob()).and_then(|document| document.decode(scene.resources(), true));
        match decoded {
            Ok(decoded) => scene.set_wireframe(decoded.wireframe),
            Err(err) => log::warn!("wireframe extraction failed: {err}"),
        }
    }

    fn sync_overlay(&mut self, kind: OverlayKind) -> Result<()> {
        let visible = self.overlays.contains(&kind);
        let scene = self.scene.as_ref().filter(|_| visible);
        let box_lines;
        let lines = match kind {
            OverlayKind::Wireframe => scene.and_then(CommittedScene::wireframe),
            OverlayKind::BoundingBox => {
                box_lines = scene
                    .and_then(CommittedScene::bounds)
                    .map(|bounds| overlay::bounding_box_lines(&bounds));
                box_lines.as_ref()
            }
        };
        self.engine.set_debug_lines(kind, lines)?;
        Ok(())
    }

    fn sync_overlays(&mut self) {
        for kind in OverlayKind::ALL {
            if let Err(err) = self.sync_overlay(kind) {
                log::warn!("failed to update {kind:?} overlay: {err}");
            }
        }
    }

    // --- orbit camera ----------------------------------------------------

    pub fn set_orbit_constraints(
        &mut self,
        min_pitch_degrees: f64,
        max_pitch_degrees: f64,
        min_yaw_degrees: f64,
        max_yaw_degrees: f64,
    ) -> Result<()> {
        self.ensure_alive()?;
        let orbit = self.camera.orbit_mut();
        let constraints = orbit.constraints().with_angles_degrees(
            min_pitch_degrees,
            max_pitch_degrees,
            min_yaw_degrees,
            max_yaw_degrees,
        )?;
        orbit.set_constraints(constraints);
        Ok(())
    }

    pub fn set_zoom_limits(&mut self, min_distance: f64, max_distance: f64) -> Result<()> {
        self.ensure_alive()?;
        let orbit = self.camera.orbit_mut();
        let constraints = orbit.constraints().with_distance(min_distance, max_distance)?;
        orbit.set_constraints(constraints);
        Ok(())
    }

    pub fn set_inertia_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_alive()?;
        self.camera.orbit_mut().set_inertia_enabled(enabled);
        Ok(())
    }

    pub fn set_inertia_params(&mut self, damping: f64, sensitivity: f64) -> Result<()> {
        self.ensure_alive()?;
        let orbit = self.camera.orbit_mut();
        let inertia = orbit.inertia().with_params(damping, sensitivity)?;
        orbit.set_inertia(inertia);
        Ok(())
    }

    pub fn orbit_start(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.camera.orbit_mut().orbit_start();
        if self.debug.logging {
            log::debug!("orbit gesture started");
        }
        Ok(())
    }

    pub fn orbit_delta(&mut self, dx: f64, dy: f64) -> Result<()> {
        self.ensure_alive()?;
        self.camera.orbit_mut().orbit_delta(dx, dy)?;
        Ok(())
    }

    pub fn orbit_end(&mut self, velocity_x: f64, velocity_y: f64) -> Result<()> {
        self.ensure_alive()?;
        self.camera.orbit_mut().orbit_end(velocity_x, velocity_y)?;
        if self.debug.logging {
            log::debug!("orbit gesture ended with velocity ({velocity_x}, {velocity_y})");
        }
        Ok(())
    }

    /// Marks a pinch gesture as active so the host keeps rendering.
    pub fn zoom_start(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.camera.orbit_mut().zoom_start();
        Ok(())
    }

    pub fn zoom_delta(&mut self, scale: f64) -> Result<()> {
        self.ensure_alive()?;
        self.camera.orbit_mut().zoom_delta(scale)?;
        Ok(())
    }

    pub fn zoom_end(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.camera.orbit_mut().zoom_end()?;
        Ok(())
    }

    // --- custom camera ---------------------------------------------------

    pub fn set_custom_camera_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_alive()?;
        self.camera.custom_mut().set_enabled(enabled);
        Ok(())
    }

    pub fn set_custom_camera_look_at(&mut self, eye: DVec3, center: DVec3, up: DVec3) -> Result<()> {
        self.ensure_alive()?;
        self.camera.custom_mut().set_look_at(eye, center, up)?;
        Ok(())
    }

    pub fn set_custom_perspective(&mut self, fov_degrees: f64, near: f64, far: f64) -> Result<()> {
        self.ensure_alive()?;
        self.camera
            .custom_mut()
            .set_perspective(fov_degrees, near, far)?;
        Ok(())
    }

    // --- animation -------------------------------------------------------

    pub fn animation_count(&self) -> Result<usize> {
        self.ensure_alive()?;
        Ok(self.animation.count())
    }

    pub fn animation_duration(&self, index: usize) -> Result<f64> {
        self.ensure_alive()?;
        Ok(self.animation.duration(index)?)
    }

    pub fn play_animation(&mut self, index: usize, looping: bool) -> Result<()> {
        self.ensure_alive()?;
        self.animation.play(index, looping)?;
        Ok(())
    }

    pub fn pause_animation(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.animation.pause()?;
        Ok(())
    }

    pub fn resume_animation(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.animation.resume()?;
        Ok(())
    }

    pub fn seek_animation(&mut self, seconds: f64) -> Result<()> {
        self.ensure_alive()?;
        self.animation.seek(seconds)?;
        Ok(())
    }

    pub fn set_animation_speed(&mut self, speed: f64) -> Result<()> {
        self.ensure_alive()?;
        let previous = self.animation.speed();
        self.animation.set_speed(speed)?;
        log::debug!("animation speed {previous} -> {speed}");
        Ok(())
    }

    pub fn animation_state(&self) -> Result<Option<AnimationSnapshot>> {
        self.ensure_alive()?;
        Ok(self.animation.snapshot())
    }

    // ---------------------------------------------------------------------

    fn ensure_alive(&self) -> Result<()> {
        if self.surface == Surface::Destroyed {
            log::warn!("call after destroy_renderer");
            return Err(ViewerError::Destroyed);
        }
        Ok(())
    }

    fn ensure_no_pending(&self, operation: &'static str) -> Result<()> {
        if self.pending.is_some() {
            log::warn!("{operation} rejected: model load pending");
            return Err(ViewerError::LoadPending { operation });
        }
        Ok(())
    }

    fn push_event(&mut self, event: ViewerEvent) {
        if self.events.len() == MAX_QUEUED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

fn validate_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ViewerError::InvalidArgument(format!(
            "render target size must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{FrameStatus, Viewer, ViewerError, ViewerEvent};
    use crate::animation::PlaybackPhase;
    use crate::assets::fixtures::{self, BASE_TEXTURE, MESH_BUFFER};
    use crate::assets::ResourceMap;
    use crate::config::ViewerConfig;
    use crate::engine::{HeadlessEngine, RenderSettings, RenderTarget, ToneMapping};
    use crate::error::ErrorKind;
    use crate::overlay::OverlayKind;
    use glam::DVec3;
    use image::codecs::hdr::HdrEncoder;
    use image::Rgb;

    const FRAME: u64 = 16_666_667;

    fn viewer() -> Viewer<HeadlessEngine> {
        let mut viewer = Viewer::new(HeadlessEngine::new(), &ViewerConfig::default()).unwrap();
        viewer.setup(RenderTarget(1), 800, 600).unwrap();
        viewer
    }

    fn loaded_viewer(offset: [f64; 3]) -> Viewer<HeadlessEngine> {
        let mut viewer = viewer();
        viewer.begin_model_load(fixtures::textured_model(offset)).unwrap();
        viewer.finish_model_load(fixtures::textured_resources()).unwrap();
        viewer
    }

    fn ktx2(payload: usize) -> Vec<u8> {
        let mut ktx = vec![0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n'];
        ktx.extend(std::iter::repeat(0).take(payload));
        ktx
    }

    fn panorama_hdr() -> Vec<u8> {
        let pixels = vec![Rgb([1.0f32, 0.5, 0.25]); 8 * 4];
        let mut bytes = Vec::new();
        HdrEncoder::new(&mut bytes).encode(&pixels, 8, 4).unwrap();
        bytes
    }

    fn render_ticks(viewer: &mut Viewer<HeadlessEngine>, start: u64, count: u64) -> u64 {
        let mut ts = start;
        for _ in 0..count {
            viewer.render_frame(ts).unwrap();
            ts += FRAME;
        }
        ts
    }

    #[test]
    fn missing_resource_keeps_prior_scene_rendering() {
        let mut viewer = loaded_viewer([0.0; 3]);
        let ts = render_ticks(&mut viewer, 0, 3);
        let before = viewer.engine().last_submission().cloned().unwrap();

        let required = viewer
            .begin_model_load(fixtures::textured_model([9.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(required, vec![MESH_BUFFER.to_string(), BASE_TEXTURE.to_string()]);

        let partial: ResourceMap = [(BASE_TEXTURE, vec![1u8])].into_iter().collect();
        let err = viewer.finish_model_load(partial).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompleteResources);
        assert!(!viewer.has_pending_load());

        viewer.render_frame(ts).unwrap();
        let after = viewer.engine().last_submission().cloned().unwrap();
        assert_eq!(after.scene_generation, before.scene_generation);
        assert_eq!(after.pose, before.pose);
        assert_eq!(viewer.scene().map(|s| s.generation()), Some(1));
    }

    #[test]
    fn failed_first_load_renders_empty_scene() {
        let mut viewer = viewer();
        viewer.begin_model_load(fixtures::textured_model([0.0; 3])).unwrap();
        assert!(viewer.finish_model_load(ResourceMap::new()).is_err());
        viewer.render_frame(0).unwrap();
        assert_eq!(viewer.engine().last_submission().unwrap().scene_generation, None);
        let events = viewer.drain_events();
        assert!(matches!(events.as_slice(), [ViewerEvent::LoadFailed { .. }]));
    }

    #[test]
    fn commit_frames_model_and_reports_event() {
        let mut viewer = loaded_viewer([5.0, 0.0, 0.0]);
        let state = viewer.orbit_state().unwrap();
        assert!((state.target - DVec3::new(5.0, 1.0, 0.0)).length() < 1e-9);
        let radius = 3f64.sqrt();
        let expected = radius / (22.5f64).to_radians().sin();
        assert!((state.distance - expected).abs() < 1e-9);
        assert_eq!(viewer.animation_count().unwrap(), 2);
        assert_eq!(
            viewer.drain_events(),
            vec![ViewerEvent::ModelLoaded {
                generation: 1,
                animation_count: 2
            }]
        );
        assert_eq!(viewer.engine().installed().map(|s| s.generation), Some(1));
    }

    #[test]
    fn frame_model_world_origin() {
        let mut viewer = loaded_viewer([5.0, 0.0, 0.0]);
        viewer.frame_model(true).unwrap();
        let state = viewer.orbit_state().unwrap();
        assert_eq!(state.target, DVec3::ZERO);
        assert!((state.distance - 1.0 / (22.5f64).to_radians().sin()).abs() < 1e-9);
    }

    #[test]
    fn pitch_clamps_exactly_at_upper_constraint() {
        let mut viewer = viewer();
        viewer.set_orbit_constraints(-30.0, 60.0, -180.0, 180.0).unwrap();
        viewer.orbit_start().unwrap();
        for _ in 0..40 {
            viewer.orbit_delta(0.0, 25.0).unwrap();
            let pitch = viewer.orbit_state().unwrap().pitch.to_degrees();
            assert!(pitch <= 60.0 + 1e-9, "pitch overshot: {pitch}");
        }
        assert!((viewer.orbit_state().unwrap().pitch.to_degrees() - 60.0).abs() < 1e-9);
        viewer.orbit_end(0.0, 5000.0).unwrap();
        let mut ts = 0;
        for _ in 0..30 {
            viewer.render_frame(ts).unwrap();
            ts += FRAME;
            assert!(viewer.orbit_state().unwrap().pitch.to_degrees() <= 60.0 + 1e-9);
        }
    }

    #[test]
    fn orbit_calls_without_drag_are_misuse() {
        let mut viewer = viewer();
        let err = viewer.orbit_delta(1.0, 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misuse);
        assert!(viewer.orbit_end(0.0, 0.0).is_err());
    }

    #[test]
    fn paused_frames_do_not_advance_or_render() {
        let mut viewer = loaded_viewer([0.0; 3]);
        viewer.play_animation(0, true).unwrap();
        viewer.render_frame(0).unwrap();
        viewer.render_frame(FRAME).unwrap();
        let rendered = viewer.engine().frames_rendered();
        let time = viewer.animation_state().unwrap().unwrap().time;

        viewer.set_paused(true).unwrap();
        assert_eq!(viewer.render_frame(2 * FRAME).unwrap(), FrameStatus::Paused);
        assert_eq!(viewer.render_frame(50 * FRAME).unwrap(), FrameStatus::Paused);
        assert_eq!(viewer.engine().frames_rendered(), rendered);
        assert_eq!(viewer.animation_state().unwrap().unwrap().time, time);

        viewer.set_paused(false).unwrap();
        viewer.render_frame(51 * FRAME).unwrap();
        let advanced = viewer.animation_state().unwrap().unwrap().time - time;
        assert!((advanced - FRAME as f64 / 1e9).abs() < 1e-9);
    }

    #[test]
    fn animation_drives_engine_samples() {
        let mut viewer = loaded_viewer([0.0; 3]);
        assert_eq!(viewer.animation_duration(0).unwrap(), 2.0);
        assert_eq!(
            viewer.animation_duration(2).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        viewer.play_animation(1, false).unwrap();
        assert!(viewer.wants_continuous_rendering());
        render_ticks(&mut viewer, 0, 60);
        let state = viewer.animation_state().unwrap().unwrap();
        assert_eq!(state.phase, PlaybackPhase::Finished);
        assert_eq!(state.time, 0.5);
        assert_eq!(viewer.engine().last_submission().unwrap().animation, Some((1, 0.5)));
        assert!(!viewer.wants_continuous_rendering());
    }

    #[test]
    fn setup_and_resize_rejected_while_load_pending() {
        let mut viewer = viewer();
        viewer.begin_model_load(fixtures::textured_model([0.0; 3])).unwrap();
        assert!(matches!(
            viewer.resize(RenderTarget(1), 10, 10),
            Err(ViewerError::LoadPending { .. })
        ));
        assert!(viewer.setup(RenderTarget(2), 10, 10).is_err());
        viewer.clear_scene().unwrap();
        viewer.resize(RenderTarget(1), 10, 10).unwrap();
        assert_eq!(viewer.viewport(), Some((10, 10)));
    }

    #[test]
    fn parse_failure_keeps_previous_pending_load() {
        let mut viewer = viewer();
        viewer.begin_model_load(fixtures::textured_model([0.0; 3])).unwrap();
        let err = viewer.begin_model_load(b"not a model".to_vec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(viewer.has_pending_load());
        viewer.finish_model_load(fixtures::textured_resources()).unwrap();
    }

    #[test]
    fn finish_without_begin_is_misuse() {
        let mut viewer = viewer();
        let err = viewer.finish_model_load(ResourceMap::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misuse);
    }

    #[test]
    fn engine_install_failure_keeps_prior_scene() {
        let mut viewer = loaded_viewer([0.0; 3]);
        viewer.engine_mut().fail_next_install();
        viewer.begin_model_load(fixtures::textured_model([3.0, 0.0, 0.0])).unwrap();
        let err = viewer.finish_model_load(fixtures::textured_resources()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(viewer.scene().map(|s| s.generation()), Some(1));
        assert_eq!(viewer.engine().installed().map(|s| s.generation), Some(1));
    }

    #[test]
    fn clear_scene_is_idempotent() {
        let mut viewer = loaded_viewer([0.0; 3]);
        viewer.play_animation(0, true).unwrap();
        viewer.clear_scene().unwrap();
        viewer.clear_scene().unwrap();
        assert!(viewer.scene().is_none());
        assert_eq!(viewer.animation_count().unwrap(), 0);
        assert!(viewer.animation_state().unwrap().is_none());
        viewer.render_frame(0).unwrap();
        assert_eq!(viewer.engine().last_submission().unwrap().scene_generation, None);
    }

    #[test]
    fn render_before_setup_is_rejected() {
        let mut viewer = Viewer::new(HeadlessEngine::new(), &ViewerConfig::default()).unwrap();
        let err = viewer.render_frame(0).unwrap_err();
        assert!(matches!(err, ViewerError::NoTarget { .. }));
        assert!(viewer.setup(RenderTarget(1), 0, 10).is_err());
    }

    #[test]
    fn every_call_after_destroy_is_a_lifecycle_error() {
        let mut viewer = loaded_viewer([0.0; 3]);
        viewer.destroy_renderer().unwrap();
        assert!(viewer.engine().is_destroyed());
        let results = [
            viewer.render_frame(0).map(|_| ()),
            viewer.setup(RenderTarget(1), 1, 1),
            viewer.orbit_start(),
            viewer.zoom_delta(2.0),
            viewer.play_animation(0, true),
            viewer.begin_model_load(Vec::new()).map(|_| ()),
            viewer.clear_scene(),
            viewer.set_paused(true),
            viewer.zoom_start(),
            viewer.set_msaa(4),
            viewer.set_wireframe_enabled(true),
            viewer.set_debug_logging_enabled(true),
            viewer.set_hdri(&[], Some("studio")),
            viewer.animation_count().map(|_| ()),
            viewer.animation_state().map(|_| ()),
            viewer.camera_pose().map(|_| ()),
            viewer.current_pose().map(|_| ()),
            viewer.orbit_state().map(|_| ()),
            viewer.destroy_renderer(),
        ];
        for result in results {
            let err = result.unwrap_err();
            assert!(matches!(err, ViewerError::Destroyed));
            assert_eq!(err.kind(), ErrorKind::Lifecycle);
        }
        assert!(!viewer.wants_continuous_rendering());
    }

    #[test]
    fn custom_camera_overrides_submitted_pose() {
        let mut viewer = viewer();
        viewer
            .set_custom_camera_look_at(DVec3::new(4.0, 4.0, 4.0), DVec3::ZERO, DVec3::Y)
            .unwrap();
        viewer.set_custom_perspective(30.0, 0.1, 10.0).unwrap();
        viewer.set_custom_camera_enabled(true).unwrap();
        viewer.render_frame(0).unwrap();
        let pose = viewer.camera_pose().unwrap();
        assert_eq!(pose.eye, DVec3::new(4.0, 4.0, 4.0));
        assert_eq!(pose.fov_degrees, 30.0);

        viewer.set_custom_camera_enabled(false).unwrap();
        viewer.render_frame(FRAME).unwrap();
        assert!((viewer.camera_pose().unwrap().eye - DVec3::new(0.0, 0.0, 3.0)).length() < 1e-9);
    }

    #[test]
    fn inertia_disabled_means_no_motion_after_release() {
        let mut viewer = viewer();
        viewer.set_inertia_enabled(false).unwrap();
        viewer.orbit_start().unwrap();
        viewer.orbit_delta(30.0, 0.0).unwrap();
        viewer.orbit_end(4000.0, 0.0).unwrap();
        let yaw = viewer.orbit_state().unwrap().yaw;
        render_ticks(&mut viewer, 0, 20);
        assert_eq!(viewer.orbit_state().unwrap().yaw, yaw);
        assert!(!viewer.wants_continuous_rendering());
    }

    #[test]
    fn inertia_params_scale_the_drag() {
        let mut viewer = viewer();
        viewer.set_inertia_enabled(false).unwrap();
        let drag = |viewer: &mut Viewer<HeadlessEngine>| {
            let before = viewer.orbit_state().unwrap().yaw;
            viewer.orbit_start().unwrap();
            viewer.orbit_delta(-20.0, 0.0).unwrap();
            viewer.orbit_end(0.0, 0.0).unwrap();
            viewer.orbit_state().unwrap().yaw - before
        };
        let slow = drag(&mut viewer);
        viewer.set_inertia_params(0.9, 0.3).unwrap();
        let fast = drag(&mut viewer);
        assert!((fast - 2.0 * slow).abs() < 1e-9, "{fast} vs {slow}");

        let err = viewer.set_inertia_params(1.0, 0.3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!((drag(&mut viewer) - fast).abs() < 1e-9);
    }

    #[test]
    fn fps_event_after_one_second_of_frames() {
        let mut viewer = viewer();
        render_ticks(&mut viewer, 0, 62);
        let fps: Vec<f64> = viewer
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                ViewerEvent::Fps(value) => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(fps.len(), 1);
        assert!((fps[0] - 60.0).abs() < 1.5);
    }

    #[test]
    fn environment_payloads_are_validated() {
        let mut viewer = viewer();
        let err = viewer.set_skybox(b"not ktx", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        let mut ktx = vec![0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n'];
        ktx.extend_from_slice(&[0; 68]);
        viewer.set_skybox(&ktx, None).unwrap();
        viewer.set_environment_light(&ktx, None).unwrap();
        viewer.set_environment_enabled(false).unwrap();
        viewer.render_frame(0).unwrap();
        assert!(!viewer.engine().last_submission().unwrap().skybox_visible);
        assert!(viewer.engine().has_skybox());
        viewer.set_environment_enabled(true).unwrap();
        viewer.render_frame(FRAME).unwrap();
        assert!(viewer.engine().last_submission().unwrap().skybox_visible);
    }

    #[test]
    fn resize_keeps_constraints_and_orbit() {
        let mut viewer = loaded_viewer([0.0; 3]);
        viewer.set_orbit_constraints(-20.0, 50.0, -90.0, 90.0).unwrap();
        viewer.set_zoom_limits(1.0, 8.0).unwrap();
        viewer.zoom_delta(0.5).unwrap();
        viewer.orbit_start().unwrap();
        viewer.orbit_delta(40.0, 15.0).unwrap();
        viewer.orbit_end(0.0, 0.0).unwrap();
        let state = viewer.orbit_state().unwrap();
        let constraints = viewer.camera.orbit().constraints();

        viewer.resize(RenderTarget(1), 1920, 1080).unwrap();
        assert_eq!(viewer.viewport(), Some((1920, 1080)));
        assert_eq!(viewer.orbit_state().unwrap(), state);
        assert_eq!(viewer.camera.orbit().constraints(), constraints);
        assert_eq!(viewer.engine().target(), Some((RenderTarget(1), 1920, 1080)));
    }

    #[test]
    fn failed_render_leaves_frame_state_untouched() {
        let mut viewer = loaded_viewer([0.0; 3]);
        viewer.play_animation(0, true).unwrap();
        viewer.orbit_start().unwrap();
        viewer.orbit_delta(10.0, 0.0).unwrap();
        viewer.orbit_end(4000.0, 0.0).unwrap();
        viewer.render_frame(0).unwrap();
        viewer.render_frame(FRAME).unwrap();
        let orbit = viewer.orbit_state().unwrap();
        let time = viewer.animation_state().unwrap().unwrap().time;
        let pose = viewer.camera_pose().unwrap();

        viewer.engine_mut().set_fail_renders(true);
        let err = viewer.render_frame(2 * FRAME).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(viewer.orbit_state().unwrap(), orbit);
        assert_eq!(viewer.animation_state().unwrap().unwrap().time, time);
        assert_eq!(viewer.camera_pose().unwrap(), pose);

        viewer.engine_mut().set_fail_renders(false);
        viewer.render_frame(3 * FRAME).unwrap();
        let advanced = viewer.animation_state().unwrap().unwrap().time - time;
        assert!((advanced - 2.0 * FRAME as f64 / 1e9).abs() < 1e-9);
        assert_ne!(viewer.orbit_state().unwrap().yaw, orbit.yaw);
    }

    #[test]
    fn render_settings_reach_the_engine() {
        let mut config = ViewerConfig::default();
        config.render.msaa_samples = 2;
        let mut viewer = Viewer::new(HeadlessEngine::new(), &config).unwrap();
        viewer.setup(RenderTarget(1), 64, 64).unwrap();
        assert_eq!(viewer.engine().settings().msaa_samples, 2);

        viewer.set_msaa(3).unwrap();
        assert_eq!(viewer.engine().settings().msaa_samples, 1);
        viewer.set_msaa(4).unwrap();
        viewer.set_shadows_enabled(false).unwrap();
        viewer.set_tone_mapping_filmic().unwrap();
        viewer.set_dynamic_resolution_enabled(true).unwrap();
        viewer.set_debug_logging_enabled(true).unwrap();
        viewer.render_frame(0).unwrap();
        assert_eq!(
            viewer.engine().last_submission().unwrap().settings,
            RenderSettings {
                msaa_samples: 4,
                shadows: false,
                tone_mapping: ToneMapping::Filmic,
                dynamic_resolution: true,
            }
        );
    }

    #[test]
    fn overlays_follow_the_displayed_scene() {
        let mut viewer = loaded_viewer([0.0; 3]);
        viewer.set_bounding_boxes_enabled(true).unwrap();
        viewer.set_wireframe_enabled(true).unwrap();
        assert_eq!(viewer.engine().overlay_segments(OverlayKind::BoundingBox), Some(12));
        assert_eq!(viewer.engine().overlay_segments(OverlayKind::Wireframe), Some(3));

        viewer.clear_scene().unwrap();
        assert_eq!(viewer.engine().overlay_segments(OverlayKind::BoundingBox), None);
        assert_eq!(viewer.engine().overlay_segments(OverlayKind::Wireframe), None);

        viewer.begin_model_load(fixtures::textured_model([1.0, 0.0, 0.0])).unwrap();
        viewer.finish_model_load(fixtures::textured_resources()).unwrap();
        assert!(viewer.scene().and_then(|scene| scene.wireframe()).is_some());
        assert_eq!(viewer.engine().overlay_segments(OverlayKind::Wireframe), Some(3));

        viewer.set_wireframe_enabled(false).unwrap();
        viewer.render_frame(0).unwrap();
        let segments = &viewer.engine().last_submission().unwrap().overlay_segments;
        assert_eq!(segments.get(&OverlayKind::BoundingBox), Some(&12));
        assert!(!segments.contains_key(&OverlayKind::Wireframe));
    }

    #[test]
    fn overlays_need_debug_features() {
        let mut config = ViewerConfig::default();
        config.debug.features_enabled = false;
        let mut viewer = Viewer::new(HeadlessEngine::new(), &config).unwrap();
        let err = viewer.set_wireframe_enabled(true).unwrap_err();
        assert!(matches!(err, ViewerError::DebugFeaturesDisabled { .. }));
        assert_eq!(err.kind(), ErrorKind::Misuse);
        assert!(viewer.set_bounding_boxes_enabled(true).is_err());
        viewer.set_wireframe_enabled(false).unwrap();
        assert_eq!(viewer.engine().overlay_segments(OverlayKind::Wireframe), None);
    }

    #[test]
    fn keyed_environments_are_reused_and_released() {
        let mut viewer = viewer();
        let ktx = ktx2(68);
        viewer.set_environment_light(&ktx, Some("studio")).unwrap();
        viewer.set_environment_light(&ktx, Some("studio")).unwrap();
        assert_eq!(viewer.engine().environments_created(), 1);

        viewer.set_skybox(&ktx, Some("studio")).unwrap();
        assert_eq!(viewer.engine().environments_created(), 2);

        // A cache hit never looks at the payload.
        viewer.set_environment_light(b"stale", Some("studio")).unwrap();
        assert_eq!(viewer.engine().environments_created(), 2);
        let err = viewer.set_environment_light(b"stale", Some("fresh")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        viewer.set_environment_light(&ktx2(4), Some("other")).unwrap();
        assert_eq!(viewer.engine().environments_created(), 3);
        assert_eq!(viewer.engine().live_environments(), 2);
        assert_eq!(viewer.engine().ktx_sizes(), (16, 80));
    }

    #[test]
    fn hdri_holds_both_slots_until_each_is_replaced() {
        let mut viewer = viewer();
        let hdr = panorama_hdr();
        viewer.set_hdri(&hdr, Some("sunset")).unwrap();
        viewer.set_hdri(&hdr, Some("sunset")).unwrap();
        assert_eq!(viewer.engine().environments_created(), 1);
        assert_eq!(viewer.engine().equirect_size(), Some((8, 4)));
        assert!(viewer.engine().has_indirect_light());
        assert!(viewer.engine().has_skybox());

        viewer.set_skybox(&ktx2(8), None).unwrap();
        assert_eq!(viewer.engine().live_environments(), 2);
        viewer.set_environment_light(&ktx2(8), None).unwrap();
        assert_eq!(viewer.engine().live_environments(), 2);
        assert_eq!(viewer.engine().equirect_size(), None);

        viewer.destroy_renderer().unwrap();
        assert_eq!(viewer.engine().live_environments(), 0);
    }

    #[test]
    fn zoom_gesture_keeps_rendering_until_it_ends() {
        let mut viewer = viewer();
        assert!(!viewer.wants_continuous_rendering());
        viewer.zoom_start().unwrap();
        assert!(viewer.wants_continuous_rendering());
        viewer.zoom_delta(1.5).unwrap();
        viewer.zoom_end().unwrap();
        assert!(!viewer.wants_continuous_rendering());
        assert_eq!(viewer.zoom_end().unwrap_err().kind(), ErrorKind::Misuse);
    }
}
