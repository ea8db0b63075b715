use super::pose::{orbit_offset, CameraPose, Projection};
use super::CameraError;
use glam::DVec3;
use std::f64::consts::{PI, TAU};

/// Damping factors are per frame at this rate, independent of the host's cadence.
const DAMPING_REFERENCE_HZ: f64 = 60.0;
/// Angular speed (rad/s) under which a coasting camera snaps to rest.
const REST_VELOCITY_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitConstraints {
    pub min_pitch: f64,
    pub max_pitch: f64,
    /// `None` leaves yaw unbounded (wrapped into (-pi, pi]).
    pub yaw_range: Option<(f64, f64)>,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl Default for OrbitConstraints {
    fn default() -> Self {
        Self {
            min_pitch: (-89f64).to_radians(),
            max_pitch: 89f64.to_radians(),
            yaw_range: None,
            min_distance: 0.05,
            max_distance: 100.0,
        }
    }
}

impl OrbitConstraints {
    /// Builds angular limits from degrees. A yaw span of a full turn or more
    /// is treated as unconstrained.
    pub fn with_angles_degrees(
        self,
        min_pitch: f64,
        max_pitch: f64,
        min_yaw: f64,
        max_yaw: f64,
    ) -> Result<Self, CameraError> {
        let all_finite = [min_pitch, max_pitch, min_yaw, max_yaw]
            .iter()
            .all(|value| value.is_finite());
        if !all_finite {
            return Err(CameraError::invalid("orbit constraints must be finite"));
        }
        if min_pitch > max_pitch || min_yaw > max_yaw {
            return Err(CameraError::invalid(format!(
                "orbit constraints inverted: pitch [{min_pitch}, {max_pitch}], yaw [{min_yaw}, {max_yaw}]"
            )));
        }
        // At the poles the eye is colinear with the world up axis.
        if min_pitch <= -90.0 || max_pitch >= 90.0 {
            return Err(CameraError::invalid(format!(
                "pitch limits must lie strictly within (-90, 90) degrees, got [{min_pitch}, {max_pitch}]"
            )));
        }
        let yaw_range = if max_yaw - min_yaw >= 360.0 {
            None
        } else {
            Some((min_yaw.to_radians(), max_yaw.to_radians()))
        };
        Ok(Self {
            min_pitch: min_pitch.to_radians(),
            max_pitch: max_pitch.to_radians(),
            yaw_range,
            ..self
        })
    }

    pub fn with_distance(self, min_distance: f64, max_distance: f64) -> Result<Self, CameraError> {
        if !(min_distance.is_finite() && max_distance.is_finite()) {
            return Err(CameraError::invalid("zoom limits must be finite"));
        }
        if min_distance <= 0.0 || min_distance > max_distance {
            return Err(CameraError::invalid(format!(
                "expected 0 < min <= max zoom distance, got [{min_distance}, {max_distance}]"
            )));
        }
        Ok(Self {
            min_distance,
            max_distance,
            ..self
        })
    }

    pub fn clamp_pitch(&self, pitch: f64) -> f64 {
        pitch.clamp(self.min_pitch, self.max_pitch)
    }

    pub fn clamp_yaw(&self, yaw: f64) -> f64 {
        match self.yaw_range {
            Some((min, max)) => yaw.clamp(min, max),
            None => wrap_angle(yaw),
        }
    }

    pub fn clamp_distance(&self, distance: f64) -> f64 {
        distance.clamp(self.min_distance, self.max_distance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertiaParams {
    pub enabled: bool,
    /// Fraction of angular velocity kept per reference frame, in [0, 1).
    pub damping: f64,
    /// Degrees of rotation per pixel of drag.
    pub sensitivity: f64,
}

impl Default for InertiaParams {
    fn default() -> Self {
        Self {
            enabled: true,
            damping: 0.9,
            sensitivity: 0.15,
        }
    }
}

impl InertiaParams {
    pub fn with_params(self, damping: f64, sensitivity: f64) -> Result<Self, CameraError> {
        if !(damping.is_finite() && (0.0..1.0).contains(&damping)) {
            return Err(CameraError::invalid(format!(
                "damping must be in [0, 1), got {damping}"
            )));
        }
        if !(sensitivity.is_finite() && sensitivity > 0.0) {
            return Err(CameraError::invalid(format!(
                "sensitivity must be positive, got {sensitivity}"
            )));
        }
        Ok(Self {
            damping,
            sensitivity,
            ..self
        })
    }

    fn radians_per_pixel(&self) -> f64 {
        self.sensitivity.to_radians()
    }
}

/// Orbit sub-state. Velocities only exist while coasting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrbitMotion {
    AtRest,
    Dragging,
    Coasting { yaw_velocity: f64, pitch_velocity: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitState {
    pub yaw: f64,
    pub pitch: f64,
    pub distance: f64,
    pub target: DVec3,
}

#[derive(Debug, Clone)]
pub struct OrbitController {
    state: OrbitState,
    constraints: OrbitConstraints,
    inertia: InertiaParams,
    motion: OrbitMotion,
    zooming: bool,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(OrbitConstraints::default(), InertiaParams::default(), 3.0)
    }
}

impl OrbitController {
    pub fn new(constraints: OrbitConstraints, inertia: InertiaParams, distance: f64) -> Self {
        let state = OrbitState {
            yaw: constraints.clamp_yaw(0.0),
            pitch: constraints.clamp_pitch(0.0),
            distance: constraints.clamp_distance(distance),
            target: DVec3::ZERO,
        };
        Self {
            state,
            constraints,
            inertia,
            motion: OrbitMotion::AtRest,
            zooming: false,
        }
    }

    pub fn state(&self) -> OrbitState {
        self.state
    }

    pub fn constraints(&self) -> OrbitConstraints {
        self.constraints
    }

    pub fn inertia(&self) -> InertiaParams {
        self.inertia
    }

    pub fn motion(&self) -> OrbitMotion {
        self.motion
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.motion, OrbitMotion::Dragging)
    }

    pub fn is_coasting(&self) -> bool {
        matches!(self.motion, OrbitMotion::Coasting { .. })
    }

    pub fn is_zooming(&self) -> bool {
        self.zooming
    }

    /// Current angular velocity in radians per second (yaw, pitch).
    pub fn velocity(&self) -> (f64, f64) {
        match self.motion {
            OrbitMotion::Coasting {
                yaw_velocity,
                pitch_velocity,
            } => (yaw_velocity, pitch_velocity),
            OrbitMotion::AtRest | OrbitMotion::Dragging => (0.0, 0.0),
        }
    }

    pub fn set_constraints(&mut self, constraints: OrbitConstraints) {
        self.constraints = constraints;
        self.clamp_state();
    }

    pub fn set_inertia_enabled(&mut self, enabled: bool) {
        self.inertia.enabled = enabled;
        if !enabled && self.is_coasting() {
            self.motion = OrbitMotion::AtRest;
        }
    }

    pub fn set_inertia(&mut self, inertia: InertiaParams) {
        self.inertia = inertia;
        if !inertia.enabled && self.is_coasting() {
            self.motion = OrbitMotion::AtRest;
        }
    }

    /// A new drag always starts from rest, interrupting any coast.
    pub fn orbit_start(&mut self) {
        if self.is_dragging() {
            log::debug!("orbit_start while already dragging; restarting drag");
        }
        self.motion = OrbitMotion::Dragging;
    }

    pub fn orbit_delta(&mut self, dx: f64, dy: f64) -> Result<(), CameraError> {
        if !self.is_dragging() {
            log::warn!("orbit_delta({dx}, {dy}) without an active drag");
            return Err(CameraError::NoActiveDrag {
                operation: "orbit_delta",
            });
        }
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(CameraError::invalid(format!(
                "orbit delta must be finite, got ({dx}, {dy})"
            )));
        }
        let scale = self.inertia.radians_per_pixel();
        self.state.yaw -= dx * scale;
        self.state.pitch += dy * scale;
        self.clamp_state();
        Ok(())
    }

    /// Ends the drag. Release velocity is in pixels per second.
    pub fn orbit_end(&mut self, velocity_x: f64, velocity_y: f64) -> Result<(), CameraError> {
        if !self.is_dragging() {
            log::warn!("orbit_end without an active drag");
            return Err(CameraError::NoActiveDrag {
                operation: "orbit_end",
            });
        }
        if !(velocity_x.is_finite() && velocity_y.is_finite()) {
            self.motion = OrbitMotion::AtRest;
            return Err(CameraError::invalid(format!(
                "release velocity must be finite, got ({velocity_x}, {velocity_y})"
            )));
        }
        self.motion = OrbitMotion::AtRest;
        if !self.inertia.enabled {
            return Ok(());
        }
        let scale = self.inertia.radians_per_pixel();
        let yaw_velocity = -velocity_x * scale;
        let pitch_velocity = velocity_y * scale;
        if yaw_velocity.hypot(pitch_velocity) >= REST_VELOCITY_EPSILON {
            self.motion = OrbitMotion::Coasting {
                yaw_velocity,
                pitch_velocity,
            };
        }
        Ok(())
    }

    /// Marks a pinch/wheel gesture as in progress. `zoom_delta` works without
    /// it; the flag only tells the host to keep rendering.
    pub fn zoom_start(&mut self) {
        if self.zooming {
            log::debug!("zoom_start while already zooming");
        }
        self.zooming = true;
    }

    pub fn zoom_end(&mut self) -> Result<(), CameraError> {
        if !self.zooming {
            log::warn!("zoom_end without an active zoom gesture");
            return Err(CameraError::NoActiveZoom);
        }
        self.zooming = false;
        Ok(())
    }

    /// Scales the orbit distance: factors above one move the eye closer.
    pub fn zoom_delta(&mut self, scale: f64) -> Result<(), CameraError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(CameraError::invalid(format!(
                "zoom scale must be positive, got {scale}"
            )));
        }
        self.state.distance = self.constraints.clamp_distance(self.state.distance / scale);
        Ok(())
    }

    /// Integrates inertial motion over `elapsed` seconds.
    pub fn advance(&mut self, elapsed: f64) {
        let OrbitMotion::Coasting {
            yaw_velocity,
            pitch_velocity,
        } = self.motion
        else {
            return;
        };
        if !self.inertia.enabled {
            self.motion = OrbitMotion::AtRest;
            return;
        }
        if !(elapsed.is_finite() && elapsed > 0.0) {
            return;
        }
        self.state.yaw += yaw_velocity * elapsed;
        self.state.pitch += pitch_velocity * elapsed;
        self.clamp_state();

        let decay = self.inertia.damping.powf(elapsed * DAMPING_REFERENCE_HZ);
        let yaw_velocity = yaw_velocity * decay;
        let pitch_velocity = pitch_velocity * decay;
        self.motion = if yaw_velocity.hypot(pitch_velocity) < REST_VELOCITY_EPSILON {
            OrbitMotion::AtRest
        } else {
            OrbitMotion::Coasting {
                yaw_velocity,
                pitch_velocity,
            }
        };
    }

    /// Recentres on `target` at `distance`, facing the default direction.
    pub fn frame(&mut self, target: DVec3, distance: f64) {
        self.state = OrbitState {
            yaw: 0.0,
            pitch: 0.0,
            distance,
            target,
        };
        self.clamp_state();
        if self.is_coasting() {
            self.motion = OrbitMotion::AtRest;
        }
    }

    pub fn eye(&self) -> DVec3 {
        self.state.target + orbit_offset(self.state.yaw, self.state.pitch, self.state.distance)
    }

    pub fn pose(&self, projection: Projection) -> CameraPose {
        CameraPose::look_at(self.eye(), self.state.target, DVec3::Y, projection)
    }

    fn clamp_state(&mut self) {
        self.state.yaw = self.constraints.clamp_yaw(self.state.yaw);
        self.state.pitch = self.constraints.clamp_pitch(self.state.pitch);
        self.state.distance = self.constraints.clamp_distance(self.state.distance);
    }
}

fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::{InertiaParams, OrbitConstraints, OrbitController, OrbitMotion};
    use crate::camera::CameraError;
    use glam::DVec3;

    fn controller() -> OrbitController {
        OrbitController::default()
    }

    fn pitch_limited(min: f64, max: f64) -> OrbitController {
        let constraints = OrbitConstraints::default()
            .with_angles_degrees(min, max, -180.0, 180.0)
            .unwrap();
        OrbitController::new(constraints, InertiaParams::default(), 3.0)
    }

    #[test]
    fn delta_without_drag_is_reported() {
        let mut orbit = controller();
        let before = orbit.state();
        let err = orbit.orbit_delta(10.0, 5.0).unwrap_err();
        assert!(matches!(err, CameraError::NoActiveDrag { .. }));
        assert_eq!(orbit.state(), before);
        assert!(orbit.orbit_end(0.0, 0.0).is_err());
    }

    #[test]
    fn drag_clamps_pitch_at_every_step() {
        let mut orbit = pitch_limited(-30.0, 60.0);
        orbit.orbit_start();
        let max = 60f64.to_radians();
        let min = (-30f64).to_radians();
        for _ in 0..200 {
            orbit.orbit_delta(3.0, 7.0).unwrap();
            let pitch = orbit.state().pitch;
            assert!(pitch <= max && pitch >= min);
        }
        assert!((orbit.state().pitch - max).abs() < 1e-12);
        for _ in 0..400 {
            orbit.orbit_delta(-3.0, -7.0).unwrap();
            let pitch = orbit.state().pitch;
            assert!(pitch <= max && pitch >= min);
        }
        assert!((orbit.state().pitch - min).abs() < 1e-12);
    }

    #[test]
    fn constrained_yaw_stays_in_range() {
        let constraints = OrbitConstraints::default()
            .with_angles_degrees(-89.0, 89.0, -45.0, 45.0)
            .unwrap();
        let mut orbit = OrbitController::new(constraints, InertiaParams::default(), 3.0);
        orbit.orbit_start();
        for _ in 0..100 {
            orbit.orbit_delta(-50.0, 0.0).unwrap();
            assert!(orbit.state().yaw <= 45f64.to_radians() + 1e-12);
        }
        assert!((orbit.state().yaw - 45f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn unconstrained_yaw_wraps() {
        let mut orbit = controller();
        orbit.orbit_start();
        for _ in 0..100 {
            orbit.orbit_delta(-100.0, 0.0).unwrap();
            let yaw = orbit.state().yaw;
            assert!(yaw > -std::f64::consts::PI && yaw <= std::f64::consts::PI);
        }
    }

    #[test]
    fn coasting_velocity_decays_to_exact_rest() {
        let mut orbit = controller();
        orbit.orbit_start();
        orbit.orbit_end(800.0, -300.0).unwrap();
        assert!(orbit.is_coasting());
        let (yaw_v, pitch_v) = orbit.velocity();
        let mut previous = yaw_v.hypot(pitch_v);
        let mut ticks = 0;
        while orbit.is_coasting() {
            orbit.advance(1.0 / 60.0);
            let (yaw_v, pitch_v) = orbit.velocity();
            let magnitude = yaw_v.hypot(pitch_v);
            assert!(magnitude < previous);
            previous = magnitude;
            ticks += 1;
            assert!(ticks < 1_000, "inertia never settled");
        }
        assert_eq!(orbit.velocity(), (0.0, 0.0));
        assert_eq!(orbit.motion(), OrbitMotion::AtRest);
    }

    #[test]
    fn disabled_inertia_never_moves_after_release() {
        let mut orbit = controller();
        orbit.set_inertia_enabled(false);
        orbit.orbit_start();
        orbit.orbit_delta(20.0, 10.0).unwrap();
        orbit.orbit_end(2_000.0, 2_000.0).unwrap();
        let settled = orbit.state();
        for _ in 0..120 {
            orbit.advance(1.0 / 30.0);
        }
        assert_eq!(orbit.state(), settled);
        assert_eq!(orbit.velocity(), (0.0, 0.0));
    }

    #[test]
    fn disabling_inertia_stops_a_coast() {
        let mut orbit = controller();
        orbit.orbit_start();
        orbit.orbit_end(500.0, 0.0).unwrap();
        assert!(orbit.is_coasting());
        orbit.set_inertia_enabled(false);
        assert_eq!(orbit.motion(), OrbitMotion::AtRest);
    }

    #[test]
    fn new_drag_interrupts_coast() {
        let mut orbit = controller();
        orbit.orbit_start();
        orbit.orbit_end(500.0, 500.0).unwrap();
        orbit.orbit_start();
        assert_eq!(orbit.velocity(), (0.0, 0.0));
        let before = orbit.state();
        orbit.advance(0.5);
        assert_eq!(orbit.state(), before);
    }

    #[test]
    fn zoom_scales_and_clamps_distance() {
        let mut orbit = controller();
        orbit.zoom_delta(2.0).unwrap();
        assert!((orbit.state().distance - 1.5).abs() < 1e-12);
        orbit.zoom_delta(1_000.0).unwrap();
        assert_eq!(orbit.state().distance, 0.05);
        orbit.zoom_delta(1e-6).unwrap();
        assert_eq!(orbit.state().distance, 100.0);
        assert!(orbit.zoom_delta(0.0).is_err());
        assert!(orbit.zoom_delta(f64::NAN).is_err());
    }

    #[test]
    fn tightened_constraints_reclamp_current_state() {
        let mut orbit = controller();
        orbit.orbit_start();
        orbit.orbit_delta(0.0, 400.0).unwrap();
        orbit.orbit_end(0.0, 0.0).unwrap();
        assert!(orbit.state().pitch > 45f64.to_radians());
        let tighter = orbit
            .constraints()
            .with_angles_degrees(-10.0, 10.0, -180.0, 180.0)
            .unwrap();
        orbit.set_constraints(tighter);
        assert!((orbit.state().pitch - 10f64.to_radians()).abs() < 1e-12);

        let closer = orbit.constraints().with_distance(0.5, 1.0).unwrap();
        orbit.set_constraints(closer);
        assert_eq!(orbit.state().distance, 1.0);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let base = OrbitConstraints::default();
        assert!(base.with_angles_degrees(10.0, -10.0, 0.0, 1.0).is_err());
        assert!(base.with_angles_degrees(-95.0, 0.0, 0.0, 1.0).is_err());
        assert!(base.with_angles_degrees(-90.0, 45.0, 0.0, 1.0).is_err());
        assert!(base.with_angles_degrees(-45.0, 90.0, 0.0, 1.0).is_err());
        assert!(base.with_angles_degrees(-89.9, 89.9, 0.0, 1.0).is_ok());
        assert!(base.with_distance(0.0, 1.0).is_err());
        assert!(base.with_distance(2.0, 1.0).is_err());
        let inertia = InertiaParams::default();
        assert!(inertia.with_params(1.0, 0.1).is_err());
        assert!(inertia.with_params(0.5, 0.0).is_err());
        assert!(inertia.with_params(0.0, 0.2).is_ok());
    }

    #[test]
    fn steepest_allowed_pitch_keeps_a_usable_up_vector() {
        let mut orbit = pitch_limited(-89.9, 89.9);
        orbit.orbit_start();
        orbit.orbit_delta(0.0, 10_000.0).unwrap();
        let eye = orbit.eye();
        let forward = (orbit.state().target - eye).normalize();
        assert!(forward.cross(DVec3::Y).length() > 1e-3);
    }

    #[test]
    fn zoom_gesture_brackets_deltas() {
        let mut orbit = controller();
        assert!(matches!(orbit.zoom_end(), Err(CameraError::NoActiveZoom)));
        orbit.zoom_start();
        assert!(orbit.is_zooming());
        orbit.zoom_delta(1.5).unwrap();
        orbit.zoom_end().unwrap();
        assert!(!orbit.is_zooming());
        assert!((orbit.state().distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn frame_recentres_and_stops_motion() {
        let mut orbit = controller();
        orbit.orbit_start();
        orbit.orbit_end(900.0, 0.0).unwrap();
        orbit.frame(DVec3::new(1.0, 2.0, 3.0), 4.0);
        assert_eq!(orbit.motion(), OrbitMotion::AtRest);
        let eye = orbit.eye();
        assert!((eye - DVec3::new(1.0, 2.0, 7.0)).length() < 1e-12);
    }
}
