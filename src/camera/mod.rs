mod custom;
mod orbit;
mod pose;

pub use custom::CustomCamera;
pub use orbit::{InertiaParams, OrbitConstraints, OrbitController, OrbitMotion, OrbitState};
pub use pose::{distance_for_radius, orbit_offset, CameraPose, Projection};

use crate::config::ViewerConfig;
use crate::error::ErrorKind;
use glam::DVec3;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("{operation} called without an active drag")]
    NoActiveDrag { operation: &'static str },
    #[error("zoom_end called without an active zoom gesture")]
    NoActiveZoom,
    #[error("invalid camera argument: {0}")]
    InvalidArgument(String),
}

impl CameraError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::NoActiveDrag { .. } | CameraError::NoActiveZoom => ErrorKind::Misuse,
            CameraError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// The facade's camera: an orbit controller and a custom camera, of which
/// exactly one produces the pose each frame.
#[derive(Debug, Clone)]
pub struct CameraRig {
    orbit: OrbitController,
    custom: CustomCamera,
    projection: Projection,
}

impl CameraRig {
    pub fn from_config(config: &ViewerConfig) -> Result<Self, CameraError> {
        let projection = Projection::new(
            config.camera.fov_degrees,
            config.camera.near,
            config.camera.far,
        )?;
        let (min_yaw, max_yaw) = config
            .orbit
            .yaw_range_degrees
            .map_or((-180.0, 180.0), |[min, max]| (min, max));
        let constraints = OrbitConstraints::default()
            .with_angles_degrees(
                config.orbit.min_pitch_degrees,
                config.orbit.max_pitch_degrees,
                min_yaw,
                max_yaw,
            )?
            .with_distance(config.orbit.min_distance, config.orbit.max_distance)?;
        let inertia = InertiaParams {
            enabled: config.inertia.enabled,
            ..InertiaParams::default()
        }
        .with_params(config.inertia.damping, config.inertia.sensitivity)?;
        Ok(Self {
            orbit: OrbitController::new(constraints, inertia, config.orbit.initial_distance),
            custom: CustomCamera::new(projection),
            projection,
        })
    }

    pub fn orbit(&self) -> &OrbitController {
        &self.orbit
    }

    pub fn orbit_mut(&mut self) -> &mut OrbitController {
        &mut self.orbit
    }

    pub fn custom_mut(&mut self) -> &mut CustomCamera {
        &mut self.custom
    }

    /// Orbit inertia is frozen while the custom camera drives the view.
    pub fn advance(&mut self, elapsed: f64) {
        if !self.custom.is_enabled() {
            self.orbit.advance(elapsed);
        }
    }

    pub fn pose(&self) -> CameraPose {
        if self.custom.is_enabled() {
            self.custom.pose()
        } else {
            self.orbit.pose(self.projection)
        }
    }

    /// A zoom gesture counts even under the custom camera: the host is still
    /// mid-gesture and expects frames.
    pub fn is_moving(&self) -> bool {
        self.orbit.is_zooming()
            || (!self.custom.is_enabled() && (self.orbit.is_dragging() || self.orbit.is_coasting()))
    }

    /// Frames a sphere at `center`, honouring the configured field of view.
    pub fn frame_sphere(&mut self, center: DVec3, radius: f64) {
        let distance = distance_for_radius(radius, self.projection.fov_degrees);
        log::debug!(
            "framing sphere center={:?} radius={:.3} distance={:.3}",
            center,
            radius,
            distance
        );
        self.orbit.frame(center, distance);
    }
}

#[cfg(test)]
mod tests {
    use super::CameraRig;
    use crate::config::ViewerConfig;
    use glam::DVec3;

    #[test]
    fn custom_camera_overrides_and_orbit_resumes() {
        let mut rig = CameraRig::from_config(&ViewerConfig::default()).unwrap();
        rig.orbit_mut().orbit_start();
        rig.orbit_mut().orbit_delta(40.0, 20.0).unwrap();
        rig.orbit_mut().orbit_end(0.0, 0.0).unwrap();
        let orbit_pose = rig.pose();

        rig.custom_mut()
            .set_look_at(DVec3::new(9.0, 9.0, 9.0), DVec3::ZERO, DVec3::Y)
            .unwrap();
        rig.custom_mut().set_enabled(true);
        assert_eq!(rig.pose().eye, DVec3::new(9.0, 9.0, 9.0));

        rig.advance(1.0);
        rig.custom_mut().set_enabled(false);
        assert_eq!(rig.pose(), orbit_pose);
    }

    #[test]
    fn orbit_pose_uses_configured_projection() {
        let rig = CameraRig::from_config(&ViewerConfig::default()).unwrap();
        let pose = rig.pose();
        assert_eq!(pose.fov_degrees, 45.0);
        assert_eq!(pose.near, 0.05);
        assert_eq!(pose.far, 100.0);
        assert!((pose.eye - DVec3::new(0.0, 0.0, 3.0)).length() < 1e-12);
    }

    #[test]
    fn coasting_counts_as_motion() {
        let mut rig = CameraRig::from_config(&ViewerConfig::default()).unwrap();
        assert!(!rig.is_moving());
        rig.orbit_mut().orbit_start();
        assert!(rig.is_moving());
        rig.orbit_mut().orbit_end(300.0, 0.0).unwrap();
        assert!(rig.is_moving());
    }

    #[test]
    fn zoom_gesture_counts_as_motion() {
        let mut rig = CameraRig::from_config(&ViewerConfig::default()).unwrap();
        rig.orbit_mut().zoom_start();
        assert!(rig.is_moving());
        rig.orbit_mut().zoom_end().unwrap();
        assert!(!rig.is_moving());
    }

    #[test]
    fn frame_sphere_backs_away_for_large_models() {
        let mut rig = CameraRig::from_config(&ViewerConfig::default()).unwrap();
        rig.frame_sphere(DVec3::new(0.0, 1.0, 0.0), 10.0);
        let state = rig.orbit().state();
        assert_eq!(state.target, DVec3::new(0.0, 1.0, 0.0));
        assert!(state.distance > 20.0);
    }
}
