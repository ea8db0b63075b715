use super::pose::{CameraPose, Projection};
use super::CameraError;
use glam::DVec3;

/// Explicit look-at camera that replaces the orbit pose while enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomCamera {
    enabled: bool,
    eye: DVec3,
    center: DVec3,
    up: DVec3,
    projection: Projection,
}

impl CustomCamera {
    pub fn new(projection: Projection) -> Self {
        Self {
            enabled: false,
            eye: DVec3::new(0.0, 0.0, 3.0),
            center: DVec3::ZERO,
            up: DVec3::Y,
            projection,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_look_at(&mut self, eye: DVec3, center: DVec3, up: DVec3) -> Result<(), CameraError> {
        if !(eye.is_finite() && center.is_finite() && up.is_finite()) {
            return Err(CameraError::invalid("custom camera vectors must be finite"));
        }
        let forward = center - eye;
        if forward.length_squared() <= f64::EPSILON {
            return Err(CameraError::invalid("custom camera eye and center coincide"));
        }
        if forward.cross(up).length_squared() <= f64::EPSILON {
            return Err(CameraError::invalid(
                "custom camera up vector is zero or parallel to the view direction",
            ));
        }
        self.eye = eye;
        self.center = center;
        self.up = up;
        Ok(())
    }

    pub fn set_perspective(&mut self, fov_degrees: f64, near: f64, far: f64) -> Result<(), CameraError> {
        self.projection = Projection::new(fov_degrees, near, far)?;
        Ok(())
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::look_at(self.eye, self.center, self.up, self.projection)
    }
}
