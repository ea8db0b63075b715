use super::CameraError;
use glam::DVec3;

/// Perspective parameters shared by the orbit and custom camera paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
}

impl Projection {
    pub fn new(fov_degrees: f64, near: f64, far: f64) -> Result<Self, CameraError> {
        if !(fov_degrees.is_finite() && fov_degrees > 0.0 && fov_degrees < 180.0) {
            return Err(CameraError::invalid(format!(
                "field of view must be in (0, 180) degrees, got {fov_degrees}"
            )));
        }
        if !(near.is_finite() && far.is_finite() && near > 0.0 && far > near) {
            return Err(CameraError::invalid(format!(
                "expected 0 < near < far, got near={near} far={far}"
            )));
        }
        Ok(Self {
            fov_degrees,
            near,
            far,
        })
    }
}

/// The eye/center/up camera placement handed to the renderer each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub eye: DVec3,
    pub center: DVec3,
    pub up: DVec3,
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
}

impl CameraPose {
    pub fn look_at(eye: DVec3, center: DVec3, up: DVec3, projection: Projection) -> Self {
        Self {
            eye,
            center,
            up,
            fov_degrees: projection.fov_degrees,
            near: projection.near,
            far: projection.far,
        }
    }
}

/// Offset from the orbit target to the eye. Yaw 0 / pitch 0 looks down -Z.
pub fn orbit_offset(yaw: f64, pitch: f64, distance: f64) -> DVec3 {
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    DVec3::new(
        distance * cos_pitch * sin_yaw,
        distance * sin_pitch,
        distance * cos_pitch * cos_yaw,
    )
}

/// Distance at which a sphere of `radius` fills a vertical field of view.
pub fn distance_for_radius(radius: f64, fov_degrees: f64) -> f64 {
    let half_fov = (fov_degrees.to_radians() * 0.5).max(0.01);
    (radius / half_fov.sin()).max(0.05)
}
