use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

/// Perspective camera looking from `eye` at `target`
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let eye = Vec3::new(0.0, 5.0, 10.0);
        Self {
            eye,
            target: eye + Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: 75f32.to_radians(),
            aspect: aspect_ratio(width, height),
            z_near: 0.1,
            z_far: 1000.0,
        }
    }

    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        Self {
            eye: config.position,
            target: config.position + Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: config.fov_y_degrees.to_radians(),
            aspect: aspect_ratio(width, height),
            z_near: config.z_near,
            z_far: config.z_far,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let dir = (self.target - self.eye).normalize_or_zero();
        if dir == Vec3::ZERO { Vec3::NEG_Z } else { dir }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) { self.aspect = aspect_ratio(width, height); }

    pub fn view(&self) -> Mat4 {
        // Degenerate look direction falls back to looking down -Z
        let target = if (self.target - self.eye).length_squared() > 0.0 { self.target } else { self.eye + Vec3::NEG_Z };
        Mat4::look_at_rh(self.eye, target, self.up)
    }

    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * self.view()
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::utils::approx_eq;
    use glam::Vec4;

    #[test]
    fn test_from_config() {
        let config = SimulationConfig::moon_spring();
        let camera = Camera::from_config(&config.camera, 800, 400);
        assert_eq!(camera.eye, Vec3::new(0.0, 5.0, 10.0));
        assert!(approx_eq(camera.fov_y, 75f32.to_radians(), 1e-6));
        assert!(approx_eq(camera.aspect, 2.0, 1e-6));
        assert_eq!(camera.forward(), Vec3::NEG_Z);
    }

    #[test]
    fn test_target_projects_to_centre() {
        let mut camera = Camera::new(640, 480);
        camera.look_at(Vec3::new(0.0, 5.0, 0.0));
        let clip = camera.view_proj() * Vec4::new(0.0, 5.0, 0.0, 1.0);
        assert!(approx_eq(clip.x / clip.w, 0.0, 1e-5));
        assert!(approx_eq(clip.y / clip.w, 0.0, 1e-5));
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_zero_height_does_not_divide_by_zero() {
        let mut camera = Camera::new(0, 0);
        assert!(camera.aspect.is_finite());
        camera.set_aspect(1024, 0);
        assert!(approx_eq(camera.aspect, 1024.0, 1e-3));
    }
}
