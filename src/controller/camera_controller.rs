use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::config::CameraMode;
use crate::controller::input::OrbitInput;
use crate::model::Camera;

/// Keeps the polar angle away from the poles where `look_at` degenerates
const POLAR_EPS: f32 = 1e-6;

/// Mouse-driven orbit around a target point, turning and zooming like three.js OrbitControls
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
        }
    }

    /// Queue a rotation for a pointer drag of `delta` pixels; a full viewport height turns once around
    pub fn rotate(&mut self, delta: Vec2, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.theta_delta -= 2.0 * PI * delta.x / height * self.rotate_speed;
        self.phi_delta -= 2.0 * PI * delta.y / height * self.rotate_speed;
    }

    /// Queue one zoom notch; negative `delta_y` (wheel up) moves closer
    pub fn dolly(&mut self, delta_y: f32) {
        let zoom_scale = 0.95f32.powf(self.zoom_speed);
        if delta_y < 0.0 {
            self.scale *= zoom_scale;
        } else if delta_y > 0.0 {
            self.scale /= zoom_scale;
        }
    }

    /// Apply the queued rotation and zoom to the camera, then clear them
    pub fn update(&mut self, camera: &mut Camera) {
        let offset = camera.eye - self.target;
        let mut radius = offset.length();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 { (offset.y / radius).clamp(-1.0, 1.0).acos() } else { 0.0 };

        theta += self.theta_delta;
        phi += self.phi_delta;
        phi = phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(POLAR_EPS, PI - POLAR_EPS);
        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.eye = self.target + offset;
        camera.look_at(self.target);

        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;
    }
}

/// Moves the camera every frame, either trailing the unit or orbiting a point
#[derive(Debug, Clone)]
pub enum CameraController {
    Follow { offset: Vec3 },
    Orbit(OrbitControls),
}

impl CameraController {
    pub fn from_mode(mode: &CameraMode) -> Self {
        match mode {
            CameraMode::Follow { offset } => CameraController::Follow { offset: *offset },
            CameraMode::Orbit { target } => CameraController::Orbit(OrbitControls::new(*target)),
        }
    }

    /// `followed` is the unit position for follow mode; orbit mode ignores it
    pub fn update(&mut self, camera: &mut Camera, followed: Option<Vec3>, input: &OrbitInput, viewport_height: f32) {
        match self {
            CameraController::Follow { offset } => {
                if let Some(position) = followed {
                    camera.eye = position + *offset;
                    camera.look_at(position);
                }
            }
            CameraController::Orbit(controls) => {
                if input.drag_delta != Vec2::ZERO {
                    controls.rotate(input.drag_delta, viewport_height);
                }
                controls.dolly(input.wheel_delta);
                controls.update(camera);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::approx_eq;

    fn orbit_camera() -> (Camera, OrbitControls) {
        let mut camera = Camera::new(800, 600);
        camera.eye = Vec3::new(0.0, 0.0, 3.0);
        (camera, OrbitControls::new(Vec3::ZERO))
    }

    #[test]
    fn test_follow_trails_unit() {
        let mut camera = Camera::new(800, 600);
        let mut controller = CameraController::Follow { offset: Vec3::new(0.0, 5.0, 10.0) };
        let unit = Vec3::new(1.0, 5.0, -2.0);
        controller.update(&mut camera, Some(unit), &OrbitInput::default(), 600.0);
        assert_eq!(camera.eye, Vec3::new(1.0, 10.0, 8.0));
        assert_eq!(camera.target, unit);
    }

    #[test]
    fn test_idle_orbit_keeps_pose() {
        let (mut camera, mut controls) = orbit_camera();
        controls.update(&mut camera);
        assert!((camera.eye - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-5);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn test_rotation_keeps_distance() {
        let (mut camera, mut controls) = orbit_camera();
        controls.rotate(Vec2::new(150.0, 0.0), 600.0);
        controls.update(&mut camera);
        assert!(approx_eq(camera.eye.length(), 3.0, 1e-5));
        // Quarter turn: dragging right swings the camera towards -X
        assert!(approx_eq(camera.eye.x, -3.0, 1e-4));
        assert!(approx_eq(camera.eye.z, 0.0, 1e-4));
    }

    #[test]
    fn test_polar_angle_is_clamped() {
        let (mut camera, mut controls) = orbit_camera();
        controls.rotate(Vec2::new(0.0, 5000.0), 600.0);
        controls.update(&mut camera);
        assert!(camera.eye.y.is_finite());
        assert!(camera.eye.y > 2.99);
        assert!(approx_eq(camera.eye.length(), 3.0, 1e-4));
    }

    #[test]
    fn test_wheel_zooms() {
        let (mut camera, mut controls) = orbit_camera();
        controls.dolly(-120.0);
        controls.update(&mut camera);
        assert!(approx_eq(camera.eye.length(), 3.0 * 0.95, 1e-5));

        controls.dolly(120.0);
        controls.update(&mut camera);
        assert!(approx_eq(camera.eye.length(), 3.0, 1e-4));
    }

    #[test]
    fn test_distance_limits() {
        let (mut camera, mut controls) = orbit_camera();
        controls.min_distance = 2.9;
        for _ in 0..10 {
            controls.dolly(-1.0);
        }
        controls.update(&mut camera);
        assert!(approx_eq(camera.eye.length(), 2.9, 1e-5));
    }
}
