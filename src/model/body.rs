use glam::{Quat, Vec3};
use rapier3d::prelude::{
    point, vector, Collider, ColliderBuilder, Point, Real, RigidBody, RigidBodyBuilder, Rotation, Vector,
};

use crate::model::world::ContactMaterial;

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn to_point(v: Vec3) -> Point<Real> {
    point![v.x, v.y, v.z]
}

pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn from_rotation(r: &Rotation<Real>) -> Quat {
    let c = r.coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

/// Per-second velocity loss `d` (velocity scales by `(1 - d)^dt`) as a rapier damping coefficient
pub(crate) fn damping_coefficient(d: f32) -> f32 {
    -(1.0 - d.clamp(0.0, 1.0)).max(f32::EPSILON).ln()
}

/// A sphere to be added to a [`crate::model::PhysicsWorld`].
///
/// Mass zero makes a fixed body that never moves.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereBody {
    pub radius: f32,
    pub mass: f32,
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl SphereBody {
    pub fn new(radius: f32, mass: f32) -> Self {
        Self {
            radius,
            mass: mass.max(0.0),
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_damping: 0.01,
            angular_damping: 0.01,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    pub(crate) fn rigid_body(&self) -> RigidBody {
        let (axis, angle) = self.orientation.normalize().to_axis_angle();
        let builder = if self.is_static() {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
                .linear_damping(damping_coefficient(self.linear_damping))
                .angular_damping(damping_coefficient(self.angular_damping))
                // a resting unit must still react to the next key press
                .can_sleep(false)
        };
        builder
            .translation(to_vector(self.position))
            .rotation(to_vector(axis * angle))
            .build()
    }

    pub(crate) fn collider(&self, material: ContactMaterial) -> Collider {
        let builder = ColliderBuilder::ball(self.radius)
            .friction(material.friction)
            .restitution(material.restitution);
        if self.is_static() { builder.build() } else { builder.mass(self.mass).build() }
    }
}

/// Body state read back from the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub is_static: bool,
}

impl BodyState {
    pub(crate) fn from_rapier(body: &RigidBody) -> Self {
        Self {
            position: from_vector(body.translation()),
            orientation: from_rotation(body.rotation()),
            velocity: from_vector(body.linvel()),
            angular_velocity: from_vector(body.angvel()),
            is_static: body.is_fixed(),
        }
    }

    pub fn vector_to_world(&self, local: Vec3) -> Vec3 {
        self.orientation * local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::approx_eq;

    #[test]
    fn test_massless_sphere_is_fixed() {
        let moon = SphereBody::new(4.0, 0.0);
        assert!(moon.is_static());
        assert!(moon.rigid_body().is_fixed());
        assert!(SphereBody::new(0.3, 1.0).rigid_body().is_dynamic());
        assert!(!SphereBody::new(0.3, -2.0).rigid_body().is_dynamic());
    }

    #[test]
    fn test_pose_reaches_rapier() {
        let turned = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let body = SphereBody::new(0.3, 1.0)
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_orientation(turned)
            .rigid_body();
        let state = BodyState::from_rapier(&body);
        assert_eq!(state.position, Vec3::new(1.0, 2.0, 3.0));
        assert!(state.orientation.angle_between(turned) < 1e-4);
        // forward (-Z) turns into -X
        assert!(state.vector_to_world(Vec3::NEG_Z).distance(Vec3::NEG_X) < 1e-5);
    }

    #[test]
    fn test_damping_coefficient() {
        assert_eq!(damping_coefficient(0.0), 0.0);
        // one second at the coefficient loses the configured share
        let c = damping_coefficient(0.01);
        assert!(approx_eq((-c).exp(), 0.99, 1e-6));
        assert!(damping_coefficient(1.0).is_finite());
    }
}
