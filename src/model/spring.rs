use glam::Vec3;
use rapier3d::prelude::{MotorModel, SpringJoint, SpringJointBuilder};

use crate::model::body::to_point;
use crate::model::world::BodyHandle;

/// Damped spring between anchor points on two bodies
#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
}

impl Spring {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, rest_length: f32, stiffness: f32, damping: f32) -> Self {
        Self {
            body_a,
            body_b,
            rest_length,
            stiffness,
            damping,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
        }
    }

    pub fn with_anchors(mut self, local_anchor_a: Vec3, local_anchor_b: Vec3) -> Self {
        self.local_anchor_a = local_anchor_a;
        self.local_anchor_b = local_anchor_b;
        self
    }

    /// Hooke spring (force, not acceleration, proportional to stretch) as a rapier joint
    pub(crate) fn joint(&self) -> SpringJoint {
        SpringJointBuilder::new(self.rest_length, self.stiffness, self.damping)
            .spring_model(MotorModel::ForceBased)
            .local_anchor1(to_point(self.local_anchor_a))
            .local_anchor2(to_point(self.local_anchor_b))
            .build()
    }
}
