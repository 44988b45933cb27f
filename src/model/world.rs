use std::num::NonZeroUsize;

use glam::Vec3;
use rapier3d::prelude::{
    CCDSolver, ColliderSet, DefaultBroadPhase, ImpulseJointSet, IntegrationParameters, IslandManager,
    MultibodyJointSet, NarrowPhase, PhysicsPipeline, RigidBodyHandle, RigidBodySet,
};
use tracing::{trace, warn};

use crate::config::PhysicsConfig;
use crate::error::SimError;
use crate::model::body::{from_rotation, to_vector, BodyState, SphereBody};
use crate::model::spring::Spring;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

/// Surface properties given to every collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self { friction: 0.3, restitution: 0.0 }
    }
}

/// rapier world stepped in fixed sub-steps
pub struct PhysicsWorld {
    pub gravity: Vec3,
    pub contact_material: ContactMaterial,
    pub solver_iterations: u32,
    pub max_sub_steps: u32,
    handles: Vec<RigidBodyHandle>,
    springs: Vec<Spring>,

    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    pipeline: PhysicsPipeline,

    accumulator: f32,
    time: f32,
    step_count: u64,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            contact_material: ContactMaterial::default(),
            solver_iterations: 10,
            max_sub_steps: 10,
            handles: Vec::new(),
            springs: Vec::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            pipeline: PhysicsPipeline::new(),
            accumulator: 0.0,
            time: 0.0,
            step_count: 0,
        }
    }

    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            contact_material: ContactMaterial {
                friction: config.friction,
                restitution: config.restitution,
            },
            solver_iterations: config.solver_iterations,
            max_sub_steps: config.max_sub_steps,
            ..Self::new(config.gravity)
        }
    }

    /// Insert a sphere; its collider takes the current contact material
    pub fn add_body(&mut self, body: SphereBody) -> BodyHandle {
        let handle = self.bodies.insert(body.rigid_body());
        self.colliders
            .insert_with_parent(body.collider(self.contact_material), handle, &mut self.bodies);
        self.handles.push(handle);
        BodyHandle(self.handles.len() - 1)
    }

    /// Join two bodies with a spring joint; contacts between them stay enabled
    pub fn add_spring(&mut self, spring: Spring) -> Result<(), SimError> {
        let a = self.handle(spring.body_a)?;
        let b = self.handle(spring.body_b)?;
        if a == b {
            return Err(SimError::UnknownBody(spring.body_b.0));
        }
        self.impulse_joints.insert(a, b, spring.joint(), true);
        self.springs.push(spring);
        Ok(())
    }

    fn handle(&self, handle: BodyHandle) -> Result<RigidBodyHandle, SimError> {
        self.handles.get(handle.0).copied().ok_or(SimError::UnknownBody(handle.0))
    }

    pub fn body(&self, handle: BodyHandle) -> Result<BodyState, SimError> {
        let body = self.bodies.get(self.handle(handle)?).ok_or(SimError::UnknownBody(handle.0))?;
        Ok(BodyState::from_rapier(body))
    }

    pub fn body_count(&self) -> usize {
        self.handles.len()
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), SimError> {
        let rapier_handle = self.handle(handle)?;
        let body = self.bodies.get_mut(rapier_handle).ok_or(SimError::UnknownBody(handle.0))?;
        body.set_linvel(to_vector(velocity), true);
        Ok(())
    }

    /// Queue a force given in the body frame, acting at the centre of mass.
    ///
    /// The force acts for the next sub-step only. Returns it in world space.
    pub fn apply_local_force(&mut self, handle: BodyHandle, local_force: Vec3) -> Result<Vec3, SimError> {
        let rapier_handle = self.handle(handle)?;
        let body = self.bodies.get_mut(rapier_handle).ok_or(SimError::UnknownBody(handle.0))?;
        let force = from_rotation(body.rotation()) * local_force;
        if force != Vec3::ZERO {
            body.add_force(to_vector(force), true);
        }
        Ok(force)
    }

    /// Real time fed to [`Self::step`] so far (s)
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Time carried over to the next call (always below one sub-step)
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Advance by `elapsed` seconds of real time in sub-steps of `fixed_dt`.
    ///
    /// Leftover time is kept for the next call; at most `max_sub_steps`
    /// sub-steps run, anything beyond that is dropped. Returns the number of
    /// sub-steps taken.
    pub fn step(&mut self, fixed_dt: f32, elapsed: f32) -> u32 {
        if fixed_dt <= 0.0 {
            warn!(fixed_dt, "ignoring physics step with non-positive sub-step");
            return 0;
        }

        let elapsed = elapsed.max(0.0);
        self.time += elapsed;
        self.accumulator += elapsed;
        let mut substeps = 0;
        while self.accumulator >= fixed_dt && substeps < self.max_sub_steps {
            self.internal_step(fixed_dt);
            self.accumulator -= fixed_dt;
            substeps += 1;
        }
        self.accumulator %= fixed_dt;

        substeps
    }

    /// One fixed sub-step; queued forces are cleared afterwards
    pub fn internal_step(&mut self, dt: f32) {
        let mut params = IntegrationParameters::default();
        params.dt = dt;
        if let Some(iterations) = NonZeroUsize::new(self.solver_iterations as usize) {
            params.num_solver_iterations = iterations;
        }

        self.pipeline.step(
            &to_vector(self.gravity),
            &params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );

        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }

        self.step_count += 1;
        trace!(step = self.step_count, "physics sub-step");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::approx_eq;
    use glam::Quat;

    const DT: f32 = 1.0 / 60.0;

    fn moon_and_unit(gravity: Vec3) -> (PhysicsWorld, BodyHandle, BodyHandle) {
        let mut world = PhysicsWorld::new(gravity);
        let moon = world.add_body(SphereBody::new(4.0, 0.0));
        let unit = world.add_body(SphereBody::new(0.3, 1.0).with_position(Vec3::new(0.0, 5.0, 0.0)));
        (world, moon, unit)
    }

    #[test]
    fn test_step_uses_fixed_substeps() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        assert_eq!(world.step(DT, DT * 1.5), 1);
        assert_eq!(world.step(DT, DT * 0.25), 0);
        assert_eq!(world.step(DT, DT * 0.5), 1);
        assert_eq!(world.step_count(), 2);
        assert!(world.accumulator() < DT);
    }

    #[test]
    fn test_step_caps_substeps() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        assert_eq!(world.step(DT, 1.0), 10);
        assert!(world.accumulator() < DT);
    }

    #[test]
    fn test_time_follows_elapsed() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        for _ in 0..3 {
            world.step(DT, 0.01);
        }
        assert!(approx_eq(world.time(), 0.03, 1e-6));
        assert_eq!(world.step_count(), 1);
        // negative time is ignored
        world.step(DT, -1.0);
        assert!(approx_eq(world.time(), 0.03, 1e-6));
    }

    #[test]
    fn test_free_fall() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.82, 0.0));
        let ball = world.add_body(
            SphereBody::new(0.5, 1.0)
                .with_position(Vec3::new(0.0, 10.0, 0.0))
                .with_damping(0.0, 0.0),
        );
        for _ in 0..60 {
            world.internal_step(DT);
        }
        let body = world.body(ball).unwrap();
        let dropped = 10.0 - body.position.y;
        // 0.5 * g * t^2 = 4.91; integrating with the updated velocity overshoots slightly
        assert!(dropped > 4.85 && dropped < 5.05, "dropped {dropped}");
        assert!(approx_eq(body.velocity.y, -9.82, 1e-2));
    }

    #[test]
    fn test_force_lasts_one_substep() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let ball = world.add_body(SphereBody::new(0.5, 2.0).with_damping(0.0, 0.0));
        let world_force = world.apply_local_force(ball, Vec3::new(0.0, 0.0, -12.0)).unwrap();
        assert_eq!(world_force, Vec3::new(0.0, 0.0, -12.0));

        world.internal_step(DT);
        let after_first = world.body(ball).unwrap().velocity;
        // a = F / m for one sub-step
        assert!(approx_eq(after_first.z, -6.0 * DT, 1e-4));

        world.internal_step(DT);
        assert!(approx_eq(world.body(ball).unwrap().velocity.z, after_first.z, 1e-6));
    }

    #[test]
    fn test_local_force_follows_orientation() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let turned = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let ball = world.add_body(SphereBody::new(0.5, 1.0).with_orientation(turned));
        let force = world.apply_local_force(ball, Vec3::new(0.0, 0.0, -10.0)).unwrap();
        assert!(force.distance(Vec3::new(-10.0, 0.0, 0.0)) < 1e-4);
    }

    #[test]
    fn test_static_moon_never_moves() {
        let (mut world, moon, unit) = moon_and_unit(Vec3::new(0.0, -9.82, 0.0));
        world.add_spring(Spring::new(unit, moon, 0.0, 1.0, 0.1)).unwrap();
        for _ in 0..240 {
            world.step(DT, DT);
        }
        let moon = world.body(moon).unwrap();
        assert!(moon.is_static);
        assert_eq!(moon.position, Vec3::ZERO);
        assert_eq!(moon.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_unit_lands_on_moon() {
        let (mut world, moon, unit) = moon_and_unit(Vec3::new(0.0, -9.82, 0.0));
        for _ in 0..120 {
            world.internal_step(DT);
        }
        let distance = world.body(unit).unwrap().position.distance(world.body(moon).unwrap().position);
        assert!(distance > 4.3 - 0.05, "unit sank into the moon: {distance}");
        assert!(distance < 4.4, "unit should rest on the surface: {distance}");
    }

    #[test]
    fn test_spring_pulls_unit_onto_surface() {
        let (mut world, moon, unit) = moon_and_unit(Vec3::ZERO);
        world.add_spring(Spring::new(unit, moon, 0.0, 1.0, 0.1)).unwrap();
        for _ in 0..600 {
            world.internal_step(DT);
        }
        let distance = world.body(unit).unwrap().position.length();
        assert!(distance < 4.6, "spring should pull the unit in: {distance}");
        assert!(distance > 4.25, "unit sank into the moon: {distance}");
    }

    #[test]
    fn test_restitution_bounces() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        world.contact_material.restitution = 1.0;
        world.add_body(SphereBody::new(1.0, 0.0));
        let ball = world.add_body(
            SphereBody::new(0.5, 1.0)
                .with_position(Vec3::new(0.0, 2.0, 0.0))
                .with_damping(0.0, 0.0),
        );
        world.set_velocity(ball, Vec3::new(0.0, -6.0, 0.0)).unwrap();
        for _ in 0..30 {
            world.internal_step(DT);
        }
        assert!(world.body(ball).unwrap().velocity.y > 3.0);
    }

    #[test]
    fn test_rejects_bad_springs() {
        let (mut world, moon, _) = moon_and_unit(Vec3::ZERO);
        assert!(matches!(
            world.add_spring(Spring::new(moon, BodyHandle(7), 0.0, 1.0, 0.0)),
            Err(SimError::UnknownBody(7))
        ));
        assert!(world.add_spring(Spring::new(moon, moon, 0.0, 1.0, 0.0)).is_err());
        assert!(world.springs().is_empty());
        assert!(world.body(BodyHandle(9)).is_err());
    }
}
