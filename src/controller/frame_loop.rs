use std::collections::VecDeque;

use glam::Vec3;
use tracing::{debug, info};

use crate::config::{Axis, SimulationConfig};
use crate::controller::camera_controller::CameraController;
use crate::controller::input::FrameInput;
use crate::error::SimError;
use crate::model::{BodyHandle, BodyState, Camera, NodeId, PhysicsWorld, Scene, SceneLayout, SphereBody, Spring};

/// Physics side of a variant: the world and where the unit lives in it and in the scene
pub struct PhysicsRig {
    pub world: PhysicsWorld,
    pub unit: BodyHandle,
    pub unit_node: NodeId,
    pub moon: Option<BodyHandle>,
}

/// What one call to [`AppState::advance`] did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    /// Elapsed time after clamping (s)
    pub dt: f32,
    pub substeps: u32,
    /// Net input force queued on the unit this frame, world frame (N)
    pub applied_force: Vec3,
    pub unit_position: Option<Vec3>,
}

/// Rolling frame-time average for the debug overlay
pub struct FrameStats {
    frame_times: VecDeque<f32>,
    max_frames: usize,
    pub frames: u64,
}

impl FrameStats {
    pub fn new(max_frames: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_frames),
            max_frames: max_frames.max(1),
            frames: 0,
        }
    }

    pub fn record(&mut self, elapsed: f32) {
        self.frames += 1;
        self.frame_times.push_back(elapsed);
        if self.frame_times.len() > self.max_frames {
            self.frame_times.pop_front();
        }
    }

    pub fn fps(&self) -> f32 {
        let total: f32 = self.frame_times.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.frame_times.len() as f32 / total
    }
}

/// Turns monotonic millisecond timestamps (`performance.now()` or `Instant`) into frame deltas
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
}

impl FrameClock {
    /// Seconds since the previous tick; the first tick returns 0
    pub fn tick(&mut self, now_ms: f64) -> f32 {
        let elapsed = match self.last_ms {
            Some(last) => ((now_ms - last) / 1000.0).max(0.0) as f32,
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        elapsed
    }
}

/// Slider attached to one coordinate of one mesh vertex
#[derive(Debug, Clone)]
pub struct GuiBinding {
    pub label: String,
    pub node: NodeId,
    pub vertex: usize,
    pub axis: Axis,
    pub min: f32,
    pub max: f32,
    pub value: f32,
}

/// Whole application state, advanced once per frame by the front end
pub struct AppState {
    pub config: SimulationConfig,
    pub scene: Scene,
    pub physics: Option<PhysicsRig>,
    pub camera: Camera,
    pub camera_controller: CameraController,
    pub gui: Vec<GuiBinding>,
    pub stats: FrameStats,
    pub last_report: FrameReport,
    viewport: (u32, u32),
}

impl AppState {
    pub fn new(config: SimulationConfig, width: u32, height: u32) -> Result<Self, SimError> {
        config.validate()?;

        let (scene, layout) = Scene::build(&config);
        let physics = build_physics(&config, &layout)?;

        let mut gui = Vec::with_capacity(config.gui.len());
        for binding in &config.gui {
            let node = *layout.props.get(binding.prop).ok_or(SimError::UnknownNode(binding.prop))?;
            let value = scene.vertex_coordinate(node, binding.vertex, binding.axis)?;
            gui.push(GuiBinding {
                label: binding.label.clone(),
                node,
                vertex: binding.vertex,
                axis: binding.axis,
                min: binding.min,
                max: binding.max,
                value,
            });
        }

        let mut camera = Camera::from_config(&config.camera, width, height);
        let mut camera_controller = CameraController::from_mode(&config.camera.mode);
        let unit_position = physics.as_ref().map(|rig| scene.nodes[rig.unit_node.0].position);
        camera_controller.update(&mut camera, unit_position, &Default::default(), height as f32);

        info!(
            variant = config.variant.name(),
            bodies = physics.as_ref().map_or(0, |rig| rig.world.body_count()),
            nodes = scene.nodes.len(),
            "simulation ready"
        );

        Ok(Self {
            config,
            scene,
            physics,
            camera,
            camera_controller,
            gui,
            stats: FrameStats::new(60),
            last_report: FrameReport::default(),
            viewport: (width, height),
        })
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.camera.set_aspect(width, height);
    }

    pub fn unit_body(&self) -> Option<BodyState> {
        let rig = self.physics.as_ref()?;
        rig.world.body(rig.unit).ok()
    }

    /// One frame: clamp time, step physics, queue key forces, sync the mesh, move the camera.
    ///
    /// Forces queued here act during the next frame's sub-steps.
    pub fn advance(&mut self, elapsed: f32, input: &FrameInput) -> Result<FrameReport, SimError> {
        let dt = self.config.physics.clamp_frame_time(elapsed);
        let mut report = FrameReport { dt, ..FrameReport::default() };

        if let Some(rig) = &mut self.physics {
            report.substeps = rig.world.step(self.config.physics.fixed_time_step, dt);

            let local_force = input.latch.local_force(self.config.force_magnitude);
            report.applied_force = rig.world.apply_local_force(rig.unit, local_force)?;

            let position = rig.world.body(rig.unit)?.position;
            self.scene.node_mut(rig.unit_node)?.position = position;
            report.unit_position = Some(position);
        }

        let viewport_height = self.viewport.1 as f32;
        self.camera_controller
            .update(&mut self.camera, report.unit_position, &input.orbit, viewport_height);

        self.stats.record(elapsed.max(0.0));
        self.last_report = report;
        Ok(report)
    }

    /// Move a bound vertex to `value`, clamped to the slider range
    pub fn set_binding_value(&mut self, index: usize, value: f32) -> Result<(), SimError> {
        let binding = self.gui.get_mut(index).ok_or(SimError::UnknownBinding(index))?;
        binding.value = value.clamp(binding.min, binding.max);
        debug!(label = %binding.label, value = binding.value, "gui binding changed");
        self.scene
            .set_vertex_coordinate(binding.node, binding.vertex, binding.axis, binding.value)
    }
}

fn build_physics(config: &SimulationConfig, layout: &SceneLayout) -> Result<Option<PhysicsRig>, SimError> {
    let (Some(unit_config), Some(unit_node)) = (&config.unit, layout.unit) else {
        return Ok(None);
    };
    let p = &config.physics;
    let mut world = PhysicsWorld::from_config(p);

    let moon = config.moon.as_ref().map(|moon| {
        world.add_body(
            SphereBody::new(moon.radius, moon.mass)
                .with_position(moon.position)
                .with_damping(p.linear_damping, p.angular_damping),
        )
    });
    let unit = world.add_body(
        SphereBody::new(unit_config.radius, unit_config.mass)
            .with_position(unit_config.position)
            .with_damping(p.linear_damping, p.angular_damping),
    );

    if let (Some(spring), Some(moon)) = (&config.spring, moon) {
        world.add_spring(
            Spring::new(unit, moon, spring.rest_length, spring.stiffness, spring.damping)
                .with_anchors(spring.local_anchor_a, spring.local_anchor_b),
        )?;
    }

    Ok(Some(PhysicsRig {
        world,
        unit,
        unit_node,
        moon,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::DirectionLatch;
    use crate::utils::approx_eq;

    #[test]
    fn test_frame_clock() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.tick(1000.0), 0.0);
        assert!(approx_eq(clock.tick(1016.0), 0.016, 1e-6));
        // clocks never run backwards, but a bad timestamp must not produce negative time
        assert_eq!(clock.tick(900.0), 0.0);
    }

    #[test]
    fn test_fps_average() {
        let mut stats = FrameStats::new(4);
        assert_eq!(stats.fps(), 0.0);
        for _ in 0..10 {
            stats.record(0.02);
        }
        assert!(approx_eq(stats.fps(), 50.0, 1e-3));
        assert_eq!(stats.frames, 10);
    }

    #[test]
    fn test_spring_variant_wiring() {
        let app = AppState::new(SimulationConfig::moon_spring(), 800, 600).unwrap();
        let rig = app.physics.as_ref().unwrap();
        assert_eq!(rig.world.body_count(), 2);
        assert_eq!(rig.world.springs().len(), 1);
        assert!(rig.world.body(rig.moon.unwrap()).unwrap().is_static);
        // follow camera is placed before the first frame
        assert_eq!(app.camera.eye, Vec3::new(0.0, 10.0, 10.0));
        assert_eq!(app.camera.target, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_playground_has_no_physics() {
        let mut app = AppState::new(SimulationConfig::playground(), 800, 600).unwrap();
        assert!(app.physics.is_none());
        let report = app.advance(1.0 / 60.0, &FrameInput::with_latch(DirectionLatch { up: true, ..Default::default() })).unwrap();
        assert_eq!(report.substeps, 0);
        assert_eq!(report.applied_force, Vec3::ZERO);
        assert_eq!(report.unit_position, None);
    }

    #[test]
    fn test_binding_value_is_clamped() {
        let mut app = AppState::new(SimulationConfig::playground(), 800, 600).unwrap();
        assert_eq!(app.gui[0].value, 0.5);
        app.set_binding_value(0, 10.0).unwrap();
        assert_eq!(app.gui[0].value, 2.0);
        let node = app.gui[0].node;
        assert_eq!(app.scene.nodes[node.0].mesh.vertices[0].pos[0], 2.0);
        assert!(matches!(app.set_binding_value(3, 0.0), Err(SimError::UnknownBinding(3))));
    }

    #[test]
    fn test_negative_elapsed_is_clamped_to_zero() {
        let mut app = AppState::new(SimulationConfig::moon_gravity(), 800, 600).unwrap();
        let report = app.advance(-5.0, &FrameInput::default()).unwrap();
        assert_eq!(report.dt, 0.0);
        assert_eq!(report.substeps, 0);
        assert_eq!(report.unit_position, Some(Vec3::new(0.0, 8.0, 0.0)));
    }
}
