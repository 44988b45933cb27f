use glam::Vec3;
use lunaball::config::{Axis, SimulationConfig};
use lunaball::controller::{AppState, DirectionLatch, FrameInput};

const FRAME: f32 = 1.0 / 60.0;

/// The unit alone in empty space, so only key forces move it
fn free_unit() -> SimulationConfig {
    SimulationConfig {
        moon: None,
        spring: None,
        ..SimulationConfig::moon_spring()
    }
}

fn unit_position(app: &AppState) -> Vec3 {
    app.unit_body().map(|body| body.position).unwrap_or(Vec3::NAN)
}

#[test]
fn test_unit_starts_above_the_moon() {
    let app = AppState::new(SimulationConfig::moon_spring(), 800, 600).unwrap();
    assert_eq!(unit_position(&app), Vec3::new(0.0, 5.0, 0.0));
    assert_eq!(app.physics.as_ref().unwrap().world.springs().len(), 1);
}

#[test]
fn test_held_up_key_pushes_along_negative_z() {
    let mut app = AppState::new(free_unit(), 800, 600).unwrap();
    let input = FrameInput::with_latch(DirectionLatch { up: true, ..Default::default() });

    for _ in 0..30 {
        app.advance(FRAME, &input).unwrap();
    }

    let p = unit_position(&app);
    assert!(p.z < -0.01, "unit should drift forward, got {p:?}");
    assert!(p.x.abs() < 1e-4);
    assert!((p.y - 5.0).abs() < 1e-4);
}

#[test]
fn test_held_right_key_pushes_along_positive_x() {
    let mut app = AppState::new(free_unit(), 800, 600).unwrap();
    let input = FrameInput::with_latch(DirectionLatch { right: true, ..Default::default() });

    for _ in 0..30 {
        app.advance(FRAME, &input).unwrap();
    }

    assert!(unit_position(&app).x > 0.01);
}

#[test]
fn test_opposing_keys_cancel() {
    let mut app = AppState::new(free_unit(), 800, 600).unwrap();
    let latch = DirectionLatch { left: true, right: true, ..Default::default() };

    let report = app.advance(FRAME, &FrameInput::with_latch(latch)).unwrap();
    assert_eq!(report.applied_force, Vec3::ZERO);
}

#[test]
fn test_released_keys_apply_no_force() {
    let mut app = AppState::new(free_unit(), 800, 600).unwrap();
    let pressed = FrameInput::with_latch(DirectionLatch { down: true, ..Default::default() });

    let report = app.advance(FRAME, &pressed).unwrap();
    assert!((report.applied_force - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-5);

    let report = app.advance(FRAME, &FrameInput::default()).unwrap();
    assert_eq!(report.applied_force, Vec3::ZERO);
}

#[test]
fn test_mesh_follows_the_body() {
    let mut app = AppState::new(SimulationConfig::moon_gravity(), 800, 600).unwrap();
    for _ in 0..20 {
        app.advance(FRAME, &FrameInput::default()).unwrap();
    }

    let rig = app.physics.as_ref().unwrap();
    let node = app.scene.node(rig.unit_node).unwrap();
    assert_eq!(node.position, unit_position(&app));
    // falling under gravity
    assert!(node.position.y < 8.0);
}

#[test]
fn test_key_force_acts_one_frame_later() {
    let mut app = AppState::new(free_unit(), 800, 600).unwrap();
    let start = unit_position(&app);
    let pressed = FrameInput::with_latch(DirectionLatch { left: true, ..Default::default() });

    let report = app.advance(0.02, &pressed).unwrap();
    assert_eq!(report.substeps, 1);
    assert_eq!(unit_position(&app), start, "the push is only queued during its own frame");

    let report = app.advance(0.02, &FrameInput::default()).unwrap();
    assert_eq!(report.applied_force, Vec3::ZERO);
    let moved = unit_position(&app) - start;
    assert!(moved.x < 0.0, "queued push should move the unit left, got {moved:?}");
    assert!(moved.z.abs() < 1e-6);
}

#[test]
fn test_unit_mesh_synced_when_names_collide() {
    let mut config = SimulationConfig::moon_gravity();
    if let Some(moon) = config.moon.as_mut() {
        moon.name = "unit".to_string();
    }
    let config = SimulationConfig::from_json(&serde_json::to_string(&config).unwrap()).unwrap();
    let mut app = AppState::new(config, 800, 600).unwrap();
    for _ in 0..20 {
        app.advance(FRAME, &FrameInput::default()).unwrap();
    }

    let rig = app.physics.as_ref().unwrap();
    assert_eq!(app.scene.node(rig.unit_node).unwrap().position, unit_position(&app));
    assert!(unit_position(&app).y < 8.0);
    // the moon mesh stays where the moon body is
    assert_eq!(app.scene.nodes[0].position, Vec3::ZERO);
}

#[test]
fn test_stalled_frame_is_clamped() {
    let mut app = AppState::new(SimulationConfig::moon_spring(), 800, 600).unwrap();
    let report = app.advance(1.0, &FrameInput::default()).unwrap();

    assert!((report.dt - 0.1).abs() < 1e-6);
    assert!((5..=6).contains(&report.substeps), "got {} sub-steps", report.substeps);
}

#[test]
fn test_playground_slider_moves_the_vertex() {
    let mut app = AppState::new(SimulationConfig::playground(), 800, 600).unwrap();
    assert!(app.physics.is_none());

    let node = app.gui[0].node;
    let before = app.scene.node(node).unwrap().revision;

    app.set_binding_value(0, 1.25).unwrap();

    assert_eq!(app.scene.vertex_coordinate(node, 0, Axis::X).unwrap(), 1.25);
    assert!(app.scene.node(node).unwrap().revision > before);
    assert_eq!(app.gui[0].value, 1.25);
}

#[test]
fn test_bad_binding_index_is_an_error() {
    let mut app = AppState::new(SimulationConfig::playground(), 800, 600).unwrap();
    assert!(app.set_binding_value(7, 0.0).is_err());
}
