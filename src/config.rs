//! Simulation presets and their overrides.
//!
//! Each demo variant is a [`SimulationConfig`] preset. Native builds pick one
//! with `LUNABALL_VARIANT` or replace it entirely with a JSON file named by
//! `LUNABALL_CONFIG`; the browser build reads `?variant=` from the page URL.

use std::path::Path;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_PATH_VAR: &str = "LUNABALL_CONFIG";
pub const VARIANT_VAR: &str = "LUNABALL_VARIANT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    MoonSpring,
    MoonGravity,
    Playground,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::MoonSpring, Variant::MoonGravity, Variant::Playground];

    pub fn name(&self) -> &'static str {
        match self {
            Variant::MoonSpring => "moon-spring",
            Variant::MoonGravity => "moon-gravity",
            Variant::Playground => "playground",
        }
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Variant::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownVariant(wanted.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Fixed sub-step length (s)
    pub fixed_time_step: f32,
    /// Upper bound for the elapsed time fed into one frame (s)
    pub max_frame_time: f32,
    pub max_sub_steps: u32,
    pub solver_iterations: u32,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            fixed_time_step: 1.0 / 60.0,
            max_frame_time: 0.1,
            max_sub_steps: 10,
            solver_iterations: 10,
            friction: 0.3,
            restitution: 0.0,
            linear_damping: 0.01,
            angular_damping: 0.01,
        }
    }
}

impl PhysicsConfig {
    /// Clamp a measured frame time so a stall never feeds a huge step
    pub fn clamp_frame_time(&self, elapsed: f32) -> f32 {
        elapsed.clamp(0.0, self.max_frame_time)
    }
}

/// A sphere that exists both as a rigid body and as a mesh
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SphereConfig {
    pub name: String,
    pub radius: f32,
    /// kg, zero makes the body static
    pub mass: f32,
    pub position: Vec3,
    pub width_segments: u32,
    pub height_segments: u32,
    pub color: [f32; 3],
    pub texture: Option<String>,
}

/// Spring between the unit (body A) and the moon (body B)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpringConfig {
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CameraMode {
    /// Camera sits at `unit + offset` and looks at the unit
    Follow { offset: Vec3 },
    /// Pointer-driven orbit around `target`
    Orbit { target: Vec3 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub position: Vec3,
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub mode: CameraMode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    /// The light shines from here towards the origin
    pub position: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
    pub ambient: f32,
}

/// Static box mesh without a rigid body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropConfig {
    pub name: String,
    pub size: Vec3,
    pub position: Vec3,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// GUI slider bound to one coordinate of one vertex of a prop mesh
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexBindingConfig {
    pub label: String,
    pub prop: usize,
    pub vertex: usize,
    pub axis: Axis,
    pub min: f32,
    pub max: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub variant: Variant,
    pub physics: PhysicsConfig,
    pub moon: Option<SphereConfig>,
    /// The player-controlled body; no unit means no physics world at all
    pub unit: Option<SphereConfig>,
    pub spring: Option<SpringConfig>,
    /// N, per pressed direction key
    pub force_magnitude: f32,
    pub camera: CameraConfig,
    pub light: LightConfig,
    #[serde(default)]
    pub props: Vec<PropConfig>,
    #[serde(default)]
    pub gui: Vec<VertexBindingConfig>,
    pub background: [f32; 3],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::moon_spring()
    }
}

fn default_light() -> LightConfig {
    LightConfig {
        position: Vec3::new(0.0, 10.0, 10.0),
        color: [1.0, 1.0, 1.0],
        intensity: 1.0,
        ambient: 0.0,
    }
}

fn moon(radius: f32) -> SphereConfig {
    SphereConfig {
        name: "moon".to_string(),
        radius,
        mass: 0.0,
        position: Vec3::ZERO,
        width_segments: 32,
        height_segments: 32,
        color: [1.0, 1.0, 1.0],
        texture: Some("img/moon_map.jpg".to_string()),
    }
}

fn unit(radius: f32, position: Vec3) -> SphereConfig {
    SphereConfig {
        name: "unit".to_string(),
        radius,
        mass: 1.0,
        position,
        width_segments: 8,
        height_segments: 8,
        color: [1.0, 0.0, 0.0],
        texture: None,
    }
}

impl SimulationConfig {
    pub fn preset(variant: Variant) -> Self {
        match variant {
            Variant::MoonSpring => Self::moon_spring(),
            Variant::MoonGravity => Self::moon_gravity(),
            Variant::Playground => Self::playground(),
        }
    }

    /// Zero gravity, the unit is tied to the moon by a spring and the camera trails it
    pub fn moon_spring() -> Self {
        Self {
            variant: Variant::MoonSpring,
            physics: PhysicsConfig::default(),
            moon: Some(moon(4.0)),
            unit: Some(unit(0.3, Vec3::new(0.0, 5.0, 0.0))),
            spring: Some(SpringConfig {
                rest_length: 0.0,
                stiffness: 1.0,
                damping: 0.1,
                local_anchor_a: Vec3::ZERO,
                local_anchor_b: Vec3::ZERO,
            }),
            force_magnitude: 10.0,
            camera: CameraConfig {
                position: Vec3::new(0.0, 5.0, 10.0),
                fov_y_degrees: 75.0,
                z_near: 0.1,
                z_far: 1000.0,
                mode: CameraMode::Follow { offset: Vec3::new(0.0, 5.0, 10.0) },
            },
            light: default_light(),
            props: Vec::new(),
            gui: Vec::new(),
            background: [0.0, 0.0, 0.0],
        }
    }

    /// Downward gravity, no spring, free orbit camera
    pub fn moon_gravity() -> Self {
        Self {
            variant: Variant::MoonGravity,
            physics: PhysicsConfig {
                gravity: Vec3::new(0.0, -9.82, 0.0),
                ..PhysicsConfig::default()
            },
            moon: Some(moon(5.0)),
            unit: Some(unit(0.5, Vec3::new(0.0, 8.0, 0.0))),
            spring: None,
            camera: CameraConfig {
                position: Vec3::new(0.0, 5.0, 15.0),
                mode: CameraMode::Orbit { target: Vec3::ZERO },
                ..Self::moon_spring().camera
            },
            ..Self::moon_spring()
        }
    }

    /// No physics: a box whose corner can be dragged around from the GUI
    pub fn playground() -> Self {
        Self {
            variant: Variant::Playground,
            physics: PhysicsConfig::default(),
            moon: None,
            unit: None,
            spring: None,
            force_magnitude: 0.0,
            camera: CameraConfig {
                position: Vec3::new(0.0, 0.0, 3.0),
                fov_y_degrees: 75.0,
                z_near: 0.1,
                z_far: 1000.0,
                mode: CameraMode::Orbit { target: Vec3::ZERO },
            },
            light: LightConfig {
                ambient: 0.2,
                ..default_light()
            },
            props: vec![PropConfig {
                name: "box".to_string(),
                size: Vec3::ONE,
                position: Vec3::ZERO,
                color: [0.0, 1.0, 0.0],
            }],
            gui: vec![VertexBindingConfig {
                label: "vertex x".to_string(),
                prop: 0,
                vertex: 0,
                axis: Axis::X,
                min: -2.0,
                max: 2.0,
            }],
            background: [0.0, 0.0, 0.0],
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Build the config from environment variables.
    ///
    /// - `LUNABALL_CONFIG`: path to a JSON config, wins over everything else
    /// - `LUNABALL_VARIANT`: preset name, `moon-spring` when absent
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return Self::load_file(Path::new(&path));
        }
        let variant = match std::env::var(VARIANT_VAR) {
            Ok(raw) => raw.parse::<Variant>()?,
            Err(_) => Variant::MoonSpring,
        };
        Ok(Self::preset(variant))
    }

    /// Pick a preset from a URL query string such as `?variant=playground`
    pub fn from_query(search: &str) -> Result<Self, ConfigError> {
        let variant = search
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "variant")
            .map(|(_, value)| value.parse::<Variant>())
            .transpose()?
            .unwrap_or(Variant::MoonSpring);
        Ok(Self::preset(variant))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.physics;
        if p.fixed_time_step <= 0.0 {
            return Err(ConfigError::Invalid("fixed_time_step must be greater than 0".into()));
        }
        if p.max_frame_time <= 0.0 {
            return Err(ConfigError::Invalid("max_frame_time must be greater than 0".into()));
        }
        if p.max_sub_steps == 0 {
            return Err(ConfigError::Invalid("max_sub_steps must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&p.linear_damping) || !(0.0..=1.0).contains(&p.angular_damping) {
            return Err(ConfigError::Invalid("damping must be within [0, 1]".into()));
        }

        for sphere in self.moon.iter().chain(self.unit.iter()) {
            if sphere.radius <= 0.0 {
                return Err(ConfigError::Invalid(format!("`{}` radius must be greater than 0", sphere.name)));
            }
            if sphere.mass < 0.0 {
                return Err(ConfigError::Invalid(format!("`{}` mass must not be negative", sphere.name)));
            }
            if sphere.width_segments < 3 || sphere.height_segments < 2 {
                return Err(ConfigError::Invalid(format!("`{}` needs at least 3x2 segments", sphere.name)));
            }
        }
        if let Some(unit) = &self.unit {
            if unit.mass <= 0.0 {
                return Err(ConfigError::Invalid("the unit must be a dynamic body (mass > 0)".into()));
            }
        }
        if self.spring.is_some() && (self.moon.is_none() || self.unit.is_none()) {
            return Err(ConfigError::Invalid("a spring needs both a moon and a unit".into()));
        }
        if matches!(self.camera.mode, CameraMode::Follow { .. }) && self.unit.is_none() {
            return Err(ConfigError::Invalid("follow camera needs a unit to follow".into()));
        }
        if self.camera.z_near <= 0.0 || self.camera.z_far <= self.camera.z_near {
            return Err(ConfigError::Invalid("camera needs 0 < z_near < z_far".into()));
        }

        for binding in &self.gui {
            if binding.prop >= self.props.len() {
                return Err(ConfigError::Invalid(format!(
                    "gui binding `{}` points at prop {} but only {} exist",
                    binding.label,
                    binding.prop,
                    self.props.len()
                )));
            }
            if binding.min >= binding.max {
                return Err(ConfigError::Invalid(format!("gui binding `{}` has an empty range", binding.label)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for variant in Variant::ALL {
            let config = SimulationConfig::preset(variant);
            assert!(config.validate().is_ok(), "{} preset should be valid", variant.name());
            assert_eq!(config.variant, variant);
        }
    }

    #[test]
    fn test_moon_spring_literals() {
        let config = SimulationConfig::moon_spring();
        let unit = config.unit.as_ref().unwrap();
        assert_eq!(unit.position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(unit.radius, 0.3);
        assert_eq!(unit.mass, 1.0);
        assert_eq!(config.moon.as_ref().unwrap().mass, 0.0);
        assert_eq!(config.physics.gravity, Vec3::ZERO);
        assert_eq!(config.force_magnitude, 10.0);
        assert_eq!(config.spring.as_ref().unwrap().stiffness, 1.0);
    }

    #[test]
    fn test_clamp_frame_time() {
        let physics = PhysicsConfig::default();
        assert_eq!(physics.clamp_frame_time(1.0), 0.1);
        assert_eq!(physics.clamp_frame_time(0.016), 0.016);
        assert_eq!(physics.clamp_frame_time(-0.5), 0.0);
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("moon-gravity".parse::<Variant>().unwrap(), Variant::MoonGravity);
        assert_eq!(" Playground ".parse::<Variant>().unwrap(), Variant::Playground);
        assert!(matches!("mars".parse::<Variant>(), Err(ConfigError::UnknownVariant(_))));
    }

    #[test]
    fn test_from_query() {
        let config = SimulationConfig::from_query("?foo=1&variant=playground").unwrap();
        assert_eq!(config.variant, Variant::Playground);
        assert_eq!(SimulationConfig::from_query("").unwrap().variant, Variant::MoonSpring);
        assert!(SimulationConfig::from_query("?variant=nope").is_err());
    }

    #[test]
    fn test_json_override() {
        let mut config = SimulationConfig::moon_gravity();
        config.force_magnitude = 25.0;
        let raw = serde_json::to_string(&config).unwrap();
        let parsed = SimulationConfig::from_json(&raw).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_invalid() {
        let mut config = SimulationConfig::moon_spring();
        config.physics.fixed_time_step = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::moon_spring();
        config.moon = None;
        assert!(config.validate().is_err(), "spring without a moon");

        let mut config = SimulationConfig::moon_spring();
        config.unit.as_mut().unwrap().mass = 0.0;
        assert!(config.validate().is_err(), "static unit");

        let mut config = SimulationConfig::playground();
        config.gui[0].prop = 3;
        assert!(config.validate().is_err(), "binding to a missing prop");

        let mut config = SimulationConfig::playground();
        config.gui[0].min = 1.0;
        config.gui[0].max = 1.0;
        assert!(config.validate().is_err(), "empty slider range");

        assert!(SimulationConfig::from_json("{ not json").is_err());
    }
}
