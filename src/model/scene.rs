use glam::{Mat4, Quat, Vec3};

use crate::config::{Axis, LightConfig, PropConfig, SimulationConfig, SphereConfig};
use crate::error::SimError;
use crate::utils::{box_mesh, sphere_mesh, Mesh};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: [f32; 3],
    /// Image path relative to the asset root; `None` renders untextured
    pub texture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub mesh: Mesh,
    pub position: Vec3,
    pub orientation: Quat,
    pub material: Material,
    /// Bumped on every geometry edit so the renderer knows to re-upload
    pub revision: u64,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, mesh: Mesh, material: Material) -> Self {
        Self {
            name: name.into(),
            mesh,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            material,
            revision: 0,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
    pub ambient: f32,
}

impl DirectionalLight {
    /// Unit vector pointing from the surface towards the light (light shines at the origin)
    pub fn direction(&self) -> Vec3 {
        let dir = self.position.normalize_or_zero();
        if dir == Vec3::ZERO { Vec3::Y } else { dir }
    }
}

impl From<&LightConfig> for DirectionalLight {
    fn from(config: &LightConfig) -> Self {
        Self {
            position: config.position,
            color: config.color,
            intensity: config.intensity,
            ambient: config.ambient,
        }
    }
}

/// Node ids handed out by [`Scene::build`]; names need not be unique
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLayout {
    pub moon: Option<NodeId>,
    pub unit: Option<NodeId>,
    pub props: Vec<NodeId>,
}

pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub light: DirectionalLight,
    pub background: [f32; 3],
}

impl Scene {
    pub fn new(light: DirectionalLight, background: [f32; 3]) -> Self {
        Self {
            nodes: Vec::new(),
            light,
            background,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::build(config).0
    }

    /// Spheres first (moon, unit), then props in config order, plus the id of each
    pub fn build(config: &SimulationConfig) -> (Self, SceneLayout) {
        let mut scene = Self::new(DirectionalLight::from(&config.light), config.background);
        let layout = SceneLayout {
            moon: config.moon.as_ref().map(|moon| scene.add_sphere(moon)),
            unit: config.unit.as_ref().map(|unit| scene.add_sphere(unit)),
            props: config.props.iter().map(|prop| scene.add_prop(prop)).collect(),
        };
        (scene, layout)
    }

    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_sphere(&mut self, sphere: &SphereConfig) -> NodeId {
        let mesh = sphere_mesh(sphere.radius, sphere.width_segments, sphere.height_segments);
        let material = Material {
            color: sphere.color,
            texture: sphere.texture.clone(),
        };
        let mut node = SceneNode::new(&sphere.name, mesh, material);
        node.position = sphere.position;
        self.add_node(node)
    }

    pub fn add_prop(&mut self, prop: &PropConfig) -> NodeId {
        let material = Material {
            color: prop.color,
            texture: None,
        };
        let mut node = SceneNode::new(&prop.name, box_mesh(prop.size), material);
        node.position = prop.position;
        self.add_node(node)
    }

    pub fn node(&self, id: NodeId) -> Result<&SceneNode, SimError> {
        self.nodes.get(id.0).ok_or(SimError::UnknownNode(id.0))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SimError> {
        self.nodes.get_mut(id.0).ok_or(SimError::UnknownNode(id.0))
    }

    pub fn vertex_coordinate(&self, id: NodeId, vertex: usize, axis: Axis) -> Result<f32, SimError> {
        let node = self.node(id)?;
        let v = node.mesh.vertices.get(vertex).ok_or_else(|| SimError::VertexOutOfRange {
            node: node.name.clone(),
            vertex,
            len: node.mesh.vertices.len(),
        })?;
        Ok(v.pos[axis.index()])
    }

    /// Move one mesh vertex along an axis (object space)
    pub fn set_vertex_coordinate(&mut self, id: NodeId, vertex: usize, axis: Axis, value: f32) -> Result<(), SimError> {
        let node = self.node_mut(id)?;
        let len = node.mesh.vertices.len();
        let Some(v) = node.mesh.vertices.get_mut(vertex) else {
            return Err(SimError::VertexOutOfRange {
                node: node.name.clone(),
                vertex,
                len,
            });
        };
        if v.pos[axis.index()] != value {
            v.pos[axis.index()] = value;
            node.revision += 1;
        }
        Ok(())
    }
}
