// MODEL: Simulation state and scene data
pub mod body;
pub mod camera;
pub mod scene;
pub mod spring;
pub mod world;

pub use body::{BodyState, SphereBody};
pub use camera::Camera;
pub use scene::{DirectionalLight, Material, NodeId, Scene, SceneLayout, SceneNode};
pub use spring::Spring;
pub use world::{BodyHandle, ContactMaterial, PhysicsWorld};
