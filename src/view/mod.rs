// VIEW: Rendering and graphics
pub mod render;
pub mod gpu_init;
pub mod texture;

pub use render::{CameraUniform, LightingUniform, NodeUniform, Renderer};
pub use gpu_init::GpuContext;
pub use texture::{GpuTexture, TextureImage};
