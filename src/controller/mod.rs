// CONTROLLER: Input, simulation stepping, and camera control
pub mod input;
pub mod camera_controller;
pub mod frame_loop;

pub use input::{Direction, DirectionLatch, FrameInput, InputEvent, InputProcessor, InputState, KeyBindings, MouseButton, OrbitInput};
pub use camera_controller::{CameraController, OrbitControls};
pub use frame_loop::{AppState, FrameClock, FrameReport, FrameStats, GuiBinding, PhysicsRig};
