/// Platform-agnostic input handling system
use std::collections::HashSet;

use glam::{Vec2, Vec3};

/// Arrow-key directions, each pushing the unit along one of its local axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn local_axis(&self) -> Vec3 {
        match self {
            Direction::Up => Vec3::NEG_Z,
            Direction::Down => Vec3::Z,
            Direction::Left => Vec3::NEG_X,
            Direction::Right => Vec3::X,
        }
    }
}

/// One flag per arrow key, set on key-down and cleared on key-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionLatch {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionLatch {
    pub fn set(&mut self, direction: Direction, pressed: bool) {
        match direction {
            Direction::Up => self.up = pressed,
            Direction::Down => self.down = pressed,
            Direction::Left => self.left = pressed,
            Direction::Right => self.right = pressed,
        }
    }

    pub fn is_pressed(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }

    pub fn pressed(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(|d| self.is_pressed(*d))
    }

    /// Sum of the pressed directions, in the body frame. Opposing keys cancel.
    pub fn local_force(&self, magnitude: f32) -> Vec3 {
        self.pressed().map(|d| d.local_axis() * magnitude).sum()
    }
}

/// Platform-independent input events
#[derive(Debug, Clone)]
pub enum InputEvent {
    // Keyboard events, carrying DOM `KeyboardEvent.code` names
    KeyDown(String),
    KeyUp(String),

    // Pointer events, positions in physical pixels
    PointerMoved { x: f32, y: f32 },
    PointerButton { button: MouseButton, is_down: bool },
    Wheel { delta_y: f32 },

    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn from_web_button(button: i16) -> Self {
        match button {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Left,
        }
    }
}

/// Pointer input gathered for the orbit controls since the last poll
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrbitInput {
    /// Drag distance in pixels while the left button is held
    pub drag_delta: Vec2,
    /// Summed wheel `deltaY`; negative zooms in
    pub wheel_delta: f32,
}

/// Everything the frame loop reads from input, polled once at frame start
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub latch: DirectionLatch,
    pub orbit: OrbitInput,
}

impl FrameInput {
    pub fn with_latch(latch: DirectionLatch) -> Self {
        Self { latch, ..Self::default() }
    }
}

pub struct InputState {
    pub pressed_keys: HashSet<String>,
    pub pointer_pos: Option<Vec2>,
    pub dragging: bool,
    /// Set by the front end while the GUI owns the pointer
    pub pointer_over_gui: bool,
    drag_delta: Vec2,
    wheel_delta: f32,
    processor: InputProcessor,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    pub fn new() -> Self {
        Self::with_bindings(KeyBindings::default())
    }

    pub fn with_bindings(bindings: KeyBindings) -> Self {
        Self {
            pressed_keys: HashSet::new(),
            pointer_pos: None,
            dragging: false,
            pointer_over_gui: false,
            drag_delta: Vec2::ZERO,
            wheel_delta: 0.0,
            processor: InputProcessor::new(bindings),
        }
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(code) => {
                self.pressed_keys.insert(code.clone());
            }
            InputEvent::KeyUp(code) => {
                self.pressed_keys.remove(code.as_str());
            }
            InputEvent::PointerMoved { x, y } => {
                let pos = Vec2::new(*x, *y);
                if self.dragging {
                    if let Some(last) = self.pointer_pos {
                        self.drag_delta += pos - last;
                    }
                }
                self.pointer_pos = Some(pos);
            }
            InputEvent::PointerButton { button: MouseButton::Left, is_down } => {
                // Presses on the GUI never start a drag; releases always end one
                self.dragging = *is_down && !self.pointer_over_gui;
            }
            InputEvent::PointerButton { .. } => {}
            InputEvent::Wheel { delta_y } => {
                if !self.pointer_over_gui {
                    self.wheel_delta += delta_y;
                }
            }
            InputEvent::FocusLost => {
                self.clear_keys();
                self.dragging = false;
            }
            InputEvent::VisibilityChanged { visible } => {
                if !visible {
                    self.clear_keys();
                    self.dragging = false;
                }
            }
        }
    }

    pub fn is_key_pressed(&self, code: &str) -> bool {
        self.pressed_keys.contains(code)
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn latch(&self) -> DirectionLatch {
        self.processor.latch(self)
    }

    pub fn consume_orbit(&mut self) -> OrbitInput {
        let result = OrbitInput {
            drag_delta: self.drag_delta,
            wheel_delta: self.wheel_delta,
        };
        self.drag_delta = Vec2::ZERO;
        self.wheel_delta = 0.0;
        result
    }

    /// Poll at frame start: current latch plus the pointer motion since the last poll
    pub fn snapshot(&mut self) -> FrameInput {
        FrameInput {
            latch: self.latch(),
            orbit: self.consume_orbit(),
        }
    }
}

/// Key mapping configuration
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            up: "ArrowUp".to_string(),
            down: "ArrowDown".to_string(),
            left: "ArrowLeft".to_string(),
            right: "ArrowRight".to_string(),
        }
    }
}

/// High-level input processor
#[derive(Debug, Clone, Default)]
pub struct InputProcessor {
    bindings: KeyBindings,
}

impl InputProcessor {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    pub fn direction_for(&self, code: &str) -> Option<Direction> {
        let b = &self.bindings;
        if code == b.up {
            Some(Direction::Up)
        } else if code == b.down {
            Some(Direction::Down)
        } else if code == b.left {
            Some(Direction::Left)
        } else if code == b.right {
            Some(Direction::Right)
        } else {
            None
        }
    }

    pub fn latch(&self, input: &InputState) -> DirectionLatch {
        let mut latch = DirectionLatch::default();
        for code in &input.pressed_keys {
            if let Some(direction) = self.direction_for(code) {
                latch.set(direction, true);
            }
        }
        latch
    }

    /// Bound keys would otherwise scroll the page
    pub fn is_bound(&self, code: &str) -> bool {
        self.direction_for(code).is_some()
    }
}

pub mod wasm {
    use super::*;
    use web_sys::{KeyboardEvent, MouseEvent, WheelEvent};

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let code = e.code();
        if is_down {
            InputEvent::KeyDown(code)
        } else {
            InputEvent::KeyUp(code)
        }
    }

    pub fn mouse_move_to_input(e: &MouseEvent, device_pixel_ratio: f32) -> InputEvent {
        InputEvent::PointerMoved {
            x: e.client_x() as f32 * device_pixel_ratio,
            y: e.client_y() as f32 * device_pixel_ratio,
        }
    }

    pub fn mouse_button_to_input(e: &MouseEvent, is_down: bool) -> InputEvent {
        InputEvent::PointerButton {
            button: MouseButton::from_web_button(e.button()),
            is_down,
        }
    }

    pub fn wheel_to_input(e: &WheelEvent) -> InputEvent {
        InputEvent::Wheel { delta_y: e.delta_y() as f32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(code: &str) -> InputEvent {
        InputEvent::KeyDown(code.to_string())
    }

    fn up(code: &str) -> InputEvent {
        InputEvent::KeyUp(code.to_string())
    }

    #[test]
    fn test_arrow_keys_set_and_clear_latch() {
        let mut input = InputState::new();
        input.process_event(&down("ArrowUp"));
        input.process_event(&down("ArrowRight"));
        let latch = input.latch();
        assert!(latch.up && latch.right);
        assert!(!latch.down && !latch.left);

        input.process_event(&up("ArrowUp"));
        assert!(!input.latch().up);
        assert!(input.latch().right);
    }

    #[test]
    fn test_unbound_keys_are_ignored() {
        let mut input = InputState::new();
        input.process_event(&down("KeyW"));
        assert!(!input.latch().any());
    }

    #[test]
    fn test_focus_loss_clears_latch() {
        let mut input = InputState::new();
        input.process_event(&down("ArrowLeft"));
        input.process_event(&InputEvent::FocusLost);
        assert_eq!(input.latch(), DirectionLatch::default());

        input.process_event(&down("ArrowLeft"));
        input.process_event(&InputEvent::VisibilityChanged { visible: false });
        assert!(!input.latch().any());
    }

    #[test]
    fn test_local_force_sums_and_cancels() {
        let mut latch = DirectionLatch::default();
        assert_eq!(latch.local_force(10.0), Vec3::ZERO);

        latch.up = true;
        latch.right = true;
        assert_eq!(latch.local_force(10.0), Vec3::new(10.0, 0.0, -10.0));

        latch.down = true;
        latch.left = true;
        assert_eq!(latch.local_force(10.0), Vec3::ZERO);
    }

    #[test]
    fn test_drag_and_wheel_consumed_by_snapshot() {
        let mut input = InputState::new();
        input.process_event(&InputEvent::PointerMoved { x: 10.0, y: 10.0 });
        input.process_event(&InputEvent::PointerButton { button: MouseButton::Left, is_down: true });
        input.process_event(&InputEvent::PointerMoved { x: 25.0, y: 5.0 });
        input.process_event(&InputEvent::Wheel { delta_y: -100.0 });

        let frame = input.snapshot();
        assert_eq!(frame.orbit.drag_delta, Vec2::new(15.0, -5.0));
        assert_eq!(frame.orbit.wheel_delta, -100.0);
        assert_eq!(input.snapshot().orbit, OrbitInput::default());
    }

    #[test]
    fn test_pointer_over_gui_does_not_drag() {
        let mut input = InputState::new();
        input.pointer_over_gui = true;
        input.process_event(&InputEvent::PointerMoved { x: 0.0, y: 0.0 });
        input.process_event(&InputEvent::PointerButton { button: MouseButton::Left, is_down: true });
        input.process_event(&InputEvent::PointerMoved { x: 50.0, y: 0.0 });
        input.process_event(&InputEvent::Wheel { delta_y: 3.0 });
        assert_eq!(input.snapshot().orbit, OrbitInput::default());
    }

    #[test]
    fn test_custom_bindings() {
        let bindings = KeyBindings {
            up: "KeyW".into(),
            down: "KeyS".into(),
            left: "KeyA".into(),
            right: "KeyD".into(),
        };
        let mut input = InputState::with_bindings(bindings);
        input.process_event(&down("KeyS"));
        input.process_event(&down("ArrowUp"));
        let latch = input.latch();
        assert!(latch.down);
        assert!(!latch.up);
    }
}
