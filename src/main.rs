use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::PhysicalKey,
    window::Window,
};

// Import from the library crate
use lunaball::{
    config::SimulationConfig,
    controller::{AppState, FrameClock, InputEvent, InputState, MouseButton},
    error::SetupError,
    logging, texture_paths, ui,
    view::{texture, GpuContext, Renderer},
};

struct App {
    window: Arc<Window>,
    gpu: GpuContext,
    renderer: Renderer,

    // egui
    egui_state: egui_winit::State,
    egui_ctx: egui::Context,

    app: AppState,
    input_state: InputState,

    // Frame timing
    started: Instant,
    clock: FrameClock,
}

impl App {
    async fn new(window: Arc<Window>, config: SimulationConfig) -> Result<Self, SetupError> {
        let gpu = GpuContext::new_native(window.clone()).await?;
        let app = AppState::new(config, gpu.config.width, gpu.config.height)?;

        let root = texture::asset_root();
        let images: HashMap<_, _> = texture_paths(&app.scene)
            .into_iter()
            .map(|path| {
                let image = texture::TextureImage::or_white(texture::load_file(&root, &path), &path);
                (path, image)
            })
            .collect();
        let renderer = Renderer::new(gpu.device.as_ref(), gpu.queue.as_ref(), &gpu.config, &app.scene, &images);

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        Ok(Self {
            window,
            gpu,
            renderer,
            egui_state,
            egui_ctx,
            app,
            input_state: InputState::new(),
            started: Instant::now(),
            clock: FrameClock::default(),
        })
    }

    /// Translate window events into [`InputEvent`]s; returns true when the event was consumed
    fn input(&mut self, event: &WindowEvent) -> bool {
        let egui_response = self.egui_state.on_window_event(self.window.as_ref(), event);
        self.input_state.pointer_over_gui = self.egui_ctx.is_pointer_over_area();

        let input_event = match event {
            WindowEvent::KeyboardInput { event: KeyEvent { state, physical_key: PhysicalKey::Code(code), .. }, .. } => {
                // winit names arrow keys like DOM `KeyboardEvent.code`
                let name = format!("{code:?}");
                match state {
                    ElementState::Pressed => InputEvent::KeyDown(name),
                    ElementState::Released => InputEvent::KeyUp(name),
                }
            }
            WindowEvent::CursorMoved { position, .. } => InputEvent::PointerMoved {
                x: position.x as f32,
                y: position.y as f32,
            },
            WindowEvent::MouseInput { state, button, .. } => InputEvent::PointerButton {
                button: match button {
                    winit::event::MouseButton::Right => MouseButton::Right,
                    winit::event::MouseButton::Middle => MouseButton::Middle,
                    _ => MouseButton::Left,
                },
                is_down: *state == ElementState::Pressed,
            },
            WindowEvent::MouseWheel { delta, .. } => {
                // Browsers report wheel-up as negative deltaY
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(p) => -p.y as f32,
                };
                InputEvent::Wheel { delta_y }
            }
            WindowEvent::Focused(false) => InputEvent::FocusLost,
            WindowEvent::Occluded(occluded) => InputEvent::VisibilityChanged { visible: !occluded },
            _ => return egui_response.consumed,
        };

        // Releases always reach the latch so nothing sticks while the GUI has focus
        let is_release = matches!(
            input_event,
            InputEvent::KeyUp(_) | InputEvent::PointerButton { is_down: false, .. } | InputEvent::PointerMoved { .. }
        );
        if !egui_response.consumed || is_release {
            self.input_state.process_event(&input_event);
        }
        true
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer
                .resize(self.gpu.device.as_ref(), &self.gpu.surface, new_size.width, new_size.height);
            self.app.resize(new_size.width, new_size.height);
        }
    }

    fn update(&mut self) {
        let now_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let elapsed = self.clock.tick(now_ms);
        let input = self.input_state.snapshot();
        if let Err(e) = self.app.advance(elapsed, &input) {
            error!(error = %e, "frame update failed");
        }
    }

    fn render_ui(&mut self) {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let mut output = ui::build_ui(&self.egui_ctx, raw_input, &mut self.app);
        self.egui_state
            .handle_platform_output(&self.window, std::mem::take(&mut output.platform_output));

        let dpr = self.window.scale_factor() as f32;
        let primitives = self.egui_ctx.tessellate(std::mem::take(&mut output.shapes), dpr);
        self.renderer.egui_primitives = Some(primitives);
        self.renderer.egui_full_output = Some(output);
        self.renderer.egui_dpr = dpr;
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.render_ui();
        let device = self.gpu.device.as_ref();
        let queue = self.gpu.queue.as_ref();
        self.renderer.prepare(device, queue, &self.app.scene, &self.app.camera);
        self.renderer.draw_frame(device, queue, &self.gpu.surface)
    }
}

fn main() {
    logging::init();

    let config = match SimulationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(variant = config.variant.name(), "starting");

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!(error = %e, "failed to create event loop");
            std::process::exit(1);
        }
    };
    let window_attributes = Window::default_attributes()
        .with_title(format!("lunaball - {}", config.variant.name()))
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    let window = match event_loop.create_window(window_attributes) {
        Ok(window) => Arc::new(window),
        Err(e) => {
            error!(error = %e, "failed to create window");
            std::process::exit(1);
        }
    };

    let mut app = match pollster::block_on(App::new(window.clone(), config)) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "setup failed");
            std::process::exit(1);
        }
    };

    let result = event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == app.window.id() => {
                if !app.input(event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(physical_size) => {
                            app.resize(*physical_size);
                        }
                        WindowEvent::RedrawRequested => {
                            app.update();

                            match app.render() {
                                Ok(_) => {}
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    error!("GPU out of memory, exiting");
                                    elwt.exit();
                                }
                                Err(e) => error!(error = %e, "failed to render frame"),
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                app.window.request_redraw();
            }
            _ => {}
        }
    });

    if let Err(e) = result {
        error!(error = %e, "event loop terminated with an error");
        std::process::exit(1);
    }
}
