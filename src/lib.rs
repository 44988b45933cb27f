// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod logging;
pub mod utils;
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

use std::collections::HashSet;

use model::Scene;

/// Distinct texture paths referenced by the scene, in node order
pub fn texture_paths(scene: &Scene) -> Vec<String> {
    let mut seen = HashSet::new();
    scene
        .nodes
        .iter()
        .filter_map(|node| node.material.texture.clone())
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use tracing::{error, info};
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent, Window};

    use crate::config::SimulationConfig;
    use crate::controller::input::wasm as dom;
    use crate::controller::{AppState, FrameClock, InputEvent, InputProcessor, InputState, MouseButton};
    use crate::error::SetupError;
    use crate::view::{texture, GpuContext, Renderer};
    use crate::{logging, texture_paths, ui};

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();
        let (window, document, canvas) = init_canvas()?;
        setup_app(&window, &document, &canvas).await.map_err(|e| {
            error!(error = %e, "setup failed");
            js_error(e.to_string())
        })
    }

    /// Everything the requestAnimationFrame callback owns
    struct FrameLoopContext {
        app: AppState,
        gpu: GpuContext,
        renderer: Renderer,
        canvas: HtmlCanvasElement,
        input_state: Rc<RefCell<InputState>>,
        clock: FrameClock,
        egui_ctx: egui::Context,
        egui_events: Rc<RefCell<Vec<egui::Event>>>,
    }

    impl FrameLoopContext {
        fn frame(&mut self, window: &Window) {
            let now = window.performance().map(|p| p.now()).unwrap_or(0.0);
            let elapsed = self.clock.tick(now);
            self.handle_resize(window);

            let input = self.input_state.borrow_mut().snapshot();
            if let Err(e) = self.app.advance(elapsed, &input) {
                error!(error = %e, "frame update failed");
            }

            // Build egui input from queued events
            let dpr = window.device_pixel_ratio() as f32;
            let mut raw_input = egui::RawInput::default();
            raw_input.time = Some(now / 1000.0);
            raw_input.screen_rect = Some(egui::Rect::from_min_size(
                egui::Pos2::new(0.0, 0.0),
                egui::vec2(self.renderer.width as f32 / dpr, self.renderer.height as f32 / dpr),
            ));
            raw_input.events.extend(self.egui_events.borrow_mut().drain(..));
            self.egui_ctx.set_pixels_per_point(dpr);

            let mut full_output = ui::build_ui(&self.egui_ctx, raw_input, &mut self.app);
            self.input_state.borrow_mut().pointer_over_gui = self.egui_ctx.is_pointer_over_area();

            let primitives = self.egui_ctx.tessellate(std::mem::take(&mut full_output.shapes), dpr);
            self.renderer.egui_primitives = Some(primitives);
            self.renderer.egui_full_output = Some(full_output);
            self.renderer.egui_dpr = dpr;

            let device = self.gpu.device.as_ref();
            let queue = self.gpu.queue.as_ref();
            self.renderer.prepare(device, queue, &self.app.scene, &self.app.camera);
            if let Err(e) = self.renderer.draw_frame(device, queue, &self.gpu.surface) {
                error!(error = %e, "failed to draw frame");
            }
        }

        /// Keep the canvas backing store at window size times device pixel ratio
        fn handle_resize(&mut self, window: &Window) {
            let (width, height) = window_size(window);
            if width != self.renderer.width || height != self.renderer.height {
                self.canvas.set_width(width);
                self.canvas.set_height(height);
                self.renderer.resize(self.gpu.device.as_ref(), &self.gpu.surface, width, height);
                self.app.resize(width, height);
            }
        }
    }

    /// Main application setup for WASM
    async fn setup_app(window: &Window, document: &Document, canvas: &HtmlCanvasElement) -> Result<(), SetupError> {
        let search = window.location().search().unwrap_or_default();
        let config = SimulationConfig::from_query(&search)?;
        info!(variant = config.variant.name(), "starting");

        let gpu = GpuContext::new(canvas, canvas.width(), canvas.height()).await?;
        let app = AppState::new(config, gpu.config.width, gpu.config.height)?;

        let mut images = HashMap::new();
        for path in texture_paths(&app.scene) {
            let image = texture::TextureImage::or_white(texture::fetch(&path).await, &path);
            images.insert(path, image);
        }
        let renderer = Renderer::new(gpu.device.as_ref(), gpu.queue.as_ref(), &gpu.config, &app.scene, &images);

        let input_state = Rc::new(RefCell::new(InputState::new()));
        let egui_events: Rc<RefCell<Vec<egui::Event>>> = Rc::new(RefCell::new(Vec::new()));

        if let Err(e) = setup_input_listeners(document, window, input_state.clone(), egui_events.clone()) {
            error!(error = ?e, "failed to register input listeners");
        }

        let mut frame_ctx = FrameLoopContext {
            app,
            gpu,
            renderer,
            canvas: canvas.clone(),
            input_state,
            clock: FrameClock::default(),
            egui_ctx: egui::Context::default(),
            egui_events,
        };

        // Continuous redraw using requestAnimationFrame
        let f = RcCellCallback::new(window.clone(), {
            let window_for_loop = window.clone();
            move || frame_ctx.frame(&window_for_loop)
        });
        if let Err(e) = f.start() {
            error!(error = ?e, "failed to start animation loop");
        }

        Ok(())
    }

    /// Setup all input event listeners with platform-agnostic abstractions
    fn setup_input_listeners(
        document: &Document,
        window: &Window,
        input_state: Rc<RefCell<InputState>>,
        egui_events: Rc<RefCell<Vec<egui::Event>>>,
    ) -> Result<(), JsValue> {
        let input_processor = InputProcessor::default();

        // Keyboard down
        {
            let input_state = input_state.clone();
            let input_processor = input_processor.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                // Arrow keys would otherwise scroll the page
                if input_processor.is_bound(&e.code()) {
                    e.prevent_default();
                }
                input_state.borrow_mut().process_event(&dom::keyboard_event_to_input(&e, true));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up
        {
            let input_state = input_state.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                input_state.borrow_mut().process_event(&dom::keyboard_event_to_input(&e, false));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Focus loss - clear all keys
        {
            let input_state = input_state.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                input_state.borrow_mut().process_event(&InputEvent::FocusLost);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        // Visibility change - clear all keys when hidden
        {
            let input_state = input_state.clone();
            let doc = document.clone();
            let visibility = Closure::wrap(Box::new(move |_e: Event| {
                let visible = !doc.hidden();
                input_state.borrow_mut().process_event(&InputEvent::VisibilityChanged { visible });
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
            visibility.forget();
        }

        // Mouse move: egui gets CSS pixels, the orbit controls physical ones
        {
            let input_state = input_state.clone();
            let egui_events = egui_events.clone();
            let window = window.clone();
            let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
                let dpr = window.device_pixel_ratio() as f32;
                egui_events
                    .borrow_mut()
                    .push(egui::Event::PointerMoved(egui::pos2(e.client_x() as f32, e.client_y() as f32)));
                input_state.borrow_mut().process_event(&dom::mouse_move_to_input(&e, dpr));
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
            mm.forget();
        }

        // Mouse buttons
        for (event_name, is_down) in [("mousedown", true), ("mouseup", false)] {
            let input_state = input_state.clone();
            let egui_events = egui_events.clone();
            let listener = Closure::wrap(Box::new(move |e: MouseEvent| {
                let event = dom::mouse_button_to_input(&e, is_down);
                if let InputEvent::PointerButton { button: MouseButton::Left, .. } = event {
                    egui_events.borrow_mut().push(egui::Event::PointerButton {
                        pos: egui::pos2(e.client_x() as f32, e.client_y() as f32),
                        button: egui::PointerButton::Primary,
                        pressed: is_down,
                        modifiers: egui::Modifiers::default(),
                    });
                }
                input_state.borrow_mut().process_event(&event);
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback(event_name, listener.as_ref().unchecked_ref())?;
            listener.forget();
        }

        // Mouse wheel
        {
            let input_state = input_state.clone();
            let wheel = Closure::wrap(Box::new(move |e: WheelEvent| {
                input_state.borrow_mut().process_event(&dom::wheel_to_input(&e));
            }) as Box<dyn FnMut(WheelEvent)>);
            document.add_event_listener_with_callback("wheel", wheel.as_ref().unchecked_ref())?;
            wheel.forget();
        }

        Ok(())
    }

    fn window_size(window: &Window) -> (u32, u32) {
        let dpr = window.device_pixel_ratio();
        let w = window.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(800.0);
        let h = window.inner_height().ok().and_then(|h| h.as_f64()).unwrap_or(600.0);
        (((w * dpr) as u32).max(1), ((h * dpr) as u32).max(1))
    }

    fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or(js_error("no global `window`"))?;
        let document = window.document().ok_or(js_error("no document on window"))?;
        let body = document.body().ok_or(js_error("no body on document"))?;
        let canvas_el = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        let (width, height) = window_size(&window);
        canvas_el.set_width(width);
        canvas_el.set_height(height);
        canvas_el.set_attribute("style", "display: block; width: 100vw; height: 100vh")?;
        body.set_attribute("style", "margin: 0; overflow: hidden")?;
        body.append_child(&canvas_el)?;
        Ok((window, document, canvas_el))
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }

    struct RcCellCallback {
        inner: Rc<RefCell<Box<dyn FnMut()>>>,
        window: Window,
    }

    impl RcCellCallback {
        fn new(window: Window, f: impl FnMut() + 'static) -> Self {
            Self {
                inner: Rc::new(RefCell::new(Box::new(f))),
                window,
            }
        }

        fn start(self) -> Result<(), JsValue> {
            let inner = self.inner.clone();
            let window = self.window.clone();

            let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
            let callback_clone = callback.clone();

            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
                inner.borrow_mut().as_mut()();

                // Recursively schedule next frame
                if let Some(cb) = callback_clone.borrow().as_ref() {
                    if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                        error!(error = ?e, "requestAnimationFrame failed, stopping");
                    }
                }
            }) as Box<dyn FnMut()>));

            if let Some(cb) = callback.borrow().as_ref() {
                self.window.request_animation_frame(cb.as_ref().unchecked_ref())?;
            }

            // Leak the closure to keep it alive
            std::mem::forget(callback);
            Ok(())
        }
    }
}
