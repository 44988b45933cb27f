use egui::Context;
use tracing::error;

use crate::controller::AppState;

/// Build the complete UI for this frame and return egui output.
///
/// Slider edits are applied to `app` straight away so the renderer sees them this frame.
pub fn build_ui(egui_ctx: &Context, raw_input: egui::RawInput, app: &mut AppState) -> egui::FullOutput {
    egui_ctx.run(raw_input, |ctx| {
        draw_debug_window(ctx, app);
        if !app.gui.is_empty() {
            draw_controls_window(ctx, app);
        }
    })
}

fn draw_debug_window(ctx: &Context, app: &AppState) {
    let report = app.last_report;

    egui::Window::new("Debug")
        .default_pos([8.0, 8.0])
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(format!("FPS: {:.0}", app.stats.fps())).small());
            ui.label(egui::RichText::new(format!("Variant: {}", app.config.variant.name())).small());
            if let Some(unit) = app.unit_body() {
                let p = unit.position;
                let v = unit.velocity;
                ui.label(egui::RichText::new(format!("Pos: x: {:.2} y: {:.2} z: {:.2}", p.x, p.y, p.z)).small());
                ui.label(egui::RichText::new(format!("Vel: x: {:.2} y: {:.2} z: {:.2}", v.x, v.y, v.z)).small());
                ui.label(egui::RichText::new(format!("Sub-steps: {}", report.substeps)).small());
                ui.separator();
                ui.label(egui::RichText::new("Controls:").small());
                ui.label(egui::RichText::new("Arrow keys - Push the ball").small());
            } else {
                ui.separator();
                ui.label(egui::RichText::new("Controls:").small());
            }
            if matches!(app.camera_controller, crate::controller::CameraController::Orbit(_)) {
                ui.label(egui::RichText::new("Drag - Orbit camera").small());
                ui.label(egui::RichText::new("Wheel - Zoom").small());
            }
        });
}

fn draw_controls_window(ctx: &Context, app: &mut AppState) {
    let (width, _) = app.viewport();
    let mut changes = Vec::new();

    egui::Window::new("Controls")
        .default_pos(controls_window_pos(width, ctx.pixels_per_point()))
        .default_size([190.0, 60.0])
        .show(ctx, |ui| {
            for (index, binding) in app.gui.iter().enumerate() {
                let mut value = binding.value;
                ui.label(egui::RichText::new(&binding.label).small());
                if ui.add(egui::Slider::new(&mut value, binding.min..=binding.max)).changed() {
                    changes.push((index, value));
                }
            }
        });

    for (index, value) in changes {
        if let Err(e) = app.set_binding_value(index, value) {
            error!(error = %e, "failed to apply gui binding");
        }
    }
}

/// Top-right corner in egui points; the viewport width is in physical pixels
fn controls_window_pos(width_px: u32, pixels_per_point: f32) -> [f32; 2] {
    let width = width_px as f32 / pixels_per_point.max(f32::EPSILON);
    [(width - 200.0).max(0.0), 8.0]
}
