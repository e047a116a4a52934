pub mod dragger;
pub mod stage;
pub mod visualizer;

use anyhow::Result;
use egui::{Color32, RichText};
use egui_wgpu::Renderer;
use egui_winit::State;
use wgpu::{CommandEncoder, Device, Queue, TextureFormat, TextureView};
use winit::{event::WindowEvent, window::Window};

use crate::audio::ensemble::MAX_MASTER_VOLUME;
use crate::audio::part::MAX_PART_VOLUME;
use crate::audio::{PlaybackState, SeekBar};

pub use dragger::{Coordinates, Dragger};
pub use stage::{Stage, StageEvent, StageTarget};

const PART_COLORS: [Color32; 4] = [
    Color32::from_rgb(235, 111, 146),
    Color32::from_rgb(246, 193, 119),
    Color32::from_rgb(156, 207, 216),
    Color32::from_rgb(196, 167, 231),
];

pub const LISTENER_COLOR: Color32 = Color32::from_rgb(224, 222, 244);

pub fn part_color(index: usize) -> Color32 {
    PART_COLORS[index % PART_COLORS.len()]
}

/// Something the user asked for this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    TogglePlay,
    SetMasterVolume(f32),
    Seek(f64),
    SetPartVolume(usize, f32),
}

pub struct PartView<'a> {
    pub name: &'a str,
    pub volume: f32,
    pub spectrum: Option<&'a [u8]>,
}

/// Read-only snapshot of the transport for one frame.
pub struct StageView<'a> {
    pub title: &'a str,
    pub state: PlaybackState,
    pub seek: SeekBar,
    pub master_volume: f32,
    pub parts: Vec<PartView<'a>>,
}

pub fn format_time(seconds: f64) -> String {
    let whole = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

pub struct UserInterface {
    context: egui::Context,
    state: State,
    renderer: Renderer,
    show_controls: bool,
}

impl UserInterface {
    pub fn new(window: &Window, device: &Device, format: TextureFormat) -> Self {
        let context = egui::Context::default();

        let egui_state = State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );

        let renderer = Renderer::new(device, format, None, 1);

        Self {
            context,
            state: egui_state,
            renderer,
            show_controls: true,
        }
    }

    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) {
        let _ = self.state.on_window_event(window, event);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        device: &Device,
        queue: &Queue,
        window: &Window,
        view: &StageView,
        stage: &mut Stage,
    ) -> Result<Vec<UiAction>> {
        let raw_input = self.state.take_egui_input(window);

        let show_controls = &mut self.show_controls;
        let mut actions = Vec::new();

        let full_output = self.context.run(raw_input, |ctx| {
            Self::ui_content(ctx, show_controls, view, stage, &mut actions);
        });

        self.state.handle_platform_output(window, full_output.platform_output);

        let tris = self.context.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let size = window.inner_size();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        self.renderer.update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok(actions)
    }

    fn ui_content(
        ctx: &egui::Context,
        show_controls: &mut bool,
        view: &StageView,
        stage: &mut Stage,
        actions: &mut Vec<UiAction>,
    ) {
        if ctx.input(|i| i.key_pressed(egui::Key::F1)) {
            *show_controls = !*show_controls;
        }

        // A focused button already treats Space as a click.
        let nothing_focused = ctx.memory(|m| m.focused().is_none());
        if nothing_focused && ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            actions.push(UiAction::TogglePlay);
        }

        if *show_controls {
            egui::SidePanel::left("controls")
                .resizable(false)
                .default_width(280.0)
                .show(ctx, |ui| {
                    Self::controls(ui, view, actions);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            stage.show(ui);

            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| {
                for (index, part) in view.parts.iter().enumerate() {
                    if let Some(spectrum) = part.spectrum {
                        ui.label(part.name);
                        visualizer::bar_graph(ui, spectrum, part_color(index));
                    }
                }
            });
        });
    }

    fn controls(ui: &mut egui::Ui, view: &StageView, actions: &mut Vec<UiAction>) {
        ui.heading(view.title);

        ui.separator();

        if ui.button(view.state.button_label()).clicked() {
            actions.push(UiAction::TogglePlay);
        }

        ui.horizontal(|ui| {
            ui.label("Volume:");
            let mut volume = view.master_volume;
            if ui
                .add(egui::Slider::new(&mut volume, 0.0..=MAX_MASTER_VOLUME).step_by(0.01))
                .changed()
            {
                actions.push(UiAction::SetMasterVolume(volume));
            }
        });

        // Only user drags report `changed()`; the per-frame value refresh does not.
        let mut position = view.seek.value;
        let max = view.seek.max.unwrap_or(0.0);
        let seek = egui::Slider::new(&mut position, 0.0..=max).show_value(false);
        if ui.add_enabled(view.seek.max.is_some(), seek).changed() {
            actions.push(UiAction::Seek(position));
        }
        ui.label(match view.seek.max {
            Some(max) => format!("{} / {}", format_time(view.seek.value), format_time(max)),
            None => format!("{} / --:--", format_time(view.seek.value)),
        });

        ui.separator();

        for (index, part) in view.parts.iter().enumerate() {
            ui.label(RichText::new(part.name).strong().color(part_color(index)));
            ui.horizontal(|ui| {
                ui.label("Volume");
                let mut volume = part.volume;
                if ui
                    .add(egui::Slider::new(&mut volume, 0.0..=MAX_PART_VOLUME).step_by(0.01))
                    .changed()
                {
                    actions.push(UiAction::SetPartVolume(index, volume));
                }
            });
        }

        ui.separator();

        ui.label("Drag the markers to move voices around you.");
        ui.label("Space: play/pause   F1: controls   Esc: exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(59.9), "0:59");
        assert_eq!(format_time(61.0), "1:01");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_part_colors_cycle() {
        assert_eq!(part_color(0), part_color(4));
        assert_ne!(part_color(0), part_color(1));
    }
}
