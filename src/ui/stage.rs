use crossbeam_channel::{Receiver, Sender};
use egui::{vec2, Align2, Color32, FontId, Sense, Stroke, Ui};
use glam::Vec3;
use log::debug;

use super::dragger::{Coordinates, Dragger};
use crate::spatial::StageMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTarget {
    Part(usize),
    Listener,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageEvent {
    Moved {
        target: StageTarget,
        coordinates: Coordinates,
    },
}

pub struct Marker {
    pub target: StageTarget,
    pub dragger: Dragger,
    pub color: Color32,
}

/// The floor plan: a fixed-size area holding one marker per part plus the
/// listener. Marker moves are reported as [`StageEvent`]s.
pub struct Stage {
    mapping: StageMapping,
    markers: Vec<Marker>,
    events: Sender<StageEvent>,
}

impl Stage {
    pub fn new(mapping: StageMapping) -> (Self, Receiver<StageEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        (
            Self {
                mapping,
                markers: Vec::new(),
                events,
            },
            receiver,
        )
    }

    pub fn mapping(&self) -> &StageMapping {
        &self.mapping
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Places a marker at a world position. Markers added later draw on top
    /// and win presses on overlap.
    pub fn add_marker(&mut self, target: StageTarget, label: &str, position: Vec3, color: Color32) {
        let coordinates = self.mapping.clamp(self.mapping.to_screen(position));
        let mut dragger = Dragger::new(coordinates);
        dragger.update_label(label);

        let events = self.events.clone();
        dragger.register_update(move |coordinates| {
            // The receiver lives as long as the app; nothing to do if it is gone.
            let _ = events.send(StageEvent::Moved {
                target,
                coordinates,
            });
        });

        self.markers.push(Marker {
            target,
            dragger,
            color,
        });
    }

    pub fn pointer_pressed(&mut self, x: f32, y: f32) -> bool {
        let size = self.mapping.marker_size;
        let Some(marker) = self
            .markers
            .iter_mut()
            .rev()
            .find(|m| m.dragger.hit_test(x, y, size))
        else {
            return false;
        };

        let corner = marker.dragger.coordinates();
        marker.dragger.press(x - corner.x, y - corner.y);
        debug!("Grabbed {:?}", marker.target);
        true
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        let mapping = self.mapping;
        for marker in self.markers.iter_mut().filter(|m| m.dragger.is_dragging()) {
            let (x, y) = Self::clamped_pointer(&mapping, &marker.dragger, x, y);
            marker.dragger.pointer_moved(x, y);
        }
    }

    /// Ends any drag, wherever the pointer is released.
    pub fn pointer_released(&mut self, x: f32, y: f32) {
        let mapping = self.mapping;
        for marker in self.markers.iter_mut().filter(|m| m.dragger.is_dragging()) {
            let (x, y) = Self::clamped_pointer(&mapping, &marker.dragger, x, y);
            marker.dragger.release(x, y);
        }
    }

    // Shifts the pointer so that pointer minus grab offset stays on stage.
    fn clamped_pointer(mapping: &StageMapping, dragger: &Dragger, x: f32, y: f32) -> (f32, f32) {
        let offset = dragger.grab_offset();
        let corner = mapping.clamp(Coordinates::new(x - offset.x, y - offset.y));
        (corner.x + offset.x, corner.y + offset.y)
    }

    pub fn show(&mut self, ui: &mut Ui) {
        let size = vec2(self.mapping.width, self.mapping.height);
        let (rect, _) = ui.allocate_exact_size(size, Sense::hover());

        let (pointer, pressed, down, released) = ui.input(|i| {
            (
                i.pointer.interact_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
            )
        });

        // A quick click can press and release within a single frame.
        if let Some(pos) = pointer {
            let local = pos - rect.min;
            if pressed && rect.contains(pos) {
                self.pointer_pressed(local.x, local.y);
            }
            if released {
                self.pointer_released(local.x, local.y);
            } else if down {
                self.pointer_moved(local.x, local.y);
            }
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 4.0, Color32::from_gray(24));

        let grid = Stroke::new(1.0, Color32::from_gray(40));
        let step = self.mapping.pixels_per_unit;
        let centre = rect.center();
        let mut offset = 0.0;
        while offset <= rect.width().max(rect.height()) / 2.0 {
            for x in [centre.x - offset, centre.x + offset] {
                painter.vline(x, rect.y_range(), grid);
            }
            for y in [centre.y - offset, centre.y + offset] {
                painter.hline(rect.x_range(), y, grid);
            }
            offset += step;
        }

        let half = self.mapping.marker_size / 2.0;
        for marker in &self.markers {
            let c = marker.dragger.coordinates();
            let centre = rect.min + vec2(c.x + half, c.y + half);

            match marker.target {
                StageTarget::Listener => {
                    painter.rect_filled(
                        egui::Rect::from_center_size(centre, vec2(half * 1.6, half * 1.6)),
                        3.0,
                        marker.color,
                    );
                }
                StageTarget::Part(_) => {
                    painter.circle_filled(centre, half, marker.color);
                }
            }

            if marker.dragger.is_dragging() {
                painter.circle_stroke(centre, half + 3.0, Stroke::new(2.0, Color32::WHITE));
            }

            painter.text(
                centre + vec2(0.0, half + 2.0),
                Align2::CENTER_TOP,
                marker.dragger.label(),
                FontId::proportional(13.0),
                Color32::WHITE,
            );
        }
    }
}
