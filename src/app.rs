use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rodio::OutputStream;
use winit::window::Window;

use crate::audio::{device, Ensemble, Part, Track};
use crate::config::{Args, Arrangement};
use crate::graphics::GraphicsEngine;
use crate::spatial::{floor_position, ListenerPose, StageMapping};
use crate::ui::{
    part_color, PartView, Stage, StageEvent, StageTarget, StageView, UiAction, UserInterface,
    LISTENER_COLOR,
};

pub const STAGE_WIDTH: f32 = 640.0;
pub const STAGE_HEIGHT: f32 = 420.0;

/// Everything that lives for the whole session: the output stream, the parts
/// and the stage they stand on.
pub struct StageApp {
    title: String,
    ensemble: Ensemble<Part>,
    stage: Stage,
    stage_events: Receiver<StageEvent>,
    listener: ListenerPose,
    // Dropping the stream silences every sink.
    _stream: OutputStream,
}

impl StageApp {
    pub fn new(args: &Args) -> Result<Self> {
        let arrangement = match &args.arrangement {
            Some(path) => Arrangement::load(path)?,
            None => Arrangement::barbershop("audio"),
        };
        info!(
            "Arrangement '{}' with {} parts",
            arrangement.title,
            arrangement.parts.len()
        );

        let (stream, handle) = device::open_output(args.device.as_deref())?;
        let listener = ListenerPose::at(floor_position(arrangement.listener));

        let parts = arrangement
            .parts
            .iter()
            .map(|config| {
                Part::load(&handle, config, &listener).with_context(|| {
                    format!(
                        "Failed to load part '{}' (render-tones can generate demo audio)",
                        config.name
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mapping = StageMapping::new(STAGE_WIDTH, STAGE_HEIGHT, args.pixels_per_unit);
        let (mut stage, stage_events) = Stage::new(mapping);
        for (index, config) in arrangement.parts.iter().enumerate() {
            stage.add_marker(
                StageTarget::Part(index),
                &config.name,
                floor_position(config.position),
                part_color(index),
            );
        }
        stage.add_marker(
            StageTarget::Listener,
            "Listener",
            listener.position,
            LISTENER_COLOR,
        );

        Ok(Self {
            title: arrangement.title,
            ensemble: Ensemble::new(parts, args.volume),
            stage,
            stage_events,
            listener,
            _stream: stream,
        })
    }

    pub fn render(
        &mut self,
        graphics: &mut GraphicsEngine,
        ui: &mut UserInterface,
        window: &Window,
    ) -> Result<()> {
        let seek = self.ensemble.tick();
        for part in self.ensemble.parts_mut() {
            part.refresh_spectrum();
        }

        let actions = {
            let view = StageView {
                title: &self.title,
                state: self.ensemble.state(),
                seek,
                master_volume: self.ensemble.master_volume(),
                parts: self
                    .ensemble
                    .parts()
                    .iter()
                    .map(|part| PartView {
                        name: part.name(),
                        volume: part.volume(),
                        spectrum: part.spectrum(),
                    })
                    .collect(),
            };
            graphics.render(ui, window, &view, &mut self.stage)?
        };

        for action in actions {
            if let Err(e) = apply_action(&mut self.ensemble, action) {
                error!("Playback error: {:#}", e);
            }
        }

        for event in self.stage_events.try_iter() {
            apply_stage_event(
                &mut self.ensemble,
                &mut self.listener,
                self.stage.mapping(),
                event,
            );
        }

        Ok(())
    }
}

pub fn apply_action<T: Track>(ensemble: &mut Ensemble<T>, action: UiAction) -> Result<()> {
    match action {
        UiAction::TogglePlay => {
            ensemble.toggle()?;
        }
        UiAction::SetMasterVolume(volume) => ensemble.set_master_volume(volume),
        UiAction::Seek(seconds) => ensemble.seek(seconds),
        UiAction::SetPartVolume(index, volume) => ensemble.set_part_volume(index, volume),
    }
    Ok(())
}

/// Turns a marker move into a new emitter position, or a new listener pose
/// shared by every part.
pub fn apply_stage_event<T: Track>(
    ensemble: &mut Ensemble<T>,
    listener: &mut ListenerPose,
    mapping: &StageMapping,
    event: StageEvent,
) {
    let StageEvent::Moved {
        target,
        coordinates,
    } = event;
    let position = mapping.to_world(coordinates);

    match target {
        StageTarget::Part(index) => {
            if let Some(part) = ensemble.parts_mut().get_mut(index) {
                part.set_emitter_position(position);
            }
        }
        StageTarget::Listener => {
            debug!("Listener at {:?}", position);
            listener.position = position;
            ensemble.set_listener(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ensemble::tests::quartet;
    use crate::audio::PlaybackState;
    use crate::ui::Coordinates;
    use glam::Vec3;

    #[test]
    fn test_actions_drive_the_ensemble() {
        let mut ensemble = quartet();

        apply_action(&mut ensemble, UiAction::TogglePlay).unwrap();
        assert_eq!(ensemble.state(), PlaybackState::Playing);

        apply_action(&mut ensemble, UiAction::SetMasterVolume(0.5)).unwrap();
        assert!(ensemble.parts().iter().all(|p| p.master_gain == 0.5));

        apply_action(&mut ensemble, UiAction::SetPartVolume(2, 3.25)).unwrap();
        assert_eq!(ensemble.parts()[2].volume, 3.25);
        assert_eq!(ensemble.parts()[1].volume, 1.0);

        apply_action(&mut ensemble, UiAction::Seek(30.0)).unwrap();
        assert!(ensemble.parts().iter().all(|p| p.time == 30.0));

        // Out of range indices are ignored.
        apply_action(&mut ensemble, UiAction::SetPartVolume(9, 2.0)).unwrap();
    }

    #[test]
    fn test_part_marker_moves_only_that_emitter() {
        let mut ensemble = quartet();
        let mut listener = ListenerPose::default();
        let mapping = StageMapping::new(STAGE_WIDTH, STAGE_HEIGHT, 100.0);

        let coordinates = mapping.to_screen(Vec3::new(1.0, 0.0, -0.5));
        apply_stage_event(
            &mut ensemble,
            &mut listener,
            &mapping,
            StageEvent::Moved {
                target: StageTarget::Part(3),
                coordinates,
            },
        );

        assert!((ensemble.parts()[3].emitter - Vec3::new(1.0, 0.0, -0.5)).length() < 1e-4);
        assert_eq!(ensemble.parts()[0].emitter, Vec3::ZERO);
        assert!(ensemble.parts().iter().all(|p| p.listener.is_none()));
    }

    #[test]
    fn test_listener_marker_moves_every_ear() {
        let mut ensemble = quartet();
        let mut listener = ListenerPose::default();
        let mapping = StageMapping::new(STAGE_WIDTH, STAGE_HEIGHT, 100.0);

        let coordinates: Coordinates = mapping.to_screen(Vec3::new(0.0, 0.0, 1.0));
        apply_stage_event(
            &mut ensemble,
            &mut listener,
            &mapping,
            StageEvent::Moved {
                target: StageTarget::Listener,
                coordinates,
            },
        );

        assert!((listener.position - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);
        assert!(ensemble
            .parts()
            .iter()
            .all(|p| p.listener == Some(listener)));
    }
}
