use anyhow::Result;
use log::{info, warn};

use super::part::Track;
use crate::spatial::ListenerPose;

pub const MAX_MASTER_VOLUME: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing,
}

impl PlaybackState {
    /// Text for the play button: the action a click would take.
    pub fn button_label(self) -> &'static str {
        match self {
            PlaybackState::Paused => "Play",
            PlaybackState::Playing => "Pause",
        }
    }
}

/// What the seek slider should show this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekBar {
    pub value: f64,
    /// `None` until the reference part knows its length.
    pub max: Option<f64>,
}

/// Drives every part of an arrangement as one transport.
///
/// The first part is the reference: its clock feeds the seek bar and its end
/// stops the whole ensemble.
pub struct Ensemble<T: Track> {
    parts: Vec<T>,
    state: PlaybackState,
    master_volume: f32,
    known_duration: Option<f64>,
}

impl<T: Track> Ensemble<T> {
    pub fn new(parts: Vec<T>, master_volume: f32) -> Self {
        let mut ensemble = Self {
            parts,
            state: PlaybackState::Paused,
            master_volume: 1.0,
            known_duration: None,
        };
        ensemble.set_master_volume(master_volume);
        ensemble
    }

    pub fn parts(&self) -> &[T] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [T] {
        &mut self.parts
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Starts every part. If any part fails to start, the ones already
    /// running are paused again so the transport stays consistent.
    pub fn play(&mut self) -> Result<()> {
        let failure = self.parts.iter_mut().find_map(|part| match part.play() {
            Ok(()) => None,
            Err(e) => Some(e.context(format!("Part '{}' could not start", part.name()))),
        });
        if let Some(e) = failure {
            warn!("{:#}", e);
            self.pause();
            return Err(e);
        }
        self.state = PlaybackState::Playing;
        info!("Playing {} parts", self.parts.len());
        Ok(())
    }

    pub fn pause(&mut self) {
        for part in &mut self.parts {
            part.pause();
        }
        self.state = PlaybackState::Paused;
        info!("Paused");
    }

    pub fn toggle(&mut self) -> Result<PlaybackState> {
        match self.state {
            PlaybackState::Paused => self.play()?,
            PlaybackState::Playing => self.pause(),
        }
        Ok(self.state)
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, MAX_MASTER_VOLUME);
        for part in &mut self.parts {
            part.set_master_gain(self.master_volume);
        }
    }

    /// Sends every part to the same time. A part that fails to seek is
    /// logged and skipped so the rest stay usable.
    pub fn seek(&mut self, seconds: f64) {
        let seconds = match self.known_duration {
            Some(duration) => seconds.clamp(0.0, duration),
            None => seconds.max(0.0),
        };

        info!("Seeking to {:.2}s", seconds);
        for part in &mut self.parts {
            if let Err(e) = part.time_to(seconds) {
                warn!("Part '{}' could not seek: {:#}", part.name(), e);
            }
        }
    }

    pub fn set_part_volume(&mut self, index: usize, volume: f32) {
        if let Some(part) = self.parts.get_mut(index) {
            part.set_volume(volume);
        }
    }

    pub fn set_listener(&mut self, listener: &ListenerPose) {
        for part in &mut self.parts {
            part.set_listener(listener);
        }
    }

    /// Per-frame bookkeeping. Picks up a newly known duration, pauses when
    /// the reference part has finished, and reports the seek bar.
    pub fn tick(&mut self) -> SeekBar {
        let Some(reference) = self.parts.first() else {
            return SeekBar { value: 0.0, max: None };
        };

        let duration = reference.duration();
        if duration != self.known_duration {
            if let Some(seconds) = duration {
                info!("Duration of '{}' is {:.2}s", reference.name(), seconds);
            }
            self.known_duration = duration;
        }

        let ended = reference.has_ended();
        let mut value = reference.current_time();
        if let Some(max) = self.known_duration {
            value = value.min(max);
        }

        if ended && self.state == PlaybackState::Playing {
            info!("'{}' ended", reference.name());
            self.pause();
        }

        SeekBar {
            value,
            max: self.known_duration,
        }
    }
}
