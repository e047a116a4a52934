use crossbeam_channel::{Sender, TrySendError};
use rodio::source::SeekError;
use rodio::Source;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mono frames collected before a chunk is handed to the analyser.
pub const TAP_CHUNK_FRAMES: usize = 256;

/// Playback position shared between the audio thread and the UI.
///
/// Counts interleaved samples as the output pulls them, so it follows what
/// the device has consumed rather than wall-clock time.
#[derive(Debug)]
pub struct Playhead {
    samples: AtomicU64,
    channels: AtomicU32,
    sample_rate: AtomicU32,
    ended: AtomicBool,
    dropped_chunks: AtomicU64,
}

impl Playhead {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: AtomicU64::new(0),
            channels: AtomicU32::new(channels.max(1) as u32),
            sample_rate: AtomicU32::new(sample_rate.max(1)),
            ended: AtomicBool::new(false),
            dropped_chunks: AtomicU64::new(0),
        }
    }

    pub fn reset(&self, channels: u16, sample_rate: u32) {
        self.samples.store(0, Ordering::Relaxed);
        self.channels.store(channels.max(1) as u32, Ordering::Relaxed);
        self.sample_rate.store(sample_rate.max(1), Ordering::Relaxed);
        self.ended.store(false, Ordering::Release);
    }

    pub fn seconds(&self) -> f64 {
        let samples = self.samples.load(Ordering::Relaxed) as f64;
        let channels = self.channels.load(Ordering::Relaxed) as f64;
        let rate = self.sample_rate.load(Ordering::Relaxed) as f64;
        samples / channels / rate
    }

    pub fn set_position(&self, position: Duration) {
        let channels = self.channels.load(Ordering::Relaxed) as f64;
        let rate = self.sample_rate.load(Ordering::Relaxed) as f64;
        let samples = (position.as_secs_f64() * rate).round() * channels;
        self.samples.store(samples as u64, Ordering::Relaxed);
        self.ended.store(false, Ordering::Release);
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    fn advance(&self) {
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }

    fn record_drop(&self) {
        self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Passes a source through untouched while advancing a [`Playhead`] and,
/// when a sender is attached, mirroring a mono mixdown to the analyser.
pub struct AnalysisTap<S> {
    input: S,
    playhead: Arc<Playhead>,
    sender: Option<Sender<Vec<f32>>>,
    pending: Vec<f32>,
    frame_sum: f32,
    frame_fill: u16,
}

impl<S> AnalysisTap<S>
where
    S: Source<Item = f32>,
{
    pub fn new(input: S, playhead: Arc<Playhead>, sender: Option<Sender<Vec<f32>>>) -> Self {
        playhead.reset(input.channels(), input.sample_rate());
        Self {
            input,
            playhead,
            sender,
            pending: Vec::with_capacity(TAP_CHUNK_FRAMES),
            frame_sum: 0.0,
            frame_fill: 0,
        }
    }

    fn mirror(&mut self, sample: f32) {
        let Some(sender) = &self.sender else {
            return;
        };

        let channels = self.input.channels().max(1);
        self.frame_sum += sample;
        self.frame_fill += 1;
        if self.frame_fill < channels {
            return;
        }

        self.pending.push(self.frame_sum / channels as f32);
        self.frame_sum = 0.0;
        self.frame_fill = 0;

        if self.pending.len() >= TAP_CHUNK_FRAMES {
            let chunk = std::mem::replace(&mut self.pending, Vec::with_capacity(TAP_CHUNK_FRAMES));
            match sender.try_send(chunk) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => self.playhead.record_drop(),
                // Part went away; stop mirroring.
                Err(TrySendError::Disconnected(_)) => self.sender = None,
            }
        }
    }
}

impl<S> Iterator for AnalysisTap<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self.input.next() {
            Some(sample) => {
                self.playhead.advance();
                self.mirror(sample);
                Some(sample)
            }
            None => {
                self.playhead.mark_ended();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.input.size_hint()
    }
}

impl<S> Source for AnalysisTap<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.input.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.input.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.input.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.input.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        self.input.try_seek(pos)?;
        self.playhead.set_position(pos);
        self.pending.clear();
        self.frame_sum = 0.0;
        self.frame_fill = 0;
        Ok(())
    }
}
