use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use glam::Vec3;
use log::{debug, info, warn};
use rodio::source::SamplesConverter;
use rodio::{Decoder, OutputStreamHandle, Sink, Source, SpatialSink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::analyser::{SpectrumAnalyser, DEFAULT_FFT_SIZE};
use super::probe;
use super::tap::{AnalysisTap, Playhead};
use crate::config::PartConfig;
use crate::spatial::{floor_position, ListenerPose};

pub const DEFAULT_PART_VOLUME: f32 = 1.0;
pub const MAX_PART_VOLUME: f32 = 4.0;

// Chunks of `TAP_CHUNK_FRAMES`; roughly a third of a second at 44.1kHz.
const ANALYSIS_QUEUE_CHUNKS: usize = 64;

/// What the transport needs from one synchronized track.
pub trait Track {
    fn name(&self) -> &str;

    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);

    /// Moves the playhead, clamped to the track's known length.
    fn time_to(&mut self, seconds: f64) -> Result<()>;
    fn current_time(&self) -> f64;
    /// `None` until the length is known.
    fn duration(&self) -> Option<f64>;
    fn has_ended(&self) -> bool;

    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn set_master_gain(&mut self, gain: f32);

    fn set_emitter_position(&mut self, position: Vec3);
    fn set_listener(&mut self, listener: &ListenerPose);
}

enum PartOutput {
    Plain(Sink),
    Spatial(SpatialSink),
}

impl PartOutput {
    fn append<S>(&self, source: S)
    where
        S: Source<Item = f32> + Send + 'static,
    {
        match self {
            PartOutput::Plain(sink) => sink.append(source),
            PartOutput::Spatial(sink) => sink.append(source),
        }
    }

    fn play(&self) {
        match self {
            PartOutput::Plain(sink) => sink.play(),
            PartOutput::Spatial(sink) => sink.play(),
        }
    }

    fn pause(&self) {
        match self {
            PartOutput::Plain(sink) => sink.pause(),
            PartOutput::Spatial(sink) => sink.pause(),
        }
    }

    fn empty(&self) -> bool {
        match self {
            PartOutput::Plain(sink) => sink.empty(),
            PartOutput::Spatial(sink) => sink.empty(),
        }
    }

    fn set_volume(&self, volume: f32) {
        match self {
            PartOutput::Plain(sink) => sink.set_volume(volume),
            PartOutput::Spatial(sink) => sink.set_volume(volume),
        }
    }

    fn try_seek(&self, position: Duration) -> Result<()> {
        let result = match self {
            PartOutput::Plain(sink) => sink.try_seek(position),
            PartOutput::Spatial(sink) => sink.try_seek(position),
        };
        result.map_err(|e| anyhow!("seek to {:?} failed: {:?}", position, e))
    }
}

struct PartAnalyser {
    analyser: SpectrumAnalyser,
    sender: Sender<Vec<f32>>,
    receiver: Receiver<Vec<f32>>,
    bytes: Vec<u8>,
}

/// One vocal part: a decoded file playing into its own sink, with an
/// optional spectrum tap and an optional spatial panner.
pub struct Part {
    name: String,
    path: PathBuf,
    output: PartOutput,
    playhead: Arc<Playhead>,
    analysis: Option<PartAnalyser>,
    volume: f32,
    master_gain: f32,
    duration: Option<Duration>,
    reported_drops: u64,
}

type DecodedSource = SamplesConverter<Decoder<BufReader<File>>, f32>;

impl Part {
    pub fn load(
        handle: &OutputStreamHandle,
        config: &PartConfig,
        listener: &ListenerPose,
    ) -> Result<Self> {
        let output = if config.spatial {
            let emitter = floor_position(config.position);
            PartOutput::Spatial(SpatialSink::try_new(
                handle,
                emitter.to_array(),
                listener.left_ear().to_array(),
                listener.right_ear().to_array(),
            )?)
        } else {
            PartOutput::Plain(Sink::try_new(handle)?)
        };

        Self::with_output(output, config)
    }

    /// Builds a part around an already created sink and queues its file,
    /// paused.
    fn with_output(output: PartOutput, config: &PartConfig) -> Result<Self> {
        output.pause();

        let analysis = if config.analyse {
            let (sender, receiver) = crossbeam_channel::bounded(ANALYSIS_QUEUE_CHUNKS);
            let analyser = SpectrumAnalyser::new(DEFAULT_FFT_SIZE)?;
            let bytes = vec![0; analyser.frequency_bin_count()];
            Some(PartAnalyser {
                analyser,
                sender,
                receiver,
                bytes,
            })
        } else {
            None
        };

        let source = decode(&config.name, &config.file)?;
        let mut part = Self {
            name: config.name.clone(),
            path: config.file.clone(),
            output,
            playhead: Arc::new(Playhead::new(source.channels(), source.sample_rate())),
            analysis,
            volume: config.volume.clamp(0.0, MAX_PART_VOLUME),
            master_gain: 1.0,
            duration: None,
            reported_drops: 0,
        };

        part.duration = part.queue_source(source);
        if part.duration.is_none() {
            part.duration = match probe::track_duration(&part.path) {
                Ok(duration) => duration,
                Err(e) => {
                    warn!("Could not probe duration of {:?}: {:#}", part.path, e);
                    None
                }
            };
        }
        part.apply_gain();

        info!(
            "Loaded part '{}' from {:?} ({}, {})",
            part.name,
            part.path,
            if config.spatial { "spatial" } else { "plain" },
            part.duration
                .map(|d| format!("{:.1}s", d.as_secs_f64()))
                .unwrap_or_else(|| "unknown length".to_string()),
        );

        Ok(part)
    }

    /// Appends a freshly decoded source to the sink, tapped for position and
    /// analysis.
    fn queue_source(&mut self, source: DecodedSource) -> Option<Duration> {
        let duration = source.total_duration();

        let sender = self.analysis.as_ref().map(|a| a.sender.clone());
        if let Some(analysis) = &mut self.analysis {
            analysis.analyser.reset();
        }

        self.output
            .append(AnalysisTap::new(source, self.playhead.clone(), sender));
        duration
    }

    /// Decodes the file again from the start, after the last copy ran out.
    fn requeue(&mut self) -> Result<()> {
        debug!("Part '{}' finished, queueing from the start", self.name);
        let source = decode(&self.name, &self.path)?;
        self.queue_source(source);
        Ok(())
    }

    fn apply_gain(&self) {
        self.output.set_volume(self.volume * self.master_gain);
    }

    /// Pulls whatever the audio thread has mirrored since the last frame and
    /// recomputes the byte frequency readout.
    pub fn refresh_spectrum(&mut self) {
        let Some(analysis) = self.analysis.as_mut() else {
            return;
        };

        // The readout follows the part's own volume but not the master gain.
        let volume = self.volume;
        for mut chunk in analysis.receiver.try_iter() {
            chunk.iter_mut().for_each(|sample| *sample *= volume);
            analysis.analyser.push_samples(&chunk);
        }
        analysis.analyser.byte_frequency_data(&mut analysis.bytes);

        let drops = self.playhead.dropped_chunks();
        if drops > self.reported_drops {
            warn!(
                "Part '{}' dropped {} analysis chunks",
                self.name,
                drops - self.reported_drops
            );
            self.reported_drops = drops;
        }
    }

    /// Latest readout, one value per frequency bin. `None` for parts
    /// loaded without analysis.
    pub fn spectrum(&self) -> Option<&[u8]> {
        self.analysis.as_ref().map(|a| a.bytes.as_slice())
    }
}

fn decode(name: &str, path: &Path) -> Result<DecodedSource> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open audio for part '{}': {:?}", name, path))?;
    let source = Decoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode {:?}", path))?
        .convert_samples::<f32>();
    Ok(source)
}

impl Track for Part {
    fn name(&self) -> &str {
        &self.name
    }

    fn play(&mut self) -> Result<()> {
        if self.output.empty() {
            self.requeue()?;
        }
        self.output.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.output.pause();
    }

    fn time_to(&mut self, seconds: f64) -> Result<()> {
        let mut seconds = seconds.max(0.0);
        if let Some(duration) = self.duration {
            seconds = seconds.min(duration.as_secs_f64());
        }

        if self.output.empty() {
            self.requeue()?;
        }

        self.output.try_seek(Duration::from_secs_f64(seconds))?;
        if let Some(analysis) = &mut self.analysis {
            analysis.analyser.reset();
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.playhead.seconds()
    }

    fn duration(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64())
    }

    fn has_ended(&self) -> bool {
        self.playhead.has_ended() || self.output.empty()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_PART_VOLUME);
        self.apply_gain();
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain.max(0.0);
        self.apply_gain();
    }

    fn set_emitter_position(&mut self, position: Vec3) {
        if let PartOutput::Spatial(sink) = &self.output {
            debug!("Part '{}' emitter at {:?}", self.name, position);
            sink.set_emitter_position(position.to_array());
        }
    }

    fn set_listener(&mut self, listener: &ListenerPose) {
        if let PartOutput::Spatial(sink) = &self.output {
            sink.set_left_ear_position(listener.left_ear().to_array());
            sink.set_right_ear_position(listener.right_ear().to_array());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodio::queue::SourcesQueueOutput;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    const RATE: u32 = 8000;
    // 2000 frames.
    const SECONDS: f64 = 0.25;

    /// Stands in for the output device: pulls the sink's queue on a thread
    /// while `running` is set.
    struct Output {
        running: Arc<AtomicBool>,
        stop: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl Output {
        fn start(mut queue: SourcesQueueOutput<f32>) -> Self {
            let running = Arc::new(AtomicBool::new(true));
            let stop = Arc::new(AtomicBool::new(false));
            let handle = {
                let running = running.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        if running.load(Ordering::Relaxed) {
                            for _ in 0..256 {
                                queue.next();
                            }
                        }
                        thread::yield_now();
                    }
                })
            };
            Self {
                running,
                stop,
                handle: Some(handle),
            }
        }

        fn hold(&self) {
            self.running.store(false, Ordering::Relaxed);
            // Let an in-flight batch finish.
            thread::sleep(Duration::from_millis(20));
        }

        fn resume(&self) {
            self.running.store(true, Ordering::Relaxed);
        }
    }

    impl Drop for Output {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn write_tone(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "barbershop-part-{}-{}.wav",
            tag,
            std::process::id()
        ));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let frames = (RATE as f64 * SECONDS) as usize;
        for i in 0..frames {
            let t = i as f32 / RATE as f32;
            let sample = 0.5 * (2.0 * std::f32::consts::PI * 500.0 * t).sin();
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn idle_part(path: &Path, volume: f32) -> (Part, Output) {
        let config = PartConfig {
            name: "Lead".to_string(),
            file: path.to_path_buf(),
            position: [0.0, 0.0],
            volume,
            spatial: false,
            analyse: true,
        };
        let (sink, queue) = Sink::new_idle();
        let output = Output::start(queue);
        let part = Part::with_output(PartOutput::Plain(sink), &config).unwrap();
        (part, output)
    }

    fn sink_volume(part: &Part) -> f32 {
        match &part.output {
            PartOutput::Plain(sink) => sink.volume(),
            PartOutput::Spatial(sink) => sink.volume(),
        }
    }

    fn wait_until_ended(part: &Part) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !part.has_ended() {
            assert!(Instant::now() < deadline, "part never finished");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_loads_paused_with_known_duration() {
        let path = write_tone("load");
        let (part, _output) = idle_part(&path, 1.0);

        thread::sleep(Duration::from_millis(20));
        assert!(!part.has_ended());
        assert_eq!(part.current_time(), 0.0);
        let duration = part.duration().unwrap();
        assert!((duration - SECONDS).abs() < 1e-3);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_sink_volume_is_part_volume_times_master() {
        let path = write_tone("gain");
        let (mut part, _output) = idle_part(&path, 7.0);
        assert_eq!(part.volume(), MAX_PART_VOLUME);

        part.set_volume(1.5);
        part.set_master_gain(0.5);
        assert!((sink_volume(&part) - 0.75).abs() < 1e-6);

        part.set_master_gain(2.0);
        assert!((sink_volume(&part) - 3.0).abs() < 1e-6);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_time_to_clamps_to_track() {
        let path = write_tone("seek");
        let (mut part, _output) = idle_part(&path, 1.0);

        part.time_to(0.1).unwrap();
        assert!((part.current_time() - 0.1).abs() < 1e-3);

        part.time_to(100.0).unwrap();
        assert!((part.current_time() - SECONDS).abs() < 1e-3);

        part.time_to(-3.0).unwrap();
        assert_eq!(part.current_time(), 0.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_play_after_end_starts_over() {
        let path = write_tone("replay");
        let (mut part, output) = idle_part(&path, 1.0);

        part.play().unwrap();
        wait_until_ended(&part);
        assert!((part.current_time() - SECONDS).abs() < 1e-3);

        output.hold();
        part.play().unwrap();
        assert!(!part.has_ended());
        assert_eq!(part.current_time(), 0.0);

        output.resume();
        wait_until_ended(&part);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_spectrum_follows_part_volume() {
        let path = write_tone("spectrum");
        let (mut loud, _loud_output) = idle_part(&path, 1.0);
        let (mut muted, _muted_output) = idle_part(&path, 0.0);

        loud.play().unwrap();
        muted.play().unwrap();
        wait_until_ended(&loud);
        wait_until_ended(&muted);

        loud.refresh_spectrum();
        muted.refresh_spectrum();

        let loud_peak = loud.spectrum().unwrap().iter().copied().max().unwrap();
        assert!(loud_peak > 0);
        assert!(muted.spectrum().unwrap().iter().all(|&b| b == 0));

        std::fs::remove_file(&path).unwrap();
    }
}
