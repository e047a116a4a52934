use anyhow::Result;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Rolling spectrum analyser for one part's signal.
///
/// Readouts behave like a browser `AnalyserNode`: the newest `fft_size`
/// samples are Blackman-windowed, transformed, smoothed over time and
/// reported either in decibels or scaled into `0..=255` between
/// `min_decibels` and `max_decibels`.
pub struct SpectrumAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,

    // Ring buffer of the most recent samples; `write_pos` is the oldest.
    history: Vec<f32>,
    write_pos: usize,

    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,

    smoothing_time_constant: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize) -> Result<Self> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            anyhow::bail!(
                "FFT size must be a power of two between {} and {}, got {}",
                MIN_FFT_SIZE,
                MAX_FFT_SIZE,
                fft_size
            );
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            history: vec![0.0; fft_size],
            write_pos: 0,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothing_time_constant: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        })
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let alpha = 0.16;
        let a0 = 0.5 * (1.0 - alpha);
        let a1 = 0.5;
        let a2 = 0.5 * alpha;

        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn set_smoothing_time_constant(&mut self, value: f32) {
        self.smoothing_time_constant = value.clamp(0.0, 1.0);
    }

    pub fn set_decibel_range(&mut self, min_decibels: f32, max_decibels: f32) -> Result<()> {
        if min_decibels >= max_decibels {
            anyhow::bail!(
                "min_decibels ({}) must be below max_decibels ({})",
                min_decibels,
                max_decibels
            );
        }
        self.min_decibels = min_decibels;
        self.max_decibels = max_decibels;
        Ok(())
    }

    /// Appends mono samples, keeping only the newest `fft_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let samples = if samples.len() > self.fft_size {
            &samples[samples.len() - self.fft_size..]
        } else {
            samples
        };

        for &sample in samples {
            self.history[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Clears history and smoothing, e.g. after a seek.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
    }

    fn ordered_history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history[self.write_pos..]
            .iter()
            .chain(self.history[..self.write_pos].iter())
            .copied()
    }

    fn compute_smoothed_spectrum(&mut self) {
        let (newest, oldest) = self.history.split_at(self.write_pos);
        let ordered = oldest.iter().chain(newest.iter());
        for (slot, (sample, w)) in self.scratch.iter_mut().zip(ordered.zip(self.window.iter())) {
            *slot = Complex::new(sample * w, 0.0);
        }

        self.fft.process(&mut self.scratch);

        let tau = self.smoothing_time_constant;
        let scale = 1.0 / self.fft_size as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(self.scratch.iter()) {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
    }

    /// Per-bin level in decibels. Silent bins read as negative infinity.
    pub fn float_frequency_data(&mut self, out: &mut [f32]) {
        self.compute_smoothed_spectrum();
        for (slot, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *slot = 20.0 * magnitude.log10();
        }
    }

    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.compute_smoothed_spectrum();

        let range = self.max_decibels - self.min_decibels;
        for (slot, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            let db = 20.0 * magnitude.log10();
            let scaled = (255.0 / range) * (db - self.min_decibels);
            *slot = if scaled.is_finite() {
                scaled.clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    /// Waveform readout, centred on 128.
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        for (slot, sample) in out.iter_mut().zip(self.ordered_history()) {
            *slot = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_rejects_bad_fft_sizes() {
        assert!(SpectrumAnalyser::new(1000).is_err());
        assert!(SpectrumAnalyser::new(16).is_err());
        assert!(SpectrumAnalyser::new(2048).is_ok());
    }

    #[test]
    fn test_bin_count_is_half_fft_size() {
        let analyser = SpectrumAnalyser::new(2048).unwrap();
        assert_eq!(analyser.frequency_bin_count(), 1024);
    }

    #[test]
    fn test_silence_reads_as_zero_bytes() {
        let mut analyser = SpectrumAnalyser::new(512).unwrap();
        analyser.push_samples(&vec![0.0; 512]);

        let mut bytes = vec![255u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bytes);
        assert!(bytes.iter().all(|&b| b == 0));

        let mut waveform = vec![0u8; 512];
        analyser.byte_time_domain_data(&mut waveform);
        assert!(waveform.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 44100.0;
        let fft_size = 2048;
        // Exactly on bin 64.
        let frequency = 64.0 * sample_rate / fft_size as f32;

        let mut analyser = SpectrumAnalyser::new(fft_size).unwrap();
        analyser.set_smoothing_time_constant(0.0);
        analyser.push_samples(&sine(frequency, sample_rate, fft_size));

        let mut levels = vec![0.0f32; analyser.frequency_bin_count()];
        analyser.float_frequency_data(&mut levels);

        let peak = levels
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);

        let mut bytes = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bytes);
        assert_eq!(bytes[64], 255);
        assert!(bytes[300] < 64);
    }

    #[test]
    fn test_smoothing_rises_gradually() {
        let sample_rate = 44100.0;
        let fft_size = 1024;
        let frequency = 32.0 * sample_rate / fft_size as f32;
        let tone = sine(frequency, sample_rate, fft_size);

        let mut analyser = SpectrumAnalyser::new(fft_size).unwrap();
        analyser.push_samples(&tone);

        let mut first = vec![0.0f32; analyser.frequency_bin_count()];
        analyser.float_frequency_data(&mut first);
        let mut second = vec![0.0f32; analyser.frequency_bin_count()];
        analyser.float_frequency_data(&mut second);

        assert!(second[32] > first[32]);
    }

    #[test]
    fn test_history_keeps_newest_samples() {
        let mut analyser = SpectrumAnalyser::new(32).unwrap();
        let ramp: Vec<f32> = (0..40).map(|i| i as f32 / 100.0).collect();
        analyser.push_samples(&ramp);

        let newest: Vec<f32> = analyser.ordered_history().collect();
        assert_eq!(newest.len(), 32);
        assert_eq!(newest[0], 0.08);
        assert_eq!(newest[31], 0.39);
    }

    #[test]
    fn test_decibel_range_validation() {
        let mut analyser = SpectrumAnalyser::new(256).unwrap();
        assert!(analyser.set_decibel_range(-30.0, -100.0).is_err());
        assert!(analyser.set_decibel_range(-90.0, -10.0).is_ok());
    }
}
