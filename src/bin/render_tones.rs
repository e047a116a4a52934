use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use barbershop_stage::config::Arrangement;

#[derive(Parser)]
#[command(name = "render-tones")]
#[command(about = "Writes a synthetic four-part arrangement (WAV files plus manifest) for trying out the stage")]
struct Args {
    /// Directory to write tenor.wav, lead.wav, baritone.wav, bass.wav and arrangement.json into
    #[arg(short, long, default_value = "audio")]
    out: PathBuf,

    /// Length of the whole progression in seconds
    #[arg(long, default_value = "24.0")]
    seconds: f32,

    #[arg(long, default_value = "44100")]
    sample_rate: u32,
}

/// MIDI notes per chord for each part: I - IV - V7 - I in B-flat.
const PROGRESSION: [(&str, &str, [u8; 4]); 4] = [
    ("Tenor", "tenor.wav", [58, 63, 60, 62]),
    ("Lead", "lead.wav", [53, 58, 57, 58]),
    ("Baritone", "baritone.wav", [50, 55, 51, 53]),
    ("Bass", "bass.wav", [46, 51, 53, 46]),
];

fn midi_to_hz(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

/// A soft, slightly vibrato'd voice: a few decaying harmonics under a
/// per-note fade so chord changes don't click.
fn render_voice(notes: &[u8], seconds: f32, sample_rate: u32) -> Vec<i16> {
    let rate = sample_rate as f32;
    let note_len = ((seconds / notes.len() as f32) * rate) as usize;
    let fade = ((0.04 * rate) as usize).min(note_len / 2).max(1);

    let mut samples = Vec::with_capacity(note_len * notes.len());
    let mut phase = 0.0f32;

    for &note in notes {
        let frequency = midi_to_hz(note);
        for i in 0..note_len {
            let t = samples.len() as f32 / rate;
            let vibrato = 1.0 + 0.004 * (2.0 * PI * 5.5 * t).sin();
            phase = (phase + frequency * vibrato / rate).fract();

            let voice: f32 = (1..=5)
                .map(|h| (2.0 * PI * phase * h as f32).sin() / (h * h) as f32)
                .sum();

            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if i > note_len - fade {
                (note_len - i) as f32 / fade as f32
            } else {
                1.0
            };

            samples.push((voice * envelope * 0.25 * i16::MAX as f32) as i16);
        }
    }

    samples
}

fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Rendering demo arrangement into {:?}", args.out);
    fs::create_dir_all(&args.out)?;

    for (name, file, notes) in PROGRESSION {
        let samples = render_voice(&notes, args.seconds, args.sample_rate);
        let path = args.out.join(file);
        write_wav(&path, &samples, args.sample_rate)?;
        info!("{}: {} samples -> {:?}", name, samples.len(), path);
    }

    // Files sit next to the manifest, so keep their paths relative.
    let manifest = Arrangement::barbershop("");
    let manifest_path = args.out.join("arrangement.json");
    fs::write(&manifest_path, manifest.to_json()?)?;
    info!("Wrote {:?}", manifest_path);

    Ok(())
}
