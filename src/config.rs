use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::part::{DEFAULT_PART_VOLUME, MAX_PART_VOLUME};

#[derive(Parser, Debug)]
#[command(name = "barbershop-stage")]
#[command(about = "Plays the parts of an a cappella arrangement on a draggable spatial stage")]
pub struct Args {
    /// Arrangement manifest (JSON). Without one, the four barbershop parts are read from audio/
    pub arrangement: Option<PathBuf>,

    /// Output device name (see --list-devices)
    #[arg(long, short)]
    pub device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Initial master volume (0.0 - 2.0)
    #[arg(long, default_value = "1.0")]
    pub volume: f32,

    /// Stage scale: how many pixels make one unit of audio space
    #[arg(long, default_value = "120.0")]
    pub pixels_per_unit: f32,
}

#[derive(Debug, Error)]
pub enum ArrangementError {
    #[error("failed to read arrangement {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse arrangement {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("arrangement has no parts")]
    NoParts,
    #[error("part '{0}' is listed more than once")]
    DuplicatePart(String),
    #[error("part '{name}' has volume {volume}, expected 0.0..={max}")]
    VolumeOutOfRange { name: String, volume: f32, max: f32 },
}

/// One vocal part as listed in a manifest. Positions are in audio-space units
/// on the stage floor: `[x, z]`, with negative z in front of the listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartConfig {
    pub name: String,
    pub file: PathBuf,
    #[serde(default)]
    pub position: [f32; 2],
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_true")]
    pub spatial: bool,
    #[serde(default = "default_true")]
    pub analyse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Arrangement {
    #[serde(default = "default_title")]
    pub title: String,
    pub parts: Vec<PartConfig>,
    #[serde(default)]
    pub listener: [f32; 2],
}

fn default_volume() -> f32 {
    DEFAULT_PART_VOLUME
}

fn default_true() -> bool {
    true
}

fn default_title() -> String {
    "Untitled arrangement".to_string()
}

impl Arrangement {
    /// Reads a manifest and resolves part files relative to its directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArrangementError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ArrangementError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut arrangement = Self::from_json(&text).map_err(|source| ArrangementError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        arrangement.resolve_files(base);
        arrangement.validate()?;
        Ok(arrangement)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Tenor, Lead, Baritone and Bass in their usual standing order,
    /// fanned out in front of the listener.
    pub fn barbershop<P: AsRef<Path>>(audio_dir: P) -> Self {
        let dir = audio_dir.as_ref();
        let part = |name: &str, file: &str, position: [f32; 2]| PartConfig {
            name: name.to_string(),
            file: dir.join(file),
            position,
            volume: DEFAULT_PART_VOLUME,
            spatial: true,
            analyse: true,
        };

        Self {
            title: "Barbershop quartet".to_string(),
            parts: vec![
                part("Tenor", "tenor.wav", [-1.5, -1.0]),
                part("Lead", "lead.wav", [-0.5, -1.5]),
                part("Baritone", "baritone.wav", [0.5, -1.5]),
                part("Bass", "bass.wav", [1.5, -1.0]),
            ],
            listener: [0.0, 0.0],
        }
    }

    pub fn validate(&self) -> Result<(), ArrangementError> {
        if self.parts.is_empty() {
            return Err(ArrangementError::NoParts);
        }

        let mut seen = HashSet::new();
        for part in &self.parts {
            if !seen.insert(part.name.as_str()) {
                return Err(ArrangementError::DuplicatePart(part.name.clone()));
            }
            if !(0.0..=MAX_PART_VOLUME).contains(&part.volume) {
                return Err(ArrangementError::VolumeOutOfRange {
                    name: part.name.clone(),
                    volume: part.volume,
                    max: MAX_PART_VOLUME,
                });
            }
        }

        Ok(())
    }

    fn resolve_files(&mut self, base: &Path) {
        for part in &mut self.parts {
            if part.file.is_relative() {
                part.file = base.join(&part.file);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_defaults() {
        let json = r#"{
            "parts": [
                { "name": "Lead", "file": "lead.wav" }
            ]
        }"#;

        let arrangement = Arrangement::from_json(json).unwrap();
        let lead = &arrangement.parts[0];
        assert_eq!(arrangement.title, "Untitled arrangement");
        assert_eq!(lead.volume, 1.0);
        assert!(lead.spatial);
        assert!(lead.analyse);
        assert_eq!(lead.position, [0.0, 0.0]);
        assert_eq!(arrangement.listener, [0.0, 0.0]);
    }

    #[test]
    fn test_barbershop_arrangement_is_valid() {
        let arrangement = Arrangement::barbershop("audio");
        assert!(arrangement.validate().is_ok());

        let names: Vec<&str> = arrangement.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Tenor", "Lead", "Baritone", "Bass"]);
        assert_eq!(arrangement.parts[3].file, Path::new("audio").join("bass.wav"));
    }

    #[test]
    fn test_validation_errors() {
        let mut arrangement = Arrangement::barbershop("audio");
        arrangement.parts[1].name = "Tenor".to_string();
        assert!(matches!(
            arrangement.validate(),
            Err(ArrangementError::DuplicatePart(name)) if name == "Tenor"
        ));

        let mut arrangement = Arrangement::barbershop("audio");
        arrangement.parts[0].volume = 4.5;
        assert!(matches!(
            arrangement.validate(),
            Err(ArrangementError::VolumeOutOfRange { .. })
        ));

        let mut arrangement = Arrangement::barbershop("audio");
        arrangement.parts.clear();
        assert!(matches!(arrangement.validate(), Err(ArrangementError::NoParts)));
    }

    #[test]
    fn test_load_resolves_relative_files() {
        let dir = std::env::temp_dir().join(format!("barbershop-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let manifest = dir.join("arrangement.json");

        let arrangement = Arrangement::barbershop("");
        fs::write(&manifest, arrangement.to_json().unwrap()).unwrap();

        let loaded = Arrangement::load(&manifest).unwrap();
        assert_eq!(loaded.parts[0].file, dir.join("tenor.wav"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let result = Arrangement::load("/definitely/not/here.json");
        assert!(matches!(result, Err(ArrangementError::Read { .. })));
    }
}
