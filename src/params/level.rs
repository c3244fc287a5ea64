//! Breathing level catalog.
//!
//! Levels are immutable once loaded. The controller selects one by id and
//! never mutates it.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Level catalog failures
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("no level with id {0}")]
    UnknownLevel(u32),

    #[error("failed to read level catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse level catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid level catalog: {0}")]
    Invalid(String),
}

/// Seconds spent in each breathing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PhaseDurations {
    /// Inhale length (seconds)
    pub inhale: u32,

    /// Breath-hold length (seconds)
    pub hold: u32,

    /// Exhale length (seconds)
    pub exhale: u32,
}

impl PhaseDurations {
    /// Length of one full inhale/hold/exhale cycle (seconds)
    pub fn total(&self) -> u32 {
        self.inhale + self.hold + self.exhale
    }
}

/// Binaural tone pair for a level
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ToneFrequencies {
    /// Left ear carrier (Hz)
    pub base_hz: f32,

    /// Right ear offset above the carrier (Hz); equals the perceived beat
    pub binaural_hz: f32,
}

impl ToneFrequencies {
    /// Right ear frequency (Hz)
    pub fn right_hz(&self) -> f32 {
        self.base_hz + self.binaural_hz
    }
}

/// One breathing level
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Level {
    pub id: u32,
    pub name: String,

    /// Inhale:hold:exhale ratio label, e.g. "1:1:2"
    pub ratio: String,

    #[serde(default)]
    pub description: String,

    pub phases: PhaseDurations,
    pub frequency: ToneFrequencies,
}

impl Level {
    /// Full cycle duration (seconds), derived from the phase durations
    pub fn total_duration(&self) -> u32 {
        self.phases.total()
    }

    fn validate(&self) -> Result<(), LevelError> {
        let p = &self.phases;
        if p.inhale == 0 || p.hold == 0 || p.exhale == 0 {
            return Err(LevelError::Invalid(format!(
                "level {} has a zero-length phase",
                self.id
            )));
        }
        let f = &self.frequency;
        let valid = |hz: f32| hz.is_finite() && hz > 0.0;
        if !valid(f.base_hz) || !valid(f.binaural_hz) {
            return Err(LevelError::Invalid(format!(
                "level {} needs positive, finite frequencies (got {} Hz + {} Hz)",
                self.id, f.base_hz, f.binaural_hz
            )));
        }
        Ok(())
    }
}

/// Ordered, non-empty list of levels with unique ids
#[derive(Debug, Clone, PartialEq)]
pub struct LevelCatalog {
    levels: Vec<Level>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(rename = "level")]
    levels: Vec<Level>,
}

impl LevelCatalog {
    /// Build a catalog, rejecting empty lists, duplicate ids and unusable levels
    pub fn new(levels: Vec<Level>) -> Result<Self, LevelError> {
        if levels.is_empty() {
            return Err(LevelError::Invalid("catalog has no levels".to_string()));
        }
        let mut seen = HashSet::new();
        for level in &levels {
            if !seen.insert(level.id) {
                return Err(LevelError::Invalid(format!(
                    "duplicate level id {}",
                    level.id
                )));
            }
            level.validate()?;
        }
        Ok(Self { levels })
    }

    /// Parse a catalog from TOML (`[[level]]` tables)
    pub fn from_toml_str(text: &str) -> Result<Self, LevelError> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::new(file.levels)
    }

    /// Load a catalog from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, id: u32) -> Option<&Level> {
        self.levels.iter().find(|level| level.id == id)
    }

    /// Level by id, or an error naming the missing id
    pub fn require(&self, id: u32) -> Result<&Level, LevelError> {
        self.get(id).ok_or(LevelError::UnknownLevel(id))
    }

    /// First level in catalog order (the default selection)
    pub fn first(&self) -> &Level {
        // Non-empty by construction
        &self.levels[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Default for LevelCatalog {
    /// Built-in three-tier catalog
    fn default() -> Self {
        Self {
            levels: vec![
                Level {
                    id: 1,
                    name: "Beginner".to_string(),
                    ratio: "1:1:2".to_string(),
                    description: "Healing & Balance (528 Hz)".to_string(),
                    phases: PhaseDurations {
                        inhale: 4,
                        hold: 4,
                        exhale: 8,
                    },
                    frequency: ToneFrequencies {
                        base_hz: 528.0,
                        binaural_hz: 5.0, // Theta/alpha border
                    },
                },
                Level {
                    id: 2,
                    name: "Intermediate".to_string(),
                    ratio: "1:2:2".to_string(),
                    description: "Grounding & Peace (432 Hz)".to_string(),
                    phases: PhaseDurations {
                        inhale: 4,
                        hold: 8,
                        exhale: 8,
                    },
                    frequency: ToneFrequencies {
                        base_hz: 432.0,
                        binaural_hz: 4.0, // Theta
                    },
                },
                Level {
                    id: 3,
                    name: "Advanced".to_string(),
                    ratio: "1:4:2".to_string(),
                    description: "Deep Release (174 Hz + 7.83 Hz)".to_string(),
                    phases: PhaseDurations {
                        inhale: 4,
                        hold: 16,
                        exhale: 8,
                    },
                    frequency: ToneFrequencies {
                        base_hz: 174.0,
                        binaural_hz: 7.83, // Schumann resonance
                    },
                },
            ],
        }
    }
}
