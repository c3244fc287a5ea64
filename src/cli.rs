//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

use crate::params::{LevelCatalog, LevelError};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "pranaflow")]
#[command(about = "Guided pranayama breathing with binaural tones", long_about = None)]
pub struct Args {
    /// Breathing level to select at startup
    #[arg(long, value_name = "ID", default_value_t = 1)]
    pub level: u32,

    /// Start with sound enabled
    #[arg(long)]
    pub sound: bool,

    /// Master volume (0.0 - 1.0)
    #[arg(long, value_name = "LEVEL", default_value_t = 0.5)]
    pub volume: f32,

    /// Level catalog file (TOML, `[[level]]` tables); built-in levels otherwise
    #[arg(long, value_name = "PATH")]
    pub levels: Option<PathBuf>,

    /// Render a sound-enabled session to WAV instead of running live (duration in seconds)
    #[arg(long, value_name = "SECONDS")]
    pub render: Option<u32>,

    /// WAV path for --render
    #[arg(long, value_name = "PATH", default_value = "pranaflow.wav")]
    pub output: PathBuf,

    /// Run without opening an audio device
    #[arg(long)]
    pub silent: bool,
}

impl Args {
    /// Load the level catalog from --levels, or fall back to the built-in one
    pub fn load_catalog(&self) -> Result<LevelCatalog, LevelError> {
        let catalog = match &self.levels {
            Some(path) => LevelCatalog::load(path)?,
            None => LevelCatalog::default(),
        };
        catalog.require(self.level)?;
        Ok(catalog)
    }

    /// Volume clamped into range
    pub fn master_volume(&self) -> f32 {
        if self.volume.is_nan() {
            return 0.5;
        }
        self.volume.clamp(0.0, 1.0)
    }
}
