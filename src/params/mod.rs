//! Parameter definitions with physical units and documented semantics.
//!
//! All tunable numbers live here with:
//! - Physical units (seconds, Hz, linear gain)
//! - Documented ranges and meanings
//! - Validation where a bad value would break timing or synthesis

mod audio;
mod level;

// Re-export all types
pub use audio::{audio_constants, ChimeConfig, ToneConfig, ToneConfigError};
pub use level::{Level, LevelCatalog, LevelError, PhaseDurations, ToneFrequencies};
