//! Tone synthesis configuration and constants.

use thiserror::Error;

/// Rejected tone configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToneConfigError {
    #[error("{field} must be a positive, finite duration (got {value}s)")]
    Duration { field: &'static str, value: f32 },

    #[error("{field} must lie in [0, 1] (got {value})")]
    Gain { field: &'static str, value: f32 },

    #[error("{field} must be a positive, finite frequency (got {value} Hz)")]
    Frequency { field: &'static str, value: f32 },
}

/// Envelope and level settings for the binaural tone and the phase chime
#[derive(Debug, Clone)]
pub struct ToneConfig {
    /// Continuous tone fade-in window (seconds)
    pub fade_in_s: f32,

    /// Continuous tone fade-out window (seconds)
    pub fade_out_s: f32,

    /// Per-ear gain of the continuous tone once faded in (0..1)
    pub tone_gain: f32,

    /// Master output gain at startup (0..1)
    pub master_gain: f32,

    /// Time constant for master volume changes (seconds)
    /// ~63% of the way to the target after one constant
    pub master_smoothing_s: f32,

    /// Chime settings
    pub chime: ChimeConfig,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            fade_in_s: 2.0,
            fade_out_s: 0.5,
            tone_gain: 0.3, // Soft: two ears sum well under the limiter
            master_gain: 0.5,
            master_smoothing_s: 0.1,
            chime: ChimeConfig::default(),
        }
    }
}

impl ToneConfig {
    /// Validate configuration (positive windows, gains within unit range)
    pub fn validate(&self) -> Result<(), ToneConfigError> {
        positive_duration("fade_in_s", self.fade_in_s)?;
        positive_duration("fade_out_s", self.fade_out_s)?;
        positive_duration("master_smoothing_s", self.master_smoothing_s)?;
        unit_gain("tone_gain", self.tone_gain)?;
        unit_gain("master_gain", self.master_gain)?;
        self.chime.validate()
    }
}

/// One-shot percussive chime marking a phase boundary
#[derive(Debug, Clone)]
pub struct ChimeConfig {
    /// Starting pitch (Hz), A5
    pub start_hz: f32,

    /// Pitch reached at the end of the glide (Hz), A4
    pub end_hz: f32,

    /// Duration of the exponential pitch glide (seconds)
    pub glide_s: f32,

    /// Peak gain reached at the end of the attack (0..1)
    pub peak_gain: f32,

    /// Linear attack time (seconds)
    pub attack_s: f32,

    /// Gain the exponential decay lands on ("near silence")
    pub floor_gain: f32,

    /// Total chime length; the oscillator is stopped here (seconds)
    pub length_s: f32,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            start_hz: 880.0,
            end_hz: 440.0,
            glide_s: 1.5,
            peak_gain: 0.1,
            attack_s: 0.1,
            floor_gain: 0.001,
            length_s: 2.0,
        }
    }
}

impl ChimeConfig {
    pub fn validate(&self) -> Result<(), ToneConfigError> {
        positive_frequency("chime.start_hz", self.start_hz)?;
        positive_frequency("chime.end_hz", self.end_hz)?;
        positive_duration("chime.glide_s", self.glide_s)?;
        positive_duration("chime.attack_s", self.attack_s)?;
        positive_duration("chime.length_s", self.length_s)?;
        unit_gain("chime.peak_gain", self.peak_gain)?;
        // Exponential ramps cannot reach zero
        if self.floor_gain <= 0.0 || self.floor_gain >= self.peak_gain {
            return Err(ToneConfigError::Gain {
                field: "chime.floor_gain",
                value: self.floor_gain,
            });
        }
        if self.attack_s >= self.length_s {
            return Err(ToneConfigError::Duration {
                field: "chime.attack_s",
                value: self.attack_s,
            });
        }
        Ok(())
    }
}

fn positive_duration(field: &'static str, value: f32) -> Result<(), ToneConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ToneConfigError::Duration { field, value })
    }
}

fn positive_frequency(field: &'static str, value: f32) -> Result<(), ToneConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ToneConfigError::Frequency { field, value })
    }
}

fn unit_gain(field: &'static str, value: f32) -> Result<(), ToneConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ToneConfigError::Gain { field, value })
    }
}

/// Audio constants shared by the mixer and the output backends
pub mod audio_constants {
    /// Sample rate used for offline rendering and before a device is acquired (Hz)
    pub const OFFLINE_SAMPLE_RATE_HZ: u32 = 44_100;

    /// Output channels produced by the mixer (interleaved stereo)
    pub const MIXER_CHANNELS: u16 = 2;

    /// Safety limiter: hard clip to ±0.5 to prevent ear damage
    pub const OUTPUT_LIMIT: f32 = 0.5;

    /// Offline render block size (frames per mixer pull)
    /// 1024 = 23ms @ 44.1kHz
    pub const BLOCK_SIZE: usize = 1024;
}
