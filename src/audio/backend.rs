//! Audio output backends.
//!
//! A backend owns the hardware side of playback: it is acquired once, pulls
//! frames from the shared mixer, and may sit in a suspended (power-saving)
//! state until resumed.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use super::mixer::{self, SharedMixer};
use crate::params::audio_constants::OFFLINE_SAMPLE_RATE_HZ;

/// Output and rendering failures
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("failed to get audio config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported output sample format {0:?} (need f32)")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to suspend audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("audio output has not been acquired")]
    NotAcquired,

    #[error("audio output disabled")]
    Disabled,

    #[error("wav output failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Hardware lifecycle of an output path
pub trait AudioBackend {
    /// Open the output and start pulling frames from `mixer`.
    ///
    /// The backend sets the mixer's sample rate to the device rate before any
    /// frame is pulled. A freshly acquired output may start out suspended.
    fn acquire(&mut self, mixer: SharedMixer) -> Result<(), AudioError>;

    fn is_acquired(&self) -> bool;

    fn is_suspended(&self) -> bool;

    /// Leave the power-saving state and pull frames again
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Stop pulling frames without closing the output
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Close the output
    fn release(&mut self);
}

/// Default output device through cpal
#[derive(Default)]
pub struct CpalBackend {
    /// Audio output stream (kept alive while acquired)
    stream: Option<cpal::Stream>,
    suspended: bool,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for CpalBackend {
    fn acquire(&mut self, mixer: SharedMixer) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Ok(());
        }

        // Setup audio output device
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = device.default_output_config()?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(config.sample_format()));
        }

        let channels = config.channels() as usize;
        let sample_rate = config.sample_rate().0;
        mixer::lock(&mixer).set_sample_rate(sample_rate);

        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            channels,
            "audio output acquired"
        );

        let callback_mixer = Arc::clone(&mixer);
        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mixer::lock(&callback_mixer).render(data, channels);
            },
            |err| error!(%err, "audio stream error"),
            None,
        )?;

        // Some hosts start streams on creation; hold it until first use
        self.suspended = held_paused(stream.pause());
        self.stream = Some(stream);
        Ok(())
    }

    fn is_acquired(&self) -> bool {
        self.stream.is_some()
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::NotAcquired)?;
        stream.play()?;
        self.suspended = false;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::NotAcquired)?;
        stream.pause()?;
        self.suspended = true;
        Ok(())
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            info!("audio output released");
        }
        self.suspended = false;
    }
}

/// Whether a stream is known to be paused after a pause attempt
fn held_paused(result: Result<(), cpal::PauseStreamError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            debug!(%err, "audio stream could not be paused; leaving it running");
            false
        }
    }
}

/// Device-less output; the owner pulls frames from the mixer itself
/// (offline WAV rendering, headless sessions)
#[derive(Debug, Clone)]
pub struct OfflineBackend {
    sample_rate_hz: u32,
    acquired: bool,
    suspended: bool,
}

impl OfflineBackend {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            acquired: false,
            suspended: false,
        }
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new(OFFLINE_SAMPLE_RATE_HZ)
    }
}

impl AudioBackend for OfflineBackend {
    fn acquire(&mut self, mixer: SharedMixer) -> Result<(), AudioError> {
        if !self.acquired {
            mixer::lock(&mixer).set_sample_rate(self.sample_rate_hz);
            self.acquired = true;
        }
        Ok(())
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if !self.acquired {
            return Err(AudioError::NotAcquired);
        }
        self.suspended = false;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        if !self.acquired {
            return Err(AudioError::NotAcquired);
        }
        self.suspended = true;
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
        self.suspended = false;
    }
}

/// Output that refuses to open; the engine then runs silent
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

impl AudioBackend for DisabledBackend {
    fn acquire(&mut self, _mixer: SharedMixer) -> Result<(), AudioError> {
        Err(AudioError::Disabled)
    }

    fn is_acquired(&self) -> bool {
        false
    }

    fn is_suspended(&self) -> bool {
        false
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Err(AudioError::Disabled)
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        Err(AudioError::Disabled)
    }

    fn release(&mut self) {}
}
