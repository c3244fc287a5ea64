//! Binaural tone synthesis and audio output.
//!
//! The engine schedules voices on a sample-clocked mixer; a backend pulls
//! frames from that mixer on the device's own thread (cpal) or offline (WAV).

pub mod automation;
mod backend;
mod engine;
pub mod mixer;
pub mod wav;

// Re-export public types
pub use backend::{AudioBackend, AudioError, CpalBackend, DisabledBackend, OfflineBackend};
pub use engine::{ToneControl, ToneEngine};
pub use mixer::{Mixer, SharedMixer, VoiceId};
