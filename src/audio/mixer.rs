//! Voice mixer rendering interleaved frames for the output device.
//!
//! Each voice owns its oscillator, its gain automation and its routing. All
//! voices sum into one shared master gain, which only the engine's volume
//! control writes to.

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::automation::{seconds_to_frames, Automation, Frame};
use crate::params::audio_constants::OUTPUT_LIMIT;

/// Mixer shared between the control thread and the audio callback
pub type SharedMixer = Arc<Mutex<Mixer>>;

/// Lock the shared mixer, recovering the data if a holder panicked
pub fn lock(mixer: &SharedMixer) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a voice inside the mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
}

impl Waveform {
    /// Sample at `phase` cycles (0..1)
    fn sample(self, phase: f64) -> f32 {
        match self {
            Self::Sine => (TAU * phase).sin() as f32,
            // Starts at zero and rises, like the sine
            Self::Triangle => (2.0 * (2.0 * ((phase + 0.75) % 1.0) - 1.0).abs() - 1.0) as f32,
        }
    }
}

/// Output channels a voice feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Panned hard left
    Left,
    /// Panned hard right
    Right,
    /// Mono source, upmixed to both ears
    Both,
}

impl Route {
    fn weights(self) -> (f32, f32) {
        match self {
            Self::Left => (1.0, 0.0),
            Self::Right => (0.0, 1.0),
            Self::Both => (1.0, 1.0),
        }
    }
}

/// Everything needed to start a voice
#[derive(Debug, Clone)]
pub struct VoiceSpec {
    pub waveform: Waveform,
    pub frequency: Automation,
    pub gain: Automation,
    pub route: Route,
    /// Hard stop (frame); the voice is removed once the clock passes it
    pub stop_at: Option<Frame>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MixerError {
    #[error("voice {0:?} has already finished")]
    UnknownVoice(VoiceId),
}

#[derive(Debug)]
struct Voice {
    id: VoiceId,
    spec: VoiceSpec,
    /// Oscillator phase (cycles)
    phase: f64,
}

impl Voice {
    fn next_sample(&mut self, frame: Frame, sample_rate_hz: f64) -> f32 {
        if self.spec.stop_at.is_some_and(|stop| frame >= stop) {
            return 0.0;
        }
        let out = self.spec.waveform.sample(self.phase) * self.spec.gain.value_at(frame);
        let hz = self.spec.frequency.value_at(frame) as f64;
        self.phase = (self.phase + hz / sample_rate_hz) % 1.0;
        out
    }

    fn finished(&self, now: Frame) -> bool {
        self.spec.stop_at.is_some_and(|stop| now >= stop)
    }
}

/// Stereo voice mixer driven by its own sample clock
#[derive(Debug)]
pub struct Mixer {
    sample_rate_hz: u32,
    /// Frames rendered so far; the engine schedules against this clock
    clock: Frame,
    master: Automation,
    voices: Vec<Voice>,
    next_id: u64,
}

impl Mixer {
    pub fn new(sample_rate_hz: u32, master_gain: f32) -> Self {
        Self {
            sample_rate_hz,
            clock: 0,
            master: Automation::new(master_gain),
            voices: Vec::new(),
            next_id: 0,
        }
    }

    pub fn shared(self) -> SharedMixer {
        Arc::new(Mutex::new(self))
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Reconfigure for a device rate; drops all voices and restarts the clock
    ///
    /// Frame positions do not survive the change, so the master lands on the
    /// level it was heading for.
    pub fn set_sample_rate(&mut self, sample_rate_hz: u32) {
        let master = self.master.settled_value();
        self.sample_rate_hz = sample_rate_hz;
        self.clock = 0;
        self.master = Automation::new(master);
        self.voices.clear();
    }

    /// Current sample-clock position
    pub fn now(&self) -> Frame {
        self.clock
    }

    /// Frame that lies `seconds` after now
    pub fn after(&self, seconds: f32) -> Frame {
        self.clock + seconds_to_frames(seconds, self.sample_rate_hz)
    }

    pub fn frames(&self, seconds: f32) -> Frame {
        seconds_to_frames(seconds, self.sample_rate_hz)
    }

    pub fn add_voice(&mut self, spec: VoiceSpec) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.voices.push(Voice {
            id,
            spec,
            phase: 0.0,
        });
        id
    }

    /// Ramp a voice's gain to silence by `end` and stop it there
    pub fn fade_out(&mut self, id: VoiceId, end: Frame) -> Result<(), MixerError> {
        let now = self.clock;
        let voice = self.voice_mut(id)?;
        voice.spec.gain.cancel_and_hold(now);
        voice.spec.gain.linear_ramp_to(0.0, end);
        voice.spec.stop_at = Some(voice.spec.stop_at.map_or(end, |stop| stop.min(end)));
        Ok(())
    }

    /// Fade out every voice (tone pairs and chimes alike)
    pub fn fade_out_all(&mut self, end: Frame) {
        let ids: Vec<VoiceId> = self.voices.iter().map(|v| v.id).collect();
        for id in ids {
            // Every id was just read from the live list
            let _ = self.fade_out(id, end);
        }
    }

    /// Master gain automation; written only through the engine's volume control
    pub fn master_mut(&mut self) -> &mut Automation {
        &mut self.master
    }

    pub fn master_gain(&self) -> f32 {
        self.master.value_at(self.clock)
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|v| v.id == id)
    }

    /// Voices still present (including ones fading out)
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Voices with no scheduled stop, i.e. ones that will keep sounding
    pub fn sustained_voice_count(&self) -> usize {
        self.voices
            .iter()
            .filter(|v| v.spec.stop_at.is_none())
            .count()
    }

    /// Scheduled stop of a voice, if any
    pub fn stop_frame(&self, id: VoiceId) -> Result<Option<Frame>, MixerError> {
        self.voices
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.spec.stop_at)
            .ok_or(MixerError::UnknownVoice(id))
    }

    /// Gain of a voice at a frame, before the master
    pub fn voice_gain_at(&self, id: VoiceId, frame: Frame) -> Result<f32, MixerError> {
        self.voices
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.spec.gain.value_at(frame))
            .ok_or(MixerError::UnknownVoice(id))
    }

    /// Oscillator frequency of a voice at a frame (Hz)
    pub fn voice_frequency_at(&self, id: VoiceId, frame: Frame) -> Result<f32, MixerError> {
        self.voices
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.spec.frequency.value_at(frame))
            .ok_or(MixerError::UnknownVoice(id))
    }

    /// Drop every voice immediately
    pub fn clear(&mut self) {
        self.voices.clear();
    }

    /// Render interleaved frames into `out` for a device with `channels` channels
    ///
    /// Mono devices receive the average of both ears; channels beyond the
    /// first two are left silent.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let sample_rate = self.sample_rate_hz as f64;
        for frame in out.chunks_mut(channels) {
            let (mut left, mut right) = (0.0f32, 0.0f32);
            for voice in &mut self.voices {
                let sample = voice.next_sample(self.clock, sample_rate);
                let (wl, wr) = voice.spec.route.weights();
                left += sample * wl;
                right += sample * wr;
            }

            let master = self.master.value_at(self.clock);
            let left = (left * master).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);
            let right = (right * master).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);

            match frame {
                [mono] => *mono = 0.5 * (left + right),
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
            self.clock += 1;
        }

        let now = self.clock;
        self.voices.retain(|v| !v.finished(now));
        for voice in &mut self.voices {
            voice.spec.gain.prune_before(now);
            voice.spec.frequency.prune_before(now);
        }
        self.master.prune_before(now);
    }

    /// Render `frames` stereo frames into a fresh interleaved buffer
    pub fn render_stereo(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        self.render(&mut out, 2);
        out
    }

    fn voice_mut(&mut self, id: VoiceId) -> Result<&mut Voice, MixerError> {
        self.voices
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(MixerError::UnknownVoice(id))
    }
}
