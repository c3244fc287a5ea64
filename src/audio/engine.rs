//! Binaural tone engine.
//!
//! Knows nothing about breathing phases: it plays a continuous left/right
//! tone pair, one-shot chimes, and follows a master volume. Every change is
//! scheduled on the mixer's sample clock, so no call ever waits for a fade.

use tracing::{debug, info, warn};

use super::automation::Automation;
use super::backend::{AudioBackend, AudioError};
use super::mixer::{self, Mixer, Route, SharedMixer, VoiceId, VoiceSpec, Waveform};
use crate::params::audio_constants::OFFLINE_SAMPLE_RATE_HZ;
use crate::params::ToneConfig;

/// Audio commands issued by the cycle controller
///
/// Implementations must never fail outward: problems are logged and the
/// command degrades to silence.
pub trait ToneControl {
    /// Replace any running tone pair with `base_hz` left and `base_hz + offset_hz` right
    fn start_continuous_tone(&mut self, base_hz: f32, offset_hz: f32);

    /// Fade out the running tone pair, if any
    fn stop_continuous_tone(&mut self);

    /// Fire-and-forget phase boundary chime
    fn play_chime(&mut self);

    /// Smoothly move the shared output gain toward `level` (0..1)
    fn set_master_volume(&mut self, level: f32);

    /// Fade out everything: the tone pair and any chime still ringing
    fn stop_all(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Unacquired,
    Ready,
    /// Acquisition failed; play nothing, keep the rest of the app running
    Unavailable,
}

/// Voices of the active tone pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContinuousSession {
    left: VoiceId,
    right: VoiceId,
}

/// Owned audio service with an explicit acquire/release lifecycle
pub struct ToneEngine {
    config: ToneConfig,
    mixer: SharedMixer,
    backend: Box<dyn AudioBackend>,
    output: Output,
    /// At most one tone pair exists at a time
    session: Option<ContinuousSession>,
}

impl ToneEngine {
    /// Create an engine; the output is acquired lazily on first use
    pub fn new(config: ToneConfig, backend: Box<dyn AudioBackend>) -> Self {
        let mixer = Mixer::new(OFFLINE_SAMPLE_RATE_HZ, config.master_gain).shared();
        Self {
            config,
            mixer,
            backend,
            output: Output::Unacquired,
            session: None,
        }
    }

    /// Acquire the output now rather than on the first sound
    pub fn acquire(&mut self) -> Result<(), AudioError> {
        if self.output == Output::Ready {
            return Ok(());
        }
        match self.backend.acquire(self.mixer.clone()) {
            Ok(()) => {
                self.output = Output::Ready;
                Ok(())
            }
            Err(err) => {
                self.output = Output::Unavailable;
                Err(err)
            }
        }
    }

    /// Close the output and forget every voice
    pub fn release(&mut self) {
        self.session = None;
        mixer::lock(&self.mixer).clear();
        if self.backend.is_acquired() {
            self.backend.release();
        }
        self.output = Output::Unacquired;
    }

    /// Put the output into its power-saving state; the next sound resumes it
    pub fn suspend(&mut self) {
        if self.output != Output::Ready {
            return;
        }
        if let Err(err) = self.backend.suspend() {
            debug!(%err, "audio output did not suspend");
        }
    }

    /// Shared mixer, for callers that pull frames themselves
    pub fn mixer(&self) -> SharedMixer {
        self.mixer.clone()
    }

    pub fn config(&self) -> &ToneConfig {
        &self.config
    }

    /// A tone pair is logically playing (fades in flight do not count)
    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Left and right voices of the active tone pair
    pub fn continuous_voices(&self) -> Option<(VoiceId, VoiceId)> {
        self.session.map(|s| (s.left, s.right))
    }

    /// Make sure the output is acquired and running; false means play nothing
    fn ensure_output(&mut self) -> bool {
        match self.output {
            Output::Unavailable => return false,
            Output::Unacquired => {
                if let Err(err) = self.acquire() {
                    warn!(%err, "audio output unavailable; continuing without sound");
                    return false;
                }
            }
            Output::Ready => {}
        }
        if self.backend.is_suspended() {
            if let Err(err) = self.backend.resume() {
                warn!(%err, "failed to resume audio output");
            }
        }
        true
    }

    fn tone_voice(&self, mixer: &Mixer, hz: f32, route: Route) -> VoiceSpec {
        let now = mixer.now();
        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, now);
        gain.linear_ramp_to(self.config.tone_gain, mixer.after(self.config.fade_in_s));
        VoiceSpec {
            waveform: Waveform::Sine,
            frequency: Automation::new(hz),
            gain,
            route,
            stop_at: None,
        }
    }

    fn chime_voice(&self, mixer: &Mixer) -> VoiceSpec {
        let chime = &self.config.chime;
        let now = mixer.now();

        let mut frequency = Automation::new(chime.start_hz);
        frequency.set_value_at(chime.start_hz, now);
        frequency.exponential_ramp_to(chime.end_hz, mixer.after(chime.glide_s));

        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, now);
        gain.linear_ramp_to(chime.peak_gain, mixer.after(chime.attack_s));
        gain.exponential_ramp_to(chime.floor_gain, mixer.after(chime.length_s));

        VoiceSpec {
            waveform: Waveform::Triangle,
            frequency,
            gain,
            route: Route::Both,
            stop_at: Some(mixer.after(chime.length_s)),
        }
    }
}

impl ToneControl for ToneEngine {
    fn start_continuous_tone(&mut self, base_hz: f32, offset_hz: f32) {
        let usable = |hz: f32| hz.is_finite() && hz > 0.0;
        if !usable(base_hz) || !usable(offset_hz) {
            warn!(base_hz, offset_hz, "ignoring tone with unusable frequencies");
            return;
        }

        // Old pair's fade-out is scheduled before the new pair exists
        self.stop_continuous_tone();
        if !self.ensure_output() {
            return;
        }

        let mut mixer = mixer::lock(&self.mixer);
        let left = self.tone_voice(&mixer, base_hz, Route::Left);
        let right = self.tone_voice(&mixer, base_hz + offset_hz, Route::Right);
        let session = ContinuousSession {
            left: mixer.add_voice(left),
            right: mixer.add_voice(right),
        };
        drop(mixer);

        self.session = Some(session);
        info!(base_hz, beat_hz = offset_hz, "binaural tone started");
    }

    fn stop_continuous_tone(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let mut mixer = mixer::lock(&self.mixer);
        let end = mixer.after(self.config.fade_out_s);
        for id in [session.left, session.right] {
            if let Err(err) = mixer.fade_out(id, end) {
                debug!(%err, "tone voice already gone");
            }
        }
        debug!("binaural tone fading out");
    }

    fn play_chime(&mut self) {
        if !self.ensure_output() {
            return;
        }
        let mut mixer = mixer::lock(&self.mixer);
        let chime = self.chime_voice(&mixer);
        mixer.add_voice(chime);
    }

    fn set_master_volume(&mut self, level: f32) {
        if level.is_nan() {
            return;
        }
        let level = level.clamp(0.0, 1.0);
        let mut mixer = mixer::lock(&self.mixer);
        let now = mixer.now();
        let tau = mixer.frames(self.config.master_smoothing_s);
        mixer.master_mut().set_target_at(level, now, tau);
    }

    fn stop_all(&mut self) {
        self.stop_continuous_tone();
        let mut mixer = mixer::lock(&self.mixer);
        let end = mixer.after(self.config.fade_out_s);
        mixer.fade_out_all(end);
    }
}

impl Drop for ToneEngine {
    fn drop(&mut self) {
        if self.backend.is_acquired() {
            self.backend.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const RATE: u32 = 1_000;

    /// Backend double recording lifecycle calls
    #[derive(Default, Clone)]
    struct Probe {
        acquires: Rc<Cell<u32>>,
        resumes: Rc<Cell<u32>>,
        releases: Rc<Cell<u32>>,
        suspended: Rc<Cell<bool>>,
        fail_acquire: bool,
    }

    struct ProbeBackend(Probe);

    impl AudioBackend for ProbeBackend {
        fn acquire(&mut self, mixer: SharedMixer) -> Result<(), AudioError> {
            self.0.acquires.set(self.0.acquires.get() + 1);
            if self.0.fail_acquire {
                return Err(AudioError::NoOutputDevice);
            }
            mixer::lock(&mixer).set_sample_rate(RATE);
            // Starts suspended, like a fresh browser audio context
            self.0.suspended.set(true);
            Ok(())
        }

        fn is_acquired(&self) -> bool {
            self.0.acquires.get() > self.0.releases.get() && !self.0.fail_acquire
        }

        fn is_suspended(&self) -> bool {
            self.0.suspended.get()
        }

        fn resume(&mut self) -> Result<(), AudioError> {
            self.0.resumes.set(self.0.resumes.get() + 1);
            self.0.suspended.set(false);
            Ok(())
        }

        fn suspend(&mut self) -> Result<(), AudioError> {
            self.0.suspended.set(true);
            Ok(())
        }

        fn release(&mut self) {
            self.0.releases.set(self.0.releases.get() + 1);
        }
    }

    fn engine() -> (ToneEngine, Probe) {
        let probe = Probe::default();
        let engine = ToneEngine::new(
            ToneConfig::default(),
            Box::new(ProbeBackend(probe.clone())),
        );
        (engine, probe)
    }

    fn render_seconds(engine: &ToneEngine, seconds: f32) {
        let mixer = engine.mixer();
        let mut mixer = mixer::lock(&mixer);
        let frames = mixer.frames(seconds) as usize;
        mixer.render_stereo(frames);
    }

    #[test]
    fn test_tone_pair_frequencies_and_fade_in() {
        let (mut engine, probe) = engine();
        engine.start_continuous_tone(528.0, 5.0);

        let (left, right) = engine.continuous_voices().unwrap();
        let mixer = engine.mixer();
        let mixer = mixer::lock(&mixer);
        assert_eq!(mixer.voice_frequency_at(left, 0), Ok(528.0));
        assert_eq!(mixer.voice_frequency_at(right, 0), Ok(533.0));

        // Silent at start, halfway at 1s, full (0.3) after the 2s fade
        for id in [left, right] {
            assert_eq!(mixer.voice_gain_at(id, 0), Ok(0.0));
            assert!((mixer.voice_gain_at(id, 1_000).unwrap() - 0.15).abs() < 1e-4);
            assert!((mixer.voice_gain_at(id, 2_000).unwrap() - 0.3).abs() < 1e-4);
        }
        assert_eq!(probe.acquires.get(), 1);
        assert_eq!(probe.resumes.get(), 1);
    }

    #[test]
    fn test_restart_never_overlaps_two_sustained_pairs() {
        let (mut engine, _) = engine();
        engine.start_continuous_tone(528.0, 5.0);
        render_seconds(&engine, 1.0);
        let (old_left, old_right) = engine.continuous_voices().unwrap();

        engine.start_continuous_tone(432.0, 4.0);
        let (new_left, new_right) = engine.continuous_voices().unwrap();
        assert_ne!(old_left, new_left);

        {
            let mixer = engine.mixer();
            let mixer = mixer::lock(&mixer);
            assert_eq!(mixer.voice_count(), 4);
            assert_eq!(mixer.sustained_voice_count(), 2);
            assert_eq!(mixer.stop_frame(old_left), Ok(Some(1_500)));
            assert_eq!(mixer.stop_frame(old_right), Ok(Some(1_500)));
            assert_eq!(mixer.stop_frame(new_right), Ok(None));
        }

        render_seconds(&engine, 0.5);
        let mixer = engine.mixer();
        let mixer = mixer::lock(&mixer);
        assert_eq!(mixer.voice_count(), 2);
        assert!(mixer.contains(new_left) && mixer.contains(new_right));
    }

    #[test]
    fn test_stop_fades_out_from_current_level() {
        let (mut engine, _) = engine();
        engine.start_continuous_tone(174.0, 7.83);
        render_seconds(&engine, 1.0);
        let (left, _) = engine.continuous_voices().unwrap();

        engine.stop_continuous_tone();
        assert!(!engine.is_playing());

        let mixer = engine.mixer();
        let mixer = mixer::lock(&mixer);
        // Held at the mid-fade-in level, then down to zero over 0.5s
        assert!((mixer.voice_gain_at(left, 1_000).unwrap() - 0.15).abs() < 1e-4);
        assert!((mixer.voice_gain_at(left, 1_250).unwrap() - 0.075).abs() < 1e-4);
        assert_eq!(mixer.voice_gain_at(left, 1_500), Ok(0.0));
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let (mut engine, probe) = engine();
        engine.stop_continuous_tone();
        assert!(!engine.is_playing());
        assert_eq!(probe.acquires.get(), 0);
    }

    #[test]
    fn test_teardown_of_vanished_voices_is_swallowed() {
        let (mut engine, _) = engine();
        engine.start_continuous_tone(528.0, 5.0);
        mixer::lock(&engine.mixer()).clear();

        engine.stop_continuous_tone();
        engine.start_continuous_tone(432.0, 4.0);
        assert!(engine.is_playing());
    }

    #[test]
    fn test_chime_is_independent_and_self_terminating() {
        let (mut engine, _) = engine();
        engine.start_continuous_tone(528.0, 5.0);
        engine.play_chime();
        engine.stop_continuous_tone();

        {
            let mixer = engine.mixer();
            let mixer = mixer::lock(&mixer);
            assert_eq!(mixer.voice_count(), 3);
        }

        render_seconds(&engine, 0.5);
        assert_eq!(mixer::lock(&engine.mixer()).voice_count(), 1);
        render_seconds(&engine, 1.5);
        assert_eq!(mixer::lock(&engine.mixer()).voice_count(), 0);
    }

    #[test]
    fn test_chime_envelope() {
        let (mut engine, _) = engine();
        engine.play_chime();

        let mixer = engine.mixer();
        let mut mixer = mixer::lock(&mixer);
        let out = mixer.render_stereo(2_000);
        let early: f32 = out[..100].iter().fold(0.0, |m, s| m.max(s.abs()));
        let late: f32 = out[3_600..].iter().fold(0.0, |m, s| m.max(s.abs()));

        // Peak 0.1 * master 0.5, decaying toward silence
        assert!(early > 0.0 && early <= 0.05 + 1e-4);
        assert!(late < 0.001);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_stop_all_cuts_pending_chimes() {
        let (mut engine, _) = engine();
        engine.start_continuous_tone(528.0, 5.0);
        engine.play_chime();
        engine.stop_all();
        assert!(!engine.is_playing());

        render_seconds(&engine, 0.5);
        assert_eq!(mixer::lock(&engine.mixer()).voice_count(), 0);
    }

    #[test]
    fn test_unavailable_output_degrades_silently() {
        let probe = Probe {
            fail_acquire: true,
            ..Probe::default()
        };
        let mut engine = ToneEngine::new(
            ToneConfig::default(),
            Box::new(ProbeBackend(probe.clone())),
        );

        engine.start_continuous_tone(528.0, 5.0);
        engine.play_chime();
        engine.stop_all();

        assert!(!engine.is_playing());
        assert_eq!(mixer::lock(&engine.mixer()).voice_count(), 0);
        // One attempt only; later commands do not hammer the device
        assert_eq!(probe.acquires.get(), 1);
    }

    #[test]
    fn test_suspended_output_is_resumed_before_scheduling() {
        let (mut engine, probe) = engine();
        engine.play_chime();
        assert_eq!(probe.resumes.get(), 1);

        engine.suspend();
        assert!(probe.suspended.get());
        engine.start_continuous_tone(432.0, 4.0);
        assert!(!probe.suspended.get());
        assert_eq!(probe.resumes.get(), 2);
    }

    #[test]
    fn test_master_volume_is_smoothed_and_clamped() {
        let (mut engine, _) = engine();
        engine.acquire().unwrap();
        engine.set_master_volume(3.0);

        let mixer = engine.mixer();
        let mut mixer = mixer::lock(&mixer);
        assert!((mixer.master_gain() - 0.5).abs() < 1e-6);
        mixer.render_stereo(100); // one time constant
        let gain = mixer.master_gain();
        assert!(gain > 0.6 && gain < 0.9);
        mixer.render_stereo(2_000);
        assert!((mixer.master_gain() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_only_acquired_output_is_released() {
        let (idle, probe) = engine();
        drop(idle);
        assert_eq!(probe.releases.get(), 0);

        let (mut used, probe) = engine();
        used.start_continuous_tone(528.0, 5.0);
        used.release();
        assert!(!used.is_playing());
        drop(used);
        assert_eq!(probe.releases.get(), 1);
    }

    #[test]
    fn test_volume_set_before_first_sound_is_kept() {
        let (mut engine, probe) = engine();
        engine.set_master_volume(0.1);
        assert_eq!(probe.acquires.get(), 0);

        // First sound acquires the output and switches the mixer rate
        engine.play_chime();
        assert_eq!(probe.acquires.get(), 1);

        render_seconds(&engine, 2.0);
        let mixer = engine.mixer();
        assert!((mixer::lock(&mixer).master_gain() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_unusable_frequencies() {
        let (mut engine, probe) = engine();
        engine.start_continuous_tone(f32::INFINITY, 5.0);
        engine.start_continuous_tone(528.0, -1.0);
        assert!(!engine.is_playing());
        assert_eq!(probe.acquires.get(), 0);
    }
}
