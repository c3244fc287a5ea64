//! Breathing-cycle state machine.
//!
//! The controller owns the only mutable cycle state. Host commands and tick
//! deliveries are the sole mutation paths; every command is total, so a call
//! that makes no sense in the current state is a silent no-op.

use tracing::{debug, info, warn};

use super::phase::Phase;
use super::timer::{TickId, Timer};
use crate::audio::ToneControl;
use crate::params::{Level, LevelCatalog};

/// Read-only view of the controller, published after every change
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSnapshot {
    pub phase: Phase,
    /// Whole seconds left in the current phase
    pub time_remaining: u32,
    pub running: bool,
    pub paused: bool,
    pub level: Level,
    pub sound_enabled: bool,
    pub cycles_completed: u32,
}

/// Notification delivered to observers, always after state is updated
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Canonical snapshot, once per tick and once per effective command
    State(CycleSnapshot),

    /// A tick moved the session into its next phase
    PhaseChanged { from: Phase, to: Phase },

    /// First completed breath of a session; fired at most once per session
    SessionProgress { level_id: u32, cycles_completed: u32 },
}

type Observer = Box<dyn FnMut(&Event)>;

#[derive(Debug)]
struct CycleState {
    phase: Phase,
    time_remaining: u32,
    running: bool,
    paused: bool,
    cycles_completed: u32,
    level: Level,
    sound_enabled: bool,
    /// `SessionProgress` already sent for the current session
    progress_reported: bool,
}

impl CycleState {
    fn idle(level: Level) -> Self {
        Self {
            phase: Phase::Idle,
            time_remaining: 0,
            running: false,
            paused: false,
            cycles_completed: 0,
            level,
            sound_enabled: false,
            progress_reported: false,
        }
    }

    fn ticking(&self) -> bool {
        self.running && !self.paused
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.time_remaining = phase.duration(&self.level.phases);
    }
}

/// Drives Inhale -> Hold -> Exhale cycles and the audio that follows them
pub struct CycleController<A: ToneControl, T: Timer> {
    catalog: LevelCatalog,
    state: CycleState,
    tones: A,
    timer: T,
    /// Tick source honoured by `tick`; Some exactly while running and unpaused
    active_tick: Option<TickId>,
    next_tick: TickId,
    observers: Vec<Observer>,
}

impl<A: ToneControl, T: Timer> CycleController<A, T> {
    /// Idle controller with the catalog's first level selected and sound off
    pub fn new(catalog: LevelCatalog, tones: A, timer: T) -> Self {
        let level = catalog.first().clone();
        Self {
            catalog,
            state: CycleState::idle(level),
            tones,
            timer,
            active_tick: None,
            next_tick: TickId::first(),
            observers: Vec::new(),
        }
    }

    /// Register an observer for state snapshots and session events
    pub fn subscribe(&mut self, observer: impl FnMut(&Event) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn snapshot(&self) -> CycleSnapshot {
        let s = &self.state;
        CycleSnapshot {
            phase: s.phase,
            time_remaining: s.time_remaining,
            running: s.running,
            paused: s.paused,
            level: s.level.clone(),
            sound_enabled: s.sound_enabled,
            cycles_completed: s.cycles_completed,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn time_remaining(&self) -> u32 {
        self.state.time_remaining
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn cycles_completed(&self) -> u32 {
        self.state.cycles_completed
    }

    pub fn level(&self) -> &Level {
        &self.state.level
    }

    pub fn sound_enabled(&self) -> bool {
        self.state.sound_enabled
    }

    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    pub fn tones(&self) -> &A {
        &self.tones
    }

    /// Audio side, for host-level output management
    pub fn tones_mut(&mut self) -> &mut A {
        &mut self.tones
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Tick source currently honoured, if the session is ticking
    pub fn active_tick(&self) -> Option<TickId> {
        self.active_tick
    }

    /// Begin a session at the first inhale. Idempotent while running.
    pub fn start(&mut self) {
        if self.state.running {
            debug!("start ignored: session already running");
            return;
        }

        let s = &mut self.state;
        s.running = true;
        s.paused = false;
        s.cycles_completed = 0;
        s.progress_reported = false;
        s.enter(Phase::Inhale);
        self.arm_tick();

        if self.state.sound_enabled {
            self.start_level_tone();
        }
        info!(level = self.state.level.id, "session started");
        self.publish_state();
    }

    /// Freeze the countdown and fade out the tone
    pub fn pause(&mut self) {
        if !self.state.ticking() {
            debug!("pause ignored: not ticking");
            return;
        }
        self.state.paused = true;
        self.disarm_tick();
        self.tones.stop_continuous_tone();
        info!(phase = %self.state.phase, remaining = self.state.time_remaining, "session paused");
        self.publish_state();
    }

    /// Continue from the frozen countdown
    pub fn resume(&mut self) {
        if !(self.state.running && self.state.paused) {
            debug!("resume ignored: not paused");
            return;
        }
        self.state.paused = false;
        self.arm_tick();
        if self.state.sound_enabled {
            self.start_level_tone();
        }
        info!("session resumed");
        self.publish_state();
    }

    /// Play/pause button: start when idle, otherwise flip pause
    pub fn toggle_play(&mut self) {
        if !self.state.running {
            self.start();
        } else if self.state.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// End the session from any state and silence all audio
    pub fn stop(&mut self) {
        self.halt();
        self.publish_state();
    }

    /// Stop any session, then select level `id`
    ///
    /// An id missing from the catalog keeps the current selection. Observers
    /// get a single snapshot, taken after the selection.
    pub fn change_level(&mut self, id: u32) {
        self.halt();
        match self.catalog.get(id) {
            Some(level) => {
                self.state.level = level.clone();
                info!(
                    level = id,
                    name = %level.name,
                    left_hz = level.frequency.base_hz,
                    right_hz = level.frequency.right_hz(),
                    "level selected"
                );
            }
            None => warn!(level = id, "unknown level; keeping current selection"),
        }
        self.publish_state();
    }

    /// Return to idle and silence audio without notifying observers
    fn halt(&mut self) {
        self.disarm_tick();

        let s = &mut self.state;
        let was_running = s.running;
        s.running = false;
        s.paused = false;
        s.phase = Phase::Idle;
        s.time_remaining = 0;
        s.cycles_completed = 0;
        s.progress_reported = false;

        self.tones.stop_all();
        if was_running {
            info!("session stopped");
        }
    }

    /// Flip sound; a ticking session starts or stops its tone right away
    pub fn toggle_sound(&mut self) {
        self.state.sound_enabled = !self.state.sound_enabled;
        if self.state.ticking() {
            if self.state.sound_enabled {
                self.start_level_tone();
            } else {
                self.tones.stop_continuous_tone();
            }
        }
        debug!(enabled = self.state.sound_enabled, "sound toggled");
        self.publish_state();
    }

    /// Master output volume (0..1)
    pub fn set_volume(&mut self, level: f32) {
        self.tones.set_master_volume(level);
    }

    /// Deliver one tick from the source tagged `id`
    ///
    /// Ticks from a cancelled source, or arriving while not ticking, are dropped.
    pub fn tick(&mut self, id: TickId) {
        if self.active_tick != Some(id) || !self.state.ticking() {
            debug!(?id, "stale tick dropped");
            return;
        }

        if self.state.time_remaining > 1 {
            self.state.time_remaining -= 1;
            self.publish_state();
            return;
        }

        // State first, then audio, then observers
        let from = self.state.phase;
        let to = from.next();
        self.state.enter(to);
        if to.completes_cycle(from) {
            self.state.cycles_completed += 1;
        }

        if self.state.sound_enabled {
            self.tones.play_chime();
        }

        self.notify(&Event::PhaseChanged { from, to });
        self.publish_state();

        if self.state.cycles_completed >= 1 && !self.state.progress_reported {
            self.state.progress_reported = true;
            let event = Event::SessionProgress {
                level_id: self.state.level.id,
                cycles_completed: self.state.cycles_completed,
            };
            self.notify(&event);
        }
    }

    fn start_level_tone(&mut self) {
        let frequency = self.state.level.frequency;
        self.tones
            .start_continuous_tone(frequency.base_hz, frequency.binaural_hz);
    }

    /// Replace the tick source with a fresh identity
    fn arm_tick(&mut self) {
        self.disarm_tick();
        let id = self.next_tick;
        self.next_tick = id.next();
        self.timer.arm(id);
        self.active_tick = Some(id);
    }

    fn disarm_tick(&mut self) {
        if let Some(id) = self.active_tick.take() {
            self.timer.disarm(id);
        }
    }

    fn publish_state(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let event = Event::State(self.snapshot());
        self.notify(&event);
    }

    fn notify(&mut self, event: &Event) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}

impl<A: ToneControl, T: Timer> Drop for CycleController<A, T> {
    fn drop(&mut self) {
        self.disarm_tick();
        self.tones.stop_all();
    }
}
