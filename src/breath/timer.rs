//! Phase tick sources.
//!
//! Every arm gets a fresh [`TickId`]. The controller only honours ticks
//! carrying the id it armed last, so a tick that was already queued when its
//! source got cancelled can never mutate state.

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Identity of one armed tick source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(u64);

impl TickId {
    pub(crate) fn first() -> Self {
        Self(0)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Periodic tick source driven by the controller
pub trait Timer {
    /// Start firing ticks tagged `id`, once per period
    fn arm(&mut self, id: TickId);

    /// Stop firing ticks tagged `id`; none may be produced after this returns
    fn disarm(&mut self, id: TickId);
}

/// Timer that never fires on its own; the owner delivers ticks by hand
///
/// Used for offline renders (simulated time) and tests.
#[derive(Debug, Default)]
pub struct ManualTimer {
    armed: Option<TickId>,
    arms: usize,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently armed tick source
    pub fn armed(&self) -> Option<TickId> {
        self.armed
    }

    /// How many times a source has been armed
    pub fn arm_count(&self) -> usize {
        self.arms
    }
}

impl Timer for ManualTimer {
    fn arm(&mut self, id: TickId) {
        self.armed = Some(id);
        self.arms += 1;
    }

    fn disarm(&mut self, id: TickId) {
        if self.armed == Some(id) {
            self.armed = None;
        }
    }
}

struct ActiveInterval {
    id: TickId,
    /// Dropping this wakes the worker and ends it
    cancel: Sender<()>,
    worker: thread::JoinHandle<()>,
}

/// Wall-clock timer: one worker thread per armed source, ticks delivered
/// on a channel the host drains on its own thread
pub struct IntervalTimer {
    period: Duration,
    ticks: Sender<TickId>,
    active: Option<ActiveInterval>,
}

impl IntervalTimer {
    /// Create a timer firing every `period`, with the receiving end of its ticks
    pub fn new(period: Duration) -> (Self, Receiver<TickId>) {
        let (ticks, receiver) = unbounded();
        let timer = Self {
            period,
            ticks,
            active: None,
        };
        (timer, receiver)
    }

    /// One tick per second
    pub fn every_second() -> (Self, Receiver<TickId>) {
        Self::new(Duration::from_secs(1))
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            drop(active.cancel);
            // Worker exits as soon as the cancel channel disconnects
            let _ = active.worker.join();
            debug!(id = ?active.id, "tick source cancelled");
        }
    }
}

impl Timer for IntervalTimer {
    fn arm(&mut self, id: TickId) {
        self.cancel_active();

        let (cancel, cancelled) = crossbeam_channel::bounded::<()>(0);
        let ticks = self.ticks.clone();
        let period = self.period;
        let worker = thread::spawn(move || {
            // Fixed deadlines so ticks do not drift with scheduling latency
            let mut deadline = Instant::now() + period;
            loop {
                let wait = deadline.saturating_duration_since(Instant::now());
                select! {
                    recv(cancelled) -> _ => break,
                    default(wait) => {
                        if ticks.send(id).is_err() {
                            break;
                        }
                        deadline += period;
                    }
                }
            }
        });

        self.active = Some(ActiveInterval { id, cancel, worker });
        debug!(?id, "tick source armed");
    }

    fn disarm(&mut self, id: TickId) {
        if self.active.as_ref().is_some_and(|a| a.id == id) {
            self.cancel_active();
        }
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.cancel_active();
    }
}
