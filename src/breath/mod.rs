//! Breathing-cycle controller: phase state machine, countdown and tick sources.

mod controller;
mod phase;
mod timer;

pub use controller::{CycleController, CycleSnapshot, Event};
pub use phase::Phase;
pub use timer::{IntervalTimer, ManualTimer, TickId, Timer};
