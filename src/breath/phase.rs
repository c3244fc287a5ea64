//! Breathing phases and their transition table.

use std::fmt;

use crate::params::PhaseDurations;

/// Breathing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No session running
    #[default]
    Idle,
    Inhale,
    Hold,
    Exhale,
}

impl Phase {
    /// Phase entered when this one runs out: Inhale -> Hold -> Exhale -> Inhale
    ///
    /// Idle has no successor; ticks never reach an idle controller.
    pub fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::Idle,
            Phase::Inhale => Phase::Hold,
            Phase::Hold => Phase::Exhale,
            Phase::Exhale => Phase::Inhale,
        }
    }

    /// Configured length of this phase (seconds); zero for Idle
    pub fn duration(self, durations: &PhaseDurations) -> u32 {
        match self {
            Phase::Idle => 0,
            Phase::Inhale => durations.inhale,
            Phase::Hold => durations.hold,
            Phase::Exhale => durations.exhale,
        }
    }

    /// Entering this phase from `previous` completes a breath
    pub fn completes_cycle(self, previous: Phase) -> bool {
        previous == Phase::Exhale && self == Phase::Inhale
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Inhale => "inhale",
            Phase::Hold => "hold",
            Phase::Exhale => "exhale",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
