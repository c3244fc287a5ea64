//! Daily practice streak.
//!
//! Fed by the controller's session-progress event. Bookkeeping is per
//! calendar day and idempotent: any number of sessions on one day count once.

use chrono::{Days, NaiveDate};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreakTracker {
    streak: u32,
    last_log: Option<NaiveDate>,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a previously recorded streak
    #[cfg(test)]
    pub fn with_history(streak: u32, last_log: NaiveDate) -> Self {
        Self {
            streak,
            last_log: Some(last_log),
        }
    }

    /// Log a session with progress on `today`; returns the streak after logging
    pub fn record_session(&mut self, today: NaiveDate) -> u32 {
        if self.last_log == Some(today) {
            return self.streak;
        }
        self.streak = if self.last_log == today.checked_sub_days(Days::new(1)) {
            self.streak + 1
        } else {
            1
        };
        self.last_log = Some(today);
        info!(streak = self.streak, "practice logged");
        self.streak
    }

    /// Streak as it stands on `today`; zero once a day has been missed
    pub fn current(&self, today: NaiveDate) -> u32 {
        match self.last_log {
            Some(last) if last == today => self.streak,
            Some(last) if today.checked_sub_days(Days::new(1)) == Some(last) => self.streak,
            _ => 0,
        }
    }

    pub fn last_log(&self) -> Option<NaiveDate> {
        self.last_log
    }
}
