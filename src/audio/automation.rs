//! Scheduled parameter automation on the sample clock.
//!
//! Parameters (gain, frequency) are never polled from the control thread.
//! Changes are scheduled ahead as segments keyed by frame position and the
//! mixer evaluates them while rendering.

/// Sample-clock position: frames rendered since the mixer was created
pub type Frame = u64;

/// Convert seconds to frames at the given sample rate
pub fn seconds_to_frames(seconds: f32, sample_rate_hz: u32) -> Frame {
    (seconds.max(0.0) as f64 * sample_rate_hz as f64).round() as Frame
}

/// Smallest value an exponential segment may start or land on
const EXPONENTIAL_FLOOR: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Curve {
    Linear,
    Exponential,
    /// First-order approach toward `to`, time constant in frames
    Target { tau_frames: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: Frame,
    end: Frame,
    from: f32,
    to: f32,
    curve: Curve,
}

impl Segment {
    fn value_at(&self, frame: Frame) -> f32 {
        let elapsed = frame.saturating_sub(self.start) as f64;
        match self.curve {
            Curve::Target { tau_frames } => {
                let decay = (-elapsed / tau_frames).exp() as f32;
                self.to + (self.from - self.to) * decay
            }
            _ if frame >= self.end => self.to,
            Curve::Linear => {
                let progress = (elapsed / (self.end - self.start) as f64) as f32;
                self.from + (self.to - self.from) * progress
            }
            Curve::Exponential => {
                let progress = elapsed / (self.end - self.start) as f64;
                let ratio = (self.to / self.from) as f64;
                (self.from as f64 * ratio.powf(progress)) as f32
            }
        }
    }
}

/// Automated parameter value
///
/// Segments are kept in scheduling order; the value at a frame comes from the
/// latest segment starting at or before it.
#[derive(Debug, Clone)]
pub struct Automation {
    initial: f32,
    segments: Vec<Segment>,
}

impl Automation {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            segments: Vec::new(),
        }
    }

    /// Parameter value at `frame`
    pub fn value_at(&self, frame: Frame) -> f32 {
        self.segments
            .iter()
            .rev()
            .find(|s| s.start <= frame)
            .map_or(self.initial, |s| s.value_at(frame))
    }

    /// Jump to `value` at `frame`, dropping anything scheduled from then on
    pub fn set_value_at(&mut self, value: f32, frame: Frame) {
        self.segments.retain(|s| s.start < frame);
        self.segments.push(Segment {
            start: frame,
            end: frame,
            from: value,
            to: value,
            curve: Curve::Linear,
        });
    }

    /// Ramp linearly from the last scheduled event to `value` at `end`
    pub fn linear_ramp_to(&mut self, value: f32, end: Frame) {
        self.push_ramp(value, end, Curve::Linear);
    }

    /// Ramp exponentially from the last scheduled event to `value` at `end`
    ///
    /// Both endpoints are floored to a tiny positive value; an exponential
    /// curve cannot cross or touch zero.
    pub fn exponential_ramp_to(&mut self, value: f32, end: Frame) {
        self.push_ramp(value.max(EXPONENTIAL_FLOOR), end, Curve::Exponential);
    }

    /// Approach `target` from `frame` onward with time constant `tau_frames`
    pub fn set_target_at(&mut self, target: f32, frame: Frame, tau_frames: Frame) {
        let from = self.value_at(frame);
        self.segments.retain(|s| s.start < frame);
        self.segments.push(Segment {
            start: frame,
            end: frame,
            from,
            to: target,
            curve: Curve::Target {
                tau_frames: tau_frames.max(1) as f64,
            },
        });
    }

    /// Freeze the current trajectory at `frame` and drop later events
    pub fn cancel_and_hold(&mut self, frame: Frame) {
        let held = self.value_at(frame);
        self.set_value_at(held, frame);
    }

    /// Drop segments that can no longer affect values at or after `now`
    pub fn prune_before(&mut self, now: Frame) {
        if let Some(active) = self.segments.iter().rposition(|s| s.start <= now) {
            if active > 0 {
                self.segments.drain(..active);
            }
        }
    }

    /// Value the schedule ends on once every scheduled event has played out
    pub fn settled_value(&self) -> f32 {
        self.segments.last().map_or(self.initial, |s| s.to)
    }

    fn push_ramp(&mut self, value: f32, end: Frame, curve: Curve) {
        let (start, from) = match self.segments.last() {
            Some(last) => (last.end, last.value_at(last.end)),
            None => (0, self.initial),
        };
        if end <= start {
            self.set_value_at(value, start);
            return;
        }
        let from = match curve {
            Curve::Exponential => from.max(EXPONENTIAL_FLOOR),
            _ => from,
        };
        self.segments.push(Segment {
            start,
            end,
            from,
            to: value,
            curve,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_seconds_to_frames() {
        assert_eq!(seconds_to_frames(2.0, 44_100), 88_200);
        assert_eq!(seconds_to_frames(0.5, 48_000), 24_000);
        assert_eq!(seconds_to_frames(-1.0, 48_000), 0);
    }

    #[test]
    fn test_initial_value_without_events() {
        let param = Automation::new(0.5);
        assert_eq!(param.value_at(0), 0.5);
        assert_eq!(param.value_at(1_000_000), 0.5);
    }

    #[test]
    fn test_linear_ramp() {
        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, 100);
        gain.linear_ramp_to(0.3, 300);

        assert!(approx(gain.value_at(100), 0.0));
        assert!(approx(gain.value_at(200), 0.15));
        assert!(approx(gain.value_at(300), 0.3));
        assert!(approx(gain.value_at(10_000), 0.3));
    }

    #[test]
    fn test_exponential_ramp_is_geometric() {
        let mut freq = Automation::new(880.0);
        freq.set_value_at(880.0, 0);
        freq.exponential_ramp_to(440.0, 1000);

        // Halfway through a 880 -> 440 glide is the geometric mean
        assert!((freq.value_at(500) - 622.254).abs() < 0.01);
        assert!(approx(freq.value_at(1000), 440.0));
    }

    #[test]
    fn test_attack_then_decay() {
        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, 0);
        gain.linear_ramp_to(0.1, 10);
        gain.exponential_ramp_to(0.001, 200);

        assert!(approx(gain.value_at(5), 0.05));
        assert!(approx(gain.value_at(10), 0.1));
        assert!(gain.value_at(100) < 0.1 && gain.value_at(100) > 0.001);
        assert!(approx(gain.value_at(200), 0.001));
        assert_eq!(gain.settled_value(), 0.001);
    }

    #[test]
    fn test_cancel_and_hold_mid_ramp() {
        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, 0);
        gain.linear_ramp_to(0.3, 200);

        gain.cancel_and_hold(100);
        gain.linear_ramp_to(0.0, 150);

        // Past values keep following the original ramp
        assert!(approx(gain.value_at(50), 0.075));
        assert!(approx(gain.value_at(100), 0.15));
        assert!(approx(gain.value_at(125), 0.075));
        assert!(approx(gain.value_at(150), 0.0));
        assert!(approx(gain.value_at(400), 0.0));
    }

    #[test]
    fn test_set_target_approaches_smoothly() {
        let mut master = Automation::new(0.5);
        master.set_target_at(1.0, 0, 100);

        let one_tau = master.value_at(100);
        assert!(approx(one_tau, 1.0 - 0.5 * (-1.0f32).exp()));
        assert!(master.value_at(1_000) > 0.9999);
        assert!(master.value_at(50) < one_tau);
        assert_eq!(master.settled_value(), 1.0);
    }

    #[test]
    fn test_prune_keeps_active_segment() {
        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, 0);
        gain.linear_ramp_to(1.0, 100);
        gain.linear_ramp_to(0.0, 200);

        gain.prune_before(150);
        assert!(approx(gain.value_at(150), 0.5));
        assert!(approx(gain.value_at(200), 0.0));
    }
}
