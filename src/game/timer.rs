//! Per-turn deadline.
//!
//! The timer belongs to one turn at a time. Arming it for a new turn
//! replaces the old deadline, and cancelling is always safe.

use std::time::{Duration, Instant};

/// Default time a player has to commit a batch
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct TurnTimer {
    armed: Option<(u64, Instant)>,
}

impl TurnTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the countdown for `turn`.
    pub fn arm(&mut self, turn: u64, duration: Duration, now: Instant) {
        self.armed = Some((turn, now + duration));
    }

    /// Stop the countdown. No-op when nothing is armed.
    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, deadline)| deadline)
    }

    /// Whether the deadline has passed, without consuming it.
    pub fn has_expired(&self, now: Instant) -> bool {
        matches!(self.armed, Some((_, deadline)) if now >= deadline)
    }

    /// Fire once: returns the turn whose deadline passed and disarms.
    pub fn expired(&mut self, now: Instant) -> Option<u64> {
        if !self.has_expired(now) {
            return None;
        }
        self.armed.take().map(|(turn, _)| turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_deadline() {
        let start = Instant::now();
        let mut timer = TurnTimer::new();
        timer.arm(1, Duration::from_secs(30), start);

        assert_eq!(timer.expired(start + Duration::from_secs(29)), None);
        assert_eq!(timer.expired(start + Duration::from_secs(30)), Some(1));
        assert_eq!(timer.expired(start + Duration::from_secs(31)), None);
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let start = Instant::now();
        let mut timer = TurnTimer::new();
        timer.cancel();
        timer.arm(4, Duration::from_secs(1), start);
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.expired(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_rearm_replaces_old_turn() {
        let start = Instant::now();
        let mut timer = TurnTimer::new();
        timer.arm(1, Duration::from_secs(1), start);
        timer.arm(2, Duration::from_secs(10), start);
        assert_eq!(timer.expired(start + Duration::from_secs(2)), None);
        assert_eq!(timer.expired(start + Duration::from_secs(10)), Some(2));
    }

    #[test]
    fn test_deadline_follows_arm_and_cancel() {
        let start = Instant::now();
        let mut timer = TurnTimer::new();
        assert_eq!(timer.deadline(), None);
        timer.arm(1, Duration::from_secs(30), start);
        assert_eq!(timer.deadline(), Some(start + Duration::from_secs(30)));
        assert!(!timer.has_expired(start + Duration::from_secs(10)));
        timer.cancel();
        assert_eq!(timer.deadline(), None);
    }
}
