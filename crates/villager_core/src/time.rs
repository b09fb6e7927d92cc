//! Simulation clock.
//!
//! The clock is the only source of "now". It is advanced by the driver with
//! real elapsed deltas and passed by value into every subsystem call, so a
//! paused game freezes every cooldown and build timer at once.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// A point in simulated time, in seconds.
pub type SimTime = Fixed;

/// Monotonic simulation clock with pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimClock {
    #[serde(with = "fixed_serde")]
    now: SimTime,
    paused: bool,
}

impl SimClock {
    /// A clock at time zero, running.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Fixed::ZERO,
            paused: false,
        }
    }

    /// A running clock starting at `now`.
    #[must_use]
    pub const fn starting_at(now: SimTime) -> Self {
        Self { now, paused: false }
    }

    /// Current simulation time.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// Whether the clock is frozen.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Advance by `delta` seconds.
    ///
    /// Returns `false` without moving when paused. Negative deltas are
    /// ignored so time never runs backwards.
    pub fn advance(&mut self, delta: Fixed) -> bool {
        if self.paused {
            return false;
        }
        if delta > Fixed::ZERO {
            self.now += delta;
        }
        true
    }

    /// Freeze the clock.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Unfreeze the clock. Time resumes from where it stopped.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Flip between paused and running.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut clock = SimClock::new();
        assert!(clock.advance(Fixed::from_num(0.5)));
        assert!(clock.advance(Fixed::from_num(0.25)));
        assert_eq!(clock.now(), Fixed::from_num(0.75));
    }

    #[test]
    fn test_paused_clock_does_not_move() {
        let mut clock = SimClock::starting_at(Fixed::from_num(10));
        clock.pause();
        assert!(!clock.advance(Fixed::from_num(5)));
        assert_eq!(clock.now(), Fixed::from_num(10));

        clock.resume();
        assert!(clock.advance(Fixed::from_num(1)));
        assert_eq!(clock.now(), Fixed::from_num(11));
    }

    #[test]
    fn test_negative_delta_ignored() {
        let mut clock = SimClock::starting_at(Fixed::from_num(3));
        clock.advance(Fixed::from_num(-2));
        assert_eq!(clock.now(), Fixed::from_num(3));
    }

    #[test]
    fn test_toggle_pause() {
        let mut clock = SimClock::new();
        clock.toggle_pause();
        assert!(clock.is_paused());
        clock.toggle_pause();
        assert!(!clock.is_paused());
    }
}
