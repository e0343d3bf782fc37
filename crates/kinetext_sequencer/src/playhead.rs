//! Looping playhead
//!
//! A fractional position marching around a fixed span on a fixed cadence,
//! with an independent on/off toggle sub-timer - the timeline scrubber of an
//! editor mock-up, reduced to its temporal core.

use crate::config::PlayheadConfig;
use kinetext_core::Result;
use serde::{Deserialize, Serialize};

/// Immutable read of a playhead's observable state
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayheadSnapshot {
    /// Position within `[0, span)`
    pub position: f32,
    /// Activity flag flipped by the toggle sub-timer
    pub active: bool,
}

/// Fixed-cadence looping position with an activity toggle
pub struct Playhead {
    config: PlayheadConfig,
    position: f32,
    active: bool,
    disposed: bool,
}

impl Playhead {
    /// Create a playhead. Fails with a configuration error on a
    /// non-positive span, step, or interval.
    pub fn new(config: PlayheadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            position: 0.0,
            active: false,
            disposed: false,
        })
    }

    /// Advance the position one step, wrapping at the span
    pub fn tick(&mut self) {
        if self.disposed {
            return;
        }
        self.position = (self.position + self.config.step) % self.config.span;
    }

    /// Toggle sub-timer target, independent of the position cadence
    pub fn toggle(&mut self) {
        if self.disposed {
            return;
        }
        self.active = !self.active;
    }

    pub fn snapshot(&self) -> PlayheadSnapshot {
        PlayheadSnapshot {
            position: self.position,
            active: self.active,
        }
    }

    /// Stop the machine. Idempotent; every later operation is a no-op.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advances_and_wraps() {
        let config = PlayheadConfig::default().with_span(1.5).with_step(0.5);
        let mut ph = Playhead::new(config).unwrap();

        ph.tick();
        assert_eq!(ph.snapshot().position, 0.5);
        ph.tick();
        assert_eq!(ph.snapshot().position, 1.0);
        ph.tick();
        assert_eq!(ph.snapshot().position, 0.0);
    }

    #[test]
    fn test_toggle_is_independent_of_position() {
        let mut ph = Playhead::new(PlayheadConfig::default()).unwrap();
        assert!(!ph.snapshot().active);

        ph.toggle();
        let position = ph.snapshot().position;
        assert!(ph.snapshot().active);
        assert_eq!(ph.snapshot().position, position);

        ph.toggle();
        assert!(!ph.snapshot().active);
    }

    #[test]
    fn test_dispose_freezes_state() {
        let mut ph = Playhead::new(PlayheadConfig::default()).unwrap();
        ph.tick();
        let before = ph.snapshot();

        ph.dispose();
        ph.dispose();
        ph.tick();
        ph.toggle();
        assert_eq!(ph.snapshot(), before);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Playhead::new(PlayheadConfig::default().with_span(0.0)).is_err());
    }
}
