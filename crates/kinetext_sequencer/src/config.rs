//! Sequencer configuration
//!
//! Plain data structs supplied at mount time. Timing defaults come from the
//! page these machines were extracted from, but they are inputs, not
//! contract: override anything with the `with_*` builders.

use kinetext_core::{KinetextError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Typewriter`](crate::Typewriter)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypewriterConfig {
    /// Phrases to type, in order. Must be non-empty.
    pub items: Vec<String>,
    /// Delay between typed characters
    pub type_interval: Duration,
    /// Delay between deleted characters
    pub delete_interval: Duration,
    /// Pause on a fully typed phrase before deleting it
    pub hold: Duration,
    /// Wrap around after the last phrase; when false the machine parks on
    /// the fully typed last phrase instead of deleting it
    pub looping: bool,
    /// Glyph the renderer should draw as the cursor
    pub cursor_glyph: String,
    /// Period of the cursor-blink sub-timer
    pub blink_interval: Duration,
}

impl TypewriterConfig {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            type_interval: Duration::from_millis(80),
            delete_interval: Duration::from_millis(40),
            hold: Duration::from_millis(2000),
            looping: true,
            cursor_glyph: "|".to_string(),
            blink_interval: Duration::from_millis(800),
        }
    }

    pub fn with_type_interval(mut self, interval: Duration) -> Self {
        self.type_interval = interval;
        self
    }

    pub fn with_delete_interval(mut self, interval: Duration) -> Self {
        self.delete_interval = interval;
        self
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_cursor_glyph(mut self, glyph: impl Into<String>) -> Self {
        self.cursor_glyph = glyph.into();
        self
    }

    pub fn with_blink_interval(mut self, interval: Duration) -> Self {
        self.blink_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(KinetextError::config("typewriter items must not be empty"));
        }
        if self.type_interval.is_zero() {
            return Err(KinetextError::config("type interval must be positive"));
        }
        if self.delete_interval.is_zero() {
            return Err(KinetextError::config("delete interval must be positive"));
        }
        if self.hold.is_zero() {
            return Err(KinetextError::config("hold must be positive"));
        }
        if self.blink_interval.is_zero() {
            return Err(KinetextError::config("blink interval must be positive"));
        }
        Ok(())
    }
}

/// Configuration for a [`Cycler`](crate::Cycler)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CyclerConfig {
    /// Items to cycle through, in order. Must be non-empty.
    pub items: Vec<String>,
    /// Time between transitions
    pub period: Duration,
}

impl CyclerConfig {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            period: Duration::from_millis(4000),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(KinetextError::config("cycler items must not be empty"));
        }
        if self.period.is_zero() {
            return Err(KinetextError::config("cycle period must be positive"));
        }
        Ok(())
    }
}

/// Options for a [`VisibilityTrigger`](crate::VisibilityTrigger)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevealOptions {
    /// Fire at most once per region for the trigger's lifetime
    pub one_shot: bool,
    /// Intersection ratio at or above which a region counts as visible
    pub threshold: f32,
}

impl RevealOptions {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Fire again on every re-entry instead of once
    pub fn repeatable(mut self) -> Self {
        self.one_shot = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(KinetextError::config(
                "reveal threshold must be within 0.0..=1.0",
            ));
        }
        Ok(())
    }
}

impl Default for RevealOptions {
    fn default() -> Self {
        Self {
            one_shot: true,
            threshold: 0.2,
        }
    }
}

/// Configuration for a [`Playhead`](crate::Playhead)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayheadConfig {
    /// Exclusive upper bound of the position, wraps back to zero
    pub span: f32,
    /// Position advance per tick
    pub step: f32,
    /// Time between position ticks
    pub period: Duration,
    /// Period of the independent activity toggle, if any
    pub toggle_interval: Option<Duration>,
}

impl PlayheadConfig {
    pub fn with_span(mut self, span: f32) -> Self {
        self.span = span;
        self
    }

    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_toggle_interval(mut self, interval: Option<Duration>) -> Self {
        self.toggle_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.span > 0.0) {
            return Err(KinetextError::config("playhead span must be positive"));
        }
        if !(self.step > 0.0) {
            return Err(KinetextError::config("playhead step must be positive"));
        }
        if self.period.is_zero() {
            return Err(KinetextError::config("playhead period must be positive"));
        }
        if let Some(toggle) = self.toggle_interval {
            if toggle.is_zero() {
                return Err(KinetextError::config(
                    "playhead toggle interval must be positive",
                ));
            }
        }
        Ok(())
    }
}

impl Default for PlayheadConfig {
    fn default() -> Self {
        Self {
            span: 100.0,
            step: 0.5,
            period: Duration::from_millis(80),
            toggle_interval: Some(Duration::from_millis(4000)),
        }
    }
}
