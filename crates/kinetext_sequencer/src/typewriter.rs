//! Typewriter sequencer
//!
//! Types a phrase character by character, holds it, deletes it, and advances
//! to the next phrase. The machine is pure: it consumes ticks and exposes
//! snapshots, and the cadence of those ticks (type vs. delete vs. hold) is
//! the driver's concern, surfaced through [`Typewriter::step_delay`].
//!
//! The cursor blink is an independent sub-timer target: [`toggle_cursor`]
//! keeps flipping during `Holding` and `Terminal`, decoupled from the phase
//! machine.
//!
//! [`toggle_cursor`]: Typewriter::toggle_cursor

use crate::config::TypewriterConfig;
use kinetext_core::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Discrete phase of the typewriter state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypewriterPhase {
    /// Appending characters to the visible prefix
    Typing,
    /// Fully typed phrase on display, waiting out the hold delay
    Holding,
    /// Removing characters from the end of the visible prefix
    Deleting,
    /// First typing tick after wrapping to the next phrase
    Advancing,
    /// Absorbing state, reached only when `looping` is false
    Terminal,
}

/// Immutable read of a typewriter's observable state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypewriterSnapshot {
    pub visible_text: String,
    pub show_cursor: bool,
}

/// The type -> hold -> delete -> advance machine
pub struct Typewriter {
    config: TypewriterConfig,
    phase: TypewriterPhase,
    item_index: usize,
    /// Always a prefix of `config.items[item_index]`
    visible: String,
    show_cursor: bool,
    disposed: bool,
}

impl Typewriter {
    /// Create a typewriter. Fails with a configuration error if `items` is
    /// empty or any interval is zero.
    pub fn new(config: TypewriterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            phase: TypewriterPhase::Typing,
            item_index: 0,
            visible: String::new(),
            show_cursor: true,
            disposed: false,
        })
    }

    pub fn phase(&self) -> TypewriterPhase {
        self.phase
    }

    pub fn item_index(&self) -> usize {
        self.item_index
    }

    pub fn cursor_glyph(&self) -> &str {
        &self.config.cursor_glyph
    }

    pub fn blink_interval(&self) -> Duration {
        self.config.blink_interval
    }

    /// Advance one step. No-op while `Holding` (the hold is time-based, see
    /// [`finish_hold`](Self::finish_hold)), while `Terminal`, or after
    /// disposal.
    pub fn tick(&mut self) {
        if self.disposed {
            return;
        }
        match self.phase {
            TypewriterPhase::Typing | TypewriterPhase::Advancing => {
                let item = &self.config.items[self.item_index];
                if let Some(next) = item[self.visible.len()..].chars().next() {
                    self.visible.push(next);
                }
                if self.visible == *item {
                    let last = self.item_index + 1 == self.config.items.len();
                    self.phase = if !self.config.looping && last {
                        TypewriterPhase::Terminal
                    } else {
                        TypewriterPhase::Holding
                    };
                } else {
                    self.phase = TypewriterPhase::Typing;
                }
            }
            TypewriterPhase::Deleting => {
                self.visible.pop();
                if self.visible.is_empty() {
                    self.item_index = (self.item_index + 1) % self.config.items.len();
                    self.phase = TypewriterPhase::Advancing;
                }
            }
            TypewriterPhase::Holding | TypewriterPhase::Terminal => {}
        }
    }

    /// Leave `Holding` once the hold delay has elapsed. No-op in any other
    /// phase.
    pub fn finish_hold(&mut self) {
        if self.disposed {
            return;
        }
        if self.phase == TypewriterPhase::Holding {
            self.phase = TypewriterPhase::Deleting;
        }
    }

    /// Blink sub-timer target, independent of the phase machine
    pub fn toggle_cursor(&mut self) {
        if self.disposed {
            return;
        }
        self.show_cursor = !self.show_cursor;
    }

    /// Delay until the next step should run, by current phase. `None` once
    /// the machine is terminal or disposed.
    pub fn step_delay(&self) -> Option<Duration> {
        if self.disposed {
            return None;
        }
        match self.phase {
            TypewriterPhase::Typing | TypewriterPhase::Advancing => {
                Some(self.config.type_interval)
            }
            TypewriterPhase::Holding => Some(self.config.hold),
            TypewriterPhase::Deleting => Some(self.config.delete_interval),
            TypewriterPhase::Terminal => None,
        }
    }

    pub fn snapshot(&self) -> TypewriterSnapshot {
        TypewriterSnapshot {
            visible_text: self.visible.clone(),
            show_cursor: self.show_cursor,
        }
    }

    /// Stop the machine. Idempotent; every later operation is a no-op and
    /// the snapshot is frozen.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
