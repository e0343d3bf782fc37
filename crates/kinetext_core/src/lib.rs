//! Kinetext Core Primitives
//!
//! Foundational pieces shared by the Kinetext sequencer engine:
//!
//! - **Clock Source**: deferred and repeating callback scheduling with
//!   synchronous cancellation ([`VirtualClock`], [`ThreadedClock`])
//! - **Error taxonomy**: configuration errors surfaced at creation time,
//!   missing-capability degradation everywhere else
//!
//! # Example
//!
//! ```rust
//! use kinetext_core::{ClockSource, TimerFate, VirtualClock};
//! use std::time::Duration;
//!
//! let clock = VirtualClock::new();
//! clock.repeat(
//!     Duration::from_millis(80),
//!     Box::new(|| TimerFate::Again),
//! );
//!
//! // Time only moves when the caller says so.
//! clock.advance(Duration::from_millis(240));
//! assert_eq!(clock.now(), Duration::from_millis(240));
//! ```

pub mod clock;
pub mod error;

pub use clock::{ClockSource, ThreadedClock, TimerCallback, TimerFate, TimerId, VirtualClock};
pub use error::{KinetextError, Result};
