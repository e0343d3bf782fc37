//! Kinetext Sequencer Engine
//!
//! Timer-driven state machines for animated text, decoupled from any
//! renderer: the engine consumes clock ticks and intersection events, and
//! emits immutable snapshots for a presentation layer to draw.
//!
//! # Sequencers
//!
//! - **Typewriter**: types, holds, deletes, and advances through phrases,
//!   with an independent cursor-blink sub-timer
//! - **Cycler**: rotates through items on a fixed period, pairing each
//!   transition with a renderer-supplied width measurement
//! - **Visibility Trigger**: fires a reveal callback when a watched region
//!   enters the viewport, one-shot or repeatable
//! - **Playhead**: loops a fractional position around a span with an
//!   independent activity toggle
//!
//! The [`SequencerHost`] owns instances, registers their timers with a
//! [`ClockSource`](kinetext_core::ClockSource), and answers snapshot polls.
//!
//! # Example
//!
//! ```rust
//! use kinetext_core::VirtualClock;
//! use kinetext_sequencer::{SequencerHost, Snapshot, TypewriterConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(VirtualClock::new());
//! let host = SequencerHost::new(clock.clone());
//! let id = host
//!     .mount(TypewriterConfig::new(vec!["Video Editor".to_string()]))
//!     .unwrap();
//!
//! clock.advance(Duration::from_millis(400));
//! if let Some(Snapshot::Typewriter(snapshot)) = host.snapshot(id) {
//!     assert_eq!(snapshot.visible_text, "Video");
//! }
//!
//! host.unmount(id); // cancels every timer the instance owned
//! ```

pub mod config;
pub mod cycler;
pub mod host;
pub mod playhead;
pub mod typewriter;
pub mod visibility;

pub use config::{CyclerConfig, PlayheadConfig, RevealOptions, TypewriterConfig};
pub use cycler::{Cycler, CyclerPhase, CyclerSnapshot};
pub use host::{InstanceId, MountConfig, SequencerHost, Snapshot};
pub use playhead::{Playhead, PlayheadSnapshot};
pub use typewriter::{Typewriter, TypewriterPhase, TypewriterSnapshot};
pub use visibility::{
    EnterCallback, RegionId, RegionVisibility, ViewportPort, VisibilitySnapshot, VisibilityTrigger,
};
