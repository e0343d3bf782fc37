//! Drives a typewriter and a cycler from a virtual clock and prints the
//! snapshots a renderer would draw.
//!
//! Run with: `cargo run -p kinetext_sequencer --example typewriter_demo`

use kinetext_core::VirtualClock;
use kinetext_sequencer::{CyclerConfig, SequencerHost, Snapshot, TypewriterConfig};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let clock = Arc::new(VirtualClock::new());
    let host = SequencerHost::new(clock.clone());

    let typewriter = host
        .mount(
            TypewriterConfig::new(vec![
                "Video Editor".to_string(),
                "Colorist".to_string(),
                "Visual Storyteller".to_string(),
            ])
            .with_hold(Duration::from_millis(400)),
        )
        .expect("valid typewriter config");

    let cycler = host
        .mount(
            CyclerConfig::new(vec!["films".to_string(), "reels".to_string()])
                .with_period(Duration::from_millis(1000)),
        )
        .expect("valid cycler config");

    // A renderer would redraw on its own cadence; here we step 100ms frames.
    for frame in 0..60 {
        clock.advance(Duration::from_millis(100));

        if let Some(Snapshot::Typewriter(snapshot)) = host.snapshot(typewriter) {
            let cursor = if snapshot.show_cursor { "|" } else { " " };
            println!("[{frame:02}] {}{cursor}", snapshot.visible_text);
        }

        if let Some(Snapshot::Cycler(snapshot)) = host.snapshot(cycler) {
            if snapshot.target_width.is_none() {
                // report a fake measurement, as the rendering layer would
                host.request_measurement(cycler, snapshot.current_index, 80.0);
            }
        }
    }

    host.unmount(typewriter);
    host.unmount(cycler);
}
