//! Sequencer host
//!
//! Owns every mounted sequencer instance, registers their clock timers, and
//! fans ticks out / snapshots back. Timer callbacks capture a weak handle to
//! the host state, so a stray timer firing after teardown upgrades to
//! nothing and absorbs as a no-op rather than crashing the page.
//!
//! Timer ownership is explicit: the host records every registration per
//! instance and is solely responsible for cancelling them on unmount - there
//! is no implicit teardown. Cancellation is synchronous: the instance is
//! removed under the host lock first (after which no mutation or snapshot
//! change is observable), then its timers are cancelled with the clock.

use crate::config::{CyclerConfig, PlayheadConfig, RevealOptions, TypewriterConfig};
use crate::cycler::{Cycler, CyclerSnapshot};
use crate::playhead::{Playhead, PlayheadSnapshot};
use crate::typewriter::{Typewriter, TypewriterPhase, TypewriterSnapshot};
use crate::visibility::{
    EnterCallback, RegionId, ViewportPort, VisibilitySnapshot, VisibilityTrigger,
};
use kinetext_core::{ClockSource, Result, TimerFate, TimerId};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, Weak};

new_key_type! {
    /// Handle to a mounted sequencer instance
    pub struct InstanceId;
}

impl InstanceId {
    /// Convert to raw u64 for storage outside the engine
    pub fn to_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }

    /// Reconstruct from raw u64
    pub fn from_raw(raw: u64) -> Self {
        slotmap::KeyData::from_ffi(raw).into()
    }
}

/// What to mount
///
/// The data-only configs are plain serde structs; the reveal variant also
/// carries its callback, which has no data representation.
pub enum MountConfig {
    Typewriter(TypewriterConfig),
    Cycler(CyclerConfig),
    Reveal {
        options: RevealOptions,
        on_enter: EnterCallback,
    },
    Playhead(PlayheadConfig),
}

impl From<TypewriterConfig> for MountConfig {
    fn from(config: TypewriterConfig) -> Self {
        MountConfig::Typewriter(config)
    }
}

impl From<CyclerConfig> for MountConfig {
    fn from(config: CyclerConfig) -> Self {
        MountConfig::Cycler(config)
    }
}

impl From<PlayheadConfig> for MountConfig {
    fn from(config: PlayheadConfig) -> Self {
        MountConfig::Playhead(config)
    }
}

/// Immutable read of one instance's observable state
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    Typewriter(TypewriterSnapshot),
    Cycler(CyclerSnapshot),
    Visibility(VisibilitySnapshot),
    Playhead(PlayheadSnapshot),
}

enum Sequencer {
    Typewriter(Typewriter),
    Cycler(Cycler),
    Reveal(VisibilityTrigger),
    Playhead(Playhead),
}

impl Sequencer {
    fn kind(&self) -> &'static str {
        match self {
            Sequencer::Typewriter(_) => "typewriter",
            Sequencer::Cycler(_) => "cycler",
            Sequencer::Reveal(_) => "reveal",
            Sequencer::Playhead(_) => "playhead",
        }
    }

    fn snapshot(&self) -> Snapshot {
        match self {
            Sequencer::Typewriter(tw) => Snapshot::Typewriter(tw.snapshot()),
            Sequencer::Cycler(cy) => Snapshot::Cycler(cy.snapshot()),
            Sequencer::Reveal(trigger) => Snapshot::Visibility(trigger.snapshot()),
            Sequencer::Playhead(ph) => Snapshot::Playhead(ph.snapshot()),
        }
    }

    fn dispose(&mut self) {
        match self {
            Sequencer::Typewriter(tw) => tw.dispose(),
            Sequencer::Cycler(cy) => cy.dispose(),
            Sequencer::Reveal(trigger) => trigger.dispose(),
            Sequencer::Playhead(ph) => ph.dispose(),
        }
    }
}

struct Mounted {
    sequencer: Sequencer,
    /// Every clock registration owned by this instance
    timers: SmallVec<[TimerId; 2]>,
}

struct HostInner {
    instances: SlotMap<InstanceId, Mounted>,
}

/// Owns sequencer instances and wires them to a clock source
pub struct SequencerHost {
    inner: Arc<Mutex<HostInner>>,
    clock: Arc<dyn ClockSource + Send + Sync>,
    viewport: Option<Arc<dyn ViewportPort>>,
}

impl SequencerHost {
    pub fn new(clock: Arc<dyn ClockSource + Send + Sync>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HostInner {
                instances: SlotMap::with_key(),
            })),
            clock,
            viewport: None,
        }
    }

    /// Supply the viewport-intersection facility. Reveal instances mounted
    /// without one degrade to always-visible.
    pub fn with_viewport(mut self, port: Arc<dyn ViewportPort>) -> Self {
        self.viewport = Some(port);
        self
    }

    /// Validate the config, create the instance, and register its clock
    /// timers. Configuration errors surface here and nothing is mounted.
    pub fn mount(&self, config: impl Into<MountConfig>) -> Result<InstanceId> {
        match config.into() {
            MountConfig::Typewriter(config) => {
                let first_delay = config.type_interval;
                let blink_interval = config.blink_interval;
                let typewriter = Typewriter::new(config)?;
                let id = self.insert(Sequencer::Typewriter(typewriter));

                let weak = Arc::downgrade(&self.inner);
                let step = self
                    .clock
                    .schedule(first_delay, Box::new(move || Self::typewriter_step(&weak, id)));
                let weak = Arc::downgrade(&self.inner);
                let blink = self
                    .clock
                    .repeat(blink_interval, Box::new(move || Self::blink_step(&weak, id)));
                self.record_timers(id, [step, blink]);
                Ok(id)
            }
            MountConfig::Cycler(config) => {
                let period = config.period;
                let cycler = Cycler::new(config)?;
                let id = self.insert(Sequencer::Cycler(cycler));

                let weak = Arc::downgrade(&self.inner);
                let timer = self
                    .clock
                    .repeat(period, Box::new(move || Self::cycler_step(&weak, id)));
                self.record_timers(id, [timer]);
                Ok(id)
            }
            MountConfig::Reveal { options, on_enter } => {
                let trigger = VisibilityTrigger::new(options, self.viewport.clone(), on_enter)?;
                Ok(self.insert(Sequencer::Reveal(trigger)))
            }
            MountConfig::Playhead(config) => {
                let period = config.period;
                let toggle_interval = config.toggle_interval;
                let playhead = Playhead::new(config)?;
                let id = self.insert(Sequencer::Playhead(playhead));

                let weak = Arc::downgrade(&self.inner);
                let mut timers: SmallVec<[TimerId; 2]> = SmallVec::new();
                timers.push(
                    self.clock
                        .repeat(period, Box::new(move || Self::playhead_step(&weak, id))),
                );
                if let Some(interval) = toggle_interval {
                    let weak = Arc::downgrade(&self.inner);
                    timers.push(
                        self.clock
                            .repeat(interval, Box::new(move || Self::playhead_toggle(&weak, id))),
                    );
                }
                self.record_timers(id, timers);
                Ok(id)
            }
        }
    }

    /// Dispose an instance and cancel every timer it owns. Unknown ids and
    /// double-unmounts are no-ops.
    pub fn unmount(&self, id: InstanceId) {
        let removed = self.inner.lock().unwrap().instances.remove(id);
        let Some(mut mounted) = removed else { return };
        mounted.sequencer.dispose();
        // host lock released: safe to take the clock's queue lock
        for timer in mounted.timers {
            self.clock.cancel(timer);
        }
        tracing::debug!(
            "SequencerHost: unmounted {} {:?}",
            mounted.sequencer.kind(),
            id
        );
    }

    /// Manually advance one instance one step, for renderers that drive the
    /// engine themselves instead of running a clock.
    pub fn tick(&self, id: InstanceId) {
        let mut guard = self.inner.lock().unwrap();
        let Some(mounted) = guard.instances.get_mut(id) else {
            return;
        };
        match &mut mounted.sequencer {
            Sequencer::Typewriter(tw) => {
                if tw.phase() == TypewriterPhase::Holding {
                    tw.finish_hold();
                } else {
                    tw.tick();
                }
            }
            Sequencer::Cycler(cy) => cy.tick(),
            Sequencer::Playhead(ph) => ph.tick(),
            // reveals are event-driven, nothing to tick
            Sequencer::Reveal(_) => {}
        }
    }

    /// Pull-model read of an instance's current state. `None` once the
    /// instance is unmounted.
    pub fn snapshot(&self, id: InstanceId) -> Option<Snapshot> {
        let guard = self.inner.lock().unwrap();
        guard.instances.get(id).map(|m| m.sequencer.snapshot())
    }

    /// Forward a width measurement to a mounted cycler
    pub fn request_measurement(&self, id: InstanceId, index: usize, width: f32) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(Mounted {
            sequencer: Sequencer::Cycler(cy),
            ..
        }) = guard.instances.get_mut(id)
        {
            cy.request_measurement(index, width);
        }
    }

    /// Start watching a region on a mounted reveal trigger
    pub fn observe(&self, id: InstanceId, region: RegionId) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(Mounted {
            sequencer: Sequencer::Reveal(trigger),
            ..
        }) = guard.instances.get_mut(id)
        {
            trigger.observe(region);
        }
    }

    /// Stop watching a region on a mounted reveal trigger
    pub fn unobserve(&self, id: InstanceId, region: RegionId) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(Mounted {
            sequencer: Sequencer::Reveal(trigger),
            ..
        }) = guard.instances.get_mut(id)
        {
            trigger.unobserve(region);
        }
    }

    /// Forward an intersection event to a mounted reveal trigger
    pub fn intersection(&self, id: InstanceId, region: RegionId, ratio: f32) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(Mounted {
            sequencer: Sequencer::Reveal(trigger),
            ..
        }) = guard.instances.get_mut(id)
        {
            trigger.on_intersection(region, ratio);
        }
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.inner.lock().unwrap().instances.len()
    }

    fn insert(&self, sequencer: Sequencer) -> InstanceId {
        let kind = sequencer.kind();
        let id = self.inner.lock().unwrap().instances.insert(Mounted {
            sequencer,
            timers: SmallVec::new(),
        });
        tracing::debug!("SequencerHost: mounted {} {:?}", kind, id);
        id
    }

    fn record_timers(&self, id: InstanceId, timers: impl IntoIterator<Item = TimerId>) {
        let timers: SmallVec<[TimerId; 2]> = timers.into_iter().collect();
        let mut guard = self.inner.lock().unwrap();
        if let Some(mounted) = guard.instances.get_mut(id) {
            mounted.timers.extend(timers);
            return;
        }
        drop(guard);
        // instance was unmounted between insert and registration
        for timer in timers {
            self.clock.cancel(timer);
        }
    }

    // Timer callbacks. Each upgrades the weak host handle and looks its
    // instance up again; either failing means the timer outlived its owner
    // and retires itself.

    fn typewriter_step(inner: &Weak<Mutex<HostInner>>, id: InstanceId) -> TimerFate {
        let Some(inner) = inner.upgrade() else {
            return TimerFate::Done;
        };
        let mut guard = inner.lock().unwrap();
        let Some(Mounted {
            sequencer: Sequencer::Typewriter(tw),
            ..
        }) = guard.instances.get_mut(id)
        else {
            return TimerFate::Done;
        };
        if tw.phase() == TypewriterPhase::Holding {
            tw.finish_hold();
        } else {
            tw.tick();
        }
        match tw.step_delay() {
            Some(delay) => TimerFate::AfterDelay(delay),
            None => TimerFate::Done,
        }
    }

    fn blink_step(inner: &Weak<Mutex<HostInner>>, id: InstanceId) -> TimerFate {
        let Some(inner) = inner.upgrade() else {
            return TimerFate::Done;
        };
        let mut guard = inner.lock().unwrap();
        let Some(Mounted {
            sequencer: Sequencer::Typewriter(tw),
            ..
        }) = guard.instances.get_mut(id)
        else {
            return TimerFate::Done;
        };
        tw.toggle_cursor();
        TimerFate::Again
    }

    fn cycler_step(inner: &Weak<Mutex<HostInner>>, id: InstanceId) -> TimerFate {
        let Some(inner) = inner.upgrade() else {
            return TimerFate::Done;
        };
        let mut guard = inner.lock().unwrap();
        let Some(Mounted {
            sequencer: Sequencer::Cycler(cy),
            ..
        }) = guard.instances.get_mut(id)
        else {
            return TimerFate::Done;
        };
        cy.tick();
        TimerFate::Again
    }

    fn playhead_step(inner: &Weak<Mutex<HostInner>>, id: InstanceId) -> TimerFate {
        let Some(inner) = inner.upgrade() else {
            return TimerFate::Done;
        };
        let mut guard = inner.lock().unwrap();
        let Some(Mounted {
            sequencer: Sequencer::Playhead(ph),
            ..
        }) = guard.instances.get_mut(id)
        else {
            return TimerFate::Done;
        };
        ph.tick();
        TimerFate::Again
    }

    fn playhead_toggle(inner: &Weak<Mutex<HostInner>>, id: InstanceId) -> TimerFate {
        let Some(inner) = inner.upgrade() else {
            return TimerFate::Done;
        };
        let mut guard = inner.lock().unwrap();
        let Some(Mounted {
            sequencer: Sequencer::Playhead(ph),
            ..
        }) = guard.instances.get_mut(id)
        else {
            return TimerFate::Done;
        };
        ph.toggle();
        TimerFate::Again
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetext_core::VirtualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_typewriter(items: &[&str]) -> TypewriterConfig {
        TypewriterConfig::new(items.iter().map(|s| s.to_string()).collect())
            .with_type_interval(Duration::from_millis(10))
            .with_delete_interval(Duration::from_millis(5))
            .with_hold(Duration::from_millis(50))
            .with_blink_interval(Duration::from_secs(10))
    }

    fn visible_text(host: &SequencerHost, id: InstanceId) -> String {
        match host.snapshot(id) {
            Some(Snapshot::Typewriter(s)) => s.visible_text,
            other => panic!("expected typewriter snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_mounted_typewriter_runs_on_the_clock() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        let id = host.mount(fast_typewriter(&["ab"])).unwrap();

        // type: 10, 20; hold until 70; delete: 75, 80; retype: 90
        clock.advance(Duration::from_millis(20));
        assert_eq!(visible_text(&host, id), "ab");

        clock.advance(Duration::from_millis(49));
        assert_eq!(visible_text(&host, id), "ab");

        clock.advance(Duration::from_millis(6));
        assert_eq!(visible_text(&host, id), "a");

        clock.advance(Duration::from_millis(5));
        assert_eq!(visible_text(&host, id), "");

        clock.advance(Duration::from_millis(10));
        assert_eq!(visible_text(&host, id), "a");
    }

    #[test]
    fn test_non_looping_typewriter_retires_its_step_timer() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        let config = fast_typewriter(&["ab"]).with_looping(false);
        let id = host.mount(config).unwrap();

        clock.advance(Duration::from_millis(100));
        assert_eq!(visible_text(&host, id), "ab");
        // step timer retired on Terminal, blink repeat still registered
        assert_eq!(clock.timer_count(), 1);
    }

    #[test]
    fn test_cursor_blinks_while_holding() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        let config = fast_typewriter(&["ab"]).with_blink_interval(Duration::from_millis(15));
        let id = host.mount(config).unwrap();

        clock.advance(Duration::from_millis(20));
        let Some(Snapshot::Typewriter(snapshot)) = host.snapshot(id) else {
            panic!("expected typewriter snapshot");
        };
        // holding at t=20; blink fired at t=15
        assert_eq!(snapshot.visible_text, "ab");
        assert!(!snapshot.show_cursor);

        clock.advance(Duration::from_millis(10));
        let Some(Snapshot::Typewriter(snapshot)) = host.snapshot(id) else {
            panic!("expected typewriter snapshot");
        };
        assert_eq!(snapshot.visible_text, "ab");
        assert!(snapshot.show_cursor);
    }

    #[test]
    fn test_unmount_cancels_timers_synchronously() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        let id = host.mount(fast_typewriter(&["ab"])).unwrap();

        clock.advance(Duration::from_millis(20));
        host.unmount(id);

        assert_eq!(clock.timer_count(), 0);
        assert_eq!(host.instance_count(), 0);

        // ticks scheduled for the old instance can no longer observe it
        clock.advance(Duration::from_secs(10));
        assert_eq!(host.snapshot(id), None);

        // double unmount is a no-op
        host.unmount(id);
    }

    #[test]
    fn test_invalid_config_mounts_nothing() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());

        assert!(host.mount(TypewriterConfig::new(Vec::new())).is_err());
        assert_eq!(host.instance_count(), 0);
        assert_eq!(clock.timer_count(), 0);
    }

    #[test]
    fn test_cycler_waits_for_measurement_between_periods() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        let config = CyclerConfig::new(vec!["A".into(), "BB".into(), "CCC".into()])
            .with_period(Duration::from_millis(100));
        let id = host.mount(config).unwrap();

        clock.advance(Duration::from_millis(100));
        assert_eq!(
            host.snapshot(id),
            Some(Snapshot::Cycler(CyclerSnapshot {
                current_index: 1,
                target_width: None
            }))
        );

        // unmeasured: the next period tick is ignored
        clock.advance(Duration::from_millis(100));
        assert_eq!(
            host.snapshot(id),
            Some(Snapshot::Cycler(CyclerSnapshot {
                current_index: 1,
                target_width: None
            }))
        );

        host.request_measurement(id, 1, 42.0);
        assert_eq!(
            host.snapshot(id),
            Some(Snapshot::Cycler(CyclerSnapshot {
                current_index: 1,
                target_width: Some(42.0)
            }))
        );

        clock.advance(Duration::from_millis(100));
        assert_eq!(
            host.snapshot(id),
            Some(Snapshot::Cycler(CyclerSnapshot {
                current_index: 2,
                target_width: None
            }))
        );
    }

    #[test]
    fn test_playhead_ticks_and_toggles_on_schedule() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        let id = host.mount(PlayheadConfig::default()).unwrap();

        clock.advance(Duration::from_millis(160));
        assert_eq!(
            host.snapshot(id),
            Some(Snapshot::Playhead(PlayheadSnapshot {
                position: 1.0,
                active: false
            }))
        );

        clock.advance(Duration::from_millis(3840));
        assert_eq!(
            host.snapshot(id),
            Some(Snapshot::Playhead(PlayheadSnapshot {
                position: 25.0,
                active: true
            }))
        );
    }

    #[test]
    fn test_reveal_degrades_without_viewport() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock);
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        let id = host
            .mount(MountConfig::Reveal {
                options: RevealOptions::default(),
                on_enter: Box::new(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            })
            .unwrap();

        host.observe(id, RegionId(1));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let Some(Snapshot::Visibility(snapshot)) = host.snapshot(id) else {
            panic!("expected visibility snapshot");
        };
        assert!(snapshot.regions[0].has_fired);
    }

    struct NullPort;
    impl ViewportPort for NullPort {
        fn observe(&self, _region: RegionId) {}
        fn unobserve(&self, _region: RegionId) {}
    }

    #[test]
    fn test_reveal_forwards_intersections() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock).with_viewport(Arc::new(NullPort));
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        let id = host
            .mount(MountConfig::Reveal {
                options: RevealOptions::default().with_threshold(0.3),
                on_enter: Box::new(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            })
            .unwrap();

        host.observe(id, RegionId(1));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        host.intersection(id, RegionId(1), 0.5);
        host.intersection(id, RegionId(1), 0.0);
        host.intersection(id, RegionId(1), 0.5);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_host_absorbs_stray_timers() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        host.mount(fast_typewriter(&["ab"])).unwrap();
        host.mount(PlayheadConfig::default()).unwrap();
        drop(host);

        // stray timers upgrade to nothing and retire themselves
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.timer_count(), 0);
    }

    #[test]
    fn test_manual_tick_drives_an_instance() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock);
        let id = host.mount(fast_typewriter(&["hi"])).unwrap();

        host.tick(id);
        assert_eq!(visible_text(&host, id), "h");
        host.tick(id);
        assert_eq!(visible_text(&host, id), "hi");

        // unknown instances are absorbed
        host.unmount(id);
        host.tick(id);
        assert_eq!(host.snapshot(id), None);
    }

    #[test]
    fn test_instances_are_independent() {
        let clock = Arc::new(VirtualClock::new());
        let host = SequencerHost::new(clock.clone());
        let a = host.mount(fast_typewriter(&["aa"])).unwrap();
        let b = host.mount(fast_typewriter(&["bb"])).unwrap();
        assert_eq!(host.instance_count(), 2);

        clock.advance(Duration::from_millis(10));
        host.unmount(a);
        clock.advance(Duration::from_millis(10));

        assert_eq!(host.snapshot(a), None);
        assert_eq!(visible_text(&host, b), "bb");
    }
}
