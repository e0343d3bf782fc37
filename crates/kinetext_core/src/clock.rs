//! Timer scheduling for sequencer instances
//!
//! The clock source is the one primitive every sequencer needs: a place to
//! register delayed and repeating callbacks, and a way to cancel them such
//! that a cancelled callback can never fire again.
//!
//! Two implementations are provided:
//! - [`VirtualClock`] - a deterministic virtual-time queue, advanced
//!   explicitly with [`VirtualClock::advance`]. This is the single ordered
//!   queue that makes out-of-order tick delivery impossible by construction.
//! - [`ThreadedClock`] - wraps a `VirtualClock` and advances it from a
//!   background thread by real elapsed time, so hosts keep animating without
//!   an external driver.
//!
//! Callbacks run with the queue lock held, which is what makes [`cancel`]
//! synchronous: once it returns, the callback is gone from the queue and any
//! in-flight tick on another thread has already completed. The flip side is
//! that a callback must not call back into the clock; rescheduling is
//! expressed through the returned [`TimerFate`] instead.
//!
//! [`cancel`]: ClockSource::cancel

use slotmap::{new_key_type, SlotMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

new_key_type! {
    /// Handle to a scheduled timer
    pub struct TimerId;
}

/// What a timer callback wants the clock to do with its registration next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerFate {
    /// Keep the registration and fire again after its period
    Again,
    /// Fire once more after the given delay (turns a repeat into a one-shot)
    AfterDelay(Duration),
    /// Remove the registration
    Done,
}

/// Boxed timer callback
///
/// Runs with the clock's queue lock held; must not call back into the clock.
/// Self-rescheduling is the returned [`TimerFate`].
pub type TimerCallback = Box<dyn FnMut() -> TimerFate + Send>;

/// Contract for scheduling deferred and repeating callbacks
///
/// Guarantees: a cancelled handle's callback never fires, even if it was
/// already due when `cancel` was called. No ordering is guaranteed between
/// independently registered callbacks beyond their nominal due times.
pub trait ClockSource {
    /// Register a one-shot callback after `delay`
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Register a repeating callback every `period`
    fn repeat(&self, period: Duration, callback: TimerCallback) -> TimerId;

    /// Cancel a registration. Synchronous: once this returns the callback
    /// will never fire again. Unknown or already-finished ids are no-ops.
    fn cancel(&self, id: TimerId);
}

struct TimerEntry {
    due_at: Duration,
    period: Option<Duration>,
    /// Registration order, breaks ties between equal due times
    seq: u64,
    callback: TimerCallback,
}

struct ClockInner {
    timers: SlotMap<TimerId, TimerEntry>,
    now: Duration,
    next_seq: u64,
}

/// Deterministic virtual-time clock
///
/// Time only moves when [`advance`](VirtualClock::advance) is called, so
/// tests (and pull-driven renderers) control exactly how far the timer queue
/// runs. Cloning yields another handle to the same queue.
pub struct VirtualClock {
    inner: Arc<Mutex<ClockInner>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                timers: SlotMap::with_key(),
                now: Duration::ZERO,
                next_seq: 0,
            })),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.inner.lock().unwrap().now
    }

    /// Number of live registrations
    pub fn timer_count(&self) -> usize {
        self.inner.lock().unwrap().timers.len()
    }

    /// Move virtual time forward by `dt`, firing every due callback in
    /// non-decreasing due-time order (ties in registration order)
    ///
    /// A repeating timer whose period fits several times into `dt` fires
    /// once per elapsed period. Virtual "now" tracks each callback's due
    /// time while firing, so delays requested from within a callback are
    /// measured from the moment it logically ran.
    pub fn advance(&self, dt: Duration) {
        let mut inner = self.inner.lock().unwrap();
        let target = inner.now + dt;
        loop {
            let next = inner
                .timers
                .iter()
                .filter(|(_, entry)| entry.due_at <= target)
                .min_by_key(|(_, entry)| (entry.due_at, entry.seq))
                .map(|(id, entry)| (id, entry.due_at));
            let Some((id, due)) = next else { break };
            if due > inner.now {
                inner.now = due;
            }
            let fate = match inner.timers.get_mut(id) {
                Some(entry) => (entry.callback)(),
                None => break,
            };
            match fate {
                TimerFate::Again => {
                    let mut expired = false;
                    if let Some(entry) = inner.timers.get_mut(id) {
                        match entry.period {
                            Some(period) => entry.due_at = due + period,
                            // one-shot asked to repeat without a period
                            None => expired = true,
                        }
                    }
                    if expired {
                        inner.timers.remove(id);
                    }
                }
                TimerFate::AfterDelay(delay) => {
                    let now = inner.now;
                    if let Some(entry) = inner.timers.get_mut(id) {
                        entry.due_at = now + delay;
                        entry.period = None;
                    }
                }
                TimerFate::Done => {
                    inner.timers.remove(id);
                }
            }
        }
        inner.now = target;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for VirtualClock {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ClockSource for VirtualClock {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let mut inner = self.inner.lock().unwrap();
        let due_at = inner.now + delay;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = inner.timers.insert(TimerEntry {
            due_at,
            period: None,
            seq,
            callback,
        });
        tracing::trace!("VirtualClock: scheduled one-shot {:?} in {:?}", id, delay);
        id
    }

    fn repeat(&self, period: Duration, callback: TimerCallback) -> TimerId {
        debug_assert!(!period.is_zero(), "repeat period must be non-zero");
        let mut inner = self.inner.lock().unwrap();
        let due_at = inner.now + period;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = inner.timers.insert(TimerEntry {
            due_at,
            period: Some(period),
            seq,
            callback,
        });
        tracing::trace!("VirtualClock: scheduled repeat {:?} every {:?}", id, period);
        id
    }

    fn cancel(&self, id: TimerId) {
        let removed = self.inner.lock().unwrap().timers.remove(id);
        if removed.is_some() {
            tracing::trace!("VirtualClock: cancelled {:?}", id);
        }
    }
}

/// Drives a [`VirtualClock`] from a background thread by real elapsed time
///
/// The thread wakes at the configured tick rate and advances the queue by
/// however much wall-clock time actually passed, so timer accuracy degrades
/// gracefully under load instead of drifting.
///
/// The thread is stopped on [`stop`](ThreadedClock::stop) or when the
/// `ThreadedClock` is dropped.
pub struct ThreadedClock {
    clock: VirtualClock,
    tick_rate: Duration,
    /// Stop signal for the driver thread
    stop_flag: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ThreadedClock {
    pub fn new(tick_rate: Duration) -> Self {
        Self {
            clock: VirtualClock::new(),
            tick_rate,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Handle to the underlying queue, for registering timers or inspecting
    /// virtual time
    pub fn clock(&self) -> VirtualClock {
        self.clock.clone()
    }

    /// Start the driver thread. Does nothing if already running.
    pub fn start(&mut self) {
        if self.thread_handle.is_some() {
            return;
        }

        let clock = self.clock.clone();
        let stop_flag = Arc::clone(&self.stop_flag);
        let tick_rate = self.tick_rate;

        self.thread_handle = Some(thread::spawn(move || {
            let mut last = Instant::now();
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(tick_rate);
                let now = Instant::now();
                clock.advance(now - last);
                last = now;
            }
        }));
        tracing::debug!("ThreadedClock: started, tick rate {:?}", self.tick_rate);
    }

    /// Stop the driver thread and wait for it to exit
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.stop_flag.store(false, Ordering::Relaxed);
        tracing::debug!("ThreadedClock: stopped");
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl ClockSource for ThreadedClock {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        self.clock.schedule(delay, callback)
    }

    fn repeat(&self, period: Duration, callback: TimerCallback) -> TimerId {
        self.clock.repeat(period, callback)
    }

    fn cancel(&self, id: TimerId) {
        self.clock.cancel(id);
    }
}

impl Drop for ThreadedClock {
    fn drop(&mut self) {
        self.stop();
    }
}
