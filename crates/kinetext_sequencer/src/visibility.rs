//! Visibility trigger
//!
//! Fires a reveal callback when a watched region enters the viewport. The
//! viewport-intersection facility is a collaborator behind [`ViewportPort`];
//! when the execution context has none (headless runs, tests), the trigger
//! degrades to "always visible" at construction instead of failing - the
//! reveal effect is decoration, not correctness.

use crate::config::RevealOptions;
use kinetext_core::Result;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque handle to a watched region, issued by the rendering layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u64);

/// Collaborator-supplied viewport-intersection facility
///
/// Implementations deliver `(region, ratio)` events back through
/// [`VisibilityTrigger::on_intersection`] at times outside the engine's
/// control.
pub trait ViewportPort: Send + Sync {
    fn observe(&self, region: RegionId);
    fn unobserve(&self, region: RegionId);
}

/// Boxed reveal callback
pub type EnterCallback = Box<dyn FnMut(RegionId) + Send>;

#[derive(Clone, Copy, Debug, Default)]
struct RegionState {
    is_visible: bool,
    has_fired: bool,
}

/// Observable state of one watched region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionVisibility {
    pub region: RegionId,
    pub is_visible: bool,
    pub has_fired: bool,
}

/// Immutable read of a trigger's observable state, one row per region
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySnapshot {
    pub regions: Vec<RegionVisibility>,
}

/// One-shot or repeatable viewport reveal trigger
pub struct VisibilityTrigger {
    options: RevealOptions,
    on_enter: EnterCallback,
    /// `None` means the capability is missing and the trigger is degraded
    port: Option<Arc<dyn ViewportPort>>,
    regions: FxHashMap<RegionId, RegionState>,
    disposed: bool,
}

impl VisibilityTrigger {
    /// Create a trigger. Fails with a configuration error if the threshold
    /// is outside `0.0..=1.0`. A missing `port` degrades the trigger to
    /// always-visible rather than failing.
    pub fn new(
        options: RevealOptions,
        port: Option<Arc<dyn ViewportPort>>,
        on_enter: EnterCallback,
    ) -> Result<Self> {
        options.validate()?;
        if port.is_none() {
            tracing::debug!("VisibilityTrigger: no viewport port, degrading to always-visible");
        }
        Ok(Self {
            options,
            on_enter,
            port,
            regions: FxHashMap::default(),
            disposed: false,
        })
    }

    /// Whether the trigger is running without a viewport facility
    pub fn is_degraded(&self) -> bool {
        self.port.is_none()
    }

    /// Start watching a region. In degraded mode the region is revealed
    /// immediately.
    pub fn observe(&mut self, region: RegionId) {
        if self.disposed {
            return;
        }
        self.regions.entry(region).or_default();
        match &self.port {
            Some(port) => port.observe(region),
            None => self.on_intersection(region, 1.0),
        }
    }

    /// Stop watching a region. Idempotent; unknown regions are no-ops.
    pub fn unobserve(&mut self, region: RegionId) {
        if self.disposed {
            return;
        }
        if self.regions.remove(&region).is_some() {
            if let Some(port) = &self.port {
                port.unobserve(region);
            }
        }
    }

    /// Intersection event pushed by the viewport facility. Events for
    /// unknown regions, and any event after disposal, are absorbed.
    pub fn on_intersection(&mut self, region: RegionId, ratio: f32) {
        if self.disposed {
            return;
        }
        let one_shot = self.options.one_shot;
        let threshold = self.options.threshold;
        let Some(state) = self.regions.get_mut(&region) else {
            return;
        };

        if ratio >= threshold {
            if state.is_visible || (one_shot && state.has_fired) {
                return;
            }
            state.is_visible = true;
            state.has_fired = true;
            (self.on_enter)(region);
            if one_shot {
                // fired regions keep their state row but stop receiving
                // facility events
                if let Some(port) = &self.port {
                    port.unobserve(region);
                }
            }
        } else if !one_shot {
            state.is_visible = false;
        }
    }

    pub fn snapshot(&self) -> VisibilitySnapshot {
        let mut regions: Vec<RegionVisibility> = self
            .regions
            .iter()
            .map(|(region, state)| RegionVisibility {
                region: *region,
                is_visible: state.is_visible,
                has_fired: state.has_fired,
            })
            .collect();
        regions.sort_by_key(|r| r.region.0);
        VisibilitySnapshot { regions }
    }

    /// Stop the trigger and cancel every facility subscription. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(port) = &self.port {
            for region in self.regions.keys() {
                port.unobserve(*region);
            }
        }
        self.regions.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
