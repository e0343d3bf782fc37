//! Interval cycler
//!
//! Advances through a list of items on a fixed period. Each transition asks
//! the rendering layer for the measured width of the incoming item; the
//! cycler owns timing, the renderer owns measurement, and the cache in
//! between is written at most once per index.

use crate::config::CyclerConfig;
use kinetext_core::Result;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Discrete phase of the cycler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclerPhase {
    /// Current item displayed at a known (or renderer-default) width
    Settled,
    /// Waiting for the incoming item's width measurement
    Transitioning,
}

/// Immutable read of a cycler's observable state
///
/// `target_width` is `None` while the current item is unmeasured - the
/// renderer should fall back to automatic sizing and report the measured
/// width back through [`Cycler::request_measurement`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CyclerSnapshot {
    pub current_index: usize,
    pub target_width: Option<f32>,
}

/// Fixed-period item cycler with a lazily filled width cache
pub struct Cycler {
    config: CyclerConfig,
    current: usize,
    /// Measured widths by item index, written at most once per index
    widths: FxHashMap<usize, f32>,
    phase: CyclerPhase,
    disposed: bool,
}

impl Cycler {
    /// Create a cycler. Fails with a configuration error if `items` is
    /// empty or the period is zero.
    pub fn new(config: CyclerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            current: 0,
            widths: FxHashMap::default(),
            phase: CyclerPhase::Settled,
            disposed: false,
        })
    }

    pub fn phase(&self) -> CyclerPhase {
        self.phase
    }

    pub fn current_item(&self) -> &str {
        &self.config.items[self.current]
    }

    /// Advance to the next item. Ignored while a transition is already in
    /// flight, and after disposal. A single-item list is legal: the index
    /// stays put but the transition still runs.
    pub fn tick(&mut self) {
        if self.disposed || self.phase == CyclerPhase::Transitioning {
            return;
        }
        self.phase = CyclerPhase::Transitioning;
        self.current = (self.current + 1) % self.config.items.len();
        if self.widths.contains_key(&self.current) {
            self.phase = CyclerPhase::Settled;
        }
    }

    /// Report the rendered width of the item at `index`. The first
    /// measurement for an index wins and is cached for the session; a
    /// measurement for the in-flight index settles the transition.
    /// Out-of-range indices are absorbed.
    pub fn request_measurement(&mut self, index: usize, width: f32) {
        if self.disposed || index >= self.config.items.len() {
            return;
        }
        self.widths.entry(index).or_insert(width);
        if self.phase == CyclerPhase::Transitioning && index == self.current {
            self.phase = CyclerPhase::Settled;
        }
    }

    pub fn snapshot(&self) -> CyclerSnapshot {
        CyclerSnapshot {
            current_index: self.current,
            target_width: self.widths.get(&self.current).copied(),
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

    fn cycler(items: &[&str]) -> Cycler {
        Cycler::new(CyclerConfig::new(
            items.iter().map(|s| s.to_string()).collect(),
        ))
        .unwrap()
    }

    #[test]
    fn test_unmeasured_transition_waits_for_width() {
        let mut cy = cycler(&["A", "BB", "CCC"]);

        cy.tick();
        assert_eq!(cy.phase(), CyclerPhase::Transitioning);
        assert_eq!(
            cy.snapshot(),
            CyclerSnapshot {
                current_index: 1,
                target_width: None
            }
        );

        cy.request_measurement(1, 42.0);
        assert_eq!(cy.phase(), CyclerPhase::Settled);
        assert_eq!(cy.snapshot().target_width, Some(42.0));
    }

    #[test]
    fn test_measurements_are_cached_per_index() {
        let mut cy = cycler(&["A", "BB"]);
        cy.tick();
        cy.request_measurement(1, 42.0);
        cy.tick();
        cy.request_measurement(0, 17.0);

        // back around to index 1: cached width, settles without measurement
        cy.tick();
        assert_eq!(cy.phase(), CyclerPhase::Settled);
        assert_eq!(cy.snapshot().target_width, Some(42.0));
    }

    #[test]
    fn test_first_measurement_wins() {
        let mut cy = cycler(&["A", "BB"]);
        cy.tick();
        cy.request_measurement(1, 42.0);
        cy.request_measurement(1, 99.0);
        assert_eq!(cy.snapshot().target_width, Some(42.0));
    }

    #[test]
    fn test_reentrant_ticks_ignored_until_settled() {
        let mut cy = cycler(&["A", "BB", "CCC"]);
        cy.tick();
        cy.tick();
        cy.tick();
        assert_eq!(cy.snapshot().current_index, 1);

        cy.request_measurement(1, 10.0);
        cy.tick();
        assert_eq!(cy.snapshot().current_index, 2);
    }

    #[test]
    fn test_single_item_list_is_legal() {
        let mut cy = cycler(&["only"]);
        cy.request_measurement(0, 5.0);
        cy.tick();
        assert_eq!(cy.snapshot().current_index, 0);
        assert_eq!(cy.phase(), CyclerPhase::Settled);
        assert_eq!(cy.snapshot().target_width, Some(5.0));
    }

    #[test]
    fn test_out_of_range_measurement_absorbed() {
        let mut cy = cycler(&["A"]);
        cy.request_measurement(7, 42.0);
        assert_eq!(cy.snapshot().target_width, None);
    }

    #[test]
    fn test_dispose_freezes_state() {
        let mut cy = cycler(&["A", "BB"]);
        cy.tick();
        let before = cy.snapshot();

        cy.dispose();
        cy.dispose();
        cy.tick();
        cy.request_measurement(1, 42.0);
        assert_eq!(cy.snapshot(), before);
    }
}
