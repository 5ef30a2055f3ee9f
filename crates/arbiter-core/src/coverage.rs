//! Functional coverage over monitor samples.
//!
//! Counts which situations the run actually exercised: every requester
//! being granted, idle edges, edges under reset, and contended edges where
//! more than one requester competed. Requesters that were never granted
//! show up as holes.

use arbiter_types::Sample;
use serde::{Deserialize, Serialize};

/// Coverage counters for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Samples recorded.
    pub samples: u64,
    /// Edges with reset asserted.
    pub reset_ticks: u64,
    /// Edges out of reset with no request.
    pub idle_ticks: u64,
    /// Edges out of reset with two or more requests.
    pub contended_ticks: u64,
    /// Edges whose grant had more than one line asserted.
    pub multi_grant_ticks: u64,
    /// Per-requester count of edges on which it held the grant.
    pub grants: Vec<u64>,
}

impl Coverage {
    /// Create empty coverage for `requesters` request lines.
    pub fn new(requesters: usize) -> Self {
        Self {
            samples: 0,
            reset_ticks: 0,
            idle_ticks: 0,
            contended_ticks: 0,
            multi_grant_ticks: 0,
            grants: vec![0; requesters],
        }
    }

    /// Fold one sample into the counters.
    pub fn record(&mut self, sample: &Sample) {
        self.samples = self.samples.saturating_add(1);

        if sample.reset.is_asserted() {
            self.reset_ticks = self.reset_ticks.saturating_add(1);
        } else {
            match sample.request.bits().count_ones() {
                0 => self.idle_ticks = self.idle_ticks.saturating_add(1),
                1 => {}
                _ => self.contended_ticks = self.contended_ticks.saturating_add(1),
            }
        }

        if !sample.grant.is_exclusive() {
            self.multi_grant_ticks = self.multi_grant_ticks.saturating_add(1);
        }
        for index in sample.grant.bits().iter_ones() {
            if let Some(count) = self.grants.get_mut(index) {
                *count = count.saturating_add(1);
            }
        }
    }

    /// Requesters that were never granted.
    pub fn holes(&self) -> Vec<usize> {
        self.grants
            .iter()
            .enumerate()
            .filter_map(|(i, n)| (*n == 0).then_some(i))
            .collect()
    }

    /// Fraction of requesters granted at least once, in percent.
    pub fn grant_coverage_percent(&self) -> u64 {
        let total = u64::try_from(self.grants.len()).unwrap_or(u64::MAX);
        if total == 0 {
            return 0;
        }
        let hit = u64::try_from(self.grants.iter().filter(|n| **n > 0).count()).unwrap_or(0);
        hit.saturating_mul(100).checked_div(total).unwrap_or(0)
    }
}
