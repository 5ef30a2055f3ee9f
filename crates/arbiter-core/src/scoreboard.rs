//! The reference checker (scoreboard).
//!
//! The checker pops samples from the queue, recomputes the grant it expects
//! with the static-priority rule and compares bit for bit. A mismatch is
//! logged with both vectors and counted; it never stops the run.
//!
//! # Reference models
//!
//! [`ReferenceModel::ObservedGrant`] locates "the" requester from the
//! observed grant's own set bits and expects exactly that lowest bit. It
//! therefore only catches grants with more than one line asserted; a grant
//! given to the wrong single requester passes. This is the default because
//! it is the check the bench has always performed.
//!
//! [`ReferenceModel::Request`] recomputes the grant from the request lines
//! and reset level the arbiter actually saw, which also catches a wrong
//! winner or a grant issued during reset. It must be selected explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arbiter_types::{GrantVector, Mismatch, Sample};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::arbiter::priority_select;
use crate::coverage::Coverage;
use crate::queue::SampleReceiver;

/// Maximum number of mismatches kept in full for the report. Later ones
/// are still counted.
pub const MAX_RECORDED_MISMATCHES: usize = 64;

/// What the checker recomputes the expected grant from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceModel {
    /// Expect the lowest set bit of the observed grant.
    #[default]
    ObservedGrant,
    /// Expect `priority_select(request)`, or all-zero under reset.
    Request,
}

/// Outcome of checking one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Observed and expected grants agree.
    Match,
    /// They differ.
    Mismatch(Mismatch),
}

/// Compute the grant `model` expects for `sample`.
pub fn expected_grant(model: ReferenceModel, sample: &Sample) -> GrantVector {
    match model {
        ReferenceModel::ObservedGrant => {
            GrantVector::from_bits(sample.grant.bits().isolate_lowest())
        }
        ReferenceModel::Request if sample.reset.is_asserted() => {
            GrantVector::from_bits(sample.request.bits().cleared())
        }
        ReferenceModel::Request => priority_select(&sample.request),
    }
}

/// Live counters, readable while the checker runs.
#[derive(Debug, Default)]
pub struct ScoreboardStats {
    /// Samples checked.
    checked: AtomicU64,
    /// Mismatches found.
    mismatches: AtomicU64,
}

impl ScoreboardStats {
    /// Samples checked so far.
    pub fn checked(&self) -> u64 {
        self.checked.load(Ordering::Acquire)
    }

    /// Mismatches found so far.
    pub fn mismatches(&self) -> u64 {
        self.mismatches.load(Ordering::Acquire)
    }
}

/// Everything the checker accumulated over a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardReport {
    /// Model used for expectations.
    pub reference_model: ReferenceModel,
    /// Samples checked.
    pub checked: u64,
    /// Mismatches found.
    pub mismatch_count: u64,
    /// The first [`MAX_RECORDED_MISMATCHES`] mismatches.
    pub mismatches: Vec<Mismatch>,
    /// Tick of the last sample checked, in arrival order.
    pub last_tick: Option<u64>,
    /// `true` if every sample arrived with tick = previous tick + 1.
    pub in_order: bool,
    /// Functional coverage over the checked samples.
    pub coverage: Coverage,
}

/// The reference checker.
#[derive(Debug)]
pub struct Scoreboard {
    /// Expectation basis.
    model: ReferenceModel,
    /// Shared live counters.
    stats: Arc<ScoreboardStats>,
    /// Recorded mismatches.
    mismatches: Vec<Mismatch>,
    /// Last tick seen.
    last_tick: Option<u64>,
    /// Whether ticks have arrived consecutively so far.
    in_order: bool,
    /// Coverage collector.
    coverage: Coverage,
}

impl Scoreboard {
    /// Create a checker for `requesters` lines.
    pub fn new(model: ReferenceModel, requesters: usize, stats: Arc<ScoreboardStats>) -> Self {
        Self {
            model,
            stats,
            mismatches: Vec::new(),
            last_tick: None,
            in_order: true,
            coverage: Coverage::new(requesters),
        }
    }

    /// Check one sample, recording the outcome.
    pub fn check(&mut self, sample: &Sample) -> Verdict {
        self.track_order(sample.tick);
        self.coverage.record(sample);
        self.stats.checked.fetch_add(1, Ordering::AcqRel);

        let expected = expected_grant(self.model, sample);
        if expected == sample.grant {
            return Verdict::Match;
        }

        let mismatch = Mismatch {
            tick: sample.tick,
            observed: sample.grant.clone(),
            expected,
        };
        error!(
            tick = mismatch.tick,
            time_ns = sample.time_ns,
            observed = %mismatch.observed,
            expected = %mismatch.expected,
            "Grant mismatch"
        );
        self.stats.mismatches.fetch_add(1, Ordering::AcqRel);
        if self.mismatches.len() < MAX_RECORDED_MISMATCHES {
            self.mismatches.push(mismatch.clone());
        }
        Verdict::Mismatch(mismatch)
    }

    /// Consume samples until the queue closes, then return the report.
    pub async fn run(mut self, mut queue: SampleReceiver) -> ScoreboardReport {
        while let Some(sample) = queue.pop().await {
            let _ = self.check(&sample);
        }
        debug!(
            checked = self.stats.checked(),
            mismatches = self.stats.mismatches(),
            "checker drained"
        );
        self.into_report()
    }

    /// Finish and produce the report.
    pub fn into_report(self) -> ScoreboardReport {
        ScoreboardReport {
            reference_model: self.model,
            checked: self.stats.checked(),
            mismatch_count: self.stats.mismatches(),
            mismatches: self.mismatches,
            last_tick: self.last_tick,
            in_order: self.in_order,
            coverage: self.coverage,
        }
    }

    /// Note whether `tick` directly follows the previous one.
    fn track_order(&mut self, tick: u64) {
        let consecutive = match self.last_tick {
            None => true,
            Some(prev) => prev.checked_add(1) == Some(tick),
        };
        self.in_order &= consecutive;
        self.last_tick = Some(tick);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use arbiter_types::ResetLevel;

    use super::*;
    use crate::queue::sample_queue;

    fn sample(tick: u64, reset: ResetLevel, request: &str, grant: &str) -> Sample {
        Sample {
            tick,
            time_ns: tick,
            reset,
            request: request.parse().unwrap(),
            grant: grant.parse().unwrap(),
        }
    }

    fn board(model: ReferenceModel) -> Scoreboard {
        Scoreboard::new(model, 4, Arc::new(ScoreboardStats::default()))
    }

    #[test]
    fn correct_grants_pass_both_models() {
        for model in [ReferenceModel::ObservedGrant, ReferenceModel::Request] {
            let mut sb = board(model);
            let cases = [
                (ResetLevel::Released, "0000", "0000"),
                (ResetLevel::Released, "0001", "0001"),
                (ResetLevel::Released, "0110", "0010"),
                (ResetLevel::Released, "1111", "0001"),
                (ResetLevel::Asserted, "1111", "0000"),
            ];
            for (i, (reset, req, grant)) in cases.iter().enumerate() {
                let tick = u64::try_from(i).unwrap();
                assert_eq!(sb.check(&sample(tick, *reset, req, grant)), Verdict::Match);
            }
            let report = sb.into_report();
            assert_eq!(report.checked, 5);
            assert_eq!(report.mismatch_count, 0);
            assert!(report.in_order);
        }
    }

    #[test]
    fn multi_grant_is_caught_by_observed_model() {
        let mut sb = board(ReferenceModel::ObservedGrant);
        let verdict = sb.check(&sample(0, ResetLevel::Released, "0110", "0110"));
        let Verdict::Mismatch(m) = verdict else {
            panic!("expected a mismatch");
        };
        assert_eq!(m.observed.to_string(), "0110");
        assert_eq!(m.expected.to_string(), "0010");
    }

    #[test]
    fn wrong_winner_slips_past_observed_model() {
        // Requester 2 granted although requester 1 outranks it.
        let wrong = sample(0, ResetLevel::Released, "0110", "0100");
        assert_eq!(
            board(ReferenceModel::ObservedGrant).check(&wrong),
            Verdict::Match
        );
        assert!(matches!(
            board(ReferenceModel::Request).check(&wrong),
            Verdict::Mismatch(_)
        ));
    }

    #[test]
    fn grant_during_reset_needs_request_model() {
        let during_reset = sample(0, ResetLevel::Asserted, "0001", "0001");
        assert_eq!(
            board(ReferenceModel::ObservedGrant).check(&during_reset),
            Verdict::Match
        );
        let Verdict::Mismatch(m) = board(ReferenceModel::Request).check(&during_reset) else {
            panic!("expected a mismatch");
        };
        assert_eq!(m.expected.to_string(), "0000");
    }

    #[test]
    fn mismatch_does_not_stop_checking() {
        let stats = Arc::new(ScoreboardStats::default());
        let mut sb = Scoreboard::new(ReferenceModel::ObservedGrant, 4, Arc::clone(&stats));
        let _ = sb.check(&sample(0, ResetLevel::Released, "1111", "1111"));
        let _ = sb.check(&sample(1, ResetLevel::Released, "0001", "0001"));
        let _ = sb.check(&sample(2, ResetLevel::Released, "1100", "1100"));
        assert_eq!(stats.checked(), 3);
        assert_eq!(stats.mismatches(), 2);

        let report = sb.into_report();
        assert_eq!(report.mismatches.len(), 2);
        assert_eq!(report.mismatches[0].tick, 0);
        assert_eq!(report.mismatches[1].tick, 2);
    }

    #[test]
    fn recorded_mismatches_are_capped() {
        let mut sb = board(ReferenceModel::ObservedGrant);
        for tick in 0..100 {
            let _ = sb.check(&sample(tick, ResetLevel::Released, "0011", "0011"));
        }
        let report = sb.into_report();
        assert_eq!(report.mismatch_count, 100);
        assert_eq!(report.mismatches.len(), MAX_RECORDED_MISMATCHES);
    }

    #[test]
    fn out_of_order_ticks_are_flagged() {
        let mut sb = board(ReferenceModel::ObservedGrant);
        let _ = sb.check(&sample(0, ResetLevel::Released, "0000", "0000"));
        let _ = sb.check(&sample(2, ResetLevel::Released, "0000", "0000"));
        assert!(!sb.into_report().in_order);
    }

    #[tokio::test]
    async fn run_drains_the_queue() {
        let (tx, rx) = sample_queue();
        let stats = Arc::new(ScoreboardStats::default());
        let sb = Scoreboard::new(ReferenceModel::Request, 4, Arc::clone(&stats));
        let handle = tokio::spawn(sb.run(rx));

        tx.push(sample(0, ResetLevel::Released, "0010", "0010")).unwrap();
        tx.push(sample(1, ResetLevel::Released, "0101", "0001")).unwrap();
        tx.push(sample(2, ResetLevel::Released, "1000", "1000")).unwrap();
        drop(tx);

        let report = handle.await.unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.mismatch_count, 0);
        assert_eq!(report.last_tick, Some(2));
        assert!(report.in_order);
        assert_eq!(report.coverage.grants, vec![1, 1, 0, 1]);
    }

    #[test]
    fn reference_model_yaml_names() {
        let model: ReferenceModel = serde_json::from_str("\"observed_grant\"").unwrap();
        assert_eq!(model, ReferenceModel::ObservedGrant);
        let model: ReferenceModel = serde_json::from_str("\"request\"").unwrap();
        assert_eq!(model, ReferenceModel::Request);
    }
}
