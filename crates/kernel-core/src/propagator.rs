//! Attitude propagation: each ordinary household moves its confidence and
//! complacency toward the calculation-filtered weighted average of its
//! activated peers, itself and its attractor.
//!
//! Rows are evaluated against pre-cycle values only; new values are staged
//! and committed after every row has been read.

use std::collections::BTreeMap;

use contracts::AppreciationFilterKind;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use crate::attributes::{clamp_unit, HouseholdAttribute};
use crate::matrix::AttributeMatrix;
use crate::network::ActivityGraph;

/// Decimal places kept in propagated attitudes.
pub const ATTITUDE_SCALE: u32 = 12;

/// Dampens a peer's appreciation `weight` by the household's calculation
/// level `calculation`.
///
/// `Threshold` keeps the weight only when it reaches the calculation level;
/// `Shifted` scales it by the household's openness `1 - calculation`.
pub fn filtered_appreciation(
    kind: AppreciationFilterKind,
    weight: Decimal,
    calculation: Decimal,
) -> Decimal {
    match kind {
        AppreciationFilterKind::Threshold => {
            if weight >= calculation {
                weight
            } else {
                Decimal::ZERO
            }
        }
        AppreciationFilterKind::Shifted => {
            (weight * (Decimal::ONE - clamp_unit(calculation))).max(Decimal::ZERO)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StagedRow {
    row: usize,
    confidence: Decimal,
    complacency: Decimal,
    peers: usize,
}

#[derive(Debug)]
pub struct AttitudePropagator {
    filter: AppreciationFilterKind,
    worker_threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl AttitudePropagator {
    pub fn new(filter: AppreciationFilterKind, worker_threads: usize) -> Self {
        if worker_threads <= 1 {
            return Self {
                filter,
                worker_threads,
                pool: None,
            };
        }
        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .build();
        Self::with_pool(filter, worker_threads, built)
    }

    /// Uses `built` as the worker pool; a pool that failed to build is logged
    /// and the propagator runs serially.
    pub fn with_pool(
        filter: AppreciationFilterKind,
        worker_threads: usize,
        built: Result<rayon::ThreadPool, rayon::ThreadPoolBuildError>,
    ) -> Self {
        let pool = match built {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!(
                    worker_threads,
                    error = %err,
                    "propagator pool unavailable, running serially"
                );
                None
            }
        };
        Self {
            filter,
            worker_threads,
            pool,
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn filter(&self) -> AppreciationFilterKind {
        self.filter
    }

    /// Recomputes every ordinary household touched by `activity` and returns,
    /// per changed row, the number of activated peers that contributed.
    pub fn propagate(
        &self,
        activity: &ActivityGraph,
        households: &mut AttributeMatrix<HouseholdAttribute>,
    ) -> BTreeMap<usize, usize> {
        let rows = households.live_rows().collect::<Vec<_>>();
        let staged = {
            let view: &AttributeMatrix<HouseholdAttribute> = &*households;
            if self.worker_threads <= 1 || rows.len() <= 1 {
                rows.iter()
                    .filter_map(|row| self.evaluate_row(*row, activity, view))
                    .collect::<Vec<_>>()
            } else if let Some(pool) = &self.pool {
                pool.install(|| {
                    rows.par_iter()
                        .filter_map(|row| self.evaluate_row(*row, activity, view))
                        .collect::<Vec<_>>()
                })
            } else {
                rows.iter()
                    .filter_map(|row| self.evaluate_row(*row, activity, view))
                    .collect::<Vec<_>>()
            }
        };

        let mut changed = BTreeMap::new();
        for entry in staged {
            households.set(entry.row, HouseholdAttribute::Confidence, entry.confidence);
            households.set(entry.row, HouseholdAttribute::Complacency, entry.complacency);
            changed.insert(entry.row, entry.peers);
        }
        debug!(
            households = rows.len(),
            changed = changed.len(),
            filter = ?self.filter,
            "propagated attitudes"
        );
        changed
    }

    fn evaluate_row(
        &self,
        row: usize,
        activity: &ActivityGraph,
        households: &AttributeMatrix<HouseholdAttribute>,
    ) -> Option<StagedRow> {
        let attractor = households
            .get(row, HouseholdAttribute::AttractorRef)
            .to_usize()?;
        if attractor == row || !households.is_live(attractor) {
            return None;
        }

        let calculation = households.get(row, HouseholdAttribute::Calculation);
        let mut sum_w = Decimal::ZERO;
        let mut confidence = Decimal::ZERO;
        let mut complacency = Decimal::ZERO;
        let mut peers = 0usize;
        for (peer, weight) in activity.active_neighbors(row) {
            if !households.is_live(peer) {
                continue;
            }
            let w = filtered_appreciation(self.filter, weight, calculation);
            if w <= Decimal::ZERO {
                continue;
            }
            peers += 1;
            sum_w += w;
            confidence += w * households.get(peer, HouseholdAttribute::Confidence);
            complacency += w * households.get(peer, HouseholdAttribute::Complacency);
        }
        if sum_w <= Decimal::ZERO {
            return None;
        }

        let self_w = sum_w * households.get(row, HouseholdAttribute::ImpressionSelf);
        let attr_w = sum_w * households.get(row, HouseholdAttribute::ImpressionAttractor);
        let total_w = sum_w + self_w + attr_w;

        confidence += self_w * households.get(row, HouseholdAttribute::Confidence)
            + attr_w * households.get(attractor, HouseholdAttribute::Confidence);
        complacency += self_w * households.get(row, HouseholdAttribute::Complacency)
            + attr_w * households.get(attractor, HouseholdAttribute::Complacency);

        let staged = StagedRow {
            row,
            confidence: clamp_unit((confidence / total_w).round_dp(ATTITUDE_SCALE)),
            complacency: clamp_unit((complacency / total_w).round_dp(ATTITUDE_SCALE)),
            peers,
        };
        trace!(
            row,
            peers,
            confidence = %staged.confidence,
            complacency = %staged.complacency,
            "staged attitude"
        );
        Some(staged)
    }
}
