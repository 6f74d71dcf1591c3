//! The household model: owns the population, the scheduler and every
//! recurring stream, and dispatches events one at a time in virtual time.

use std::collections::{BTreeMap, VecDeque};

use contracts::{
    days_to_years, years_to_days, AttractorConfig, AttractorRecord, HouseholdRecord, MemberStatus,
    PersonRecord, PopulationSnapshot, RunStatus, SimConfig, VaccineStatus, VaxOccasion,
    SCHEMA_VERSION_V1,
};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, info, trace, warn};

use crate::attributes::{clamp_unit, HouseholdAttribute, PersonAttribute};
use crate::connector::ConnectStats;
use crate::error::SimError;
use crate::evaluator::AttitudeEvaluator;
use crate::population::{HouseholdDraft, PersonDraft, PopulationStore};
use crate::propagator::AttitudePropagator;
use crate::random::{stream_rng, to_decimal, Sampler, Stream};
use crate::reference::ReferenceTables;
use crate::scheduler::{EventHandle, EventScheduler};

mod connect;
mod events;
mod init;
mod snapshot;
mod step;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    AttractorSignal {
        attractor: usize,
        schedule: usize,
        step: usize,
    },
    Impress {
        household: usize,
    },
    Propagate,
    Vaccinate,
    Migrate,
    LeaveHome {
        household: usize,
    },
    Statistics,
}

impl ModelEvent {
    /// Name of the recurring stream an event belongs to, for logging.
    pub fn stream(&self) -> &'static str {
        match self {
            Self::AttractorSignal { .. } => "attractor_signal",
            Self::Impress { .. } => "impression",
            Self::Propagate => "propagation",
            Self::Vaccinate => "vaccination",
            Self::Migrate => "migration",
            Self::LeaveHome { .. } => "leave_home",
            Self::Statistics => "statistics",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelCounters {
    pub propagations: u64,
    pub propagated_rows: u64,
    pub impressions: u64,
    pub occasions: u64,
    pub vaccinated: u64,
    pub migrations: u64,
    pub home_leavers: u64,
    pub terminated_streams: u64,
}

/// One household's sampling pass over its neighbours.
#[derive(Debug, Clone, Default)]
struct ImpressionCycle {
    remaining: Vec<usize>,
    interval: Decimal,
    handle: Option<EventHandle>,
}

#[derive(Debug, Clone)]
struct ModelSamplers {
    referent_age_years: Sampler,
    referent_male: Sampler,
    calculation: Sampler,
    school_assortative: Sampler,
    migration_interval_days: Sampler,
    utility: Sampler,
    proximity: Sampler,
    clarity: Sampler,
    affinity: Sampler,
}

#[derive(Debug)]
struct ModelStreams {
    population: StdRng,
    impression: StdRng,
    vaccination: StdRng,
    migration: StdRng,
}

#[derive(Debug)]
pub struct HouseholdModel {
    config: SimConfig,
    store: PopulationStore,
    scheduler: EventScheduler<ModelEvent>,
    propagator: AttitudePropagator,
    evaluator: AttitudeEvaluator,
    tables: ReferenceTables,
    samplers: ModelSamplers,
    streams: ModelStreams,
    cycles: BTreeMap<usize, ImpressionCycle>,
    leave_home: BTreeMap<usize, EventHandle>,
    outbox: VecDeque<PopulationSnapshot>,
    snapshot_seq: u64,
    processed_events: u64,
    counters: ModelCounters,
    connect_stats: ConnectStats,
    network_degree: usize,
}

impl HouseholdModel {
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn store(&self) -> &PopulationStore {
        &self.store
    }

    pub fn now(&self) -> Decimal {
        self.scheduler.now()
    }

    pub fn counters(&self) -> ModelCounters {
        self.counters
    }

    pub fn connect_stats(&self) -> ConnectStats {
        self.connect_stats
    }

    /// Per-group lattice degree `K` the network was built with.
    pub fn network_degree(&self) -> usize {
        self.network_degree
    }

    pub fn evaluator(&self) -> AttitudeEvaluator {
        self.evaluator
    }

    fn attractor_config(&self, attractor: usize) -> Option<&AttractorConfig> {
        self.config.attractors.get(attractor)
    }

    fn impression_delay(&self, impression_days: Decimal) -> Decimal {
        let rate = self.config.hesitancy.impression_impact_rate;
        if rate <= Decimal::ZERO {
            return impression_days;
        }
        impression_days / rate
    }
}

fn vaccination_status<R: Rng + ?Sized>(
    rng: &mut R,
    status: VaccineStatus,
    child_age_years: Decimal,
    min_age_years: Decimal,
) -> MemberStatus {
    if child_age_years < min_age_years {
        return MemberStatus::Susceptible;
    }
    match status {
        VaccineStatus::All => MemberStatus::ArtificialImmune,
        VaccineStatus::Some if rng.gen_bool(0.5) => MemberStatus::ArtificialImmune,
        VaccineStatus::Some | VaccineStatus::None => MemberStatus::Susceptible,
    }
}

fn decimal_years(value: f64) -> Result<Decimal, SimError> {
    to_decimal(value.max(0.0))
}
