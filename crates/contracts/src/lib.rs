//! v1 cross-boundary contracts for the household hesitancy kernel: run
//! configuration, reference data tables, and exported statistics.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod reference;
pub mod statistics;

pub use reference::{
    AttitudeDist, AttractorConfig, AttractorPosition, HesitancyProfile, HouseholdType,
    PositionKey, Relation, RelationFrequency, SignalSchedule, VaccineStatus,
};
pub use statistics::{
    AttractorRecord, HouseholdRecord, MemberBehavior, MemberStatus, PersonRecord,
    PopulationSnapshot,
};

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const DAYS_PER_YEAR: i64 = 365;

/// Converts a duration in years to virtual days.
pub fn years_to_days(years: Decimal) -> Decimal {
    years * Decimal::from(DAYS_PER_YEAR)
}

/// Converts virtual days to years.
pub fn days_to_years(days: Decimal) -> Decimal {
    days / Decimal::from(DAYS_PER_YEAR)
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

/// A named probability distribution, parsed once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionSpec {
    Const { value: f64 },
    Bernoulli { p: f64 },
    Uniform { min: f64, max: f64 },
    UniformDiscrete { min: i64, max: i64 },
    Exponential { rate: f64 },
    /// Parameters are on the log scale (meanlog, sdlog).
    LogNormal { mean: f64, sd: f64 },
    Weibull { shape: f64, scale: f64 },
    Poisson { mean: f64 },
}

impl DistributionSpec {
    pub fn constant(value: f64) -> Self {
        Self::Const { value }
    }

    pub fn validate(&self, label: &str) -> Result<(), String> {
        let ok = match self {
            Self::Const { value } => value.is_finite(),
            Self::Bernoulli { p } => (0.0..=1.0).contains(p),
            Self::Uniform { min, max } => min.is_finite() && max.is_finite() && min <= max,
            Self::UniformDiscrete { min, max } => min <= max,
            Self::Exponential { rate } => rate.is_finite() && *rate > 0.0,
            Self::LogNormal { mean, sd } => mean.is_finite() && sd.is_finite() && *sd >= 0.0,
            Self::Weibull { shape, scale } => {
                shape.is_finite() && scale.is_finite() && *shape > 0.0 && *scale > 0.0
            }
            Self::Poisson { mean } => mean.is_finite() && *mean >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("malformed distribution for {label}: {self:?}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// How a household dampens peer appreciation by its calculation level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppreciationFilterKind {
    Threshold,
    #[default]
    Shifted,
}

/// How a household's attitude is compared against a vaccination occasion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Threshold,
    #[default]
    Average,
}

/// Convenience factors of one vaccination opportunity, each in [0,1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaxOccasion {
    pub utility: Decimal,
    pub proximity: Decimal,
    pub clarity: Decimal,
    pub affinity: Decimal,
}

impl VaxOccasion {
    pub fn new(utility: Decimal, proximity: Decimal, clarity: Decimal, affinity: Decimal) -> Self {
        Self {
            utility,
            proximity,
            clarity,
            affinity,
        }
    }

    /// Mean of the four factors.
    pub fn convenience(&self) -> Decimal {
        (self.utility + self.proximity + self.clarity + self.affinity) / Decimal::from(4)
    }
}

// ---------------------------------------------------------------------------
// Recurrence
// ---------------------------------------------------------------------------

/// A repeating virtual-time trigger: fires at `offset_days + k * period_days`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recurrence {
    pub offset_days: Decimal,
    pub period_days: Decimal,
}

impl Recurrence {
    pub fn every(period_days: Decimal) -> Self {
        Self {
            offset_days: period_days,
            period_days,
        }
    }

    /// First firing at or after `now`.
    pub fn first_at_or_after(&self, now: Decimal) -> Decimal {
        if now <= self.offset_days || self.period_days <= Decimal::ZERO {
            return self.offset_days.max(now);
        }
        let elapsed = ((now - self.offset_days) / self.period_days).ceil();
        self.offset_days + elapsed * self.period_days
    }

    pub fn next_after(&self, fired_at: Decimal) -> Decimal {
        fired_at + self.period_days
    }

    fn validate(&self, label: &str) -> Result<(), String> {
        if self.period_days <= Decimal::ZERO {
            return Err(format!("{label} period must be positive"));
        }
        if self.offset_days < Decimal::ZERO {
            return Err(format!("{label} offset must not be negative"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationConfig {
    /// Target number of persons; households are created until reached.
    pub size: u64,
    /// Pre-size matrices from `size` and refuse to grow past it.
    #[serde(default)]
    pub fixed_capacity: bool,
    pub household_types: Vec<HouseholdType>,
    pub referent_age_years: DistributionSpec,
    pub referent_male_probability: f64,
    pub child_age_offset_years: Decimal,
    pub leave_home_age_years: Decimal,
    pub migration_interval_days: DistributionSpec,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 3_000,
            fixed_capacity: false,
            household_types: vec![
                HouseholdType::new("couple_with_child", 3, 1, 0.55),
                HouseholdType::new("single_parent", 2, 1, 0.15),
                HouseholdType::new("couple", 2, 0, 0.30),
            ],
            referent_age_years: DistributionSpec::Uniform { min: 21.0, max: 40.0 },
            referent_male_probability: 0.5,
            child_age_offset_years: Decimal::from(20),
            leave_home_age_years: Decimal::from(20),
            migration_interval_days: DistributionSpec::Exponential { rate: 0.05 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HesitancyConfig {
    pub profiles: Vec<HesitancyProfile>,
    pub calculation: DistributionSpec,
    #[serde(default)]
    pub propagator: AppreciationFilterKind,
    #[serde(default)]
    pub evaluator: EvaluatorKind,
    #[serde(default)]
    pub relation_frequencies: Vec<RelationFrequency>,
    /// Used when no relation-frequency row matches a referent.
    pub default_impression_days: Decimal,
    pub impression_impact_rate: Decimal,
    pub propagation: Recurrence,
}

impl Default for HesitancyConfig {
    fn default() -> Self {
        Self {
            profiles: vec![
                HesitancyProfile {
                    religious: false,
                    alternative: false,
                    status: VaccineStatus::All,
                    fraction: 0.85,
                    confidence: AttitudeDist::new(5.0, 0.75, 0.0, 1.0),
                    complacency: AttitudeDist::new(2.0, 0.3, 0.0, 1.0),
                },
                HesitancyProfile {
                    religious: false,
                    alternative: false,
                    status: VaccineStatus::Some,
                    fraction: 0.10,
                    confidence: AttitudeDist::new(3.0, 0.55, 0.0, 1.0),
                    complacency: AttitudeDist::new(2.5, 0.45, 0.0, 1.0),
                },
                HesitancyProfile {
                    religious: false,
                    alternative: true,
                    status: VaccineStatus::None,
                    fraction: 0.05,
                    confidence: AttitudeDist::new(2.0, 0.3, 0.0, 1.0),
                    complacency: AttitudeDist::new(4.0, 0.7, 0.0, 1.0),
                },
            ],
            calculation: DistributionSpec::constant(0.5),
            propagator: AppreciationFilterKind::Shifted,
            evaluator: EvaluatorKind::Average,
            relation_frequencies: Relation::ALL
                .iter()
                .flat_map(|relation| {
                    [true, false].map(|male| RelationFrequency {
                        male,
                        relation: *relation,
                        age_min: 0.0,
                        age_max: 120.0,
                        meanlog: relation.default_meanlog(),
                        sdlog: 0.5,
                    })
                })
                .collect(),
            default_impression_days: Decimal::from(7),
            impression_impact_rate: Decimal::ONE,
            propagation: Recurrence::every(Decimal::from(7)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Target mean degree over the whole social network.
    pub degree: u32,
    /// Watts–Strogatz rewiring probability in [0,1].
    pub beta: f64,
    /// Share of a household's degree spent within its attractor group.
    pub assortativity: f64,
    /// Probability that a household sends its child to an assortative school.
    pub school_assortativity: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            degree: 10,
            beta: 0.5,
            assortativity: 0.75,
            school_assortativity: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaccinationConfig {
    pub recurrence: Recurrence,
    pub min_age_years: Decimal,
    pub max_age_years: Decimal,
    pub utility: DistributionSpec,
    pub proximity: DistributionSpec,
    pub clarity: DistributionSpec,
    pub affinity: DistributionSpec,
}

impl Default for VaccinationConfig {
    fn default() -> Self {
        Self {
            recurrence: Recurrence::every(Decimal::from(7)),
            min_age_years: Decimal::new(5, 1),
            max_age_years: Decimal::from(4),
            utility: DistributionSpec::constant(0.5),
            proximity: DistributionSpec::constant(0.5),
            clarity: DistributionSpec::constant(0.5),
            affinity: DistributionSpec::constant(0.5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StatisticsConfig {
    /// No snapshots are queued when absent.
    pub recurrence: Option<Recurrence>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    pub schema_version: String,
    pub run_id: String,
    pub seed: u64,
    pub duration_days: Decimal,
    pub population: PopulationConfig,
    pub hesitancy: HesitancyConfig,
    pub network: NetworkConfig,
    pub vaccination: VaccinationConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    pub attractors: Vec<AttractorConfig>,
    #[serde(default = "default_worker_threads")]
    pub propagator_worker_threads: u16,
}

fn default_worker_threads() -> u16 {
    1
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: "run_local_001".to_string(),
            seed: 1337,
            duration_days: Decimal::from(365),
            population: PopulationConfig::default(),
            hesitancy: HesitancyConfig::default(),
            network: NetworkConfig::default(),
            vaccination: VaccinationConfig::default(),
            statistics: StatisticsConfig {
                recurrence: Some(Recurrence::every(Decimal::from(28))),
            },
            attractors: vec![
                AttractorConfig::new(
                    "public_health",
                    AttractorPosition::new(Decimal::new(9, 1), Decimal::new(1, 1)),
                ),
                AttractorConfig {
                    alternative: true,
                    ..AttractorConfig::new(
                        "alternative_medicine",
                        AttractorPosition::new(Decimal::new(2, 1), Decimal::new(8, 1)),
                    )
                },
            ],
            propagator_worker_threads: 1,
        }
    }
}

impl SimConfig {
    /// Reports the first configuration problem found, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.population.size == 0 {
            return Err("population size must be positive".to_string());
        }
        if self.attractors.is_empty() {
            return Err("at least one attractor is required".to_string());
        }
        if self.duration_days <= Decimal::ZERO {
            return Err("duration must be positive".to_string());
        }
        if self.population.household_types.is_empty() {
            return Err("household type table is empty".to_string());
        }
        for household_type in &self.population.household_types {
            if household_type.size == 0 || household_type.child_count >= household_type.size {
                return Err(format!(
                    "household type {} needs a referent and size > child count",
                    household_type.name
                ));
            }
            if !(household_type.weight.is_finite() && household_type.weight >= 0.0) {
                return Err(format!("household type {} has a bad weight", household_type.name));
            }
        }
        if self.population.household_types.iter().all(|t| t.weight <= 0.0) {
            return Err("household type weights sum to zero".to_string());
        }
        if self.hesitancy.profiles.is_empty() {
            return Err("hesitancy profile table is empty".to_string());
        }
        if self.hesitancy.profiles.iter().all(|p| p.fraction <= 0.0) {
            return Err("hesitancy profile fractions sum to zero".to_string());
        }
        for profile in &self.hesitancy.profiles {
            profile.confidence.validate("confidence")?;
            profile.complacency.validate("complacency")?;
        }
        for row in &self.hesitancy.relation_frequencies {
            if !(row.sdlog.is_finite() && row.sdlog >= 0.0 && row.meanlog.is_finite()) {
                return Err(format!("malformed relation frequency row: {row:?}"));
            }
        }
        if self.hesitancy.impression_impact_rate <= Decimal::ZERO {
            return Err("impression impact rate must be positive".to_string());
        }
        if self.hesitancy.default_impression_days <= Decimal::ZERO {
            return Err("default impression period must be positive".to_string());
        }
        self.hesitancy.propagation.validate("propagation")?;
        self.vaccination.recurrence.validate("vaccination")?;
        if let Some(recurrence) = &self.statistics.recurrence {
            recurrence.validate("statistics")?;
        }
        if self.vaccination.min_age_years > self.vaccination.max_age_years {
            return Err("vaccination age range is empty".to_string());
        }
        for (label, probability) in [
            ("network beta", self.network.beta),
            ("network assortativity", self.network.assortativity),
            ("school assortativity", self.network.school_assortativity),
            ("referent male probability", self.population.referent_male_probability),
        ] {
            if !(0.0..=1.0).contains(&probability) {
                return Err(format!("{label} must lie in [0,1], got {probability}"));
            }
        }
        self.population
            .referent_age_years
            .validate("referent age")?;
        self.population
            .migration_interval_days
            .validate("migration interval")?;
        self.hesitancy.calculation.validate("calculation")?;
        self.vaccination.utility.validate("utility")?;
        self.vaccination.proximity.validate("proximity")?;
        self.vaccination.clarity.validate("clarity")?;
        self.vaccination.affinity.validate("affinity")?;
        for attractor in &self.attractors {
            attractor.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStatus {
    pub schema_version: String,
    pub run_id: String,
    pub now_days: Decimal,
    pub horizon_days: Decimal,
    pub processed_events: u64,
    pub queue_depth: usize,
    pub complete: bool,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={} day={}/{} events={} queue_depth={}{}",
            self.run_id,
            self.now_days.round_dp(2),
            self.horizon_days,
            self.processed_events,
            self.queue_depth,
            if self.complete { " complete" } else { "" }
        )
    }
}
