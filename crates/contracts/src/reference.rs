//! Reference data tables: household types, hesitancy profiles, relation
//! frequencies and attractor definitions. These arrive pre-parsed; the
//! kernel performs no file I/O of its own.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HouseholdType {
    pub name: String,
    /// Members including the referent.
    pub size: u8,
    pub child_count: u8,
    /// Relative categorical weight.
    pub weight: f64,
}

impl HouseholdType {
    pub fn new(name: &str, size: u8, child_count: u8, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            size,
            child_count,
            weight,
        }
    }
}

/// Vaccination history of a hesitancy profile's households.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum VaccineStatus {
    All,
    Some,
    None,
}

/// Weibull attitude distribution cropped to a `[min, max]` window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AttitudeDist {
    pub shape: f64,
    pub scale: f64,
    pub min: f64,
    pub max: f64,
}

impl AttitudeDist {
    pub fn new(shape: f64, scale: f64, min: f64, max: f64) -> Self {
        Self {
            shape,
            scale,
            min,
            max,
        }
    }

    /// Lower and upper crop bounds applied to raw draws.
    pub fn crop_bounds(&self) -> (f64, f64) {
        (self.min * 1.01, self.max.powf(1.01))
    }

    pub fn validate(&self, label: &str) -> Result<(), String> {
        let finite = [self.shape, self.scale, self.min, self.max]
            .iter()
            .all(|value| value.is_finite());
        if !finite || self.shape <= 0.0 || self.scale <= 0.0 || self.min > self.max {
            return Err(format!("malformed {label} attitude distribution: {self:?}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HesitancyProfile {
    pub religious: bool,
    pub alternative: bool,
    pub status: VaccineStatus,
    /// Relative share among profiles of the same category.
    pub fraction: f64,
    pub confidence: AttitudeDist,
    pub complacency: AttitudeDist,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Family,
    Friends,
    Neighbors,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::Family, Relation::Friends, Relation::Neighbors];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Friends => "friends",
            Self::Neighbors => "neighbors",
        }
    }

    /// Log-scale mean contact interval (days) used by the built-in table.
    pub fn default_meanlog(self) -> f64 {
        match self {
            Self::Family => 2.5,
            Self::Friends => 2.2,
            Self::Neighbors => 2.8,
        }
    }
}

/// Log-normal contact interval (days) for one sex, relation and age band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationFrequency {
    pub male: bool,
    pub relation: Relation,
    pub age_min: f64,
    pub age_max: f64,
    pub meanlog: f64,
    pub sdlog: f64,
}

impl RelationFrequency {
    pub fn matches(&self, male: bool, relation: Relation, age_years: f64) -> bool {
        self.male == male
            && self.relation == relation
            && age_years >= self.age_min
            && age_years < self.age_max
    }
}

/// Attitude and impression weights an attractor row holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttractorPosition {
    pub confidence: Decimal,
    pub complacency: Decimal,
    pub calculation: Decimal,
    pub inpeer_weight: Decimal,
    pub outpeer_weight: Decimal,
    pub self_multiplier: Decimal,
    pub attractor_multiplier: Decimal,
}

impl AttractorPosition {
    pub fn new(confidence: Decimal, complacency: Decimal) -> Self {
        Self {
            confidence,
            complacency,
            calculation: Decimal::new(5, 1),
            inpeer_weight: Decimal::ONE,
            outpeer_weight: Decimal::new(5, 1),
            self_multiplier: Decimal::ONE,
            attractor_multiplier: Decimal::new(5, 1),
        }
    }

    pub fn value(&self, key: PositionKey) -> Decimal {
        match key {
            PositionKey::Confidence => self.confidence,
            PositionKey::Complacency => self.complacency,
            PositionKey::Calculation => self.calculation,
            PositionKey::InpeerWeight => self.inpeer_weight,
            PositionKey::OutpeerWeight => self.outpeer_weight,
            PositionKey::SelfMultiplier => self.self_multiplier,
            PositionKey::AttractorMultiplier => self.attractor_multiplier,
        }
    }
}

/// Attractor row fields a signal schedule may drive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PositionKey {
    Confidence,
    Complacency,
    Calculation,
    InpeerWeight,
    OutpeerWeight,
    SelfMultiplier,
    AttractorMultiplier,
}

impl PositionKey {
    /// Keys whose values must stay within [0,1].
    pub fn is_bounded(self) -> bool {
        matches!(
            self,
            Self::Confidence | Self::Complacency | Self::Calculation
        )
    }
}

/// Emits the k-th value of every series at `start_days + k * interval_days`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalSchedule {
    pub start_days: Decimal,
    pub interval_days: Decimal,
    pub series: BTreeMap<PositionKey, Vec<Decimal>>,
}

impl SignalSchedule {
    /// Number of emissions before every series is exhausted.
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values emitted at `step`; shorter series stop contributing once spent.
    pub fn values_at(&self, step: usize) -> Vec<(PositionKey, Decimal)> {
        self.series
            .iter()
            .filter_map(|(key, values)| values.get(step).map(|value| (*key, *value)))
            .collect()
    }

    pub fn time_of(&self, step: usize) -> Decimal {
        self.start_days + self.interval_days * Decimal::from(step as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttractorConfig {
    pub name: String,
    #[serde(default)]
    pub religious: bool,
    #[serde(default)]
    pub alternative: bool,
    pub position: AttractorPosition,
    #[serde(default)]
    pub schedules: Vec<SignalSchedule>,
}

impl AttractorConfig {
    pub fn new(name: &str, position: AttractorPosition) -> Self {
        Self {
            name: name.to_string(),
            religious: false,
            alternative: false,
            position,
            schedules: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let unit = Decimal::ZERO..=Decimal::ONE;
        for key in [
            PositionKey::Confidence,
            PositionKey::Complacency,
            PositionKey::Calculation,
        ] {
            if !unit.contains(&self.position.value(key)) {
                return Err(format!("attractor {} {key:?} outside [0,1]", self.name));
            }
        }
        for key in [
            PositionKey::InpeerWeight,
            PositionKey::OutpeerWeight,
            PositionKey::SelfMultiplier,
            PositionKey::AttractorMultiplier,
        ] {
            if self.position.value(key) < Decimal::ZERO {
                return Err(format!("attractor {} {key:?} is negative", self.name));
            }
        }
        for schedule in &self.schedules {
            if schedule.interval_days <= Decimal::ZERO || schedule.start_days < Decimal::ZERO {
                return Err(format!("attractor {} has a malformed schedule", self.name));
            }
            for (key, values) in &schedule.series {
                let bad = values.iter().any(|value| {
                    if key.is_bounded() {
                        !unit.contains(value)
                    } else {
                        *value < Decimal::ZERO
                    }
                });
                if bad {
                    return Err(format!(
                        "attractor {} schedule {key:?} has values out of range",
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }
}
