//! Records handed to statistics consumers. Snapshots are immutable clones
//! of the live population taken at export time.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Epidemiological and vaccination status of one person.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Susceptible,
    Infectious,
    Recovered,
    PassiveImmune,
    ArtificialImmune,
}

impl MemberStatus {
    /// Numeric code stored in the person attribute matrix.
    pub fn code(self) -> i64 {
        match self {
            Self::Susceptible => 0,
            Self::Infectious => 1,
            Self::Recovered => 2,
            Self::PassiveImmune => 3,
            Self::ArtificialImmune => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Susceptible),
            1 => Some(Self::Infectious),
            2 => Some(Self::Recovered),
            3 => Some(Self::PassiveImmune),
            4 => Some(Self::ArtificialImmune),
            _ => None,
        }
    }

    pub fn is_immune(self) -> bool {
        matches!(
            self,
            Self::Recovered | Self::PassiveImmune | Self::ArtificialImmune
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemberBehavior {
    #[default]
    Normal,
}

impl MemberBehavior {
    pub fn code(self) -> i64 {
        match self {
            Self::Normal => 0,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonRecord {
    pub age_years: Decimal,
    pub male: bool,
    pub status: MemberStatus,
    #[serde(default)]
    pub behavior: MemberBehavior,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HouseholdRecord {
    pub index: usize,
    pub identifier: u64,
    pub attractor: String,
    pub network_size: u32,
    pub social_assortativity: Decimal,
    pub school_assortative: bool,
    pub impression_rounds: u64,
    pub impression_feeds: u64,
    pub inpeer_weight: Decimal,
    pub outpeer_weight: Decimal,
    pub self_multiplier: Decimal,
    pub attractor_multiplier: Decimal,
    pub calculation: Decimal,
    pub confidence: Decimal,
    pub complacency: Decimal,
    /// Evaluator-specific attitude barrier; lower means more willing.
    pub barrier: Decimal,
    pub referent: PersonRecord,
    #[serde(default)]
    pub child: Option<PersonRecord>,
    /// Accumulated activation count per neighbour row index.
    #[serde(default)]
    pub activity: BTreeMap<usize, u32>,
}

/// Position of an attractor row at export time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttractorRecord {
    pub index: usize,
    pub identifier: u64,
    pub name: String,
    pub calculation: Decimal,
    pub confidence: Decimal,
    pub complacency: Decimal,
    pub inpeer_weight: Decimal,
    pub outpeer_weight: Decimal,
    pub self_multiplier: Decimal,
    pub attractor_multiplier: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopulationSnapshot {
    pub schema_version: String,
    pub run_id: String,
    /// Export iteration counter, starting at zero.
    pub seq: u64,
    pub now_days: Decimal,
    #[serde(default)]
    pub attractors: Vec<AttractorRecord>,
    pub households: Vec<HouseholdRecord>,
}

impl PopulationSnapshot {
    pub fn count_status(&self, status: MemberStatus) -> usize {
        self.households
            .iter()
            .filter_map(|household| household.child.as_ref())
            .filter(|child| child.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in [
            MemberStatus::Susceptible,
            MemberStatus::Infectious,
            MemberStatus::Recovered,
            MemberStatus::PassiveImmune,
            MemberStatus::ArtificialImmune,
        ] {
            assert_eq!(MemberStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(MemberStatus::from_code(9), None);
    }

    #[test]
    fn household_record_defaults_optional_fields() {
        let json = r#"{
            "index": 3, "identifier": 7, "attractor": "a", "network_size": 2,
            "social_assortativity": "0.5", "school_assortative": true,
            "impression_rounds": 1, "impression_feeds": 2,
            "inpeer_weight": "1", "outpeer_weight": "0.5",
            "self_multiplier": "1", "attractor_multiplier": "0.5",
            "calculation": "0.5", "confidence": "0.8", "complacency": "0.1",
            "barrier": "0.1",
            "referent": {"age_years": "30", "male": false, "status": "susceptible"}
        }"#;
        let record: HouseholdRecord = serde_json::from_str(json).expect("record");
        assert!(record.child.is_none());
        assert!(record.activity.is_empty());
        assert_eq!(record.referent.behavior, MemberBehavior::Normal);
    }

    #[test]
    fn snapshot_without_attractors_still_parses() {
        let json = r#"{
            "schema_version": "1", "run_id": "r", "seq": 0, "now_days": "7",
            "households": []
        }"#;
        let snapshot: PopulationSnapshot = serde_json::from_str(json).expect("snapshot");
        assert!(snapshot.attractors.is_empty());
        assert_eq!(snapshot.count_status(MemberStatus::Susceptible), 0);
    }
}
