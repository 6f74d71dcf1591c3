//! Household and person matrices plus the social graph they live on.
//!
//! Attractors occupy the lowest household rows and reference themselves;
//! every other household references exactly one attractor. Households are
//! replaced in place so their network position survives demographic churn.

use contracts::{AttractorPosition, MemberBehavior, MemberStatus, PositionKey};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::attributes::{clamp_unit, flag, is_set, HouseholdAttribute, PersonAttribute, NO_MEMBER};
use crate::error::SimError;
use crate::matrix::AttributeMatrix;
use crate::network::{ActivityGraph, SocialNetwork};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonDraft {
    pub birth_days: Decimal,
    pub male: bool,
    pub status: MemberStatus,
}

/// Everything drawn for a new household before it gets a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseholdDraft {
    pub attractor: usize,
    pub calculation: Decimal,
    pub confidence: Decimal,
    pub complacency: Decimal,
    pub impression_days: Decimal,
    pub inpeer_weight: Decimal,
    pub outpeer_weight: Decimal,
    pub self_multiplier: Decimal,
    pub attractor_multiplier: Decimal,
    pub school_assortative: bool,
    pub referent: PersonDraft,
    pub child: Option<PersonDraft>,
}

/// Columns describing a household's place in the network; kept on replacement.
const NETWORK_COLUMNS: [HouseholdAttribute; 5] = [
    HouseholdAttribute::SocialNetworkSize,
    HouseholdAttribute::SocialAssortativity,
    HouseholdAttribute::SchoolAssortativity,
    HouseholdAttribute::ImpressionInpeer,
    HouseholdAttribute::ImpressionOutpeer,
];

#[derive(Debug, Clone, Default)]
pub struct PopulationStore {
    pub households: AttributeMatrix<HouseholdAttribute>,
    pub persons: AttributeMatrix<PersonAttribute>,
    pub network: SocialNetwork,
    pub activity: ActivityGraph,
    attractor_count: usize,
}

impl PopulationStore {
    pub fn new(household_capacity: Option<usize>, person_capacity: Option<usize>) -> Self {
        Self {
            households: AttributeMatrix::new(household_capacity),
            persons: AttributeMatrix::new(person_capacity),
            network: SocialNetwork::default(),
            activity: ActivityGraph::new(),
            attractor_count: 0,
        }
    }

    /// Adds an attractor row; all attractors must precede ordinary households.
    pub fn add_attractor(&mut self, position: &AttractorPosition) -> Result<usize, SimError> {
        if self.households.len() != self.attractor_count {
            return Err(SimError::configuration(
                "attractors must be created before households",
            ));
        }
        let row = self.households.allocate()?;
        self.households
            .set(row, HouseholdAttribute::AttractorRef, Decimal::from(row as u64));
        self.households
            .set(row, HouseholdAttribute::ReferentRef, Decimal::from(NO_MEMBER));
        self.households
            .set(row, HouseholdAttribute::ChildRef, Decimal::from(NO_MEMBER));
        for key in [
            PositionKey::Confidence,
            PositionKey::Complacency,
            PositionKey::Calculation,
            PositionKey::InpeerWeight,
            PositionKey::OutpeerWeight,
            PositionKey::SelfMultiplier,
            PositionKey::AttractorMultiplier,
        ] {
            self.apply_position(row, key, position.value(key))?;
        }
        self.attractor_count += 1;
        Ok(row)
    }

    /// Overwrites one position field of an attractor row. Multiplier keys
    /// are also written through to every household in the attractor's group.
    pub fn apply_position(
        &mut self,
        row: usize,
        key: PositionKey,
        value: Decimal,
    ) -> Result<(), SimError> {
        if !self.is_attractor(row) {
            return Err(SimError::upstream(format!("row {row} is not an attractor")));
        }
        let (column, value) = match key {
            PositionKey::Confidence => (HouseholdAttribute::Confidence, clamp_unit(value)),
            PositionKey::Complacency => (HouseholdAttribute::Complacency, clamp_unit(value)),
            PositionKey::Calculation => (HouseholdAttribute::Calculation, clamp_unit(value)),
            PositionKey::InpeerWeight => (HouseholdAttribute::ImpressionInpeer, value),
            PositionKey::OutpeerWeight => (HouseholdAttribute::ImpressionOutpeer, value),
            PositionKey::SelfMultiplier => (HouseholdAttribute::ImpressionSelf, value),
            PositionKey::AttractorMultiplier => (HouseholdAttribute::ImpressionAttractor, value),
        };
        let value = value.max(Decimal::ZERO);
        self.households.set(row, column, value);
        if matches!(
            key,
            PositionKey::SelfMultiplier | PositionKey::AttractorMultiplier
        ) {
            for member in self.household_rows() {
                if self.attractor_of(member) == Some(row) {
                    self.households.set(member, column, value);
                }
            }
        }
        Ok(())
    }

    pub fn create_household(&mut self, draft: &HouseholdDraft) -> Result<usize, SimError> {
        if draft.attractor >= self.attractor_count {
            return Err(SimError::configuration(format!(
                "household references unknown attractor {}",
                draft.attractor
            )));
        }
        let row = self.households.allocate()?;
        self.fill_household(row, draft)?;
        Ok(row)
    }

    /// Replaces an ordinary household in place: new identifier, new members,
    /// fresh attitudes. The network position is kept, its activity history
    /// is dropped.
    pub fn replace_household(
        &mut self,
        row: usize,
        draft: &HouseholdDraft,
    ) -> Result<u64, SimError> {
        if self.is_attractor(row) {
            return Err(SimError::AttractorReplacement(row));
        }
        let kept = NETWORK_COLUMNS.map(|column| self.households.get(row, column));
        let members = [self.referent_of(row), self.child_of(row)];
        let identifier = self.households.renew(row)?;
        for member in members.into_iter().flatten() {
            self.persons.release(member);
        }
        for (column, value) in NETWORK_COLUMNS.iter().zip(kept) {
            self.households.set(row, *column, value);
        }
        self.fill_household(row, draft)?;
        self.activity.reset_node(row);
        Ok(identifier)
    }

    fn fill_household(&mut self, row: usize, draft: &HouseholdDraft) -> Result<(), SimError> {
        let households = &mut self.households;
        households.set(
            row,
            HouseholdAttribute::AttractorRef,
            Decimal::from(draft.attractor as u64),
        );
        households.set(row, HouseholdAttribute::Calculation, clamp_unit(draft.calculation));
        households.set(row, HouseholdAttribute::Confidence, clamp_unit(draft.confidence));
        households.set(row, HouseholdAttribute::Complacency, clamp_unit(draft.complacency));
        households.set(row, HouseholdAttribute::ImpressionDays, draft.impression_days);
        if households.get(row, HouseholdAttribute::SocialNetworkSize).is_zero() {
            households.set(row, HouseholdAttribute::ImpressionInpeer, draft.inpeer_weight);
            households.set(row, HouseholdAttribute::ImpressionOutpeer, draft.outpeer_weight);
            households.set(
                row,
                HouseholdAttribute::SchoolAssortativity,
                flag(draft.school_assortative),
            );
        }
        households.set(row, HouseholdAttribute::ImpressionSelf, draft.self_multiplier);
        households.set(
            row,
            HouseholdAttribute::ImpressionAttractor,
            draft.attractor_multiplier,
        );
        households.set(row, HouseholdAttribute::ImpressionRounds, Decimal::ZERO);
        households.set(row, HouseholdAttribute::ImpressionFeeds, Decimal::ZERO);

        let referent = self.create_person(row, &draft.referent)?;
        self.households.set(
            row,
            HouseholdAttribute::ReferentRef,
            Decimal::from(referent as u64),
        );
        let child = match &draft.child {
            Some(child) => self.create_person(row, child)? as i64,
            None => NO_MEMBER,
        };
        self.households
            .set(row, HouseholdAttribute::ChildRef, Decimal::from(child));
        Ok(())
    }

    fn create_person(&mut self, household: usize, draft: &PersonDraft) -> Result<usize, SimError> {
        let row = self.persons.allocate()?;
        self.persons.set(
            row,
            PersonAttribute::HouseholdRef,
            Decimal::from(household as u64),
        );
        self.persons.set(row, PersonAttribute::Birth, draft.birth_days);
        self.persons.set(row, PersonAttribute::Male, flag(draft.male));
        self.persons
            .set(row, PersonAttribute::Status, Decimal::from(draft.status.code()));
        self.persons.set(
            row,
            PersonAttribute::Behavior,
            Decimal::from(MemberBehavior::Normal.code()),
        );
        Ok(row)
    }

    /// Deterministic attractor assignment for a household row.
    pub fn broker(&self, row: usize) -> usize {
        if self.attractor_count == 0 {
            return 0;
        }
        row % self.attractor_count
    }

    pub fn attractor_count(&self) -> usize {
        self.attractor_count
    }

    pub fn is_attractor(&self, row: usize) -> bool {
        self.attractor_of(row) == Some(row)
    }

    pub fn attractor_of(&self, row: usize) -> Option<usize> {
        if !self.households.is_live(row) {
            return None;
        }
        self.households
            .get(row, HouseholdAttribute::AttractorRef)
            .to_usize()
    }

    /// Live ordinary household rows in ascending order.
    pub fn household_rows(&self) -> Vec<usize> {
        self.households
            .live_rows()
            .filter(|row| !self.is_attractor(*row))
            .collect()
    }

    pub fn household_count(&self) -> usize {
        self.households.len() - self.attractor_count
    }

    pub fn referent_of(&self, row: usize) -> Option<usize> {
        self.member_ref(row, HouseholdAttribute::ReferentRef)
    }

    pub fn child_of(&self, row: usize) -> Option<usize> {
        self.member_ref(row, HouseholdAttribute::ChildRef)
    }

    fn member_ref(&self, row: usize, column: HouseholdAttribute) -> Option<usize> {
        let value = self.households.get(row, column).to_i64()?;
        if value < 0 {
            return None;
        }
        let person = value as usize;
        self.persons.is_live(person).then_some(person)
    }

    pub fn person_status(&self, person: usize) -> Option<MemberStatus> {
        self.persons
            .get(person, PersonAttribute::Status)
            .to_i64()
            .and_then(MemberStatus::from_code)
    }

    pub fn set_person_status(&mut self, person: usize, status: MemberStatus) {
        self.persons
            .set(person, PersonAttribute::Status, Decimal::from(status.code()));
    }

    pub fn is_male(&self, person: usize) -> bool {
        is_set(self.persons.get(person, PersonAttribute::Male))
    }

    /// Age in days at virtual time `now`.
    pub fn age_days(&self, person: usize, now: Decimal) -> Decimal {
        now - self.persons.get(person, PersonAttribute::Birth)
    }

    /// Persons currently in the store.
    pub fn person_count(&self) -> usize {
        self.persons.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(attractor: usize, with_child: bool) -> HouseholdDraft {
        HouseholdDraft {
            attractor,
            calculation: Decimal::new(5, 1),
            confidence: Decimal::new(7, 1),
            complacency: Decimal::new(2, 1),
            impression_days: Decimal::from(3),
            inpeer_weight: Decimal::ONE,
            outpeer_weight: Decimal::new(5, 1),
            self_multiplier: Decimal::ONE,
            attractor_multiplier: Decimal::new(5, 1),
            school_assortative: true,
            referent: PersonDraft {
                birth_days: Decimal::from(-10_000),
                male: true,
                status: MemberStatus::Recovered,
            },
            child: with_child.then_some(PersonDraft {
                birth_days: Decimal::from(-300),
                male: false,
                status: MemberStatus::Susceptible,
            }),
        }
    }

    fn store_with_attractors(count: usize) -> PopulationStore {
        let mut store = PopulationStore::new(None, None);
        for _ in 0..count {
            store
                .add_attractor(&AttractorPosition::new(Decimal::ONE, Decimal::ZERO))
                .expect("attractor");
        }
        store
    }

    #[test]
    fn attractors_reference_themselves() {
        let store = store_with_attractors(2);
        assert!(store.is_attractor(0));
        assert!(store.is_attractor(1));
        assert_eq!(store.referent_of(0), None);
        assert_eq!(store.households.get(1, HouseholdAttribute::Confidence), Decimal::ONE);
    }

    #[test]
    fn attractors_after_households_are_refused() {
        let mut store = store_with_attractors(1);
        store.create_household(&draft(0, false)).expect("household");
        let err = store
            .add_attractor(&AttractorPosition::new(Decimal::ONE, Decimal::ZERO))
            .expect_err("late attractor");
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn create_household_links_members() {
        let mut store = store_with_attractors(2);
        let row = store.create_household(&draft(1, true)).expect("household");
        assert_eq!(row, 2);
        assert_eq!(store.attractor_of(row), Some(1));
        assert_eq!(store.broker(row), 0);
        let child = store.child_of(row).expect("child");
        assert_eq!(store.person_status(child), Some(MemberStatus::Susceptible));
        assert_eq!(store.age_days(child, Decimal::from(65)), Decimal::from(365));
        assert!(store.is_male(store.referent_of(row).expect("referent")));
        assert_eq!(store.household_rows(), vec![row]);
    }

    #[test]
    fn replacement_recycles_person_rows_and_keeps_network_columns() {
        let mut store = store_with_attractors(1);
        let row = store.create_household(&draft(0, true)).expect("household");
        store
            .households
            .set(row, HouseholdAttribute::SocialNetworkSize, Decimal::from(4));
        let old_id = store.households.identifier(row).expect("id");
        let old_child = store.child_of(row).expect("child");
        store.activity.activate(row, 0, Decimal::ONE);

        let new_id = store.replace_household(row, &draft(0, false)).expect("replace");
        assert_ne!(new_id, old_id);
        assert_eq!(store.child_of(row), None);
        assert_eq!(store.person_count(), 1);
        assert_eq!(
            store.households.get(row, HouseholdAttribute::SocialNetworkSize),
            Decimal::from(4)
        );
        assert!(store.activity.get(row, 0).is_none());
        // the freed child row is reused by the next person
        let again = store.create_household(&draft(0, true)).expect("household");
        let reused = [store.referent_of(again), store.child_of(again)];
        assert!(reused.contains(&Some(old_child)));
    }

    #[test]
    fn multiplier_positions_reach_group_members_only() {
        let mut store = store_with_attractors(2);
        let first = store.create_household(&draft(0, false)).expect("household");
        let second = store.create_household(&draft(1, false)).expect("household");

        store
            .apply_position(0, PositionKey::SelfMultiplier, Decimal::from(5))
            .expect("position");
        store
            .apply_position(0, PositionKey::AttractorMultiplier, Decimal::from(-2))
            .expect("position");
        store
            .apply_position(0, PositionKey::Confidence, Decimal::new(3, 1))
            .expect("position");

        assert_eq!(
            store.households.get(first, HouseholdAttribute::ImpressionSelf),
            Decimal::from(5)
        );
        assert_eq!(
            store.households.get(first, HouseholdAttribute::ImpressionAttractor),
            Decimal::ZERO
        );
        assert_eq!(
            store.households.get(first, HouseholdAttribute::Confidence),
            Decimal::new(7, 1)
        );
        assert_eq!(
            store.households.get(second, HouseholdAttribute::ImpressionSelf),
            Decimal::ONE
        );
    }

    #[test]
    fn failed_replacement_keeps_members_live() {
        let mut store = store_with_attractors(1);
        let row = store.create_household(&draft(0, true)).expect("household");
        let referent = store.referent_of(row).expect("referent");
        let child = store.child_of(row).expect("child");
        store.households.release(row);

        assert!(store.replace_household(row, &draft(0, false)).is_err());
        assert!(store.persons.is_live(referent));
        assert!(store.persons.is_live(child));
        assert_eq!(store.person_count(), 2);
    }

    #[test]
    fn attractor_rows_cannot_be_replaced() {
        let mut store = store_with_attractors(1);
        assert_eq!(
            store.replace_household(0, &draft(0, false)),
            Err(SimError::AttractorReplacement(0))
        );
    }
}
