use super::*;

impl HouseholdModel {
    /// Immutable copy of every attractor position and every ordinary
    /// household with its members as of the current clock.
    pub fn snapshot(&mut self) -> PopulationSnapshot {
        let seq = self.snapshot_seq;
        self.snapshot_seq += 1;
        let now = self.scheduler.now();
        let attractors = (0..self.store.attractor_count())
            .filter_map(|row| self.attractor_record(row))
            .collect();
        let households = self
            .store
            .household_rows()
            .into_iter()
            .filter_map(|row| self.household_record(row, now))
            .collect();
        PopulationSnapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.config.run_id.clone(),
            seq,
            now_days: now,
            attractors,
            households,
        }
    }

    /// Snapshots queued by the statistics stream, oldest first.
    pub fn drain_snapshots(&mut self) -> Vec<PopulationSnapshot> {
        self.outbox.drain(..).collect()
    }

    fn attractor_record(&self, row: usize) -> Option<AttractorRecord> {
        let households = &self.store.households;
        let get = |key: HouseholdAttribute| households.get(row, key);
        if !self.store.is_attractor(row) {
            return None;
        }
        Some(AttractorRecord {
            index: row,
            identifier: households.identifier(row)?,
            name: self
                .attractor_config(row)
                .map(|config| config.name.clone())
                .unwrap_or_default(),
            calculation: get(HouseholdAttribute::Calculation),
            confidence: get(HouseholdAttribute::Confidence),
            complacency: get(HouseholdAttribute::Complacency),
            inpeer_weight: get(HouseholdAttribute::ImpressionInpeer),
            outpeer_weight: get(HouseholdAttribute::ImpressionOutpeer),
            self_multiplier: get(HouseholdAttribute::ImpressionSelf),
            attractor_multiplier: get(HouseholdAttribute::ImpressionAttractor),
        })
    }

    fn household_record(&self, row: usize, now: Decimal) -> Option<HouseholdRecord> {
        let households = &self.store.households;
        let get = |key: HouseholdAttribute| households.get(row, key);
        let count = |key: HouseholdAttribute| get(key).to_u64().unwrap_or(0);
        let attractor = self.store.attractor_of(row)?;
        let referent = self.store.referent_of(row)?;
        let confidence = get(HouseholdAttribute::Confidence);
        let complacency = get(HouseholdAttribute::Complacency);

        Some(HouseholdRecord {
            index: row,
            identifier: households.identifier(row)?,
            attractor: self
                .attractor_config(attractor)
                .map(|config| config.name.clone())
                .unwrap_or_default(),
            network_size: get(HouseholdAttribute::SocialNetworkSize)
                .to_u32()
                .unwrap_or(0),
            social_assortativity: get(HouseholdAttribute::SocialAssortativity),
            school_assortative: crate::attributes::is_set(get(
                HouseholdAttribute::SchoolAssortativity,
            )),
            impression_rounds: count(HouseholdAttribute::ImpressionRounds),
            impression_feeds: count(HouseholdAttribute::ImpressionFeeds),
            inpeer_weight: get(HouseholdAttribute::ImpressionInpeer),
            outpeer_weight: get(HouseholdAttribute::ImpressionOutpeer),
            self_multiplier: get(HouseholdAttribute::ImpressionSelf),
            attractor_multiplier: get(HouseholdAttribute::ImpressionAttractor),
            calculation: get(HouseholdAttribute::Calculation),
            confidence,
            complacency,
            barrier: self.evaluator.barrier(confidence, complacency),
            referent: self.person_record(referent, now)?,
            child: self
                .store
                .child_of(row)
                .and_then(|child| self.person_record(child, now)),
            activity: self.store.activity.activation_counts(row),
        })
    }

    fn person_record(&self, person: usize, now: Decimal) -> Option<PersonRecord> {
        let status = self.store.person_status(person)?;
        Some(PersonRecord {
            age_years: days_to_years(self.store.age_days(person, now)).round_dp(4),
            male: self.store.is_male(person),
            status,
            behavior: contracts::MemberBehavior::from_code(
                self.store
                    .persons
                    .get(person, PersonAttribute::Behavior)
                    .to_i64()
                    .unwrap_or(0),
            )
            .unwrap_or_default(),
        })
    }
}
