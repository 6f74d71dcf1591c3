use super::*;
use crate::random::sample_without_replacement;

impl HouseholdModel {
    /// Runs the handler for `event`. A failing handler ends its own stream:
    /// the error is logged and the event is not rescheduled.
    pub(super) fn dispatch(&mut self, event: ModelEvent) {
        let result = match event {
            ModelEvent::AttractorSignal {
                attractor,
                schedule,
                step,
            } => self.on_attractor_signal(attractor, schedule, step),
            ModelEvent::Impress { household } => self.on_impress(household),
            ModelEvent::Propagate => self.on_propagate(),
            ModelEvent::Vaccinate => self.on_vaccinate(),
            ModelEvent::Migrate => self.on_migrate(),
            ModelEvent::LeaveHome { household } => self.on_leave_home(household),
            ModelEvent::Statistics => self.on_statistics(),
        };
        if let Err(err) = result {
            self.terminate_stream(event, &err);
        }
    }

    pub(super) fn terminate_stream(&mut self, event: ModelEvent, err: &SimError) {
        self.counters.terminated_streams += 1;
        error!(
            stream = event.stream(),
            now = %self.scheduler.now(),
            error = %err,
            "stream terminated"
        );
    }

    fn on_attractor_signal(
        &mut self,
        attractor: usize,
        schedule: usize,
        step: usize,
    ) -> Result<(), SimError> {
        let signal = self
            .attractor_config(attractor)
            .and_then(|config| config.schedules.get(schedule))
            .cloned()
            .ok_or_else(|| {
                SimError::upstream(format!("attractor {attractor} has no schedule {schedule}"))
            })?;
        for (key, value) in signal.values_at(step) {
            self.store.apply_position(attractor, key, value)?;
        }
        trace!(attractor, schedule, step, "attractor signal");
        if step + 1 < signal.len() {
            self.scheduler.schedule_at(
                signal.time_of(step + 1),
                ModelEvent::AttractorSignal {
                    attractor,
                    schedule,
                    step: step + 1,
                },
            );
        }
        Ok(())
    }

    /// Starts a fresh sampling pass for every ordinary household, cancelling
    /// any pass still pending.
    pub(super) fn restart_impressions(&mut self) {
        for row in self.store.household_rows() {
            self.restart_impression(row);
        }
    }

    pub(super) fn restart_impression(&mut self, row: usize) {
        let cycle = self.cycles.entry(row).or_default();
        if let Some(handle) = cycle.handle.take() {
            self.scheduler.cancel(handle);
        }
        let neighbors = self.store.network.neighbors(row).collect::<Vec<_>>();
        let remaining =
            sample_without_replacement(&mut self.streams.impression, &neighbors, neighbors.len());
        let days = self
            .store
            .households
            .get(row, HouseholdAttribute::ImpressionDays);
        let interval = self.impression_delay(days);
        self.store
            .households
            .add(row, HouseholdAttribute::ImpressionRounds, Decimal::ONE);

        let handle = if remaining.is_empty() || interval <= Decimal::ZERO {
            None
        } else {
            Some(
                self.scheduler
                    .schedule_after(interval, ModelEvent::Impress { household: row }),
            )
        };
        self.cycles.insert(
            row,
            ImpressionCycle {
                remaining,
                interval,
                handle,
            },
        );
    }

    /// Activates the next neighbour of the shuffled pass, then waits one
    /// interval; goes dormant once every neighbour has been sampled.
    fn on_impress(&mut self, household: usize) -> Result<(), SimError> {
        let Some(cycle) = self.cycles.get_mut(&household) else {
            return Ok(());
        };
        cycle.handle = None;
        let Some(peer) = cycle.remaining.pop() else {
            return Ok(());
        };
        let next = (!cycle.remaining.is_empty()).then_some(cycle.interval);

        let weight = self.store.network.weight(household, peer).ok_or_else(|| {
            SimError::upstream(format!("household {household} lost its link to {peer}"))
        })?;
        self.store.activity.activate(household, peer, weight);
        self.counters.impressions += 1;

        if let Some(interval) = next {
            let handle = self
                .scheduler
                .schedule_after(interval, ModelEvent::Impress { household });
            if let Some(cycle) = self.cycles.get_mut(&household) {
                cycle.handle = Some(handle);
            }
        }
        Ok(())
    }

    fn on_propagate(&mut self) -> Result<(), SimError> {
        let now = self.scheduler.now();
        let active_edges = self.store.activity.active_edge_count();
        let changed = self
            .propagator
            .propagate(&self.store.activity, &mut self.store.households);
        for (row, peers) in &changed {
            self.store.households.add(
                *row,
                HouseholdAttribute::ImpressionFeeds,
                Decimal::from(*peers as u64),
            );
        }
        self.store.activity.clear_activation();
        self.restart_impressions();

        self.counters.propagations += 1;
        self.counters.propagated_rows += changed.len() as u64;
        info!(
            now = %now,
            active_edges,
            changed = changed.len(),
            "propagation cycle"
        );

        let next = self.config.hesitancy.propagation.next_after(now);
        self.scheduler.schedule_at(next, ModelEvent::Propagate);
        Ok(())
    }

    fn draw_occasion(&mut self) -> Result<VaxOccasion, SimError> {
        let rng = &mut self.streams.vaccination;
        let samplers = &self.samplers;
        Ok(VaxOccasion::new(
            clamp_unit(samplers.utility.draw_decimal(rng)?),
            clamp_unit(samplers.proximity.draw_decimal(rng)?),
            clamp_unit(samplers.clarity.draw_decimal(rng)?),
            clamp_unit(samplers.affinity.draw_decimal(rng)?),
        ))
    }

    fn on_vaccinate(&mut self) -> Result<(), SimError> {
        let now = self.scheduler.now();
        let occasion = self.draw_occasion()?;
        let vaccinated = self.vaccinate(&occasion, now);
        self.counters.occasions += 1;
        self.counters.vaccinated += vaccinated;
        info!(
            now = %now,
            convenience = %occasion.convenience(),
            vaccinated,
            "vaccination occasion"
        );

        let next = self.config.vaccination.recurrence.next_after(now);
        self.scheduler.schedule_at(next, ModelEvent::Vaccinate);
        Ok(())
    }

    /// Vaccinates every eligible child of a positively evaluating household.
    pub(super) fn vaccinate(&mut self, occasion: &VaxOccasion, now: Decimal) -> u64 {
        let min_days = years_to_days(self.config.vaccination.min_age_years);
        let max_days = years_to_days(self.config.vaccination.max_age_years);
        let mut vaccinated = 0;
        for row in self.store.household_rows() {
            let confidence = self.store.households.get(row, HouseholdAttribute::Confidence);
            let complacency = self
                .store
                .households
                .get(row, HouseholdAttribute::Complacency);
            if !self.evaluator.is_positive(confidence, complacency, occasion) {
                continue;
            }
            let Some(child) = self.store.child_of(row) else {
                continue;
            };
            if self.store.person_status(child) != Some(MemberStatus::Susceptible) {
                continue;
            }
            let age = self.store.age_days(child, now);
            if age < min_days || age > max_days {
                continue;
            }
            self.store
                .set_person_status(child, MemberStatus::ArtificialImmune);
            vaccinated += 1;
        }
        vaccinated
    }

    fn on_migrate(&mut self) -> Result<(), SimError> {
        let rows = self.store.household_rows();
        if !rows.is_empty() {
            let row = rows[self.streams.migration.gen_range(0..rows.len())];
            self.replace_household(row)?;
            self.counters.migrations += 1;
            trace!(row, now = %self.scheduler.now(), "household migrated");
        }
        self.schedule_migration()
    }

    fn on_leave_home(&mut self, household: usize) -> Result<(), SimError> {
        self.leave_home.remove(&household);
        self.replace_household(household)?;
        self.counters.home_leavers += 1;
        trace!(household, now = %self.scheduler.now(), "child left home");
        Ok(())
    }

    /// Swaps in a freshly drawn household at `row`, re-arming its timers.
    pub(super) fn replace_household(&mut self, row: usize) -> Result<(), SimError> {
        let (draft, _) = self.draw_household(row)?;
        let identifier = self.store.replace_household(row, &draft)?;
        self.schedule_leave_home(row);
        self.restart_impression(row);
        debug!(row, identifier, "household replaced");
        Ok(())
    }

    fn on_statistics(&mut self) -> Result<(), SimError> {
        let snapshot = self.snapshot();
        debug!(seq = snapshot.seq, households = snapshot.households.len(), "statistics queued");
        self.outbox.push_back(snapshot);
        if let Some(recurrence) = self.config.statistics.recurrence {
            let next = recurrence.next_after(self.scheduler.now());
            self.scheduler.schedule_at(next, ModelEvent::Statistics);
        }
        Ok(())
    }
}
