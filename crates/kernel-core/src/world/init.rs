use super::*;

impl HouseholdModel {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate().map_err(SimError::Configuration)?;

        let samplers = ModelSamplers {
            referent_age_years: Sampler::from_spec(
                &config.population.referent_age_years,
                "referent age",
            )?,
            referent_male: Sampler::from_spec(
                &contracts::DistributionSpec::Bernoulli {
                    p: config.population.referent_male_probability,
                },
                "referent sex",
            )?,
            calculation: Sampler::from_spec(&config.hesitancy.calculation, "calculation")?,
            school_assortative: Sampler::from_spec(
                &contracts::DistributionSpec::Bernoulli {
                    p: config.network.school_assortativity,
                },
                "school assortativity",
            )?,
            migration_interval_days: Sampler::from_spec(
                &config.population.migration_interval_days,
                "migration interval",
            )?,
            utility: Sampler::from_spec(&config.vaccination.utility, "utility")?,
            proximity: Sampler::from_spec(&config.vaccination.proximity, "proximity")?,
            clarity: Sampler::from_spec(&config.vaccination.clarity, "clarity")?,
            affinity: Sampler::from_spec(&config.vaccination.affinity, "affinity")?,
        };
        let tables = ReferenceTables::new(&config.population.household_types, &config.hesitancy)?;

        let (household_capacity, person_capacity) = if config.population.fixed_capacity {
            let size = usize::try_from(config.population.size)
                .map_err(|_| SimError::configuration("population size overflows"))?;
            (Some(config.attractors.len() + size), Some(2 * size))
        } else {
            (None, None)
        };

        let worker_threads = usize::from(config.propagator_worker_threads.max(1));
        let mut model = Self {
            store: PopulationStore::new(household_capacity, person_capacity),
            scheduler: EventScheduler::new(config.duration_days),
            propagator: AttitudePropagator::new(config.hesitancy.propagator, worker_threads),
            evaluator: AttitudeEvaluator::new(config.hesitancy.evaluator),
            tables,
            samplers,
            streams: ModelStreams {
                population: stream_rng(config.seed, Stream::Population),
                impression: stream_rng(config.seed, Stream::Impression),
                vaccination: stream_rng(config.seed, Stream::Vaccination),
                migration: stream_rng(config.seed, Stream::Migration),
            },
            cycles: BTreeMap::new(),
            leave_home: BTreeMap::new(),
            outbox: VecDeque::new(),
            snapshot_seq: 0,
            processed_events: 0,
            counters: ModelCounters::default(),
            connect_stats: ConnectStats::default(),
            network_degree: 0,
            config,
        };

        model.populate()?;
        model.connect_households()?;
        model.schedule_streams();
        Ok(model)
    }

    fn populate(&mut self) -> Result<(), SimError> {
        for attractor in &self.config.attractors {
            self.store.add_attractor(&attractor.position)?;
        }

        let target = self.config.population.size;
        let mut persons = 0u64;
        while persons < target {
            let row = self.store.households.row_count();
            let (draft, size) = self.draw_household(row)?;
            let created = self.store.create_household(&draft)?;
            self.schedule_leave_home(created);
            persons += u64::from(size);
        }

        info!(
            persons,
            households = self.store.household_count(),
            attractors = self.store.attractor_count(),
            "populated"
        );
        Ok(())
    }

    /// Draws composition, members and attitudes for a household that will
    /// occupy `row`. Returns the draft and the household's nominal size.
    pub(super) fn draw_household(&mut self, row: usize) -> Result<(HouseholdDraft, u8), SimError> {
        let now = self.scheduler.now();
        let attractor = self.store.broker(row);
        let (religious, alternative) = self
            .attractor_config(attractor)
            .map(|config| (config.religious, config.alternative))
            .unwrap_or((false, false));
        let rng = &mut self.streams.population;

        let household_type = self.tables.draw_household_type(rng).clone();
        let referent_age = self.samplers.referent_age_years.draw(rng).max(0.0);
        let referent_years = decimal_years(referent_age)?;
        let male = self.samplers.referent_male.draw_bool(rng);

        let profile = self.tables.draw_profile(rng, religious, alternative);
        let confidence = profile.confidence.draw(rng)?;
        let complacency = profile.complacency.draw(rng)?;
        let status = profile.profile.status;

        let child = if household_type.child_count > 0 {
            let child_years =
                (referent_years - self.config.population.child_age_offset_years).max(Decimal::ZERO);
            Some(PersonDraft {
                birth_days: now - years_to_days(child_years),
                male: rng.gen_bool(0.5),
                status: vaccination_status(
                    rng,
                    status,
                    child_years,
                    self.config.vaccination.min_age_years,
                ),
            })
        } else {
            None
        };

        let calculation = clamp_unit(self.samplers.calculation.draw_decimal(rng)?);
        let school_assortative = self.samplers.school_assortative.draw_bool(rng);
        let impression_days = self.tables.impression_days(rng, male, referent_age)?;

        let households = &self.store.households;
        let draft = HouseholdDraft {
            attractor,
            calculation,
            confidence,
            complacency,
            impression_days,
            inpeer_weight: households.get(attractor, HouseholdAttribute::ImpressionInpeer),
            outpeer_weight: households.get(attractor, HouseholdAttribute::ImpressionOutpeer),
            self_multiplier: households.get(attractor, HouseholdAttribute::ImpressionSelf),
            attractor_multiplier: households
                .get(attractor, HouseholdAttribute::ImpressionAttractor),
            school_assortative,
            referent: PersonDraft {
                birth_days: now - years_to_days(referent_years),
                male,
                status: MemberStatus::Recovered,
            },
            child,
        };
        Ok((draft, household_type.size))
    }

    /// Arms the timer that replaces `row` once its child reaches the
    /// leave-home age. Any previous timer for the row is cancelled.
    pub(super) fn schedule_leave_home(&mut self, row: usize) {
        if let Some(previous) = self.leave_home.remove(&row) {
            self.scheduler.cancel(previous);
        }
        let Some(child) = self.store.child_of(row) else {
            return;
        };
        let now = self.scheduler.now();
        let age_days = self.store.age_days(child, now);
        let leave_days = years_to_days(self.config.population.leave_home_age_years);
        let delay = (leave_days - age_days).max(Decimal::ONE);
        let handle = self
            .scheduler
            .schedule_after(delay, ModelEvent::LeaveHome { household: row });
        self.leave_home.insert(row, handle);
    }

    fn schedule_streams(&mut self) {
        let now = self.scheduler.now();

        for (attractor, config) in self.config.attractors.iter().enumerate() {
            for (schedule, signal) in config.schedules.iter().enumerate() {
                if signal.is_empty() {
                    continue;
                }
                self.scheduler.schedule_at(
                    signal.time_of(0),
                    ModelEvent::AttractorSignal {
                        attractor,
                        schedule,
                        step: 0,
                    },
                );
            }
        }

        self.restart_impressions();

        let propagation = self.config.hesitancy.propagation.first_at_or_after(now);
        self.scheduler.schedule_at(propagation, ModelEvent::Propagate);
        let vaccination = self.config.vaccination.recurrence.first_at_or_after(now);
        self.scheduler.schedule_at(vaccination, ModelEvent::Vaccinate);
        if let Some(recurrence) = self.config.statistics.recurrence {
            self.scheduler
                .schedule_at(recurrence.first_at_or_after(now), ModelEvent::Statistics);
        }
        if let Err(err) = self.schedule_migration() {
            self.terminate_stream(ModelEvent::Migrate, &err);
        }
        debug!(queue_depth = self.scheduler.queue_len(), "scheduled model streams");
    }

    pub(super) fn schedule_migration(&mut self) -> Result<(), SimError> {
        let delay = self
            .samplers
            .migration_interval_days
            .draw_decimal(&mut self.streams.migration)?;
        if delay <= Decimal::ZERO {
            return Err(SimError::upstream(format!(
                "migration interval {delay} is not positive"
            )));
        }
        self.scheduler.schedule_after(delay, ModelEvent::Migrate);
        Ok(())
    }
}
