use super::*;

impl HouseholdModel {
    pub fn run_id(&self) -> &str {
        &self.config.run_id
    }

    /// Processes the next due event. Returns false once nothing remains
    /// within the horizon.
    pub fn step(&mut self) -> bool {
        let Some((at, event)) = self.scheduler.pop_next() else {
            return false;
        };
        trace!(at = %at, stream = event.stream(), "dispatch");
        self.dispatch(event);
        self.processed_events += 1;
        true
    }

    /// Processes every event due at or before `until`, then moves the clock
    /// there. Returns the number of events processed.
    pub fn run_until(&mut self, until: Decimal) -> u64 {
        let before = self.processed_events;
        while self
            .scheduler
            .peek_next_time()
            .is_some_and(|at| at <= until)
        {
            if !self.step() {
                break;
            }
        }
        self.scheduler.advance_clock(until);
        self.processed_events - before
    }

    /// Runs to the horizon.
    pub fn run(&mut self) -> u64 {
        let before = self.processed_events;
        while self.step() {}
        let horizon = self.scheduler.horizon();
        self.scheduler.advance_clock(horizon);
        info!(
            run_id = %self.config.run_id,
            events = self.processed_events,
            households = self.store.household_count(),
            vaccinated = self.counters.vaccinated,
            migrations = self.counters.migrations,
            "run complete"
        );
        self.processed_events - before
    }

    pub fn is_complete(&mut self) -> bool {
        self.scheduler.now() >= self.scheduler.horizon() || !self.scheduler.has_pending()
    }

    pub fn status(&mut self) -> RunStatus {
        RunStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.config.run_id.clone(),
            now_days: self.scheduler.now(),
            horizon_days: self.scheduler.horizon(),
            processed_events: self.processed_events,
            queue_depth: self.scheduler.queue_len(),
            complete: self.is_complete(),
        }
    }
}
