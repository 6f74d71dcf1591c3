//! Discrete-event scheduler over virtual days.
//!
//! Events are kept in a min-heap ordered by `(time, sequence)`: earlier time
//! first, and events sharing a time fire in the order they were scheduled.
//! Scheduling returns an [`EventHandle`] that can cancel the event before it
//! fires. Nothing past the horizon is ever released.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};

use rust_decimal::Decimal;

/// Identifies one scheduled occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventHandle(u64);

#[derive(Debug, Clone)]
struct Entry<E> {
    at: Decimal,
    sequence: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.sequence == other.sequence
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

#[derive(Debug, Clone)]
pub struct EventScheduler<E> {
    queue: BinaryHeap<Reverse<Entry<E>>>,
    /// Sequences scheduled and neither fired nor cancelled.
    pending: BTreeSet<u64>,
    next_sequence: u64,
    now: Decimal,
    horizon: Decimal,
}

impl<E> EventScheduler<E> {
    pub fn new(horizon: Decimal) -> Self {
        Self {
            queue: BinaryHeap::new(),
            pending: BTreeSet::new(),
            next_sequence: 0,
            now: Decimal::ZERO,
            horizon,
        }
    }

    /// Schedules `event` at `at`; times in the past fire at the current time.
    pub fn schedule_at(&mut self, at: Decimal, event: E) -> EventHandle {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.insert(sequence);
        self.queue.push(Reverse(Entry {
            at: at.max(self.now),
            sequence,
            event,
        }));
        EventHandle(sequence)
    }

    pub fn schedule_after(&mut self, delay: Decimal, event: E) -> EventHandle {
        self.schedule_at(self.now + delay.max(Decimal::ZERO), event)
    }

    /// Returns false when the event already fired or was cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.pending.remove(&handle.0)
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains(&handle.0)
    }

    /// Releases the next live event within the horizon and advances the
    /// clock to its time.
    pub fn pop_next(&mut self) -> Option<(Decimal, E)> {
        loop {
            let next = self.queue.peek()?;
            if !self.pending.contains(&next.0.sequence) {
                self.queue.pop();
                continue;
            }
            if next.0.at > self.horizon {
                return None;
            }
            let Reverse(entry) = self.queue.pop()?;
            self.pending.remove(&entry.sequence);
            if entry.at > self.now {
                self.now = entry.at;
            }
            return Some((entry.at, entry.event));
        }
    }

    /// Time of the next live event, skipping cancelled ones.
    pub fn peek_next_time(&mut self) -> Option<Decimal> {
        while let Some(next) = self.queue.peek() {
            if self.pending.contains(&next.0.sequence) {
                return Some(next.0.at);
            }
            self.queue.pop();
        }
        None
    }

    /// Moves the clock forward to `to`, never past the horizon.
    pub fn advance_clock(&mut self, to: Decimal) {
        let to = to.min(self.horizon);
        if to > self.now {
            self.now = to;
        }
    }

    pub fn now(&self) -> Decimal {
        self.now
    }

    pub fn horizon(&self) -> Decimal {
        self.horizon
    }

    /// Whether any live event remains within the horizon.
    pub fn has_pending(&mut self) -> bool {
        self.peek_next_time()
            .map_or(false, |at| at <= self.horizon)
    }

    /// Live events, including those beyond the horizon.
    pub fn queue_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn schedule_and_pop_returns_events_in_time_order() {
        let mut sched = EventScheduler::new(day(100));
        sched.schedule_at(day(5), "alice");
        sched.schedule_at(day(2), "bob");
        sched.schedule_at(day(8), "carol");

        assert_eq!(sched.pop_next(), Some((day(2), "bob")));
        assert_eq!(sched.pop_next(), Some((day(5), "alice")));
        assert_eq!(sched.pop_next(), Some((day(8), "carol")));
        assert_eq!(sched.pop_next(), None);
    }

    #[test]
    fn same_time_fires_in_scheduling_order() {
        let mut sched = EventScheduler::new(day(100));
        for name in ["a", "b", "c", "d"] {
            sched.schedule_at(day(3), name);
        }
        let order = std::iter::from_fn(|| sched.pop_next().map(|(_, e)| e)).collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn clock_advances_to_popped_event() {
        let mut sched = EventScheduler::new(day(100));
        assert_eq!(sched.now(), Decimal::ZERO);
        sched.schedule_at(Decimal::new(75, 1), ());
        sched.pop_next();
        assert_eq!(sched.now(), Decimal::new(75, 1));
        let handle = sched.schedule_after(day(2), ());
        sched.pop_next();
        assert_eq!(sched.now(), Decimal::new(95, 1));
        assert!(!sched.is_pending(handle));
    }

    #[test]
    fn horizon_holds_back_later_events() {
        let mut sched = EventScheduler::new(day(5));
        sched.schedule_at(day(3), 1);
        sched.schedule_at(day(7), 2);

        assert!(sched.has_pending());
        assert_eq!(sched.pop_next(), Some((day(3), 1)));
        assert!(!sched.has_pending());
        assert_eq!(sched.pop_next(), None);
        assert_eq!(sched.queue_len(), 1);
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut sched = EventScheduler::new(day(100));
        let first = sched.schedule_at(day(1), "first");
        sched.schedule_at(day(2), "second");
        assert!(sched.cancel(first));
        assert!(!sched.cancel(first));
        assert_eq!(sched.queue_len(), 1);
        assert_eq!(sched.peek_next_time(), Some(day(2)));
        assert_eq!(sched.pop_next(), Some((day(2), "second")));
    }

    #[test]
    fn past_times_fire_now() {
        let mut sched = EventScheduler::new(day(100));
        sched.advance_clock(day(10));
        sched.schedule_at(day(4), ());
        assert_eq!(sched.pop_next(), Some((day(10), ())));
    }

    #[test]
    fn advance_clock_stops_at_horizon() {
        let mut sched: EventScheduler<()> = EventScheduler::new(day(10));
        sched.advance_clock(day(4));
        sched.advance_clock(day(2));
        assert_eq!(sched.now(), day(4));
        sched.advance_clock(day(40));
        assert_eq!(sched.now(), day(10));
    }
}
