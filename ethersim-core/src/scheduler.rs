//! The discrete-event scheduler.
//!
//! A [`Scheduler`] is a priority queue of time-stamped events advancing a
//! monotonic simulation clock. There is no wall clock and no parallelism:
//! all simulated concurrency is future-dated events, popped one at a time
//! and dispatched to completion.
//!
//! The event payload type is caller-defined. The simulation layer uses a
//! closed enum of MAC transitions (see [`Event`]), but the scheduler is
//! usable with any payload.
//!
//! [`Event`]: crate::simulation::Event

use crate::time::SimTime;
use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
    fmt,
};

/// Handle to a scheduled event.
///
/// Identifiers are assigned from a monotone counter, which doubles as the
/// FIFO tie-breaker: two events scheduled at the same simulation time fire
/// in the order they were inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub(crate) const ZERO: Self = Self(0);

    #[must_use = "function does not modify the current value"]
    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A heap slot; the payload lives in a side table so that cancellation
/// does not require heap surgery.
struct Slot {
    time: SimTime,
    id: EventId,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}
impl Eq for Slot {}
impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A discrete-event scheduler: the clock of the simulated network.
///
/// ```
/// # use ethersim_core::scheduler::Scheduler;
/// let mut scheduler: Scheduler<&'static str> = Scheduler::new();
///
/// scheduler.schedule(0.5, "later");
/// scheduler.schedule(0.0, "now");
///
/// let mut order = Vec::new();
/// scheduler.run(None, |sched, event| {
///     order.push((sched.now().as_secs(), event));
/// });
///
/// assert_eq!(order, vec![(0.0, "now"), (0.5, "later")]);
/// ```
pub struct Scheduler<E> {
    now: SimTime,
    next_id: EventId,
    queue: BinaryHeap<Reverse<Slot>>,
    pending: HashMap<EventId, E>,
    stopped: bool,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_id: EventId::ZERO,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
            stopped: false,
        }
    }

    /// Current simulation time; monotone non-decreasing across callbacks.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Insert an event `delay` seconds from now.
    ///
    /// Events inserted at identical absolute times fire in insertion
    /// order. A zero delay is legal: the event runs strictly after the
    /// current callback completes, before any later-time event.
    ///
    /// # Panics
    ///
    /// A negative or NaN delay is a precondition violation and panics.
    pub fn schedule(&mut self, delay: f64, event: E) -> EventId {
        assert!(
            delay >= 0.0,
            "cannot schedule an event in the past (delay: {delay})"
        );

        let id = self.next_id;
        self.next_id = id.next();

        self.queue.push(Reverse(Slot {
            time: self.now + delay,
            id,
        }));
        self.pending.insert(id, event);

        id
    }

    /// Remove a pending event.
    ///
    /// Idempotent; returns whether the event was still pending.
    /// Cancelling an event that already fired is a no-op.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Whether the event is still waiting to fire.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Request that [`Scheduler::run`] return after the current callback.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Time of the next pending event, if any.
    pub fn next_event_time(&mut self) -> Option<SimTime> {
        loop {
            let slot = &self.queue.peek()?.0;
            if self.pending.contains_key(&slot.id) {
                return Some(slot.time);
            }
            // cancelled; drop the stale heap slot
            self.queue.pop();
        }
    }

    fn pop(&mut self) -> Option<(SimTime, E)> {
        loop {
            let Reverse(slot) = self.queue.pop()?;
            if let Some(event) = self.pending.remove(&slot.id) {
                return Some((slot.time, event));
            }
        }
    }

    /// Drive the simulation.
    ///
    /// Repeatedly pops the least time-stamped event, advances the clock to
    /// its time and invokes `f` with the scheduler and the event; `f` may
    /// schedule and cancel further events. Terminates when the queue is
    /// empty, when [`Scheduler::stop`] is called from inside `f`, or when
    /// the next event lies beyond `until`.
    ///
    /// Callback panics are not caught; they propagate and end the run.
    pub fn run<F>(&mut self, until: Option<SimTime>, mut f: F)
    where
        F: FnMut(&mut Self, E),
    {
        self.stopped = false;

        while !self.stopped {
            if let Some(until) = until {
                match self.next_event_time() {
                    Some(time) if time > until => break,
                    Some(_) => (),
                    None => break,
                }
            }

            let Some((time, event)) = self.pop() else {
                break;
            };

            debug_assert!(time >= self.now);
            self.now = time;

            f(self, event);
        }
    }

    /// Clear the queue and return the clock to zero.
    ///
    /// The insertion counter restarts too, so a reset simulation that
    /// schedules the same events replays identically.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pending.clear();
        self.now = SimTime::ZERO;
        self.next_id = EventId::ZERO;
        self.stopped = false;
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_at_equal_time() {
        let mut scheduler = Scheduler::new();

        scheduler.schedule(1.0, "first");
        scheduler.schedule(1.0, "second");
        scheduler.schedule(1.0, "third");

        let mut order = Vec::new();
        scheduler.run(None, |_, event| order.push(event));

        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn zero_delay_runs_after_current_before_later() {
        let mut scheduler = Scheduler::new();

        scheduler.schedule(0.0, "a");
        scheduler.schedule(1.0, "late");

        let mut order = Vec::new();
        scheduler.run(None, |sched, event| {
            if event == "a" {
                sched.schedule(0.0, "b");
                sched.schedule(0.0, "c");
            }
            order.push((sched.now().as_secs(), event));
        });

        assert_eq!(
            order,
            vec![(0.0, "a"), (0.0, "b"), (0.0, "c"), (1.0, "late")]
        );
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut scheduler = Scheduler::new();

        let id = scheduler.schedule(1.0, ());

        assert!(scheduler.is_pending(id));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(!scheduler.is_pending(id));

        let mut fired = 0;
        scheduler.run(None, |_, ()| fired += 1);
        assert_eq!(fired, 0);
    }

    #[test]
    fn cancel_fired_event_is_noop() {
        let mut scheduler = Scheduler::new();

        let id = scheduler.schedule(0.0, ());
        let mut fired = 0;
        scheduler.run(None, |sched, ()| {
            fired += 1;
            assert!(!sched.cancel(id));
        });

        assert_eq!(fired, 1);
    }

    #[test]
    #[should_panic(expected = "cannot schedule an event in the past")]
    fn negative_delay_panics() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(-1.0, ());
    }

    #[test]
    fn clock_is_monotone() {
        let mut scheduler = Scheduler::new();

        scheduler.schedule(2.0, ());
        scheduler.schedule(1.0, ());
        scheduler.schedule(3.0, ());

        let mut last = SimTime::ZERO;
        scheduler.run(None, |sched, ()| {
            assert!(sched.now() >= last);
            last = sched.now();
        });

        assert_eq!(last, SimTime::from_secs(3.0));
    }

    #[test]
    fn run_until() {
        let mut scheduler = Scheduler::new();

        scheduler.schedule(1.0, "in");
        scheduler.schedule(2.0, "out");

        let mut order = Vec::new();
        scheduler.run(Some(SimTime::from_secs(1.5)), |_, event| order.push(event));

        assert_eq!(order, vec!["in"]);
        assert_eq!(scheduler.len(), 1);

        // the remainder still fires when the horizon moves
        scheduler.run(None, |_, event| order.push(event));
        assert_eq!(order, vec!["in", "out"]);
    }

    #[test]
    fn stop_ends_the_run() {
        let mut scheduler = Scheduler::new();

        for at in [1.0, 2.0, 3.0] {
            scheduler.schedule(at, ());
        }

        let mut fired = 0;
        scheduler.run(None, |sched, ()| {
            fired += 1;
            if fired == 2 {
                sched.stop();
            }
        });

        assert_eq!(fired, 2);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn reset_clears_and_restarts_identifiers() {
        let mut scheduler = Scheduler::new();

        let before = scheduler.schedule(1.0, ());
        scheduler.run(None, |_, ()| {});

        scheduler.reset();

        assert_eq!(scheduler.now(), SimTime::ZERO);
        assert!(scheduler.is_empty());

        let after = scheduler.schedule(1.0, ());
        assert_eq!(before, after);
    }
}
