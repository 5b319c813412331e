use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::key::TransactionKey;
use crate::timer::TimerType;

/// A timer armed by one transaction instance
#[derive(Debug, Clone)]
pub struct TimerEntry {
    pub when: Instant,
    pub key: TransactionKey,
    /// Instance of the transaction that armed the timer. A later
    /// transaction reusing the key ignores it.
    pub instance: u64,
    pub timer: TimerType,
    /// Interval the timer was armed with, the base for the next backoff
    pub duration: Duration,
}

struct Slot {
    seq: u64,
    entry: TimerEntry,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Earliest deadline first; equal deadlines fire in arming order.
impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.entry.when, self.seq).cmp(&(other.entry.when, other.seq))
    }
}

/// Deadline-ordered timer queue.
///
/// Cancellation is logical: entries stay queued until due and the owner
/// decides whether they still apply.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Slot>>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `timer` to fire `duration` after `now`
    pub fn add(
        &mut self,
        key: TransactionKey,
        instance: u64,
        timer: TimerType,
        duration: Duration,
        now: Instant,
    ) {
        self.seq += 1;
        self.heap.push(Reverse(Slot {
            seq: self.seq,
            entry: TimerEntry {
                when: now + duration,
                key,
                instance,
                timer,
                duration,
            },
        }));
    }

    /// Earliest deadline, if any timer is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(slot)| slot.entry.when)
    }

    /// Time from `now` until the earliest deadline; zero when one is overdue
    pub fn time_till_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|when| when.saturating_duration_since(now))
    }

    /// Removes and returns the earliest timer due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerEntry> {
        match self.heap.peek() {
            Some(Reverse(slot)) if slot.entry.when <= now => {
                self.heap.pop().map(|Reverse(slot)| slot.entry)
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_sip_core::Method;

    fn key(id: &str) -> TransactionKey {
        TransactionKey::new(id, Method::Options, false)
    }

    #[test]
    fn fires_in_deadline_order() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        queue.add(key("b"), 1, TimerType::F, Duration::from_secs(32), now);
        queue.add(key("a"), 1, TimerType::E1, Duration::from_millis(500), now);
        queue.add(key("c"), 1, TimerType::E1, Duration::from_millis(500), now);

        assert_eq!(queue.time_till_next(now), Some(Duration::from_millis(500)));
        assert!(queue.pop_due(now).is_none());

        let later = now + Duration::from_secs(1);
        let first = queue.pop_due(later).unwrap();
        let second = queue.pop_due(later).unwrap();
        assert_eq!((first.key.id.as_str(), second.key.id.as_str()), ("a", "c"));
        assert!(queue.pop_due(later).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.time_till_next(later), Some(Duration::from_secs(31)));
    }

    #[test]
    fn overdue_timer_reports_zero_wait() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        assert_eq!(queue.time_till_next(now), None);
        queue.add(key("a"), 7, TimerType::Trying, Duration::from_millis(200), now);
        assert_eq!(queue.time_till_next(now + Duration::from_secs(1)), Some(Duration::ZERO));
        let entry = queue.pop_due(now + Duration::from_secs(1)).unwrap();
        assert_eq!(entry.instance, 7);
        assert_eq!(entry.duration, Duration::from_millis(200));
        assert!(queue.is_empty());
    }
}
