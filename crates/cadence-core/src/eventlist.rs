//! The pending-event list: a time-ordered multiset of scheduled events.
//!
//! Events are ordered by `(time asc, priority desc, insertion seq asc)`.
//! The backing store is a balanced ordered tree (`BTreeMap`), giving
//! O(log n) insert, pop-first, and cancel-by-handle — a plain binary
//! heap cannot cancel in O(log n). Duplicate `(time, priority)` keys are
//! allowed; the internal sequence counter disambiguates them and makes
//! ties FIFO.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::event::{EventHandle, SimEvent};
use crate::time::SimTime;

/// Full ordering key of a scheduled event.
///
/// Derived `Ord` compares fields in declaration order: time ascending,
/// then priority descending (via `Reverse`), then sequence ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey<T: SimTime> {
    time: T,
    priority: Reverse<i16>,
    seq: u64,
}

impl<T: SimTime> EventKey<T> {
    fn new(time: T, priority: i16, seq: u64) -> Self {
        Self {
            time,
            priority: Reverse(priority),
            seq,
        }
    }
}

/// The future event list.
///
/// The sequence counter is internal and monotone over the lifetime of
/// the list; it survives [`clear`](EventList::clear) so handles from
/// before a clear can never alias events inserted after it.
#[derive(Debug)]
pub struct EventList<T: SimTime> {
    entries: BTreeMap<EventKey<T>, SimEvent<T>>,
    next_seq: u64,
}

impl<T: SimTime> EventList<T> {
    /// Create an empty event list.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Insert a pending event, assigning its insertion sequence.
    ///
    /// Returns the handle used for cancellation and state queries.
    pub fn insert(&mut self, mut event: SimEvent<T>) -> EventHandle<T> {
        let seq = self.next_seq;
        self.next_seq += 1;
        event.set_seq(seq);

        let handle = EventHandle::new(event.time(), event.priority(), seq, event.state_cell());
        self.entries
            .insert(EventKey::new(event.time(), event.priority(), seq), event);
        handle
    }

    /// Remove and return the earliest event.
    pub fn pop_first(&mut self) -> Option<SimEvent<T>> {
        self.entries.pop_first().map(|(_, event)| event)
    }

    /// The earliest event, without removing it.
    pub fn first(&self) -> Option<&SimEvent<T>> {
        self.entries.first_key_value().map(|(_, event)| event)
    }

    /// Cancel the event behind `handle`.
    ///
    /// Returns true iff the event was still pending in this list; the
    /// event transitions to cancelled and ceases to exist. Removing an
    /// already-executed or already-cancelled event returns false without
    /// error.
    pub fn remove(&mut self, handle: &EventHandle<T>) -> bool {
        let key = EventKey::new(handle.time(), handle.priority(), handle.seq());
        match self.entries.remove(&key) {
            Some(event) => {
                event.mark_cancelled();
                true
            }
            None => false,
        }
    }

    /// Drop all pending events. None are marked executed; handles report
    /// them cancelled.
    pub fn clear(&mut self) {
        for (_, event) in std::mem::take(&mut self.entries) {
            event.mark_cancelled();
        }
    }

    /// True when no events are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: SimTime> Default for EventList<T> {
    fn default() -> Self {
        Self::new()
    }
}
