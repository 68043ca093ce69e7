//! The kernel-published bus event table.
//!
//! These descriptors have stable identity for the lifetime of the
//! process; listeners subscribe against them and compare received
//! events with [`Event::matches`](cadence_bus::Event::matches).

use cadence_bus::{EventType, PayloadSpec};

/// Timed event fired when the simulation clock is about to advance.
/// Stamped with the new time; fired only when the time actually changes.
pub static TIME_CHANGED_EVENT: EventType = EventType::new(
    "TIME_CHANGED_EVENT",
    "simulation clock advanced",
    PayloadSpec::Empty,
);

/// Timed event fired at the warmup instant, before any model event
/// scheduled at the same time. Statistics begin accumulating here.
pub static WARMUP_EVENT: EventType = EventType::new(
    "WARMUP_EVENT",
    "replication warmup instant reached",
    PayloadSpec::Empty,
);

/// Timed event fired at the replication end, after any model event
/// scheduled at the same time. The event list is cleared afterwards.
pub static END_REPLICATION_EVENT: EventType = EventType::new(
    "END_REPLICATION_EVENT",
    "replication ended",
    PayloadSpec::Empty,
);

/// Fired when the pending-event list is rebuilt wholesale (at
/// initialization).
pub static EVENTLIST_CHANGED_EVENT: EventType = EventType::new(
    "EVENTLIST_CHANGED_EVENT",
    "pending-event list replaced",
    PayloadSpec::Empty,
);

/// Fired when a run is started.
pub static START_EVENT: EventType =
    EventType::new("START_EVENT", "simulator started", PayloadSpec::Empty);

/// Fired when a run comes to rest (explicit stop, run-until bound, or
/// exhausted event list) — not when the replication ends.
pub static STOP_EVENT: EventType =
    EventType::new("STOP_EVENT", "simulator stopped", PayloadSpec::Empty);
