//! Scheduled events: the deferred invocations the kernel dispatches.
//!
//! A [`SimEvent`] pairs an absolute firing time and a priority with a
//! bound action. The event list assigns each inserted event a monotonic
//! insertion sequence so that order among equal `(time, priority)` is
//! FIFO. Scheduling returns an [`EventHandle`], the caller's token for
//! cancellation and state queries.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::EventError;
use crate::time::SimTime;

// ── Priorities ─────────────────────────────────────────────────────

/// Lowest priority a model event may carry.
pub const MIN_PRIORITY: i16 = 1;
/// Default priority for model events.
pub const NORMAL_PRIORITY: i16 = 5;
/// Highest priority a model event may carry.
pub const MAX_PRIORITY: i16 = 10;

/// Reserved priority of the kernel's warmup event. Above [`MAX_PRIORITY`]
/// so warmup fires before any model event scheduled at the same instant.
pub const WARMUP_PRIORITY: i16 = MAX_PRIORITY + 1;

/// Reserved priority of the kernel's end-replication event. Below
/// [`MIN_PRIORITY`] so the end fires after any model event scheduled at
/// the same instant.
pub const END_REPLICATION_PRIORITY: i16 = MIN_PRIORITY - 1;

// ── Event state ────────────────────────────────────────────────────

/// Lifecycle state of a scheduled event.
///
/// An event is in the event list iff it is `Pending`. A non-pending
/// event is never dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventState {
    /// Scheduled and waiting in the event list.
    Pending,
    /// Popped and executed (or execution was attempted).
    Executed,
    /// Removed from the event list before execution.
    Cancelled,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Executed => write!(f, "executed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Shared state cell linking an event in the list with its handles.
#[derive(Clone, Debug)]
pub(crate) struct EventStateCell(Arc<AtomicU8>);

const STATE_PENDING: u8 = 0;
const STATE_EXECUTED: u8 = 1;
const STATE_CANCELLED: u8 = 2;

impl EventStateCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(STATE_PENDING)))
    }

    pub(crate) fn get(&self) -> EventState {
        match self.0.load(Ordering::Acquire) {
            STATE_EXECUTED => EventState::Executed,
            STATE_CANCELLED => EventState::Cancelled,
            _ => EventState::Pending,
        }
    }

    pub(crate) fn set(&self, state: EventState) {
        let raw = match state {
            EventState::Pending => STATE_PENDING,
            EventState::Executed => STATE_EXECUTED,
            EventState::Cancelled => STATE_CANCELLED,
        };
        self.0.store(raw, Ordering::Release);
    }
}

// ── Executable ─────────────────────────────────────────────────────

/// A bound, one-shot event action.
///
/// Actions are fallible: a returned error is routed through the
/// kernel's error strategy rather than unwinding through the run loop.
pub type Executable = Box<dyn FnOnce() -> Result<(), EventError> + Send + 'static>;

// ── SimEvent ───────────────────────────────────────────────────────

/// A scheduled event: an absolute firing time, a priority, and a bound
/// action, dispatched at most once.
pub struct SimEvent<T: SimTime> {
    time: T,
    priority: i16,
    seq: u64,
    state: EventStateCell,
    action: Option<Executable>,
}

impl<T: SimTime> SimEvent<T> {
    /// Create a pending event. The insertion sequence is assigned by the
    /// event list when the event is inserted.
    pub fn new(
        time: T,
        priority: i16,
        action: impl FnOnce() -> Result<(), EventError> + Send + 'static,
    ) -> Self {
        Self {
            time,
            priority,
            seq: 0,
            state: EventStateCell::new(),
            action: Some(Box::new(action)),
        }
    }

    /// Absolute firing time.
    pub fn time(&self) -> T {
        self.time
    }

    /// Tie-breaking priority; higher fires first at equal time.
    pub fn priority(&self) -> i16 {
        self.priority
    }

    /// Insertion sequence assigned by the event list (0 before insert).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EventState {
        self.state.get()
    }

    /// Run the bound action exactly once.
    ///
    /// The event is marked [`EventState::Executed`] before the action
    /// runs, so a failing action still counts as dispatched. A second
    /// call fails with [`EventError::AlreadyExecuted`].
    pub fn execute(&mut self) -> Result<(), EventError> {
        let action = self.action.take().ok_or(EventError::AlreadyExecuted)?;
        self.state.set(EventState::Executed);
        action()
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    pub(crate) fn state_cell(&self) -> EventStateCell {
        self.state.clone()
    }

    pub(crate) fn mark_cancelled(&self) {
        self.state.set(EventState::Cancelled);
    }
}

impl<T: SimTime> fmt::Debug for SimEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimEvent")
            .field("time", &self.time)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("state", &self.state.get())
            .finish()
    }
}

// ── EventHandle ────────────────────────────────────────────────────

/// The caller's token for a scheduled event.
///
/// Carries the full ordering key, so the event list can cancel in
/// O(log n), and a shared view of the event's state. Cloning a handle
/// does not duplicate the event.
#[derive(Clone, Debug)]
pub struct EventHandle<T: SimTime> {
    time: T,
    priority: i16,
    seq: u64,
    state: EventStateCell,
}

impl<T: SimTime> EventHandle<T> {
    pub(crate) fn new(time: T, priority: i16, seq: u64, state: EventStateCell) -> Self {
        Self {
            time,
            priority,
            seq,
            state,
        }
    }

    /// Absolute firing time of the scheduled event.
    pub fn time(&self) -> T {
        self.time
    }

    /// Priority of the scheduled event.
    pub fn priority(&self) -> i16 {
        self.priority
    }

    /// Current lifecycle state of the scheduled event.
    pub fn state(&self) -> EventState {
        self.state.get()
    }

    /// True while the event is waiting in the event list.
    pub fn is_pending(&self) -> bool {
        self.state.get() == EventState::Pending
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}
