//! Event production: the listener registry and dispatch.
//!
//! An [`EventProducer`] owns the subscriber registry for one event
//! source (the kernel, or a single statistics observer). Listeners
//! subscribe per event type with a reference strength: strong
//! registrations keep the listener alive for bus purposes, weak ones do
//! not and are pruned lazily when dispatch finds them dead.
//!
//! Dispatch notifies listeners in registration order against a snapshot
//! of the registration list, so a listener may unregister itself (or
//! register others) during a pass without affecting notifications
//! already scheduled in that pass. A listener returning an error is
//! isolated: the fault is logged and dispatch continues.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use cadence_core::SimTime;

use crate::event::{Event, Payload};
use crate::event_type::EventType;

// ── ListenerError ──────────────────────────────────────────────────

/// A fault raised by a listener during `notify`.
///
/// Never propagated past the bus: the producer logs it and keeps
/// dispatching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerError {
    reason: String,
}

impl ListenerError {
    /// Describe a notification failure.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener fault: {}", self.reason)
    }
}

impl Error for ListenerError {}

// ── EventListener ──────────────────────────────────────────────────

/// A subscriber on the bus.
pub trait EventListener<T: SimTime>: Send {
    /// Handle one event. Errors are logged by the producer and do not
    /// stop dispatch.
    fn notify(&mut self, event: &Event<T>) -> Result<(), ListenerError>;
}

/// Shared handle to a registered listener.
pub type ListenerRef<T> = Arc<Mutex<dyn EventListener<T>>>;

/// Reference strength of a registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reference {
    /// The registry keeps the listener alive.
    Strong,
    /// The registry does not keep the listener alive; the slot is
    /// pruned once the listener is dropped elsewhere.
    Weak,
}

enum Entry<T: SimTime> {
    Strong(ListenerRef<T>),
    Weak(Weak<Mutex<dyn EventListener<T>>>),
}

impl<T: SimTime> Entry<T> {
    fn refers_to(&self, listener: &ListenerRef<T>) -> bool {
        match self {
            Self::Strong(l) => Arc::ptr_eq(l, listener),
            Self::Weak(w) => w.upgrade().is_some_and(|l| Arc::ptr_eq(&l, listener)),
        }
    }
}

// ── EventProducer ──────────────────────────────────────────────────

/// Listener registry and dispatcher for one event source.
pub struct EventProducer<T: SimTime> {
    registry: Mutex<IndexMap<&'static str, Vec<Entry<T>>>>,
}

// A panicked listener must not wedge the registry for everyone else.
fn registry_of<T: SimTime>(
    producer: &EventProducer<T>,
) -> MutexGuard<'_, IndexMap<&'static str, Vec<Entry<T>>>> {
    producer
        .registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl<T: SimTime> EventProducer<T> {
    /// Create a producer with no listeners.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(IndexMap::new()),
        }
    }

    /// Register `listener` for `event_type`.
    ///
    /// Returns false when this listener is already registered for the
    /// type (the existing registration, and its strength, stand).
    pub fn add_listener(
        &self,
        event_type: &'static EventType,
        listener: &ListenerRef<T>,
        reference: Reference,
    ) -> bool {
        let mut registry = registry_of(self);
        let entries = registry.entry(event_type.name()).or_default();
        if entries.iter().any(|entry| entry.refers_to(listener)) {
            return false;
        }
        entries.push(match reference {
            Reference::Strong => Entry::Strong(Arc::clone(listener)),
            Reference::Weak => Entry::Weak(Arc::downgrade(listener)),
        });
        true
    }

    /// Unregister `listener` from `event_type`. Returns true iff a
    /// registration was removed.
    pub fn remove_listener(&self, event_type: &EventType, listener: &ListenerRef<T>) -> bool {
        let mut registry = registry_of(self);
        match registry.get_mut(event_type.name()) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|entry| !entry.refers_to(listener));
                entries.len() < before
            }
            None => false,
        }
    }

    /// Unregister `listener` from every event type. Returns the number
    /// of registrations removed.
    pub fn remove_all(&self, listener: &ListenerRef<T>) -> usize {
        let mut registry = registry_of(self);
        let mut removed = 0;
        for entries in registry.values_mut() {
            let before = entries.len();
            entries.retain(|entry| !entry.refers_to(listener));
            removed += before - entries.len();
        }
        removed
    }

    /// Number of live registrations for `event_type`.
    pub fn listener_count(&self, event_type: &EventType) -> usize {
        let registry = registry_of(self);
        registry
            .get(event_type.name())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| match entry {
                        Entry::Strong(_) => true,
                        Entry::Weak(w) => w.strong_count() > 0,
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    /// True when `event_type` has at least one live registration.
    pub fn has_listeners(&self, event_type: &EventType) -> bool {
        self.listener_count(event_type) > 0
    }

    /// Dispatch `event` to the listeners of its type.
    ///
    /// Dead weak slots are pruned while the snapshot is taken. The
    /// registry lock is not held during notification, so listeners may
    /// re-enter the producer.
    pub fn fire(&self, event: &Event<T>) {
        let snapshot: SmallVec<[ListenerRef<T>; 4]> = {
            let mut registry = registry_of(self);
            match registry.get_mut(event.event_type().name()) {
                Some(entries) => {
                    let mut alive = SmallVec::new();
                    entries.retain(|entry| match entry {
                        Entry::Strong(l) => {
                            alive.push(Arc::clone(l));
                            true
                        }
                        Entry::Weak(w) => match w.upgrade() {
                            Some(l) => {
                                alive.push(l);
                                true
                            }
                            None => false,
                        },
                    });
                    alive
                }
                None => return,
            }
        };

        for listener in snapshot {
            let result = listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .notify(event);
            if let Err(fault) = result {
                tracing::warn!(event = %event, %fault, "listener failed during notify");
            }
        }
    }

    /// Fire an untimed event.
    pub fn fire_event(&self, event_type: &'static EventType, payload: Payload) {
        self.fire(&Event::new(event_type, payload));
    }

    /// Fire a timed event stamped with simulation time.
    pub fn fire_timed(&self, event_type: &'static EventType, payload: Payload, timestamp: T) {
        self.fire(&Event::timed(event_type, payload, timestamp));
    }
}

impl<T: SimTime> Default for EventProducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SimTime> fmt::Debug for EventProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = registry_of(self);
        let types: Vec<&str> = registry.keys().copied().collect();
        f.debug_struct("EventProducer")
            .field("event_types", &types)
            .finish()
    }
}
