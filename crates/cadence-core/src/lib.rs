//! Core types for the cadence discrete-event simulation runtime.
//!
//! This is the leaf crate with zero internal cadence dependencies. It
//! defines the fundamental building blocks of event scheduling: logical
//! simulation time, scheduled events with priorities and cancellation
//! handles, the time-ordered pending-event list, the hierarchical naming
//! context, and the error types for each of those subsystems.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod event;
pub mod eventlist;
pub mod time;

// Re-export core types at crate root for convenience.
pub use context::{Context, ContextObject};
pub use error::{ContextError, EventError, TimeError};
pub use event::{
    EventHandle, EventState, Executable, SimEvent, END_REPLICATION_PRIORITY, MAX_PRIORITY,
    MIN_PRIORITY, NORMAL_PRIORITY, WARMUP_PRIORITY,
};
pub use eventlist::EventList;
pub use time::{Seconds, SimTime, Ticks};
