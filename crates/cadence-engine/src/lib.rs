//! Simulation kernel for the cadence discrete-event runtime.
//!
//! The kernel owns the pending-event list and the simulation clock. It
//! advances logical time by repeatedly executing the earliest pending
//! event, bounded by a run-until time, between the warmup and
//! end-replication markers it schedules itself. Models talk to the
//! kernel through cloneable [`Simulator`] handles; outside collaborators
//! observe it through the bus events it publishes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod events;
pub mod model;
pub mod replication;
pub mod simulator;

pub use error::{ReplicationError, SimulatorError};
pub use events::{
    END_REPLICATION_EVENT, EVENTLIST_CHANGED_EVENT, START_EVENT, STOP_EVENT, TIME_CHANGED_EVENT,
    WARMUP_EVENT,
};
pub use model::{Model, ModelRef, OutputStatistics, SimulationStatistic, StatisticRef};
pub use replication::Replication;
pub use simulator::{ErrorStrategy, RunState, Simulator};
