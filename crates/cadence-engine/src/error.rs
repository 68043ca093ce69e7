//! Kernel and replication error types.

use std::error::Error;
use std::fmt;

use cadence_core::{EventError, TimeError};

use crate::simulator::RunState;

// ── SimulatorError ─────────────────────────────────────────────────

/// Errors surfaced synchronously by kernel operations.
///
/// Event-execution faults never appear here; they are caught inside the
/// run loop and routed through the configured error strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulatorError {
    /// The operation is not allowed in the current run state.
    IllegalState {
        /// The attempted operation.
        operation: &'static str,
        /// The state that forbade it.
        state: RunState,
    },
    /// The operation needs an initialized simulator (a bound replication).
    NotInitialized {
        /// The attempted operation.
        operation: &'static str,
    },
    /// An event was scheduled before the current simulation time.
    ScheduleInPast {
        /// The requested firing time.
        event_time: String,
        /// The simulation time at the attempt.
        sim_time: String,
    },
    /// A run-until bound lies before the current simulation time.
    RunUntilInPast {
        /// The requested bound.
        until: String,
        /// The simulation time at the attempt.
        sim_time: String,
    },
    /// The priority lies outside the model band
    /// `[MIN_PRIORITY, MAX_PRIORITY]`.
    InvalidPriority {
        /// The rejected priority.
        priority: i16,
    },
    /// Time arithmetic overflowed while resolving a relative delay.
    Time(TimeError),
    /// The model's `construct_model` failed during initialization.
    ModelConstruction(EventError),
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalState { operation, state } => {
                write!(f, "cannot {operation} while simulator is {state}")
            }
            Self::NotInitialized { operation } => {
                write!(f, "cannot {operation}: simulator is not initialized")
            }
            Self::ScheduleInPast {
                event_time,
                sim_time,
            } => write!(
                f,
                "cannot schedule event at {event_time} before simulation time {sim_time}"
            ),
            Self::RunUntilInPast { until, sim_time } => write!(
                f,
                "run-until bound {until} lies before simulation time {sim_time}"
            ),
            Self::InvalidPriority { priority } => {
                write!(f, "priority {priority} is outside the model band")
            }
            Self::Time(e) => write!(f, "time: {e}"),
            Self::ModelConstruction(e) => write!(f, "model construction failed: {e}"),
        }
    }
}

impl Error for SimulatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Time(e) => Some(e),
            Self::ModelConstruction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TimeError> for SimulatorError {
    fn from(e: TimeError) -> Self {
        Self::Time(e)
    }
}

// ── ReplicationError ───────────────────────────────────────────────

/// Errors detected while constructing a replication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicationError {
    /// The replication id is empty.
    EmptyId,
    /// The warmup time lies before the start time.
    WarmupBeforeStart {
        /// Configured start time.
        start: String,
        /// Configured warmup time.
        warmup: String,
    },
    /// The end time lies before the warmup time.
    EndBeforeWarmup {
        /// Configured warmup time.
        warmup: String,
        /// Configured end time.
        end: String,
    },
    /// Time arithmetic overflowed while resolving durations.
    Time(TimeError),
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "replication id must not be empty"),
            Self::WarmupBeforeStart { start, warmup } => {
                write!(f, "warmup time {warmup} lies before start time {start}")
            }
            Self::EndBeforeWarmup { warmup, end } => {
                write!(f, "end time {end} lies before warmup time {warmup}")
            }
            Self::Time(e) => write!(f, "time: {e}"),
        }
    }
}

impl Error for ReplicationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Time(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TimeError> for ReplicationError {
    fn from(e: TimeError) -> Self {
        Self::Time(e)
    }
}
