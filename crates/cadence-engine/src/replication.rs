//! Replication run boundaries.
//!
//! A replication is one parameterized run: where the clock starts, when
//! statistics begin accumulating (warmup), when the run ends, and the
//! naming context collaborators bind themselves into. The kernel reads
//! these exactly once, at `initialize`; afterwards the replication is
//! immutable for the duration of the run.

use std::sync::Arc;

use cadence_core::{Context, SimTime};

use crate::error::ReplicationError;

/// Run boundaries and binding context for one replication.
#[derive(Clone, Debug, PartialEq)]
pub struct Replication<T: SimTime> {
    id: String,
    start_time: T,
    warmup_time: T,
    end_time: T,
    context: Arc<Context>,
}

impl<T: SimTime> Replication<T> {
    /// Create a replication from absolute boundary times.
    ///
    /// Requires `start_time <= warmup_time <= end_time` and a non-empty
    /// id. A fresh root context is attached.
    pub fn new(
        id: impl Into<String>,
        start_time: T,
        warmup_time: T,
        end_time: T,
    ) -> Result<Self, ReplicationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ReplicationError::EmptyId);
        }
        if warmup_time < start_time {
            return Err(ReplicationError::WarmupBeforeStart {
                start: start_time.to_string(),
                warmup: warmup_time.to_string(),
            });
        }
        if end_time < warmup_time {
            return Err(ReplicationError::EndBeforeWarmup {
                warmup: warmup_time.to_string(),
                end: end_time.to_string(),
            });
        }
        Ok(Self {
            id,
            start_time,
            warmup_time,
            end_time,
            context: Context::root(),
        })
    }

    /// Create a replication from a start time and relative durations:
    /// warmup at `start + warmup_delay`, end at `start + run_length`.
    pub fn with_durations(
        id: impl Into<String>,
        start_time: T,
        warmup_delay: T::Delta,
        run_length: T::Delta,
    ) -> Result<Self, ReplicationError> {
        let warmup_time = start_time.checked_add(warmup_delay)?;
        let end_time = start_time.checked_add(run_length)?;
        Self::new(id, start_time, warmup_time, end_time)
    }

    /// The replication id, used for display and logging.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The time the clock starts at.
    pub fn start_time(&self) -> T {
        self.start_time
    }

    /// The instant statistics begin accumulating.
    pub fn warmup_time(&self) -> T {
        self.warmup_time
    }

    /// The instant the replication ends.
    pub fn end_time(&self) -> T {
        self.end_time
    }

    /// The naming context for this replication.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Seconds, Ticks};

    #[test]
    fn valid_boundaries() {
        let r = Replication::new("run-1", Ticks(0), Ticks(10), Ticks(100)).unwrap();
        assert_eq!(r.id(), "run-1");
        assert_eq!(r.start_time(), Ticks(0));
        assert_eq!(r.warmup_time(), Ticks(10));
        assert_eq!(r.end_time(), Ticks(100));
    }

    #[test]
    fn warmup_may_equal_start_and_end() {
        assert!(Replication::new("r", Ticks(5), Ticks(5), Ticks(5)).is_ok());
    }

    #[test]
    fn rejects_bad_ordering() {
        assert_eq!(
            Replication::new("r", Ticks(10), Ticks(5), Ticks(100)),
            Err(ReplicationError::WarmupBeforeStart {
                start: "10".into(),
                warmup: "5".into(),
            })
        );
        assert_eq!(
            Replication::new("r", Ticks(0), Ticks(50), Ticks(20)),
            Err(ReplicationError::EndBeforeWarmup {
                warmup: "50".into(),
                end: "20".into(),
            })
        );
    }

    #[test]
    fn rejects_empty_id() {
        assert_eq!(
            Replication::new("", Ticks(0), Ticks(0), Ticks(1)),
            Err(ReplicationError::EmptyId)
        );
    }

    #[test]
    fn with_durations_resolves_boundaries() {
        let r = Replication::with_durations("r", Seconds::new(100.0), 10.0, 900.0).unwrap();
        assert_eq!(r.warmup_time(), Seconds::new(110.0));
        assert_eq!(r.end_time(), Seconds::new(1000.0));
    }

    #[test]
    fn with_durations_surfaces_overflow() {
        let r = Replication::with_durations("r", Ticks(u64::MAX - 1), 0, 5);
        assert!(matches!(r, Err(ReplicationError::Time(_))));
    }

    #[test]
    fn context_is_shared_across_clones() {
        let r = Replication::new("r", Ticks(0), Ticks(0), Ticks(10)).unwrap();
        let clone = r.clone();
        r.context().bind("marker", Arc::new(1u32)).unwrap();
        assert!(clone.context().lookup("marker").is_some());
    }
}
