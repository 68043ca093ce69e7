//! The model contract consumed by the kernel.
//!
//! A model owns the simulation logic and its output statistics. The
//! kernel calls [`Model::construct_model`] exactly once, at
//! `initialize`; everything else the model does happens inside the
//! event actions it schedules through its [`Simulator`] handle.

use std::sync::{Arc, Mutex, PoisonError};

use cadence_core::{EventError, SimTime};

use crate::simulator::Simulator;

/// A statistics observer registered in a model's output collection.
///
/// Implemented by the observers in the statistics crate; the kernel and
/// model only need descriptions, reinitialization, and observation
/// counts.
pub trait SimulationStatistic<T: SimTime>: Send {
    /// The observer's description — its binding name in the context.
    fn description(&self) -> &str;

    /// Reset the running statistics to their pristine state.
    fn initialize(&mut self);

    /// Number of observations folded in since the last initialize.
    fn n(&self) -> u64;
}

/// Shared handle to a registered statistics observer.
pub type StatisticRef<T> = Arc<Mutex<dyn SimulationStatistic<T>>>;

/// Shared handle to a model.
pub type ModelRef<T> = Arc<Mutex<dyn Model<T>>>;

/// The model-owned collection of statistics observers, in registration
/// order.
pub struct OutputStatistics<T: SimTime> {
    entries: Vec<StatisticRef<T>>,
}

impl<T: SimTime> OutputStatistics<T> {
    /// An empty collection.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register an observer.
    pub fn add(&mut self, statistic: StatisticRef<T>) {
        self.entries.push(statistic);
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the registered observers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &StatisticRef<T>> {
        self.entries.iter()
    }

    /// Find an observer by its description.
    pub fn find(&self, description: &str) -> Option<StatisticRef<T>> {
        self.entries
            .iter()
            .find(|s| {
                s.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .description()
                    == description
            })
            .cloned()
    }
}

impl<T: SimTime> Default for OutputStatistics<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The simulation model: logic plus output statistics.
pub trait Model<T: SimTime>: Send {
    /// Build the model: create observers and schedule the initial
    /// events. Called once by [`Simulator::initialize`]; the simulator
    /// is initialized and the replication bound when this runs.
    fn construct_model(&mut self) -> Result<(), EventError>;

    /// The simulator this model schedules on.
    fn simulator(&self) -> &Simulator<T>;

    /// The model's output-statistics collection.
    fn output_statistics(&mut self) -> &mut OutputStatistics<T>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Ticks;

    struct Stub {
        description: String,
        n: u64,
    }

    impl SimulationStatistic<Ticks> for Stub {
        fn description(&self) -> &str {
            &self.description
        }
        fn initialize(&mut self) {
            self.n = 0;
        }
        fn n(&self) -> u64 {
            self.n
        }
    }

    fn stub(description: &str, n: u64) -> StatisticRef<Ticks> {
        Arc::new(Mutex::new(Stub {
            description: description.into(),
            n,
        }))
    }

    #[test]
    fn add_and_find() {
        let mut stats = OutputStatistics::new();
        stats.add(stub("waiting time", 3));
        stats.add(stub("queue length", 5));

        assert_eq!(stats.len(), 2);
        let found = stats.find("queue length").unwrap();
        assert_eq!(found.lock().unwrap().n(), 5);
        assert!(stats.find("missing").is_none());
    }

    #[test]
    fn iteration_keeps_registration_order() {
        let mut stats = OutputStatistics::new();
        stats.add(stub("a", 0));
        stats.add(stub("b", 0));
        let names: Vec<String> = stats
            .iter()
            .map(|s| s.lock().unwrap().description().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
