//! Unweighted observation statistics.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use cadence_bus::{Event, EventListener, EventProducer, EventType, ListenerError, ListenerRef, Payload, Reference};
use cadence_core::SimTime;
use cadence_engine::{Model, SimulationStatistic, Simulator, SimulatorError, WARMUP_EVENT};

use crate::{wire_statistic, TIMED_INITIALIZED_EVENT, TIMED_OBSERVATION_ADDED_EVENT};

/// Tally: count, sum, sum of squares, min, and max of the values
/// registered since the last initialize.
///
/// Observations may arrive through [`register`](SimTally::register)
/// directly or through the bus via any timed event whose payload has a
/// numeric projection. NaN observations are discarded with a warning.
pub struct SimTally<T: SimTime> {
    description: String,
    simulator: Simulator<T>,
    producer: EventProducer<T>,
    self_ref: Weak<Mutex<Self>>,
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl<T: SimTime> SimTally<T> {
    /// Create a tally, register it in the model's output statistics,
    /// arrange warmup initialization, and bind it in the replication
    /// context under `statistics/`.
    ///
    /// Requires an initialized simulator (a bound replication).
    pub fn new(
        description: impl Into<String>,
        model: &mut dyn Model<T>,
    ) -> Result<Arc<Mutex<Self>>, SimulatorError> {
        let description = description.into();
        let simulator = model.simulator().clone();
        let replication = simulator
            .replication()
            .ok_or(SimulatorError::NotInitialized {
                operation: "SimTally::new",
            })?;

        let tally = Arc::new(Mutex::new(Self {
            description: description.clone(),
            simulator: simulator.clone(),
            producer: EventProducer::new(),
            self_ref: Weak::new(),
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }));
        tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .self_ref = Arc::downgrade(&tally);

        model.output_statistics().add(tally.clone());
        wire_statistic(&tally, &description, &simulator, &replication);
        Ok(tally)
    }

    /// Like [`new`](SimTally::new), but additionally subscribes the
    /// tally to `event_type` on `producer`, so observations arrive via
    /// the bus.
    pub fn with_source(
        description: impl Into<String>,
        model: &mut dyn Model<T>,
        producer: &EventProducer<T>,
        event_type: &'static EventType,
    ) -> Result<Arc<Mutex<Self>>, SimulatorError> {
        let tally = Self::new(description, model)?;
        let listener: ListenerRef<T> = tally.clone();
        producer.add_listener(event_type, &listener, Reference::Strong);
        Ok(tally)
    }

    /// Reset the running statistics and fire
    /// [`TIMED_INITIALIZED_EVENT`].
    pub fn initialize(&mut self) {
        self.count = 0;
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
        self.producer.fire_timed(
            &TIMED_INITIALIZED_EVENT,
            Payload::Text(self.description.clone()),
            self.simulator.sim_time(),
        );
    }

    /// Fold `value` into the statistics, fire
    /// [`TIMED_OBSERVATION_ADDED_EVENT`] stamped with the current
    /// simulation time, and return the value.
    pub fn register(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            tracing::warn!(statistic = %self.description, "ignoring NaN observation");
            return value;
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.producer.fire_timed(
            &TIMED_OBSERVATION_ADDED_EVENT,
            Payload::Scalar(value),
            self.simulator.sim_time(),
        );
        value
    }

    /// The observer's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The simulator this tally stamps its events with.
    pub fn simulator(&self) -> &Simulator<T> {
        &self.simulator
    }

    /// Number of observations since the last initialize.
    pub fn n(&self) -> u64 {
        self.count
    }

    /// Sum of the observed values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Sum of squares of the observed values.
    pub fn sum_of_squares(&self) -> f64 {
        self.sum_sq
    }

    /// Smallest observed value.
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest observed value.
    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Sample mean of the observed values.
    pub fn sample_mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Unbiased sample variance (n − 1 in the denominator).
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as f64;
        Some(((self.sum_sq - self.sum * self.sum / n) / (n - 1.0)).max(0.0))
    }

    /// Sample standard deviation.
    pub fn sample_std_dev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }

    /// Subscribe a listener to this tally's events
    /// ([`TIMED_OBSERVATION_ADDED_EVENT`], [`TIMED_INITIALIZED_EVENT`]).
    pub fn add_listener(
        &self,
        event_type: &'static EventType,
        listener: &ListenerRef<T>,
        reference: Reference,
    ) -> bool {
        self.producer.add_listener(event_type, listener, reference)
    }

    /// Unsubscribe a listener from this tally's events.
    pub fn remove_listener(&self, event_type: &EventType, listener: &ListenerRef<T>) -> bool {
        self.producer.remove_listener(event_type, listener)
    }

    fn unsubscribe_warmup(&mut self) {
        if let Some(me) = self.self_ref.upgrade() {
            let listener: ListenerRef<T> = me;
            self.simulator
                .bus()
                .remove_listener(&WARMUP_EVENT, &listener);
        }
    }
}

impl<T: SimTime> SimulationStatistic<T> for SimTally<T> {
    fn description(&self) -> &str {
        &self.description
    }

    fn initialize(&mut self) {
        SimTally::initialize(self);
    }

    fn n(&self) -> u64 {
        self.count
    }
}

impl<T: SimTime> EventListener<T> for SimTally<T> {
    fn notify(&mut self, event: &Event<T>) -> Result<(), ListenerError> {
        if event.matches(&WARMUP_EVENT) {
            self.unsubscribe_warmup();
            self.initialize();
            return Ok(());
        }
        if event.is_timed() {
            match event.payload().as_f64() {
                Some(value) => {
                    self.register(value);
                }
                None => {
                    tracing::warn!(
                        statistic = %self.description,
                        event = %event,
                        "timed event carries no numeric payload"
                    );
                }
            }
            Ok(())
        } else {
            tracing::warn!(statistic = %self.description, event = %event, "event not a TimedEvent");
            Ok(())
        }
    }
}
