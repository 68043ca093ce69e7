//! Integer count statistics.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use cadence_bus::{
    Event, EventListener, EventProducer, EventType, ListenerError, ListenerRef, Payload, Reference,
};
use cadence_core::SimTime;
use cadence_engine::{Model, SimulationStatistic, Simulator, SimulatorError, WARMUP_EVENT};

use crate::{wire_statistic, TIMED_INITIALIZED_EVENT, TIMED_OBSERVATION_ADDED_EVENT};

/// Counter: a running integer total of registered counts.
///
/// Typical uses: customers served, messages dropped, retries. Counts
/// arriving via the bus use the payload's integer projection; timed
/// events without one are dropped with a warning.
pub struct SimCounter<T: SimTime> {
    description: String,
    simulator: Simulator<T>,
    producer: EventProducer<T>,
    self_ref: Weak<Mutex<Self>>,
    n: u64,
    count: i64,
}

impl<T: SimTime> SimCounter<T> {
    /// Create a counter with the standard observer wiring (output
    /// statistics, warmup initialization, context binding).
    pub fn new(
        description: impl Into<String>,
        model: &mut dyn Model<T>,
    ) -> Result<Arc<Mutex<Self>>, SimulatorError> {
        let description = description.into();
        let simulator = model.simulator().clone();
        let replication = simulator
            .replication()
            .ok_or(SimulatorError::NotInitialized {
                operation: "SimCounter::new",
            })?;

        let counter = Arc::new(Mutex::new(Self {
            description: description.clone(),
            simulator: simulator.clone(),
            producer: EventProducer::new(),
            self_ref: Weak::new(),
            n: 0,
            count: 0,
        }));
        counter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .self_ref = Arc::downgrade(&counter);

        model.output_statistics().add(counter.clone());
        wire_statistic(&counter, &description, &simulator, &replication);
        Ok(counter)
    }

    /// Like [`new`](SimCounter::new), but additionally subscribes the
    /// counter to `event_type` on `producer`.
    pub fn with_source(
        description: impl Into<String>,
        model: &mut dyn Model<T>,
        producer: &EventProducer<T>,
        event_type: &'static EventType,
    ) -> Result<Arc<Mutex<Self>>, SimulatorError> {
        let counter = Self::new(description, model)?;
        let listener: ListenerRef<T> = counter.clone();
        producer.add_listener(event_type, &listener, Reference::Strong);
        Ok(counter)
    }

    /// Reset the count and fire [`TIMED_INITIALIZED_EVENT`].
    pub fn initialize(&mut self) {
        self.n = 0;
        self.count = 0;
        self.producer.fire_timed(
            &TIMED_INITIALIZED_EVENT,
            Payload::Text(self.description.clone()),
            self.simulator.sim_time(),
        );
    }

    /// Add `value` to the running count, fire
    /// [`TIMED_OBSERVATION_ADDED_EVENT`], and return the value.
    pub fn register(&mut self, value: i64) -> i64 {
        self.n += 1;
        self.count = self.count.saturating_add(value);
        self.producer.fire_timed(
            &TIMED_OBSERVATION_ADDED_EVENT,
            Payload::Count(value),
            self.simulator.sim_time(),
        );
        value
    }

    /// The observer's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The simulator this counter stamps its events with.
    pub fn simulator(&self) -> &Simulator<T> {
        &self.simulator
    }

    /// Number of registrations since the last initialize.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// The running total.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Subscribe a listener to this counter's events.
    pub fn add_listener(
        &self,
        event_type: &'static EventType,
        listener: &ListenerRef<T>,
        reference: Reference,
    ) -> bool {
        self.producer.add_listener(event_type, listener, reference)
    }

    /// Unsubscribe a listener from this counter's events.
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

impl<T: SimTime> SimulationStatistic<T> for SimCounter<T> {
    fn description(&self) -> &str {
        &self.description
    }

    fn initialize(&mut self) {
        SimCounter::initialize(self);
    }

    fn n(&self) -> u64 {
        self.n
    }
}

impl<T: SimTime> EventListener<T> for SimCounter<T> {
    fn notify(&mut self, event: &Event<T>) -> Result<(), ListenerError> {
        if event.matches(&WARMUP_EVENT) {
            self.unsubscribe_warmup();
            self.initialize();
            return Ok(());
        }
        if event.is_timed() {
            match event.payload().as_i64() {
                Some(value) => {
                    self.register(value);
                }
                None => {
                    tracing::warn!(
                        statistic = %self.description,
                        event = %event,
                        "timed event carries no integer payload"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use cadence_core::Seconds;

    #[test]
    fn accumulates_counts() {
        let (_simulator, model) = harness(0.0, 0.0, 100.0);
        let counter = SimCounter::new("served", &mut *model.lock().unwrap()).unwrap();
        let mut c = counter.lock().unwrap();
        c.register(1);
        c.register(3);
        c.register(-1);
        assert_eq!(c.n(), 3);
        assert_eq!(c.count(), 3);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let (_simulator, model) = harness(0.0, 0.0, 100.0);
        let counter = SimCounter::new("sat", &mut *model.lock().unwrap()).unwrap();
        let mut c = counter.lock().unwrap();
        c.register(i64::MAX);
        c.register(1);
        assert_eq!(c.count(), i64::MAX);
    }

    #[test]
    fn initialize_resets() {
        let (_simulator, model) = harness(0.0, 0.0, 100.0);
        let counter = SimCounter::new("reset", &mut *model.lock().unwrap()).unwrap();
        let mut c = counter.lock().unwrap();
        c.register(5);
        c.initialize();
        assert_eq!(c.n(), 0);
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn counts_arrive_via_bus_source() {
        static ARRIVED: EventType = EventType::new(
            "ARRIVED_EVENT",
            "test arrival event",
            cadence_bus::PayloadSpec::Count,
        );
        let (simulator, model) = harness(0.0, 0.0, 100.0);
        let source = EventProducer::new();
        let counter =
            SimCounter::with_source("arrivals", &mut *model.lock().unwrap(), &source, &ARRIVED)
                .unwrap();

        source.fire_timed(&ARRIVED, Payload::Count(2), simulator.sim_time());
        source.fire_timed(&ARRIVED, Payload::Scalar(3.0), simulator.sim_time());
        // No integer projection: dropped with a warning.
        source.fire_timed(&ARRIVED, Payload::Scalar(0.5), simulator.sim_time());

        let c = counter.lock().unwrap();
        assert_eq!(c.n(), 2);
        assert_eq!(c.count(), 5);
    }

    #[test]
    fn warmup_resets_count() {
        let (simulator, model) = harness(0.0, 10.0, 100.0);
        let counter = SimCounter::new("warm", &mut *model.lock().unwrap()).unwrap();
        counter.lock().unwrap().register(7);

        simulator.run_until(Seconds::new(10.0), true).unwrap();
        assert_eq!(counter.lock().unwrap().count(), 0);
    }
}
