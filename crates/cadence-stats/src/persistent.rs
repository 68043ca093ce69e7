//! Time-weighted observation statistics.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use cadence_bus::{
    Event, EventListener, EventProducer, EventType, ListenerError, ListenerRef, Payload, Reference,
};
use cadence_core::SimTime;
use cadence_engine::{
    Model, SimulationStatistic, Simulator, SimulatorError, END_REPLICATION_EVENT, WARMUP_EVENT,
};

use crate::{wire_statistic, TIMED_INITIALIZED_EVENT, TIMED_OBSERVATION_ADDED_EVENT};

/// Persistent: time-weighted statistics over a piecewise-constant
/// value, such as a queue length or a resource utilization.
///
/// Each registration closes the interval since the previous observation
/// at the previous value, weighted by the simulation-time delta. The
/// final interval is closed by [`end_observations`] — invoked
/// automatically when the replication ends, since the observer
/// subscribes to the end-replication event at construction.
pub struct SimPersistent<T: SimTime> {
    description: String,
    simulator: Simulator<T>,
    producer: EventProducer<T>,
    self_ref: Weak<Mutex<Self>>,
    n: u64,
    first_time: Option<f64>,
    last_time: f64,
    last_value: f64,
    weighted_sum: f64,
    weighted_sum_sq: f64,
    min: f64,
    max: f64,
}

impl<T: SimTime> SimPersistent<T> {
    /// Create a persistent with the standard observer wiring, plus a
    /// subscription to the end-replication event for closing the final
    /// interval.
    pub fn new(
        description: impl Into<String>,
        model: &mut dyn Model<T>,
    ) -> Result<Arc<Mutex<Self>>, SimulatorError> {
        let description = description.into();
        let simulator = model.simulator().clone();
        let replication = simulator
            .replication()
            .ok_or(SimulatorError::NotInitialized {
                operation: "SimPersistent::new",
            })?;

        let persistent = Arc::new(Mutex::new(Self {
            description: description.clone(),
            simulator: simulator.clone(),
            producer: EventProducer::new(),
            self_ref: Weak::new(),
            n: 0,
            first_time: None,
            last_time: 0.0,
            last_value: 0.0,
            weighted_sum: 0.0,
            weighted_sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }));
        persistent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .self_ref = Arc::downgrade(&persistent);

        model.output_statistics().add(persistent.clone());
        wire_statistic(&persistent, &description, &simulator, &replication);

        let listener: ListenerRef<T> = persistent.clone();
        simulator
            .bus()
            .add_listener(&END_REPLICATION_EVENT, &listener, Reference::Strong);
        Ok(persistent)
    }

    /// Like [`new`](SimPersistent::new), but additionally subscribes
    /// the persistent to `event_type` on `producer`.
    pub fn with_source(
        description: impl Into<String>,
        model: &mut dyn Model<T>,
        producer: &EventProducer<T>,
        event_type: &'static EventType,
    ) -> Result<Arc<Mutex<Self>>, SimulatorError> {
        let persistent = Self::new(description, model)?;
        let listener: ListenerRef<T> = persistent.clone();
        producer.add_listener(event_type, &listener, Reference::Strong);
        Ok(persistent)
    }

    /// Reset the running statistics and fire
    /// [`TIMED_INITIALIZED_EVENT`].
    pub fn initialize(&mut self) {
        self.n = 0;
        self.first_time = None;
        self.last_time = 0.0;
        self.last_value = 0.0;
        self.weighted_sum = 0.0;
        self.weighted_sum_sq = 0.0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
        self.producer.fire_timed(
            &TIMED_INITIALIZED_EVENT,
            Payload::Text(self.description.clone()),
            self.simulator.sim_time(),
        );
    }

    /// Record that the observed value changed to `value` at the current
    /// simulation time; the interval since the previous observation is
    /// weighted at the previous value. Fires
    /// [`TIMED_OBSERVATION_ADDED_EVENT`] and returns the value.
    pub fn register(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            tracing::warn!(statistic = %self.description, "ignoring NaN observation");
            return value;
        }
        let now = self.simulator.sim_time().as_f64();
        self.accumulate_to(now);
        if self.first_time.is_none() {
            self.first_time = Some(now);
        }
        self.last_time = now;
        self.last_value = value;
        self.n += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.producer.fire_timed(
            &TIMED_OBSERVATION_ADDED_EVENT,
            Payload::Scalar(value),
            self.simulator.sim_time(),
        );
        value
    }

    /// Close the final interval at the current simulation time.
    /// Idempotent: a second call at the same instant adds zero weight.
    pub fn end_observations(&mut self) {
        let now = self.simulator.sim_time().as_f64();
        self.accumulate_to(now);
        if self.n > 0 {
            self.last_time = now;
        }
    }

    fn accumulate_to(&mut self, now: f64) {
        if self.n == 0 {
            return;
        }
        let dt = now - self.last_time;
        if dt > 0.0 {
            self.weighted_sum += dt * self.last_value;
            self.weighted_sum_sq += dt * self.last_value * self.last_value;
        }
    }

    /// The observer's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The simulator this persistent stamps its events with.
    pub fn simulator(&self) -> &Simulator<T> {
        &self.simulator
    }

    /// Number of observations since the last initialize.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Smallest observed value.
    pub fn min(&self) -> Option<f64> {
        (self.n > 0).then_some(self.min)
    }

    /// Largest observed value.
    pub fn max(&self) -> Option<f64> {
        (self.n > 0).then_some(self.max)
    }

    /// The observation timeline span covered so far.
    pub fn elapsed(&self) -> f64 {
        match self.first_time {
            Some(first) => self.last_time - first,
            None => 0.0,
        }
    }

    /// Time-weighted mean over the closed intervals.
    pub fn weighted_mean(&self) -> Option<f64> {
        let elapsed = self.elapsed();
        (elapsed > 0.0).then(|| self.weighted_sum / elapsed)
    }

    /// Time-weighted population variance over the closed intervals.
    pub fn weighted_variance(&self) -> Option<f64> {
        let elapsed = self.elapsed();
        if elapsed <= 0.0 {
            return None;
        }
        let mean = self.weighted_sum / elapsed;
        Some((self.weighted_sum_sq / elapsed - mean * mean).max(0.0))
    }

    /// Subscribe a listener to this persistent's events.
    pub fn add_listener(
        &self,
        event_type: &'static EventType,
        listener: &ListenerRef<T>,
        reference: Reference,
    ) -> bool {
        self.producer.add_listener(event_type, listener, reference)
    }

    /// Unsubscribe a listener from this persistent's events.
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

impl<T: SimTime> SimulationStatistic<T> for SimPersistent<T> {
    fn description(&self) -> &str {
        &self.description
    }

    fn initialize(&mut self) {
        SimPersistent::initialize(self);
    }

    fn n(&self) -> u64 {
        self.n
    }
}

impl<T: SimTime> EventListener<T> for SimPersistent<T> {
    fn notify(&mut self, event: &Event<T>) -> Result<(), ListenerError> {
        if event.matches(&WARMUP_EVENT) {
            self.unsubscribe_warmup();
            self.initialize();
            return Ok(());
        }
        if event.matches(&END_REPLICATION_EVENT) {
            self.end_observations();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use cadence_core::Seconds;

    /// Register `value` through `persistent` inside an event at `time`.
    fn register_at(
        simulator: &Simulator<Seconds>,
        persistent: &Arc<Mutex<SimPersistent<Seconds>>>,
        time: f64,
        value: f64,
    ) {
        let p = Arc::clone(persistent);
        simulator
            .schedule_abs(Seconds::new(time), move || {
                p.lock().unwrap().register(value);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn weighted_mean_over_a_full_replication() {
        let (simulator, model) = harness(0.0, 0.0, 10.0);
        let persistent = SimPersistent::new("queue length", &mut *model.lock().unwrap()).unwrap();

        // Value 10 on [0, 4), 20 on [4, 10): mean = (40 + 120) / 10 = 16.
        register_at(&simulator, &persistent, 0.0, 10.0);
        register_at(&simulator, &persistent, 4.0, 20.0);
        simulator.start().unwrap();

        let p = persistent.lock().unwrap();
        assert_eq!(p.n(), 2);
        assert_eq!(p.elapsed(), 10.0);
        assert_eq!(p.weighted_mean(), Some(16.0));
        assert_eq!(p.min(), Some(10.0));
        assert_eq!(p.max(), Some(20.0));
    }

    #[test]
    fn weighted_variance_of_constant_value_is_zero() {
        let (simulator, model) = harness(0.0, 0.0, 8.0);
        let persistent = SimPersistent::new("flat", &mut *model.lock().unwrap()).unwrap();
        register_at(&simulator, &persistent, 0.0, 3.0);
        register_at(&simulator, &persistent, 5.0, 3.0);
        simulator.start().unwrap();

        let p = persistent.lock().unwrap();
        assert_eq!(p.weighted_mean(), Some(3.0));
        assert_eq!(p.weighted_variance(), Some(0.0));
    }

    #[test]
    fn no_observations_means_no_mean() {
        let (simulator, model) = harness(0.0, 0.0, 5.0);
        let persistent = SimPersistent::new("empty", &mut *model.lock().unwrap()).unwrap();
        simulator.start().unwrap();

        let p = persistent.lock().unwrap();
        assert_eq!(p.n(), 0);
        assert_eq!(p.weighted_mean(), None);
        assert_eq!(p.weighted_variance(), None);
    }

    #[test]
    fn end_observations_is_idempotent() {
        let (simulator, model) = harness(0.0, 0.0, 10.0);
        let persistent = SimPersistent::new("idem", &mut *model.lock().unwrap()).unwrap();
        register_at(&simulator, &persistent, 0.0, 5.0);
        simulator.start().unwrap();

        let mut p = persistent.lock().unwrap();
        let mean = p.weighted_mean();
        p.end_observations();
        assert_eq!(p.weighted_mean(), mean);
    }

    #[test]
    fn warmup_discards_pre_warmup_intervals() {
        let (simulator, model) = harness(0.0, 10.0, 30.0);
        let persistent = SimPersistent::new("warm", &mut *model.lock().unwrap()).unwrap();

        // Pre-warmup value would skew the mean if kept.
        register_at(&simulator, &persistent, 0.0, 1000.0);
        register_at(&simulator, &persistent, 10.0, 2.0);
        simulator.start().unwrap();

        let p = persistent.lock().unwrap();
        // Only the post-warmup observation at t=10 counts: value 2 on
        // [10, 30].
        assert_eq!(p.n(), 1);
        assert_eq!(p.weighted_mean(), Some(2.0));
    }

    #[test]
    fn interval_closes_at_replication_end() {
        let (simulator, model) = harness(0.0, 0.0, 20.0);
        let persistent = SimPersistent::new("tail", &mut *model.lock().unwrap()).unwrap();
        register_at(&simulator, &persistent, 0.0, 4.0);
        simulator.start().unwrap();

        let p = persistent.lock().unwrap();
        // Value 4 held over the whole [0, 20] replication.
        assert_eq!(p.elapsed(), 20.0);
        assert_eq!(p.weighted_mean(), Some(4.0));
    }
}
