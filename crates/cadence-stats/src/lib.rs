//! Statistics observers for the cadence simulation runtime.
//!
//! Observers subscribe to timed bus events and fold observations into
//! running summaries: [`SimTally`] aggregates unweighted values,
//! [`SimCounter`] integer counts, and [`SimPersistent`] time-weighted
//! values. All three share the same wiring: they register themselves in
//! the model's output-statistics collection, start accumulating at the
//! warmup instant (or immediately when constructed after it), and bind
//! themselves under the replication context's `statistics/` sub-context
//! by description. Each observer publishes its own timed events so UIs
//! and exporters can follow along.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};

use cadence_bus::{EventListener, EventType, ListenerRef, PayloadSpec, Reference};
use cadence_core::{ContextObject, SimTime};
use cadence_engine::{Replication, SimulationStatistic, Simulator, WARMUP_EVENT};

pub mod counter;
pub mod persistent;
pub mod tally;

pub use counter::SimCounter;
pub use persistent::SimPersistent;
pub use tally::SimTally;

/// Timed event fired by an observer whenever an observation is folded
/// in. The payload is the observed value (`Scalar` for tally and
/// persistent, `Count` for counter).
pub static TIMED_OBSERVATION_ADDED_EVENT: EventType = EventType::new(
    "TIMED_OBSERVATION_ADDED_EVENT",
    "observation added to statistic",
    PayloadSpec::Scalar,
);

/// Timed event fired when an observer is (re-)initialized. The payload
/// is the observer's description.
pub static TIMED_INITIALIZED_EVENT: EventType = EventType::new(
    "TIMED_INITIALIZED_EVENT",
    "statistic initialized",
    PayloadSpec::Text,
);

/// Shared construction wiring: initialize now when past warmup,
/// otherwise subscribe to the warmup event; then bind the observer in
/// the replication context. Binding failures are logged, never fatal.
fn wire_statistic<T, S>(
    statistic: &Arc<Mutex<S>>,
    description: &str,
    simulator: &Simulator<T>,
    replication: &Replication<T>,
) where
    T: SimTime,
    S: SimulationStatistic<T> + EventListener<T> + 'static,
{
    if simulator.sim_time() > replication.warmup_time() {
        statistic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .initialize();
    } else {
        let listener: ListenerRef<T> = statistic.clone();
        simulator
            .bus()
            .add_listener(&WARMUP_EVENT, &listener, Reference::Strong);
    }

    let object: ContextObject = statistic.clone();
    let bound = replication
        .context()
        .lookup_or_create_sub_context("statistics")
        .and_then(|ctx| ctx.bind(description, object));
    if let Err(error) = bound {
        tracing::warn!(statistic = %description, %error, "context binding failed");
    }
}
