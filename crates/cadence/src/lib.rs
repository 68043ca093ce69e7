//! Cadence: a discrete-event simulation runtime.
//!
//! This is the top-level facade crate that re-exports the public API
//! from the cadence sub-crates. For most users, adding `cadence` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use cadence::prelude::*;
//!
//! // A model that schedules one event and counts its firing.
//! struct PingModel {
//!     simulator: Simulator<Seconds>,
//!     statistics: OutputStatistics<Seconds>,
//!     fired: Arc<Mutex<u32>>,
//! }
//!
//! impl Model<Seconds> for PingModel {
//!     fn construct_model(&mut self) -> Result<(), EventError> {
//!         let fired = Arc::clone(&self.fired);
//!         self.simulator
//!             .schedule_rel(5.0, move || {
//!                 *fired.lock().unwrap() += 1;
//!                 Ok(())
//!             })
//!             .map_err(|e| EventError::failed(e.to_string()))?;
//!         Ok(())
//!     }
//!     fn simulator(&self) -> &Simulator<Seconds> {
//!         &self.simulator
//!     }
//!     fn output_statistics(&mut self) -> &mut OutputStatistics<Seconds> {
//!         &mut self.statistics
//!     }
//! }
//!
//! let simulator = Simulator::new("quickstart");
//! let fired = Arc::new(Mutex::new(0));
//! let model = Arc::new(Mutex::new(PingModel {
//!     simulator: simulator.clone(),
//!     statistics: OutputStatistics::new(),
//!     fired: Arc::clone(&fired),
//! }));
//! let replication =
//!     Replication::new("rep-1", Seconds::ZERO, Seconds::ZERO, Seconds::new(10.0)).unwrap();
//!
//! simulator.initialize(model, replication).unwrap();
//! simulator.start().unwrap();
//!
//! assert_eq!(*fired.lock().unwrap(), 1);
//! assert_eq!(simulator.run_state(), RunState::Ended);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`core`] | `cadence-core` | Logical time, scheduled events, the event list, the naming context |
//! | [`bus`] | `cadence-bus` | Event types, payloads, producers, listener registration |
//! | [`engine`] | `cadence-engine` | The simulator kernel, replications, the model contract |
//! | [`stats`] | `cadence-stats` | Tally, counter, and persistent statistics observers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Logical time, scheduled events, the event list, and the naming
/// context (`cadence-core`).
pub use cadence_core as core;

/// The typed publish/subscribe event bus (`cadence-bus`).
pub use cadence_bus as bus;

/// The simulator kernel, replications, and the model contract
/// (`cadence-engine`).
pub use cadence_engine as engine;

/// Statistics observers (`cadence-stats`).
pub use cadence_stats as stats;

/// Common imports for typical cadence usage.
///
/// ```rust
/// use cadence::prelude::*;
/// ```
pub mod prelude {
    // Time and events
    pub use cadence_core::{
        EventError, EventHandle, EventState, Seconds, SimTime, Ticks, MAX_PRIORITY, MIN_PRIORITY,
        NORMAL_PRIORITY,
    };

    // Bus
    pub use cadence_bus::{
        Event, EventListener, EventProducer, EventType, ListenerError, ListenerRef, Payload,
        Reference,
    };

    // Kernel
    pub use cadence_engine::{
        ErrorStrategy, Model, ModelRef, OutputStatistics, Replication, RunState,
        SimulationStatistic, Simulator, SimulatorError,
    };

    // Statistics observers
    pub use cadence_stats::{SimCounter, SimPersistent, SimTally};
}
