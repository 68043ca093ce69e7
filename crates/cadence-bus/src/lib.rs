//! Typed publish/subscribe event bus for the cadence simulation runtime.
//!
//! The bus moves a closed set of typed notifications between the kernel,
//! the statistics observers, and outside collaborators (UIs, exporters).
//! Event types are static descriptors with stable identity; events may
//! carry a simulation timestamp; listeners register per event type with
//! strong or weak reference strength and are notified in registration
//! order. A failing listener never takes the bus down.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod event;
pub mod event_type;
pub mod producer;

pub use event::{Event, Payload};
pub use event_type::{EventType, PayloadSpec};
pub use producer::{EventListener, EventProducer, ListenerError, ListenerRef, Reference};
