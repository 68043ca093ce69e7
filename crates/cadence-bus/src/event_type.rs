//! Static event-type descriptors.
//!
//! The set of event types on a bus is closed and known at compile time:
//! each type is a `pub static` [`EventType`] in the module that owns it
//! (the kernel's lifecycle events in the engine crate, the observation
//! events in the statistics crate). Descriptors carry a name, a
//! human-readable description, and the payload shape listeners should
//! expect. Identity is the descriptor's address; name equality is the
//! fallback so re-exported statics still compare equal.

use std::fmt;

/// The payload shape an event type carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadSpec {
    /// No payload.
    Empty,
    /// A single `f64` observation value.
    Scalar,
    /// A single `i64` count.
    Count,
    /// A text payload (names, descriptions).
    Text,
}

/// Descriptor of one event type: stable identity plus metadata.
pub struct EventType {
    name: &'static str,
    description: &'static str,
    payload: PayloadSpec,
}

impl EventType {
    /// Define an event type. Intended for `pub static` tables.
    pub const fn new(
        name: &'static str,
        description: &'static str,
        payload: PayloadSpec,
    ) -> Self {
        Self {
            name,
            description,
            payload,
        }
    }

    /// Stable identifying name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// The payload shape listeners should expect.
    pub fn payload_spec(&self) -> PayloadSpec {
        self.payload
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }
}

impl Eq for EventType {}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("name", &self.name)
            .field("payload", &self.payload)
            .finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ALPHA: EventType = EventType::new("ALPHA_EVENT", "first test event", PayloadSpec::Empty);
    static BETA: EventType = EventType::new("BETA_EVENT", "second test event", PayloadSpec::Scalar);
    static ALPHA_TWIN: EventType =
        EventType::new("ALPHA_EVENT", "same name elsewhere", PayloadSpec::Empty);

    #[test]
    fn identity_equality() {
        assert_eq!(&ALPHA, &ALPHA);
        assert_ne!(&ALPHA, &BETA);
    }

    #[test]
    fn name_equality_fallback() {
        assert_eq!(&ALPHA, &ALPHA_TWIN);
    }

    #[test]
    fn accessors() {
        assert_eq!(BETA.name(), "BETA_EVENT");
        assert_eq!(BETA.description(), "second test event");
        assert_eq!(BETA.payload_spec(), PayloadSpec::Scalar);
        assert_eq!(BETA.to_string(), "BETA_EVENT");
    }
}
