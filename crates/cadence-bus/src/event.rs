//! Bus events: a type descriptor, a payload, and an optional timestamp.

use std::fmt;

use cadence_core::SimTime;

use crate::event_type::{EventType, PayloadSpec};

/// Payload carried by a bus event.
///
/// The set is closed: observers project numeric values out of `Scalar`
/// and `Count`; `Text` carries names and descriptions.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// No payload.
    Empty,
    /// A single observation value.
    Scalar(f64),
    /// A single count.
    Count(i64),
    /// A text payload.
    Text(String),
}

impl Payload {
    /// Numeric projection used by statistics observers. `Count` widens
    /// to `f64`; `Empty` and `Text` have no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Count(c) => Some(*c as f64),
            Self::Empty | Self::Text(_) => None,
        }
    }

    /// Integer projection for counter observers. `Scalar` values are
    /// accepted only when they are already integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Count(c) => Some(*c),
            Self::Scalar(v) if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 => Some(*v as i64),
            _ => None,
        }
    }

    /// The shape of this payload.
    pub fn spec(&self) -> PayloadSpec {
        match self {
            Self::Empty => PayloadSpec::Empty,
            Self::Scalar(_) => PayloadSpec::Scalar,
            Self::Count(_) => PayloadSpec::Count,
            Self::Text(_) => PayloadSpec::Text,
        }
    }
}

/// A notification on the bus.
///
/// Timed events additionally carry the simulation time at which they
/// were fired; the timestamp type is the simulation's time type, so a
/// timed event's stamp is numeric by construction.
#[derive(Clone, Debug)]
pub struct Event<T: SimTime> {
    event_type: &'static EventType,
    payload: Payload,
    timestamp: Option<T>,
}

impl<T: SimTime> Event<T> {
    /// An untimed event.
    pub fn new(event_type: &'static EventType, payload: Payload) -> Self {
        Self {
            event_type,
            payload,
            timestamp: None,
        }
    }

    /// A timed event stamped with simulation time.
    pub fn timed(event_type: &'static EventType, payload: Payload, timestamp: T) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Some(timestamp),
        }
    }

    /// The type descriptor of this event.
    pub fn event_type(&self) -> &'static EventType {
        self.event_type
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The simulation time stamp, when this is a timed event.
    pub fn timestamp(&self) -> Option<T> {
        self.timestamp
    }

    /// True when this event carries a timestamp.
    pub fn is_timed(&self) -> bool {
        self.timestamp.is_some()
    }

    /// True when this event is of the given type.
    pub fn matches(&self, event_type: &EventType) -> bool {
        self.event_type == event_type
    }
}

impl<T: SimTime> fmt::Display for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp {
            Some(t) => write!(f, "{}@{}", self.event_type.name(), t),
            None => write!(f, "{}", self.event_type.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Ticks;

    static PROBE: EventType = EventType::new("PROBE_EVENT", "test event", PayloadSpec::Scalar);

    #[test]
    fn numeric_projection() {
        assert_eq!(Payload::Scalar(2.5).as_f64(), Some(2.5));
        assert_eq!(Payload::Count(-3).as_f64(), Some(-3.0));
        assert_eq!(Payload::Empty.as_f64(), None);
        assert_eq!(Payload::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn integer_projection() {
        assert_eq!(Payload::Count(7).as_i64(), Some(7));
        assert_eq!(Payload::Scalar(4.0).as_i64(), Some(4));
        assert_eq!(Payload::Scalar(4.5).as_i64(), None);
        assert_eq!(Payload::Text("x".into()).as_i64(), None);
    }

    #[test]
    fn timed_and_untimed() {
        let untimed = Event::<Ticks>::new(&PROBE, Payload::Empty);
        assert!(!untimed.is_timed());
        assert_eq!(untimed.timestamp(), None);

        let timed = Event::timed(&PROBE, Payload::Scalar(1.0), Ticks(9));
        assert!(timed.is_timed());
        assert_eq!(timed.timestamp(), Some(Ticks(9)));
        assert!(timed.matches(&PROBE));
    }

    #[test]
    fn display() {
        let timed = Event::timed(&PROBE, Payload::Empty, Ticks(4));
        assert_eq!(timed.to_string(), "PROBE_EVENT@4");
        let untimed = Event::<Ticks>::new(&PROBE, Payload::Empty);
        assert_eq!(untimed.to_string(), "PROBE_EVENT");
    }
}
