use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{config::HubConfig, controller::State, protocol::Readings};

/// Describes the hub once it is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// The kind of hub.
    pub hub_type: String,

    /// Where the hub is installed.
    pub location: String,

    /// The device names of all eight slots, comma separated.
    /// Unconfigured slots are empty fields.
    pub names: String,

    /// The units positions are reported in.
    pub units: String,
}

impl From<&HubConfig> for Metadata {
    fn from(config: &HubConfig) -> Self {
        Self {
            hub_type: config.hub_type.clone(),
            location: config.location.clone(),
            names: config.slot_names().iter().join(","),
            units: config.units.clone(),
        }
    }
}

/// Something a hub controller publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// The lifecycle state changed.
    SummaryState(State),

    /// The hub was (re)configured.
    Metadata(Metadata),

    /// The position of each slot, from a single poll.
    Position(Readings),

    /// Something went wrong and the controller is now in [`State::Fault`].
    Fault {
        /// What kind of problem.
        code: i32,

        /// Human readable details.
        report: String,
    },
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::SummaryState(state) => write!(f, "summary state: {state}"),
            Event::Metadata(metadata) => write!(
                f,
                "metadata: {} at {} [{}] in {}",
                metadata.hub_type, metadata.location, metadata.names, metadata.units
            ),
            Event::Position(readings) => write!(f, "position: {readings:?}"),
            Event::Fault { code, report } => write!(f, "fault {code}: {report}"),
        }
    }
}

/// An event and when it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedEvent {
    /// The event.
    pub inner: Event,

    /// When the event happened.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TimestampedEvent {
    /// Timestamp an event as happening now.
    pub fn now(event: Event) -> Self {
        Self {
            inner: event,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Display for TimestampedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}
