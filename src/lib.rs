#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

/// The command line interface.
pub mod cli;

/// Talks to a single hub.
pub mod client;

/// Relates to config files.
pub mod config;

/// Runs the lifecycle of a hub: configuring, connecting, polling and faulting.
pub mod controller;

/// Possible errors in this library.
pub mod error;

/// Events a controller emits.
pub mod events;

/// Logging/tracing setup.
pub mod logging;

/// A simulated hub, for tests and for running without hardware.
pub mod mock;

/// The hub's request/reply line protocol.
pub mod protocol;

/// Serial port driver.
pub mod serial;

/// Periodic polling of a hub.
pub mod telemetry;

/// The byte stream a hub client talks over.
pub mod transport;

pub use error::Error;
