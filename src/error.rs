use std::io;

use thiserror::Error;

/// Errors that may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A protocol exchange was attempted before connecting.
    #[error("Not connected")]
    NotConnected,

    /// The transport could not be opened.
    #[error("Could not connect: {0}")]
    Connection(String),

    /// No reply arrived within the read window.
    ///
    /// The hub client treats this as "no value" for the slot,
    /// it never escapes a poll.
    #[error("No reply within the read timeout")]
    Timeout,

    /// A malformed command or reply.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// IO related errors.
    #[error("Underlying IO problem")]
    IO(#[from] io::Error),

    /// The configuration is not usable.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// The requested lifecycle transition is not allowed from the current state.
    #[error("Invalid state transition: {0}")]
    BadTransition(String),

    /// The controller task is no longer running.
    #[error("The controller has shut down")]
    ControllerGone,
}

impl Error {
    /// Does this error mean the hub simply did not answer?
    pub fn is_absence(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Get the problem description if this is a bad config error.
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }

    /// Get the problem description if this is a protocol violation.
    pub fn try_into_protocol(self) -> Result<String, Self> {
        if let Self::Protocol(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }
}
