//! A mock hub, useful to exercise the hub client without the actual hardware.
//!
//! Every write is interpreted as a single command.
//! The reply (or the protocol error, for unknown commands) is queued,
//! and handed out by the next read in FIFO order.
//! Reading when nothing is queued behaves like a port timing out.

use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::{debug, info, trace, warn};

use crate::{
    error::Error,
    protocol::{encode_reply, parse_request, Readings, Slot, SLOT_COUNT},
    transport::Transport,
};

/// Slot 1 holds a reading, all the other slots are empty.
pub const DEFAULT_POSITIONS: Readings = [
    0.00009,
    f64::NAN,
    f64::NAN,
    f64::NAN,
    f64::NAN,
    f64::NAN,
    f64::NAN,
    f64::NAN,
];

#[derive(Debug)]
struct MockState {
    positions: Readings,

    /// Commands for slots above this are unknown to the hub.
    channels: usize,

    /// Slots the hub never answers.
    silent: Vec<Slot>,

    requests: AtomicUsize,
    connections: AtomicUsize,
    closes: AtomicUsize,
}

/// Builder for a [`MockHub`].
#[derive(Debug)]
pub struct MockBuilder {
    positions: Readings,
    channels: usize,
    silent: Vec<Slot>,
}

impl Default for MockBuilder {
    fn default() -> Self {
        Self {
            positions: DEFAULT_POSITIONS,
            channels: SLOT_COUNT,
            silent: vec![],
        }
    }
}

impl MockBuilder {
    /// Start a new builder with the default positions.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value each slot reports. `NaN` means no value.
    pub fn positions(mut self, positions: Readings) -> Self {
        self.positions = positions;
        self
    }

    /// How many channels the hub has wired up.
    /// Asking for a slot above this is an unknown command.
    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels.min(SLOT_COUNT);
        self
    }

    /// Never answer requests for this slot, so reading it times out.
    pub fn silent(mut self, slot: Slot) -> Self {
        self.silent.push(slot);
        self
    }

    /// Create the hub.
    #[must_use]
    pub fn build(self) -> MockHub {
        info!(channels = self.channels, positions = ?self.positions, silent = ?self.silent, "Running mock hub");

        MockHub(Arc::new(MockState {
            positions: self.positions,
            channels: self.channels,
            silent: self.silent,
            requests: AtomicUsize::new(0),
            connections: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }))
    }
}

/// A simulated hub.
///
/// Clones share the same fixture and counters.
#[derive(Debug, Clone)]
pub struct MockHub(Arc<MockState>);

impl Default for MockHub {
    fn default() -> Self {
        MockBuilder::default().build()
    }
}

impl MockHub {
    /// See [`MockBuilder`].
    pub fn builder() -> MockBuilder {
        MockBuilder::new()
    }

    /// Interpret a command, producing the reply the hub would give.
    /// `Ok(None)` if the hub stays silent.
    pub fn parse_message(&self, message: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.0.requests.fetch_add(1, Ordering::SeqCst);

        let slot = parse_request(message)?;

        if usize::from(slot.number()) > self.0.channels {
            return Err(Error::Protocol(format!("\"{slot}\" not implemented")));
        }

        if self.0.silent.contains(&slot) {
            trace!(%slot, "Not answering");
            return Ok(None);
        }

        let position = self.0.positions[slot.index()];
        trace!(%slot, %position, "Slot position");

        Ok(Some(encode_reply(slot, Some(position))))
    }

    /// Open a new in-memory connection to this hub.
    pub fn connect(&self) -> MockTransport {
        self.0.connections.fetch_add(1, Ordering::SeqCst);
        debug!("Creating mock serial connection");

        MockTransport {
            hub: self.clone(),
            replies: VecDeque::new(),
            read_timeout: Duration::ZERO,
            closed: false,
        }
    }

    /// How many commands the hub has received, valid or not.
    pub fn requests(&self) -> usize {
        self.0.requests.load(Ordering::SeqCst)
    }

    /// How many connections were opened.
    pub fn connections(&self) -> usize {
        self.0.connections.load(Ordering::SeqCst)
    }

    /// How many connections were closed.
    pub fn closes(&self) -> usize {
        self.0.closes.load(Ordering::SeqCst)
    }
}

/// The client side of a connection to a [`MockHub`].
#[derive(Debug)]
pub struct MockTransport {
    hub: MockHub,
    replies: VecDeque<Result<Vec<u8>, Error>>,
    read_timeout: Duration,
    closed: bool,
}

impl MockTransport {
    /// How long a read waits when nothing is queued before timing out.
    /// Zero unless set.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl Transport for MockTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::IO(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "Mock connection is closed",
            )));
        }

        match self.hub.parse_message(bytes) {
            Ok(Some(reply)) => self.replies.push_back(Ok(reply)),
            Ok(None) => {}
            Err(e) => {
                warn!(?e, "Mock hub could not handle command");
                self.replies.push_back(Err(e));
            }
        }

        Ok(())
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, Error> {
        match self.replies.pop_front() {
            Some(reply) => reply,
            None => {
                tokio::time::sleep(self.read_timeout).await;
                debug!("Nothing queued, port timed out");
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        if !self.closed {
            self.closed = true;
            self.hub.0.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
