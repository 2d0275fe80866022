use tokio_serial::SerialStream;

use crate::{error::Error, mock::MockTransport, serial::LineTransport};

/// A byte oriented duplex channel to a hub.
///
/// Requests are written raw, replies are read one line at a time.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Put bytes on the wire.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Read a single line.
    /// Yields [`Error::Timeout`] if nothing arrives within the read window.
    async fn read_line(&mut self) -> Result<Vec<u8>, Error>;

    /// Close the channel.
    async fn close(&mut self) -> Result<(), Error>;
}

/// The transport a connected hub client holds.
#[derive(Debug)]
pub enum Link {
    /// A real serial port.
    Serial(LineTransport<SerialStream>),

    /// An in-memory peer of a [`crate::mock::MockHub`].
    Simulated(MockTransport),
}

impl Transport for Link {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Link::Serial(serial) => serial.write(bytes).await,
            Link::Simulated(mock) => mock.write(bytes).await,
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, Error> {
        match self {
            Link::Serial(serial) => serial.read_line().await,
            Link::Simulated(mock) => mock.read_line().await,
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        match self {
            Link::Serial(serial) => serial.close().await,
            Link::Simulated(mock) => mock.close().await,
        }
    }
}
