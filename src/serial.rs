use std::{io, time::Duration};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Framed};
use tracing::trace;

use crate::{error::Error, transport::Transport};

/// Codecs for encoding/decoding messages to/from wire.
pub mod codecs;

/// Opening the serial port the hub is attached to.
pub mod serial_port;

use codecs::lines::LinesCodec;

/// A line based transport over any byte stream.
///
/// For real hardware the stream is a serial port,
/// but anything implementing [`AsyncRead`] and [`AsyncWrite`] will do.
pub struct LineTransport<S> {
    framed: Framed<S, LinesCodec>,
    read_timeout: Duration,
}

impl<S> std::fmt::Debug for LineTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wrap a stream.
    /// Each read waits at most `read_timeout` for a full line.
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            framed: LinesCodec::default().framed(stream),
            read_timeout,
        }
    }
}

impl<S> Transport for LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        trace!("Message to wire: `{:?}`", bytes);
        self.framed.send(bytes.to_vec()).await
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, Error> {
        match tokio::time::timeout(self.read_timeout, self.framed.next()).await {
            Err(_elapsed) => Err(Error::Timeout),
            Ok(Some(line)) => {
                let line = line?;
                trace!("Message from wire: `{:?}`", &line[..line.len().min(32)]);
                Ok(line)
            }
            Ok(None) => Err(Error::IO(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Stream closed",
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.framed.close().await
    }
}
