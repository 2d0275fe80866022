//! The telemetry loop.
//!
//! Polls every slot of the hub, publishes the positions, sleeps, repeats.
//! It stops when cancelled (checked only while sleeping, so a poll is never cut short),
//! or at the first failure that is not a plain "no value".

use std::{
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, Instrument, Span};

use crate::{
    client::HubClient,
    error::Error,
    events::{Event, TimestampedEvent},
    protocol::{no_readings, Readings},
};

/// The reason the telemetry loop gave up.
#[derive(Debug, Error)]
#[error("Telemetry loop failed. Last position value was {last_readings:?}: {source}")]
pub struct TelemetryFault {
    /// The readings of the poll that failed.
    /// Slots not reached before the failure are `NaN`.
    pub last_readings: Readings,

    /// What went wrong.
    pub source: Error,
}

/// What the loop leaves behind when it stops.
#[derive(Debug)]
pub struct TelemetryOutcome {
    /// The client, handed back so it can be disconnected.
    pub client: HubClient,

    /// `Ok` if the loop was cancelled.
    pub result: Result<(), TelemetryFault>,
}

/// Polls a hub on a fixed interval.
#[derive(Debug)]
pub struct TelemetryLoop {
    client: HubClient,
    interval: Duration,
    events: broadcast::Sender<TimestampedEvent>,
    span: Span,
}

impl TelemetryLoop {
    /// A loop owning `client`, which should already be connected.
    /// Positions are published on `events`.
    pub fn new(
        client: HubClient,
        interval: Duration,
        events: broadcast::Sender<TimestampedEvent>,
    ) -> Self {
        Self {
            client,
            interval,
            events,
            span: info_span!("telemetry", ?interval),
        }
    }

    /// Run until cancelled or until something goes wrong.
    pub async fn run(mut self, cancel: CancellationToken) -> TelemetryOutcome {
        let span = self.span.clone();
        let result = self.poll_until_cancelled(&cancel).instrument(span).await;

        TelemetryOutcome {
            client: self.client,
            result,
        }
    }

    /// Run the loop as its own task.
    pub fn spawn(self) -> TelemetryTask {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(self.run(cancel.clone()));

        TelemetryTask { cancel, join }
    }

    async fn poll_until_cancelled(&mut self, cancel: &CancellationToken) -> Result<(), TelemetryFault> {
        debug!("Begin sending telemetry");

        loop {
            let mut readings = no_readings();

            if let Err(source) = self.client.read_all_slots_into(&mut readings).await {
                let fault = TelemetryFault {
                    last_readings: readings,
                    source,
                };
                error!(%fault, "Telemetry loop stopping");

                return Err(fault);
            }

            // A whole poll always completes, but once cancelled nothing more is published.
            if cancel.is_cancelled() {
                info!("Telemetry loop cancelled");
                return Ok(());
            }

            trace!(?readings, "Received position data, now publishing");
            self.publish(readings);

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Telemetry loop cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    fn publish(&self, readings: Readings) {
        match self
            .events
            .send(TimestampedEvent::now(Event::Position(readings)))
        {
            Ok(listeners) => trace!("Broadcasted position to {listeners} listener(s)"),
            Err(_) => debug!("No listeners for position"),
        }
    }
}

/// A spawned [`TelemetryLoop`].
///
/// Awaiting it yields the [`TelemetryOutcome`] once the loop stops by itself.
#[derive(Debug)]
pub struct TelemetryTask {
    cancel: CancellationToken,
    join: JoinHandle<TelemetryOutcome>,
}

impl TelemetryTask {
    /// Ask the loop to stop at its next sleep, and wait for it.
    pub async fn stop(self) -> Result<TelemetryOutcome, Error> {
        self.cancel.cancel();
        self.await
    }
}

impl Future for TelemetryTask {
    type Output = Result<TelemetryOutcome, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join).poll(cx).map(|joined| {
            joined.map_err(|e| {
                Error::IO(io::Error::new(
                    io::ErrorKind::Other,
                    format!("Telemetry task did not finish: {e}"),
                ))
            })
        })
    }
}
