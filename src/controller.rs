//! The controller owns a hub client and its telemetry loop,
//! and moves them through the lifecycle states.
//!
//! It runs as its own task.
//! Talk to it through a [`ControllerHandle`].
//!
//! While in [`State::Disabled`] or [`State::Enabled`] the hub is connected and polled.
//! In [`State::Standby`] or [`State::Fault`] polling is stopped and the hub is released.

use std::{fmt::Display, time::Duration};

use futures::{channel::mpsc, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::{
    client::{HubClient, Mode},
    config::Config,
    error::Error,
    events::{Event, Metadata, TimestampedEvent},
    telemetry::{TelemetryLoop, TelemetryOutcome, TelemetryTask},
};

/// Fault code: the hub could not be connected to.
pub const CONNECTION_FAILED: i32 = 1;

/// Fault code: the telemetry loop failed.
pub const TELEMETRY_FAILED: i32 = 2;

/// The lifecycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Not configured, not connected.
    Standby,

    /// Configured, connected and polling.
    Disabled,

    /// Same as disabled, as far as the hub is concerned.
    Enabled,

    /// Something went wrong.
    /// The hub is released, go to standby to recover.
    Fault,
}

impl State {
    /// Should the hub be connected and polled in this state?
    pub fn is_active(&self) -> bool {
        matches!(self, State::Disabled | State::Enabled)
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Standby => write!(f, "standby"),
            State::Disabled => write!(f, "disabled"),
            State::Enabled => write!(f, "enabled"),
            State::Fault => write!(f, "fault"),
        }
    }
}

/// Lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Standby -> Disabled. Applies the configuration.
    Start,

    /// Disabled -> Enabled.
    Enable,

    /// Enabled -> Disabled.
    Disable,

    /// Disabled or Fault -> Standby.
    Standby,
}

impl Command {
    /// The state this command leads to from `from`, if allowed.
    pub fn target(&self, from: State) -> Result<State, Error> {
        match (self, from) {
            (Command::Start, State::Standby) => Ok(State::Disabled),
            (Command::Enable, State::Disabled) => Ok(State::Enabled),
            (Command::Disable, State::Enabled) => Ok(State::Disabled),
            (Command::Standby, State::Disabled | State::Fault) => Ok(State::Standby),
            (command, from) => Err(Error::BadTransition(format!(
                "Cannot {command} while in {from}"
            ))),
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start => write!(f, "start"),
            Command::Enable => write!(f, "enable"),
            Command::Disable => write!(f, "disable"),
            Command::Standby => write!(f, "standby"),
        }
    }
}

#[derive(Debug)]
enum ControllerMessage {
    Command {
        command: Command,
        response: oneshot::Sender<Result<State, Error>>,
    },
    State(oneshot::Sender<State>),
    Shutdown(oneshot::Sender<()>),
}

/// A handle to a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    requests: mpsc::UnboundedSender<ControllerMessage>,
    events: broadcast::Sender<TimestampedEvent>,
}

impl ControllerHandle {
    /// Spawn a controller for the hub with the given index in `config`.
    /// It starts out in [`State::Standby`].
    pub fn new(index: u32, config: Config, mode: Mode) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded();
        let (events, _) = broadcast::channel(1024);

        let span = info_span!("controller", %index);
        let controller = Controller {
            index,
            config,
            mode,
            state: State::Standby,
            client: None,
            telemetry: None,
            interval: Duration::from_secs(1),
            messages: requests_rx,
            events: events.clone(),
            span: span.clone(),
        };

        tokio::spawn(controller.run().instrument(span));

        Self {
            requests: requests_tx,
            events,
        }
    }

    /// Subscribe to what the controller publishes from now on.
    pub fn events(&self) -> broadcast::Receiver<TimestampedEvent> {
        self.events.subscribe()
    }

    /// Perform a lifecycle command.
    /// Returns the state the controller ended up in,
    /// which is [`State::Fault`] if the hub could not be connected to.
    pub async fn command(&self, command: Command) -> Result<State, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::Command {
            command,
            response: tx,
        })
        .await?;

        rx.await.map_err(|_| Error::ControllerGone)?
    }

    /// The current state.
    pub async fn state(&self) -> Result<State, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::State(tx)).await?;

        rx.await.map_err(|_| Error::ControllerGone)
    }

    /// Stop polling, release the hub and end the controller task.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::Shutdown(tx)).await?;

        rx.await.map_err(|_| Error::ControllerGone)
    }

    async fn send(&self, message: ControllerMessage) -> Result<(), Error> {
        self.requests
            .clone()
            .send(message)
            .await
            .map_err(|_| Error::ControllerGone)
    }
}

struct Controller {
    index: u32,
    config: Config,
    mode: Mode,
    state: State,

    // Present while configured, except while lent to the telemetry loop.
    client: Option<HubClient>,
    telemetry: Option<TelemetryTask>,
    interval: Duration,

    messages: mpsc::UnboundedReceiver<ControllerMessage>,
    events: broadcast::Sender<TimestampedEvent>,
    span: Span,
}

async fn telemetry_stopped(
    task: &mut Option<TelemetryTask>,
) -> Result<TelemetryOutcome, Error> {
    match task {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

impl Controller {
    async fn run(mut self) {
        info!("Controller running");
        self.publish(Event::SummaryState(self.state));

        loop {
            tokio::select! {
                message = self.messages.next() => match message {
                    Some(ControllerMessage::Command { command, response }) => {
                        let result = self.handle_command(command).await;
                        if response.send(result).is_err() {
                            debug!("Nobody waiting for the command response");
                        }
                    }
                    Some(ControllerMessage::State(response)) => {
                        let _ = response.send(self.state);
                    }
                    Some(ControllerMessage::Shutdown(response)) => {
                        self.release().await;
                        let _ = response.send(());
                        break;
                    }
                    None => {
                        self.release().await;
                        break;
                    }
                },
                outcome = telemetry_stopped(&mut self.telemetry), if self.telemetry.is_some() => {
                    self.telemetry = None;
                    self.handle_telemetry_stopped(outcome).await;
                }
            }
        }

        info!("Controller stopped");
    }

    fn publish(&self, event: Event) {
        let event = TimestampedEvent::now(event);
        debug!(%event, "Publishing event");

        if self.events.send(event).is_err() {
            debug!("No listeners for event");
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<State, Error> {
        let target = command.target(self.state)?;
        info!(%command, from = %self.state, to = %target, "Handling command");

        if command == Command::Start {
            self.configure()?;
        }

        self.set_state(target).await;

        Ok(self.state)
    }

    /// Build a fresh client from the configuration.
    fn configure(&mut self) -> Result<(), Error> {
        self.config.validate()?;
        let hub = self.config.hub(self.index)?.clone();

        let interval = hub.telemetry_interval()?;

        let mut client = HubClient::new_in(self.mode.clone(), &self.span);
        client.configure(&hub);

        self.interval = interval;
        self.client = Some(client);

        self.publish(Event::Metadata(Metadata::from(&hub)));

        Ok(())
    }

    async fn set_state(&mut self, state: State) {
        self.state = state;
        self.publish(Event::SummaryState(state));

        if state.is_active() {
            self.activate().await;
        } else {
            self.release().await;
        }
    }

    /// Connect if needed, then make sure telemetry is running.
    async fn activate(&mut self) {
        if self.telemetry.is_some() {
            return;
        }

        let Some(mut client) = self.client.take() else {
            self.fault(CONNECTION_FAILED, "No hub client configured".into())
                .await;
            return;
        };

        if !client.is_connected() {
            debug!("Connecting");

            if let Err(e) = client.connect() {
                error!(?e, "Could not connect");
                self.client = Some(client);
                self.fault(CONNECTION_FAILED, e.to_string()).await;
                return;
            }
        }

        self.telemetry =
            Some(TelemetryLoop::new(client, self.interval, self.events.clone()).spawn());
    }

    /// Stop telemetry, then disconnect and drop the client.
    async fn release(&mut self) {
        if let Some(task) = self.telemetry.take() {
            debug!("Cancelling telemetry");

            match task.stop().await {
                Ok(TelemetryOutcome { client, result }) => {
                    if let Err(fault) = result {
                        warn!(%fault, "Telemetry had already failed");
                    }
                    self.client = Some(client);
                }
                Err(e) => error!(?e, "Telemetry task lost, the hub client went with it"),
            }
        }

        if let Some(mut client) = self.client.take() {
            debug!("Disconnecting");

            if let Err(e) = client.disconnect().await {
                warn!(?e, "Problem disconnecting");
            }
        }
    }

    async fn handle_telemetry_stopped(&mut self, outcome: Result<TelemetryOutcome, Error>) {
        match outcome {
            Ok(TelemetryOutcome { client, result }) => {
                self.client = Some(client);

                match result {
                    Err(fault) => self.fault(TELEMETRY_FAILED, fault.to_string()).await,
                    Ok(()) => debug!("Telemetry stopped"),
                }
            }
            Err(e) => self.fault(TELEMETRY_FAILED, e.to_string()).await,
        }
    }

    async fn fault(&mut self, code: i32, report: String) {
        error!(code, %report, "Going to fault");

        self.publish(Event::Fault { code, report });
        self.state = State::Fault;
        self.publish(Event::SummaryState(State::Fault));

        self.release().await;
    }
}
