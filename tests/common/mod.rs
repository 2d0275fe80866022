#![allow(dead_code)]

use std::time::Duration;

use color_eyre::Result;
use gauge_hub::{
    client::Mode,
    config::{Config, HubConfig},
    controller::ControllerHandle,
    events::{Event, Metadata, TimestampedEvent},
    mock::MockHub,
    protocol::Readings,
};
use tokio::{sync::broadcast, time::timeout};

/// A configuration for a single hub with the given devices, polled every `interval`.
pub fn config(devices: &[&str], interval: Duration) -> Config {
    let mut hub = HubConfig::example();
    hub.devices = devices.iter().map(|d| d.to_string()).collect();
    hub.telemetry_interval = interval.as_secs_f64();

    Config {
        hub_config: vec![hub],
    }
}

/// A controller for hub 1 of `config`, talking to `hub`.
pub async fn simulated(hub: &MockHub, config: Config) -> ControllerHandle {
    gauge_hub::logging::init(tracing::Level::DEBUG, None).await;

    ControllerHandle::new(1, config, Mode::Simulation(hub.clone()))
}

pub async fn next_event(rx: &mut broadcast::Receiver<TimestampedEvent>) -> Result<Event> {
    let event = timeout(Duration::from_secs(5), rx.recv()).await??;

    Ok(event.inner)
}

/// Skip events until `f` picks one.
pub async fn wait_for<T>(
    rx: &mut broadcast::Receiver<TimestampedEvent>,
    mut f: impl FnMut(Event) -> Option<T>,
) -> Result<T> {
    loop {
        if let Some(found) = f(next_event(rx).await?) {
            return Ok(found);
        }
    }
}

pub async fn next_position(rx: &mut broadcast::Receiver<TimestampedEvent>) -> Result<Readings> {
    wait_for(rx, |event| match event {
        Event::Position(readings) => Some(readings),
        _ => None,
    })
    .await
}

pub async fn next_metadata(rx: &mut broadcast::Receiver<TimestampedEvent>) -> Result<Metadata> {
    wait_for(rx, |event| match event {
        Event::Metadata(metadata) => Some(metadata),
        _ => None,
    })
    .await
}

pub async fn next_fault(rx: &mut broadcast::Receiver<TimestampedEvent>) -> Result<(i32, String)> {
    wait_for(rx, |event| match event {
        Event::Fault { code, report } => Some((code, report)),
        _ => None,
    })
    .await
}

/// Everything published so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<TimestampedEvent>) -> Vec<Event> {
    let mut events = vec![];

    while let Ok(event) = rx.try_recv() {
        events.push(event.inner);
    }

    events
}
