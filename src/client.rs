//! The hub client.
//! Owns the connection to a hub and knows which slots are in use.

use std::time::Duration;

use tracing::{debug, info, info_span, trace, Instrument, Span};

use crate::{
    config::HubConfig,
    error::Error,
    events::Metadata,
    mock::MockHub,
    protocol::{self, no_readings, Readings, Slot, SLOT_COUNT, TERMINATOR},
    serial::serial_port::{self, DEFAULT_READ_TIMEOUT},
    transport::{Link, Transport},
};

/// Where a hub client connects to.
#[derive(Debug, Clone)]
pub enum Mode {
    /// The serial port named in the configuration.
    Serial,

    /// An in-memory simulated hub.
    Simulation(MockHub),
}

/// Talks to a single hub.
///
/// Starts out disconnected.
/// Only one request is ever outstanding, and slots are read in order.
#[derive(Debug)]
pub struct HubClient {
    mode: Mode,
    config: Option<HubConfig>,
    names: [String; SLOT_COUNT],
    link: Option<Link>,
    read_timeout: Duration,
    span: Span,
}

impl HubClient {
    /// A new, unconfigured and disconnected client.
    pub fn new(mode: Mode) -> Self {
        Self::new_in(mode, &Span::current())
    }

    /// Same as [`HubClient::new`], logging within the given span.
    pub fn new_in(mode: Mode, parent: &Span) -> Self {
        let simulated = matches!(mode, Mode::Simulation(_));

        Self {
            mode,
            config: None,
            names: Default::default(),
            link: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            span: info_span!(parent: parent, "hub-client", %simulated),
        }
    }

    /// Apply a hub configuration.
    /// Replaces any previous one, leaving the connection alone.
    pub fn configure(&mut self, config: &HubConfig) {
        let _entered = self.span.enter();

        self.names = config.slot_names();
        self.config = Some(config.clone());

        debug!(names = ?self.names, "Configuration completed");
    }

    /// How long to wait for each reply.
    /// Takes effect on the next connect.
    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }

    /// Is there a transport to talk over?
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// The device name of each slot, empty for unused slots.
    pub fn names(&self) -> &[String; SLOT_COUNT] {
        &self.names
    }

    /// A description of the configured hub.
    pub fn metadata(&self) -> Option<Metadata> {
        self.config.as_ref().map(Metadata::from)
    }

    /// Open the transport.
    pub fn connect(&mut self) -> Result<(), Error> {
        let _entered = self.span.enter();

        if self.is_connected() {
            debug!("Already connected");
            return Ok(());
        }

        let link = match &self.mode {
            Mode::Serial => {
                let config = self.config.as_ref().ok_or_else(|| {
                    Error::BadConfig("A serial port is needed before connecting".into())
                })?;

                Link::Serial(serial_port::open(&config.serial_port, self.read_timeout)?)
            }
            Mode::Simulation(hub) => {
                Link::Simulated(hub.connect().with_read_timeout(self.read_timeout))
            }
        };

        self.link = Some(link);
        info!("Connection to device completed");

        Ok(())
    }

    /// Close and release the transport.
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        let span = self.span.clone();

        async {
            match self.link.take() {
                Some(mut link) => {
                    info!("Disconnecting serial device");
                    link.close().await
                }
                None => {
                    debug!("Not connected, nothing to disconnect");
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Ask the hub for the reply of a single slot.
    ///
    /// If the hub does not answer in time the reply is a bare terminator,
    /// which is what the hub itself sends when the slot has no value.
    pub async fn read_slot(&mut self, slot: Slot) -> Result<Vec<u8>, Error> {
        let link = self.link.as_mut().ok_or(Error::NotConnected)?;

        trace!(%slot, "Message to be sent");
        link.write(&protocol::encode_request(slot)).await?;

        match link.read_line().await {
            Ok(reply) => {
                trace!(%slot, ?reply, "Read successful");
                Ok(reply)
            }
            Err(Error::Timeout) => {
                debug!(%slot, "Channel timed out or empty");
                Ok(vec![TERMINATOR])
            }
            Err(e) => Err(e),
        }
    }

    /// Read the position of every slot.
    /// Unused slots are `NaN` and are not asked for.
    pub async fn read_all_slots(&mut self) -> Result<Readings, Error> {
        let mut readings = no_readings();
        self.read_all_slots_into(&mut readings).await?;

        Ok(readings)
    }

    /// Same as [`HubClient::read_all_slots`].
    /// On failure `readings` holds whatever was read before the problem.
    pub async fn read_all_slots_into(&mut self, readings: &mut Readings) -> Result<(), Error> {
        let span = self.span.clone();

        async {
            if !self.is_connected() {
                return Err(Error::NotConnected);
            }

            for slot in Slot::all() {
                if self.names[slot.index()].is_empty() {
                    readings[slot.index()] = f64::NAN;
                    continue;
                }

                let reply = self.read_slot(slot).await?;
                readings[slot.index()] = protocol::decode_reply(&reply)?.unwrap_or(f64::NAN);
            }

            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn simulated(hub: &MockHub, devices: &[&str]) -> HubClient {
        let mut config = HubConfig::example();
        config.devices = devices.iter().map(|d| d.to_string()).collect();

        let mut client = HubClient::new(Mode::Simulation(hub.clone()));
        client.configure(&config);
        client
    }

    #[tokio::test]
    async fn reads_need_connection() {
        let hub = MockHub::default();
        let mut client = simulated(&hub, &["Dial Gage"]);

        assert!(matches!(
            client.read_slot(Slot::new(1).unwrap()).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            client.read_all_slots().await,
            Err(Error::NotConnected)
        ));
        assert_eq!(hub.requests(), 0);
    }

    #[tokio::test]
    async fn default_hub_scenario() {
        let hub = MockHub::default();
        let mut client = simulated(&hub, &["Dial Gage"]);
        client.connect().unwrap();

        let readings = client.read_all_slots().await.unwrap();

        assert_eq!(readings[0], 9e-5);
        assert!(readings[1..].iter().all(|r| r.is_nan()));

        // Only the configured slot went over the wire.
        assert_eq!(hub.requests(), 1);
    }

    #[tokio::test]
    async fn unconfigured_slots_skip_the_wire() {
        let hub = MockHub::builder()
            .positions([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .build();
        let mut client = simulated(&hub, &[]);
        client.connect().unwrap();

        let readings = client.read_all_slots().await.unwrap();

        assert!(readings.iter().all(|r| r.is_nan()));
        assert_eq!(hub.requests(), 0);
    }

    #[tokio::test]
    async fn fixture_values_to_six_decimals() {
        let positions = [0.123456789, -4.5, f64::NAN, 1000.0, -0.000001, 7.0, 8.0, 9.0];
        let hub = MockHub::builder().positions(positions).build();
        let mut client = simulated(&hub, &["a", "b", "c", "d", "e", "f", "g", "h"]);
        client.connect().unwrap();

        let readings = client.read_all_slots().await.unwrap();

        for (read, expected) in readings.iter().zip(positions) {
            if expected.is_nan() {
                assert!(read.is_nan());
            } else {
                assert!((read - expected).abs() <= 5e-7, "{read} vs {expected}");
            }
        }
        assert_eq!(hub.requests(), 8);
    }

    #[tokio::test]
    async fn timeout_is_bare_terminator() {
        let slot = Slot::new(2).unwrap();
        let hub = MockHub::builder()
            .positions([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .silent(slot)
            .build();
        let mut client = simulated(&hub, &["Dial Gage"]);
        client.set_read_timeout(Duration::from_millis(20));
        client.connect().unwrap();

        let reply = client.read_slot(slot).await.unwrap();

        assert_eq!(reply, b"\r");
    }

    #[tokio::test]
    async fn silent_slot_reads_as_missing_and_polling_goes_on() {
        let hub = MockHub::builder()
            .positions([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .silent(Slot::new(2).unwrap())
            .build();
        let mut client = simulated(&hub, &["a", "b", "c"]);
        client.set_read_timeout(Duration::from_millis(20));
        client.connect().unwrap();

        let started = tokio::time::Instant::now();
        let readings = client.read_all_slots().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(readings[0], 1.0);
        assert!(readings[1].is_nan());
        assert_eq!(readings[2], 3.0);
        assert!(readings[3..].iter().all(|r| r.is_nan()));
        assert_eq!(hub.requests(), 3);
    }

    #[tokio::test]
    async fn unknown_command_is_protocol_violation() {
        let hub = MockHub::builder().channels(1).build();
        let mut client = simulated(&hub, &["Dial Gage", "Second"]);
        client.connect().unwrap();

        let mut readings = no_readings();
        let err = client.read_all_slots_into(&mut readings).await.unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
        // Slot 1 was read before the problem.
        assert_eq!(readings[0], 9e-5);
    }

    #[tokio::test]
    async fn reconnect_polls_identically() {
        let hub = MockHub::default();
        let mut client = simulated(&hub, &["Dial Gage"]);

        client.connect().unwrap();
        let first = client.read_all_slots().await.unwrap();

        client.disconnect().await.unwrap();
        assert!(!client.is_connected());

        client.connect().unwrap();
        let second = client.read_all_slots().await.unwrap();

        assert_eq!(first[0], second[0]);
        assert_eq!(hub.connections(), 2);
        assert_eq!(hub.closes(), 1);
    }

    #[tokio::test]
    async fn disconnect_when_disconnected_is_noop() {
        let hub = MockHub::default();
        let mut client = simulated(&hub, &["Dial Gage"]);

        client.disconnect().await.unwrap();

        assert_eq!(hub.closes(), 0);
    }

    #[tokio::test]
    async fn serial_needs_configuration() {
        let mut client = HubClient::new(Mode::Serial);

        assert!(matches!(client.connect(), Err(Error::BadConfig(_))));
    }

    #[tokio::test]
    async fn serial_open_failure_propagates() {
        let mut config = HubConfig::example();
        config.serial_port = "/dev/this-port-does-not-exist".into();

        let mut client = HubClient::new(Mode::Serial);
        client.configure(&config);

        assert!(matches!(client.connect(), Err(Error::Connection(_))));
        assert!(!client.is_connected());
    }

    #[test]
    fn configure_replaces_names() {
        let hub = MockHub::default();
        let mut client = simulated(&hub, &["a", "b", "c"]);

        let mut config = HubConfig::example();
        config.devices = vec!["z".into()];
        client.configure(&config);

        assert_eq!(client.names()[0], "z");
        assert!(client.names()[1..].iter().all(String::is_empty));
        assert_eq!(
            client.metadata().unwrap().names,
            "z,,,,,,,"
        );
    }
}
