use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::{error::Error, serial::LineTransport};

/// The hub talks at this rate.
pub const BAUD: u32 = 9600;

/// How long to wait for a reply before treating the slot as having no value.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Open the serial port at `path` with the settings the hub expects (8-N-1).
pub fn open(path: &str, read_timeout: Duration) -> Result<LineTransport<SerialStream>, Error> {
    debug!(%path, baud = BAUD, ?read_timeout, "Trying to open serial connection");

    let serial_stream = tokio_serial::new(path, BAUD)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(read_timeout)
        .open_native_async()
        .map_err(|e| Error::Connection(format!("Could not open port at {path}, problem: {e}")))?;

    info!(%path, "Connected to serial port");

    Ok(LineTransport::new(serial_stream, read_timeout))
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<String>, Error> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| Error::Connection(format!("Could not list serial ports: {e}")))?;

    Ok(ports
        .into_iter()
        .map(|serial_port_info| serial_port_info.port_name)
        .collect())
}
