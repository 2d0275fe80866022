//! The channel addressing protocol spoken by the hub.
//!
//! A request is the decimal slot number followed by a carriage return.
//! A reply is either a bare carriage return (no value),
//! or `<slot>:<signed value>` followed by a carriage return.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How many slots a hub has.
pub const SLOT_COUNT: usize = 8;

/// Terminates every frame, in both directions.
pub const TERMINATOR: u8 = b'\r';

/// One reading per slot, `NaN` where there is no value.
pub type Readings = [f64; SLOT_COUNT];

/// Readings where every slot has no value.
pub fn no_readings() -> Readings {
    [f64::NAN; SLOT_COUNT]
}

/// A slot on the hub, numbered 1 to 8 as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot(u8);

impl Slot {
    /// A slot from its wire number.
    pub fn new(number: u8) -> Result<Self, Error> {
        if (1..=SLOT_COUNT as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(Error::Protocol(format!(
                "Slot {number} is out of range 1..={SLOT_COUNT}"
            )))
        }
    }

    /// All slots, in wire order.
    pub fn all() -> impl Iterator<Item = Slot> {
        (1..=SLOT_COUNT as u8).map(Slot)
    }

    /// The number used on the wire.
    pub fn number(&self) -> u8 {
        self.0
    }

    /// The position within a [`Readings`] array.
    pub fn index(&self) -> usize {
        usize::from(self.0) - 1
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The bytes asking the hub for the reading of a slot.
pub fn encode_request(slot: Slot) -> Vec<u8> {
    let mut request = slot.to_string().into_bytes();
    request.push(TERMINATOR);
    request
}

/// Which slot a request asks for.
/// Only the exact commands `1` to `8` are known, no signs or leading zeros.
pub fn parse_request(bytes: &[u8]) -> Result<Slot, Error> {
    let command = String::from_utf8_lossy(bytes);
    let command = command.trim_end_matches(['\r', '\n']);

    Slot::all()
        .find(|slot| slot.to_string() == command)
        .ok_or_else(|| Error::Protocol(format!("{command:?} not implemented")))
}

/// The reply a hub gives for a slot.
/// A missing or `NaN` value is a bare terminator.
pub fn encode_reply(slot: Slot, value: Option<f64>) -> Vec<u8> {
    match value.filter(|v| !v.is_nan()) {
        Some(value) => format!("{slot}:{value:+.6}\r").into_bytes(),
        None => vec![TERMINATOR],
    }
}

/// Decode a reply.
/// `Ok(None)` means the hub has no value for the slot.
///
/// The reply may or may not still carry its terminator,
/// line codecs strip it while in-memory transports keep it.
pub fn decode_reply(bytes: &[u8]) -> Result<Option<f64>, Error> {
    let body = bytes.strip_suffix(&[TERMINATOR]).unwrap_or(bytes);

    if body.is_empty() {
        return Ok(None);
    }

    let text = std::str::from_utf8(body)
        .map_err(|e| Error::Protocol(format!("Reply {bytes:?} is not ASCII: {e}")))?;

    let value = match text.rsplit_once(':') {
        Some((_, value)) => value,
        None => text,
    };

    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::Protocol(format!("Could not parse value in reply {text:?}: {e}")))?;

    if !value.is_finite() {
        return Err(Error::Protocol(format!(
            "Reply {text:?} does not hold a finite value"
        )));
    }

    Ok(Some(value))
}
