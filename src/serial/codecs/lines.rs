use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{error::Error, protocol::TERMINATOR};

/// This codec has a configurable delimiter character for reading.
/// Written frames are forwarded as-is, since requests carry their own terminator.
#[derive(Debug, Clone)]
pub struct LinesCodec {
    /// How far we have looked for a delimiter into the buffer
    cursor: usize,

    /// How to delimit incoming byte streams.
    /// This delimiter is not included in the yielded frames.
    read_delimiter: u8,
}

impl LinesCodec {
    /// Create a new codec.
    pub fn new(read_delimiter: u8) -> Self {
        Self {
            cursor: 0,
            read_delimiter,
        }
    }
}

impl Default for LinesCodec {
    fn default() -> Self {
        Self::new(TERMINATOR)
    }
}

impl Decoder for LinesCodec {
    type Item = Vec<u8>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let read_to = src.len();

        let look_at = &src[self.cursor..read_to];

        if let Some(position) = look_at.iter().position(|&byte| byte == self.read_delimiter) {
            // Since we might "start late" in the buffer (from the cursor),
            // the "global" position within the buffer has to be calculated.
            let actual_position = self.cursor + position;

            // Next time we need to start over.
            self.cursor = 0;

            // Split at the delimiter, getting a slice of the bytes before it.
            let line = src.split_to(actual_position);

            // Discard the delimiter by advancing the source buffer beyond it.
            src.advance(1);

            Ok(Some(line[..].to_vec()))
        } else {
            // No full frame yet.
            // The same buffer is handed to us next time, possibly with more data,
            // so there is no need to look at these bytes again.
            self.cursor = read_to;

            Ok(None)
        }
    }
}

impl Encoder<Vec<u8>> for LinesCodec {
    type Error = Error;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn splits_on_carriage_return() {
        let mut codec = LinesCodec::default();
        let mut buf = BytesMut::from(&b"1:+0.000090\r\r2:-1.0"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"1:+0.000090".to_vec()));

        // A bare terminator is an empty line.
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(vec![]));

        // Incomplete.
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"00000\r");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"2:-1.000000".to_vec()));
        assert!(buf.is_empty());
    }

    #[test]
    fn frames_are_written_as_is() {
        let mut codec = LinesCodec::default();
        let mut buf = BytesMut::new();

        codec.encode(b"3\r".to_vec(), &mut buf).unwrap();

        assert_eq!(&buf[..], b"3\r");
    }
}
