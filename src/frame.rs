//! Wire-format definitions for transfer frames.
//!
//! Every datagram exchanged between client and server is a [`Frame`]: a
//! fixed 12-byte [`Header`] followed by an opaque payload.  This module only
//! turns frames into bytes and back; it never interprets the payload.
//!
//! # Wire format
//!
//! All fields are **big-endian** `u32`s.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                            Opcode                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Payload (0..=512 bytes) ...                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! There is no length field: the payload is whatever follows the header in
//! the datagram.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 12;

/// Largest payload a single frame may carry.
pub const MAX_PAYLOAD: usize = 512;

/// Largest datagram either side ever needs to receive.
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD;

const OFF_OPCODE: usize = 0;
const OFF_SEQ: usize = 4;
const OFF_TIMESTAMP: usize = 8;

/// Operation carried by a frame.
///
/// Values outside `0..=3` decode to [`Opcode::Unknown`] so the receiver can
/// decide how to treat them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    WriteRequest,
    Data,
    Ack,
    End,
    Unknown(u32),
}

impl From<u32> for Opcode {
    fn from(value: u32) -> Self {
        match value {
            0 => Opcode::WriteRequest,
            1 => Opcode::Data,
            2 => Opcode::Ack,
            3 => Opcode::End,
            other => Opcode::Unknown(other),
        }
    }
}

impl From<Opcode> for u32 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::WriteRequest => 0,
            Opcode::Data => 1,
            Opcode::Ack => 2,
            Opcode::End => 3,
            Opcode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::WriteRequest => f.write_str("WRQ"),
            Opcode::Data => f.write_str("DATA"),
            Opcode::Ack => f.write_str("ACK"),
            Opcode::End => f.write_str("END"),
            Opcode::Unknown(n) => write!(f, "opcode({n})"),
        }
    }
}

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub opcode: Opcode,
    /// Client-assigned sequence number; echoed verbatim by acknowledgments.
    pub seq: u32,
    /// Sender wall-clock stamp at transmission; echoed verbatim by acknowledgments.
    pub timestamp: u32,
}

impl Header {
    /// Split `buf` into its header and the payload bytes that follow it.
    ///
    /// Returns [`FrameError::BufferTooShort`] when `buf` cannot hold a header
    /// and [`FrameError::PayloadTooLarge`] when the remainder exceeds
    /// [`MAX_PAYLOAD`].
    pub fn parse(buf: &[u8]) -> Result<(Header, &[u8]), FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::BufferTooShort { len: buf.len() });
        }
        let payload = &buf[HEADER_LEN..];
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge { len: payload.len() });
        }

        let header = Header {
            opcode: read_u32(buf, OFF_OPCODE).into(),
            seq: read_u32(buf, OFF_SEQ),
            timestamp: read_u32(buf, OFF_TIMESTAMP),
        };
        Ok((header, payload))
    }

    fn write(&self, buf: &mut [u8]) {
        buf[OFF_OPCODE..OFF_OPCODE + 4].copy_from_slice(&u32::from(self.opcode).to_be_bytes());
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_TIMESTAMP..OFF_TIMESTAMP + 4].copy_from_slice(&self.timestamp.to_be_bytes());
    }
}

/// A complete datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, seq: u32, timestamp: u32, payload: Vec<u8>) -> Self {
        Self {
            header: Header {
                opcode,
                seq,
                timestamp,
            },
            payload,
        }
    }

    /// Acknowledgment for `received`: same sequence and timestamp, no payload.
    pub fn ack(received: &Header) -> Self {
        Self::new(Opcode::Ack, received.seq, received.timestamp, Vec::new())
    }

    /// Serialise this frame into a newly allocated byte vector.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                len: self.payload.len(),
            });
        }
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        self.header.write(&mut buf);
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse a [`Frame`] from one received datagram.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let (header, payload) = Header::parse(buf)?;
        Ok(Self {
            header,
            payload: payload.to_vec(),
        })
    }
}

/// Errors that can arise when encoding or parsing a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("datagram of {len} bytes is shorter than the {}-byte header", HEADER_LEN)]
    BufferTooShort { len: usize },
    #[error("payload of {len} bytes exceeds the {}-byte limit", MAX_PAYLOAD)]
    PayloadTooLarge { len: usize },
}

/// Current wall-clock time in milliseconds, truncated to 32 bits.
pub fn wall_clock_stamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let frame = Frame::new(Opcode::Data, 7, 123_456, b"hello\n".to_vec());
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn header_fields_big_endian_on_wire() {
        let bytes = Frame::new(Opcode::End, 0x0102_0304, 0x0506_0708, vec![])
            .encode()
            .unwrap();
        assert_eq!(&bytes[OFF_OPCODE..OFF_OPCODE + 4], &[0, 0, 0, 3]);
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(
            &bytes[OFF_TIMESTAMP..OFF_TIMESTAMP + 4],
            &[0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn encoded_length_equals_header_plus_payload() {
        let payload = b"exactly twelve!";
        let bytes = Frame::new(Opcode::Data, 1, 1, payload.to_vec())
            .encode()
            .unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + payload.len());
    }

    #[test]
    fn decode_empty_buffer_returns_error() {
        assert_eq!(
            Frame::decode(&[]),
            Err(FrameError::BufferTooShort { len: 0 })
        );
    }

    #[test]
    fn decode_short_header_returns_error() {
        assert_eq!(
            Frame::decode(&[0u8; HEADER_LEN - 1]),
            Err(FrameError::BufferTooShort {
                len: HEADER_LEN - 1
            })
        );
    }

    #[test]
    fn header_only_datagram_has_empty_payload() {
        let (header, payload) = Header::parse(&[0u8; HEADER_LEN]).unwrap();
        assert_eq!(header.opcode, Opcode::WriteRequest);
        assert!(payload.is_empty());
    }

    #[test]
    fn payload_is_not_treated_as_text() {
        let payload = vec![0u8, 0xff, b'\n', 0, 7];
        let frame = Frame::new(Opcode::Data, 3, 9, payload.clone());
        let bytes = frame.encode().unwrap();
        let (_, parsed) = Header::parse(&bytes).unwrap();
        assert_eq!(parsed, payload.as_slice());
    }

    #[test]
    fn oversized_payload_is_rejected_both_ways() {
        let frame = Frame::new(Opcode::Data, 1, 1, vec![0u8; MAX_PAYLOAD + 1]);
        assert_eq!(
            frame.encode(),
            Err(FrameError::PayloadTooLarge {
                len: MAX_PAYLOAD + 1
            })
        );
        let raw = vec![0u8; MAX_FRAME + 1];
        assert!(matches!(
            Frame::decode(&raw),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn max_payload_fits() {
        let frame = Frame::new(Opcode::Data, 1, 1, vec![b'x'; MAX_PAYLOAD]);
        assert_eq!(frame.encode().unwrap().len(), MAX_FRAME);
    }

    #[test]
    fn unknown_opcode_survives_decode() {
        let mut bytes = Frame::new(Opcode::Data, 5, 5, vec![]).encode().unwrap();
        bytes[OFF_OPCODE..OFF_OPCODE + 4].copy_from_slice(&42u32.to_be_bytes());
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.header.opcode, Opcode::Unknown(42));
        assert_eq!(u32::from(frame.header.opcode), 42);
    }

    #[test]
    fn opcode_values_match_protocol() {
        assert_eq!(u32::from(Opcode::WriteRequest), 0);
        assert_eq!(u32::from(Opcode::Data), 1);
        assert_eq!(u32::from(Opcode::Ack), 2);
        assert_eq!(u32::from(Opcode::End), 3);
    }

    #[test]
    fn ack_echoes_sequence_and_timestamp() {
        let data = Frame::new(Opcode::Data, 11, 99, b"x".to_vec());
        let ack = Frame::ack(&data.header);
        assert_eq!(ack.header.opcode, Opcode::Ack);
        assert_eq!(ack.header.seq, 11);
        assert_eq!(ack.header.timestamp, 99);
        assert!(ack.payload.is_empty());
    }
}
