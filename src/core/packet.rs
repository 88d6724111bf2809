use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Size of the opcode that leads every frame
pub const OPCODE_LEN: usize = 2;

/// A raw chat packet: little-endian opcode followed by an opcode specific body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub opcode: u16,
    pub body: Bytes,
}

impl Packet {
    pub fn new(opcode: u16, body: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            body: body.into(),
        }
    }

    /// Split a received buffer into opcode and body without copying the body.
    pub fn from_bytes(raw: Bytes) -> Result<Self, ProtocolError> {
        if raw.len() < OPCODE_LEN {
            return Err(ProtocolError::Malformed {
                opcode: 0,
                reason: format!("packet of {} bytes has no opcode", raw.len()),
            });
        }
        let opcode = u16::from_le_bytes([raw[0], raw[1]]);
        Ok(Self {
            opcode,
            body: raw.slice(OPCODE_LEN..),
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(OPCODE_LEN + self.body.len());
        buf.put_u16_le(self.opcode);
        buf.put_slice(&self.body);
        buf.freeze()
    }
}
