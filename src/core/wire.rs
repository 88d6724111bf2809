//! Primitive field readers and writers for the chat wire format.
//!
//! All integers are little-endian and fixed width, all strings are
//! NUL-terminated. Reads never panic: running past the end of the buffer
//! yields [`ProtocolError::Malformed`] tagged with the opcode being decoded.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;

/// Cursor over an inbound payload
pub struct WireReader<'a> {
    buf: &'a [u8],
    opcode: u16,
}

impl<'a> WireReader<'a> {
    pub fn new(opcode: u16, buf: &'a [u8]) -> Self {
        Self { buf, opcode }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn malformed(&self, reason: String) -> ProtocolError {
        ProtocolError::Malformed {
            opcode: self.opcode,
            reason,
        }
    }

    fn ensure(&self, needed: usize, field: &str) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(self.malformed(format!(
                "{field}: need {needed} bytes, {} left",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn u8(&mut self, field: &str) -> Result<u8, ProtocolError> {
        self.ensure(1, field)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self, field: &str) -> Result<u16, ProtocolError> {
        self.ensure(2, field)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32(&mut self, field: &str) -> Result<u32, ProtocolError> {
        self.ensure(4, field)?;
        Ok(self.buf.get_u32_le())
    }

    /// Read a NUL-terminated string. Invalid UTF-8 is replaced rather than
    /// rejected so a single odd nickname cannot drop a whole channel listing.
    pub fn cstr(&mut self, field: &str) -> Result<String, ProtocolError> {
        let end = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.malformed(format!("{field}: missing NUL terminator")))?;
        let value = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.advance(end + 1);
        Ok(value)
    }

    /// Read a repeat count and check it against what the buffer can hold.
    pub fn count(&mut self, field: &str, min_record_len: usize) -> Result<usize, ProtocolError> {
        let count = self.u32(field)? as usize;
        if count.saturating_mul(min_record_len) > self.buf.remaining() {
            return Err(self.malformed(format!(
                "{field}: {count} records cannot fit in {} bytes",
                self.buf.remaining()
            )));
        }
        Ok(count)
    }
}

/// Builder for an outbound packet, opcode first
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new(opcode: u16) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u16_le(opcode);
        Self { buf }
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    pub fn cstr(mut self, value: &str) -> Self {
        self.buf.reserve(value.len() + 1);
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(0);
        self
    }

    pub fn finish(self) -> BytesMut {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_reads_mixed_fields() {
        let data = [0x2A, 0x00, 0x00, 0x00, b'h', b'i', 0x00, 0x07];
        let mut reader = WireReader::new(0x03, &data);
        assert_eq!(reader.u32("id").unwrap(), 42);
        assert_eq!(reader.cstr("text").unwrap(), "hi");
        assert_eq!(reader.u8("flag").unwrap(), 7);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_short_integer_is_malformed() {
        let mut reader = WireReader::new(0x68, &[0x01, 0x02]);
        let err = reader.u32("count").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { opcode: 0x68, .. }));
    }

    #[test]
    fn test_reader_unterminated_string_is_malformed() {
        let mut reader = WireReader::new(0x08, b"abc");
        assert!(reader.cstr("player").is_err());
    }

    #[test]
    fn test_reader_rejects_impossible_counts() {
        let mut reader = WireReader::new(0x04, &[0xFF, 0xFF, 0xFF, 0x0F, 0x00]);
        assert!(reader.count("user_count", 9).is_err());
    }

    #[test]
    fn test_writer_layout() {
        let bytes = WireWriter::new(0x46).cstr("a").cstr("").u8(1).u32(2).finish();
        assert_eq!(&bytes[..], &[0x46, 0x00, b'a', 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00]);
    }
}
