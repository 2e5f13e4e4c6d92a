//! Byte-level cursors over caller-owned buffers.
//!
//! The engine performs no I/O; callers hand in a slice and get back an
//! advanced position. Fixed-width scalars are big-endian throughout, varints
//! are little-endian base-128 continuation bytes.

use std::fmt;

use crate::error::{DecodeError, WireError};
use crate::varint::{MAX_VARINT_LEN, unzigzag, zigzag};

/// Read cursor over an input buffer.
#[derive(Clone)]
pub struct Cursor<'input> {
    buffer: &'input [u8],
    offset: usize,
}

impl<'input> Cursor<'input> {
    #[must_use]
    pub fn new(buffer: &'input [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Move the cursor. Positions past the end of the buffer are legal and
    /// simply make every subsequent read fail.
    #[inline]
    pub fn set_position(&mut self, offset: usize) {
        self.offset = offset;
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    #[inline]
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'input [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(DecodeError::Truncated { at: self.offset })?;
        let bytes = &self.buffer[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .buffer
            .get(self.offset)
            .ok_or(DecodeError::Truncated { at: self.offset })?;
        self.offset += 1;
        Ok(b)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        Ok(bytes.try_into().unwrap())
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        self.read_u8().map(|b| b as i8)
    }

    #[inline]
    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.read_array().map(i16::from_be_bytes)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.read_array().map(u16::from_be_bytes)
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.read_array().map(i32::from_be_bytes)
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.read_array().map(i64::from_be_bytes)
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.read_array().map(u64::from_be_bytes)
    }

    #[inline]
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.read_array().map(f32::from_be_bytes)
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.read_array().map(f64::from_be_bytes)
    }

    #[inline]
    pub fn read_u128(&mut self) -> Result<u128, DecodeError> {
        self.read_array().map(u128::from_be_bytes)
    }

    /// Read a ZigZag varint. Refuses encodings longer than
    /// [`MAX_VARINT_LEN`] bytes.
    pub fn read_varint(&mut self) -> Result<i64, DecodeError> {
        let at = self.offset;
        let mut z: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self
                .read_u8()
                .map_err(|_| DecodeError::Truncated { at })?;
            z |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(unzigzag(z));
            }
        }
        Err(DecodeError::MalformedVarint { at })
    }

    /// Read a varint that must be a non-negative length or count.
    pub fn read_len(&mut self) -> Result<usize, DecodeError> {
        let at = self.offset;
        let n = self.read_varint()?;
        usize::try_from(n).map_err(|_| DecodeError::ValueOverflow { at })
    }
}

impl fmt::Debug for Cursor<'_> {
    /// Debug-print only the unconsumed part of the buffer.
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ahead = self.buffer.get(self.offset..).unwrap_or_default();
        write!(f, "Cursor[{} @ 0x", self.offset)?;
        for &b in ahead.iter().take(32) {
            write!(f, "{b:02x}")?;
        }
        if ahead.len() > 32 {
            f.write_str("...")?;
        }
        write!(f, "; {}]", self.buffer.len())
    }
}

/// Write cursor over an output buffer.
pub struct WriteCursor<'out> {
    buffer: &'out mut [u8],
    offset: usize,
}

impl<'out> WriteCursor<'out> {
    #[must_use]
    pub fn new(buffer: &'out mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn set_position(&mut self, offset: usize) {
        self.offset = offset;
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(WireError::Underflow {
                needed: bytes.len(),
                remaining,
            });
        }
        self.buffer[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        Ok(())
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<(), WireError> {
        self.write_bytes(&[value])
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) -> Result<(), WireError> {
        self.write_u8(value as u8)
    }

    #[inline]
    pub fn write_i16(&mut self, value: i16) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_i64(&mut self, value: i64) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_u64(&mut self, value: u64) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_f64(&mut self, value: f64) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_u128(&mut self, value: u128) -> Result<(), WireError> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write a ZigZag varint.
    pub fn write_varint(&mut self, value: i64) -> Result<(), WireError> {
        let mut z = zigzag(value);
        loop {
            let byte = (z & 0x7f) as u8;
            z >>= 7;
            if z == 0 {
                return self.write_u8(byte);
            }
            self.write_u8(byte | 0x80)?;
        }
    }

    /// Write a non-negative length or count.
    pub fn write_len(&mut self, len: usize) -> Result<(), WireError> {
        // Lengths beyond i64::MAX are unconstructible on any real machine.
        self.write_varint(len as i64)
    }
}

impl fmt::Debug for WriteCursor<'_> {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriteCursor[{} / {}]", self.offset, self.buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::varint_len;

    #[test]
    fn scalars_are_big_endian() {
        let mut buf = [0u8; 32];
        let mut out = WriteCursor::new(&mut buf);
        out.write_i32(0x0000_001e).unwrap();
        out.write_i16(-2).unwrap();
        out.write_f64(2.0).unwrap();
        let written = out.position();
        assert_eq!(&buf[..4], &[0, 0, 0, 0x1e]);
        assert_eq!(&buf[4..6], &[0xff, 0xfe]);

        let mut input = Cursor::new(&buf[..written]);
        assert_eq!(0x1e, input.read_i32().unwrap());
        assert_eq!(-2, input.read_i16().unwrap());
        assert_eq!(2.0, input.read_f64().unwrap());
        assert!(input.is_at_end());
    }

    #[test]
    fn varint_round_trips() {
        let mut buf = [0u8; 128];
        let values = [0i64, 1, -1, 63, -64, 64, 300, -300, i64::MAX, i64::MIN];
        let mut out = WriteCursor::new(&mut buf);
        for v in values {
            let before = out.position();
            out.write_varint(v).unwrap();
            assert_eq!(varint_len(v), out.position() - before);
        }
        let written = out.position();
        let mut input = Cursor::new(&buf[..written]);
        for v in values {
            assert_eq!(v, input.read_varint().unwrap());
        }
    }

    #[test]
    fn varint_refuses_eleven_continuations() {
        let bytes = [0x80u8; 11];
        let mut input = Cursor::new(&bytes);
        assert_eq!(
            Err(DecodeError::MalformedVarint { at: 0 }),
            input.read_varint()
        );
    }

    #[test]
    fn truncated_reads_report_position() {
        let mut input = Cursor::new(&[1, 2]);
        input.read_u8().unwrap();
        assert_eq!(Err(DecodeError::Truncated { at: 1 }), input.read_i32());
    }

    #[test]
    fn write_overflow_keeps_position() {
        let mut buf = [0u8; 2];
        let mut out = WriteCursor::new(&mut buf);
        out.write_u8(1).unwrap();
        assert!(out.write_i32(5).is_err());
        assert_eq!(1, out.position());
    }

    #[test]
    fn negative_length_is_refused() {
        let mut buf = [0u8; 4];
        let mut out = WriteCursor::new(&mut buf);
        out.write_varint(-1).unwrap();
        let end = out.position();
        let mut input = Cursor::new(&buf[..end]);
        assert!(matches!(
            input.read_len(),
            Err(DecodeError::ValueOverflow { .. })
        ));
    }
}
