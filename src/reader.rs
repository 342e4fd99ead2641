//! Bounds-checked sequential reads over the input byte range.

use crate::error::Error;

/// A cursor over an immutable byte slice with saturating skip and
/// short-read detection.
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_byte(&mut self) -> Result<u8, Error> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(Error::EarlyEof("a byte"))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, Error> {
        let lo = self.read_byte()?;
        let hi = self.read_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Reads exactly `dst.len()` bytes. A short read (input exhausted partway
    /// through) is reported as `EarlyEof`; the cursor still advances by the
    /// number of bytes actually available.
    pub fn read_n(&mut self, dst: &mut [u8]) -> Result<(), Error> {
        let available = self.remaining().min(dst.len());
        dst[..available].copy_from_slice(&self.data[self.pos..self.pos + available]);
        self.pos += available;
        if available < dst.len() {
            return Err(Error::EarlyEof("a fixed-size block"));
        }
        Ok(())
    }

    /// Skips up to `len` bytes, saturating at the end of input. Never fails.
    pub fn skip(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.data.len());
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_u16() {
        let mut r = StreamReader::new(&[0x34, 0x12, 0xFF]);
        assert_eq!(r.read_u16_le().unwrap(), 0x1234);
        assert_eq!(r.read_byte().unwrap(), 0xFF);
    }

    #[test]
    fn short_read_reports_early_eof_and_saturates_cursor() {
        let mut r = StreamReader::new(&[1, 2]);
        let mut buf = [0u8; 4];
        assert!(r.read_n(&mut buf).is_err());
        assert!(r.is_at_end());
    }

    #[test]
    fn skip_saturates_at_end() {
        let mut r = StreamReader::new(&[1, 2, 3]);
        r.skip(100);
        assert!(r.is_at_end());
        assert_eq!(r.remaining(), 0);
    }
}
