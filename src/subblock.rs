//! Concatenates length-prefixed GIF data sub-blocks into a logical byte
//! stream terminated by a zero-length block.

use crate::error::Error;
use crate::reader::StreamReader;

/// Minimum sub-block working-buffer size: six maximum-size (255-byte) sub-blocks.
pub const MIN_BUF_LEN: usize = 6 * 255;
/// Extra bytes reserved past the logical end of buffered data so the bit
/// reader's 32-bit load never walks off the end of the slice.
pub const TAIL_PADDING: usize = 4;

/// Pulls `(len: u8, bytes: len×u8)` sub-blocks into a working buffer,
/// compacting unread residual bytes to the front before refilling.
pub struct SubBlockAssembler<'buf> {
    buf: &'buf mut [u8],
    filled: usize,
    read_offset: usize,
    end_of_frame: bool,
}

impl<'buf> SubBlockAssembler<'buf> {
    /// `buf` must be at least [`MIN_BUF_LEN`] + [`TAIL_PADDING`] bytes.
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self {
            buf,
            filled: 0,
            read_offset: 0,
            end_of_frame: false,
        }
    }

    pub fn end_of_frame(&self) -> bool {
        self.end_of_frame
    }

    /// Bytes available to consume starting at the current read offset.
    #[inline]
    pub fn available(&self) -> usize {
        self.filled - self.read_offset
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[self.read_offset..]
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.read_offset = (self.read_offset + n).min(self.filled);
    }

    /// Resets to the start of a fresh sub-block sequence (used when a new
    /// frame's LZW data begins).
    pub fn reset(&mut self) {
        self.filled = 0;
        self.read_offset = 0;
        self.end_of_frame = false;
    }

    /// Guarantees that after returning, either `available() >= a full code's
    /// worth of bytes` or `end_of_frame()` is set. Compacts residual bytes to
    /// the front, then pulls sub-blocks from `reader` until the working
    /// buffer is close to full or a zero-length terminator block is seen.
    pub fn refill(&mut self, reader: &mut StreamReader) -> Result<(), Error> {
        if self.end_of_frame {
            return Ok(());
        }

        if self.read_offset > 0 {
            let remaining = self.available();
            self.buf.copy_within(self.read_offset..self.filled, 0);
            self.filled = remaining;
            self.read_offset = 0;
        }

        let fill_limit = self.buf.len().saturating_sub(255 + TAIL_PADDING);
        while self.filled < fill_limit {
            let block_len = reader.read_byte()? as usize;
            if block_len == 0 {
                self.end_of_frame = true;
                break;
            }
            reader.read_n(&mut self.buf[self.filled..self.filled + block_len])?;
            self.filled += block_len;
        }

        for b in &mut self.buf[self.filled..self.filled + TAIL_PADDING] {
            *b = 0;
        }

        Ok(())
    }
}
