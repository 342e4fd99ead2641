//! Extracts LSB-first, variable-width (3..=12 bit) codes out of the byte
//! stream the sub-block assembler produces.
//!
//! The accumulator loads 4 bytes at a time and shifts/masks by the bit
//! cursor; the refill trigger fires once fewer than four buffered bytes
//! remain (see `ensure_capacity`), so most pulls skip the refill check
//! entirely.

use crate::error::Error;
use crate::reader::StreamReader;
use crate::subblock::SubBlockAssembler;

/// Bytes needed in the accumulator window for a single code pull: two bytes
/// can hold any 12-bit code regardless of bit alignment, plus 2 bytes of
/// headroom so the final pull before end-of-frame still has a full 32-bit
/// load available.
const ACCUMULATOR_BYTES: usize = 4;

pub struct BitReader {
    byte_pos: usize,
    bit_pos: u8,
}

impl BitReader {
    pub fn new() -> Self {
        Self {
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Realigns to the start of a freshly reset [`SubBlockAssembler`], e.g.
    /// when a new frame's LZW data begins.
    pub fn reset(&mut self) {
        self.byte_pos = 0;
        self.bit_pos = 0;
    }

    fn ensure_capacity(
        &mut self,
        asm: &mut SubBlockAssembler,
        reader: &mut StreamReader,
    ) -> Result<(), Error> {
        let remaining = asm.available().saturating_sub(self.byte_pos);
        if remaining < ACCUMULATOR_BYTES && !asm.end_of_frame() {
            asm.advance(self.byte_pos);
            self.byte_pos = 0;
            asm.refill(reader)?;
        }
        Ok(())
    }

    /// Pulls a single `code_size`-bit code, LSB-first. `code_size` must be
    /// in `3..=12`.
    pub fn pull_code(
        &mut self,
        asm: &mut SubBlockAssembler,
        reader: &mut StreamReader,
        code_size: u8,
    ) -> Result<u16, Error> {
        self.ensure_capacity(asm, reader)?;

        let data = asm.data();
        let remaining = data.len().saturating_sub(self.byte_pos);
        if remaining == 0 {
            return Err(Error::Decode("LZW code stream ended before an end code"));
        }

        let mut window = [0u8; 4];
        let n = remaining.min(4);
        window[..n].copy_from_slice(&data[self.byte_pos..self.byte_pos + n]);
        let acc = u32::from_le_bytes(window);

        let mask = (1u32 << code_size) - 1;
        let code = ((acc >> self.bit_pos) & mask) as u16;

        let total_bits = self.bit_pos as u32 + code_size as u32;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;

        Ok(code)
    }
}

impl Default for BitReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subblock::{SubBlockAssembler, MIN_BUF_LEN, TAIL_PADDING};

    fn encode_sub_blocks(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in bytes.chunks(255) {
            out.push(chunk.len() as u8);
            out.extend_from_slice(chunk);
        }
        out.push(0);
        out
    }

    #[test]
    fn pulls_packed_codes_lsb_first() {
        // Four 3-bit codes: 5, 3, 1, 7 packed LSB-first into bytes.
        // byte0 bits0..7 = 1,0,1,1,1,0,1,0 = 0x5D; byte1 bits0..3 = 0,1,1,1 = 0x0E
        let encoded = encode_sub_blocks(&[0x5D, 0x0E]);
        let mut stream = StreamReader::new(&encoded);
        let mut buf = [0u8; MIN_BUF_LEN + TAIL_PADDING];
        let mut asm = SubBlockAssembler::new(&mut buf);
        asm.refill(&mut stream).unwrap();

        let mut bits = BitReader::new();
        assert_eq!(bits.pull_code(&mut asm, &mut stream, 3).unwrap(), 5);
        assert_eq!(bits.pull_code(&mut asm, &mut stream, 3).unwrap(), 3);
        assert_eq!(bits.pull_code(&mut asm, &mut stream, 3).unwrap(), 1);
        assert_eq!(bits.pull_code(&mut asm, &mut stream, 3).unwrap(), 7);
    }
}
