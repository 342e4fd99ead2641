//! Translates (pass, line-in-pass) into a canvas row, for GIF's four-pass
//! interlacing.

use crate::error::Error;

const PASS_START: [u16; 4] = [0, 4, 2, 1];
const PASS_STRIDE: [u16; 4] = [8, 8, 4, 2];

/// Walks the four interlace passes, handing out a destination row for each
/// source line in turn, advancing to the next pass once the current one runs
/// past `frame_height`.
pub struct InterlaceMapper {
    pass: usize,
    line_in_pass: u16,
}

impl InterlaceMapper {
    pub fn new() -> Self {
        Self {
            pass: 0,
            line_in_pass: 0,
        }
    }

    /// Returns the next destination row (relative to the frame's origin,
    /// i.e. add `y_off` to get the canvas row) and advances internal state.
    pub fn next_row(&mut self, frame_height: u16) -> Result<u16, Error> {
        loop {
            if self.pass >= PASS_START.len() {
                return Err(Error::Decode(
                    "interlaced line address exceeded frame height in all passes",
                ));
            }
            let y = PASS_START[self.pass] + self.line_in_pass * PASS_STRIDE[self.pass];
            if y >= frame_height {
                log::trace!("interlace pass {} exhausted at height {frame_height}, advancing", self.pass);
                self.pass += 1;
                self.line_in_pass = 0;
                continue;
            }
            self.line_in_pass += 1;
            return Ok(y);
        }
    }
}

impl Default for InterlaceMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-interlaced row address: identity mapping.
#[inline]
pub fn sequential_row(line_index: u16) -> u16 {
    line_index
}
