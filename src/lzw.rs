//! The LZW code dictionary and string expander.
//!
//! Each entry is a `(prefix code, suffix byte)` pair; expanding a code walks
//! the prefix chain backward into a scratch buffer, then unwinds it forward
//! into the output. Codes below the clear code are never stored in the
//! dictionary — they're their own one-byte expansion.

use crate::bitreader::BitReader;
use crate::error::Error;
use crate::reader::StreamReader;
use crate::subblock::SubBlockAssembler;

/// `(prefix_code, suffix_byte)` dictionary entries packed 3 bytes apiece
/// into a caller-supplied byte slice (2-byte little-endian prefix + 1-byte
/// suffix), so the whole table lives in the scratch region without any
/// per-entry heap allocation or unsafe transmutation.
struct Dictionary<'a> {
    buf: &'a mut [u8],
}

impl<'a> Dictionary<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    fn capacity(&self) -> u16 {
        (self.buf.len() / 3) as u16
    }

    fn set(&mut self, code: u16, prefix: u16, suffix: u8) {
        let at = code as usize * 3;
        let [lo, hi] = prefix.to_le_bytes();
        self.buf[at] = lo;
        self.buf[at + 1] = hi;
        self.buf[at + 2] = suffix;
    }

    fn prefix(&self, code: u16) -> u16 {
        let at = code as usize * 3;
        u16::from_le_bytes([self.buf[at], self.buf[at + 1]])
    }

    fn suffix(&self, code: u16) -> u8 {
        self.buf[code as usize * 3 + 2]
    }
}

/// Everything `next_frame` needs to run a single frame's LZW decode:
/// borrowed scratch areas plus the parameters fixed at frame start.
pub struct LzwDecoder<'a> {
    bits: BitReader,
    asm: SubBlockAssembler<'a>,
    dict: Dictionary<'a>,
    chain: &'a mut [u8],
    min_code_size: u8,
    max_code_size: u8,
    clear_code: u16,
    end_code: u16,
    code_size: u8,
    next_code: u16,
    next_lim: u16,
    prev_code: Option<u16>,
}

/// Result of decoding one expanded symbol: the pixel-index bytes to emit,
/// borrowed from the chain-unwind scratch buffer.
pub struct Expansion<'a> {
    pub bytes: &'a [u8],
}

impl<'a> LzwDecoder<'a> {
    pub fn new(
        lzw_buf: &'a mut [u8],
        dict_buf: &'a mut [u8],
        chain_buf: &'a mut [u8],
        min_code_size: u8,
        max_code_size: u8,
    ) -> Self {
        let clear_code = 1u16 << min_code_size;
        let end_code = clear_code + 1;
        let code_size = min_code_size + 1;
        Self {
            bits: BitReader::new(),
            asm: SubBlockAssembler::new(lzw_buf),
            dict: Dictionary::new(dict_buf),
            chain: chain_buf,
            min_code_size,
            max_code_size,
            clear_code,
            end_code,
            code_size,
            next_code: end_code + 1,
            next_lim: 1u16 << code_size,
            prev_code: None,
        }
    }

    /// Resets dictionary/code-width state for a fresh frame (or a CLEAR
    /// code mid-stream); the sub-block assembler and bit reader are reset
    /// separately since they track the underlying byte stream, not the
    /// dictionary.
    fn reset_dictionary(&mut self) {
        log::trace!("LZW dictionary reset, code_size back to {}", self.min_code_size + 1);
        self.code_size = self.min_code_size + 1;
        self.next_code = self.end_code + 1;
        self.next_lim = 1u16 << self.code_size;
        self.prev_code = None;
    }

    /// Call once before decoding a new frame's sub-block sequence.
    pub fn begin_frame(&mut self) {
        self.asm.reset();
        self.bits.reset();
        self.reset_dictionary();
    }

    fn pull_code(&mut self, reader: &mut StreamReader) -> Result<u16, Error> {
        self.bits.pull_code(&mut self.asm, reader, self.code_size)
    }

    fn first_byte_of(&self, mut code: u16) -> u8 {
        while code >= self.clear_code {
            code = self.dict.prefix(code);
        }
        code as u8
    }

    /// Expands `code` into pixel-index bytes, walking the prefix chain
    /// backward into `self.chain` and then handing back a forward-ordered
    /// slice of it.
    fn expand(&mut self, code: u16) -> Result<&[u8], Error> {
        let cap = self.chain.len();
        let mut write_from = cap;
        let mut cur = code;

        loop {
            if write_from == 0 {
                return Err(Error::Decode("dictionary entry exceeds chain scratch capacity"));
            }
            if cur < self.clear_code {
                write_from -= 1;
                self.chain[write_from] = cur as u8;
                break;
            }
            if cur >= self.dict.capacity() || cur >= self.next_code {
                return Err(Error::Decode("LZW code references an unset dictionary entry"));
            }
            write_from -= 1;
            self.chain[write_from] = self.dict.suffix(cur);
            cur = self.dict.prefix(cur);
        }

        Ok(&self.chain[write_from..cap])
    }

    /// Pulls and decodes the next symbol. Returns `None` once the end code
    /// is reached.
    pub fn next_symbol(&mut self, reader: &mut StreamReader) -> Result<Option<Expansion<'_>>, Error> {
        loop {
            let code = self.pull_code(reader)?;

            if code == self.clear_code {
                self.reset_dictionary();
                continue;
            }
            if code == self.end_code {
                return Ok(None);
            }

            let Some(prev) = self.prev_code else {
                // First code after (a possibly implicit) clear: must be a literal.
                if code >= self.clear_code {
                    return Err(Error::Decode("first LZW code after clear must be a literal"));
                }
                self.prev_code = Some(code);
                let cap = self.chain.len();
                self.chain[cap - 1] = code as u8;
                return Ok(Some(Expansion {
                    bytes: &self.chain[cap - 1..cap],
                }));
            };

            let is_kwkwk = code == self.next_code;
            if !is_kwkwk && code > self.next_code {
                return Err(Error::Decode("LZW code exceeds next assignable code"));
            }

            let new_entry_suffix = if is_kwkwk {
                self.first_byte_of(prev)
            } else {
                self.first_byte_of(code)
            };

            if self.next_code < self.dict.capacity() {
                self.dict.set(self.next_code, prev, new_entry_suffix);
                self.next_code += 1;
                if self.next_code == self.next_lim && self.code_size < self.max_code_size {
                    self.code_size += 1;
                    self.next_lim <<= 1;
                }
            }

            self.prev_code = Some(code);

            if is_kwkwk {
                return self.expand_kwkwk(prev, new_entry_suffix);
            }
            let bytes = self.expand(code)?;
            return Ok(Some(Expansion { bytes }));
        }
    }

    fn expand_kwkwk(&mut self, prev: u16, suffix: u8) -> Result<Option<Expansion<'_>>, Error> {
        let cap = self.chain.len();
        let prefix_bytes = self.expand(prev)?;
        let len = prefix_bytes.len();
        if len >= cap {
            return Err(Error::Decode("dictionary entry exceeds chain scratch capacity"));
        }
        let start = cap - len - 1;
        // expand(prev) already left its bytes at [cap-len..cap]; shift them
        // down by one slot to make room for the trailing suffix byte.
        self.chain.copy_within(cap - len..cap, start);
        self.chain[cap - 1] = suffix;
        Ok(Some(Expansion {
            bytes: &self.chain[start..cap],
        }))
    }
}
