//! Partitions one caller-supplied scratch region into the working areas the
//! decoder needs, with no further allocation after that.

use crate::error::Error;
use crate::subblock;

/// Compile-time defaults for the size-dependent limits.
pub const DEFAULT_MAX_WIDTH: u16 = 480;
pub const DEFAULT_MAX_COLORS: usize = 256;
pub const DEFAULT_MAX_CODE_SIZE: u8 = 12;
/// Added: caps the disposal-method-3 snapshot buffer, mirroring `MAX_WIDTH`.
pub const DEFAULT_MAX_RESTORE_HEIGHT: u16 = 480;

/// Per-decode configuration: a library consumer targeting a different
/// screen size doesn't need to recompile.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Upper bound on canvas/frame width.
    pub max_width: u16,
    /// Rejection threshold for palette sizes.
    pub max_colors: usize,
    /// Upper bound on LZW code width.
    pub max_code_size: u8,
    /// Upper bound on the frame height a disposal-method-3 snapshot can cover;
    /// larger frames still decode, but lose disposal-to-previous fidelity.
    pub max_restore_height: u16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_colors: DEFAULT_MAX_COLORS,
            max_code_size: DEFAULT_MAX_CODE_SIZE,
            max_restore_height: DEFAULT_MAX_RESTORE_HEIGHT,
        }
    }
}

fn dict_capacity(limits: &Limits) -> usize {
    1usize << limits.max_code_size
}

/// Total bytes [`partition`] requires from the caller's scratch slice.
pub fn required_len(limits: &Limits) -> usize {
    let lzw_buf = subblock::MIN_BUF_LEN + subblock::TAIL_PADDING;
    let dict_buf = dict_capacity(limits) * 3; // 2-byte prefix code + 1-byte suffix per entry
    let line_buf = limits.max_width as usize;
    let restore_buf = limits.max_width as usize * limits.max_restore_height as usize * 3;
    // A dictionary entry's expansion length can never exceed the number of
    // entries created so far (each new entry is exactly one byte longer than
    // its prefix), so bounding the chain-unwind scratch at the table's
    // capacity can never overflow.
    let chain_buf = dict_capacity(limits);
    lzw_buf + dict_buf + line_buf + restore_buf + chain_buf
}

/// The caller-supplied scratch region, split into its working areas.
pub struct Scratch<'a> {
    pub lzw_buf: &'a mut [u8],
    pub dict_buf: &'a mut [u8],
    pub line_buf: &'a mut [u8],
    pub restore_buf: &'a mut [u8],
    pub chain_buf: &'a mut [u8],
}

/// Splits `raw` into the working areas the decoder needs. Fails with
/// [`Error::BufferTooSmall`] (carrying the exact required size) if `raw` is
/// undersized.
pub fn partition<'a>(raw: &'a mut [u8], limits: &Limits) -> Result<Scratch<'a>, Error> {
    let required = required_len(limits);
    if raw.len() < required {
        return Err(Error::BufferTooSmall {
            required,
            available: raw.len(),
        });
    }

    let (lzw_buf, rest) = raw.split_at_mut(subblock::MIN_BUF_LEN + subblock::TAIL_PADDING);
    let (dict_buf, rest) = rest.split_at_mut(dict_capacity(limits) * 3);
    let (line_buf, rest) = rest.split_at_mut(limits.max_width as usize);
    let (restore_buf, rest) =
        rest.split_at_mut(limits.max_width as usize * limits.max_restore_height as usize * 3);
    let (chain_buf, _) = rest.split_at_mut(dict_capacity(limits));

    Ok(Scratch {
        lzw_buf,
        dict_buf,
        line_buf,
        restore_buf,
        chain_buf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_undersized_buffer_with_exact_requirement() {
        let limits = Limits::default();
        let need = required_len(&limits);
        let mut too_small = vec![0u8; need - 1];
        let err = partition(&mut too_small, &limits).unwrap_err();
        match err {
            Error::BufferTooSmall { required, available } => {
                assert_eq!(required, need);
                assert_eq!(available, need - 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn partitions_exact_size_buffer() {
        let limits = Limits::default();
        let need = required_len(&limits);
        let mut buf = vec![0u8; need];
        let scratch = partition(&mut buf, &limits).unwrap();
        assert_eq!(scratch.line_buf.len(), limits.max_width as usize);
    }
}
