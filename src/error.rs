//! Error taxonomy for the decoder, and the error-callback type.

use thiserror::Error;

/// Everything that can go wrong while initializing or driving a [`crate::decoder::Decoder`].
///
/// Each variant's [`core::fmt::Display`] implementation is the fully formatted
/// message handed to the error callback: no format string ever crosses that
/// boundary, only a finished `&str`-shaped message.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A required input to an API call was missing or malformed (e.g. a zero-length input slice).
    #[error("invalid parameter passed to decoder API")]
    InvalidParam,

    /// The caller-supplied scratch region is smaller than [`crate::scratch::required_len`] computes.
    #[error("scratch region too small: need at least {required} bytes, got {available}")]
    BufferTooSmall {
        /// Bytes required by the current [`crate::decoder::Limits`].
        required: usize,
        /// Bytes actually supplied.
        available: usize,
    },

    /// Signature mismatch, unexpected separator byte, or malformed extension framing.
    #[error("malformed GIF container: {0}")]
    BadFile(&'static str),

    /// The required byte range exceeds the input size.
    #[error("unexpected end of input while reading {0}")]
    EarlyEof(&'static str),

    /// An LZW stream violation: invalid code, dictionary overrun, premature end, or
    /// an interlace mapping that overflows the frame height.
    #[error("LZW decode error: {0}")]
    Decode(&'static str),

    /// A full pass from the start of the animation to the trailer produced no
    /// image block at all, so looping back to the start would spin forever
    /// without ever decoding a frame.
    #[error("animation contains no image blocks")]
    NoFrame,

    /// A frame has zero width/height, or its rectangle extends beyond the canvas.
    #[error("invalid frame dimensions: {0}")]
    InvalidFrameDimensions(&'static str),

    /// A color table claims more entries than the configured `max_colors` limit.
    #[error("color table has {found} entries, more than the configured limit of {limit}")]
    UnsupportedColorDepth {
        /// Entries the color table claims to have.
        found: usize,
        /// Configured ceiling ([`crate::decoder::Limits::max_colors`]).
        limit: usize,
    },
}

/// Optional sink for error/warning notifications.
///
/// Installed with [`crate::decoder::Decoder::set_error_callback`]. By default no
/// callback is installed and notifications are silent; the return value of the
/// failing call is always authoritative regardless of whether a callback is set.
pub type ErrorCallback = fn(error: &Error);
