//! Small free functions with no better home.

/// GIF delay times are specified in hundredths of a second; the public API
/// reports milliseconds instead, since that is what every real frame-timer
/// API actually wants.
#[inline]
pub fn centiseconds_to_millis(cs: u16) -> u32 {
    cs as u32 * 10
}
