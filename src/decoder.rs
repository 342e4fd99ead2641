//! Public API: wires the container driver, LZW decoder, interlace mapper,
//! and compositor together into a single frame-by-frame animation driver.

use crate::compositor::{self, Disposal, Rect};
use crate::container::{self, ExtensionEvent, GraphicControl, BLOCK_EXTENSION, BLOCK_IMAGE, BLOCK_TRAILER};
use crate::error::{Error, ErrorCallback};
use crate::interlace::{sequential_row, InterlaceMapper};
use crate::lzw::LzwDecoder;
use crate::reader::StreamReader;
use crate::scratch::{self, Limits, Scratch};

/// What [`Decoder::next_frame`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    /// A frame was composited into the caller's canvas; show it for
    /// `delay_ms` milliseconds before calling `next_frame` again.
    Decoded { delay_ms: u32 },
    /// The animation has played out its configured loop count. Every
    /// subsequent call returns this until [`Decoder::rewind`] is called.
    Finished,
}

const MAX_PALETTE_ENTRIES: usize = 256;

/// Drives a single GIF's decode from a byte slice and a caller-supplied
/// scratch region, writing frames directly into a caller-supplied RGB888
/// canvas.
pub struct Decoder<'a> {
    reader: StreamReader<'a>,
    scratch: Scratch<'a>,
    limits: Limits,

    width: u16,
    height: u16,
    background_index: u8,

    global_palette: [u8; MAX_PALETTE_ENTRIES * 3],
    local_palette: [u8; MAX_PALETTE_ENTRIES * 3],

    /// Position right after the global color table (or logical screen
    /// descriptor, if there is none): where a loop or an explicit rewind
    /// restarts decoding from.
    anim_start_pos: usize,

    /// Raw NETSCAPE loop-count value; `None` if no such extension has been
    /// observed yet.
    loop_count: Option<u16>,
    loops_played: u32,
    finished: bool,

    /// Graphic control state bound to the next image descriptor only.
    pending_gc: GraphicControl,
    prev_rect: Option<Rect>,
    prev_disposal: Disposal,
    /// Whether the previous frame's disposal-to-previous snapshot actually
    /// captured its rectangle (it may have been skipped for being too large
    /// for the configured restore buffer).
    prev_snapshot_valid: bool,
    /// Whether an image block has been decoded since the last time decoding
    /// started or restarted at `anim_start_pos`; lets a trailer reached
    /// without any frame in between be reported instead of looping forever.
    saw_image_this_pass: bool,

    error_callback: Option<ErrorCallback>,
}

impl<'a> Decoder<'a> {
    /// Bytes [`Decoder::init`] requires in its `scratch` argument for the
    /// given limits.
    pub fn required_scratch_len(limits: &Limits) -> usize {
        scratch::required_len(limits)
    }

    /// Parses the header, logical screen descriptor, and (if present) the
    /// global color table, then stops just before the first extension or
    /// image block. No frame is decoded yet.
    pub fn init(input: &'a [u8], scratch_raw: &'a mut [u8], limits: Limits) -> Result<Self, Error> {
        if input.is_empty() {
            return Err(Error::InvalidParam);
        }
        let scratch = scratch::partition(scratch_raw, &limits)?;

        let mut reader = StreamReader::new(input);
        container::parse_header(&mut reader)?;
        let screen = container::parse_logical_screen_descriptor(&mut reader)?;

        if screen.width > limits.max_width {
            return Err(Error::InvalidFrameDimensions(
                "logical screen width exceeds configured max_width",
            ));
        }

        let mut global_palette = [0u8; MAX_PALETTE_ENTRIES * 3];
        if screen.has_global_table {
            container::parse_color_table(
                &mut reader,
                screen.global_table_size,
                limits.max_colors,
                &mut global_palette,
            )?;
            if (screen.background_index as usize) >= screen.global_table_size {
                return Err(Error::BadFile("background color index is outside the global color table"));
            }
        }

        let anim_start_pos = reader.pos();

        Ok(Self {
            reader,
            scratch,
            limits,
            width: screen.width,
            height: screen.height,
            background_index: screen.background_index,
            global_palette,
            local_palette: [0u8; MAX_PALETTE_ENTRIES * 3],
            anim_start_pos,
            loop_count: None,
            loops_played: 0,
            finished: false,
            pending_gc: GraphicControl::default(),
            prev_rect: None,
            prev_disposal: Disposal::Unspecified,
            prev_snapshot_valid: false,
            saw_image_this_pass: false,
            error_callback: None,
        })
    }

    /// Logical screen dimensions, valid for the whole animation.
    pub fn get_info(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Installs a sink for error/warning notifications. The return value of
    /// the call that failed is always authoritative; the callback is purely
    /// informational, and always receives a fully formatted message rather
    /// than a format string.
    pub fn set_error_callback(&mut self, cb: ErrorCallback) {
        self.error_callback = Some(cb);
    }

    /// Restarts decoding from the first frame, resetting the loop counter
    /// and clearing `Finished` state.
    pub fn rewind(&mut self) {
        self.seek_to_anim_start();
        self.loops_played = 0;
        self.finished = false;
    }

    fn seek_to_anim_start(&mut self) {
        self.reader.set_pos(self.anim_start_pos);
        self.prev_rect = None;
        self.prev_disposal = Disposal::Unspecified;
        self.prev_snapshot_valid = false;
        self.pending_gc = GraphicControl::default();
        self.saw_image_this_pass = false;
    }

    /// Decodes and composites the next frame into `canvas`
    /// (`width * height * 3` bytes, row-major RGB888), or reports that the
    /// animation has finished.
    pub fn next_frame(&mut self, canvas: &mut [u8]) -> Result<FrameResult, Error> {
        let result = self.next_frame_inner(canvas);
        if let Err(err) = &result {
            if let Some(cb) = self.error_callback {
                cb(err);
            }
        }
        result
    }

    fn next_frame_inner(&mut self, canvas: &mut [u8]) -> Result<FrameResult, Error> {
        if self.finished {
            return Ok(FrameResult::Finished);
        }
        let expected_canvas_len = self.width as usize * self.height as usize * 3;
        if canvas.len() < expected_canvas_len {
            return Err(Error::InvalidParam);
        }

        loop {
            let block = self.reader.read_byte()?;
            match block {
                BLOCK_TRAILER => {
                    if let Some(result) = self.on_trailer()? {
                        return Ok(result);
                    }
                    continue;
                }
                BLOCK_EXTENSION => {
                    match container::parse_extension(&mut self.reader)? {
                        ExtensionEvent::GraphicControl(gc) => self.pending_gc = gc,
                        ExtensionEvent::LoopCount(n) => self.loop_count = Some(n),
                        ExtensionEvent::Other => {}
                    }
                    continue;
                }
                BLOCK_IMAGE => return self.decode_image(canvas),
                _ => return Err(Error::BadFile("unexpected byte where a block introducer was expected")),
            }
        }
    }

    /// Advances the loop counter on a trailer byte. Returns `Ok(Some(Finished))`
    /// if the animation is done; returns `Ok(None)` (after rewinding internal
    /// position) if another pass should begin. Fails with `NoFrame` if this
    /// pass reached the trailer without decoding a single image block, since
    /// looping back would otherwise spin forever.
    fn on_trailer(&mut self) -> Result<Option<FrameResult>, Error> {
        if !self.saw_image_this_pass {
            return Err(Error::NoFrame);
        }
        self.loops_played += 1;
        let should_continue = match self.loop_count {
            // No NETSCAPE loop extension observed: the convention adopted
            // here is that this means loop forever, not play once.
            None => true,
            Some(0) => self.loops_played < 1,
            Some(k) => self.loops_played < k as u32 + 1,
        };
        if should_continue {
            self.seek_to_anim_start();
            Ok(None)
        } else {
            self.finished = true;
            Ok(Some(FrameResult::Finished))
        }
    }

    fn decode_image(&mut self, canvas: &mut [u8]) -> Result<FrameResult, Error> {
        let desc = container::parse_image_descriptor(&mut self.reader)?;
        self.saw_image_this_pass = true;
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidFrameDimensions("frame width/height must be nonzero"));
        }
        if desc.x_off as u32 + desc.width as u32 > self.width as u32
            || desc.y_off as u32 + desc.height as u32 > self.height as u32
        {
            return Err(Error::InvalidFrameDimensions("frame rectangle extends beyond the canvas"));
        }
        if desc.width > self.limits.max_width {
            return Err(Error::InvalidFrameDimensions("frame width exceeds configured max_width"));
        }

        if desc.has_local_table {
            container::parse_color_table(
                &mut self.reader,
                desc.local_table_size,
                self.limits.max_colors,
                &mut self.local_palette,
            )?;
        }

        let min_code_size = self.reader.read_byte()?;
        if min_code_size < 2 || min_code_size >= self.limits.max_code_size {
            return Err(Error::BadFile("LZW minimum code size out of range"));
        }

        let rect = Rect {
            x_off: desc.x_off,
            y_off: desc.y_off,
            width: desc.width,
            height: desc.height,
        };
        let gc = self.pending_gc;
        let canvas_width = self.width;
        let background_index = self.background_index;

        // Dispose of the *previous* frame's rectangle before drawing this one.
        if let Some(prev_rect) = self.prev_rect {
            match self.prev_disposal {
                Disposal::RestoreBackground => {
                    // The background color index always refers to the
                    // global color table, regardless of which palette the
                    // disposed frame itself used.
                    compositor::restore_background(
                        canvas,
                        canvas_width,
                        prev_rect,
                        &self.global_palette[..],
                        background_index,
                    );
                }
                Disposal::RestorePrevious => {
                    if self.prev_snapshot_valid {
                        compositor::restore_rect(canvas, canvas_width, prev_rect, self.scratch.restore_buf);
                    } else {
                        log::warn!(
                            "skipping disposal-to-previous restore: no snapshot was captured for the previous frame"
                        );
                    }
                }
                Disposal::Unspecified | Disposal::KeepInPlace => {}
            }
        }

        // Snapshot this frame's rectangle before drawing it, if this frame
        // itself asks to be restored-to-previous once it is replaced. Whether
        // the snapshot actually succeeded is remembered so the *next* frame
        // knows whether a restore is safe to perform.
        self.prev_snapshot_valid = if gc.disposal == Disposal::RestorePrevious {
            if desc.height <= self.limits.max_restore_height {
                let ok = compositor::snapshot_rect(canvas, canvas_width, rect, self.scratch.restore_buf);
                if !ok {
                    log::warn!("disposal-to-previous snapshot buffer too small for this frame's rectangle");
                }
                ok
            } else {
                log::warn!(
                    "frame height {} exceeds configured max_restore_height, disposal-to-previous degraded",
                    desc.height
                );
                false
            }
        } else {
            false
        };

        let palette: &[u8] = if desc.has_local_table {
            &self.local_palette[..]
        } else {
            &self.global_palette[..]
        };

        let mut lzw = LzwDecoder::new(
            self.scratch.lzw_buf,
            self.scratch.dict_buf,
            self.scratch.chain_buf,
            min_code_size,
            self.limits.max_code_size,
        );
        lzw.begin_frame();

        let mut mapper = InterlaceMapper::new();
        let mut row: u16 = 0;
        let mut col: usize = 0;
        let width = desc.width as usize;
        let total_pixels = width * desc.height as usize;
        let mut pixels_emitted: usize = 0;

        while let Some(expansion) = lzw.next_symbol(&mut self.reader)? {
            let mut bytes = expansion.bytes;
            while !bytes.is_empty() {
                let space = width - col;
                let take = space.min(bytes.len());
                self.scratch.line_buf[col..col + take].copy_from_slice(&bytes[..take]);
                col += take;
                bytes = &bytes[take..];
                pixels_emitted += take;

                if col == width {
                    if row >= desc.height {
                        return Err(Error::Decode(
                            "LZW stream emitted more pixels than the frame's rectangle holds",
                        ));
                    }
                    let local_row = if desc.interlace {
                        mapper.next_row(desc.height)?
                    } else {
                        sequential_row(row)
                    };
                    let canvas_y = desc.y_off + local_row;
                    compositor::composite_line(
                        canvas,
                        canvas_width,
                        canvas_y,
                        desc.x_off,
                        &self.scratch.line_buf[..width],
                        palette,
                        background_index,
                        gc.transparent_index,
                        gc.disposal,
                    )?;
                    col = 0;
                    row += 1;
                }
            }
        }

        if pixels_emitted < total_pixels {
            return Err(Error::Decode(
                "LZW stream ended before the frame's rectangle was fully decoded",
            ));
        }

        self.prev_rect = Some(rect);
        self.prev_disposal = gc.disposal;
        self.pending_gc = GraphicControl::default();

        Ok(FrameResult::Decoded { delay_ms: gc.delay_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_sub_blocks(out: &mut Vec<u8>, data: &[u8]) {
        for chunk in data.chunks(255) {
            out.push(chunk.len() as u8);
            out.extend_from_slice(chunk);
        }
        out.push(0);
    }

    /// Bit-packs LZW codes of (possibly growing) width, LSB-first.
    fn pack_codes(codes: &[(u16, u8)]) -> Vec<u8> {
        let mut bitbuf: u32 = 0;
        let mut bitlen: u32 = 0;
        let mut bytes = Vec::new();
        for &(code, width) in codes {
            bitbuf |= (code as u32) << bitlen;
            bitlen += width as u32;
            while bitlen >= 8 {
                bytes.push((bitbuf & 0xFF) as u8);
                bitbuf >>= 8;
                bitlen -= 8;
            }
        }
        if bitlen > 0 {
            bytes.push((bitbuf & 0xFF) as u8);
        }
        bytes
    }

    /// Appends a NETSCAPE2.0 loop-count extension (`loop_count` is the raw
    /// sub-block value: 0 means "play once", k>0 means "play k+1 times").
    fn push_loop_extension(gif: &mut Vec<u8>, loop_count: u16) {
        gif.push(BLOCK_EXTENSION);
        gif.push(0xFF);
        gif.push(11);
        gif.extend_from_slice(b"NETSCAPE2.0");
        gif.push(3);
        gif.push(1);
        gif.extend_from_slice(&loop_count.to_le_bytes());
        gif.push(0);
    }

    /// Builds a minimal single-frame, non-interlaced, 2x1 GIF with a global
    /// 2-color table: pixel 0 black, pixel 1 white, codes [1, 0, END].
    /// Carries an explicit "play once" loop extension.
    fn minimal_gif() -> Vec<u8> {
        let mut gif = Vec::new();
        gif.extend_from_slice(b"GIF89a");
        gif.extend_from_slice(&2u16.to_le_bytes()); // width
        gif.extend_from_slice(&1u16.to_le_bytes()); // height
        gif.push(0b1000_0000); // global table present, 2 entries
        gif.push(0); // background index
        gif.push(0); // aspect ratio
        gif.extend_from_slice(&[0, 0, 0, 255, 255, 255]); // palette

        push_loop_extension(&mut gif, 0);

        gif.push(BLOCK_IMAGE);
        gif.extend_from_slice(&0u16.to_le_bytes()); // x
        gif.extend_from_slice(&0u16.to_le_bytes()); // y
        gif.extend_from_slice(&2u16.to_le_bytes()); // width
        gif.extend_from_slice(&1u16.to_le_bytes()); // height
        gif.push(0); // no local table, no interlace

        gif.push(2); // min code size -> clear=4, end=5, code_size=3
        let codes = [(1u16, 3u8), (0, 3), (5, 3)];
        let lzw_data = pack_codes(&codes);
        push_sub_blocks(&mut gif, &lzw_data);

        gif.push(BLOCK_TRAILER);
        gif
    }

    #[test]
    fn decodes_minimal_static_frame_then_finishes() {
        let gif = minimal_gif();
        let limits = Limits::default();
        let mut scratch = vec![0u8; Decoder::required_scratch_len(&limits)];
        let mut dec = Decoder::init(&gif, &mut scratch, limits).unwrap();
        assert_eq!(dec.get_info(), (2, 1));

        let mut canvas = vec![0u8; 2 * 1 * 3];
        let result = dec.next_frame(&mut canvas).unwrap();
        assert_eq!(result, FrameResult::Decoded { delay_ms: 0 });
        assert_eq!(canvas, vec![255, 255, 255, 0, 0, 0]);

        assert_eq!(dec.next_frame(&mut canvas).unwrap(), FrameResult::Finished);
        assert_eq!(dec.next_frame(&mut canvas).unwrap(), FrameResult::Finished);
    }

    #[test]
    fn rewind_restarts_the_animation() {
        let gif = minimal_gif();
        let limits = Limits::default();
        let mut scratch = vec![0u8; Decoder::required_scratch_len(&limits)];
        let mut dec = Decoder::init(&gif, &mut scratch, limits).unwrap();
        let mut canvas = vec![0u8; 2 * 1 * 3];

        dec.next_frame(&mut canvas).unwrap();
        assert_eq!(dec.next_frame(&mut canvas).unwrap(), FrameResult::Finished);

        dec.rewind();
        let result = dec.next_frame(&mut canvas).unwrap();
        assert_eq!(result, FrameResult::Decoded { delay_ms: 0 });
    }

    #[test]
    fn missing_loop_extension_means_play_forever() {
        // Same frame as `minimal_gif`, but with no NETSCAPE extension at all.
        let mut gif = Vec::new();
        gif.extend_from_slice(b"GIF89a");
        gif.extend_from_slice(&2u16.to_le_bytes());
        gif.extend_from_slice(&1u16.to_le_bytes());
        gif.push(0b1000_0000);
        gif.push(0);
        gif.push(0);
        gif.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        gif.push(BLOCK_IMAGE);
        gif.extend_from_slice(&0u16.to_le_bytes());
        gif.extend_from_slice(&0u16.to_le_bytes());
        gif.extend_from_slice(&2u16.to_le_bytes());
        gif.extend_from_slice(&1u16.to_le_bytes());
        gif.push(0);
        gif.push(2);
        let lzw_data = pack_codes(&[(1u16, 3u8), (0, 3), (5, 3)]);
        push_sub_blocks(&mut gif, &lzw_data);
        gif.push(BLOCK_TRAILER);

        let limits = Limits::default();
        let mut scratch = vec![0u8; Decoder::required_scratch_len(&limits)];
        let mut dec = Decoder::init(&gif, &mut scratch, limits).unwrap();
        let mut canvas = vec![0u8; 2 * 1 * 3];

        for _ in 0..3 {
            let result = dec.next_frame(&mut canvas).unwrap();
            assert_eq!(result, FrameResult::Decoded { delay_ms: 0 });
        }
    }

    #[test]
    fn rejects_empty_input() {
        let limits = Limits::default();
        let mut scratch = vec![0u8; Decoder::required_scratch_len(&limits)];
        assert!(Decoder::init(&[], &mut scratch, limits).is_err());
    }

    #[test]
    fn error_callback_receives_notifications() {
        use core::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn cb(_err: &Error) {
            CALLS.fetch_add(1, Ordering::SeqCst);
        }

        let limits = Limits::default();
        let mut scratch = vec![0u8; Decoder::required_scratch_len(&limits)];
        let gif = minimal_gif();
        let mut dec = Decoder::init(&gif, &mut scratch, limits).unwrap();
        dec.set_error_callback(cb);

        let mut too_small_canvas = vec![0u8; 1];
        assert!(dec.next_frame(&mut too_small_canvas).is_err());
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lzw_end_before_frame_is_full_is_reported_as_decode_error() {
        // 2x2 frame whose LZW stream is [CLEAR, 1, END]: one literal pixel
        // then immediate end, leaving 3 of the frame's 4 pixels unwritten.
        let mut gif = Vec::new();
        gif.extend_from_slice(b"GIF89a");
        gif.extend_from_slice(&2u16.to_le_bytes());
        gif.extend_from_slice(&2u16.to_le_bytes());
        gif.push(0b1000_0000);
        gif.push(0);
        gif.push(0);
        gif.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        gif.push(BLOCK_IMAGE);
        gif.extend_from_slice(&0u16.to_le_bytes());
        gif.extend_from_slice(&0u16.to_le_bytes());
        gif.extend_from_slice(&2u16.to_le_bytes());
        gif.extend_from_slice(&2u16.to_le_bytes());
        gif.push(0);
        gif.push(2); // min code size -> clear=4, end=5, code_size=3
        let lzw_data = pack_codes(&[(4u16, 3u8), (1, 3), (5, 3)]);
        push_sub_blocks(&mut gif, &lzw_data);
        gif.push(BLOCK_TRAILER);

        let limits = Limits::default();
        let mut scratch = vec![0u8; Decoder::required_scratch_len(&limits)];
        let mut dec = Decoder::init(&gif, &mut scratch, limits).unwrap();
        let mut canvas = vec![0u8; 2 * 2 * 3];
        assert_eq!(dec.next_frame(&mut canvas), Err(Error::Decode(
            "LZW stream ended before the frame's rectangle was fully decoded",
        )));
    }

    #[test]
    fn trailer_with_no_image_block_is_reported_as_no_frame() {
        let mut gif = Vec::new();
        gif.extend_from_slice(b"GIF89a");
        gif.extend_from_slice(&2u16.to_le_bytes());
        gif.extend_from_slice(&1u16.to_le_bytes());
        gif.push(0b1000_0000);
        gif.push(0);
        gif.push(0);
        gif.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        gif.push(BLOCK_TRAILER);

        let limits = Limits::default();
        let mut scratch = vec![0u8; Decoder::required_scratch_len(&limits)];
        let mut dec = Decoder::init(&gif, &mut scratch, limits).unwrap();
        let mut canvas = vec![0u8; 2 * 1 * 3];
        assert_eq!(dec.next_frame(&mut canvas), Err(Error::NoFrame));
    }
}
