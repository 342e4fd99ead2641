//! The container driver — header, logical screen descriptor, palettes,
//! extensions, and image descriptors.

use crate::compositor::Disposal;
use crate::error::Error;
use crate::reader::StreamReader;
use crate::util::centiseconds_to_millis;

pub const BLOCK_IMAGE: u8 = 0x2C;
pub const BLOCK_EXTENSION: u8 = 0x21;
pub const BLOCK_TRAILER: u8 = 0x3B;

const EXT_GRAPHIC_CONTROL: u8 = 0xF9;
const EXT_APPLICATION: u8 = 0xFF;
const EXT_PLAIN_TEXT: u8 = 0x01;
const EXT_COMMENT: u8 = 0xFE;

/// Logical screen descriptor: canvas size, optional global palette, and
/// the index used to fill the canvas before any frame is drawn.
pub struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub background_index: u8,
    pub has_global_table: bool,
    pub global_table_size: usize,
}

/// A frame's graphic control extension state, bound to the next image
/// descriptor only (section 4.7's "bind scope" rule).
#[derive(Clone, Copy, Default)]
pub struct GraphicControl {
    pub disposal: Disposal,
    pub transparent_index: Option<u8>,
    pub delay_ms: u32,
}

/// An image descriptor, immediately followed (if present) by a local color
/// table, then the LZW minimum code size and sub-block data.
pub struct ImageDescriptor {
    pub x_off: u16,
    pub y_off: u16,
    pub width: u16,
    pub height: u16,
    pub interlace: bool,
    pub has_local_table: bool,
    pub local_table_size: usize,
}

/// What was found while scanning for the next image descriptor.
pub enum ExtensionEvent {
    GraphicControl(GraphicControl),
    /// NETSCAPE2.0 / ANIMEXTS1.0 loop-count sub-block.
    LoopCount(u16),
    /// Comment, plain text, or any other extension label: discarded.
    Other,
}

pub fn parse_header(reader: &mut StreamReader) -> Result<(), Error> {
    let mut sig = [0u8; 6];
    reader.read_n(&mut sig)?;
    if &sig != b"GIF87a" && &sig != b"GIF89a" {
        return Err(Error::BadFile("signature is not GIF87a/GIF89a"));
    }
    Ok(())
}

pub fn parse_logical_screen_descriptor(
    reader: &mut StreamReader,
) -> Result<ScreenDescriptor, Error> {
    let width = reader.read_u16_le()?;
    let height = reader.read_u16_le()?;
    let packed = reader.read_byte()?;
    let background_index = reader.read_byte()?;
    reader.read_byte()?; // pixel aspect ratio, unused

    let has_global_table = packed & 0x80 != 0;
    let global_table_size = 1usize << ((packed & 0x07) + 1);

    Ok(ScreenDescriptor {
        width,
        height,
        background_index,
        has_global_table,
        global_table_size,
    })
}

/// Reads `entries` RGB888 triples into `dst` (which must be at least
/// `entries * 3` bytes), rejecting tables larger than `max_colors`.
pub fn parse_color_table(
    reader: &mut StreamReader,
    entries: usize,
    max_colors: usize,
    dst: &mut [u8],
) -> Result<(), Error> {
    if entries > max_colors {
        return Err(Error::UnsupportedColorDepth {
            found: entries,
            limit: max_colors,
        });
    }
    reader.read_n(&mut dst[..entries * 3])
}

fn discard_sub_blocks(reader: &mut StreamReader) -> Result<(), Error> {
    loop {
        let len = reader.read_byte()? as usize;
        if len == 0 {
            return Ok(());
        }
        reader.skip(len);
        if reader.is_at_end() {
            return Err(Error::EarlyEof("sub-block data"));
        }
    }
}

fn parse_graphic_control(reader: &mut StreamReader) -> Result<GraphicControl, Error> {
    let block_size = reader.read_byte()?;
    if block_size != 4 {
        return Err(Error::BadFile("graphic control extension has wrong block size"));
    }
    let packed = reader.read_byte()?;
    let delay_ms = centiseconds_to_millis(reader.read_u16_le()?);
    let transparent_index_byte = reader.read_byte()?;
    let terminator = reader.read_byte()?;
    if terminator != 0 {
        return Err(Error::BadFile("graphic control extension missing terminator"));
    }

    let disposal = Disposal::from_packed((packed >> 2) & 0x07);
    let has_transparency = packed & 0x01 != 0;

    Ok(GraphicControl {
        disposal,
        transparent_index: has_transparency.then_some(transparent_index_byte),
        delay_ms,
    })
}

/// NETSCAPE2.0 / ANIMEXTS1.0 application extension: looks for the `0x01`
/// sub-block carrying a 16-bit loop count; any other application extension
/// (or a malformed sub-block) is discarded like an unrecognized extension.
fn parse_application_extension(reader: &mut StreamReader) -> Result<ExtensionEvent, Error> {
    let block_size = reader.read_byte()?;
    if block_size != 11 {
        reader.skip(block_size as usize);
        discard_sub_blocks(reader)?;
        return Ok(ExtensionEvent::Other);
    }
    let mut app_id = [0u8; 8];
    let mut auth_code = [0u8; 3];
    reader.read_n(&mut app_id)?;
    reader.read_n(&mut auth_code)?;

    let recognized = &app_id == b"NETSCAPE" || &app_id == b"ANIMEXTS";

    let sub_block_size = reader.read_byte()?;
    if recognized && sub_block_size == 3 {
        let sub_id = reader.read_byte()?;
        let loop_count = reader.read_u16_le()?;
        let terminator = reader.read_byte()?;
        if terminator != 0 {
            return Err(Error::BadFile("application extension missing terminator"));
        }
        if sub_id == 0x01 {
            return Ok(ExtensionEvent::LoopCount(loop_count));
        }
        return Ok(ExtensionEvent::Other);
    }

    if sub_block_size == 0 {
        return Ok(ExtensionEvent::Other);
    }
    reader.skip(sub_block_size as usize);
    discard_sub_blocks(reader)?;
    Ok(ExtensionEvent::Other)
}

/// Reads one `0x21`-introduced extension (introducer already consumed by
/// the caller) and reports what it found.
pub fn parse_extension(reader: &mut StreamReader) -> Result<ExtensionEvent, Error> {
    let label = reader.read_byte()?;
    match label {
        EXT_GRAPHIC_CONTROL => Ok(ExtensionEvent::GraphicControl(parse_graphic_control(reader)?)),
        EXT_APPLICATION => parse_application_extension(reader),
        EXT_PLAIN_TEXT | EXT_COMMENT => {
            discard_sub_blocks(reader)?;
            Ok(ExtensionEvent::Other)
        }
        _ => {
            log::warn!("unknown GIF extension label 0x{label:02X}, discarding its sub-blocks");
            discard_sub_blocks(reader)?;
            Ok(ExtensionEvent::Other)
        }
    }
}

pub fn parse_image_descriptor(reader: &mut StreamReader) -> Result<ImageDescriptor, Error> {
    let x_off = reader.read_u16_le()?;
    let y_off = reader.read_u16_le()?;
    let width = reader.read_u16_le()?;
    let height = reader.read_u16_le()?;
    let packed = reader.read_byte()?;

    let has_local_table = packed & 0x80 != 0;
    let interlace = packed & 0x40 != 0;
    let local_table_size = 1usize << ((packed & 0x07) + 1);

    Ok(ImageDescriptor {
        x_off,
        y_off,
        width,
        height,
        interlace,
        has_local_table,
        local_table_size,
    })
}
