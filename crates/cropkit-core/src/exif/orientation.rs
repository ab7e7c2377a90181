//! Binary JPEG/TIFF orientation scanner.
//!
//! Walks the JPEG marker segments of a byte stream until the EXIF APP1
//! segment is found, then scans the TIFF IFD0 entries inside it for the
//! orientation tag. The scanner never fails: any malformed, truncated or
//! unsupported input yields [`UNKNOWN_ORIENTATION`], which callers must treat
//! as "no rotation, no flip" rather than as an error.

use std::io::{self, Read};

use log::debug;
use serde::{Deserialize, Serialize};

/// Sentinel returned when no orientation could be parsed, either because no
/// EXIF segment with orientation data exists or because the stream is
/// malformed.
pub const UNKNOWN_ORIENTATION: i32 = -1;

// Raw EXIF orientation codes, as stored in the orientation tag.
pub const ORIENTATION_NORMAL: i32 = 1;
pub const ORIENTATION_FLIP_HORIZONTAL: i32 = 2;
pub const ORIENTATION_ROTATE_180: i32 = 3;
pub const ORIENTATION_FLIP_VERTICAL: i32 = 4;
pub const ORIENTATION_TRANSPOSE: i32 = 5;
pub const ORIENTATION_ROTATE_90: i32 = 6;
pub const ORIENTATION_TRANSVERSE: i32 = 7;
pub const ORIENTATION_ROTATE_270: i32 = 8;

const EXIF_MAGIC_NUMBER: u16 = 0xFFD8;
// "MM"
const MOTOROLA_TIFF_MAGIC: u16 = 0x4D4D;
// "II"
const INTEL_TIFF_MAGIC: u16 = 0x4949;
const EXIF_SEGMENT_PREAMBLE: &[u8] = b"Exif\0\0";
const SEGMENT_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;
const SEGMENT_START_ID: u8 = 0xFF;
const EXIF_SEGMENT_TYPE: u8 = 0xE1;
const ORIENTATION_TAG: u16 = 0x0112;
const BYTES_PER_FORMAT: [u32; 13] = [0, 1, 1, 2, 4, 8, 1, 1, 2, 4, 8, 4, 8];

/// Orientation metadata resolved at load time and reused at save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifInfo {
    /// The raw orientation code (1-8), or [`UNKNOWN_ORIENTATION`].
    pub orientation_code: i32,
    /// Clockwise rotation needed to upright the image: 0, 90, 180 or 270.
    pub degrees: i32,
    /// Horizontal mirroring: -1 for flipped variants, 1 otherwise.
    pub translation: i32,
}

impl Default for ExifInfo {
    fn default() -> Self {
        Self {
            orientation_code: 0,
            degrees: 0,
            translation: 1,
        }
    }
}

impl ExifInfo {
    /// Resolve an orientation code into rotation and mirroring via the fixed
    /// lookup table. Unknown or undefined codes map to the identity.
    pub fn from_code(orientation_code: i32) -> Self {
        let degrees = match orientation_code {
            ORIENTATION_ROTATE_90 | ORIENTATION_TRANSPOSE => 90,
            ORIENTATION_ROTATE_180 | ORIENTATION_FLIP_VERTICAL => 180,
            ORIENTATION_ROTATE_270 | ORIENTATION_TRANSVERSE => 270,
            _ => 0,
        };
        let translation = match orientation_code {
            ORIENTATION_FLIP_HORIZONTAL
            | ORIENTATION_FLIP_VERTICAL
            | ORIENTATION_TRANSPOSE
            | ORIENTATION_TRANSVERSE => -1,
            _ => 1,
        };
        Self {
            orientation_code,
            degrees,
            translation,
        }
    }

    /// True when no upright transform is needed.
    pub fn is_identity(&self) -> bool {
        self.degrees == 0 && self.translation == 1
    }
}

/// Parse the orientation code from a stream positioned at a JPEG/TIFF
/// header. Returns [`UNKNOWN_ORIENTATION`] for anything that cannot be
/// parsed; consumption is bounded by the segment lengths in the stream.
pub fn read_orientation<R: Read>(mut reader: R) -> i32 {
    match parse_orientation(&mut reader) {
        Ok(code) => code,
        Err(e) => {
            debug!("orientation parse aborted: {}", e);
            UNKNOWN_ORIENTATION
        }
    }
}

fn parse_orientation<R: Read>(reader: &mut R) -> io::Result<i32> {
    let magic = read_u16_be(reader)?;
    if !handles(magic) {
        debug!("unhandled magic number: {:#06x}", magic);
        return Ok(UNKNOWN_ORIENTATION);
    }

    let segment_length = match seek_exif_segment(reader)? {
        Some(length) => length,
        None => return Ok(UNKNOWN_ORIENTATION),
    };

    let mut segment = vec![0u8; segment_length];
    reader.read_exact(&mut segment)?;

    if segment_length <= EXIF_SEGMENT_PREAMBLE.len()
        || !segment.starts_with(EXIF_SEGMENT_PREAMBLE)
    {
        debug!("missing exif preamble");
        return Ok(UNKNOWN_ORIENTATION);
    }

    Ok(parse_exif_segment(&segment))
}

fn handles(magic: u16) -> bool {
    (magic & EXIF_MAGIC_NUMBER) == EXIF_MAGIC_NUMBER
        || magic == MOTOROLA_TIFF_MAGIC
        || magic == INTEL_TIFF_MAGIC
}

/// Advance the reader to the start of the EXIF segment payload and return
/// its length, or `None` if no EXIF segment exists before SOS/EOI.
fn seek_exif_segment<R: Read>(reader: &mut R) -> io::Result<Option<usize>> {
    loop {
        let segment_id = read_u8(reader)?;
        if segment_id != SEGMENT_START_ID {
            debug!("unknown segment id: {:#04x}", segment_id);
            return Ok(None);
        }
        let segment_type = read_u8(reader)?;
        if segment_type == SEGMENT_SOS || segment_type == MARKER_EOI {
            return Ok(None);
        }
        // The length field includes its own two bytes
        let Some(segment_length) = (read_u16_be(reader)? as usize).checked_sub(2) else {
            return Ok(None);
        };
        if segment_type == EXIF_SEGMENT_TYPE {
            return Ok(Some(segment_length));
        }
        if skip(reader, segment_length)? != segment_length {
            debug!(
                "short skip in segment type {:#04x}, wanted {}",
                segment_type, segment_length
            );
            return Ok(None);
        }
    }
}

fn parse_exif_segment(segment: &[u8]) -> i32 {
    let header = EXIF_SEGMENT_PREAMBLE.len();

    // The byte-order mark is always read big-endian
    let tiff = SegmentReader {
        data: segment,
        big_endian: true,
    };
    let big_endian = match tiff.get_u16(header) {
        Some(MOTOROLA_TIFF_MAGIC) => true,
        Some(INTEL_TIFF_MAGIC) => false,
        Some(other) => {
            debug!("unknown endianness mark: {:#06x}", other);
            true
        }
        None => return UNKNOWN_ORIENTATION,
    };
    let tiff = SegmentReader {
        data: segment,
        big_endian,
    };

    let Some(first_ifd_offset) = tiff.get_u32(header + 4) else {
        return UNKNOWN_ORIENTATION;
    };
    let first_ifd_offset = first_ifd_offset as usize + header;
    let Some(entry_count) = tiff.get_u16(first_ifd_offset) else {
        return UNKNOWN_ORIENTATION;
    };

    for index in 0..entry_count as usize {
        let entry_offset = first_ifd_offset + 2 + 12 * index;
        match tiff.get_u16(entry_offset) {
            Some(ORIENTATION_TAG) => {}
            Some(_) => continue,
            None => return UNKNOWN_ORIENTATION,
        }

        let Some(format_code) = tiff.get_u16(entry_offset + 2) else {
            continue;
        };
        if !(1..=12).contains(&format_code) {
            debug!("invalid format code: {}", format_code);
            continue;
        }
        let Some(component_count) = tiff.get_u32(entry_offset + 4) else {
            continue;
        };
        if (component_count as i32) < 0 {
            debug!("negative tiff component count");
            continue;
        }

        let byte_count = component_count as usize + BYTES_PER_FORMAT[format_code as usize] as usize;
        if byte_count > 4 {
            // The value is stored via indirection, so this is not a plain
            // orientation entry
            debug!("byte count {} > 4, skipping entry", byte_count);
            continue;
        }

        let value_offset = entry_offset + 8;
        if value_offset + byte_count > segment.len() {
            debug!("entry value out of range at offset {}", value_offset);
            continue;
        }
        if let Some(value) = tiff.get_u16(value_offset) {
            return value as i32;
        }
    }

    UNKNOWN_ORIENTATION
}

/// Bounds-checked multi-byte reads over the EXIF segment.
struct SegmentReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl SegmentReader<'_> {
    fn get_u16(&self, offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn get_u32(&self, offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16_be<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn skip<R: Read>(reader: &mut R, total: usize) -> io::Result<usize> {
    let skipped = io::copy(&mut reader.take(total as u64), &mut io::sink())?;
    Ok(skipped as usize)
}
