//! Metadata copy for cropped JPEG output.
//!
//! A fixed allowlist of tags is read from the source file and re-serialized
//! into a little-endian TIFF block spliced into the output JPEG as an APP1
//! segment. Width, height and orientation are overwritten: the output is
//! upright by construction, so its orientation tag is forced to `0`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{In, Reader, Tag, Value};
use thiserror::Error;

const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_IMAGE_LENGTH: u16 = 0x0101;
const TAG_ORIENTATION: u16 = 0x0112;
const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
const TAG_GPS_IFD_POINTER: u16 = 0x8825;

const FORMAT_ASCII: u16 = 2;
const FORMAT_SHORT: u16 = 3;
const FORMAT_LONG: u16 = 4;

/// Tags carried over from the source image.
const COPIED_TAGS: [Tag; 22] = [
    Tag::ApertureValue,
    Tag::DateTime,
    Tag::DateTimeDigitized,
    Tag::ExposureTime,
    Tag::Flash,
    Tag::FocalLength,
    Tag::GPSAltitude,
    Tag::GPSAltitudeRef,
    Tag::GPSDateStamp,
    Tag::GPSLatitude,
    Tag::GPSLatitudeRef,
    Tag::GPSLongitude,
    Tag::GPSLongitudeRef,
    Tag::GPSProcessingMethod,
    Tag::GPSTimeStamp,
    Tag::PhotographicSensitivity,
    Tag::Make,
    Tag::Model,
    Tag::SubSecTime,
    Tag::SubSecTimeDigitized,
    Tag::SubSecTimeOriginal,
    Tag::WhiteBalance,
];

const GPS_TAGS: [Tag; 8] = [
    Tag::GPSAltitude,
    Tag::GPSAltitudeRef,
    Tag::GPSDateStamp,
    Tag::GPSLatitude,
    Tag::GPSLatitudeRef,
    Tag::GPSLongitude,
    Tag::GPSLongitudeRef,
    Tag::GPSProcessingMethod,
];

const IFD0_TAGS: [Tag; 3] = [Tag::Make, Tag::Model, Tag::DateTime];

/// Errors from the metadata copy pass. The pipeline logs and swallows
/// these: metadata must never fail a commit.
#[derive(Debug, Error)]
pub enum ExifCopyError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("exif parse error: {0}")]
    Parse(#[from] exif::Error),

    #[error("output file is not a jpeg")]
    NotJpeg,

    #[error("exif block too large: {0} bytes")]
    TooLarge(usize),
}

/// A single IFD entry with its value bytes already in little-endian order.
struct TiffEntry {
    tag: u16,
    format: u16,
    count: u32,
    payload: Vec<u8>,
}

/// Copy the allowlisted tags from `src_path` into the JPEG at `out_path`,
/// overriding the dimension tags with the actual output size and forcing
/// the orientation tag to `0`.
pub fn copy_exif(
    src_path: &Path,
    width: u32,
    height: u32,
    out_path: &Path,
) -> Result<(), ExifCopyError> {
    let file = File::open(src_path)?;
    let source = Reader::new().read_from_container(&mut BufReader::new(file))?;

    let mut ifd0 = Vec::new();
    let mut exif_ifd = Vec::new();
    let mut gps_ifd = Vec::new();

    for tag in COPIED_TAGS {
        let Some(field) = source.get_field(tag, In::PRIMARY) else {
            continue;
        };
        let Some((format, count, payload)) = encode_value(&field.value) else {
            continue;
        };
        if count == 0 {
            continue;
        }
        let entry = TiffEntry {
            tag: tag.number(),
            format,
            count,
            payload,
        };
        if GPS_TAGS.contains(&tag) {
            gps_ifd.push(entry);
        } else if IFD0_TAGS.contains(&tag) {
            ifd0.push(entry);
        } else {
            exif_ifd.push(entry);
        }
    }

    ifd0.push(long_entry(TAG_IMAGE_WIDTH, width));
    ifd0.push(long_entry(TAG_IMAGE_LENGTH, height));
    ifd0.push(short_entry(TAG_ORIENTATION, 0));

    let tiff = build_tiff(ifd0, exif_ifd, gps_ifd);
    splice_app1(out_path, &tiff)
}

fn long_entry(tag: u16, value: u32) -> TiffEntry {
    TiffEntry {
        tag,
        format: FORMAT_LONG,
        count: 1,
        payload: value.to_le_bytes().to_vec(),
    }
}

fn short_entry(tag: u16, value: u16) -> TiffEntry {
    TiffEntry {
        tag,
        format: FORMAT_SHORT,
        count: 1,
        payload: value.to_le_bytes().to_vec(),
    }
}

/// Map an exif value onto (format code, component count, little-endian
/// bytes). Unknown values are dropped.
fn encode_value(value: &Value) -> Option<(u16, u32, Vec<u8>)> {
    match value {
        Value::Byte(v) => Some((1, v.len() as u32, v.clone())),
        Value::Ascii(strings) => {
            let mut bytes = Vec::new();
            for s in strings {
                bytes.extend_from_slice(s);
                bytes.push(0);
            }
            Some((FORMAT_ASCII, bytes.len() as u32, bytes))
        }
        Value::Short(v) => Some((
            FORMAT_SHORT,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        )),
        Value::Long(v) => Some((
            FORMAT_LONG,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        )),
        Value::Rational(v) => Some((
            5,
            v.len() as u32,
            v.iter()
                .flat_map(|r| {
                    let mut pair = r.num.to_le_bytes().to_vec();
                    pair.extend_from_slice(&r.denom.to_le_bytes());
                    pair
                })
                .collect(),
        )),
        Value::SByte(v) => Some((6, v.len() as u32, v.iter().map(|x| *x as u8).collect())),
        Value::Undefined(v, _) => Some((7, v.len() as u32, v.clone())),
        Value::SShort(v) => Some((
            8,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        )),
        Value::SLong(v) => Some((
            9,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        )),
        Value::SRational(v) => Some((
            10,
            v.len() as u32,
            v.iter()
                .flat_map(|r| {
                    let mut pair = r.num.to_le_bytes().to_vec();
                    pair.extend_from_slice(&r.denom.to_le_bytes());
                    pair
                })
                .collect(),
        )),
        Value::Float(v) => Some((
            11,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        )),
        Value::Double(v) => Some((
            12,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        )),
        _ => None,
    }
}

/// Serialized size of an IFD block including its out-of-line value area.
fn ifd_block_len(entries: &[TiffEntry]) -> usize {
    let mut len = 2 + 12 * entries.len() + 4;
    for entry in entries {
        if entry.payload.len() > 4 {
            len += entry.payload.len() + entry.payload.len() % 2;
        }
    }
    len
}

/// Serialize one IFD at the given absolute offset within the TIFF block.
/// Values longer than 4 bytes go to a value area following the entry table.
fn serialize_ifd(mut entries: Vec<TiffEntry>, abs_offset: u32) -> Vec<u8> {
    entries.sort_by_key(|e| e.tag);

    let value_area_start = abs_offset + 2 + 12 * entries.len() as u32 + 4;
    let mut table = Vec::new();
    let mut values: Vec<u8> = Vec::new();

    table.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for entry in &entries {
        table.extend_from_slice(&entry.tag.to_le_bytes());
        table.extend_from_slice(&entry.format.to_le_bytes());
        table.extend_from_slice(&entry.count.to_le_bytes());
        if entry.payload.len() <= 4 {
            let mut inline = entry.payload.clone();
            inline.resize(4, 0);
            table.extend_from_slice(&inline);
        } else {
            let offset = value_area_start + values.len() as u32;
            table.extend_from_slice(&offset.to_le_bytes());
            values.extend_from_slice(&entry.payload);
            if values.len() % 2 == 1 {
                values.push(0);
            }
        }
    }
    table.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
    table.extend_from_slice(&values);
    table
}

/// Assemble the full little-endian TIFF block: IFD0 plus Exif and GPS
/// sub-IFDs when their entry lists are non-empty.
fn build_tiff(
    mut ifd0: Vec<TiffEntry>,
    exif_ifd: Vec<TiffEntry>,
    gps_ifd: Vec<TiffEntry>,
) -> Vec<u8> {
    let pointer_count = usize::from(!exif_ifd.is_empty()) + usize::from(!gps_ifd.is_empty());
    let ifd0_len = ifd_block_len(&ifd0) + 12 * pointer_count;
    let exif_offset = 8 + ifd0_len as u32;

    let exif_block = if exif_ifd.is_empty() {
        Vec::new()
    } else {
        ifd0.push(long_entry(TAG_EXIF_IFD_POINTER, exif_offset));
        serialize_ifd(exif_ifd, exif_offset)
    };

    let gps_offset = exif_offset + exif_block.len() as u32;
    let gps_block = if gps_ifd.is_empty() {
        Vec::new()
    } else {
        ifd0.push(long_entry(TAG_GPS_IFD_POINTER, gps_offset));
        serialize_ifd(gps_ifd, gps_offset)
    };

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&serialize_ifd(ifd0, 8));
    tiff.extend_from_slice(&exif_block);
    tiff.extend_from_slice(&gps_block);
    tiff
}

/// Insert the TIFF block as an APP1 segment right after the SOI marker of
/// the JPEG at `path`.
fn splice_app1(path: &Path, tiff: &[u8]) -> Result<(), ExifCopyError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 2 || bytes[0..2] != [0xFF, 0xD8] {
        return Err(ExifCopyError::NotJpeg);
    }

    let mut payload = Vec::from(&b"Exif\0\0"[..]);
    payload.extend_from_slice(tiff);
    if payload.len() + 2 > u16::MAX as usize {
        return Err(ExifCopyError::TooLarge(payload.len()));
    }

    let mut out = Vec::with_capacity(bytes.len() + payload.len() + 4);
    out.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&bytes[2..]);
    std::fs::write(path, out)?;
    Ok(())
}
