//! External collaborators: image decode/encode seams and file storage.
//!
//! The pipeline and loader talk to these traits so the platform codecs and
//! filesystem can be swapped out in tests. The provided implementations are
//! backed by the `image` crate and `std::fs`.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder as _, ImageReader};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::raster::{InterpolationFilter, RasterBuffer};

/// Output compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressFormat {
    #[default]
    Jpeg,
    Png,
}

impl CompressFormat {
    /// File extension used for output naming.
    pub fn extension(self) -> &'static str {
        match self {
            CompressFormat::Jpeg => "jpg",
            CompressFormat::Png => "png",
        }
    }
}

/// Errors for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// I/O error during file reading.
    #[error("i/o error: {0}")]
    IoError(String),
}

/// Errors for image encoding operations.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Encoding failed
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}

/// Errors for file storage operations. Fatal to a commit.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("directory creation failed: {0}")]
    DirectoryCreation(String),

    #[error("file copy failed: {0}")]
    Copy(String),

    #[error("file write failed: {0}")]
    Write(String),
}

/// Decodes raster images from disk with power-of-two downsampling.
pub trait ImageDecoder {
    /// Read only the pixel dimensions, without decoding pixel data.
    fn decode_bounds(&self, path: &Path) -> Result<(u32, u32), DecodeError>;

    /// Decode at the given sample size: a power of two, where `n` yields an
    /// image `1/n` the source dimensions. Sample size 1 is full resolution.
    fn decode(&self, path: &Path, sample_size: u32) -> Result<RasterBuffer, DecodeError>;
}

/// Encodes a raster buffer into compressed bytes.
pub trait ImageEncoder {
    fn encode(
        &self,
        buffer: &RasterBuffer,
        format: CompressFormat,
        quality: u8,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// Filesystem operations used by the pipeline.
pub trait FileStore {
    /// Make sure `path` exists as a directory. A regular file occupying the
    /// path is removed first.
    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError>;

    /// Byte-for-byte copy.
    fn copy(&self, src: &Path, dst: &Path) -> Result<(), StorageError>;

    /// Write a whole file.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;
}

/// [`ImageDecoder`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecImageDecoder;

impl ImageDecoder for CodecImageDecoder {
    fn decode_bounds(&self, path: &Path) -> Result<(u32, u32), DecodeError> {
        let reader = ImageReader::open(path)
            .map_err(|e| DecodeError::IoError(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| DecodeError::IoError(e.to_string()))?;
        reader
            .into_dimensions()
            .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
    }

    fn decode(&self, path: &Path, sample_size: u32) -> Result<RasterBuffer, DecodeError> {
        let reader = ImageReader::open(path)
            .map_err(|e| DecodeError::IoError(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| DecodeError::IoError(e.to_string()))?;
        let img = reader
            .decode()
            .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
        let rgb = img.into_rgb8();
        let buffer = RasterBuffer::from_rgb_image(rgb);

        if sample_size <= 1 {
            return Ok(buffer);
        }
        let width = (buffer.width / sample_size).max(1);
        let height = (buffer.height / sample_size).max(1);
        buffer
            .resize(width, height, InterpolationFilter::Bilinear)
            .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
    }
}

/// [`ImageEncoder`] backed by the `image` crate codecs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecImageEncoder;

impl ImageEncoder for CodecImageEncoder {
    fn encode(
        &self,
        buffer: &RasterBuffer,
        format: CompressFormat,
        quality: u8,
    ) -> Result<Vec<u8>, EncodeError> {
        if buffer.width == 0 || buffer.height == 0 {
            return Err(EncodeError::InvalidDimensions {
                width: buffer.width,
                height: buffer.height,
            });
        }
        let expected = (buffer.width as usize) * (buffer.height as usize) * 3;
        if buffer.pixels.len() != expected {
            return Err(EncodeError::InvalidPixelData {
                expected,
                actual: buffer.pixels.len(),
            });
        }

        let mut out = Vec::new();
        match format {
            CompressFormat::Jpeg => {
                let quality = quality.clamp(1, 100);
                let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
                encoder
                    .write_image(
                        &buffer.pixels,
                        buffer.width,
                        buffer.height,
                        ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
            }
            CompressFormat::Png => {
                let encoder = PngEncoder::new(Cursor::new(&mut out));
                encoder
                    .write_image(
                        &buffer.pixels,
                        buffer.width,
                        buffer.height,
                        ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
            }
        }
        Ok(out)
    }
}

/// [`FileStore`] over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFileStore;

impl FileStore for DiskFileStore {
    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if path.is_file() {
            std::fs::remove_file(path)
                .map_err(|e| StorageError::DirectoryCreation(e.to_string()))?;
        }
        if !path.exists() {
            std::fs::create_dir_all(path)
                .map_err(|e| StorageError::DirectoryCreation(e.to_string()))?;
        }
        Ok(())
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<(), StorageError> {
        std::fs::copy(src, dst).map_err(|e| StorageError::Copy(e.to_string()))?;
        Ok(())
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        std::fs::write(path, bytes).map_err(|e| StorageError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_buffer(width: u32, height: u32) -> RasterBuffer {
        RasterBuffer::new(width, height, vec![128u8; (width * height * 3) as usize])
    }

    #[test]
    fn test_jpeg_encode_magic_bytes() {
        let bytes = CodecImageEncoder
            .encode(&gray_buffer(16, 16), CompressFormat::Jpeg, 90)
            .unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_png_encode_magic_bytes() {
        let bytes = CodecImageEncoder
            .encode(&gray_buffer(16, 16), CompressFormat::Png, 90)
            .unwrap();
        assert_eq!(&bytes[0..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_encode_rejects_zero_dimensions() {
        let buffer = RasterBuffer {
            width: 0,
            height: 0,
            pixels: vec![],
        };
        assert!(matches!(
            CodecImageEncoder.encode(&buffer, CompressFormat::Jpeg, 90),
            Err(EncodeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_bad_pixel_length() {
        let buffer = RasterBuffer {
            width: 4,
            height: 4,
            pixels: vec![0u8; 10],
        };
        assert!(matches!(
            CodecImageEncoder.encode(&buffer, CompressFormat::Jpeg, 90),
            Err(EncodeError::InvalidPixelData { .. })
        ));
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(CompressFormat::Jpeg.extension(), "jpg");
        assert_eq!(CompressFormat::Png.extension(), "png");
    }

    #[test]
    fn test_disk_decoder_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        let bytes = CodecImageEncoder
            .encode(&gray_buffer(64, 32), CompressFormat::Png, 90)
            .unwrap();
        std::fs::write(&path, bytes).unwrap();

        let decoder = CodecImageDecoder;
        assert_eq!(decoder.decode_bounds(&path).unwrap(), (64, 32));

        let full = decoder.decode(&path, 1).unwrap();
        assert_eq!((full.width, full.height), (64, 32));

        let half = decoder.decode(&path, 2).unwrap();
        assert_eq!((half.width, half.height), (32, 16));
    }

    #[test]
    fn test_disk_decoder_missing_file() {
        let decoder = CodecImageDecoder;
        let result = decoder.decode_bounds(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(DecodeError::IoError(_))));
    }

    #[test]
    fn test_ensure_directory_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        DiskFileStore.ensure_directory(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_ensure_directory_replaces_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        std::fs::write(&target, b"file").unwrap();
        DiskFileStore.ensure_directory(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_copy_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        std::fs::write(&src, b"payload").unwrap();
        DiskFileStore.copy(&src, &dst).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = DiskFileStore.copy(&dir.path().join("none"), &dir.path().join("out"));
        assert!(matches!(result, Err(StorageError::Copy(_))));
    }
}
