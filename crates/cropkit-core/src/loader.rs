//! Image load path: bounds probe, power-of-two sample-size negotiation and
//! orientation normalization.
//!
//! The decode retry loop honors the decoder-collaborator contract: on any
//! decode failure the sample size doubles and the decode is retried, until
//! the image would be reduced below a single pixel.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{debug, warn};

use crate::exif::orientation::{read_orientation, ExifInfo, UNKNOWN_ORIENTATION};
use crate::raster::RasterBuffer;
use crate::store::{DecodeError, ImageDecoder};

/// Largest power-of-two sample size that keeps both dimensions at or below
/// the requested size.
pub fn calculate_sample_size(
    width: u32,
    height: u32,
    required_width: u32,
    required_height: u32,
) -> u32 {
    let mut sample_size = 1;
    if height > required_height || width > required_width {
        while (height / sample_size) > required_height || (width / sample_size) > required_width {
            sample_size *= 2;
        }
    }
    sample_size
}

/// Decode the image at `path` downsampled to roughly the required size, and
/// upright it according to its EXIF orientation.
///
/// Returns the normalized buffer together with the resolved [`ExifInfo`],
/// which the crop pipeline reuses at save time.
pub fn load_bitmap(
    decoder: &dyn ImageDecoder,
    path: &Path,
    required_width: u32,
    required_height: u32,
) -> Result<(RasterBuffer, ExifInfo), DecodeError> {
    let (width, height) = decoder.decode_bounds(path)?;
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidFormat);
    }

    let mut sample_size = calculate_sample_size(width, height, required_width, required_height);
    let buffer = loop {
        match decoder.decode(path, sample_size) {
            Ok(buffer) => break buffer,
            Err(e) => {
                if sample_size > width.max(height) {
                    return Err(e);
                }
                warn!(
                    "decode failed at sample size {}, retrying at {}: {}",
                    sample_size,
                    sample_size * 2,
                    e
                );
                sample_size *= 2;
            }
        }
    };

    let orientation_code = match File::open(path) {
        Ok(file) => read_orientation(BufReader::new(file)),
        Err(e) => {
            debug!("cannot reopen {} for orientation: {}", path.display(), e);
            UNKNOWN_ORIENTATION
        }
    };
    let exif_info = ExifInfo::from_code(orientation_code);

    Ok((upright(buffer, &exif_info), exif_info))
}

/// Apply the upright transform described by `exif_info`: rotation first,
/// then the horizontal mirror.
pub fn upright(buffer: RasterBuffer, exif_info: &ExifInfo) -> RasterBuffer {
    let rotated = match exif_info.degrees {
        90 => buffer.rotate90_cw(),
        180 => buffer.rotate180(),
        270 => buffer.rotate270_cw(),
        _ => buffer,
    };
    if exif_info.translation == -1 {
        rotated.flip_horizontal()
    } else {
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::orientation::{
        ORIENTATION_FLIP_HORIZONTAL, ORIENTATION_ROTATE_90, ORIENTATION_TRANSPOSE,
    };
    use std::cell::Cell;

    #[test]
    fn test_sample_size_no_downsampling_needed() {
        assert_eq!(calculate_sample_size(500, 400, 1000, 1000), 1);
        assert_eq!(calculate_sample_size(1000, 1000, 1000, 1000), 1);
    }

    #[test]
    fn test_sample_size_powers_of_two() {
        assert_eq!(calculate_sample_size(2000, 1000, 1000, 1000), 2);
        assert_eq!(calculate_sample_size(4000, 3000, 1000, 1000), 4);
        assert_eq!(calculate_sample_size(9000, 100, 1000, 1000), 16);
    }

    /// Decoder stub that fails a configurable number of decode attempts.
    struct FlakyDecoder {
        width: u32,
        height: u32,
        failures: Cell<u32>,
        observed_samples: Cell<u32>,
    }

    impl ImageDecoder for FlakyDecoder {
        fn decode_bounds(&self, _path: &Path) -> Result<(u32, u32), DecodeError> {
            Ok((self.width, self.height))
        }

        fn decode(&self, _path: &Path, sample_size: u32) -> Result<RasterBuffer, DecodeError> {
            self.observed_samples.set(sample_size);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(DecodeError::CorruptedFile("simulated".into()));
            }
            let w = (self.width / sample_size).max(1);
            let h = (self.height / sample_size).max(1);
            Ok(RasterBuffer::new(w, h, vec![0u8; (w * h * 3) as usize]))
        }
    }

    #[test]
    fn test_retry_doubles_sample_size() {
        let decoder = FlakyDecoder {
            width: 4000,
            height: 3000,
            failures: Cell::new(2),
            observed_samples: Cell::new(0),
        };
        let (buffer, _) =
            load_bitmap(&decoder, Path::new("/tmp/none.jpg"), 1000, 1000).unwrap();
        // Initial sample 4 failed twice, so the final decode ran at 16
        assert_eq!(decoder.observed_samples.get(), 16);
        assert_eq!(buffer.width, 4000 / 16);
    }

    #[test]
    fn test_retry_gives_up_eventually() {
        let decoder = FlakyDecoder {
            width: 100,
            height: 100,
            failures: Cell::new(32),
            observed_samples: Cell::new(0),
        };
        let result = load_bitmap(&decoder, Path::new("/tmp/none.jpg"), 1000, 1000);
        assert!(matches!(result, Err(DecodeError::CorruptedFile(_))));
    }

    #[test]
    fn test_zero_bounds_rejected() {
        struct ZeroDecoder;
        impl ImageDecoder for ZeroDecoder {
            fn decode_bounds(&self, _path: &Path) -> Result<(u32, u32), DecodeError> {
                Ok((0, 0))
            }
            fn decode(&self, _: &Path, _: u32) -> Result<RasterBuffer, DecodeError> {
                unreachable!("decode must not run with zero bounds")
            }
        }
        let result = load_bitmap(&ZeroDecoder, Path::new("/tmp/none.jpg"), 100, 100);
        assert!(matches!(result, Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_upright_rotate_90() {
        // 2x1 [A, B]; orientation 6 means rotate 90 CW to upright
        let buffer = RasterBuffer::new(2, 1, vec![10, 10, 10, 20, 20, 20]);
        let info = ExifInfo::from_code(ORIENTATION_ROTATE_90);
        let out = upright(buffer, &info);
        assert_eq!((out.width, out.height), (1, 2));
        assert_eq!(out.pixels[0], 10);
    }

    #[test]
    fn test_upright_flip_only() {
        let buffer = RasterBuffer::new(2, 1, vec![10, 10, 10, 20, 20, 20]);
        let info = ExifInfo::from_code(ORIENTATION_FLIP_HORIZONTAL);
        let out = upright(buffer, &info);
        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(out.pixels[0], 20);
    }

    #[test]
    fn test_upright_transpose_rotates_then_flips() {
        let buffer = RasterBuffer::new(2, 1, vec![10, 10, 10, 20, 20, 20]);
        let info = ExifInfo::from_code(ORIENTATION_TRANSPOSE);
        let out = upright(buffer, &info);
        // Rotate 90 CW gives [10; 20] vertically; the flip is a no-op on a
        // 1-wide image
        assert_eq!((out.width, out.height), (1, 2));
        assert_eq!(out.pixels[0], 10);
    }

    #[test]
    fn test_upright_identity() {
        let buffer = RasterBuffer::new(2, 1, vec![10, 10, 10, 20, 20, 20]);
        let original = buffer.clone();
        let out = upright(buffer, &ExifInfo::default());
        assert_eq!(out, original);
    }
}
