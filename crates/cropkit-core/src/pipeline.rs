//! Crop commit pipeline: downscale, rotate, offset, crop (or byte-copy),
//! encode and metadata copy.
//!
//! The pipeline consumes a frozen [`ImageStateSnapshot`] plus
//! [`CropParameters`] and never touches live controller state, so it can run
//! on a worker thread while the interaction thread keeps editing.
//! [`Committer`] wraps the worker and enforces single-flight commits: a new
//! commit is rejected while one is outstanding.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Local;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exif::copy::copy_exif;
use crate::exif::orientation::ExifInfo;
use crate::raster::{InterpolationFilter, RasterBuffer, RasterError};
use crate::store::{
    CodecImageEncoder, CompressFormat, DiskFileStore, EncodeError, FileStore, ImageEncoder,
    StorageError,
};
use crate::transform::bounds::ImageStateSnapshot;

/// Per-commit configuration consumed exactly once by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropParameters {
    /// Maximum output width; 0 disables the size constraint.
    pub max_result_width: u32,
    /// Maximum output height; 0 disables the size constraint.
    pub max_result_height: u32,
    pub format: CompressFormat,
    /// Compression quality (JPEG only), 1-100.
    pub quality: u8,
    /// The original image file, source of bytes for the copy fast path and
    /// of metadata for the EXIF pass.
    pub input_path: PathBuf,
    /// Directory receiving the output file; created if absent.
    pub output_dir: PathBuf,
    /// Orientation resolved at load time.
    pub exif_info: ExifInfo,
}

/// Where the output landed and how big it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropOutput {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Errors that fail a commit.
#[derive(Debug, Error)]
pub enum CropError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Resize(#[from] RasterError),

    /// A previous commit is still running; retry after it completes.
    #[error("a commit is already in flight")]
    CommitInFlight,
}

/// Decide between a pixel crop and a plain file copy.
///
/// Matrix arithmetic accumulates roughly one pixel of error per thousand
/// pixels of output, so edge deltas inside that tolerance mean the crop rect
/// is the whole image and the source file can be copied through untouched.
/// An active max-size constraint always forces the pixel path.
pub fn should_crop(
    width: u32,
    height: u32,
    snapshot: &ImageStateSnapshot,
    params: &CropParameters,
) -> bool {
    let pixel_error = 1.0 + (width.max(height) as f32 / 1000.0).round();
    let has_max_size = params.max_result_width > 0 && params.max_result_height > 0;
    has_max_size
        || (snapshot.crop_rect.left - snapshot.image_rect.left).abs() > pixel_error
        || (snapshot.crop_rect.top - snapshot.image_rect.top).abs() > pixel_error
        || (snapshot.crop_rect.right - snapshot.image_rect.right).abs() > pixel_error
        || (snapshot.crop_rect.bottom - snapshot.image_rect.bottom).abs() > pixel_error
}

/// Run the crop pipeline synchronously against the given collaborators.
///
/// `buffer` is the working bitmap the editing session displayed, in the
/// upright orientation produced by the loader.
pub fn crop_and_save(
    buffer: RasterBuffer,
    snapshot: &ImageStateSnapshot,
    params: &CropParameters,
    encoder: &dyn ImageEncoder,
    store: &dyn FileStore,
) -> Result<CropOutput, CropError> {
    store.ensure_directory(&params.output_dir)?;
    let output_path = params.output_dir.join(random_image_name(params.format));

    let mut buffer = buffer;
    let mut scale = snapshot.scale;

    // Downsize so the cropped region obeys the max output size
    if params.max_result_width > 0 && params.max_result_height > 0 {
        let crop_width = snapshot.crop_rect.width() / scale;
        let crop_height = snapshot.crop_rect.height() / scale;
        if crop_width > params.max_result_width as f32
            || crop_height > params.max_result_height as f32
        {
            let resize_scale = (params.max_result_width as f32 / crop_width)
                .min(params.max_result_height as f32 / crop_height);
            let new_width = (buffer.width as f32 * resize_scale).round() as u32;
            let new_height = (buffer.height as f32 * resize_scale).round() as u32;
            debug!(
                "downsizing {}x{} -> {}x{} before crop",
                buffer.width, buffer.height, new_width, new_height
            );
            buffer = buffer.resize(new_width, new_height, InterpolationFilter::Bilinear)?;
            // Offset math below still divides by the working scale
            scale /= resize_scale;
        }
    }

    if snapshot.angle != 0.0 {
        buffer = buffer.rotate(snapshot.angle as f64, InterpolationFilter::Bilinear);
    }

    let offset_x = ((snapshot.crop_rect.left - snapshot.image_rect.left) / scale)
        .round()
        .max(0.0) as u32;
    let offset_y = ((snapshot.crop_rect.top - snapshot.image_rect.top) / scale)
        .round()
        .max(0.0) as u32;
    let cropped_width = (snapshot.crop_rect.width() / scale).round() as u32;
    let cropped_height = (snapshot.crop_rect.height() / scale).round() as u32;

    if should_crop(cropped_width, cropped_height, snapshot, params) {
        let cropped = buffer.crop(offset_x, offset_y, cropped_width, cropped_height);
        let bytes = encoder.encode(&cropped, params.format, params.quality)?;
        store.write(&output_path, &bytes)?;

        if params.format == CompressFormat::Jpeg {
            if let Err(e) = copy_exif(&params.input_path, cropped.width, cropped.height, &output_path)
            {
                warn!("metadata copy skipped: {}", e);
            }
        }

        Ok(CropOutput {
            path: output_path,
            width: cropped.width,
            height: cropped.height,
        })
    } else {
        debug!("crop rect matches image, copying source file through");
        store.copy(&params.input_path, &output_path)?;
        Ok(CropOutput {
            path: output_path,
            width: cropped_width,
            height: cropped_height,
        })
    }
}

/// `<timestamp to the millisecond><4-digit random>.<ext>`
fn random_image_name(format: CompressFormat) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    format!("{}{}.{}", timestamp, suffix, format.extension())
}

/// Runs commits on a worker thread, one at a time.
///
/// The result is delivered through the completion callback on the worker
/// thread. The in-flight gate clears only after the callback returns, so a
/// caller observing the callback can immediately start the next commit.
/// There is no cancellation: a running commit always finishes.
#[derive(Debug, Clone, Default)]
pub struct Committer {
    in_flight: Arc<AtomicBool>,
}

impl Committer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start a commit on a worker thread using the disk-backed
    /// collaborators. Rejects with [`CropError::CommitInFlight`] while a
    /// previous commit is still running.
    pub fn commit<F>(
        &self,
        buffer: RasterBuffer,
        snapshot: ImageStateSnapshot,
        params: CropParameters,
        callback: F,
    ) -> Result<JoinHandle<()>, CropError>
    where
        F: FnOnce(Result<CropOutput, CropError>) + Send + 'static,
    {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(CropError::CommitInFlight);
        }
        let in_flight = self.in_flight.clone();
        let handle = thread::spawn(move || {
            let result = crop_and_save(
                buffer,
                &snapshot,
                &params,
                &CodecImageEncoder,
                &DiskFileStore,
            );
            callback(result);
            in_flight.store(false, Ordering::SeqCst);
        });
        Ok(handle)
    }
}
