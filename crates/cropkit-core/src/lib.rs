//! Cropkit Core - geometry and pixel-crop engine
//!
//! This crate implements the engine behind an interactive image cropper:
//! affine placement tracking with derived corner points, crop-bounds
//! enforcement with wrap/zoom animations, crop-rectangle drag geometry,
//! binary EXIF orientation parsing, and the commit pipeline that produces
//! the cropped, compressed output file with its metadata carried over.
//!
//! # Architecture
//!
//! Gesture deltas flow into [`CropBoundsController`], which owns an
//! [`transform::TransformTracker`] and keeps the image covering the crop
//! viewport. [`CropRectEditor`] manages the viewport rectangle itself and
//! publishes updates back to the controller. Committing a crop freezes the
//! state into an [`ImageStateSnapshot`] consumed once by the pipeline on a
//! worker thread; the interaction thread never blocks on I/O.

pub mod crop_rect;
pub mod easing;
pub mod exif;
pub mod geometry;
pub mod loader;
pub mod matrix;
pub mod pipeline;
pub mod raster;
pub mod store;
pub mod transform;

pub use crop_rect::{CropRectEditor, DragHandle, FreestyleMode};
pub use exif::orientation::{read_orientation, ExifInfo, UNKNOWN_ORIENTATION};
pub use geometry::Rect;
pub use loader::load_bitmap;
pub use matrix::Matrix;
pub use pipeline::{crop_and_save, Committer, CropError, CropOutput, CropParameters};
pub use raster::{InterpolationFilter, RasterBuffer};
pub use store::{CompressFormat, FileStore, ImageDecoder, ImageEncoder};
pub use transform::{AnimationStatus, CropBoundsController, ImageStateSnapshot};
