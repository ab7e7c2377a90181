//! Image placement tracking and crop-bounds enforcement.
//!
//! [`tracker::TransformTracker`] owns the affine matrix describing where the
//! image sits in the host surface and keeps the derived corner/center points
//! fresh. [`bounds::CropBoundsController`] composes a tracker and adds scale
//! limits, the wrap-to-bounds correction, animations and the commit snapshot.

pub mod bounds;
pub mod tracker;

pub use bounds::{AnimationStatus, CropBoundsController, ImageStateSnapshot};
pub use tracker::{TransformEvent, TransformTracker};
