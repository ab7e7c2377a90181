//! Affine placement tracking for the image being edited.

use log::debug;

use crate::geometry::{corners_of, Rect};
use crate::matrix::Matrix;

/// Notification fired after a scale or rotation mutation, carrying the new
/// absolute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformEvent {
    Scale(f32),
    Rotate(f32),
}

/// Tracks the current placement of an image inside its host surface.
///
/// The image's initial, unscaled corner and center points are captured once
/// when the image is measured ([`TransformTracker::set_image_size`]); every
/// mutation maps them through the current matrix so the derived points in
/// [`TransformTracker::corners`] / [`TransformTracker::center`] are always in
/// sync with the matrix.
pub struct TransformTracker {
    matrix: Matrix,
    laid_out: bool,
    initial_corners: [f32; 8],
    initial_center: [f32; 2],
    current_corners: [f32; 8],
    current_center: [f32; 2],
    listener: Option<Box<dyn FnMut(TransformEvent)>>,
}

impl std::fmt::Debug for TransformTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformTracker")
            .field("matrix", &self.matrix)
            .field("laid_out", &self.laid_out)
            .field("current_corners", &self.current_corners)
            .field("current_center", &self.current_center)
            .finish_non_exhaustive()
    }
}

impl Default for TransformTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformTracker {
    pub fn new() -> Self {
        Self {
            matrix: Matrix::identity(),
            laid_out: false,
            initial_corners: [0.0; 8],
            initial_center: [0.0; 2],
            current_corners: [0.0; 8],
            current_center: [0.0; 2],
            listener: None,
        }
    }

    /// Record the image's intrinsic size. Must be called once before any
    /// transform operation; resets the matrix to identity.
    pub fn set_image_size(&mut self, width: f32, height: f32) {
        debug!("image size: [{}:{}]", width as i32, height as i32);
        let initial = Rect::new(0.0, 0.0, width, height);
        self.initial_corners = corners_of(&initial);
        self.initial_center = initial.center();
        self.matrix = Matrix::identity();
        self.laid_out = true;
        self.refresh_points();
    }

    pub fn is_laid_out(&self) -> bool {
        self.laid_out
    }

    /// Register the observer notified after each scale/rotate mutation.
    pub fn set_listener(&mut self, listener: impl FnMut(TransformEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Translate the image. No-op when both deltas are zero.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        if dx != 0.0 || dy != 0.0 {
            self.matrix.post_translate(dx, dy);
            self.refresh_points();
        }
    }

    /// Scale the image about the pivot `(px, py)`. No-op for a delta of 1.
    pub fn scale(&mut self, delta_factor: f32, px: f32, py: f32) {
        if delta_factor != 1.0 && delta_factor != 0.0 {
            self.matrix.post_scale(delta_factor, px, py);
            self.refresh_points();
            let scale = self.current_scale();
            self.notify(TransformEvent::Scale(scale));
        }
    }

    /// Rotate the image about the pivot `(px, py)`. No-op for a zero delta.
    pub fn rotate(&mut self, delta_degrees: f32, px: f32, py: f32) {
        if delta_degrees != 0.0 {
            self.matrix.post_rotate(delta_degrees, px, py);
            self.refresh_points();
            let angle = self.current_angle();
            self.notify(TransformEvent::Rotate(angle));
        }
    }

    /// Replace the matrix wholesale (initial placement).
    pub fn set_matrix(&mut self, matrix: Matrix) {
        self.matrix = matrix;
        self.refresh_points();
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Current image corners (TL, TR, BR, BL as 8 floats).
    pub fn corners(&self) -> &[f32; 8] {
        &self.current_corners
    }

    /// Current image center.
    pub fn center(&self) -> &[f32; 2] {
        &self.current_center
    }

    pub fn current_scale(&self) -> f32 {
        self.matrix.scale()
    }

    pub fn current_angle(&self) -> f32 {
        self.matrix.angle_degrees()
    }

    fn refresh_points(&mut self) {
        self.current_corners = self.initial_corners;
        self.current_center = self.initial_center;
        self.matrix.map_points(&mut self.current_corners);
        self.matrix.map_points(&mut self.current_center);
    }

    fn notify(&mut self, event: TransformEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(event);
        }
    }
}
