//! Crop-bounds enforcement: scale limits, the wrap-to-bounds correction and
//! its animations, and the commit snapshot.
//!
//! The controller owns a [`TransformTracker`] and gates every scale request
//! against the permitted range. A scale delta whose result would leave
//! `[min_scale, max_scale]` is dropped entirely rather than clamped, so a
//! pinch that overshoots simply stops having an effect.
//!
//! Animations are explicit state machines advanced by [`CropBoundsController::tick`].
//! The host passes its own clock reading into `tick`, which keeps the frame
//! loop outside this crate and makes animation tests deterministic.

use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::easing::{ease_in_out, ease_out};
use crate::geometry::{bounding_rect, corners_of, rect_sides_from_corners, Rect};
use crate::matrix::Matrix;
use crate::transform::tracker::{TransformEvent, TransformTracker};

pub const DEFAULT_WRAP_BOUNDS_ANIM_DURATION: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_SCALE_MULTIPLIER: f32 = 10.0;

/// Errors from controller configuration.
#[derive(Debug, Error)]
pub enum BoundsError {
    /// The crop rectangle must have positive width and height.
    #[error("degenerate crop rect: {0:?}")]
    DegenerateCropRect(Rect),
}

/// Immutable capture of the editing state at commit time.
///
/// The pixel pipeline consumes this instead of live controller state, so the
/// interaction thread may keep mutating while the worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageStateSnapshot {
    /// The crop viewport in host-surface coordinates.
    pub crop_rect: Rect,
    /// Bounding box of the image corners at commit time.
    pub image_rect: Rect,
    /// Absolute image scale at commit time.
    pub scale: f32,
    /// Absolute image rotation in degrees at commit time.
    pub angle: f32,
}

/// Result of advancing the active animation by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStatus {
    /// No animation is active.
    Idle,
    /// The animation applied a frame and wants another tick.
    Running,
    /// The animation reached its end condition this tick.
    Completed,
}

struct WrapBoundsAnimation {
    start: Instant,
    duration: Duration,
    old_x: f32,
    old_y: f32,
    delta_x: f32,
    delta_y: f32,
    old_scale: f32,
    delta_scale: f32,
    wraps_after_translate: bool,
}

struct ZoomAnimation {
    start: Instant,
    duration: Duration,
    old_scale: f32,
    delta_scale: f32,
    dest_x: f32,
    dest_y: f32,
}

/// Keeps the image covering the crop rectangle and enforces scale limits.
pub struct CropBoundsController {
    tracker: TransformTracker,
    crop_rect: Rect,
    target_aspect_ratio: f32,
    image_width: f32,
    image_height: f32,
    min_scale: f32,
    max_scale: f32,
    max_scale_multiplier: f32,
    wrap_anim_duration: Duration,
    wrap_anim: Option<WrapBoundsAnimation>,
    zoom_anim: Option<ZoomAnimation>,
}

impl Default for CropBoundsController {
    fn default() -> Self {
        Self::new()
    }
}

impl CropBoundsController {
    pub fn new() -> Self {
        Self {
            tracker: TransformTracker::new(),
            crop_rect: Rect::default(),
            target_aspect_ratio: 0.0,
            image_width: 0.0,
            image_height: 0.0,
            min_scale: 0.0,
            max_scale: 0.0,
            max_scale_multiplier: DEFAULT_MAX_SCALE_MULTIPLIER,
            wrap_anim_duration: DEFAULT_WRAP_BOUNDS_ANIM_DURATION,
            wrap_anim: None,
            zoom_anim: None,
        }
    }

    /// Multiplier applied to the minimum scale to derive the maximum.
    pub fn set_max_scale_multiplier(&mut self, multiplier: f32) {
        self.max_scale_multiplier = multiplier;
    }

    /// Duration of the wrap-bounds animation.
    pub fn set_wrap_anim_duration(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.wrap_anim_duration = duration;
        }
    }

    /// Register the observer notified after each scale/rotate mutation.
    pub fn set_listener(&mut self, listener: impl FnMut(TransformEvent) + 'static) {
        self.tracker.set_listener(listener);
    }

    /// Lay the image out against the given crop rectangle: computes scale
    /// bounds and applies the initial cover-and-center placement.
    pub fn layout(
        &mut self,
        image_width: f32,
        image_height: f32,
        crop_rect: Rect,
    ) -> Result<(), BoundsError> {
        if crop_rect.is_empty() {
            return Err(BoundsError::DegenerateCropRect(crop_rect));
        }
        self.image_width = image_width;
        self.image_height = image_height;
        self.crop_rect = crop_rect;
        self.target_aspect_ratio = crop_rect.width() / crop_rect.height();
        self.tracker.set_image_size(image_width, image_height);
        self.calculate_scale_bounds();
        self.setup_initial_position();
        Ok(())
    }

    /// Replace the crop rectangle (published by the rect editor), recompute
    /// scale bounds and start an animated correction toward coverage.
    pub fn set_crop_rect(&mut self, crop_rect: Rect, now: Instant) -> Result<(), BoundsError> {
        if crop_rect.is_empty() {
            return Err(BoundsError::DegenerateCropRect(crop_rect));
        }
        self.crop_rect = crop_rect;
        self.target_aspect_ratio = crop_rect.width() / crop_rect.height();
        if self.tracker.is_laid_out() {
            self.calculate_scale_bounds();
            self.fit_to_crop_bounds(true, now);
        }
        Ok(())
    }

    pub fn crop_rect(&self) -> Rect {
        self.crop_rect
    }

    pub fn target_aspect_ratio(&self) -> f32 {
        self.target_aspect_ratio
    }

    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    pub fn current_scale(&self) -> f32 {
        self.tracker.current_scale()
    }

    pub fn current_angle(&self) -> f32 {
        self.tracker.current_angle()
    }

    pub fn corners(&self) -> &[f32; 8] {
        self.tracker.corners()
    }

    pub fn center(&self) -> &[f32; 2] {
        self.tracker.center()
    }

    /// Gesture pan. Cancels any pending animation.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.cancel_animations();
        self.tracker.translate(dx, dy);
    }

    /// Gesture pinch about `(px, py)`. The delta is dropped when the resulting
    /// scale would leave the permitted range. Cancels any pending animation.
    pub fn scale(&mut self, delta_factor: f32, px: f32, py: f32) {
        self.cancel_animations();
        self.apply_scale(delta_factor, px, py);
    }

    /// Gesture rotation about `(px, py)`. Cancels any pending animation.
    pub fn rotate(&mut self, delta_degrees: f32, px: f32, py: f32) {
        self.cancel_animations();
        self.tracker.rotate(delta_degrees, px, py);
    }

    /// Rotation about the crop-rect center.
    pub fn rotate_about_crop_center(&mut self, delta_degrees: f32) {
        let cx = self.crop_rect.center_x();
        let cy = self.crop_rect.center_y();
        self.rotate(delta_degrees, cx, cy);
    }

    fn apply_scale(&mut self, delta_factor: f32, px: f32, py: f32) {
        let current = self.tracker.current_scale();
        if delta_factor > 1.0 && current * delta_factor <= self.max_scale {
            self.tracker.scale(delta_factor, px, py);
        } else if delta_factor < 1.0 && current * delta_factor >= self.min_scale {
            self.tracker.scale(delta_factor, px, py);
        }
    }

    /// Set the absolute scale if it does not exceed the maximum.
    fn zoom_in_to(&mut self, scale: f32, px: f32, py: f32) {
        if scale <= self.max_scale {
            let current = self.tracker.current_scale();
            if current > 0.0 {
                self.tracker.scale(scale / current, px, py);
            }
        }
    }

    /// True when the current image corners fully cover the crop rect.
    pub fn is_wrapping_crop_bounds(&self) -> bool {
        self.corners_wrap_crop_bounds(self.tracker.corners())
    }

    /// Containment is evaluated in the image's own rotated frame: both the
    /// corner set and the crop rect are un-rotated by the current angle, then
    /// their bounding boxes are compared.
    pub fn corners_wrap_crop_bounds(&self, corners: &[f32; 8]) -> bool {
        let unrotate = Matrix::rotation(-self.current_angle());

        let mut image_corners = *corners;
        unrotate.map_points(&mut image_corners);
        let mut crop_corners = corners_of(&self.crop_rect);
        unrotate.map_points(&mut crop_corners);

        bounding_rect(&image_corners).contains(&bounding_rect(&crop_corners))
    }

    /// Per-edge overlap deficits in the un-rotated frame, rotated back into
    /// host coordinates. Order: [left, top, right, bottom].
    fn calculate_image_indents(&self) -> [f32; 4] {
        let unrotate = Matrix::rotation(-self.current_angle());

        let mut image_corners = *self.tracker.corners();
        unrotate.map_points(&mut image_corners);
        let mut crop_corners = corners_of(&self.crop_rect);
        unrotate.map_points(&mut crop_corners);

        let image_rect = bounding_rect(&image_corners);
        let crop_rect = bounding_rect(&crop_corners);

        let delta_left = image_rect.left - crop_rect.left;
        let delta_top = image_rect.top - crop_rect.top;
        let delta_right = image_rect.right - crop_rect.right;
        let delta_bottom = image_rect.bottom - crop_rect.bottom;

        let mut indents = [
            if delta_left > 0.0 { delta_left } else { 0.0 },
            if delta_top > 0.0 { delta_top } else { 0.0 },
            if delta_right < 0.0 { delta_right } else { 0.0 },
            if delta_bottom < 0.0 { delta_bottom } else { 0.0 },
        ];
        let rotate = Matrix::rotation(self.current_angle());
        rotate.map_points(&mut indents);
        indents
    }

    /// Translate (and if necessary scale) the image so it covers the crop
    /// rect. With `animate`, the correction is interpolated over the
    /// configured duration and advanced by [`CropBoundsController::tick`].
    pub fn fit_to_crop_bounds(&mut self, animate: bool, now: Instant) {
        if !self.tracker.is_laid_out() || self.is_wrapping_crop_bounds() {
            return;
        }

        let [current_x, current_y] = *self.tracker.center();
        let current_scale = self.tracker.current_scale();

        let mut delta_x = self.crop_rect.center_x() - current_x;
        let mut delta_y = self.crop_rect.center_y() - current_y;
        let mut delta_scale = 0.0;

        // Simulate the center alignment before committing to it
        let translate = Matrix::translation(delta_x, delta_y);
        let mut translated_corners = *self.tracker.corners();
        translate.map_points(&mut translated_corners);
        let wraps_after_translate = self.corners_wrap_crop_bounds(&translated_corners);

        if wraps_after_translate {
            // Only the minimal per-edge correction is needed
            let indents = self.calculate_image_indents();
            delta_x = -(indents[0] + indents[2]);
            delta_y = -(indents[1] + indents[3]);
        } else {
            // Compare the crop rect, rotated into the image frame, against the
            // image's side lengths to find the missing scale
            let rotate = Matrix::rotation(self.current_angle());
            let rotated_crop = rotate.map_rect(&self.crop_rect);
            let sides = rect_sides_from_corners(self.tracker.corners());
            delta_scale = (rotated_crop.width() / sides[0]).max(rotated_crop.height() / sides[1]);
            delta_scale = delta_scale * current_scale - current_scale;
        }

        if animate {
            self.zoom_anim = None;
            self.wrap_anim = Some(WrapBoundsAnimation {
                start: now,
                duration: self.wrap_anim_duration,
                old_x: current_x,
                old_y: current_y,
                delta_x,
                delta_y,
                old_scale: current_scale,
                delta_scale,
                wraps_after_translate,
            });
        } else {
            self.tracker.translate(delta_x, delta_y);
            if !wraps_after_translate {
                let cx = self.crop_rect.center_x();
                let cy = self.crop_rect.center_y();
                self.zoom_in_to(current_scale + delta_scale, cx, cy);
            }
        }
    }

    /// Animate the absolute scale toward `target_scale` (clamped to the
    /// maximum) about the pivot. On completion the wrap-bounds correction
    /// runs to close any resulting gap.
    pub fn zoom_to_position(
        &mut self,
        target_scale: f32,
        px: f32,
        py: f32,
        duration: Duration,
        now: Instant,
    ) {
        let target = target_scale.min(self.max_scale);
        let old_scale = self.tracker.current_scale();
        self.wrap_anim = None;
        self.zoom_anim = Some(ZoomAnimation {
            start: now,
            duration,
            old_scale,
            delta_scale: target - old_scale,
            dest_x: px,
            dest_y: py,
        });
    }

    /// Advance the active animation. The host calls this once per frame with
    /// its current clock reading.
    pub fn tick(&mut self, now: Instant) -> AnimationStatus {
        if let Some(anim) = self.wrap_anim.take() {
            return self.tick_wrap(anim, now);
        }
        if let Some(anim) = self.zoom_anim.take() {
            return self.tick_zoom(anim, now);
        }
        AnimationStatus::Idle
    }

    fn tick_wrap(&mut self, anim: WrapBoundsAnimation, now: Instant) -> AnimationStatus {
        let duration_ms = anim.duration.as_secs_f32() * 1000.0;
        let elapsed_ms = now
            .saturating_duration_since(anim.start)
            .as_secs_f32()
            .min(anim.duration.as_secs_f32())
            * 1000.0;

        let new_x = ease_out(elapsed_ms, 0.0, anim.delta_x, duration_ms);
        let new_y = ease_out(elapsed_ms, 0.0, anim.delta_y, duration_ms);
        let new_scale = ease_in_out(elapsed_ms, 0.0, anim.delta_scale, duration_ms);

        let [center_x, center_y] = *self.tracker.center();
        self.tracker
            .translate(new_x - (center_x - anim.old_x), new_y - (center_y - anim.old_y));
        if !anim.wraps_after_translate {
            let cx = self.crop_rect.center_x();
            let cy = self.crop_rect.center_y();
            self.zoom_in_to(anim.old_scale + new_scale, cx, cy);
        }

        if elapsed_ms >= duration_ms || self.is_wrapping_crop_bounds() {
            AnimationStatus::Completed
        } else {
            self.wrap_anim = Some(anim);
            AnimationStatus::Running
        }
    }

    fn tick_zoom(&mut self, anim: ZoomAnimation, now: Instant) -> AnimationStatus {
        let duration_ms = anim.duration.as_secs_f32() * 1000.0;
        let elapsed_ms = now
            .saturating_duration_since(anim.start)
            .as_secs_f32()
            .min(anim.duration.as_secs_f32())
            * 1000.0;

        let new_scale = ease_in_out(elapsed_ms, 0.0, anim.delta_scale, duration_ms);
        self.zoom_in_to(anim.old_scale + new_scale, anim.dest_x, anim.dest_y);

        if elapsed_ms >= duration_ms {
            self.fit_to_crop_bounds(true, now);
            AnimationStatus::Completed
        } else {
            self.zoom_anim = Some(anim);
            AnimationStatus::Running
        }
    }

    /// Drop all pending animations.
    pub fn cancel_animations(&mut self) {
        self.wrap_anim = None;
        self.zoom_anim = None;
    }

    /// True while a wrap or zoom animation is pending.
    pub fn has_active_animation(&self) -> bool {
        self.wrap_anim.is_some() || self.zoom_anim.is_some()
    }

    /// Cancel animations, force a non-animated coverage correction, and
    /// capture the state for the pixel pipeline.
    pub fn commit(&mut self) -> Option<ImageStateSnapshot> {
        if !self.tracker.is_laid_out() {
            return None;
        }
        self.cancel_animations();
        self.fit_to_crop_bounds(false, Instant::now());
        let snapshot = ImageStateSnapshot {
            crop_rect: self.crop_rect,
            image_rect: bounding_rect(self.tracker.corners()),
            scale: self.current_scale(),
            angle: self.current_angle(),
        };
        debug!(
            "commit snapshot: scale={} angle={} image_rect={:?}",
            snapshot.scale, snapshot.angle, snapshot.image_rect
        );
        Some(snapshot)
    }

    fn calculate_scale_bounds(&mut self) {
        let w = self.image_width;
        let h = self.image_height;
        let cw = self.crop_rect.width();
        let ch = self.crop_rect.height();
        let width_scale = (cw / w).min(cw / h);
        let height_scale = (ch / h).min(ch / w);
        self.min_scale = width_scale.min(height_scale);
        self.max_scale = self.min_scale * self.max_scale_multiplier;
    }

    /// Scale the image to cover the crop rect and center it there. Placement
    /// uses `max` of the two cover ratios while the scale bounds use `min`,
    /// so the image starts strictly covering even though the permitted
    /// minimum may be smaller.
    fn setup_initial_position(&mut self) {
        let width_scale = self.crop_rect.width() / self.image_width;
        let height_scale = self.crop_rect.height() / self.image_height;
        let initial_scale = width_scale.max(height_scale);

        let tx = (self.crop_rect.width() - self.image_width * initial_scale) / 2.0
            + self.crop_rect.left;
        let ty = (self.crop_rect.height() - self.image_height * initial_scale) / 2.0
            + self.crop_rect.top;

        let mut matrix = Matrix::identity();
        matrix.post_scale(initial_scale, 0.0, 0.0);
        matrix.post_translate(tx, ty);
        self.tracker.set_matrix(matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller_100() -> CropBoundsController {
        let mut c = CropBoundsController::new();
        c.layout(200.0, 100.0, Rect::new(0.0, 0.0, 100.0, 100.0))
            .unwrap();
        c
    }

    #[test]
    fn test_layout_rejects_empty_crop_rect() {
        let mut c = CropBoundsController::new();
        let err = c.layout(100.0, 100.0, Rect::new(0.0, 0.0, 0.0, 100.0));
        assert!(matches!(err, Err(BoundsError::DegenerateCropRect(_))));
    }

    #[test]
    fn test_scale_bounds_formula() {
        let c = controller_100();
        // W=200 H=100 Cw=Ch=100:
        // width_scale = min(100/200, 100/100) = 0.5
        // height_scale = min(100/100, 100/200) = 0.5
        assert!((c.min_scale() - 0.5).abs() < 1e-5);
        assert!((c.max_scale() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_initial_placement_covers_and_centers() {
        let c = controller_100();
        // cover scale = max(100/200, 100/100) = 1.0
        assert!((c.current_scale() - 1.0).abs() < 1e-4);
        assert_eq!(c.center(), &[50.0, 50.0]);
        assert!(c.is_wrapping_crop_bounds());
    }

    #[test]
    fn test_out_of_bounds_scale_deltas_are_dropped() {
        let mut c = controller_100();
        let before = c.current_scale();

        // 1.0 * 6.0 > max 5.0: dropped
        c.scale(6.0, 50.0, 50.0);
        assert_eq!(c.current_scale(), before);

        // 1.0 * 0.4 < min 0.5: dropped
        c.scale(0.4, 50.0, 50.0);
        assert_eq!(c.current_scale(), before);

        // In-range deltas apply
        c.scale(2.0, 50.0, 50.0);
        assert!((c.current_scale() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_scale_stays_in_bounds_for_any_sequence() {
        let mut c = controller_100();
        for delta in [3.0, 3.0, 3.0, 0.1, 0.1, 0.5, 10.0, 0.9, 1.1] {
            c.scale(delta, 30.0, 70.0);
            let s = c.current_scale();
            assert!(
                s >= c.min_scale() - 1e-4 && s <= c.max_scale() + 1e-4,
                "scale {} escaped [{}, {}]",
                s,
                c.min_scale(),
                c.max_scale()
            );
        }
    }

    #[test]
    fn test_wrap_test_exact_cover() {
        let c = controller_100();
        // Corners exactly matching the crop rect wrap it
        let exact = corners_of(&Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(c.corners_wrap_crop_bounds(&exact));

        // Expanded on each side still wraps
        let expanded = corners_of(&Rect::new(-5.0, -5.0, 105.0, 105.0));
        assert!(c.corners_wrap_crop_bounds(&expanded));

        // Shrunk on any side does not
        let shrunk = corners_of(&Rect::new(1.0, 0.0, 100.0, 100.0));
        assert!(!c.corners_wrap_crop_bounds(&shrunk));
    }

    #[test]
    fn test_translate_breaks_then_fit_restores_coverage() {
        let mut c = controller_100();
        c.translate(60.0, 0.0);
        assert!(!c.is_wrapping_crop_bounds());

        c.fit_to_crop_bounds(false, Instant::now());
        assert!(c.is_wrapping_crop_bounds());
    }

    #[test]
    fn test_fit_uses_minimal_indent_correction() {
        let mut c = controller_100();
        // Image is 200x100 at scale 1 centered on the 100x100 crop: x has
        // 50px slack. A 20px shift still wraps after pure center alignment,
        // so the correction must be the minimal indent, i.e. nothing at all.
        c.translate(20.0, 0.0);
        assert!(c.is_wrapping_crop_bounds());

        let center_before = *c.center();
        c.fit_to_crop_bounds(false, Instant::now());
        // Already wrapping: fit is a no-op
        assert_eq!(c.center(), &center_before);
    }

    #[test]
    fn test_wrap_animation_converges() {
        let mut c = controller_100();
        c.translate(80.0, 30.0);
        assert!(!c.is_wrapping_crop_bounds());

        let t0 = Instant::now();
        c.fit_to_crop_bounds(true, t0);
        assert!(c.has_active_animation());

        let mut status = AnimationStatus::Running;
        for frame in 1..=50 {
            status = c.tick(t0 + Duration::from_millis(frame * 16));
            if status == AnimationStatus::Completed {
                break;
            }
        }
        assert_eq!(status, AnimationStatus::Completed);
        assert!(c.is_wrapping_crop_bounds());
        assert!(!c.has_active_animation());
    }

    #[test]
    fn test_wrap_animation_scales_up_when_translation_insufficient() {
        let mut c = controller_100();
        // Zoom out to min scale: the 200x100 image at 0.5 is 100x50, which
        // cannot cover the 100x100 crop by translation alone.
        c.scale(0.5, 50.0, 50.0);
        assert!(!c.is_wrapping_crop_bounds());

        let t0 = Instant::now();
        c.fit_to_crop_bounds(true, t0);
        let mut last = AnimationStatus::Running;
        for frame in 1..=60 {
            last = c.tick(t0 + Duration::from_millis(frame * 16));
            if last == AnimationStatus::Completed {
                break;
            }
        }
        assert_eq!(last, AnimationStatus::Completed);
        assert!(c.current_scale() > 0.5);
        assert!(c.is_wrapping_crop_bounds());
    }

    #[test]
    fn test_gesture_cancels_animation() {
        let mut c = controller_100();
        c.translate(80.0, 0.0);
        c.fit_to_crop_bounds(true, Instant::now());
        assert!(c.has_active_animation());

        c.scale(1.2, 50.0, 50.0);
        assert!(!c.has_active_animation());
    }

    #[test]
    fn test_zoom_to_position_clamps_to_max() {
        let mut c = controller_100();
        let t0 = Instant::now();
        c.zoom_to_position(100.0, 50.0, 50.0, Duration::from_millis(200), t0);

        // Run the zoom to completion plus the follow-up wrap correction
        let mut now = t0;
        for _ in 0..80 {
            now += Duration::from_millis(16);
            if c.tick(now) == AnimationStatus::Idle {
                break;
            }
        }
        assert!(c.current_scale() <= c.max_scale() + 1e-3);
        assert!((c.current_scale() - c.max_scale()).abs() < 0.05);
    }

    #[test]
    fn test_only_one_animation_at_a_time() {
        let mut c = controller_100();
        c.translate(80.0, 0.0);
        let t0 = Instant::now();
        c.fit_to_crop_bounds(true, t0);
        c.zoom_to_position(2.0, 50.0, 50.0, Duration::from_millis(100), t0);
        // Starting the zoom must have replaced the wrap animation
        assert!(c.wrap_anim.is_none());
        assert!(c.zoom_anim.is_some());
    }

    #[test]
    fn test_commit_forces_coverage_and_snapshots() {
        let mut c = controller_100();
        c.translate(75.0, -40.0);
        c.fit_to_crop_bounds(true, Instant::now());

        let snapshot = c.commit().unwrap();
        assert!(!c.has_active_animation());
        assert!(c.is_wrapping_crop_bounds());
        assert_eq!(snapshot.crop_rect, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!((snapshot.scale - c.current_scale()).abs() < 1e-4);
        assert_eq!(snapshot.image_rect, bounding_rect(c.corners()));
    }

    #[test]
    fn test_commit_before_layout_returns_none() {
        let mut c = CropBoundsController::new();
        assert!(c.commit().is_none());
    }

    #[test]
    fn test_rotated_coverage_test() {
        let mut c = CropBoundsController::new();
        c.layout(200.0, 200.0, Rect::new(50.0, 50.0, 150.0, 150.0))
            .unwrap();
        // Zoom in so the image is twice the crop size, then rotate about the
        // crop center; the enlarged square still covers at 30 degrees
        c.scale(2.0, 100.0, 100.0);
        c.rotate_about_crop_center(30.0);
        assert!((c.current_angle() - 30.0).abs() < 1e-3);
        assert!(c.is_wrapping_crop_bounds());
    }

    #[test]
    fn test_rotation_gap_recovered_by_fit() {
        let mut c = CropBoundsController::new();
        c.layout(100.0, 100.0, Rect::new(0.0, 0.0, 100.0, 100.0))
            .unwrap();
        // A square exactly matching the crop rect stops covering once rotated
        c.rotate_about_crop_center(45.0);
        assert!(!c.is_wrapping_crop_bounds());

        c.fit_to_crop_bounds(false, Instant::now());
        assert!(c.is_wrapping_crop_bounds());
        // Coverage at 45 degrees requires sqrt(2) scale
        assert!(c.current_scale() >= std::f32::consts::SQRT_2 - 0.02);
    }
}
