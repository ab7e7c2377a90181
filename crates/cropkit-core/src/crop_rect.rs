//! Crop-rectangle drag/resize geometry.
//!
//! [`CropRectEditor`] owns the crop viewport inside a host surface and the
//! geometry derived from it: the 8-float corner array and center used for
//! hit-testing, and the grid-line segments used to render guidelines. The
//! dimmed mask and frame are drawn from [`CropRectEditor::crop_rect`]
//! directly; rendering itself is out of scope here.
//!
//! Corner indices follow the corner-array order, with a synthetic index for
//! the interior move zone:
//!
//! ```text
//! 0------->1
//! ^        |
//! |  move  |
//! |        v
//! 3<-------2
//! ```

use crate::geometry::{corners_of, Rect};

pub const DEFAULT_TOUCH_THRESHOLD: f32 = 30.0;
pub const DEFAULT_MIN_CROP_SIZE: f32 = 100.0;
pub const DEFAULT_GRID_ROWS: u32 = 2;
pub const DEFAULT_GRID_COLUMNS: u32 = 2;

/// Whether the crop rectangle may be reshaped by dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreestyleMode {
    /// The rectangle is fixed; drags are ignored.
    #[default]
    Disabled,
    /// Corners may be dragged and the interior moves the whole rectangle.
    Enabled,
    /// Corners may be dragged; interior touches pass through to the image.
    EnabledWithPassThrough,
}

/// The part of the crop rectangle a drag is acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragHandle {
    /// One of the four corners, in corner-array order.
    Corner(usize),
    /// The interior: translate the whole rectangle.
    Move,
}

/// Maintains the crop rectangle and its derived hit-test/overlay geometry.
pub struct CropRectEditor {
    host_width: f32,
    host_height: f32,
    padding: f32,
    crop_rect: Rect,
    target_aspect_ratio: f32,
    corners: [f32; 8],
    center: [f32; 2],
    grid_rows: u32,
    grid_columns: u32,
    grid_lines: Option<Vec<f32>>,
    freestyle_mode: FreestyleMode,
    touch_threshold: f32,
    min_crop_size: f32,
    active_handle: Option<DragHandle>,
    previous_touch: Option<(f32, f32)>,
    listener: Option<Box<dyn FnMut(Rect)>>,
}

impl std::fmt::Debug for CropRectEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CropRectEditor")
            .field("crop_rect", &self.crop_rect)
            .field("target_aspect_ratio", &self.target_aspect_ratio)
            .field("freestyle_mode", &self.freestyle_mode)
            .field("active_handle", &self.active_handle)
            .finish_non_exhaustive()
    }
}

impl Default for CropRectEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl CropRectEditor {
    pub fn new() -> Self {
        Self {
            host_width: 0.0,
            host_height: 0.0,
            padding: 0.0,
            crop_rect: Rect::default(),
            target_aspect_ratio: 0.0,
            corners: [0.0; 8],
            center: [0.0; 2],
            grid_rows: DEFAULT_GRID_ROWS,
            grid_columns: DEFAULT_GRID_COLUMNS,
            grid_lines: None,
            freestyle_mode: FreestyleMode::default(),
            touch_threshold: DEFAULT_TOUCH_THRESHOLD,
            min_crop_size: DEFAULT_MIN_CROP_SIZE,
            active_handle: None,
            previous_touch: None,
            listener: None,
        }
    }

    /// Size of the host surface, minus padding on each side.
    pub fn set_host_size(&mut self, width: f32, height: f32, padding: f32) {
        self.host_width = width - 2.0 * padding;
        self.host_height = height - 2.0 * padding;
        self.padding = padding;
        if self.target_aspect_ratio > 0.0 {
            self.setup_crop_bounds();
        }
    }

    /// Register the observer notified when the rectangle is (re)set or a drag
    /// completes.
    pub fn set_listener(&mut self, listener: impl FnMut(Rect) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn set_freestyle_mode(&mut self, mode: FreestyleMode) {
        self.freestyle_mode = mode;
    }

    pub fn freestyle_mode(&self) -> FreestyleMode {
        self.freestyle_mode
    }

    pub fn set_touch_threshold(&mut self, threshold: f32) {
        self.touch_threshold = threshold;
    }

    pub fn set_min_crop_size(&mut self, min_size: f32) {
        self.min_crop_size = min_size;
    }

    /// Grid guideline density. Invalidates cached line geometry.
    pub fn set_grid_counts(&mut self, rows: u32, columns: u32) {
        self.grid_rows = rows;
        self.grid_columns = columns;
        self.grid_lines = None;
    }

    pub fn crop_rect(&self) -> Rect {
        self.crop_rect
    }

    pub fn target_aspect_ratio(&self) -> f32 {
        self.target_aspect_ratio
    }

    /// Crop-rect corners (TL, TR, BR, BL as 8 floats).
    pub fn corners(&self) -> &[f32; 8] {
        &self.corners
    }

    pub fn center(&self) -> &[f32; 2] {
        &self.center
    }

    /// Recompute the crop rectangle as the largest rectangle of the given
    /// aspect ratio centered inside the host surface.
    pub fn set_aspect_ratio(&mut self, ratio: f32) {
        self.target_aspect_ratio = ratio;
        if self.host_width > 0.0 {
            self.setup_crop_bounds();
        }
    }

    fn setup_crop_bounds(&mut self) {
        let height = self.host_width / self.target_aspect_ratio;
        self.crop_rect = if height > self.host_height {
            let width = self.host_height * self.target_aspect_ratio;
            let half_diff = (self.host_width - width) / 2.0;
            Rect::new(
                self.padding + half_diff,
                self.padding,
                self.padding + width + half_diff,
                self.padding + self.host_height,
            )
        } else {
            let half_diff = (self.host_height - height) / 2.0;
            Rect::new(
                self.padding,
                self.padding + half_diff,
                self.padding + self.host_width,
                self.padding + height + half_diff,
            )
        };
        self.update_derived_geometry();
        self.notify();
    }

    /// Hit-test a touch-down position. Returns the handle the drag will act
    /// on, or `None` when the touch misses (or freestyle editing is off).
    pub fn begin_drag(&mut self, x: f32, y: f32) -> Option<DragHandle> {
        if self.crop_rect.is_empty() || self.freestyle_mode == FreestyleMode::Disabled {
            return None;
        }
        let handle = self.hit_test(x, y);
        self.active_handle = handle;
        self.previous_touch = handle.map(|_| (x, y));
        handle
    }

    fn hit_test(&self, x: f32, y: f32) -> Option<DragHandle> {
        let mut closest = None;
        let mut closest_distance = self.touch_threshold;
        for i in 0..4 {
            let dx = x - self.corners[2 * i];
            let dy = y - self.corners[2 * i + 1];
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < closest_distance {
                closest_distance = distance;
                closest = Some(DragHandle::Corner(i));
            }
        }
        if closest.is_none()
            && self.freestyle_mode == FreestyleMode::Enabled
            && self.crop_rect.contains_point(x, y)
        {
            return Some(DragHandle::Move);
        }
        closest
    }

    /// Continue the active drag toward `(x, y)`. Corner drags freeze a
    /// dimension that would fall below the minimum size; move drags are
    /// rejected when any edge would leave the host surface.
    pub fn drag_to(&mut self, x: f32, y: f32) {
        let Some(handle) = self.active_handle else {
            return;
        };
        let x = x.clamp(self.padding, self.padding + self.host_width);
        let y = y.clamp(self.padding, self.padding + self.host_height);

        match handle {
            DragHandle::Corner(index) => self.resize_corner(index, x, y),
            DragHandle::Move => self.move_rect(x, y),
        }
        self.previous_touch = Some((x, y));
    }

    fn resize_corner(&mut self, index: usize, x: f32, y: f32) {
        let r = self.crop_rect;
        let temp = match index {
            0 => Rect::new(x, y, r.right, r.bottom),
            1 => Rect::new(r.left, y, x, r.bottom),
            2 => Rect::new(r.left, r.top, x, y),
            3 => Rect::new(x, r.top, r.right, y),
            _ => return,
        };

        let change_width = temp.width() >= self.min_crop_size;
        let change_height = temp.height() >= self.min_crop_size;
        self.crop_rect = Rect::new(
            if change_width { temp.left } else { r.left },
            if change_height { temp.top } else { r.top },
            if change_width { temp.right } else { r.right },
            if change_height { temp.bottom } else { r.bottom },
        );
        if change_width || change_height {
            self.update_derived_geometry();
        }
    }

    fn move_rect(&mut self, x: f32, y: f32) {
        let Some((prev_x, prev_y)) = self.previous_touch else {
            return;
        };
        let moved = self.crop_rect.offset(x - prev_x, y - prev_y);
        let outer = Rect::new(
            0.0,
            0.0,
            self.host_width + 2.0 * self.padding,
            self.host_height + 2.0 * self.padding,
        );
        if moved.left > outer.left
            && moved.top > outer.top
            && moved.right < outer.right
            && moved.bottom < outer.bottom
        {
            self.crop_rect = moved;
            self.update_derived_geometry();
        }
    }

    /// Finish the active drag and publish the resulting rectangle.
    pub fn end_drag(&mut self) {
        if self.active_handle.take().is_some() {
            self.previous_touch = None;
            self.notify();
        }
    }

    /// Grid guideline segments as (x0, y0, x1, y1) quadruples, lazily
    /// recomputed after an edit.
    pub fn grid_lines(&mut self) -> &[f32] {
        if self.grid_lines.is_none() && !self.crop_rect.is_empty() {
            let r = self.crop_rect;
            let mut lines =
                Vec::with_capacity((self.grid_rows as usize + self.grid_columns as usize) * 4);
            for i in 0..self.grid_rows {
                let y = r.height() * ((i + 1) as f32 / (self.grid_rows + 1) as f32) + r.top;
                lines.extend_from_slice(&[r.left, y, r.right, y]);
            }
            for i in 0..self.grid_columns {
                let x = r.width() * ((i + 1) as f32 / (self.grid_columns + 1) as f32) + r.left;
                lines.extend_from_slice(&[x, r.top, x, r.bottom]);
            }
            self.grid_lines = Some(lines);
        }
        self.grid_lines.as_deref().unwrap_or(&[])
    }

    fn update_derived_geometry(&mut self) {
        self.corners = corners_of(&self.crop_rect);
        self.center = self.crop_rect.center();
        self.grid_lines = None;
    }

    fn notify(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener(self.crop_rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor_400x300() -> CropRectEditor {
        let mut e = CropRectEditor::new();
        e.set_host_size(400.0, 300.0, 0.0);
        e.set_freestyle_mode(FreestyleMode::Enabled);
        e
    }

    #[test]
    fn test_aspect_ratio_wide_host() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        // Square inside 400x300: 300x300 centered horizontally
        assert_eq!(e.crop_rect(), Rect::new(50.0, 0.0, 350.0, 300.0));
        assert_eq!(e.center(), &[200.0, 150.0]);
    }

    #[test]
    fn test_aspect_ratio_taller_than_host() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(4.0);
        // 4:1 inside 400x300: full width, 100 tall, centered vertically
        assert_eq!(e.crop_rect(), Rect::new(0.0, 100.0, 400.0, 200.0));
    }

    #[test]
    fn test_aspect_ratio_respects_padding() {
        let mut e = CropRectEditor::new();
        e.set_host_size(400.0, 300.0, 10.0);
        e.set_aspect_ratio(1.0);
        // Host shrinks to 380x280: square is 280x280
        assert_eq!(e.crop_rect(), Rect::new(60.0, 10.0, 340.0, 290.0));
    }

    #[test]
    fn test_hit_test_nearest_corner() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        // Near top-left corner (50, 0)
        assert_eq!(e.begin_drag(60.0, 8.0), Some(DragHandle::Corner(0)));
        e.end_drag();
        // Near bottom-right corner (350, 300)
        assert_eq!(e.begin_drag(345.0, 290.0), Some(DragHandle::Corner(2)));
        e.end_drag();
        // Interior, far from all corners: move zone
        assert_eq!(e.begin_drag(200.0, 150.0), Some(DragHandle::Move));
        e.end_drag();
    }

    #[test]
    fn test_hit_test_outside_threshold() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        // 40px from the top-left corner, outside the crop rect
        assert_eq!(e.begin_drag(10.0, 0.0), None);
    }

    #[test]
    fn test_disabled_mode_rejects_drags() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        e.set_freestyle_mode(FreestyleMode::Disabled);
        assert_eq!(e.begin_drag(50.0, 0.0), None);
    }

    #[test]
    fn test_pass_through_has_no_move_zone() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        e.set_freestyle_mode(FreestyleMode::EnabledWithPassThrough);
        assert_eq!(e.begin_drag(200.0, 150.0), None);
        assert_eq!(e.begin_drag(52.0, 3.0), Some(DragHandle::Corner(0)));
    }

    #[test]
    fn test_corner_drag_adjusts_adjacent_edges() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        e.begin_drag(50.0, 0.0).unwrap();
        e.drag_to(80.0, 30.0);
        assert_eq!(e.crop_rect(), Rect::new(80.0, 30.0, 350.0, 300.0));
        e.end_drag();
    }

    #[test]
    fn test_min_size_freezes_dimension() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        e.begin_drag(50.0, 0.0).unwrap();
        // Dragging the top-left corner to within 100px of the right edge
        // would make the rect too narrow: width freezes, height follows
        e.drag_to(300.0, 150.0);
        let r = e.crop_rect();
        assert_eq!(r.left, 50.0, "width must freeze below minimum");
        assert_eq!(r.top, 150.0, "height may still change");
    }

    #[test]
    fn test_move_drag_translates() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(2.0);
        // 400x200 fills the width; shrink it so there is room to move
        e.begin_drag(0.0, 50.0).unwrap();
        e.drag_to(100.0, 100.0);
        e.end_drag();
        let before = e.crop_rect();

        e.begin_drag(before.center_x(), before.center_y()).unwrap();
        e.drag_to(before.center_x() - 20.0, before.center_y() + 10.0);
        e.end_drag();
        assert_eq!(e.crop_rect(), before.offset(-20.0, 10.0));
    }

    #[test]
    fn test_move_drag_rejected_at_host_edge() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        // The square touches top and bottom: any vertical move is rejected
        let before = e.crop_rect();
        e.begin_drag(200.0, 150.0).unwrap();
        e.drag_to(200.0, 250.0);
        e.end_drag();
        assert_eq!(e.crop_rect(), before);
    }

    #[test]
    fn test_grid_lines_layout() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        let lines = e.grid_lines().to_vec();
        // 2 rows + 2 columns, 4 floats each
        assert_eq!(lines.len(), 16);
        // First horizontal line at one third of the height
        assert_eq!(&lines[0..4], &[50.0, 100.0, 350.0, 100.0]);
        // First vertical line at one third of the width
        assert_eq!(&lines[8..12], &[150.0, 0.0, 150.0, 300.0]);
    }

    #[test]
    fn test_grid_cache_invalidated_by_edit() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        let before = e.grid_lines().to_vec();

        e.begin_drag(50.0, 0.0).unwrap();
        e.drag_to(110.0, 60.0);
        e.end_drag();

        let after = e.grid_lines().to_vec();
        assert_ne!(before, after);
    }

    #[test]
    fn test_grid_count_change_invalidates() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        assert_eq!(e.grid_lines().len(), 16);
        e.set_grid_counts(3, 1);
        assert_eq!(e.grid_lines().len(), 16);
        e.set_grid_counts(1, 1);
        assert_eq!(e.grid_lines().len(), 8);
    }

    #[test]
    fn test_listener_fires_on_setup_and_drag_end() {
        let mut e = editor_400x300();
        let updates: Rc<RefCell<Vec<Rect>>> = Rc::new(RefCell::new(Vec::new()));
        let updates2 = updates.clone();
        e.set_listener(move |r| updates2.borrow_mut().push(r));

        e.set_aspect_ratio(1.0);
        assert_eq!(updates.borrow().len(), 1);

        e.begin_drag(50.0, 0.0).unwrap();
        e.drag_to(70.0, 20.0);
        e.end_drag();
        assert_eq!(updates.borrow().len(), 2);
        assert_eq!(updates.borrow()[1], e.crop_rect());
    }

    #[test]
    fn test_corners_follow_rect() {
        let mut e = editor_400x300();
        e.set_aspect_ratio(1.0);
        assert_eq!(
            e.corners(),
            &[50.0, 0.0, 350.0, 0.0, 350.0, 300.0, 50.0, 300.0]
        );
    }
}
