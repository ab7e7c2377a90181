//! 2D affine transform matrix.
//!
//! A point `(x, y)` maps to:
//!
//! ```text
//! x' = a11 * x + a12 * y + tx
//! y' = a21 * x + a22 * y + ty
//! ```
//!
//! Coordinates are screen-space (y down), so a positive rotation angle turns
//! content clockwise on screen. The `post_*` methods compose a new transform
//! *after* the current one, which is the order gesture deltas arrive in.
//!
//! For the similarity transforms built here (uniform scale + rotation +
//! translation), scale and angle are recoverable losslessly:
//! `scale = sqrt(a11^2 + a21^2)` and `angle = -atan2(a12, a11)`.

/// A 2D affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a11: f32,
    pub a12: f32,
    pub a21: f32,
    pub a22: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            a11: 1.0,
            a12: 0.0,
            a21: 0.0,
            a22: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// A pure translation.
    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            tx: dx,
            ty: dy,
            ..Self::identity()
        }
    }

    /// A rotation about the origin, in degrees.
    pub fn rotation(degrees: f32) -> Self {
        let rad = degrees.to_radians();
        let (sin, cos) = rad.sin_cos();
        Self {
            a11: cos,
            a12: -sin,
            a21: sin,
            a22: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// A rotation about the pivot `(px, py)`, in degrees.
    pub fn rotation_about(degrees: f32, px: f32, py: f32) -> Self {
        let mut m = Self::rotation(degrees);
        m.tx = px - m.a11 * px - m.a12 * py;
        m.ty = py - m.a21 * px - m.a22 * py;
        m
    }

    /// Compose a translation after this transform.
    pub fn post_translate(&mut self, dx: f32, dy: f32) {
        self.tx += dx;
        self.ty += dy;
    }

    /// Compose a uniform scale about `(px, py)` after this transform.
    pub fn post_scale(&mut self, scale: f32, px: f32, py: f32) {
        self.a11 *= scale;
        self.a12 *= scale;
        self.a21 *= scale;
        self.a22 *= scale;
        self.tx = scale * self.tx + (1.0 - scale) * px;
        self.ty = scale * self.ty + (1.0 - scale) * py;
    }

    /// Compose a rotation about `(px, py)` after this transform.
    pub fn post_rotate(&mut self, degrees: f32, px: f32, py: f32) {
        let rad = degrees.to_radians();
        let (sin, cos) = rad.sin_cos();

        let Matrix {
            a11,
            a12,
            a21,
            a22,
            tx,
            ty,
        } = *self;

        self.a11 = cos * a11 - sin * a21;
        self.a12 = cos * a12 - sin * a22;
        self.a21 = sin * a11 + cos * a21;
        self.a22 = sin * a12 + cos * a22;
        self.tx = cos * tx - sin * ty + px - cos * px + sin * py;
        self.ty = sin * tx + cos * ty + py - sin * px - cos * py;
    }

    /// Map a single point.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a11 * x + self.a12 * y + self.tx,
            self.a21 * x + self.a22 * y + self.ty,
        )
    }

    /// Map interleaved (x, y) pairs in place.
    pub fn map_points(&self, points: &mut [f32]) {
        debug_assert_eq!(points.len() % 2, 0, "odd point array length");
        for pair in points.chunks_exact_mut(2) {
            let (x, y) = self.map_point(pair[0], pair[1]);
            pair[0] = x;
            pair[1] = y;
        }
    }

    /// Map a rectangle and return the bounding box of its mapped corners.
    pub fn map_rect(&self, r: &crate::geometry::Rect) -> crate::geometry::Rect {
        let mut corners = crate::geometry::corners_of(r);
        self.map_points(&mut corners);

        let mut out = crate::geometry::Rect::new(
            f32::INFINITY,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
        );
        for pair in corners.chunks_exact(2) {
            out.left = out.left.min(pair[0]);
            out.top = out.top.min(pair[1]);
            out.right = out.right.max(pair[0]);
            out.bottom = out.bottom.max(pair[1]);
        }
        out
    }

    /// The uniform scale factor encoded in this transform.
    pub fn scale(&self) -> f32 {
        (self.a11 * self.a11 + self.a21 * self.a21).sqrt()
    }

    /// The rotation angle encoded in this transform, in degrees.
    pub fn angle_degrees(&self) -> f32 {
        -(self.a12.atan2(self.a11)).to_degrees()
    }
}
