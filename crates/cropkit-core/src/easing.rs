//! Cubic easing functions for animation frames.
//!
//! Both functions interpolate from `start` to `start + delta` as `elapsed`
//! runs from `0` to `duration`. They are total and side-effect free; callers
//! are responsible for clamping `elapsed` into `[0, duration]`.

/// Cubic ease-out: fast at the beginning, decelerating toward the end.
///
/// Evaluates `delta * ((t/duration - 1)^3 + 1) + start`.
pub fn ease_out(elapsed: f32, start: f32, delta: f32, duration: f32) -> f32 {
    let t = elapsed / duration - 1.0;
    delta * (t * t * t + 1.0) + start
}

/// Cubic ease-in-out: cubic ease-in over the first half of `duration`,
/// cubic ease-out over the second half.
///
/// The two halves meet at `start + delta/2` with matching derivatives, so the
/// curve is smooth at the midpoint.
pub fn ease_in_out(elapsed: f32, start: f32, delta: f32, duration: f32) -> f32 {
    let mut t = elapsed / (duration / 2.0);
    if t < 1.0 {
        delta / 2.0 * t * t * t + start
    } else {
        t -= 2.0;
        delta / 2.0 * (t * t * t + 2.0) + start
    }
}
