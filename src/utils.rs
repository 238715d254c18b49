//! Small shared helpers: angle math and easing.

pub mod decoder;

// -------------------------------------------------------------------------------------------------

/// Wrap an angle difference into the (-180, 180] degree range, so accumulating
/// pointer angles never jumps across the ±180° discontinuity.
pub fn wrap_degrees(delta: f32) -> f32 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Nearest multiple of 90°, preserving the winding of the given angle.
pub fn nearest_detent(angle: f32) -> f32 {
    (angle / 90.0).round() * 90.0
}

/// Cubic ease-out curve for snap animations: fast start, gentle landing.
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_wrapping() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(90.0), 90.0);
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
    }

    #[test]
    fn detents() {
        assert_eq!(nearest_detent(95.0), 90.0);
        assert_eq!(nearest_detent(200.0), 180.0);
        assert_eq!(nearest_detent(316.0), 360.0);
        assert_eq!(nearest_detent(-100.0), -90.0);
        assert_eq!(nearest_detent(450.0), 450.0);
    }

    #[test]
    fn easing() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!(ease_out_cubic(0.5) > 0.5);
        assert_eq!(ease_out_cubic(2.0), 1.0);
    }
}
