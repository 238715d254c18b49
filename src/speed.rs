//! Rotation angle to playback speed mapping.

// -------------------------------------------------------------------------------------------------

/// Factor applied to the mapped speed while a shake boost is active.
pub const SHAKE_BOOST_FACTOR: f32 = 2.0;

/// Map a rotation angle to a signed playback speed multiplier.
///
/// The mapping is piecewise linear between the four cardinal detents and
/// periodic in 360°: upright (0°) plays forward at 1×, a quarter turn either
/// way stops playback, upside down (180°) plays in reverse at -1×.
pub fn playback_speed(angle: f32, shake_boost: bool) -> f32 {
    let theta = angle.rem_euclid(360.0);
    let base = if theta < 90.0 {
        1.0 - theta / 90.0
    } else if theta < 180.0 {
        -(theta - 90.0) / 90.0
    } else if theta < 270.0 {
        -1.0 + (theta - 180.0) / 90.0
    } else {
        (theta - 270.0) / 90.0
    };
    if shake_boost {
        base * SHAKE_BOOST_FACTOR
    } else {
        base
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detent_values() {
        assert_eq!(playback_speed(0.0, false), 1.0);
        assert_eq!(playback_speed(90.0, false), 0.0);
        assert_eq!(playback_speed(180.0, false), -1.0);
        assert_eq!(playback_speed(270.0, false), 0.0);
        assert_eq!(playback_speed(360.0, false), 1.0);
    }

    #[test]
    fn linear_interpolation_between_detents() {
        assert!((playback_speed(45.0, false) - 0.5).abs() < 1e-6);
        assert!((playback_speed(135.0, false) + 0.5).abs() < 1e-6);
        assert!((playback_speed(225.0, false) + 0.5).abs() < 1e-6);
        assert!((playback_speed(315.0, false) - 0.5).abs() < 1e-6);
        // release at 200°: reverse, slow
        assert!((playback_speed(200.0, false) - (-1.0 + 20.0 / 90.0)).abs() < 1e-6);
    }

    #[test]
    fn winding_and_negative_angles() {
        assert_eq!(playback_speed(720.0, false), playback_speed(0.0, false));
        assert!((playback_speed(-90.0, false) - playback_speed(270.0, false)).abs() < 1e-6);
        assert!((playback_speed(450.0, false) - playback_speed(90.0, false)).abs() < 1e-6);
    }

    #[test]
    fn shake_boost_doubles() {
        assert_eq!(playback_speed(0.0, true), 2.0);
        assert!((playback_speed(200.0, true) - 2.0 * playback_speed(200.0, false)).abs() < 1e-6);
    }
}
