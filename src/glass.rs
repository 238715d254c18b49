//! Glass shape and physics tunables.
//!
//! The glass is two triangular chambers joined at a narrow neck. Glass-space
//! is a right-handed coordinate system with the center axis at `x = 0` and the
//! neck at `y = 0`: the top chamber spans `y ∈ [0, CHAMBER_HEIGHT]` widening
//! upwards, the bottom chamber mirrors it below.

use glam::Vec2;

// -------------------------------------------------------------------------------------------------

/// Height of one chamber in glass-space units.
pub const CHAMBER_HEIGHT: f32 = 1.0;

/// Half width of a chamber at its base (the wide end).
pub const BASE_HALF_WIDTH: f32 = 0.55;

/// Fraction of a chamber's triangle area the grains should visually fill.
pub const TARGET_FILL: f32 = 0.8;

/// Packing efficiency of loosely piled discs.
pub const PACKING_EFFICIENCY: f32 = 0.35;

/// Gravity magnitude in glass-space units per second squared.
pub const GRAVITY: f32 = 3.5;

/// Per-frame velocity retention at the 60 Hz reference rate.
pub const FRICTION: f32 = 0.92;

/// Normal velocity retention when bouncing off a wall.
pub const BOUNCE_DAMPING: f32 = 0.3;

/// Tangential velocity retention when sliding along a wall.
pub const WALL_SLIDE_DAMPING: f32 = 0.7;

/// Below this speed a grounded grain in the top chamber counts as resting.
/// Sits above the per-frame gravity increment, so a grain whose motion is
/// fully absorbed by contacts can still accumulate rest frames.
pub const SETTLE_SPEED_TOP: f32 = 0.12;

/// Below this speed a grounded grain in the bottom chamber counts as resting.
pub const SETTLE_SPEED_BOTTOM: f32 = 0.15;

/// Consecutive rest frames before a grain settles.
pub const SETTLE_FRAMES: u32 = 6;

/// Pairwise collision resolution passes per physics step.
pub const COLLISION_PASSES: usize = 3;

/// A moving grain above this speed knocks settled grains awake on contact.
pub const WAKE_IMPACT_SPEED: f32 = 0.25;

/// Impact wake radius, in grain radii, around a grain landing after a fall.
pub const IMPACT_WAKE_RADII: f32 = 6.0;

/// Downward seed speed applied to a grain released into the neck.
pub const NECK_SEED_SPEED: f32 = 0.5;

// -------------------------------------------------------------------------------------------------

/// One of the two triangular chambers of the glass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Chamber {
    Top,
    Bottom,
}

impl Chamber {
    /// The chamber on the other side of the neck.
    pub fn other(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }

    /// Sign of this chamber's y range: +1 for top, -1 for bottom.
    pub fn y_sign(self) -> f32 {
        match self {
            Self::Top => 1.0,
            Self::Bottom => -1.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Immutable glass measurements, computed once per session from the total
/// grain count.
#[derive(Debug, Clone, Copy)]
pub struct GlassGeometry {
    /// Radius of a single grain.
    pub grain_radius: f32,
    /// Half width of the neck passage, sized to admit exactly one grain.
    pub neck_half_width: f32,
}

impl GlassGeometry {
    /// Compute measurements for the given total grain count. The grain radius
    /// is sized so all grains together fill [`TARGET_FILL`] of one chamber's
    /// triangle area at [`PACKING_EFFICIENCY`].
    pub fn for_grain_count(total_grains: usize) -> Self {
        let chamber_area = BASE_HALF_WIDTH * CHAMBER_HEIGHT;
        let grain_radius = if total_grains > 0 {
            let per_grain_area =
                chamber_area * TARGET_FILL * PACKING_EFFICIENCY / total_grains as f32;
            (per_grain_area / std::f32::consts::PI).sqrt()
        } else {
            0.0
        };
        Self {
            grain_radius,
            neck_half_width: grain_radius * 1.25,
        }
    }

    /// Half width of the chamber cross-section at the given y coordinate.
    /// The apex is expanded by the neck half width, so the passage stays open.
    pub fn half_width_at(&self, y: f32) -> f32 {
        let t = (y.abs() / CHAMBER_HEIGHT).clamp(0.0, 1.0);
        self.neck_half_width + (BASE_HALF_WIDTH - self.neck_half_width) * t
    }

    /// Inward-pointing unit normal of the given chamber's sloped wall.
    /// `side` is -1 for the left wall, +1 for the right wall.
    pub fn wall_normal(&self, chamber: Chamber, side: f32) -> Vec2 {
        // The right wall of the top chamber runs from (neck_half, 0) to
        // (base_half, height); its inward normal points left and slightly up.
        let slope = BASE_HALF_WIDTH - self.neck_half_width;
        let normal = Vec2::new(-CHAMBER_HEIGHT, slope * chamber.y_sign()).normalize();
        Vec2::new(normal.x * side.signum(), normal.y)
    }

    /// Signed distance from the given position to the chamber's wall on `side`.
    /// Positive means inside the chamber.
    pub fn wall_distance(&self, chamber: Chamber, side: f32, position: Vec2) -> f32 {
        let apex = Vec2::new(self.neck_half_width * side.signum(), 0.0);
        (position - apex).dot(self.wall_normal(chamber, side))
    }

    /// True when a grain of `radius` at `position` lies fully within the
    /// chamber's triangular cross-section, expanded by the neck at the apex.
    pub fn contains(&self, chamber: Chamber, position: Vec2, radius: f32) -> bool {
        let y = position.y * chamber.y_sign();
        if y < radius - 1e-4 || y > CHAMBER_HEIGHT - radius + 1e-4 {
            return false;
        }
        position.x.abs() <= self.half_width_at(position.y) - radius + 1e-4
    }

    /// Hard-clip a grain center back inside the chamber. Numerical safety net
    /// behind the regular wall collision response.
    pub fn clamp_inside(&self, chamber: Chamber, position: Vec2, radius: f32) -> Vec2 {
        let sign = chamber.y_sign();
        let y = (position.y * sign).clamp(radius, CHAMBER_HEIGHT - radius) * sign;
        let max_x = (self.half_width_at(y) - radius).max(0.0);
        Vec2::new(position.x.clamp(-max_x, max_x), y)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_from_grain_count() {
        let geometry = GlassGeometry::for_grain_count(180);
        assert!(geometry.grain_radius > 0.0);
        assert!(geometry.neck_half_width > geometry.grain_radius);
        // all grains together cover the configured share of one chamber
        let total_area = 180.0 * std::f32::consts::PI * geometry.grain_radius.powi(2);
        let expected = BASE_HALF_WIDTH * CHAMBER_HEIGHT * TARGET_FILL * PACKING_EFFICIENCY;
        assert!((total_area - expected).abs() < 1e-4);

        let empty = GlassGeometry::for_grain_count(0);
        assert_eq!(empty.grain_radius, 0.0);
    }

    #[test]
    fn chamber_cross_sections() {
        let geometry = GlassGeometry::for_grain_count(120);
        assert_eq!(geometry.half_width_at(0.0), geometry.neck_half_width);
        assert_eq!(geometry.half_width_at(CHAMBER_HEIGHT), BASE_HALF_WIDTH);
        assert_eq!(geometry.half_width_at(-CHAMBER_HEIGHT), BASE_HALF_WIDTH);

        let r = geometry.grain_radius;
        assert!(geometry.contains(Chamber::Top, Vec2::new(0.0, 0.5), r));
        assert!(!geometry.contains(Chamber::Top, Vec2::new(0.6, 0.5), r));
        assert!(geometry.contains(Chamber::Bottom, Vec2::new(0.0, -0.5), r));
        assert!(!geometry.contains(Chamber::Bottom, Vec2::new(0.0, 0.5), r));
    }

    #[test]
    fn clamping_restores_invariant() {
        let geometry = GlassGeometry::for_grain_count(60);
        let r = geometry.grain_radius;
        let clamped = geometry.clamp_inside(Chamber::Top, Vec2::new(2.0, -1.0), r);
        assert!(geometry.contains(Chamber::Top, clamped, r));
        let clamped = geometry.clamp_inside(Chamber::Bottom, Vec2::new(-3.0, 5.0), r);
        assert!(geometry.contains(Chamber::Bottom, clamped, r));
    }

    #[test]
    fn wall_normals_point_inward() {
        let geometry = GlassGeometry::for_grain_count(60);
        // a grain near the right wall of the top chamber gets pushed left
        assert!(geometry.wall_normal(Chamber::Top, 1.0).x < 0.0);
        assert!(geometry.wall_normal(Chamber::Top, -1.0).x > 0.0);
        // center of the chamber is well inside both walls
        let center = Vec2::new(0.0, 0.5);
        assert!(geometry.wall_distance(Chamber::Top, 1.0, center) > 0.0);
        assert!(geometry.wall_distance(Chamber::Top, -1.0, center) > 0.0);
    }
}
