//! Pointer drag to rotation angle conversion, detent snapping and shake
//! detection.
//!
//! All methods take explicit timestamps (time since session start), so the
//! controller behaves deterministically under test.

use std::time::Duration;

use crate::utils::{ease_out_cubic, nearest_detent, wrap_degrees};

// -------------------------------------------------------------------------------------------------

/// Within this distance of a detent, the angle is magnetically pulled while dragging.
pub const DETENT_PULL_THRESHOLD: f32 = 10.0;
/// How strongly the magnetic pull bends the dragged angle toward the detent.
pub const DETENT_PULL_STRENGTH: f32 = 0.6;
/// Strictly within this distance of a detent, releasing the drag snaps to it.
/// A release at exactly the threshold keeps its angle.
pub const RELEASE_SNAP_THRESHOLD: f32 = 20.0;
/// Fixed duration of the eased release snap animation.
pub const SNAP_DURATION: Duration = Duration::from_millis(250);

/// Rolling window in which direction reversals count towards a shake.
pub const SHAKE_WINDOW: Duration = Duration::from_millis(800);
/// Number of reversals within the window that triggers the boost.
pub const SHAKE_REVERSAL_COUNT: usize = 2;
/// How long the speed boost stays active after a detected shake.
pub const SHAKE_BOOST_DURATION: Duration = Duration::from_secs(2);
/// Angle deltas below this are ignored by the direction tracker.
const SHAKE_MIN_DELTA: f32 = 0.5;

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
enum GesturePhase {
    Idle,
    Dragging,
    Snapping,
}

#[derive(Debug, Clone, Copy)]
struct SnapAnimation {
    from: f32,
    to: f32,
    started: Duration,
}

/// Converts pointer drags into a continuous rotation angle.
///
/// The angle is unbounded and preserves winding, so multiple full turns keep
/// accumulating instead of wrapping at ±360°. State machine over
/// Idle → Dragging → Snapping.
pub struct RotationController {
    phase: GesturePhase,
    /// Raw continuous angle in degrees, without magnetic pull applied.
    angle: f32,
    /// Raw angle at the moment the current drag started.
    anchor_angle: f32,
    /// Unwrapped pointer angle of the last `drag_to` call.
    last_pointer_angle: f32,
    snap: Option<SnapAnimation>,
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationController {
    pub fn new() -> Self {
        Self {
            phase: GesturePhase::Idle,
            angle: 0.0,
            anchor_angle: 0.0,
            last_pointer_angle: 0.0,
            snap: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == GesturePhase::Dragging
    }

    /// Begin a drag at the given pointer angle (degrees around the glass
    /// center). Cancels an in-flight snap animation, anchoring at its current
    /// eased position.
    pub fn start_drag(&mut self, pointer_angle: f32, now: Duration) {
        self.angle = self.current_angle(now);
        self.snap = None;
        self.phase = GesturePhase::Dragging;
        self.anchor_angle = self.angle;
        self.last_pointer_angle = pointer_angle;
    }

    /// Continue a drag. Returns the raw angle delta of this move, which the
    /// caller feeds to the shake detector. No-op outside a drag.
    pub fn drag_to(&mut self, pointer_angle: f32) -> f32 {
        if self.phase != GesturePhase::Dragging {
            return 0.0;
        }
        // wrap the per-move delta so crossing ±180° never jumps
        let delta = wrap_degrees(pointer_angle - self.last_pointer_angle);
        self.last_pointer_angle += delta;
        self.angle += delta;
        delta
    }

    /// End the current drag. When released strictly within
    /// [`RELEASE_SNAP_THRESHOLD`] of a detent, starts an eased snap animation
    /// to it; otherwise the angle stays where the drag left it.
    pub fn end_drag(&mut self, now: Duration) {
        if self.phase != GesturePhase::Dragging {
            return;
        }
        let detent = nearest_detent(self.angle);
        if (self.angle - detent).abs() < RELEASE_SNAP_THRESHOLD {
            self.phase = GesturePhase::Snapping;
            self.snap = Some(SnapAnimation {
                from: self.angle,
                to: detent,
                started: now,
            });
        } else {
            self.phase = GesturePhase::Idle;
        }
    }

    /// The angle to display and map to playback speed right now: the raw drag
    /// angle with magnetic detent pull while dragging, the eased animation
    /// position while snapping.
    pub fn current_angle(&mut self, now: Duration) -> f32 {
        match self.phase {
            GesturePhase::Idle => self.angle,
            GesturePhase::Dragging => Self::with_detent_pull(self.angle),
            GesturePhase::Snapping => {
                let Some(snap) = self.snap else {
                    self.phase = GesturePhase::Idle;
                    return self.angle;
                };
                let elapsed = now.saturating_sub(snap.started);
                let t = elapsed.as_secs_f32() / SNAP_DURATION.as_secs_f32();
                if t >= 1.0 {
                    self.phase = GesturePhase::Idle;
                    self.snap = None;
                    self.angle = snap.to;
                    self.angle
                } else {
                    snap.from + (snap.to - snap.from) * ease_out_cubic(t)
                }
            }
        }
    }

    /// Soft magnetic pull toward the nearest detent: bends the angle without
    /// fully locking it, and stays continuous at the threshold boundary.
    fn with_detent_pull(angle: f32) -> f32 {
        let detent = nearest_detent(angle);
        let offset = angle - detent;
        if offset.abs() < DETENT_PULL_THRESHOLD {
            let falloff = 1.0 - offset.abs() / DETENT_PULL_THRESHOLD;
            angle - offset * DETENT_PULL_STRENGTH * falloff
        } else {
            angle
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Detects rapid direction reversals of the rotation drag and raises a
/// temporary speed boost flag.
pub struct ShakeDetector {
    last_direction: i8,
    reversals: Vec<Duration>,
    boost_until: Option<Duration>,
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ShakeDetector {
    pub fn new() -> Self {
        Self {
            last_direction: 0,
            reversals: Vec::new(),
            boost_until: None,
        }
    }

    /// Feed one raw rotation delta. Called on every drag move.
    pub fn track_delta(&mut self, delta: f32, now: Duration) {
        if delta.abs() < SHAKE_MIN_DELTA {
            return;
        }
        let direction = if delta > 0.0 { 1 } else { -1 };
        if self.last_direction != 0 && direction != self.last_direction {
            self.reversals.push(now);
            self.reversals
                .retain(|&t| now.saturating_sub(t) <= SHAKE_WINDOW);
            if self.reversals.len() >= SHAKE_REVERSAL_COUNT {
                self.boost_until = Some(now + SHAKE_BOOST_DURATION);
                self.reversals.clear();
            }
        }
        self.last_direction = direction;
    }

    /// True while the boost is active; expires on its own.
    pub fn is_boosted(&self, now: Duration) -> bool {
        self.boost_until.is_some_and(|until| now < until)
    }

    /// Reset the direction tracker. Must be called when a drag ends, so a new
    /// drag starts with a clean reversal count. Keeps an active boost running.
    pub fn reset_direction(&mut self) {
        self.last_direction = 0;
        self.reversals.clear();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn drag_accumulates_and_preserves_winding() {
        let mut rotation = RotationController::new();
        rotation.start_drag(0.0, ms(0));
        // rotate three quarter turns in 30° steps; crossing 180° must not jump
        for i in 1..=9 {
            rotation.drag_to(30.0 * i as f32);
        }
        assert!((rotation.angle - 270.0).abs() < 1e-3);
    }

    #[test]
    fn wrap_discontinuity_is_handled() {
        let mut rotation = RotationController::new();
        rotation.start_drag(170.0, ms(0));
        let delta = rotation.drag_to(-170.0);
        // 170° -> -170° across the seam is a +20° move, not -340°
        assert!((delta - 20.0).abs() < 1e-3);
    }

    #[test]
    fn release_near_detent_snaps_exactly() {
        let mut rotation = RotationController::new();
        rotation.start_drag(0.0, ms(0));
        rotation.drag_to(95.0);
        rotation.end_drag(ms(0));
        // mid-animation the angle is between the raw and target values
        let mid = rotation.current_angle(ms(100));
        assert!(mid > 90.0 && mid < 95.0);
        // after the fixed snap duration it lands exactly on the detent
        let done = rotation.current_angle(ms(0) + SNAP_DURATION + ms(1));
        assert_eq!(done, 90.0);
        assert!(!rotation.is_dragging());
    }

    #[test]
    fn release_far_from_detent_keeps_angle() {
        let mut rotation = RotationController::new();
        rotation.start_drag(0.0, ms(0));
        // sub-180° moves so the winding accumulates instead of wrapping
        rotation.drag_to(100.0);
        rotation.drag_to(200.0);
        rotation.end_drag(ms(0));
        // 200° is exactly the threshold away from 180°, which does not snap
        assert_eq!(rotation.current_angle(ms(500)), 200.0);
    }

    #[test]
    fn magnetic_pull_bends_but_does_not_lock() {
        let mut rotation = RotationController::new();
        rotation.start_drag(0.0, ms(0));
        rotation.drag_to(93.0);
        let displayed = rotation.current_angle(ms(0));
        assert!(displayed > 90.0 && displayed < 93.0);
        // outside the pull threshold the raw angle passes through untouched
        rotation.drag_to(115.0);
        assert_eq!(rotation.current_angle(ms(0)), 115.0);
    }

    #[test]
    fn shake_boost_triggers_and_expires() {
        let mut shake = ShakeDetector::new();
        shake.track_delta(5.0, ms(0));
        shake.track_delta(-5.0, ms(100));
        assert!(!shake.is_boosted(ms(100)));
        shake.track_delta(5.0, ms(200));
        assert!(shake.is_boosted(ms(200)));
        assert!(shake.is_boosted(ms(200) + SHAKE_BOOST_DURATION - ms(1)));
        assert!(!shake.is_boosted(ms(200) + SHAKE_BOOST_DURATION));
    }

    #[test]
    fn slow_reversals_outside_window_do_not_boost() {
        let mut shake = ShakeDetector::new();
        shake.track_delta(5.0, ms(0));
        shake.track_delta(-5.0, ms(1000));
        shake.track_delta(5.0, ms(2500));
        assert!(!shake.is_boosted(ms(2500)));
    }

    #[test]
    fn direction_reset_requires_fresh_reversals() {
        let mut shake = ShakeDetector::new();
        shake.track_delta(5.0, ms(0));
        shake.reset_direction();
        // first delta of the new drag sets a direction, it is not a reversal
        shake.track_delta(-5.0, ms(50));
        shake.track_delta(5.0, ms(100));
        assert!(!shake.is_boosted(ms(100)));
        shake.track_delta(-5.0, ms(150));
        assert!(shake.is_boosted(ms(150)));
    }
}
