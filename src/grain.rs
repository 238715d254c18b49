//! Grain representation for the hourglass simulation.

use glam::Vec2;

use crate::glass::Chamber;

// -------------------------------------------------------------------------------------------------

/// Motion state of a single grain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum GrainState {
    /// Actively simulated against walls and other grains.
    Free,
    /// Passing through the neck: ignores chamber walls until it crosses the
    /// far boundary plane.
    Falling,
    /// At rest with zero velocity, excluded from integration until woken.
    Settled,
}

// -------------------------------------------------------------------------------------------------

/// One simulated sand grain.
#[derive(Debug, Clone, Copy)]
pub struct Grain {
    /// Center position in glass-space units.
    pub position: Vec2,
    /// Current velocity in glass-space units per second.
    pub velocity: Vec2,
    pub radius: f32,
    pub opacity: f32,
    /// Chamber the grain currently belongs to. A `Falling` grain keeps its
    /// origin chamber until it crosses the neck.
    pub chamber: Chamber,
    pub state: GrainState,
    /// True while resting against a wall that opposes gravity.
    pub on_floor: bool,
    /// Consecutive frames spent below the settle speed threshold.
    pub rest_frames: u32,
}

impl Grain {
    /// Create a settled grain at the given position.
    pub fn settled_at(position: Vec2, radius: f32, chamber: Chamber) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
            opacity: 1.0,
            chamber,
            state: GrainState::Settled,
            on_floor: true,
            rest_frames: 0,
        }
    }

    /// Wake a settled grain so it rejoins the active simulation.
    pub fn wake(&mut self) {
        if self.state == GrainState::Settled {
            self.state = GrainState::Free;
        }
        self.on_floor = false;
        self.rest_frames = 0;
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_resets_rest_tracking() {
        let mut grain = Grain::settled_at(Vec2::new(0.1, 0.2), 0.02, Chamber::Top);
        grain.rest_frames = 12;
        grain.wake();
        assert_eq!(grain.state, GrainState::Free);
        assert_eq!(grain.rest_frames, 0);
        assert!(!grain.on_floor);
    }

    #[test]
    fn wake_keeps_falling_state() {
        let mut grain = Grain::settled_at(Vec2::ZERO, 0.02, Chamber::Top);
        grain.state = GrainState::Falling;
        grain.wake();
        assert_eq!(grain.state, GrainState::Falling);
    }
}
