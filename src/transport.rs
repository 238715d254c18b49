//! Transport clock: a tagged Forward/Reverse state with a single accessor for
//! the authoritative forward time.

use crate::{host::AudioHandle, reverse::ReverseEngine};

// -------------------------------------------------------------------------------------------------

/// Which engine currently owns the playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TransportMode {
    Forward,
    Reverse,
}

/// Wraps the scattered "is reversed" checks into one place: the displayed
/// time always comes from whichever engine is authoritative.
#[derive(Debug)]
pub struct TransportClock {
    mode: TransportMode,
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            mode: TransportMode::Forward,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TransportMode) {
        if self.mode != mode {
            log::debug!("transport mode: {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    /// The forward-timeline position to display and to feed to the physics
    /// engine. Falls back to the forward element when the reverse engine has
    /// no position, e.g. right after its node finished.
    pub fn current_time(&self, audio: &dyn AudioHandle, reverse: &ReverseEngine) -> f64 {
        match self.mode {
            TransportMode::Forward => audio.current_time(),
            TransportMode::Reverse => reverse
                .forward_time()
                .unwrap_or_else(|| audio.current_time()),
        }
    }
}
