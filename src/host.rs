//! Boundary traits towards the embedding host.
//!
//! The host owns the actual forward audio element and the mount surface; the
//! widget core reaches both through these minimal interfaces.

use std::path::PathBuf;

use crate::error::Error;

// -------------------------------------------------------------------------------------------------

/// The forward audio element: a playable source with a seekable clock and a
/// rate control, owned by the host.
pub trait AudioHandle {
    /// Track duration in seconds. `NaN` while the host has not resolved the
    /// media's metadata yet; a negative value marks the handle as unusable.
    fn duration(&self) -> f64;
    /// Current playback position in seconds on the forward timeline.
    fn current_time(&self) -> f64;
    /// Seek the forward timeline.
    fn set_current_time(&mut self, time: f64);
    /// Start forward playback. May be refused by the host's playback policy
    /// (e.g. before any user gesture), reported as
    /// [`Error::PlaybackPolicyError`].
    fn play(&mut self) -> Result<(), Error>;
    fn pause(&mut self);
    fn paused(&self) -> bool;
    /// Set the forward playback rate.
    fn set_rate(&mut self, rate: f64);
    /// Path to the encoded media, if the host can expose one. Without it,
    /// reverse playback is unavailable.
    fn media_path(&self) -> Option<PathBuf>;
}

// -------------------------------------------------------------------------------------------------

/// Dimensions of the mount surface the widget is rendered into, in host
/// pixels. Pointer coordinates passed to the session use the same space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInfo {
    pub width: f32,
    pub height: f32,
}

impl SurfaceInfo {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A zero-sized or non-finite surface cannot host the widget.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width * 0.5, self.height * 0.5)
    }
}
