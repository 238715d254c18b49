//! Audio graph backends for reverse playback.
//!
//! The reverse engine schedules a reversed sample buffer on an [`AudioGraph`]
//! and reads elapsed time back from the graph's clock. [`SilentGraph`] is a
//! clock-only backend for tests and headless hosts; the `cpal-output` feature
//! adds [`cpal::CpalGraph`], which renders the buffer to the default output
//! device.

#[cfg(feature = "cpal-output")]
pub mod cpal;

use std::{sync::Arc, time::Instant};

use crate::{error::Error, reverse::ReverseBuffer};

// -------------------------------------------------------------------------------------------------

/// A minimal audio graph: a monotonic clock plus one schedulable buffer
/// playback node.
pub trait AudioGraph {
    /// Monotonic graph clock in seconds.
    fn now(&self) -> f64;
    /// Start playing `buffer` from `offset` seconds into it, at the given
    /// rate. Replaces any node that is still playing.
    fn start(&mut self, buffer: Arc<ReverseBuffer>, offset: f64, rate: f32) -> Result<(), Error>;
    /// Change the rate of the active node, if any.
    fn set_rate(&mut self, rate: f32);
    /// Stop and drop the active node.
    fn stop(&mut self);
    /// Release the graph. Stops playback; the graph cannot be restarted.
    fn close(&mut self);
}

/// Open the best available graph backend: the real audio output when the
/// `cpal-output` feature is enabled and a device can be opened, else a silent
/// clock-only graph. Failures degrade, they never propagate.
pub fn default_graph() -> Box<dyn AudioGraph> {
    #[cfg(feature = "cpal-output")]
    {
        match cpal::CpalGraph::open() {
            Ok(graph) => return Box::new(graph),
            Err(err) => {
                log::warn!("failed to open audio output, reverse playback will be silent: {err}");
            }
        }
    }
    Box::new(SilentGraph::new())
}

// -------------------------------------------------------------------------------------------------

/// Clock-only graph backend: keeps perfect time, produces no sound.
pub struct SilentGraph {
    epoch: Instant,
    active: bool,
}

impl SilentGraph {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            active: false,
        }
    }

    /// True while a node is scheduled. The silent backend never finishes a
    /// buffer on its own, only `stop` or `close` clear this.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for SilentGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioGraph for SilentGraph {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn start(&mut self, _buffer: Arc<ReverseBuffer>, _offset: f64, _rate: f32) -> Result<(), Error> {
        self.active = true;
        Ok(())
    }

    fn set_rate(&mut self, _rate: f32) {}

    fn stop(&mut self) {
        self.active = false;
    }

    fn close(&mut self) {
        self.active = false;
    }
}

// -------------------------------------------------------------------------------------------------
