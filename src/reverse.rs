//! Reverse-audio engine: decodes the forward media into a time-reversed
//! sample buffer and plays it through an [`AudioGraph`], exposing a
//! forward-equivalent time read-back.
//!
//! Buffer preparation is lazy and runs on a background thread; its result is
//! picked up by [`ReverseEngine::poll`] on the frame loop. A failed decode
//! only disables reverse mode, forward playback is unaffected.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use symphonia::core::audio::SampleBuffer;

use crate::{error::Error, output::AudioGraph, utils::decoder::MediaDecoder};

// -------------------------------------------------------------------------------------------------

/// Playback rates are clamped into this range, like the forward element's.
pub const MIN_PLAYBACK_RATE: f64 = 0.25;
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

// -------------------------------------------------------------------------------------------------

/// A fully decoded track with its frames in reverse order.
pub struct ReverseBuffer {
    /// Interleaved samples, frame order reversed, channel order preserved.
    samples: Vec<f32>,
    channel_count: usize,
    sample_rate: u32,
}

impl ReverseBuffer {
    /// Decode the given media file and reverse it.
    pub fn decode_file(path: &Path) -> Result<Self, Error> {
        Self::from_decoder(MediaDecoder::from_file(path)?)
    }

    /// Decode everything the given decoder yields, then reverse the frames.
    pub fn from_decoder(mut decoder: MediaDecoder) -> Result<Self, Error> {
        let sample_rate = decoder.signal_spec().rate;
        let channel_count = decoder.signal_spec().channels.count();

        // prealloc the entire buffer when the decoder gives us a frame hint
        let capacity = decoder.codec_params().n_frames.unwrap_or(0) as usize * channel_count;
        let mut forward = Vec::with_capacity(capacity);

        let decode_capacity = decoder
            .codec_params()
            .max_frames_per_packet
            .unwrap_or(16 * 1024 * channel_count as u64);
        let mut decode_buffer = SampleBuffer::<f32>::new(decode_capacity, decoder.signal_spec());
        while decoder.read_packet(&mut decode_buffer).is_some() {
            forward.extend_from_slice(decode_buffer.samples());
        }
        if forward.is_empty() {
            return Err(Error::AudioDecodingError(Box::new(
                symphonia::core::errors::Error::DecodeError("failed to decode file"),
            )));
        }
        Ok(Self::from_forward_samples(
            &forward,
            sample_rate,
            channel_count,
        ))
    }

    /// Build a reversed buffer from forward-ordered interleaved samples.
    pub fn from_forward_samples(forward: &[f32], sample_rate: u32, channel_count: usize) -> Self {
        let channel_count = channel_count.max(1);
        let frames = forward.len() / channel_count;
        let mut samples = Vec::with_capacity(frames * channel_count);
        for frame in (0..frames).rev() {
            let start = frame * channel_count;
            samples.extend_from_slice(&forward[start..start + channel_count]);
        }
        Self {
            samples,
            channel_count,
            sample_rate,
        }
    }

    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples[frame * self.channel_count + channel]
    }

    pub fn total_frames(&self) -> usize {
        self.samples.len() / self.channel_count
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Track length in seconds.
    pub fn duration(&self) -> f64 {
        self.total_frames() as f64 / self.sample_rate as f64
    }
}

// -------------------------------------------------------------------------------------------------

/// Readiness of the reversed sample buffer. Checked defensively at every read
/// site: `Failed` means reverse mode is permanently unavailable this session.
enum ReverseBufferState {
    Empty,
    Preparing,
    Ready(Arc<ReverseBuffer>),
    Failed,
}

/// Clock anchors of the currently playing reverse node.
#[derive(Debug, Clone, Copy)]
struct ActiveNode {
    /// Graph clock at the moment the node started.
    started_at: f64,
    /// Position on the reversed timeline the node started from, in seconds.
    start_offset: f64,
    rate: f64,
}

// -------------------------------------------------------------------------------------------------

/// Owns the reversed buffer lifecycle and the active reverse playback node.
pub struct ReverseEngine {
    graph: Box<dyn AudioGraph>,
    state: ReverseBufferState,
    pending: Option<Receiver<Result<ReverseBuffer, Error>>>,
    node: Option<ActiveNode>,
}

impl ReverseEngine {
    pub fn new(graph: Box<dyn AudioGraph>) -> Self {
        Self {
            graph,
            state: ReverseBufferState::Empty,
            pending: None,
            node: None,
        }
    }

    /// Kick off buffer preparation on a background thread. Idempotent: calls
    /// after the first are no-ops. Without a decodable media source the state
    /// goes straight to `Failed`.
    pub fn prepare(&mut self, media: Option<PathBuf>) {
        if !matches!(self.state, ReverseBufferState::Empty) {
            return;
        }
        let Some(path) = media else {
            log::warn!("no decodable media source, reverse playback is unavailable");
            self.state = ReverseBufferState::Failed;
            return;
        };
        let (send, recv) = bounded(1);
        thread::spawn(move || {
            let result = ReverseBuffer::decode_file(&path);
            // the receiver is gone when the session got disposed meanwhile
            let _ = send.send(result);
        });
        self.pending = Some(recv);
        self.state = ReverseBufferState::Preparing;
    }

    /// Apply a finished background preparation, if any. Called once per frame.
    pub fn poll(&mut self) {
        let Some(receiver) = &self.pending else {
            return;
        };
        match receiver.try_recv() {
            Ok(Ok(buffer)) => {
                log::info!(
                    "reverse buffer ready: {:.1}s, {} channels at {} Hz",
                    buffer.duration(),
                    buffer.channel_count(),
                    buffer.sample_rate()
                );
                self.state = ReverseBufferState::Ready(Arc::new(buffer));
                self.pending = None;
            }
            Ok(Err(err)) => {
                log::warn!("reverse buffer preparation failed: {err}");
                self.state = ReverseBufferState::Failed;
                self.pending = None;
            }
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                self.state = ReverseBufferState::Failed;
                self.pending = None;
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ReverseBufferState::Ready(_))
    }

    pub fn is_active(&self) -> bool {
        self.node.is_some()
    }

    /// Start reverse playback at the given forward time, replacing any prior
    /// node. `speed` is the signed multiplier; only its magnitude matters.
    pub fn start(&mut self, forward_time: f64, speed: f64) -> Result<(), Error> {
        let ReverseBufferState::Ready(buffer) = &self.state else {
            return Err(Error::ReverseBufferUnavailable);
        };
        let buffer = Arc::clone(buffer);
        let duration = buffer.duration();
        let offset = (duration - forward_time).clamp(0.0, duration);
        let rate = clamp_rate(speed);
        self.graph.stop();
        self.graph.start(buffer, offset, rate as f32)?;
        self.node = Some(ActiveNode {
            started_at: self.graph.now(),
            start_offset: offset,
            rate,
        });
        Ok(())
    }

    /// Update the rate of the active node, re-anchoring the clock so the
    /// time read-back stays continuous across the change.
    pub fn set_speed(&mut self, speed: f64) {
        let Some(node) = self.node else {
            return;
        };
        let position = self.reversed_position(&node);
        let rate = clamp_rate(speed);
        self.graph.set_rate(rate as f32);
        self.node = Some(ActiveNode {
            started_at: self.graph.now(),
            start_offset: position,
            rate,
        });
    }

    /// Current playback position mapped back onto the forward timeline.
    /// `None` while no reverse node is playing.
    pub fn forward_time(&self) -> Option<f64> {
        let node = self.node?;
        let ReverseBufferState::Ready(buffer) = &self.state else {
            return None;
        };
        Some((buffer.duration() - self.reversed_position(&node)).max(0.0))
    }

    /// Position on the reversed timeline: elapsed graph time scaled by rate.
    fn reversed_position(&self, node: &ActiveNode) -> f64 {
        let elapsed = (self.graph.now() - node.started_at).max(0.0);
        let duration = match &self.state {
            ReverseBufferState::Ready(buffer) => buffer.duration(),
            _ => return node.start_offset,
        };
        (node.start_offset + elapsed * node.rate).min(duration)
    }

    /// Tear down the active playback node, keeping the prepared buffer.
    pub fn stop(&mut self) {
        self.graph.stop();
        self.node = None;
    }

    /// Tear down playback and release the audio graph. Also drops a pending
    /// preparation, so a late decode result is discarded unseen.
    pub fn dispose(&mut self) {
        self.stop();
        self.pending = None;
        self.graph.close();
    }

    #[cfg(test)]
    pub(crate) fn install_buffer(&mut self, buffer: ReverseBuffer) {
        self.state = ReverseBufferState::Ready(Arc::new(buffer));
    }
}

fn clamp_rate(speed: f64) -> f64 {
    speed.abs().clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc as StdArc, Mutex};

    use super::*;
    use crate::output::SilentGraph;

    /// Graph with a manually driven clock.
    struct ManualGraph {
        now: StdArc<Mutex<f64>>,
        active: bool,
        rate: f32,
    }

    impl AudioGraph for ManualGraph {
        fn now(&self) -> f64 {
            *self.now.lock().unwrap()
        }
        fn start(
            &mut self,
            _buffer: Arc<ReverseBuffer>,
            _offset: f64,
            rate: f32,
        ) -> Result<(), Error> {
            self.active = true;
            self.rate = rate;
            Ok(())
        }
        fn set_rate(&mut self, rate: f32) {
            self.rate = rate;
        }
        fn stop(&mut self) {
            self.active = false;
        }
        fn close(&mut self) {
            self.active = false;
        }
    }

    fn stereo_ramp_buffer(seconds: u32, sample_rate: u32) -> ReverseBuffer {
        let frames = (seconds * sample_rate) as usize;
        let mut forward = Vec::with_capacity(frames * 2);
        for frame in 0..frames {
            forward.push(frame as f32);
            forward.push(-(frame as f32));
        }
        ReverseBuffer::from_forward_samples(&forward, sample_rate, 2)
    }

    #[test]
    fn buffer_reverses_frames_not_channels() {
        let forward = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        let buffer = ReverseBuffer::from_forward_samples(&forward, 44100, 2);
        assert_eq!(buffer.total_frames(), 3);
        assert_eq!(buffer.sample(0, 0), 3.0);
        assert_eq!(buffer.sample(0, 1), 30.0);
        assert_eq!(buffer.sample(2, 0), 1.0);
        assert_eq!(buffer.sample(2, 1), 10.0);
    }

    #[test]
    fn buffer_duration() {
        let buffer = stereo_ramp_buffer(3, 1000);
        assert_eq!(buffer.total_frames(), 3000);
        assert!((buffer.duration() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn forward_time_mirrors_the_reversed_timeline() {
        let clock = StdArc::new(Mutex::new(0.0));
        let graph = ManualGraph {
            now: StdArc::clone(&clock),
            active: false,
            rate: 1.0,
        };
        let mut engine = ReverseEngine::new(Box::new(graph));
        engine.install_buffer(stereo_ramp_buffer(120, 1000));

        engine.start(30.0, -1.0).unwrap();
        assert!((engine.forward_time().unwrap() - 30.0).abs() < 1e-9);

        // 5 seconds of reverse playback at 1x moves forward time back by 5
        *clock.lock().unwrap() = 5.0;
        assert!((engine.forward_time().unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn rate_changes_reanchor_the_clock() {
        let clock = StdArc::new(Mutex::new(0.0));
        let graph = ManualGraph {
            now: StdArc::clone(&clock),
            active: false,
            rate: 1.0,
        };
        let mut engine = ReverseEngine::new(Box::new(graph));
        engine.install_buffer(stereo_ramp_buffer(120, 1000));

        engine.start(60.0, -1.0).unwrap();
        *clock.lock().unwrap() = 10.0; // forward time is now 50
        engine.set_speed(-2.0);
        *clock.lock().unwrap() = 15.0; // 5 more seconds at 2x
        assert!((engine.forward_time().unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn rates_are_clamped() {
        assert_eq!(clamp_rate(-8.0), MAX_PLAYBACK_RATE);
        assert_eq!(clamp_rate(-0.01), MIN_PLAYBACK_RATE);
        assert_eq!(clamp_rate(-1.5), 1.5);
    }

    #[test]
    fn forward_time_clamps_at_track_start() {
        let clock = StdArc::new(Mutex::new(0.0));
        let graph = ManualGraph {
            now: StdArc::clone(&clock),
            active: false,
            rate: 1.0,
        };
        let mut engine = ReverseEngine::new(Box::new(graph));
        engine.install_buffer(stereo_ramp_buffer(10, 1000));

        engine.start(2.0, -4.0).unwrap();
        *clock.lock().unwrap() = 100.0;
        assert_eq!(engine.forward_time().unwrap(), 0.0);
    }

    #[test]
    fn start_without_buffer_is_rejected() {
        let mut engine = ReverseEngine::new(Box::new(SilentGraph::new()));
        assert!(matches!(
            engine.start(10.0, -1.0),
            Err(Error::ReverseBufferUnavailable)
        ));
        assert!(engine.forward_time().is_none());
    }

    #[test]
    fn missing_media_fails_preparation() {
        let mut engine = ReverseEngine::new(Box::new(SilentGraph::new()));
        engine.prepare(None);
        engine.poll();
        assert!(!engine.is_ready());
        // preparing again stays failed instead of spawning a thread
        engine.prepare(Some(PathBuf::from("/nonexistent")));
        assert!(!engine.is_ready());
    }

    #[test]
    fn decodes_and_reverses_wav_file() {
        let _ = simple_logger::SimpleLogger::new().init();

        let path = std::env::temp_dir().join("sablier_reverse_decode_test.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        // a short ramp: first sample quiet, last sample loud
        for i in 0..800i32 {
            writer.write_sample((i * 40) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = ReverseBuffer::decode_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.total_frames(), 800);
        // the loudest sample comes first after reversal
        assert!(buffer.sample(0, 0) > buffer.sample(799, 0));
        assert!((buffer.duration() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn decode_failure_is_swallowed() {
        let mut engine = ReverseEngine::new(Box::new(SilentGraph::new()));
        engine.prepare(Some(PathBuf::from("/definitely/not/a/real/file.wav")));
        // wait for the background thread to report
        for _ in 0..100 {
            engine.poll();
            if !matches!(engine.state, ReverseBufferState::Preparing) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(!engine.is_ready());
        assert!(matches!(engine.state, ReverseBufferState::Failed));
    }
}
