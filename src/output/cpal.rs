use std::{sync::Arc, time::Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_queue::ArrayQueue;

use crate::{error::Error, output::AudioGraph, reverse::ReverseBuffer};

// -------------------------------------------------------------------------------------------------

const PREFERRED_SAMPLE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::F32;
const PREFERRED_SAMPLE_RATE: cpal::SampleRate = cpal::SampleRate(44100);
const PREFERRED_CHANNELS: cpal::ChannelCount = 2;

// -------------------------------------------------------------------------------------------------

/// Control messages from the session thread into the audio callback.
enum GraphMessage {
    Start {
        buffer: Arc<ReverseBuffer>,
        /// Fractional read position in buffer frames.
        cursor: f64,
        rate: f32,
    },
    SetRate(f32),
    Stop,
}

/// Render state owned by the audio callback.
struct NodeState {
    buffer: Option<Arc<ReverseBuffer>>,
    cursor: f64,
    rate: f32,
}

// -------------------------------------------------------------------------------------------------

/// Audio graph backed by the default cpal output device. One buffer playback
/// node at a time; the node reads the reversed buffer with a fractional
/// cursor stepped by the playback rate.
pub struct CpalGraph {
    _stream: cpal::Stream,
    messages: Arc<ArrayQueue<GraphMessage>>,
    epoch: Instant,
    closed: bool,
}

impl CpalGraph {
    /// Open the default output device of the default host.
    pub fn open() -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::OutputDeviceError("no default output device".into()))?;
        if let Ok(name) = device.name() {
            log::info!("using audio device: {}", name);
        }

        let supported = Self::preferred_output_config(&device)?;
        let config: cpal::StreamConfig = supported.config();
        let output_channels = config.channels as usize;
        let output_sample_rate = config.sample_rate.0;

        let messages = Arc::new(ArrayQueue::new(16));
        let callback_messages = Arc::clone(&messages);
        let mut node = NodeState {
            buffer: None,
            cursor: 0.0,
            rate: 1.0,
        };
        let stream = device
            .build_output_stream(
                &config,
                move |output: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    while let Some(message) = callback_messages.pop() {
                        match message {
                            GraphMessage::Start {
                                buffer,
                                cursor,
                                rate,
                            } => {
                                node.buffer = Some(buffer);
                                node.cursor = cursor;
                                node.rate = rate;
                            }
                            GraphMessage::SetRate(rate) => node.rate = rate,
                            GraphMessage::Stop => node.buffer = None,
                        }
                    }
                    render(&mut node, output, output_channels, output_sample_rate);
                },
                |err| log::error!("audio output stream error: {err}"),
                None,
            )
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        stream
            .play()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;

        Ok(Self {
            _stream: stream,
            messages,
            epoch: Instant::now(),
            closed: false,
        })
    }

    fn preferred_output_config(
        device: &cpal::Device,
    ) -> Result<cpal::SupportedStreamConfig, Error> {
        if let Ok(configs) = device.supported_output_configs() {
            for candidate in configs {
                let rates = candidate.min_sample_rate()..=candidate.max_sample_rate();
                if candidate.channels() == PREFERRED_CHANNELS
                    && candidate.sample_format() == PREFERRED_SAMPLE_FORMAT
                    && rates.contains(&PREFERRED_SAMPLE_RATE)
                {
                    return Ok(candidate.with_sample_rate(PREFERRED_SAMPLE_RATE));
                }
            }
        }
        device
            .default_output_config()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))
    }

    fn push(&self, message: GraphMessage) {
        if self.messages.push(message).is_err() {
            log::warn!("audio graph message queue is full");
        }
    }
}

impl AudioGraph for CpalGraph {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn start(&mut self, buffer: Arc<ReverseBuffer>, offset: f64, rate: f32) -> Result<(), Error> {
        if self.closed {
            return Err(Error::OutputDeviceError("audio graph is closed".into()));
        }
        let cursor = offset * buffer.sample_rate() as f64;
        self.push(GraphMessage::Start {
            buffer,
            cursor,
            rate,
        });
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) {
        self.push(GraphMessage::SetRate(rate));
    }

    fn stop(&mut self) {
        self.push(GraphMessage::Stop);
    }

    fn close(&mut self) {
        self.stop();
        self.closed = true;
    }
}

// -------------------------------------------------------------------------------------------------

/// Fill one output callback buffer from the active node, advancing its
/// fractional cursor by `rate`, resampled with linear interpolation.
fn render(node: &mut NodeState, output: &mut [f32], output_channels: usize, output_rate: u32) {
    output.fill(0.0);
    let Some(buffer) = &node.buffer else {
        return;
    };
    let total_frames = buffer.total_frames();
    let buffer_channels = buffer.channel_count();
    let step = node.rate as f64 * buffer.sample_rate() as f64 / output_rate as f64;

    for frame in output.chunks_exact_mut(output_channels) {
        let index = node.cursor.floor() as usize;
        if index + 1 >= total_frames {
            node.buffer = None;
            break;
        }
        let fraction = (node.cursor - index as f64) as f32;
        for (channel, sample) in frame.iter_mut().enumerate() {
            let source_channel = channel.min(buffer_channels - 1);
            let current = buffer.sample(index, source_channel);
            let next = buffer.sample(index + 1, source_channel);
            *sample = current + (next - current) * fraction;
        }
        node.cursor += step;
    }
}
