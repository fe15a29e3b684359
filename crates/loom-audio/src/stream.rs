//! Drives a `loom_engine::Engine` from a real cpal output device: the
//! engine renders fixed-size `i16` blocks, this module converts them to
//! `f32` and hands them to whatever buffer size the host actually requests.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfig};
use parking_lot::Mutex;

use loom_engine::Engine;

use crate::{AudioError, AudioResult};

/// An open output stream bound to an `Engine`. Dropping it stops playback.
pub struct AudioStream {
    stream: Stream,
}

impl AudioStream {
    /// Builds and starts an output stream against `device`, pulling
    /// rendered blocks from `engine` at whatever cadence the host chooses.
    /// `engine` is shared because the host's audio callback runs on its own
    /// thread, independent of whoever constructed the stream.
    pub fn new(device: &Device, engine: Arc<Mutex<Engine>>) -> AudioResult<Self> {
        let (sample_rate, block_frames) = {
            let engine = engine.lock();
            (engine.sample_rate(), engine.block_frames())
        };

        let supported = get_output_config(device, sample_rate)?;
        let channels = supported.channels() as usize;
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: CpalBufferSize::Fixed(block_frames as u32),
        };

        // One fixed-size engine block of interleaved L/R i16, drained one
        // sample at a time into whatever-sized buffer the host hands us —
        // decouples the engine's fixed block size from the host's.
        let mut block = vec![0i16; block_frames * 2];
        let mut cursor = block.len();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        if cursor >= block.len() {
                            engine.lock().render_block(&mut block);
                            cursor = 0;
                        }
                        let left = block[cursor] as f32 / i16::MAX as f32;
                        let right = block[cursor + 1] as f32 / i16::MAX as f32;
                        cursor += 2;

                        frame[0] = left;
                        if frame.len() > 1 {
                            frame[1] = right;
                        }
                        for sample in frame.iter_mut().skip(2) {
                            *sample = 0.0;
                        }
                    }
                },
                |err| log::error!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream.play().map_err(|e| AudioError::StreamError(e.to_string()))?;
        Ok(Self { stream })
    }

    pub fn pause(&self) -> AudioResult<()> {
        self.stream.pause().map_err(|e| AudioError::StreamError(e.to_string()))
    }

    pub fn play(&self) -> AudioResult<()> {
        self.stream.play().map_err(|e| AudioError::StreamError(e.to_string()))
    }
}

fn get_output_config(device: &Device, sample_rate: f64) -> AudioResult<SupportedStreamConfig> {
    let target = cpal::SampleRate(sample_rate.round() as u32);
    let configs = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    for supported in configs {
        if supported.channels() >= 2
            && supported.min_sample_rate() <= target
            && supported.max_sample_rate() >= target
            && supported.sample_format() == SampleFormat::F32
        {
            return Ok(supported.with_sample_rate(target));
        }
    }

    Err(AudioError::ConfigError(format!("no matching output config at {}Hz", target.0)))
}
