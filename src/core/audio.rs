// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Audio output backend using cpal.
//!
//! Implements the [`AudioSink`] contract the mixer drives every tick batch
//! (`begin_write` / `write_frame` / `end_write`), backed by the same
//! `Arc<Mutex<VecDeque<..>>>` producer/consumer split the original audio
//! backend used, generalized from per-sample queuing to batch writes.

use crate::core::spu::environment::AudioSink;

#[cfg(feature = "audio")]
use crate::core::error::{Result, SpuError};
#[cfg(feature = "audio")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
#[cfg(feature = "audio")]
use std::collections::VecDeque;
#[cfg(feature = "audio")]
use std::sync::{Arc, Mutex};

/// Real-time audio output backed by a cpal stream.
///
/// # Example
///
/// ```no_run
/// use spu_core::core::audio::CpalAudioSink;
///
/// let mut sink = CpalAudioSink::new().unwrap();
/// let frames = sink.begin_write(64);
/// for _ in 0..frames {
///     sink.write_frame(0, 0);
/// }
/// sink.end_write();
/// ```
#[cfg(feature = "audio")]
pub struct CpalAudioSink {
    #[allow(dead_code)]
    stream: cpal::Stream,
    ring: Arc<Mutex<VecDeque<(i16, i16)>>>,
    capacity: usize,
    sample_rate: u32,
    pending_batch: Vec<(i16, i16)>,
}

#[cfg(feature = "audio")]
impl CpalAudioSink {
    const DEFAULT_CAPACITY: usize = 8192;

    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| SpuError::AudioDeviceUnavailable {
            message: "no audio output device available".into(),
        })?;

        let config = device
            .default_output_config()
            .map_err(|e| SpuError::AudioDeviceUnavailable { message: e.to_string() })?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        if channels != 2 {
            return Err(SpuError::AudioDeviceUnavailable {
                message: format!(
                    "device '{}' default config has {} channels, stereo required",
                    device.name().unwrap_or_else(|_| "unknown".to_string()),
                    channels
                ),
            });
        }

        if sample_rate != 44_100 {
            log::warn!(
                "audio device sample rate is {sample_rate} Hz (expected 44100 Hz); playback will drift without host resampling"
            );
        }

        log::info!(
            "audio: using device '{}' at {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate,
            channels
        );

        let ring = Arc::new(Mutex::new(VecDeque::with_capacity(Self::DEFAULT_CAPACITY)));
        let ring_for_callback = ring.clone();

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut ring = ring_for_callback.lock().unwrap();
                    for frame in data.chunks_mut(2) {
                        let (left, right) = ring.pop_front().unwrap_or((0, 0));
                        frame[0] = left as f32 / 32768.0;
                        frame[1] = right as f32 / 32768.0;
                    }
                },
                |err| log::error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| SpuError::AudioDeviceUnavailable { message: e.to_string() })?;

        stream.play().map_err(|e| SpuError::AudioDeviceUnavailable { message: e.to_string() })?;

        Ok(Self {
            stream,
            ring,
            capacity: Self::DEFAULT_CAPACITY,
            sample_rate,
            pending_batch: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffered_frames(&self) -> usize {
        self.ring.lock().unwrap().len()
    }
}

#[cfg(feature = "audio")]
impl AudioSink for CpalAudioSink {
    fn begin_write(&mut self, frames_requested: usize) -> usize {
        let free_space = self.capacity.saturating_sub(self.buffered_frames());
        let granted = frames_requested.min(free_space);
        self.pending_batch.clear();
        self.pending_batch.reserve(granted);
        granted
    }

    fn write_frame(&mut self, left: i16, right: i16) {
        self.pending_batch.push((left, right));
    }

    fn end_write(&mut self) {
        let mut ring = self.ring.lock().unwrap();
        ring.extend(self.pending_batch.drain(..));
    }

    fn get_buffer_size(&self) -> usize {
        self.capacity
    }

    fn empty_buffers(&mut self) {
        self.ring.lock().unwrap().clear();
        self.pending_batch.clear();
    }
}

/// An [`AudioSink`] that discards everything, for headless test/bench runs.
/// Never backpressures: `begin_write` always grants the full request.
#[derive(Debug, Default)]
pub struct NullAudioSink {
    pub total_frames_written: u64,
    pub frames: Vec<(i16, i16)>,
    capacity: usize,
}

impl NullAudioSink {
    pub fn new(capacity: usize) -> Self {
        Self { total_frames_written: 0, frames: Vec::new(), capacity }
    }
}

impl AudioSink for NullAudioSink {
    fn begin_write(&mut self, frames_requested: usize) -> usize {
        frames_requested
    }

    fn write_frame(&mut self, left: i16, right: i16) {
        self.total_frames_written += 1;
        self.frames.push((left, right));
    }

    fn end_write(&mut self) {}

    fn get_buffer_size(&self) -> usize {
        self.capacity
    }

    fn empty_buffers(&mut self) {
        self.total_frames_written = 0;
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_counts_written_frames() {
        let mut sink = NullAudioSink::new(64);
        let granted = sink.begin_write(32);
        assert_eq!(granted, 32);
        for _ in 0..granted {
            sink.write_frame(1, -1);
        }
        sink.end_write();
        assert_eq!(sink.total_frames_written, 32);
    }

    #[test]
    fn null_sink_never_backpressures() {
        let mut sink = NullAudioSink::new(8);
        assert_eq!(sink.begin_write(100), 100);
    }
}
