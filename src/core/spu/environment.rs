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

//! The SPU's narrow host collaborators.
//!
//! The reference source reaches back into the rest of the emulator through
//! raw `System*`/`DMA*`/`InterruptController*` pointers. Here that coupling
//! is replaced with a handful of small traits bundled into a single
//! [`SpuEnvironment`] passed in at construction, so the `Spu` type never
//! depends on concrete host types.

/// Level-triggered interrupt line the SPU pulses on `irq9_flag` rising.
pub trait IrqLine {
    fn raise(&mut self);
}

/// DMA request line the SPU drives whenever `ram_transfer_mode` is one of
/// the DMA modes.
pub trait DmaRequestLine {
    fn set_request(&mut self, asserted: bool);
}

/// Host audio sink: a producer-consumer ring buffer the mixer writes
/// interleaved stereo frames into every tick batch.
///
/// `begin_write` reserves space for up to `frames_requested` frames and
/// returns how many were actually granted (which may be less, if the ring
/// is nearly full); the caller then pushes exactly that many frames with
/// `write_frame` before calling `end_write`.
pub trait AudioSink {
    /// Reserve space for a batch of up to `frames_requested` frames.
    /// Returns the number of frames the caller may write.
    fn begin_write(&mut self, frames_requested: usize) -> usize;

    /// Push one interleaved stereo frame into the batch reserved by the
    /// last `begin_write`. Must not be called more than that many times.
    fn write_frame(&mut self, left: i16, right: i16);

    /// Commit the batch written since `begin_write`.
    fn end_write(&mut self);

    /// Total capacity of the ring, in frames.
    fn get_buffer_size(&self) -> usize;

    /// Discard all buffered frames (used on save-state restore).
    fn empty_buffers(&mut self);
}

/// Bounded FIFO of interleaved stereo samples fed by the CD subsystem.
pub trait CdAudioSource {
    /// Push one stereo frame; drops the oldest buffered frame (logging a
    /// warning) if the FIFO is full.
    fn push_stereo(&mut self, left: i16, right: i16);

    /// Pop the oldest buffered frame, if any.
    fn pop(&mut self) -> Option<(i16, i16)>;
}

/// Optional raw-audio dump writer.
pub trait DumpWriter {
    /// Open the dump file. `false` disables dumping for the session but is
    /// never fatal to the SPU itself.
    fn open(&mut self, path: &str, sample_rate: u32, channels: u16) -> bool;

    /// Enqueue a batch of interleaved stereo frames. Must not block or
    /// await inside the tick loop; an async implementation should enqueue
    /// onto a channel rather than write synchronously here.
    fn write_frames(&mut self, frames: &[(i16, i16)]);

    fn close(&mut self);
}

/// Bundles the SPU's host-facing capabilities. Constructed once by the
/// embedder and handed to `Spu::new`.
pub struct SpuEnvironment {
    pub irq: Box<dyn IrqLine>,
    pub dma_request: Box<dyn DmaRequestLine>,
    pub audio_sink: Box<dyn AudioSink>,
    pub cd_audio: Box<dyn CdAudioSource>,
    pub dump_writer: Option<Box<dyn DumpWriter>>,
}

impl SpuEnvironment {
    pub fn new(
        irq: Box<dyn IrqLine>,
        dma_request: Box<dyn DmaRequestLine>,
        audio_sink: Box<dyn AudioSink>,
        cd_audio: Box<dyn CdAudioSource>,
    ) -> Self {
        Self { irq, dma_request, audio_sink, cd_audio, dump_writer: None }
    }

    pub fn with_dump_writer(mut self, writer: Box<dyn DumpWriter>) -> Self {
        self.dump_writer = Some(writer);
        self
    }
}

/// A bounded stereo FIFO backing [`CdAudioSource`], sized to absorb one
/// mixer batch. Overflow drops the oldest frame and logs a warning (see
/// `SPEC_FULL.md` §7).
#[derive(Debug, Clone)]
pub struct CdAudioFifo {
    buffer: std::collections::VecDeque<(i16, i16)>,
    capacity: usize,
}

impl CdAudioFifo {
    pub fn new(capacity: usize) -> Self {
        Self { buffer: std::collections::VecDeque::with_capacity(capacity), capacity }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for CdAudioFifo {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl CdAudioSource for CdAudioFifo {
    fn push_stereo(&mut self, left: i16, right: i16) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            log::warn!("CD audio FIFO overflow, dropping oldest frame");
        }
        self.buffer.push_back((left, right));
    }

    fn pop(&mut self) -> Option<(i16, i16)> {
        self.buffer.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_pops_in_order() {
        let mut fifo = CdAudioFifo::new(4);
        fifo.push_stereo(1, -1);
        fifo.push_stereo(2, -2);
        assert_eq!(fifo.pop(), Some((1, -1)));
        assert_eq!(fifo.pop(), Some((2, -2)));
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn fifo_drops_oldest_on_overflow() {
        let mut fifo = CdAudioFifo::new(2);
        fifo.push_stereo(1, 1);
        fifo.push_stereo(2, 2);
        fifo.push_stereo(3, 3);
        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.pop(), Some((2, 2)));
        assert_eq!(fifo.pop(), Some((3, 3)));
    }
}
