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

//! SPU voice (audio channel) implementation
//!
//! Each voice plays back ADPCM-compressed audio samples with independent
//! volume, pitch, and ADSR envelope control, sampled via gaussian
//! interpolation exactly as the reference hardware does.

use super::adpcm::{ADPCMState, AdpcmBlock, SAMPLES_PER_BLOCK};
use super::adsr::{AdsrConfig, AdsrEnvelope, AdsrPhase, VolumeSweep};
use super::tables::GAUSS;
use serde::{Deserialize, Serialize};

const MAX_PITCH_STEP: u32 = 0x4000;

/// 4.12 fixed-point sample/interpolation counter: `bits >> 12` is the
/// integer sample index into the current decoded block, `(bits >> 4) & 0xFF`
/// is the gaussian interpolation index.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Counter {
    pub(crate) bits: u32,
}

impl Counter {
    fn sample_index(&self) -> u32 {
        self.bits >> 12
    }

    fn interpolation_index(&self) -> u8 {
        ((self.bits >> 4) & 0xFF) as u8
    }

    fn add_step(&mut self, step: u16) {
        self.bits += step as u32;
    }

    fn consume_block(&mut self) {
        self.bits -= (SAMPLES_PER_BLOCK as u32) << 12;
    }
}

/// One of the SPU's 24 ADPCM playback channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    id: u8,

    pub left_volume: VolumeSweep,
    pub right_volume: VolumeSweep,
    /// Raw register bits last written, kept verbatim for register-read
    /// round-trip since a running [`VolumeSweep::Sweep`]'s decoded fields
    /// don't reconstruct the original write bit-for-bit.
    pub left_volume_register: u16,
    pub right_volume_register: u16,

    pub adsr: AdsrEnvelope,

    /// 4.12 fixed-point playback step; 0x1000 == native rate.
    pub sample_rate: u16,
    /// Word address (multiply by 8 for the byte address) of the first block.
    pub start_address: u16,
    /// Word address the voice jumps back to on `loop_repeat`.
    pub repeat_address: u16,
    /// Word address of the block currently being read/decoded.
    pub current_address: u16,

    pub(crate) counter: Counter,
    pub(crate) adpcm_state: ADPCMState,
    pub(crate) current_block_samples: [i16; SAMPLES_PER_BLOCK],
    pub(crate) has_samples: bool,
    pub(crate) loop_end: bool,
    pub(crate) loop_repeat: bool,

    pub last_amplitude: i32,
    pub pitch_modulation_enabled: bool,
}

impl Voice {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            left_volume: VolumeSweep::default(),
            right_volume: VolumeSweep::default(),
            left_volume_register: 0,
            right_volume_register: 0,
            adsr: AdsrEnvelope::new(),
            sample_rate: 0,
            start_address: 0,
            repeat_address: 0,
            current_address: 0,
            counter: Counter::default(),
            adpcm_state: ADPCMState::new(),
            current_block_samples: [0; SAMPLES_PER_BLOCK],
            has_samples: false,
            loop_end: false,
            loop_repeat: false,
            last_amplitude: 0,
            pitch_modulation_enabled: false,
        }
    }

    pub fn is_on(&self) -> bool {
        self.adsr.phase != AdsrPhase::Off
    }

    pub fn adsr_config_mut(&mut self) -> &mut AdsrConfig {
        &mut self.adsr.config
    }

    pub fn set_left_volume_register(&mut self, value: u16) {
        self.left_volume_register = value;
        self.left_volume = VolumeSweep::from_register(value);
    }

    pub fn set_right_volume_register(&mut self, value: u16) {
        self.right_volume_register = value;
        self.right_volume = VolumeSweep::from_register(value);
    }

    /// Arm the voice: reset to the start address and begin the Attack
    /// phase. Ignored by the caller if the key-on/off debounce has not
    /// elapsed (enforced by the owning SPU, not here).
    pub fn key_on(&mut self) {
        self.current_address = self.start_address;
        self.counter = Counter::default();
        self.adpcm_state.reset();
        self.has_samples = false;
        self.loop_end = false;
        self.loop_repeat = false;
        self.adsr.key_on();
        log::trace!("voice {} key on @ {:#06x}", self.id, self.start_address);
    }

    /// Begin the Release phase unless the voice is already silent.
    pub fn key_off(&mut self) {
        self.adsr.key_off();
        log::trace!("voice {} key off", self.id);
    }

    fn sample_at(&self, index: i32) -> i16 {
        if index < 0 {
            self.adpcm_state.previous_block_last_samples[(index + 3) as usize]
        } else {
            self.current_block_samples[index as usize]
        }
    }

    /// Gaussian-interpolate the sample at the counter's current fractional
    /// position.
    fn interpolate(&self) -> i16 {
        let i = self.counter.interpolation_index() as usize;
        let s = self.counter.sample_index() as i32;

        let mut out = 0i32;
        out += (GAUSS[0x0FF - i] * self.sample_at(s - 3) as i32) >> 15;
        out += (GAUSS[0x1FF - i] * self.sample_at(s - 2) as i32) >> 15;
        out += (GAUSS[0x100 + i] * self.sample_at(s - 1) as i32) >> 15;
        out += (GAUSS[0x000 + i] * self.sample_at(s) as i32) >> 15;
        out.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    /// Sample one SPU tick for this voice, reading a fresh ADPCM block from
    /// `ram` via `read_block` when the decode window is exhausted.
    ///
    /// `prev_amplitude` is the previous voice's `last_amplitude`, consulted
    /// only when pitch modulation is enabled for this voice.
    ///
    /// Returns `(left, right)` and sets `endx` true exactly when this tick
    /// consumed a block whose `loop_end` flag was set.
    pub fn sample<F>(&mut self, prev_amplitude: i32, mut read_block: F) -> (i32, i32, bool)
    where
        F: FnMut(u16) -> AdpcmBlock,
    {
        let mut endx = false;

        if !self.is_on() {
            self.last_amplitude = 0;
            return (0, 0, false);
        }

        if !self.has_samples {
            let block = read_block(self.current_address);
            self.current_block_samples = self.adpcm_state.decode_block(&block);
            self.has_samples = true;
            self.loop_end = block.loop_end();
            self.loop_repeat = block.loop_repeat();
            if block.loop_start() {
                self.repeat_address = self.current_address;
            }
        }

        let amplitude = {
            let interpolated = self.interpolate() as i32;
            (interpolated * self.adsr.level) >> 15
        };
        self.last_amplitude = amplitude;
        self.adsr.tick();

        let mut step = self.sample_rate as u32;
        if self.pitch_modulation_enabled {
            let factor = (prev_amplitude.clamp(-0x8000, 0x7FFF) + 0x8000) as u32;
            step = (step * factor) >> 15;
        }
        step = step.min(MAX_PITCH_STEP);

        self.counter.add_step(step as u16);

        if self.counter.sample_index() >= SAMPLES_PER_BLOCK as u32 {
            self.counter.consume_block();
            // Snapshot this block's tail before it's replaced so the next
            // block's gaussian interpolation carries over the right samples
            // for negative indices, instead of the new block's own tail.
            self.adpcm_state.previous_block_last_samples = [
                self.current_block_samples[SAMPLES_PER_BLOCK - 3],
                self.current_block_samples[SAMPLES_PER_BLOCK - 2],
                self.current_block_samples[SAMPLES_PER_BLOCK - 1],
            ];
            self.has_samples = false;
            self.current_address = self.current_address.wrapping_add(2);

            if self.loop_end {
                endx = true;
                if !self.loop_repeat {
                    self.adsr.level = 0;
                    self.adsr.set_phase(AdsrPhase::Off);
                } else {
                    self.current_address = self.repeat_address;
                }
            }
        }

        let left = (amplitude * self.left_volume.current_level() as i32) >> 15;
        let right = (amplitude * self.right_volume.current_level() as i32) >> 15;
        self.left_volume.tick();
        self.right_volume.tick();

        (left, right, endx)
    }
}
