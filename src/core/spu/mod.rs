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

//! SPU (Sound Processing Unit) implementation.
//!
//! The SPU mixes 24 ADPCM voices with per-voice ADSR envelopes and pitch
//! modulation, runs a reverb network against its own 512 KiB RAM,
//! participates in DMA with the host bus, captures four channels back into
//! RAM, raises an interrupt on RAM-address match, and produces a stereo
//! 44.1 kHz stream through a host [`environment::AudioSink`].
//!
//! # Memory Map (0x1F801C00-0x1F801E00, relative offsets below)
//!
//! | Offset        | Register                         | Access |
//! |---------------|-----------------------------------|--------|
//! | 0x000-0x17F   | Voice registers (24 x 16 bytes)   | R/W    |
//! | 0x180/0x182   | Main volume L/R                   | R/W    |
//! | 0x184/0x186   | Reverb output volume L/R          | R/W    |
//! | 0x188-0x18B   | Key on (low/high)                 | W      |
//! | 0x18C-0x18F   | Key off (low/high)                | W      |
//! | 0x190-0x193   | Pitch modulation enable           | R/W    |
//! | 0x198-0x19B   | Reverb-on enable                  | R/W    |
//! | 0x19C-0x19F   | ENDX                              | R      |
//! | 0x1A2         | Reverb work area start (mBASE)    | R/W    |
//! | 0x1A4         | IRQ address                       | R/W    |
//! | 0x1A6         | Transfer address                  | R/W    |
//! | 0x1A8         | Transfer data FIFO                | W      |
//! | 0x1AA         | SPUCNT                            | R/W    |
//! | 0x1AE         | SPUSTAT                           | R      |
//! | 0x1B0/0x1B2   | CD volume L/R                     | R/W    |
//! | 0x1B4/0x1B6   | External audio volume L/R         | R/W    |
//! | 0x1C0-0x1FF   | Reverb registers (32 words)        | R/W    |
//!
//! Unmapped offsets read 0xFFFF and ignore writes (`SPEC_FULL.md` §7).

pub mod adpcm;
pub mod adsr;
pub mod environment;
pub mod registers;
pub mod reverb;
pub mod tables;
pub mod voice;

#[cfg(test)]
mod tests;

use adsr::VolumeSweep;
use environment::SpuEnvironment;
use registers::{SpuControl, SpuStatus, TransferMode};
use reverb::Reverb;
use voice::Voice;

use crate::core::dma::{DmaDirection, SpuDmaChannel};
use crate::core::state::{SpuState, VoiceState};
use crate::core::timing::{EventHandle, TimingEventManager};

/// Size of SPU RAM in bytes (512 KiB).
pub const RAM_SIZE: usize = 512 * 1024;
const RAM_MASK: usize = RAM_SIZE - 1;

/// Number of hardware voices.
pub const VOICE_COUNT: usize = 24;

/// Each capture region is 1 KiB; there are four, mirroring CD-L, CD-R,
/// voice 1 and voice 3.
const CAPTURE_REGION_SIZE: u16 = 0x400;
const CAPTURE_REGION_OFFSETS: [u32; 4] = [0, 0x400, 0x800, 0xC00];

/// Number of SPU ticks a voice's key-on/off debounce lasts
/// (`SPEC_FULL.md` §3.6 describes this in master-clock ticks; modeled here
/// in SPU-tick units since the mixer loop already runs per-SPU-tick and a
/// `u8` debounce counter can't hold thousands of master ticks - see
/// `DESIGN.md`).
const KEY_DEBOUNCE_TICKS: u8 = 2;

fn mul15(a: i16, b: i16) -> i32 {
    ((a as i32) * (b as i32)) >> 15
}

fn clamp16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// The SPU core.
pub struct Spu {
    ram: Vec<u8>,
    voices: [Voice; VOICE_COUNT],

    main_left: VolumeSweep,
    main_right: VolumeSweep,
    main_left_register: u16,
    main_right_register: u16,

    cd_volume_left: i16,
    cd_volume_right: i16,
    ext_volume_left: i16,
    ext_volume_right: i16,

    reverb: Reverb,
    reverb_on_voices: u32,
    pitch_mod_voices: u32,
    noise_mode_voices: u32,
    endx: u32,

    control: SpuControl,
    irq9_flag: bool,
    irq_address: u16,
    transfer_address: u32,

    dma_channel: SpuDmaChannel,

    key_on_off_delay: [u8; VOICE_COUNT],
    debounce_ticks: u8,

    capture_position: u16,
    tick_is_odd: bool,

    dump_enabled: bool,
}

impl Spu {
    pub fn new() -> Self {
        Self::with_debounce_ticks(KEY_DEBOUNCE_TICKS)
    }

    /// Builds an SPU core with a non-default key-on/off debounce length, in
    /// SPU ticks. Exposed for `SPU_DEBOUNCE_TICKS` overrides at binary
    /// startup (`SPEC_FULL.md` §2a); the default matches real hardware.
    pub fn with_debounce_ticks(debounce_ticks: u8) -> Self {
        Self {
            ram: vec![0; RAM_SIZE],
            voices: std::array::from_fn(|i| Voice::new(i as u8)),
            main_left: VolumeSweep::default(),
            main_right: VolumeSweep::default(),
            main_left_register: 0,
            main_right_register: 0,
            cd_volume_left: 0,
            cd_volume_right: 0,
            ext_volume_left: 0,
            ext_volume_right: 0,
            reverb: Reverb::new(),
            reverb_on_voices: 0,
            pitch_mod_voices: 0,
            noise_mode_voices: 0,
            endx: 0,
            control: SpuControl::default(),
            irq9_flag: false,
            irq_address: 0,
            transfer_address: 0,
            dma_channel: SpuDmaChannel::new(),
            key_on_off_delay: [0; VOICE_COUNT],
            debounce_ticks,
            capture_position: 0,
            tick_is_odd: false,
            dump_enabled: false,
        }
    }

    fn status(&self) -> SpuStatus {
        let direction = self.transfer_direction();
        SpuStatus {
            irq9_flag: self.irq9_flag,
            dma_read_request: matches!(direction, DmaDirection::Read),
            dma_write_request: matches!(direction, DmaDirection::Write),
            dma_read_write_request: !matches!(direction, DmaDirection::None),
            transfer_busy: !matches!(direction, DmaDirection::None),
            second_half_capture_buffer: self.capture_position >= CAPTURE_REGION_SIZE / 2,
            ram_transfer_mode: self.control.ram_transfer_mode,
        }
    }

    fn transfer_direction(&self) -> DmaDirection {
        match self.control.ram_transfer_mode {
            TransferMode::DmaWrite => DmaDirection::Write,
            TransferMode::DmaRead => DmaDirection::Read,
            TransferMode::Stopped | TransferMode::ManualWrite => DmaDirection::None,
        }
    }

    fn check_irq(&mut self, byte_addr: u32, env: &mut SpuEnvironment) {
        if !self.control.irq9_enable {
            return;
        }
        let target = (self.irq_address as u32) * 8;
        if (byte_addr as usize & RAM_MASK) as u32 == (target as usize & RAM_MASK) as u32 && !self.irq9_flag {
            self.irq9_flag = true;
            env.irq.raise();
        }
    }

    // ---- Register file (SPEC_FULL.md §4.8) -------------------------------

    /// Read a memory-mapped register. `addr` is the full physical address
    /// (0x1F801C00..0x1F801E00).
    pub fn read_register(&self, addr: u32) -> u16 {
        const BASE: u32 = 0x1F80_1C00;
        if addr < BASE {
            log::error!("SPU register read below base: {addr:#010x}");
            return 0xFFFF;
        }
        let offset = addr - BASE;
        match offset {
            0x000..=0x17F => {
                let voice = (offset / 0x10) as usize;
                let reg = (offset % 0x10) as u8;
                self.read_voice_register(voice, reg)
            }
            0x180 => self.main_left_register,
            0x182 => self.main_right_register,
            0x184 => self.reverb.output_volume_left as u16,
            0x186 => self.reverb.output_volume_right as u16,
            0x188 | 0x18A | 0x18C | 0x18E => 0, // key on/off are write-only
            0x190 => (self.pitch_mod_voices & 0xFFFF) as u16,
            0x192 => ((self.pitch_mod_voices >> 16) & 0xFF) as u16,
            0x194 => (self.noise_mode_voices & 0xFFFF) as u16,
            0x196 => ((self.noise_mode_voices >> 16) & 0xFF) as u16,
            0x198 => (self.reverb_on_voices & 0xFFFF) as u16,
            0x19A => ((self.reverb_on_voices >> 16) & 0xFF) as u16,
            0x19C => (self.endx & 0xFFFF) as u16,
            0x19E => ((self.endx >> 16) & 0xFF) as u16,
            0x1A2 => self.reverb.base_address,
            0x1A4 => self.irq_address,
            0x1A6 => ((self.transfer_address / 8) & 0xFFFF) as u16,
            0x1A8 => {
                log::error!("SPU transfer-data register read is reserved");
                0xFFFF
            }
            0x1AA => self.control.to_bits(),
            0x1AE => self.status().to_bits(),
            0x1B0 => self.cd_volume_left as u16,
            0x1B2 => self.cd_volume_right as u16,
            0x1B4 => self.ext_volume_left as u16,
            0x1B6 => self.ext_volume_right as u16,
            0x1C0..=0x1FF => self.reverb.read_flat(((offset - 0x1C0) / 2) as usize),
            _ => {
                log::error!("SPU read from unmapped register: {addr:#010x}");
                0xFFFF
            }
        }
    }

    /// Write a memory-mapped register. Writes that may observably change the
    /// mixed audio call `timing.invoke_early()` first, so the change takes
    /// effect at the correct sample boundary instead of applying mid-batch
    /// (`SPEC_FULL.md` §4.10).
    pub fn write_register(
        &mut self,
        addr: u32,
        value: u16,
        timing: &mut TimingEventManager,
        handle: EventHandle,
        env: &mut SpuEnvironment,
    ) {
        const BASE: u32 = 0x1F80_1C00;
        if addr < BASE {
            log::error!("SPU register write below base: {addr:#010x}");
            return;
        }
        let offset = addr - BASE;
        if Self::write_affects_audio(offset) {
            timing.invoke_early(handle);
        }
        match offset {
            0x000..=0x17F => {
                let voice = (offset / 0x10) as usize;
                let reg = (offset % 0x10) as u8;
                self.write_voice_register(voice, reg, value);
            }
            0x180 => {
                self.main_left_register = value;
                self.main_left = VolumeSweep::from_register(value);
            }
            0x182 => {
                self.main_right_register = value;
                self.main_right = VolumeSweep::from_register(value);
            }
            0x184 => self.reverb.output_volume_left = value as i16,
            0x186 => self.reverb.output_volume_right = value as i16,
            0x188 => self.key_on_voices(value as u32),
            0x18A => self.key_on_voices((value as u32) << 16),
            0x18C => self.key_off_voices(value as u32),
            0x18E => self.key_off_voices((value as u32) << 16),
            0x190 => {
                self.pitch_mod_voices = (self.pitch_mod_voices & 0xFF0000) | value as u32;
                self.apply_pitch_mod_bits();
            }
            0x192 => {
                self.pitch_mod_voices = (self.pitch_mod_voices & 0xFFFF) | ((value as u32 & 0xFF) << 16);
                self.apply_pitch_mod_bits();
            }
            0x194 => self.noise_mode_voices = (self.noise_mode_voices & 0xFF0000) | value as u32,
            0x196 => {
                self.noise_mode_voices = (self.noise_mode_voices & 0xFFFF) | ((value as u32 & 0xFF) << 16)
            }
            0x198 => self.reverb_on_voices = (self.reverb_on_voices & 0xFF0000) | value as u32,
            0x19A => {
                self.reverb_on_voices = (self.reverb_on_voices & 0xFFFF) | ((value as u32 & 0xFF) << 16)
            }
            0x19C | 0x19E => {
                // ENDX is read-only from software's perspective; writes have
                // no observable effect (matches reference behavior).
            }
            0x1A2 => self.reverb.set_base_address(value),
            0x1A4 => self.irq_address = value,
            0x1A6 => self.transfer_address = (value as u32) * 8 & RAM_MASK as u32,
            0x1A8 => self.dma_write_word(value, env),
            0x1AA => self.write_control(value, timing, handle, env),
            0x1B0 => self.cd_volume_left = value as i16,
            0x1B2 => self.cd_volume_right = value as i16,
            0x1B4 => self.ext_volume_left = value as i16,
            0x1B6 => self.ext_volume_right = value as i16,
            0x1C0..=0x1FF => self.reverb.write_flat(((offset - 0x1C0) / 2) as usize, value),
            _ => {
                log::error!("SPU write to unmapped register: {addr:#010x} = {value:#06x}");
            }
        }
    }

    /// Whether a write to register `offset` can change the next mixed
    /// sample: voice state, volumes, key on/off, pitch modulation, reverb
    /// routing and the reverb network itself. Transfer cursor, IRQ address
    /// and ENDX are excluded since they don't feed the mixer.
    fn write_affects_audio(offset: u32) -> bool {
        matches!(
            offset,
            0x000..=0x17F
                | 0x180
                | 0x182
                | 0x184
                | 0x186
                | 0x188
                | 0x18A
                | 0x18C
                | 0x18E
                | 0x190
                | 0x192
                | 0x198
                | 0x19A
                | 0x1B0
                | 0x1B2
                | 0x1B4
                | 0x1B6
                | 0x1C0..=0x1FF
        )
    }

    fn read_voice_register(&self, voice: usize, reg: u8) -> u16 {
        if voice >= VOICE_COUNT {
            return 0xFFFF;
        }
        let v = &self.voices[voice];
        match reg {
            0x0 => v.left_volume_register,
            0x2 => v.right_volume_register,
            0x4 => v.sample_rate,
            0x6 => v.start_address,
            0x8 => v.adsr.config.to_word_1(),
            0xA => v.adsr.config.to_word_2(),
            0xC => v.adsr.level as u16,
            0xE => v.repeat_address,
            _ => 0xFFFF,
        }
    }

    fn write_voice_register(&mut self, voice: usize, reg: u8, value: u16) {
        if voice >= VOICE_COUNT {
            return;
        }
        let v = &mut self.voices[voice];
        match reg {
            0x0 => v.set_left_volume_register(value),
            0x2 => v.set_right_volume_register(value),
            0x4 => v.sample_rate = value,
            0x6 => v.start_address = value,
            0x8 => v.adsr_config_mut().set_word_1(value),
            0xA => v.adsr_config_mut().set_word_2(value),
            0xC => v.adsr.level = (value as i16) as i32,
            0xE => v.repeat_address = value,
            _ => {}
        }
    }

    fn apply_pitch_mod_bits(&mut self) {
        for i in 0..VOICE_COUNT {
            self.voices[i].pitch_modulation_enabled = i >= 1 && (self.pitch_mod_voices & (1 << i)) != 0;
        }
    }

    fn key_on_voices(&mut self, mask: u32) {
        for i in 0..VOICE_COUNT {
            if mask & (1 << i) != 0 && self.key_on_off_delay[i] == 0 {
                self.voices[i].key_on();
                self.key_on_off_delay[i] = self.debounce_ticks;
            }
        }
    }

    fn key_off_voices(&mut self, mask: u32) {
        for i in 0..VOICE_COUNT {
            if mask & (1 << i) != 0 && self.key_on_off_delay[i] == 0 {
                self.voices[i].key_off();
                self.key_on_off_delay[i] = self.debounce_ticks;
            }
        }
    }

    fn write_control(
        &mut self,
        value: u16,
        timing: &mut TimingEventManager,
        handle: EventHandle,
        env: &mut SpuEnvironment,
    ) {
        self.control = SpuControl::from_bits(value);
        if !self.control.irq9_enable {
            self.irq9_flag = false;
        }
        let direction = self.transfer_direction();
        self.dma_channel.set_direction(direction, env.dma_request.as_mut());
        self.update_event_interval(timing, handle, env);
    }

    // ---- DMA / transfer cursor (SPEC_FULL.md §4.9) -----------------------

    fn dma_write_word(&mut self, value: u16, env: &mut SpuEnvironment) {
        let addr = self.transfer_address as usize & RAM_MASK;
        let bytes = value.to_le_bytes();
        self.ram[addr] = bytes[0];
        self.ram[(addr + 1) & RAM_MASK] = bytes[1];
        self.check_irq(addr as u32, env);
        self.transfer_address = (self.transfer_address + 2) & RAM_MASK as u32;
    }

    fn dma_read_word(&mut self) -> u16 {
        let addr = self.transfer_address as usize & RAM_MASK;
        let value = u16::from_le_bytes([self.ram[addr], self.ram[(addr + 1) & RAM_MASK]]);
        self.transfer_address = (self.transfer_address + 2) & RAM_MASK as u32;
        value
    }

    /// DMA write path: equivalent to `words.len()` transfer-register writes.
    /// Permits the block-memcpy shortcut of `SPEC_FULL.md` §4.9 when the
    /// range doesn't cross the wrap boundary.
    pub fn dma_write_words(&mut self, words: &[u16], env: &mut SpuEnvironment) {
        let start = self.transfer_address as usize & RAM_MASK;
        if start + words.len() * 2 <= RAM_SIZE {
            for (i, &word) in words.iter().enumerate() {
                let addr = start + i * 2;
                let bytes = word.to_le_bytes();
                self.ram[addr] = bytes[0];
                self.ram[addr + 1] = bytes[1];
            }
            self.transfer_address = (start + words.len() * 2) as u32 & RAM_MASK as u32;
            // Still run the IRQ check against every word address written,
            // since a block copy must not skip the address-match scan.
            for i in 0..words.len() {
                self.check_irq((start + i * 2) as u32, env);
            }
        } else {
            SpuDmaChannel::write_words(words, words.len(), |word| self.dma_write_word(word, env));
        }
    }

    /// DMA read path: equivalent to `out.len()` transfer-register reads.
    pub fn dma_read_words(&mut self, out: &mut [u16]) {
        let len = out.len();
        SpuDmaChannel::read_words(out, len, || self.dma_read_word());
    }

    pub fn dma_request_asserted(&self) -> bool {
        self.dma_channel.is_requesting()
    }

    // ---- Mixer tick loop (SPEC_FULL.md §4.5) -------------------------------

    /// Run one SPU tick (one stereo sample period), returning the emitted
    /// frame. Handles voice mixing, CD audio injection, reverb, capture and
    /// IRQ checks inline, matching the suspension-free tick design
    /// (`SPEC_FULL.md` §9).
    pub fn execute_tick(&mut self, env: &mut SpuEnvironment) -> (i16, i16) {
        let mut l_sum: i32 = 0;
        let mut r_sum: i32 = 0;
        let mut rev_in_l: i32 = 0;
        let mut rev_in_r: i32 = 0;

        if self.control.enable {
            let mut prev_amplitude = 0i32;
            for i in 0..VOICE_COUNT {
                let ram_snapshot_addr = {
                    let mut read_addr = None;
                    let voice = &mut self.voices[i];
                    let ram = &self.ram;
                    let (l, r, endx) = voice.sample(prev_amplitude, |addr| {
                        read_addr = Some(addr);
                        let base = ((addr as usize) * 8) & RAM_MASK;
                        let mut bytes = [0u8; 16];
                        for (k, byte) in bytes.iter_mut().enumerate() {
                            *byte = ram[(base + k) & RAM_MASK];
                        }
                        adpcm::AdpcmBlock::from_bytes(&bytes)
                    });
                    prev_amplitude = voice.last_amplitude;
                    if endx {
                        self.endx |= 1 << i;
                    }
                    l_sum += l;
                    r_sum += r;
                    if self.reverb_on_voices & (1 << i) != 0 {
                        rev_in_l += l;
                        rev_in_r += r;
                    }
                    read_addr
                };
                if let Some(addr) = ram_snapshot_addr {
                    let byte_addr = ((addr as usize) * 8) & RAM_MASK;
                    self.check_irq(byte_addr as u32, env);
                    // A 16-byte block spans two 8-byte IRQ-granularity halves.
                    self.check_irq(((byte_addr + 8) & RAM_MASK) as u32, env);
                }
            }
        }

        if !self.control.mute_n {
            l_sum = 0;
            r_sum = 0;
        }

        let cd_frame = env.cd_audio.pop().unwrap_or((0, 0));
        if self.control.cd_audio_enable {
            l_sum += mul15(cd_frame.0, self.cd_volume_left);
            r_sum += mul15(cd_frame.1, self.cd_volume_right);
        }
        if self.control.cd_audio_reverb {
            rev_in_l += mul15(cd_frame.0, self.cd_volume_left);
            rev_in_r += mul15(cd_frame.1, self.cd_volume_right);
        }

        if !self.tick_is_odd {
            self.reverb.left_input = clamp16(rev_in_l);
        } else {
            self.reverb.right_input = clamp16(rev_in_r);
            self.reverb.master_enable = self.control.reverb_master_enable;
            self.reverb.tick(&mut self.ram);
        }
        self.tick_is_odd = !self.tick_is_odd;

        l_sum += self.reverb.left_output as i32;
        r_sum += self.reverb.right_output as i32;

        let out_l = clamp16(mul15(clamp16(l_sum), self.main_left.current_level()) as i32);
        let out_r = clamp16(mul15(clamp16(r_sum), self.main_right.current_level()) as i32);
        self.main_left.tick();
        self.main_right.tick();

        self.write_capture(cd_frame, env);

        for delay in &mut self.key_on_off_delay {
            *delay = delay.saturating_sub(1);
        }

        (out_l, out_r)
    }

    fn write_capture(&mut self, cd_frame: (i16, i16), env: &mut SpuEnvironment) {
        let values = [
            cd_frame.0,
            cd_frame.1,
            clamp16(self.voices[1].last_amplitude),
            clamp16(self.voices[3].last_amplitude),
        ];
        for (region, value) in CAPTURE_REGION_OFFSETS.iter().zip(values) {
            let addr = (*region as usize + self.capture_position as usize) & RAM_MASK;
            let bytes = value.to_le_bytes();
            self.ram[addr] = bytes[0];
            self.ram[(addr + 1) & RAM_MASK] = bytes[1];
            self.check_irq(addr as u32, env);
        }
        self.capture_position = (self.capture_position + 2) % CAPTURE_REGION_SIZE;
    }

    /// Drive up to `frames_requested` SPU ticks into `env`'s audio sink,
    /// respecting whatever batch size the sink actually grants
    /// (`SPEC_FULL.md` §4.5 step 3 / §5 backpressure handling). Returns the
    /// number of frames produced.
    pub fn run_batch(&mut self, frames_requested: usize, env: &mut SpuEnvironment) -> usize {
        let granted = env.audio_sink.begin_write(frames_requested);
        let mut dump_batch = Vec::with_capacity(if self.dump_enabled { granted } else { 0 });
        for _ in 0..granted {
            let (l, r) = self.execute_tick(env);
            env.audio_sink.write_frame(l, r);
            if self.dump_enabled {
                dump_batch.push((l, r));
            }
        }
        env.audio_sink.end_write();
        if self.dump_enabled {
            if let Some(writer) = env.dump_writer.as_deref_mut() {
                writer.write_frames(&dump_batch);
            }
        }
        granted
    }

    pub fn set_dump_enabled(&mut self, enabled: bool) {
        self.dump_enabled = enabled;
    }

    // ---- Scheduler glue (SPEC_FULL.md §4.10) -------------------------------

    /// Master-clock ticks consumed per SPU tick.
    pub const SYSCLK_TICKS_PER_SPU_TICK: u32 = 0x300;

    /// Recompute the scheduler callback interval: tight (one SPU tick) when
    /// IRQ latency matters, otherwise paced to the sink's free space.
    /// Any pending partial batch runs to completion first via
    /// `TimingEventManager::invoke_early` so no samples are dropped when the
    /// interval changes mid-batch.
    pub fn update_event_interval(
        &self,
        timing: &mut TimingEventManager,
        handle: EventHandle,
        env: &SpuEnvironment,
    ) {
        timing.invoke_early(handle);
        let interval = if self.control.enable && self.control.irq9_enable {
            Self::SYSCLK_TICKS_PER_SPU_TICK as i32
        } else {
            let free_frames = env.audio_sink.get_buffer_size().max(1);
            (free_frames as u32 * Self::SYSCLK_TICKS_PER_SPU_TICK) as i32
        };
        timing.set_interval(handle, interval);
    }

    // ---- Save / restore -----------------------------------------------------

    pub fn save_state(&self) -> SpuState {
        let voices = self
            .voices
            .iter()
            .map(|v| VoiceState {
                left_volume_register: v.left_volume_register,
                right_volume_register: v.right_volume_register,
                adsr: v.adsr.clone(),
                sample_rate: v.sample_rate,
                start_address: v.start_address,
                repeat_address: v.repeat_address,
                current_address: v.current_address,
                counter_bits: v.counter.bits,
                current_block_samples: v.current_block_samples.to_vec(),
                previous_block_last_samples: v.adpcm_state.previous_block_last_samples,
                adpcm_last_samples: v.adpcm_state.last_samples,
                has_samples: v.has_samples,
                loop_end: v.loop_end,
                loop_repeat: v.loop_repeat,
                last_amplitude: v.last_amplitude,
                pitch_modulation_enabled: v.pitch_modulation_enabled,
            })
            .collect();

        SpuState {
            ram: self.ram.clone(),
            voices,
            main_left_register: self.main_left_register,
            main_right_register: self.main_right_register,
            cd_volume_left: self.cd_volume_left,
            cd_volume_right: self.cd_volume_right,
            ext_volume_left: self.ext_volume_left,
            ext_volume_right: self.ext_volume_right,
            reverb: self.reverb.clone(),
            control: self.control.to_bits(),
            irq9_flag: self.irq9_flag,
            transfer_address: (self.transfer_address / 8) as u16,
            irq_address: self.irq_address,
            key_on_off_delay: self.key_on_off_delay,
            capture_position: self.capture_position,
            endx: self.endx,
        }
    }

    /// Restore from a previously captured [`SpuState`]. Empties the host
    /// sink and re-runs `update_event_interval` per `SPEC_FULL.md` §6.
    pub fn restore_state(
        &mut self,
        state: &SpuState,
        timing: &mut TimingEventManager,
        handle: EventHandle,
        env: &mut SpuEnvironment,
    ) {
        self.ram = state.ram.clone();
        for (voice, saved) in self.voices.iter_mut().zip(&state.voices) {
            voice.set_left_volume_register(saved.left_volume_register);
            voice.set_right_volume_register(saved.right_volume_register);
            voice.adsr = saved.adsr.clone();
            voice.sample_rate = saved.sample_rate;
            voice.start_address = saved.start_address;
            voice.repeat_address = saved.repeat_address;
            voice.current_address = saved.current_address;
            voice.counter.bits = saved.counter_bits;
            voice.current_block_samples.copy_from_slice(&saved.current_block_samples);
            voice.adpcm_state.previous_block_last_samples = saved.previous_block_last_samples;
            voice.adpcm_state.last_samples = saved.adpcm_last_samples;
            voice.has_samples = saved.has_samples;
            voice.loop_end = saved.loop_end;
            voice.loop_repeat = saved.loop_repeat;
            voice.last_amplitude = saved.last_amplitude;
            voice.pitch_modulation_enabled = saved.pitch_modulation_enabled;
        }
        self.main_left_register = state.main_left_register;
        self.main_left = VolumeSweep::from_register(state.main_left_register);
        self.main_right_register = state.main_right_register;
        self.main_right = VolumeSweep::from_register(state.main_right_register);
        self.cd_volume_left = state.cd_volume_left;
        self.cd_volume_right = state.cd_volume_right;
        self.ext_volume_left = state.ext_volume_left;
        self.ext_volume_right = state.ext_volume_right;
        self.reverb = state.reverb.clone();
        self.control = SpuControl::from_bits(state.control);
        self.irq9_flag = state.irq9_flag;
        self.transfer_address = (state.transfer_address as u32) * 8 & RAM_MASK as u32;
        self.irq_address = state.irq_address;
        self.key_on_off_delay = state.key_on_off_delay;
        self.capture_position = state.capture_position;
        self.endx = state.endx;

        env.audio_sink.empty_buffers();
        self.update_event_interval(timing, handle, env);
    }

    /// Direct SPU RAM access (e.g. loading a test ADPCM payload). Not part
    /// of the memory-mapped register surface.
    pub fn read_ram(&self, addr: u32) -> u8 {
        self.ram[(addr as usize) & RAM_MASK]
    }

    pub fn write_ram(&mut self, addr: u32, value: u8) {
        self.ram[(addr as usize) & RAM_MASK] = value;
    }

    pub fn voice_on(&self, index: usize) -> bool {
        self.voices[index].is_on()
    }

    pub fn reverb_current_address(&self) -> u32 {
        self.reverb.current_address
    }

    pub fn endx(&self) -> u32 {
        self.endx
    }

    pub fn irq9_flag(&self) -> bool {
        self.irq9_flag
    }

    pub fn capture_position(&self) -> u16 {
        self.capture_position
    }
}

impl Default for Spu {
    fn default() -> Self {
        Self::new()
    }
}
