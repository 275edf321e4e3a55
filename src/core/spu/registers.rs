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

//! `SPUCNT`/`SPUSTAT` bit layouts (`SPEC_FULL.md` §3.5).

use bitflags::bitflags;

bitflags! {
    /// Single-bit fields of `SPUCNT`; the transfer-mode and noise-clock
    /// fields are multi-bit and handled separately in [`SpuControl`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct ControlBits: u16 {
        const CD_AUDIO_ENABLE = 1 << 0;
        const EXTERNAL_AUDIO_ENABLE = 1 << 1;
        const CD_AUDIO_REVERB = 1 << 2;
        const EXTERNAL_AUDIO_REVERB = 1 << 3;
        const IRQ9_ENABLE = 1 << 6;
        const REVERB_MASTER_ENABLE = 1 << 7;
        const MUTE_N = 1 << 14;
        const ENABLE = 1 << 15;
    }
}

bitflags! {
    /// Single-bit fields of `SPUSTAT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct StatusBits: u16 {
        const IRQ9_FLAG = 1 << 6;
        const DMA_WRITE_REQUEST = 1 << 7;
        const DMA_READ_REQUEST = 1 << 8;
        const DMA_READ_WRITE_REQUEST = 1 << 9;
        const TRANSFER_BUSY = 1 << 10;
        const SECOND_HALF_CAPTURE_BUFFER = 1 << 11;
    }
}

/// SPU RAM transfer mode, bits 4-5 of `SPUCNT` (mirrored into `SPUSTAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Stopped,
    ManualWrite,
    DmaWrite,
    DmaRead,
}

impl TransferMode {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => TransferMode::Stopped,
            1 => TransferMode::ManualWrite,
            2 => TransferMode::DmaWrite,
            _ => TransferMode::DmaRead,
        }
    }

    fn to_bits(self) -> u16 {
        match self {
            TransferMode::Stopped => 0,
            TransferMode::ManualWrite => 1,
            TransferMode::DmaWrite => 2,
            TransferMode::DmaRead => 3,
        }
    }
}

/// `SPUCNT` (0x1F801DAA): the SPU's control register.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpuControl {
    pub enable: bool,
    pub mute_n: bool,
    pub noise_clock: u8,
    pub reverb_master_enable: bool,
    pub irq9_enable: bool,
    pub ram_transfer_mode: TransferMode,
    pub external_audio_reverb: bool,
    pub cd_audio_reverb: bool,
    pub external_audio_enable: bool,
    pub cd_audio_enable: bool,
}

impl SpuControl {
    pub fn from_bits(bits: u16) -> Self {
        let flags = ControlBits::from_bits_truncate(bits);
        Self {
            enable: flags.contains(ControlBits::ENABLE),
            mute_n: flags.contains(ControlBits::MUTE_N),
            noise_clock: ((bits >> 8) & 0x3F) as u8,
            reverb_master_enable: flags.contains(ControlBits::REVERB_MASTER_ENABLE),
            irq9_enable: flags.contains(ControlBits::IRQ9_ENABLE),
            ram_transfer_mode: TransferMode::from_bits(bits >> 4),
            external_audio_reverb: flags.contains(ControlBits::EXTERNAL_AUDIO_REVERB),
            cd_audio_reverb: flags.contains(ControlBits::CD_AUDIO_REVERB),
            external_audio_enable: flags.contains(ControlBits::EXTERNAL_AUDIO_ENABLE),
            cd_audio_enable: flags.contains(ControlBits::CD_AUDIO_ENABLE),
        }
    }

    pub fn to_bits(self) -> u16 {
        let mut flags = ControlBits::empty();
        flags.set(ControlBits::ENABLE, self.enable);
        flags.set(ControlBits::MUTE_N, self.mute_n);
        flags.set(ControlBits::REVERB_MASTER_ENABLE, self.reverb_master_enable);
        flags.set(ControlBits::IRQ9_ENABLE, self.irq9_enable);
        flags.set(ControlBits::EXTERNAL_AUDIO_REVERB, self.external_audio_reverb);
        flags.set(ControlBits::CD_AUDIO_REVERB, self.cd_audio_reverb);
        flags.set(ControlBits::EXTERNAL_AUDIO_ENABLE, self.external_audio_enable);
        flags.set(ControlBits::CD_AUDIO_ENABLE, self.cd_audio_enable);
        flags.bits() | ((self.noise_clock as u16 & 0x3F) << 8) | (self.ram_transfer_mode.to_bits() << 4)
    }
}

/// `SPUSTAT` (0x1F801DAE): the SPU's read-only status register.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpuStatus {
    pub irq9_flag: bool,
    pub dma_read_request: bool,
    pub dma_write_request: bool,
    pub dma_read_write_request: bool,
    pub transfer_busy: bool,
    pub second_half_capture_buffer: bool,
    pub ram_transfer_mode: TransferMode,
}

impl SpuStatus {
    pub fn to_bits(self) -> u16 {
        let mut flags = StatusBits::empty();
        flags.set(StatusBits::IRQ9_FLAG, self.irq9_flag);
        flags.set(StatusBits::DMA_WRITE_REQUEST, self.dma_write_request);
        flags.set(StatusBits::DMA_READ_REQUEST, self.dma_read_request);
        flags.set(StatusBits::DMA_READ_WRITE_REQUEST, self.dma_read_write_request);
        flags.set(StatusBits::TRANSFER_BUSY, self.transfer_busy);
        flags.set(StatusBits::SECOND_HALF_CAPTURE_BUFFER, self.second_half_capture_buffer);
        flags.bits() | (self.ram_transfer_mode.to_bits() << 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_register_round_trips() {
        let control = SpuControl::from_bits(0xC0E5);
        assert_eq!(control.to_bits(), 0xC0E5);
        assert!(control.enable);
        assert!(control.mute_n);
        assert!(control.reverb_master_enable);
    }

    #[test]
    fn transfer_mode_decodes_all_four_values() {
        assert_eq!(SpuControl::from_bits(0x00).ram_transfer_mode, TransferMode::Stopped);
        assert_eq!(SpuControl::from_bits(0x10).ram_transfer_mode, TransferMode::ManualWrite);
        assert_eq!(SpuControl::from_bits(0x20).ram_transfer_mode, TransferMode::DmaWrite);
        assert_eq!(SpuControl::from_bits(0x30).ram_transfer_mode, TransferMode::DmaRead);
    }

    #[test]
    fn status_second_half_capture_bit_is_bit_11() {
        let status = SpuStatus { second_half_capture_buffer: true, ..Default::default() };
        assert_eq!(status.to_bits() & (1 << 11), 1 << 11);
    }
}
