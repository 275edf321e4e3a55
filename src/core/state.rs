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

//! Save-state serialization for the SPU core.
//!
//! Mirrors every field named in `SPEC_FULL.md` §3, in a fixed order, via
//! the teacher's dual `serde` (JSON, for debugging/inspection) and
//! `bincode` (compact binary save files) derive idiom.

use crate::core::error::{Result, SpuError};
use crate::core::spu::adsr::AdsrEnvelope;
use crate::core::spu::reverb::Reverb;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Per-voice state captured for save/restore.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct VoiceState {
    pub left_volume_register: u16,
    pub right_volume_register: u16,
    #[bincode(with_serde)]
    pub adsr: AdsrEnvelope,
    pub sample_rate: u16,
    pub start_address: u16,
    pub repeat_address: u16,
    pub current_address: u16,
    pub counter_bits: u32,
    pub current_block_samples: Vec<i16>,
    pub previous_block_last_samples: [i16; 3],
    pub adpcm_last_samples: [i32; 2],
    pub has_samples: bool,
    pub loop_end: bool,
    pub loop_repeat: bool,
    pub last_amplitude: i32,
    pub pitch_modulation_enabled: bool,
}

/// Full SPU state, covering every field `SPEC_FULL.md` §3 names.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct SpuState {
    pub ram: Vec<u8>,
    pub voices: Vec<VoiceState>,
    pub main_left_register: u16,
    pub main_right_register: u16,
    pub cd_volume_left: i16,
    pub cd_volume_right: i16,
    pub ext_volume_left: i16,
    pub ext_volume_right: i16,
    #[bincode(with_serde)]
    pub reverb: Reverb,
    pub control: u16,
    pub irq9_flag: bool,
    pub transfer_address: u16,
    pub irq_address: u16,
    pub key_on_off_delay: [u8; 24],
    pub capture_position: u16,
    pub endx: u32,
}

impl SpuState {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| SpuError::SaveStateError { message: e.to_string() })?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let (state, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| SpuError::SaveStateError { message: e.to_string() })?;
        Ok(state)
    }

    /// Human-readable dump of the state, for inspection/diffing rather than
    /// as a compact save format.
    pub fn save_to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| SpuError::SaveStateError { message: e.to_string() })?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn load_from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut text = String::new();
        file.read_to_string(&mut text)?;
        serde_json::from_str(&text).map_err(|e| SpuError::SaveStateError { message: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SpuState {
        SpuState {
            ram: vec![0u8; 64],
            voices: Vec::new(),
            main_left_register: 0x3FFF,
            main_right_register: 0x3FFF,
            cd_volume_left: 0,
            cd_volume_right: 0,
            ext_volume_left: 0,
            ext_volume_right: 0,
            reverb: Reverb::new(),
            control: 0x8000,
            irq9_flag: false,
            transfer_address: 0,
            irq_address: 0,
            key_on_off_delay: [0; 24],
            capture_position: 0,
            endx: 0,
        }
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let state = sample_state();
        state.save_to_file(&path).unwrap();
        let restored = SpuState::load_from_file(&path).unwrap();
        assert_eq!(restored.control, state.control);
        assert_eq!(restored.ram.len(), state.ram.len());
    }

    #[test]
    fn round_trips_through_a_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = sample_state();
        state.save_to_json_file(&path).unwrap();
        let restored = SpuState::load_from_json_file(&path).unwrap();
        assert_eq!(restored.control, state.control);
        assert_eq!(restored.main_left_register, state.main_left_register);
    }
}
