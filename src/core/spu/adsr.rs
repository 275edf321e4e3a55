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

//! ADSR (Attack, Decay, Sustain, Release) envelope generator and volume
//! sweeps.
//!
//! Both the per-voice ADSR envelope and the plain (non-ADSR) left/right/main
//! volume sweeps are ticked by the same table-driven [`Envelope`] engine;
//! they differ only in how the active rate/direction and target level are
//! chosen. See [`tables::ADSR_TABLE`](super::tables::ADSR_TABLE).

use super::tables::ADSR_TABLE;
use serde::{Deserialize, Serialize};

/// Table-driven envelope stepping engine shared by ADSR phases and volume
/// sweeps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Envelope {
    rate: u8,
    counter: u32,
    ticks: u32,
    step: i32,
    exponential: bool,
    decreasing: bool,
}

impl Envelope {
    fn reset(&mut self, rate: u8, decreasing: bool, exponential: bool) {
        let rate = rate & 0x7F;
        let entry = ADSR_TABLE[decreasing as usize][rate as usize];
        self.rate = rate;
        self.counter = entry.ticks;
        self.ticks = entry.ticks;
        self.step = entry.step;
        self.decreasing = decreasing;
        self.exponential = exponential;
    }

    /// Advance the envelope by one SPU tick, applying its delta to `level`
    /// when its internal counter elapses. `level` is clamped to
    /// `[-0x8000, 0x7FFF]` per the universal ADSR-volume invariant.
    fn tick(&mut self, level: &mut i32) {
        let mut reload = self.ticks;
        let near_full_increase = self.exponential && !self.decreasing && *level >= 0x6000;
        let mut step_shift = 0u32;
        if near_full_increase {
            // Increasing exponential envelopes slow down near full scale:
            // rates below 40 halve the per-step delta, rates 40..44 halve
            // both the step and the reload interval, rates 44 and up quarter
            // the reload interval and leave the step untouched.
            if self.rate < 40 {
                step_shift = 2;
            } else if self.rate < 44 {
                step_shift = 1;
                reload >>= 1;
            } else {
                reload >>= 2;
            }
        }

        self.counter = self.counter.saturating_sub(1);
        if self.counter > 0 {
            return;
        }
        self.counter = reload.max(1);

        let mut delta = self.step;
        if self.exponential {
            if self.decreasing {
                delta = (delta * *level) >> 15;
            } else if near_full_increase {
                delta >>= step_shift;
            }
        }

        *level = (*level + delta).clamp(-0x8000, 0x7FFF);
    }
}

/// ADSR envelope phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdsrPhase {
    Off,
    Attack,
    Decay,
    Sustain,
    Release,
}

impl Default for AdsrPhase {
    fn default() -> Self {
        AdsrPhase::Off
    }
}

/// Attack mode (linear or exponential).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackMode {
    Linear,
    Exponential,
}

/// Sustain mode (linear or exponential).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SustainMode {
    Linear,
    Exponential,
}

/// Release mode (linear or exponential). Hardware only ever runs release in
/// exponential-decreasing mode, but the register bit is still modeled for
/// round-trip fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseMode {
    Linear,
    Exponential,
}

/// Register-level ADSR configuration for one voice (the two 16-bit ADSR
/// words), independent of the running envelope state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdsrConfig {
    pub attack_rate: u8,
    pub attack_mode: AttackMode,
    pub decay_rate: u8,
    pub sustain_level: u8,
    pub sustain_rate: u8,
    pub sustain_mode: SustainMode,
    pub sustain_direction_decrease: bool,
    pub release_rate: u8,
    pub release_mode: ReleaseMode,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self {
            attack_rate: 0,
            attack_mode: AttackMode::Linear,
            decay_rate: 0,
            sustain_level: 0,
            sustain_rate: 0,
            sustain_mode: SustainMode::Linear,
            sustain_direction_decrease: false,
            release_rate: 0,
            release_mode: ReleaseMode::Linear,
        }
    }
}

impl AdsrConfig {
    /// Bits 0-3: sustain level. Bits 4-7: decay rate. Bits 8-14: attack
    /// rate. Bit 15: attack mode.
    pub fn to_word_1(&self) -> u16 {
        let mut value = 0u16;
        value |= (self.sustain_level as u16) & 0xF;
        value |= ((self.decay_rate as u16) & 0xF) << 4;
        value |= ((self.attack_rate as u16) & 0x7F) << 8;
        value |= u16::from(matches!(self.attack_mode, AttackMode::Exponential)) << 15;
        value
    }

    /// Bits 0-4: release rate. Bit 5: release mode. Bits 6-12: sustain
    /// rate. Bit 14: sustain direction. Bit 15: sustain mode.
    pub fn to_word_2(&self) -> u16 {
        let mut value = 0u16;
        value |= (self.release_rate as u16) & 0x1F;
        value |= u16::from(matches!(self.release_mode, ReleaseMode::Exponential)) << 5;
        value |= ((self.sustain_rate as u16) & 0x7F) << 6;
        value |= u16::from(self.sustain_direction_decrease) << 14;
        value |= u16::from(matches!(self.sustain_mode, SustainMode::Exponential)) << 15;
        value
    }

    pub fn set_word_1(&mut self, value: u16) {
        self.sustain_level = (value & 0xF) as u8;
        self.decay_rate = ((value >> 4) & 0xF) as u8;
        self.attack_rate = ((value >> 8) & 0x7F) as u8;
        self.attack_mode =
            if value & (1 << 15) != 0 { AttackMode::Exponential } else { AttackMode::Linear };
    }

    pub fn set_word_2(&mut self, value: u16) {
        self.release_rate = (value & 0x1F) as u8;
        self.release_mode =
            if value & (1 << 5) != 0 { ReleaseMode::Exponential } else { ReleaseMode::Linear };
        self.sustain_rate = ((value >> 6) & 0x7F) as u8;
        self.sustain_direction_decrease = value & (1 << 14) != 0;
        self.sustain_mode =
            if value & (1 << 15) != 0 { SustainMode::Exponential } else { SustainMode::Linear };
    }
}

/// Per-voice ADSR envelope: register config plus the currently running
/// phase, envelope engine and volume level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdsrEnvelope {
    pub config: AdsrConfig,
    pub phase: AdsrPhase,
    envelope: Envelope,
    target: i32,
    pub level: i32,
}

impl AdsrEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_phase(&mut self, phase: AdsrPhase) {
        self.phase = phase;
        match phase {
            AdsrPhase::Off => {
                self.level = 0;
            }
            AdsrPhase::Attack => {
                self.target = 0x7FFF;
                self.envelope.reset(
                    self.config.attack_rate,
                    false,
                    matches!(self.config.attack_mode, AttackMode::Exponential),
                );
            }
            AdsrPhase::Decay => {
                self.target = (((self.config.sustain_level as i32) + 1) * 0x800).min(0x7FFF);
                self.envelope.reset(self.config.decay_rate << 2, true, true);
            }
            AdsrPhase::Sustain => {
                self.target = 0;
                self.envelope.reset(
                    self.config.sustain_rate,
                    self.config.sustain_direction_decrease,
                    matches!(self.config.sustain_mode, SustainMode::Exponential),
                );
            }
            AdsrPhase::Release => {
                self.target = 0;
                self.envelope.reset(
                    self.config.release_rate << 2,
                    true,
                    matches!(self.config.release_mode, ReleaseMode::Exponential),
                );
            }
        }
    }

    /// Key on: start the Attack phase from silence.
    pub fn key_on(&mut self) {
        self.level = 0;
        self.set_phase(AdsrPhase::Attack);
    }

    /// Key off: force Release unless already silent.
    pub fn key_off(&mut self) {
        if self.phase != AdsrPhase::Off {
            self.set_phase(AdsrPhase::Release);
        }
    }

    /// Advance by one SPU tick, returning the current volume level
    /// (`[0, 0x7FFF]` while active, `0` once Off).
    pub fn tick(&mut self) -> i16 {
        if self.phase == AdsrPhase::Off {
            return 0;
        }

        self.envelope.tick(&mut self.level);

        let reached = if matches!(self.phase, AdsrPhase::Decay | AdsrPhase::Release)
            || (self.phase == AdsrPhase::Sustain && self.config.sustain_direction_decrease)
        {
            self.level <= self.target
        } else {
            self.level >= self.target
        };

        if reached {
            match self.phase {
                AdsrPhase::Attack => self.set_phase(AdsrPhase::Decay),
                AdsrPhase::Decay => self.set_phase(AdsrPhase::Sustain),
                AdsrPhase::Release => {
                    self.level = 0;
                    self.phase = AdsrPhase::Off;
                }
                AdsrPhase::Sustain | AdsrPhase::Off => {}
            }
        }

        self.level as i16
    }
}

/// Non-ADSR volume for a channel (voice left/right, main left/right,
/// reverb input): either a fixed level, or a sweeping envelope between the
/// current level and 0 or full scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VolumeSweep {
    Fixed(i16),
    Sweep { envelope: Envelope, current_level: i16, target: i16 },
}

impl Default for VolumeSweep {
    fn default() -> Self {
        VolumeSweep::Fixed(0)
    }
}

impl VolumeSweep {
    /// Decode a 16-bit volume/sweep register. Bit 15 clear selects a fixed
    /// volume in bits 0-14 (doubled, per hardware). Bit 15 set selects a
    /// sweep: bit 14 exponential, bit 13 direction-decrease, bits 0-6 rate.
    pub fn from_register(value: u16) -> Self {
        if value & 0x8000 == 0 {
            let fixed = (((value & 0x7FFF) as i16) << 1 >> 1) << 1;
            VolumeSweep::Fixed(fixed)
        } else {
            let rate = (value & 0x7F) as u8;
            let decreasing = value & (1 << 13) != 0;
            let exponential = value & (1 << 14) != 0;
            let target = if decreasing { -0x8000 } else { 0x7FFF };
            let mut envelope = Envelope::default();
            envelope.reset(rate, decreasing, exponential);
            VolumeSweep::Sweep { envelope, current_level: 0, target }
        }
    }

    pub fn current_level(&self) -> i16 {
        match self {
            VolumeSweep::Fixed(level) => *level,
            VolumeSweep::Sweep { current_level, .. } => *current_level,
        }
    }

    pub fn tick(&mut self) {
        if let VolumeSweep::Sweep { envelope, current_level, target } = self {
            let mut level = *current_level as i32;
            envelope.tick(&mut level);
            *current_level = level as i16;
            if (*target == -0x8000 && *current_level <= -0x8000) || (*target == 0x7FFF && *current_level >= 0x7FFF) {
                *current_level = *target;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trip() {
        let mut config = AdsrConfig::default();
        config.set_word_1(0xABCD);
        config.set_word_2(0x1234);
        assert_eq!(config.to_word_1(), 0xABCD);
        assert_eq!(config.to_word_2(), 0x1234);
    }

    #[test]
    fn key_on_starts_attack_from_zero() {
        let mut env = AdsrEnvelope::new();
        env.config.attack_rate = 0x40;
        env.key_on();
        assert_eq!(env.phase, AdsrPhase::Attack);
        assert_eq!(env.level, 0);
    }

    #[test]
    fn attack_reaches_decay_eventually() {
        let mut env = AdsrEnvelope::new();
        env.config.attack_rate = 0x7F;
        env.config.decay_rate = 0x1F;
        env.key_on();
        for _ in 0..200 {
            env.tick();
            if env.phase != AdsrPhase::Attack {
                break;
            }
        }
        assert_ne!(env.phase, AdsrPhase::Attack);
    }

    #[test]
    fn key_off_forces_release() {
        let mut env = AdsrEnvelope::new();
        env.config.attack_rate = 0x7F;
        env.key_on();
        env.tick();
        env.key_off();
        assert_eq!(env.phase, AdsrPhase::Release);
    }

    #[test]
    fn key_off_on_silent_voice_is_noop() {
        let mut env = AdsrEnvelope::new();
        assert_eq!(env.phase, AdsrPhase::Off);
        env.key_off();
        assert_eq!(env.phase, AdsrPhase::Off);
    }

    #[test]
    fn release_eventually_reaches_off() {
        let mut env = AdsrEnvelope::new();
        env.level = 0x7FFF;
        env.config.release_rate = 0x1F;
        env.set_phase(AdsrPhase::Release);
        for _ in 0..10_000 {
            env.tick();
            if env.phase == AdsrPhase::Off {
                break;
            }
        }
        assert_eq!(env.phase, AdsrPhase::Off);
        assert_eq!(env.level, 0);
    }

    #[test]
    fn fixed_sweep_register_decodes_level() {
        let sweep = VolumeSweep::from_register(0x2000);
        assert_eq!(sweep.current_level(), 0x4000);
    }

    #[test]
    fn sweeping_register_runs_envelope() {
        let mut sweep = VolumeSweep::from_register(0x8000 | 0x7F);
        for _ in 0..10 {
            sweep.tick();
        }
        assert!(matches!(sweep, VolumeSweep::Sweep { .. }));
    }
}
