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

//! Core emulation components
//!
//! This module contains the SPU emulation and its supporting subsystems:
//! - SPU (Sound Processing Unit): 24 ADPCM voices, ADSR, reverb, RAM
//! - DMA (the SPU's single DMA channel)
//! - Interrupt Controller (IRQ9 delivery)
//! - Timing Event System (global timing and event scheduling)
//! - Audio output backend
//! - Save state serialization

pub mod audio;
pub mod dma;
pub mod error;
pub mod interrupt;
pub mod spu;
pub mod state;
pub mod timing;

// Re-export commonly used types
#[cfg(feature = "audio")]
pub use audio::CpalAudioSink;
pub use dma::SpuDmaChannel;
pub use error::{Result, SpuError};
pub use interrupt::InterruptController;
pub use spu::Spu;
pub use state::SpuState;
pub use timing::TimingEventManager;
