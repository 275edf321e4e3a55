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

//! PlayStation Sound Processing Unit (SPU) emulator core
//!
//! This library provides a cycle-driven emulation of the PSX SPU: 24
//! ADPCM voices with gaussian interpolation and ADSR envelopes, a reverb
//! DSP network, 512 KiB of SPU RAM, capture buffers, the SPU's register
//! file, its DMA channel, and IRQ9 delivery.
//!
//! # Example
//!
//! ```
//! use spu_core::core::spu::Spu;
//! use spu_core::core::spu::environment::{CdAudioFifo, SpuEnvironment};
//! use spu_core::core::audio::NullAudioSink;
//! use spu_core::core::interrupt::InterruptController;
//! use spu_core::core::dma::SpuDmaChannel;
//!
//! struct NullDmaRequest;
//! impl spu_core::core::spu::environment::DmaRequestLine for NullDmaRequest {
//!     fn set_request(&mut self, _asserted: bool) {}
//! }
//!
//! let mut spu = Spu::new();
//! let mut env = SpuEnvironment::new(
//!     Box::new(InterruptController::new()),
//!     Box::new(NullDmaRequest),
//!     Box::new(NullAudioSink::new(4096)),
//!     Box::new(CdAudioFifo::default()),
//! );
//! spu.run_batch(64, &mut env);
//! let _ = SpuDmaChannel::new();
//! ```

pub mod core;
