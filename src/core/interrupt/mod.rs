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

//! IRQ9 (SPU) delivery line.
//!
//! The full PSX interrupt controller multiplexes eleven sources through
//! I_STAT/I_MASK (VBLANK, GPU, CDROM, DMA, three timers, the controller
//! port, SIO, the SPU and the lightpen). This crate only emulates the SPU,
//! so the controller is narrowed to the one line it drives: a pending flag
//! the host polls and acknowledges, reached through [`IrqLine::raise`].
//!
//! ## References
//!
//! - [PSX-SPX: Interrupt Control](http://problemkaputt.de/psx-spx.htm#interruptcontrol)

/// The SPU's IRQ9 line: a single latched, host-acknowledged pending flag.
///
/// # Example
///
/// ```
/// use spu_core::core::interrupt::InterruptController;
/// use spu_core::core::spu::environment::IrqLine;
///
/// let mut ic = InterruptController::new();
/// ic.raise();
/// assert!(ic.is_pending());
///
/// ic.acknowledge();
/// assert!(!ic.is_pending());
/// ```
#[derive(Debug, Default)]
pub struct InterruptController {
    pending: bool,
}

impl InterruptController {
    /// Create a new controller with IRQ9 clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether IRQ9 is currently latched.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Clear the latched IRQ9 flag. The SPU re-raises it on the next
    /// transfer-address match once `SPUCNT.irq9_enable` allows it.
    pub fn acknowledge(&mut self) {
        self.pending = false;
    }
}

impl crate::core::spu::environment::IrqLine for InterruptController {
    fn raise(&mut self) {
        self.pending = true;
        log::trace!("IRQ9 (SPU) raised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spu::environment::IrqLine;

    #[test]
    fn raise_latches_pending_until_acknowledged() {
        let mut ic = InterruptController::new();
        assert!(!ic.is_pending());

        ic.raise();
        assert!(ic.is_pending());

        ic.acknowledge();
        assert!(!ic.is_pending());
    }

    #[test]
    fn acknowledge_on_idle_line_is_a_no_op() {
        let mut ic = InterruptController::new();
        ic.acknowledge();
        assert!(!ic.is_pending());
    }

    #[test]
    fn repeated_raises_stay_latched_as_one_pending_flag() {
        let mut ic = InterruptController::new();
        ic.raise();
        ic.raise();
        assert!(ic.is_pending());
        ic.acknowledge();
        assert!(!ic.is_pending());
    }
}
