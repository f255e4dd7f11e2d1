// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::divisor::{Divisor, Prescalers};
use crate::errors::Error;
use crate::handle::Family;

/// How a new rate is applied to an instance that is already running
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum ApplyStrategy {
    /// Write the divider registers while the peripheral runs
    #[default]
    Hot,
    /// Switch the peripheral off around the divider write
    DisableApplyEnable,
}

/// Trait for the register level side of a peripheral family
///
/// The registry validates every handle and state before calling into it,
/// so `index` is always below the instance count of the registry.
/// There is an example implementation in [crate::sim].
pub trait HardwareBinding {
    /// Number of instances the binding can drive. A registry never has more.
    const INSTANCES: usize;

    fn family(&self) -> Family;
    /// Input clock of the family's prescaler chain, in Hz
    fn clock_hz(&self) -> u32;
    fn prescalers(&self) -> Prescalers;
    /// Turn the peripheral on or off
    fn apply_enable(&mut self, index: u8, enabled: bool);
    /// Program solved divider values
    fn apply_rate(&mut self, index: u8, divisor: &Divisor);
    /// Enable or disable the interrupt of the instance
    fn arm_interrupt(&mut self, index: u8, armed: bool);

    fn rate_strategy(&self) -> ApplyStrategy {
        ApplyStrategy::Hot
    }
    /// Word widths in bits the family can transfer
    fn word_widths(&self) -> &'static [u8] {
        &[8]
    }
    fn apply_word_width(&mut self, _index: u8, _bits: u8) {}
    /// Optionally kick the transmit interrupt after new outbound data was queued
    fn pend_transmit(&mut self, _index: u8) {}
    /// Optional counter readback, for timers and encoders
    fn read_counter(&mut self, _index: u8) -> Result<u32, Error> {
        Err(Error::Unsupported)
    }
    fn write_counter(&mut self, _index: u8, _value: u32) -> Result<(), Error> {
        Err(Error::Unsupported)
    }
}

/// Trait for the interrupt side of one peripheral instance
///
/// Passed into [crate::Dispatcher::on_interrupt] by the interrupt vector.
pub trait InterruptPort {
    /// Acknowledge the interrupt flag
    fn clear_pending(&mut self);
    /// Room for at least one more word in the transmit path
    fn tx_ready(&self) -> bool {
        false
    }
    /// Words are right aligned, bytes have the upper half clear
    fn write_tx(&mut self, _word: u16) {}
    /// Word received since the last interrupt, if any
    fn read_rx(&mut self) -> Option<u16> {
        None
    }
}

/// Interrupt handler bound to an instance
///
/// Invoked on interrupt context, so it must be short and must not block.
pub trait Callback: Sync {
    fn invoke(&self);
}

// Blanket implementation
impl<F> Callback for F
where
    F: Fn() + Sync,
{
    fn invoke(&self) {
        self()
    }
}
