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

//! Simulated hardware
//!
//! [SimBinding] keeps a register image per instance and records every
//! call it receives, [SimPort] stands in for the interrupt flag and the
//! transmit/receive FIFOs of one instance. Used by the tests and the
//! `periph-sim` demo.

use arrayvec::ArrayVec;

use crate::binding::{ApplyStrategy, HardwareBinding, InterruptPort};
use crate::divisor::{Divisor, Prescalers};
use crate::errors::Error;
use crate::families::{self, FamilyInfo};
use crate::handle::Family;

use crate::{trace, warn};

/// Instances a simulated family has unless told otherwise
pub const MAX_INSTANCES: usize = 16;
const MAX_EVENTS: usize = 64;
const FIFO_SIZE: usize = 64;

/// A call the binding received
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event {
    Enable(u8, bool),
    Rate(u8, Divisor),
    Arm(u8, bool),
    WordWidth(u8, u8),
}

#[derive(Debug, Default, Clone, Copy)]
struct Instance {
    enabled: bool,
    armed: bool,
    divisor: Option<Divisor>,
    word_width: Option<u8>,
    counter: u32,
    transmit_requests: usize,
}

/// In-memory [HardwareBinding] for any family, with `N` instances
pub struct SimBinding<const N: usize = MAX_INSTANCES> {
    info: FamilyInfo,
    clock_hz: u32,
    strategy: ApplyStrategy,
    instances: [Instance; N],
    events: ArrayVec<Event, MAX_EVENTS>,
    faults: usize,
}

impl<const N: usize> SimBinding<N> {
    /// `clock_hz` is the input of the family's prescaler chain
    pub fn new(info: FamilyInfo, clock_hz: u32) -> Self {
        Self {
            info,
            clock_hz,
            strategy: ApplyStrategy::Hot,
            instances: [Instance::default(); N],
            events: ArrayVec::new(),
            faults: 0,
        }
    }

    /// Peripherals run off the instruction clock, half the oscillator
    pub fn from_system_clock(info: FamilyInfo, system_hz: u32) -> Self {
        Self::new(info, system_hz / 2)
    }

    pub fn with_strategy(mut self, strategy: ApplyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn set_clock(&mut self, clock_hz: u32) {
        self.clock_hz = clock_hz;
    }

    /// Recorded calls, oldest first. Only the first 64 are kept.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn enabled(&self, index: u8) -> bool {
        self.instances[index as usize].enabled
    }

    pub fn armed(&self, index: u8) -> bool {
        self.instances[index as usize].armed
    }

    /// Last divider values programmed
    pub fn divisor(&self, index: u8) -> Option<Divisor> {
        self.instances[index as usize].divisor
    }

    pub fn transmit_requests(&self, index: u8) -> usize {
        self.instances[index as usize].transmit_requests
    }

    /// Divider writes the real hardware would have rejected
    pub fn faults(&self) -> usize {
        self.faults
    }

    /// Moves the counter like the running peripheral would
    pub fn advance(&mut self, index: u8, ticks: u32) {
        let instance = &mut self.instances[index as usize];
        if instance.enabled {
            instance.counter = instance.counter.wrapping_add(ticks);
        }
    }

    fn record(&mut self, event: Event) {
        trace!("sim {:?}: {:?}", self.info.family, event);
        let _ = self.events.try_push(event);
    }

    /// Checks `divisor` against the register fields of the family
    fn fits_registers(&self, divisor: &Divisor) -> bool {
        let p = &self.info.prescalers;
        if !p.primary.contains(divisor.primary) || !p.secondary.contains(divisor.secondary) {
            return false;
        }
        if p.forbidden == Some((divisor.primary, divisor.secondary)) {
            return false;
        }
        match self.info.family {
            Family::Spi => families::spi::encode(divisor).is_some(),
            Family::Uart => families::uart::encode(divisor).is_some(),
            Family::Timer | Family::Oc => families::timer::encode(divisor).is_some(),
            Family::Ccp => families::ccp::encode(divisor).is_some(),
            Family::Qei => true,
        }
    }
}

impl<const N: usize> HardwareBinding for SimBinding<N> {
    const INSTANCES: usize = N;

    fn family(&self) -> Family {
        self.info.family
    }

    fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn prescalers(&self) -> Prescalers {
        self.info.prescalers
    }

    fn apply_enable(&mut self, index: u8, enabled: bool) {
        self.instances[index as usize].enabled = enabled;
        self.record(Event::Enable(index, enabled));
    }

    fn apply_rate(&mut self, index: u8, divisor: &Divisor) {
        if !self.fits_registers(divisor) {
            warn!(
                "sim {:?} {}: illegal divider {}x{}",
                self.info.family, index, divisor.primary, divisor.secondary
            );
            self.faults += 1;
        }
        self.instances[index as usize].divisor = Some(*divisor);
        self.record(Event::Rate(index, *divisor));
    }

    fn arm_interrupt(&mut self, index: u8, armed: bool) {
        self.instances[index as usize].armed = armed;
        self.record(Event::Arm(index, armed));
    }

    fn rate_strategy(&self) -> ApplyStrategy {
        self.strategy
    }

    fn word_widths(&self) -> &'static [u8] {
        self.info.word_widths
    }

    fn apply_word_width(&mut self, index: u8, bits: u8) {
        self.instances[index as usize].word_width = Some(bits);
        self.record(Event::WordWidth(index, bits));
    }

    fn pend_transmit(&mut self, index: u8) {
        self.instances[index as usize].transmit_requests += 1;
    }

    fn read_counter(&mut self, index: u8) -> Result<u32, Error> {
        if !self.info.has_counter {
            return Err(Error::Unsupported);
        }
        Ok(self.instances[index as usize].counter)
    }

    fn write_counter(&mut self, index: u8, value: u32) -> Result<(), Error> {
        if !self.info.has_counter {
            return Err(Error::Unsupported);
        }
        self.instances[index as usize].counter = value;
        Ok(())
    }
}

/// Interrupt flag and FIFOs of one simulated instance
#[derive(Debug, Default)]
pub struct SimPort {
    tx_depth: usize,
    pending: bool,
    clears: usize,
    tx: ArrayVec<u16, FIFO_SIZE>,
    rx: ArrayVec<u16, FIFO_SIZE>,
}

impl SimPort {
    /// Port whose transmit FIFO holds `tx_depth` bytes (at most 64)
    pub fn new(tx_depth: usize) -> Self {
        Self {
            tx_depth: tx_depth.min(FIFO_SIZE),
            ..Default::default()
        }
    }

    /// Sets the interrupt flag
    pub fn raise(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// How often the flag was acknowledged
    pub fn clears(&self) -> usize {
        self.clears
    }

    /// Shifts out everything in the transmit FIFO
    pub fn take_sent(&mut self) -> ArrayVec<u16, FIFO_SIZE> {
        core::mem::take(&mut self.tx)
    }

    /// Like [SimPort::take_sent], for 8-bit transfers
    pub fn take_sent_bytes(&mut self) -> ArrayVec<u8, FIFO_SIZE> {
        self.take_sent().iter().map(|&word| word as u8).collect()
    }

    /// A word arrives on the line and raises the interrupt.
    /// Words beyond the hardware FIFO are lost.
    pub fn receive_word(&mut self, word: u16) {
        if self.rx.try_push(word).is_err() {
            trace!("sim port: receive fifo overrun");
        }
        self.pending = true;
    }

    pub fn receive(&mut self, byte: u8) {
        self.receive_word(u16::from(byte));
    }

    /// Feeds everything sent back into the receiver, returns how much.
    pub fn loop_back(&mut self) -> usize {
        let sent = self.take_sent();
        for &word in &sent {
            self.receive_word(word);
        }
        sent.len()
    }
}

impl InterruptPort for SimPort {
    fn clear_pending(&mut self) {
        self.pending = false;
        self.clears += 1;
    }

    fn tx_ready(&self) -> bool {
        self.tx.len() < self.tx_depth
    }

    fn write_tx(&mut self, word: u16) {
        let _ = self.tx.try_push(word);
    }

    fn read_rx(&mut self) -> Option<u16> {
        if self.rx.is_empty() {
            return None;
        }
        Some(self.rx.remove(0))
    }
}
