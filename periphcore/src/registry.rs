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

//! Peripheral registry
//!
//! One fixed table of instances per family. Foreground operations take a
//! critical section for their bookkeeping and binding calls; they never call
//! a user callback while holding it. The interrupt side goes through the
//! [Dispatcher], which only reads the callback and works the ring buffers.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::binding::{ApplyStrategy, Callback, HardwareBinding};
use crate::dispatch::Dispatcher;
use crate::divisor::{self, Divisor, Rate};
use crate::errors::Error;
use crate::handle::{Family, Handle, NULL_INDEX};

mod record;
pub(crate) use record::{InstanceRecord, IoBuffers};
pub use record::{BufferStorage, RateConfig, State};

use crate::{debug, info, trace, warn};

/// Default byte buffer size, per direction
pub const DEFAULT_BUFFER_SIZE: usize = 32;

/// Table of `N` instances of one peripheral family
///
/// `CAP` is the size of each buffer when the registry is built
/// with [Registry::with_buffers], one slot of which is never used.
///
/// `N` can not exceed what the binding drives:
/// ```compile_fail
/// # use periphcore::{families, sim::SimBinding, Registry};
/// let timers: Registry<_, 20> = Registry::new(SimBinding::<16>::new(families::TIMER, 1_000_000));
/// ```
pub struct Registry<'a, B: HardwareBinding, const N: usize, const CAP: usize = DEFAULT_BUFFER_SIZE> {
    family: Family,
    binding: Mutex<RefCell<B>>,
    records: Mutex<RefCell<[InstanceRecord<'a>; N]>>,
    io: Option<[Mutex<RefCell<IoBuffers<'a, CAP>>>; N]>,
    pub(crate) in_service: [AtomicBool; N],
    dispatcher_taken: AtomicBool,
}

impl<'a, B: HardwareBinding, const N: usize, const CAP: usize> Registry<'a, B, N, CAP> {
    const VALID: () = {
        assert!(
            N > 0 && N < NULL_INDEX as usize,
            "instance count must fit below the null index"
        );
        assert!(N <= B::INSTANCES, "more instances than the binding drives");
    };

    /// Registry for a family without byte I/O (timers, CCP, QEI, ...)
    pub fn new(binding: B) -> Self {
        Self::build(binding, None)
    }

    /// Registry whose instances each get an outbound and an inbound buffer
    /// in `storage`, e.g. `BufferStorage::array()`.
    pub fn with_buffers(binding: B, storage: &'a mut [BufferStorage<CAP>; N]) -> Self {
        let io = storage
            .each_mut()
            .map(|slot| Mutex::new(RefCell::new(IoBuffers::new(slot))));
        Self::build(binding, Some(io))
    }

    fn build(binding: B, io: Option<[Mutex<RefCell<IoBuffers<'a, CAP>>>; N]>) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        let family = binding.family();
        info!("{:?}: registry of {} instances", family, N);
        Self {
            family,
            binding: Mutex::new(RefCell::new(binding)),
            records: Mutex::new(RefCell::new([InstanceRecord::new(); N])),
            io,
            in_service: [const { AtomicBool::new(false) }; N],
            dispatcher_taken: AtomicBool::new(false),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Number of instances
    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn is_buffered(&self) -> bool {
        self.io.is_some()
    }

    /// Handle for instance `index` of this family, without any check.
    pub fn handle(&self, index: u8) -> Handle {
        Handle::new(self.family, index)
    }

    fn slot(&self, handle: Handle) -> Result<usize, Error> {
        if handle.is_null() || handle.family() != Some(self.family) {
            warn!("{:?}: foreign or null handle {:?}", self.family, handle);
            return Err(Error::InvalidHandle);
        }
        let index = handle.index() as usize;
        if index >= N {
            warn!("{:?}: index {} out of range", self.family, index);
            return Err(Error::InvalidHandle);
        }
        Ok(index)
    }

    /// Runs `f` on the validated record and the binding, inside a critical section.
    fn with_slot<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(u8, &mut InstanceRecord<'a>, &mut B) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let index = self.slot(handle)?;
        critical_section::with(|cs| {
            let mut records = self.records.borrow_ref_mut(cs);
            let mut binding = self.binding.borrow_ref_mut(cs);
            f(index as u8, &mut records[index], &mut *binding)
        })
    }

    /// Like `with_slot`, but fails unless the instance is open or enabled.
    fn with_open_slot<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(u8, &mut InstanceRecord<'a>, &mut B) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.with_slot(handle, |index, record, binding| {
            if record.state == State::Unused {
                warn!("{:?} {}: not open", self.family, index);
                return Err(Error::InvalidState);
            }
            f(index, record, binding)
        })
    }

    /// Opens the lowest unused instance.
    pub fn allocate(&self) -> Result<Handle, Error> {
        critical_section::with(|cs| {
            let mut records = self.records.borrow_ref_mut(cs);
            let (index, record) = records
                .iter_mut()
                .enumerate()
                .find(|(_, r)| r.state == State::Unused)
                .ok_or(Error::ResourceExhausted)?;
            record.reset();
            record.state = State::Open;
            debug!("{:?} {}: allocated", self.family, index);
            Ok(self.handle(index as u8))
        })
        .inspect_err(|_| warn!("{:?}: no free instance", self.family))
    }

    /// Opens a specific instance.
    pub fn open(&self, handle: Handle) -> Result<(), Error> {
        self.with_slot(handle, |index, record, _| {
            if record.state != State::Unused {
                warn!("{:?} {}: already in use", self.family, index);
                return Err(Error::AlreadyInUse);
            }
            record.reset();
            record.state = State::Open;
            debug!("{:?} {}: opened", self.family, index);
            Ok(())
        })
    }

    /// Disables the instance if needed and returns it to the unused pool.
    pub fn close(&self, handle: Handle) -> Result<(), Error> {
        let index = self.with_open_slot(handle, |index, record, binding| {
            if record.state == State::Enabled {
                binding.apply_enable(index, false);
                binding.arm_interrupt(index, false);
                record.state = State::Open;
            }
            Ok(index as usize)
        })?;
        // an interrupt that was already running completes first
        while self.in_service[index].load(Ordering::Acquire) {
            core::hint::spin_loop();
        }
        critical_section::with(|cs| {
            if let Some(io) = &self.io {
                io[index].borrow_ref_mut(cs).clear();
            }
            self.records.borrow_ref_mut(cs)[index].reset();
        });
        debug!("{:?} {}: closed", self.family, index);
        Ok(())
    }

    /// Turns the instance on and arms its interrupt if anything would handle it:
    /// a bound callback, or the buffers of a buffered registry.
    ///
    /// Enabling an enabled instance does nothing.
    pub fn enable(&self, handle: Handle) -> Result<(), Error> {
        let buffered = self.is_buffered();
        self.with_open_slot(handle, |index, record, binding| {
            if record.state == State::Enabled {
                trace!("{:?} {}: already enabled", self.family, index);
                return Ok(());
            }
            binding.apply_enable(index, true);
            binding.arm_interrupt(index, record.callback.is_some() || buffered);
            record.state = State::Enabled;
            debug!("{:?} {}: enabled", self.family, index);
            Ok(())
        })
    }

    /// Turns the instance off and disarms its interrupt.
    pub fn disable(&self, handle: Handle) -> Result<(), Error> {
        self.with_open_slot(handle, |index, record, binding| {
            if record.state == State::Enabled {
                binding.apply_enable(index, false);
                binding.arm_interrupt(index, false);
                record.state = State::Open;
                debug!("{:?} {}: disabled", self.family, index);
            }
            Ok(())
        })
    }

    pub fn state(&self, handle: Handle) -> Result<State, Error> {
        self.with_slot(handle, |_, record, _| Ok(record.state))
    }

    /// Solves and programs the divider for `rate`.
    ///
    /// On failure the previous configuration is left untouched.
    pub fn set_rate(&self, handle: Handle, rate: Rate) -> Result<Divisor, Error> {
        self.with_open_slot(handle, |index, record, binding| {
            let divisor = divisor::solve(&binding.prescalers(), binding.clock_hz(), rate)
                .inspect_err(|e| warn!("{:?} {}: rate {:?}: {:?}", self.family, index, rate, e))?;
            record.rate = RateConfig {
                requested: Some(rate),
                divisor,
            };
            let restart = record.state == State::Enabled
                && binding.rate_strategy() == ApplyStrategy::DisableApplyEnable;
            if restart {
                binding.apply_enable(index, false);
            }
            binding.apply_rate(index, &divisor);
            if restart {
                binding.apply_enable(index, true);
            }
            trace!(
                "{:?} {}: divider {}x{} -> {} Hz",
                self.family,
                index,
                divisor.primary,
                divisor.secondary,
                divisor.effective_hz
            );
            Ok(divisor)
        })
    }

    /// Achieved rate, in the unit it was requested in.
    pub fn current_rate(&self, handle: Handle) -> Result<Rate, Error> {
        self.with_open_slot(handle, |_, record, _| {
            record.rate.effective().ok_or(Error::InvalidState)
        })
    }

    pub fn requested_rate(&self, handle: Handle) -> Result<Rate, Error> {
        self.with_open_slot(handle, |_, record, _| {
            record.rate.requested.ok_or(Error::InvalidState)
        })
    }

    /// Stored rate configuration, zeroed for an unused instance
    pub fn rate_config(&self, handle: Handle) -> Result<RateConfig, Error> {
        self.with_slot(handle, |_, record, _| Ok(record.rate))
    }

    /// Binds or removes the interrupt callback.
    ///
    /// An enabled instance gets its interrupt re-armed right away.
    pub fn bind_callback(
        &self,
        handle: Handle,
        callback: Option<&'a dyn Callback>,
    ) -> Result<(), Error> {
        let buffered = self.is_buffered();
        self.with_open_slot(handle, |index, record, binding| {
            record.callback = callback;
            if record.state == State::Enabled {
                binding.arm_interrupt(index, callback.is_some() || buffered);
            }
            debug!(
                "{:?} {}: callback {}",
                self.family,
                index,
                if callback.is_some() { "bound" } else { "removed" }
            );
            Ok(())
        })
    }

    pub fn has_callback(&self, handle: Handle) -> Result<bool, Error> {
        self.with_slot(handle, |_, record, _| Ok(record.callback.is_some()))
    }

    /// Sets the transfer word width in bits.
    pub fn set_word_width(&self, handle: Handle, bits: u8) -> Result<(), Error> {
        self.with_open_slot(handle, |index, record, binding| {
            if !binding.word_widths().contains(&bits) {
                warn!("{:?} {}: unsupported width {}", self.family, index, bits);
                return Err(Error::InvalidArgument);
            }
            record.word_width = Some(bits);
            binding.apply_word_width(index, bits);
            Ok(())
        })
    }

    pub fn word_width(&self, handle: Handle) -> Result<u8, Error> {
        self.with_open_slot(handle, |_, record, binding| {
            record
                .word_width
                .or_else(|| binding.word_widths().first().copied())
                .ok_or(Error::Unsupported)
        })
    }

    /// Current value of the instance's counter (timer, encoder position).
    pub fn counter(&self, handle: Handle) -> Result<u32, Error> {
        self.with_open_slot(handle, |index, _, binding| binding.read_counter(index))
    }

    pub fn set_counter(&self, handle: Handle, value: u32) -> Result<(), Error> {
        self.with_open_slot(handle, |index, _, binding| binding.write_counter(index, value))
    }

    /// Runs `f` on the buffers of an open instance, with the width its
    /// transfers use (8 for a family without word widths).
    fn with_io<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(u8, u8, &mut IoBuffers<'a, CAP>, &mut B) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let index = self.slot(handle)?;
        let io = self.io.as_ref().ok_or(Error::NoBuffer)?;
        critical_section::with(|cs| {
            let records = self.records.borrow_ref(cs);
            let record = &records[index];
            if record.state == State::Unused {
                warn!("{:?} {}: not open", self.family, index);
                return Err(Error::InvalidState);
            }
            let mut binding = self.binding.borrow_ref_mut(cs);
            let width = record
                .word_width
                .or_else(|| binding.word_widths().first().copied())
                .unwrap_or(8);
            f(index as u8, width, &mut io[index].borrow_ref_mut(cs), &mut *binding)
        })
    }

    fn queue(
        &self,
        index: u8,
        io: &mut IoBuffers<'a, CAP>,
        binding: &mut B,
        words: impl ExactSizeIterator<Item = u16>,
    ) -> usize {
        let offered = words.len();
        let queued = io.tx_in.push_iter(words);
        if queued > 0 {
            binding.pend_transmit(index);
        }
        trace!("{:?} {}: queued {}/{}", self.family, index, queued, offered);
        queued
    }

    /// Queues as many of `bytes` as fit for transmission, returns how many did.
    ///
    /// Byte transfers need a word width of at most 8 bits, wider words go
    /// through [Registry::write_words].
    pub fn write(&self, handle: Handle, bytes: &[u8]) -> Result<usize, Error> {
        self.with_io(handle, |index, width, io, binding| {
            if width > 8 {
                warn!("{:?} {}: byte write at width {}", self.family, index, width);
                return Err(Error::InvalidState);
            }
            Ok(self.queue(index, io, binding, bytes.iter().map(|&b| u16::from(b))))
        })
    }

    /// Queues as many of `words` as fit. Every word must fit the word width,
    /// otherwise nothing is queued.
    pub fn write_words(&self, handle: Handle, words: &[u16]) -> Result<usize, Error> {
        self.with_io(handle, |index, width, io, binding| {
            if width < 16 && words.iter().any(|&w| w >> width != 0) {
                warn!("{:?} {}: word wider than {} bits", self.family, index, width);
                return Err(Error::InvalidArgument);
            }
            Ok(self.queue(index, io, binding, words.iter().copied()))
        })
    }

    /// Takes up to `out.len()` received bytes, returns how many were copied.
    pub fn read(&self, handle: Handle, out: &mut [u8]) -> Result<usize, Error> {
        self.with_io(handle, |index, width, io, _| {
            if width > 8 {
                warn!("{:?} {}: byte read at width {}", self.family, index, width);
                return Err(Error::InvalidState);
            }
            let mut count = 0;
            for byte in out.iter_mut() {
                let Some(word) = io.rx_out.pop_one() else {
                    break;
                };
                *byte = word as u8;
                count += 1;
            }
            Ok(count)
        })
    }

    /// Takes up to `out.len()` received words, returns how many were copied.
    pub fn read_words(&self, handle: Handle, out: &mut [u16]) -> Result<usize, Error> {
        self.with_io(handle, |_, _, io, _| Ok(io.rx_out.pop(out)))
    }

    /// Received words waiting to be read
    pub fn readable(&self, handle: Handle) -> Result<usize, Error> {
        self.with_io(handle, |_, _, io, _| Ok(io.rx_out.available()))
    }

    /// Room left in the transmit buffer
    pub fn writable(&self, handle: Handle) -> Result<usize, Error> {
        self.with_io(handle, |_, _, io, _| Ok(io.tx_in.free()))
    }

    /// Words pending transmission
    pub fn pending(&self, handle: Handle) -> Result<usize, Error> {
        self.with_io(handle, |_, _, io, _| Ok(io.tx_out.available()))
    }

    /// Whether everything written so far has left the transmit buffer.
    ///
    /// Does not wait; while words are still queued the transmit interrupt
    /// is kicked again.
    pub fn flush(&self, handle: Handle) -> Result<bool, Error> {
        self.with_io(handle, |index, _, io, binding| {
            let drained = io.tx_out.available() == 0;
            if !drained {
                binding.pend_transmit(index);
            }
            Ok(drained)
        })
    }

    /// Received words dropped because the inbound buffer was full
    pub fn overflows(&self, handle: Handle) -> Result<usize, Error> {
        self.with_io(handle, |_, _, io, _| Ok(io.rx_out.overflows()))
    }

    /// Takes the interrupt side of the registry. Only one can exist at a time.
    pub fn take_dispatcher(&self) -> Option<Dispatcher<'_, 'a, B, N, CAP>> {
        if self.dispatcher_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Dispatcher::new(self))
    }

    pub(crate) fn release_dispatcher(&self) {
        self.dispatcher_taken.store(false, Ordering::Release);
    }

    /// Snapshot of what the interrupt side needs, marking the slot in service
    /// when it is enabled.
    pub(crate) fn begin_service(&self, index: usize) -> Option<Option<&'a dyn Callback>> {
        critical_section::with(|cs| {
            let records = self.records.borrow_ref(cs);
            let record = &records[index];
            if record.state != State::Enabled {
                return None;
            }
            self.in_service[index].store(true, Ordering::Release);
            Some(record.callback)
        })
    }

    pub(crate) fn end_service(&self, index: usize) {
        self.in_service[index].store(false, Ordering::Release);
    }

    pub(crate) fn buffers(&self, index: usize) -> Option<&Mutex<RefCell<IoBuffers<'a, CAP>>>> {
        self.io.as_ref().map(|io| &io[index])
    }

    /// Runs `f` on the binding, e.g. to inspect a simulated one.
    pub fn with_binding<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        critical_section::with(|cs| f(&mut self.binding.borrow_ref_mut(cs)))
    }

    #[cfg(test)]
    pub(crate) fn is_cleared(&self, handle: Handle) -> bool {
        let cleared = self
            .with_slot(handle, |_, record, _| Ok(record.is_cleared()))
            .unwrap_or(false);
        let empty = match (&self.io, self.slot(handle)) {
            (Some(io), Ok(index)) => {
                critical_section::with(|cs| io[index].borrow_ref(cs).is_clear())
            }
            _ => true,
        };
        cleared && empty
    }
}
