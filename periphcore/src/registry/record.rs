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

use crate::binding::Callback;
use crate::divisor::{Divisor, Rate};
use crate::ring::{Consumer, Producer, RingBuffer};

/// Lifecycle state of an instance
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum State {
    #[default]
    Unused,
    Open,
    Enabled,
}

/// Last requested rate and the divider values derived from it.
///
/// All zero until the first `set_rate`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct RateConfig {
    pub requested: Option<Rate>,
    pub divisor: Divisor,
}

impl RateConfig {
    /// Achieved rate in the unit of the request
    pub fn effective(&self) -> Option<Rate> {
        self.requested.map(|unit| self.divisor.effective(unit))
    }
}

/// One slot of the registry. Only ever mutated from the foreground.
#[derive(Clone, Copy, Default)]
pub(crate) struct InstanceRecord<'a> {
    pub state: State,
    pub rate: RateConfig,
    /// `None` means the family's default width
    pub word_width: Option<u8>,
    pub callback: Option<&'a dyn Callback>,
}

impl InstanceRecord<'_> {
    pub const fn new() -> Self {
        Self {
            state: State::Unused,
            rate: RateConfig {
                requested: None,
                divisor: Divisor {
                    primary: 0,
                    secondary: 0,
                    raw: 0,
                    clock_hz: 0,
                    effective_hz: 0,
                },
            },
            word_width: None,
            callback: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_cleared(&self) -> bool {
        self.state == State::Unused
            && self.rate == RateConfig::default()
            && self.word_width.is_none()
            && self.callback.is_none()
    }
}

/// Buffer memory of one instance, lent to [crate::Registry::with_buffers].
///
/// Holds up to `CAP - 1` words per direction. Words are up to 16 bits wide,
/// plain bytes included.
pub struct BufferStorage<const CAP: usize> {
    tx: RingBuffer<u16, CAP>,
    rx: RingBuffer<u16, CAP>,
}

impl<const CAP: usize> Default for BufferStorage<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> BufferStorage<CAP> {
    pub const fn new() -> Self {
        Self {
            tx: RingBuffer::new(),
            rx: RingBuffer::new(),
        }
    }

    /// Storage for a whole registry
    pub const fn array<const N: usize>() -> [Self; N] {
        [const { Self::new() }; N]
    }
}

/// Split buffers of an instance.
///
/// `tx_in`, `rx_out`: foreground ends. `tx_out`, `rx_in`: interrupt ends.
pub(crate) struct IoBuffers<'a, const CAP: usize> {
    pub tx_in: Producer<'a, u16, CAP>,
    pub tx_out: Consumer<'a, u16, CAP>,
    pub rx_in: Producer<'a, u16, CAP>,
    pub rx_out: Consumer<'a, u16, CAP>,
}

impl<'a, const CAP: usize> IoBuffers<'a, CAP> {
    pub fn new(storage: &'a mut BufferStorage<CAP>) -> Self {
        let BufferStorage { tx, rx } = storage;
        let (tx_in, tx_out) = tx.split();
        let (rx_in, rx_out) = rx.split();
        Self {
            tx_in,
            tx_out,
            rx_in,
            rx_out,
        }
    }

    /// Drops everything queued in both directions, and the overflow count.
    pub fn clear(&mut self) {
        self.tx_out.clear();
        self.rx_out.clear();
    }

    pub fn is_clear(&self) -> bool {
        self.tx_out.available() == 0 && self.rx_out.available() == 0 && self.rx_out.overflows() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset() {
        let handler = || {};
        let mut record = InstanceRecord::new();
        assert!(record.is_cleared());
        record.state = State::Enabled;
        record.word_width = Some(16);
        record.callback = Some(&handler);
        assert!(!record.is_cleared());
        record.reset();
        assert!(record.is_cleared());
    }

    #[test]
    fn test_buffers_clear() {
        let mut storage = BufferStorage::<4>::new();
        let mut io = IoBuffers::new(&mut storage);
        assert!(io.is_clear());
        assert_eq!(io.tx_in.push(&[0x1ff, 2]), 2);
        io.rx_in.push(&[1, 2, 3]);
        assert!(!io.rx_in.push_lossy(4));
        assert_eq!(io.tx_out.pop_one(), Some(0x1ff));
        io.clear();
        assert!(io.is_clear());
    }

    #[test]
    fn test_effective() {
        let mut config = RateConfig::default();
        assert_eq!(config.effective(), None);
        config.requested = Some(Rate::Hertz(1_000_000));
        config.divisor = Divisor {
            primary: 4,
            secondary: 4,
            raw: 16,
            clock_hz: 16_000_000,
            effective_hz: 1_000_000,
        };
        assert_eq!(config.effective(), Some(Rate::Hertz(1_000_000)));
    }
}
