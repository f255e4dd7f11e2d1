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

//! Prescaler tables of the PIC24/dsPIC33 peripheral families, and the
//! register encodings of the solved divider values.
//!
//! Bindings use the `encode` helpers in their `apply_rate`; the solver
//! itself only ever deals with plain ratios.

use crate::divisor::{Divisor, Prescalers, Stage};
use crate::handle::Family;

/// Static description of a family, as needed by a binding
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FamilyInfo {
    pub family: Family,
    pub prescalers: Prescalers,
    /// Supported transfer widths in bits, first one is the reset default
    pub word_widths: &'static [u8],
    /// Has a readable/writable counter register
    pub has_counter: bool,
}

/// SPI: primary 1/4/16/64, secondary 1..8, 1:1 together is not allowed.
pub const SPI: FamilyInfo = FamilyInfo {
    family: Family::Spi,
    prescalers: Prescalers {
        primary: Stage::List(&[1, 4, 16, 64]),
        secondary: Stage::Range { min: 1, max: 8 },
        forbidden: Some((1, 1)),
    },
    word_widths: &[8, 16],
    has_counter: false,
};

/// UART: 16x (BRGH=0) or 4x (BRGH=1) oversampling, 16-bit baud generator.
pub const UART: FamilyInfo = FamilyInfo {
    family: Family::Uart,
    prescalers: Prescalers {
        primary: Stage::List(&[4, 16]),
        secondary: Stage::Range { min: 1, max: 65536 },
        forbidden: None,
    },
    word_widths: &[8, 9],
    has_counter: false,
};

/// Timer: 1/8/64/256 prescaler, 16-bit period register.
pub const TIMER: FamilyInfo = FamilyInfo {
    family: Family::Timer,
    prescalers: Prescalers {
        primary: Stage::List(&[1, 8, 64, 256]),
        secondary: Stage::Range { min: 1, max: 65536 },
        forbidden: None,
    },
    word_widths: &[],
    has_counter: true,
};

/// Capture/compare: 1/4/16/64 prescaler, 32-bit period register.
pub const CCP: FamilyInfo = FamilyInfo {
    family: Family::Ccp,
    prescalers: Prescalers {
        primary: Stage::List(&[1, 4, 16, 64]),
        secondary: Stage::Range {
            min: 1,
            max: u32::MAX,
        },
        forbidden: None,
    },
    word_widths: &[16, 32],
    has_counter: true,
};

/// Output compare: runs off a timer, same prescaler, 16-bit period.
pub const OC: FamilyInfo = FamilyInfo {
    family: Family::Oc,
    prescalers: TIMER.prescalers,
    word_widths: &[],
    has_counter: true,
};

/// QEI: power of two input filter divider; the position counter is the counter.
pub const QEI: FamilyInfo = FamilyInfo {
    family: Family::Qei,
    prescalers: Prescalers {
        primary: Stage::List(&[1, 2, 4, 8, 16, 32, 64, 128]),
        secondary: Stage::Range { min: 1, max: 1 },
        forbidden: None,
    },
    word_widths: &[],
    has_counter: true,
};

/// Looks up the table of a family
pub fn info(family: Family) -> FamilyInfo {
    match family {
        Family::Spi => SPI,
        Family::Uart => UART,
        Family::Timer => TIMER,
        Family::Ccp => CCP,
        Family::Oc => OC,
        Family::Qei => QEI,
    }
}

/// Position of `value` in `table`, as register bits
fn index_of(table: &[u32], value: u32) -> Option<u8> {
    table.iter().position(|&v| v == value).map(|i| i as u8)
}

pub mod spi {
    use super::*;

    /// SPIxCON1 PPRE bits, indexed by field value
    const PRIMARY_BITS: [u32; 4] = [64, 16, 4, 1];

    /// Register fields `(PPRE, SPRE)`.
    ///
    /// SPRE holds the one's complement of `secondary - 1` in three bits,
    /// so 1:1 is `0b111` and 1:8 is `0b000`.
    pub fn encode(divisor: &Divisor) -> Option<(u8, u8)> {
        let primary = index_of(&PRIMARY_BITS, divisor.primary)?;
        if !(1..=8).contains(&divisor.secondary) {
            return None;
        }
        let secondary = !((divisor.secondary - 1) as u8) & 0x07;
        Some((primary, secondary))
    }

    /// Ratios `(primary, secondary)` from register fields
    pub fn decode(ppre: u8, spre: u8) -> Option<(u32, u32)> {
        let primary = *PRIMARY_BITS.get(ppre as usize)?;
        let secondary = (!spre & 0x07) as u32 + 1;
        Some((primary, secondary))
    }
}

pub mod uart {
    use super::*;

    /// `(BRGH, UxBRG)`
    pub fn encode(divisor: &Divisor) -> Option<(bool, u16)> {
        let brgh = match divisor.primary {
            4 => true,
            16 => false,
            _ => return None,
        };
        let brg = u16::try_from(divisor.secondary.checked_sub(1)?).ok()?;
        Some((brgh, brg))
    }

    pub fn decode(brgh: bool, brg: u16) -> (u32, u32) {
        (if brgh { 4 } else { 16 }, brg as u32 + 1)
    }
}

pub mod timer {
    use super::*;

    const TCKPS: [u32; 4] = [1, 8, 64, 256];

    /// `(TCKPS, PRx)`
    pub fn encode(divisor: &Divisor) -> Option<(u8, u16)> {
        let tckps = index_of(&TCKPS, divisor.primary)?;
        let pr = u16::try_from(divisor.secondary.checked_sub(1)?).ok()?;
        Some((tckps, pr))
    }

    pub fn decode(tckps: u8, pr: u16) -> Option<(u32, u32)> {
        Some((*TCKPS.get(tckps as usize)?, pr as u32 + 1))
    }
}

pub mod ccp {
    use super::*;

    const TMRPS: [u32; 4] = [1, 4, 16, 64];

    /// `(TMRPS, CCPxPR)`; the period register is split into PRH/PRL by the binding.
    pub fn encode(divisor: &Divisor) -> Option<(u8, u32)> {
        let tmrps = index_of(&TMRPS, divisor.primary)?;
        Some((tmrps, divisor.secondary.checked_sub(1)?))
    }

    pub fn decode(tmrps: u8, pr: u32) -> Option<(u32, u32)> {
        Some((*TMRPS.get(tmrps as usize)?, pr.checked_add(1)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::divisor::{effective_rate, solve, Rate};

    #[test]
    fn test_spi_fields() {
        let d = solve(&SPI.prescalers, 16_000_000, Rate::Hertz(1_000_000)).unwrap();
        assert_eq!(spi::encode(&d), Some((0x2, 0b100)));
        assert_eq!(spi::decode(0x2, 0b100), Some((4, 4)));
        // 1:1 secondary is all ones, 1:8 all zeros
        assert_eq!(spi::decode(0x3, 0b111), Some((1, 1)));
        assert_eq!(spi::decode(0x0, 0b000), Some((64, 8)));
        for ppre in 0..4u8 {
            for spre in 0..8u8 {
                let (p, s) = spi::decode(ppre, spre).unwrap();
                let d = Divisor {
                    primary: p,
                    secondary: s,
                    ..Default::default()
                };
                assert_eq!(spi::encode(&d), Some((ppre, spre)));
            }
        }
    }

    #[test]
    fn test_uart_baud() {
        // Fcy 8 MHz, 115200 baud with 4x: 8e6 / 115200 = 69 -> 4 * 17
        let d = solve(&UART.prescalers, 8_000_000, Rate::Hertz(115_200)).unwrap();
        assert_eq!((d.primary, d.secondary), (4, 17));
        assert_eq!(uart::encode(&d), Some((true, 16)));
        assert_eq!(effective_rate(4, 17, 8_000_000), 117_647);
        // 9600 baud: 833 -> 4 * 208, still within the 16-bit generator
        let d = solve(&UART.prescalers, 8_000_000, Rate::Hertz(9_600)).unwrap();
        assert_eq!((d.primary, d.secondary), (4, 208));
        assert_eq!(uart::decode(true, 207), (4, 208));
    }

    #[test]
    fn test_timer_fields() {
        let d = solve(&TIMER.prescalers, 8_000_000, Rate::PeriodMs(100)).unwrap();
        assert_eq!((d.primary, d.secondary), (64, 12_500));
        assert_eq!(timer::encode(&d), Some((2, 12_499)));
        assert_eq!(timer::decode(2, 12_499), Some((64, 12_500)));
        assert_eq!(timer::decode(4, 0), None);
    }

    #[test]
    fn test_ccp_long_period() {
        // 10 s at 16 MHz does not fit 16 bits but fits the 32-bit register
        let d = solve(&CCP.prescalers, 16_000_000, Rate::PeriodMs(10_000)).unwrap();
        assert_eq!((d.primary, d.secondary), (1, 160_000_000));
        assert_eq!(ccp::encode(&d), Some((0, 159_999_999)));
        assert_eq!(d.period_ms(), 10_000);
    }

    #[test]
    fn test_info_lookup() {
        for family in [
            Family::Spi,
            Family::Uart,
            Family::Timer,
            Family::Ccp,
            Family::Oc,
            Family::Qei,
        ] {
            assert_eq!(info(family).family, family);
        }
    }
}
