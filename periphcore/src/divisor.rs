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

//! Prescaler solver
//!
//! Maps a requested frequency or period onto two chained clock divider
//! stages. The solver works on logical divider values only, turning them
//! into register bit patterns is up to the binding (see [crate::families]).

use crate::errors::Error;

const US_PER_S: u64 = 1_000_000;
const MS_PER_S: u64 = 1_000;

/// One prescaler stage: the set of divide ratios the hardware offers.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stage {
    /// Discrete ratios, in ascending order
    List(&'static [u32]),
    /// Every ratio in `min..=max`
    Range { min: u32, max: u32 },
}

impl Stage {
    pub fn min(&self) -> u32 {
        match self {
            Self::List(values) => values.first().copied().unwrap_or(0),
            Self::Range { min, .. } => *min,
        }
    }

    pub fn max(&self) -> u32 {
        match self {
            Self::List(values) => values.last().copied().unwrap_or(0),
            Self::Range { max, .. } => *max,
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        match self {
            Self::List(values) => values.contains(&value),
            Self::Range { min, max } => (*min..=*max).contains(&value),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::List(values) => values.is_empty(),
            Self::Range { min, max } => min > max || *min == 0,
        }
    }

    /// Legal ratio closest to `target`, ties go to the smaller one.
    fn nearest(&self, target: u64) -> u32 {
        match self {
            Self::List(values) => {
                let mut best = values[0];
                for &v in values.iter() {
                    if (v as u64).abs_diff(target) < (best as u64).abs_diff(target) {
                        best = v;
                    }
                }
                best
            }
            Self::Range { min, max } => target.clamp(*min as u64, *max as u64) as u32,
        }
    }

    fn next_above(&self, value: u32) -> Option<u32> {
        match self {
            Self::List(values) => values.iter().copied().find(|&v| v > value),
            Self::Range { max, .. } => (value < *max).then(|| value + 1),
        }
    }

    fn next_below(&self, value: u32) -> Option<u32> {
        match self {
            Self::List(values) => values.iter().rev().copied().find(|&v| v < value),
            Self::Range { min, .. } => (value > *min).then(|| value - 1),
        }
    }

    fn iter(&self) -> StageIter<'_> {
        StageIter {
            stage: self,
            next: Some(self.min()),
        }
    }
}

struct StageIter<'a> {
    stage: &'a Stage,
    next: Option<u32>,
}

impl Iterator for StageIter<'_> {
    type Item = u32;
    fn next(&mut self) -> Option<u32> {
        let current = self.next?;
        self.next = self.stage.next_above(current);
        Some(current)
    }
}

/// The prescaler chain of a family.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Prescalers {
    pub primary: Stage,
    pub secondary: Stage,
    /// (primary, secondary) pair the hardware must never be given
    pub forbidden: Option<(u32, u32)>,
}

/// A frequency or a period, as requested by the caller or as achieved.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Rate {
    Hertz(u32),
    PeriodUs(u32),
    PeriodMs(u32),
}

impl Rate {
    fn value(&self) -> u32 {
        match self {
            Self::Hertz(v) | Self::PeriodUs(v) | Self::PeriodMs(v) => *v,
        }
    }

    /// Clock cycles per output cycle, before rounding to the stages.
    pub fn raw_divisor(&self, clock_hz: u32) -> Result<u64, Error> {
        if self.value() == 0 {
            return Err(Error::InvalidArgument);
        }
        if clock_hz == 0 {
            return Err(Error::RateUnachievable);
        }
        let clock = clock_hz as u64;
        let raw = match *self {
            Self::Hertz(hz) => {
                if hz > clock_hz {
                    return Err(Error::RateUnachievable);
                }
                clock / hz as u64
            }
            Self::PeriodUs(us) => clock * us as u64 / US_PER_S,
            Self::PeriodMs(ms) => clock * ms as u64 / MS_PER_S,
        };
        // period shorter than a single clock cycle
        if raw == 0 {
            return Err(Error::RateUnachievable);
        }
        Ok(raw)
    }
}

/// Solver result: logical stage ratios and what they achieve.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Divisor {
    pub primary: u32,
    pub secondary: u32,
    /// Unrounded clock / rate ratio the stages were fitted to
    pub raw: u64,
    pub clock_hz: u32,
    pub effective_hz: u32,
}

impl Divisor {
    /// Total division ratio
    pub fn ratio(&self) -> u64 {
        self.primary as u64 * self.secondary as u64
    }

    /// Achieved period in microseconds, 0 for a zeroed divisor
    pub fn period_us(&self) -> u32 {
        self.period(US_PER_S)
    }

    pub fn period_ms(&self) -> u32 {
        self.period(MS_PER_S)
    }

    fn period(&self, units_per_s: u64) -> u32 {
        if self.clock_hz == 0 {
            return 0;
        }
        let period = self.ratio() * units_per_s / self.clock_hz as u64;
        period.min(u32::MAX as u64) as u32
    }

    /// Achieved rate, expressed in the same unit as `unit`.
    pub fn effective(&self, unit: Rate) -> Rate {
        match unit {
            Rate::Hertz(_) => Rate::Hertz(self.effective_hz),
            Rate::PeriodUs(_) => Rate::PeriodUs(self.period_us()),
            Rate::PeriodMs(_) => Rate::PeriodMs(self.period_ms()),
        }
    }
}

/// Frequency produced by dividing `clock_hz` through both stages.
///
/// This is the readback the solver itself uses, so a solved [Divisor]
/// always satisfies `effective_rate(d.primary, d.secondary, d.clock_hz) == d.effective_hz`.
pub fn effective_rate(primary: u32, secondary: u32, clock_hz: u32) -> u32 {
    let ratio = primary as u64 * secondary as u64;
    if ratio == 0 {
        return 0;
    }
    (clock_hz as u64 / ratio) as u32
}

/// Finds the stage ratios that best approximate `rate` from `clock_hz`.
pub fn solve(prescalers: &Prescalers, clock_hz: u32, rate: Rate) -> Result<Divisor, Error> {
    let raw = rate.raw_divisor(clock_hz)?;
    solve_raw(prescalers, clock_hz, raw)
}

/// Fits an already computed raw ratio onto the stages.
pub fn solve_raw(prescalers: &Prescalers, clock_hz: u32, raw: u64) -> Result<Divisor, Error> {
    let Prescalers {
        primary: primary_stage,
        secondary: secondary_stage,
        forbidden,
    } = prescalers;
    if primary_stage.is_empty() || secondary_stage.is_empty() || clock_hz == 0 || raw == 0 {
        return Err(Error::RateUnachievable);
    }

    let secondary_max = secondary_stage.max() as u64;
    let primary = primary_stage
        .iter()
        .find(|&p| p as u64 * secondary_max >= raw)
        .unwrap_or_else(|| primary_stage.max());

    let p = primary as u64;
    let target = raw / p + u64::from(raw % p >= p.div_ceil(2));
    let mut secondary = secondary_stage.nearest(target);

    if Some((primary, secondary)) == *forbidden {
        secondary = secondary_stage
            .next_above(secondary)
            .or_else(|| secondary_stage.next_below(secondary))
            .ok_or(Error::RateUnachievable)?;
    }

    Ok(Divisor {
        primary,
        secondary,
        raw,
        clock_hz,
        effective_hz: effective_rate(primary, secondary, clock_hz),
    })
}
