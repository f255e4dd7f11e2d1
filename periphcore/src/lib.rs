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

//! Peripheral core library
//!
//! The shared part of every peripheral family driver (capture/compare,
//! SPI, UART, QEI, timers, output compare): a fixed bank of instances
//! handed out through [Handle]s, a prescaler solver that maps a requested
//! rate onto discrete clock divider fields, and lock-free ring buffers that
//! move bytes between application code and interrupt handlers.
//!
//! Family specific register access lives outside this crate, behind the
//! [HardwareBinding] trait. The interrupt vector of a family calls into a
//! [Dispatcher], which is the only interrupt-side accessor of a [Registry].
//!
//! Basic usage:
//! ```
//! # use periphcore::{families, sim::SimBinding, Rate, Registry};
//! // binding: something that implements the family register writes
//! let binding: SimBinding = SimBinding::new(families::SPI, 16_000_000);
//! let spi: Registry<_, 2> = Registry::new(binding);
//! let dev = spi.allocate().unwrap();
//! spi.set_rate(dev, Rate::Hertz(1_000_000)).unwrap();
//! spi.enable(dev).unwrap();
//! assert_eq!(spi.current_rate(dev).unwrap(), Rate::Hertz(1_000_000));
//! ```
#![no_std]

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, info, trace, warn};
#[cfg(not(feature = "defmt"))]
pub(crate) use log::{debug, info, trace, warn};

pub mod binding;
mod dispatch;
pub mod divisor;
pub mod errors;
pub mod families;
mod handle;
pub mod ring;
mod registry;
pub mod sim;

pub use binding::{ApplyStrategy, Callback, HardwareBinding, InterruptPort};
pub use dispatch::{Dispatcher, Service};
pub use divisor::{effective_rate, solve, Divisor, Prescalers, Rate, Stage};
pub use errors::Error;
pub use handle::{Family, Handle};
pub use registry::{BufferStorage, RateConfig, Registry, State, DEFAULT_BUFFER_SIZE};
pub use ring::RingBuffer;
