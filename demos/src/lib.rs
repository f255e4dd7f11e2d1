// make this no_std
#![no_std]
// Dual logging system compatibility: defmt doesn't support modern format syntax
#![allow(clippy::uninlined_format_args)]

// Compile-time checks for logging features
#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features 'defmt' and 'log' are mutually exclusive. Enable only one for logging.");

#[cfg(not(any(feature = "defmt", feature = "log")))]
compile_error!("Must enable either 'defmt' or 'log' feature for logging support.");

#[cfg(feature = "defmt")]
use defmt::{debug, error, info};

#[cfg(feature = "log")]
use log::{debug, error, info};

pub mod solve_rate;
pub mod timer_ticks;
pub mod uart_echo;

/// Upper bound on simulated interrupts a demo runs before giving up
const MAX_INTERRUPTS: usize = 10_000;
