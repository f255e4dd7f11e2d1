use core::fmt;

use super::info;
use periphcore::families;
use periphcore::{Divisor, Error, Family, Rate};

/// Register fields a divisor is written as
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Fields {
    /// SPIxCON1 primary and secondary prescale bits
    Spi { ppre: u8, spre: u8 },
    /// UxMODE.BRGH and UxBRG
    Uart { brgh: bool, brg: u16 },
    /// TxCON.TCKPS and PRx
    Timer { tckps: u8, pr: u16 },
    /// CCPxCON1L.TMRPS and CCPxPR
    Ccp { tmrps: u8, pr: u32 },
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Spi { ppre, spre } => write!(f, "PPRE={:#x} SPRE={:#x}", ppre, spre),
            Self::Uart { brgh, brg } => write!(f, "BRGH={} BRG={}", u8::from(*brgh), brg),
            Self::Timer { tckps, pr } => write!(f, "TCKPS={} PR={}", tckps, pr),
            Self::Ccp { tmrps, pr } => write!(f, "TMRPS={} PR={}", tmrps, pr),
        }
    }
}

/// Encodes `d` for the family's registers. QEI has no divider fields.
pub fn fields(family: Family, d: &Divisor) -> Option<Fields> {
    match family {
        Family::Spi => families::spi::encode(d).map(|(ppre, spre)| Fields::Spi { ppre, spre }),
        Family::Uart => families::uart::encode(d).map(|(brgh, brg)| Fields::Uart { brgh, brg }),
        Family::Timer | Family::Oc => {
            families::timer::encode(d).map(|(tckps, pr)| Fields::Timer { tckps, pr })
        }
        Family::Ccp => families::ccp::encode(d).map(|(tmrps, pr)| Fields::Ccp { tmrps, pr }),
        Family::Qei => None,
    }
}

/// Solves `rate` for a family and logs the register fields it maps to.
pub fn solve_rate(family: Family, clock_hz: u32, rate: Rate) -> Result<Divisor, Error> {
    let table = families::info(family);
    let d = periphcore::solve(&table.prescalers, clock_hz, rate)?;
    info!(
        "{:?} @ {} Hz: requested {:?}, divider {}x{} (raw {})",
        family, clock_hz, rate, d.primary, d.secondary, d.raw
    );
    info!(
        "achieved {} Hz, period {} us",
        d.effective_hz,
        d.period_us()
    );
    if let Some(fields) = fields(family, &d) {
        info!("{:?} fields: {}", family, fields);
    }
    Ok(d)
}
