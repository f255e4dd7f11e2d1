use core::sync::atomic::{AtomicUsize, Ordering};

use super::{debug, info};
use periphcore::families;
use periphcore::sim::{SimBinding, SimPort};
use periphcore::{Error, Rate, Registry, Service};

/// Runs a simulated timer for `ticks` periods with a counting callback.
///
/// Returns how often the callback ran and the achieved period in microseconds.
pub fn timer_ticks(clock_hz: u32, period_us: u32, ticks: usize) -> Result<(usize, u32), Error> {
    let count = AtomicUsize::new(0);
    let on_tick = || {
        count.fetch_add(1, Ordering::Relaxed);
    };
    let timers: Registry<'_, SimBinding, 1> =
        Registry::new(SimBinding::new(families::TIMER, clock_hz));
    let mut dispatcher = timers.take_dispatcher().ok_or(Error::InvalidState)?;
    let mut port = SimPort::new(0);

    let timer = timers.allocate()?;
    let d = timers.set_rate(timer, Rate::PeriodUs(period_us))?;
    timers.bind_callback(timer, Some(&on_tick))?;
    timers.enable(timer)?;

    for _ in 0..ticks {
        timers.with_binding(|b| b.advance(timer.index(), d.secondary));
        port.raise();
        if dispatcher.on_interrupt(timer.index(), &mut port)? != Service::Callback {
            return Err(Error::InvalidState);
        }
    }
    let achieved = match timers.current_rate(timer)? {
        Rate::PeriodUs(us) => us,
        _ => d.period_us(),
    };
    debug!("counter at {}", timers.counter(timer)?);
    let ran = count.load(Ordering::Relaxed);
    info!("{} ticks of {} us (asked {} us)", ran, achieved, period_us);
    timers.close(timer)?;
    Ok((ran, achieved))
}
