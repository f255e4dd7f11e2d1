use super::{debug, error, info, MAX_INTERRUPTS};
use periphcore::families;
use periphcore::sim::{SimBinding, SimPort};
use periphcore::{BufferStorage, Error, Rate, Registry, Service};

const IDLE: Service = Service::Transfer {
    sent: 0,
    received: false,
};

/// Sends `text` through a simulated UART whose line is looped back,
/// reading the echo into `out`. Returns the number of bytes echoed.
pub fn uart_echo(clock_hz: u32, baud: u32, text: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    let mut storage = BufferStorage::array();
    let uarts: Registry<'_, SimBinding, 1, 16> =
        Registry::with_buffers(SimBinding::new(families::UART, clock_hz), &mut storage);
    let mut dispatcher = uarts.take_dispatcher().ok_or(Error::InvalidState)?;
    let mut port = SimPort::new(4);

    let uart = uarts.allocate()?;
    let d = uarts.set_rate(uart, Rate::Hertz(baud))?;
    info!("{} baud requested, {} achieved", baud, d.effective_hz);
    uarts.enable(uart)?;

    let wanted = text.len().min(out.len());
    let mut written = 0;
    let mut echoed = 0;
    let mut interrupts = 0;
    while echoed < wanted {
        written += uarts.write(uart, &text[written..wanted])?;
        loop {
            interrupts += 1;
            if interrupts > MAX_INTERRUPTS {
                error!("echo stalled after {} bytes", echoed);
                return Err(Error::InvalidState);
            }
            let service = dispatcher.on_interrupt(uart.index(), &mut port)?;
            port.loop_back();
            if service == IDLE {
                break;
            }
        }
        echoed += uarts.read(uart, &mut out[echoed..wanted])?;
        debug!("{}/{} echoed", echoed, wanted);
    }
    if uarts.overflows(uart)? > 0 {
        error!("receive buffer overflowed");
    }
    uarts.close(uart)?;
    Ok(echoed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        let mut out = [0u8; 64];
        let text = b"The quick brown fox jumps over the lazy dog";
        let n = uart_echo(8_000_000, 115_200, text, &mut out).unwrap();
        assert_eq!(&out[..n], text);
    }
}
