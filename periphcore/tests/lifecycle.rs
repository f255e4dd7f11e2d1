use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use periphcore::families;
use periphcore::sim::{SimBinding, SimPort};
use periphcore::{BufferStorage, Error, Family, Handle, Rate, Registry, Service, State};

#[test_log::test]
fn spi_one_megahertz() {
    let spi: Registry<'_, SimBinding, 2> =
        Registry::new(SimBinding::new(families::SPI, 16_000_000));
    let dev = spi.allocate().unwrap();
    assert_eq!(dev.family(), Some(Family::Spi));

    let d = spi.set_rate(dev, Rate::Hertz(1_000_000)).unwrap();
    assert_eq!((d.primary, d.secondary), (4, 4));
    assert_eq!(families::spi::encode(&d), Some((0x2, 0b100)));
    spi.enable(dev).unwrap();
    assert_eq!(spi.current_rate(dev), Ok(Rate::Hertz(1_000_000)));
    assert_eq!(spi.with_binding(|b| b.faults()), 0);
}

#[test_log::test]
fn exhaust_and_reuse() {
    let ccp: Registry<'_, SimBinding, 4> = Registry::new(SimBinding::new(families::CCP, 16_000_000));
    let handles: Vec<Handle> = (0..4).map(|_| ccp.allocate().unwrap()).collect();
    assert_eq!(ccp.allocate(), Err(Error::ResourceExhausted));
    for (i, h) in handles.iter().enumerate() {
        assert_eq!(h.index() as usize, i);
    }
    ccp.close(handles[2]).unwrap();
    assert_eq!(ccp.allocate(), Ok(handles[2]));
    assert_eq!(ccp.allocate(), Err(Error::ResourceExhausted));
}

#[test_log::test]
fn close_restores_fresh_slot() {
    let handler = || {};
    let timers: Registry<'_, SimBinding, 1> =
        Registry::new(SimBinding::new(families::TIMER, 8_000_000));

    let fresh = timers.allocate().unwrap();
    let fresh_config = timers.rate_config(fresh).unwrap();
    let fresh_callback = timers.has_callback(fresh).unwrap();
    timers.close(fresh).unwrap();

    let h = timers.allocate().unwrap();
    timers.set_rate(h, Rate::PeriodUs(500)).unwrap();
    timers.bind_callback(h, Some(&handler)).unwrap();
    timers.set_counter(h, 99).unwrap();
    timers.enable(h).unwrap();
    timers.close(h).unwrap();
    assert_eq!(timers.state(h), Ok(State::Unused));

    let again = timers.allocate().unwrap();
    assert_eq!(again, fresh);
    assert_eq!(timers.rate_config(again), Ok(fresh_config));
    assert_eq!(timers.has_callback(again), Ok(fresh_callback));
    assert_eq!(timers.current_rate(again), Err(Error::InvalidState));
    assert_eq!(timers.state(again), Ok(State::Open));
}

#[test_log::test]
fn open_twice_enable_twice() {
    let mut storage = BufferStorage::array();
    let uarts: Registry<'_, SimBinding, 2> =
        Registry::with_buffers(SimBinding::new(families::UART, 8_000_000), &mut storage);
    let h = uarts.handle(1);
    uarts.open(h).unwrap();
    assert_eq!(uarts.open(h), Err(Error::AlreadyInUse));
    uarts.enable(h).unwrap();
    assert_eq!(uarts.enable(h), Ok(()));
    assert_eq!(uarts.state(h), Ok(State::Enabled));
    uarts.disable(h).unwrap();
    assert_eq!(uarts.disable(h), Ok(()));
    assert_eq!(uarts.state(h), Ok(State::Open));
}

#[test_log::test]
fn handles_of_other_families_rejected() {
    let mut storage = BufferStorage::array();
    let uarts: Registry<'_, SimBinding, 2> =
        Registry::with_buffers(SimBinding::new(families::UART, 8_000_000), &mut storage);
    let timers: Registry<'_, SimBinding, 2> =
        Registry::new(SimBinding::new(families::TIMER, 8_000_000));
    let t = timers.allocate().unwrap();
    assert_eq!(uarts.enable(t), Err(Error::InvalidHandle));
    assert_eq!(uarts.write(t, b"x"), Err(Error::InvalidHandle));
    assert_eq!(uarts.close(Handle::NULL), Err(Error::InvalidHandle));
    assert_eq!(uarts.close(Handle::from_raw(0x0302)), Err(Error::InvalidHandle));
}

#[test_log::test]
fn callback_runs_once_armed() {
    let hits = AtomicUsize::new(0);
    let handler = || {
        hits.fetch_add(1, Ordering::Relaxed);
    };
    let qei: Registry<'_, SimBinding, 1> = Registry::new(SimBinding::new(families::QEI, 8_000_000));
    let mut dispatcher = qei.take_dispatcher().unwrap();
    let mut port = SimPort::new(0);
    let h = qei.allocate().unwrap();

    qei.enable(h).unwrap();
    assert!(!qei.with_binding(|b| b.armed(0)));
    qei.bind_callback(h, Some(&handler)).unwrap();
    assert!(qei.with_binding(|b| b.armed(0)));

    port.raise();
    assert_eq!(dispatcher.on_interrupt(0, &mut port), Ok(Service::Callback));
    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert!(!port.is_pending());
}

#[test_log::test]
fn uart_echo_through_interrupts() {
    let mut storage = BufferStorage::array();
    let uarts: Registry<'_, SimBinding, 1, 16> =
        Registry::with_buffers(SimBinding::new(families::UART, 8_000_000), &mut storage);
    let mut dispatcher = uarts.take_dispatcher().unwrap();
    let mut port = SimPort::new(4);
    let h = uarts.allocate().unwrap();
    uarts.set_rate(h, Rate::Hertz(115_200)).unwrap();
    uarts.enable(h).unwrap();

    // line loops back what was sent
    let message = b"hello, interrupt";
    let mut written = 0;
    let mut echoed = Vec::new();
    while echoed.len() < message.len() {
        written += uarts.write(h, &message[written..]).unwrap();
        dispatcher.on_interrupt(0, &mut port).unwrap();
        port.loop_back();
        while dispatcher.on_interrupt(0, &mut port).unwrap()
            != (Service::Transfer {
                sent: 0,
                received: false,
            })
        {
            port.loop_back();
        }
        let mut buf = [0u8; 16];
        let n = uarts.read(h, &mut buf).unwrap();
        echoed.extend_from_slice(&buf[..n]);
    }
    assert_eq!(echoed, message);
    assert_eq!(uarts.overflows(h), Ok(0));
}

#[test_log::test]
fn nine_bit_echo_until_flushed() {
    let mut storage = BufferStorage::array();
    let uarts: Registry<'_, SimBinding, 1, 8> =
        Registry::with_buffers(SimBinding::new(families::UART, 8_000_000), &mut storage);
    let mut dispatcher = uarts.take_dispatcher().unwrap();
    let mut port = SimPort::new(2);
    let h = uarts.allocate().unwrap();
    uarts.set_word_width(h, 9).unwrap();
    uarts.enable(h).unwrap();

    // address words carry the ninth bit
    let frame = [0x1a0, 0x011, 0x022, 0x1a1, 0x033];
    assert_eq!(uarts.write_words(h, &frame), Ok(5));
    assert_eq!(uarts.write(h, b"x"), Err(Error::InvalidState));
    while !uarts.flush(h).unwrap() {
        dispatcher.on_interrupt(0, &mut port).unwrap();
        port.loop_back();
    }
    // one received word per interrupt
    while uarts.readable(h).unwrap() < frame.len() {
        dispatcher.on_interrupt(0, &mut port).unwrap();
    }
    let mut echoed = [0u16; 8];
    assert_eq!(uarts.read_words(h, &mut echoed), Ok(5));
    assert_eq!(&echoed[..5], &frame);
    assert!(uarts.with_binding(|b| b.transmit_requests(0)) >= 2);
}

#[test_log::test]
fn threaded_transfer_keeps_order() {
    const COUNT: usize = 2_000;
    let mut storage = BufferStorage::array();
    let uarts: Registry<'_, SimBinding, 1, 16> =
        Registry::with_buffers(SimBinding::new(families::UART, 8_000_000), &mut storage);
    let h = uarts.allocate().unwrap();
    uarts.enable(h).unwrap();
    let mut dispatcher = uarts.take_dispatcher().unwrap();
    let expected: Vec<u8> = (0..COUNT).map(|i| (i % 251) as u8).collect();

    std::thread::scope(|s| {
        let uarts = &uarts;
        let expected = &expected;
        // interrupt context
        s.spawn(move || {
            let mut port = SimPort::new(4);
            let mut sent = Vec::new();
            let mut fed = 0;
            while sent.len() < COUNT || fed < COUNT {
                if fed < COUNT && uarts.readable(h).unwrap() < 15 {
                    port.receive(expected[fed]);
                    fed += 1;
                }
                dispatcher.on_interrupt(0, &mut port).unwrap();
                sent.extend(port.take_sent_bytes());
            }
            assert_eq!(&sent, expected);
        });

        let mut written = 0;
        let mut received = Vec::new();
        while written < COUNT || received.len() < COUNT {
            written += uarts.write(h, &expected[written..]).unwrap();
            let mut buf = [0u8; 8];
            let n = uarts.read(h, &mut buf).unwrap();
            received.extend_from_slice(&buf[..n]);
            std::thread::yield_now();
        }
        assert_eq!(&received, expected);
    });
    assert_eq!(uarts.overflows(h), Ok(0));
}

#[test_log::test]
fn close_waits_for_running_interrupt() {
    let hits = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let handler = || {
        hits.fetch_add(1, Ordering::SeqCst);
    };
    let timers: Registry<'_, SimBinding, 1> =
        Registry::new(SimBinding::new(families::TIMER, 8_000_000));
    let h = timers.allocate().unwrap();
    timers.bind_callback(h, Some(&handler)).unwrap();
    timers.enable(h).unwrap();
    let mut dispatcher = timers.take_dispatcher().unwrap();

    std::thread::scope(|s| {
        s.spawn(|| {
            let mut port = SimPort::new(0);
            while !stop.load(Ordering::SeqCst) {
                port.raise();
                dispatcher.on_interrupt(0, &mut port).unwrap();
            }
        });
        while hits.load(Ordering::SeqCst) < 100 {
            std::thread::yield_now();
        }
        timers.close(h).unwrap();
        let after_close = hits.load(Ordering::SeqCst);
        for _ in 0..1_000 {
            std::thread::yield_now();
        }
        assert_eq!(hits.load(Ordering::SeqCst), after_close);
        stop.store(true, Ordering::SeqCst);
    });
    assert_eq!(timers.state(h), Ok(State::Unused));
}
