//! ARDF Beacon Main Application
//!
//! Entry point for the STM32G474-based fox-hunting beacon firmware.
//! Initializes hardware, loads the configuration and spawns the tick and
//! clock-alarm tasks. The foreground loop polls the card reader and
//! services configuration reloads.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ardf_firmware::drivers::mcp79410::Mcp79410;
use ardf_firmware::hal::gpio::{AmplifierSelect, LedState, StatusLed};
use ardf_firmware::hal::i2c::{I2cAddress, I2cRegisters};
use ardf_firmware::hal::spi::SpiSynthPort;
use ardf_firmware::hal::timer::TickClock;
use ardf_firmware::prelude::*;
use ardf_firmware::status::StatusQueue;

type SynthPortImpl = SpiSynthPort<'static, Spi<'static, Blocking>>;
type ClockImpl = Mcp79410<I2cRegisters<I2c<'static, Blocking>>>;
type SharedBeacon = Mutex<CriticalSectionRawMutex, RefCell<Beacon<'static, SynthPortImpl, ClockImpl, StatusQueue>>>;

/// Shared SPI bus arbiter (synthesizer and card reader)
static BUS: BusArbiter = BusArbiter::new();

/// Beacon, locked by critical section from every task
static BEACON: StaticCell<SharedBeacon> = StaticCell::new();

/// Pending configuration reload
static RELOAD: Signal<CriticalSectionRawMutex, Settings> = Signal::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ARDF Beacon Firmware v{}", env!("CARGO_PKG_VERSION"));

    // Initialize STM32G474 peripherals with default clock configuration
    let config = embassy_stm32::Config::default();
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // SPI1 for the synthesizer, shared with the card reader
    // PB3 = SCK, PB5 = MOSI, PB4 = MISO
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(SPI_FREQUENCY_HZ);
    let spi = Spi::new_blocking(p.SPI1, p.PB3, p.PB5, p.PB4, spi_config);

    let amplifiers = AmplifierSelect::new(
        Output::new(p.PC0, Level::Low, Speed::Low),
        Output::new(p.PC1, Level::Low, Speed::Low),
    );
    let synth_port = SpiSynthPort::new(
        spi,
        Output::new(p.PA4, Level::High, Speed::VeryHigh),
        Output::new(p.PB0, Level::Low, Speed::VeryHigh),
        Output::new(p.PB1, Level::Low, Speed::Low),
        amplifiers,
    );

    info!("SPI1 initialized at {} Hz", SPI_FREQUENCY_HZ);

    // I2C1 for the clock chip
    // PB8 = SCL, PB9 = SDA for I2C1 on STM32G474
    let i2c = I2c::new_blocking(
        p.I2C1,
        p.PB8, // SCL
        p.PB9, // SDA
        Hertz(I2C_FREQUENCY_HZ),
        Default::default(),
    );
    let clock = Mcp79410::new(I2cRegisters::new(i2c, I2cAddress::MCP79410));

    info!("I2C1 initialized at {} Hz", I2C_FREQUENCY_HZ);

    // Clock chip alarm output on EXTI2
    let alarm = ExtiInput::new(p.PB2, p.EXTI2, Pull::Up);

    let beacon: &'static SharedBeacon = BEACON.init(Mutex::new(RefCell::new(Beacon::new(
        &BUS,
        synth_port,
        clock,
        StatusQueue::new(),
    ))));

    let mut led = StatusLed::new(Output::new(p.PA5, Level::Low, Speed::Low));
    let mut reader_cs = Output::new(p.PB6, Level::High, Speed::VeryHigh);

    // Configuration persistence lives outside this firmware core
    RELOAD.signal(Settings::new());

    unwrap!(spawner.spawn(morse_task(beacon)));
    unwrap!(spawner.spawn(envelope_task(beacon)));
    unwrap!(spawner.spawn(alarm_task(beacon, alarm)));

    info!("Tasks spawned, entering main loop");

    loop {
        match select(RELOAD.wait(), Timer::after(Duration::from_millis(READER_POLL_MS))).await {
            Either::First(settings) => {
                // Stop-the-world: no tick or alarm runs while the lock is held
                if let Err(err) = beacon.lock(|b| b.borrow_mut().reload(settings)) {
                    warn!("reload failed: {}", err);
                }
            }
            Either::Second(()) => poll_reader(beacon, &mut reader_cs),
        }

        let keying = beacon.lock(|b| b.borrow().is_keying());
        led.set(if keying { LedState::On } else { LedState::Off });

        while let Some(event) = beacon.lock(|b| b.borrow_mut().status_mut().pop()) {
            info!("status: {}", event);
        }
    }
}

/// One card reader polling cycle
///
/// The reader protocol is an external collaborator; this only claims the
/// bus around its transaction and hands it back on every path.
fn poll_reader(beacon: &'static SharedBeacon, reader_cs: &mut Output<'static>) {
    let Some(claim) = BUS.reader_try_claim() else {
        return;
    };
    reader_cs.set_low();
    reader_cs.set_high();
    if let Err(err) = beacon.lock(|b| b.borrow_mut().release_bus(claim)) {
        warn!("deferred synth action failed: {}", err);
    }
}

/// Morse engine tick
#[embassy_executor::task]
async fn morse_task(beacon: &'static SharedBeacon) {
    let clock = TickClock::MORSE;
    info!("Morse tick at {}", clock);
    let mut ticker = clock.ticker();
    loop {
        ticker.next().await;
        beacon.lock(|b| {
            b.borrow_mut().morse_tick();
        });
    }
}

/// Modulation envelope tick
#[embassy_executor::task]
async fn envelope_task(beacon: &'static SharedBeacon) {
    let clock = TickClock::ENVELOPE;
    info!("Envelope tick at {}", clock);
    let mut ticker = clock.ticker();
    loop {
        ticker.next().await;
        beacon.lock(|b| b.borrow_mut().envelope_tick());
    }
}

/// Clock alarm interrupt
///
/// MFP stays low while either alarm flag is set, so waiting on the level
/// services again any alarm left unacknowledged.
#[embassy_executor::task]
async fn alarm_task(beacon: &'static SharedBeacon, mut alarm: ExtiInput<'static>) {
    loop {
        alarm.wait_for_low().await;
        if let Err(err) = beacon.lock(|b| b.borrow_mut().on_clock_interrupt()) {
            warn!("clock alarm service failed: {}", err);
            Timer::after(Duration::from_millis(CLOCK_RETRY_MS)).await;
        }
    }
}
