//! SPI Synthesizer Port
//!
//! Blocking register access to the `AD9859` over the SPI bus it shares with
//! the card reader. Transactions are a few bytes long and run from tick
//! context, so they are issued synchronously; the arbiter check happens in
//! the driver before any of these are called.

use embassy_stm32::gpio::Output;
use embedded_hal::spi::{Error as _, ErrorKind, SpiBus};

use super::gpio::AmplifierSelect;
use crate::drivers::ad9859::SynthPort;
use crate::types::{CarrierBand, PortError};

/// Read flag in the instruction byte
const READ: u8 = 0x80;

/// Core cycles the reset line is held (well over the chip's minimum)
const RESET_PULSE_CYCLES: u32 = 1_000;

/// Longest register (CFR1, FTW0) plus instruction byte
const MAX_FRAME: usize = 5;

fn map_error(kind: ErrorKind) -> PortError {
    match kind {
        ErrorKind::Overrun | ErrorKind::ModeFault | ErrorKind::FrameFormat => PortError::Bus,
        _ => PortError::Timeout,
    }
}

/// `AD9859` pins and bus
pub struct SpiSynthPort<'d, B: SpiBus> {
    spi: B,
    cs: Output<'d>,
    io_update: Output<'d>,
    reset: Output<'d>,
    amplifiers: AmplifierSelect<'d>,
}

impl<'d, B: SpiBus> SpiSynthPort<'d, B> {
    /// Create from the bus and control pins (chip deselected, reset released)
    #[must_use]
    pub fn new(
        spi: B,
        mut cs: Output<'d>,
        mut io_update: Output<'d>,
        mut reset: Output<'d>,
        amplifiers: AmplifierSelect<'d>,
    ) -> Self {
        cs.set_high();
        io_update.set_low();
        reset.set_low();
        Self {
            spi,
            cs,
            io_update,
            reset,
            amplifiers,
        }
    }

    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), PortError> {
        self.cs.set_low();
        let result = self
            .spi
            .transfer_in_place(frame)
            .and_then(|()| self.spi.flush());
        self.cs.set_high();
        result.map_err(|err| map_error(err.kind()))
    }
}

impl<B: SpiBus> SynthPort for SpiSynthPort<'_, B> {
    fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<(), PortError> {
        let len = data.len() + 1;
        if len > MAX_FRAME {
            return Err(PortError::Bus);
        }
        let mut frame = [0u8; MAX_FRAME];
        frame[0] = reg & !READ;
        frame[1..len].copy_from_slice(data);
        self.transfer(&mut frame[..len])
    }

    fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), PortError> {
        let len = buf.len() + 1;
        if len > MAX_FRAME {
            return Err(PortError::Bus);
        }
        let mut frame = [0u8; MAX_FRAME];
        frame[0] = reg | READ;
        self.transfer(&mut frame[..len])?;
        buf.copy_from_slice(&frame[1..len]);
        Ok(())
    }

    fn io_update(&mut self) -> Result<(), PortError> {
        self.io_update.set_high();
        self.io_update.set_low();
        Ok(())
    }

    fn reset(&mut self) -> Result<(), PortError> {
        self.reset.set_high();
        cortex_m::asm::delay(RESET_PULSE_CYCLES);
        self.reset.set_low();
        Ok(())
    }

    fn select_amplifier(&mut self, band: Option<CarrierBand>) -> Result<(), PortError> {
        self.amplifiers.select(band);
        Ok(())
    }
}
