//! I2C Bus Abstractions
//!
//! Blocking register access for the clock chip. The beacon services clock
//! alarms inside a critical section, so the async driver cannot be used
//! there; embassy-stm32's blocking mode implements the `embedded-hal` I2C
//! trait this adapter is generic over.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::drivers::mcp79410::RegisterIo;
use crate::types::PortError;

/// I2C device address wrapper
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct I2cAddress(u8);

impl I2cAddress {
    /// `MCP79410` real-time clock address
    pub const MCP79410: Self = Self(crate::config::RTC_I2C_ADDR);

    /// Create from 7-bit address
    #[must_use]
    pub const fn new(addr: u8) -> Self {
        Self(addr & 0x7F)
    }

    /// Get the 7-bit address
    #[must_use]
    pub const fn addr(self) -> u8 {
        self.0
    }
}

impl defmt::Format for I2cAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "0x{:02X}", self.0);
    }
}

fn map_error(kind: ErrorKind) -> PortError {
    match kind {
        ErrorKind::NoAcknowledge(_) => PortError::Nack,
        ErrorKind::Bus | ErrorKind::ArbitrationLoss | ErrorKind::Overrun => PortError::Bus,
        _ => PortError::Timeout,
    }
}

/// Register-addressed device on an I2C bus
pub struct I2cRegisters<I: I2c> {
    i2c: I,
    addr: I2cAddress,
}

impl<I: I2c> I2cRegisters<I> {
    /// Create for the device at `addr`
    #[must_use]
    pub const fn new(i2c: I, addr: I2cAddress) -> Self {
        Self { i2c, addr }
    }

    /// Device address
    #[must_use]
    pub const fn address(&self) -> I2cAddress {
        self.addr
    }
}

impl<I: I2c> RegisterIo for I2cRegisters<I> {
    fn read_reg(&mut self, reg: u8) -> Result<u8, PortError> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.addr.addr(), &[reg], &mut buf)
            .map_err(|err| map_error(err.kind()))?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), PortError> {
        self.i2c
            .write(self.addr.addr(), &[reg, value])
            .map_err(|err| map_error(err.kind()))
    }
}
