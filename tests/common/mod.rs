//! In-memory stand-ins for the synthesizer and clock chips
//!
//! Shared by the integration tests. Not every test binary uses every
//! helper.

#![allow(dead_code)]

use std::ops::RangeInclusive;

use ardf_firmware::drivers::ad9859::SynthPort;
use ardf_firmware::drivers::mcp79410::{Alarm, Mcp79410, RegisterIo};
use ardf_firmware::status::{StatusEvent, StatusSink};
use ardf_firmware::types::{CarrierBand, PortError};

pub const REG_CFR1: u8 = 0x00;
pub const REG_CFR2: u8 = 0x01;
pub const REG_ASF: u8 = 0x02;
pub const REG_FTW0: u8 = 0x04;

/// Synthesizer port that records every transaction
#[derive(Debug, Default)]
pub struct FakeSynth {
    /// Register writes in order
    pub writes: Vec<(u8, Vec<u8>)>,
    /// CFR1 contents as last written
    pub cfr1: [u8; 4],
    pub io_updates: usize,
    pub resets: usize,
    /// Last amplifier selection
    pub amplifier: Option<CarrierBand>,
    /// Fail every register write with this error
    pub fail: Option<PortError>,
}

impl FakeSynth {
    /// Bytes of the last write to `reg`
    pub fn last_write(&self, reg: u8) -> Option<&[u8]> {
        self.writes
            .iter()
            .rev()
            .find(|(r, _)| *r == reg)
            .map(|(_, data)| data.as_slice())
    }

    /// Number of writes to `reg`
    pub fn writes_to(&self, reg: u8) -> usize {
        self.writes.iter().filter(|(r, _)| *r == reg).count()
    }

    /// Last amplitude scale factor written
    pub fn asf(&self) -> Option<u16> {
        self.last_write(REG_ASF)
            .map(|data| u16::from_be_bytes([data[0], data[1]]))
    }

    /// Last frequency tuning word written
    pub fn ftw(&self) -> Option<u32> {
        self.last_write(REG_FTW0)
            .map(|data| u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }
}

impl SynthPort for FakeSynth {
    fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<(), PortError> {
        if let Some(err) = self.fail {
            return Err(err);
        }
        if reg == REG_CFR1 {
            self.cfr1.copy_from_slice(data);
        }
        self.writes.push((reg, data.to_vec()));
        Ok(())
    }

    fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), PortError> {
        if reg == REG_CFR1 {
            buf.copy_from_slice(&self.cfr1[..buf.len()]);
        } else {
            buf.fill(0);
        }
        Ok(())
    }

    fn io_update(&mut self) -> Result<(), PortError> {
        self.io_updates += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), PortError> {
        self.resets += 1;
        self.cfr1 = [0; 4];
        Ok(())
    }

    fn select_amplifier(&mut self, band: Option<CarrierBand>) -> Result<(), PortError> {
        self.amplifier = band;
        Ok(())
    }
}

/// Clock chip register file
#[derive(Debug)]
pub struct FakeRtc {
    pub regs: [u8; 0x20],
    /// Fail every read
    pub fail_reads: bool,
    /// Fail writes to these registers
    pub fail_writes: Option<RangeInclusive<u8>>,
}

impl Default for FakeRtc {
    fn default() -> Self {
        Self {
            regs: [0; 0x20],
            fail_reads: false,
            fail_writes: None,
        }
    }
}

impl RegisterIo for FakeRtc {
    fn read_reg(&mut self, reg: u8) -> Result<u8, PortError> {
        if self.fail_reads {
            return Err(PortError::Nack);
        }
        Ok(self.regs[usize::from(reg)])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), PortError> {
        if self.fail_writes.as_ref().is_some_and(|range| range.contains(&reg)) {
            return Err(PortError::Nack);
        }
        self.regs[usize::from(reg)] = value;
        Ok(())
    }
}

pub type FakeClock = Mcp79410<FakeRtc>;

/// Alarm 0 register block base
pub const ALM0: usize = 0x0A;

/// Alarm 1 register block base
pub const ALM1: usize = 0x11;

/// Offset of the weekday / flag / mask register within an alarm block
pub const WKDAY: usize = 3;

/// Set an alarm's interrupt flag as if it had matched
pub fn raise_alarm(clock: &mut FakeClock, alarm: Alarm) {
    let base = match alarm {
        Alarm::Zero => ALM0,
        Alarm::One => ALM1,
    };
    clock.io_mut().regs[base + WKDAY] |= 0x08;
}

/// Status sink that keeps every event
#[derive(Debug, Default)]
pub struct StatusLog {
    pub events: Vec<StatusEvent>,
}

impl StatusLog {
    pub fn count(&self, event: StatusEvent) -> usize {
        self.events.iter().filter(|&&e| e == event).count()
    }
}

impl StatusSink for StatusLog {
    fn notify(&mut self, event: StatusEvent) {
        self.events.push(event);
    }
}
