//! `MCP79410` Real-Time Clock Driver
//!
//! Battery-backed calendar clock with two alarms routed to one interrupt
//! pin. Alarm 0 follows the event window, alarm 1 the per-minute slot.
//!
//! All calendar registers are BCD. Several of them share their byte with
//! control bits (oscillator start, 12/24 hour select, alarm mask, leap
//! year), so every field write is a read-modify-write that only touches
//! the value bits.

use crate::types::{DateTime, PortError, TimeField};

/// `MCP79410` register addresses
mod reg {
    /// First timekeeping register (seconds)
    pub const RTCSEC: u8 = 0x00;
    pub const RTCHOUR: u8 = 0x02;
    pub const RTCWKDAY: u8 = 0x03;
    pub const CONTROL: u8 = 0x07;
    /// First alarm 0 register (seconds)
    pub const ALM0SEC: u8 = 0x0A;
    /// First alarm 1 register (seconds)
    pub const ALM1SEC: u8 = 0x11;
}

/// Register bit positions
mod bits {
    /// RTCSEC: oscillator start
    pub const ST: u8 = 1 << 7;
    /// RTCHOUR: 12 hour mode
    pub const HOUR_12: u8 = 1 << 6;
    /// RTCWKDAY: battery backup enable
    pub const VBATEN: u8 = 1 << 3;
    /// CONTROL: alarm 0 enable
    pub const ALM0EN: u8 = 1 << 4;
    /// CONTROL: alarm 1 enable
    pub const ALM1EN: u8 = 1 << 5;
    /// ALMxWKDAY: interrupt flag
    pub const ALMIF: u8 = 1 << 3;
    /// ALMxWKDAY: mask field shift
    pub const MSK_SHIFT: u8 = 4;
    /// ALMxWKDAY: mask field
    pub const MSK: u8 = 0b111 << MSK_SHIFT;
}

/// Single-register access to the clock chip
pub trait RegisterIo {
    /// Read one register
    fn read_reg(&mut self, reg: u8) -> Result<u8, PortError>;

    /// Write one register
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), PortError>;
}

/// Which of the two alarms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alarm {
    /// Alarm 0
    Zero,
    /// Alarm 1
    One,
}

impl Alarm {
    const fn base(self) -> u8 {
        match self {
            Self::Zero => reg::ALM0SEC,
            Self::One => reg::ALM1SEC,
        }
    }

    const fn enable_bit(self) -> u8 {
        match self {
            Self::Zero => bits::ALM0EN,
            Self::One => bits::ALM1EN,
        }
    }

    const fn weekday_reg(self) -> u8 {
        self.base() + field_offset(TimeField::Weekday)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Alarm {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Zero => defmt::write!(f, "alarm0"),
            Self::One => defmt::write!(f, "alarm1"),
        }
    }
}

/// Alarm match condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmMask {
    /// Seconds match
    Seconds,
    /// Minutes match
    Minutes,
    /// Hours match
    Hours,
    /// Day of week matches
    Weekday,
    /// Date matches
    Date,
    /// Seconds, minutes, hour, day of week, date and month all match
    All,
}

impl AlarmMask {
    /// Raw 3-bit mask value
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Seconds => 0b000,
            Self::Minutes => 0b001,
            Self::Hours => 0b010,
            Self::Weekday => 0b011,
            Self::Date => 0b100,
            Self::All => 0b111,
        }
    }

    /// Decode a raw 3-bit mask value (reserved codes read as `All`)
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::Seconds,
            0b001 => Self::Minutes,
            0b010 => Self::Hours,
            0b011 => Self::Weekday,
            0b100 => Self::Date,
            _ => Self::All,
        }
    }

    /// Next, finer match step of the window alarm cascade
    ///
    /// Date, hours, minutes, seconds, then back to date.
    #[must_use]
    pub const fn refine(self) -> Self {
        match self {
            Self::Date => Self::Hours,
            Self::Hours => Self::Minutes,
            Self::Minutes => Self::Seconds,
            _ => Self::Date,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for AlarmMask {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Seconds => defmt::write!(f, "seconds"),
            Self::Minutes => defmt::write!(f, "minutes"),
            Self::Hours => defmt::write!(f, "hours"),
            Self::Weekday => defmt::write!(f, "weekday"),
            Self::Date => defmt::write!(f, "date"),
            Self::All => defmt::write!(f, "all"),
        }
    }
}

/// Calendar clock with two maskable alarms
///
/// Values passed in are calendar-range-checked by the caller.
pub trait Clock {
    /// Start the oscillator and enable both alarms
    fn init(&mut self) -> Result<(), PortError>;

    /// Read one timekeeping field
    fn field(&mut self, field: TimeField) -> Result<u8, PortError>;

    /// Write one timekeeping field
    fn set_field(&mut self, field: TimeField, value: u8) -> Result<(), PortError>;

    /// Write one alarm field (alarms have no year; a year write is ignored)
    fn set_alarm_field(&mut self, alarm: Alarm, field: TimeField, value: u8) -> Result<(), PortError>;

    /// Read an alarm's match condition
    fn alarm_mask(&mut self, alarm: Alarm) -> Result<AlarmMask, PortError>;

    /// Set an alarm's match condition
    fn set_alarm_mask(&mut self, alarm: Alarm, mask: AlarmMask) -> Result<(), PortError>;

    /// Check whether an alarm has fired
    fn alarm_flag(&mut self, alarm: Alarm) -> Result<bool, PortError>;

    /// Acknowledge a fired alarm
    fn clear_alarm_flag(&mut self, alarm: Alarm) -> Result<(), PortError>;

    /// Enable or disable an alarm's interrupt output
    fn set_alarm_enabled(&mut self, alarm: Alarm, enabled: bool) -> Result<(), PortError>;

    /// Read the full date and time
    ///
    /// A field holding an out-of-range value reads as that field's minimum.
    fn now(&mut self) -> Result<DateTime, PortError> {
        let mut now = DateTime::EPOCH;
        for field in TimeField::ALL {
            let value = self.field(field)?;
            now = match now.with(field, value) {
                Some(next) => next,
                None => {
                    warn!("rtc: {} reads {}, clamped", field, value);
                    now.with(field, field.min()).unwrap_or(now)
                }
            };
        }
        Ok(now)
    }

    /// Write the full date and time
    fn set_time(&mut self, time: &DateTime) -> Result<(), PortError> {
        for field in TimeField::ALL {
            self.set_field(field, time.get(field))?;
        }
        Ok(())
    }

    /// Program every alarm field from `time` (year excluded)
    fn set_alarm(&mut self, alarm: Alarm, time: &DateTime) -> Result<(), PortError> {
        for field in TimeField::ALL {
            if field != TimeField::Year {
                self.set_alarm_field(alarm, field, time.get(field))?;
            }
        }
        Ok(())
    }
}

/// Register offset of a field from the block base
const fn field_offset(field: TimeField) -> u8 {
    match field {
        TimeField::Second => 0,
        TimeField::Minute => 1,
        TimeField::Hour => 2,
        TimeField::Weekday => 3,
        TimeField::Date => 4,
        TimeField::Month => 5,
        TimeField::Year => 6,
    }
}

/// Bits of a register that hold the field value; the rest are flags
const fn value_bits(field: TimeField) -> u8 {
    match field {
        TimeField::Second | TimeField::Minute => 0x7F,
        TimeField::Hour | TimeField::Date => 0x3F,
        TimeField::Weekday => 0x07,
        TimeField::Month => 0x1F,
        TimeField::Year => 0xFF,
    }
}

/// Binary to packed BCD
#[must_use]
pub const fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Packed BCD to binary
#[must_use]
pub const fn from_bcd(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// `MCP79410` driver
pub struct Mcp79410<R: RegisterIo> {
    io: R,
}

impl<R: RegisterIo> Mcp79410<R> {
    /// Wrap a register interface
    #[must_use]
    pub const fn new(io: R) -> Self {
        Self { io }
    }

    /// Borrow the register interface
    #[must_use]
    pub const fn io(&self) -> &R {
        &self.io
    }

    /// Mutably borrow the register interface
    pub fn io_mut(&mut self) -> &mut R {
        &mut self.io
    }

    /// Give back the register interface
    pub fn release(self) -> R {
        self.io
    }

    fn modify_reg(&mut self, reg: u8, keep: u8, set: u8) -> Result<(), PortError> {
        let old = self.io.read_reg(reg)?;
        self.io.write_reg(reg, (old & keep) | set)
    }

    fn write_field_at(&mut self, reg: u8, field: TimeField, value: u8) -> Result<(), PortError> {
        let mask = value_bits(field);
        self.modify_reg(reg, !mask, to_bcd(value) & mask)
    }
}

impl<R: RegisterIo> Clock for Mcp79410<R> {
    fn init(&mut self) -> Result<(), PortError> {
        self.modify_reg(reg::RTCSEC, !bits::ST, bits::ST)?;
        self.modify_reg(reg::RTCHOUR, !bits::HOUR_12, 0)?;
        self.modify_reg(reg::RTCWKDAY, !bits::VBATEN, bits::VBATEN)?;
        self.clear_alarm_flag(Alarm::Zero)?;
        self.clear_alarm_flag(Alarm::One)?;
        self.modify_reg(reg::CONTROL, 0xFF, bits::ALM0EN | bits::ALM1EN)?;
        debug!("rtc: oscillator running, alarms enabled");
        Ok(())
    }

    fn field(&mut self, field: TimeField) -> Result<u8, PortError> {
        let raw = self.io.read_reg(reg::RTCSEC + field_offset(field))?;
        Ok(from_bcd(raw & value_bits(field)))
    }

    fn set_field(&mut self, field: TimeField, value: u8) -> Result<(), PortError> {
        self.write_field_at(reg::RTCSEC + field_offset(field), field, value)
    }

    fn set_alarm_field(&mut self, alarm: Alarm, field: TimeField, value: u8) -> Result<(), PortError> {
        if field == TimeField::Year {
            return Ok(());
        }
        self.write_field_at(alarm.base() + field_offset(field), field, value)
    }

    fn alarm_mask(&mut self, alarm: Alarm) -> Result<AlarmMask, PortError> {
        let raw = self.io.read_reg(alarm.weekday_reg())?;
        Ok(AlarmMask::from_bits((raw & bits::MSK) >> bits::MSK_SHIFT))
    }

    fn set_alarm_mask(&mut self, alarm: Alarm, mask: AlarmMask) -> Result<(), PortError> {
        self.modify_reg(alarm.weekday_reg(), !bits::MSK, mask.bits() << bits::MSK_SHIFT)
    }

    fn alarm_flag(&mut self, alarm: Alarm) -> Result<bool, PortError> {
        let raw = self.io.read_reg(alarm.weekday_reg())?;
        Ok(raw & bits::ALMIF != 0)
    }

    fn clear_alarm_flag(&mut self, alarm: Alarm) -> Result<(), PortError> {
        self.modify_reg(alarm.weekday_reg(), !bits::ALMIF, 0)
    }

    fn set_alarm_enabled(&mut self, alarm: Alarm, enabled: bool) -> Result<(), PortError> {
        let bit = alarm.enable_bit();
        self.modify_reg(reg::CONTROL, !bit, if enabled { bit } else { 0 })
    }
}
