//! Shared types used across the beacon firmware
//!
//! Domain-specific types that enforce their valid ranges at construction
//! so the real-time paths never re-validate configuration.

use core::cmp::Ordering;
use core::fmt;

/// Peripheral transaction failure
///
/// Raised by the synthesizer and clock ports. Never fatal: the caller keeps
/// its previous state and the next periodic tick retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortError {
    /// Device did not acknowledge
    Nack,
    /// Transaction did not complete in time
    Timeout,
    /// Any other bus fault (arbitration loss, overrun, pin error)
    Bus,
}

#[cfg(feature = "embedded")]
impl defmt::Format for PortError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Nack => defmt::write!(f, "NACK"),
            Self::Timeout => defmt::write!(f, "TIMEOUT"),
            Self::Bus => defmt::write!(f, "BUS"),
        }
    }
}

/// Output frequency in Hertz with validation
///
/// Covers both beacon bands: 80m direct synthesis and the 2m band
/// reached through the synthesizer's upper range.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency(u32);

impl Frequency {
    /// Minimum supported frequency (2 MHz)
    pub const MIN_HZ: u32 = 2_000_000;

    /// Maximum supported frequency (150 MHz)
    pub const MAX_HZ: u32 = 150_000_000;

    /// Frequencies above this use the 2m amplifier
    pub const BAND_SPLIT_HZ: u32 = 4_000_000;

    /// Create a new Frequency from Hz, returns None if out of range
    #[must_use]
    pub const fn from_hz(hz: u32) -> Option<Self> {
        if hz >= Self::MIN_HZ && hz <= Self::MAX_HZ {
            Some(Self(hz))
        } else {
            None
        }
    }

    /// Create a new Frequency from kHz
    #[must_use]
    pub const fn from_khz(khz: u32) -> Option<Self> {
        match khz.checked_mul(1000) {
            Some(hz) => Self::from_hz(hz),
            None => None,
        }
    }

    /// Get the frequency in Hz
    #[must_use]
    pub const fn as_hz(self) -> u32 {
        self.0
    }

    /// Get the frequency in kHz (truncated)
    #[must_use]
    pub const fn as_khz(self) -> u32 {
        self.0 / 1000
    }

    /// Band whose power amplifier serves this frequency
    #[must_use]
    pub const fn band(self) -> CarrierBand {
        if self.0 > Self::BAND_SPLIT_HZ {
            CarrierBand::Band2m
        } else {
            CarrierBand::Band80m
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self(3_500_000)
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({} Hz)", self.0)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Frequency {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} Hz", self.0);
    }
}

/// Synthesizer reference crystal frequency (calibration value)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CrystalFrequency(u32);

impl CrystalFrequency {
    /// Minimum crystal frequency (10 MHz)
    pub const MIN_HZ: u32 = 10_000_000;

    /// Maximum crystal frequency (30 MHz)
    pub const MAX_HZ: u32 = 30_000_000;

    /// Create from Hz, returns None if out of range
    #[must_use]
    pub const fn from_hz(hz: u32) -> Option<Self> {
        if hz >= Self::MIN_HZ && hz <= Self::MAX_HZ {
            Some(Self(hz))
        } else {
            None
        }
    }

    /// Get the frequency in Hz
    #[must_use]
    pub const fn as_hz(self) -> u32 {
        self.0
    }
}

impl Default for CrystalFrequency {
    fn default() -> Self {
        Self(20_000_000)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for CrystalFrequency {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} Hz", self.0);
    }
}

/// Output amplitude as a percentage of the band's cap
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmplitudePercent(u8);

impl AmplitudePercent {
    /// Full amplitude
    pub const MAX: Self = Self(100);

    /// Create from a percentage, returns None above 100
    #[must_use]
    pub const fn new(percent: u8) -> Option<Self> {
        if percent <= 100 {
            Some(Self(percent))
        } else {
            None
        }
    }

    /// Get the percentage
    #[must_use]
    pub const fn as_percent(self) -> u8 {
        self.0
    }
}

impl Default for AmplitudePercent {
    fn default() -> Self {
        Self::MAX
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for AmplitudePercent {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}%", self.0);
    }
}

/// Transmit band, selects the power amplifier and amplitude cap
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarrierBand {
    /// 2 meter band (144 MHz)
    Band2m,
    /// 80 meter band (3.5 MHz)
    Band80m,
}

impl CarrierBand {
    /// Fixed continuous-carrier test frequency for this band
    #[must_use]
    pub const fn test_frequency(self) -> Frequency {
        match self {
            Self::Band2m => Frequency(144_700_000),
            Self::Band80m => Frequency(3_500_000),
        }
    }

    /// Maximum amplitude for this band's amplifier, in percent of full scale
    #[must_use]
    pub const fn amplitude_cap_percent(self) -> u8 {
        match self {
            Self::Band2m => 100,
            Self::Band80m => 80,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for CarrierBand {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Band2m => defmt::write!(f, "2m"),
            Self::Band80m => defmt::write!(f, "80m"),
        }
    }
}

/// Morse speed in words per minute
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wpm(u8);

impl Wpm {
    /// Minimum speed
    pub const MIN: u8 = 5;

    /// Maximum speed
    pub const MAX: u8 = 60;

    /// Default speed
    pub const DEFAULT: Self = Self(10);

    /// Create from words per minute, returns None outside 5..=60
    #[must_use]
    pub const fn new(wpm: u8) -> Option<Self> {
        if wpm >= Self::MIN && wpm <= Self::MAX {
            Some(Self(wpm))
        } else {
            None
        }
    }

    /// Get words per minute
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Length of one dot at this speed
    #[must_use]
    pub const fn unit(self) -> MorseUnit {
        MorseUnit(MorseUnit::BASE / self.0 as u16)
    }
}

impl Default for Wpm {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Wpm {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} wpm", self.0);
    }
}

/// Length of one Morse dot, in Morse engine ticks
///
/// At the 200 Hz tick rate a 1 wpm dot lasts 240 ticks (1.2 s).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MorseUnit(u16);

impl MorseUnit {
    /// Ticks per dot at 1 wpm
    pub const BASE: u16 = 240;

    /// Create from a raw tick count, returns None for zero
    #[must_use]
    pub const fn from_ticks(ticks: u16) -> Option<Self> {
        if ticks == 0 {
            None
        } else {
            Some(Self(ticks))
        }
    }

    /// Get the tick count
    #[must_use]
    pub const fn ticks(self) -> u16 {
        self.0
    }

    /// Speed that produces this unit (integer division)
    #[must_use]
    pub const fn wpm(self) -> u16 {
        Self::BASE / self.0
    }
}

impl Default for MorseUnit {
    fn default() -> Self {
        Wpm::DEFAULT.unit()
    }
}

/// Selectable beacon call sign
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CallSign {
    /// "MOE"
    #[default]
    Moe,
    /// "MOI"
    Moi,
    /// "MOS"
    Mos,
    /// "MOH"
    Moh,
    /// "MO5"
    Mo5,
    /// "MO"
    Mo,
}

impl CallSign {
    /// Highest valid identifier
    pub const MAX_ID: u8 = 5;

    /// Look up by stored identifier
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Moe),
            1 => Some(Self::Moi),
            2 => Some(Self::Mos),
            3 => Some(Self::Moh),
            4 => Some(Self::Mo5),
            5 => Some(Self::Mo),
            _ => None,
        }
    }

    /// Stored identifier
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Moe => 0,
            Self::Moi => 1,
            Self::Mos => 2,
            Self::Moh => 3,
            Self::Mo5 => 4,
            Self::Mo => 5,
        }
    }

    /// Text keyed by the beacon
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::Moe => "MOE",
            Self::Moi => "MOI",
            Self::Mos => "MOS",
            Self::Moh => "MOH",
            Self::Mo5 => "MO5",
            Self::Mo => "MO",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for CallSign {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.text());
    }
}

/// Fox identifier within an event (0 is the demonstration unit)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FoxNumber(u8);

impl FoxNumber {
    /// Demonstration unit, exempt from slot gating
    pub const DEMO: Self = Self(0);

    /// Highest fox number
    pub const MAX: u8 = 5;

    /// Create, returns None above 5
    #[must_use]
    pub const fn new(number: u8) -> Option<Self> {
        if number <= Self::MAX {
            Some(Self(number))
        } else {
            None
        }
    }

    /// Get the number
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Check if this is the demonstration unit
    #[must_use]
    pub const fn is_demo(self) -> bool {
        self.0 == 0
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FoxNumber {
    fn format(&self, f: defmt::Formatter) {
        if self.is_demo() {
            defmt::write!(f, "demo");
        } else {
            defmt::write!(f, "{}", self.0);
        }
    }
}

/// Number of foxes sharing the hour in rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FoxMax(u8);

impl FoxMax {
    /// Smallest rotation (a single fox, always on)
    pub const MIN: u8 = 1;

    /// Largest rotation
    pub const MAX: u8 = 5;

    /// Create, returns None outside 1..=5
    #[must_use]
    pub const fn new(max: u8) -> Option<Self> {
        if max >= Self::MIN && max <= Self::MAX {
            Some(Self(max))
        } else {
            None
        }
    }

    /// Get the rotation length
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for FoxMax {
    fn default() -> Self {
        Self(1)
    }
}

/// A calendar field of the real-time clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeField {
    /// Seconds (0-59)
    Second,
    /// Minutes (0-59)
    Minute,
    /// Hours, 24h (0-23)
    Hour,
    /// Day of week (1-7)
    Weekday,
    /// Day of month (1-31)
    Date,
    /// Month (1-12)
    Month,
    /// Year within the century (0-99)
    Year,
}

impl TimeField {
    /// All fields in register order
    pub const ALL: [Self; 7] = [
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Weekday,
        Self::Date,
        Self::Month,
        Self::Year,
    ];

    /// Smallest valid value
    #[must_use]
    pub const fn min(self) -> u8 {
        match self {
            Self::Weekday | Self::Date | Self::Month => 1,
            _ => 0,
        }
    }

    /// Largest valid value
    #[must_use]
    pub const fn max(self) -> u8 {
        match self {
            Self::Second | Self::Minute => 59,
            Self::Hour => 23,
            Self::Weekday => 7,
            Self::Date => 31,
            Self::Month => 12,
            Self::Year => 99,
        }
    }

    /// Check a value against this field's calendar range
    #[must_use]
    pub const fn is_valid(self, value: u8) -> bool {
        value >= self.min() && value <= self.max()
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TimeField {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Second => defmt::write!(f, "second"),
            Self::Minute => defmt::write!(f, "minute"),
            Self::Hour => defmt::write!(f, "hour"),
            Self::Weekday => defmt::write!(f, "weekday"),
            Self::Date => defmt::write!(f, "date"),
            Self::Month => defmt::write!(f, "month"),
            Self::Year => defmt::write!(f, "year"),
        }
    }
}

/// Calendar date and time, every field range-checked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTime {
    second: u8,
    minute: u8,
    hour: u8,
    weekday: u8,
    date: u8,
    month: u8,
    year: u8,
}

impl DateTime {
    /// 2000-01-01 00:00:00, a Saturday
    pub const EPOCH: Self = Self {
        second: 0,
        minute: 0,
        hour: 0,
        weekday: 7,
        date: 1,
        month: 1,
        year: 0,
    };

    /// Build from year, month, date, hour, minute, second with weekday 1
    #[must_use]
    pub fn new(year: u8, month: u8, date: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        Self::EPOCH
            .with(TimeField::Year, year)?
            .with(TimeField::Month, month)?
            .with(TimeField::Date, date)?
            .with(TimeField::Hour, hour)?
            .with(TimeField::Minute, minute)?
            .with(TimeField::Second, second)?
            .with(TimeField::Weekday, 1)
    }

    /// Get one field
    #[must_use]
    pub const fn get(&self, field: TimeField) -> u8 {
        match field {
            TimeField::Second => self.second,
            TimeField::Minute => self.minute,
            TimeField::Hour => self.hour,
            TimeField::Weekday => self.weekday,
            TimeField::Date => self.date,
            TimeField::Month => self.month,
            TimeField::Year => self.year,
        }
    }

    /// Copy with one field replaced, returns None if the value is out of range
    #[must_use]
    pub const fn with(mut self, field: TimeField, value: u8) -> Option<Self> {
        if !field.is_valid(value) {
            return None;
        }
        match field {
            TimeField::Second => self.second = value,
            TimeField::Minute => self.minute = value,
            TimeField::Hour => self.hour = value,
            TimeField::Weekday => self.weekday = value,
            TimeField::Date => self.date = value,
            TimeField::Month => self.month = value,
            TimeField::Year => self.year = value,
        }
        Some(self)
    }

    /// Minute of the hour
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    /// Chronological comparison, year down to second. Weekday is ignored.
    #[must_use]
    pub fn chrono_cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }

    const fn key(&self) -> (u8, u8, u8, u8, u8, u8) {
        (self.year, self.month, self.date, self.hour, self.minute, self.second)
    }
}

impl Default for DateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for DateTime {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "20{}-{}-{} {}:{}:{}",
            self.year,
            self.month,
            self.date,
            self.hour,
            self.minute,
            self.second
        );
    }
}

/// Event window: transmission is permitted from `start` up to, not including, `stop`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ScheduleWindow {
    /// First instant inside the window
    pub start: DateTime,
    /// First instant after the window
    pub stop: DateTime,
}

impl ScheduleWindow {
    /// Create a window
    #[must_use]
    pub const fn new(start: DateTime, stop: DateTime) -> Self {
        Self { start, stop }
    }

    /// Check whether `now` lies inside the window
    #[must_use]
    pub fn contains(&self, now: &DateTime) -> bool {
        now.chrono_cmp(&self.start) != Ordering::Less
            && now.chrono_cmp(&self.stop) == Ordering::Less
    }
}
