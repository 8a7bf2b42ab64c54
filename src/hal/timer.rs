//! Timer Abstractions
//!
//! Periodic tick sources for the Morse and envelope engines, built on the
//! embassy time driver.

use embassy_time::{Duration, Ticker};

/// Fixed-rate tick source
#[derive(Clone, Copy, Debug)]
pub struct TickClock {
    /// Period between ticks in microseconds
    period_us: u64,
}

impl TickClock {
    /// Morse engine tick
    pub const MORSE: Self = Self::from_period_us(crate::config::timers::MORSE_PERIOD_US);

    /// Envelope engine tick
    pub const ENVELOPE: Self = Self::from_period_us(crate::config::timers::ENVELOPE_PERIOD_US);

    /// Create from a period in microseconds (zero is treated as one)
    #[must_use]
    pub const fn from_period_us(period_us: u64) -> Self {
        Self {
            period_us: if period_us == 0 { 1 } else { period_us },
        }
    }

    /// Create from a rate in Hz
    #[must_use]
    pub const fn from_rate(rate_hz: u32) -> Self {
        let rate = if rate_hz == 0 { 1 } else { rate_hz as u64 };
        Self::from_period_us(1_000_000 / rate)
    }

    /// Rate in Hz (rounded down)
    #[must_use]
    pub const fn rate_hz(&self) -> u64 {
        1_000_000 / self.period_us
    }

    /// Period duration
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }

    /// Start a ticker at this rate
    #[must_use]
    pub fn ticker(&self) -> Ticker {
        Ticker::every(self.period())
    }
}

impl defmt::Format for TickClock {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "TickClock({}Hz)", self.rate_hz());
    }
}
