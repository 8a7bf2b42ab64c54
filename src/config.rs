//! System configuration and hardware constants
//!
//! Compile-time constants for the beacon hardware, and the typed settings
//! store every component is (re)initialised from.

use crate::types::{
    AmplitudePercent, CallSign, CrystalFrequency, DateTime, FoxMax, FoxNumber, Frequency,
    ScheduleWindow, TimeField, Wpm,
};

/// System clock frequency (STM32G474 @ 170MHz)
pub const SYSTEM_CLOCK_HZ: u32 = 170_000_000;

/// Morse engine tick rate (one tick every 5 ms)
pub const MORSE_TICK_HZ: u32 = 200;

/// Carrier mode re-asserts the key once per this many Morse ticks
pub const CARRIER_REASSERT_TICKS: u16 = 256;

/// Amplitude modulation tone frequency
pub const MODULATION_TONE_HZ: u32 = 600;

/// Samples per modulation tone period
pub const ENVELOPE_SAMPLES: usize = 10;

/// Envelope callback ticks per sample (reserve, hold, write)
pub const ENVELOPE_SUBTICKS: u8 = 6;

/// Envelope callback rate
pub const ENVELOPE_TICK_HZ: u32 = MODULATION_TONE_HZ * ENVELOPE_SAMPLES as u32 * ENVELOPE_SUBTICKS as u32;

/// SPI clock for the synthesizer (shared with the card reader)
pub const SPI_FREQUENCY_HZ: u32 = 8_000_000;

/// Synthesizer reference PLL multiplier
pub const SYNTH_PLL_MULTIPLIER: u32 = 16;

/// Full-scale amplitude scale factor (14 bits)
pub const SYNTH_ASF_MAX: u16 = 0x3FFF;

/// I2C bus frequency for the clock chip
pub const I2C_FREQUENCY_HZ: u32 = 400_000;

/// MCP79410 real-time clock I2C address (7-bit)
pub const RTC_I2C_ADDR: u8 = 0x6F;

/// Depth of the status notification queue
pub const STATUS_QUEUE_DEPTH: usize = 8;

/// Card reader polling interval in the foreground loop
pub const READER_POLL_MS: u64 = 50;

/// Pause before servicing a clock alarm again after a failed attempt
pub const CLOCK_RETRY_MS: u64 = 10;

/// Default output frequency (80m band)
pub const DEFAULT_FREQUENCY_HZ: u32 = 3_500_000;

/// Default synthesizer crystal frequency
pub const DEFAULT_CRYSTAL_HZ: u32 = 20_000_000;

/// Pin assignments for GPIO
pub mod pins {
    //! GPIO pin assignments matching the schematic

    /// Status LED (Nucleo user LED)
    pub const LED_STATUS: &str = "PA5";

    /// SPI1 SCK (synthesizer, card reader)
    pub const SPI1_SCK: &str = "PB3";

    /// SPI1 MISO (synthesizer, card reader)
    pub const SPI1_MISO: &str = "PB4";

    /// SPI1 MOSI (synthesizer, card reader)
    pub const SPI1_MOSI: &str = "PB5";

    /// Synthesizer chip select (active low)
    pub const SYNTH_CS: &str = "PA4";

    /// Synthesizer IO update strobe
    pub const SYNTH_IO_UPDATE: &str = "PB0";

    /// Synthesizer master reset
    pub const SYNTH_RESET: &str = "PB1";

    /// Card reader chip select (active low)
    pub const READER_CS: &str = "PB6";

    /// 2m power amplifier enable
    pub const PA_2M: &str = "PC0";

    /// 80m power amplifier enable
    pub const PA_80M: &str = "PC1";

    /// I2C1 SCL (clock chip)
    pub const I2C1_SCL: &str = "PB8";

    /// I2C1 SDA (clock chip)
    pub const I2C1_SDA: &str = "PB9";

    /// Clock chip alarm output (EXTI2, open drain, active low)
    pub const RTC_MFP: &str = "PB2";
}

/// Timer assignments
pub mod timers {
    //! Periodic callback rates
    //!
    //! Both callbacks run on the embassy time driver rather than dedicated
    //! hardware timers.

    /// Morse engine period in microseconds
    pub const MORSE_PERIOD_US: u64 = 1_000_000 / super::MORSE_TICK_HZ as u64;

    /// Envelope engine period in microseconds (rounded down)
    pub const ENVELOPE_PERIOD_US: u64 = 1_000_000 / super::ENVELOPE_TICK_HZ as u64;
}

/// Configuration rejected because a value is outside its domain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Value outside the field's valid range; the stored value is unchanged
    OutOfRange,
}

#[cfg(feature = "embedded")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::OutOfRange => defmt::write!(f, "out of range"),
        }
    }
}

/// Typed configuration store
///
/// Every setter validates its input and leaves the stored value untouched
/// on rejection. Persistence lives outside this crate; a `Settings` value is
/// handed to `Beacon::reload` whenever it changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    frequency: Frequency,
    crystal: CrystalFrequency,
    amplitude: AmplitudePercent,
    modulation: bool,
    morse_enabled: bool,
    wpm: Wpm,
    call_sign: CallSign,
    fox_number: FoxNumber,
    fox_max: FoxMax,
    transmit_minute: u8,
    window: ScheduleWindow,
}

impl Settings {
    /// Factory defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            frequency: Frequency::default(),
            crystal: CrystalFrequency::default(),
            amplitude: AmplitudePercent::default(),
            modulation: false,
            morse_enabled: true,
            wpm: Wpm::default(),
            call_sign: CallSign::default(),
            fox_number: FoxNumber::DEMO,
            fox_max: FoxMax::default(),
            transmit_minute: 0,
            window: ScheduleWindow::default(),
        }
    }

    /// Output frequency
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Set output frequency (2 MHz to 150 MHz)
    pub fn set_frequency_hz(&mut self, hz: u32) -> Result<(), ConfigError> {
        self.frequency = Frequency::from_hz(hz).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Synthesizer crystal calibration
    #[must_use]
    pub const fn crystal(&self) -> CrystalFrequency {
        self.crystal
    }

    /// Set synthesizer crystal calibration (10 MHz to 30 MHz)
    pub fn set_crystal_hz(&mut self, hz: u32) -> Result<(), ConfigError> {
        self.crystal = CrystalFrequency::from_hz(hz).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Output amplitude
    #[must_use]
    pub const fn amplitude(&self) -> AmplitudePercent {
        self.amplitude
    }

    /// Set output amplitude (0 to 100 percent)
    pub fn set_amplitude_percent(&mut self, percent: u8) -> Result<(), ConfigError> {
        self.amplitude = AmplitudePercent::new(percent).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Amplitude modulation enabled
    #[must_use]
    pub const fn modulation(&self) -> bool {
        self.modulation
    }

    /// Enable or disable amplitude modulation
    pub fn set_modulation(&mut self, enabled: bool) {
        self.modulation = enabled;
    }

    /// Morse keying enabled (disabled means plain carrier during slots)
    #[must_use]
    pub const fn morse_enabled(&self) -> bool {
        self.morse_enabled
    }

    /// Enable or disable Morse keying
    pub fn set_morse_enabled(&mut self, enabled: bool) {
        self.morse_enabled = enabled;
    }

    /// Morse speed
    #[must_use]
    pub const fn wpm(&self) -> Wpm {
        self.wpm
    }

    /// Set Morse speed (5 to 60 wpm)
    pub fn set_wpm(&mut self, wpm: u8) -> Result<(), ConfigError> {
        self.wpm = Wpm::new(wpm).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Call sign keyed by the Morse engine
    #[must_use]
    pub const fn call_sign(&self) -> CallSign {
        self.call_sign
    }

    /// Select call sign by identifier (0 to 5)
    pub fn set_call_sign_id(&mut self, id: u8) -> Result<(), ConfigError> {
        self.call_sign = CallSign::from_id(id).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Fox number
    #[must_use]
    pub const fn fox_number(&self) -> FoxNumber {
        self.fox_number
    }

    /// Set fox number (0 is the demonstration unit)
    pub fn set_fox_number(&mut self, number: u8) -> Result<(), ConfigError> {
        self.fox_number = FoxNumber::new(number).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Number of foxes in rotation
    #[must_use]
    pub const fn fox_max(&self) -> FoxMax {
        self.fox_max
    }

    /// Set number of foxes in rotation (1 to 5)
    ///
    /// A transmit minute that no longer fits the rotation falls back to 0.
    pub fn set_fox_max(&mut self, max: u8) -> Result<(), ConfigError> {
        self.fox_max = FoxMax::new(max).ok_or(ConfigError::OutOfRange)?;
        if self.transmit_minute >= max {
            self.transmit_minute = 0;
        }
        Ok(())
    }

    /// Minute within the rotation this fox transmits in
    #[must_use]
    pub const fn transmit_minute(&self) -> u8 {
        self.transmit_minute
    }

    /// Set transmit minute (0 to fox max minus one)
    pub fn set_transmit_minute(&mut self, minute: u8) -> Result<(), ConfigError> {
        if minute >= self.fox_max.get() {
            return Err(ConfigError::OutOfRange);
        }
        self.transmit_minute = minute;
        Ok(())
    }

    /// Event window
    #[must_use]
    pub const fn window(&self) -> ScheduleWindow {
        self.window
    }

    /// Replace the whole event window
    pub fn set_window(&mut self, window: ScheduleWindow) {
        self.window = window;
    }

    /// Set one field of the window start
    pub fn set_start_field(&mut self, field: TimeField, value: u8) -> Result<(), ConfigError> {
        self.window.start = self.window.start.with(field, value).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Set one field of the window stop
    pub fn set_stop_field(&mut self, field: TimeField, value: u8) -> Result<(), ConfigError> {
        self.window.stop = self.window.stop.with(field, value).ok_or(ConfigError::OutOfRange)?;
        Ok(())
    }

    /// Start instant of the window
    #[must_use]
    pub const fn start(&self) -> DateTime {
        self.window.start
    }

    /// Stop instant of the window
    #[must_use]
    pub const fn stop(&self) -> DateTime {
        self.window.stop
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Settings {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Frequency: {}, Crystal: {}, Amplitude: {}, Modulation: {}, Morse: {}, Speed: {}, Call sign: {}, Fox: {}/{}, Transmit minute: {}, Start: {}, Stop: {}",
            self.frequency,
            self.crystal,
            self.amplitude,
            self.modulation,
            self.morse_enabled,
            self.wpm,
            self.call_sign,
            self.fox_number,
            self.fox_max.get(),
            self.transmit_minute,
            self.window.start,
            self.window.stop
        );
    }
}

/// Build the default output frequency
#[must_use]
pub const fn default_frequency() -> Option<Frequency> {
    Frequency::from_hz(DEFAULT_FREQUENCY_HZ)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_rate_is_tone_times_samples_times_subticks() {
        assert_eq!(ENVELOPE_TICK_HZ, 36_000);
    }

    #[test]
    fn rejected_setter_keeps_previous_value() {
        let mut settings = Settings::new();
        settings.set_wpm(20).unwrap();
        assert_eq!(settings.set_wpm(61), Err(ConfigError::OutOfRange));
        assert_eq!(settings.wpm().get(), 20);
    }

    #[test]
    fn shrinking_fox_max_resets_transmit_minute() {
        let mut settings = Settings::new();
        settings.set_fox_max(5).unwrap();
        settings.set_transmit_minute(4).unwrap();
        settings.set_fox_max(3).unwrap();
        assert_eq!(settings.transmit_minute(), 0);
    }
}
