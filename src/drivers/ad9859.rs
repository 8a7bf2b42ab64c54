//! `AD9859` Direct Digital Synthesizer Driver
//!
//! Generates the beacon carrier. Frequency is set through a 32-bit tuning
//! word, on/off keying and amplitude modulation through the 14-bit
//! amplitude scale factor (output shaped keying).
//!
//! The chip shares its SPI bus with the card reader, so every transaction
//! is gated by the [`BusArbiter`]. Denied key changes are parked in the
//! arbiter's deferred slot; denied tuning and power changes are remembered
//! here. [`Ad9859::drain_deferred`] replays both once the reader lets go.

use crate::bus::{BusArbiter, DeferredAction};
use crate::config::{SYNTH_ASF_MAX, SYNTH_PLL_MULTIPLIER};
use crate::types::{AmplitudePercent, CarrierBand, CrystalFrequency, Frequency, PortError};

/// `AD9859` register addresses
mod reg {
    pub const CFR1: u8 = 0x00;
    pub const CFR2: u8 = 0x01;
    pub const ASF: u8 = 0x02;
    pub const FTW0: u8 = 0x04;
}

/// Register bit positions
mod bits {
    /// CFR1 byte 0: output shaped keying enable
    pub const OSK_ENABLE: u8 = 1 << 1;
    /// CFR1 byte 2: SDIO is input only (3-wire SPI)
    pub const SDIO_INPUT_ONLY: u8 = 1 << 1;
    /// CFR1 byte 3: digital, DAC and clock-input power down
    pub const POWER_DOWN: u8 = (1 << 7) | (1 << 5) | (1 << 4);
    /// CFR2 byte 1: crystal oscillator output active
    pub const CRYSTAL_OUT_ACTIVE: u8 = 1 << 1;
    /// CFR2 byte 2: PLL multiplier field shift
    pub const PLL_MULTIPLIER_SHIFT: u8 = 3;
}

/// Low-level access to the synthesizer pins and serial port
///
/// Implementations perform exactly one transaction per call and never
/// wait on the bus arbiter; the driver checks the arbiter first.
pub trait SynthPort {
    /// Write `data` to register `reg` (MSB first)
    fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<(), PortError>;

    /// Read `buf.len()` bytes from register `reg`
    fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), PortError>;

    /// Pulse IO_UPDATE so buffered register writes take effect
    fn io_update(&mut self) -> Result<(), PortError>;

    /// Pulse the master reset line
    fn reset(&mut self) -> Result<(), PortError>;

    /// Switch the power amplifiers (`None` turns both off)
    fn select_amplifier(&mut self, band: Option<CarrierBand>) -> Result<(), PortError>;
}

/// Result of a gated synthesizer operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Transaction ran and took effect
    Applied,
    /// Bus was held by the reader; the request will be replayed on release
    Deferred,
}

#[cfg(feature = "embedded")]
impl defmt::Format for KeyOutcome {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Applied => defmt::write!(f, "applied"),
            Self::Deferred => defmt::write!(f, "deferred"),
        }
    }
}

/// Synthesizer configuration or communication failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynthError {
    /// Requested value outside its valid range; nothing was changed
    InvalidRange,
    /// Chip transaction failed
    Port(PortError),
}

impl From<PortError> for SynthError {
    fn from(err: PortError) -> Self {
        Self::Port(err)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SynthError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidRange => defmt::write!(f, "invalid range"),
            Self::Port(err) => defmt::write!(f, "port {}", err),
        }
    }
}

/// Transmitter state owned by the synthesizer driver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TransmitterState {
    /// Carrier is keyed on
    pub keyed: bool,
    /// Amplitude modulation envelope is active while keyed
    pub modulation_enabled: bool,
    /// Diagnostic continuous carrier band, if active
    pub continuous: Option<CarrierBand>,
}

#[cfg(feature = "embedded")]
impl defmt::Format for TransmitterState {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "keyed={} modulation={} continuous={}",
            self.keyed,
            self.modulation_enabled,
            self.continuous
        );
    }
}

/// Register writes refused by the arbiter and still owed to the chip
#[derive(Clone, Copy, Debug, Default)]
struct Pending {
    tuning: bool,
    power: Option<bool>,
}

/// `AD9859` driver
pub struct Ad9859<'a, P: SynthPort> {
    port: P,
    bus: &'a BusArbiter,
    state: TransmitterState,
    frequency: Frequency,
    crystal: CrystalFrequency,
    amplitude: AmplitudePercent,
    powered: bool,
    pending: Pending,
}

impl<'a, P: SynthPort> Ad9859<'a, P> {
    /// Create a new driver (chip not yet initialised)
    #[must_use]
    pub fn new(port: P, bus: &'a BusArbiter) -> Self {
        Self {
            port,
            bus,
            state: TransmitterState::default(),
            frequency: Frequency::default(),
            crystal: CrystalFrequency::default(),
            amplitude: AmplitudePercent::default(),
            powered: true,
            pending: Pending::default(),
        }
    }

    /// Reset and configure the chip, leaving the carrier keyed off
    ///
    /// Runs during a configuration reload, when no callback or reader
    /// transaction can be active.
    pub fn init(&mut self) -> Result<(), PortError> {
        self.port.reset()?;

        let cfr1 = [bits::OSK_ENABLE, 0x00, bits::SDIO_INPUT_ONLY, 0x00];
        self.port.write_register(reg::CFR1, &cfr1)?;
        self.port.io_update()?;

        let multiplier = (SYNTH_PLL_MULTIPLIER as u8) << bits::PLL_MULTIPLIER_SHIFT;
        let cfr2 = [0x00, bits::CRYSTAL_OUT_ACTIVE, multiplier];
        self.port.write_register(reg::CFR2, &cfr2)?;
        self.port.io_update()?;

        self.state = TransmitterState::default();
        self.pending = Pending::default();
        self.powered = true;
        self.write_asf(0)?;
        Ok(())
    }

    /// Load a new configuration and push the tuning word
    ///
    /// Leaves continuous-carrier mode and keys the carrier off.
    pub fn configure(
        &mut self,
        frequency: Frequency,
        crystal: CrystalFrequency,
        amplitude: AmplitudePercent,
        modulation: bool,
    ) -> Result<KeyOutcome, PortError> {
        self.state.continuous = None;
        self.state.modulation_enabled = modulation;
        self.frequency = frequency;
        self.crystal = crystal;
        self.amplitude = amplitude;
        self.key_off()?;
        self.sync_tuning()
    }

    /// Current transmitter state
    #[must_use]
    pub const fn state(&self) -> TransmitterState {
        self.state
    }

    /// Check if the carrier is keyed on
    #[must_use]
    pub const fn is_keyed(&self) -> bool {
        self.state.keyed
    }

    /// Check if the chip and amplifier are powered
    #[must_use]
    pub const fn is_powered(&self) -> bool {
        self.powered
    }

    /// Configured output frequency
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Configured output amplitude
    #[must_use]
    pub const fn amplitude(&self) -> AmplitudePercent {
        self.amplitude
    }

    /// Frequency actually transmitted (test frequency in continuous mode)
    #[must_use]
    pub const fn active_frequency(&self) -> Frequency {
        match self.state.continuous {
            Some(band) => band.test_frequency(),
            None => self.frequency,
        }
    }

    /// Band whose amplifier is in use
    #[must_use]
    pub const fn active_band(&self) -> CarrierBand {
        match self.state.continuous {
            Some(band) => band,
            None => self.frequency.band(),
        }
    }

    /// Amplitude scale factor written while keyed
    ///
    /// Configured percentage of the active band's amplitude cap.
    #[must_use]
    pub fn amplitude_word(&self) -> u16 {
        let (percent, cap) = match self.state.continuous {
            Some(band) => (100, band.amplitude_cap_percent()),
            None => (self.amplitude.as_percent(), self.frequency.band().amplitude_cap_percent()),
        };
        let word = u32::from(percent) * u32::from(cap) * u32::from(SYNTH_ASF_MAX) / 10_000;
        u16::try_from(word).unwrap_or(SYNTH_ASF_MAX)
    }

    /// Frequency tuning word for `frequency` at the calibrated crystal
    #[must_use]
    pub fn tuning_word(&self, frequency: Frequency) -> u32 {
        let sysclk = u64::from(self.crystal.as_hz()) * u64::from(SYNTH_PLL_MULTIPLIER);
        let ftw = (u64::from(frequency.as_hz()) << 32) / sysclk;
        u32::try_from(ftw).unwrap_or(u32::MAX)
    }

    /// Set output frequency in Hz (2 MHz to 150 MHz)
    pub fn set_frequency(&mut self, hz: u32) -> Result<KeyOutcome, SynthError> {
        let frequency = Frequency::from_hz(hz).ok_or(SynthError::InvalidRange)?;
        self.frequency = frequency;
        if self.powered && self.state.continuous.is_none() {
            self.port.select_amplifier(Some(frequency.band()))?;
        }
        Ok(self.sync_tuning()?)
    }

    /// Set crystal calibration in Hz (10 MHz to 30 MHz)
    pub fn set_crystal(&mut self, hz: u32) -> Result<KeyOutcome, SynthError> {
        self.crystal = CrystalFrequency::from_hz(hz).ok_or(SynthError::InvalidRange)?;
        Ok(self.sync_tuning()?)
    }

    /// Set output amplitude in percent (0 to 100)
    ///
    /// While keyed the new level is applied like a fresh key-on, so a busy
    /// bus defers it.
    pub fn set_amplitude_percent(&mut self, percent: u8) -> Result<KeyOutcome, SynthError> {
        self.amplitude = AmplitudePercent::new(percent).ok_or(SynthError::InvalidRange)?;
        if self.state.keyed {
            Ok(self.key_on()?)
        } else {
            Ok(KeyOutcome::Applied)
        }
    }

    /// Enable or disable the amplitude modulation envelope
    pub fn set_modulation(&mut self, enabled: bool) {
        self.state.modulation_enabled = enabled;
    }

    /// Key the carrier on
    ///
    /// A busy bus leaves `keyed` unchanged and registers a deferred
    /// [`DeferredAction::TurnOn`].
    pub fn key_on(&mut self) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            self.bus.set_deferred(DeferredAction::TurnOn);
            debug!("synth: key on deferred");
            return Ok(KeyOutcome::Deferred);
        }
        self.write_asf(self.amplitude_word())?;
        self.state.keyed = true;
        self.bus.set_deferred(DeferredAction::None);
        Ok(KeyOutcome::Applied)
    }

    /// Key the carrier off and let the reader back onto the bus
    ///
    /// A busy bus leaves `keyed` unchanged and registers a deferred
    /// [`DeferredAction::TurnOff`].
    pub fn key_off(&mut self) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            self.bus.set_deferred(DeferredAction::TurnOff);
            debug!("synth: key off deferred");
            return Ok(KeyOutcome::Deferred);
        }
        self.write_asf(0)?;
        self.state.keyed = false;
        self.bus.set_deferred(DeferredAction::None);
        self.bus.yield_to_reader();
        Ok(KeyOutcome::Applied)
    }

    /// Write one envelope sample straight to the amplitude register
    ///
    /// Sample values come from a table validated at load time. Writes zero
    /// when not keyed. A busy bus skips the write; nothing is deferred.
    pub fn write_envelope_sample(&mut self, sample: u16) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            return Ok(KeyOutcome::Deferred);
        }
        let word = if self.state.keyed { sample & SYNTH_ASF_MAX } else { 0 };
        self.write_asf(word)?;
        Ok(KeyOutcome::Applied)
    }

    /// Put the chip into power-down and switch the amplifiers off
    ///
    /// The carrier is keyed off first.
    pub fn power_down(&mut self) -> Result<KeyOutcome, PortError> {
        if self.key_off()? == KeyOutcome::Deferred {
            self.pending.power = Some(false);
            return Ok(KeyOutcome::Deferred);
        }
        self.sync_power(false)
    }

    /// Wake the chip and switch on the amplifier for the active band
    pub fn power_up(&mut self) -> Result<KeyOutcome, PortError> {
        self.sync_power(true)
    }

    /// Transmit an unmodulated carrier on `band`'s test frequency
    ///
    /// Overrides scheduling until [`Self::disable_continuous_carrier`].
    /// The carrier is keyed off across the band change, so a busy bus
    /// returns [`KeyOutcome::Deferred`] with nothing changed and nothing
    /// queued; the caller asks again.
    pub fn enable_continuous_carrier(&mut self, band: CarrierBand) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            debug!("synth: band change refused, bus busy");
            return Ok(KeyOutcome::Deferred);
        }
        self.key_off()?;
        self.state.continuous = Some(band);
        self.power_up()?;
        self.sync_tuning()?;
        info!("synth: continuous carrier on {}", band);
        self.key_on()
    }

    /// Leave continuous-carrier mode, power down and restore the configured tuning
    ///
    /// Refused like [`Self::enable_continuous_carrier`] while the bus is busy.
    pub fn disable_continuous_carrier(&mut self) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            debug!("synth: band change refused, bus busy");
            return Ok(KeyOutcome::Deferred);
        }
        self.key_off()?;
        self.state.continuous = None;
        self.power_down()?;
        info!("synth: continuous carrier off");
        self.sync_tuning()
    }

    /// Replay whatever the reader's bus claim held up
    ///
    /// Called right after the reader releases the bus. Owed power and
    /// tuning writes go first, then the deferred key action. If the bus is
    /// already busy again everything stays owed.
    pub fn drain_deferred(&mut self) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            return Ok(KeyOutcome::Deferred);
        }
        if let Some(up) = self.pending.power {
            self.sync_power(up)?;
        }
        if self.pending.tuning {
            self.sync_tuning()?;
        }
        match self.bus.take_deferred() {
            DeferredAction::None => Ok(KeyOutcome::Applied),
            DeferredAction::TurnOn => {
                debug!("synth: replaying key on");
                self.key_on()
            }
            DeferredAction::TurnOff => {
                debug!("synth: replaying key off");
                self.key_off()
            }
        }
    }

    /// Borrow the underlying port
    #[must_use]
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the underlying port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    fn write_asf(&mut self, word: u16) -> Result<(), PortError> {
        self.port.write_register(reg::ASF, &word.to_be_bytes())?;
        self.port.io_update()
    }

    fn sync_tuning(&mut self) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            self.pending.tuning = true;
            return Ok(KeyOutcome::Deferred);
        }
        let ftw = self.tuning_word(self.active_frequency());
        self.port.write_register(reg::FTW0, &ftw.to_be_bytes())?;
        self.port.io_update()?;
        self.pending.tuning = false;
        Ok(KeyOutcome::Applied)
    }

    fn sync_power(&mut self, up: bool) -> Result<KeyOutcome, PortError> {
        if !self.bus.try_claim() {
            self.pending.power = Some(up);
            return Ok(KeyOutcome::Deferred);
        }
        let mut cfr1 = [0u8; 4];
        self.port.read_register(reg::CFR1, &mut cfr1)?;
        if up {
            cfr1[3] &= !bits::POWER_DOWN;
        } else {
            cfr1[3] |= bits::POWER_DOWN;
        }
        self.port.write_register(reg::CFR1, &cfr1)?;
        self.port.io_update()?;
        let amplifier = if up { Some(self.active_band()) } else { None };
        self.port.select_amplifier(amplifier)?;
        self.powered = up;
        self.pending.power = None;
        Ok(KeyOutcome::Applied)
    }
}
