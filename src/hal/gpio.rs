//! GPIO Abstractions
//!
//! Type-safe wrappers for the beacon's discrete outputs.

use embassy_stm32::gpio::Output;

use crate::types::CarrierBand;

/// Status LED state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LedState {
    /// LED is off
    #[default]
    Off,
    /// LED is on
    On,
}

impl defmt::Format for LedState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Off => defmt::write!(f, "OFF"),
            Self::On => defmt::write!(f, "ON"),
        }
    }
}

/// Status LED, lit while the keying gate is open
pub struct StatusLed<'d> {
    pin: Output<'d>,
}

impl<'d> StatusLed<'d> {
    /// Create a new status LED (initially off)
    #[must_use]
    pub fn new(mut pin: Output<'d>) -> Self {
        pin.set_low();
        Self { pin }
    }

    /// Drive the LED to `state`
    pub fn set(&mut self, state: LedState) {
        match state {
            LedState::On => self.pin.set_high(),
            LedState::Off => self.pin.set_low(),
        }
    }
}

/// Power amplifier enables, at most one band on at a time
pub struct AmplifierSelect<'d> {
    pa_2m: Output<'d>,
    pa_80m: Output<'d>,
    current: Option<CarrierBand>,
}

impl<'d> AmplifierSelect<'d> {
    /// Create with both amplifiers off
    #[must_use]
    pub fn new(pa_2m: Output<'d>, pa_80m: Output<'d>) -> Self {
        let mut select = Self {
            pa_2m,
            pa_80m,
            current: Some(CarrierBand::Band2m),
        };
        select.select(None);
        select
    }

    /// Enable the amplifier for `band`, or none
    ///
    /// The other amplifier is always switched off first.
    pub fn select(&mut self, band: Option<CarrierBand>) {
        match band {
            Some(CarrierBand::Band2m) => {
                self.pa_80m.set_low();
                self.pa_2m.set_high();
            }
            Some(CarrierBand::Band80m) => {
                self.pa_2m.set_low();
                self.pa_80m.set_high();
            }
            None => {
                self.pa_2m.set_low();
                self.pa_80m.set_low();
            }
        }
        self.current = band;
    }

    /// Currently enabled amplifier
    #[must_use]
    pub const fn current(&self) -> Option<CarrierBand> {
        self.current
    }
}
