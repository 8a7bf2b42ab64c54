//! Hardware Abstraction Layer
//!
//! Binds the chip drivers' port traits to STM32G474 peripherals.
//! Everything above this layer is hardware independent.

pub mod gpio;
pub mod i2c;
pub mod spi;
pub mod timer;
