//! ARDF Beacon Firmware Library
//!
//! This library provides the real-time control core of an STM32G474-based
//! fox-hunting (amateur radio direction finding) beacon. The transmitter
//! keys a DDS-generated carrier in Morse, only inside a configured event
//! window and only during this fox's minute of the rotation, while sharing
//! one SPI bus with a proximity-card reader.
//!
//! # Architecture
//!
//! The firmware is organized in layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION LAYER                         │
//! │  Beacon (reload, ticks, clock interrupt, bus release)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    REAL-TIME ENGINES                         │
//! │  Morse Timing  │  Modulation Envelope  │  Window / Slot       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   DRIVER / ARBITRATION                       │
//! │  AD9859 DDS  │  MCP79410 RTC  │  Bus Arbiter                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   HAL (embedded only)                        │
//! │  SPI  │  I2C  │  GPIO  │  Tickers                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    RTOS / SCHEDULER                          │
//! │           embassy-rs (async/await executor)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Never wait in tick context**: a busy bus defers or skips, it never spins
//! - **Type-driven design**: Custom types enforce invariants at compile time
//! - **No unsafe in application code**: All unsafe isolated in HAL/FFI layers
//! - **Functional core, imperative shell**: engines return commands, the beacon applies them
//! - **Explicit error handling**: All fallible operations return `Result`

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

/// Hardware Abstraction Layer
///
/// SPI, I2C and GPIO adapters for the driver port traits.
#[cfg(feature = "embedded")]
pub mod hal;

/// Peripheral Drivers
///
/// Register-level drivers for the AD9859 synthesizer and MCP79410 clock.
pub mod drivers;

/// Shared bus arbitration
///
/// Claim flag and deferred action for the synthesizer / card-reader bus.
pub mod bus;

/// Radio Control Logic
///
/// Morse and envelope engines, window and slot scheduling, and the beacon
/// that ties them together.
pub mod radio;

/// Status notifications
pub mod status;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
#[cfg(feature = "embedded")]
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::types::*;

    pub use crate::bus::BusArbiter;
    pub use crate::radio::beacon::Beacon;
    pub use crate::status::{StatusEvent, StatusSink};

    // Common traits
    pub use embedded_hal::digital::OutputPin;

    // Embassy
    pub use embassy_time::{Duration, Instant, Ticker, Timer};

    // Error handling
    pub use core::result::Result;

    // Logging
    pub use defmt::{debug, error, info, trace, warn};
}
