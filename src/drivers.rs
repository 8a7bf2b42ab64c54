//! Peripheral Drivers
//!
//! Register-level drivers for the external chips. Both are generic over a
//! small port trait so they run unchanged against the target HAL adapters
//! and the in-memory fakes used by the host tests.

pub mod ad9859;
pub mod mcp79410;
