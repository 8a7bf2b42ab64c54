//! Radio Control Logic
//!
//! State machines and business logic for beacon operation.
//! Implements the functional core of the transmitter.

pub mod beacon;
pub mod envelope;
pub mod morse;
pub mod schedule;
