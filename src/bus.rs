//! Shared SPI bus arbitration
//!
//! The synthesizer and the card reader sit on one SPI bus and must never be
//! driven at the same time. The reader claims the bus for the length of one
//! polling transaction; synthesizer transactions check the claim and, when
//! denied, leave behind a single deferred action that is replayed as soon as
//! the reader releases the bus.
//!
//! All state is held in atomics so the arbiter can be shared between the
//! foreground loop and the periodic callbacks without locking. Nothing here
//! ever waits.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Postponed synthesizer action, replayed when the bus frees
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeferredAction {
    /// Nothing pending
    #[default]
    None,
    /// Key the carrier on
    TurnOn,
    /// Key the carrier off
    TurnOff,
}

impl DeferredAction {
    const fn to_raw(self) -> u8 {
        match self {
            Self::None => 0,
            Self::TurnOn => 1,
            Self::TurnOff => 2,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::TurnOn,
            2 => Self::TurnOff,
            _ => Self::None,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for DeferredAction {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::None => defmt::write!(f, "none"),
            Self::TurnOn => defmt::write!(f, "on"),
            Self::TurnOff => defmt::write!(f, "off"),
        }
    }
}

/// Arbiter for the shared synthesizer / card-reader bus
#[derive(Debug)]
pub struct BusArbiter {
    /// Reader is inside a transaction
    claimed_by_reader: AtomicBool,
    /// Reader may start a new transaction (closed while an envelope write is due)
    reader_gate: AtomicBool,
    /// Single-slot deferred action
    deferred: AtomicU8,
    /// Reader let go of the bus and deferred work has not been replayed yet
    replay_due: AtomicBool,
}

impl BusArbiter {
    /// Create an idle arbiter (bus free, reader allowed)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            claimed_by_reader: AtomicBool::new(false),
            reader_gate: AtomicBool::new(true),
            deferred: AtomicU8::new(0),
            replay_due: AtomicBool::new(false),
        }
    }

    /// Check whether the synthesizer may use the bus right now
    ///
    /// Returns immediately. A `false` result means "skip this cycle": callers
    /// in callback context must not retry in a loop.
    #[must_use]
    pub fn try_claim(&self) -> bool {
        !self.claimed_by_reader.load(Ordering::Acquire)
    }

    /// Check whether the reader currently holds the bus
    #[must_use]
    pub fn is_claimed_by_reader(&self) -> bool {
        self.claimed_by_reader.load(Ordering::Acquire)
    }

    /// Store the pending action, replacing any earlier one
    pub fn set_deferred(&self, action: DeferredAction) {
        self.deferred.store(action.to_raw(), Ordering::Release);
    }

    /// Peek at the pending action without clearing it
    #[must_use]
    pub fn deferred(&self) -> DeferredAction {
        DeferredAction::from_raw(self.deferred.load(Ordering::Acquire))
    }

    /// Remove and return the pending action
    pub fn take_deferred(&self) -> DeferredAction {
        DeferredAction::from_raw(self.deferred.swap(0, Ordering::AcqRel))
    }

    /// Keep the reader from starting a transaction (envelope write is due)
    pub fn reserve_for_synth(&self) {
        self.reader_gate.store(false, Ordering::Release);
    }

    /// Let the reader start transactions again
    pub fn yield_to_reader(&self) {
        self.reader_gate.store(true, Ordering::Release);
    }

    /// Check whether the reader is currently allowed to start
    #[must_use]
    pub fn reader_may_start(&self) -> bool {
        self.reader_gate.load(Ordering::Acquire)
    }

    /// Check and clear the replay owed by the last reader release
    pub fn take_replay_due(&self) -> bool {
        self.replay_due.swap(false, Ordering::AcqRel)
    }

    /// Claim the bus for one reader transaction
    ///
    /// Returns `None` without waiting if the gate is closed or a claim is
    /// already held. The claim is released when the returned guard is
    /// released or dropped; either way a replay of deferred work becomes
    /// due.
    pub fn reader_try_claim(&self) -> Option<ReaderClaim<'_>> {
        if !self.reader_may_start() {
            return None;
        }
        self.claimed_by_reader
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReaderClaim { arbiter: self })
    }

    fn release_reader(&self) {
        self.claimed_by_reader.store(false, Ordering::Release);
        self.replay_due.store(true, Ordering::Release);
    }
}

impl Default for BusArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader's hold on the bus
///
/// Dropping the guard releases the bus on every exit path, including early
/// returns on reader failures, and marks a replay due. The replay runs in
/// [`crate::radio::beacon::Beacon::release_bus`] or, for a dropped claim, on
/// the next Morse tick.
#[derive(Debug)]
#[must_use = "dropping the claim releases the bus immediately"]
pub struct ReaderClaim<'a> {
    arbiter: &'a BusArbiter,
}

impl ReaderClaim<'_> {
    /// Release the bus
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ReaderClaim<'_> {
    fn drop(&mut self) {
        self.arbiter.release_reader();
    }
}
