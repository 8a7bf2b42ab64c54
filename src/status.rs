//! Status notifications
//!
//! The scheduler and Morse engine report state changes here. Consumers are
//! purely observational: a serial console, an LED task, a test recorder.

use heapless::Deque;

use crate::config::STATUS_QUEUE_DEPTH;
use crate::types::CarrierBand;

/// Observable beacon state change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    /// Configuration reloaded
    Reloaded,
    /// Event window opened
    WindowEntered,
    /// Event window closed
    WindowLeft,
    /// This fox's minute began
    SlotOn,
    /// This fox's minute ended
    SlotOff,
    /// Keying started (window and slot both open, or continuous carrier)
    KeyingStarted,
    /// Keying stopped
    KeyingStopped,
    /// Diagnostic continuous carrier switched on
    ContinuousCarrierOn(CarrierBand),
    /// Diagnostic continuous carrier switched off
    ContinuousCarrierOff,
}

impl StatusEvent {
    /// Human-readable description
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Reloaded => "configuration loaded",
            Self::WindowEntered => "window entered",
            Self::WindowLeft => "window left",
            Self::SlotOn => "slot on",
            Self::SlotOff => "slot off",
            Self::KeyingStarted => "keying started",
            Self::KeyingStopped => "keying stopped",
            Self::ContinuousCarrierOn(CarrierBand::Band2m) => "continuous carrier 2m on",
            Self::ContinuousCarrierOn(CarrierBand::Band80m) => "continuous carrier 80m on",
            Self::ContinuousCarrierOff => "continuous carrier off",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for StatusEvent {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.message());
    }
}

/// Receiver of status notifications
pub trait StatusSink {
    /// Deliver one event; must not block
    fn notify(&mut self, event: StatusEvent);
}

/// Bounded queue of events for a consumer task to drain
///
/// When full the oldest event is dropped.
#[derive(Debug, Default)]
pub struct StatusQueue {
    events: Deque<StatusEvent, STATUS_QUEUE_DEPTH>,
    dropped: u32,
}

impl StatusQueue {
    /// Create an empty queue
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Take the oldest event
    pub fn pop(&mut self) -> Option<StatusEvent> {
        self.events.pop_front()
    }

    /// Number of queued events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events lost to overflow since creation
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl StatusSink for StatusQueue {
    fn notify(&mut self, event: StatusEvent) {
        if self.events.is_full() {
            self.events.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Cannot fail: a slot was freed above
        let _ = self.events.push_back(event);
    }
}
