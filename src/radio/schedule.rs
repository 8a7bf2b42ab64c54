//! Transmission Window Scheduler
//!
//! Two independent state machines decide when the beacon may key:
//!
//! - [`WindowScheduler`] tracks whether "now" is inside the event window,
//!   driven by clock alarm 0 with a coarse-to-fine mask cascade.
//! - [`SlotScheduler`] tracks whether the current minute is this fox's
//!   slot in the rotation, driven by clock alarm 1 once per boundary.
//!
//! The beacon ANDs the two. Only edges produce actions, so repeated
//! evaluation with an unchanged clock is harmless.

use crate::drivers::mcp79410::{Alarm, AlarmMask, Clock};
use crate::types::{DateTime, FoxMax, PortError, ScheduleWindow, TimeField};

/// Alarm that follows the event window
pub const WINDOW_ALARM: Alarm = Alarm::Zero;

/// Alarm that follows the per-minute slot
pub const SLOT_ALARM: Alarm = Alarm::One;

/// Window state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WindowState {
    /// Not evaluated since the last reload
    #[default]
    NotSet,
    /// Between start (inclusive) and stop (exclusive)
    InWindow,
    /// Before start or at/after stop
    OutOfWindow,
}

#[cfg(feature = "embedded")]
impl defmt::Format for WindowState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::NotSet => defmt::write!(f, "not set"),
            Self::InWindow => defmt::write!(f, "in window"),
            Self::OutOfWindow => defmt::write!(f, "out of window"),
        }
    }
}

/// Window edge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowTransition {
    /// Window opened
    Entered,
    /// Window closed (or found closed at the first evaluation)
    Left,
}

/// Event window state machine
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowScheduler {
    window: ScheduleWindow,
    state: WindowState,
}

impl WindowScheduler {
    /// Create for `window`, not yet evaluated
    #[must_use]
    pub const fn new(window: ScheduleWindow) -> Self {
        Self {
            window,
            state: WindowState::NotSet,
        }
    }

    /// Configured window
    #[must_use]
    pub const fn window(&self) -> ScheduleWindow {
        self.window
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> WindowState {
        self.state
    }

    /// Check if the last evaluation found "now" inside the window
    #[must_use]
    pub const fn in_window(&self) -> bool {
        matches!(self.state, WindowState::InWindow)
    }

    /// Next instant the window alarm must fire at
    #[must_use]
    pub const fn next_alarm(&self) -> DateTime {
        if self.in_window() {
            self.window.stop
        } else {
            self.window.start
        }
    }

    /// Classify `now` and report an edge, if any
    pub fn evaluate(&mut self, now: &DateTime) -> Option<WindowTransition> {
        let next = if self.window.contains(now) {
            WindowState::InWindow
        } else {
            WindowState::OutOfWindow
        };
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(match next {
            WindowState::InWindow => WindowTransition::Entered,
            _ => WindowTransition::Left,
        })
    }

    /// Service the window alarm
    ///
    /// The alarm is disabled for the duration. On an edge it is aimed at
    /// the next boundary with a date mask; otherwise its mask is refined
    /// one step. If reprogramming fails the edge is rolled back so the
    /// next evaluation sees it again, and the alarm keeps its old setting.
    pub fn service<C: Clock>(&mut self, clock: &mut C) -> Result<Option<WindowTransition>, PortError> {
        clock.set_alarm_enabled(WINDOW_ALARM, false)?;
        let result = self.reprogram(clock, true);
        clock.set_alarm_enabled(WINDOW_ALARM, true)?;
        result
    }

    /// Re-check the window without touching the mask cascade
    pub fn reconcile<C: Clock>(&mut self, clock: &mut C) -> Result<Option<WindowTransition>, PortError> {
        clock.set_alarm_enabled(WINDOW_ALARM, false)?;
        let result = self.reprogram(clock, false);
        clock.set_alarm_enabled(WINDOW_ALARM, true)?;
        result
    }

    fn reprogram<C: Clock>(&mut self, clock: &mut C, refine: bool) -> Result<Option<WindowTransition>, PortError> {
        let now = clock.now()?;
        let previous = self.state;
        let Some(transition) = self.evaluate(&now) else {
            if refine {
                let mask = clock.alarm_mask(WINDOW_ALARM)?.refine();
                clock.set_alarm_mask(WINDOW_ALARM, mask)?;
                debug!("window: alarm mask {}", mask);
            }
            return Ok(None);
        };

        let target = self.next_alarm();
        let armed = clock
            .set_alarm(WINDOW_ALARM, &target)
            .and_then(|()| clock.set_alarm_mask(WINDOW_ALARM, AlarmMask::Date));
        if let Err(err) = armed {
            self.state = previous;
            return Err(err);
        }
        debug!("window: next alarm {}", target);
        Ok(Some(transition))
    }
}

/// What a slot boundary asks of the transmitter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotAction {
    /// Slot began: power up and key
    StartKeying,
    /// Slot ended: stop keying and power down
    StopKeying,
    /// Alarm fired off a boundary; keying unchanged, alarm re-armed
    Rearm,
}

#[cfg(feature = "embedded")]
impl defmt::Format for SlotAction {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::StartKeying => defmt::write!(f, "start"),
            Self::StopKeying => defmt::write!(f, "stop"),
            Self::Rearm => defmt::write!(f, "rearm"),
        }
    }
}

/// Decision for one minute: the action and the minute to arm next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotPlan {
    /// Action for the current minute
    pub action: SlotAction,
    /// Minute the slot alarm fires at next
    pub alarm_minute: u8,
}

/// Per-minute rotation state machine
#[derive(Clone, Copy, Debug)]
pub struct SlotScheduler {
    fox_max: FoxMax,
    transmit_minute: u8,
    start_minute: u8,
    in_slot: bool,
}

impl SlotScheduler {
    /// Create for a rotation anchored at the window's start minute
    ///
    /// `transmit_minute` is expected below `fox_max`; the settings store
    /// enforces it.
    #[must_use]
    pub const fn new(fox_max: FoxMax, transmit_minute: u8, start_minute: u8) -> Self {
        Self {
            fox_max,
            transmit_minute,
            start_minute,
            in_slot: false,
        }
    }

    /// Check if the last boundary opened the slot
    #[must_use]
    pub const fn in_slot(&self) -> bool {
        self.in_slot
    }

    /// Check if `minute` begins this fox's slot
    #[must_use]
    pub fn is_on_minute(&self, minute: u8) -> bool {
        let offset = (i16::from(minute) - i16::from(self.start_minute)).rem_euclid(60);
        offset % i16::from(self.fox_max.get()) == i16::from(self.transmit_minute)
    }

    /// Check if `minute` ends this fox's slot
    #[must_use]
    pub fn is_off_minute(&self, minute: u8) -> bool {
        self.is_on_minute((minute % 60 + 59) % 60)
    }

    /// First on-minute strictly after `minute`
    #[must_use]
    pub fn next_on_minute(&self, minute: u8) -> u8 {
        (1..=60)
            .map(|step| (minute % 60 + step) % 60)
            .find(|&m| self.is_on_minute(m))
            .unwrap_or(minute % 60)
    }

    /// Decide what the boundary at `minute` means and what to arm next
    pub fn plan(&mut self, minute: u8) -> SlotPlan {
        let off_alarm = (minute % 60 + 1) % 60;
        if self.is_on_minute(minute) {
            self.in_slot = true;
            SlotPlan {
                action: SlotAction::StartKeying,
                alarm_minute: off_alarm,
            }
        } else if self.is_off_minute(minute) {
            self.in_slot = false;
            SlotPlan {
                action: SlotAction::StopKeying,
                alarm_minute: self.next_on_minute(minute),
            }
        } else {
            let alarm_minute = if self.in_slot {
                off_alarm
            } else {
                self.next_on_minute(minute)
            };
            SlotPlan {
                action: SlotAction::Rearm,
                alarm_minute,
            }
        }
    }
}

/// Point the slot alarm at `minute`
///
/// The chip only accepts the minute with every field masked, so the mask
/// is saved, opened up and restored around the write.
pub fn arm_slot_alarm<C: Clock>(clock: &mut C, minute: u8) -> Result<(), PortError> {
    let mask = clock.alarm_mask(SLOT_ALARM)?;
    clock.set_alarm_mask(SLOT_ALARM, AlarmMask::All)?;
    let written = clock.set_alarm_field(SLOT_ALARM, TimeField::Minute, minute);
    clock.set_alarm_mask(SLOT_ALARM, mask)?;
    written?;
    debug!("slot: next alarm at minute {}", minute);
    Ok(())
}
