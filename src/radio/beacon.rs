//! Beacon composition root
//!
//! Owns every real-time component and wires them together:
//!
//! ```text
//! clock alarm ──► WindowScheduler ─┐
//!            └──► SlotScheduler ───┼─► keying gate ─► MorseEngine ─► Ad9859 ─► BusArbiter
//!                                  │                  EnvelopeEngine ─┘
//! continuous carrier ──────────────┘
//! ```
//!
//! Each entry point corresponds to one execution context: the two periodic
//! ticks, the clock interrupt, the reader's bus release and the foreground
//! reload. None of them waits on the bus.

use crate::bus::{BusArbiter, ReaderClaim};
use crate::config::Settings;
use crate::drivers::ad9859::{Ad9859, KeyOutcome, SynthPort};
use crate::drivers::mcp79410::{AlarmMask, Clock};
use crate::radio::envelope::{EnvelopeEngine, EnvelopeStep, EnvelopeTable};
use crate::radio::morse::{CallSignProgram, KeyCommand, MorseEngine};
use crate::radio::schedule::{
    arm_slot_alarm, SlotAction, SlotScheduler, WindowScheduler, WindowState, WindowTransition,
    SLOT_ALARM, WINDOW_ALARM,
};
use crate::status::{StatusEvent, StatusSink};
use crate::types::{CarrierBand, PortError, TimeField};

/// ARDF beacon
pub struct Beacon<'a, P: SynthPort, C: Clock, S: StatusSink> {
    bus: &'a BusArbiter,
    settings: Settings,
    synth: Ad9859<'a, P>,
    clock: C,
    morse: MorseEngine,
    envelope: EnvelopeEngine,
    window: WindowScheduler,
    slot: SlotScheduler,
    status: S,
    /// Gate state last applied to the transmitter
    keying: bool,
}

impl<'a, P: SynthPort, C: Clock, S: StatusSink> Beacon<'a, P, C, S> {
    /// Assemble a beacon with factory settings; call [`Self::reload`] before use
    #[must_use]
    pub fn new(bus: &'a BusArbiter, synth_port: P, clock: C, status: S) -> Self {
        let settings = Settings::new();
        Self {
            bus,
            settings,
            synth: Ad9859::new(synth_port, bus),
            clock,
            morse: MorseEngine::new(
                CallSignProgram::for_call_sign(settings.call_sign()),
                settings.wpm().unit(),
                settings.morse_enabled(),
            ),
            envelope: EnvelopeEngine::default(),
            window: WindowScheduler::new(settings.window()),
            slot: SlotScheduler::new(settings.fox_max(), settings.transmit_minute(), 0),
            status,
            keying: false,
        }
    }

    /// Re-initialise every component from `settings`
    ///
    /// Order: clock, synthesizer, Morse program, scheduler. The caller
    /// keeps both ticks and the clock interrupt out for the duration.
    pub fn reload(&mut self, settings: Settings) -> Result<(), PortError> {
        info!("reload: {}", settings);
        self.settings = settings;
        self.keying = false;

        self.clock.init()?;

        self.synth.init()?;
        self.synth.configure(
            settings.frequency(),
            settings.crystal(),
            settings.amplitude(),
            settings.modulation(),
        )?;
        self.synth.power_down()?;
        self.envelope.load(EnvelopeTable::sine(self.synth.amplitude_word()));

        self.morse.load(
            CallSignProgram::for_call_sign(settings.call_sign()),
            settings.wpm().unit(),
            settings.morse_enabled(),
        );

        self.window = WindowScheduler::new(settings.window());
        self.slot = SlotScheduler::new(
            settings.fox_max(),
            settings.transmit_minute(),
            settings.start().minute(),
        );
        self.clock.set_alarm_mask(SLOT_ALARM, AlarmMask::Minutes)?;
        let minute = self.clock.field(TimeField::Minute)?;
        self.on_slot_boundary(minute)?;
        if let Some(transition) = self.window.service(&mut self.clock)? {
            self.on_window_transition(transition)?;
        }
        self.apply_gate()?;

        self.status.notify(StatusEvent::Reloaded);
        Ok(())
    }

    /// Morse tick: advance the engine and apply its key command
    ///
    /// A reader claim that ended without [`Self::release_bus`] is caught up
    /// here first.
    pub fn morse_tick(&mut self) -> KeyCommand {
        if self.bus.take_replay_due() {
            if let Err(err) = self.synth.drain_deferred() {
                warn!("bus: deferred replay failed: {}", err);
            }
        }
        let command = self.morse.tick();
        let result = match command {
            KeyCommand::Hold => return command,
            KeyCommand::On => self.synth.key_on(),
            KeyCommand::Off => self.synth.key_off(),
        };
        if let Err(err) = result {
            warn!("morse: key change failed: {}", err);
        }
        command
    }

    /// Envelope tick: shape the keyed carrier while modulation is on
    pub fn envelope_tick(&mut self) {
        let state = self.synth.state();
        let active = state.modulation_enabled && state.keyed && state.continuous.is_none();
        if !active {
            if self.envelope.park() {
                self.bus.yield_to_reader();
            }
            return;
        }

        match self.envelope.tick() {
            EnvelopeStep::Reserve => self.bus.reserve_for_synth(),
            EnvelopeStep::Hold => {}
            EnvelopeStep::Write(sample) => {
                if let Err(err) = self.synth.write_envelope_sample(sample) {
                    trace!("envelope: sample skipped: {}", err);
                }
                self.bus.yield_to_reader();
            }
        }
    }

    /// Clock interrupt: service whichever alarms fired, then acknowledge them
    ///
    /// Every handler runs even if an earlier one failed; the first error
    /// is returned.
    pub fn on_clock_interrupt(&mut self) -> Result<(), PortError> {
        let window_fired = self.clock.alarm_flag(WINDOW_ALARM)?;
        let slot_fired = self.clock.alarm_flag(SLOT_ALARM)?;
        let mut first_error = None;

        if window_fired {
            let result = match self.window.service(&mut self.clock) {
                Ok(Some(transition)) => self.on_window_transition(transition),
                Ok(None) => Ok(()),
                Err(err) => Err(err),
            };
            keep_first(&mut first_error, result);
        }

        if slot_fired {
            let result = self
                .clock
                .field(TimeField::Minute)
                .and_then(|minute| self.on_slot_boundary(minute));
            keep_first(&mut first_error, result);

            // Retry a window edge a failed reprogram rolled back
            let result = match self.window.reconcile(&mut self.clock) {
                Ok(Some(transition)) => self.on_window_transition(transition),
                Ok(None) => Ok(()),
                Err(err) => Err(err),
            };
            keep_first(&mut first_error, result);
        }

        if window_fired {
            keep_first(&mut first_error, self.clock.clear_alarm_flag(WINDOW_ALARM));
        }
        if slot_fired {
            keep_first(&mut first_error, self.clock.clear_alarm_flag(SLOT_ALARM));
        }

        match first_error {
            Some(err) => {
                warn!("clock: alarm service failed: {}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Reader finished its transaction: free the bus and replay deferred work
    pub fn release_bus(&mut self, claim: ReaderClaim<'_>) -> Result<KeyOutcome, PortError> {
        claim.release();
        self.bus.take_replay_due();
        self.synth.drain_deferred()
    }

    /// Transmit an unmodulated test carrier, overriding window and slot
    ///
    /// A busy bus refuses the change and leaves everything as it was.
    pub fn enable_continuous_carrier(&mut self, band: CarrierBand) -> Result<KeyOutcome, PortError> {
        let before = self.synth.state().continuous;
        let outcome = self.synth.enable_continuous_carrier(band)?;
        if outcome == KeyOutcome::Deferred && self.synth.state().continuous == before {
            return Ok(outcome);
        }
        self.morse.set_continuous(true);
        self.status.notify(StatusEvent::ContinuousCarrierOn(band));
        self.apply_gate()?;
        Ok(outcome)
    }

    /// Return to scheduler-driven keying
    ///
    /// Keying restarts from the first symbol if window and slot allow it.
    /// A busy bus refuses the change like [`Self::enable_continuous_carrier`].
    pub fn disable_continuous_carrier(&mut self) -> Result<KeyOutcome, PortError> {
        let before = self.synth.state().continuous;
        let outcome = self.synth.disable_continuous_carrier()?;
        if outcome == KeyOutcome::Deferred && self.synth.state().continuous == before {
            return Ok(outcome);
        }
        let was_keying = self.keying;
        self.morse.set_continuous(false);
        self.morse.stop();
        self.keying = false;
        self.status.notify(StatusEvent::ContinuousCarrierOff);
        if was_keying && !self.keying_allowed() {
            self.status.notify(StatusEvent::KeyingStopped);
        }
        self.apply_gate()?;
        Ok(outcome)
    }

    /// Shared bus arbiter
    #[must_use]
    pub const fn bus(&self) -> &'a BusArbiter {
        self.bus
    }

    /// Settings loaded by the last reload
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Synthesizer driver
    #[must_use]
    pub const fn synth(&self) -> &Ad9859<'a, P> {
        &self.synth
    }

    /// Clock driver
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable clock driver
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Status sink
    #[must_use]
    pub const fn status(&self) -> &S {
        &self.status
    }

    /// Mutable status sink
    pub fn status_mut(&mut self) -> &mut S {
        &mut self.status
    }

    /// Morse engine
    #[must_use]
    pub const fn morse(&self) -> &MorseEngine {
        &self.morse
    }

    /// Envelope engine
    #[must_use]
    pub const fn envelope(&self) -> &EnvelopeEngine {
        &self.envelope
    }

    /// Event window state
    #[must_use]
    pub const fn window_state(&self) -> WindowState {
        self.window.state()
    }

    /// Check if the current minute is this fox's slot
    #[must_use]
    pub const fn in_slot(&self) -> bool {
        self.slot.in_slot()
    }

    /// Check if the keying gate is open
    #[must_use]
    pub const fn is_keying(&self) -> bool {
        self.keying
    }

    /// Whether window, slot and carrier mode currently allow keying
    #[must_use]
    pub fn keying_allowed(&self) -> bool {
        if self.synth.state().continuous.is_some() {
            return true;
        }
        self.window.in_window() && (self.settings.fox_number().is_demo() || self.slot.in_slot())
    }

    fn on_window_transition(&mut self, transition: WindowTransition) -> Result<(), PortError> {
        match transition {
            WindowTransition::Entered => {
                info!("window: entered");
                self.status.notify(StatusEvent::WindowEntered);
                let minute = self.clock.field(TimeField::Minute)?;
                self.on_slot_boundary(minute)?;
            }
            WindowTransition::Left => {
                info!("window: left");
                self.status.notify(StatusEvent::WindowLeft);
            }
        }
        self.apply_gate()
    }

    fn on_slot_boundary(&mut self, minute: u8) -> Result<(), PortError> {
        let was_in_slot = self.slot.in_slot();
        let plan = self.slot.plan(minute);
        match plan.action {
            SlotAction::StartKeying if !was_in_slot => {
                info!("slot: on at minute {}", minute);
                self.status.notify(StatusEvent::SlotOn);
            }
            SlotAction::StopKeying if was_in_slot => {
                info!("slot: off at minute {}", minute);
                self.status.notify(StatusEvent::SlotOff);
            }
            SlotAction::Rearm => debug!("slot: minute {} is no boundary, rearming", minute),
            _ => {}
        }
        let armed = arm_slot_alarm(&mut self.clock, plan.alarm_minute);
        self.apply_gate()?;
        armed
    }

    /// Bring the transmitter in line with the keying gate
    ///
    /// Opening powers the synthesizer up and starts the Morse engine from
    /// the first symbol. Closing stops the engine, keys off and powers
    /// down.
    fn apply_gate(&mut self) -> Result<(), PortError> {
        let allowed = self.keying_allowed();
        if allowed == self.keying {
            return Ok(());
        }
        if allowed {
            if self.synth.state().continuous.is_none() {
                self.synth.power_up()?;
            }
            self.morse.start();
            self.status.notify(StatusEvent::KeyingStarted);
        } else {
            self.morse.stop();
            self.synth.power_down()?;
            self.status.notify(StatusEvent::KeyingStopped);
        }
        self.keying = allowed;
        Ok(())
    }
}

fn keep_first(first: &mut Option<PortError>, result: Result<(), PortError>) {
    if let Err(err) = result {
        first.get_or_insert(err);
    }
}
