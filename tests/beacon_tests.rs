//! End-to-end tests for the beacon
//!
//! A full beacon runs against in-memory chips: the clock is moved by hand
//! and alarms are raised as the chip would raise them.

mod common;

use ardf_firmware::bus::{BusArbiter, DeferredAction};
use ardf_firmware::config::Settings;
use ardf_firmware::drivers::ad9859::KeyOutcome;
use ardf_firmware::drivers::mcp79410::{Alarm, AlarmMask, Clock, Mcp79410};
use ardf_firmware::radio::beacon::Beacon;
use ardf_firmware::radio::morse::KeyCommand;
use ardf_firmware::radio::schedule::WindowState;
use ardf_firmware::status::{StatusEvent, StatusQueue};
use ardf_firmware::types::{CarrierBand, DateTime, PortError, ScheduleWindow};
use common::{raise_alarm, FakeClock, FakeRtc, FakeSynth, StatusLog, ALM0, ALM1, WKDAY};

type TestBeacon<'a> = Beacon<'a, FakeSynth, FakeClock, StatusLog>;

fn at(hour: u8, minute: u8, second: u8) -> DateTime {
    DateTime::new(24, 5, 1, hour, minute, second).unwrap()
}

fn settings(fox_number: u8, fox_max: u8, transmit_minute: u8, morse: bool) -> Settings {
    let mut settings = Settings::new();
    settings.set_fox_max(fox_max).unwrap();
    settings.set_transmit_minute(transmit_minute).unwrap();
    settings.set_fox_number(fox_number).unwrap();
    settings.set_morse_enabled(morse);
    settings.set_wpm(60).unwrap();
    settings.set_window(ScheduleWindow::new(at(10, 0, 0), at(11, 0, 0)));
    settings
}

fn clock_at(now: DateTime) -> FakeClock {
    let mut clock = Mcp79410::new(FakeRtc::default());
    clock.set_time(&now).unwrap();
    clock
}

fn beacon_at(bus: &BusArbiter, now: DateTime, settings: Settings) -> TestBeacon<'_> {
    let mut beacon = Beacon::new(bus, FakeSynth::default(), clock_at(now), StatusLog::default());
    beacon.reload(settings).unwrap();
    beacon
}

/// Move the clock to `now` and fire `alarm`
fn fire(beacon: &mut TestBeacon<'_>, now: DateTime, alarm: Alarm) -> Result<(), PortError> {
    beacon.clock_mut().set_time(&now).unwrap();
    raise_alarm(beacon.clock_mut(), alarm);
    beacon.on_clock_interrupt()
}

// ============================================================================
// Window Tests
// ============================================================================

#[test]
fn single_fox_keys_for_the_whole_window() {
    let bus = BusArbiter::new();
    let mut settings = settings(1, 1, 0, false);
    settings.set_window(ScheduleWindow::new(at(10, 0, 0), at(10, 5, 0)));
    let mut beacon = beacon_at(&bus, at(9, 59, 59), settings);

    assert_eq!(beacon.window_state(), WindowState::OutOfWindow);
    assert!(!beacon.is_keying());
    assert!(!beacon.synth().is_powered());
    assert_eq!(beacon.morse_tick(), KeyCommand::Hold);
    assert!(!beacon.synth().is_keyed());

    fire(&mut beacon, at(10, 0, 0), Alarm::Zero).unwrap();
    assert_eq!(beacon.window_state(), WindowState::InWindow);
    assert!(beacon.is_keying());
    assert!(beacon.synth().is_powered());
    assert_eq!(beacon.clock().io().regs[ALM0 + WKDAY] & 0x08, 0);

    for _ in 0..600 {
        beacon.morse_tick();
        assert!(beacon.synth().is_keyed());
    }

    fire(&mut beacon, at(10, 5, 0), Alarm::Zero).unwrap();
    assert_eq!(beacon.window_state(), WindowState::OutOfWindow);
    assert!(!beacon.is_keying());
    assert!(!beacon.synth().is_keyed());
    assert!(!beacon.synth().is_powered());
    assert_eq!(beacon.morse_tick(), KeyCommand::Hold);

    let events = &beacon.status().events;
    assert_eq!(beacon.status().count(StatusEvent::WindowEntered), 1);
    assert_eq!(beacon.status().count(StatusEvent::KeyingStarted), 1);
    assert_eq!(events.last(), Some(&StatusEvent::KeyingStopped));
}

#[test]
fn window_alarm_is_aimed_at_the_next_edge() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(9, 0, 0), settings(1, 1, 0, true));
    assert_eq!(beacon.clock().io().regs[ALM0 + 2], 0x10);
    assert_eq!(beacon.clock().io().regs[ALM0 + 1], 0x00);

    fire(&mut beacon, at(10, 0, 0), Alarm::Zero).unwrap();
    assert_eq!(beacon.clock().io().regs[ALM0 + 2], 0x11);
}

#[test]
fn repeated_window_alarm_is_idempotent() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(9, 0, 0), settings(1, 1, 0, true));
    fire(&mut beacon, at(10, 0, 0), Alarm::Zero).unwrap();
    fire(&mut beacon, at(10, 0, 0), Alarm::Zero).unwrap();

    assert!(beacon.is_keying());
    assert_eq!(beacon.status().count(StatusEvent::WindowEntered), 1);
    assert_eq!(beacon.status().count(StatusEvent::KeyingStarted), 1);
    assert_eq!(beacon.clock_mut().alarm_mask(Alarm::Zero).unwrap(), AlarmMask::Hours);
}

#[test]
fn reload_inside_window_starts_keying() {
    let bus = BusArbiter::new();
    let beacon = beacon_at(&bus, at(10, 30, 0), settings(1, 1, 0, true));
    assert_eq!(beacon.window_state(), WindowState::InWindow);
    assert!(beacon.is_keying());
    assert_eq!(beacon.status().events.last(), Some(&StatusEvent::Reloaded));
}

#[test]
fn morse_keying_follows_call_sign() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings(1, 1, 0, true));

    // M starts with a dash: three units of four ticks at 60 wpm
    assert_eq!(beacon.morse_tick(), KeyCommand::On);
    for _ in 1..12 {
        beacon.morse_tick();
        assert!(beacon.synth().is_keyed());
    }
    assert_eq!(beacon.morse_tick(), KeyCommand::Off);
    assert!(!beacon.synth().is_keyed());
}

// ============================================================================
// Slot Tests
// ============================================================================

#[test]
fn fox_keys_only_in_its_minute() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 1, 30), settings(1, 5, 2, true));

    assert_eq!(beacon.window_state(), WindowState::InWindow);
    assert!(!beacon.in_slot());
    assert!(!beacon.is_keying());
    assert_eq!(beacon.clock().io().regs[ALM1 + 1], 0x02);
    assert_eq!(beacon.clock_mut().alarm_mask(Alarm::One).unwrap(), AlarmMask::Minutes);

    fire(&mut beacon, at(10, 2, 0), Alarm::One).unwrap();
    assert!(beacon.in_slot());
    assert!(beacon.is_keying());
    assert!(beacon.synth().is_powered());
    assert_eq!(beacon.clock().io().regs[ALM1 + 1], 0x03);
    assert_eq!(beacon.clock().io().regs[ALM1 + WKDAY] & 0x08, 0);

    fire(&mut beacon, at(10, 3, 0), Alarm::One).unwrap();
    assert!(!beacon.in_slot());
    assert!(!beacon.is_keying());
    assert!(!beacon.synth().is_powered());
    assert_eq!(beacon.clock().io().regs[ALM1 + 1], 0x07);

    assert_eq!(beacon.status().count(StatusEvent::SlotOn), 1);
    assert_eq!(beacon.status().count(StatusEvent::SlotOff), 1);
}

#[test]
fn slot_outside_window_does_not_key() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(9, 1, 30), settings(1, 5, 2, true));
    fire(&mut beacon, at(9, 2, 0), Alarm::One).unwrap();
    assert!(beacon.in_slot());
    assert!(!beacon.is_keying());
}

#[test]
fn entering_window_mid_slot_keys_immediately() {
    let bus = BusArbiter::new();
    let mut settings = settings(1, 5, 0, true);
    settings.set_window(ScheduleWindow::new(at(10, 0, 30), at(11, 0, 0)));
    let mut beacon = beacon_at(&bus, at(10, 0, 0), settings);
    assert!(beacon.in_slot());
    assert!(!beacon.is_keying());

    fire(&mut beacon, at(10, 0, 30), Alarm::Zero).unwrap();
    assert!(beacon.is_keying());
}

#[test]
fn demo_fox_ignores_slots() {
    let bus = BusArbiter::new();
    let beacon = beacon_at(&bus, at(10, 1, 30), settings(0, 5, 2, true));
    assert!(!beacon.in_slot());
    assert!(beacon.is_keying());
}

#[test]
fn slot_alarm_failure_still_starts_keying() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 1, 30), settings(1, 5, 2, true));
    beacon.clock_mut().io_mut().fail_writes = Some(0x12..=0x12);

    assert_eq!(fire(&mut beacon, at(10, 2, 0), Alarm::One), Err(PortError::Nack));
    assert!(beacon.is_keying());
    assert_eq!(beacon.clock().io().regs[ALM1 + WKDAY] & 0x08, 0);
}

#[test]
fn unacknowledged_alarm_is_serviced_on_retry() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 59, 0), settings(1, 1, 0, true));
    assert!(beacon.is_keying());

    beacon.clock_mut().set_time(&at(11, 0, 0)).unwrap();
    raise_alarm(beacon.clock_mut(), Alarm::Zero);
    beacon.clock_mut().io_mut().fail_reads = true;
    assert_eq!(beacon.on_clock_interrupt(), Err(PortError::Nack));
    // Flag still set, so the interrupt line stays asserted
    assert_eq!(beacon.clock().io().regs[ALM0 + WKDAY] & 0x08, 0x08);
    assert!(beacon.is_keying());

    beacon.clock_mut().io_mut().fail_reads = false;
    assert_eq!(beacon.on_clock_interrupt(), Ok(()));
    assert_eq!(beacon.clock().io().regs[ALM0 + WKDAY] & 0x08, 0);
    assert_eq!(beacon.window_state(), WindowState::OutOfWindow);
    assert!(!beacon.is_keying());
}

// ============================================================================
// Bus Sharing Tests
// ============================================================================

#[test]
fn key_on_deferred_until_reader_releases() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings(1, 1, 0, false));

    let claim = bus.reader_try_claim().unwrap();
    assert_eq!(beacon.morse_tick(), KeyCommand::On);
    assert!(!beacon.synth().is_keyed());
    assert_eq!(bus.deferred(), DeferredAction::TurnOn);

    assert_eq!(beacon.release_bus(claim), Ok(KeyOutcome::Applied));
    assert!(beacon.synth().is_keyed());
    assert_eq!(bus.deferred(), DeferredAction::None);
}

#[test]
fn window_close_during_failed_read_still_keys_off() {
    fn failing_poll(bus: &BusArbiter) -> Result<(), PortError> {
        let _claim = bus.reader_try_claim().ok_or(PortError::Bus)?;
        Err(PortError::Timeout)
    }

    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 59, 0), settings(1, 1, 0, false));
    beacon.morse_tick();
    assert!(beacon.synth().is_keyed());

    let claim = bus.reader_try_claim().unwrap();
    fire(&mut beacon, at(11, 0, 0), Alarm::Zero).unwrap();
    assert!(!beacon.is_keying());
    assert!(beacon.synth().is_keyed());
    assert_eq!(bus.deferred(), DeferredAction::TurnOff);
    drop(claim);

    assert_eq!(failing_poll(&bus), Err(PortError::Timeout));
    assert_eq!(beacon.morse_tick(), KeyCommand::Hold);
    assert!(!beacon.synth().is_keyed());
    assert!(!beacon.synth().is_powered());
    assert_eq!(bus.deferred(), DeferredAction::None);
    for _ in 0..1000 {
        beacon.morse_tick();
        assert!(!beacon.synth().is_keyed());
    }
}

#[test]
fn envelope_modulates_keyed_carrier() {
    let bus = BusArbiter::new();
    let mut settings = settings(1, 1, 0, false);
    settings.set_modulation(true);
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings);
    beacon.morse_tick();

    beacon.envelope_tick();
    assert!(!bus.reader_may_start());
    assert!(bus.reader_try_claim().is_none());
    for _ in 0..4 {
        beacon.envelope_tick();
    }
    assert!(!bus.reader_may_start());

    beacon.envelope_tick();
    assert!(bus.reader_may_start());
    let expected = beacon.envelope().table().samples()[1];
    assert_eq!(expected, 10_573);
    assert_eq!(beacon.synth().port().asf(), Some(expected));
}

#[test]
fn envelope_idle_without_modulation() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings(1, 1, 0, false));
    beacon.morse_tick();
    let asf = beacon.synth().port().asf();
    for _ in 0..12 {
        beacon.envelope_tick();
        assert!(bus.reader_may_start());
    }
    assert_eq!(beacon.synth().port().asf(), asf);
}

#[test]
fn envelope_releases_gate_when_keying_stops() {
    let bus = BusArbiter::new();
    let mut settings = settings(1, 1, 0, false);
    settings.set_modulation(true);
    settings.set_window(ScheduleWindow::new(at(10, 0, 0), at(10, 31, 0)));
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings);
    beacon.morse_tick();
    beacon.envelope_tick();
    assert!(!bus.reader_may_start());

    fire(&mut beacon, at(10, 31, 0), Alarm::Zero).unwrap();
    assert!(!beacon.synth().is_keyed());
    beacon.envelope_tick();
    assert!(bus.reader_may_start());
}

// ============================================================================
// Continuous Carrier Tests
// ============================================================================

#[test]
fn continuous_carrier_overrides_schedule() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(9, 0, 0), settings(1, 5, 2, true));
    assert!(!beacon.is_keying());

    assert_eq!(
        beacon.enable_continuous_carrier(CarrierBand::Band2m),
        Ok(KeyOutcome::Applied)
    );
    assert!(beacon.is_keying());
    assert!(beacon.synth().is_keyed());
    assert_eq!(beacon.synth().port().amplifier, Some(CarrierBand::Band2m));
    assert_eq!(beacon.synth().port().ftw(), Some(1_942_130_524));
    assert!(beacon.morse().is_carrier_mode());
    assert_eq!(beacon.morse_tick(), KeyCommand::On);

    assert_eq!(beacon.disable_continuous_carrier(), Ok(KeyOutcome::Applied));
    assert!(!beacon.is_keying());
    assert!(!beacon.synth().is_keyed());
    assert!(!beacon.synth().is_powered());
    assert_eq!(beacon.synth().port().ftw(), Some(46_976_204));

    let events = &beacon.status().events;
    assert!(events.contains(&StatusEvent::ContinuousCarrierOn(CarrierBand::Band2m)));
    assert_eq!(
        events[events.len() - 2..],
        [StatusEvent::ContinuousCarrierOff, StatusEvent::KeyingStopped]
    );
}

#[test]
fn leaving_continuous_carrier_resumes_schedule() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings(1, 1, 0, true));
    beacon.enable_continuous_carrier(CarrierBand::Band80m).unwrap();
    beacon.disable_continuous_carrier().unwrap();

    assert!(beacon.is_keying());
    assert!(beacon.synth().is_powered());
    assert!(!beacon.morse().is_carrier_mode());
    assert_eq!(beacon.morse_tick(), KeyCommand::On);
    assert_eq!(beacon.status().events.last(), Some(&StatusEvent::KeyingStarted));
}

#[test]
fn continuous_carrier_waits_for_reader() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings(1, 1, 0, true));
    beacon.morse_tick();
    assert!(beacon.synth().is_keyed());
    let events = beacon.status().events.len();

    let claim = bus.reader_try_claim().unwrap();
    assert_eq!(
        beacon.enable_continuous_carrier(CarrierBand::Band2m),
        Ok(KeyOutcome::Deferred)
    );
    assert!(beacon.synth().is_keyed());
    assert!(beacon.synth().state().continuous.is_none());
    assert!(!beacon.morse().is_carrier_mode());
    assert_eq!(beacon.status().events.len(), events);

    beacon.release_bus(claim).unwrap();
    assert_eq!(
        beacon.enable_continuous_carrier(CarrierBand::Band2m),
        Ok(KeyOutcome::Applied)
    );
    assert_eq!(beacon.synth().state().continuous, Some(CarrierBand::Band2m));
}

#[test]
fn continuous_carrier_is_never_modulated() {
    let bus = BusArbiter::new();
    let mut settings = settings(1, 1, 0, true);
    settings.set_modulation(true);
    let mut beacon = beacon_at(&bus, at(9, 0, 0), settings);
    beacon.enable_continuous_carrier(CarrierBand::Band80m).unwrap();
    for _ in 0..12 {
        beacon.envelope_tick();
    }
    assert!(bus.reader_may_start());
    assert_eq!(beacon.synth().port().asf(), Some(13_106));
}

// ============================================================================
// Reload Tests
// ============================================================================

#[test]
fn reload_reports_clock_failure() {
    let bus = BusArbiter::new();
    let mut beacon = Beacon::new(
        &bus,
        FakeSynth::default(),
        clock_at(at(10, 0, 0)),
        StatusLog::default(),
    );
    beacon.clock_mut().io_mut().fail_reads = true;
    assert_eq!(beacon.reload(settings(1, 1, 0, true)), Err(PortError::Nack));
    assert!(beacon.status().events.is_empty());
}

#[test]
fn reload_stops_keying_and_re_evaluates() {
    let bus = BusArbiter::new();
    let mut beacon = beacon_at(&bus, at(10, 30, 0), settings(1, 1, 0, true));
    assert!(beacon.is_keying());

    let mut outside = settings(1, 1, 0, true);
    outside.set_window(ScheduleWindow::new(at(12, 0, 0), at(13, 0, 0)));
    beacon.reload(outside).unwrap();
    assert!(!beacon.is_keying());
    assert!(!beacon.synth().is_powered());
    assert_eq!(beacon.settings(), &outside);
    assert_eq!(beacon.status().count(StatusEvent::Reloaded), 2);
}

#[test]
fn status_queue_collects_events() {
    let bus = BusArbiter::new();
    let mut beacon = Beacon::new(
        &bus,
        FakeSynth::default(),
        clock_at(at(10, 30, 0)),
        StatusQueue::new(),
    );
    beacon.reload(settings(1, 1, 0, true)).unwrap();

    let mut events = Vec::new();
    while let Some(event) = beacon.status_mut().pop() {
        events.push(event);
    }
    assert!(events.contains(&StatusEvent::WindowEntered));
    assert!(events.contains(&StatusEvent::KeyingStarted));
    assert_eq!(events.last(), Some(&StatusEvent::Reloaded));
    assert!(beacon.status().is_empty());
}
