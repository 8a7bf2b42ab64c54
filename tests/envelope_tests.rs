//! Tests for the modulation envelope engine

use ardf_firmware::config::{ENVELOPE_SAMPLES, ENVELOPE_SUBTICKS, SYNTH_ASF_MAX};
use ardf_firmware::radio::envelope::{EnvelopeEngine, EnvelopeStep, EnvelopeTable};

// ============================================================================
// Table Tests
// ============================================================================

#[test]
fn full_scale_sine_table() {
    let table = EnvelopeTable::sine(SYNTH_ASF_MAX);
    assert_eq!(
        table.samples(),
        &[8703, 13217, 16007, 16007, 13217, 8703, 4189, 1399, 1399, 4189]
    );
}

#[test]
fn table_scales_with_amplitude() {
    // 80m cap at 100%
    let table = EnvelopeTable::sine(13_106);
    assert_eq!(
        table.samples(),
        &[6962, 10573, 12805, 12805, 10573, 6962, 3351, 1119, 1119, 3351]
    );
}

#[test]
fn zero_amplitude_table_is_silent() {
    let table = EnvelopeTable::sine(0);
    assert!(table.samples().iter().all(|&s| s == 0));
}

#[test]
fn oversized_amplitude_clamped() {
    assert_eq!(EnvelopeTable::sine(u16::MAX), EnvelopeTable::sine(SYNTH_ASF_MAX));
    assert_eq!(EnvelopeTable::default(), EnvelopeTable::sine(SYNTH_ASF_MAX));
}

// ============================================================================
// Sequencer Tests
// ============================================================================

#[test]
fn sample_cycle_reserve_hold_write() {
    let table = EnvelopeTable::sine(SYNTH_ASF_MAX);
    let mut engine = EnvelopeEngine::new(table);

    assert_eq!(engine.tick(), EnvelopeStep::Reserve);
    for _ in 2..ENVELOPE_SUBTICKS {
        assert_eq!(engine.tick(), EnvelopeStep::Hold);
    }
    assert_eq!(engine.tick(), EnvelopeStep::Write(table.samples()[1]));
    assert_eq!(engine.index(), 1);
    assert_eq!(engine.tick(), EnvelopeStep::Reserve);
}

#[test]
fn one_write_per_sample_period() {
    let mut engine = EnvelopeEngine::default();
    let ticks = usize::from(ENVELOPE_SUBTICKS) * ENVELOPE_SAMPLES;
    let writes = (0..ticks)
        .filter(|_| matches!(engine.tick(), EnvelopeStep::Write(_)))
        .count();
    assert_eq!(writes, ENVELOPE_SAMPLES);
}

#[test]
fn index_wraps_after_full_period() {
    let table = EnvelopeTable::sine(SYNTH_ASF_MAX);
    let mut engine = EnvelopeEngine::new(table);
    let mut last = None;
    for _ in 0..usize::from(ENVELOPE_SUBTICKS) * ENVELOPE_SAMPLES {
        if let EnvelopeStep::Write(sample) = engine.tick() {
            last = Some(sample);
        }
    }
    assert_eq!(engine.index(), 0);
    assert_eq!(last, Some(table.samples()[0]));
}

#[test]
fn park_reports_pending_reservation() {
    let mut engine = EnvelopeEngine::default();
    assert!(!engine.park());

    engine.tick();
    assert!(engine.park());
    // Parking restarts the sample with a fresh reservation
    assert_eq!(engine.tick(), EnvelopeStep::Reserve);
}

#[test]
fn park_after_write_has_nothing_pending() {
    let mut engine = EnvelopeEngine::default();
    for _ in 0..ENVELOPE_SUBTICKS {
        engine.tick();
    }
    assert!(!engine.park());
}

#[test]
fn load_restarts_from_first_sample() {
    let mut engine = EnvelopeEngine::default();
    for _ in 0..3 * ENVELOPE_SUBTICKS {
        engine.tick();
    }
    assert_eq!(engine.index(), 3);
    engine.load(EnvelopeTable::sine(1_000));
    assert_eq!(engine.index(), 0);
    assert_eq!(engine.table(), &EnvelopeTable::sine(1_000));
}
