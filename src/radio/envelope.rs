//! Modulation Envelope Engine
//!
//! Amplitude-modulates the keyed carrier with a 600 Hz tone by writing a
//! short sine table to the synthesizer's amplitude register. Each table
//! sample spans several envelope ticks: the first closes the reader's gate
//! to the shared bus, the last writes the sample and opens the gate again.

use core::f32::consts::PI;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::config::{ENVELOPE_SAMPLES, ENVELOPE_SUBTICKS, SYNTH_ASF_MAX};

/// Table midpoint (full scale 16383)
const ENVELOPE_OFFSET: f32 = 8703.0;

/// Table swing around the midpoint
const ENVELOPE_SWING: f32 = 7680.0;

/// One modulation period of amplitude words
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeTable {
    samples: [u16; ENVELOPE_SAMPLES],
}

impl EnvelopeTable {
    /// Sine envelope scaled to `amplitude_word` (the keyed amplitude)
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sine(amplitude_word: u16) -> Self {
        let amplitude_word = amplitude_word.min(SYNTH_ASF_MAX);
        let mut samples = [0u16; ENVELOPE_SAMPLES];
        for (i, sample) in samples.iter_mut().enumerate() {
            let phase = 2.0 * PI * i as f32 / ENVELOPE_SAMPLES as f32;
            let full = (ENVELOPE_OFFSET + ENVELOPE_SWING * phase.sin() + 0.5) as u32;
            let scaled = full.min(u32::from(SYNTH_ASF_MAX)) * u32::from(amplitude_word)
                / u32::from(SYNTH_ASF_MAX);
            *sample = scaled as u16;
        }
        Self { samples }
    }

    /// All samples in playback order
    #[must_use]
    pub const fn samples(&self) -> &[u16; ENVELOPE_SAMPLES] {
        &self.samples
    }
}

impl Default for EnvelopeTable {
    fn default() -> Self {
        Self::sine(SYNTH_ASF_MAX)
    }
}

/// Work due on one envelope tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeStep {
    /// Close the reader's gate; a sample write is coming
    Reserve,
    /// Nothing to do
    Hold,
    /// Write this sample (skip if the bus is busy), then open the gate
    Write(u16),
}

/// Sub-tick sequencer over an [`EnvelopeTable`]
#[derive(Clone, Debug, Default)]
pub struct EnvelopeEngine {
    table: EnvelopeTable,
    index: usize,
    /// Ticks into the current sample, 0 when parked
    subtick: u8,
}

impl EnvelopeEngine {
    /// Create a parked engine
    #[must_use]
    pub const fn new(table: EnvelopeTable) -> Self {
        Self {
            table,
            index: 0,
            subtick: 0,
        }
    }

    /// Swap in a new table and restart from the first sample
    pub fn load(&mut self, table: EnvelopeTable) {
        *self = Self::new(table);
    }

    /// Loaded table
    #[must_use]
    pub const fn table(&self) -> &EnvelopeTable {
        &self.table
    }

    /// Index of the last sample written
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Advance by one envelope tick
    pub fn tick(&mut self) -> EnvelopeStep {
        self.subtick += 1;
        if self.subtick == 1 {
            EnvelopeStep::Reserve
        } else if self.subtick >= ENVELOPE_SUBTICKS {
            self.subtick = 0;
            self.index = (self.index + 1) % ENVELOPE_SAMPLES;
            EnvelopeStep::Write(self.table.samples[self.index])
        } else {
            EnvelopeStep::Hold
        }
    }

    /// Stop mid-cycle
    ///
    /// Returns `true` if a sample had been reserved and not yet written, in
    /// which case the caller must reopen the reader's gate.
    pub fn park(&mut self) -> bool {
        let reserved = self.subtick > 0;
        self.subtick = 0;
        reserved
    }
}
