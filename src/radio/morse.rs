//! Morse Timing Engine
//!
//! Turns a call sign into a fixed symbol program and steps through it from
//! the periodic Morse tick. The engine never touches the synthesizer: each
//! tick returns a [`KeyCommand`] that the caller applies, so the engine can
//! be driven and checked without hardware.
//!
//! # Timing
//!
//! Durations are counted in units of one dot. Every tone symbol carries its
//! own one-unit trailing gap, so a letter space adds two units to make the
//! three-unit gap between letters:
//!
//! | Symbol       | Tone | Total |
//! |--------------|------|-------|
//! | Dot          | 1    | 2     |
//! | Dash         | 3    | 4     |
//! | Letter space | 0    | 2     |
//! | Word space   | 0    | 7     |
//!
//! One unit lasts [`MorseUnit::ticks`] Morse ticks.

use heapless::Vec;

use crate::config::CARRIER_REASSERT_TICKS;
use crate::types::{CallSign, MorseUnit};

/// Longest supported call-sign program, in symbols
pub const MAX_PROGRAM_LEN: usize = 32;

/// One element of a call-sign program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// Short tone
    Dot,
    /// Long tone
    Dash,
    /// Silence between letters
    LetterSpace,
    /// Silence after the call sign, before it repeats
    WordSpace,
}

impl Symbol {
    /// Total length in units, trailing gap included
    #[must_use]
    pub const fn units(self) -> u8 {
        match self {
            Self::Dot => 2,
            Self::Dash => 4,
            Self::LetterSpace => 2,
            Self::WordSpace => 7,
        }
    }

    /// Units the carrier is keyed on
    #[must_use]
    pub const fn tone_units(self) -> u8 {
        match self {
            Self::Dot => 1,
            Self::Dash => 3,
            Self::LetterSpace | Self::WordSpace => 0,
        }
    }

    /// Check if this symbol produces a tone
    #[must_use]
    pub const fn is_tone(self) -> bool {
        matches!(self, Self::Dot | Self::Dash)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Symbol {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Dot => defmt::write!(f, "."),
            Self::Dash => defmt::write!(f, "-"),
            Self::LetterSpace => defmt::write!(f, "_"),
            Self::WordSpace => defmt::write!(f, "/"),
        }
    }
}

/// Immutable symbol sequence keyed in a loop
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallSignProgram {
    symbols: Vec<Symbol, MAX_PROGRAM_LEN>,
}

impl CallSignProgram {
    /// Encode text with the international Morse table
    ///
    /// Letters are separated by a letter space and the program ends with a
    /// word space. Returns `None` for characters outside the table or text
    /// too long for [`MAX_PROGRAM_LEN`].
    #[must_use]
    pub fn encode(text: &str) -> Option<Self> {
        let mut symbols = Vec::new();
        for (i, c) in text.chars().enumerate() {
            if i > 0 {
                symbols.push(Symbol::LetterSpace).ok()?;
            }
            for element in char_to_morse(c)?.bytes() {
                let symbol = if element == b'-' { Symbol::Dash } else { Symbol::Dot };
                symbols.push(symbol).ok()?;
            }
        }
        symbols.push(Symbol::WordSpace).ok()?;
        Some(Self { symbols })
    }

    /// Program for one of the selectable call signs
    #[must_use]
    pub fn for_call_sign(call_sign: CallSign) -> Self {
        Self::encode(call_sign.text()).unwrap_or_default()
    }

    /// Build from raw symbols, returns `None` if empty or too long
    #[must_use]
    pub fn from_symbols(symbols: &[Symbol]) -> Option<Self> {
        if symbols.is_empty() {
            return None;
        }
        Vec::from_slice(symbols).ok().map(|symbols| Self { symbols })
    }

    /// Symbols in keying order
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Number of symbols
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check if the program is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Length of one pass through the program, in units
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.symbols.iter().map(|s| u32::from(s.units())).sum()
    }
}

/// International Morse pattern for a character
const fn char_to_morse(c: char) -> Option<&'static str> {
    match c.to_ascii_uppercase() {
        'A' => Some(".-"),
        'B' => Some("-..."),
        'C' => Some("-.-."),
        'D' => Some("-.."),
        'E' => Some("."),
        'F' => Some("..-."),
        'G' => Some("--."),
        'H' => Some("...."),
        'I' => Some(".."),
        'J' => Some(".---"),
        'K' => Some("-.-"),
        'L' => Some(".-.."),
        'M' => Some("--"),
        'N' => Some("-."),
        'O' => Some("---"),
        'P' => Some(".--."),
        'Q' => Some("--.-"),
        'R' => Some(".-."),
        'S' => Some("..."),
        'T' => Some("-"),
        'U' => Some("..-"),
        'V' => Some("...-"),
        'W' => Some(".--"),
        'X' => Some("-..-"),
        'Y' => Some("-.--"),
        'Z' => Some("--.."),
        '0' => Some("-----"),
        '1' => Some(".----"),
        '2' => Some("..---"),
        '3' => Some("...--"),
        '4' => Some("....-"),
        '5' => Some("....."),
        '6' => Some("-...."),
        '7' => Some("--..."),
        '8' => Some("---.."),
        '9' => Some("----."),
        '/' => Some("-..-."),
        _ => None,
    }
}

/// Key change requested by one engine tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    /// Leave the key as it is
    Hold,
    /// Key the carrier on
    On,
    /// Key the carrier off
    Off,
}

/// Position within the program
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MorseCursor {
    /// Next symbol to load
    pub symbol_index: usize,
    /// Units left in the current symbol
    pub units_remaining: u8,
}

/// Morse keying state machine
#[derive(Clone, Debug)]
pub struct MorseEngine {
    program: CallSignProgram,
    unit: MorseUnit,
    morse_enabled: bool,
    continuous: bool,
    running: bool,
    /// Restart from the first symbol on the next tick
    reset: bool,
    cursor: MorseCursor,
    tone_remaining: u8,
    /// Ticks until the next unit boundary
    prescaler: u16,
    /// Carrier mode ticks since the last key-on
    carrier_ticks: u16,
    key_down: bool,
}

impl MorseEngine {
    /// Create a stopped engine
    #[must_use]
    pub fn new(program: CallSignProgram, unit: MorseUnit, morse_enabled: bool) -> Self {
        Self {
            program,
            unit,
            morse_enabled,
            continuous: false,
            running: false,
            reset: true,
            cursor: MorseCursor::default(),
            tone_remaining: 0,
            prescaler: 0,
            carrier_ticks: 0,
            key_down: false,
        }
    }

    /// Replace program and speed; the engine is left stopped
    pub fn load(&mut self, program: CallSignProgram, unit: MorseUnit, morse_enabled: bool) {
        *self = Self::new(program, unit, morse_enabled);
    }

    /// Begin keying; a stopped engine restarts at the first symbol
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.reset = true;
        }
    }

    /// Stop keying
    ///
    /// The caller keys the carrier off; the engine forgets its key state.
    pub fn stop(&mut self) {
        self.running = false;
        self.key_down = false;
    }

    /// Force plain carrier keying regardless of the Morse setting
    pub fn set_continuous(&mut self, continuous: bool) {
        if self.continuous != continuous {
            self.continuous = continuous;
            self.reset = true;
        }
    }

    /// Check if the engine is running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Check if the engine currently wants the key down
    #[must_use]
    pub const fn is_key_down(&self) -> bool {
        self.key_down
    }

    /// Check if the engine keys a plain carrier instead of symbols
    #[must_use]
    pub const fn is_carrier_mode(&self) -> bool {
        self.continuous || !self.morse_enabled
    }

    /// Current program position
    #[must_use]
    pub const fn cursor(&self) -> MorseCursor {
        self.cursor
    }

    /// Loaded program
    #[must_use]
    pub const fn program(&self) -> &CallSignProgram {
        &self.program
    }

    /// Dot length
    #[must_use]
    pub const fn unit(&self) -> MorseUnit {
        self.unit
    }

    /// Advance by one Morse tick
    pub fn tick(&mut self) -> KeyCommand {
        if !self.running {
            return KeyCommand::Hold;
        }
        if self.reset {
            self.reset = false;
            self.cursor = MorseCursor::default();
            self.tone_remaining = 0;
            self.prescaler = 0;
            self.carrier_ticks = 0;
        }

        if self.is_carrier_mode() {
            return self.carrier_tick();
        }

        if self.prescaler > 0 {
            self.prescaler -= 1;
            return KeyCommand::Hold;
        }
        self.prescaler = self.unit.ticks() - 1;
        self.unit_tick()
    }

    fn carrier_tick(&mut self) -> KeyCommand {
        let reassert = self.carrier_ticks == 0;
        self.carrier_ticks = (self.carrier_ticks + 1) % CARRIER_REASSERT_TICKS;
        if reassert {
            self.key_down = true;
            KeyCommand::On
        } else {
            KeyCommand::Hold
        }
    }

    fn unit_tick(&mut self) -> KeyCommand {
        let mut command = KeyCommand::Hold;

        if self.cursor.units_remaining == 0 {
            let Some(&symbol) = self.program.symbols().get(self.cursor.symbol_index) else {
                return KeyCommand::Hold;
            };
            self.cursor.units_remaining = symbol.units();
            self.tone_remaining = symbol.tone_units();
            self.cursor.symbol_index = (self.cursor.symbol_index + 1) % self.program.len();
            if symbol.is_tone() {
                self.key_down = true;
                command = KeyCommand::On;
            }
        } else if self.tone_remaining == 0 && self.key_down {
            self.key_down = false;
            command = KeyCommand::Off;
        }

        self.cursor.units_remaining -= 1;
        self.tone_remaining = self.tone_remaining.saturating_sub(1);
        command
    }
}
