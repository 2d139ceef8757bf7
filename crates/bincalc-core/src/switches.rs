//! Switch bank sampling
//!
//! Reads the electrical level of every input line in declared order and maps
//! the result to a canonical [`BitVector`] where index 0 is the most
//! significant bit. How a level becomes a bit is decided by [`SwitchConfig`]:
//! the deployments disagree on both polarity and bit ordering, so neither is
//! hard-coded here.

use core::sync::atomic::{AtomicBool, Ordering};

/// Number of physical switches on the board.
pub const SWITCH_COUNT: usize = 8;

/// Fixed-length, MSB-first bit pattern produced by one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitVector([bool; SWITCH_COUNT]);

impl BitVector {
    /// All switches off.
    pub const ZERO: Self = Self([false; SWITCH_COUNT]);

    /// All switches on.
    pub const ONES: Self = Self([true; SWITCH_COUNT]);

    pub const fn new(bits: [bool; SWITCH_COUNT]) -> Self {
        Self(bits)
    }

    /// Build a vector from integer bits (`0` is off, anything else is on).
    pub fn from_bits(bits: [u8; SWITCH_COUNT]) -> Self {
        Self(bits.map(|b| b != 0))
    }

    /// Build the vector whose big-endian value is `value`.
    pub fn from_value(value: u8) -> Self {
        Self(core::array::from_fn(|i| value & (0x80 >> i) != 0))
    }

    /// Bits as `0`/`1` integers, MSB first.
    pub fn bits(&self) -> [u8; SWITCH_COUNT] {
        self.0.map(u8::from)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }
}

/// Which electrical level counts as a logical `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// High level reads as 1 (switch pulls the line up when closed).
    ActiveHigh,
    /// Low level reads as 1 (switch shorts the line to ground when closed).
    ActiveLow,
}

impl Polarity {
    pub const fn bit_for(self, is_high: bool) -> bool {
        match self {
            Polarity::ActiveHigh => is_high,
            Polarity::ActiveLow => !is_high,
        }
    }
}

/// How declared line order maps onto bit significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// First declared line is the MSB.
    AsWired,
    /// Last declared line is the MSB.
    Reversed,
}

/// Internal bias resistor the board expects on each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePull {
    None,
    Up,
    Down,
}

/// Per-deployment interpretation of the switch lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchConfig {
    pub polarity: Polarity,
    pub order: BitOrder,
    pub pull: LinePull,
}

impl SwitchConfig {
    pub const fn new(polarity: Polarity, order: BitOrder, pull: LinePull) -> Self {
        Self {
            polarity,
            order,
            pull,
        }
    }

    /// Convert raw line levels (declared order, `true` = high) into bits.
    pub fn to_bits(&self, levels: [bool; SWITCH_COUNT]) -> BitVector {
        let mut bits = levels.map(|high| self.polarity.bit_for(high));
        if self.order == BitOrder::Reversed {
            bits.reverse();
        }
        BitVector(bits)
    }
}

/// A single digital input line.
///
/// Reads take `&self` so a line can be sampled from several execution
/// contexts at once without coordination.
pub trait InputLine {
    /// Check if the line currently reads high
    fn is_high(&self) -> bool;
}

impl<T: InputLine + ?Sized> InputLine for &T {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

/// Lines backed by an atomic flag, used by the simulator and in tests.
impl InputLine for AtomicBool {
    fn is_high(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Anything that can produce a fresh [`BitVector`] on demand.
pub trait BitSource {
    fn sample(&self) -> BitVector;
}

impl<T: BitSource + ?Sized> BitSource for &T {
    fn sample(&self) -> BitVector {
        (**self).sample()
    }
}

/// The eight input lines together with their interpretation.
pub struct SwitchBank<L> {
    lines: [L; SWITCH_COUNT],
    config: SwitchConfig,
}

impl<L: InputLine> SwitchBank<L> {
    pub const fn new(lines: [L; SWITCH_COUNT], config: SwitchConfig) -> Self {
        Self { lines, config }
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    /// Raw levels in declared order, before polarity and ordering apply.
    pub fn levels(&self) -> [bool; SWITCH_COUNT] {
        core::array::from_fn(|i| self.lines[i].is_high())
    }
}

impl<L: InputLine> BitSource for SwitchBank<L> {
    fn sample(&self) -> BitVector {
        self.config.to_bits(self.levels())
    }
}
