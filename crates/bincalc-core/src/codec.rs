//! Bit pattern to value conversions

use core::fmt::Write;

use heapless::String;

use crate::switches::{BitVector, SWITCH_COUNT};

/// Binary text for one vector, one character per switch.
pub type BinaryString = String<SWITCH_COUNT>;

/// Uppercase hexadecimal text for one byte.
pub type HexString = String<2>;

/// Interpret the vector as an unsigned big-endian number.
pub fn to_decimal(bits: &BitVector) -> u8 {
    bits.iter().fold(0u8, |acc, bit| (acc << 1) | u8::from(bit))
}

/// Concatenate the bits as `'0'`/`'1'` characters in vector order.
pub fn to_binary_string(bits: &BitVector) -> BinaryString {
    let mut out = BinaryString::new();
    for bit in bits.iter() {
        // Capacity is exactly SWITCH_COUNT, so this cannot overflow.
        let _ = out.push(if bit { '1' } else { '0' });
    }
    out
}

/// Uppercase hexadecimal without prefix, at least one digit.
pub fn to_hex_string(value: u8) -> HexString {
    let mut out = HexString::new();
    let _ = write!(out, "{:X}", value);
    out
}

/// Every representation derived from a single sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSnapshot {
    pub bits: BitVector,
    pub binary: BinaryString,
    pub decimal: u8,
    /// Only present for deployments that report hexadecimal.
    pub hex: Option<HexString>,
}

impl ValueSnapshot {
    pub fn new(bits: BitVector, include_hex: bool) -> Self {
        let decimal = to_decimal(&bits);
        Self {
            bits,
            binary: to_binary_string(&bits),
            decimal,
            hex: include_hex.then(|| to_hex_string(decimal)),
        }
    }
}
