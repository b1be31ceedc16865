//! Float <-> holding register conversion
//!
//! The controller firmware stores one IEEE-754 float32 across two 16-bit
//! registers with the low word at the lower address: for the big-endian
//! byte image `b0 b1 b2 b3` of the float, the register pair is
//! `(b2b3, b0b1)`. This word order is the wire contract.

use crate::{Result, RobotError};

/// Number of registers occupied by one float value.
pub const REGISTERS_PER_FLOAT: usize = 2;

/// Pack a float32 into its `(low, high)` register pair.
pub fn encode_float(value: f32) -> [u16; 2] {
    let bytes = value.to_be_bytes();
    let high = u16::from_be_bytes([bytes[0], bytes[1]]);
    let low = u16::from_be_bytes([bytes[2], bytes[3]]);
    [low, high]
}

/// Reassemble a float32 from its `(low, high)` register pair.
///
/// Anything other than exactly two registers is not a valid pair and
/// fails with [`RobotError::InvalidRegisterCount`].
pub fn decode_float(registers: &[u16]) -> Result<f32> {
    let [low, high] = registers else {
        return Err(RobotError::InvalidRegisterCount(registers.len()));
    };
    let high_bytes = high.to_be_bytes();
    let low_bytes = low.to_be_bytes();
    Ok(f32::from_be_bytes([
        high_bytes[0],
        high_bytes[1],
        low_bytes[0],
        low_bytes[1],
    ]))
}

/// Pack a slice of floats into consecutive register pairs.
pub fn encode_floats(values: &[f32]) -> Vec<u16> {
    let mut registers = Vec::with_capacity(values.len() * REGISTERS_PER_FLOAT);
    for value in values {
        registers.extend_from_slice(&encode_float(*value));
    }
    registers
}
