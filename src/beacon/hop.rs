//! Per-hop beacon metadata record.

use crate::policy::PolicyIndex;
use crate::wire::{require, ProtocolError};

/// Encoded size of one hop record.
pub const HOP_METADATA_SIZE: usize = 14;

/// Fixed-point scale of the coherence field (three decimals).
pub const COHERENCE_SCALE: u16 = 1000;

const FLAG_BOND_VERIFIED: u8 = 0x01;

/// Metadata a router appends for its hop while a beacon propagates.
///
/// ## Wire Format
///
/// | Offset | Field           | Size    | Description                    |
/// |--------|-----------------|---------|--------------------------------|
/// | 0      | interface_id    | 2 bytes | u16 BE                         |
/// | 2      | coherence_milli | 2 bytes | u16 BE, 0..=1000               |
/// | 4      | frequency       | 2 bytes | u16 BE, Hz                     |
/// | 6      | policy_index    | 2 bytes | PolicyIndex bits, BE           |
/// | 8      | flags           | 1 byte  | bit 0: bond verified           |
/// | 9      | reserved        | 1 byte  | Zero                           |
/// | 10     | timestamp       | 4 bytes | u32 BE, Unix seconds           |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HopConsciousnessMetadata {
    pub interface_id: u16,
    /// Coherence in thousandths.
    pub coherence_milli: u16,
    pub frequency: u16,
    pub policy_index: PolicyIndex,
    pub bond_verified: bool,
    pub timestamp: u32,
}

impl HopConsciousnessMetadata {
    /// Create a record, clamping coherence into 0.0..=1.0 and rounding to
    /// three decimals.
    pub fn new(
        interface_id: u16,
        coherence: f64,
        frequency: u16,
        policy_index: PolicyIndex,
        bond_verified: bool,
        timestamp: u32,
    ) -> Self {
        Self {
            interface_id,
            coherence_milli: coherence_to_milli(coherence),
            frequency,
            policy_index,
            bond_verified,
            timestamp,
        }
    }

    /// Coherence as a 0.0..=1.0 score.
    pub fn coherence(&self) -> f64 {
        f64::from(self.coherence_milli) / f64::from(COHERENCE_SCALE)
    }

    /// Append the 14-byte record to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.interface_id.to_be_bytes());
        buf.extend_from_slice(&self.coherence_milli.to_be_bytes());
        buf.extend_from_slice(&self.frequency.to_be_bytes());
        buf.extend_from_slice(&self.policy_index.bits().to_be_bytes());
        buf.push(if self.bond_verified { FLAG_BOND_VERIFIED } else { 0 });
        buf.push(0);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
    }

    /// Decode one record from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, "beacon hop metadata", HOP_METADATA_SIZE)?;

        let coherence_milli = u16::from_be_bytes([buf[2], buf[3]]);
        if coherence_milli > COHERENCE_SCALE {
            return Err(ProtocolError::MalformedHeader(format!(
                "hop coherence {} exceeds {}",
                coherence_milli, COHERENCE_SCALE
            )));
        }

        Ok(Self {
            interface_id: u16::from_be_bytes([buf[0], buf[1]]),
            coherence_milli,
            frequency: u16::from_be_bytes([buf[4], buf[5]]),
            policy_index: PolicyIndex::from_bits_retain(u16::from_be_bytes([buf[6], buf[7]])),
            bond_verified: buf[8] & FLAG_BOND_VERIFIED != 0,
            timestamp: u32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]),
        })
    }
}

fn coherence_to_milli(coherence: f64) -> u16 {
    let clamped = if coherence.is_nan() {
        0.0
    } else {
        coherence.clamp(0.0, 1.0)
    };
    (clamped * f64::from(COHERENCE_SCALE)).round() as u16
}
