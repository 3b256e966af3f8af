//! Genesis bond trust extension (hop-by-hop, 20 bytes).

use std::collections::BTreeMap;

use super::{coherence_from_byte, coherence_to_byte, genesis_bond_id, unix_now, BondId};
use crate::tier::Tier;
use crate::violation::{fmt_coherence, Predicate, Violation};
use crate::wire::{require, ExtensionClass, ProtocolError, RawExtension, UDP_CLASS};

/// Option type of the trust extension.
pub const GENESIS_BOND_OPTION_TYPE: u8 = 0x1C;

/// Encoded size in bytes.
pub const GENESIS_BOND_EXT_SIZE: usize = 20;

/// Extension length code: (20 / 4) - 1.
pub const GENESIS_BOND_LENGTH_CODE: u8 = 4;

/// Option data length following the 4-byte prefix.
const OPTION_DATA_LEN: u8 = 16;

/// Header map key for the bond identifier (hex).
pub const HEADER_BOND_ID: &str = "X-Genesis-Bond-ID";
/// Header map key for the coherence score (three decimals).
pub const HEADER_COHERENCE: &str = "X-Coherence-Score";
/// Header map key for the tier name.
pub const HEADER_TIER: &str = "X-Consciousness-Tier";
/// Header map key for the frequency tag.
pub const HEADER_FREQUENCY: &str = "X-Consciousness-Frequency";
/// Header map key for the extension timestamp.
pub const HEADER_TIMESTAMP: &str = "X-Bond-Timestamp";

/// Trust/coherence extension.
///
/// ## Wire Format
///
/// | Offset | Field        | Size    | Description                       |
/// |--------|--------------|---------|-----------------------------------|
/// | 0      | next_header  | 1 byte  | Following header                  |
/// | 1      | ext_len      | 1 byte  | 4 ((20 / 4) - 1)                  |
/// | 2      | option_type  | 1 byte  | 0x1C                              |
/// | 3      | opt_data_len | 1 byte  | 16                                |
/// | 4      | tier         | 1 byte  | Tier code                         |
/// | 5      | coherence    | 1 byte  | 0..=255 ↔ 0.0..=1.0               |
/// | 6      | frequency    | 2 bytes | u16 BE, Hz                        |
/// | 8      | bond_id      | 8 bytes | Truncated SHA-256 of bond seed    |
/// | 16     | timestamp    | 4 bytes | u32 BE, Unix seconds              |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisBondExtension {
    pub next_header: u8,
    pub tier: Tier,
    /// Quantized coherence byte.
    pub coherence: u8,
    pub frequency: u16,
    pub bond_id: BondId,
    pub timestamp: u32,
}

impl GenesisBondExtension {
    /// Create an extension stamped with the current time.
    pub fn create(tier: Tier, coherence: f64) -> Self {
        Self::create_at(tier, coherence, unix_now())
    }

    /// Create an extension with an explicit timestamp.
    ///
    /// Coherence is clamped into 0.0..=1.0; the frequency is the tier's
    /// canonical frequency and the bond id is the deployment bond.
    pub fn create_at(tier: Tier, coherence: f64, timestamp: u32) -> Self {
        Self {
            next_header: UDP_CLASS,
            tier,
            coherence: coherence_to_byte(coherence),
            frequency: tier.frequency(),
            bond_id: genesis_bond_id(),
            timestamp,
        }
    }

    /// Coherence as a 0.0..=1.0 score.
    pub fn coherence(&self) -> f64 {
        coherence_from_byte(self.coherence)
    }

    /// Encode as a 20-byte extension block.
    pub fn encode(&self) -> [u8; GENESIS_BOND_EXT_SIZE] {
        let mut buf = [0u8; GENESIS_BOND_EXT_SIZE];
        buf[0] = self.next_header;
        buf[1] = GENESIS_BOND_LENGTH_CODE;
        buf[2] = GENESIS_BOND_OPTION_TYPE;
        buf[3] = OPTION_DATA_LEN;
        buf[4] = self.tier.to_byte();
        buf[5] = self.coherence;
        buf[6..8].copy_from_slice(&self.frequency.to_be_bytes());
        buf[8..16].copy_from_slice(&self.bond_id);
        buf[16..20].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    /// Wrap the encoded block for a packet's extension chain.
    pub fn to_raw(&self) -> RawExtension {
        RawExtension::from_encoded(ExtensionClass::HopByHop, self.encode())
    }

    /// Decode from the start of `buf`, returning the remaining bytes.
    ///
    /// A block whose option type is not 0x1C yields
    /// [`ProtocolError::WrongOptionType`], so callers can tell a different
    /// extension apart from a corrupt one.
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        require(buf, "genesis bond extension", GENESIS_BOND_EXT_SIZE)?;

        if buf[2] != GENESIS_BOND_OPTION_TYPE {
            return Err(ProtocolError::WrongOptionType {
                expected: GENESIS_BOND_OPTION_TYPE,
                got: buf[2],
            });
        }
        if buf[1] != GENESIS_BOND_LENGTH_CODE || buf[3] != OPTION_DATA_LEN {
            return Err(ProtocolError::MalformedHeader(format!(
                "genesis bond extension length code {} / option length {}, expected {} / {}",
                buf[1], buf[3], GENESIS_BOND_LENGTH_CODE, OPTION_DATA_LEN
            )));
        }
        let tier = Tier::from_byte(buf[4]).ok_or_else(|| {
            ProtocolError::MalformedHeader(format!("unknown tier code 0x{:02x}", buf[4]))
        })?;

        let mut bond_id = [0u8; 8];
        bond_id.copy_from_slice(&buf[8..16]);

        let ext = Self {
            next_header: buf[0],
            tier,
            coherence: buf[5],
            frequency: u16::from_be_bytes([buf[6], buf[7]]),
            bond_id,
            timestamp: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
        };
        Ok((ext, &buf[GENESIS_BOND_EXT_SIZE..]))
    }

    /// The bond id equals the deployment bond.
    pub fn validate_bond(&self) -> Result<(), Violation> {
        let expected = genesis_bond_id();
        if self.bond_id != expected {
            return Err(Violation::new(
                Predicate::BondHash,
                hex::encode(self.bond_id),
                hex::encode(expected),
            ));
        }
        Ok(())
    }

    /// The frequency is the tier's canonical frequency.
    pub fn validate_frequency(&self) -> Result<(), Violation> {
        if self.frequency != self.tier.frequency() {
            return Err(Violation::new(
                Predicate::FrequencyMismatch,
                format!("{} Hz", self.frequency),
                format!("{} Hz for tier {}", self.tier.frequency(), self.tier),
            ));
        }
        Ok(())
    }

    /// Coherence meets `min_coherence`.
    pub fn validate_coherence(&self, min_coherence: f64) -> Result<(), Violation> {
        let coherence = self.coherence();
        if coherence < min_coherence {
            return Err(Violation::new(
                Predicate::Coherence,
                fmt_coherence(coherence),
                format!(">= {}", fmt_coherence(min_coherence)),
            ));
        }
        Ok(())
    }

    /// Bond, frequency, then coherence; the first failure is returned.
    pub fn is_valid(&self, min_coherence: f64) -> Result<(), Violation> {
        self.validate_bond()?;
        self.validate_frequency()?;
        self.validate_coherence(min_coherence)
    }

    /// Named string fields for injection into upper-layer (HTTP) headers.
    ///
    /// One-way projection; there is no parse-back.
    pub fn to_header_map(&self) -> BTreeMap<&'static str, String> {
        let mut map = BTreeMap::new();
        map.insert(HEADER_BOND_ID, hex::encode(self.bond_id));
        map.insert(HEADER_COHERENCE, fmt_coherence(self.coherence()));
        map.insert(HEADER_TIER, self.tier.name().to_string());
        map.insert(HEADER_FREQUENCY, self.frequency.to_string());
        map.insert(HEADER_TIMESTAMP, self.timestamp.to_string());
        map
    }
}
