//! Beacon Metadata Extension
//!
//! Path-construction beacons (PCBs) accumulate one
//! [`HopConsciousnessMetadata`] record per traversed router. The extension
//! carries the deployment bond hash, an informational policy-identifier
//! map (only its hash travels on the wire), and an 8-byte digest over
//! everything before it.
//!
//! ## Wire Format
//!
//! | Offset      | Field           | Size      | Description                  |
//! |-------------|-----------------|-----------|------------------------------|
//! | 0           | version         | 1 byte    | 1                            |
//! | 1           | flags           | 1 byte    | [`PcbFlags`]                 |
//! | 2           | hop_count       | 1 byte    | Number of hop records        |
//! | 3           | reserved        | 1 byte    | Zero                         |
//! | 4           | bond_hash       | 8 bytes   | Deployment bond id           |
//! | 12          | timestamp       | 4 bytes   | u32 BE, creation time        |
//! | 16          | hops            | 14 × n    | Hop records                  |
//! | 16 + 14n    | policy_map_hash | 8 bytes   | Hash of the policy map       |
//! | 24 + 14n    | digest          | 8 bytes   | Truncated SHA-256 of [0, 24 + 14n) |
//!
//! The digest is the signable summary of the beacon; signing itself is
//! out of scope here.

mod hop;

#[cfg(test)]
mod tests;

use bitflags::bitflags;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::extension::{genesis_bond_id, truncated_hash, unix_now, BondId};
use crate::policy::PolicyIndex;
use crate::violation::{fmt_coherence, Predicate, Violation};
use crate::wire::{require, ProtocolError};

pub use hop::{HopConsciousnessMetadata, COHERENCE_SCALE, HOP_METADATA_SIZE};

/// Current beacon extension version.
pub const PCB_EXTENSION_VERSION: u8 = 1;

/// Fixed prefix: version, flags, hop count, reserved, bond, timestamp.
pub const PCB_HEADER_SIZE: usize = 16;

/// Fixed suffix: policy map hash and digest.
pub const PCB_TRAILER_SIZE: usize = 16;

/// Hop count is a single byte.
pub const MAX_PCB_HOPS: usize = u8::MAX as usize;

/// Default beacon lifetime for staleness checks (one day).
pub const DEFAULT_MAX_BEACON_AGE_SECS: u32 = 86_400;

bitflags! {
    /// Beacon-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PcbFlags: u8 {
        const HAS_PRIVACY_POLICY = 0x01;
        const REQUIRES_AUDIT     = 0x02;
    }
}

/// Consciousness metadata attached to a path-construction beacon.
///
/// Fields are private so every mutation passes through a method that
/// drops the cached digest.
#[derive(Clone, Debug)]
pub struct ConsciousnessPcbExtension {
    version: u8,
    flags: PcbFlags,
    bond_hash: BondId,
    timestamp: u32,
    hops: Vec<HopConsciousnessMetadata>,
    policy_ids: BTreeMap<u16, String>,
    policy_map_hash: [u8; 8],
    digest: OnceLock<[u8; 8]>,
}

impl ConsciousnessPcbExtension {
    /// Create an empty extension stamped with the current time.
    pub fn new(flags: PcbFlags) -> Self {
        Self::new_at(flags, unix_now())
    }

    /// Create an empty extension with an explicit creation time.
    pub fn new_at(flags: PcbFlags, timestamp: u32) -> Self {
        let policy_ids = BTreeMap::new();
        let policy_map_hash = policy_map_hash(&policy_ids);
        Self {
            version: PCB_EXTENSION_VERSION,
            flags,
            bond_hash: genesis_bond_id(),
            timestamp,
            hops: Vec::new(),
            policy_ids,
            policy_map_hash,
            digest: OnceLock::new(),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn flags(&self) -> PcbFlags {
        self.flags
    }

    pub fn bond_hash(&self) -> BondId {
        self.bond_hash
    }

    /// Creation time, Unix seconds.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Hop records in traversal order.
    pub fn hops(&self) -> &[HopConsciousnessMetadata] {
        &self.hops
    }

    /// Policy identifiers registered by this node. Empty after decode;
    /// only the map hash travels on the wire.
    pub fn policy_ids(&self) -> &BTreeMap<u16, String> {
        &self.policy_ids
    }

    pub fn policy_map_hash(&self) -> [u8; 8] {
        self.policy_map_hash
    }

    /// Append a hop record stamped with the current time.
    pub fn add_hop(
        &mut self,
        interface_id: u16,
        coherence: f64,
        frequency: u16,
        policy_index: PolicyIndex,
        bond_verified: bool,
    ) -> Result<(), ProtocolError> {
        self.push_hop(HopConsciousnessMetadata::new(
            interface_id,
            coherence,
            frequency,
            policy_index,
            bond_verified,
            unix_now(),
        ))
    }

    /// Append a prepared hop record.
    pub fn push_hop(&mut self, hop: HopConsciousnessMetadata) -> Result<(), ProtocolError> {
        if self.hops.len() >= MAX_PCB_HOPS {
            return Err(ProtocolError::TooManyHops { max: MAX_PCB_HOPS });
        }
        self.hops.push(hop);
        self.digest = OnceLock::new();
        Ok(())
    }

    /// Record the identifier a policy bit set is known by.
    pub fn register_policy_id(&mut self, index: PolicyIndex, id: impl Into<String>) {
        self.policy_ids.insert(index.bits(), id.into());
        self.policy_map_hash = policy_map_hash(&self.policy_ids);
        self.digest = OnceLock::new();
    }

    /// Minimum hop coherence, or 0.0 for a beacon with no hops.
    pub fn path_coherence(&self) -> f64 {
        self.hops
            .iter()
            .map(HopConsciousnessMetadata::coherence)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Every hop verified the bond. A beacon with no hops has verified
    /// nothing and returns false.
    pub fn validates_bond(&self) -> bool {
        !self.hops.is_empty() && self.hops.iter().all(|h| h.bond_verified)
    }

    /// Truncated SHA-256 over the encoded bytes preceding the digest.
    ///
    /// Computed once and cached until the next mutation.
    pub fn digest(&self) -> [u8; 8] {
        *self
            .digest
            .get_or_init(|| truncated_hash(&self.signable_bytes()))
    }

    /// Encoded size in bytes.
    pub fn wire_size(&self) -> usize {
        PCB_HEADER_SIZE + self.hops.len() * HOP_METADATA_SIZE + PCB_TRAILER_SIZE
    }

    /// The bytes the digest covers.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_size());
        buf.push(self.version);
        buf.push(self.flags.bits());
        // push_hop keeps the count within a byte
        buf.push(self.hops.len() as u8);
        buf.push(0);
        buf.extend_from_slice(&self.bond_hash);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        for hop in &self.hops {
            hop.encode(&mut buf);
        }
        buf.extend_from_slice(&self.policy_map_hash);
        buf
    }

    /// Encode including the digest.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.signable_bytes();
        buf.extend_from_slice(&self.digest());
        buf
    }

    /// Decode and verify the carried digest.
    ///
    /// Returns the extension and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        require(buf, "beacon extension header", PCB_HEADER_SIZE)?;

        let version = buf[0];
        if version != PCB_EXTENSION_VERSION {
            debug!(version, "Rejecting beacon extension with unsupported version");
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let flags = PcbFlags::from_bits_retain(buf[1]);
        let hop_count = buf[2] as usize;
        let total = PCB_HEADER_SIZE + hop_count * HOP_METADATA_SIZE + PCB_TRAILER_SIZE;
        require(buf, "beacon extension", total)?;

        let mut bond_hash = [0u8; 8];
        bond_hash.copy_from_slice(&buf[4..12]);
        let timestamp = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);

        let hops = buf[PCB_HEADER_SIZE..PCB_HEADER_SIZE + hop_count * HOP_METADATA_SIZE]
            .chunks_exact(HOP_METADATA_SIZE)
            .map(HopConsciousnessMetadata::decode)
            .collect::<Result<Vec<_>, _>>()?;

        let trailer = PCB_HEADER_SIZE + hop_count * HOP_METADATA_SIZE;
        let mut policy_map_hash = [0u8; 8];
        policy_map_hash.copy_from_slice(&buf[trailer..trailer + 8]);
        let mut carried = [0u8; 8];
        carried.copy_from_slice(&buf[trailer + 8..total]);

        let ext = Self {
            version,
            flags,
            bond_hash,
            timestamp,
            hops,
            policy_ids: BTreeMap::new(),
            policy_map_hash,
            digest: OnceLock::new(),
        };
        let computed = ext.digest();
        if computed != carried {
            debug!(
                carried = %hex::encode(carried),
                computed = %hex::encode(computed),
                "Rejecting beacon extension with bad digest"
            );
            return Err(ProtocolError::DigestMismatch {
                carried: hex::encode(carried),
                computed: hex::encode(computed),
            });
        }
        Ok((ext, total))
    }

    /// Validate against the current time and the default maximum age.
    pub fn validate(&self, min_coherence: f64, require_bond: bool) -> Result<(), Violation> {
        self.validate_at(
            min_coherence,
            require_bond,
            unix_now(),
            DEFAULT_MAX_BEACON_AGE_SECS,
        )
    }

    /// Bond hash, path coherence, bond verification (when required), then
    /// staleness; the first failure is returned.
    ///
    /// A beacon is fresh while its age is strictly below `max_age_secs`.
    /// Timestamps ahead of `now` count as fresh.
    pub fn validate_at(
        &self,
        min_coherence: f64,
        require_bond: bool,
        now: u32,
        max_age_secs: u32,
    ) -> Result<(), Violation> {
        let result = self.check(min_coherence, require_bond, now, max_age_secs);
        if let Err(violation) = &result {
            debug!(
                hops = self.hops.len(),
                reason = violation.reason(),
                observed = %violation.observed,
                required = %violation.required,
                "Beacon validation failed"
            );
        }
        result
    }

    fn check(
        &self,
        min_coherence: f64,
        require_bond: bool,
        now: u32,
        max_age_secs: u32,
    ) -> Result<(), Violation> {
        let expected = genesis_bond_id();
        if self.bond_hash != expected {
            return Err(Violation::new(
                Predicate::BondHash,
                hex::encode(self.bond_hash),
                hex::encode(expected),
            ));
        }

        let coherence = self.path_coherence();
        if coherence < min_coherence {
            return Err(Violation::new(
                Predicate::Coherence,
                fmt_coherence(coherence),
                format!(">= {}", fmt_coherence(min_coherence)),
            ));
        }

        if require_bond && !self.validates_bond() {
            let unverified = self.hops.iter().filter(|h| !h.bond_verified).count();
            return Err(Violation::new(
                Predicate::BondNotVerified,
                format!("{} of {} hops unverified", unverified, self.hops.len()),
                "all hops verified",
            ));
        }

        let age = now.saturating_sub(self.timestamp);
        if age >= max_age_secs {
            return Err(Violation::new(
                Predicate::Stale,
                format!("{}s old", age),
                format!("< {}s", max_age_secs),
            ));
        }
        Ok(())
    }
}

/// Equality ignores the digest cache and the local policy-id map; the
/// map is represented by its hash.
impl PartialEq for ConsciousnessPcbExtension {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.flags == other.flags
            && self.bond_hash == other.bond_hash
            && self.timestamp == other.timestamp
            && self.hops == other.hops
            && self.policy_map_hash == other.policy_map_hash
    }
}

impl Eq for ConsciousnessPcbExtension {}

fn policy_map_hash(ids: &BTreeMap<u16, String>) -> [u8; 8] {
    let mut buf = Vec::new();
    for (bits, id) in ids {
        buf.extend_from_slice(&bits.to_be_bytes());
        buf.extend_from_slice(&(id.len() as u32).to_be_bytes());
        buf.extend_from_slice(id.as_bytes());
    }
    truncated_hash(&buf)
}
