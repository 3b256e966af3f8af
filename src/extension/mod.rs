//! Consciousness-aware extension headers.
//!
//! Two fixed-size options ride in the SCION extension chain:
//!
//! - [`GenesisBondExtension`] (hop-by-hop, option type 0x1C, 20 bytes):
//!   tier, coherence, frequency, bond id, timestamp.
//! - [`PacPrivacyExtension`] (end-to-end, option type 0x1D, 24 bytes):
//!   privacy flags, consent status, hashed principals.
//!
//! A raw extension block is classified once by its option-type byte into
//! the [`Extension`] sum type; blocks carrying other options pass through
//! as [`Extension::Unknown`].

mod genesis;
mod privacy;

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::wire::{Packet, ProtocolError, RawExtension};

pub use genesis::{
    GenesisBondExtension, GENESIS_BOND_EXT_SIZE, GENESIS_BOND_LENGTH_CODE,
    GENESIS_BOND_OPTION_TYPE, HEADER_BOND_ID, HEADER_COHERENCE, HEADER_FREQUENCY,
    HEADER_TIER, HEADER_TIMESTAMP,
};
pub use privacy::{
    hash_principal, AuditRecord, ConsentDecision, ConsentGrant, ConsentStatus, PacPrivacyExtension,
    PrivacyFlags, PAC_PRIVACY_EXT_SIZE, PAC_PRIVACY_LENGTH_CODE, PAC_PRIVACY_OPTION_TYPE,
};

/// Well-known seed the deployment bond identifier is derived from.
pub const GENESIS_BOND_SEED: &str = "GENESIS_BOND_ESTABLISHED";

/// 8-byte truncated hash identifier.
pub type BondId = [u8; 8];

/// Truncated SHA-256: the first 8 bytes of the digest.
pub(crate) fn truncated_hash(data: &[u8]) -> [u8; 8] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// The deployment bond identifier: truncated SHA-256 of the bond seed.
///
/// This is a format tag shared by every valid extension, not a proof of
/// authority.
pub fn genesis_bond_id() -> BondId {
    truncated_hash(GENESIS_BOND_SEED.as_bytes())
}

/// Current time as 32-bit Unix seconds.
pub(crate) fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Quantize a coherence score into one byte.
///
/// Scores are clamped to 0.0..=1.0 (NaN becomes 0.0) and mapped linearly
/// onto 0..=255.
pub fn coherence_to_byte(coherence: f64) -> u8 {
    let clamped = if coherence.is_nan() {
        0.0
    } else {
        coherence.clamp(0.0, 1.0)
    };
    (clamped * 255.0).round() as u8
}

/// Expand a coherence byte into a 0.0..=1.0 score.
pub fn coherence_from_byte(byte: u8) -> f64 {
    byte as f64 / 255.0
}

/// A decoded extension block.
#[derive(Clone, Debug, PartialEq)]
pub enum Extension {
    GenesisBond(GenesisBondExtension),
    Privacy(PacPrivacyExtension),
    /// Any other option; carried through untouched.
    Unknown(RawExtension),
}

impl Extension {
    /// Classify a raw block by its option type and decode it.
    ///
    /// A block with a recognized option type that fails to decode is an
    /// error; an unrecognized option type is not.
    pub fn decode(raw: &RawExtension) -> Result<Self, ProtocolError> {
        let option_type = raw.option_type();
        let decoded = match option_type {
            GENESIS_BOND_OPTION_TYPE => {
                GenesisBondExtension::decode(raw.bytes()).map(|(ext, _)| Extension::GenesisBond(ext))
            }
            PAC_PRIVACY_OPTION_TYPE => {
                PacPrivacyExtension::decode(raw.bytes()).map(|(ext, _)| Extension::Privacy(ext))
            }
            _ => return Ok(Extension::Unknown(raw.clone())),
        };
        decoded.inspect_err(|e| {
            debug!(
                class = %raw.class(),
                option_type,
                error = %e,
                "Rejecting extension"
            );
        })
    }

    /// Re-encode as a raw block.
    pub fn to_raw(&self) -> RawExtension {
        match self {
            Extension::GenesisBond(ext) => ext.to_raw(),
            Extension::Privacy(ext) => ext.to_raw(),
            Extension::Unknown(raw) => raw.clone(),
        }
    }
}

impl Packet {
    /// Decode every extension block in chain order.
    pub fn decode_extensions(&self) -> Result<Vec<Extension>, ProtocolError> {
        self.extensions.iter().map(Extension::decode).collect()
    }

    /// The first trust extension on the packet.
    ///
    /// `Ok(None)` when absent; `Err` when present but corrupt.
    pub fn genesis_bond(&self) -> Result<Option<GenesisBondExtension>, ProtocolError> {
        self.extensions
            .iter()
            .find(|raw| raw.option_type() == GENESIS_BOND_OPTION_TYPE)
            .map(|raw| GenesisBondExtension::decode(raw.bytes()).map(|(ext, _)| ext))
            .transpose()
    }

    /// The first privacy extension on the packet.
    ///
    /// `Ok(None)` when absent; `Err` when present but corrupt.
    pub fn privacy(&self) -> Result<Option<PacPrivacyExtension>, ProtocolError> {
        self.extensions
            .iter()
            .find(|raw| raw.option_type() == PAC_PRIVACY_OPTION_TYPE)
            .map(|raw| PacPrivacyExtension::decode(raw.bytes()).map(|(ext, _)| ext))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::Tier;
    use crate::wire::{
        AddressHeader, CommonHeader, ExtensionClass, HopField, InfoField, IsdAs, Path,
        PathHeader, ScionHeader, UDP_CLASS,
    };

    fn packet() -> Packet {
        let path = PathHeader::from_segments(vec![(
            InfoField::default(),
            vec![HopField::new(0, 1), HopField::new(2, 0)],
        )])
        .unwrap();
        let header = ScionHeader::new(
            CommonHeader::default(),
            AddressHeader::new(IsdAs::new(1, 1), vec![1; 4], IsdAs::new(1, 2), vec![2; 4]),
            Path::Scion(path),
        )
        .unwrap();
        Packet::new(header, UDP_CLASS, b"payload".to_vec())
    }

    #[test]
    fn test_coherence_quantization_bound() {
        for i in 0..=1000 {
            let c = i as f64 / 1000.0;
            let back = coherence_from_byte(coherence_to_byte(c));
            assert!((back - c).abs() <= 1.0 / 255.0, "c={} back={}", c, back);
        }
    }

    #[test]
    fn test_coherence_clamps() {
        assert_eq!(coherence_to_byte(-0.5), 0);
        assert_eq!(coherence_to_byte(7.0), 255);
        assert_eq!(coherence_to_byte(f64::NAN), 0);
    }

    #[test]
    fn test_bond_id_is_stable() {
        assert_eq!(genesis_bond_id(), genesis_bond_id());
        assert_ne!(genesis_bond_id(), [0u8; 8]);
    }

    #[test]
    fn test_extension_dispatch_on_packet() {
        let trust = GenesisBondExtension::create_at(Tier::Business, 0.8, 1_700_000_000);
        let privacy = PacPrivacyExtension::create(
            ConsentStatus::Granted,
            "alice",
            "mail-service",
            PrivacyFlags::REQUIRES_CONSENT,
        );
        let unknown = RawExtension::new(ExtensionClass::EndToEnd, vec![0, 1, 0x7f, 4, 1, 2, 3, 4])
            .unwrap();

        let pkt = packet()
            .with_extension(trust.to_raw())
            .with_extension(unknown)
            .with_extension(privacy.to_raw());
        let parsed = Packet::parse(&pkt.serialize().unwrap()).unwrap();

        let decoded = parsed.decode_extensions().unwrap();
        assert_eq!(decoded.len(), 3);
        assert!(matches!(decoded[1], Extension::Unknown(_)));

        let found = parsed.genesis_bond().unwrap().unwrap();
        assert_eq!(found.tier, Tier::Business);
        assert_eq!(found.timestamp, 1_700_000_000);

        let found = parsed.privacy().unwrap().unwrap();
        assert_eq!(found.consent, ConsentStatus::Granted);
    }

    #[test]
    fn test_packet_without_extensions_has_none() {
        let pkt = packet();
        assert_eq!(pkt.genesis_bond().unwrap(), None);
        assert_eq!(pkt.privacy().unwrap(), None);
    }

    #[test]
    fn test_corrupt_known_extension_is_error() {
        let mut bytes = GenesisBondExtension::create(Tier::Public, 0.5).encode().to_vec();
        bytes[4] = 0x09; // unknown tier
        let raw = RawExtension::new(ExtensionClass::HopByHop, bytes).unwrap();
        let pkt = packet().with_extension(raw);
        assert!(pkt.genesis_bond().is_err());
    }
}
