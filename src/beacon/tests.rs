use super::*;
use crate::tier::Tier;

const NOW: u32 = 1_700_000_000;

fn hop(interface_id: u16, coherence: f64, bond_verified: bool) -> HopConsciousnessMetadata {
    HopConsciousnessMetadata::new(
        interface_id,
        coherence,
        Tier::Business.frequency(),
        PolicyIndex::for_coherence(coherence) | PolicyIndex::TIER_BUSINESS,
        bond_verified,
        NOW,
    )
}

fn beacon(coherences: &[f64]) -> ConsciousnessPcbExtension {
    let mut ext = ConsciousnessPcbExtension::new_at(PcbFlags::HAS_PRIVACY_POLICY, NOW);
    for (i, &c) in coherences.iter().enumerate() {
        ext.push_hop(hop(i as u16 + 1, c, true)).unwrap();
    }
    ext
}

// ===== Hop metadata =====

#[test]
fn test_hop_coherence_fixed_point() {
    assert_eq!(hop(1, 0.1234, true).coherence_milli, 123);
    assert_eq!(hop(1, 1.7, true).coherence_milli, 1000);
    assert_eq!(hop(1, -0.2, true).coherence_milli, 0);
    assert_eq!(hop(1, f64::NAN, true).coherence_milli, 0);
    assert_eq!(hop(1, 0.875, true).coherence(), 0.875);
}

#[test]
fn test_hop_encode_decode() {
    let record = hop(42, 0.91, false);
    let mut buf = Vec::new();
    record.encode(&mut buf);
    assert_eq!(buf.len(), HOP_METADATA_SIZE);
    assert_eq!(&buf[0..2], &42u16.to_be_bytes());
    assert_eq!(&buf[2..4], &910u16.to_be_bytes());
    assert_eq!(buf[8], 0);
    assert_eq!(HopConsciousnessMetadata::decode(&buf).unwrap(), record);
}

#[test]
fn test_hop_decode_rejects_coherence_overflow() {
    let mut buf = Vec::new();
    hop(1, 0.5, true).encode(&mut buf);
    buf[2..4].copy_from_slice(&1001u16.to_be_bytes());
    assert!(matches!(
        HopConsciousnessMetadata::decode(&buf),
        Err(ProtocolError::MalformedHeader(_))
    ));
}

#[test]
fn test_hop_decode_short() {
    assert!(matches!(
        HopConsciousnessMetadata::decode(&[0u8; 13]),
        Err(ProtocolError::InsufficientData { expected: 14, got: 13, .. })
    ));
}

// ===== Aggregates =====

#[test]
fn test_path_coherence_is_minimum() {
    let ext = beacon(&[0.9, 0.6, 0.8]);
    assert_eq!(ext.path_coherence(), 0.6);
}

#[test]
fn test_empty_beacon() {
    let ext = beacon(&[]);
    assert_eq!(ext.path_coherence(), 0.0);
    assert!(!ext.validates_bond());
    assert_eq!(ext.wire_size(), PCB_HEADER_SIZE + PCB_TRAILER_SIZE);
}

#[test]
fn test_validates_bond_requires_every_hop() {
    let mut ext = beacon(&[0.9, 0.9]);
    assert!(ext.validates_bond());
    ext.push_hop(hop(9, 0.9, false)).unwrap();
    assert!(!ext.validates_bond());
}

#[test]
fn test_hop_limit() {
    let mut ext = beacon(&[]);
    for i in 0..MAX_PCB_HOPS {
        ext.push_hop(hop(i as u16, 0.9, true)).unwrap();
    }
    assert_eq!(
        ext.push_hop(hop(0, 0.9, true)),
        Err(ProtocolError::TooManyHops { max: MAX_PCB_HOPS })
    );
    assert_eq!(ext.hops().len(), MAX_PCB_HOPS);
    assert_eq!(ext.encode()[2], 255);
}

// ===== Digest =====

#[test]
fn test_digest_is_deterministic() {
    assert_eq!(beacon(&[0.9, 0.7]).digest(), beacon(&[0.9, 0.7]).digest());
    assert_ne!(beacon(&[0.9, 0.7]).digest(), beacon(&[0.9, 0.71]).digest());
}

#[test]
fn test_digest_invalidated_by_add_hop() {
    let mut ext = beacon(&[0.9]);
    let before = ext.digest();
    assert_eq!(ext.digest(), before);

    ext.add_hop(7, 0.8, 528, PolicyIndex::TIER_BUSINESS, true).unwrap();
    let after = ext.digest();
    assert_ne!(after, before);
    assert_eq!(after, truncated_hash(&ext.signable_bytes()));
}

#[test]
fn test_policy_id_registration_changes_digest() {
    let mut ext = beacon(&[0.9]);
    let digest = ext.digest();
    let map_hash = ext.policy_map_hash();

    ext.register_policy_id(PolicyIndex::preset(Tier::Private), "private-tier");
    assert_ne!(ext.policy_map_hash(), map_hash);
    assert_ne!(ext.digest(), digest);
    assert_eq!(ext.policy_ids().len(), 1);
}

// ===== Encode / decode =====

#[test]
fn test_encode_decode() {
    let mut ext = beacon(&[0.95, 0.72, 0.88]);
    ext.register_policy_id(PolicyIndex::preset(Tier::Business), "business-tier");

    let bytes = ext.encode();
    assert_eq!(bytes.len(), ext.wire_size());
    assert_eq!(bytes[0], PCB_EXTENSION_VERSION);
    assert_eq!(bytes[1], PcbFlags::HAS_PRIVACY_POLICY.bits());
    assert_eq!(bytes[2], 3);
    assert_eq!(&bytes[bytes.len() - 8..], &ext.digest());

    let (decoded, consumed) = ConsciousnessPcbExtension::decode(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, ext);
    assert_eq!(decoded.digest(), ext.digest());
    // the identifier map itself stays local
    assert!(decoded.policy_ids().is_empty());
    assert_eq!(decoded.policy_map_hash(), ext.policy_map_hash());
}

#[test]
fn test_decode_detects_tampering() {
    let mut bytes = beacon(&[0.9, 0.9]).encode();
    // lower the first hop's coherence
    bytes[PCB_HEADER_SIZE + 2..PCB_HEADER_SIZE + 4].copy_from_slice(&100u16.to_be_bytes());
    assert!(matches!(
        ConsciousnessPcbExtension::decode(&bytes),
        Err(ProtocolError::DigestMismatch { .. })
    ));
}

#[test]
fn test_decode_rejects_version() {
    let mut bytes = beacon(&[0.9]).encode();
    bytes[0] = 2;
    assert_eq!(
        ConsciousnessPcbExtension::decode(&bytes),
        Err(ProtocolError::UnsupportedVersion(2))
    );
}

#[test]
fn test_decode_truncated() {
    let bytes = beacon(&[0.9, 0.8]).encode();
    for len in 0..bytes.len() {
        assert!(
            matches!(
                ConsciousnessPcbExtension::decode(&bytes[..len]),
                Err(ProtocolError::InsufficientData { .. })
            ),
            "len {}",
            len
        );
    }
}

// ===== Validation =====

#[test]
fn test_validate_passes() {
    let ext = beacon(&[0.9, 0.8]);
    assert!(ext
        .validate_at(0.7, true, NOW + 60, DEFAULT_MAX_BEACON_AGE_SECS)
        .is_ok());
}

#[test]
fn test_validate_bond_hash_first() {
    let mut ext = beacon(&[0.1]);
    ext.bond_hash = [0u8; 8];
    let err = ext
        .validate_at(0.7, true, NOW + 10 * DEFAULT_MAX_BEACON_AGE_SECS, DEFAULT_MAX_BEACON_AGE_SECS)
        .unwrap_err();
    assert_eq!(err.predicate, Predicate::BondHash);
}

#[test]
fn test_validate_coherence() {
    let ext = beacon(&[0.9, 0.6, 0.8]);
    let err = ext.validate_at(0.7, true, NOW, 60).unwrap_err();
    assert_eq!(err.reason(), "coherence below threshold");
    assert_eq!(err.observed, "0.600");
    assert_eq!(err.required, ">= 0.700");
}

#[test]
fn test_validate_bond_verification() {
    let mut ext = beacon(&[0.9]);
    ext.push_hop(hop(2, 0.9, false)).unwrap();

    let err = ext.validate_at(0.7, true, NOW, 60).unwrap_err();
    assert_eq!(err.predicate, Predicate::BondNotVerified);
    assert_eq!(err.observed, "1 of 2 hops unverified");

    assert!(ext.validate_at(0.7, false, NOW, 60).is_ok());
}

#[test]
fn test_validate_staleness() {
    let ext = beacon(&[0.9]);
    assert!(ext.validate_at(0.5, true, NOW + 59, 60).is_ok());

    // the bound is exclusive
    let err = ext.validate_at(0.5, true, NOW + 60, 60).unwrap_err();
    assert_eq!(err.reason(), "beacon stale");
    assert_eq!(err.observed, "60s old");
    assert_eq!(err.required, "< 60s");

    // clock behind the beacon counts as fresh
    assert!(ext.validate_at(0.5, true, NOW - 3600, 60).is_ok());
}

#[test]
fn test_validate_with_current_time() {
    let mut ext = ConsciousnessPcbExtension::new(PcbFlags::REQUIRES_AUDIT);
    ext.add_hop(1, 0.9, 963, PolicyIndex::preset(Tier::Private), true)
        .unwrap();
    assert!(ext.validate(0.85, true).is_ok());
}
