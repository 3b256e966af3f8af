//! PAC privacy extension (end-to-end, 24 bytes).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{genesis_bond_id, truncated_hash, unix_now};
use crate::violation::{Predicate, Violation};
use crate::wire::{require, ExtensionClass, ProtocolError, RawExtension, UDP_CLASS};

/// Option type of the privacy extension.
pub const PAC_PRIVACY_OPTION_TYPE: u8 = 0x1D;

/// Encoded size in bytes.
pub const PAC_PRIVACY_EXT_SIZE: usize = 24;

/// Extension length code: (24 / 4) - 1.
pub const PAC_PRIVACY_LENGTH_CODE: u8 = 5;

const OPTION_DATA_LEN: u8 = 20;

bitflags! {
    /// Privacy handling flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PrivacyFlags: u8 {
        const REQUIRES_CONSENT  = 0b0000_0001;
        const AUDIT_ENABLED     = 0b0000_0010;
        const ENCRYPTED_PAYLOAD = 0b0000_0100;
        const SENSITIVE_DATA    = 0b0000_1000;
        const NO_PERSISTENCE    = 0b0001_0000;
        const NO_THIRD_PARTY    = 0b0010_0000;
        /// Traffic is scoped to the genesis bond. Always set on emission.
        const BOND_PROTECTED    = 0b0100_0000;
    }
}

/// Consent state carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConsentStatus {
    None = 0,
    Granted = 1,
    Revoked = 2,
    Pending = 3,
    Expired = 4,
    /// Granted subject to additional checks by the caller.
    Conditional = 5,
}

/// Outcome of a consent request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsentDecision {
    Grant,
    GrantConditional,
    Deny,
}

impl ConsentStatus {
    /// Try to convert from the wire byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ConsentStatus::None),
            1 => Some(ConsentStatus::Granted),
            2 => Some(ConsentStatus::Revoked),
            3 => Some(ConsentStatus::Pending),
            4 => Some(ConsentStatus::Expired),
            5 => Some(ConsentStatus::Conditional),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Lower-case name used in audit records.
    pub fn name(self) -> &'static str {
        match self {
            ConsentStatus::None => "none",
            ConsentStatus::Granted => "granted",
            ConsentStatus::Revoked => "revoked",
            ConsentStatus::Pending => "pending",
            ConsentStatus::Expired => "expired",
            ConsentStatus::Conditional => "conditional",
        }
    }

    fn transition(self, to: ConsentStatus, allowed: bool) -> Result<ConsentStatus, Violation> {
        if allowed {
            Ok(to)
        } else {
            Err(Violation::new(
                Predicate::ConsentTransition,
                format!("{} -> {}", self, to),
                "a permitted consent transition",
            ))
        }
    }

    /// Ask for consent. Allowed from none, and to re-issue after expiry or
    /// revocation.
    pub fn request(self) -> Result<ConsentStatus, Violation> {
        let allowed = matches!(
            self,
            ConsentStatus::None | ConsentStatus::Expired | ConsentStatus::Revoked
        );
        self.transition(ConsentStatus::Pending, allowed)
    }

    /// Apply the principal's answer to a pending request. A denial lands in
    /// `Revoked`.
    pub fn respond(self, decision: ConsentDecision) -> Result<ConsentStatus, Violation> {
        let to = match decision {
            ConsentDecision::Grant => ConsentStatus::Granted,
            ConsentDecision::GrantConditional => ConsentStatus::Conditional,
            ConsentDecision::Deny => ConsentStatus::Revoked,
        };
        self.transition(to, self == ConsentStatus::Pending)
    }

    /// Withdraw consent or a pending request.
    pub fn revoke(self) -> Result<ConsentStatus, Violation> {
        let allowed = matches!(
            self,
            ConsentStatus::Granted | ConsentStatus::Conditional | ConsentStatus::Pending
        );
        self.transition(ConsentStatus::Revoked, allowed)
    }

    /// Mark granted consent as past its validity window.
    pub fn expire(self) -> Result<ConsentStatus, Violation> {
        let allowed = matches!(self, ConsentStatus::Granted | ConsentStatus::Conditional);
        self.transition(ConsentStatus::Expired, allowed)
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An allowing consent outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsentGrant {
    Granted,
    /// Allowed, but the caller must apply its own additional checks.
    Conditional,
}

impl ConsentGrant {
    /// Short reason string.
    pub fn reason(self) -> &'static str {
        match self {
            ConsentGrant::Granted => "consent granted",
            ConsentGrant::Conditional => "conditional consent, additional checks required",
        }
    }
}

/// Structured projection for the append-only audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub consent_status: ConsentStatus,
    pub flags: PrivacyFlags,
    /// Hex of the hashed personal principal.
    pub personal_hash: String,
    /// Hex of the hashed service principal.
    pub service_hash: String,
    /// Emission time, Unix seconds.
    pub timestamp: u32,
    /// Hex of the bond id, present when the traffic is bond-protected.
    pub bond_id: Option<String>,
}

/// Privacy/consent extension.
///
/// ## Wire Format
///
/// | Offset | Field         | Size    | Description                      |
/// |--------|---------------|---------|----------------------------------|
/// | 0      | next_header   | 1 byte  | Following header                 |
/// | 1      | ext_len       | 1 byte  | 5 ((24 / 4) - 1)                 |
/// | 2      | option_type   | 1 byte  | 0x1D                             |
/// | 3      | opt_data_len  | 1 byte  | 20                               |
/// | 4      | flags         | 1 byte  | [`PrivacyFlags`]                 |
/// | 5      | consent       | 1 byte  | [`ConsentStatus`]                |
/// | 6      | reserved      | 2 bytes | Zero                             |
/// | 8      | personal_hash | 8 bytes | Truncated SHA-256 of principal   |
/// | 16     | service_hash  | 8 bytes | Truncated SHA-256 of service     |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacPrivacyExtension {
    pub next_header: u8,
    pub flags: PrivacyFlags,
    pub consent: ConsentStatus,
    pub personal_hash: [u8; 8],
    pub service_hash: [u8; 8],
}

/// Hash a principal identifier into its 8-byte wire form.
pub fn hash_principal(identity: &str) -> [u8; 8] {
    truncated_hash(identity.as_bytes())
}

impl PacPrivacyExtension {
    /// Create an extension for bond-scoped traffic.
    ///
    /// Both identities are hashed; `BOND_PROTECTED` is always set.
    pub fn create(consent: ConsentStatus, personal: &str, service: &str, flags: PrivacyFlags) -> Self {
        Self {
            next_header: UDP_CLASS,
            flags: flags | PrivacyFlags::BOND_PROTECTED,
            consent,
            personal_hash: hash_principal(personal),
            service_hash: hash_principal(service),
        }
    }

    /// Encode as a 24-byte extension block.
    pub fn encode(&self) -> [u8; PAC_PRIVACY_EXT_SIZE] {
        let mut buf = [0u8; PAC_PRIVACY_EXT_SIZE];
        buf[0] = self.next_header;
        buf[1] = PAC_PRIVACY_LENGTH_CODE;
        buf[2] = PAC_PRIVACY_OPTION_TYPE;
        buf[3] = OPTION_DATA_LEN;
        buf[4] = self.flags.bits();
        buf[5] = self.consent.to_byte();
        buf[8..16].copy_from_slice(&self.personal_hash);
        buf[16..24].copy_from_slice(&self.service_hash);
        buf
    }

    /// Wrap the encoded block for a packet's extension chain.
    pub fn to_raw(&self) -> RawExtension {
        RawExtension::from_encoded(ExtensionClass::EndToEnd, self.encode())
    }

    /// Decode from the start of `buf`, returning the remaining bytes.
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        require(buf, "privacy extension", PAC_PRIVACY_EXT_SIZE)?;

        if buf[2] != PAC_PRIVACY_OPTION_TYPE {
            return Err(ProtocolError::WrongOptionType {
                expected: PAC_PRIVACY_OPTION_TYPE,
                got: buf[2],
            });
        }
        if buf[1] != PAC_PRIVACY_LENGTH_CODE || buf[3] != OPTION_DATA_LEN {
            return Err(ProtocolError::MalformedHeader(format!(
                "privacy extension length code {} / option length {}, expected {} / {}",
                buf[1], buf[3], PAC_PRIVACY_LENGTH_CODE, OPTION_DATA_LEN
            )));
        }
        let consent = ConsentStatus::from_byte(buf[5]).ok_or_else(|| {
            ProtocolError::MalformedHeader(format!("unknown consent status 0x{:02x}", buf[5]))
        })?;

        let mut personal_hash = [0u8; 8];
        personal_hash.copy_from_slice(&buf[8..16]);
        let mut service_hash = [0u8; 8];
        service_hash.copy_from_slice(&buf[16..24]);

        let ext = Self {
            next_header: buf[0],
            flags: PrivacyFlags::from_bits_retain(buf[4]),
            consent,
            personal_hash,
            service_hash,
        };
        Ok((ext, &buf[PAC_PRIVACY_EXT_SIZE..]))
    }

    /// Check the consent state.
    pub fn validate_consent(&self) -> Result<ConsentGrant, Violation> {
        let denied = match self.consent {
            ConsentStatus::Granted => return Ok(ConsentGrant::Granted),
            ConsentStatus::Conditional => return Ok(ConsentGrant::Conditional),
            ConsentStatus::Revoked => Predicate::ConsentRevoked,
            ConsentStatus::Expired => Predicate::ConsentExpired,
            ConsentStatus::Pending => Predicate::ConsentPending,
            ConsentStatus::None => Predicate::ConsentNone,
        };
        Err(Violation::new(denied, self.consent.name(), "granted or conditional"))
    }

    /// Check both principals against the expected identities, then consent.
    pub fn is_valid(&self, expected_personal: &str, expected_service: &str) -> Result<ConsentGrant, Violation> {
        let personal = hash_principal(expected_personal);
        if self.personal_hash != personal {
            return Err(Violation::new(
                Predicate::PersonalPrincipal,
                hex::encode(self.personal_hash),
                hex::encode(personal),
            ));
        }
        let service = hash_principal(expected_service);
        if self.service_hash != service {
            return Err(Violation::new(
                Predicate::ServicePrincipal,
                hex::encode(self.service_hash),
                hex::encode(service),
            ));
        }
        self.validate_consent()
    }

    /// Audit record stamped with the current time.
    pub fn to_audit_record(&self) -> AuditRecord {
        self.to_audit_record_at(unix_now())
    }

    /// Audit record with an explicit emission time.
    pub fn to_audit_record_at(&self, timestamp: u32) -> AuditRecord {
        AuditRecord {
            consent_status: self.consent,
            flags: self.flags,
            personal_hash: hex::encode(self.personal_hash),
            service_hash: hex::encode(self.service_hash),
            timestamp,
            bond_id: self
                .flags
                .contains(PrivacyFlags::BOND_PROTECTED)
                .then(|| hex::encode(genesis_bond_id())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(consent: ConsentStatus) -> PacPrivacyExtension {
        PacPrivacyExtension::create(
            consent,
            "alice@example",
            "photo-sync",
            PrivacyFlags::REQUIRES_CONSENT | PrivacyFlags::AUDIT_ENABLED,
        )
    }

    #[test]
    fn test_create_sets_bond_protected() {
        let e = PacPrivacyExtension::create(ConsentStatus::None, "a", "b", PrivacyFlags::empty());
        assert!(e.flags.contains(PrivacyFlags::BOND_PROTECTED));
        assert_eq!(e.personal_hash, hash_principal("a"));
    }

    #[test]
    fn test_roundtrip() {
        let e = ext(ConsentStatus::Conditional);
        let buf = e.encode();
        assert_eq!(buf.len(), 24);
        assert_eq!(buf[1], 5);
        assert_eq!(buf[3], 20);
        assert_eq!(&buf[6..8], &[0, 0]);
        let (decoded, rest) = PacPrivacyExtension::decode(&buf).unwrap();
        assert_eq!(decoded, e);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_unknown_flag_bits_preserved() {
        let mut buf = ext(ConsentStatus::Granted).encode();
        buf[4] |= 0x80;
        let (decoded, _) = PacPrivacyExtension::decode(&buf).unwrap();
        assert_eq!(decoded.encode(), buf);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            PacPrivacyExtension::decode(&[0u8; 23]),
            Err(ProtocolError::InsufficientData { expected: 24, .. })
        ));

        let mut buf = ext(ConsentStatus::Granted).encode();
        buf[2] = 0x1C;
        assert!(matches!(
            PacPrivacyExtension::decode(&buf),
            Err(ProtocolError::WrongOptionType { expected: 0x1D, got: 0x1C })
        ));

        let mut buf = ext(ConsentStatus::Granted).encode();
        buf[5] = 9;
        assert!(matches!(
            PacPrivacyExtension::decode(&buf),
            Err(ProtocolError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_validate_consent_states() {
        assert_eq!(
            ext(ConsentStatus::Granted).validate_consent(),
            Ok(ConsentGrant::Granted)
        );
        assert_eq!(
            ext(ConsentStatus::Conditional).validate_consent(),
            Ok(ConsentGrant::Conditional)
        );
        assert_ne!(ConsentGrant::Conditional.reason(), ConsentGrant::Granted.reason());

        let cases = [
            (ConsentStatus::Revoked, "revoked"),
            (ConsentStatus::Expired, "expired"),
            (ConsentStatus::Pending, "pending"),
            (ConsentStatus::None, "no consent"),
        ];
        for (status, reason) in cases {
            let v = ext(status).validate_consent().unwrap_err();
            assert_eq!(v.reason(), reason);
        }
    }

    #[test]
    fn test_revoked_denied_regardless_of_flags() {
        for bits in 0..=0x7fu8 {
            let mut e = ext(ConsentStatus::Revoked);
            e.flags = PrivacyFlags::from_bits_retain(bits);
            assert_eq!(e.validate_consent().unwrap_err().reason(), "revoked");
        }
    }

    #[test]
    fn test_is_valid_checks_principals_first() {
        let e = ext(ConsentStatus::Revoked);
        assert_eq!(
            e.is_valid("mallory", "photo-sync").unwrap_err().predicate,
            Predicate::PersonalPrincipal
        );
        assert_eq!(
            e.is_valid("alice@example", "ads").unwrap_err().predicate,
            Predicate::ServicePrincipal
        );
        assert_eq!(
            e.is_valid("alice@example", "photo-sync").unwrap_err().predicate,
            Predicate::ConsentRevoked
        );
        assert_eq!(
            ext(ConsentStatus::Granted).is_valid("alice@example", "photo-sync"),
            Ok(ConsentGrant::Granted)
        );
    }

    #[test]
    fn test_audit_record() {
        let e = ext(ConsentStatus::Granted);
        let record = e.to_audit_record_at(1_700_000_000);
        assert_eq!(record.consent_status, ConsentStatus::Granted);
        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.personal_hash, hex::encode(hash_principal("alice@example")));
        assert_eq!(record.bond_id, Some(hex::encode(genesis_bond_id())));
        assert!(record.flags.contains(PrivacyFlags::AUDIT_ENABLED));

        let mut unbonded = e.clone();
        unbonded.flags.remove(PrivacyFlags::BOND_PROTECTED);
        assert_eq!(unbonded.to_audit_record_at(0).bond_id, None);
    }

    #[test]
    fn test_consent_lifecycle() {
        let status = ConsentStatus::None.request().unwrap();
        assert_eq!(status, ConsentStatus::Pending);
        let status = status.respond(ConsentDecision::Grant).unwrap();
        assert_eq!(status, ConsentStatus::Granted);
        let status = status.expire().unwrap();
        assert_eq!(status, ConsentStatus::Expired);
        let status = status.request().unwrap();
        let status = status.respond(ConsentDecision::Deny).unwrap();
        assert_eq!(status, ConsentStatus::Revoked);

        assert_eq!(
            ConsentStatus::Granted.request().unwrap_err().predicate,
            Predicate::ConsentTransition
        );
        assert!(ConsentStatus::None.respond(ConsentDecision::Grant).is_err());
        assert!(ConsentStatus::None.revoke().is_err());
        assert!(ConsentStatus::Pending.expire().is_err());
        assert_eq!(
            ConsentStatus::Conditional.revoke(),
            Ok(ConsentStatus::Revoked)
        );
    }
}
