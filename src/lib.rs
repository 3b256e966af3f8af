//! conscious-scion: consciousness-aware SCION dataplane extensions
//!
//! Pure encode/decode/evaluate logic over byte buffers: the SCION header
//! codec, trust and privacy extension headers, per-hop beacon metadata,
//! and a bitflag-indexed path policy engine.

pub mod beacon;
pub mod config;
pub mod extension;
pub mod policy;
pub mod tier;
pub mod violation;
pub mod wire;

// Re-export wire types
pub use wire::{
    AddressHeader, CommonHeader, ExtensionClass, HopField, InfoField, IsdAs, Packet, Path,
    PathHeader, PathType, ProtocolError, RawExtension, ScionHeader,
};

// Re-export extension types
pub use extension::{
    genesis_bond_id, AuditRecord, ConsentDecision, ConsentGrant, ConsentStatus, Extension,
    GenesisBondExtension, PacPrivacyExtension, PrivacyFlags,
};

// Re-export beacon types
pub use beacon::{ConsciousnessPcbExtension, HopConsciousnessMetadata, PcbFlags};

// Re-export policy types
pub use policy::{ConsciousnessPathPolicy, HopAttestation, PolicyIndex, TierTable, TierThresholds};

// Re-export config types
pub use config::{Config, ConfigError};

pub use tier::Tier;
pub use violation::{Predicate, Violation};
