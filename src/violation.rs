//! Validation failures.
//!
//! A [`Violation`] is a well-formed input that fails a trust, privacy, or
//! path policy predicate. Violations are returned as values so the caller
//! decides whether to drop, log-and-allow, or escalate.

use std::fmt;

/// The predicate that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Coherence score under the required minimum.
    Coherence,
    /// Carried frequency is not the tier's canonical frequency.
    FrequencyMismatch,
    /// Frequency is outside the policy's allowed set.
    FrequencyNotAllowed,
    /// Bond identifier does not match the deployment bond.
    BondHash,
    /// Hop or path has not verified the bond.
    BondNotVerified,
    /// Personal principal hash differs from the expected identity.
    PersonalPrincipal,
    /// Service principal hash differs from the expected identity.
    ServicePrincipal,
    ConsentRevoked,
    ConsentExpired,
    ConsentPending,
    /// No consent has been requested or given.
    ConsentNone,
    /// Policy requires consent but the packet carries no privacy extension.
    ConsentMissing,
    /// Consent status cannot move to the requested state.
    ConsentTransition,
    /// Policy requires auditing but the privacy extension does not enable it.
    AuditNotEnabled,
    /// Path does not cross the mandatory waypoint.
    Waypoint,
    /// Beacon is older than the maximum age.
    Stale,
    /// Hop has neither an attestation nor an advertised policy index, and
    /// the policy is not permissive.
    Unattested,
}

impl Predicate {
    /// Stable short reason string.
    pub fn reason(self) -> &'static str {
        match self {
            Predicate::Coherence => "coherence below threshold",
            Predicate::FrequencyMismatch => "frequency does not match tier",
            Predicate::FrequencyNotAllowed => "frequency not allowed",
            Predicate::BondHash => "bond hash mismatch",
            Predicate::BondNotVerified => "bond not verified",
            Predicate::PersonalPrincipal => "personal principal mismatch",
            Predicate::ServicePrincipal => "service principal mismatch",
            Predicate::ConsentRevoked => "revoked",
            Predicate::ConsentExpired => "expired",
            Predicate::ConsentPending => "pending",
            Predicate::ConsentNone => "no consent",
            Predicate::ConsentMissing => "privacy extension missing",
            Predicate::ConsentTransition => "invalid consent transition",
            Predicate::AuditNotEnabled => "audit not enabled",
            Predicate::Waypoint => "waypoint not traversed",
            Predicate::Stale => "beacon stale",
            Predicate::Unattested => "hop not attested",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A failed validation predicate with the observed and required values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub predicate: Predicate,
    pub observed: String,
    pub required: String,
    /// Interface id of the failing hop, for path evaluations.
    pub interface: Option<u16>,
}

impl Violation {
    /// Create a violation.
    pub fn new(predicate: Predicate, observed: impl Into<String>, required: impl Into<String>) -> Self {
        Self {
            predicate,
            observed: observed.into(),
            required: required.into(),
            interface: None,
        }
    }

    /// Attribute the violation to a hop.
    pub fn at_interface(mut self, interface: u16) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Stable short reason string for the failed predicate.
    pub fn reason(&self) -> &'static str {
        self.predicate.reason()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(interface) = self.interface {
            write!(f, "hop {}: ", interface)?;
        }
        write!(
            f,
            "{} (observed {}, required {})",
            self.reason(),
            self.observed,
            self.required
        )
    }
}

impl std::error::Error for Violation {}

/// Format a coherence score the way every projection and reason does.
pub(crate) fn fmt_coherence(value: f64) -> String {
    format!("{:.3}", value)
}
