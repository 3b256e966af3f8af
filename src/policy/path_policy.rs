//! Path policy evaluation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

use super::attestation::HopAttestation;
use super::index::PolicyIndex;
use super::tiers::TierTable;
use crate::extension::{GenesisBondExtension, PacPrivacyExtension, PrivacyFlags};
use crate::tier::Tier;
use crate::violation::{fmt_coherence, Predicate, Violation};
use crate::wire::{HopField, IsdAs, Packet, PathHeader, ProtocolError};

/// Requirements a caller places on the routers a path crosses.
///
/// A policy is immutable once built; the `with_*` methods consume and
/// return it during construction. Evaluation takes `&self` and touches no
/// shared state, so one policy can serve any number of threads.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsciousnessPathPolicy {
    name: String,
    tier: Option<Tier>,
    min_coherence: f64,
    allowed_frequencies: BTreeSet<u16>,
    bond_required: bool,
    consent_required: bool,
    audit_required: bool,
    waypoint: Option<IsdAs>,
    permissive: bool,
    /// Policy bits each interface advertises.
    interface_policies: HashMap<u16, PolicyIndex>,
    /// Domain each interface belongs to, for waypoint walks.
    interface_domains: HashMap<u16, IsdAs>,
    /// Identifier each policy bit set is published under.
    policy_ids: BTreeMap<u16, String>,
}

impl ConsciousnessPathPolicy {
    /// Create a custom policy with only a coherence floor.
    ///
    /// `min_coherence` is clamped into 0.0..=1.0; NaN is treated as 1.0.
    pub fn new(name: impl Into<String>, min_coherence: f64) -> Self {
        let min_coherence = if min_coherence.is_nan() {
            1.0
        } else {
            min_coherence.clamp(0.0, 1.0)
        };
        Self {
            name: name.into(),
            tier: None,
            min_coherence,
            allowed_frequencies: BTreeSet::new(),
            bond_required: false,
            consent_required: false,
            audit_required: false,
            waypoint: None,
            permissive: true,
            interface_policies: HashMap::new(),
            interface_domains: HashMap::new(),
            policy_ids: BTreeMap::new(),
        }
    }

    /// Preset policy for a tier, built from the given threshold table.
    pub fn for_tier(tier: Tier, table: &TierTable) -> Self {
        let t = table.get(tier);
        let mut policy = Self::new(format!("{}-tier", tier), t.min_coherence)
            .with_allowed_frequencies(t.allowed_frequencies.iter().copied())
            .with_bond_required(t.bond_required)
            .with_consent_required(t.consent_required)
            .with_audit_required(t.audit_required);
        policy.tier = Some(tier);
        policy.waypoint = t.waypoint;
        let index = policy.to_policy_index();
        policy.with_policy_id(index, format!("{}-tier", tier))
    }

    /// Restrict hops to these frequencies. An empty set allows any.
    pub fn with_allowed_frequencies(mut self, frequencies: impl IntoIterator<Item = u16>) -> Self {
        self.allowed_frequencies = frequencies.into_iter().collect();
        self
    }

    pub fn with_bond_required(mut self, required: bool) -> Self {
        self.bond_required = required;
        self
    }

    pub fn with_consent_required(mut self, required: bool) -> Self {
        self.consent_required = required;
        self
    }

    pub fn with_audit_required(mut self, required: bool) -> Self {
        self.audit_required = required;
        self
    }

    /// Require the path to transit `waypoint`.
    pub fn with_waypoint(mut self, waypoint: IsdAs) -> Self {
        self.waypoint = Some(waypoint);
        self
    }

    /// Whether hops with neither an attestation nor an advertised index
    /// pass. Defaults to true.
    pub fn with_permissive(mut self, permissive: bool) -> Self {
        self.permissive = permissive;
        self
    }

    /// Record the policy bits an interface advertises.
    pub fn with_interface_policy(mut self, interface_id: u16, advertised: PolicyIndex) -> Self {
        self.interface_policies.insert(interface_id, advertised);
        self
    }

    /// Record the domain an interface belongs to.
    ///
    /// Once any domain is known, waypoint checks walk the path's hops
    /// instead of counting segments.
    pub fn with_interface_domain(mut self, interface_id: u16, domain: IsdAs) -> Self {
        self.interface_domains.insert(interface_id, domain);
        self
    }

    /// Publish an identifier for a policy bit set.
    pub fn with_policy_id(mut self, index: PolicyIndex, id: impl Into<String>) -> Self {
        self.policy_ids.insert(index.bits(), id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tier a preset policy was built for.
    pub fn tier(&self) -> Option<Tier> {
        self.tier
    }

    pub fn min_coherence(&self) -> f64 {
        self.min_coherence
    }

    pub fn allowed_frequencies(&self) -> &BTreeSet<u16> {
        &self.allowed_frequencies
    }

    pub fn bond_required(&self) -> bool {
        self.bond_required
    }

    pub fn consent_required(&self) -> bool {
        self.consent_required
    }

    pub fn audit_required(&self) -> bool {
        self.audit_required
    }

    pub fn waypoint(&self) -> Option<IsdAs> {
        self.waypoint
    }

    pub fn is_permissive(&self) -> bool {
        self.permissive
    }

    /// Identifier published for a policy bit set.
    pub fn policy_id(&self, index: PolicyIndex) -> Option<&str> {
        self.policy_ids.get(&index.bits()).map(String::as_str)
    }

    /// Project the policy's fields into its bitflag form.
    pub fn to_policy_index(&self) -> PolicyIndex {
        let mut index = PolicyIndex::required_band(self.min_coherence) | self.allowed_tiers();
        index.set(PolicyIndex::BOND_REQUIRED, self.bond_required);
        index.set(PolicyIndex::CONSENT_REQUIRED, self.consent_required);
        index.set(PolicyIndex::MANDATORY_WAYPOINT, self.waypoint.is_some());
        index.set(PolicyIndex::AUDIT_REQUIRED, self.audit_required);
        index
    }

    /// Bits an interface must advertise for an unattested hop to pass.
    ///
    /// Tier bits are alternatives and are matched separately against
    /// [`allowed_tiers`](Self::allowed_tiers). Audit and waypoint are path
    /// or packet properties and are not asked of individual routers.
    pub fn hop_requirements(&self) -> PolicyIndex {
        let mut required = PolicyIndex::required_band(self.min_coherence);
        required.set(PolicyIndex::BOND_REQUIRED, self.bond_required);
        required.set(PolicyIndex::CONSENT_REQUIRED, self.consent_required);
        required
    }

    /// Tier bits of the allowed frequencies. An interface must advertise at
    /// least one of them; empty allows any.
    pub fn allowed_tiers(&self) -> PolicyIndex {
        self.allowed_frequencies
            .iter()
            .fold(PolicyIndex::empty(), |acc, f| acc | PolicyIndex::for_frequency(*f))
    }

    /// Evaluate one hop.
    ///
    /// With an attestation: coherence, frequency membership, then bond
    /// verification when required. Without one: containment of
    /// [`hop_requirements`](Self::hop_requirements) in the interface's
    /// advertised bits, which must also name an allowed tier. With neither
    /// the hop passes if the policy is permissive.
    pub fn evaluate_hop(
        &self,
        hop: &HopField,
        attestation: Option<&HopAttestation>,
    ) -> Result<(), Violation> {
        if let Some(att) = attestation {
            return self.check_attestation(att);
        }

        match self.interface_policies.get(&hop.interface_id()) {
            Some(advertised) => self.check_advertised(*advertised),
            None if self.permissive => Ok(()),
            None => Err(Violation::new(
                Predicate::Unattested,
                "no attestation or advertised index",
                "attestation",
            )),
        }
    }

    fn check_attestation(&self, att: &HopAttestation) -> Result<(), Violation> {
        if att.coherence < self.min_coherence {
            return Err(Violation::new(
                Predicate::Coherence,
                fmt_coherence(att.coherence),
                format!(">= {}", fmt_coherence(self.min_coherence)),
            ));
        }
        if !self.allowed_frequencies.is_empty()
            && !self.allowed_frequencies.contains(&att.frequency)
        {
            return Err(Violation::new(
                Predicate::FrequencyNotAllowed,
                format!("{} Hz", att.frequency),
                format_frequencies(&self.allowed_frequencies),
            ));
        }
        if self.bond_required && !att.bond_verified {
            return Err(Violation::new(
                Predicate::BondNotVerified,
                "unverified",
                "verified",
            ));
        }
        Ok(())
    }

    fn check_advertised(&self, advertised: PolicyIndex) -> Result<(), Violation> {
        let required = self.hop_requirements();
        let missing = advertised.missing(required);

        if missing.intersects(PolicyIndex::COHERENCE_BANDS) {
            return Err(Violation::new(
                Predicate::Coherence,
                advertised.to_string(),
                required.to_string(),
            ));
        }
        let tiers = self.allowed_tiers();
        if !tiers.is_empty() && !advertised.intersects(tiers) {
            return Err(Violation::new(
                Predicate::FrequencyNotAllowed,
                advertised.to_string(),
                format!("one of {}", tiers),
            ));
        }
        if missing.contains(PolicyIndex::BOND_REQUIRED) {
            return Err(Violation::new(
                Predicate::BondNotVerified,
                advertised.to_string(),
                required.to_string(),
            ));
        }
        if missing.contains(PolicyIndex::CONSENT_REQUIRED) {
            return Err(Violation::new(
                Predicate::ConsentMissing,
                advertised.to_string(),
                required.to_string(),
            ));
        }
        Ok(())
    }

    /// Evaluate a whole path: the waypoint (if declared), then every hop
    /// in order. The first failure is returned, tagged with the hop's
    /// interface id.
    ///
    /// `attestations` is keyed by [`HopField::interface_id`].
    pub fn evaluate_path(
        &self,
        path: &PathHeader,
        attestations: &HashMap<u16, HopAttestation>,
    ) -> Result<(), Violation> {
        let result = self.check_path(path, attestations);
        if let Err(violation) = &result {
            debug!(
                policy = %self.name,
                interface = ?violation.interface,
                reason = violation.reason(),
                observed = %violation.observed,
                required = %violation.required,
                "Path denied"
            );
        }
        result
    }

    fn check_path(
        &self,
        path: &PathHeader,
        attestations: &HashMap<u16, HopAttestation>,
    ) -> Result<(), Violation> {
        if let Some(waypoint) = self.waypoint {
            self.check_waypoint(path, waypoint)?;
        }
        for hop in &path.hop_fields {
            let interface_id = hop.interface_id();
            self.evaluate_hop(hop, attestations.get(&interface_id))
                .map_err(|v| v.at_interface(interface_id))?;
        }
        Ok(())
    }

    /// With known interface domains, some hop must sit in the waypoint's
    /// domain. Without them, a path that joins more than one segment is
    /// taken to pass through a core transit domain.
    fn check_waypoint(&self, path: &PathHeader, waypoint: IsdAs) -> Result<(), Violation> {
        if !self.interface_domains.is_empty() {
            let crossed = path
                .hop_fields
                .iter()
                .filter_map(|hop| self.interface_domains.get(&hop.interface_id()));
            let mut seen = BTreeSet::new();
            for domain in crossed {
                if waypoint.matches(*domain) {
                    return Ok(());
                }
                seen.insert(*domain);
            }
            let observed = if seen.is_empty() {
                "no known domains".to_string()
            } else {
                seen.iter()
                    .map(IsdAs::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(Violation::new(
                Predicate::Waypoint,
                observed,
                format!("transit via {}", waypoint),
            ));
        }

        let segments = path.num_segments();
        if segments > 1 {
            return Ok(());
        }
        Err(Violation::new(
            Predicate::Waypoint,
            format!("{} segment", segments),
            format!("transit via {}", waypoint),
        ))
    }

    /// Consent and audit requirements against a packet's privacy
    /// extension.
    pub fn evaluate_consent(&self, privacy: Option<&PacPrivacyExtension>) -> Result<(), Violation> {
        let result = self.check_consent(privacy);
        if let Err(violation) = &result {
            debug!(
                policy = %self.name,
                reason = violation.reason(),
                observed = %violation.observed,
                "Consent denied"
            );
        }
        result
    }

    fn check_consent(&self, privacy: Option<&PacPrivacyExtension>) -> Result<(), Violation> {
        if self.consent_required {
            let ext = privacy.ok_or_else(|| {
                Violation::new(
                    Predicate::ConsentMissing,
                    "absent",
                    "privacy extension with consent",
                )
            })?;
            ext.validate_consent()?;
        }
        if self.audit_required {
            let audited =
                privacy.is_some_and(|ext| ext.flags.contains(PrivacyFlags::AUDIT_ENABLED));
            if !audited {
                return Err(Violation::new(
                    Predicate::AuditNotEnabled,
                    match privacy {
                        Some(ext) => format!("{:?}", ext.flags),
                        None => "no privacy extension".to_string(),
                    },
                    "AUDIT_ENABLED",
                ));
            }
        }
        Ok(())
    }

    /// Evaluate a parsed packet: consent, the on-packet trust extension,
    /// then the path.
    ///
    /// Corrupt extensions surface as parse errors; policy failures as
    /// [`ProtocolError::ValidationFailed`].
    pub fn evaluate_packet(
        &self,
        packet: &Packet,
        attestations: &HashMap<u16, HopAttestation>,
    ) -> Result<(), ProtocolError> {
        let privacy = packet.privacy()?;
        self.evaluate_consent(privacy.as_ref())?;

        if let Some(trust) = packet.genesis_bond()? {
            if let Err(violation) = self.check_trust(&trust) {
                debug!(
                    policy = %self.name,
                    tier = %trust.tier,
                    reason = violation.reason(),
                    "Trust extension rejected"
                );
                return Err(violation.into());
            }
        }

        match packet.header.scion_path() {
            Some(path) => self.evaluate_path(path, attestations)?,
            None => {
                if let Some(waypoint) = self.waypoint {
                    return Err(Violation::new(
                        Predicate::Waypoint,
                        "empty path",
                        format!("transit via {}", waypoint),
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    fn check_trust(&self, trust: &GenesisBondExtension) -> Result<(), Violation> {
        trust.is_valid(self.min_coherence)?;
        if !self.allowed_frequencies.is_empty()
            && !self.allowed_frequencies.contains(&trust.frequency)
        {
            return Err(Violation::new(
                Predicate::FrequencyNotAllowed,
                format!("{} Hz ({})", trust.frequency, trust.tier),
                format_frequencies(&self.allowed_frequencies),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ConsciousnessPathPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (min coherence {}, {})",
            self.name,
            fmt_coherence(self.min_coherence),
            self.to_policy_index()
        )
    }
}

fn format_frequencies(frequencies: &BTreeSet<u16>) -> String {
    let list = frequencies
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("one of {{{}}} Hz", list)
}
