//! Per-hop attestations fed into path evaluation.

use std::collections::HashMap;

use crate::beacon::{ConsciousnessPcbExtension, HopConsciousnessMetadata};
use crate::extension::GenesisBondExtension;

/// What a router claims about itself for one hop.
///
/// Attestations come from a trust extension seen on the wire, from beacon
/// hop metadata, or from an out-of-band source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HopAttestation {
    pub coherence: f64,
    pub frequency: u16,
    pub bond_verified: bool,
}

impl HopAttestation {
    pub fn new(coherence: f64, frequency: u16, bond_verified: bool) -> Self {
        Self {
            coherence,
            frequency,
            bond_verified,
        }
    }
}

/// A trust extension attests its bond when the bond id is the deployment
/// bond.
impl From<&GenesisBondExtension> for HopAttestation {
    fn from(ext: &GenesisBondExtension) -> Self {
        Self {
            coherence: ext.coherence(),
            frequency: ext.frequency,
            bond_verified: ext.validate_bond().is_ok(),
        }
    }
}

impl From<&HopConsciousnessMetadata> for HopAttestation {
    fn from(hop: &HopConsciousnessMetadata) -> Self {
        Self {
            coherence: hop.coherence(),
            frequency: hop.frequency,
            bond_verified: hop.bond_verified,
        }
    }
}

impl ConsciousnessPcbExtension {
    /// Attestation table keyed by interface id, one entry per hop record.
    ///
    /// A later record for the same interface replaces an earlier one.
    pub fn attestations(&self) -> HashMap<u16, HopAttestation> {
        self.hops()
            .iter()
            .map(|hop| (hop.interface_id, HopAttestation::from(hop)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyIndex;
    use crate::tier::Tier;

    #[test]
    fn test_from_trust_extension() {
        let ext = GenesisBondExtension::create_at(Tier::Private, 0.9, 1);
        let att = HopAttestation::from(&ext);
        assert_eq!(att.frequency, 963);
        assert!(att.bond_verified);
        assert!((att.coherence - 0.9).abs() <= 1.0 / 255.0);

        let mut forged = ext.clone();
        forged.bond_id = [0xaa; 8];
        assert!(!HopAttestation::from(&forged).bond_verified);
    }

    #[test]
    fn test_from_beacon() {
        let mut pcb = ConsciousnessPcbExtension::new_at(Default::default(), 1);
        pcb.add_hop(3, 0.8, 528, PolicyIndex::TIER_BUSINESS, true).unwrap();
        pcb.add_hop(4, 0.6, 432, PolicyIndex::TIER_PUBLIC, false).unwrap();

        let table = pcb.attestations();
        assert_eq!(table.len(), 2);
        assert_eq!(table[&3], HopAttestation::new(0.8, 528, true));
        assert_eq!(table[&4], HopAttestation::new(0.6, 432, false));
    }
}
