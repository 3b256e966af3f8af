//! Tier threshold table.
//!
//! The table is a plain value built once (from defaults or configuration)
//! and passed into policy construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::index::{COHERENCE_HIGH_FLOOR, COHERENCE_LOW_FLOOR, COHERENCE_MEDIUM_FLOOR};
use crate::tier::{Tier, BUSINESS_FREQUENCY, PRIVATE_FREQUENCY, PUBLIC_FREQUENCY};
use crate::wire::IsdAs;

/// Default mandatory waypoint of the private tier.
pub const DEFAULT_PRIVATE_WAYPOINT: IsdAs = IsdAs::new(1, 0xff00_0000_0110);

/// Requirements one tier's preset policy enforces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub min_coherence: f64,
    /// Frequencies accepted on a hop. Stricter tiers accept fewer.
    pub allowed_frequencies: BTreeSet<u16>,
    pub bond_required: bool,
    pub consent_required: bool,
    pub audit_required: bool,
    pub waypoint: Option<IsdAs>,
}

impl TierThresholds {
    /// Built-in thresholds for a tier.
    pub fn default_for(tier: Tier) -> Self {
        match tier {
            Tier::Private => Self {
                min_coherence: COHERENCE_HIGH_FLOOR,
                allowed_frequencies: BTreeSet::from([PRIVATE_FREQUENCY]),
                bond_required: true,
                consent_required: true,
                audit_required: true,
                waypoint: Some(DEFAULT_PRIVATE_WAYPOINT),
            },
            Tier::Business => Self {
                min_coherence: COHERENCE_MEDIUM_FLOOR,
                allowed_frequencies: BTreeSet::from([BUSINESS_FREQUENCY, PRIVATE_FREQUENCY]),
                bond_required: true,
                consent_required: false,
                audit_required: false,
                waypoint: None,
            },
            Tier::Public => Self {
                min_coherence: COHERENCE_LOW_FLOOR,
                allowed_frequencies: BTreeSet::from([
                    PUBLIC_FREQUENCY,
                    BUSINESS_FREQUENCY,
                    PRIVATE_FREQUENCY,
                ]),
                bond_required: false,
                consent_required: false,
                audit_required: false,
                waypoint: None,
            },
        }
    }
}

/// Thresholds for all three tiers.
#[derive(Clone, Debug, PartialEq)]
pub struct TierTable {
    private: TierThresholds,
    business: TierThresholds,
    public: TierThresholds,
}

impl TierTable {
    pub fn new(private: TierThresholds, business: TierThresholds, public: TierThresholds) -> Self {
        Self {
            private,
            business,
            public,
        }
    }

    /// Thresholds for a tier.
    pub fn get(&self, tier: Tier) -> &TierThresholds {
        match tier {
            Tier::Private => &self.private,
            Tier::Business => &self.business,
            Tier::Public => &self.public,
        }
    }

    /// Replace one tier's thresholds.
    pub fn with(mut self, tier: Tier, thresholds: TierThresholds) -> Self {
        match tier {
            Tier::Private => self.private = thresholds,
            Tier::Business => self.business = thresholds,
            Tier::Public => self.public = thresholds,
        }
        self
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::new(
            TierThresholds::default_for(Tier::Private),
            TierThresholds::default_for(Tier::Business),
            TierThresholds::default_for(Tier::Public),
        )
    }
}
