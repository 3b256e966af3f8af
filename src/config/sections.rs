//! Configuration subsections.
//!
//! Every leaf is optional so a higher-priority file only overrides what it
//! names. Accessors fall back to the built-in defaults.

use serde::{Deserialize, Serialize};

use crate::beacon::DEFAULT_MAX_BEACON_AGE_SECS;
use crate::policy::TierThresholds;
use crate::tier::Tier;
use crate::wire::IsdAs;

/// One tier's overrides (`tiers.<tier>.*`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Minimum coherence (`tiers.<tier>.min_coherence`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_coherence: Option<f64>,

    /// Mandatory waypoint in ISD-AS text form (`tiers.<tier>.waypoint`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoint: Option<IsdAs>,
}

impl TierConfig {
    fn merge(&mut self, other: TierConfig) {
        if other.min_coherence.is_some() {
            self.min_coherence = other.min_coherence;
        }
        if other.waypoint.is_some() {
            self.waypoint = other.waypoint;
        }
    }

    /// Apply the overrides to a tier's built-in thresholds.
    pub fn thresholds(&self, tier: Tier) -> TierThresholds {
        let mut thresholds = TierThresholds::default_for(tier);
        if let Some(min) = self.min_coherence {
            thresholds.min_coherence = min;
        }
        if self.waypoint.is_some() {
            thresholds.waypoint = self.waypoint;
        }
        thresholds
    }

    fn is_empty(&self) -> bool {
        self.min_coherence.is_none() && self.waypoint.is_none()
    }
}

/// Per-tier overrides (`tiers.*`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TiersConfig {
    #[serde(default, skip_serializing_if = "TierConfig::is_empty")]
    pub private: TierConfig,
    #[serde(default, skip_serializing_if = "TierConfig::is_empty")]
    pub business: TierConfig,
    #[serde(default, skip_serializing_if = "TierConfig::is_empty")]
    pub public: TierConfig,
}

impl TiersConfig {
    pub fn get(&self, tier: Tier) -> &TierConfig {
        match tier {
            Tier::Private => &self.private,
            Tier::Business => &self.business,
            Tier::Public => &self.public,
        }
    }

    pub(super) fn merge(&mut self, other: TiersConfig) {
        self.private.merge(other.private);
        self.business.merge(other.business);
        self.public.merge(other.public);
    }

    pub(super) fn is_empty(&self) -> bool {
        self.private.is_empty() && self.business.is_empty() && self.public.is_empty()
    }
}

/// Beacon validation (`beacon.*`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Staleness bound in seconds (`beacon.max_age_secs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u32>,
}

impl BeaconConfig {
    pub fn max_age_secs(&self) -> u32 {
        self.max_age_secs.unwrap_or(DEFAULT_MAX_BEACON_AGE_SECS)
    }

    pub(super) fn is_empty(&self) -> bool {
        self.max_age_secs.is_none()
    }
}

/// Policy evaluation (`policy.*`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Let hops with neither an attestation nor an advertised index pass
    /// (`policy.permissive_without_attestation`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissive_without_attestation: Option<bool>,
}

impl PolicyConfig {
    pub fn permissive_without_attestation(&self) -> bool {
        self.permissive_without_attestation.unwrap_or(true)
    }

    pub(super) fn is_empty(&self) -> bool {
        self.permissive_without_attestation.is_none()
    }
}
