//! PolicyIndex: the 16-bit capability bitmask routers advertise per
//! interface and policies publish as their requirements.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tier::Tier;

/// Lower bound of the high coherence band.
pub const COHERENCE_HIGH_FLOOR: f64 = 0.85;
/// Lower bound of the medium coherence band.
pub const COHERENCE_MEDIUM_FLOOR: f64 = 0.70;
/// Lower bound of the low coherence band.
pub const COHERENCE_LOW_FLOOR: f64 = 0.50;

bitflags! {
    /// Policy capability/requirement bits.
    ///
    /// Coherence band bits are cumulative when advertised: a router scoring
    /// in the high band also sets the medium and low bits, so a plain
    /// containment check answers "meets at least this band".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    pub struct PolicyIndex: u16 {
        const COHERENCE_HIGH     = 0x0001;
        const COHERENCE_MEDIUM   = 0x0002;
        const COHERENCE_LOW      = 0x0004;

        const TIER_PRIVATE       = 0x0010;
        const TIER_BUSINESS      = 0x0020;
        const TIER_PUBLIC        = 0x0040;

        const BOND_REQUIRED      = 0x0100;
        const BOND_VERIFIED      = 0x0200;
        const CONSENT_REQUIRED   = 0x0400;
        const CONSENT_GRANTED    = 0x0800;
        const MANDATORY_WAYPOINT = 0x1000;
        const AUDIT_REQUIRED     = 0x2000;

        const COHERENCE_BANDS = Self::COHERENCE_HIGH.bits()
            | Self::COHERENCE_MEDIUM.bits()
            | Self::COHERENCE_LOW.bits();
        const TIERS = Self::TIER_PRIVATE.bits()
            | Self::TIER_BUSINESS.bits()
            | Self::TIER_PUBLIC.bits();
    }
}

impl PolicyIndex {
    /// Cumulative band bits an observed coherence score earns.
    pub fn for_coherence(coherence: f64) -> Self {
        let mut bits = PolicyIndex::empty();
        if coherence >= COHERENCE_LOW_FLOOR {
            bits |= PolicyIndex::COHERENCE_LOW;
        }
        if coherence >= COHERENCE_MEDIUM_FLOOR {
            bits |= PolicyIndex::COHERENCE_MEDIUM;
        }
        if coherence >= COHERENCE_HIGH_FLOOR {
            bits |= PolicyIndex::COHERENCE_HIGH;
        }
        bits
    }

    /// The single band bit a minimum coherence requirement maps to.
    ///
    /// Picks the lowest band whose floor is at or above `min_coherence`,
    /// so any router advertising that band satisfies the minimum. Minima
    /// above the high floor still map to the high band.
    pub fn required_band(min_coherence: f64) -> Self {
        if min_coherence <= 0.0 {
            PolicyIndex::empty()
        } else if min_coherence <= COHERENCE_LOW_FLOOR {
            PolicyIndex::COHERENCE_LOW
        } else if min_coherence <= COHERENCE_MEDIUM_FLOOR {
            PolicyIndex::COHERENCE_MEDIUM
        } else {
            PolicyIndex::COHERENCE_HIGH
        }
    }

    /// Tier bit for a tier.
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Private => PolicyIndex::TIER_PRIVATE,
            Tier::Business => PolicyIndex::TIER_BUSINESS,
            Tier::Public => PolicyIndex::TIER_PUBLIC,
        }
    }

    /// Tier bit for a canonical frequency; empty for unknown frequencies.
    pub fn for_frequency(frequency: u16) -> Self {
        Tier::from_frequency(frequency)
            .map(Self::for_tier)
            .unwrap_or_else(PolicyIndex::empty)
    }

    /// Canonical preset a tier's policy publishes.
    pub fn preset(tier: Tier) -> Self {
        match tier {
            Tier::Private => {
                PolicyIndex::COHERENCE_HIGH
                    | PolicyIndex::TIER_PRIVATE
                    | PolicyIndex::BOND_REQUIRED
                    | PolicyIndex::CONSENT_REQUIRED
                    | PolicyIndex::MANDATORY_WAYPOINT
                    | PolicyIndex::AUDIT_REQUIRED
            }
            Tier::Business => {
                PolicyIndex::COHERENCE_MEDIUM
                    | PolicyIndex::TIER_PRIVATE
                    | PolicyIndex::TIER_BUSINESS
                    | PolicyIndex::BOND_REQUIRED
            }
            Tier::Public => PolicyIndex::COHERENCE_LOW | PolicyIndex::TIERS,
        }
    }

    /// Whether `self` advertises every bit in `required`.
    pub fn satisfies(self, required: PolicyIndex) -> bool {
        self.contains(required)
    }

    /// Bits of `required` missing from `self`.
    pub fn missing(self, required: PolicyIndex) -> PolicyIndex {
        required.difference(self)
    }
}

impl fmt::Display for PolicyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        bitflags::parser::to_writer(self, f)
    }
}
