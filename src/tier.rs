//! Trust tiers and their canonical frequencies.
//!
//! Each tier is bound one-to-one to a frequency tag. The table below is the
//! single canonical mapping; any other tier/frequency pairing is rejected
//! as a mismatch rather than accepted as an alias.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical frequency of the private tier (Hz).
pub const PRIVATE_FREQUENCY: u16 = 963;

/// Canonical frequency of the business tier (Hz).
pub const BUSINESS_FREQUENCY: u16 = 528;

/// Canonical frequency of the public tier (Hz).
pub const PUBLIC_FREQUENCY: u16 = 432;

/// Named trust tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Tier {
    /// Personal traffic: consent-scoped, audited, waypoint-routed.
    Private = 0x01,
    Business = 0x02,
    Public = 0x03,
}

impl Tier {
    /// All tiers, strictest first.
    pub const ALL: [Tier; 3] = [Tier::Private, Tier::Business, Tier::Public];

    /// Try to convert from the wire byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Tier::Private),
            0x02 => Some(Tier::Business),
            0x03 => Some(Tier::Public),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Canonical frequency tag.
    pub const fn frequency(self) -> u16 {
        match self {
            Tier::Private => PRIVATE_FREQUENCY,
            Tier::Business => BUSINESS_FREQUENCY,
            Tier::Public => PUBLIC_FREQUENCY,
        }
    }

    /// The tier a canonical frequency belongs to.
    pub fn from_frequency(frequency: u16) -> Option<Self> {
        Tier::ALL.into_iter().find(|t| t.frequency() == frequency)
    }

    /// Lower-case tier name used in header maps and audit records.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Private => "private",
            Tier::Business => "business",
            Tier::Public => "public",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tier: {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_frequency_bijection() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_frequency(tier.frequency()), Some(tier));
            assert_eq!(Tier::from_byte(tier.to_byte()), Some(tier));
        }
        assert_eq!(Tier::from_frequency(440), None);
        assert_eq!(Tier::from_byte(0), None);
    }

    #[test]
    fn test_tier_names() {
        assert_eq!("private".parse::<Tier>().unwrap(), Tier::Private);
        assert_eq!("PUBLIC".parse::<Tier>().unwrap(), Tier::Public);
        assert!("gold".parse::<Tier>().is_err());
        assert_eq!(Tier::Business.to_string(), "business");
    }
}
