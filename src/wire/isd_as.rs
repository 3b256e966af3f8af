//! ISD-AS identifiers: 16-bit isolation domain + 48-bit AS number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ProtocolError;

/// Largest AS number representable in 48 bits.
pub const MAX_AS: u64 = (1 << 48) - 1;

/// AS numbers below this bound are rendered in decimal (BGP range).
const BGP_AS_MAX: u64 = u32::MAX as u64;

/// A packed ISD-AS identifier.
///
/// Stored as the 8-byte big-endian wire value: the upper 16 bits carry the
/// ISD, the lower 48 bits the AS number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IsdAs(u64);

impl IsdAs {
    /// Wire size in bytes.
    pub const WIRE_SIZE: usize = 8;

    /// Wildcard value (ISD 0, AS 0).
    pub const WILDCARD: IsdAs = IsdAs(0);

    /// Build from ISD and AS parts. The AS is masked to 48 bits.
    pub const fn new(isd: u16, asn: u64) -> Self {
        Self(((isd as u64) << 48) | (asn & MAX_AS))
    }

    /// Build from the packed 64-bit value.
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// The packed 64-bit value.
    pub const fn to_u64(self) -> u64 {
        self.0
    }

    /// The isolation domain.
    pub const fn isd(self) -> u16 {
        (self.0 >> 48) as u16
    }

    /// The 48-bit AS number.
    pub const fn asn(self) -> u64 {
        self.0 & MAX_AS
    }

    /// Whether `other` falls under this pattern. A zero ISD or AS part
    /// matches any value in that position.
    pub fn matches(self, other: IsdAs) -> bool {
        (self.isd() == 0 || self.isd() == other.isd())
            && (self.asn() == 0 || self.asn() == other.asn())
    }

    /// Decode from the first 8 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        super::error::require(buf, "ISD-AS", Self::WIRE_SIZE)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[..8]);
        Ok(Self(u64::from_be_bytes(bytes)))
    }

    /// Append the wire form to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0.to_be_bytes());
    }
}

impl fmt::Debug for IsdAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IsdAs({})", self)
    }
}

impl fmt::Display for IsdAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let asn = self.asn();
        if asn <= BGP_AS_MAX {
            write!(f, "{}-{}", self.isd(), asn)
        } else {
            write!(
                f,
                "{}-{:x}:{:x}:{:x}",
                self.isd(),
                (asn >> 32) & 0xffff,
                (asn >> 16) & 0xffff,
                asn & 0xffff
            )
        }
    }
}

impl FromStr for IsdAs {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ProtocolError::MalformedHeader(format!("invalid ISD-AS: {s:?}"));

        let (isd, asn) = s.split_once('-').ok_or_else(bad)?;
        let isd: u16 = isd.parse().map_err(|_| bad())?;

        let asn = if asn.contains(':') {
            let groups: Vec<&str> = asn.split(':').collect();
            if groups.len() != 3 {
                return Err(bad());
            }
            let mut value = 0u64;
            for group in groups {
                let part = u16::from_str_radix(group, 16).map_err(|_| bad())?;
                value = (value << 16) | part as u64;
            }
            value
        } else {
            let value: u64 = asn.parse().map_err(|_| bad())?;
            if value > BGP_AS_MAX {
                return Err(bad());
            }
            value
        };

        Ok(Self::new(isd, asn))
    }
}

impl TryFrom<String> for IsdAs {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IsdAs> for String {
    fn from(value: IsdAs) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isd_as_parts() {
        let ia = IsdAs::new(1, 0xff00_0000_0110);
        assert_eq!(ia.isd(), 1);
        assert_eq!(ia.asn(), 0xff00_0000_0110);
        assert_eq!(ia.to_u64(), 0x0001_ff00_0000_0110);
    }

    #[test]
    fn test_isd_as_display() {
        assert_eq!(IsdAs::new(1, 0xff00_0000_0110).to_string(), "1-ff00:0:110");
        assert_eq!(IsdAs::new(64, 559).to_string(), "64-559");
    }

    #[test]
    fn test_isd_as_parse() {
        let ia: IsdAs = "1-ff00:0:110".parse().unwrap();
        assert_eq!(ia, IsdAs::new(1, 0xff00_0000_0110));

        let ia: IsdAs = "64-559".parse().unwrap();
        assert_eq!(ia, IsdAs::new(64, 559));
    }

    #[test]
    fn test_isd_as_parse_rejects_garbage() {
        assert!("".parse::<IsdAs>().is_err());
        assert!("1".parse::<IsdAs>().is_err());
        assert!("1-ff00:0".parse::<IsdAs>().is_err());
        assert!("1-zz:0:1".parse::<IsdAs>().is_err());
        assert!("70000-1".parse::<IsdAs>().is_err());
        assert!("1-4294967296".parse::<IsdAs>().is_err());
    }

    #[test]
    fn test_isd_as_wildcard_match() {
        let core = IsdAs::new(1, 0xff00_0000_0110);
        assert!(core.matches(core));
        assert!(IsdAs::WILDCARD.matches(core));
        assert!(IsdAs::new(1, 0).matches(core));
        assert!(!IsdAs::new(2, 0).matches(core));
        assert!(!core.matches(IsdAs::new(1, 0xff00_0000_0111)));
    }

    #[test]
    fn test_isd_as_wire() {
        let ia = IsdAs::new(2, 0xff00_0000_0222);
        let mut buf = Vec::new();
        ia.encode(&mut buf);
        assert_eq!(buf.len(), IsdAs::WIRE_SIZE);
        assert_eq!(IsdAs::decode(&buf).unwrap(), ia);
        assert!(IsdAs::decode(&buf[..7]).is_err());
    }
}
