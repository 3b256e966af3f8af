//! SCION common header (12 bytes).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Version| TrafficClass  |                FlowID                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    NextHdr    |    HdrLen     |          PayloadLen           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    PathType   |DT |DL |ST |SL |              RSV              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::fmt;

use super::error::require;
use super::ProtocolError;

/// Common header size in bytes.
pub const COMMON_HEADER_SIZE: usize = 12;

/// The only supported SCION version.
pub const SCION_VERSION: u8 = 0;

/// Maximum flow id (20 bits).
pub const MAX_FLOW_ID: u32 = (1 << 20) - 1;

/// Next-header code for a hop-by-hop options extension.
pub const HOP_BY_HOP_CLASS: u8 = 200;

/// Next-header code for an end-to-end options extension.
pub const END_TO_END_CLASS: u8 = 201;

/// Next-header code for UDP/SCION.
pub const UDP_CLASS: u8 = 17;

/// Path type codes carried in the common header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PathType {
    /// No path; intra-AS traffic.
    Empty = 0,
    /// Standard SCION path (info fields + hop fields).
    Scion = 1,
}

impl PathType {
    /// Try to convert from a byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(PathType::Empty),
            1 => Some(PathType::Scion),
            _ => None,
        }
    }

    /// Convert to a byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathType::Empty => "Empty",
            PathType::Scion => "SCION",
        };
        write!(f, "{}", name)
    }
}

/// Host address length in bytes for a 2-bit length code.
pub fn addr_len_bytes(code: u8) -> usize {
    ((code & 0x03) as usize + 1) * 4
}

/// 2-bit length code for a host address of `len` bytes, if representable.
pub fn addr_len_code(len: usize) -> Option<u8> {
    match len {
        4 => Some(0),
        8 => Some(1),
        12 => Some(2),
        16 => Some(3),
        _ => None,
    }
}

/// Parsed SCION common header.
///
/// `header_len` is in 4-byte units and covers common + address + path
/// headers. The address type/length fields are the raw 2-bit codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommonHeader {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_id: u32,
    pub next_header: u8,
    pub header_len: u8,
    pub payload_len: u16,
    pub path_type: PathType,
    pub dst_addr_type: u8,
    pub dst_addr_len: u8,
    pub src_addr_type: u8,
    pub src_addr_len: u8,
    /// Reserved bits, preserved for round-trips.
    pub reserved: u16,
}

impl CommonHeader {
    /// Header length in bytes.
    pub fn header_len_bytes(&self) -> usize {
        self.header_len as usize * 4
    }

    /// Destination host address length in bytes.
    pub fn dst_host_len(&self) -> usize {
        addr_len_bytes(self.dst_addr_len)
    }

    /// Source host address length in bytes.
    pub fn src_host_len(&self) -> usize {
        addr_len_bytes(self.src_addr_len)
    }

    /// Decode from the first 12 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, "common header", COMMON_HEADER_SIZE)?;

        let word0 = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let version = (word0 >> 28) as u8;
        if version != SCION_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let traffic_class = ((word0 >> 20) & 0xff) as u8;
        let flow_id = word0 & MAX_FLOW_ID;

        let next_header = buf[4];
        let header_len = buf[5];
        let payload_len = u16::from_be_bytes([buf[6], buf[7]]);

        let path_type =
            PathType::from_byte(buf[8]).ok_or(ProtocolError::UnsupportedPathType(buf[8]))?;
        let addr = buf[9];
        let reserved = u16::from_be_bytes([buf[10], buf[11]]);

        Ok(Self {
            version,
            traffic_class,
            flow_id,
            next_header,
            header_len,
            payload_len,
            path_type,
            dst_addr_type: (addr >> 6) & 0x03,
            dst_addr_len: (addr >> 4) & 0x03,
            src_addr_type: (addr >> 2) & 0x03,
            src_addr_len: addr & 0x03,
            reserved,
        })
    }

    /// Append the 12-byte wire form to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        if self.version != SCION_VERSION {
            return Err(ProtocolError::UnsupportedVersion(self.version));
        }
        if self.flow_id > MAX_FLOW_ID {
            return Err(ProtocolError::MalformedHeader(format!(
                "flow id {} exceeds 20 bits",
                self.flow_id
            )));
        }
        if [
            self.dst_addr_type,
            self.dst_addr_len,
            self.src_addr_type,
            self.src_addr_len,
        ]
        .iter()
        .any(|code| *code > 0x03)
        {
            return Err(ProtocolError::MalformedHeader(
                "address type/length code exceeds 2 bits".into(),
            ));
        }

        let word0 = ((self.version as u32) << 28)
            | ((self.traffic_class as u32) << 20)
            | self.flow_id;
        buf.extend_from_slice(&word0.to_be_bytes());
        buf.push(self.next_header);
        buf.push(self.header_len);
        buf.extend_from_slice(&self.payload_len.to_be_bytes());
        buf.push(self.path_type.to_byte());
        buf.push(
            (self.dst_addr_type << 6)
                | (self.dst_addr_len << 4)
                | (self.src_addr_type << 2)
                | self.src_addr_len,
        );
        buf.extend_from_slice(&self.reserved.to_be_bytes());
        Ok(())
    }
}

impl Default for CommonHeader {
    fn default() -> Self {
        Self {
            version: SCION_VERSION,
            traffic_class: 0,
            flow_id: 1,
            next_header: UDP_CLASS,
            header_len: 0,
            payload_len: 0,
            path_type: PathType::Scion,
            dst_addr_type: 0,
            dst_addr_len: 0,
            src_addr_type: 0,
            src_addr_len: 0,
            reserved: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommonHeader {
        CommonHeader {
            traffic_class: 0xb8,
            flow_id: 0xabcde,
            next_header: HOP_BY_HOP_CLASS,
            header_len: 17,
            payload_len: 1200,
            dst_addr_len: 3,
            src_addr_type: 1,
            ..CommonHeader::default()
        }
    }

    #[test]
    fn test_common_header_bit_packing() {
        let mut buf = Vec::new();
        sample().encode(&mut buf).unwrap();

        assert_eq!(buf.len(), COMMON_HEADER_SIZE);
        // version 0, tc 0xb8, flow 0xabcde
        assert_eq!(&buf[0..4], &[0x0b, 0x8a, 0xbc, 0xde]);
        assert_eq!(buf[4], HOP_BY_HOP_CLASS);
        assert_eq!(buf[5], 17);
        assert_eq!(&buf[6..8], &1200u16.to_be_bytes());
        assert_eq!(buf[8], 1);
        // DT=0 DL=3 ST=1 SL=0
        assert_eq!(buf[9], 0b0011_0100);
    }

    #[test]
    fn test_common_header_roundtrip() {
        let header = sample();
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(CommonHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_common_header_rejects_version() {
        let mut buf = Vec::new();
        sample().encode(&mut buf).unwrap();
        buf[0] |= 0x10;
        assert_eq!(
            CommonHeader::decode(&buf),
            Err(ProtocolError::UnsupportedVersion(1))
        );
    }

    #[test]
    fn test_common_header_rejects_path_type() {
        let mut buf = Vec::new();
        sample().encode(&mut buf).unwrap();
        buf[8] = 4;
        assert_eq!(
            CommonHeader::decode(&buf),
            Err(ProtocolError::UnsupportedPathType(4))
        );
    }

    #[test]
    fn test_common_header_truncated() {
        let err = CommonHeader::decode(&[0u8; 11]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InsufficientData { expected: 12, got: 11, .. }
        ));
    }

    #[test]
    fn test_common_header_rejects_wide_flow_id() {
        let header = CommonHeader {
            flow_id: MAX_FLOW_ID + 1,
            ..sample()
        };
        assert!(header.encode(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_addr_len_codes() {
        assert_eq!(addr_len_bytes(0), 4);
        assert_eq!(addr_len_bytes(3), 16);
        assert_eq!(addr_len_code(16), Some(3));
        assert_eq!(addr_len_code(5), None);
    }
}
