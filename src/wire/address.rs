//! SCION address header: ISD-AS pair plus variable-length host addresses.

use super::common::{addr_len_bytes, addr_len_code};
use super::error::require;
use super::{IsdAs, ProtocolError};

/// Parsed SCION address header.
///
/// Host address lengths are not self-describing on the wire; they come
/// from the DL/SL codes in the common header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressHeader {
    pub dst_ia: IsdAs,
    pub src_ia: IsdAs,
    pub dst_host: Vec<u8>,
    pub src_host: Vec<u8>,
}

impl AddressHeader {
    /// Create an address header with IPv4/IPv6-sized host addresses.
    pub fn new(dst_ia: IsdAs, dst_host: Vec<u8>, src_ia: IsdAs, src_host: Vec<u8>) -> Self {
        Self {
            dst_ia,
            src_ia,
            dst_host,
            src_host,
        }
    }

    /// Encoded size in bytes.
    pub fn wire_size(&self) -> usize {
        2 * IsdAs::WIRE_SIZE + self.dst_host.len() + self.src_host.len()
    }

    /// Encoded size for the given DL/SL codes.
    pub fn wire_size_for(dst_len_code: u8, src_len_code: u8) -> usize {
        2 * IsdAs::WIRE_SIZE + addr_len_bytes(dst_len_code) + addr_len_bytes(src_len_code)
    }

    /// DL code for the destination host address.
    pub fn dst_len_code(&self) -> Result<u8, ProtocolError> {
        host_code(&self.dst_host, "destination")
    }

    /// SL code for the source host address.
    pub fn src_len_code(&self) -> Result<u8, ProtocolError> {
        host_code(&self.src_host, "source")
    }

    /// Decode using the DL/SL codes from the common header.
    pub fn decode(buf: &[u8], dst_len_code: u8, src_len_code: u8) -> Result<Self, ProtocolError> {
        let dst_len = addr_len_bytes(dst_len_code);
        let src_len = addr_len_bytes(src_len_code);
        require(
            buf,
            "address header",
            Self::wire_size_for(dst_len_code, src_len_code),
        )?;

        let dst_ia = IsdAs::decode(&buf[0..8])?;
        let src_ia = IsdAs::decode(&buf[8..16])?;
        let mut offset = 16;
        let dst_host = buf[offset..offset + dst_len].to_vec();
        offset += dst_len;
        let src_host = buf[offset..offset + src_len].to_vec();

        Ok(Self {
            dst_ia,
            src_ia,
            dst_host,
            src_host,
        })
    }

    /// Append the wire form to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        self.dst_len_code()?;
        self.src_len_code()?;
        self.dst_ia.encode(buf);
        self.src_ia.encode(buf);
        buf.extend_from_slice(&self.dst_host);
        buf.extend_from_slice(&self.src_host);
        Ok(())
    }
}

fn host_code(host: &[u8], which: &str) -> Result<u8, ProtocolError> {
    addr_len_code(host.len()).ok_or_else(|| {
        ProtocolError::MalformedHeader(format!(
            "{which} host address of {} bytes is not a multiple of 4 in 4..=16",
            host.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_header_roundtrip_mixed_lengths() {
        let addr = AddressHeader::new(
            IsdAs::new(1, 0xff00_0000_0110),
            vec![0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            IsdAs::new(2, 0xff00_0000_0220),
            vec![10, 0, 0, 1],
        );
        let mut buf = Vec::new();
        addr.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 36);

        let decoded = AddressHeader::decode(&buf, 3, 0).unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_address_header_truncated() {
        let err = AddressHeader::decode(&[0u8; 30], 3, 0).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InsufficientData { expected: 36, got: 30, .. }
        ));
    }

    #[test]
    fn test_address_header_rejects_odd_host() {
        let addr = AddressHeader::new(IsdAs::new(1, 1), vec![1, 2, 3], IsdAs::new(1, 2), vec![0; 4]);
        assert!(matches!(
            addr.encode(&mut Vec::new()),
            Err(ProtocolError::MalformedHeader(_))
        ));
    }
}
