//! Full SCION header: common + address + path.

use super::common::{CommonHeader, COMMON_HEADER_SIZE};
use super::error::require;
use super::{AddressHeader, Path, PathHeader, PathType, ProtocolError};

/// Largest header expressible by the 8-bit HdrLen field, in bytes.
pub const MAX_HEADER_SIZE: usize = 255 * 4;

/// Parsed SCION header.
///
/// The common header's derived fields (`header_len`, `path_type`, and the
/// DL/SL codes) must agree with the address and path headers. [`ScionHeader::new`]
/// fills them in; [`ScionHeader::serialize`] rejects headers where they drift.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScionHeader {
    pub common: CommonHeader,
    pub address: AddressHeader,
    pub path: Path,
}

impl ScionHeader {
    /// Assemble a header, deriving the common header's length and type codes.
    pub fn new(
        mut common: CommonHeader,
        address: AddressHeader,
        path: Path,
    ) -> Result<Self, ProtocolError> {
        let size = COMMON_HEADER_SIZE + address.wire_size() + path.wire_size();
        if size > MAX_HEADER_SIZE {
            return Err(ProtocolError::MalformedHeader(format!(
                "header of {} bytes exceeds maximum {}",
                size, MAX_HEADER_SIZE
            )));
        }
        common.header_len = (size / 4) as u8;
        common.path_type = path.path_type();
        common.dst_addr_len = address.dst_len_code()?;
        common.src_addr_len = address.src_len_code()?;
        Ok(Self {
            common,
            address,
            path,
        })
    }

    /// Encoded size in bytes, computed from the structure.
    pub fn wire_size(&self) -> usize {
        COMMON_HEADER_SIZE + self.address.wire_size() + self.path.wire_size()
    }

    /// The standard path, if this header carries one.
    pub fn scion_path(&self) -> Option<&PathHeader> {
        self.path.as_scion()
    }

    /// Parse a header from the start of `buf`.
    ///
    /// Consumes exactly `header_len * 4` bytes, which must agree with the
    /// size implied by the address codes and path meta header. Returns the
    /// header and the number of bytes consumed.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let common = CommonHeader::decode(buf)?;
        let declared = common.header_len_bytes();
        if declared < COMMON_HEADER_SIZE {
            return Err(ProtocolError::MalformedHeader(format!(
                "header length {} bytes shorter than common header",
                declared
            )));
        }
        require(buf, "header", declared)?;

        let addr_buf = &buf[COMMON_HEADER_SIZE..];
        let address = AddressHeader::decode(addr_buf, common.dst_addr_len, common.src_addr_len)?;
        let addr_end = COMMON_HEADER_SIZE + address.wire_size();

        let path = match common.path_type {
            PathType::Empty => Path::Empty,
            PathType::Scion => {
                let (path, _) = PathHeader::decode(&buf[addr_end..])?;
                Path::Scion(path)
            }
        };

        let actual = addr_end + path.wire_size();
        if actual != declared {
            return Err(ProtocolError::MalformedHeader(format!(
                "header length field says {} bytes, structure is {} bytes",
                declared, actual
            )));
        }

        Ok((
            Self {
                common,
                address,
                path,
            },
            declared,
        ))
    }

    /// Serialize the header.
    ///
    /// Fails if the common header's derived fields disagree with the
    /// address and path headers.
    pub fn serialize(&self) -> Result<Vec<u8>, ProtocolError> {
        let size = self.wire_size();
        if self.common.header_len_bytes() != size {
            return Err(ProtocolError::MalformedHeader(format!(
                "header length field says {} bytes, structure is {} bytes",
                self.common.header_len_bytes(),
                size
            )));
        }
        if self.common.path_type != self.path.path_type() {
            return Err(ProtocolError::MalformedHeader(format!(
                "path type {} does not match carried path {}",
                self.common.path_type,
                self.path.path_type()
            )));
        }
        if self.common.dst_addr_len != self.address.dst_len_code()?
            || self.common.src_addr_len != self.address.src_len_code()?
        {
            return Err(ProtocolError::MalformedHeader(
                "address length codes do not match host addresses".into(),
            ));
        }

        let mut buf = Vec::with_capacity(size);
        self.common.encode(&mut buf)?;
        self.address.encode(&mut buf)?;
        if let Path::Scion(path) = &self.path {
            path.encode(&mut buf)?;
        }
        Ok(buf)
    }
}
