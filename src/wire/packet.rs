//! Packet framing: SCION header, extension header chain, and payload.

use std::fmt;

use tracing::{debug, trace};

use super::common::{END_TO_END_CLASS, HOP_BY_HOP_CLASS};
use super::error::require;
use super::{ProtocolError, ScionHeader};

/// Minimum extension block size: next-header + length code, padded to 4.
pub const MIN_EXTENSION_SIZE: usize = 4;

/// Largest extension block expressible by the 8-bit length code.
pub const MAX_EXTENSION_SIZE: usize = 256 * 4;

/// Extension header class, taken from the next-header code that
/// introduced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtensionClass {
    /// Hop-by-hop options, processed by every router (next-header 200).
    HopByHop,
    /// End-to-end options, processed by the destination (next-header 201).
    EndToEnd,
}

impl ExtensionClass {
    /// Try to convert from a next-header code.
    pub fn from_next_header(code: u8) -> Option<Self> {
        match code {
            HOP_BY_HOP_CLASS => Some(ExtensionClass::HopByHop),
            END_TO_END_CLASS => Some(ExtensionClass::EndToEnd),
            _ => None,
        }
    }

    /// The next-header code announcing this class.
    pub fn next_header(self) -> u8 {
        match self {
            ExtensionClass::HopByHop => HOP_BY_HOP_CLASS,
            ExtensionClass::EndToEnd => END_TO_END_CLASS,
        }
    }
}

impl fmt::Display for ExtensionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtensionClass::HopByHop => "HBH",
            ExtensionClass::EndToEnd => "E2E",
        };
        write!(f, "{}", name)
    }
}

/// One undecoded extension header block.
///
/// The block holds its own next-header byte and length code and is
/// `(length_code + 1) * 4` bytes long. Fields are private so every value
/// carries at least the 4-byte prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawExtension {
    class: ExtensionClass,
    bytes: Vec<u8>,
}

impl RawExtension {
    /// Wrap an encoded extension block.
    pub fn new(class: ExtensionClass, bytes: Vec<u8>) -> Result<Self, ProtocolError> {
        require(&bytes, "extension block", MIN_EXTENSION_SIZE)?;
        let declared = (bytes[1] as usize + 1) * 4;
        if declared != bytes.len() {
            return Err(ProtocolError::MalformedHeader(format!(
                "extension length code declares {} bytes, block is {}",
                declared,
                bytes.len()
            )));
        }
        Ok(Self { class, bytes })
    }

    /// Wrap a block produced by one of this crate's fixed-size encoders.
    pub(crate) fn from_encoded<const N: usize>(class: ExtensionClass, bytes: [u8; N]) -> Self {
        Self {
            class,
            bytes: bytes.to_vec(),
        }
    }

    pub fn class(&self) -> ExtensionClass {
        self.class
    }

    /// The whole block, prefix included.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Next-header code following this extension.
    pub fn next_header(&self) -> u8 {
        self.bytes[0]
    }

    /// Option type of the first option in the block.
    pub fn option_type(&self) -> u8 {
        self.bytes[2]
    }
}

/// A parsed packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub header: ScionHeader,
    /// Extension blocks in chain order.
    pub extensions: Vec<RawExtension>,
    /// Next-header code after the last extension (the L4 protocol, or an
    /// extension class if the chain was truncated).
    pub upper_layer: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create a packet without extensions.
    pub fn new(header: ScionHeader, upper_layer: u8, payload: Vec<u8>) -> Self {
        Self {
            header,
            extensions: Vec::new(),
            upper_layer,
            payload,
        }
    }

    /// Append an extension block to the chain.
    pub fn with_extension(mut self, extension: RawExtension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Parse a packet.
    ///
    /// The header must be well-formed and the buffer must hold the full
    /// `payload_len`. Extension scanning stops at the first truncated
    /// block; the remaining bytes become the payload and `upper_layer` keeps
    /// the extension class code so callers can tell the chain was cut.
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        let (header, header_len) = ScionHeader::parse(buf).inspect_err(|e| {
            debug!(len = buf.len(), error = %e, "Rejecting packet header");
        })?;
        let payload_len = header.common.payload_len as usize;
        require(buf, "payload", header_len + payload_len).inspect_err(|e| {
            debug!(header_len, payload_len, error = %e, "Rejecting truncated packet");
        })?;
        let body = &buf[header_len..header_len + payload_len];

        let (extensions, upper_layer, consumed) = scan_extensions(header.common.next_header, body);

        Ok(Self {
            header,
            extensions,
            upper_layer,
            payload: body[consumed..].to_vec(),
        })
    }

    /// Serialize the packet.
    ///
    /// Rewrites the next-header chain and `payload_len` to match the carried
    /// extensions and payload.
    pub fn serialize(&self) -> Result<Vec<u8>, ProtocolError> {
        let body_len: usize =
            self.extensions.iter().map(|e| e.bytes.len()).sum::<usize>() + self.payload.len();
        let payload_len = u16::try_from(body_len).map_err(|_| {
            ProtocolError::MalformedHeader(format!("payload of {} bytes exceeds 65535", body_len))
        })?;

        let mut header = self.header.clone();
        header.common.payload_len = payload_len;
        header.common.next_header = self
            .extensions
            .first()
            .map(|e| e.class.next_header())
            .unwrap_or(self.upper_layer);

        let mut buf = header.serialize()?;
        buf.reserve(body_len);
        for (i, ext) in self.extensions.iter().enumerate() {
            let next = self
                .extensions
                .get(i + 1)
                .map(|e| e.class.next_header())
                .unwrap_or(self.upper_layer);
            let start = buf.len();
            buf.extend_from_slice(&ext.bytes);
            buf[start] = next;
        }
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}

/// Walk the extension chain at the start of `body`.
///
/// Returns the extension blocks, the next-header code where scanning ended,
/// and the number of bytes consumed.
fn scan_extensions(first: u8, body: &[u8]) -> (Vec<RawExtension>, u8, usize) {
    let mut extensions = Vec::new();
    let mut next = first;
    let mut offset = 0;

    while let Some(class) = ExtensionClass::from_next_header(next) {
        let rest = &body[offset..];
        if rest.len() < 2 {
            trace!(class = %class, remaining = rest.len(), "Extension chain truncated before length");
            break;
        }
        let len = (rest[1] as usize + 1) * 4;
        if rest.len() < len {
            trace!(class = %class, needed = len, remaining = rest.len(), "Extension chain truncated");
            break;
        }
        let bytes = rest[..len].to_vec();
        next = bytes[0];
        extensions.push(RawExtension { class, bytes });
        offset += len;
    }

    (extensions, next, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::common::UDP_CLASS;
    use crate::wire::{AddressHeader, CommonHeader, HopField, InfoField, IsdAs, Path, PathHeader};

    fn header() -> ScionHeader {
        let path = PathHeader::from_segments(vec![(
            InfoField::default(),
            vec![HopField::new(0, 1), HopField::new(2, 0)],
        )])
        .unwrap();
        ScionHeader::new(
            CommonHeader::default(),
            AddressHeader::new(IsdAs::new(1, 10), vec![1, 1, 1, 1], IsdAs::new(1, 20), vec![2, 2, 2, 2]),
            Path::Scion(path),
        )
        .unwrap()
    }

    fn option_block(option_type: u8, words: u8) -> Vec<u8> {
        let len = (words as usize + 1) * 4;
        let mut bytes = vec![0u8; len];
        bytes[1] = words;
        bytes[2] = option_type;
        bytes[3] = (len - 4) as u8;
        bytes
    }

    #[test]
    fn test_packet_without_extensions_roundtrip() {
        let packet = Packet::new(header(), UDP_CLASS, vec![9; 33]);
        let bytes = packet.serialize().unwrap();
        let parsed = Packet::parse(&bytes).unwrap();
        assert!(parsed.extensions.is_empty());
        assert_eq!(parsed.upper_layer, UDP_CLASS);
        assert_eq!(parsed.payload, vec![9; 33]);
        assert_eq!(parsed.header.common.payload_len, 33);
    }

    #[test]
    fn test_packet_extension_chain_roundtrip() {
        let hbh = RawExtension::new(ExtensionClass::HopByHop, option_block(0x1c, 4)).unwrap();
        let e2e = RawExtension::new(ExtensionClass::EndToEnd, option_block(0x1d, 5)).unwrap();
        let packet = Packet::new(header(), UDP_CLASS, b"hello".to_vec())
            .with_extension(hbh)
            .with_extension(e2e);

        let bytes = packet.serialize().unwrap();
        let parsed = Packet::parse(&bytes).unwrap();

        assert_eq!(parsed.header.common.next_header, HOP_BY_HOP_CLASS);
        assert_eq!(parsed.extensions.len(), 2);
        assert_eq!(parsed.extensions[0].class(), ExtensionClass::HopByHop);
        assert_eq!(parsed.extensions[0].next_header(), END_TO_END_CLASS);
        assert_eq!(parsed.extensions[0].bytes().len(), 20);
        assert_eq!(parsed.extensions[1].class(), ExtensionClass::EndToEnd);
        assert_eq!(parsed.extensions[1].next_header(), UDP_CLASS);
        assert_eq!(parsed.extensions[1].option_type(), 0x1d);
        assert_eq!(parsed.upper_layer, UDP_CLASS);
        assert_eq!(parsed.payload, b"hello");
    }

    #[test]
    fn test_truncated_extension_stops_scan() {
        let mut hdr = header();
        hdr.common.next_header = HOP_BY_HOP_CLASS;
        // Declares 20 bytes, only 8 present.
        let mut body = option_block(0x1c, 4);
        body.truncate(8);
        hdr.common.payload_len = body.len() as u16;

        let mut bytes = hdr.serialize().unwrap();
        bytes.extend_from_slice(&body);

        let parsed = Packet::parse(&bytes).unwrap();
        assert!(parsed.extensions.is_empty());
        assert_eq!(parsed.upper_layer, HOP_BY_HOP_CLASS);
        assert_eq!(parsed.payload.len(), 8);
    }

    #[test]
    fn test_payload_shorter_than_declared() {
        let packet = Packet::new(header(), UDP_CLASS, vec![0; 16]);
        let bytes = packet.serialize().unwrap();
        assert!(matches!(
            Packet::parse(&bytes[..bytes.len() - 1]),
            Err(ProtocolError::InsufficientData { at: "payload", .. })
        ));
    }

    #[test]
    fn test_raw_extension_length_check() {
        assert!(RawExtension::new(ExtensionClass::HopByHop, vec![0, 4, 0, 0]).is_err());
        assert!(RawExtension::new(ExtensionClass::HopByHop, vec![0, 0, 0, 0]).is_ok());
    }

    #[test]
    fn test_short_raw_extension_rejected() {
        for len in 0..MIN_EXTENSION_SIZE {
            assert!(matches!(
                RawExtension::new(ExtensionClass::HopByHop, vec![0; len]),
                Err(ProtocolError::InsufficientData { at: "extension block", .. })
            ));
        }

        // Smallest accepted block still answers every accessor and serializes.
        let raw = RawExtension::new(ExtensionClass::EndToEnd, vec![0x11, 0, 0x7f, 0]).unwrap();
        assert_eq!(raw.option_type(), 0x7f);
        assert_eq!(raw.next_header(), 0x11);
        let packet = Packet::new(header(), UDP_CLASS, Vec::new()).with_extension(raw);
        let parsed = Packet::parse(&packet.serialize().unwrap()).unwrap();
        assert_eq!(parsed.extensions[0].bytes(), &[UDP_CLASS, 0, 0x7f, 0]);
    }
}
