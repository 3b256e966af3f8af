//! SCION Header Codec
//!
//! Byte-exact, big-endian parsing and serialization of the SCION dataplane
//! header stack:
//!
//! ```text
//! +-------------------------------+
//! |   Common header (12 bytes)    |
//! +-------------------------------+
//! |  Address header (24..48)      |
//! +-------------------------------+
//! |  Path header (variable)       |
//! +-------------------------------+
//! |  Extension chain (HBH, E2E)   |
//! +-------------------------------+
//! |  Upper-layer payload          |
//! +-------------------------------+
//! ```
//!
//! Parsing is driven by the length fields and never scans. Every decoder
//! checks the buffer length before indexing and returns a typed
//! [`ProtocolError`] on truncated or self-inconsistent input.

mod address;
mod common;
mod error;
mod header;
mod isd_as;
mod packet;
mod path;

pub use address::AddressHeader;
pub use common::{
    addr_len_bytes, addr_len_code, CommonHeader, PathType, COMMON_HEADER_SIZE, END_TO_END_CLASS,
    HOP_BY_HOP_CLASS, MAX_FLOW_ID, SCION_VERSION, UDP_CLASS,
};
pub use error::ProtocolError;
pub(crate) use error::require;
pub use header::{ScionHeader, MAX_HEADER_SIZE};
pub use isd_as::{IsdAs, MAX_AS};
pub use packet::{ExtensionClass, Packet, RawExtension, MAX_EXTENSION_SIZE, MIN_EXTENSION_SIZE};
pub use path::{
    HopField, InfoField, Path, PathHeader, HOP_FIELD_SIZE, INFO_FIELD_SIZE, MAC_SIZE,
    MAX_SEGMENTS, MAX_SEGMENT_LEN, PATH_META_SIZE,
};
