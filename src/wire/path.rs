//! SCION standard path: path meta header, info fields, and hop fields.
//!
//! ```text
//! PathMetaHdr (4 bytes)
//! | C (2) | CurrHF (6) | RSV (6) | Seg0Len (6) | Seg1Len (6) | Seg2Len (6) |
//!
//! InfoField (8 bytes)
//! | r r r r r r P C | RSV | SegID (16) | Timestamp (32) |
//!
//! HopField (12 bytes)
//! | r r r r r r I E | ExpTime | ConsIngress (16) | ConsEgress (16) | MAC (48) |
//! ```

use super::error::require;
use super::ProtocolError;

/// Path meta header size in bytes.
pub const PATH_META_SIZE: usize = 4;

/// Info field size in bytes.
pub const INFO_FIELD_SIZE: usize = 8;

/// Hop field size in bytes.
pub const HOP_FIELD_SIZE: usize = 12;

/// Maximum number of segments in a standard path.
pub const MAX_SEGMENTS: usize = 3;

/// Maximum hop fields in a single segment (6-bit length).
pub const MAX_SEGMENT_LEN: usize = 63;

/// Truncated hop field MAC size in bytes.
pub const MAC_SIZE: usize = 6;

const INFO_FLAG_CONS_DIR: u8 = 0x01;
const INFO_FLAG_PEER: u8 = 0x02;
const HOP_FLAG_EGRESS_ALERT: u8 = 0x01;
const HOP_FLAG_INGRESS_ALERT: u8 = 0x02;

// ============================================================================
// Info Field
// ============================================================================

/// Per-segment info field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InfoField {
    /// Segment is traversed in construction direction.
    pub cons_dir: bool,
    /// Segment contains a peering hop.
    pub peer: bool,
    /// Updatable segment identifier (MAC chaining).
    pub seg_id: u16,
    /// Beacon origination time, seconds since the Unix epoch.
    pub timestamp: u32,
}

impl InfoField {
    /// Decode from the first 8 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, "info field", INFO_FIELD_SIZE)?;
        Ok(Self {
            cons_dir: buf[0] & INFO_FLAG_CONS_DIR != 0,
            peer: buf[0] & INFO_FLAG_PEER != 0,
            seg_id: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Append the wire form to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.cons_dir {
            flags |= INFO_FLAG_CONS_DIR;
        }
        if self.peer {
            flags |= INFO_FLAG_PEER;
        }
        buf.push(flags);
        buf.push(0);
        buf.extend_from_slice(&self.seg_id.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
    }
}

// ============================================================================
// Hop Field
// ============================================================================

/// Per-AS hop field.
///
/// The MAC is opaque here; only the interface ids are interpreted, to key
/// per-interface attestations in the policy engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HopField {
    pub ingress_alert: bool,
    pub egress_alert: bool,
    /// Relative expiry, in units of 24h/256.
    pub exp_time: u8,
    pub cons_ingress: u16,
    pub cons_egress: u16,
    pub mac: [u8; MAC_SIZE],
}

impl HopField {
    /// Create a hop field with the given construction-direction interfaces.
    pub fn new(cons_ingress: u16, cons_egress: u16) -> Self {
        Self {
            cons_ingress,
            cons_egress,
            exp_time: 63,
            ..Self::default()
        }
    }

    /// Interface used to key attestations and policy tables.
    ///
    /// The ingress interface, except at segment origin where the ingress is
    /// 0 and the egress identifies the hop instead.
    pub fn interface_id(&self) -> u16 {
        if self.cons_ingress != 0 {
            self.cons_ingress
        } else {
            self.cons_egress
        }
    }

    /// Decode from the first 12 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, "hop field", HOP_FIELD_SIZE)?;
        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(&buf[6..12]);
        Ok(Self {
            ingress_alert: buf[0] & HOP_FLAG_INGRESS_ALERT != 0,
            egress_alert: buf[0] & HOP_FLAG_EGRESS_ALERT != 0,
            exp_time: buf[1],
            cons_ingress: u16::from_be_bytes([buf[2], buf[3]]),
            cons_egress: u16::from_be_bytes([buf[4], buf[5]]),
            mac,
        })
    }

    /// Append the wire form to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.ingress_alert {
            flags |= HOP_FLAG_INGRESS_ALERT;
        }
        if self.egress_alert {
            flags |= HOP_FLAG_EGRESS_ALERT;
        }
        buf.push(flags);
        buf.push(self.exp_time);
        buf.extend_from_slice(&self.cons_ingress.to_be_bytes());
        buf.extend_from_slice(&self.cons_egress.to_be_bytes());
        buf.extend_from_slice(&self.mac);
    }
}

// ============================================================================
// Path Header
// ============================================================================

/// Standard SCION path.
///
/// Invariants (checked on decode and encode):
/// - segment lengths are contiguous: no non-empty segment after an empty one
/// - at least one segment is present
/// - one info field per non-empty segment
/// - `hop_fields.len()` equals the sum of segment lengths
/// - `curr_inf` and `curr_hf` index existing fields
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathHeader {
    pub curr_inf: u8,
    pub curr_hf: u8,
    pub seg_len: [u8; MAX_SEGMENTS],
    pub info_fields: Vec<InfoField>,
    pub hop_fields: Vec<HopField>,
}

impl PathHeader {
    /// Build a path from ordered segments, each an info field and its hops.
    ///
    /// The current pointers start at the first hop of the first segment.
    pub fn from_segments(segments: Vec<(InfoField, Vec<HopField>)>) -> Result<Self, ProtocolError> {
        if segments.is_empty() || segments.len() > MAX_SEGMENTS {
            return Err(ProtocolError::MalformedHeader(format!(
                "path must have 1..={} segments, got {}",
                MAX_SEGMENTS,
                segments.len()
            )));
        }

        let mut seg_len = [0u8; MAX_SEGMENTS];
        let mut info_fields = Vec::with_capacity(segments.len());
        let mut hop_fields = Vec::new();
        for (i, (info, hops)) in segments.into_iter().enumerate() {
            if hops.is_empty() || hops.len() > MAX_SEGMENT_LEN {
                return Err(ProtocolError::MalformedHeader(format!(
                    "segment {} has {} hops, expected 1..={}",
                    i,
                    hops.len(),
                    MAX_SEGMENT_LEN
                )));
            }
            seg_len[i] = hops.len() as u8;
            info_fields.push(info);
            hop_fields.extend(hops);
        }

        let path = Self {
            curr_inf: 0,
            curr_hf: 0,
            seg_len,
            info_fields,
            hop_fields,
        };
        path.check()?;
        Ok(path)
    }

    /// Number of non-empty segments.
    pub fn num_segments(&self) -> usize {
        self.seg_len.iter().take_while(|len| **len > 0).count()
    }

    /// Total hop fields declared by the segment lengths.
    pub fn num_hops(&self) -> usize {
        self.seg_len.iter().map(|len| *len as usize).sum()
    }

    /// Encoded size in bytes.
    pub fn wire_size(&self) -> usize {
        PATH_META_SIZE
            + self.info_fields.len() * INFO_FIELD_SIZE
            + self.hop_fields.len() * HOP_FIELD_SIZE
    }

    /// The info field the current hop belongs to.
    pub fn current_info(&self) -> Option<&InfoField> {
        self.info_fields.get(self.curr_inf as usize)
    }

    /// The hop field currently being processed.
    pub fn current_hop(&self) -> Option<&HopField> {
        self.hop_fields.get(self.curr_hf as usize)
    }

    /// Iterate segments as (info field, hop fields) pairs.
    pub fn segments(&self) -> impl Iterator<Item = (&InfoField, &[HopField])> {
        let mut start = 0;
        self.info_fields
            .iter()
            .zip(self.seg_len.iter())
            .map(move |(info, len)| {
                let end = start + *len as usize;
                let hops = self.hop_fields.get(start..end).unwrap_or(&[]);
                start = end;
                (info, hops)
            })
    }

    /// Segment index that hop `hf` belongs to.
    pub fn segment_of(&self, hf: usize) -> Option<usize> {
        let mut end = 0;
        for (i, len) in self.seg_len.iter().enumerate() {
            end += *len as usize;
            if hf < end {
                return Some(i);
            }
        }
        None
    }

    /// Check the structural invariants.
    fn check(&self) -> Result<(), ProtocolError> {
        let num_inf = self.num_segments();
        if num_inf == 0 {
            return Err(ProtocolError::MalformedHeader(
                "path has no segments".into(),
            ));
        }
        if self.seg_len[num_inf..].iter().any(|len| *len > 0) {
            return Err(ProtocolError::MalformedHeader(format!(
                "non-contiguous segment lengths {:?}",
                self.seg_len
            )));
        }
        if self.seg_len.iter().any(|len| *len as usize > MAX_SEGMENT_LEN) {
            return Err(ProtocolError::MalformedHeader(format!(
                "segment length exceeds {}: {:?}",
                MAX_SEGMENT_LEN, self.seg_len
            )));
        }
        if self.info_fields.len() != num_inf {
            return Err(ProtocolError::MalformedHeader(format!(
                "{} info fields for {} segments",
                self.info_fields.len(),
                num_inf
            )));
        }
        if self.hop_fields.len() != self.num_hops() {
            return Err(ProtocolError::MalformedHeader(format!(
                "{} hop fields for segment lengths {:?}",
                self.hop_fields.len(),
                self.seg_len
            )));
        }
        if self.curr_inf as usize >= num_inf {
            return Err(ProtocolError::MalformedHeader(format!(
                "curr_inf {} out of range for {} segments",
                self.curr_inf, num_inf
            )));
        }
        if self.curr_hf as usize >= self.hop_fields.len() {
            return Err(ProtocolError::MalformedHeader(format!(
                "curr_hf {} out of range for {} hop fields",
                self.curr_hf,
                self.hop_fields.len()
            )));
        }
        Ok(())
    }

    /// Decode a standard path from the start of `buf`.
    ///
    /// Returns the path and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        require(buf, "path meta header", PATH_META_SIZE)?;
        let meta = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let curr_inf = (meta >> 30) as u8;
        let curr_hf = ((meta >> 24) & 0x3f) as u8;
        let seg_len = [
            ((meta >> 12) & 0x3f) as u8,
            ((meta >> 6) & 0x3f) as u8,
            (meta & 0x3f) as u8,
        ];

        let num_inf = seg_len.iter().take_while(|len| **len > 0).count();
        let num_hf: usize = seg_len.iter().map(|len| *len as usize).sum();
        let size = PATH_META_SIZE + num_inf * INFO_FIELD_SIZE + num_hf * HOP_FIELD_SIZE;
        require(buf, "path", size)?;

        let mut offset = PATH_META_SIZE;
        let mut info_fields = Vec::with_capacity(num_inf);
        for _ in 0..num_inf {
            info_fields.push(InfoField::decode(&buf[offset..])?);
            offset += INFO_FIELD_SIZE;
        }
        let mut hop_fields = Vec::with_capacity(num_hf);
        for _ in 0..num_hf {
            hop_fields.push(HopField::decode(&buf[offset..])?);
            offset += HOP_FIELD_SIZE;
        }

        let path = Self {
            curr_inf,
            curr_hf,
            seg_len,
            info_fields,
            hop_fields,
        };
        path.check()?;
        Ok((path, size))
    }

    /// Append the wire form to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        self.check()?;
        let meta = ((self.curr_inf as u32) << 30)
            | ((self.curr_hf as u32 & 0x3f) << 24)
            | ((self.seg_len[0] as u32) << 12)
            | ((self.seg_len[1] as u32) << 6)
            | self.seg_len[2] as u32;
        buf.extend_from_slice(&meta.to_be_bytes());
        for info in &self.info_fields {
            info.encode(buf);
        }
        for hop in &self.hop_fields {
            hop.encode(buf);
        }
        Ok(())
    }
}

/// Path carried by a SCION packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Path {
    /// Empty path (path type 0), zero bytes on the wire.
    Empty,
    /// Standard SCION path (path type 1).
    Scion(PathHeader),
}

impl Path {
    /// Encoded size in bytes.
    pub fn wire_size(&self) -> usize {
        match self {
            Path::Empty => 0,
            Path::Scion(path) => path.wire_size(),
        }
    }

    /// Path type code for the common header.
    pub fn path_type(&self) -> super::PathType {
        match self {
            Path::Empty => super::PathType::Empty,
            Path::Scion(_) => super::PathType::Scion,
        }
    }

    /// The standard path, if any.
    pub fn as_scion(&self) -> Option<&PathHeader> {
        match self {
            Path::Empty => None,
            Path::Scion(path) => Some(path),
        }
    }
}
