//! Decoding of CIGAR strings into operations and per-base read roles.
//!

use super::filters::Rejection;
use crate::utils::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarKind {
    Match,
    Insertion,
    Deletion,
    SoftClip,
    HardClip,
    Skip,
    Pad,
}

impl CigarKind {
    fn from_byte(op: u8) -> Option<CigarKind> {
        match op {
            b'M' | b'=' | b'X' => Some(CigarKind::Match),
            b'I' => Some(CigarKind::Insertion),
            b'D' => Some(CigarKind::Deletion),
            b'S' => Some(CigarKind::SoftClip),
            b'H' => Some(CigarKind::HardClip),
            b'N' => Some(CigarKind::Skip),
            b'P' => Some(CigarKind::Pad),
            _ => None,
        }
    }

    /// Hard clips, skips and pads cannot be placed on the read coordinate system.
    pub fn is_supported(self) -> bool {
        !matches!(self, CigarKind::HardClip | CigarKind::Skip | CigarKind::Pad)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub len: u32,
    pub kind: CigarKind,
}

impl CigarOp {
    pub fn new(kind: CigarKind, len: u32) -> Self {
        CigarOp { len, kind }
    }

    pub fn get_query_len(&self) -> usize {
        match self.kind {
            CigarKind::Match | CigarKind::Insertion | CigarKind::SoftClip => self.len as usize,
            CigarKind::Deletion | CigarKind::Skip | CigarKind::HardClip | CigarKind::Pad => 0,
        }
    }
}

/// Role of a single read coordinate in the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRole {
    Aligned,
    Inserted,
    SoftClipped,
}

/// Parses a CIGAR string such as `10S60M2I4M` into operations.
///
/// `*` denotes an unavailable CIGAR and yields no operations. A token without a
/// positive length or with an unknown operation letter is an input-format error.
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>> {
    if cigar == "*" {
        return Ok(Vec::new());
    }

    let bytes = cigar.as_bytes();
    let mut ops = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == start || end == bytes.len() {
            return Err(format!("Malformed CIGAR string: {}", cigar));
        }
        let len: u32 = cigar[start..end]
            .parse()
            .map_err(|_| format!("Invalid CIGAR operation length in {}", cigar))?;
        if len == 0 {
            return Err(format!("Zero-length CIGAR operation in {}", cigar));
        }
        let kind = CigarKind::from_byte(bytes[end]).ok_or_else(|| {
            format!(
                "Unknown CIGAR operation '{}' in {}",
                bytes[end] as char, cigar
            )
        })?;
        ops.push(CigarOp::new(kind, len));
        start = end + 1;
    }

    Ok(ops)
}

pub fn query_len(ops: &[CigarOp]) -> usize {
    ops.iter().map(|op| op.get_query_len()).sum()
}

pub fn has_kind(ops: &[CigarOp], kind: CigarKind) -> bool {
    ops.iter().any(|op| op.kind == kind)
}

pub fn first_unsupported(ops: &[CigarOp]) -> Option<CigarKind> {
    ops.iter()
        .map(|op| op.kind)
        .find(|kind| !kind.is_supported())
}

/// Assigns a role to every read coordinate.
///
/// Insertions and soft clips consume read coordinates without a reference base,
/// deletions consume reference only.
pub fn decode_roles(
    ops: &[CigarOp],
    read_len: usize,
) -> std::result::Result<Vec<ReadRole>, Rejection> {
    if first_unsupported(ops).is_some() {
        return Err(Rejection::UnsupportedCigar);
    }
    if query_len(ops) != read_len {
        return Err(Rejection::CigarLengthMismatch);
    }

    let mut roles = Vec::with_capacity(read_len);
    for op in ops {
        let role = match op.kind {
            CigarKind::Match => ReadRole::Aligned,
            CigarKind::Insertion => ReadRole::Inserted,
            CigarKind::SoftClip => ReadRole::SoftClipped,
            _ => continue,
        };
        roles.extend(std::iter::repeat(role).take(op.len as usize));
    }
    Ok(roles)
}
