//! Decoding of the MD mismatch string into an alignment trace.
//!
//! The trace covers aligned read coordinates only: deleted reference bases
//! (`^` runs) never appear in it.

use super::filters::Rejection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdToken {
    /// Run of bases identical to the reference.
    Matches(usize),
    /// Reference bases substituted in the read, one per read base.
    Mismatches(Vec<u8>),
    /// Reference bases absent from the read.
    Deletion(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceBase {
    Exact,
    Substituted(u8),
}

/// Splits an MD string into match runs, mismatch runs and deletions.
pub fn tokenize(md: &str) -> Result<Vec<MdToken>, Rejection> {
    let bytes = md.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;

    while start < bytes.len() {
        let mut end = start;
        match bytes[start] {
            b'0'..=b'9' => {
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let run: usize = md[start..end]
                    .parse()
                    .map_err(|_| Rejection::MalformedMd)?;
                if run > 0 {
                    tokens.push(MdToken::Matches(run));
                }
            }
            b'^' => {
                end += 1;
                while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
                    end += 1;
                }
                if end == start + 1 {
                    return Err(Rejection::MalformedMd);
                }
                tokens.push(MdToken::Deletion(upper(&bytes[start + 1..end])));
            }
            base if base.is_ascii_alphabetic() => {
                while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
                    end += 1;
                }
                tokens.push(MdToken::Mismatches(upper(&bytes[start..end])));
            }
            _ => return Err(Rejection::MalformedMd),
        }
        start = end;
    }

    Ok(tokens)
}

fn upper(bases: &[u8]) -> Vec<u8> {
    bases.iter().map(|b| b.to_ascii_uppercase()).collect()
}

/// Expands an MD string into one trace entry per aligned read base.
pub fn decode_trace(md: &str) -> Result<Vec<TraceBase>, Rejection> {
    let mut trace = Vec::new();
    for token in tokenize(md)? {
        match token {
            MdToken::Matches(run) => trace.extend(std::iter::repeat(TraceBase::Exact).take(run)),
            MdToken::Mismatches(bases) => {
                trace.extend(bases.into_iter().map(TraceBase::Substituted))
            }
            MdToken::Deletion(_) => {}
        }
    }
    Ok(trace)
}

/// Renders the reference bases of a trace against the read bases it aligns to.
pub fn render_reference(trace: &[TraceBase], aligned_bases: &[u8]) -> Vec<u8> {
    trace
        .iter()
        .zip(aligned_bases)
        .map(|(entry, base)| match entry {
            TraceBase::Exact => *base,
            TraceBase::Substituted(ref_base) => *ref_base,
        })
        .collect()
}
