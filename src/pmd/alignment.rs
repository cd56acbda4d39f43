//! Reconstruction of the base-by-base alignment between a read and the reference.
//!
//! The CIGAR string places read bases on the reference (aligned, inserted or
//! clipped) and the MD string supplies the reference bases at aligned positions.
//! Combining the two yields two equal-length sequences that downstream scoring
//! walks in read 5' to 3' order.

use super::{
    cigar::{self, CigarKind, CigarOp, ReadRole},
    filters::Rejection,
    md::{self, TraceBase},
    record::SamRecord,
};
use crate::utils::phred_from_ascii;
use itertools::izip;

/// Placeholder in the reference for read bases with no reference counterpart.
pub const GAP: u8 = b'-';

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedAlignment {
    /// Observed bases, never containing a gap.
    pub read: Vec<u8>,
    /// Inferred reference bases, `GAP` at inserted and soft-clipped positions.
    pub reference: Vec<u8>,
    /// Phred values in the same orientation as `read`.
    pub phreds: Vec<u8>,
    /// Set when the arrays are reverse-complemented relative to the record.
    pub is_reverse: bool,
}

impl ReconstructedAlignment {
    /// Reconstructs the alignment of a record in read 5' to 3' orientation.
    pub fn from_record(rec: &SamRecord) -> Result<Self, Rejection> {
        let md = rec.md.as_deref().ok_or(Rejection::MissingMd)?;
        let phreds = rec.quals.iter().map(|&q| phred_from_ascii(q)).collect();
        let alignment = Self::reconstruct(&rec.cigar, md, &rec.bases, phreds)?;
        if rec.is_reverse() {
            Ok(alignment.reverse_complement())
        } else {
            Ok(alignment)
        }
    }

    /// Merges CIGAR and MD information in record orientation.
    pub fn reconstruct(
        ops: &[CigarOp],
        md: &str,
        bases: &[u8],
        phreds: Vec<u8>,
    ) -> Result<Self, Rejection> {
        if phreds.len() != bases.len() {
            return Err(Rejection::QualityLengthMismatch);
        }
        if cigar::first_unsupported(ops).is_some() {
            return Err(Rejection::UnsupportedCigar);
        }
        let trace = md::decode_trace(md)?;

        let has_unaligned = cigar::has_kind(ops, CigarKind::Insertion)
            || cigar::has_kind(ops, CigarKind::SoftClip);

        let reference = if !has_unaligned {
            if !ops.is_empty() && cigar::query_len(ops) != bases.len() {
                return Err(Rejection::CigarLengthMismatch);
            }
            if trace.len() != bases.len() {
                return Err(Rejection::MdLengthMismatch);
            }
            md::render_reference(&trace, bases)
        } else {
            let roles = cigar::decode_roles(ops, bases.len())?;
            let num_aligned = roles.iter().filter(|r| **r == ReadRole::Aligned).count();
            if num_aligned != trace.len() {
                return Err(Rejection::MdLengthMismatch);
            }

            let mut trace_iter = trace.iter();
            roles
                .iter()
                .zip(bases)
                .map(|(role, base)| match role {
                    ReadRole::Inserted | ReadRole::SoftClipped => GAP,
                    ReadRole::Aligned => match trace_iter.next() {
                        Some(TraceBase::Substituted(ref_base)) => *ref_base,
                        _ => *base,
                    },
                })
                .collect()
        };

        Ok(ReconstructedAlignment {
            read: bases.to_vec(),
            reference,
            phreds,
            is_reverse: false,
        })
    }

    /// Reverse-complements both sequences and reverses the qualities as a unit.
    pub fn reverse_complement(&self) -> Self {
        ReconstructedAlignment {
            read: reverse_complement(&self.read),
            reference: reverse_complement(&self.reference),
            phreds: self.phreds.iter().rev().copied().collect(),
            is_reverse: !self.is_reverse,
        }
    }

    pub fn len(&self) -> usize {
        self.read.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty()
    }

    /// Brings per-position values computed on this alignment back to record orientation.
    pub fn to_record_orientation(&self, values: &[u8]) -> Vec<u8> {
        if self.is_reverse {
            values.iter().rev().copied().collect()
        } else {
            values.to_vec()
        }
    }

    /// One marker per position: `|` match, `x` mismatch, `-` gap, space for N.
    pub fn marker_line(&self) -> Vec<u8> {
        self.read
            .iter()
            .zip(&self.reference)
            .map(|(&read_base, &ref_base)| {
                if read_base == GAP || ref_base == GAP {
                    b'-'
                } else if read_base == b'N' || ref_base == b'N' {
                    b' '
                } else if read_base == ref_base {
                    b'|'
                } else {
                    b'x'
                }
            })
            .collect()
    }

    /// Fraction of identical bases among aligned non-N positions, with damage tolerance.
    ///
    /// C→T and G→A differences count neither as matches nor as mismatches, so
    /// deamination does not lower the identity of an ancient read. Returns `None`
    /// when no position contributes.
    pub fn identity(&self) -> Option<f64> {
        let mut num_matches = 0;
        let mut num_mismatches = 0;
        for (&read_base, &ref_base) in self.read.iter().zip(&self.reference) {
            if read_base == GAP || ref_base == GAP || read_base == b'N' || ref_base == b'N' {
                continue;
            }
            match (ref_base, read_base) {
                (r, q) if r == q => num_matches += 1,
                (b'C', b'T') | (b'G', b'A') => {}
                _ => num_mismatches += 1,
            }
        }

        let total = num_matches + num_mismatches;
        if total == 0 {
            None
        } else {
            Some(num_matches as f64 / total as f64)
        }
    }

    /// Whether a C→T with `phred > min_phred` occurs within `max_distance` of the 5' end.
    pub fn has_terminal_c_to_t(&self, max_distance: usize, min_phred: u8) -> bool {
        izip!(&self.read, &self.reference, &self.phreds)
            .take(max_distance.saturating_add(1))
            .any(|(&read_base, &ref_base, &phred)| {
                ref_base == b'C' && read_base == b'T' && phred > min_phred
            })
    }
}

pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        GAP => GAP,
        _ => b'N',
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&base| complement(base)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmd::cigar::parse_cigar;

    fn make_alignment(
        cigar: &str,
        md: &str,
        bases: &[u8],
    ) -> Result<ReconstructedAlignment, Rejection> {
        let ops = parse_cigar(cigar).unwrap();
        ReconstructedAlignment::reconstruct(&ops, md, bases, vec![30; bases.len()])
    }

    fn random_like_read(len: usize) -> Vec<u8> {
        (0..len).map(|i| b"ACGTTGCAAC"[(i * 7 + i / 3) % 10]).collect()
    }

    #[test]
    fn exact_match_reconstructs_identical_reference() {
        let read = random_like_read(76);
        let aln = make_alignment("76M", "76", &read).unwrap();
        assert_eq!(aln.reference, read);
        assert_eq!(aln.read, read);
    }

    #[test]
    fn leading_soft_clip_produces_gaps() {
        let read = random_like_read(76);
        let aln = make_alignment("10S66M", "66", &read).unwrap();
        assert_eq!(aln.read, read);
        assert_eq!(aln.reference.len(), 76);
        assert!(aln.reference[..10].iter().all(|&b| b == GAP));
        assert_eq!(&aln.reference[10..], &read[10..]);
    }

    #[test]
    fn mismatch_and_deletion_fast_path() {
        let aln = make_alignment("4M2D4M", "1A2^GG4", b"CTGGAACC").unwrap();
        assert_eq!(aln.read, b"CTGGAACC".to_vec());
        assert_eq!(aln.reference, b"CAGGAACC".to_vec());
    }

    #[test]
    fn insertion_with_mismatch_after_it() {
        let aln = make_alignment("3M2I3M", "4T1", b"ACGTTACG").unwrap();
        assert_eq!(aln.read, b"ACGTTACG".to_vec());
        assert_eq!(aln.reference, b"ACG--ATG".to_vec());
    }

    #[test]
    fn gaps_only_at_unaligned_positions() {
        let read = random_like_read(30);
        let ops = parse_cigar("3S10M2I5M1D7M3S").unwrap();
        let aln = make_alignment("3S10M2I5M1D7M3S", "15^A7", &read).unwrap();
        let roles = cigar::decode_roles(&ops, read.len()).unwrap();
        assert_eq!(aln.read.len(), aln.reference.len());
        assert!(!aln.read.contains(&GAP));
        for (role, &ref_base) in roles.iter().zip(&aln.reference) {
            assert_eq!(ref_base == GAP, *role != ReadRole::Aligned);
        }
    }

    #[test]
    fn md_shorter_than_aligned_span_err() {
        assert_eq!(
            make_alignment("10M", "8", b"ACGTACGTAC"),
            Err(Rejection::MdLengthMismatch)
        );
        assert_eq!(
            make_alignment("2S8M", "6", b"ACGTACGTAC"),
            Err(Rejection::MdLengthMismatch)
        );
    }

    #[test]
    fn quality_length_must_match_read() {
        let ops = parse_cigar("4M").unwrap();
        assert_eq!(
            ReconstructedAlignment::reconstruct(&ops, "4", b"ACGT", vec![30; 3]),
            Err(Rejection::QualityLengthMismatch)
        );
    }

    #[test]
    fn reverse_complement_round_trip() {
        let mut aln = make_alignment("2S4M1I3M", "1G5", b"NACGTACGTT").unwrap();
        aln.phreds = (0..10).collect();
        let once = aln.reverse_complement();
        assert_ne!(once, aln);
        assert_eq!(once.reverse_complement(), aln);
    }

    #[test]
    fn reverse_strand_record_is_reoriented() {
        let rec = SamRecord::parse("r\t16\tchr1\t1\t30\t4M\t*\t0\t0\tAACG\tABCD\tMD:Z:0T3").unwrap();
        let aln = ReconstructedAlignment::from_record(&rec).unwrap();
        assert_eq!(aln.read, b"CGTT".to_vec());
        assert_eq!(aln.reference, b"CGTA".to_vec());
        assert_eq!(aln.phreds, vec![35, 34, 33, 32]);
        assert!(aln.is_reverse);
        assert_eq!(aln.to_record_orientation(&aln.phreds), vec![32, 33, 34, 35]);
    }

    #[test]
    fn missing_md_err() {
        let rec = SamRecord::parse("r\t0\tchr1\t1\t30\t4M\t*\t0\t0\tAACG\tABCD").unwrap();
        assert_eq!(
            ReconstructedAlignment::from_record(&rec),
            Err(Rejection::MissingMd)
        );
    }

    #[test]
    fn marker_line_and_identity() {
        let aln = ReconstructedAlignment {
            read: b"ATNGAC".to_vec(),
            reference: b"-CNGGT".to_vec(),
            phreds: vec![30; 6],
            is_reverse: false,
        };
        assert_eq!(aln.marker_line(), b"-x |xx".to_vec());
        // C>T and G>A are tolerated, C/T at the end is a real mismatch
        assert_eq!(aln.identity(), Some(0.5));
    }

    #[test]
    fn identity_undefined_without_overlap() {
        let aln = make_alignment("4S", "", b"ACGT").unwrap();
        assert_eq!(aln.identity(), None);
    }

    #[test]
    fn terminal_c_to_t_within_cutoff() {
        let aln = make_alignment("6M", "3C2", b"AAATAA").unwrap();
        assert!(aln.has_terminal_c_to_t(3, 20));
        assert!(!aln.has_terminal_c_to_t(2, 20));
        assert!(!aln.has_terminal_c_to_t(3, 30));
    }
}
