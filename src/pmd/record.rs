//! Module for representing alignment records parsed from SAM text lines.
//!

use super::cigar::{parse_cigar, CigarOp};
use crate::utils::{ascii_from_phred, Result};

const MIN_FIELD_COUNT: usize = 11;
const REVERSE_FLAG: u16 = 0x10;
const MD_TAG: &str = "MD:Z:";
const DS_TAG: &str = "DS:Z:";

/// A single alignment record.
#[derive(Debug, Clone, PartialEq)]
pub struct SamRecord {
    /// Original line, without the trailing newline.
    pub line: String,
    pub name: String,
    pub flag: u16,
    pub contig: String,
    /// 1-based leftmost reference position.
    pub pos: u64,
    pub mapq: u8,
    pub cigar: Vec<CigarOp>,
    /// Read bases as stored in the record, upper-cased.
    pub bases: Vec<u8>,
    /// Raw Phred+33 quality characters.
    pub quals: Vec<u8>,
    /// Value of the MD tag, if present.
    pub md: Option<String>,
    /// Value of a pre-existing DS (PMD score) tag, if present.
    pub damage_score: Option<f64>,
}

impl SamRecord {
    /// Parses a tab-separated SAM line.
    ///
    /// Malformed numeric fields and CIGAR strings are input-format errors: the record
    /// cannot be interpreted and the caller is expected to stop.
    pub fn parse(line: &str) -> Result<SamRecord> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MIN_FIELD_COUNT {
            return Err(format!(
                "Expected at least {} tab-separated fields, found {}",
                MIN_FIELD_COUNT,
                fields.len()
            ));
        }

        let flag: u16 = fields[1]
            .parse()
            .map_err(|_| format!("Invalid FLAG field: {}", fields[1]))?;
        let pos: u64 = fields[3]
            .parse()
            .map_err(|_| format!("Invalid POS field: {}", fields[3]))?;
        let mapq: u8 = fields[4]
            .parse()
            .map_err(|_| format!("Invalid MAPQ field: {}", fields[4]))?;
        let cigar = parse_cigar(fields[5])?;

        let bases = match fields[9] {
            "*" => Vec::new(),
            seq => seq.bytes().map(|b| b.to_ascii_uppercase()).collect(),
        };

        let mut md = None;
        let mut damage_score = None;
        for tag in &fields[MIN_FIELD_COUNT..] {
            if let Some(value) = tag.strip_prefix(MD_TAG) {
                md = Some(value.to_string());
            } else if let Some(value) = tag.strip_prefix(DS_TAG) {
                let score = value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid DS field: {}", tag))?;
                damage_score = Some(score);
            }
        }

        Ok(SamRecord {
            line: line.to_string(),
            name: fields[0].to_string(),
            flag,
            contig: fields[2].to_string(),
            pos,
            mapq,
            cigar,
            bases,
            quals: fields[10].as_bytes().to_vec(),
            md,
            damage_score,
        })
    }

    pub fn is_reverse(&self) -> bool {
        self.flag & REVERSE_FLAG != 0
    }

    /// Raw CIGAR text of the record.
    pub fn cigar_str(&self) -> &str {
        self.line.split('\t').nth(5).unwrap_or("*")
    }

    /// Re-emits the record, optionally replacing the quality field and adding a DS tag.
    ///
    /// `phreds` are Phred values in record orientation. Any existing DS field is
    /// dropped before a new one is appended.
    pub fn to_line(&self, phreds: Option<&[u8]>, damage_score: Option<f64>) -> String {
        let mut fields: Vec<String> = self.line.split('\t').map(|f| f.to_string()).collect();

        if let Some(phreds) = phreds {
            let quals: String = phreds.iter().map(|&q| ascii_from_phred(q) as char).collect();
            fields[10] = quals;
        }

        if let Some(score) = damage_score {
            let mut index = 0;
            fields.retain(|field| {
                index += 1;
                index <= MIN_FIELD_COUNT || !field.starts_with(DS_TAG)
            });
            fields.push(format!("{}{:.3}", DS_TAG, score));
        }

        fields.join("\t")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmd::cigar::CigarKind;

    const LINE: &str =
        "read1\t16\tchr2\t1001\t37\t2S8M\t*\t0\t0\tacgtACGTAA\tIIIIIIIIII\tNM:i:1\tMD:Z:3G4\tDS:Z:1.5";

    #[test]
    fn parse_valid_record() {
        let rec = SamRecord::parse(LINE).unwrap();
        assert_eq!(rec.name, "read1");
        assert_eq!(rec.flag, 16);
        assert!(rec.is_reverse());
        assert_eq!(rec.contig, "chr2");
        assert_eq!(rec.pos, 1001);
        assert_eq!(rec.mapq, 37);
        assert_eq!(
            rec.cigar,
            vec![
                CigarOp::new(CigarKind::SoftClip, 2),
                CigarOp::new(CigarKind::Match, 8)
            ]
        );
        assert_eq!(rec.bases, b"ACGTACGTAA".to_vec());
        assert_eq!(rec.md.as_deref(), Some("3G4"));
        assert_eq!(rec.damage_score, Some(1.5));
        assert_eq!(rec.cigar_str(), "2S8M");
    }

    #[test]
    fn missing_tags_are_none() {
        let rec = SamRecord::parse("r\t0\tchr1\t1\t0\t4M\t*\t0\t0\tACGT\tIIII").unwrap();
        assert!(!rec.is_reverse());
        assert_eq!(rec.md, None);
        assert_eq!(rec.damage_score, None);
    }

    #[test]
    fn non_numeric_fields_err() {
        assert!(SamRecord::parse("r\tx\tchr1\t1\t0\t4M\t*\t0\t0\tACGT\tIIII").is_err());
        assert!(SamRecord::parse("r\t0\tchr1\tpos\t0\t4M\t*\t0\t0\tACGT\tIIII").is_err());
        assert!(SamRecord::parse("r\t0\tchr1\t1\t-3\t4M\t*\t0\t0\tACGT\tIIII").is_err());
        assert!(SamRecord::parse("r\t0\tchr1\t1\t0\t4Z\t*\t0\t0\tACGT\tIIII").is_err());
    }

    #[test]
    fn too_few_fields_err() {
        assert_eq!(
            SamRecord::parse("r\t0\tchr1"),
            Err("Expected at least 11 tab-separated fields, found 3".to_string())
        );
    }

    #[test]
    fn to_line_replaces_quals_and_ds() {
        let rec = SamRecord::parse(LINE).unwrap();
        let phreds = vec![10; 10];
        let line = rec.to_line(Some(&phreds), Some(2.34567));
        assert_eq!(
            line,
            "read1\t16\tchr2\t1001\t37\t2S8M\t*\t0\t0\tacgtACGTAA\t++++++++++\tNM:i:1\tMD:Z:3G4\tDS:Z:2.346"
        );
    }

    #[test]
    fn to_line_without_changes_is_identity() {
        let rec = SamRecord::parse(LINE).unwrap();
        assert_eq!(rec.to_line(None, None), LINE);
    }
}
