//! Position-resolved substitution counts at reference C and G sites.
//!

use super::likelihood::{DamageSite, Terminus};
use crate::utils::Result;
use itertools::Itertools;
use std::io::Write;

/// Reference/observed pairs reported in the frequency table, in column order.
pub const PAIRS: [(u8, u8); 8] = [
    (b'C', b'T'),
    (b'C', b'A'),
    (b'C', b'G'),
    (b'C', b'C'),
    (b'G', b'A'),
    (b'G', b'T'),
    (b'G', b'C'),
    (b'G', b'G'),
];

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Counts of observed bases per distance, for reference C (from the 5' end) and
/// reference G (from the 3' end).
///
/// Tables grow on demand and can be summed, so partial tables built on different
/// threads are merged after the pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeaminationTable {
    five_prime: Vec<[u64; 4]>,
    three_prime: Vec<[u64; 4]>,
}

impl DeaminationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.five_prime.is_empty() && self.three_prime.is_empty()
    }

    pub fn add_site(&mut self, site: &DamageSite) {
        self.add(site.reference, site.observed, site.distance);
    }

    /// Records one observation; only C and G reference bases with an A/C/G/T
    /// observation are counted.
    pub fn add(&mut self, reference: u8, observed: u8, distance: usize) {
        let Some(observed_index) = base_index(observed) else {
            return;
        };
        let counts = match reference {
            b'C' => &mut self.five_prime,
            b'G' => &mut self.three_prime,
            _ => return,
        };
        if counts.len() <= distance {
            counts.resize(distance + 1, [0; 4]);
        }
        counts[distance][observed_index] += 1;
    }

    pub fn count(&self, reference: u8, observed: u8, distance: usize) -> u64 {
        let counts = match reference {
            b'C' => &self.five_prime,
            b'G' => &self.three_prime,
            _ => return 0,
        };
        match (counts.get(distance), base_index(observed)) {
            (Some(row), Some(index)) => row[index],
            _ => 0,
        }
    }

    pub fn merge(&mut self, other: &DeaminationTable) {
        fn merge_counts(into: &mut Vec<[u64; 4]>, from: &[[u64; 4]]) {
            if into.len() < from.len() {
                into.resize(from.len(), [0; 4]);
            }
            for (row, other_row) in into.iter_mut().zip(from) {
                for (count, other_count) in row.iter_mut().zip(other_row) {
                    *count += other_count;
                }
            }
        }
        merge_counts(&mut self.five_prime, &other.five_prime);
        merge_counts(&mut self.three_prime, &other.three_prime);
    }

    fn total(&self, terminus: Terminus, distance: usize) -> u64 {
        let counts = match terminus {
            Terminus::FivePrime => &self.five_prime,
            Terminus::ThreePrime => &self.three_prime,
        };
        counts.get(distance).map_or(0, |row| row.iter().sum())
    }

    /// Frequencies of the `PAIRS` columns at one distance.
    ///
    /// Each C column is divided by all C observations at that distance, and each G
    /// column by all G observations. Distances without observations give zeros.
    pub fn frequencies(&self, distance: usize) -> [f64; 8] {
        let mut row = [0.0; 8];
        for (col, &(reference, observed)) in PAIRS.iter().enumerate() {
            let terminus = if reference == b'C' {
                Terminus::FivePrime
            } else {
                Terminus::ThreePrime
            };
            let total = self.total(terminus, distance);
            if total > 0 {
                row[col] = self.count(reference, observed, distance) as f64 / total as f64;
            }
        }
        row
    }

    /// Writes the frequency table for distances `0..range`.
    pub fn write_frequencies<W: Write>(&self, range: usize, writer: &mut W) -> Result<()> {
        let header = PAIRS
            .iter()
            .map(|&(reference, observed)| format!("{}{}", reference as char, observed as char))
            .join("\t");
        writeln!(writer, "z\t{}", header).map_err(|e| e.to_string())?;

        for distance in 0..range {
            let row = self
                .frequencies(distance)
                .iter()
                .map(|freq| format!("{:.5}", freq))
                .join("\t");
            writeln!(writer, "{}\t{}", distance, row).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
