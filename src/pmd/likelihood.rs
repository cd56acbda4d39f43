//! Likelihood of a read under the ancient (damaged) and background (modern) models.
//!
//! Only reference C and G positions are informative: C→T is scored by distance from
//! the 5' end and G→A by distance from the 3' end. The PMD score of a read is the
//! log-ratio of the two whole-read likelihoods.

use super::{alignment::ReconstructedAlignment, model::DamageModel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub ancient_model: DamageModel,
    pub background_model: DamageModel,
    /// Biological divergence between the ancient individual and the reference.
    pub polymorphism_ancient: f64,
    /// Biological divergence between the contaminants and the reference.
    pub polymorphism_contamination: f64,
    pub min_base_qual: u8,
    pub cpg_only: bool,
}

/// Read terminus a distance is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminus {
    FivePrime,
    ThreePrime,
}

/// A reference C or G position eligible for damage analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageSite {
    pub index: usize,
    pub reference: u8,
    pub observed: u8,
    pub terminus: Terminus,
    pub distance: usize,
    pub phred: u8,
}

impl DamageSite {
    /// Observed base is the deamination product of the reference base.
    pub fn is_deaminated(&self) -> bool {
        matches!((self.reference, self.observed), (b'C', b'T') | (b'G', b'A'))
    }

    /// Observed base equals the reference base.
    pub fn is_unchanged(&self) -> bool {
        self.reference == self.observed
    }
}

/// Enumerates reference C positions (by 5' distance) and G positions (by 3' distance).
///
/// Positions with N in the read or the reference are skipped. With `cpg_only`, a C
/// must be followed by G in the read and a G must be preceded by C.
pub fn damage_sites(
    aln: &ReconstructedAlignment,
    cpg_only: bool,
) -> impl Iterator<Item = DamageSite> + '_ {
    let len = aln.len();
    (0..len).filter_map(move |index| {
        let reference = aln.reference[index];
        let observed = aln.read[index];
        if reference == b'N' || observed == b'N' {
            return None;
        }
        let (terminus, distance) = match reference {
            b'C' => {
                if cpg_only && aln.read.get(index + 1) != Some(&b'G') {
                    return None;
                }
                (Terminus::FivePrime, index)
            }
            b'G' => {
                if cpg_only && (index == 0 || aln.read[index - 1] != b'C') {
                    return None;
                }
                (Terminus::ThreePrime, len - 1 - index)
            }
            _ => return None,
        };
        Some(DamageSite {
            index,
            reference,
            observed,
            terminus,
            distance,
            phred: aln.phreds[index],
        })
    })
}

/// Per-alternative-base error probability of a Phred value.
pub fn error_probability(phred: u8) -> f64 {
    10f64.powf(-(phred as f64) / 10.0) / 3.0
}

/// Probability of observing the reference base given damage, error and polymorphism rates.
pub fn match_probability(damage: f64, error: f64, polymorphism: f64) -> f64 {
    (1.0 - damage) * (1.0 - error) * (1.0 - polymorphism)
        + damage * error * (1.0 - polymorphism)
        + error * polymorphism * (1.0 - damage)
}

pub fn mismatch_probability(damage: f64, error: f64, polymorphism: f64) -> f64 {
    1.0 - match_probability(damage, error, polymorphism)
}

/// Probabilities of one scored base under the two models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerBaseLikelihood {
    pub ancient: f64,
    pub background: f64,
}

impl PerBaseLikelihood {
    pub fn new(site: &DamageSite, params: &ScoringParams) -> Option<Self> {
        let probability = if site.is_deaminated() {
            mismatch_probability
        } else if site.is_unchanged() {
            match_probability
        } else {
            return None;
        };
        let error = error_probability(site.phred);
        Some(PerBaseLikelihood {
            ancient: probability(
                params.ancient_model.probability(site.distance),
                error,
                params.polymorphism_ancient,
            ),
            background: probability(
                params.background_model.probability(site.distance),
                error,
                params.polymorphism_contamination,
            ),
        })
    }
}

/// Whole-read likelihoods under the ancient and background models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadScore {
    pub ancient: f64,
    pub background: f64,
}

impl Default for ReadScore {
    fn default() -> Self {
        ReadScore {
            ancient: 1.0,
            background: 1.0,
        }
    }
}

impl ReadScore {
    pub fn ratio(&self) -> f64 {
        self.ancient / self.background
    }

    /// Log-likelihood ratio, positive for reads that look damaged.
    pub fn pmd(&self) -> f64 {
        self.ratio().ln()
    }
}

/// Multiplies per-base likelihoods over all scorable C/G positions of the read.
pub fn score_alignment(aln: &ReconstructedAlignment, params: &ScoringParams) -> ReadScore {
    damage_sites(aln, params.cpg_only)
        .filter(|site| site.phred >= params.min_base_qual)
        .filter_map(|site| PerBaseLikelihood::new(&site, params))
        .fold(ReadScore::default(), |score, base| ReadScore {
            ancient: score.ancient * base.ancient,
            background: score.background * base.background,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn params(p: f64) -> ScoringParams {
        ScoringParams {
            ancient_model: DamageModel::ancient(p, 0.01),
            background_model: DamageModel::background(),
            polymorphism_ancient: 0.001,
            polymorphism_contamination: 0.001,
            min_base_qual: 0,
            cpg_only: false,
        }
    }

    fn make_aln(read: &[u8], reference: &[u8], phred: u8) -> ReconstructedAlignment {
        ReconstructedAlignment {
            read: read.to_vec(),
            reference: reference.to_vec(),
            phreds: vec![phred; read.len()],
            is_reverse: false,
        }
    }

    #[test]
    fn error_probability_is_per_alternative_base() {
        assert!((error_probability(10) - 0.1 / 3.0).abs() < EPS);
        assert!((error_probability(30) - 0.001 / 3.0).abs() < EPS);
    }

    #[test]
    fn match_and_mismatch_are_complementary() {
        let (d, e, q) = (0.31, 0.0003, 0.001);
        let expected = (1.0 - d) * (1.0 - e) * (1.0 - q) + d * e * (1.0 - q) + e * q * (1.0 - d);
        assert!((match_probability(d, e, q) - expected).abs() < EPS);
        assert!((match_probability(d, e, q) + mismatch_probability(d, e, q) - 1.0).abs() < EPS);
    }

    #[test]
    fn no_informative_sites_gives_neutral_score() {
        let aln = make_aln(b"AATTAATT", b"AATTAATT", 30);
        let score = score_alignment(&aln, &params(0.3));
        assert_eq!(score.ancient, 1.0);
        assert_eq!(score.background, 1.0);
        assert_eq!(score.pmd(), 0.0);
    }

    #[test]
    fn n_positions_are_skipped() {
        let aln = make_aln(b"TNAA", b"CCAA", 30);
        let sites: Vec<_> = damage_sites(&aln, false).collect();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].index, 0);
    }

    #[test]
    fn c_indexed_from_five_prime_g_from_three_prime() {
        let aln = make_aln(b"TAAAAA", b"CAAAGA", 30);
        let sites: Vec<_> = damage_sites(&aln, false).collect();
        assert_eq!(sites[0].terminus, Terminus::FivePrime);
        assert_eq!(sites[0].distance, 0);
        assert_eq!(sites[1].terminus, Terminus::ThreePrime);
        assert_eq!(sites[1].distance, 1);
    }

    #[test]
    fn terminal_c_to_t_scores_positive() {
        let aln = make_aln(b"TAAAAAAAAA", b"CAAAAAAAAA", 30);
        let score = score_alignment(&aln, &params(0.3));
        assert!(score.pmd() > 0.0);

        let d = 0.3 + 0.01;
        let e = error_probability(30);
        let expected = mismatch_probability(d, e, 0.001) / mismatch_probability(0.001, e, 0.001);
        assert!((score.ratio() - expected).abs() < 1e-9);
    }

    #[test]
    fn terminal_g_to_a_scores_positive() {
        let aln = make_aln(b"AAAAAAAAAA", b"AAAAAAAAAG", 30);
        assert!(score_alignment(&aln, &params(0.3)).pmd() > 0.0);
    }

    #[test]
    fn unchanged_cs_score_negative() {
        let aln = make_aln(b"CCCCAAAA", b"CCCCAAAA", 30);
        assert!(score_alignment(&aln, &params(0.3)).pmd() < 0.0);
    }

    #[test]
    fn pmd_increases_with_decay_parameter() {
        let aln = make_aln(b"TAAAAAAAAA", b"CAAAAAAAAA", 30);
        let scores: Vec<f64> = [0.05, 0.1, 0.2, 0.3, 0.5, 0.8]
            .iter()
            .map(|&p| score_alignment(&aln, &params(p)).pmd())
            .collect();
        assert!(scores.windows(2).all(|w| w[0] < w[1]), "{:?}", scores);
    }

    #[test]
    fn low_quality_bases_are_excluded() {
        let aln = make_aln(b"TAAA", b"CAAA", 10);
        let mut scoring = params(0.3);
        scoring.min_base_qual = 20;
        assert_eq!(score_alignment(&aln, &scoring), ReadScore::default());
        scoring.min_base_qual = 10;
        assert_ne!(score_alignment(&aln, &scoring), ReadScore::default());
    }

    #[test]
    fn other_substitutions_are_not_scored() {
        let aln = make_aln(b"AAAAAAAT", b"CAAAAAAG", 30);
        assert_eq!(
            score_alignment(&aln, &params(0.3)),
            ReadScore::default()
        );
    }

    #[test]
    fn cpg_context_restricts_sites() {
        let aln = make_aln(b"TGAACGTA", b"CGAACGCA", 30);
        let sites: Vec<usize> = damage_sites(&aln, true).map(|s| s.index).collect();
        // C at 0 (followed by G), G at 1 (read has T before it), C at 4, G at 5
        assert_eq!(sites, vec![0, 4, 5]);
        let all: Vec<usize> = damage_sites(&aln, false).map(|s| s.index).collect();
        assert_eq!(all, vec![0, 1, 4, 5, 6]);
    }
}
