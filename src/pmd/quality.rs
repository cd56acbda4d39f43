//! PMD-aware rescaling of base qualities.
//!
//! A damaged base is treated as an additional source of error: the rescaled error
//! probability is `1 - (1 - D)(1 - E)`, with `E` the full error probability of the
//! base call. Rescaling never raises a quality.

use super::{alignment::ReconstructedAlignment, likelihood::damage_sites, model::DamageModel};

/// Highest Phred value representable as a printable Phred+33 character.
pub const MAX_PHRED: u8 = 93;

/// Cap on the damage probability summed from both read ends.
pub const MAX_COMBINED_DAMAGE: f64 = 1.0 - 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityAdjustment {
    #[default]
    None,
    /// Only C→T and G→A positions, using the ancient damage curve.
    Selective,
    /// Every position, using the floor-free curve from both ends.
    Universal,
}

/// Tolerance for exact Phred values that `log10` misses by rounding.
const PHRED_EPSILON: f64 = 1e-9;

pub fn phred_to_probability(phred: u8) -> f64 {
    10f64.powf(-(phred as f64) / 10.0)
}

pub fn probability_to_phred(prob: f64) -> u8 {
    if prob <= 0.0 {
        return MAX_PHRED;
    }
    let phred = -10.0 * prob.log10() + PHRED_EPSILON;
    phred.clamp(0.0, MAX_PHRED as f64) as u8
}

/// Combines a damage probability with the error probability of a Phred value.
///
/// The result is capped at the input quality.
pub fn rescale_phred(phred: u8, damage: f64) -> u8 {
    let error = phred_to_probability(phred);
    let combined = 1.0 - (1.0 - damage) * (1.0 - error);
    probability_to_phred(combined).min(phred)
}

/// Rescales the qualities of an alignment and returns them as a new vector.
///
/// The alignment's own qualities are left untouched so that scoring keeps using the
/// original values. Selective rescaling applies to every C→T and G→A site that
/// passes the CpG rule, including bases below the quality threshold.
pub fn rescale_qualities(
    aln: &ReconstructedAlignment,
    adjustment: QualityAdjustment,
    ancient_model: &DamageModel,
    cpg_only: bool,
) -> Vec<u8> {
    let mut phreds = aln.phreds.clone();
    match adjustment {
        QualityAdjustment::None => {}
        QualityAdjustment::Selective => {
            for site in damage_sites(aln, cpg_only).filter(|site| site.is_deaminated()) {
                let damage = ancient_model.probability(site.distance);
                phreds[site.index] = rescale_phred(site.phred, damage);
            }
        }
        QualityAdjustment::Universal => {
            let model = ancient_model.without_floor();
            let len = aln.len();
            for index in 0..len {
                if aln.read[index] == b'N' || aln.reference[index] == b'N' {
                    continue;
                }
                let damage = (model.probability(index) + model.probability(len - 1 - index))
                    .min(MAX_COMBINED_DAMAGE);
                phreds[index] = rescale_phred(aln.phreds[index], damage);
            }
        }
    }
    phreds
}
