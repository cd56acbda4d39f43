/// Per-base probability of a non-damage substitution in a modern (contaminant) read.
pub const BACKGROUND_DAMAGE_RATE: f64 = 0.001;

/// Probability that a base shows post-mortem damage as a function of its distance
/// from the read terminus.
///
/// Distances are 0-based: 0 is the terminal base. Both curves are closed-form, so
/// there is no upper bound on the distance that can be evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageModel {
    /// `(1 - p)^d * p + constant`, i.e. a geometric distribution over the 1-based
    /// distance `d + 1` lifted by a constant floor.
    Geometric { p: f64, constant: f64 },
    Constant(f64),
}

impl DamageModel {
    pub fn ancient(p: f64, constant: f64) -> Self {
        DamageModel::Geometric { p, constant }
    }

    pub fn background() -> Self {
        DamageModel::Constant(BACKGROUND_DAMAGE_RATE)
    }

    /// Same decay with the floor removed, so that only terminal damage remains.
    pub fn without_floor(self) -> Self {
        match self {
            DamageModel::Geometric { p, .. } => DamageModel::Geometric { p, constant: 0.0 },
            DamageModel::Constant(_) => DamageModel::Constant(0.0),
        }
    }

    pub fn probability(&self, distance: usize) -> f64 {
        match *self {
            DamageModel::Geometric { p, constant } => {
                (1.0 - p).powf(distance as f64) * p + constant
            }
            DamageModel::Constant(prob) => prob,
        }
    }
}
