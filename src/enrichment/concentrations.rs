// src/enrichment/concentrations.rs

use crate::isotopes::registry::{IsotopeVector, IDX_235, N_ISOTOPES};

/// Equilibrium compositions of the product and tails streams for a given staging.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConcentrations {
    pub product: IsotopeVector,
    pub tails: IsotopeVector,
    pub sum_e: f64, // product per unit of feed
    pub sum_s: f64, // tails per unit of feed
}

impl StreamConcentrations {
    pub fn product_assay(&self) -> f64 {
        self.product[IDX_235]
    }

    pub fn tails_assay(&self) -> f64 {
        self.tails[IDX_235]
    }
}

/// Solves the matched-abundance-ratio cascade equations for a fixed number of stages.
///
/// Variable names and equation numbers follow E. von Halle, "Multicomponent
/// isotope separation in matched abundance ratio cascades composed of stages
/// with large separation factors" (1987).
///
/// # Arguments
///
/// * `alpha_star` - Normalised separation factors.
/// * `feed` - Uranium atom fractions of the feed, summing to 1.
/// * `n_enriching` - Number of stages in the enriching section.
/// * `n_stripping` - Number of stages in the stripping section.
///
/// # Returns
///
/// * `StreamConcentrations` holding the product and tails compositions and the
///   product/tails cuts. Non-physical stage counts yield non-finite values
///   rather than an error.
pub(crate) fn solve_concentrations(
    alpha_star: &IsotopeVector,
    feed: &IsotopeVector,
    n_enriching: f64,
    n_stripping: f64,
) -> StreamConcentrations {
    let mut e = [0.0; N_ISOTOPES];
    let mut s = [0.0; N_ISOTOPES];
    let mut sum_e = 0.0;
    let mut sum_s = 0.0;

    for i in 0..N_ISOTOPES {
        if feed[i] == 0.0 {
            continue;
        }
        let a = alpha_star[i];
        e[i] = 1.0 / a / (1.0 - a.powf(-n_enriching)); // Eq. (37)
        s[i] = 1.0 / a / (a.powf(n_stripping + 1.0) - 1.0); // Eq. (39)
        sum_e += e[i] * feed[i] / (e[i] + s[i]); // Eq. (48) denominator
        sum_s += s[i] * feed[i] / (e[i] + s[i]); // Eq. (51) denominator
    }

    let mut product = [0.0; N_ISOTOPES];
    let mut tails = [0.0; N_ISOTOPES];
    for i in 0..N_ISOTOPES {
        if feed[i] == 0.0 {
            continue;
        }
        product[i] = e[i] * feed[i] / (e[i] + s[i]) / sum_e;
        tails[i] = s[i] * feed[i] / (e[i] + s[i]) / sum_s;
    }

    StreamConcentrations {
        product,
        tails,
        sum_e,
        sum_s,
    }
}
