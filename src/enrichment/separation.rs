// src/enrichment/separation.rs

use crate::isotopes::registry::{IsotopeVector, IDX_235, N_ISOTOPES, URANIUM_ISOTOPES};

/// Mass number of the key isotope, whose separation factor is exactly 1.
const KEY_MASS: f64 = 238.0;
const REFERENCE_MASS: f64 = 235.0;

/// Per-isotope stage separation factors derived from the U-235 overall factor.
///
/// The factor is interpolated linearly in the mass difference to U-238,
/// following H. G. Wood, Science and Global Security 16:26-36 (2008).
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationFactors {
    factors: IsotopeVector,
}

impl SeparationFactors {
    /// Computes the separation factors for all tracked uranium isotopes.
    ///
    /// # Arguments
    ///
    /// * `gamma_235` - Overall U-235 separation factor of a stage (`alpha * beta`).
    pub fn new(gamma_235: f64) -> Self {
        let mut factors = [0.0; N_ISOTOPES];
        for (factor, &m) in factors.iter_mut().zip(URANIUM_ISOTOPES.iter()) {
            let delta_mass = KEY_MASS - m as f64;
            *factor = 1.0 + delta_mass * (gamma_235 - 1.0) / (KEY_MASS - REFERENCE_MASS);
        }
        SeparationFactors { factors }
    }

    pub fn factors(&self) -> &IsotopeVector {
        &self.factors
    }

    /// Separation factors normalised by the square root of the U-235 factor
    /// (E. von Halle, Eq. 15).
    pub fn alpha_star(&self) -> IsotopeVector {
        let norm = self.factors[IDX_235].sqrt();
        self.factors.map(|factor| factor / norm)
    }

    /// Exponent weights `k_i = (factor_i - 1) / (factor_235 - 1)` of the value function.
    pub fn value_weights(&self) -> IsotopeVector {
        let denom = self.factors[IDX_235] - 1.0;
        self.factors.map(|factor| (factor - 1.0) / denom)
    }
}
