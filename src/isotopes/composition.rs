// src/isotopes/composition.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CascadeError, CascadeResult};
use crate::isotopes::registry::{
    atomic_mass, isotope_index, nuc_id, IsotopeVector, NucId, N_ISOTOPES, U235,
    URANIUM_ISOTOPES,
};

/// Nuclide id -> fraction.
pub type CompMap = BTreeMap<NucId, f64>;

/// Fractions below this value are dropped from compositions handed to callers.
pub const ZERO_FRACTION_CUTOFF: f64 = 1e-20;

/// Tolerance used when deciding whether two compositions are the same material.
pub const EPS_COMP_MAP: f64 = 1e-5;

/// Whether the fractions of a composition count atoms or mass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    #[default]
    Atom,
    Mass,
}

/// An isotopic composition, stored as normalised atom fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    atom: CompMap,
}

impl Composition {
    /// Creates a composition from fractions in the given basis.
    ///
    /// # Arguments
    ///
    /// * `fractions` - Unnormalised, non-negative fractions keyed by nuclide id.
    /// * `basis` - Whether `fractions` are atom or mass fractions.
    ///
    /// # Returns
    ///
    /// * `Ok(Composition)` with atom fractions summing to 1.
    /// * `Err(CascadeError::InvalidComposition)` for negative, non-finite or all-zero input.
    pub fn new(fractions: CompMap, basis: Basis) -> CascadeResult<Self> {
        validate(&fractions)?;
        let mut atom = match basis {
            Basis::Atom => fractions,
            Basis::Mass => fractions
                .into_iter()
                .map(|(nuc, frac)| (nuc, frac / atomic_mass(nuc)))
                .collect(),
        };
        normalize(&mut atom);
        Ok(Composition { atom })
    }

    pub fn from_atom(fractions: CompMap) -> CascadeResult<Self> {
        Self::new(fractions, Basis::Atom)
    }

    pub fn from_mass(fractions: CompMap) -> CascadeResult<Self> {
        Self::new(fractions, Basis::Mass)
    }

    /// Normalised atom fractions.
    pub fn atom(&self) -> &CompMap {
        &self.atom
    }

    /// Normalised mass fractions.
    pub fn mass(&self) -> CompMap {
        let mut mass: CompMap = self
            .atom
            .iter()
            .map(|(&nuc, &frac)| (nuc, frac * atomic_mass(nuc)))
            .collect();
        normalize(&mut mass);
        mass
    }

    /// Atom fraction of all tracked uranium isotopes within the whole material.
    pub fn uranium_atom_fraction(&self) -> f64 {
        uranium_total(&self.atom)
    }

    /// Atom fraction of `nuc` within the uranium-only part of the composition.
    pub fn atom_frac(&self, nuc: NucId) -> CascadeResult<f64> {
        uranium_frac(&self.atom, nuc)
    }

    /// Mass fraction of `nuc` within the uranium-only part of the composition.
    pub fn mass_frac(&self, nuc: NucId) -> CascadeResult<f64> {
        uranium_frac(&self.mass(), nuc)
    }

    /// U-235 atom fraction of the uranium.
    pub fn atom_assay(&self) -> CascadeResult<f64> {
        self.atom_frac(U235)
    }

    /// U-235 mass fraction of the uranium.
    pub fn mass_assay(&self) -> CascadeResult<f64> {
        self.mass_frac(U235)
    }

    /// Uranium atom fractions renormalised over the tracked isotopes.
    pub fn uranium_vector(&self) -> CascadeResult<IsotopeVector> {
        let total = uranium_total(&self.atom);
        if total <= 0.0 {
            return Err(CascadeError::InvalidComposition(
                "composition contains no uranium".to_string(),
            ));
        }
        let mut v = [0.0; N_ISOTOPES];
        for (&nuc, &frac) in &self.atom {
            if let Some(i) = isotope_index(nuc) {
                v[i] = frac / total;
            }
        }
        Ok(v)
    }

    /// Compares atom fractions entry by entry, absent entries counting as zero.
    pub fn almost_eq(&self, other: &Composition, eps: f64) -> bool {
        self.atom
            .keys()
            .chain(other.atom.keys())
            .all(|nuc| {
                let a = self.atom.get(nuc).copied().unwrap_or(0.0);
                let b = other.atom.get(nuc).copied().unwrap_or(0.0);
                (a - b).abs() <= eps
            })
    }
}

/// Scales the fractions of `map` so that they sum to 1. Empty or zero maps are left untouched.
pub fn normalize(map: &mut CompMap) {
    let total: f64 = map.values().sum();
    if total > 0.0 {
        for frac in map.values_mut() {
            *frac /= total;
        }
    }
}

/// Builds a composition map from per-isotope values, dropping near-zero entries.
pub fn to_comp_map(v: &IsotopeVector) -> CompMap {
    URANIUM_ISOTOPES
        .iter()
        .zip(v.iter())
        .filter(|(_, &frac)| frac > ZERO_FRACTION_CUTOFF)
        .map(|(&m, &frac)| (nuc_id(m), frac))
        .collect()
}

/// Index of the first buffer composition that matches `comp`, if any.
///
/// Used by callers that keep one inventory per distinct feed composition.
pub fn matching_buffer_index(buffers: &[Composition], comp: &Composition) -> Option<usize> {
    buffers
        .iter()
        .position(|buf| buf.almost_eq(comp, EPS_COMP_MAP))
}

fn validate(fractions: &CompMap) -> CascadeResult<()> {
    if let Some((nuc, frac)) = fractions
        .iter()
        .find(|(_, frac)| !frac.is_finite() || **frac < 0.0)
    {
        return Err(CascadeError::InvalidComposition(format!(
            "nuclide {} has invalid fraction {}",
            nuc, frac
        )));
    }
    if fractions.values().sum::<f64>() <= 0.0 {
        return Err(CascadeError::InvalidComposition(
            "fractions sum to zero".to_string(),
        ));
    }
    Ok(())
}

fn uranium_total(map: &CompMap) -> f64 {
    map.iter()
        .filter(|(&nuc, _)| isotope_index(nuc).is_some())
        .map(|(_, frac)| frac)
        .sum()
}

// Non-uranium nuclides are not part of the cascade and are excluded here.
fn uranium_frac(map: &CompMap, nuc: NucId) -> CascadeResult<f64> {
    if isotope_index(nuc).is_none() {
        return Err(CascadeError::InvalidIsotope(nuc));
    }
    let total = uranium_total(map);
    if total <= 0.0 {
        return Err(CascadeError::InvalidComposition(
            "composition contains no uranium".to_string(),
        ));
    }
    Ok(map.get(&nuc).copied().unwrap_or(0.0) / total)
}
