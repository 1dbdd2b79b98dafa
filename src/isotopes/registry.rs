// src/isotopes/registry.rs

use crate::error::{CascadeError, CascadeResult};

/// Canonical nuclide identifier in `ZZZAAASSSS` form, e.g. 922350000 for U-235.
pub type NucId = u32;

pub const N_ISOTOPES: usize = 6;

/// Mass numbers of the uranium isotopes tracked through the cascade, lightest first.
pub const URANIUM_ISOTOPES: [u32; N_ISOTOPES] = [232, 233, 234, 235, 236, 238];

/// Atomic masses [g/mol], in the order of `URANIUM_ISOTOPES`.
pub const ATOMIC_MASSES: [f64; N_ISOTOPES] = [
    232.037_156_2,
    233.039_635_2,
    234.040_952_1,
    235.043_929_9,
    236.045_568_0,
    238.050_788_2,
];

/// Position of U-235 in `URANIUM_ISOTOPES`.
pub const IDX_235: usize = 3;
/// Position of U-238, the key isotope, in `URANIUM_ISOTOPES`.
pub const IDX_238: usize = 5;

pub const U235: NucId = nuc_id(235);
pub const U238: NucId = nuc_id(238);

/// One value per uranium isotope, indexed like `URANIUM_ISOTOPES`.
pub type IsotopeVector = [f64; N_ISOTOPES];

const URANIUM_Z: u32 = 92;

/// Builds the nuclide identifier of a uranium isotope without validation.
pub const fn nuc_id(mass_number: u32) -> NucId {
    (URANIUM_Z * 1000 + mass_number) * 10000
}

/// Nuclide identifiers of all tracked uranium isotopes.
pub fn isotopes_nuc_id() -> [NucId; N_ISOTOPES] {
    URANIUM_ISOTOPES.map(nuc_id)
}

/// Converts a uranium mass number into its nuclide identifier.
///
/// # Arguments
///
/// * `isotope` - Mass number, e.g. `235`.
///
/// # Returns
///
/// * `Ok(NucId)` for one of the six tracked isotopes.
/// * `Err(CascadeError::InvalidIsotope)` otherwise.
pub fn isotope_to_nuc_id(isotope: u32) -> CascadeResult<NucId> {
    if URANIUM_ISOTOPES.contains(&isotope) {
        Ok(nuc_id(isotope))
    } else {
        Err(CascadeError::InvalidIsotope(isotope))
    }
}

/// Converts a nuclide identifier back into the uranium mass number.
pub fn nuc_id_to_isotope(nuc: NucId) -> CascadeResult<u32> {
    isotope_index(nuc)
        .map(|i| URANIUM_ISOTOPES[i])
        .ok_or(CascadeError::InvalidIsotope(nuc))
}

/// Position of a nuclide in `URANIUM_ISOTOPES`, `None` for non-uranium nuclides.
pub fn isotope_index(nuc: NucId) -> Option<usize> {
    URANIUM_ISOTOPES.iter().position(|&m| nuc_id(m) == nuc)
}

pub fn is_uranium(nuc: NucId) -> bool {
    isotope_index(nuc).is_some()
}

/// Molar mass [g/mol] used for atom/mass conversion.
///
/// Tracked uranium isotopes use tabulated masses; any other nuclide is
/// approximated by its mass number.
pub fn atomic_mass(nuc: NucId) -> f64 {
    match isotope_index(nuc) {
        Some(i) => ATOMIC_MASSES[i],
        None => ((nuc / 10000) % 1000) as f64,
    }
}
