// src/isotopes/mod.rs

pub mod composition;
pub mod registry;

pub use composition::{Basis, CompMap, Composition};
pub use registry::{IsotopeVector, NucId, N_ISOTOPES, U235, U238, URANIUM_ISOTOPES};
