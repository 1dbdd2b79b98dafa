// src/lib.rs

//! Multi-isotope uranium enrichment cascade calculator.
//!
//! Designs a matched-abundance-ratio cascade for a feed containing the
//! uranium isotopes 232 to 238, sizes its streams against feed, product and
//! SWU capacity limits, and optionally downblends over-enriched product.

pub mod capacity;
pub mod enrichment;
pub mod error;
pub mod input;
pub mod isotopes;

pub use capacity::{CapacitySchedule, Converter, FeedConverter, SwuConverter};
pub use enrichment::{
    BindingConstraint, CascadeParameters, EnrichmentCalculator, EnrichmentOutput, StageCounts,
    StageNumber, UNBOUNDED,
};
pub use error::{CascadeError, CascadeResult};
pub use input::{parse_input_deck, InputDeck};
pub use isotopes::{Basis, Composition};
