// src/enrichment/mod.rs

pub mod calculator;
pub mod concentrations;
pub mod downblend;
pub mod flows;
pub mod separation;
pub mod stages;

/// Sentinel quantity meaning "no constraint from this stream".
pub const UNBOUNDED: f64 = 1e299;

pub use calculator::{CascadeParameters, CascadeState, EnrichmentCalculator, EnrichmentOutput};
pub use flows::{value_function, BindingConstraint, FlowTargets, Flows};
pub use separation::SeparationFactors;
pub use stages::{CascadeModel, IntegerSearch, QuasiNewton, StageCounts, StageNumber, StageSolver};
