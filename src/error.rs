// src/error.rs

use std::fmt;

use thiserror::Error;

/// The two sections of a cascade, on either side of the feed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Enriching,
    Stripping,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Enriching => write!(f, "enriching"),
            Section::Stripping => write!(f, "stripping"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Unable to determine the number of {section} stages within {iterations} iterations")]
    StageSearchDiverged { section: Section, iterations: usize },

    #[error("Stage optimisation failed from all {guesses} initial guesses (best objective {best_objective:e})")]
    OptimisationFailed { guesses: usize, best_objective: f64 },

    #[error("Optimiser error: {0}")]
    Solver(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Composition lacks U-235 or U-238: {0}")]
    MissingKeyIsotope(String),

    #[error("Number of {section} stages is not a whole number: {value}")]
    NonIntegerStages { section: Section, value: f64 },

    #[error("Invalid (non-uranium) isotope: {0}")]
    InvalidIsotope(u32),

    #[error("Invalid composition: {0}")]
    InvalidComposition(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<argmin::core::Error> for CascadeError {
    fn from(e: argmin::core::Error) -> Self {
        CascadeError::Solver(e.to_string())
    }
}

pub type CascadeResult<T> = Result<T, CascadeError>;
