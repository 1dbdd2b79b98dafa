// src/input/input_deck.rs
use serde::Deserialize;

use crate::capacity::CapacitySchedule;
use crate::enrichment::{CascadeParameters, UNBOUNDED};
use crate::error::CascadeResult;
use crate::isotopes::composition::{Basis, CompMap, Composition};

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    #[serde(default)]
    pub basis: Basis,       // atom | mass
    pub nuclides: CompMap,  // nuclide id -> unnormalised fraction
}

#[derive(Debug, Clone, Deserialize)]
pub struct Targets {
    pub product_assay: f64, // U-235 atom fraction
    pub tails_assay: f64,   // U-235 atom fraction
}

#[derive(Debug, Clone, Deserialize)]
pub struct CascadeSettings {
    pub gamma_235: f64,               // stage separation factor of U-235 vs U-238
    #[serde(default = "default_true")]
    pub use_integer_stages: bool,
    #[serde(default)]
    pub use_downblending: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapacitySettings {
    pub feed_qty: Option<f64>,                    // [kg]
    pub product_qty: Option<f64>,                 // [kg]
    pub max_swu: Option<f64>,                     // [kg SWU]
    pub swu_schedule: Option<CapacitySchedule>,   // overrides max_swu
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputDeck {
    pub feed: FeedSettings,
    pub targets: Targets,
    pub cascade: CascadeSettings,
    #[serde(default)]
    pub capacity: CapacitySettings,
    #[serde(default)]
    pub timestep: u32,
}

fn default_true() -> bool {
    true
}

impl InputDeck {
    /// SWU capacity in force at the deck's timestep.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` from the schedule if one is given, else `max_swu`, else `UNBOUNDED`.
    /// * `Err(CascadeError::Schedule)` if the schedule is inconsistent.
    pub fn swu_capacity(&self) -> CascadeResult<f64> {
        match &self.capacity.swu_schedule {
            Some(schedule) => {
                schedule.validate(None)?;
                Ok(schedule.value_at(self.timestep))
            }
            None => Ok(self.capacity.max_swu.unwrap_or(UNBOUNDED)),
        }
    }

    /// Builds the solver parameters described by the deck.
    ///
    /// # Returns
    ///
    /// * `Ok(CascadeParameters)` with absent capacities set to `UNBOUNDED`.
    /// * `Err` if the feed composition or the SWU schedule is invalid.
    pub fn cascade_parameters(&self) -> CascadeResult<CascadeParameters> {
        let feed = Composition::new(self.feed.nuclides.clone(), self.feed.basis)?;
        let params = CascadeParameters::new(
            feed,
            self.targets.product_assay,
            self.targets.tails_assay,
            self.cascade.gamma_235,
        )
        .with_feed_qty(self.capacity.feed_qty.unwrap_or(UNBOUNDED))
        .with_product_qty(self.capacity.product_qty.unwrap_or(UNBOUNDED))
        .with_max_swu(self.swu_capacity()?)
        .with_integer_stages(self.cascade.use_integer_stages)
        .with_downblending(self.cascade.use_downblending);
        Ok(params)
    }
}
