// src/capacity/schedule.rs

use serde::Deserialize;

use crate::enrichment::UNBOUNDED;
use crate::error::{CascadeError, CascadeResult};

/// A capacity that changes in steps over the simulation.
///
/// `value[i]` applies from timestep `time[i]` until the next entry. When
/// `time` is empty the values apply to consecutive timesteps 0, 1, 2, ...
/// and the last value holds afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapacitySchedule {
    #[serde(default)]
    pub time: Vec<u32>, // [timestep]
    pub value: Vec<f64>, // [kg SWU] per timestep
}

impl CapacitySchedule {
    /// Creates a validated schedule.
    ///
    /// # Arguments
    ///
    /// * `time` - Timesteps at which each value starts to apply, may be empty.
    /// * `value` - Capacity values.
    pub fn new(time: Vec<u32>, value: Vec<f64>) -> CascadeResult<Self> {
        let schedule = CapacitySchedule { time, value };
        schedule.validate(None)?;
        Ok(schedule)
    }

    /// Checks that the schedule describes a well-formed step function.
    ///
    /// # Arguments
    ///
    /// * `lifetime` - Number of timesteps the facility operates, if bounded.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the schedule is consistent.
    /// * `Err(CascadeError::Schedule)` describing the first problem found.
    pub fn validate(&self, lifetime: Option<u32>) -> CascadeResult<()> {
        if self.value.is_empty() {
            return Err(CascadeError::Schedule("no capacity values given".to_string()));
        }
        if let Some(v) = self.value.iter().find(|v| v.is_nan() || **v < 0.0) {
            return Err(CascadeError::Schedule(format!("invalid capacity value {}", v)));
        }
        if let Some(lifetime) = lifetime {
            if self.value.len() > lifetime as usize {
                return Err(CascadeError::Schedule(format!(
                    "{} entries exceed the lifetime of {} timesteps",
                    self.value.len(),
                    lifetime
                )));
            }
        }
        if self.time.is_empty() {
            return Ok(());
        }

        if self.time.len() != self.value.len() {
            return Err(CascadeError::Schedule(format!(
                "{} times but {} values",
                self.time.len(),
                self.value.len()
            )));
        }
        if self.time[0] != 0 {
            return Err(CascadeError::Schedule(format!(
                "first entry must start at timestep 0, got {}",
                self.time[0]
            )));
        }
        if let Some(w) = self.time.windows(2).find(|w| w[1] <= w[0]) {
            return Err(CascadeError::Schedule(format!(
                "times must increase strictly, got {} after {}",
                w[1], w[0]
            )));
        }
        if let (Some(lifetime), Some(&last)) = (lifetime, self.time.last()) {
            if last >= lifetime {
                return Err(CascadeError::Schedule(format!(
                    "entry at timestep {} lies beyond the lifetime of {} timesteps",
                    last, lifetime
                )));
            }
        }
        Ok(())
    }

    /// Retrieves the capacity in force at a timestep.
    ///
    /// # Arguments
    ///
    /// * `timestep` - Current simulation timestep.
    ///
    /// # Returns
    ///
    /// * `f64` capacity, or `UNBOUNDED` for an empty schedule.
    pub fn value_at(&self, timestep: u32) -> f64 {
        if self.time.is_empty() {
            let i = (timestep as usize).min(self.value.len().saturating_sub(1));
            return self.value.get(i).copied().unwrap_or(UNBOUNDED);
        }
        step_lookup(&self.time, &self.value, timestep)
    }
}

/// Value of the last entry with `x[i] <= at`; the first value before the start.
fn step_lookup(x: &[u32], y: &[f64], at: u32) -> f64 {
    let n = x.partition_point(|&t| t <= at);
    let i = n.saturating_sub(1);
    y.get(i).copied().unwrap_or(UNBOUNDED)
}
