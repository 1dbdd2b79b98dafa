// src/enrichment/flows.rs

use serde::Serialize;
use tracing::debug;

use crate::enrichment::concentrations::StreamConcentrations;
use crate::error::{CascadeError, CascadeResult};
use crate::isotopes::composition::{to_comp_map, CompMap};
use crate::isotopes::registry::{isotope_index, IsotopeVector, U235, U238};

/// Which stream limited the throughput of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingConstraint {
    Feed,
    Product,
    Swu,
}

/// Capacity limits of a single solve. `UNBOUNDED` means no limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowTargets {
    pub feed_qty: f64,    // [kg]
    pub product_qty: f64, // [kg]
    pub max_swu: f64,     // [kg SWU]
}

/// Stream quantities and separative work of a solved cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flows {
    pub feed: f64,
    pub product: f64,
    pub tails: f64,
    pub swu: f64,
    pub binding: BindingConstraint,
}

/// Multi-isotope separative value function (de la Garza).
///
/// # Arguments
///
/// * `composition` - Uranium fractions keyed by nuclide id. Non-uranium entries are ignored.
/// * `weights` - Value-function weights `k_i`, see `SeparationFactors::value_weights`.
///
/// # Returns
///
/// * `Ok(0.0)` for an empty composition.
/// * `Ok(value)` if U-235 and U-238 are both present.
/// * `Err(CascadeError::MissingKeyIsotope)` otherwise.
pub fn value_function(composition: &CompMap, weights: &IsotopeVector) -> CascadeResult<f64> {
    if composition.is_empty() {
        return Ok(0.0);
    }
    let key_fraction = |nuc| composition.get(&nuc).copied().filter(|&frac| frac > 0.0);
    let (x235, x238) = match (key_fraction(U235), key_fraction(U238)) {
        (Some(x235), Some(x238)) => (x235, x238),
        _ => {
            return Err(CascadeError::MissingKeyIsotope(format!("{:?}", composition)));
        }
    };

    let mut value = 0.0;
    for (&nuc, &frac) in composition {
        let Some(i) = isotope_index(nuc) else { continue };
        if frac == 0.0 {
            continue;
        }
        let k = weights[i];
        if (k - 0.5).abs() < 1e-12 {
            // removable singularity of frac / (2k - 1)
            value += (frac / x238).ln();
        } else {
            value += frac / (2.0 * k - 1.0);
        }
    }
    Ok(value * (x235 / x238).ln())
}

/// Value-function results of the three streams.
#[derive(Debug, Clone, Copy)]
struct StreamValues {
    feed: f64,
    product: f64,
    tails: f64,
}

impl StreamValues {
    fn evaluate(
        concentrations: &StreamConcentrations,
        feed: &IsotopeVector,
        weights: &IsotopeVector,
    ) -> CascadeResult<Self> {
        Ok(StreamValues {
            feed: value_function(&to_comp_map(feed), weights)?,
            product: value_function(&to_comp_map(&concentrations.product), weights)?,
            tails: value_function(&to_comp_map(&concentrations.tails), weights)?,
        })
    }
}

/// Resolves the binding constraint and computes stream quantities and SWU.
///
/// # Arguments
///
/// * `concentrations` - Converged stream compositions and cuts.
/// * `feed` - Uranium atom fractions of the feed.
/// * `weights` - Value-function weights.
/// * `targets` - Feed, product and SWU capacity limits.
///
/// # Returns
///
/// * `Ok(Flows)` satisfying all three limits, with the limit that binds.
/// * `Err` if a stream lacks U-235 or U-238.
pub(crate) fn solve_flows(
    concentrations: &StreamConcentrations,
    feed: &IsotopeVector,
    weights: &IsotopeVector,
    targets: &FlowTargets,
) -> CascadeResult<Flows> {
    let sum_e = concentrations.sum_e;
    let sum_s = concentrations.sum_s;

    let product_qty_hyp = targets.feed_qty * sum_e;
    let (mut feed_qty, mut product_qty, mut binding) = if product_qty_hyp < targets.product_qty {
        (targets.feed_qty, product_qty_hyp, BindingConstraint::Feed)
    } else {
        (targets.product_qty / sum_e, targets.product_qty, BindingConstraint::Product)
    };
    let mut tails_qty = feed_qty * sum_s;

    let values = StreamValues::evaluate(concentrations, feed, weights)?;
    let mut swu = values.product * product_qty + values.tails * tails_qty - values.feed * feed_qty;

    if swu > targets.max_swu {
        swu = targets.max_swu;
        feed_qty = swu / (values.product * sum_e + values.tails * sum_s - values.feed);
        product_qty = feed_qty * sum_e;
        tails_qty = feed_qty * sum_s;
        binding = BindingConstraint::Swu;
    }

    debug!(?binding, feed_qty, product_qty, tails_qty, swu, "flows solved");
    Ok(Flows {
        feed: feed_qty,
        product: product_qty,
        tails: tails_qty,
        swu,
        binding,
    })
}
