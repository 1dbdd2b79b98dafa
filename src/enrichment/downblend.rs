// src/enrichment/downblend.rs

use tracing::debug;

use crate::enrichment::concentrations::StreamConcentrations;
use crate::enrichment::flows::{solve_flows, BindingConstraint, FlowTargets, Flows};
use crate::error::{CascadeError, CascadeResult};
use crate::isotopes::registry::{IsotopeVector, IDX_235, N_ISOTOPES};

/// Product assays within this distance above the target are left alone.
pub const DOWNBLEND_TOLERANCE: f64 = 5e-5;

/// Relative slack when comparing blended quantities to the original limits.
const LIMIT_SLACK: f64 = 1e-12;

/// Outcome of blending raw feed into over-enriched product.
#[derive(Debug, Clone, PartialEq)]
pub struct Downblend {
    pub ratio: f64,      // blend feed per unit of enriched product
    pub blend_feed: f64, // [kg]
    pub flows: Flows,    // feed and product include the blend material
    pub product: IsotopeVector,
}

/// Blends feed into the product so that the target product assay is met exactly.
///
/// Integer staging overshoots the target by up to one stage of separation.
/// The overshoot is removed by diluting the product with feed; the enrichment
/// targets are shrunk first so that enriched product plus blend material
/// still respects the original feed and product limits. Blending consumes no
/// separative work.
///
/// # Arguments
///
/// * `concentrations` - Stream compositions of the converged integer staging.
/// * `feed` - Uranium atom fractions of the feed.
/// * `weights` - Value-function weights.
/// * `targets` - Original (unshrunk) capacity limits.
/// * `target_product_assay` - Assay the blended product must have.
///
/// # Returns
///
/// * `Ok(None)` if the product assay is already within `DOWNBLEND_TOLERANCE`.
/// * `Ok(Some(Downblend))` with the blended product and adjusted flows.
pub(crate) fn downblend(
    concentrations: &StreamConcentrations,
    feed: &IsotopeVector,
    weights: &IsotopeVector,
    targets: &FlowTargets,
    target_product_assay: f64,
) -> CascadeResult<Option<Downblend>> {
    let product_assay = concentrations.product_assay();
    if product_assay - target_product_assay <= DOWNBLEND_TOLERANCE {
        return Ok(None);
    }
    let feed_assay = feed[IDX_235];
    if target_product_assay <= feed_assay {
        return Err(CascadeError::ConfigError(format!(
            "cannot downblend to product assay {} with feed assay {}",
            target_product_assay, feed_assay
        )));
    }

    let ratio = (product_assay - target_product_assay) / (target_product_assay - feed_assay);
    let shrunk_feed = targets.feed_qty / (1.0 + ratio * concentrations.sum_e);
    let shrunk_product = targets.product_qty / (1.0 + ratio);

    let mut shrunk = *targets;
    let unblended = solve_flows(concentrations, feed, weights, targets)?;
    match unblended.binding {
        BindingConstraint::Product => shrunk.product_qty = shrunk_product,
        BindingConstraint::Feed => shrunk.feed_qty = shrunk_feed,
        BindingConstraint::Swu => {}
    }
    let mut flows = solve_flows(concentrations, feed, weights, &shrunk)?;
    let mut blend_feed = ratio * flows.product;

    // Shrinking one limit can make the other one bind.
    if flows.feed + blend_feed > targets.feed_qty * (1.0 + LIMIT_SLACK) {
        shrunk.feed_qty = shrunk_feed;
        flows = solve_flows(concentrations, feed, weights, &shrunk)?;
        blend_feed = ratio * flows.product;
    }
    if flows.product + blend_feed > targets.product_qty * (1.0 + LIMIT_SLACK) {
        shrunk.product_qty = shrunk_product;
        flows = solve_flows(concentrations, feed, weights, &shrunk)?;
        blend_feed = ratio * flows.product;
    }

    let mut product = [0.0; N_ISOTOPES];
    for i in 0..N_ISOTOPES {
        product[i] = (concentrations.product[i] * flows.product + feed[i] * blend_feed)
            / (flows.product + blend_feed);
    }
    flows.feed += blend_feed;
    flows.product += blend_feed;

    debug!(ratio, blend_feed, binding = ?flows.binding, "product downblended");
    Ok(Some(Downblend {
        ratio,
        blend_feed,
        flows,
        product,
    }))
}
