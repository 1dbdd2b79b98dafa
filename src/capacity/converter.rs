// src/capacity/converter.rs

use crate::enrichment::{CascadeParameters, EnrichmentCalculator};
use crate::error::CascadeResult;
use crate::isotopes::composition::{Composition, EPS_COMP_MAP};

/// Translates a product request into the capacity it would consume.
pub trait Converter {
    /// # Arguments
    ///
    /// * `product_qty` - Requested product [kg].
    /// * `product_assay` - U-235 atom fraction of the requested product.
    fn convert(&self, product_qty: f64, product_assay: f64) -> CascadeResult<f64>;
}

/// Cascade settings shared by both converters.
#[derive(Debug, Clone)]
struct ConverterCascade {
    feed: Composition,
    tails_assay: f64,
    gamma_235: f64,
}

impl ConverterCascade {
    // Only the product quantity constrains the throwaway cascade.
    fn solve(&self, product_qty: f64, product_assay: f64) -> CascadeResult<EnrichmentCalculator> {
        let params = CascadeParameters::new(
            self.feed.clone(),
            product_assay,
            self.tails_assay,
            self.gamma_235,
        )
        .with_product_qty(product_qty);
        EnrichmentCalculator::new(params)
    }
}

impl PartialEq for ConverterCascade {
    fn eq(&self, other: &Self) -> bool {
        self.feed.almost_eq(&other.feed, EPS_COMP_MAP)
            && self.tails_assay == other.tails_assay
            && self.gamma_235 == other.gamma_235
    }
}

/// Separative work needed for a product request [kg SWU].
#[derive(Debug, Clone, PartialEq)]
pub struct SwuConverter {
    cascade: ConverterCascade,
}

impl SwuConverter {
    pub fn new(feed: Composition, tails_assay: f64, gamma_235: f64) -> Self {
        SwuConverter {
            cascade: ConverterCascade {
                feed,
                tails_assay,
                gamma_235,
            },
        }
    }
}

impl Converter for SwuConverter {
    fn convert(&self, product_qty: f64, product_assay: f64) -> CascadeResult<f64> {
        Ok(self.cascade.solve(product_qty, product_assay)?.swu_used())
    }
}

/// Feed material needed for a product request [kg], non-uranium content included.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConverter {
    cascade: ConverterCascade,
}

impl FeedConverter {
    pub fn new(feed: Composition, tails_assay: f64, gamma_235: f64) -> Self {
        FeedConverter {
            cascade: ConverterCascade {
                feed,
                tails_assay,
                gamma_235,
            },
        }
    }
}

impl Converter for FeedConverter {
    fn convert(&self, product_qty: f64, product_assay: f64) -> CascadeResult<f64> {
        let feed_used = self.cascade.solve(product_qty, product_assay)?.feed_used();
        Ok(feed_used / self.cascade.feed.uranium_atom_fraction())
    }
}
