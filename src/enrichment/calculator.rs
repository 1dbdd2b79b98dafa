// src/enrichment/calculator.rs

use serde::Serialize;
use tracing::debug;

use crate::enrichment::downblend::downblend;
use crate::enrichment::flows::{solve_flows, BindingConstraint, FlowTargets};
use crate::enrichment::separation::SeparationFactors;
use crate::enrichment::stages::{
    CascadeModel, IntegerSearch, QuasiNewton, StageCounts, StageNumber, StageSolver,
};
use crate::enrichment::UNBOUNDED;
use crate::error::{CascadeError, CascadeResult};
use crate::isotopes::composition::{to_comp_map, CompMap, Composition};
use crate::isotopes::registry::{IsotopeVector, IDX_235, N_ISOTOPES};

/// Inputs of a cascade design. Quantities set to `UNBOUNDED` do not constrain the solve.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeParameters {
    pub feed_composition: Composition,
    pub target_product_assay: f64, // U-235 atom fraction
    pub target_tails_assay: f64,   // U-235 atom fraction
    pub gamma_235: f64,
    pub target_feed_qty: f64,    // [kg]
    pub target_product_qty: f64, // [kg]
    pub max_swu: f64,            // [kg SWU]
    pub use_downblending: bool,
    pub use_integer_stages: bool,
}

impl CascadeParameters {
    /// Creates unconstrained parameters with integer staging and no downblending.
    pub fn new(
        feed_composition: Composition,
        target_product_assay: f64,
        target_tails_assay: f64,
        gamma_235: f64,
    ) -> Self {
        CascadeParameters {
            feed_composition,
            target_product_assay,
            target_tails_assay,
            gamma_235,
            target_feed_qty: UNBOUNDED,
            target_product_qty: UNBOUNDED,
            max_swu: UNBOUNDED,
            use_downblending: false,
            use_integer_stages: true,
        }
    }

    pub fn with_feed_qty(mut self, qty: f64) -> Self {
        self.target_feed_qty = qty;
        self
    }

    pub fn with_product_qty(mut self, qty: f64) -> Self {
        self.target_product_qty = qty;
        self
    }

    pub fn with_max_swu(mut self, swu: f64) -> Self {
        self.max_swu = swu;
        self
    }

    pub fn with_downblending(mut self, use_downblending: bool) -> Self {
        self.use_downblending = use_downblending;
        self
    }

    pub fn with_integer_stages(mut self, use_integer_stages: bool) -> Self {
        self.use_integer_stages = use_integer_stages;
        self
    }

    /// Checks the parameter combinations the solver cannot handle.
    pub fn validate(&self) -> CascadeResult<()> {
        if self.use_downblending && !self.use_integer_stages {
            return Err(CascadeError::ConfigError(
                "downblending requires integer stages".to_string(),
            ));
        }
        for (name, assay) in [
            ("product", self.target_product_assay),
            ("tails", self.target_tails_assay),
        ] {
            if !(assay > 0.0 && assay < 1.0) {
                return Err(CascadeError::ConfigError(format!(
                    "target {} assay must lie in (0, 1), got {}",
                    name, assay
                )));
            }
        }
        for (name, qty) in [
            ("feed", self.target_feed_qty),
            ("product", self.target_product_qty),
            ("SWU", self.max_swu),
        ] {
            if qty.is_nan() || qty < 0.0 {
                return Err(CascadeError::ConfigError(format!(
                    "{} capacity must be non-negative, got {}",
                    name, qty
                )));
            }
        }
        Ok(())
    }
}

/// Mutable result of the most recent solve.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeState {
    pub stages: StageCounts,
    pub product: IsotopeVector,
    pub tails: IsotopeVector,
    pub feed_qty: f64,
    pub product_qty: f64,
    pub tails_qty: f64,
    pub swu: f64,
    pub binding: BindingConstraint,
    pub blend_feed: f64, // feed blended into the product, 0 without downblending
}

/// Everything a caller needs from a solved cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentOutput {
    pub product_composition: CompMap,
    pub tails_composition: CompMap,
    pub feed_used: f64,
    pub swu_used: f64,
    pub product_produced: f64,
    pub tails_produced: f64,
    pub n_enriching: StageNumber, // whole under integer staging
    pub n_stripping: StageNumber,
}

/// Designs a matched-abundance-ratio cascade and computes its flows.
///
/// Construction performs the full solve. The instance keeps its last
/// solution and is meant to be owned by a single caller.
#[derive(Debug, Clone)]
pub struct EnrichmentCalculator {
    params: CascadeParameters,
    separation: SeparationFactors,
    model: CascadeModel,
    state: CascadeState,
}

impl EnrichmentCalculator {
    /// Validates the parameters and solves the cascade.
    ///
    /// # Arguments
    ///
    /// * `params` - Feed, targets, capacities and solver options.
    ///
    /// # Returns
    ///
    /// * `Ok(EnrichmentCalculator)` holding the solution.
    /// * `Err` on invalid configuration or if no staging reaches the targets.
    pub fn new(params: CascadeParameters) -> CascadeResult<Self> {
        params.validate()?;
        let separation = SeparationFactors::new(params.gamma_235);
        let model = CascadeModel {
            alpha_star: separation.alpha_star(),
            feed: params.feed_composition.uranium_vector()?,
            target_product_assay: params.target_product_assay,
            target_tails_assay: params.target_tails_assay,
        };
        let state = solve_cascade(&params, &separation, &model)?;
        Ok(EnrichmentCalculator {
            params,
            separation,
            model,
            state,
        })
    }

    /// Replaces the parameters and redesigns the cascade from scratch.
    ///
    /// On error the calculator keeps its previous parameters and solution.
    pub fn set_input(&mut self, params: CascadeParameters) -> CascadeResult<()> {
        *self = EnrichmentCalculator::new(params)?;
        Ok(())
    }

    /// Re-runs the full solve with the current parameters.
    pub fn build_cascade(&mut self) -> CascadeResult<()> {
        self.state = solve_cascade(&self.params, &self.separation, &self.model)?;
        Ok(())
    }

    pub fn state(&self) -> &CascadeState {
        &self.state
    }

    pub fn feed_used(&self) -> f64 {
        self.state.feed_qty
    }

    pub fn swu_used(&self) -> f64 {
        self.state.swu
    }

    pub fn product_produced(&self) -> f64 {
        self.state.product_qty
    }

    pub fn tails_produced(&self) -> f64 {
        self.state.tails_qty
    }

    pub fn n_enriching(&self) -> f64 {
        self.state.stages.enriching
    }

    pub fn n_stripping(&self) -> f64 {
        self.state.stages.stripping
    }

    pub fn binding_constraint(&self) -> BindingConstraint {
        self.state.binding
    }

    pub fn product_assay(&self) -> f64 {
        self.state.product[IDX_235]
    }

    pub fn tails_assay(&self) -> f64 {
        self.state.tails[IDX_235]
    }

    /// Product composition with near-zero entries removed.
    pub fn product_composition(&self) -> CompMap {
        to_comp_map(&self.state.product)
    }

    /// Tails composition with near-zero entries removed.
    pub fn tails_composition(&self) -> CompMap {
        to_comp_map(&self.state.tails)
    }

    /// Collects the solution into one record.
    ///
    /// Under integer staging the stage counts are checked to be whole numbers
    /// and reported as integers.
    pub fn enrichment_output(&self) -> CascadeResult<EnrichmentOutput> {
        let (n_enriching, n_stripping) = self.state.stages.numbers(self.params.use_integer_stages)?;
        Ok(EnrichmentOutput {
            product_composition: self.product_composition(),
            tails_composition: self.tails_composition(),
            feed_used: self.state.feed_qty,
            swu_used: self.state.swu,
            product_produced: self.state.product_qty,
            tails_produced: self.state.tails_qty,
            n_enriching,
            n_stripping,
        })
    }

    /// Per-isotope imbalance `feed - product - tails`, relative to the feed of that isotope.
    pub fn mass_balance_residuals(&self) -> IsotopeVector {
        let state = &self.state;
        let mut residuals = [0.0; N_ISOTOPES];
        for (i, residual) in residuals.iter_mut().enumerate() {
            let fed = state.feed_qty * self.model.feed[i];
            if fed == 0.0 {
                continue;
            }
            let out = state.product_qty * state.product[i] + state.tails_qty * state.tails[i];
            *residual = (fed - out) / fed;
        }
        residuals
    }
}

fn stage_solver(params: &CascadeParameters) -> Box<dyn StageSolver> {
    if params.use_integer_stages {
        Box::new(IntegerSearch::default())
    } else {
        Box::new(QuasiNewton::default())
    }
}

fn solve_cascade(
    params: &CascadeParameters,
    separation: &SeparationFactors,
    model: &CascadeModel,
) -> CascadeResult<CascadeState> {
    let solver = stage_solver(params);
    let solution = solver.solve(model)?;

    let targets = FlowTargets {
        feed_qty: params.target_feed_qty,
        product_qty: params.target_product_qty,
        max_swu: params.max_swu,
    };
    let weights = separation.value_weights();
    let mut state = CascadeState {
        stages: solution.stages,
        product: solution.concentrations.product,
        tails: solution.concentrations.tails,
        feed_qty: 0.0,
        product_qty: 0.0,
        tails_qty: 0.0,
        swu: 0.0,
        binding: BindingConstraint::Feed,
        blend_feed: 0.0,
    };

    let mut flows = solve_flows(&solution.concentrations, &model.feed, &weights, &targets)?;
    if params.use_downblending {
        if let Some(blend) = downblend(
            &solution.concentrations,
            &model.feed,
            &weights,
            &targets,
            params.target_product_assay,
        )? {
            flows = blend.flows;
            state.product = blend.product;
            state.blend_feed = blend.blend_feed;
        }
    }
    state.feed_qty = flows.feed;
    state.product_qty = flows.product;
    state.tails_qty = flows.tails;
    state.swu = flows.swu;
    state.binding = flows.binding;

    debug!(
        solver = solver.name(),
        n_enriching = state.stages.enriching,
        n_stripping = state.stages.stripping,
        feed = state.feed_qty,
        product = state.product_qty,
        swu = state.swu,
        "cascade solved"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::concentrations::solve_concentrations;
    use crate::error::Section;
    use crate::isotopes::registry::{U235, U238};

    fn nat_u() -> Composition {
        let mut cm = CompMap::new();
        cm.insert(922340000, 5.5e-3);
        cm.insert(922350000, 0.711);
        cm.insert(922380000, 99.289);
        Composition::from_atom(cm).unwrap()
    }

    fn reference_params() -> CascadeParameters {
        CascadeParameters::new(nat_u(), 0.9, 0.001, 1.3).with_feed_qty(100.0)
    }

    #[test]
    fn test_reference_cascade() {
        let calc = EnrichmentCalculator::new(reference_params()).unwrap();
        let output = calc.enrichment_output().unwrap();

        assert_eq!(output.n_enriching, StageNumber::Whole(56));
        assert_eq!(output.n_stripping, StageNumber::Whole(14));
        assert_eq!(output.feed_used, 100.0);
        assert!((output.product_produced - 0.67202).abs() < 1e-4);
        assert!((output.tails_produced - 99.32798).abs() < 1e-4);
        assert!((output.swu_used - 199.171).abs() < 1e-3);
        assert_eq!(calc.binding_constraint(), BindingConstraint::Feed);
    }

    #[test]
    fn test_reference_compositions() {
        let calc = EnrichmentCalculator::new(reference_params()).unwrap();
        let product = calc.product_composition();
        let tails = calc.tails_composition();

        // Isotopes absent from the feed do not show up in the outputs
        assert_eq!(product.len(), 3);
        assert_eq!(tails.len(), 3);
        assert!((product[&U235] - 0.910203).abs() < 1e-6);
        assert!((tails[&U235] - 0.00099990).abs() < 1e-8);
        assert!(product[&U238] < tails[&U238]);
    }

    #[test]
    fn test_mass_balance() {
        let calc = EnrichmentCalculator::new(reference_params()).unwrap();
        for residual in calc.mass_balance_residuals() {
            assert!(residual.abs() < 1e-9);
        }
    }

    #[test]
    fn test_continuous_stages() {
        let params = reference_params().with_integer_stages(false);
        let calc = EnrichmentCalculator::new(params).unwrap();

        assert!((calc.n_enriching() - 55.0127).abs() < 1e-3);
        assert!((calc.n_stripping() - 13.9993).abs() < 1e-3);
        assert!((calc.product_assay() - 0.9).abs() < 1e-6);
        assert!((calc.product_produced() - 0.679600).abs() < 1e-5);
        assert!((calc.swu_used() - 199.0188).abs() < 1e-3);
        // fractional stage counts are fine without integer staging
        let output = calc.enrichment_output().unwrap();
        assert!(matches!(output.n_enriching, StageNumber::Real(_)));
        assert_eq!(output.n_stripping.as_f64(), calc.n_stripping());
    }

    #[test]
    fn test_downblending() {
        let params = reference_params().with_downblending(true);
        let calc = EnrichmentCalculator::new(params).unwrap();

        assert!((calc.product_assay() - 0.9).abs() < 5e-5);
        assert!((calc.feed_used() - 100.0).abs() < 1e-10);
        assert!((calc.product_produced() - 0.679611).abs() < 1e-6);
        assert!(calc.state().blend_feed > 0.0);
        assert_eq!(calc.enrichment_output().unwrap().n_enriching, StageNumber::Whole(56));
    }

    #[test]
    fn test_downblending_requires_integer_stages() {
        let params = reference_params()
            .with_downblending(true)
            .with_integer_stages(false);
        assert!(matches!(
            EnrichmentCalculator::new(params),
            Err(CascadeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_swu_constraint() {
        let calc = EnrichmentCalculator::new(reference_params().with_max_swu(100.0)).unwrap();
        assert_eq!(calc.swu_used(), 100.0);
        assert_eq!(calc.binding_constraint(), BindingConstraint::Swu);
        assert!((calc.feed_used() - 50.20814).abs() < 1e-4);
    }

    #[test]
    fn test_constraint_symmetry() {
        let by_feed = EnrichmentCalculator::new(reference_params()).unwrap();
        let q = by_feed.product_produced();

        let params = CascadeParameters::new(nat_u(), 0.9, 0.001, 1.3).with_product_qty(q);
        let by_product = EnrichmentCalculator::new(params).unwrap();

        assert_eq!(by_product.binding_constraint(), BindingConstraint::Product);
        assert!((by_product.feed_used() - by_feed.feed_used()).abs() < 1e-9);
        assert!((by_product.product_produced() - q).abs() < 1e-12);
        assert!((by_product.swu_used() - by_feed.swu_used()).abs() < 1e-7);
    }

    #[test]
    fn test_set_input_is_idempotent() {
        let mut calc = EnrichmentCalculator::new(reference_params()).unwrap();
        let single = calc.enrichment_output().unwrap();

        calc.set_input(reference_params()).unwrap();
        calc.set_input(reference_params()).unwrap();
        assert_eq!(calc.enrichment_output().unwrap(), single);

        calc.build_cascade().unwrap();
        assert_eq!(calc.enrichment_output().unwrap(), single);
    }

    #[test]
    fn test_set_input_redesigns_cascade() {
        let mut calc = EnrichmentCalculator::new(reference_params()).unwrap();
        let params = CascadeParameters::new(nat_u(), 0.05, 0.003, 1.3).with_feed_qty(100.0);
        calc.set_input(params).unwrap();

        assert!(calc.n_enriching() < 56.0);
        assert!(calc.product_assay() >= 0.05);
        assert!(calc.tails_assay() <= 0.003);
    }

    #[test]
    fn test_failed_set_input_keeps_previous_solution() {
        let mut calc = EnrichmentCalculator::new(reference_params()).unwrap();
        let before = calc.enrichment_output().unwrap();

        let bad = CascadeParameters::new(nat_u(), 0.9, 0.001, 1.0).with_feed_qty(100.0);
        assert!(matches!(
            calc.set_input(bad),
            Err(CascadeError::StageSearchDiverged {
                section: Section::Enriching,
                ..
            })
        ));
        assert_eq!(calc.enrichment_output().unwrap(), before);
    }

    #[test]
    fn test_feed_without_uranium_rejected() {
        let mut cm = CompMap::new();
        cm.insert(942390000, 1.0);
        let params = CascadeParameters::new(Composition::from_atom(cm).unwrap(), 0.9, 0.001, 1.3);
        assert!(matches!(
            EnrichmentCalculator::new(params),
            Err(CascadeError::InvalidComposition(_))
        ));
    }

    #[test]
    fn test_invalid_assays_rejected() {
        let params = CascadeParameters::new(nat_u(), 1.5, 0.001, 1.3);
        assert!(matches!(
            EnrichmentCalculator::new(params),
            Err(CascadeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_intermediate_steps_match_calculator() {
        let calc = EnrichmentCalculator::new(reference_params()).unwrap();
        let c = solve_concentrations(&calc.model.alpha_star, &calc.model.feed, 56.0, 14.0);
        assert_eq!(c.product, calc.state.product);
        assert_eq!(c.tails, calc.state.tails);
    }
}
