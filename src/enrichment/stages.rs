// src/enrichment/stages.rs

use std::fmt;

use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::BFGS;
use finitediff::FiniteDiff;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::enrichment::concentrations::{solve_concentrations, StreamConcentrations};
use crate::error::{CascadeError, CascadeResult, Section};
use crate::isotopes::registry::IsotopeVector;

/// Iteration ceiling of the integer stage search, per section. Needing this many stages is fatal.
pub const K_ITER_MAX: usize = 200;

/// Tolerance when checking that a stage count is a whole number.
const WHOLE_NUMBER_EPS: f64 = 1e-9;

/// Objective assigned to trial stagings whose assays are not finite.
const NON_FINITE_OBJECTIVE: f64 = 1e12;

/// Everything a stage solver needs to evaluate trial stagings.
#[derive(Debug, Clone)]
pub struct CascadeModel {
    pub alpha_star: IsotopeVector,
    pub feed: IsotopeVector, // uranium atom fractions, sum 1
    pub target_product_assay: f64,
    pub target_tails_assay: f64,
}

impl CascadeModel {
    pub fn concentrations(&self, stages: StageCounts) -> StreamConcentrations {
        solve_concentrations(&self.alpha_star, &self.feed, stages.enriching, stages.stripping)
    }
}

/// Number of stages in the enriching and stripping sections.
///
/// Stored as floating point so the continuous solver can use the same type;
/// the integer search only ever produces whole numbers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StageCounts {
    pub enriching: f64,
    pub stripping: f64,
}

impl StageCounts {
    pub fn new(enriching: f64, stripping: f64) -> Self {
        StageCounts {
            enriching,
            stripping,
        }
    }

    /// Returns the stage counts as integers.
    ///
    /// # Returns
    ///
    /// * `Ok((n_enriching, n_stripping))` if both counts are whole numbers.
    /// * `Err(CascadeError::NonIntegerStages)` naming the first offending section.
    pub fn as_whole(&self) -> CascadeResult<(u32, u32)> {
        Ok((
            whole(self.enriching, Section::Enriching)?,
            whole(self.stripping, Section::Stripping)?,
        ))
    }

    /// Stage counts for reporting: whole numbers under integer staging, real numbers otherwise.
    pub fn numbers(&self, integer_stages: bool) -> CascadeResult<(StageNumber, StageNumber)> {
        if integer_stages {
            let (enriching, stripping) = self.as_whole()?;
            Ok((StageNumber::Whole(enriching), StageNumber::Whole(stripping)))
        } else {
            Ok((
                StageNumber::Real(self.enriching),
                StageNumber::Real(self.stripping),
            ))
        }
    }
}

fn whole(value: f64, section: Section) -> CascadeResult<u32> {
    if !value.is_finite() || value < 0.0 || value.fract() > WHOLE_NUMBER_EPS {
        return Err(CascadeError::NonIntegerStages { section, value });
    }
    Ok(value.trunc() as u32)
}

/// A reported stage count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageNumber {
    Whole(u32),
    Real(f64),
}

impl StageNumber {
    pub fn as_f64(&self) -> f64 {
        match *self {
            StageNumber::Whole(n) => n as f64,
            StageNumber::Real(n) => n,
        }
    }
}

impl fmt::Display for StageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageNumber::Whole(n) => write!(f, "{}", n),
            StageNumber::Real(n) => write!(f, "{:.6}", n),
        }
    }
}

/// Stage counts together with the concentrations they produce.
#[derive(Debug, Clone)]
pub struct StageSolution {
    pub stages: StageCounts,
    pub concentrations: StreamConcentrations,
}

/// A policy that decides how many stages each cascade section needs.
pub trait StageSolver {
    fn name(&self) -> &'static str;

    fn solve(&self, model: &CascadeModel) -> CascadeResult<StageSolution>;
}

/// Adds whole stages until the target assays are reached or exceeded.
///
/// The enriching section is grown first (with no stripping stages), then the
/// stripping section. Extra stripping stages only raise the product assay, so
/// the product target stays met.
#[derive(Debug, Clone)]
pub struct IntegerSearch {
    pub max_iterations: usize,
}

impl Default for IntegerSearch {
    fn default() -> Self {
        IntegerSearch {
            max_iterations: K_ITER_MAX,
        }
    }
}

impl IntegerSearch {
    // Stage counts run from 1 up to, but excluding, `max_iterations`.
    fn search<F, R>(
        &self,
        section: Section,
        evaluate: F,
        reached: R,
    ) -> CascadeResult<(f64, StreamConcentrations)>
    where
        F: Fn(f64) -> StreamConcentrations,
        R: Fn(&StreamConcentrations) -> bool,
    {
        for n in 1..self.max_iterations {
            let n_stages = n as f64;
            let c = evaluate(n_stages);
            if reached(&c) {
                return Ok((n_stages, c));
            }
        }
        Err(CascadeError::StageSearchDiverged {
            section,
            iterations: self.max_iterations,
        })
    }
}

impl StageSolver for IntegerSearch {
    fn name(&self) -> &'static str {
        "integer search"
    }

    fn solve(&self, model: &CascadeModel) -> CascadeResult<StageSolution> {
        let (n_enriching, _) = self.search(
            Section::Enriching,
            |n| model.concentrations(StageCounts::new(n, 0.0)),
            |c| c.product_assay() >= model.target_product_assay,
        )?;
        let (n_stripping, concentrations) = self.search(
            Section::Stripping,
            |n| model.concentrations(StageCounts::new(n_enriching, n)),
            |c| c.tails_assay() <= model.target_tails_assay,
        )?;

        debug!(n_enriching, n_stripping, "integer stage search converged");
        Ok(StageSolution {
            stages: StageCounts::new(n_enriching, n_stripping),
            concentrations,
        })
    }
}

/// Squared relative deviation of the product and tails assays from their targets.
///
/// Pure in the cascade model: the trial concentrations are returned to the
/// caller rather than stored anywhere.
pub(crate) fn stage_objective(
    stages: &[f64],
    model: &CascadeModel,
) -> (f64, StreamConcentrations) {
    let c = model.concentrations(StageCounts::new(stages[0], stages[1]));
    let delta_product = (c.product_assay() - model.target_product_assay) / model.target_product_assay;
    let delta_tails = (c.tails_assay() - model.target_tails_assay) / model.target_tails_assay;
    let value = delta_product.powi(2) + delta_tails.powi(2);
    (value, c)
}

/// `stage_objective` as an argmin problem over `[n_enriching, n_stripping]`.
struct StageProblem {
    model: CascadeModel,
}

impl StageProblem {
    fn objective(&self, stages: &[f64]) -> f64 {
        let (value, _) = stage_objective(stages, &self.model);
        if value.is_finite() {
            value
        } else {
            NON_FINITE_OBJECTIVE
        }
    }
}

impl CostFunction for StageProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, stages: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(self.objective(stages))
    }
}

impl Gradient for StageProblem {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, stages: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        Ok(stages.central_diff(&|x: &Vec<f64>| self.objective(x)))
    }
}

/// Minimises `stage_objective` over real-valued stage counts with BFGS.
///
/// The objective has several local basins, so the minimiser is restarted
/// from a grid of initial guesses and the first acceptable minimum wins.
#[derive(Debug, Clone)]
pub struct QuasiNewton {
    pub initial_guesses: Vec<f64>, // tried for each section, enriching outermost
    pub objective_tolerance: f64,
    pub max_stages: f64,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
    pub cost_tolerance: f64,
}

impl Default for QuasiNewton {
    fn default() -> Self {
        QuasiNewton {
            initial_guesses: vec![1.0, 10.0, 50.0],
            objective_tolerance: 1e-6,
            max_stages: 100.0,
            max_iterations: 500,
            gradient_tolerance: 1e-10,
            cost_tolerance: 1e-15,
        }
    }
}

/// Best point of one BFGS run.
struct Minimum {
    stages: Vec<f64>,
    value: f64,
    iterations: u64,
}

impl QuasiNewton {
    fn acceptable(&self, value: f64, stages: &[f64]) -> bool {
        value < self.objective_tolerance
            && stages.iter().all(|&n| n > 0.0 && n < self.max_stages)
    }

    fn minimize(&self, model: &CascadeModel, x0: Vec<f64>) -> CascadeResult<Minimum> {
        let linesearch = MoreThuenteLineSearch::new();
        let solver = BFGS::new(linesearch)
            .with_tolerance_grad(self.gradient_tolerance)?
            .with_tolerance_cost(self.cost_tolerance)?;
        let inv_hessian = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let problem = StageProblem {
            model: model.clone(),
        };

        let result = Executor::new(problem, solver)
            .configure(|state| {
                state
                    .param(x0)
                    .inv_hessian(inv_hessian)
                    .max_iters(self.max_iterations)
            })
            .run()?;

        let state = result.state();
        let stages = state
            .get_best_param()
            .cloned()
            .ok_or_else(|| CascadeError::Solver("BFGS returned no parameters".to_string()))?;
        Ok(Minimum {
            stages,
            value: state.get_best_cost(),
            iterations: state.get_iter(),
        })
    }
}

impl StageSolver for QuasiNewton {
    fn name(&self) -> &'static str {
        "quasi-Newton"
    }

    fn solve(&self, model: &CascadeModel) -> CascadeResult<StageSolution> {
        let mut best_objective = f64::INFINITY;
        let mut guesses = 0;

        for &n_enriching in &self.initial_guesses {
            for &n_stripping in &self.initial_guesses {
                guesses += 1;
                let min = match self.minimize(model, vec![n_enriching, n_stripping]) {
                    Ok(min) => min,
                    Err(e) => {
                        warn!(n_enriching, n_stripping, error = %e, "stage optimisation aborted");
                        continue;
                    }
                };
                trace!(
                    n_enriching,
                    n_stripping,
                    objective = min.value,
                    iterations = min.iterations,
                    "stage optimisation from initial guess"
                );

                if self.acceptable(min.value, &min.stages) {
                    let (_, concentrations) = stage_objective(&min.stages, model);
                    let stages = StageCounts::new(min.stages[0], min.stages[1]);
                    debug!(
                        n_enriching = stages.enriching,
                        n_stripping = stages.stripping,
                        objective = min.value,
                        "stage optimisation converged"
                    );
                    return Ok(StageSolution {
                        stages,
                        concentrations,
                    });
                }
                warn!(n_enriching, n_stripping, objective = min.value, "initial guess rejected");
                if min.value < best_objective {
                    best_objective = min.value;
                }
            }
        }

        Err(CascadeError::OptimisationFailed {
            guesses,
            best_objective,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::separation::SeparationFactors;

    fn reference_model() -> CascadeModel {
        let total = 0.0055 + 0.711 + 99.289;
        CascadeModel {
            alpha_star: SeparationFactors::new(1.3).alpha_star(),
            feed: [0.0, 0.0, 0.0055 / total, 0.711 / total, 0.0, 99.289 / total],
            target_product_assay: 0.9,
            target_tails_assay: 0.001,
        }
    }

    #[test]
    fn test_integer_search_reference() {
        let solution = IntegerSearch::default().solve(&reference_model()).unwrap();
        assert_eq!(solution.stages.as_whole().unwrap(), (56, 14));
        assert!(solution.concentrations.product_assay() >= 0.9);
        assert!(solution.concentrations.tails_assay() <= 0.001);
    }

    #[test]
    fn test_integer_search_ceiling() {
        let solver = IntegerSearch { max_iterations: 20 };
        let err = solver.solve(&reference_model()).unwrap_err();
        assert!(matches!(
            err,
            CascadeError::StageSearchDiverged {
                section: Section::Enriching,
                iterations: 20
            }
        ));
    }

    #[test]
    fn test_reaching_ceiling_is_fatal() {
        // 56 enriching stages are needed; a ceiling of 56 must not accept them
        let at_ceiling = IntegerSearch { max_iterations: 56 };
        assert!(matches!(
            at_ceiling.solve(&reference_model()),
            Err(CascadeError::StageSearchDiverged {
                section: Section::Enriching,
                iterations: 56
            })
        ));

        let above_ceiling = IntegerSearch { max_iterations: 57 };
        let solution = above_ceiling.solve(&reference_model()).unwrap();
        assert_eq!(solution.stages.as_whole().unwrap(), (56, 14));
    }

    #[test]
    fn test_unreachable_target_diverges() {
        // gamma = 1 gives no separation at all
        let mut model = reference_model();
        model.alpha_star = SeparationFactors::new(1.0).alpha_star();
        assert!(IntegerSearch::default().solve(&model).is_err());
    }

    #[test]
    fn test_quasi_newton_reference() {
        let solution = QuasiNewton::default().solve(&reference_model()).unwrap();
        assert!((solution.stages.enriching - 55.0127).abs() < 1e-3);
        assert!((solution.stages.stripping - 13.9993).abs() < 1e-3);
        assert!((solution.concentrations.product_assay() - 0.9).abs() < 1e-6);
        assert!((solution.concentrations.tails_assay() - 0.001).abs() < 1e-8);
    }

    #[test]
    fn test_quasi_newton_exhausts_guesses() {
        let solver = QuasiNewton {
            max_stages: 5.0,
            ..QuasiNewton::default()
        };
        let err = solver.solve(&reference_model()).unwrap_err();
        assert!(matches!(err, CascadeError::OptimisationFailed { guesses: 9, .. }));
    }

    #[test]
    fn test_quasi_newton_rejects_bad_tolerance() {
        let solver = QuasiNewton {
            gradient_tolerance: -1.0,
            ..QuasiNewton::default()
        };
        assert!(matches!(
            solver.minimize(&reference_model(), vec![1.0, 1.0]),
            Err(CascadeError::Solver(_))
        ));
    }

    #[test]
    fn test_stage_problem_masks_non_finite_objective() {
        let problem = StageProblem {
            model: reference_model(),
        };
        // zero enriching stages divide by zero in the concentration solve
        assert!(!stage_objective(&[0.0, 1.0], &problem.model).0.is_finite());
        assert_eq!(problem.cost(&vec![0.0, 1.0]).unwrap(), NON_FINITE_OBJECTIVE);

        let gradient = problem.gradient(&vec![56.0, 14.0]).unwrap();
        assert!(gradient.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_stage_objective_is_zero_on_target() {
        let model = reference_model();
        let (value, c) = stage_objective(&[56.0, 14.0], &model);
        let expected = ((c.product_assay() - 0.9) / 0.9).powi(2)
            + ((c.tails_assay() - 0.001) / 0.001).powi(2);
        assert_eq!(value, expected);

        let solution = QuasiNewton::default().solve(&model).unwrap();
        let x = [solution.stages.enriching, solution.stages.stripping];
        assert!(stage_objective(&x, &model).0 < 1e-6);
    }

    #[test]
    fn test_as_whole_rejects_fractions() {
        assert_eq!(StageCounts::new(3.0, 4.0).as_whole().unwrap(), (3, 4));
        assert!(matches!(
            StageCounts::new(3.0, 4.5).as_whole(),
            Err(CascadeError::NonIntegerStages {
                section: Section::Stripping,
                ..
            })
        ));
    }

    #[test]
    fn test_stage_numbers() {
        let whole = StageCounts::new(56.0, 14.0).numbers(true).unwrap();
        assert_eq!(whole, (StageNumber::Whole(56), StageNumber::Whole(14)));
        assert_eq!(whole.0.to_string(), "56");

        let real = StageCounts::new(55.5, 14.0).numbers(false).unwrap();
        assert_eq!(real.0, StageNumber::Real(55.5));
        assert_eq!(real.0.as_f64(), 55.5);
        assert!(StageCounts::new(55.5, 14.0).numbers(true).is_err());
    }
}
