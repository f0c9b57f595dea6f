//! Algorithm Orchestrator (spec.md §4.4): fills the [`TrialMatrix`] for
//! one pass of the configured search algorithm.

use crate::config::{CalibrationSpec, Variable};
use crate::matrix::{new_trial_matrix, TrialMatrix};
use rand::Rng;

/// Build the trial matrix for a Sweep search: the mixed-radix Cartesian
/// product of each variable's `n_sweeps` evenly spaced grid points
/// (spec.md §4.4).
pub fn sweep_matrix(variables: &[Variable]) -> TrialMatrix {
    let radices: Vec<usize> = variables.iter().map(|v| v.n_sweeps.unwrap_or(1).max(1)).collect();
    let n_simulations: usize = radices.iter().product();
    let mut matrix = new_trial_matrix(n_simulations, variables.len());

    for s in 0..n_simulations {
        let mut remainder = s;
        for (j, variable) in variables.iter().enumerate() {
            let radix = radices[j];
            let index = remainder % radix;
            remainder /= radix;
            matrix[[s, j]] = grid_point(variable, index, radix);
        }
    }
    matrix
}

fn grid_point(variable: &Variable, index: usize, radix: usize) -> f64 {
    if radix <= 1 {
        return variable.range_min;
    }
    let span = variable.range_max - variable.range_min;
    variable.range_min + span * (index as f64) / ((radix - 1) as f64)
}

/// Build the trial matrix for a Monte Carlo search: `n_simulations` rows,
/// each variable sampled independently and uniformly from the half-open
/// interval `[range_min, range_max)` (spec.md §4.6.2; the original's
/// `rangemin + gsl_rng_uniform(rng) * (rangemax - rangemin)` never reaches
/// `rangemax`, since `gsl_rng_uniform` draws from `[0, 1)`).
pub fn monte_carlo_matrix(
    variables: &[Variable],
    n_simulations: usize,
    rng: &mut impl Rng,
) -> TrialMatrix {
    let mut matrix = new_trial_matrix(n_simulations, variables.len());
    for s in 0..n_simulations {
        for (j, variable) in variables.iter().enumerate() {
            matrix[[s, j]] = if variable.range_min < variable.range_max {
                rng.gen_range(variable.range_min..variable.range_max)
            } else {
                variable.range_min
            };
        }
    }
    matrix
}

/// Build the matrix for one pass, dispatching on the configured
/// algorithm family. Genetic search has no matrix-based equivalent: it is
/// driven entirely through the [`crate::genetic::GeneticKernel`]
/// objective-callback interface (spec.md §4.6.3, §6) and is not handled
/// here.
pub fn build_initial_matrix(spec: &CalibrationSpec, rng: &mut impl Rng) -> TrialMatrix {
    match &spec.algorithm {
        crate::config::Algorithm::MonteCarlo(opts) => {
            monte_carlo_matrix(&spec.variables, opts.n_simulations, rng)
        }
        crate::config::Algorithm::Sweep(_) => sweep_matrix(&spec.variables),
        crate::config::Algorithm::Genetic(_) => {
            unreachable!("genetic search is driven through GeneticKernel, not build_initial_matrix")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn variable(name: &str, min: f64, max: f64, n_sweeps: usize) -> Variable {
        Variable {
            name: name.to_string(),
            range_min: min,
            range_max: max,
            n_sweeps: Some(n_sweeps),
            ..Variable::default()
        }
    }

    #[test]
    fn sweep_matrix_covers_grid_endpoints() {
        let variables = vec![variable("x", 0.0, 10.0, 3)];
        let matrix = sweep_matrix(&variables);
        assert_eq!(matrix.nrows(), 3);
        assert_eq!(matrix[[0, 0]], 0.0);
        assert_eq!(matrix[[2, 0]], 10.0);
    }

    #[test]
    fn sweep_matrix_is_cartesian_product() {
        let variables = vec![variable("x", 0.0, 1.0, 2), variable("y", 0.0, 1.0, 3)];
        let matrix = sweep_matrix(&variables);
        assert_eq!(matrix.nrows(), 6);
    }

    #[test]
    fn monte_carlo_samples_within_bounds() {
        let variables = vec![variable("x", -1.0, 1.0, 1)];
        let mut rng = StdRng::seed_from_u64(7);
        let matrix = monte_carlo_matrix(&variables, 50, &mut rng);
        for value in matrix.column(0) {
            assert!(*value >= -1.0 && *value < 1.0);
        }
    }

    #[test]
    fn monte_carlo_handles_degenerate_range() {
        let variables = vec![variable("x", 2.0, 2.0, 1)];
        let mut rng = StdRng::seed_from_u64(3);
        let matrix = monte_carlo_matrix(&variables, 4, &mut rng);
        for value in matrix.column(0) {
            assert_eq!(*value, 2.0);
        }
    }
}
