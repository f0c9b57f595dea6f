//! `TrialMatrix` (spec.md §3): the row-major grid of parameter values the
//! orchestrator fills once per refinement iteration and workers read from.

use ndarray::Array2;

pub type TrialMatrix = Array2<f64>;

/// Allocate an uninitialized-by-convention (zero-filled) trial matrix of
/// shape `(n_simulations, n_variables)`.
pub fn new_trial_matrix(n_simulations: usize, n_variables: usize) -> TrialMatrix {
    Array2::zeros((n_simulations, n_variables))
}
