//! Iterative Refiner (spec.md §4.7): between iterations of the Sweep and
//! Monte Carlo algorithm families, contracts each variable's search
//! range around the running Best-N frontier.

use crate::best_n::Candidate;
use crate::config::Variable;

/// Contract every variable's `[range_min, range_max]` to the span covered
/// by `old_best`'s parameter vectors, expanded by a half-width fraction
/// `tolerance` of that span, clamped to the variable's absolute bounds
/// (spec.md §4.7: `lo_i = min_k old_best_values[k,i]`, `hi_i = max_k
/// old_best_values[k,i]`, `d = 0.5 * tolerance * (hi_i - lo_i)`).
///
/// Does nothing for the genetic algorithm family: spec.md §4.7 excludes
/// it from refinement, since its own selection/mutation/crossover
/// operators already perform the analogous narrowing.
pub fn contract_ranges(variables: &mut [Variable], old_best: &[Candidate], tolerance: f64) {
    assert!(!old_best.is_empty(), "refinement requires a non-empty Best-N frontier");

    for (j, variable) in variables.iter_mut().enumerate() {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for candidate in old_best {
            let value = candidate.values[j];
            lo = lo.min(value);
            hi = hi.max(value);
        }

        let half_width = 0.5 * tolerance * (hi - lo);
        let mut new_min = lo - half_width;
        let mut new_max = hi + half_width;
        if new_min < variable.abs_min {
            new_min = variable.abs_min;
        }
        if new_max > variable.abs_max {
            new_max = variable.abs_max;
        }
        if new_min > new_max {
            std::mem::swap(&mut new_min, &mut new_max);
        }

        variable.range_min = new_min;
        variable.range_max = new_max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn variable(min: f64, max: f64) -> Variable {
        Variable {
            range_min: min,
            range_max: max,
            ..Variable::default()
        }
    }

    fn candidate(error: f64, value: f64) -> Candidate {
        Candidate {
            error,
            values: arr1(&[value]),
        }
    }

    #[test]
    fn contracts_around_frontier_span() {
        let mut variables = vec![variable(0.0, 10.0)];
        let old_best = vec![candidate(0.1, 4.0), candidate(0.2, 6.0)];
        // lo=4, hi=6, d = 0.5*0.5*(6-4) = 0.5
        contract_ranges(&mut variables, &old_best, 0.5);
        assert_eq!(variables[0].range_min, 3.5);
        assert_eq!(variables[0].range_max, 6.5);
    }

    #[test]
    fn single_candidate_collapses_to_a_point_before_expansion() {
        let mut variables = vec![variable(0.0, 10.0)];
        let old_best = vec![candidate(0.1, 5.0)];
        // lo == hi == 5.0, so d = 0 regardless of tolerance
        contract_ranges(&mut variables, &old_best, 0.9);
        assert_eq!(variables[0].range_min, 5.0);
        assert_eq!(variables[0].range_max, 5.0);
    }

    #[test]
    fn clamps_to_absolute_bounds() {
        let mut variables = vec![Variable {
            abs_min: 0.0,
            abs_max: 10.0,
            ..variable(0.0, 10.0)
        }];
        let old_best = vec![candidate(0.0, 9.8), candidate(0.0, 9.9)];
        contract_ranges(&mut variables, &old_best, 4.0);
        assert_eq!(variables[0].range_max, 10.0);
        assert!(variables[0].range_min >= 0.0);
    }
}
