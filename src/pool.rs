//! Thread Pool Fan-Out (spec.md §5): partitions one iteration's trial
//! indices into contiguous ranges, one per worker, and evaluates them
//! with [`std::thread::scope`] so workers can borrow the read-only
//! [`TrialMatrix`] and spec data without cloning.

use crate::best_n::SharedBestN;
use crate::config::CalibrationSpec;
use crate::error::Result;
use crate::matrix::TrialMatrix;
use crate::trial::{LoadedTemplates, TrialRunner};

/// Evaluate every trial row `0..n_simulations` against every experiment
/// and return each row's total weighted error, indexed by row.
///
/// With `n_threads <= 1` this runs sequentially on the calling thread
/// (spec.md §5's degenerate case, kept distinct from the scoped-thread
/// path so single-threaded runs pay no synchronization cost).
pub fn evaluate_fitnesses(
    spec: &CalibrationSpec,
    templates: &LoadedTemplates,
    matrix: &TrialMatrix,
    n_threads: usize,
    debug: bool,
) -> Result<Vec<f64>> {
    let n_simulations = matrix.nrows();
    let runner = TrialRunner::new(spec, templates, debug);

    if n_threads <= 1 {
        let mut fitnesses = Vec::with_capacity(n_simulations);
        for s in 0..n_simulations {
            fitnesses.push(evaluate_trial(&runner, spec, matrix, s)?);
        }
        return Ok(fitnesses);
    }

    let ranges = partition(n_simulations, n_threads);
    let parts: Vec<Vec<f64>> = std::thread::scope(|scope| -> Result<Vec<Vec<f64>>> {
        let mut handles = Vec::with_capacity(ranges.len());
        for range in ranges.clone() {
            let runner = &runner;
            let handle = scope.spawn(move || -> Result<Vec<f64>> {
                let mut part = Vec::with_capacity(range.len());
                for s in range {
                    part.push(evaluate_trial(runner, spec, matrix, s)?);
                }
                Ok(part)
            });
            handles.push(handle);
        }
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect()
    })?;

    let mut fitnesses = vec![0.0; n_simulations];
    for (range, part) in ranges.into_iter().zip(parts) {
        for (offset, s) in range.enumerate() {
            fitnesses[s] = part[offset];
        }
    }
    Ok(fitnesses)
}

/// Evaluate a full iteration and fold every row's fitness directly into
/// `best_n`, for the algorithm families that don't need the per-row
/// fitness vector itself (Sweep, Monte Carlo).
pub fn evaluate_iteration(
    spec: &CalibrationSpec,
    templates: &LoadedTemplates,
    matrix: &TrialMatrix,
    best_n: &SharedBestN,
    n_threads: usize,
    debug: bool,
) -> Result<()> {
    let fitnesses = evaluate_fitnesses(spec, templates, matrix, n_threads, debug)?;
    for (s, &total) in fitnesses.iter().enumerate() {
        best_n.offer_row(total, matrix, s);
    }
    Ok(())
}

fn evaluate_trial(
    runner: &TrialRunner,
    spec: &CalibrationSpec,
    matrix: &TrialMatrix,
    s: usize,
) -> Result<f64> {
    let mut total = 0.0;
    for e in 0..spec.experiments.len() {
        total += runner.run(s, e, matrix)?;
    }
    Ok(total)
}

/// Generic fan-out: evaluate `f(i)` for every `i` in `0..n` across
/// `n_threads` workers using the same contiguous partition as
/// [`evaluate_fitnesses`], returned in index order. Used by the genetic
/// kernel (spec.md §4.6.3) to evaluate one generation's population
/// through its `objective` callback without depending on a
/// [`TrialMatrix`].
pub fn parallel_map<T: Send>(n: usize, n_threads: usize, f: impl Fn(usize) -> T + Sync) -> Vec<T> {
    if n_threads <= 1 {
        return (0..n).map(f).collect();
    }

    let ranges = partition(n, n_threads);
    let parts: Vec<Vec<T>> = std::thread::scope(|scope| {
        let f = &f;
        let handles: Vec<_> = ranges
            .clone()
            .into_iter()
            .map(|range| scope.spawn(move || range.map(f).collect::<Vec<T>>()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect()
    });

    let mut slots: Vec<Option<T>> = (0..n).map(|_| None).collect();
    for (range, part) in ranges.into_iter().zip(parts) {
        for (i, value) in range.zip(part) {
            slots[i] = Some(value);
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.expect("every index is covered by exactly one partition range"))
        .collect()
}

/// Split `n` indices into `n_threads` contiguous, near-equal ranges
/// (spec.md §5's explicit partition formula: the first `n % n_threads`
/// workers get one extra index).
fn partition(n: usize, n_threads: usize) -> Vec<std::ops::Range<usize>> {
    let base = n / n_threads;
    let remainder = n % n_threads;
    let mut ranges = Vec::with_capacity(n_threads);
    let mut start = 0;
    for i in 0..n_threads {
        let size = base + if i < remainder { 1 } else { 0 };
        let end = start + size;
        if start < end {
            ranges.push(start..end);
        }
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_every_index_exactly_once() {
        for n in [0usize, 1, 5, 7, 16] {
            for n_threads in 1..=8 {
                let ranges = partition(n, n_threads);
                let mut covered: Vec<usize> = ranges.iter().flat_map(|r| r.clone()).collect();
                covered.sort_unstable();
                let expected: Vec<usize> = (0..n).collect();
                assert_eq!(covered, expected, "n={n} n_threads={n_threads}");
            }
        }
    }

    #[test]
    fn partition_ranges_are_near_equal() {
        let ranges = partition(10, 3);
        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn parallel_map_preserves_index_order() {
        for n_threads in [1, 3, 8] {
            let result = parallel_map(17, n_threads, |i| i * i);
            let expected: Vec<usize> = (0..17).map(|i| i * i).collect();
            assert_eq!(result, expected);
        }
    }
}
