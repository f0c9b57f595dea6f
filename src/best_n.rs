//! Best-N Register (spec.md §4.3): a bounded, sorted collection of the N
//! lowest-error trials seen so far, updatable from multiple worker
//! threads.

use crate::matrix::TrialMatrix;
use ndarray::Array1;
use std::sync::Mutex;

/// One retained candidate: its total weighted error and its parameter
/// values, in variable order.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub error: f64,
    pub values: Array1<f64>,
}

/// Keeps the `n_best` lowest-`error` candidates seen, sorted ascending by
/// error (spec.md §4.3's "sorted insert, evict the worst" algorithm).
#[derive(Debug)]
pub struct BestNRegister {
    capacity: usize,
    entries: Vec<Candidate>,
}

impl BestNRegister {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "best-N register capacity must be >= 1");
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Offer one candidate. Inserted in sorted position if it beats the
    /// current worst entry or the register isn't yet full; the worst
    /// entry is evicted if the register was already at capacity.
    pub fn offer(&mut self, error: f64, values: Array1<f64>) {
        if self.entries.len() >= self.capacity {
            if let Some(worst) = self.entries.last() {
                if error >= worst.error {
                    return;
                }
            }
        }
        let pos = self
            .entries
            .partition_point(|candidate| candidate.error <= error);
        self.entries.insert(pos, Candidate { error, values });
        if self.entries.len() > self.capacity {
            self.entries.truncate(self.capacity);
        }
    }

    /// Offer a trial row directly from a [`TrialMatrix`], cloning out the
    /// row so the register owns its data independent of the matrix's
    /// lifetime (spec.md §9: registers outlive the matrix across
    /// refinement iterations).
    pub fn offer_row(&mut self, error: f64, matrix: &TrialMatrix, row: usize) {
        self.offer(error, matrix.row(row).to_owned());
    }

    /// Merge another register's entries into this one, preserving the
    /// sorted-and-bounded invariant (spec.md §4.3's multi-worker merge
    /// step, also used by the distributed Task Merger in §4.5/§9).
    pub fn merge(&mut self, other: &BestNRegister) {
        for candidate in &other.entries {
            self.offer(candidate.error, candidate.values.clone());
        }
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[Candidate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The worst error currently retained, used by the refiner's
    /// convergence check (spec.md §4.7).
    pub fn worst_error(&self) -> Option<f64> {
        self.entries.last().map(|c| c.error)
    }
}

/// A [`BestNRegister`] shared across worker threads within one
/// refinement iteration (spec.md §5: workers share mutable state only
/// through this register, guarded by a single mutex).
pub struct SharedBestN {
    inner: Mutex<BestNRegister>,
}

impl SharedBestN {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BestNRegister::new(capacity)),
        }
    }

    pub fn offer_row(&self, error: f64, matrix: &TrialMatrix, row: usize) {
        self.inner
            .lock()
            .expect("best-N register mutex poisoned")
            .offer_row(error, matrix, row);
    }

    pub fn into_inner(self) -> BestNRegister {
        self.inner.into_inner().expect("best-N register mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn keeps_only_n_lowest() {
        let mut reg = BestNRegister::new(2);
        reg.offer(5.0, arr1(&[1.0]));
        reg.offer(1.0, arr1(&[2.0]));
        reg.offer(3.0, arr1(&[3.0]));
        assert_eq!(reg.len(), 2);
        let errors: Vec<f64> = reg.entries().iter().map(|c| c.error).collect();
        assert_eq!(errors, vec![1.0, 3.0]);
    }

    #[test]
    fn rejects_worse_than_worst_when_full() {
        let mut reg = BestNRegister::new(1);
        reg.offer(1.0, arr1(&[1.0]));
        reg.offer(2.0, arr1(&[2.0]));
        assert_eq!(reg.best().unwrap().error, 1.0);
    }

    #[test]
    fn merge_preserves_bound_and_order() {
        let mut a = BestNRegister::new(2);
        a.offer(1.0, arr1(&[1.0]));
        a.offer(4.0, arr1(&[4.0]));
        let mut b = BestNRegister::new(2);
        b.offer(2.0, arr1(&[2.0]));
        b.offer(3.0, arr1(&[3.0]));
        a.merge(&b);
        let errors: Vec<f64> = a.entries().iter().map(|c| c.error).collect();
        assert_eq!(errors, vec![1.0, 2.0]);
    }
}
