//! Stratified fold assignment.
//!
//! Observations are stably sorted by a composite key (typically the response,
//! then exposure) and dealt round-robin into `k` folds, so each fold sees a
//! similar spread of response magnitudes. No randomness is involved: the same
//! input order and `k` always give the same labels.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::{Dataset, SortKey};
use crate::error::CvError;

/// Fold label (in `1..=k`) for every observation, by original row index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldAssignment {
    k: usize,
    labels: Vec<usize>,
}

impl FoldAssignment {
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn fold_of(&self, index: usize) -> Option<usize> {
        self.labels.get(index).copied()
    }

    /// Fold ids `1..=k`.
    pub fn fold_ids(&self) -> Vec<usize> {
        (1..=self.k).collect()
    }

    /// Row indices whose label is in `folds`, in original row order.
    pub fn indices_in(&self, folds: &[usize]) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| folds.contains(label))
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of observations per fold, indexed by `fold - 1`.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k];
        for &label in &self.labels {
            sizes[label - 1] += 1;
        }
        sizes
    }
}

/// Assign each observation of `data` to one of `k` folds.
pub fn assign_folds(data: &Dataset, k: usize, sort_keys: &[SortKey]) -> Result<FoldAssignment, CvError> {
    let n = data.len();
    if k == 0 || k > n {
        return Err(CvError::InvalidFoldCount { k, n });
    }

    let rows = data.observations();
    let mut order: Vec<usize> = (0..n).collect();
    // `sort_by` is stable, so ties keep their input order.
    order.sort_by(|&a, &b| {
        sort_keys
            .iter()
            .map(|key| key.compare(&rows[a], &rows[b]))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let mut labels = vec![0usize; n];
    for (rank, &row) in order.iter().enumerate() {
        labels[row] = (rank % k) + 1;
    }

    tracing::debug!(k, n, "assigned folds");
    Ok(FoldAssignment { k, labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnKind, ColumnSpec, Covariate, Observation};

    fn dataset(responses: &[f64]) -> Dataset {
        let rows = responses
            .iter()
            .enumerate()
            .map(|(i, &y)| Observation {
                id: format!("P{i}"),
                response: y,
                exposure: 0.5 + (i % 3) as f64 * 0.25,
                covariates: vec![Covariate::Continuous(i as f64)],
            })
            .collect();
        let columns = vec![ColumnSpec {
            name: "age".to_string(),
            kind: ColumnKind::Continuous,
        }];
        Dataset::new(columns, rows).unwrap()
    }

    #[test]
    fn round_robin_over_sorted_order() {
        let data = dataset(&[5.0, 0.0, 3.0, 1.0, 4.0, 2.0]);
        let folds = assign_folds(&data, 3, &[SortKey::Response]).unwrap();
        // Sorted rows: 1(0) 3(1) 5(2) 2(3) 4(4) 0(5) -> folds 1 2 3 1 2 3
        assert_eq!(folds.labels(), &[3, 1, 1, 2, 2, 3]);
    }

    #[test]
    fn every_fold_is_used_and_sizes_differ_by_at_most_one() {
        let responses: Vec<f64> = (0..23).map(|i| ((i * 7) % 5) as f64).collect();
        let data = dataset(&responses);
        for k in 1..=10 {
            let folds = assign_folds(&data, k, &[SortKey::Response, SortKey::Exposure]).unwrap();
            let sizes = folds.sizes();
            assert_eq!(sizes.len(), k);
            assert!(sizes.iter().all(|&s| s > 0));
            let max = *sizes.iter().max().unwrap();
            let min = *sizes.iter().min().unwrap();
            assert!(max - min <= 1, "k={k} sizes={sizes:?}");
            assert_eq!(sizes.iter().sum::<usize>(), data.len());
            assert!(folds.labels().iter().all(|&l| (1..=k).contains(&l)));
        }
    }

    #[test]
    fn assignment_is_deterministic() {
        let data = dataset(&[2.0, 2.0, 1.0, 0.0, 0.0, 3.0, 1.0]);
        let a = assign_folds(&data, 3, &[SortKey::Response]).unwrap();
        let b = assign_folds(&data, 3, &[SortKey::Response]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ties_keep_input_order() {
        let data = dataset(&[1.0, 1.0, 1.0, 1.0]);
        let folds = assign_folds(&data, 2, &[SortKey::Response]).unwrap();
        assert_eq!(folds.labels(), &[1, 2, 1, 2]);
    }

    #[test]
    fn invalid_fold_counts_are_rejected() {
        let data = dataset(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            assign_folds(&data, 0, &[SortKey::Response]),
            Err(CvError::InvalidFoldCount { k: 0, n: 3 })
        ));
        assert!(matches!(
            assign_folds(&data, 4, &[SortKey::Response]),
            Err(CvError::InvalidFoldCount { k: 4, n: 3 })
        ));
    }

    #[test]
    fn indices_in_selects_rows_by_fold() {
        let data = dataset(&[5.0, 0.0, 3.0, 1.0, 4.0, 2.0]);
        let folds = assign_folds(&data, 3, &[SortKey::Response]).unwrap();
        assert_eq!(folds.indices_in(&[1]), vec![1, 2]);
        assert_eq!(folds.indices_in(&[2, 3]), vec![0, 3, 4, 5]);
    }
}
