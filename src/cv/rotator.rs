//! Leave-one-fold-out rotation (optionally nested inside a withheld test fold).

use std::collections::BTreeSet;

use crate::domain::FoldSplit;
use crate::error::CvError;

/// Enumerates the (test, validation, training) splits for a set of folds.
///
/// The rotator holds no iteration state: `splits()` can be called any number of
/// times and always yields the same sequence.
#[derive(Debug, Clone)]
pub struct FoldRotator {
    folds: Vec<usize>,
    test: Option<usize>,
}

impl FoldRotator {
    pub fn new(
        fold_ids: impl IntoIterator<Item = usize>,
        hold_out_test: Option<usize>,
    ) -> Result<Self, CvError> {
        let folds: Vec<usize> = fold_ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if let Some(t) = hold_out_test {
            if !folds.contains(&t) {
                return Err(CvError::UnknownFold(t));
            }
        }

        let usable = folds.len() - usize::from(hold_out_test.is_some());
        if usable < 2 {
            return Err(CvError::InvalidFoldCount {
                k: folds.len(),
                n: folds.len(),
            });
        }

        Ok(Self {
            folds,
            test: hold_out_test,
        })
    }

    pub fn test_fold(&self) -> Option<usize> {
        self.test
    }

    /// Number of splits (`k - 1` with a test fold, else `k`).
    pub fn len(&self) -> usize {
        self.folds.len() - usize::from(self.test.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All non-test folds.
    pub fn non_test_folds(&self) -> Vec<usize> {
        self.folds
            .iter()
            .copied()
            .filter(|f| Some(*f) != self.test)
            .collect()
    }

    pub fn splits(&self) -> Splits<'_> {
        Splits {
            rotator: self,
            next: 0,
        }
    }
}

/// Iterator over the splits of a `FoldRotator`.
#[derive(Debug, Clone)]
pub struct Splits<'a> {
    rotator: &'a FoldRotator,
    next: usize,
}

impl Iterator for Splits<'_> {
    type Item = FoldSplit;

    fn next(&mut self) -> Option<FoldSplit> {
        let folds = &self.rotator.folds;
        let test = self.rotator.test;
        while self.next < folds.len() {
            let validation = folds[self.next];
            self.next += 1;
            if Some(validation) == test {
                continue;
            }
            let training = folds
                .iter()
                .copied()
                .filter(|&f| f != validation && Some(f) != test)
                .collect();
            return Some(FoldSplit {
                test,
                validation,
                training,
            });
        }
        None
    }
}

/// Convenience wrapper returning the splits for `fold_ids` as a vector.
pub fn enumerate_splits(
    fold_ids: impl IntoIterator<Item = usize>,
    hold_out_test: Option<usize>,
) -> Result<Vec<FoldSplit>, CvError> {
    Ok(FoldRotator::new(fold_ids, hold_out_test)?.splits().collect())
}
