//! Cross-validation harness: fold assignment, rotation, grid evaluation, selection.

pub mod evaluator;
pub mod folds;
pub mod grid;
pub mod rotator;
pub mod selection;

pub use evaluator::{adjust_for_exposure, evaluate_grid, score_split, EvalOptions, GridPoint, ScoreMatrix};
pub use folds::{assign_folds, FoldAssignment};
pub use grid::{log_space, parse_grid};
pub use rotator::{enumerate_splits, FoldRotator, Splits};
pub use selection::{select, select_minimum, select_one_se, Selection};
