//! Learner adapters.
//!
//! The cross-validation harness only ever sees two capabilities:
//!
//! - `Learner::fit(training rows, grid value) -> FittedModel`
//! - `FittedModel::predict(rows) -> per-row mean estimates`
//!
//! Concrete adapters live in submodules; `FnLearner` lets callers plug in any
//! closure pair (handy for tests and for wrapping other libraries).

pub mod credibility;
pub mod design;
pub mod glm;

pub use credibility::*;
pub use design::*;
pub use glm::*;

use crate::domain::Observation;

/// A model fitted on one training subset.
pub trait FittedModel: Send + Sync {
    /// Mean-response estimate per row. Frequency adapters return rates per
    /// unit of exposure; the harness rescales them when asked to.
    fn predict(&self, rows: &[&Observation]) -> Result<Vec<f64>, String>;
}

/// Something that can be refitted for each (grid value, split) pair.
pub trait Learner: Sync {
    type Model: FittedModel;

    fn name(&self) -> &str;

    fn fit(&self, train: &[&Observation], param: f64) -> Result<Self::Model, String>;
}

impl<M: FittedModel + ?Sized> FittedModel for Box<M> {
    fn predict(&self, rows: &[&Observation]) -> Result<Vec<f64>, String> {
        (**self).predict(rows)
    }
}

/// Closure-backed learner.
pub struct FnLearner<F> {
    name: String,
    fit: F,
}

impl<F> FnLearner<F> {
    pub fn new(name: impl Into<String>, fit: F) -> Self {
        Self {
            name: name.into(),
            fit,
        }
    }
}

impl<F, M> Learner for FnLearner<F>
where
    F: Fn(&[&Observation], f64) -> Result<M, String> + Sync,
    M: FittedModel,
{
    type Model = M;

    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&self, train: &[&Observation], param: f64) -> Result<M, String> {
        (self.fit)(train, param)
    }
}

/// Closure-backed fitted model.
pub struct FnModel<P>(pub P);

impl<P> FittedModel for FnModel<P>
where
    P: Fn(&[&Observation]) -> Result<Vec<f64>, String> + Send + Sync,
{
    fn predict(&self, rows: &[&Observation]) -> Result<Vec<f64>, String> {
        (self.0)(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fn_learner_forwards_param_to_model() {
        let learner = FnLearner::new("const", |_train: &[&Observation], param: f64| {
            Ok::<_, String>(FnModel(move |rows: &[&Observation]| {
                Ok::<_, String>(vec![param; rows.len()])
            }))
        });
        let row = Observation {
            id: "P1".to_string(),
            response: 1.0,
            exposure: 1.0,
            covariates: vec![],
        };
        let model = learner.fit(&[&row], 0.25).unwrap();
        assert_eq!(model.predict(&[&row, &row]).unwrap(), vec![0.25, 0.25]);
        assert_eq!(learner.name(), "const");
    }
}
