//! # Sequential Model Building
//!
//! Walks a chain of grouping keys, adding one effect per step. Step `i` fits
//! its effect against the residual of steps `1..i` and is scored on the
//! evaluation set using exactly the effects from steps `1..=i`. The accumulated
//! effect list is threaded through explicitly; nothing outside this call holds
//! it until the finished model is returned.

use crate::data::Ratings;
use crate::estimate::{EffectTable, EstimationError, GroupKey, estimate_effect, validate_lambda};
use crate::metric::rmse;
use crate::predict::predict;
use itertools::Itertools;
use ndarray::Array1;

/// A baseline plus an ordered list of effects.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectModel {
    pub baseline: f64,
    pub lambda: f64,
    pub effects: Vec<EffectTable>,
}

impl EffectModel {
    pub fn keys(&self) -> Vec<GroupKey> {
        self.effects.iter().map(EffectTable::key).collect()
    }

    pub fn predict(&self, evaluation: &Ratings) -> Array1<f64> {
        predict(evaluation, self.baseline, &self.effects)
    }

    /// RMSE of this model's predictions against the evaluation ratings.
    pub fn evaluate(&self, evaluation: &Ratings) -> Result<f64, EstimationError> {
        rmse(evaluation.ratings().view(), self.predict(evaluation).view())
    }

    pub fn label(&self) -> String {
        model_label(&self.keys(), self.lambda)
    }
}

/// The score of one prefix of the chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainStep {
    pub label: String,
    pub key: GroupKey,
    pub rmse: f64,
}

/// Every prefix score of a chain build, plus the full-chain model.
#[derive(Clone, Debug)]
pub struct ChainFit {
    pub steps: Vec<ChainStep>,
    pub model: EffectModel,
}

impl ChainFit {
    /// The score of the full chain.
    pub fn final_rmse(&self) -> f64 {
        self.steps.last().map_or(f64::NAN, |step| step.rmse)
    }

    /// `(label, rmse)` pairs in chain order.
    pub fn entries(&self) -> Vec<(String, f64)> {
        self.steps
            .iter()
            .map(|step| (step.label.clone(), step.rmse))
            .collect()
    }
}

/// Human-readable name for a model built from `keys` with shrinkage `lambda`,
/// e.g. `Movie + User effects` or `Regularized Movie effect`.
pub fn model_label(keys: &[GroupKey], lambda: f64) -> String {
    let names = keys.iter().map(|key| key.describe()).join(" + ");
    let noun = if keys.len() == 1 { "effect" } else { "effects" };
    if lambda > 0.0 {
        format!("Regularized {names} {noun}")
    } else {
        format!("{names} {noun}")
    }
}

/// Builds the chain one key at a time, scoring every prefix on `evaluation`.
///
/// All inputs are validated before any estimation runs; on error no partial
/// chain is returned.
pub fn build_chain(
    training: &Ratings,
    evaluation: &Ratings,
    baseline: f64,
    chain: &[GroupKey],
    lambda: f64,
) -> Result<ChainFit, EstimationError> {
    if chain.is_empty() {
        return Err(EstimationError::EmptyChain);
    }
    validate_lambda(lambda)?;

    let actual = evaluation.ratings();
    let mut effects: Vec<EffectTable> = Vec::with_capacity(chain.len());
    let mut steps = Vec::with_capacity(chain.len());

    for (idx, &key) in chain.iter().enumerate() {
        let table = estimate_effect(training, baseline, &effects, key, lambda)?;
        effects.push(table);

        let predicted = predict(evaluation, baseline, &effects);
        let score = rmse(actual.view(), predicted.view())?;
        let label = model_label(&chain[..=idx], lambda);
        log::debug!("{label}: RMSE {score:.5}");

        steps.push(ChainStep {
            label,
            key,
            rmse: score,
        });
    }

    Ok(ChainFit {
        steps,
        model: EffectModel {
            baseline,
            lambda,
            effects,
        },
    })
}
