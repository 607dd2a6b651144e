//! Composition of a baseline and effect tables into predictions.

use crate::data::Ratings;
use crate::estimate::EffectTable;
use ndarray::Array1;
use rayon::prelude::*;

/// Predicts every evaluation record as `baseline + sum of matched effects`.
///
/// Output order follows `evaluation`. A record whose group value is missing
/// from a table (a movie never rated in training, say) gets zero from that
/// table, so the prediction falls back toward the baseline instead of failing.
pub fn predict(evaluation: &Ratings, baseline: f64, effects: &[EffectTable]) -> Array1<f64> {
    let predictions: Vec<f64> = evaluation
        .records()
        .par_iter()
        .map(|record| {
            baseline
                + effects
                    .iter()
                    .map(|table| table.contribution(record).unwrap_or(0.0))
                    .sum::<f64>()
        })
        .collect();
    Array1::from_vec(predictions)
}
