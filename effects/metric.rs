//! Prediction accuracy.

use crate::estimate::EstimationError;
use ndarray::ArrayView1;

/// Root-mean-square error between aligned `actual` and `predicted` values.
///
/// Positions where either value is NaN are treated as missing and left out of
/// the mean. If every position is missing the result is NaN.
pub fn rmse(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Result<f64, EstimationError> {
    if actual.len() != predicted.len() {
        return Err(EstimationError::DimensionMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }

    let (sum_sq, count) = actual
        .iter()
        .zip(predicted.iter())
        .filter(|(a, p)| !a.is_nan() && !p.is_nan())
        .fold((0.0_f64, 0_usize), |(sum, n), (a, p)| {
            let diff = a - p;
            (sum + diff * diff, n + 1)
        });

    if count == 0 {
        log::warn!("RMSE requested over {} positions with no usable pairs.", actual.len());
        return Ok(f64::NAN);
    }
    Ok((sum_sq / count as f64).sqrt())
}
