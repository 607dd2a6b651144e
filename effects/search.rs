//! # Regularization Search
//!
//! Rebuilds the full effect chain once per candidate shrinkage value and keeps
//! the value with the lowest evaluation RMSE. Trials share nothing but read-only
//! borrows of the datasets, so they run on the rayon pool; results are collected
//! back into candidate order before the best value is chosen.

use crate::chain::build_chain;
use crate::data::Ratings;
use crate::estimate::{EstimationError, GroupKey, validate_lambda};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::io::IsTerminal;

/// The full-chain score for one shrinkage value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LambdaTrial {
    pub lambda: f64,
    pub rmse: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    pub best_lambda: f64,
    pub best_rmse: f64,
    /// One trial per candidate, in the order the candidates were given.
    pub trials: Vec<LambdaTrial>,
}

fn create_progress_bar(len: u64) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(10)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lambdas ({eta})",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb
}

/// Scores every candidate `lambda` and returns the best one.
///
/// Ties go to the smaller `lambda`; for ascending candidates this is the first
/// occurrence. Trials scoring NaN never win over a finite score.
pub fn search(
    training: &Ratings,
    evaluation: &Ratings,
    baseline: f64,
    chain: &[GroupKey],
    lambda_candidates: &[f64],
) -> Result<SearchOutcome, EstimationError> {
    if lambda_candidates.is_empty() {
        return Err(EstimationError::EmptySearchSpace);
    }
    if chain.is_empty() {
        return Err(EstimationError::EmptyChain);
    }
    for &lambda in lambda_candidates {
        validate_lambda(lambda)?;
    }

    log::info!(
        "Searching {} lambda candidates over a {}-key chain.",
        lambda_candidates.len(),
        chain.len()
    );
    let pb = create_progress_bar(lambda_candidates.len() as u64);

    let trials: Vec<LambdaTrial> = lambda_candidates
        .par_iter()
        .map(|&lambda| {
            let fit = build_chain(training, evaluation, baseline, chain, lambda)?;
            let trial = LambdaTrial {
                lambda,
                rmse: fit.final_rmse(),
            };
            log::debug!("lambda = {:.4}: RMSE {:.6}", trial.lambda, trial.rmse);
            pb.inc(1);
            Ok(trial)
        })
        .collect::<Result<_, EstimationError>>()?;
    pb.finish_and_clear();

    let best = internal::select_best(&trials).ok_or(EstimationError::EmptySearchSpace)?;
    log::info!(
        "Best lambda {:.4} with RMSE {:.6}.",
        best.lambda,
        best.rmse
    );

    Ok(SearchOutcome {
        best_lambda: best.lambda,
        best_rmse: best.rmse,
        trials,
    })
}

mod internal {
    use super::*;

    pub(super) fn select_best(trials: &[LambdaTrial]) -> Option<LambdaTrial> {
        let mut best: Option<LambdaTrial> = None;
        for &trial in trials {
            let better = match best {
                None => true,
                Some(current) if current.rmse.is_nan() => !trial.rmse.is_nan(),
                Some(current) => {
                    trial.rmse < current.rmse
                        || (trial.rmse == current.rmse && trial.lambda < current.lambda)
                }
            };
            if better {
                best = Some(trial);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::CANDIDATE_CHAIN;
    use crate::test_fixtures::{SyntheticRatingsBuilder, record};
    use approx::assert_abs_diff_eq;

    fn trial(lambda: f64, rmse: f64) -> LambdaTrial {
        LambdaTrial { lambda, rmse }
    }

    #[test]
    fn selection_prefers_lower_error_then_smaller_lambda() {
        let trials = [trial(0.0, 1.2), trial(1.0, 0.9), trial(2.0, 0.9), trial(3.0, 1.0)];
        assert_eq!(internal::select_best(&trials), Some(trial(1.0, 0.9)));

        let unsorted = [trial(2.0, 0.9), trial(1.0, 0.9)];
        assert_eq!(internal::select_best(&unsorted), Some(trial(1.0, 0.9)));
    }

    #[test]
    fn nan_trials_never_win() {
        let trials = [trial(0.0, f64::NAN), trial(1.0, 2.0), trial(2.0, f64::NAN)];
        assert_eq!(internal::select_best(&trials), Some(trial(1.0, 2.0)));
        assert_eq!(internal::select_best(&[]), None);
    }

    #[test]
    fn empty_candidates_fail_before_any_work() {
        let data = Ratings::new(vec![record(1, 1, 3.0)]);
        assert_eq!(
            search(&data, &data, 3.0, &CANDIDATE_CHAIN, &[]).unwrap_err(),
            EstimationError::EmptySearchSpace
        );
    }

    #[test]
    fn trials_keep_candidate_order_and_match_sequential_builds() {
        let data = SyntheticRatingsBuilder::new(2_000).seed(31).build();
        let (train, test) = (
            Ratings::new(data.records()[..1_600].to_vec()),
            Ratings::new(data.records()[1_600..].to_vec()),
        );
        let baseline = train.mean_rating().unwrap();
        let candidates = [3.0, 0.0, 1.5, 10.0];

        let outcome = search(&train, &test, baseline, &CANDIDATE_CHAIN, &candidates).unwrap();
        assert_eq!(outcome.trials.len(), candidates.len());
        for (trial, &lambda) in outcome.trials.iter().zip(&candidates) {
            assert_abs_diff_eq!(trial.lambda, lambda, epsilon = 0.0);
            let sequential = build_chain(&train, &test, baseline, &CANDIDATE_CHAIN, lambda)
                .unwrap()
                .final_rmse();
            assert_abs_diff_eq!(trial.rmse, sequential, epsilon = 0.0);
        }

        let minimum = outcome
            .trials
            .iter()
            .map(|t| t.rmse)
            .fold(f64::INFINITY, f64::min);
        assert_abs_diff_eq!(outcome.best_rmse, minimum, epsilon = 0.0);
    }
}
