//! # Study Pipeline
//!
//! Runs the whole analysis on one ratings file: split off a holdout, prepare
//! both partitions, compare the unregularized effect chain step by step, search
//! for the shrinkage value, and evaluate the refitted model once on the holdout.
//!
//! The holdout partition is touched exactly twice: when it is prepared and
//! when the final model is scored. Nothing learned from it feeds back into
//! model selection.

use crate::chain::{EffectModel, build_chain, model_label};
use crate::config::{ConfigError, StudyConfig};
use crate::data::{DataError, Ratings, RawRating, load_raw_ratings};
use crate::estimate::EstimationError;
use crate::explore::{DatasetSummary, summarize};
use crate::metric::rmse;
use crate::prepare::prepare_ratings;
use crate::report::{ReportError, ResultsTable, write_lambda_curve};
use crate::search::{SearchOutcome, search};
use crate::split::{SplitError, stratified_split};
use ndarray::Array1;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const AVERAGE_LABEL: &str = "Just the average";
pub const RESULTS_FILE: &str = "results.tsv";
pub const LAMBDA_CURVE_FILE: &str = "lambda_curve.tsv";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data loading failed: {0}")]
    Data(#[from] DataError),
    #[error("Data split failed: {0}")]
    Split(#[from] SplitError),
    #[error("Model estimation failed: {0}")]
    Estimation(#[from] EstimationError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to write results: {0}")]
    Report(#[from] ReportError),
    #[error("The {0} partition has no ratings.")]
    EmptyPartition(&'static str),
}

/// Everything a study run produces.
#[derive(Debug)]
pub struct StudyReport {
    /// Summary of the full prepared dataset, holdout included.
    pub summary: DatasetSummary,
    /// Ordered model comparison, ending with the holdout score.
    pub results: ResultsTable,
    pub search: SearchOutcome,
    /// Full-chain model refitted on all model-building ratings.
    pub final_model: EffectModel,
    pub final_rmse: f64,
}

impl StudyReport {
    /// Writes `results.tsv` and `lambda_curve.tsv` into `output_dir`,
    /// creating the directory if needed.
    pub fn write(&self, output_dir: &Path) -> Result<(), ReportError> {
        fs::create_dir_all(output_dir)?;
        self.results.write_tsv(&output_dir.join(RESULTS_FILE))?;
        write_lambda_curve(&output_dir.join(LAMBDA_CURVE_FILE), &self.search.trials)?;
        log::info!("Results written to '{}'.", output_dir.display());
        Ok(())
    }
}

/// Loads the ratings file at `path` and runs the study on it.
pub fn run_study_from_path(path: &Path, config: &StudyConfig) -> Result<StudyReport, PipelineError> {
    let raw = load_raw_ratings(path)?;
    run_study(&raw, config)
}

/// Runs the study on rows already in memory.
pub fn run_study(raw: &[RawRating], config: &StudyConfig) -> Result<StudyReport, PipelineError> {
    // Validate the search grid and chain before any work is done.
    let lambda_candidates = config.search.candidates()?;
    let chain = config.chain.as_slice();
    if chain.is_empty() {
        return Err(EstimationError::EmptyChain.into());
    }

    let dates = &config.dates;
    if !dates.is_consistent() {
        log::warn!(
            "Review dates are rounded by {} for model building but by {} for the holdout. \
             Review-delay groups may not line up between the two partitions.",
            dates.evaluation_granularity,
            dates.holdout_granularity
        );
    }

    let outer = stratified_split(raw, config.split.holdout_fraction, config.split.seed)?;
    let model_building = prepare_ratings(&outer.train, dates.evaluation_granularity);
    let holdout = prepare_ratings(&outer.holdout, dates.holdout_granularity);
    log::info!(
        "Holdout: {} ratings set aside, {} kept for model building.",
        holdout.len(),
        model_building.len()
    );

    let summary = summarize(&model_building.concat(&holdout));
    summary.log();

    let inner = stratified_split(
        model_building.records(),
        config.split.test_fraction,
        config.split.seed.wrapping_add(1),
    )?;
    let training = Ratings::new(inner.train);
    let test = Ratings::new(inner.holdout);
    log::info!(
        "Model selection on {} training and {} test ratings.",
        training.len(),
        test.len()
    );

    let mut results = ResultsTable::new();

    let baseline = training
        .mean_rating()
        .ok_or(PipelineError::EmptyPartition("training"))?;
    let average_rmse = rmse(
        test.ratings().view(),
        Array1::from_elem(test.len(), baseline).view(),
    )?;
    log::info!("{AVERAGE_LABEL} ({baseline:.4}): RMSE {average_rmse:.5}");
    results.push(AVERAGE_LABEL, average_rmse);

    let unregularized = build_chain(&training, &test, baseline, chain, 0.0)?;
    for step in &unregularized.steps {
        log::info!("{}: RMSE {:.5}", step.label, step.rmse);
    }
    results.extend(unregularized.entries());

    let outcome = search(&training, &test, baseline, chain, &lambda_candidates)?;
    let best_lambda = outcome.best_lambda;
    results.push(
        format!(
            "{} (lambda = {best_lambda})",
            model_label(chain, best_lambda)
        ),
        outcome.best_rmse,
    );

    let final_baseline = model_building
        .mean_rating()
        .ok_or(PipelineError::EmptyPartition("model-building"))?;
    let refit = build_chain(
        &model_building,
        &holdout,
        final_baseline,
        chain,
        best_lambda,
    )?;
    let final_rmse = refit.final_rmse();
    log::info!("Holdout RMSE with lambda = {best_lambda}: {final_rmse:.5}");
    results.push(format!("Holdout: {}", refit.model.label()), final_rmse);

    Ok(StudyReport {
        summary,
        results,
        search: outcome,
        final_model: refit.model,
        final_rmse,
    })
}
