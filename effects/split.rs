//! Deterministic stratified partitioning of rating records.
//!
//! Records are stratified by rating value so both partitions see the same rating
//! distribution. After sampling, any holdout record whose movie or user never
//! appears on the training side is moved back into training: an effect model can
//! only be judged on keys it had a chance to learn.

use crate::data::{MovieId, RatingRecord, RawRating, UserId};
use ahash::AHashSet;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use thiserror::Error;

/// Rating values are bucketed at this resolution when forming strata.
const STRATUM_RESOLUTION: f64 = 1000.0;

/// The fields the splitter needs from a record.
pub trait Stratified {
    fn stratum_rating(&self) -> f64;
    fn movie_key(&self) -> MovieId;
    fn user_key(&self) -> UserId;
}

impl Stratified for RawRating {
    fn stratum_rating(&self) -> f64 {
        self.rating
    }
    fn movie_key(&self) -> MovieId {
        self.movie_id
    }
    fn user_key(&self) -> UserId {
        self.user_id
    }
}

impl Stratified for RatingRecord {
    fn stratum_rating(&self) -> f64 {
        self.rating
    }
    fn movie_key(&self) -> MovieId {
        self.movie_id
    }
    fn user_key(&self) -> UserId {
        self.user_id
    }
}

/// The two sides of a split.
#[derive(Debug, Clone)]
pub struct Partition<T> {
    pub train: Vec<T>,
    pub holdout: Vec<T>,
    /// Sampled holdout records returned to training because their movie or user
    /// was absent from the training side.
    pub moved_to_train: usize,
}

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("Split fraction must lie strictly between 0 and 1, got {0}.")]
    InvalidFraction(f64),
    #[error("At least 2 records are needed to form two partitions, found {0}.")]
    InsufficientRecords(usize),
    #[error("The {0} partition is empty after sampling and key filtering.")]
    EmptyPartition(&'static str),
}

/// Splits `records` so that roughly `fraction` of each rating stratum lands in
/// the holdout partition.
///
/// The result depends only on the records, their order, `fraction` and `seed`.
/// Both partitions preserve the input order; records moved back into training
/// are appended after the sampled training records.
pub fn stratified_split<T: Stratified + Clone>(
    records: &[T],
    fraction: f64,
    seed: u64,
) -> Result<Partition<T>, SplitError> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(SplitError::InvalidFraction(fraction));
    }
    if records.len() < 2 {
        return Err(SplitError::InsufficientRecords(records.len()));
    }

    let in_holdout = internal::sample_strata(records, fraction, seed);

    let mut train = Vec::with_capacity(records.len());
    let mut sampled = Vec::new();
    for (record, &held) in records.iter().zip(&in_holdout) {
        if held {
            sampled.push(record);
        } else {
            train.push(record.clone());
        }
    }

    let train_movies: AHashSet<MovieId> = train.iter().map(|r| r.movie_key()).collect();
    let train_users: AHashSet<UserId> = train.iter().map(|r| r.user_key()).collect();

    let (holdout, removed): (Vec<&T>, Vec<&T>) = sampled.into_iter().partition(|r| {
        train_movies.contains(&r.movie_key()) && train_users.contains(&r.user_key())
    });
    let moved_to_train = removed.len();
    train.extend(removed.into_iter().cloned());
    let holdout: Vec<T> = holdout.into_iter().cloned().collect();

    if holdout.is_empty() {
        return Err(SplitError::EmptyPartition("holdout"));
    }
    if train.is_empty() {
        return Err(SplitError::EmptyPartition("training"));
    }

    log::debug!(
        "Split {} records into {} training and {} holdout ({} moved back to training).",
        records.len(),
        train.len(),
        holdout.len(),
        moved_to_train
    );

    Ok(Partition {
        train,
        holdout,
        moved_to_train,
    })
}

mod internal {
    use super::*;

    /// Marks which records are sampled into the holdout side.
    pub(super) fn sample_strata<T: Stratified>(records: &[T], fraction: f64, seed: u64) -> Vec<bool> {
        let mut strata: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, record) in records.iter().enumerate() {
            let bucket = (record.stratum_rating() * STRATUM_RESOLUTION).round() as i64;
            strata.entry(bucket).or_default().push(idx);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut in_holdout = vec![false; records.len()];
        for indices in strata.values_mut() {
            indices.shuffle(&mut rng);
            let take = (fraction * indices.len() as f64).round() as usize;
            for &idx in indices.iter().take(take) {
                in_holdout[idx] = true;
            }
        }
        in_holdout
    }
}
