// effects/estimate.rs

//! # Additive Effect Estimation
//!
//! An effect model predicts a rating as a global baseline plus one bias term per
//! grouping attribute:
//!
//! ```text
//! prediction = baseline + b_movie[m] + b_user[u] + b_genres[g] + ...
//! ```
//!
//! Effects are estimated one attribute at a time. The effect for attribute `k`
//! is fitted to the residual left after subtracting the baseline and every
//! effect estimated before it, so the order of the chain decides what each term
//! explains. With a shrinkage parameter `lambda` the per-group estimate is
//!
//! ```text
//! b_k[v] = sum(residuals in group v) / (count(group v) + lambda)
//! ```
//!
//! which is the plain group mean at `lambda = 0` and pulls sparsely observed
//! groups toward zero as `lambda` grows.

use crate::data::{RatingRecord, Ratings};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type for metric evaluation and the effect-model fitting procedures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error(
        "Actual and predicted sequences must have the same length, got {actual} and {predicted}."
    )]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("The regularization search needs at least one lambda candidate.")]
    EmptySearchSpace,

    #[error("Shrinkage parameter must be finite and non-negative, got {0}.")]
    InvalidShrinkage(f64),

    #[error("An effect chain needs at least one grouping key.")]
    EmptyChain,
}

/// The attributes a rating can be grouped by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Movie,
    User,
    Genres,
    ReleaseYear,
    ReviewDelay,
}

/// The chain used throughout the study. Later keys are fitted against the
/// residual of earlier ones.
pub const CANDIDATE_CHAIN: [GroupKey; 5] = [
    GroupKey::Movie,
    GroupKey::User,
    GroupKey::Genres,
    GroupKey::ReleaseYear,
    GroupKey::ReviewDelay,
];

impl GroupKey {
    /// Extracts this attribute from a record. Missing years and delays map to
    /// `GroupValue::Unknown`.
    pub fn value_of(self, record: &RatingRecord) -> GroupValue {
        match self {
            Self::Movie => GroupValue::Id(record.movie_id),
            Self::User => GroupValue::Id(record.user_id),
            Self::Genres => GroupValue::Label(record.genres.clone()),
            Self::ReleaseYear => record
                .release_year
                .map_or(GroupValue::Unknown, GroupValue::Year),
            Self::ReviewDelay => record
                .review_delay
                .map_or(GroupValue::Unknown, GroupValue::Year),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::User => "User",
            Self::Genres => "Genres",
            Self::ReleaseYear => "Release year",
            Self::ReviewDelay => "Review delay",
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The value of one grouping attribute for one record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupValue {
    Id(u32),
    Label(Arc<str>),
    /// A year, or a count of years.
    Year(i32),
    Unknown,
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Label(label) => f.write_str(label),
            Self::Year(year) => write!(f, "{year}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Per-group effects for one attribute, produced by a single `estimate_effect`
/// call and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectTable {
    key: GroupKey,
    lambda: f64,
    effects: AHashMap<GroupValue, f64>,
}

impl EffectTable {
    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// The shrinkage this table was estimated with.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// The effect for one group value, if that value was seen in training.
    pub fn lookup(&self, value: &GroupValue) -> Option<f64> {
        self.effects.get(value).copied()
    }

    /// The effect this table contributes to one record, if its group is known.
    pub fn contribution(&self, record: &RatingRecord) -> Option<f64> {
        self.lookup(&self.key.value_of(record))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupValue, f64)> {
        self.effects.iter().map(|(value, &effect)| (value, effect))
    }
}

/// Estimates one additive effect table.
///
/// Each training record's residual is its rating minus the baseline minus the
/// contribution of every prior table; a prior table with no entry for the record
/// contributes zero. Residuals are grouped by `group_key` and each group's effect
/// is `sum / (count + lambda)`.
pub fn estimate_effect(
    training: &Ratings,
    baseline: f64,
    prior_effects: &[EffectTable],
    group_key: GroupKey,
    lambda: f64,
) -> Result<EffectTable, EstimationError> {
    validate_lambda(lambda)?;

    let mut groups: AHashMap<GroupValue, (f64, usize)> = AHashMap::new();
    for record in training.records() {
        let residual = internal::residual(record, baseline, prior_effects);
        let entry = groups.entry(group_key.value_of(record)).or_insert((0.0, 0));
        entry.0 += residual;
        entry.1 += 1;
    }

    let effects = groups
        .into_iter()
        .map(|(value, (sum, count))| (value, sum / (count as f64 + lambda)))
        .collect();

    let table = EffectTable {
        key: group_key,
        lambda,
        effects,
    };
    log::debug!(
        "Estimated {} effect over {} groups (lambda = {}).",
        group_key,
        table.len(),
        lambda
    );
    Ok(table)
}

pub(crate) fn validate_lambda(lambda: f64) -> Result<(), EstimationError> {
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(EstimationError::InvalidShrinkage(lambda));
    }
    Ok(())
}

mod internal {
    use super::*;

    /// Rating minus everything already explained by the baseline and prior effects.
    pub(super) fn residual(record: &RatingRecord, baseline: f64, prior_effects: &[EffectTable]) -> f64 {
        let explained: f64 = prior_effects
            .iter()
            .map(|table| table.contribution(record).unwrap_or(0.0))
            .sum();
        record.rating - baseline - explained
    }
}
