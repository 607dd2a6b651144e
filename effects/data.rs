//! # Data Loading and Validation Module
//!
//! This module is the entry point for the rating dataset. It reads a
//! tab-separated ratings file, validates it against a fixed schema, and turns
//! each row into a `RawRating`. Feature derivation (release year, review delay)
//! lives in `prepare`; this module only checks that the raw columns are usable.
//!
//! - Strict Schema: column names are not configurable. The loader expects
//!   `userId`, `movieId`, `rating`, `timestamp`, `title` and `genres`, which is
//!   the layout of the MovieLens ratings export joined with its movie table.
//! - User-Centric Errors: failures are assumed to be user-input errors, and the
//!   `DataError` enum says which column is at fault.
//! - Shared Labels: genre-combination labels repeat millions of times, so they are
//!   interned into `Arc<str>` once and cloned by reference count afterwards.

use ahash::AHashMap;
use ndarray::Array1;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Alias for movie identifiers.
pub type MovieId = u32;
/// Alias for user identifiers.
pub type UserId = u32;

/// One row of the ratings file before any feature derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub rating: f64,
    /// Seconds since the Unix epoch at which the rating was given.
    pub timestamp: i64,
    pub title: Arc<str>,
    pub genres: Arc<str>,
}

/// A cleaned observation used for model fitting and evaluation.
///
/// `release_year` and `review_delay` are `None` when the title carries no
/// parseable year. Such records are kept and grouped under an explicit
/// unknown value by the effect estimator.
#[derive(Clone, Debug, PartialEq)]
pub struct RatingRecord {
    pub rating: f64,
    pub movie_id: MovieId,
    pub user_id: UserId,
    /// The pipe-separated genre combination, e.g. `Comedy|Romance`.
    pub genres: Arc<str>,
    pub release_year: Option<i32>,
    /// Years between release and review.
    pub review_delay: Option<i32>,
}

/// An immutable, ordered collection of rating records.
///
/// Training, evaluation and holdout partitions are all `Ratings`; every model
/// component borrows them read-only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ratings {
    records: Vec<RatingRecord>,
}

impl Ratings {
    pub fn new(records: Vec<RatingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The rating column, in record order.
    pub fn ratings(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.rating).collect()
    }

    /// Arithmetic mean of the ratings, or `None` for an empty set.
    pub fn mean_rating(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let total: f64 = self.records.iter().map(|r| r.rating).sum();
        Some(total / self.records.len() as f64)
    }

    /// Concatenates two partitions, `self` first.
    pub fn concat(&self, other: &Ratings) -> Ratings {
        let mut records = Vec::with_capacity(self.len() + other.len());
        records.extend_from_slice(&self.records);
        records.extend_from_slice(&other.records);
        Ratings { records }
    }
}

impl From<Vec<RatingRecord>> for Ratings {
    fn from(records: Vec<RatingRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<RatingRecord> for Ratings {
    fn from_iter<I: IntoIterator<Item = RatingRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. Ratings must be complete."
    )]
    MissingValuesFound(String),
    #[error(
        "Input file contains only {found} data rows, but at least {required} are needed to split and fit a model."
    )]
    InsufficientRows { found: usize, required: usize },
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. All ratings must be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("Value {value} in column '{column_name}' at row {row} is out of range.")]
    ValueOutOfRange {
        column_name: String,
        row: usize,
        value: i64,
    },
}

/// Loads and validates a ratings file.
pub fn load_raw_ratings(path: &Path) -> Result<Vec<RawRating>, DataError> {
    internal::load_ratings(path)
}

mod internal {
    use super::*;

    const MINIMUM_ROWS: usize = 20;

    pub(super) const USER_COLUMN: &str = "userId";
    pub(super) const MOVIE_COLUMN: &str = "movieId";
    pub(super) const RATING_COLUMN: &str = "rating";
    pub(super) const TIMESTAMP_COLUMN: &str = "timestamp";
    pub(super) const TITLE_COLUMN: &str = "title";
    pub(super) const GENRES_COLUMN: &str = "genres";

    const REQUIRED_COLUMNS: [&str; 6] = [
        USER_COLUMN,
        MOVIE_COLUMN,
        RATING_COLUMN,
        TIMESTAMP_COLUMN,
        TITLE_COLUMN,
        GENRES_COLUMN,
    ];

    pub(super) fn load_ratings(path: &Path) -> Result<Vec<RawRating>, DataError> {
        log::info!("Loading ratings from '{}'", path.display());

        let df = CsvReader::new(File::open(path)?)
            .with_options(
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
            )
            .finish()?;

        if df.height() < MINIMUM_ROWS {
            return Err(DataError::InsufficientRows {
                found: df.height(),
                required: MINIMUM_ROWS,
            });
        }

        let columns_set: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        for col_name in REQUIRED_COLUMNS {
            if !columns_set.contains(col_name) {
                return Err(DataError::ColumnNotFound(col_name.to_string()));
            }
        }

        let users = extract_id_column(&df, USER_COLUMN)?;
        let movies = extract_id_column(&df, MOVIE_COLUMN)?;
        let ratings = extract_rating_column(&df, RATING_COLUMN)?;
        let timestamps = extract_integer_column(&df, TIMESTAMP_COLUMN)?;
        let titles = extract_text_column(&df, TITLE_COLUMN)?;
        let genres = extract_text_column(&df, GENRES_COLUMN)?;

        let rows: Vec<RawRating> = itertools::izip!(users, movies, ratings, timestamps, titles, genres)
            .map(
                |(user_id, movie_id, rating, timestamp, title, genres)| RawRating {
                    user_id,
                    movie_id,
                    rating,
                    timestamp,
                    title,
                    genres,
                },
            )
            .collect();

        log::info!("Loaded {} ratings with all required columns.", rows.len());
        Ok(rows)
    }

    fn wrong_type(column: &Column, column_name: &str, expected_type: &'static str) -> DataError {
        DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type,
            found_type: format!("{:?}", column.dtype()),
        }
    }

    pub(super) fn extract_rating_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<f64>, DataError> {
        let column = df.column(column_name)?;
        if column.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = column
            .cast(&DataType::Float64)
            .map_err(|_| wrong_type(column, column_name, "f64 (numeric)"))?;
        if casted.null_count() > 0 {
            return Err(wrong_type(column, column_name, "f64 (numeric)"));
        }

        let values: Vec<f64> = casted.f64()?.into_no_null_iter().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(values)
    }

    pub(super) fn extract_integer_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<i64>, DataError> {
        let column = df.column(column_name)?;
        if column.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = column
            .cast(&DataType::Int64)
            .map_err(|_| wrong_type(column, column_name, "integer"))?;
        if casted.null_count() > 0 {
            return Err(wrong_type(column, column_name, "integer"));
        }

        Ok(casted.i64()?.into_no_null_iter().collect())
    }

    fn extract_id_column(df: &DataFrame, column_name: &str) -> Result<Vec<u32>, DataError> {
        extract_integer_column(df, column_name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                u32::try_from(value).map_err(|_| DataError::ValueOutOfRange {
                    column_name: column_name.to_string(),
                    row: row + 1,
                    value,
                })
            })
            .collect()
    }

    /// Reads a text column, interning repeated values. Nulls become empty labels.
    fn extract_text_column(df: &DataFrame, column_name: &str) -> Result<Vec<Arc<str>>, DataError> {
        let column = df.column(column_name)?;
        let casted = column
            .cast(&DataType::String)
            .map_err(|_| wrong_type(column, column_name, "text"))?;
        let chunked = casted.str()?;

        let mut interned: AHashMap<&str, Arc<str>> = AHashMap::new();
        let values = chunked
            .into_iter()
            .map(|value| {
                let text = value.unwrap_or("");
                interned
                    .entry(text)
                    .or_insert_with(|| Arc::from(text))
                    .clone()
            })
            .collect();
        Ok(values)
    }
}
