//! Descriptive statistics of a prepared rating set.

use crate::data::Ratings;
use ahash::AHashSet;
use std::collections::BTreeMap;
use std::fmt;

/// Counts and rating distribution of one dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetSummary {
    pub n_ratings: usize,
    pub n_users: usize,
    pub n_movies: usize,
    pub n_genre_combinations: usize,
    pub mean_rating: f64,
    pub min_rating: f64,
    pub max_rating: f64,
    /// `(rating value, count)` in ascending rating order.
    pub histogram: Vec<(f64, usize)>,
    pub unknown_release_years: usize,
}

/// Summarizes `ratings`. Rating statistics are NaN for an empty set.
pub fn summarize(ratings: &Ratings) -> DatasetSummary {
    let records = ratings.records();

    let users: AHashSet<_> = records.iter().map(|r| r.user_id).collect();
    let movies: AHashSet<_> = records.iter().map(|r| r.movie_id).collect();
    let genres: AHashSet<&str> = records.iter().map(|r| r.genres.as_ref()).collect();

    let (min_rating, max_rating) = if records.is_empty() {
        (f64::NAN, f64::NAN)
    } else {
        records.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.rating), hi.max(r.rating))
        })
    };

    // Keyed in thousandths so half-star values bucket exactly.
    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for record in records {
        *buckets
            .entry((record.rating * 1000.0).round() as i64)
            .or_insert(0) += 1;
    }

    DatasetSummary {
        n_ratings: records.len(),
        n_users: users.len(),
        n_movies: movies.len(),
        n_genre_combinations: genres.len(),
        mean_rating: ratings.mean_rating().unwrap_or(f64::NAN),
        min_rating,
        max_rating,
        histogram: buckets
            .into_iter()
            .map(|(key, count)| (key as f64 / 1000.0, count))
            .collect(),
        unknown_release_years: records
            .iter()
            .filter(|r| r.release_year.is_none())
            .count(),
    }
}

impl DatasetSummary {
    /// Share of ratings at each value, in histogram order.
    pub fn proportions(&self) -> Vec<(f64, f64)> {
        if self.n_ratings == 0 {
            return Vec::new();
        }
        self.histogram
            .iter()
            .map(|&(value, count)| (value, count as f64 / self.n_ratings as f64))
            .collect()
    }

    pub fn log(&self) {
        log::info!(
            "Dataset: {} ratings from {} users on {} movies ({} genre combinations).",
            self.n_ratings,
            self.n_users,
            self.n_movies,
            self.n_genre_combinations
        );
        log::info!(
            "Ratings: mean {:.4}, range [{}, {}]; {} with unknown release year.",
            self.mean_rating,
            self.min_rating,
            self.max_rating,
            self.unknown_release_years
        );
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ratings:               {}", self.n_ratings)?;
        writeln!(f, "Users:                 {}", self.n_users)?;
        writeln!(f, "Movies:                {}", self.n_movies)?;
        writeln!(f, "Genre combinations:    {}", self.n_genre_combinations)?;
        writeln!(f, "Mean rating:           {:.4}", self.mean_rating)?;
        writeln!(f, "Rating range:          {} to {}", self.min_rating, self.max_rating)?;
        writeln!(f, "Unknown release year:  {}", self.unknown_release_years)?;
        writeln!(f)?;
        writeln!(f, "{:>6}  {:>10}  {:>7}", "Rating", "Count", "Share")?;
        for (&(value, count), (_, share)) in self.histogram.iter().zip(self.proportions()) {
            writeln!(f, "{:>6.1}  {:>10}  {:>6.2}%", value, count, share * 100.0)?;
        }
        Ok(())
    }
}
