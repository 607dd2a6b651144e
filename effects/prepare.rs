//! Feature derivation: release year from the title, review delay from the
//! rating timestamp.
//!
//! The review date is rounded before its calendar year is taken. The rounding
//! unit is an explicit `DateGranularity` so the model-building partition and the
//! holdout partition can be prepared under named, inspectable settings.

use crate::data::{RatingRecord, Ratings, RawRating};
use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
/// 1969-12-28, the Sunday on or before the Unix epoch. Weeks are anchored here.
const WEEK_ORIGIN: i64 = -4 * SECONDS_PER_DAY;

/// The unit a review timestamp is rounded to before its year is taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateGranularity {
    /// Nearest UTC midnight.
    #[default]
    Day,
    /// Nearest week boundary, weeks starting on Sunday.
    Week,
}

impl DateGranularity {
    fn unit_and_origin(self) -> (i64, i64) {
        match self {
            Self::Day => (SECONDS_PER_DAY, 0),
            Self::Week => (SECONDS_PER_WEEK, WEEK_ORIGIN),
        }
    }

    /// Rounds a Unix timestamp to the nearest boundary of this unit. Halfway
    /// points round up. `None` when the rounded value does not fit in an `i64`.
    pub fn round(self, timestamp: i64) -> Option<i64> {
        let (unit, origin) = self.unit_and_origin();
        let offset = timestamp.checked_sub(origin)?.checked_add(unit / 2)?;
        offset.div_euclid(unit).checked_mul(unit)?.checked_add(origin)
    }
}

impl fmt::Display for DateGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => f.write_str("day"),
            Self::Week => f.write_str("week"),
        }
    }
}

/// Extracts a trailing four-digit year in parentheses, e.g. `Heat (1995)`.
pub fn release_year_from_title(title: &str) -> Option<i32> {
    let inner = title.trim_end().strip_suffix(')')?;
    let (_, year) = inner.rsplit_once('(')?;
    let year = year.trim();
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

/// The calendar year (UTC) of the rounded review date, or `None` when the
/// timestamp lies outside the representable calendar range.
pub fn review_year(timestamp: i64, granularity: DateGranularity) -> Option<i32> {
    DateTime::from_timestamp(granularity.round(timestamp)?, 0).map(|date| date.year())
}

/// Turns one raw row into a modelling record.
pub fn prepare_record(raw: &RawRating, granularity: DateGranularity) -> RatingRecord {
    let release_year = release_year_from_title(&raw.title);
    let review_delay = match (release_year, review_year(raw.timestamp, granularity)) {
        (Some(released), Some(reviewed)) => Some(reviewed - released),
        _ => None,
    };

    RatingRecord {
        rating: raw.rating,
        movie_id: raw.movie_id,
        user_id: raw.user_id,
        genres: raw.genres.clone(),
        release_year,
        review_delay,
    }
}

/// Prepares a whole partition under one rounding granularity.
pub fn prepare_ratings(raw: &[RawRating], granularity: DateGranularity) -> Ratings {
    let ratings: Ratings = raw
        .iter()
        .map(|row| prepare_record(row, granularity))
        .collect();

    let unknown_years = ratings
        .records()
        .iter()
        .filter(|r| r.release_year.is_none())
        .count();
    if unknown_years > 0 {
        log::debug!(
            "{} of {} ratings have no parseable release year and fall into the unknown group.",
            unknown_years,
            ratings.len()
        );
    }

    ratings
}
