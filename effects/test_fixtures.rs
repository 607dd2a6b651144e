//! Test fixtures and builders for effect-model tests.
//!
//! Provides a one-line record constructor and a seeded builder for synthetic
//! rating data with planted movie and user biases.

use crate::data::{MovieId, RatingRecord, Ratings, RawRating, UserId};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const GENRES: [&str; 5] = [
    "Comedy",
    "Drama",
    "Comedy|Romance",
    "Action|Thriller",
    "Documentary",
];

/// A record with fixed genre, release year and delay.
pub fn record(movie_id: MovieId, user_id: UserId, rating: f64) -> RatingRecord {
    RatingRecord {
        rating,
        movie_id,
        user_id,
        genres: Arc::from("Drama"),
        release_year: Some(1995),
        review_delay: Some(3),
    }
}

/// Builder for synthetic ratings: `3.5 + movie bias + user bias + noise`,
/// clipped to `[0.5, 5]` and rounded to half stars.
pub struct SyntheticRatingsBuilder {
    n_ratings: usize,
    n_movies: u32,
    n_users: u32,
    noise: f64,
    unknown_year_fraction: f64,
    seed: u64,
}

impl SyntheticRatingsBuilder {
    pub fn new(n_ratings: usize) -> Self {
        Self {
            n_ratings,
            n_movies: 40,
            n_users: 60,
            noise: 0.5,
            unknown_year_fraction: 0.05,
            seed: 42,
        }
    }

    pub fn with_movies(mut self, n: u32) -> Self {
        self.n_movies = n.max(1);
        self
    }

    pub fn with_users(mut self, n: u32) -> Self {
        self.n_users = n.max(1);
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = s;
        self
    }

    pub fn build(self) -> Ratings {
        self.generate()
            .into_iter()
            .map(|row| RatingRecord {
                rating: row.rating,
                movie_id: row.movie_id,
                user_id: row.user_id,
                genres: row.genres,
                release_year: row.release_year,
                review_delay: row.review_delay,
            })
            .collect()
    }

    /// The same rows as `build`, as unprepared file rows. Titles carry the
    /// release year and timestamps fall in mid-June of the review year, so
    /// preparing them under either granularity reproduces `build`.
    pub fn build_raw(self) -> Vec<RawRating> {
        self.generate()
            .into_iter()
            .map(|row| {
                let title = match row.release_year {
                    Some(year) => format!("Movie {} ({year})", row.movie_id),
                    None => format!("Movie {}", row.movie_id),
                };
                let review_year = match (row.release_year, row.review_delay) {
                    (Some(year), Some(delay)) => year + delay,
                    _ => 2005,
                };
                RawRating {
                    user_id: row.user_id,
                    movie_id: row.movie_id,
                    rating: row.rating,
                    timestamp: mid_june(review_year),
                    title: Arc::from(title),
                    genres: row.genres,
                }
            })
            .collect()
    }

    fn generate(&self) -> Vec<GeneratedRow> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let movie_bias: Vec<f64> = (0..self.n_movies)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        let user_bias: Vec<f64> = (0..self.n_users)
            .map(|_| rng.gen_range(-0.6..0.6))
            .collect();
        let movie_year: Vec<Option<i32>> = (0..self.n_movies)
            .map(|_| {
                if rng.r#gen::<f64>() < self.unknown_year_fraction {
                    None
                } else {
                    Some(rng.gen_range(1960..2005))
                }
            })
            .collect();
        let genres: Vec<Arc<str>> = GENRES.iter().map(|g| Arc::from(*g)).collect();

        (0..self.n_ratings)
            .map(|_| {
                let movie = rng.gen_range(0..self.n_movies);
                let user = rng.gen_range(0..self.n_users);
                let noise = if self.noise > 0.0 {
                    rng.gen_range(-self.noise..self.noise)
                } else {
                    0.0
                };
                let raw = 3.5 + movie_bias[movie as usize] + user_bias[user as usize] + noise;
                let release_year = movie_year[movie as usize];
                GeneratedRow {
                    rating: ((raw * 2.0).round() / 2.0).clamp(0.5, 5.0),
                    movie_id: movie,
                    user_id: user,
                    genres: genres[movie as usize % genres.len()].clone(),
                    release_year,
                    review_delay: release_year.map(|year| rng.gen_range(0..6) + (2005 - year) / 4),
                }
            })
            .collect()
    }
}

struct GeneratedRow {
    rating: f64,
    movie_id: MovieId,
    user_id: UserId,
    genres: Arc<str>,
    release_year: Option<i32>,
    review_delay: Option<i32>,
}

fn mid_june(year: i32) -> i64 {
    NaiveDate::from_ymd_opt(year, 6, 15)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .map_or(0, |noon| noon.and_utc().timestamp())
}
