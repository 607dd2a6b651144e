use approx::assert_abs_diff_eq;
use cinebias::chain::build_chain;
use cinebias::data::{RatingRecord, Ratings};
use cinebias::estimate::{CANDIDATE_CHAIN, EstimationError, GroupKey, GroupValue, estimate_effect};
use cinebias::metric::rmse;
use cinebias::predict::predict;
use cinebias::search::search;
use ndarray::array;
use std::sync::Arc;

fn record(movie_id: u32, user_id: u32, rating: f64) -> RatingRecord {
    RatingRecord {
        rating,
        movie_id,
        user_id,
        genres: Arc::from("Drama"),
        release_year: Some(1999),
        review_delay: Some(2),
    }
}

fn with_year(mut record: RatingRecord, release_year: Option<i32>) -> RatingRecord {
    record.release_year = release_year;
    record
}

#[test]
fn ratings_at_the_baseline_give_zero_effects() {
    let training = Ratings::new(vec![
        record(1, 1, 3.0),
        record(1, 2, 3.0),
        record(2, 1, 3.0),
        record(3, 3, 3.0),
    ]);
    let fit = build_chain(&training, &training, 3.0, &CANDIDATE_CHAIN, 0.0).unwrap();
    for table in &fit.model.effects {
        for (_, effect) in table.iter() {
            assert_abs_diff_eq!(effect, 0.0, epsilon = 1e-12);
        }
    }
    for &prediction in fit.model.predict(&training).iter() {
        assert_abs_diff_eq!(prediction, 3.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(fit.final_rmse(), 0.0, epsilon = 1e-12);
}

#[test]
fn zero_lambda_effect_is_the_group_mean_residual() {
    let training = Ratings::new(vec![
        record(1, 1, 4.0),
        record(1, 2, 5.0),
        record(1, 3, 2.5),
        record(2, 1, 1.5),
        record(3, 2, 3.0),
        record(3, 3, 4.5),
    ]);
    let baseline = 3.25;
    let movies = estimate_effect(&training, baseline, &[], GroupKey::Movie, 0.0).unwrap();
    assert_eq!(movies.len(), 3);

    let expected = [
        (1, (4.0 + 5.0 + 2.5) / 3.0 - baseline),
        (2, 1.5 - baseline),
        (3, (3.0 + 4.5) / 2.0 - baseline),
    ];
    for (movie, mean_residual) in expected {
        assert_abs_diff_eq!(
            movies.lookup(&GroupValue::Id(movie)).unwrap(),
            mean_residual,
            epsilon = 1e-12
        );
    }
}

#[test]
fn effects_shrink_toward_zero_as_lambda_grows() {
    let training = Ratings::new(vec![
        record(1, 1, 5.0),
        record(1, 2, 4.5),
        record(1, 3, 5.0),
        record(2, 1, 1.0),
        record(3, 2, 2.0),
        record(3, 3, 2.5),
    ]);
    let baseline = training.mean_rating().unwrap();
    let lambdas = [0.0, 0.5, 1.0, 3.0, 10.0, 100.0];
    let tables: Vec<_> = lambdas
        .iter()
        .map(|&lambda| estimate_effect(&training, baseline, &[], GroupKey::Movie, lambda).unwrap())
        .collect();

    for movie in [1, 2, 3] {
        let key = GroupValue::Id(movie);
        let magnitudes: Vec<f64> = tables
            .iter()
            .map(|table| table.lookup(&key).unwrap().abs())
            .collect();
        for pair in magnitudes.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12, "movie {movie}: {magnitudes:?}");
        }
    }
}

#[test]
fn unseen_movies_are_predicted_at_the_baseline() {
    let training = Ratings::new(vec![record(1, 1, 5.0), record(2, 1, 1.0)]);
    let movies = estimate_effect(&training, 3.0, &[], GroupKey::Movie, 0.0).unwrap();
    let evaluation = Ratings::new(vec![record(99, 1, 4.0)]);
    let predictions = predict(&evaluation, 3.0, std::slice::from_ref(&movies));
    assert_abs_diff_eq!(predictions[0], 3.0, epsilon = 0.0);
}

#[test]
fn missing_keys_fall_back_independently_across_tables() {
    let training = Ratings::new(vec![
        with_year(record(1, 1, 5.0), Some(1995)),
        with_year(record(1, 2, 3.0), None),
        with_year(record(2, 1, 2.0), None),
    ]);
    let baseline = 3.0;
    let fit = build_chain(
        &training,
        &training,
        baseline,
        &[GroupKey::Movie, GroupKey::ReleaseYear],
        0.0,
    )
    .unwrap();
    let (movies, years) = (&fit.model.effects[0], &fit.model.effects[1]);
    assert!(years.lookup(&GroupValue::Unknown).is_some());

    // An unseen movie with no year, then a known movie with an unseen year.
    let evaluation = Ratings::new(vec![
        with_year(record(99, 1, 0.0), None),
        with_year(record(1, 1, 0.0), Some(2020)),
    ]);
    let predictions = fit.model.predict(&evaluation);

    let without_movie = predict(&evaluation, baseline, std::slice::from_ref(years));
    let without_year = predict(&evaluation, baseline, std::slice::from_ref(movies));
    assert_abs_diff_eq!(predictions[0], without_movie[0], epsilon = 1e-12);
    assert_abs_diff_eq!(predictions[1], without_year[1], epsilon = 1e-12);

    let unknown_year = years.lookup(&GroupValue::Unknown).unwrap();
    assert_abs_diff_eq!(predictions[0], baseline + unknown_year, epsilon = 1e-12);
    assert_abs_diff_eq!(
        predictions[1],
        baseline + movies.lookup(&GroupValue::Id(1)).unwrap(),
        epsilon = 1e-12
    );
}

#[test]
fn rmse_is_non_negative_and_zero_only_on_exact_match() {
    let actual = array![1.0, 2.5, 4.0];
    assert_abs_diff_eq!(rmse(actual.view(), actual.view()).unwrap(), 0.0, epsilon = 0.0);

    let predicted = array![1.0, 2.5, 4.5];
    let score = rmse(actual.view(), predicted.view()).unwrap();
    assert!(score > 0.0);

    let short = array![1.0];
    assert_eq!(
        rmse(actual.view(), short.view()).unwrap_err(),
        EstimationError::DimensionMismatch {
            actual: 3,
            predicted: 1
        }
    );
}

#[test]
fn chain_order_changes_the_result() {
    let data = Ratings::new(vec![
        record(1, 1, 5.0),
        record(1, 2, 3.0),
        record(2, 1, 4.0),
        record(1, 1, 4.0),
    ]);
    let movie_first =
        build_chain(&data, &data, 4.0, &[GroupKey::Movie, GroupKey::User], 0.0).unwrap();
    let user_first =
        build_chain(&data, &data, 4.0, &[GroupKey::User, GroupKey::Movie], 0.0).unwrap();

    assert_abs_diff_eq!(movie_first.final_rmse(), 0.408_248_290_463_863, epsilon = 1e-9);
    assert_abs_diff_eq!(user_first.final_rmse(), 0.360_041_149_911_547_8, epsilon = 1e-9);
    assert!((movie_first.final_rmse() - user_first.final_rmse()).abs() > 1e-3);
}

#[test]
fn search_ties_go_to_the_smallest_lambda() {
    let constant = Ratings::new(vec![
        record(1, 1, 4.0),
        record(1, 2, 4.0),
        record(2, 1, 4.0),
        record(2, 2, 4.0),
    ]);
    let outcome = search(&constant, &constant, 4.0, &CANDIDATE_CHAIN, &[5.0, 5.05, 5.1]).unwrap();
    assert_abs_diff_eq!(outcome.best_lambda, 5.0, epsilon = 0.0);
    assert_eq!(outcome.trials.len(), 3);
    for trial in &outcome.trials {
        assert_abs_diff_eq!(trial.rmse, outcome.best_rmse, epsilon = 0.0);
    }
}

#[test]
fn two_movie_scenario_end_to_end() {
    let training = Ratings::new(vec![
        record(1, 1, 3.0),
        record(1, 2, 4.0),
        record(1, 3, 5.0),
        record(2, 1, 2.0),
        record(2, 2, 3.0),
        record(2, 3, 4.0),
    ]);
    let baseline = training.mean_rating().unwrap();
    assert_abs_diff_eq!(baseline, 3.5, epsilon = 1e-12);

    let movies = estimate_effect(&training, baseline, &[], GroupKey::Movie, 0.0).unwrap();
    assert_abs_diff_eq!(movies.lookup(&GroupValue::Id(1)).unwrap(), 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(movies.lookup(&GroupValue::Id(2)).unwrap(), -0.5, epsilon = 1e-12);

    let evaluation = Ratings::new(vec![record(1, 1, 4.5), record(2, 2, 2.5)]);
    let fit = build_chain(
        &training,
        &evaluation,
        baseline,
        &[GroupKey::Movie, GroupKey::User],
        0.0,
    )
    .unwrap();
    let entries = fit.entries();
    assert_eq!(entries[0].0, "Movie effect");
    assert_abs_diff_eq!(entries[0].1, 0.5, epsilon = 1e-12);
    assert_eq!(entries[1].0, "Movie + User effects");
    assert_abs_diff_eq!(entries[1].1, 1.25_f64.sqrt(), epsilon = 1e-12);
}
