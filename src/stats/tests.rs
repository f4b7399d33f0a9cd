//! Tests for statistical primitives

use super::*;
use crate::error::ForecastError;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn approx(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn test_mean_and_std() {
    let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    assert_eq!(mean(&values).unwrap(), 5.0);
    assert_eq!(std(&values, 0).unwrap(), 2.0);
    assert!(approx(std(&values, 1).unwrap(), 2.138089935299395, 1e-12));
}

#[test]
fn test_std_requires_more_points_than_ddof() {
    let err = std(&[1.0], 1).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { needed: 2, got: 1 }));
}

#[test]
fn test_mean_of_empty_is_error() {
    assert!(mean(&[]).is_err());
}

#[test]
fn test_percentiles_of_empty_are_errors() {
    assert!(matches!(
        percentile(&[], 50.0),
        Err(ForecastError::InsufficientData { needed: 1, got: 0 })
    ));
    assert!(median(&[]).is_err());
    assert!(Percentiles::from_samples(&[]).is_err());
}

#[test]
fn test_percentile_linear_interpolation() {
    let values = [1.0, 2.0, 3.0, 4.0];
    // rank = 0.25 * 3 = 0.75 -> 1 + 0.75
    assert_eq!(percentile(&values, 25.0).unwrap(), 1.75);
    assert_eq!(percentile(&values, 50.0).unwrap(), 2.5);
    assert_eq!(percentile(&values, 0.0).unwrap(), 1.0);
    assert_eq!(percentile(&values, 100.0).unwrap(), 4.0);
}

#[test]
fn test_percentile_ignores_input_order() {
    let shuffled = [4.0, 1.0, 3.0, 2.0];
    assert_eq!(median(&shuffled).unwrap(), 2.5);
}

#[test]
fn test_percentiles_from_samples_are_monotone() {
    let values: Vec<f64> = (0..=100).map(|v| v as f64).collect();
    let p = Percentiles::from_samples(&values).unwrap();
    assert!(approx(p.p5, 5.0, 1e-9));
    assert!(approx(p.p25, 25.0, 1e-9));
    assert!(approx(p.p50, 50.0, 1e-9));
    assert!(approx(p.p75, 75.0, 1e-9));
    assert!(approx(p.p95, 95.0, 1e-9));
}

#[test]
fn test_percentiles_from_normal_symmetric() {
    let p = Percentiles::from_normal(10.0, 2.0);
    assert_eq!(p.p50, 10.0);
    assert!(approx(p.p50 - p.p5, p.p95 - p.p50, 1e-12));
    assert!(approx(p.p75 - p.p25, 2.0 * 2.0 * 0.6744897501960817, 1e-12));
}

#[test]
fn test_tail_fractions_are_strict() {
    let values = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(fraction_below(&values, 3.0), 0.5);
    assert_eq!(fraction_above(&values, 3.0), 0.25);
    assert_eq!(fraction_below(&[], 3.0), 0.0);
}

#[test]
fn test_linregress_exact_line() {
    let x = [2000.0, 2001.0, 2002.0, 2003.0];
    let y = [10.0, 12.0, 14.0, 16.0];
    let fit = linregress(&x, &y).unwrap();
    assert!(approx(fit.slope, 2.0, 1e-9));
    assert!(approx(fit.predict(2004.0), 18.0, 1e-6));
    assert!(approx(fit.r_squared(), 1.0, 1e-12));
    assert!(approx(fit.mse, 0.0, 1e-9));
}

#[test]
fn test_prediction_interval_widens_away_from_mean() {
    let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let y = [1.1, 1.9, 3.2, 3.8, 5.1, 6.0];
    let fit = linregress(&x, &y).unwrap();
    let (_, lo_near, hi_near, se_near) = fit.prediction_interval(3.5, 1.96);
    let (point_far, lo_far, hi_far, se_far) = fit.prediction_interval(10.0, 1.96);
    assert!(se_far > se_near);
    assert!(hi_far - lo_far > hi_near - lo_near);
    assert!(lo_far < point_far && point_far < hi_far);
}

#[test]
fn test_linregress_rejects_constant_regressor() {
    assert!(linregress(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
}

#[test]
fn test_linregress_rejects_length_mismatch() {
    assert!(linregress(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_err());
}

#[test]
fn test_fit_ar1_recovers_deterministic_recursion() {
    // x[t+1] = 0.5 * x[t] + 10
    let mut series = vec![40.0];
    for _ in 0..10 {
        let last = series[series.len() - 1];
        series.push(0.5 * last + 10.0);
    }
    let fit = fit_ar1(&series).unwrap();
    assert!(approx(fit.a, 0.5, 1e-9));
    assert!(approx(fit.b, 10.0, 1e-7));
    assert!(fit.sigma < 1e-9);
    assert!(approx(fit.predict(30.0), 25.0, 1e-6));
}

#[test]
fn test_ar1_simulate_is_seeded() {
    let fit = Ar1Fit { a: 0.9, b: 5.0, sigma: 1.0 };
    let mut rng_a = StdRng::seed_from_u64(42);
    let mut rng_b = StdRng::seed_from_u64(42);
    let a = fit.simulate(50.0, 2, 100, &mut rng_a).unwrap();
    let b = fit.simulate(50.0, 2, 100, &mut rng_b).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 100);
}

#[test]
fn test_ar1_simulate_zero_sigma_is_deterministic() {
    let fit = Ar1Fit { a: 0.5, b: 10.0, sigma: 0.0 };
    let mut rng = StdRng::seed_from_u64(1);
    let paths = fit.simulate(40.0, 2, 3, &mut rng).unwrap();
    // 40 -> 30 -> 25
    assert!(paths.iter().all(|v| approx(*v, 25.0, 1e-12)));
}

#[test]
fn test_logit_clips_extremes() {
    assert!(logit(0.0).is_finite());
    assert!(logit(1.0).is_finite());
    assert!(approx(logit(0.5), 0.0, 1e-12));
    assert!(approx(inv_logit(logit(0.3)), 0.3, 1e-12));
}

#[test]
fn test_logit_ar1_sigma_floor() {
    let fractions = [0.20, 0.21, 0.22, 0.23, 0.24, 0.25];
    let fit = fit_logit_ar1(&fractions).unwrap();
    assert!(fit.sigma >= 0.25);
}

#[test]
fn test_logit_ar1_two_points() {
    let fit = fit_logit_ar1(&[0.20, 0.30]).unwrap();
    assert_eq!(fit.slope, 0.0);
    assert!(approx(fit.intercept, logit(0.30), 1e-12));
    assert_eq!(fit.sigma, 0.25);

    assert!(matches!(
        fit_logit_ar1(&[0.20]),
        Err(ForecastError::InsufficientData { needed: 2, got: 1 })
    ));
}

#[test]
fn test_logit_ar1_step_stays_in_unit_interval() {
    let fractions = [0.18, 0.26, 0.41, 0.47, 0.39, 0.32];
    let fit = fit_logit_ar1(&fractions).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let draws = fit.step(0.32, 1000, &mut rng).unwrap();
    assert!(draws.iter().all(|p| *p > 0.0 && *p < 1.0));
}

#[test]
fn test_ema_matches_recursion() {
    let values = [1.0, 2.0, 3.0];
    let out = ema(&values, 3).unwrap();
    // alpha = 0.5
    assert_eq!(out, vec![1.0, 1.5, 2.25]);
}

#[test]
fn test_lag1_autocorrelation_of_trend() {
    let values = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert!(approx(lag1_autocorrelation(&values).unwrap(), 1.0, 1e-12));
}

#[test]
fn test_analog_transitions_within_band() {
    let series = [20.0, 27.0, 35.0, 28.0, 31.0, 29.0];
    // last = 29; points within 3: 27 -> 35, 28 -> 31, 31 -> 29
    let next = analog_transitions(&series, 3.0);
    assert_eq!(next, vec![35.0, 31.0, 29.0]);
    assert!(analog_transitions(&[], 3.0).is_empty());
}

#[test]
fn test_poisson_sf() {
    assert_eq!(poisson_sf(0, 3.0).unwrap(), 1.0);
    // P(X >= 1) = 1 - e^-2
    assert!(approx(poisson_sf(1, 2.0).unwrap(), 1.0 - (-2.0f64).exp(), 1e-12));
    // P(X >= 3 | lambda = 2) = 1 - e^-2 (1 + 2 + 2)
    assert!(approx(poisson_sf(3, 2.0).unwrap(), 1.0 - 5.0 * (-2.0f64).exp(), 1e-12));
    assert_eq!(poisson_sf(2, 0.0).unwrap(), 0.0);
    assert!(poisson_sf(2, -1.0).is_err());
}

#[test]
fn test_bayesian_update() {
    // even likelihoods leave the prior alone
    assert!(approx(bayesian_update(0.3, 0.5, 0.5).unwrap(), 0.3, 1e-12));
    // prior odds 1:1, LR 3 -> 0.75
    assert!(approx(bayesian_update(0.5, 0.6, 0.2).unwrap(), 0.75, 1e-12));
    assert!(bayesian_update(1.0, 0.6, 0.2).is_err());
    assert!(bayesian_update(0.5, 0.6, 0.0).is_err());
}

#[test]
fn test_lognormal_from_quartiles() {
    let (mu, sigma) = lognormal_from_quartiles(50.0, 100.0, 200.0).unwrap();
    assert!(approx(mu, 100f64.ln(), 1e-12));
    assert!(approx(sigma, 4f64.ln() / (2.0 * 0.6744897501960817), 1e-12));
    assert!(lognormal_from_quartiles(100.0, 50.0, 200.0).is_err());
}

#[test]
fn test_business_days_between() {
    let mon = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let next_mon = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
    assert_eq!(business_days_between(mon, next_mon), 5);
    assert_eq!(business_days_between(next_mon, mon), 0);
}
