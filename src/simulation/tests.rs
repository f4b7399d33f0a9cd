//! Tests for the Monte Carlo simulation module

use super::*;
use crate::config::SimulationConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sim_config(components: Vec<NamedComponent>) -> SimulationConfig {
    SimulationConfig {
        target: "test quantity".to_string(),
        samples: 20_000,
        seed: 42,
        lower: None,
        upper: None,
        output_dir: ".".to_string(),
        components,
        tails_below: Vec::new(),
        tails_above: Vec::new(),
        candidates: Vec::new(),
        contenders: Vec::new(),
    }
}

fn constant(name: &str, weight: f64, value: f64) -> NamedComponent {
    NamedComponent {
        name: name.to_string(),
        weight,
        distribution: Component::Constant { value },
    }
}

#[test]
fn test_component_deserializes_from_tagged_json() {
    let json = r#"{"type": "truncated_normal", "mean": 9.0, "sd": 2.0, "lower": 0.0}"#;
    let component: Component = serde_json::from_str(json).unwrap();
    assert_eq!(
        component,
        Component::TruncatedNormal {
            mean: 9.0,
            sd: 2.0,
            lower: Some(0.0),
            upper: None
        }
    );

    let nested = r#"{"type": "sum", "terms": [
        {"type": "ar1", "history": [50.0, 51.0, 49.5, 52.0]},
        {"type": "normal", "mean": 4.0, "sd": 1.0}
    ]}"#;
    let component: Component = serde_json::from_str(nested).unwrap();
    assert_eq!(component.kind(), "sum");
}

#[test]
fn test_normal_component_moments() {
    let mut rng = StdRng::seed_from_u64(42);
    let draws = Component::Normal { mean: 50.0, sd: 2.0 }.sample(50_000, &mut rng).unwrap();
    let m = crate::stats::mean(&draws).unwrap();
    let s = crate::stats::std(&draws, 0).unwrap();
    assert!((m - 50.0).abs() < 0.05);
    assert!((s - 2.0).abs() < 0.05);
}

#[test]
fn test_truncated_normal_respects_bounds() {
    let mut rng = StdRng::seed_from_u64(7);
    let draws = Component::TruncatedNormal {
        mean: 1.0,
        sd: 3.0,
        lower: Some(0.0),
        upper: Some(4.0),
    }
    .sample(10_000, &mut rng)
    .unwrap();
    assert!(draws.iter().all(|v| (0.0..=4.0).contains(v)));
    assert!(draws.iter().any(|v| *v == 0.0));
}

#[test]
fn test_lognormal_quartiles_median() {
    let mut rng = StdRng::seed_from_u64(42);
    let draws = Component::LogNormalQuartiles {
        p25: 60.0,
        p50: 100.0,
        p75: 170.0,
    }
    .sample(50_000, &mut rng)
    .unwrap();
    let p50 = crate::stats::median(&draws).unwrap();
    assert!((p50 - 100.0).abs() < 3.0);
}

#[test]
fn test_poisson_zero_lambda() {
    let mut rng = StdRng::seed_from_u64(1);
    let draws = Component::Poisson { lambda: 0.0 }.sample(10, &mut rng).unwrap();
    assert!(draws.iter().all(|v| *v == 0.0));
    assert!(Component::Poisson { lambda: -1.0 }.sample(10, &mut rng).is_err());
}

#[test]
fn test_invalid_parameters_are_errors() {
    let mut rng = StdRng::seed_from_u64(1);
    assert!(Component::Normal { mean: 0.0, sd: -1.0 }.sample(5, &mut rng).is_err());
    assert!(Component::Triangular { low: 0.0, mode: 2.0, high: 1.0 }
        .sample(5, &mut rng)
        .is_err());
    assert!(Component::Uniform { low: 2.0, high: 1.0 }.sample(5, &mut rng).is_err());
    assert!(Component::Bootstrap { values: vec![], jitter_sd: 0.0 }
        .sample(5, &mut rng)
        .is_err());
    assert!(Component::Sum { terms: vec![] }.sample(5, &mut rng).is_err());
}

#[test]
fn test_bootstrap_without_jitter_only_returns_observed() {
    let mut rng = StdRng::seed_from_u64(3);
    let values = vec![1.0, 5.0, 9.0];
    let draws = Component::Bootstrap {
        values: values.clone(),
        jitter_sd: 0.0,
    }
    .sample(500, &mut rng)
    .unwrap();
    assert!(draws.iter().all(|d| values.contains(d)));
}

#[test]
fn test_analog_falls_back_with_few_matches() {
    let mut rng = StdRng::seed_from_u64(3);
    // nothing else lies within 0.5 of the last value
    let draws = Component::Analog {
        history: vec![10.0, 20.0, 30.0, 40.0],
        band: 0.5,
        jitter_sd: 0.0,
        fallback_sd: 0.0,
    }
    .sample(10, &mut rng)
    .unwrap();
    assert!(draws.iter().all(|d| *d == 40.0));
}

#[test]
fn test_sum_and_product() {
    let mut rng = StdRng::seed_from_u64(3);
    let sum = Component::Sum {
        terms: vec![Component::Constant { value: 2.0 }, Component::Constant { value: 3.0 }],
    }
    .sample(4, &mut rng)
    .unwrap();
    assert_eq!(sum, vec![5.0; 4]);

    let product = Component::Product {
        factors: vec![Component::Constant { value: 2.0 }, Component::Constant { value: 3.0 }],
    }
    .sample(4, &mut rng)
    .unwrap();
    assert_eq!(product, vec![6.0; 4]);
}

#[test]
fn test_log_return_zero_volatility() {
    let mut rng = StdRng::seed_from_u64(3);
    let draws = Component::LogReturn {
        start: 100.0,
        mu: 0.0,
        sd: 0.0,
        steps: 20.0,
    }
    .sample(3, &mut rng)
    .unwrap();
    assert!(draws.iter().all(|d| (*d - 100.0).abs() < 1e-12));
}

#[test]
fn test_logit_ar1_component_stays_in_scale() {
    let mut rng = StdRng::seed_from_u64(42);
    let draws = Component::LogitAr1 {
        history: vec![18.0, 26.0, 41.0, 47.0, 39.0, 32.0],
        scale: 100.0,
    }
    .sample(5_000, &mut rng)
    .unwrap();
    assert!(draws.iter().all(|d| *d > 0.0 && *d < 100.0));
}

#[test]
fn test_logit_ar1_component_short_history() {
    let mut rng = StdRng::seed_from_u64(7);
    let draws = Component::LogitAr1 {
        history: vec![20.0, 30.0],
        scale: 100.0,
    }
    .sample(2_000, &mut rng)
    .unwrap();
    assert_eq!(draws.len(), 2_000);
    let median = crate::stats::median(&draws).unwrap();
    assert!((median - 30.0).abs() < 3.0);
}

#[test]
fn test_normalize_weights() {
    let w = normalize_weights(&[2.0, 1.0, 1.0]).unwrap();
    assert_eq!(w, vec![0.5, 0.25, 0.25]);
    assert!(normalize_weights(&[0.0, 0.0]).is_err());
    assert!(normalize_weights(&[1.0, -0.5]).is_err());
    assert!(normalize_weights(&[]).is_err());
}

#[test]
fn test_assign_components_never_picks_zero_weight() {
    let mut rng = StdRng::seed_from_u64(42);
    let choice = assign_components(&[0.5, 0.0, 0.5], 10_000, &mut rng).unwrap();
    assert!(!choice.contains(&1));
    let share0 = choice.iter().filter(|k| **k == 0).count() as f64 / 10_000.0;
    assert!((share0 - 0.5).abs() < 0.03);
}

#[test]
fn test_mixture_sample_selects_by_weight() {
    let mut rng = StdRng::seed_from_u64(42);
    let n = 10_000;
    let comps = vec![vec![0.0; n], vec![1.0; n]];
    let mixed = mixture_sample(&comps, &[0.3, 0.7], &mut rng).unwrap();
    let share_one = mixed.iter().sum::<f64>() / n as f64;
    assert!((share_one - 0.7).abs() < 0.02);
}

#[test]
fn test_mixture_sample_rejects_mismatched_inputs() {
    let mut rng = StdRng::seed_from_u64(42);
    assert!(mixture_sample(&[vec![1.0; 3]], &[0.5, 0.5], &mut rng).is_err());
    assert!(mixture_sample(&[vec![1.0; 3], vec![1.0; 2]], &[0.5, 0.5], &mut rng).is_err());
    assert!(mixture_sample(&[], &[], &mut rng).is_err());
}

#[test]
fn test_simulator_is_deterministic_for_seed() {
    let mut config = sim_config(vec![
        NamedComponent {
            name: "ar".to_string(),
            weight: 0.55,
            distribution: Component::Normal { mean: 52.0, sd: 1.5 },
        },
        NamedComponent {
            name: "seasonal".to_string(),
            weight: 0.45,
            distribution: Component::Normal { mean: 49.0, sd: 2.0 },
        },
    ]);
    config.tails_below = vec![50.0];

    let sim = Simulator::from_config(&config);
    let a = sim.run(&config).unwrap().mixture.unwrap();
    let b = sim.run(&config).unwrap().mixture.unwrap();
    assert_eq!(a.forecast_percentiles, b.forecast_percentiles);
    assert_eq!(a.tail_probs, b.tail_probs);
}

#[test]
fn test_simulator_clips_and_reports_tails() {
    let mut config = sim_config(vec![constant("low", 0.5, 10.0), constant("high", 0.5, 90.0)]);
    config.lower = Some(30.0);
    config.upper = Some(70.0);
    config.tails_below = vec![49.0];
    config.tails_above = vec![56.5];

    let report = Simulator::from_config(&config).run(&config).unwrap();
    let mixture = report.mixture.unwrap();
    assert_eq!(mixture.forecast_percentiles.p5, 30.0);
    assert_eq!(mixture.forecast_percentiles.p95, 70.0);

    let below = mixture.tail_probs["p_lt_49"];
    let above = mixture.tail_probs["p_gt_56_5"];
    assert!((below + above - 1.0).abs() < 1e-12);
    assert!((below - 0.5).abs() < 0.03);

    assert_eq!(mixture.components.len(), 2);
    assert_eq!(mixture.components[0].mean, 10.0);
    assert_eq!(mixture.components[0].weight, 0.5);
}

#[test]
fn test_simulator_names_failing_component() {
    let config = sim_config(vec![NamedComponent {
        name: "broken".to_string(),
        weight: 1.0,
        distribution: Component::Normal { mean: 0.0, sd: -2.0 },
    }]);
    let err = Simulator::from_config(&config).run(&config).unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_simulator_requires_some_model() {
    let config = sim_config(Vec::new());
    assert!(Simulator::from_config(&config).run(&config).is_err());
}

#[test]
fn test_tail_label_formats() {
    assert_eq!(tail_label("lt", 49.0), "p_lt_49");
    assert_eq!(tail_label("gt", 56.5), "p_gt_56_5");
    assert_eq!(tail_label("lt", -1.0), "p_lt_m1");
}

#[test]
fn test_any_event_certain_and_impossible() {
    let mut rng = StdRng::seed_from_u64(42);
    let never = EventCandidate {
        name: "never".to_string(),
        low: 0.0,
        mode: 0.0,
        high: 0.0,
    };
    let always = EventCandidate {
        name: "always".to_string(),
        low: 1.0,
        mode: 1.0,
        high: 1.0,
    };
    let report = any_event(&[never.clone(), always], 1_000, &mut rng).unwrap();
    assert_eq!(report.probability, 1.0);
    assert_eq!(report.contributions["never"], 0.0);
    assert_eq!(report.contributions["always"], 1.0);
    assert_eq!(report.std, 0.0);

    let report = any_event(&[never], 1_000, &mut rng).unwrap();
    assert_eq!(report.probability, 0.0);
}

#[test]
fn test_any_event_combines_independent_candidates() {
    let mut rng = StdRng::seed_from_u64(42);
    let candidates: Vec<EventCandidate> = ["Dominion", "Duke"]
        .iter()
        .map(|name| EventCandidate {
            name: name.to_string(),
            low: 0.5,
            mode: 0.5,
            high: 0.5,
        })
        .collect();
    let report = any_event(&candidates, 20_000, &mut rng).unwrap();
    // 1 - 0.5 * 0.5
    assert!((report.probability - 0.75).abs() < 0.02);
}

#[test]
fn test_any_event_rejects_out_of_range() {
    let mut rng = StdRng::seed_from_u64(42);
    let bad = EventCandidate {
        name: "bad".to_string(),
        low: 0.2,
        mode: 0.5,
        high: 1.5,
    };
    assert!(any_event(&[bad], 10, &mut rng).is_err());
}

#[test]
fn test_sensitivity_ranks_dominant_candidate() {
    let candidates = vec![
        EventCandidate {
            name: "big".to_string(),
            low: 0.5,
            mode: 0.6,
            high: 0.7,
        },
        EventCandidate {
            name: "small".to_string(),
            low: 0.01,
            mode: 0.02,
            high: 0.03,
        },
    ];
    let sens = sensitivity(&candidates, 10_000, 42).unwrap();
    assert!(sens["big"] > sens["small"]);
    assert!(sens["big"] > 0.3);
}

#[test]
fn test_winner_shares_sum_to_one() {
    let mut rng = StdRng::seed_from_u64(42);
    let contenders = vec![
        Contender {
            name: "Norway".to_string(),
            mean: 15.0,
            sd: 2.0,
        },
        Contender {
            name: "Germany".to_string(),
            mean: 12.0,
            sd: 2.5,
        },
        Contender {
            name: "Italy".to_string(),
            mean: 5.0,
            sd: 1.5,
        },
    ];
    let shares = winner_shares(&contenders, 20_000, &mut rng).unwrap();
    let total: f64 = shares.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(shares["Norway"] > shares["Germany"]);
    assert!(shares["Italy"] < 0.01);
}

#[test]
fn test_winner_ties_go_alphabetical() {
    let mut rng = StdRng::seed_from_u64(42);
    let contenders = vec![
        Contender {
            name: "Zeta".to_string(),
            mean: -10.0,
            sd: 0.0,
        },
        Contender {
            name: "Alpha".to_string(),
            mean: -10.0,
            sd: 0.0,
        },
    ];
    // both clip to zero every draw
    let shares = winner_shares(&contenders, 100, &mut rng).unwrap();
    assert_eq!(shares["Alpha"], 1.0);
    assert_eq!(shares["Zeta"], 0.0);
}

#[test]
fn test_write_outputs_creates_json_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = sim_config(vec![constant("only", 1.0, 3.0)]);
    let report = Simulator::new(100, 1).run(&config).unwrap();

    let written = write_outputs(&report, dir.path()).unwrap();
    assert_eq!(written.len(), 2);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(OUTPUT_JSON)).unwrap()).unwrap();
    assert_eq!(json["mixture"]["forecast_percentiles"]["p50"], 3.0);

    let csv = std::fs::read_to_string(dir.path().join(OUTPUT_CSV)).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("percentile,value"));
    assert_eq!(lines.next(), Some("p5,3"));
    assert_eq!(csv.lines().count(), 6);
}
