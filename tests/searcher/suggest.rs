use gp_searcher::model::{Estimator, Prediction, Predictor, TrainingData};
use gp_searcher::space::{Configuration, ParamValue, SearchSpace};
use gp_searcher::{Error, GpSearcher, Result};

use crate::{constrained_searcher, drive, report, unit_space, x_config};

/// Predicts `slope * x[0] + offset` with a fixed standard deviation,
/// whatever it was fitted on.
#[derive(Clone)]
struct LinearEstimator {
    slope: f64,
    offset: f64,
    std: f64,
}

struct LinearPredictor(LinearEstimator, usize);

impl Predictor for LinearPredictor {
    fn predict(&self, x: &[f64]) -> Prediction {
        Prediction {
            mean: self.0.slope * x[0] + self.0.offset,
            std: self.0.std,
        }
    }

    fn num_data(&self) -> usize {
        self.1
    }
}

impl Estimator for LinearEstimator {
    fn fit(&mut self, data: &TrainingData, _update_params: bool) -> Result<Box<dyn Predictor>> {
        Ok(Box::new(LinearPredictor(self.clone(), data.len())))
    }

    fn boxed_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

#[test]
fn points_to_evaluate_come_first_with_midpoints() {
    let space = SearchSpace::new()
        .float("x", 0.0, 1.0)
        .int("n", 0, 10)
        .categorical("act", ["relu", "tanh"]);
    let first: Configuration = [("x".to_string(), ParamValue::Float(0.1))].into_iter().collect();
    let second: Configuration = [
        ("x".to_string(), ParamValue::Float(0.9)),
        ("n".to_string(), ParamValue::Int(2)),
        ("act".to_string(), ParamValue::from("tanh")),
    ]
    .into_iter()
    .collect();
    let searcher = GpSearcher::builder(space, "obj")
        .points_to_evaluate(vec![first, second.clone()])
        .random_seed(0)
        .build()
        .unwrap();

    let suggested = searcher.suggest().unwrap();
    assert_eq!(suggested["x"], ParamValue::Float(0.1));
    assert_eq!(suggested["n"], ParamValue::Int(5));
    assert_eq!(suggested["act"], ParamValue::from("relu"));
    assert_eq!(searcher.suggest().unwrap(), second);
    assert_eq!(searcher.num_suggestions().unwrap(), 2);
}

#[test]
fn invalid_points_to_evaluate_fail_construction() {
    let result = GpSearcher::builder(unit_space(), "obj")
        .points_to_evaluate(vec![x_config(2.0)])
        .build();
    assert!(matches!(result, Err(Error::InvalidValue { .. })));
}

#[test]
fn suggest_does_not_touch_the_state() {
    let searcher = constrained_searcher(3);
    drive(&searcher, 0, 4);
    let before = searcher.state().unwrap();
    searcher.suggest().unwrap();
    searcher.suggest().unwrap();
    assert_eq!(searcher.state().unwrap(), before);
}

#[test]
fn suggestions_stay_in_the_search_space() {
    let space = SearchSpace::new()
        .log_float("lr", 1e-4, 1e-1)
        .int("layers", 1, 6)
        .categorical("opt", ["sgd", "adam"])
        .fixed("epochs", 10_i64);
    let searcher = GpSearcher::builder(space, "loss")
        .random_seed(8)
        .num_init_random(2)
        .build()
        .unwrap();
    for i in 0..6 {
        let config = searcher.suggest().unwrap();
        let lr = config["lr"].as_f64().unwrap();
        assert!((1e-4..=1e-1).contains(&lr));
        assert!(matches!(config["layers"], ParamValue::Int(1..=6)));
        assert_eq!(config["epochs"], ParamValue::Int(10));
        searcher
            .update(&format!("t{i}"), &config, &report(&[("loss", lr.ln().abs())]))
            .unwrap();
    }
}

#[test]
fn predicted_infeasible_region_is_avoided() {
    // feasible iff x <= 0.5; the objective model prefers large x
    let searcher = GpSearcher::builder(unit_space(), "obj")
        .constrained("c")
        .random_seed(21)
        .num_init_random(2)
        .objective_estimator(LinearEstimator {
            slope: -1.0,
            offset: 0.0,
            std: 0.1,
        })
        .constraint_estimator(LinearEstimator {
            slope: 1.0,
            offset: -0.5,
            std: 0.01,
        })
        .build()
        .unwrap();
    drive(&searcher, 0, 2);
    for i in 2..10 {
        let config = searcher.suggest().unwrap();
        let x = config["x"].as_f64().unwrap();
        assert!(x <= 0.55, "suggested infeasible x = {x}");
        searcher
            .update(&format!("t{i}"), &config, &report(&[("obj", -x), ("c", x - 0.5)]))
            .unwrap();
    }
}

#[test]
fn gp_phase_runs_on_real_models() {
    let searcher = constrained_searcher(5);
    drive(&searcher, 0, 10);
    assert_eq!(searcher.state().unwrap().len(), 10);
    assert_eq!(searcher.num_observations().unwrap(), 10);
}

#[test]
fn exhausted_space_is_reported() {
    let space = SearchSpace::new().categorical("c", ["a", "b", "c", "d"]);
    let searcher = GpSearcher::builder(space, "obj")
        .random_seed(1)
        .num_init_random(2)
        .build()
        .unwrap();
    let mut seen = Vec::new();
    for i in 0..4 {
        let config = searcher.suggest().unwrap();
        assert!(!seen.contains(&config), "duplicate suggestion {config:?}");
        searcher
            .update(&format!("t{i}"), &config, &report(&[("obj", f64::from(i))]))
            .unwrap();
        seen.push(config);
    }
    assert!(matches!(searcher.suggest(), Err(Error::SpaceExhausted)));
}

#[test]
fn duplicates_allowed_on_request() {
    let space = SearchSpace::new().categorical("c", ["a"]);
    let searcher = GpSearcher::builder(space, "obj")
        .allow_duplicates(true)
        .random_seed(1)
        .build()
        .unwrap();
    for i in 0..3 {
        let config = searcher.suggest().unwrap();
        searcher
            .update(&format!("t{i}"), &config, &report(&[("obj", 1.0)]))
            .unwrap();
    }
    assert_eq!(searcher.trials().unwrap().len(), 3);
}

#[test]
fn failed_configurations_are_not_suggested_again() {
    let space = SearchSpace::new().categorical("c", ["a", "b"]);
    let searcher = GpSearcher::builder(space, "obj").random_seed(2).build().unwrap();
    let config = searcher.suggest().unwrap();
    searcher.register_pending("t0", &config).unwrap();
    searcher.evaluation_failed("t0").unwrap();
    assert_ne!(searcher.suggest().unwrap(), config);
}
