use gp_searcher::state::INTERNAL_CONSTRAINT_NAME;
use gp_searcher::{Error, GpSearcher, Mode};

use crate::{constrained_searcher, report, unit_space, x_config};

#[test]
fn labels_objective_and_constraint_on_one_record() {
    let searcher = constrained_searcher(0);
    searcher
        .update("t1", &x_config(0.5), &report(&[("obj", 1.0), ("c", -0.2)]))
        .unwrap();

    let trials = searcher.trials().unwrap();
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].trial_id, "t1");
    assert_eq!(trials[0].metrics.len(), 2);
    assert_eq!(trials[0].metric("obj"), Some(1.0));
    assert_eq!(trials[0].metric(INTERNAL_CONSTRAINT_NAME), Some(-0.2));

    let err = searcher
        .update("t2", &x_config(0.2), &report(&[("obj", 2.0)]))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingMetric { ref trial_id, ref name } if trial_id == "t2" && name == "c"
    ));
    let state = searcher.state().unwrap();
    assert_eq!(state.len(), 1);
    assert!(state.get("t2").is_none());
    assert!(state.config("t2").is_none());
}

#[test]
fn missing_constraint_never_mutates_state() {
    let searcher = constrained_searcher(0);
    searcher
        .update("t1", &x_config(0.5), &report(&[("obj", 1.0), ("c", -0.2)]))
        .unwrap();
    let before = searcher.state().unwrap();

    for result in [
        report(&[]),
        report(&[("obj", 4.0)]),
        report(&[("other", 1.0)]),
        report(&[("obj", 4.0), (INTERNAL_CONSTRAINT_NAME, -1.0)]),
    ] {
        for trial_id in ["t1", "t9"] {
            let err = searcher
                .update(trial_id, &x_config(0.5), &result)
                .unwrap_err();
            assert!(matches!(err, Error::MissingMetric { .. }));
            assert_eq!(searcher.state().unwrap(), before);
        }
    }
}

#[test]
fn standard_searcher_requires_objective() {
    let searcher = GpSearcher::builder(unit_space(), "obj").build().unwrap();
    let err = searcher
        .update("t1", &x_config(0.5), &report(&[("c", 1.0)]))
        .unwrap_err();
    assert!(matches!(err, Error::MissingMetric { ref name, .. } if name == "obj"));
    assert!(searcher.trials().unwrap().is_empty());

    searcher
        .update("t1", &x_config(0.5), &report(&[("obj", 1.0), ("c", 1.0)]))
        .unwrap();
    let trials = searcher.trials().unwrap();
    assert_eq!(trials[0].metric("obj"), Some(1.0));
    assert_eq!(trials[0].metric(INTERNAL_CONSTRAINT_NAME), None);
}

#[test]
fn non_finite_values_are_rejected() {
    let searcher = constrained_searcher(0);
    for result in [
        report(&[("obj", f64::INFINITY), ("c", 0.0)]),
        report(&[("obj", 1.0), ("c", f64::NAN)]),
    ] {
        assert!(matches!(
            searcher.update("t1", &x_config(0.5), &result),
            Err(Error::NonFiniteMetric { .. })
        ));
    }
    assert!(searcher.state().unwrap().is_empty());
}

#[test]
fn config_must_stay_the_same_for_a_trial() {
    let searcher = constrained_searcher(0);
    searcher
        .update("t1", &x_config(0.5), &report(&[("obj", 1.0), ("c", -0.2)]))
        .unwrap();
    let before = searcher.state().unwrap();
    let err = searcher
        .update("t1", &x_config(0.6), &report(&[("obj", 2.0), ("c", -0.1)]))
        .unwrap_err();
    assert!(matches!(err, Error::InconsistentConfig(ref id) if id == "t1"));
    assert_eq!(searcher.state().unwrap(), before);
}

#[test]
fn invalid_config_is_rejected() {
    let searcher = constrained_searcher(0);
    let err = searcher
        .update("t1", &x_config(1.5), &report(&[("obj", 1.0), ("c", -0.2)]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));
    assert!(searcher.state().unwrap().is_empty());
}

#[test]
fn later_report_overwrites_same_metric() {
    let searcher = constrained_searcher(0);
    searcher
        .update("t1", &x_config(0.5), &report(&[("obj", 1.0), ("c", 0.3)]))
        .unwrap();
    searcher
        .update("t1", &x_config(0.5), &report(&[("obj", 0.5), ("c", -0.3)]))
        .unwrap();
    let trials = searcher.trials().unwrap();
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].metric("obj"), Some(0.5));
    assert_eq!(trials[0].metric(INTERNAL_CONSTRAINT_NAME), Some(-0.3));
}

#[test]
fn maximize_mode_stores_reported_values() {
    let searcher = GpSearcher::builder(unit_space(), "acc")
        .mode(Mode::Max)
        .build()
        .unwrap();
    searcher
        .update("t1", &x_config(0.5), &report(&[("acc", 0.9)]))
        .unwrap();
    assert_eq!(searcher.trials().unwrap()[0].metric("acc"), Some(0.9));
}

#[test]
fn records_keep_arrival_order() {
    let searcher = constrained_searcher(0);
    for (id, x) in [("b", 0.1), ("a", 0.2), ("c", 0.3)] {
        searcher
            .update(id, &x_config(x), &report(&[("obj", x), ("c", -x)]))
            .unwrap();
    }
    let ids: Vec<String> = searcher
        .trials()
        .unwrap()
        .into_iter()
        .map(|t| t.trial_id)
        .collect();
    assert_eq!(ids, ["b", "a", "c"]);
}

#[test]
fn pending_trials_clear_on_update() {
    let searcher = constrained_searcher(0);
    searcher.register_pending("t1", &x_config(0.4)).unwrap();
    assert_eq!(searcher.state().unwrap().pending(), ["t1".to_string()]);
    searcher
        .update("t1", &x_config(0.4), &report(&[("obj", 1.0), ("c", -0.2)]))
        .unwrap();
    assert!(searcher.state().unwrap().pending().is_empty());
}

#[test]
fn failed_and_skipped_trials_leave_the_training_set() {
    let searcher = constrained_searcher(0);
    for (i, x) in [0.1, 0.4, 0.7].into_iter().enumerate() {
        searcher
            .update(&format!("t{i}"), &x_config(x), &report(&[("obj", x), ("c", -x)]))
            .unwrap();
    }
    assert_eq!(searcher.num_observations().unwrap(), 3);

    searcher.evaluation_failed("t0").unwrap();
    assert_eq!(searcher.num_observations().unwrap(), 2);
    assert!(searcher.state().unwrap().failed_trials().contains("t0"));

    searcher.mark_skip_optimization("t1").unwrap();
    assert_eq!(searcher.num_observations().unwrap(), 1);
    assert!(searcher.state().unwrap().skip_optimization().contains("t1"));

    assert!(matches!(
        searcher.evaluation_failed("nope"),
        Err(Error::UnknownTrial(_))
    ));
    assert!(matches!(
        searcher.mark_skip_optimization("nope"),
        Err(Error::UnknownTrial(_))
    ));
}

#[test]
fn pending_trial_can_fail() {
    let searcher = constrained_searcher(0);
    searcher.register_pending("t1", &x_config(0.4)).unwrap();
    searcher.evaluation_failed("t1").unwrap();
    let state = searcher.state().unwrap();
    assert!(state.pending().is_empty());
    assert!(state.failed_trials().contains("t1"));
}
