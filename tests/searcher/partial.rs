use gp_searcher::state::INTERNAL_CONSTRAINT_NAME;

use crate::{constrained_searcher, report, x_config};

#[test]
fn objective_then_constraint_merges() {
    let searcher = constrained_searcher(0);
    searcher
        .update_partial("t1", &x_config(0.3), &report(&[("obj", 3.0)]))
        .unwrap();
    assert_eq!(searcher.num_observations().unwrap(), 1);

    searcher
        .update("t1", &x_config(0.3), &report(&[("c", 0.1)]))
        .unwrap();

    let trials = searcher.trials().unwrap();
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].metric("obj"), Some(3.0));
    assert_eq!(trials[0].metric(INTERNAL_CONSTRAINT_NAME), Some(0.1));
}

#[test]
fn constraint_then_objective_merges() {
    let searcher = constrained_searcher(0);
    searcher
        .update("t1", &x_config(0.3), &report(&[("c", 0.1)]))
        .unwrap();
    assert_eq!(searcher.num_observations().unwrap(), 0);

    searcher
        .update_partial("t1", &x_config(0.3), &report(&[("obj", 3.0)]))
        .unwrap();

    let trials = searcher.trials().unwrap();
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].metric("obj"), Some(3.0));
    assert_eq!(trials[0].metric(INTERNAL_CONSTRAINT_NAME), Some(0.1));
    assert_eq!(searcher.num_observations().unwrap(), 1);
}

#[test]
fn both_orders_give_the_same_record() {
    let first = constrained_searcher(0);
    first
        .update_partial("t1", &x_config(0.3), &report(&[("obj", 3.0)]))
        .unwrap();
    first
        .update_partial("t1", &x_config(0.3), &report(&[("c", 0.1)]))
        .unwrap();

    let second = constrained_searcher(0);
    second
        .update_partial("t1", &x_config(0.3), &report(&[("c", 0.1)]))
        .unwrap();
    second
        .update_partial("t1", &x_config(0.3), &report(&[("obj", 3.0)]))
        .unwrap();

    assert_eq!(first.trials().unwrap(), second.trials().unwrap());
}

#[test]
fn unrelated_metrics_are_ignored() {
    let searcher = constrained_searcher(0);
    searcher
        .update_partial("t1", &x_config(0.3), &report(&[("epoch", 1.0)]))
        .unwrap();
    assert!(searcher.state().unwrap().is_empty());
}

#[test]
fn partial_reports_feed_suggestions() {
    let searcher = constrained_searcher(9);
    for (i, x) in [0.1, 0.3, 0.5, 0.7, 0.9].into_iter().enumerate() {
        let id = format!("t{i}");
        searcher
            .update(&id, &x_config(x), &report(&[("c", x - 0.6)]))
            .unwrap();
        searcher
            .update_partial(&id, &x_config(x), &report(&[("obj", (x - 0.8).powi(2))]))
            .unwrap();
    }
    assert_eq!(searcher.num_observations().unwrap(), 5);
    assert!(searcher.suggest().is_ok());
}
