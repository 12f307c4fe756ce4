use gp_searcher::space::{Configuration, HyperparameterRanges, ParamValue, SearchSpace};
use gp_searcher::state::{INTERNAL_CONSTRAINT_NAME, decode_state};
use gp_searcher::{Error, GpSearcher, LifecycleState, SNAPSHOT_VERSION};

use crate::{constrained_searcher, drive, report, unit_space, x_config};

#[test]
fn original_is_retired_after_clone() {
    let original = constrained_searcher(1);
    drive(&original, 0, 2);
    let snapshot = original.get_state().unwrap();
    let clone = original.clone_from_state(&snapshot).unwrap();

    assert_eq!(original.lifecycle(), LifecycleState::Retired);
    assert!(matches!(original.suggest(), Err(Error::Retired)));
    assert!(matches!(
        original.update("t9", &x_config(0.1), &report(&[("obj", 1.0), ("c", 0.0)])),
        Err(Error::Retired)
    ));
    assert!(matches!(
        original.update_partial("t9", &x_config(0.1), &report(&[("obj", 1.0)])),
        Err(Error::Retired)
    ));
    assert!(matches!(
        original.register_pending("t9", &x_config(0.1)),
        Err(Error::Retired)
    ));
    assert!(matches!(original.evaluation_failed("t0"), Err(Error::Retired)));
    assert!(matches!(original.trials(), Err(Error::Retired)));
    assert!(matches!(original.get_state(), Err(Error::Retired)));

    assert_eq!(clone.lifecycle(), LifecycleState::Active);
    assert_eq!(clone.constraint_attr(), Some("c"));
    assert_eq!(clone.trials().unwrap().len(), 2);
}

#[test]
fn clone_continues_like_an_untouched_twin() {
    let original = constrained_searcher(17);
    let twin = constrained_searcher(17);
    drive(&original, 0, 6);
    drive(&twin, 0, 6);

    let clone = original
        .clone_from_state(&original.get_state().unwrap())
        .unwrap();
    assert_eq!(clone.trials().unwrap(), twin.trials().unwrap());

    for _ in 0..3 {
        assert_eq!(clone.suggest().unwrap(), twin.suggest().unwrap());
    }
}

#[test]
fn clone_keeps_going_after_hand_off() {
    let original = constrained_searcher(4);
    let twin = constrained_searcher(4);
    drive(&original, 0, 4);
    drive(&twin, 0, 4);

    let clone = original
        .clone_from_state(&original.get_state().unwrap())
        .unwrap();
    drive(&clone, 4, 3);
    drive(&twin, 4, 3);
    assert_eq!(clone.trials().unwrap(), twin.trials().unwrap());
    assert_eq!(clone.num_suggestions().unwrap(), 7);
}

#[test]
fn clone_preserves_skip_flags_and_failures() {
    let original = constrained_searcher(2);
    drive(&original, 0, 4);
    original.mark_skip_optimization("t1").unwrap();
    original.evaluation_failed("t2").unwrap();
    original.register_pending("t9", &x_config(0.25)).unwrap();

    let snapshot = original.get_state().unwrap();
    assert!(snapshot.skip_optimization.contains("t1"));
    let clone = original.clone_from_state(&snapshot).unwrap();

    let state = clone.state().unwrap();
    assert!(state.skip_optimization().contains("t1"));
    assert!(state.failed_trials().contains("t2"));
    assert_eq!(state.pending(), ["t9".to_string()]);
    assert_eq!(clone.num_observations().unwrap(), 2);
}

#[test]
fn clone_resumes_points_to_evaluate() {
    let points = vec![x_config(0.1), x_config(0.2), x_config(0.3)];
    let original = GpSearcher::builder(unit_space(), "obj")
        .constrained("c")
        .points_to_evaluate(points)
        .random_seed(0)
        .build()
        .unwrap();
    assert_eq!(original.suggest().unwrap(), x_config(0.1));

    let snapshot = original.get_state().unwrap();
    assert_eq!(snapshot.remaining_points.len(), 2);
    let clone = original.clone_from_state(&snapshot).unwrap();
    assert_eq!(clone.suggest().unwrap(), x_config(0.2));
    assert_eq!(clone.suggest().unwrap(), x_config(0.3));
}

#[test]
fn encoded_state_round_trips() {
    let searcher = constrained_searcher(6);
    drive(&searcher, 0, 5);
    searcher.evaluation_failed("t3").unwrap();
    let state = searcher.state().unwrap();

    let ranges = HyperparameterRanges::new(&unit_space()).unwrap();
    let decoded = decode_state(&state.encode().unwrap(), &ranges).unwrap();
    assert_eq!(decoded.records(), state.records());
    assert_eq!(decoded.failed_trials(), state.failed_trials());
    for record in state.records() {
        assert_eq!(decoded.config(&record.trial_id), state.config(&record.trial_id));
        assert!(record.metric(INTERNAL_CONSTRAINT_NAME).is_some());
    }
}

#[test]
fn mismatched_snapshot_leaves_original_active() {
    let other = GpSearcher::builder(SearchSpace::new().float("y", 0.0, 1.0), "obj")
        .constrained("c")
        .build()
        .unwrap();
    let y_config = Configuration::from([("y".to_string(), ParamValue::Float(0.5))]);
    other
        .update("t0", &y_config, &report(&[("obj", 1.0), ("c", 0.0)]))
        .unwrap();
    let foreign = other.get_state().unwrap();

    let searcher = constrained_searcher(0);
    assert!(searcher.clone_from_state(&foreign).is_err());
    assert!(!searcher.is_retired());

    let mut bad_version = searcher.get_state().unwrap();
    bad_version.version = SNAPSHOT_VERSION + 1;
    assert!(matches!(
        searcher.clone_from_state(&bad_version),
        Err(Error::Decode(_))
    ));

    let mut unknown_skip = searcher.get_state().unwrap();
    unknown_skip.skip_optimization.insert("ghost".into());
    assert!(matches!(
        searcher.clone_from_state(&unknown_skip),
        Err(Error::UnknownTrial(_))
    ));
    assert!(searcher.suggest().is_ok());
}
