use gp_searcher::space::SearchSpace;
use gp_searcher::state::INTERNAL_CONSTRAINT_NAME;
use gp_searcher::{Error, GpSearcher, LifecycleState, SearchOptions, SearcherKind};

use crate::unit_space;

#[test]
fn constrained_without_constraint_attr_fails() {
    let err = GpSearcher::constrained(unit_space(), "obj", Vec::new(), SearchOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let err = GpSearcher::builder(unit_space(), "obj")
        .kind(SearcherKind::Constrained)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn constrained_with_constraint_attr_succeeds() {
    let options = SearchOptions {
        constraint_attr: Some("c".into()),
        ..SearchOptions::default()
    };
    let searcher = GpSearcher::constrained(unit_space(), "obj", Vec::new(), options).unwrap();
    assert_eq!(searcher.kind(), SearcherKind::Constrained);
    assert_eq!(searcher.metric(), "obj");
    assert_eq!(searcher.constraint_attr(), Some("c"));
    assert_eq!(searcher.lifecycle(), LifecycleState::Active);
}

#[test]
fn standard_searcher_ignores_constraint_attr() {
    let options = SearchOptions {
        constraint_attr: Some("c".into()),
        ..SearchOptions::default()
    };
    let searcher = GpSearcher::new(unit_space(), "obj", Vec::new(), options).unwrap();
    assert_eq!(searcher.kind(), SearcherKind::Standard);
    assert_eq!(searcher.constraint_attr(), None);
}

#[test]
fn reserved_and_colliding_names_are_rejected() {
    assert!(matches!(
        GpSearcher::builder(unit_space(), INTERNAL_CONSTRAINT_NAME).build(),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        GpSearcher::builder(unit_space(), "obj").constrained("obj").build(),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        GpSearcher::builder(unit_space(), "").build(),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn invalid_search_space_is_rejected() {
    assert!(matches!(
        GpSearcher::builder(SearchSpace::new(), "obj").build(),
        Err(Error::EmptySearchSpace)
    ));
    assert!(matches!(
        GpSearcher::builder(SearchSpace::new().float("x", 2.0, 1.0), "obj").build(),
        Err(Error::InvalidBounds { .. })
    ));
    assert!(matches!(
        GpSearcher::builder(SearchSpace::new().log_float("x", 0.0, 1.0), "obj").build(),
        Err(Error::InvalidLogBounds(_))
    ));
}

#[test]
fn options_deserialize_into_a_working_searcher() {
    let options: SearchOptions = serde_json::from_value(serde_json::json!({
        "constraint_attr": "c",
        "mode": "max",
        "random_seed": 11,
        "num_init_random": 2,
    }))
    .unwrap();
    let searcher = GpSearcher::constrained(unit_space(), "acc", Vec::new(), options).unwrap();
    assert!(searcher.suggest().is_ok());
}

#[test]
fn searcher_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<GpSearcher>();
}
