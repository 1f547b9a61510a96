use moris::cache::{Cached, DofCached, EvalState};
use moris::dof::DofType;

#[test]
fn cached_value_state_transitions() {
    let mut cached = Cached::default();
    assert_eq!(cached.state(), EvalState::Stale);

    assert_eq!(*cached.set(3), 3);
    assert!(!cached.is_stale());
    assert_eq!(*cached.value(), 3);

    cached.invalidate();
    assert!(cached.is_stale());
    // The previous value stays readable until it is replaced
    assert_eq!(*cached.value(), 3);
}

#[test]
#[should_panic(expected = "before it was evaluated")]
fn cached_value_read_before_evaluation_panics() {
    let cached: Cached<f64> = Cached::default();
    cached.value();
}

#[test]
fn dof_cached_values_are_independent_per_key() {
    let mut cached = DofCached::default();
    cached.set(DofType::UX, 1.0);
    assert_eq!(cached.state(&DofType::UX), EvalState::Clean);
    assert_eq!(cached.state(&DofType::TEMP), EvalState::Stale);

    cached.set(DofType::UX, 2.0);
    assert_eq!(*cached.value(&DofType::UX), 2.0);

    cached.invalidate();
    assert!(cached.is_stale(&DofType::UX));
}
