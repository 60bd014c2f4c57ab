use super::*;

fn limiter(per_identity: usize, global: usize) -> InMemoryTrialLimiter {
    InMemoryTrialLimiter::with_config(RateLimitConfig {
        per_identity_limit: per_identity,
        per_identity_window: Duration::from_secs(86_400),
        global_limit: global,
        global_window: Duration::from_secs(60),
    })
}

#[test]
fn per_identity_allows_up_to_limit() {
    let rl = limiter(3, 100);
    let now = Instant::now();

    for i in 0..3 {
        assert!(rl.check_and_record_at("visitor-1", now).is_ok(), "trial {i} should succeed");
    }
    assert_eq!(
        rl.check_and_record_at("visitor-1", now),
        Err(RateLimitError::TrialExhausted { limit: 3, window_secs: 86_400 })
    );
}

#[test]
fn global_allows_up_to_limit() {
    let rl = limiter(3, 5);
    let now = Instant::now();

    for i in 0..5 {
        assert!(rl.check_and_record_at(&format!("visitor-{i}"), now).is_ok());
    }
    assert!(matches!(rl.check_and_record_at("visitor-new", now), Err(RateLimitError::GlobalExceeded { .. })));
}

#[test]
fn rejected_request_is_not_recorded() {
    let rl = limiter(3, 1);
    let now = Instant::now();
    rl.check_and_record_at("a", now).unwrap();
    assert!(rl.check_and_record_at("b", now).is_err());
    assert_eq!(rl.remaining_at("b", now), 3);
}

#[test]
fn window_expiry_allows_new_trials() {
    let rl = limiter(3, 100);
    let start = Instant::now();

    for _ in 0..3 {
        rl.check_and_record_at("visitor", start).unwrap();
    }
    assert!(rl.check_and_record_at("visitor", start).is_err());

    let after_window = start + Duration::from_secs(86_400) + Duration::from_millis(1);
    assert!(rl.check_and_record_at("visitor", after_window).is_ok());
}

#[test]
fn distinct_identities_do_not_interfere() {
    let rl = limiter(3, 100);
    let now = Instant::now();

    for _ in 0..3 {
        rl.check_and_record_at("a", now).unwrap();
    }
    assert!(rl.check_and_record_at("a", now).is_err());
    assert!(rl.check_and_record_at("b", now).is_ok());
}

#[test]
fn remaining_counts_down() {
    let rl = limiter(3, 100);
    let now = Instant::now();
    assert_eq!(rl.remaining_at("x", now), 3);
    rl.check_and_record_at("x", now).unwrap();
    assert_eq!(rl.remaining_at("x", now), 2);
}

#[test]
fn reset_restores_full_allowance() {
    let rl = limiter(1, 100);
    rl.check_and_record("x").unwrap();
    assert!(rl.check_and_record("x").is_err());
    rl.reset("x");
    assert_eq!(rl.remaining("x"), 1);
    assert!(rl.check_and_record("x").is_ok());
}

#[test]
fn empty_identity_rejected() {
    let rl = limiter(3, 100);
    assert_eq!(rl.check_and_record("  "), Err(RateLimitError::MissingIdentity));
}

#[test]
fn error_codes() {
    assert_eq!(RateLimitError::TrialExhausted { limit: 3, window_secs: 1 }.error_code(), "E_TRIAL_EXHAUSTED");
    assert!(RateLimitError::GlobalExceeded { limit: 1, window_secs: 1 }.retryable());
    assert!(!RateLimitError::TrialExhausted { limit: 3, window_secs: 1 }.retryable());
}

#[test]
fn identities_with_expired_windows_are_forgotten() {
    let rl = limiter(3, 100);
    let start = Instant::now();
    rl.check_and_record_at("a", start).unwrap();
    rl.check_and_record_at("b", start).unwrap();

    let later = start + Duration::from_secs(86_400) + Duration::from_millis(1);
    assert_eq!(rl.remaining_at("a", later), 3);
    rl.check_and_record_at("b", later).unwrap();

    let inner = rl.inner.lock().unwrap();
    assert!(!inner.identity_requests.contains_key("a"));
    assert_eq!(inner.identity_requests["b"].len(), 1);
}
