//! Foundation crate tests
//!
//! Tests cover:
//! - Clock abstraction (RealClock, TestClock, SharedClock)
//! - Error types (AppError, AudioError, SessionError)
//! - Session state machine transitions

use std::time::{Duration, Instant};
use verba_foundation::clock::{real_clock, test_clock, Clock, RealClock, TestClock};
use verba_foundation::error::{AppError, AudioError, SessionError};
use verba_foundation::state::{SessionState, StateManager};

// ─── Clock Tests ────────────────────────────────────────────────────

#[test]
fn real_clock_now_returns_current_time() {
    let clock = RealClock::new();
    let before = Instant::now();
    let clock_time = clock.now();
    let after = Instant::now();
    assert!(clock_time >= before);
    assert!(clock_time <= after);
}

#[test]
fn real_clock_factory_function() {
    let clock = real_clock();
    let t = clock.now();
    assert!(t.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_clock_advance() {
    let clock = TestClock::new();
    let t0 = clock.now();
    clock.advance(Duration::from_secs(5));
    let t1 = clock.now();
    assert_eq!(t1.duration_since(t0), Duration::from_secs(5));
}

#[test]
fn test_clock_advance_accumulates() {
    let clock = TestClock::new();
    let start = clock.now();
    clock.advance(Duration::from_millis(100));
    clock.advance(Duration::from_millis(200));
    clock.advance(Duration::from_millis(300));
    assert_eq!(
        clock.now().duration_since(start),
        Duration::from_millis(600)
    );
}

#[test]
fn test_clock_sleep_advances_time() {
    let clock = test_clock();
    let t0 = clock.now();
    clock.sleep(Duration::from_secs(10));
    assert_eq!(clock.now().duration_since(t0), Duration::from_secs(10));
}

#[test]
fn test_clock_set_time() {
    let clock = TestClock::new();
    let target = Instant::now() + Duration::from_secs(1000);
    clock.set_time(target);
    assert_eq!(clock.now(), target);
}

// ─── Error Type Tests ───────────────────────────────────────────────

#[test]
fn audio_error_device_not_found() {
    let err = AudioError::DeviceNotFound {
        name: Some("test_mic".to_string()),
    };
    let msg = format!("{}", err);
    assert!(msg.contains("test_mic"));
}

#[test]
fn audio_error_buffer_overflow() {
    let err = AudioError::BufferOverflow { count: 512 };
    let msg = format!("{}", err);
    assert!(msg.contains("512"));
}

#[test]
fn audio_error_format_not_supported() {
    let err = AudioError::FormatNotSupported {
        format: "f64".to_string(),
    };
    let msg = format!("{}", err);
    assert!(msg.contains("f64"));
}

#[test]
fn session_error_connect_carries_detail() {
    let err = SessionError::Connect("dns failure".to_string());
    let msg = format!("{}", err);
    assert!(msg.contains("dns failure"));
}

#[test]
fn app_error_wraps_audio_error() {
    let err: AppError = AudioError::DeviceDisconnected.into();
    assert!(matches!(err, AppError::Audio(_)));
}

#[test]
fn app_error_wraps_session_error() {
    let err: AppError = SessionError::RemoteClosed("going away".to_string()).into();
    let msg = format!("{}", err);
    assert!(msg.contains("going away"));
}

// ─── State Machine Tests ────────────────────────────────────────────

#[test]
fn full_turn_cycle_transitions() {
    let sm = StateManager::new();
    sm.transition(SessionState::Connecting).unwrap();
    sm.transition(SessionState::Listening).unwrap();
    sm.transition(SessionState::Speaking).unwrap();
    sm.transition(SessionState::Listening).unwrap();
    assert_eq!(sm.current(), SessionState::Listening);
}

#[test]
fn closed_reachable_from_every_live_state() {
    for path in [
        vec![],
        vec![SessionState::Connecting],
        vec![SessionState::Connecting, SessionState::Listening],
        vec![
            SessionState::Connecting,
            SessionState::Listening,
            SessionState::Speaking,
        ],
    ] {
        let sm = StateManager::new();
        for s in path {
            sm.transition(s).unwrap();
        }
        sm.transition(SessionState::Closed).unwrap();
        assert_eq!(sm.current(), SessionState::Closed);
    }
}

#[test]
fn speaking_requires_listening_first() {
    let sm = StateManager::new();
    sm.transition(SessionState::Connecting).unwrap();
    assert!(sm.transition(SessionState::Speaking).is_err());
}

#[test]
fn invalid_transition_leaves_state_unchanged() {
    let sm = StateManager::new();
    sm.transition(SessionState::Connecting).unwrap();
    let err = sm.transition(SessionState::Idle).unwrap_err();
    assert!(matches!(err, AppError::Fatal(_)));
    assert_eq!(sm.current(), SessionState::Connecting);
}
