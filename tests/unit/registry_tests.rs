//! Unit tests for request correlation and timeout handling.

use std::time::Duration;

use serde_json::json;

use acp_client::acp::registry::RequestRegistry;
use acp_client::AppError;

#[tokio::test]
async fn ids_start_at_one_and_increase() {
    let registry = RequestRegistry::new();
    let first = registry.register("initialize", None);
    let second = registry.register("session/new", None);

    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 2);
    assert_eq!(registry.pending_count(), 2);
}

#[tokio::test]
async fn settle_delivers_once() {
    let registry = RequestRegistry::new();
    let pending = registry.register("session/new", None);
    let id = pending.id();

    assert!(registry.settle(id, Ok(json!({ "sessionId": "s1" }))));
    assert!(!registry.settle(id, Ok(json!({ "sessionId": "late" }))));
    assert!(!registry.is_pending(id));

    let value = pending.wait().await.expect("settled with success");
    assert_eq!(value["sessionId"], "s1");
}

#[tokio::test]
async fn unknown_ids_are_ignored() {
    let registry = RequestRegistry::new();
    assert!(!registry.settle(99, Ok(json!(null))));
}

#[tokio::test]
async fn timeout_settles_with_timeout_error() {
    let registry = RequestRegistry::new();
    let pending = registry.register("session/set_mode", Some(Duration::from_millis(50)));
    let id = pending.id();

    let err = pending.wait().await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(ref msg) if msg.contains("session/set_mode")));
    assert!(!registry.is_pending(id));
    assert!(!registry.settle(id, Ok(json!(null))), "late response is discarded");
}

#[tokio::test]
async fn requests_without_timeout_never_expire() {
    let registry = RequestRegistry::new();
    let pending = registry.register("session/prompt", None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(registry.is_pending(pending.id()));
    assert_eq!(registry.remaining(pending.id()), None);
}

#[tokio::test]
async fn paused_request_keeps_its_remaining_time() {
    let registry = RequestRegistry::new();
    let pending = registry.register("session/new", Some(Duration::from_millis(150)));
    let id = pending.id();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(registry.pause_timeout(id));
    assert!(registry.is_paused(id));
    let frozen = registry.remaining(id).expect("has a budget");
    assert!(frozen < Duration::from_millis(150));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(registry.is_pending(id), "paused request does not expire");
    assert_eq!(registry.remaining(id), Some(frozen));

    assert!(registry.resume_timeout(id));
    assert!(!registry.is_paused(id));
    let err = tokio::time::timeout(Duration::from_secs(2), pending.wait())
        .await
        .expect("expires after resuming")
        .unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)));
}

#[tokio::test]
async fn pause_and_resume_are_idempotent() {
    let registry = RequestRegistry::new();
    let pending = registry.register("session/new", Some(Duration::from_secs(30)));
    let id = pending.id();

    assert!(registry.pause_timeout(id));
    assert!(registry.pause_timeout(id));
    assert!(registry.is_paused(id));
    assert!(registry.resume_timeout(id));
    assert!(registry.resume_timeout(id));
    assert!(!registry.is_paused(id));

    assert!(!registry.pause_timeout(1234));
}

#[tokio::test]
async fn hold_pauses_everything_until_dropped() {
    let registry = RequestRegistry::new();
    let before = registry.register("a", Some(Duration::from_millis(80)));

    let outer = registry.hold();
    let inner = registry.hold();
    let during = registry.register("b", Some(Duration::from_millis(80)));
    assert!(registry.is_paused(before.id()));
    assert!(registry.is_paused(during.id()), "registered during a hold starts paused");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(registry.pending_count(), 2);

    drop(inner);
    assert!(registry.is_paused(before.id()), "holds nest");
    drop(outer);
    assert!(!registry.is_paused(before.id()));

    let (a, b) = tokio::join!(before.wait(), during.wait());
    assert!(matches!(a, Err(AppError::Timeout(_))));
    assert!(matches!(b, Err(AppError::Timeout(_))));
}

/// A hold reports the current nesting depth when debug-printed.
#[tokio::test]
async fn hold_debug_shows_depth() {
    let registry = RequestRegistry::new();
    let outer = registry.hold();
    let inner = registry.hold();

    assert_eq!(format!("{inner:?}"), "TimeoutHold { depth: 2 }");
    drop(inner);
    assert_eq!(format!("{outer:?}"), "TimeoutHold { depth: 1 }");
}

#[tokio::test]
async fn individual_pause_survives_hold_release() {
    let registry = RequestRegistry::new();
    let pending = registry.register("x", Some(Duration::from_millis(50)));
    let id = pending.id();

    registry.pause_timeout(id);
    drop(registry.hold());
    assert!(registry.is_paused(id));
}

#[tokio::test]
async fn fail_all_settles_every_request() {
    let registry = RequestRegistry::new();
    let a = registry.register("a", None);
    let b = registry.register("b", Some(Duration::from_secs(30)));

    registry.fail_all(&AppError::ConnectionClosed("agent exited".into()));
    assert_eq!(registry.pending_count(), 0);

    for pending in [a, b] {
        let err = pending.wait().await.unwrap_err();
        assert_eq!(err, AppError::ConnectionClosed("agent exited".into()));
    }
}
