//! Sequential runner tests.
//!
//! Tests for payload threading, short-circuiting and the step records.

use serde_json::{json, Value};

use crate::{suite, Run, RunResult, Session, StepStatus};

use super::common::{Echo, Emit, Fail};

/// Every step succeeds: the run completes with the last payload.
#[tokio::test]
async fn sequence_completes() {
    let steps = suite![
        Emit::new("first", json!("hello")),
        Emit::new("second", json!({"n": 2})),
        Echo::default(),
    ];

    match Run::new(steps, Session::new()).start().await {
        RunResult::Completed(run, output) => {
            assert_eq!(output, json!({"n": 2}));

            let records = run.state().records();
            assert_eq!(records.len(), 3);
            assert_eq!(records[0].name, "first");
            assert_eq!(records[0].summary.as_deref(), Some("✔ Ok: hello"));
            assert_eq!(records[1].summary.as_deref(), Some(r#"✔ Ok: {"n":2}"#));
            assert_eq!(records[2].name, "echo");
            assert!(records
                .iter()
                .all(|r| r.status == Some(StepStatus::Passed) && r.duration_ms().is_some()));
            assert_eq!(run.state().skipped_count(), 0);
        }
        RunResult::Failed(_, failure) => panic!("Expected Completed, got {failure}"),
    }
}

/// Each step receives exactly the previous step's payload.
#[tokio::test]
async fn payload_threads_through_steps() {
    let echo = Echo::default();
    let seen = echo.seen.clone();

    let steps = suite![Emit::new("emit", json!([1, 2, 3])), echo];
    let result = Run::new(steps, Session::new()).start().await;

    assert!(result.is_completed());
    assert_eq!(*seen.lock(), vec![json!([1, 2, 3])]);
}

/// The default initial payload is `null`; `start_with` overrides it.
#[tokio::test]
async fn initial_payload() {
    let echo = Echo::default();
    let seen = echo.seen.clone();
    let result = Run::new(suite![echo], Session::new()).start().await;
    assert!(result.is_completed());
    assert_eq!(*seen.lock(), vec![Value::Null]);

    let echo = Echo::default();
    let seen = echo.seen.clone();
    let result = Run::new(suite![echo], Session::new())
        .start_with(json!(5))
        .await;
    assert!(result.is_completed());
    assert_eq!(*seen.lock(), vec![json!(5)]);
}

/// The first failure wins: no later step executes.
///
/// Verifies:
/// - Steps before the failure ran once
/// - The failing step ran once
/// - Steps after the failure never ran and are counted as skipped
/// - The failure propagates unchanged
#[tokio::test]
async fn first_failure_stops_run() {
    let before = Emit::new("before", json!("ok"));
    let fail = Fail::new();
    let after_a = Emit::new("after_a", json!("unreachable"));
    let after_b = Emit::new("after_b", json!("unreachable"));

    let (before_calls, fail_calls) = (before.calls.clone(), fail.calls.clone());
    let (a_calls, b_calls) = (after_a.calls.clone(), after_b.calls.clone());

    let steps = suite![before, fail, after_a, after_b];

    match Run::new(steps, Session::new()).start().await {
        RunResult::Failed(run, failure) => {
            assert_eq!(failure, crate::Failure::Predicate("boom".into()));

            let records = run.state().records();
            assert_eq!(records.len(), 2);
            assert_eq!(records[1].status, Some(StepStatus::Failed));
            assert_eq!(records[1].summary.as_deref(), Some("✘ Err: boom"));
            assert_eq!(run.state().executed_count(), 2);
            assert_eq!(run.state().skipped_count(), 2);
        }
        RunResult::Completed(..) => panic!("Expected Failed"),
    }

    assert_eq!(before_calls.count(), 1);
    assert_eq!(fail_calls.count(), 1);
    assert_eq!(a_calls.count(), 0);
    assert_eq!(b_calls.count(), 0);
}

/// A failing first step skips the whole rest of the list.
#[tokio::test]
async fn failure_in_first_step() {
    let last = Emit::new("last", json!(null));
    let last_calls = last.calls.clone();

    let result = Run::new(suite![Fail::new(), last], Session::new())
        .start()
        .await;

    assert!(result.is_failed());
    assert_eq!(result.state().records().len(), 1);
    assert_eq!(result.state().skipped_count(), 1);
    assert_eq!(last_calls.count(), 0);
}

/// Step names are listed in order without running anything.
#[test]
fn step_names_in_order() {
    let run = Run::new(
        suite![Emit::new("a", json!(1)), Fail::new(), Echo::default()],
        Session::new(),
    );
    assert_eq!(run.step_names(), vec!["a", "fail", "echo"]);
    assert_eq!(run.state().executed_count(), 0);
    assert!(run.state().started_at().is_none());
}

/// The session is handed back after the run.
#[tokio::test]
async fn session_survives_run() {
    let steps = suite![
        crate::steps::jsonrpc_request("a", json!([])),
        crate::steps::jsonrpc_request("b", json!([])),
    ];

    match Run::new(steps, Session::new()).start().await {
        RunResult::Completed(run, _) => {
            assert!(run.state().started_at().is_some());
            let session = run.into_session();
            assert_eq!(session.last_id(), 2);
        }
        RunResult::Failed(_, failure) => panic!("Expected Completed, got {failure}"),
    }
}

/// Step records serialize for the JSON run report.
#[tokio::test]
async fn records_serialize() {
    let result = Run::new(suite![Emit::new("only", json!("x"))], Session::new())
        .start()
        .await;

    let json = serde_json::to_string(result.state()).expect("should serialize");
    assert!(json.contains("\"only\""));
    assert!(json.contains("Passed"));
}
