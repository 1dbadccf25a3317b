//! Timeouts, cancellation and traversal limits.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskweave::orchestration::{Engine, EngineConfig};
use taskweave::Error;

use crate::fixtures::{engine, engine_with, payload, root_task, ScriptedOracle};

#[tokio::test]
async fn test_slow_oracle_times_out() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .answer("root", "4")
            .delay("root", Duration::from_millis(500)),
    );
    let config = EngineConfig {
        oracle_timeout: Some(Duration::from_millis(20)),
        ..Default::default()
    };

    let err = engine_with(&oracle, config)
        .resolve(root_task("root", "2+2=?"))
        .await
        .unwrap_err();

    match err {
        Error::OracleTimeout { task, after } => {
            assert_eq!(task, "root");
            assert_eq!(after, Duration::from_millis(20));
        }
        other => panic!("Expected OracleTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_applies_to_nested_tasks() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", payload(&["slow", "END"], &[("slow", "END")]))
            .answer("slow", 1)
            .delay("slow", Duration::from_millis(500)),
    );
    let config = EngineConfig {
        oracle_timeout: Some(Duration::from_millis(20)),
        ..Default::default()
    };

    let err = engine_with(&oracle, config)
        .resolve(root_task("root", "x"))
        .await
        .unwrap_err();
    assert_eq!(err.task(), Some("slow"));
}

#[tokio::test]
async fn test_no_timeout_waits() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .answer("root", "4")
            .delay("root", Duration::from_millis(50)),
    );
    let config = EngineConfig {
        oracle_timeout: None,
        ..Default::default()
    };
    let resolution = engine_with(&oracle, config)
        .resolve(root_task("root", "2+2=?"))
        .await
        .unwrap();
    assert!(resolution.node.is_resolved());
}

/// Test: Cancellation
/// Given an oracle call that takes seconds
/// When the run's token is cancelled
/// Then the run stops promptly with `Cancelled`
#[tokio::test]
async fn test_cancellation_stops_run() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .answer("root", "4")
            .delay("root", Duration::from_secs(5)),
    );
    let token = CancellationToken::new();
    let engine = Engine::new(oracle.clone()).with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = engine.resolve(root_task("root", "2+2=?")).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(engine.cancellation_token().is_cancelled());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let oracle = Arc::new(ScriptedOracle::new().answer("root", "4"));
    let token = CancellationToken::new();
    token.cancel();

    let err = engine(&oracle)
        .with_cancellation(token)
        .resolve(root_task("root", "2+2=?"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

/// Test: Depth limit
/// Given a limit of one graph level
/// When a subtask decomposes again
/// Then the run fails naming that subtask
#[tokio::test]
async fn test_depth_limit() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", payload(&["sub", "END"], &[("sub", "END")]))
            .decompose("sub", payload(&["leaf", "END"], &[("leaf", "END")]))
            .answer("leaf", 1),
    );
    let config = EngineConfig {
        max_depth: Some(1),
        ..Default::default()
    };

    let err = engine_with(&oracle, config)
        .resolve(root_task("root", "x"))
        .await
        .unwrap_err();

    match err {
        Error::DepthLimitExceeded { task, limit } => {
            assert_eq!(task, "sub");
            assert_eq!(limit, 1);
        }
        other => panic!("Expected DepthLimitExceeded, got {:?}", other),
    }
    assert_eq!(oracle.calls_for("leaf"), 0);
}

#[tokio::test]
async fn test_depth_within_limit() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", payload(&["sub", "END"], &[("sub", "END")]))
            .decompose("sub", payload(&["leaf", "END"], &[("leaf", "END")]))
            .answer("leaf", 1),
    );
    let config = EngineConfig {
        max_depth: Some(2),
        ..Default::default()
    };
    let resolution = engine_with(&oracle, config)
        .resolve(root_task("root", "x"))
        .await
        .unwrap();
    assert_eq!(resolution.stats.graphs_built, 2);
}

/// Test: Visit limit
/// Given an unconditional cycle between `a` and `b`
/// When the traversal keeps looping through cached results
/// Then it stops at the visit limit
#[tokio::test]
async fn test_visit_limit_stops_unconditional_cycle() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose(
                "root",
                payload(&["a", "b", "END"], &[("a", "b"), ("b", "a")]),
            )
            .answer("a", 1)
            .answer("b", 2),
    );
    let config = EngineConfig {
        max_visits: Some(10),
        ..Default::default()
    };

    let err = engine_with(&oracle, config)
        .resolve(root_task("root", "x"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::VisitLimitExceeded { limit: 10 }));
    assert_eq!(oracle.calls_for("a"), 1);
    assert_eq!(oracle.calls_for("b"), 1);
}

/// Test: Cancelling a cached loop
/// Given `b` fans out to both `a` and `END`, so `a` and `b` repeat from the cache
/// When the run's token is cancelled
/// Then the run stops although no oracle call is pending
#[tokio::test]
async fn test_cancellation_stops_cached_cycle() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose(
                "root",
                payload(&["a", "b", "END"], &[("a", "b"), ("b", "a"), ("b", "END")]),
            )
            .answer("a", 1)
            .answer("b", 2),
    );
    let token = CancellationToken::new();
    let engine = Engine::new(oracle.clone()).with_cancellation(token.clone());
    let root = root_task("root", "x");
    let ledger = root.ledger().clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(2), engine.resolve(root)).await;

    match result {
        Ok(Err(Error::Cancelled)) => {}
        Ok(other) => panic!("Expected Cancelled, got {:?}", other.map(|r| r.stats)),
        Err(_) => panic!("run kept looping after cancellation"),
    }
    assert_eq!(oracle.calls_for("a"), 1);
    assert_eq!(oracle.calls_for("b"), 1);
    assert!(ledger.len() > 4, "the loop ran from the cache before cancelling");
}
