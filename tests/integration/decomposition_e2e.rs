//! End-to-end decomposition tests.
//!
//! These tests verify that decomposed tasks build their graphs, walk them
//! with fan-out and join, and leave their records in the one ledger shared
//! by the whole tree.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use taskweave::core::{Decomposition, Ledger, TaskGraph, TaskNode, DONE, RUNNING};

use crate::fixtures::{engine, entry, payload, position, root_task, ScriptedOracle};

/// Test: Parallel successors
/// Given a decomposition where `R` fans out to `S1` and `S2`, both ending at `END`
/// When the root task resolves
/// Then both branches are recorded before the single `DONE` record
#[tokio::test]
async fn test_parallel_successors_join_before_done() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose(
                "root",
                payload(
                    &["R", "S1", "S2", "END"],
                    &[("R", "S1"), ("R", "S2"), ("S1", "END"), ("S2", "END")],
                ),
            )
            .answer("R", "r")
            .answer("S1", "s1")
            .answer("S2", "s2")
            .delay("S1", Duration::from_millis(30)),
    );

    let resolution = engine(&oracle)
        .resolve(root_task("root", "problem"))
        .await
        .unwrap();
    let ledger = &resolution.ledger;

    let done = position(ledger, "root").unwrap();
    let s1 = position(ledger, "S1").unwrap();
    let s2 = position(ledger, "S2").unwrap();
    assert!(s1 < done && s2 < done, "ledger: {:?}", ledger);
    assert_eq!(ledger[done], entry("root", DONE));
    assert_eq!(done, ledger.len() - 1);
    assert_eq!(
        ledger.iter().filter(|e| e.value == DONE).count(),
        1,
        "one DONE record per graph"
    );

    assert_eq!(&ledger[..3], &[
        entry("problem", RUNNING),
        entry("Solve the problem", RUNNING),
        entry("R", "r"),
    ]);
    assert_eq!(resolution.answer(), Some(&json!(DONE)));
    assert_eq!(resolution.stats.graphs_built, 1);
    assert_eq!(resolution.stats.oracle_calls, 4);
}

#[tokio::test]
async fn test_parallel_branches_run_concurrently() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose(
                "root",
                payload(
                    &["S1", "S2", "END", "R"],
                    &[("R", "S1"), ("R", "S2"), ("S1", "END"), ("S2", "END")],
                ),
            )
            .answer("R", "r")
            .answer("S1", "s1")
            .answer("S2", "s2")
            .delay("S1", Duration::from_millis(200))
            .delay("S2", Duration::from_millis(200)),
    );

    let started = std::time::Instant::now();
    engine(&oracle)
        .resolve(root_task("root", "problem"))
        .await
        .unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(390),
        "branches should overlap, took {:?}",
        started.elapsed()
    );
}

/// Test: Nested decomposition
/// Given a root that decomposes into `sub`, which decomposes again
/// When the root task resolves
/// Then every level appends RUNNING and DONE markers to the same ledger
#[tokio::test]
async fn test_nested_decomposition_shares_ledger() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", payload(&["sub", "END"], &[("sub", "END")]))
            .decompose("sub", payload(&["leaf", "END"], &[("leaf", "END")]))
            .answer("leaf", "v"),
    );
    let root = root_task("root", "problem");
    let ledger = root.ledger().clone();

    let resolution = engine(&oracle).resolve(root).await.unwrap();

    assert_eq!(
        resolution.ledger,
        vec![
            entry("problem", RUNNING),
            entry("Solve the problem", RUNNING),
            entry("sub", RUNNING),
            entry("leaf", "v"),
            entry("sub", DONE),
            entry("root", DONE),
        ]
    );
    assert_eq!(ledger.snapshot(), resolution.ledger);
    assert_eq!(resolution.stats.graphs_built, 2);
    assert_eq!(resolution.stats.oracle_calls, 3);
    assert_eq!(resolution.stats.visits, 4);
}

#[tokio::test]
async fn test_leaf_prompt_sees_earlier_records() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", payload(&["a", "b", "END"], &[("a", "b"), ("b", "END")]))
            .answer("a", 2)
            .answer("b", 4),
    );
    engine(&oracle)
        .resolve(root_task("root", "double it"))
        .await
        .unwrap();

    let calls = oracle.calls();
    let b_prompt = &calls.iter().find(|c| c.task == "b").unwrap().prompt;
    assert!(b_prompt.contains("Id: a\n\tReturn Value: 2"));
    assert!(b_prompt.contains("GOAL\nb\n"));
}

#[tokio::test]
async fn test_declared_start_skips_earlier_nodes() {
    let mut decomposition = payload(&["a", "b", "END"], &[("a", "b"), ("b", "END")]);
    decomposition["start"] = json!("b");
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", decomposition)
            .answer("b", "only b"),
    );

    let resolution = engine(&oracle)
        .resolve(root_task("root", "problem"))
        .await
        .unwrap();

    assert_eq!(oracle.calls_for("a"), 0);
    assert!(position(&resolution.ledger, "b").is_some());
    assert!(position(&resolution.ledger, "a").is_none());
}

#[tokio::test]
async fn test_done_marker_ends_graph() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", payload(&["a", "DONE"], &[("a", "DONE")]))
            .answer("a", 1),
    );
    let resolution = engine(&oracle)
        .resolve(root_task("root", "problem"))
        .await
        .unwrap();
    assert_eq!(resolution.ledger.last(), Some(&entry("root", DONE)));
}

/// Test: Direct graph execution
/// Given a graph built from a decomposition outside any run
/// When it is executed
/// Then the returned snapshot ends with the DONE record of its parent
#[tokio::test]
async fn test_execute_graph_directly() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .answer("n1", "first")
            .answer("n2", "second"),
    );
    let parent = TaskNode::new("plan", "Plan it", Ledger::seeded("problem", RUNNING));
    let decomposition: Decomposition = serde_json::from_value(payload(
        &["n1", "n2", "END"],
        &[("n1", "n2"), ("n2", "END")],
    ))
    .unwrap();
    let graph = TaskGraph::from_decomposition(&decomposition, &parent).unwrap();

    let snapshot = graph.execute(&engine(&oracle)).await.unwrap();

    assert_eq!(
        snapshot,
        vec![
            entry("problem", RUNNING),
            entry("Plan it", RUNNING),
            entry("n1", "first"),
            entry("n2", "second"),
            entry("plan", DONE),
        ]
    );
    assert_eq!(parent.ledger().snapshot(), snapshot);
}

#[tokio::test]
async fn test_graph_without_reachable_end_completes() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .decompose("root", payload(&["a", "b", "END"], &[("a", "b")]))
            .answer("a", 1)
            .answer("b", 2),
    );
    let resolution = engine(&oracle)
        .resolve(root_task("root", "problem"))
        .await
        .unwrap();

    assert_eq!(resolution.answer(), Some(&json!(DONE)));
    assert!(
        resolution.ledger.iter().all(|e| e.value != DONE),
        "no DONE record when the end marker is never reached"
    );
}
