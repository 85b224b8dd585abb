//! Scale test: large course graphs.
//!
//! Validates cycle rejection on long chains, fan-in gates with many
//! predecessors, and unlock-status computation over hundreds of nodes.

use std::sync::Arc;
use std::time::Instant;

use skill_progression::{
    ActivityInput, Combinator, ContentKind, CourseId, DependencyEdge, EngineConfig, LearnerId,
    MemoryStore, Node, NodeId, ProgressionEngine, ProgressionError,
};

fn engine() -> ProgressionEngine {
    ProgressionEngine::new(
        Arc::new(MemoryStore::new()),
        EngineConfig::with_secret("wide-graph-secret"),
    )
    .expect("engine should start")
}

fn chain(engine: &ProgressionEngine, course: &str, len: u32) {
    for i in 0..len {
        engine
            .add_node(Node::new(format!("{course}-{i}"), course, ContentKind::Video, "step", i))
            .unwrap();
    }
    for i in 1..len {
        engine
            .add_edge(DependencyEdge::new(
                format!("{course}-{}", i - 1),
                format!("{course}-{i}"),
                Combinator::All,
            ))
            .unwrap();
    }
}

#[test]
fn stress_500_node_chain_rejects_closing_edge() {
    let engine = engine();
    chain(&engine, "long", 500);

    let err = engine
        .add_edge(DependencyEdge::new("long-499", "long-0", Combinator::All))
        .unwrap_err();
    assert!(matches!(err, ProgressionError::CycleDetected { .. }));

    // Shortcuts forward along the chain stay acyclic.
    engine
        .add_edge(DependencyEdge::new("long-0", "long-499", Combinator::All))
        .unwrap();
}

#[test]
fn stress_fan_in_of_200_predecessors() {
    let engine = engine();
    for i in 0..200 {
        engine
            .add_node(Node::new(format!("pre-{i}"), "fan", ContentKind::Video, "pre", i))
            .unwrap();
    }
    engine
        .add_node(Node::new("gate", "fan", ContentKind::Assessment, "Gate", 200).final_exam())
        .unwrap();
    for i in 0..200 {
        engine
            .add_edge(DependencyEdge::new(format!("pre-{i}"), "gate", Combinator::All))
            .unwrap();
    }

    let learner = LearnerId::new("diligent");
    for i in 0..199 {
        engine
            .record_activity(&learner, &NodeId::new(format!("pre-{i}")), &ActivityInput::percent(100.0))
            .unwrap();
    }
    let decision = engine.can_access(&learner, &NodeId::new("gate")).unwrap();
    assert!(!decision.accessible);
    assert_eq!(decision.missing_requirements, vec![NodeId::new("pre-199")]);

    engine
        .record_activity(&learner, &NodeId::new("pre-199"), &ActivityInput::percent(100.0))
        .unwrap();
    assert!(engine.can_access(&learner, &NodeId::new("gate")).unwrap().accessible);

    let status = engine.unlock_status(&learner, &CourseId::new("fan")).unwrap();
    assert!(status.final_exam_eligible);
    // 200 of 201 nodes, rounded.
    assert_eq!(status.overall_progress, 100);
}

#[test]
fn stress_unlock_status_over_300_nodes() {
    let engine = engine();
    chain(&engine, "big", 300);
    let learner = LearnerId::new("walker");
    for i in 0..150 {
        engine
            .record_activity(&learner, &NodeId::new(format!("big-{i}")), &ActivityInput::percent(90.0))
            .unwrap();
    }

    let start = Instant::now();
    let status = engine.unlock_status(&learner, &CourseId::new("big")).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(status.nodes.len(), 300);
    assert_eq!(status.overall_progress, 50);
    let open = status.nodes.values().filter(|n| n.accessible).count();
    // 150 completed plus the next one in the chain.
    assert_eq!(open, 151);
    assert!(
        elapsed.as_secs() < 5,
        "unlock status over 300 nodes took {elapsed:?}"
    );
}
