//! Concurrency test: parallel activity submissions racing to issue the same
//! credentials.
//!
//! Validates that issuance stays at-most-one-Active per (learner, definition)
//! under contention, and that unrelated learners progress independently.

use std::sync::{Arc, Barrier};
use std::thread;

use skill_progression::criteria::{CriteriaKind, Evidence};
use skill_progression::{
    ActivityId, ActivityInput, ActivityKind, ActivityOutcome, BadgeDefinition,
    BadgeDefinitionId, BadgeId, BadgeLevel, CertificationDefinition, ContentKind,
    CredentialStatus, CriteriaSpec, EngineConfig, IssuedBadge, LearnerId, MemoryStore, Node,
    NodeId, ProgressStatus, ProgressionEngine, ProgressionStore,
};

fn engine() -> Arc<ProgressionEngine> {
    let engine = ProgressionEngine::new(
        Arc::new(MemoryStore::new()),
        EngineConfig::with_secret("stress-secret"),
    )
    .expect("engine should start");
    engine
        .define_badge(BadgeDefinition::new(
            "sharp-shooter",
            "Sharp Shooter",
            CriteriaSpec::assessment_score(50.0, None),
            BadgeLevel::Advanced,
        ))
        .unwrap();
    engine
        .define_certification(
            CertificationDefinition::new("marksman", "Marksman", "Range Academy")
                .require("sharp-shooter"),
        )
        .unwrap();
    Arc::new(engine)
}

#[test]
fn stress_64_concurrent_submissions_issue_one_badge() {
    let engine = engine();
    let learner = LearnerId::new("racer");
    let barrier = Arc::new(Barrier::new(64));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let engine = Arc::clone(&engine);
        let learner = learner.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let outcome =
                ActivityOutcome::external(learner, "range-exam", ActivityKind::Assessment, "Exam")
                    .with_score(95.0);
            barrier.wait();
            engine.submit_outcome(outcome).expect("submission should succeed")
        }));
    }

    let issued: usize = handles.into_iter().map(|h| h.join().unwrap().len()).sum();
    assert_eq!(issued, 1, "exactly one submission should win");

    let creds = engine.learner_credentials(&learner).unwrap();
    let active_badges = creds
        .badges
        .iter()
        .filter(|b| b.status == CredentialStatus::Active)
        .count();
    assert_eq!(active_badges, 1);
    assert_eq!(creds.certifications.len(), 1);
    assert!(engine
        .verify(&creds.certifications[0].verification_code)
        .unwrap()
        .valid);
}

#[test]
fn stress_concurrent_direct_inserts_keep_one_active_row() {
    let store = Arc::new(MemoryStore::new());
    let barrier = Arc::new(Barrier::new(32));

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let badge = IssuedBadge {
                id: BadgeId::new(format!("bdg_{i}")),
                learner: LearnerId::new("racer"),
                definition: BadgeDefinitionId::new("sharp-shooter"),
                level: BadgeLevel::Advanced,
                issued_at: 1,
                expires_at: None,
                evidence: Evidence {
                    kind: CriteriaKind::AssessmentScore,
                    source_activity: ActivityId::new("exam"),
                    snapshot: serde_json::json!({ "thread": i }),
                },
                verification_code: format!("code-{i}"),
                status: CredentialStatus::Active,
                revocation_reason: None,
                status_changed_at: None,
            };
            barrier.wait();
            store.insert_badge_if_absent(badge).unwrap()
        }));
    }

    let inserted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(inserted, 1);
    assert_eq!(
        store
            .badges_for_learner(&LearnerId::new("racer"))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn stress_100_learners_progress_in_parallel() {
    let engine = engine();
    engine
        .add_node(Node::new("intro", "range", ContentKind::Video, "Intro", 1))
        .unwrap();
    engine
        .add_node(Node::new("exam", "range", ContentKind::Assessment, "Exam", 2).final_exam())
        .unwrap();
    engine
        .add_edge(skill_progression::DependencyEdge::new(
            "intro",
            "exam",
            skill_progression::Combinator::All,
        ))
        .unwrap();

    let mut handles = Vec::new();
    for t in 0..100 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let learner = LearnerId::new(format!("learner-{t}"));
            engine
                .record_activity(&learner, &NodeId::new("intro"), &ActivityInput::percent(100.0))
                .unwrap();
            let progress = engine
                .record_activity(&learner, &NodeId::new("exam"), &ActivityInput::score(80.0))
                .unwrap();
            assert_eq!(progress.status, ProgressStatus::Completed);
            learner
        }));
    }

    for h in handles {
        let learner = h.join().unwrap();
        let creds = engine.learner_credentials(&learner).unwrap();
        assert_eq!(creds.badges.len(), 1, "{learner} should hold one badge");
        assert_eq!(creds.certifications.len(), 1);
    }

    let all_codes: std::collections::HashSet<String> = (0..100)
        .flat_map(|t| {
            engine
                .learner_credentials(&LearnerId::new(format!("learner-{t}")))
                .unwrap()
                .certifications
                .into_iter()
                .map(|c| c.verification_code)
        })
        .collect();
    assert_eq!(all_codes.len(), 100, "verification codes must be unique");
}
