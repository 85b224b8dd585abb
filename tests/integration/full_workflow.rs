//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Author a course graph and credential definitions
//! 2. Record learner activity through the unlock gates
//! 3. Earn badges and the certification they cascade into
//! 4. Verify, persist, reload, revoke and expire credentials

use std::sync::Arc;

use skill_progression::criteria::evaluate;
use skill_progression::criteria::LearnerHistory;
use skill_progression::{
    ActivityInput, ActivityKind, ActivityOutcome, BadgeDefinition, BadgeLevel,
    CertificationDefinition, Combinator, ContentKind, CourseId, CredentialStatus, CriteriaSpec,
    DependencyEdge, EngineConfig, LearnerId, LedgerEventKind, MemoryStore, Node, NodeId,
    ProgressStatus, ProgressionEngine, ProgressionError, VerificationResult,
};

const SECRET: &str = "integration-service-secret";

fn course() -> CourseId {
    CourseId::new("web")
}

fn node(id: &str) -> NodeId {
    NodeId::new(id)
}

/// Four-node course: html -> css -> quiz -> final, plus `project` gated by
/// html OR css.
fn build_engine(store: Arc<MemoryStore>) -> ProgressionEngine {
    let engine = ProgressionEngine::new(store, EngineConfig::with_secret(SECRET))
        .expect("engine should start");
    engine
        .add_node(Node::new("html", "web", ContentKind::Video, "HTML basics", 1).with_threshold(80.0))
        .unwrap();
    engine
        .add_node(Node::new("css", "web", ContentKind::Package, "CSS lab", 2).with_threshold(90.0))
        .unwrap();
    engine
        .add_node(
            Node::new("quiz", "web", ContentKind::Assessment, "JS quiz", 3)
                .with_category("frontend"),
        )
        .unwrap();
    engine
        .add_node(
            Node::new("final", "web", ContentKind::Assessment, "Final exam", 4)
                .with_category("frontend")
                .final_exam(),
        )
        .unwrap();
    engine
        .add_edge(DependencyEdge::new("html", "css", Combinator::All))
        .unwrap();
    engine
        .add_edge(DependencyEdge::new("css", "quiz", Combinator::All))
        .unwrap();
    engine
        .add_edge(DependencyEdge::new("quiz", "final", Combinator::All))
        .unwrap();
    engine
}

fn define_credentials(engine: &ProgressionEngine) {
    engine
        .define_badge(BadgeDefinition::new(
            "frontend-quiz",
            "Frontend Quizzer",
            CriteriaSpec::quiz_score(70.0, Some("frontend")),
            BadgeLevel::Intermediate,
        ))
        .unwrap();
    engine
        .define_badge(BadgeDefinition::new(
            "frontend-exam",
            "Frontend Examined",
            CriteriaSpec::assessment_score(70.0, Some("frontend")),
            BadgeLevel::Advanced,
        ))
        .unwrap();
    engine
        .define_certification(
            CertificationDefinition::new("web-dev", "Web Developer", "Skill Academy")
                .require("frontend-quiz")
                .require("frontend-exam")
                .min_level(BadgeLevel::Intermediate)
                .for_course("web"),
        )
        .unwrap();
}

fn complete_prerequisites(engine: &ProgressionEngine, learner: &LearnerId) {
    engine
        .record_activity(learner, &node("html"), &ActivityInput::percent(85.0))
        .unwrap();
    engine
        .record_activity(learner, &node("css"), &ActivityInput::percent(95.0))
        .unwrap();
}

#[test]
fn full_workflow_course_to_verified_certificate() {
    let store = Arc::new(MemoryStore::new());
    let engine = build_engine(store);
    define_credentials(&engine);
    let alice = LearnerId::new("alice");

    // ── Step 1: only the root is open ───────────────────────────────────
    let status = engine.unlock_status(&alice, &course()).unwrap();
    assert!(status.nodes[&node("html")].accessible);
    assert!(!status.nodes[&node("css")].accessible);
    assert!(!status.final_exam_eligible);

    // ── Step 2: walk the prerequisites ──────────────────────────────────
    complete_prerequisites(&engine, &alice);
    let status = engine.unlock_status(&alice, &course()).unwrap();
    assert!(status.nodes[&node("quiz")].accessible);
    assert_eq!(status.overall_progress, 50);

    // ── Step 3: first badge, no certification yet ───────────────────────
    engine
        .record_activity(&alice, &node("quiz"), &ActivityInput::score(80.0))
        .unwrap();
    let creds = engine.learner_credentials(&alice).unwrap();
    assert_eq!(creds.badges.len(), 1);
    assert!(creds.certifications.is_empty());
    assert!(engine.unlock_status(&alice, &course()).unwrap().final_exam_eligible);

    // ── Step 4: the final exam issues the second badge and the cert ─────
    let progress = engine
        .record_activity(&alice, &node("final"), &ActivityInput::score(88.0))
        .unwrap();
    assert_eq!(progress.status, ProgressStatus::Completed);

    let creds = engine.learner_credentials(&alice).unwrap();
    assert_eq!(creds.badges.len(), 2);
    assert_eq!(creds.certifications.len(), 1);
    let cert = &creds.certifications[0];
    assert_eq!(cert.status, CredentialStatus::Active);
    assert!(cert.certification_number.starts_with("CERT-"));
    assert!(cert.signature.starts_with("v1:"));
    assert_eq!(cert.badge_snapshot.len(), 2);

    let summary = engine.summary(&alice, &course()).unwrap();
    assert_eq!(summary.overall_percent, 100);
    assert!(summary.certificate_issued);

    // ── Step 5: ledger order reflects the synchronous cascade ──────────
    let kinds: Vec<LedgerEventKind> = engine
        .learner_ledger(&alice)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            LedgerEventKind::NodeCompleted,
            LedgerEventKind::NodeCompleted,
            LedgerEventKind::NodeCompleted,
            LedgerEventKind::BadgeIssued,
            LedgerEventKind::NodeCompleted,
            LedgerEventKind::BadgeIssued,
            LedgerEventKind::CertificationIssued,
        ]
    );

    // ── Step 6: public verification ─────────────────────────────────────
    let verified = engine.verify(&cert.verification_code).unwrap();
    assert!(verified.valid);
    assert_eq!(verified.certification_name.as_deref(), Some("Web Developer"));
    assert_eq!(verified.holder, Some(alice.clone()));
    assert_eq!(verified.status, Some(CredentialStatus::Active));

    // ── Step 7: revocation invalidates it ───────────────────────────────
    engine
        .revoke_certification(&cert.id, "academic misconduct")
        .unwrap();
    let revoked = engine.verify(&cert.verification_code).unwrap();
    assert!(!revoked.valid);
    assert_eq!(revoked.status, Some(CredentialStatus::Revoked));
    assert!(!engine.summary(&alice, &course()).unwrap().certificate_issued);
}

#[test]
fn root_nodes_accessible_regardless_of_learner_state() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    let fresh = LearnerId::new("fresh");
    let busy = LearnerId::new("busy");
    complete_prerequisites(&engine, &busy);

    for learner in [&fresh, &busy] {
        let decision = engine.can_access(learner, &node("html")).unwrap();
        assert!(decision.accessible);
        assert!(decision.missing_requirements.is_empty());
    }
}

#[test]
fn all_group_requires_every_predecessor_and_completion_is_monotonic() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    engine
        .add_node(Node::new("capstone", "web", ContentKind::Package, "Capstone", 5))
        .unwrap();
    engine
        .add_edge(DependencyEdge::new("html", "capstone", Combinator::All))
        .unwrap();
    engine
        .add_edge(DependencyEdge::new("css", "capstone", Combinator::All))
        .unwrap();
    let bob = LearnerId::new("bob");

    let decision = engine.can_access(&bob, &node("capstone")).unwrap();
    assert!(!decision.accessible);
    assert_eq!(decision.missing_requirements, vec![node("css"), node("html")]);

    engine
        .record_activity(&bob, &node("html"), &ActivityInput::percent(85.0))
        .unwrap();
    let decision = engine.can_access(&bob, &node("capstone")).unwrap();
    assert!(!decision.accessible);
    assert_eq!(decision.missing_requirements, vec![node("css")]);

    // A later, lower submission cannot undo a completion.
    let again = engine
        .record_activity(&bob, &node("html"), &ActivityInput::percent(10.0))
        .unwrap();
    assert_eq!(again.status, ProgressStatus::Completed);
    assert_eq!(again.completion_percent, 85.0);

    engine
        .record_activity(&bob, &node("css"), &ActivityInput::percent(95.0))
        .unwrap();
    assert!(engine.can_access(&bob, &node("capstone")).unwrap().accessible);
}

#[test]
fn any_group_needs_one_predecessor() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    engine
        .add_node(Node::new("elective", "web", ContentKind::Video, "Elective", 6))
        .unwrap();
    engine
        .add_edge(DependencyEdge::new("quiz", "elective", Combinator::Any))
        .unwrap();
    engine
        .add_edge(DependencyEdge::new("css", "elective", Combinator::Any))
        .unwrap();
    let carol = LearnerId::new("carol");

    assert!(!engine.can_access(&carol, &node("elective")).unwrap().accessible);
    complete_prerequisites(&engine, &carol);
    assert!(engine.can_access(&carol, &node("elective")).unwrap().accessible);
}

#[test]
fn cyclic_edge_rejected_at_write_time() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    let err = engine
        .add_edge(DependencyEdge::new("final", "html", Combinator::All))
        .unwrap_err();
    assert!(matches!(err, ProgressionError::CycleDetected { .. }));
}

#[test]
fn video_completion_updates_course_summary() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    let dave = LearnerId::new("dave");

    let progress = engine
        .record_activity(&dave, &node("html"), &ActivityInput::percent(85.0))
        .unwrap();
    assert_eq!(progress.status, ProgressStatus::Completed);

    let summary = engine.summary(&dave, &course()).unwrap();
    assert_eq!(summary.total_nodes, 4);
    assert_eq!(summary.completed_nodes, 1);
    assert_eq!(summary.overall_percent, 25);
}

#[test]
fn failed_assessment_is_retriable() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    let erin = LearnerId::new("erin");
    complete_prerequisites(&engine, &erin);

    let failed = engine
        .record_activity(&erin, &node("quiz"), &ActivityInput::score(55.0))
        .unwrap();
    assert_eq!(failed.status, ProgressStatus::Failed);

    let passed = engine
        .record_activity(&erin, &node("quiz"), &ActivityInput::score(75.0))
        .unwrap();
    assert_eq!(passed.status, ProgressStatus::Completed);
    assert_eq!(passed.attempts, 2);
}

#[test]
fn category_filter_decides_eligibility() {
    let criteria = CriteriaSpec::assessment_score(70.0, Some("frontend"));
    let learner = LearnerId::new("frank");
    let history = LearnerHistory::default();

    let frontend = ActivityOutcome::external(
        learner.clone(),
        "exam-1",
        ActivityKind::Assessment,
        "Exam",
    )
    .with_score(80.0)
    .with_category("frontend");
    assert!(evaluate(&criteria, &frontend, &history).eligible);

    let backend =
        ActivityOutcome::external(learner, "exam-2", ActivityKind::Assessment, "Exam")
            .with_score(80.0)
            .with_category("backend");
    assert!(!evaluate(&criteria, &backend, &history).eligible);
}

#[test]
fn certification_waits_for_all_required_badges() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    define_credentials(&engine);
    let gina = LearnerId::new("gina");

    let exam = ActivityOutcome::external(
        gina.clone(),
        "vendor-exam",
        ActivityKind::Assessment,
        "Vendor exam",
    )
    .with_score(90.0)
    .with_category("frontend");
    assert_eq!(engine.submit_outcome(exam).unwrap().len(), 1);
    assert!(engine
        .learner_credentials(&gina)
        .unwrap()
        .certifications
        .is_empty());

    let quiz = ActivityOutcome::external(gina.clone(), "vendor-quiz", ActivityKind::Quiz, "Quiz")
        .with_score(90.0)
        .with_category("frontend");
    let issued = engine.submit_outcome(quiz).unwrap();
    assert_eq!(issued.len(), 1);

    // Issued within the same call that issued the second badge.
    let creds = engine.learner_credentials(&gina).unwrap();
    assert_eq!(creds.certifications.len(), 1);
    assert_eq!(creds.certifications[0].status, CredentialStatus::Active);
}

#[test]
fn tampered_code_verifies_as_invalid() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    define_credentials(&engine);
    let hank = LearnerId::new("hank");
    complete_prerequisites(&engine, &hank);
    engine
        .record_activity(&hank, &node("quiz"), &ActivityInput::score(90.0))
        .unwrap();
    engine
        .record_activity(&hank, &node("final"), &ActivityInput::score(90.0))
        .unwrap();

    let creds = engine.learner_credentials(&hank).unwrap();
    let code = creds.certifications[0].verification_code.clone();
    assert!(engine.verify(&code).unwrap().valid);

    let mut chars: Vec<char> = code.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'z' { 'y' } else { 'z' };
    let tampered: String = chars.into_iter().collect();

    let result = engine.verify(&tampered).unwrap();
    assert_eq!(result, VerificationResult::invalid());
    assert_eq!(result, engine.verify("does-not-exist").unwrap());
}

#[test]
fn replayed_activity_does_not_duplicate_badges() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    define_credentials(&engine);
    let ivan = LearnerId::new("ivan");
    complete_prerequisites(&engine, &ivan);

    for _ in 0..3 {
        engine
            .record_activity(&ivan, &node("quiz"), &ActivityInput::score(85.0))
            .unwrap();
    }
    let badges = engine.learner_credentials(&ivan).unwrap().badges;
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].status, CredentialStatus::Active);
}

#[test]
fn state_survives_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let code = {
        let store = Arc::new(MemoryStore::new());
        let engine = build_engine(store.clone());
        define_credentials(&engine);
        let jane = LearnerId::new("jane");
        complete_prerequisites(&engine, &jane);
        engine
            .record_activity(&jane, &node("quiz"), &ActivityInput::score(90.0))
            .unwrap();
        engine
            .record_activity(&jane, &node("final"), &ActivityInput::score(90.0))
            .unwrap();
        store.save(&path).unwrap();
        engine.learner_credentials(&jane).unwrap().certifications[0]
            .verification_code
            .clone()
    };

    let reopened = Arc::new(MemoryStore::open(&path).unwrap());
    let engine = ProgressionEngine::new(reopened, EngineConfig::with_secret(SECRET)).unwrap();
    assert!(engine.verify(&code).unwrap().valid);
    assert_eq!(engine.learner_ledger(&LearnerId::new("jane")).unwrap().len(), 7);

    // A different secret cannot vouch for the stored signature.
    let other = ProgressionEngine::new(
        Arc::new(MemoryStore::open(&path).unwrap()),
        EngineConfig::with_secret("rotated-secret"),
    )
    .unwrap();
    assert_eq!(other.verify(&code).unwrap(), VerificationResult::invalid());
}

#[test]
fn expiry_sweep_and_reissue() {
    let engine = build_engine(Arc::new(MemoryStore::new()));
    engine
        .define_badge(
            BadgeDefinition::new(
                "annual-exam",
                "Annual exam",
                CriteriaSpec::assessment_score(60.0, None),
                BadgeLevel::Beginner,
            )
            .expires_after(365),
        )
        .unwrap();
    let kim = LearnerId::new("kim");
    let exam = || {
        ActivityOutcome::external(kim.clone(), "annual", ActivityKind::Assessment, "Annual")
            .with_score(75.0)
    };
    assert_eq!(engine.submit_outcome(exam()).unwrap().len(), 1);
    assert!(engine.submit_outcome(exam()).unwrap().is_empty());

    let later = skill_progression::time::add_days(skill_progression::time::now_micros(), 400);
    let sweep = engine.expire_stale(later).unwrap();
    assert_eq!(sweep.badges.len(), 1);
    assert!(sweep.certifications.is_empty());

    let badges = engine.learner_credentials(&kim).unwrap().badges;
    assert_eq!(badges[0].status, CredentialStatus::Expired);

    // Expired badges no longer block a fresh issuance.
    assert_eq!(engine.submit_outcome(exam()).unwrap().len(), 1);
}
