//! SkillProgression CLI — `skp` command.
//!
//! Authors courses and credential definitions, records learner activity,
//! and inspects, verifies and revokes the resulting credentials. All state
//! lives in a data directory holding `config.json` and `state.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use skill_progression::crypto::random::random_bytes;
use skill_progression::{
    ActivityInput, ActivityKind, ActivityOutcome, BadgeDefinition, BadgeId,
    CertificationDefinition, CertificationId, Combinator, ContentKind, CourseId, DependencyEdge,
    EngineConfig, LearnerId, MemoryStore, Node, NodeId, ProgressionEngine, ProgressionStore,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

const CONFIG_FILE: &str = "config.json";
const STATE_FILE: &str = "state.json";

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME not set; pass --data-dir")?;
    Ok(PathBuf::from(home).join(".skill-progression"))
}

// ── Time formatting helpers ───────────────────────────────────────────────────

fn micros_to_datetime(micros: u64) -> String {
    let secs = (micros / 1_000_000) as i64;
    chrono::DateTime::from_timestamp(secs, 0)
        .unwrap_or(chrono::DateTime::UNIX_EPOCH)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

fn optional_datetime(micros: Option<u64>) -> String {
    micros.map(micros_to_datetime).unwrap_or_else(|| "never".to_string())
}

// ── Session ───────────────────────────────────────────────────────────────────

/// An engine loaded from a data directory.
struct Session {
    engine: ProgressionEngine,
    store: Arc<MemoryStore>,
    state_path: PathBuf,
}

impl Session {
    fn open(data_dir: &Path) -> Result<Self> {
        let config = EngineConfig::load(&data_dir.join(CONFIG_FILE)).with_context(|| {
            format!(
                "failed to load configuration from {} (run `skp init` first)",
                data_dir.display()
            )
        })?;
        let state_path = data_dir.join(STATE_FILE);
        let store = Arc::new(MemoryStore::open(&state_path).context("failed to load state")?);
        let engine =
            ProgressionEngine::new(store.clone(), config).context("failed to start engine")?;
        Ok(Self {
            engine,
            store,
            state_path,
        })
    }

    fn save(&self) -> Result<()> {
        self.store
            .save(&self.state_path)
            .with_context(|| format!("failed to save state to {}", self.state_path.display()))
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// SkillProgression CLI — dependency-gated courses with automatic badges
/// and verifiable certifications.
#[derive(Parser, Debug)]
#[command(
    name = "skp",
    about = "SkillProgression CLI",
    version,
    long_about = "skp — SkillProgression CLI\n\nAuthor courses and credential definitions, record learner activity,\nand verify the badges and certifications it earns."
)]
struct Cli {
    /// Data directory (default: ~/.skill-progression)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory and its configuration
    Init {
        /// Service secret used to sign certifications (generated if omitted)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Author course nodes and dependency edges
    Course {
        #[command(subcommand)]
        subcommand: CourseCommands,
    },

    /// Manage badge definitions
    Badge {
        #[command(subcommand)]
        subcommand: DefinitionCommands,
    },

    /// Manage certification definitions
    Cert {
        #[command(subcommand)]
        subcommand: DefinitionCommands,
    },

    /// Record activity on a course node
    Record {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        node: String,

        /// Completion percentage (0-100)
        #[arg(long)]
        percent: Option<f64>,

        /// Score (0-100)
        #[arg(long)]
        score: Option<f64>,

        /// Time spent in seconds
        #[arg(long, default_value_t = 0)]
        time: u64,
    },

    /// Submit the outcome of an activity outside the course graph
    Submit {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        activity: String,

        /// Activity kind (lesson, quiz, assessment)
        #[arg(long)]
        kind: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        score: Option<f64>,

        #[arg(long)]
        percent: Option<f64>,

        #[arg(long)]
        category: Option<String>,

        /// Time spent in seconds
        #[arg(long, default_value_t = 0)]
        time: u64,
    },

    /// Show unlock status and progress of a course
    Status {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        course: String,
    },

    /// List a learner's badges and certifications
    Credentials {
        #[arg(long)]
        learner: String,
    },

    /// Issue any certification the learner has become eligible for
    Eligibility {
        #[arg(long)]
        learner: String,
    },

    /// Verify a certification by its verification code
    Verify {
        /// Verification code
        code: String,
    },

    /// Show a learner's ledger events
    Ledger {
        #[arg(long)]
        learner: String,
    },

    /// Revoke an issued credential
    Revoke {
        #[command(subcommand)]
        subcommand: RevokeCommands,
    },

    /// Expire every credential past its expiry date
    Expire,
}

#[derive(Subcommand, Debug)]
enum CourseCommands {
    /// Add or replace a node
    AddNode {
        #[arg(long)]
        id: String,

        #[arg(long)]
        course: String,

        /// Content kind (video, package, assessment)
        #[arg(long)]
        kind: String,

        #[arg(long)]
        title: String,

        /// Display order within the course
        #[arg(long, default_value_t = 0)]
        order: u32,

        /// Completion threshold (0-100); defaults per kind
        #[arg(long)]
        threshold: Option<f64>,

        /// Category used by score criteria
        #[arg(long)]
        category: Option<String>,

        /// Mark the node as the course's final exam
        #[arg(long)]
        final_exam: bool,
    },

    /// Add a dependency edge
    AddEdge {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Combinator (all, any)
        #[arg(long, default_value = "all")]
        combinator: String,
    },
}

#[derive(Subcommand, Debug)]
enum DefinitionCommands {
    /// Add or replace a definition from a JSON file
    Define {
        /// Path to the definition JSON
        file: PathBuf,
    },

    /// List definitions
    List,
}

#[derive(Subcommand, Debug)]
enum RevokeCommands {
    /// Revoke a badge
    Badge {
        id: String,

        #[arg(long)]
        reason: String,
    },

    /// Revoke a certification
    Cert {
        id: String,

        #[arg(long)]
        reason: String,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let json = cli.json;

    if let Commands::Init { secret } = cli.command {
        return cmd_init(&data_dir, secret);
    }

    let session = Session::open(&data_dir)?;
    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Course { subcommand } => match subcommand {
            CourseCommands::AddNode {
                id,
                course,
                kind,
                title,
                order,
                threshold,
                category,
                final_exam,
            } => cmd_add_node(
                &session, &id, &course, &kind, &title, order, threshold, category, final_exam,
            ),
            CourseCommands::AddEdge {
                from,
                to,
                combinator,
            } => cmd_add_edge(&session, &from, &to, &combinator),
        },
        Commands::Badge { subcommand } => match subcommand {
            DefinitionCommands::Define { file } => cmd_badge_define(&session, &file),
            DefinitionCommands::List => cmd_badge_list(&session, json),
        },
        Commands::Cert { subcommand } => match subcommand {
            DefinitionCommands::Define { file } => cmd_cert_define(&session, &file),
            DefinitionCommands::List => cmd_cert_list(&session, json),
        },
        Commands::Record {
            learner,
            node,
            percent,
            score,
            time,
        } => cmd_record(
            &session,
            &learner,
            &node,
            ActivityInput {
                percent,
                score,
                time_spent_secs: time,
            },
            json,
        ),
        Commands::Submit {
            learner,
            activity,
            kind,
            title,
            score,
            percent,
            category,
            time,
        } => {
            let kind: ActivityKind = kind.parse().map_err(|e: String| anyhow!(e))?;
            let mut outcome = ActivityOutcome::external(
                LearnerId::new(learner),
                activity.clone(),
                kind,
                title.unwrap_or(activity),
            )
            .with_time(time);
            outcome.score = score;
            outcome.percent = percent;
            outcome.category = category;
            cmd_submit(&session, outcome, json)
        }
        Commands::Status { learner, course } => cmd_status(&session, &learner, &course, json),
        Commands::Credentials { learner } => cmd_credentials(&session, &learner, json),
        Commands::Eligibility { learner } => cmd_eligibility(&session, &learner),
        Commands::Verify { code } => cmd_verify(&session, &code, json),
        Commands::Ledger { learner } => cmd_ledger(&session, &learner, json),
        Commands::Revoke { subcommand } => match subcommand {
            RevokeCommands::Badge { id, reason } => cmd_revoke_badge(&session, &id, &reason),
            RevokeCommands::Cert { id, reason } => cmd_revoke_cert(&session, &id, &reason),
        },
        Commands::Expire => cmd_expire(&session, json),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `skp init [--secret SECRET]`
fn cmd_init(data_dir: &Path, secret: Option<String>) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    if path.exists() {
        return Err(anyhow!(
            "already initialised: {} exists",
            path.display()
        ));
    }
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let secret = secret.unwrap_or_else(|| {
        random_bytes::<32>()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    });
    let config = EngineConfig::with_secret(secret);
    config.validate().context("invalid configuration")?;
    std::fs::write(&path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Initialised {}", data_dir.display());
    println!("  Config: {}", path.display());
    Ok(())
}

/// `skp course add-node --id ID --course COURSE --kind KIND --title TITLE`
#[allow(clippy::too_many_arguments)]
fn cmd_add_node(
    session: &Session,
    id: &str,
    course: &str,
    kind: &str,
    title: &str,
    order: u32,
    threshold: Option<f64>,
    category: Option<String>,
    final_exam: bool,
) -> Result<()> {
    let kind: ContentKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let mut node = Node::new(id, course, kind, title, order);
    node.completion_threshold = threshold;
    node.category = category;
    node.final_exam = final_exam;

    session.engine.add_node(node).context("failed to add node")?;
    session.save()?;
    println!("Node {id} added to course {course}");
    Ok(())
}

/// `skp course add-edge --from A --to B [--combinator all|any]`
fn cmd_add_edge(session: &Session, from: &str, to: &str, combinator: &str) -> Result<()> {
    let combinator: Combinator = combinator.parse().map_err(|e: String| anyhow!(e))?;
    session
        .engine
        .add_edge(DependencyEdge::new(from, to, combinator))
        .context("failed to add edge")?;
    session.save()?;
    println!("Edge {from} -> {to} ({}) added", combinator.as_tag());
    Ok(())
}

fn read_definition<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T> {
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("failed to parse {}", file.display()))
}

/// `skp badge define FILE`
fn cmd_badge_define(session: &Session, file: &Path) -> Result<()> {
    let definition: BadgeDefinition = read_definition(file)?;
    let id = definition.id.clone();
    session
        .engine
        .define_badge(definition)
        .context("failed to define badge")?;
    session.save()?;
    println!("Badge definition {id} saved");
    Ok(())
}

/// `skp badge list`
fn cmd_badge_list(session: &Session, json: bool) -> Result<()> {
    let definitions = session.store.badge_definitions()?;
    if json {
        return print_json(&definitions);
    }
    if definitions.is_empty() {
        println!("No badge definitions");
        return Ok(());
    }
    println!("{:<24} {:<14} {:<18} NAME", "ID", "LEVEL", "CRITERIA");
    println!("{}", "-".repeat(72));
    for d in &definitions {
        println!(
            "{:<24} {:<14} {:<18} {}{}",
            d.id,
            d.level.as_tag(),
            d.criteria.kind.as_tag(),
            d.name,
            if d.active { "" } else { " (inactive)" }
        );
    }
    Ok(())
}

/// `skp cert define FILE`
fn cmd_cert_define(session: &Session, file: &Path) -> Result<()> {
    let definition: CertificationDefinition = read_definition(file)?;
    let id = definition.id.clone();
    session
        .engine
        .define_certification(definition)
        .context("failed to define certification")?;
    session.save()?;
    println!("Certification definition {id} saved");
    Ok(())
}

/// `skp cert list`
fn cmd_cert_list(session: &Session, json: bool) -> Result<()> {
    let definitions = session.store.certification_definitions()?;
    if json {
        return print_json(&definitions);
    }
    if definitions.is_empty() {
        println!("No certification definitions");
        return Ok(());
    }
    println!("{:<24} {:<32} BADGES", "ID", "NAME");
    println!("{}", "-".repeat(72));
    for d in &definitions {
        let badges: Vec<String> = d
            .badges
            .iter()
            .map(|b| {
                if b.required {
                    b.badge.to_string()
                } else {
                    format!("({})", b.badge)
                }
            })
            .collect();
        println!("{:<24} {:<32} {}", d.id, d.name, badges.join(", "));
    }
    Ok(())
}

/// `skp record --learner L --node N [--percent P] [--score S] [--time SECS]`
fn cmd_record(
    session: &Session,
    learner: &str,
    node: &str,
    input: ActivityInput,
    json: bool,
) -> Result<()> {
    let learner = LearnerId::new(learner);
    let before = session.engine.learner_credentials(&learner)?;
    let progress = session
        .engine
        .record_activity(&learner, &NodeId::new(node), &input)
        .context("failed to record activity")?;
    session.save()?;

    if json {
        return print_json(&progress);
    }
    println!("Activity recorded");
    println!("  Node:     {}", progress.node);
    println!("  Status:   {}", progress.status.as_tag());
    println!("  Progress: {:.0}%", progress.completion_percent);
    if let Some(score) = progress.best_score {
        println!("  Best:     {score:.1}");
    }
    println!("  Attempts: {}", progress.attempts);

    let after = session.engine.learner_credentials(&learner)?;
    for badge in after.badges.iter().skip(before.badges.len()) {
        println!("  Badge earned: {} ({})", badge.definition, badge.level.as_tag());
    }
    for cert in after.certifications.iter().skip(before.certifications.len()) {
        println!(
            "  Certification earned: {} [{}]",
            cert.definition, cert.certification_number
        );
    }
    Ok(())
}

/// `skp submit --learner L --activity A --kind KIND [...]`
fn cmd_submit(session: &Session, outcome: ActivityOutcome, json: bool) -> Result<()> {
    let activity = outcome.activity_id.clone();
    let issued = session
        .engine
        .submit_outcome(outcome)
        .context("failed to submit outcome")?;
    session.save()?;

    if json {
        return print_json(&issued);
    }
    println!("Outcome {activity} submitted");
    if issued.is_empty() {
        println!("  No new badges");
    }
    for id in &issued {
        println!("  Badge issued: {id}");
    }
    Ok(())
}

/// `skp status --learner L --course C`
fn cmd_status(session: &Session, learner: &str, course: &str, json: bool) -> Result<()> {
    let status = session
        .engine
        .unlock_status(&LearnerId::new(learner), &CourseId::new(course))?;
    session.save()?;

    if json {
        return print_json(&status);
    }
    println!("Course {} for {learner}", status.course);
    println!("  Overall progress:    {}%", status.overall_progress);
    println!(
        "  Final exam eligible: {}",
        if status.final_exam_eligible { "yes" } else { "no" }
    );
    println!();
    println!("{:<24} {:<10} {:<12} {:>8}", "NODE", "ACCESS", "STATUS", "PROGRESS");
    println!("{}", "-".repeat(58));
    for (id, node) in &status.nodes {
        println!(
            "{:<24} {:<10} {:<12} {:>7.0}%",
            id,
            if node.accessible { "open" } else { "locked" },
            node.status.as_tag(),
            node.progress
        );
    }
    Ok(())
}

/// `skp credentials --learner L`
fn cmd_credentials(session: &Session, learner: &str, json: bool) -> Result<()> {
    let credentials = session.engine.learner_credentials(&LearnerId::new(learner))?;
    if json {
        return print_json(&credentials);
    }

    println!("Badges for {learner}:");
    if credentials.badges.is_empty() {
        println!("  (none)");
    }
    for b in &credentials.badges {
        println!(
            "  {}  {} ({}) {}  issued {}  expires {}",
            b.id,
            b.definition,
            b.level.as_tag(),
            b.status.as_tag(),
            micros_to_datetime(b.issued_at),
            optional_datetime(b.expires_at)
        );
    }

    println!("Certifications for {learner}:");
    if credentials.certifications.is_empty() {
        println!("  (none)");
    }
    for c in &credentials.certifications {
        println!(
            "  {}  {} {}  code {}  issued {}  expires {}",
            c.certification_number,
            c.definition,
            c.status.as_tag(),
            c.verification_code,
            micros_to_datetime(c.issued_at),
            optional_datetime(c.expires_at)
        );
    }
    Ok(())
}

/// `skp eligibility --learner L`
fn cmd_eligibility(session: &Session, learner: &str) -> Result<()> {
    let issued = session.engine.check_eligibility(&LearnerId::new(learner))?;
    session.save()?;
    if issued.is_empty() {
        println!("No new certifications for {learner}");
    }
    for id in &issued {
        println!("Certification issued: {id}");
    }
    Ok(())
}

/// `skp verify CODE`
fn cmd_verify(session: &Session, code: &str, json: bool) -> Result<()> {
    let result = session.engine.verify(code)?;
    if json {
        return print_json(&result);
    }
    if !result.valid && result.status.is_none() {
        println!("INVALID");
        return Ok(());
    }
    println!("{}", if result.valid { "VALID" } else { "NOT VALID" });
    if let Some(name) = &result.certification_name {
        println!("  Certification: {name}");
    }
    if let Some(holder) = &result.holder {
        println!("  Holder:        {holder}");
    }
    if let Some(status) = result.status {
        println!("  Status:        {}", status.as_tag());
    }
    if let Some(issued) = &result.issue_date {
        println!("  Issued:        {issued}");
    }
    println!(
        "  Expires:       {}",
        result.expiry_date.as_deref().unwrap_or("never")
    );
    Ok(())
}

/// `skp ledger --learner L`
fn cmd_ledger(session: &Session, learner: &str, json: bool) -> Result<()> {
    let events = session.engine.learner_ledger(&LearnerId::new(learner))?;
    if json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No ledger events for {learner}");
        return Ok(());
    }
    println!("{:>6} {:<24} {:<22} SUBJECT", "SEQ", "TIME", "EVENT");
    println!("{}", "-".repeat(80));
    for e in &events {
        println!(
            "{:>6} {:<24} {:<22} {}",
            e.sequence,
            micros_to_datetime(e.timestamp),
            e.kind.as_tag(),
            e.subject_id
        );
    }
    Ok(())
}

/// `skp revoke badge ID --reason R`
fn cmd_revoke_badge(session: &Session, id: &str, reason: &str) -> Result<()> {
    let badge = session
        .engine
        .revoke_badge(&BadgeId::new(id), reason)
        .context("failed to revoke badge")?;
    session.save()?;
    println!("Badge {} revoked", badge.id);
    println!("  Reason: {reason}");
    Ok(())
}

/// `skp revoke cert ID --reason R`
fn cmd_revoke_cert(session: &Session, id: &str, reason: &str) -> Result<()> {
    let cert = session
        .engine
        .revoke_certification(&CertificationId::new(id), reason)
        .context("failed to revoke certification")?;
    session.save()?;
    println!("Certification {} revoked", cert.certification_number);
    println!("  Reason: {reason}");
    Ok(())
}

/// `skp expire`
fn cmd_expire(session: &Session, json: bool) -> Result<()> {
    let sweep = session
        .engine
        .expire_stale(skill_progression::time::now_micros())?;
    session.save()?;
    if json {
        return print_json(&sweep);
    }
    println!(
        "Expired {} badges and {} certifications",
        sweep.badges.len(),
        sweep.certifications.len()
    );
    Ok(())
}
