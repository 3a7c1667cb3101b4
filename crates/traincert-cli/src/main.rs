//! Traincert CLI: the `tcert` command.
//!
//! Operator tool over a local traincert data directory: set up courses and
//! quiz banks, drive learner progress, record practical evaluations and
//! issue, verify and revoke certificates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use traincert::config;
use traincert::credential::verify_offline;
use traincert::storage::{self, key_file::KEY_FILE};
use traincert::{
    Actor, Engine, EvaluationInput, ExamId, IssueRequest, ItemDraft, ItemEdit, ItemId, NewModule,
    Role, StartExam,
};

const ENV_PASSPHRASE: &str = "TRAINCERT_PASSPHRASE";

// ── Passphrase helper ─────────────────────────────────────────────────────────

fn read_passphrase(prompt: &str) -> Result<String> {
    if let Ok(p) = std::env::var(ENV_PASSPHRASE) {
        return Ok(p);
    }
    eprint!("{prompt}");
    let mut passphrase = String::new();
    std::io::stdin()
        .read_line(&mut passphrase)
        .context("failed to read passphrase")?;
    Ok(passphrase.trim().to_string())
}

// ── Output helpers ────────────────────────────────────────────────────────────

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `item_id=choice` pairs.
fn parse_answers(pairs: &[String]) -> Result<BTreeMap<ItemId, u32>> {
    let mut answers = BTreeMap::new();
    for pair in pairs {
        let (item, choice) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("answer '{pair}' must look like <item_id>=<choice>"))?;
        let choice: u32 = choice
            .parse()
            .with_context(|| format!("choice in '{pair}' is not a number"))?;
        answers.insert(ItemId::from(item), choice);
    }
    Ok(answers)
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Traincert CLI: training progression and certificate issuance.
#[derive(Parser, Debug)]
#[command(
    name = "tcert",
    about = "Traincert CLI",
    version,
    long_about = "tcert: Traincert CLI\n\nManage courses and quiz banks, track learner gates and exams,\nand issue verifiable certificates."
)]
struct Cli {
    /// Data directory (default: $TRAINCERT_HOME or ~/.traincert)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User id to act as
    #[arg(long = "as", global = true, env = "TRAINCERT_USER", default_value = "operator")]
    user: String,

    /// Role of the acting user (learner, staff, evaluator, trainer, system)
    #[arg(long, global = true, env = "TRAINCERT_ROLE", default_value = "staff")]
    role: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory and a new issuer key
    Init,

    /// Print the issuer public key (no passphrase needed)
    Pubkey,

    /// Manage courses and modules
    Course {
        #[command(subcommand)]
        subcommand: CourseCommands,
    },

    /// Enroll the acting user in a course
    Enroll {
        #[arg(long)]
        course: String,
    },

    /// Mark a gate step done for the acting user
    Step {
        #[arg(long)]
        course: String,
        /// Module key, id or order
        #[arg(long)]
        module: String,
        /// content_read, practice_done, cards_done or quiz_passed
        #[arg(long)]
        step: String,
    },

    /// Record a module quiz score for the acting user
    Quiz {
        #[arg(long)]
        course: String,
        #[arg(long)]
        module: String,
        #[arg(long)]
        score: u32,
    },

    /// Show gate states and the resume module of a learner
    Progress {
        #[arg(long)]
        course: String,
        /// Learner id (default: the acting user)
        #[arg(long)]
        learner: Option<String>,
    },

    /// Manage quiz items
    Item {
        #[command(subcommand)]
        subcommand: ItemCommands,
    },

    /// Take exams as the acting user
    Exam {
        #[command(subcommand)]
        subcommand: ExamCommands,
    },

    /// Record a practical evaluation
    Evaluate {
        #[arg(long)]
        learner: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        evaluator_name: String,
        /// Evaluation date, YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Record a failed practical
        #[arg(long)]
        fail: bool,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Check certificate eligibility of a learner
    Eligibility {
        #[arg(long)]
        learner: String,
        #[arg(long)]
        course: String,
    },

    /// Issue, verify and revoke certificates
    Cert {
        #[command(subcommand)]
        subcommand: CertCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CourseCommands {
    /// Create a course
    Create {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        title: String,
    },
    /// Append a module to a course
    AddModule {
        #[arg(long)]
        course: String,
        #[arg(long)]
        order: u32,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content_ref: String,
        /// Stable module key
        #[arg(long)]
        key: Option<String>,
        /// Module has no practical demonstration
        #[arg(long)]
        no_demo: bool,
    },
    /// List the modules of a course
    Modules {
        #[arg(long)]
        course: String,
    },
}

#[derive(Subcommand, Debug)]
enum ItemCommands {
    /// Create a draft item
    Create {
        #[arg(long)]
        bank: String,
        #[arg(long, default_value = "en")]
        locale: String,
        #[arg(long)]
        prompt: String,
        /// Answer choice; repeat for each choice
        #[arg(long = "choice", required = true)]
        choices: Vec<String>,
        /// Zero-based index of the correct choice
        #[arg(long)]
        correct: u32,
    },
    /// Edit an item
    Edit {
        item_id: String,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long = "choice")]
        choices: Vec<String>,
        #[arg(long)]
        correct: Option<u32>,
        #[arg(long)]
        expected_version: Option<u32>,
    },
    /// Publish an item
    Publish {
        item_id: String,
        #[arg(long)]
        expected_version: Option<u32>,
    },
    /// Return an item to draft
    Unpublish {
        item_id: String,
        #[arg(long)]
        expected_version: Option<u32>,
    },
    /// Show the revision history of an item
    History { item_id: String },
}

#[derive(Subcommand, Debug)]
enum ExamCommands {
    /// Start an exam
    Start {
        #[arg(long)]
        course: String,
        #[arg(long)]
        bank: String,
        #[arg(long, default_value_t = 20)]
        count: u32,
        #[arg(long, default_value = "en")]
        locale: String,
    },
    /// Show the in-progress exam
    Resume,
    /// Save answers without submitting
    Save {
        exam_id: String,
        /// Answer as <item_id>=<choice>; repeatable
        #[arg(long = "answer")]
        answers: Vec<String>,
        #[arg(long)]
        remaining_sec: Option<i64>,
    },
    /// Submit and score an exam
    Submit {
        exam_id: String,
        #[arg(long = "answer")]
        answers: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CertCommands {
    /// Issue a certificate
    Issue {
        #[arg(long)]
        learner: String,
        #[arg(long)]
        course: String,
        /// Score to print on the certificate (default: best passed exam)
        #[arg(long)]
        score: Option<u32>,
    },
    /// Verify a certificate by its public code
    Verify { code: String },
    /// Verify a signed payload against a public key without the database
    VerifyOffline {
        /// File holding the signed payload JSON, byte for byte
        #[arg(long)]
        payload: PathBuf,
        /// Base64 signature
        #[arg(long)]
        signature: String,
        /// Base64 issuer public key (default: the local key file)
        #[arg(long)]
        public_key: Option<String>,
    },
    /// Revoke a certificate
    Revoke {
        code: String,
        #[arg(long)]
        reason: String,
    },
    /// Show recertification status of a learner
    Recert {
        #[arg(long)]
        learner: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let dir = config::data_dir(cli.data_dir.as_deref())?;
    let role: Role = cli.role.parse()?;
    let actor = Actor::new(cli.user.clone(), role);
    log::debug!("acting as {} ({})", actor.user_id, role.as_str());

    match cli.command {
        Commands::Init => cmd_init(&dir),
        Commands::Pubkey => cmd_pubkey(&dir),
        Commands::Cert {
            subcommand:
                CertCommands::VerifyOffline {
                    payload,
                    signature,
                    public_key,
                },
        } => cmd_verify_offline(&dir, &payload, &signature, public_key.as_deref()),
        command => {
            let engine = open_engine(&dir)?;
            dispatch(&engine, &actor, command)
        }
    }
}

fn open_engine(dir: &Path) -> Result<Engine> {
    let passphrase = read_passphrase("Issuer key passphrase: ")?;
    Engine::open(dir, &passphrase)
        .with_context(|| format!("failed to open data directory {}", dir.display()))
}

fn dispatch(engine: &Engine, actor: &Actor, command: Commands) -> Result<()> {
    match command {
        Commands::Course { subcommand } => match subcommand {
            CourseCommands::Create { slug, title } => {
                print_json(&engine.create_course(actor, &slug, &title)?)
            }
            CourseCommands::AddModule {
                course,
                order,
                title,
                content_ref,
                key,
                no_demo,
            } => {
                let mut module = NewModule::new(order, title, content_ref);
                if let Some(key) = key {
                    module = module.with_key(key);
                }
                if no_demo {
                    module = module.without_demo();
                }
                print_json(&engine.add_module(actor, &course, module)?)
            }
            CourseCommands::Modules { course } => print_json(&engine.course_modules(&course)?),
        },
        Commands::Enroll { course } => print_json(&engine.enroll(actor, &course)?),
        Commands::Step {
            course,
            module,
            step,
        } => cmd_step(engine, actor, &course, &module, &step),
        Commands::Quiz {
            course,
            module,
            score,
        } => {
            let (attempt, outcome) = engine.record_quiz_attempt(actor, &course, &module, score)?;
            println!(
                "Quiz attempt {}: {}% ({})",
                attempt.id,
                attempt.score_pct,
                if attempt.passed { "passed" } else { "failed" }
            );
            if let Some(outcome) = outcome {
                println!("  Progress: {}%", outcome.progress_pct);
            }
            Ok(())
        }
        Commands::Progress { course, learner } => {
            let learner = learner.unwrap_or_else(|| actor.user_id.clone());
            cmd_progress(engine, actor, &learner, &course)
        }
        Commands::Item { subcommand } => cmd_item(engine, actor, subcommand),
        Commands::Exam { subcommand } => cmd_exam(engine, actor, subcommand),
        Commands::Evaluate {
            learner,
            course,
            evaluator_name,
            date,
            fail,
            notes,
        } => {
            let input = EvaluationInput {
                evaluator_name,
                evaluated_on: date,
                practical_pass: !fail,
                evaluator_signature: None,
                trainee_signature: None,
                notes,
            };
            print_json(&engine.record_evaluation(actor, &learner, &course, &input)?)
        }
        Commands::Eligibility { learner, course } => {
            let verdict = engine.check_eligibility(actor, &learner, &course)?;
            if verdict.eligible {
                println!("{learner} is eligible for {course}");
            } else {
                println!("{learner} is not eligible for {course}");
                println!("  Missing: {}", verdict.reasons.join(", "));
            }
            Ok(())
        }
        Commands::Cert { subcommand } => cmd_cert(engine, actor, subcommand),
        Commands::Init | Commands::Pubkey => Err(anyhow!("command does not need an open engine")),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_init(dir: &Path) -> Result<()> {
    if dir.join(KEY_FILE).exists() {
        bail!("already initialized at {}", dir.display());
    }
    let passphrase = read_passphrase("Enter passphrase for the issuer key: ")?;
    if passphrase.is_empty() {
        bail!("passphrase cannot be empty");
    }
    if std::env::var(ENV_PASSPHRASE).is_err() {
        let confirm = read_passphrase("Confirm passphrase: ")?;
        if passphrase != confirm {
            bail!("passphrases do not match");
        }
    }

    let engine = Engine::init(dir, &passphrase).context("failed to initialize data directory")?;
    println!("Initialized traincert at {}", dir.display());
    println!("  Key ID:     {}", engine.issuer().key_id());
    println!("  Public key: {}", engine.issuer().public_key_base64());
    Ok(())
}

fn cmd_pubkey(dir: &Path) -> Result<()> {
    let (key_id, public_key) =
        storage::read_public_key(&dir.join(KEY_FILE)).context("failed to read issuer key file")?;
    println!("{key_id} {public_key}");
    Ok(())
}

fn cmd_step(engine: &Engine, actor: &Actor, course: &str, module: &str, step: &str) -> Result<()> {
    let outcome = engine.mark_step(actor, course, module, step)?;
    let state = &outcome.state;
    println!(
        "Module {} {}: {}/4 steps{}",
        state.order,
        step,
        state.steps_done(),
        if outcome.changed { "" } else { " (unchanged)" }
    );
    println!("  Progress: {}%", outcome.progress_pct);
    println!("  Resume:   module {}", outcome.resume_order);
    Ok(())
}

fn cmd_progress(engine: &Engine, actor: &Actor, learner: &str, course: &str) -> Result<()> {
    let enrollment = engine.enrollment(actor, learner, course)?;
    let states = engine.gate_states(actor, learner, course)?;
    let resume = engine.resume_order(actor, learner, course)?;

    println!("{learner} in {course}: {}%", enrollment.progress_pct);
    for s in &states {
        println!(
            "  module {:>2}  read={} practice={} cards={} quiz={}",
            s.order, s.content_read, s.practice_done, s.cards_done, s.quiz_passed
        );
    }
    println!("  Resume at module {} ({:?})", resume.order, resume.tier);
    Ok(())
}

fn cmd_item(engine: &Engine, actor: &Actor, subcommand: ItemCommands) -> Result<()> {
    match subcommand {
        ItemCommands::Create {
            bank,
            locale,
            prompt,
            choices,
            correct,
        } => {
            let draft = ItemDraft {
                bank_id: bank,
                locale,
                prompt,
                choices,
                correct_choice: correct,
            };
            print_json(&engine.create_item(actor, draft)?)
        }
        ItemCommands::Edit {
            item_id,
            prompt,
            choices,
            correct,
            expected_version,
        } => {
            let edit = ItemEdit {
                prompt,
                choices: (!choices.is_empty()).then_some(choices),
                correct_choice: correct,
                locale: None,
            };
            print_json(&engine.edit_item(actor, &ItemId(item_id), edit, expected_version)?)
        }
        ItemCommands::Publish {
            item_id,
            expected_version,
        } => {
            let item = engine.publish_item(actor, &ItemId(item_id), expected_version)?;
            println!("Published {} (version {})", item.id, item.version);
            Ok(())
        }
        ItemCommands::Unpublish {
            item_id,
            expected_version,
        } => {
            let item = engine.unpublish_item(actor, &ItemId(item_id), expected_version)?;
            println!("Unpublished {} (version {})", item.id, item.version);
            Ok(())
        }
        ItemCommands::History { item_id } => {
            print_json(&engine.item_history(actor, &ItemId(item_id))?)
        }
    }
}

fn cmd_exam(engine: &Engine, actor: &Actor, subcommand: ExamCommands) -> Result<()> {
    match subcommand {
        ExamCommands::Start {
            course,
            bank,
            count,
            locale,
        } => {
            let req = StartExam {
                bank_id: bank,
                count,
                locale,
            };
            print_json(&engine.start_exam(actor, &course, &req)?)
        }
        ExamCommands::Resume => match engine.resume_exam(actor)? {
            Some(exam) => print_json(&exam),
            None => {
                println!("No exam in progress");
                Ok(())
            }
        },
        ExamCommands::Save {
            exam_id,
            answers,
            remaining_sec,
        } => {
            let answers = parse_answers(&answers)?;
            print_json(&engine.save_exam(actor, &ExamId(exam_id), answers, remaining_sec)?)
        }
        ExamCommands::Submit { exam_id, answers } => {
            let answers = parse_answers(&answers)?;
            let result = engine.submit_exam(actor, &ExamId(exam_id), answers)?;
            println!(
                "{}: {}/{} ({}%, pass mark {}%)",
                if result.passed { "PASSED" } else { "FAILED" },
                result.score,
                result.total,
                result.score_pct,
                result.pass_pct
            );
            Ok(())
        }
    }
}

fn cmd_cert(engine: &Engine, actor: &Actor, subcommand: CertCommands) -> Result<()> {
    match subcommand {
        CertCommands::Issue {
            learner,
            course,
            score,
        } => {
            let req = IssueRequest {
                learner_id: learner,
                course_slug: course,
                score,
            };
            let issued = engine.issue_certificate(actor, &req)?;
            println!("Issued {}", issued.id);
            println!("  Code:    {}", issued.verification_code);
            println!("  Verify:  {}", issued.verification_url);
            println!("  Expires: {}", issued.expires_at);
            if let Some(prev) = &issued.supersedes {
                println!("  Supersedes: {prev}");
            }
            Ok(())
        }
        CertCommands::Verify { code } => {
            let v = engine.verify_certificate(&code)?;
            print_json(&v)?;
            if !v.valid || v.expired || v.revoked {
                bail!("certificate {code} did not verify: {}", v.reasons.join(", "));
            }
            Ok(())
        }
        CertCommands::Revoke { code, reason } => {
            let cert = engine.revoke_certificate(actor, &code, &reason)?;
            println!("Revoked {} ({reason})", cert.id);
            Ok(())
        }
        CertCommands::Recert { learner } => print_json(&engine.recert_status(actor, &learner)?),
        CertCommands::VerifyOffline { .. } => Err(anyhow!("offline verification runs without an engine")),
    }
}

fn cmd_verify_offline(
    dir: &Path,
    payload: &Path,
    signature: &str,
    public_key: Option<&str>,
) -> Result<()> {
    let signed_payload = std::fs::read_to_string(payload)
        .with_context(|| format!("failed to read {}", payload.display()))?;
    let public_key = match public_key {
        Some(k) => k.to_string(),
        None => storage::read_public_key(&dir.join(KEY_FILE))?.1,
    };
    let result = verify_offline(&signed_payload, signature, &public_key, chrono::Utc::now())?;
    println!(
        "signature: {}, expired: {}",
        if result.valid { "valid" } else { "INVALID" },
        result.expired
    );
    if !result.valid {
        bail!("signature does not match the payload");
    }
    Ok(())
}
