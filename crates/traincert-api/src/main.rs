//! Traincert API server.
//!
//! Reads newline-delimited JSON requests from stdin and writes one JSON
//! response per line to stdout.
//!
//! # Protocol
//!
//! ```text
//! {"id": 1, "op": "gate.mark_step", "actor": {"user_id": "u1", "role": "learner"},
//!  "params": {"course": "forklift", "module": "1", "step": "content_read"}}
//! ```
//!
//! Success is `{"id", "ok": true, "result": {...}}`; failure is
//! `{"id", "ok": false, "error": {"code", "message"}}` where `code` is one of
//! the engine's wire error codes. `ineligible` errors also carry `reasons`.
//!
//! The issuer key passphrase is read from `TRAINCERT_PASSPHRASE`; stdin is
//! reserved for requests.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result as AnyResult};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use traincert::auth::authenticated;
use traincert::{
    config, Actor, Engine, EvaluationInput, ExamId, IssueRequest, ItemId, StartExam, TrainError,
};

const ENV_PASSPHRASE: &str = "TRAINCERT_PASSPHRASE";

type OpResult = Result<Value, TrainError>;

// ── Response helpers ──────────────────────────────────────────────────────────

fn ok_response(id: Value, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result,
    })
}

fn error_response(id: Value, err: &TrainError) -> Value {
    let mut error = json!({
        "code": err.code(),
        "message": err.to_string(),
    });
    if let TrainError::Ineligible { reasons } = err {
        error["reasons"] = json!(reasons);
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> OpResult {
    serde_json::to_value(value).map_err(TrainError::from)
}

/// Decode the `params` object into a typed request.
fn params<T: DeserializeOwned>(params: &Value) -> Result<T, TrainError> {
    serde_json::from_value(params.clone())
        .map_err(|e| TrainError::InvalidInput(format!("bad params: {e}")))
}

// ── Request parameters ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MarkStepParams {
    course: String,
    module: String,
    step: String,
}

#[derive(Debug, Deserialize)]
struct CourseParams {
    course: String,
    #[serde(default)]
    learner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartExamParams {
    course: String,
    #[serde(flatten)]
    exam: StartExam,
}

#[derive(Debug, Deserialize)]
struct AnswersParams {
    exam_id: ExamId,
    #[serde(default)]
    answers: BTreeMap<ItemId, u32>,
    #[serde(default)]
    remaining_sec: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PublishParams {
    item_id: ItemId,
    #[serde(default)]
    expected_version: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    code: String,
}

#[derive(Debug, Deserialize)]
struct LearnerParams {
    #[serde(default)]
    learner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvaluationParams {
    learner_id: String,
    course: String,
    #[serde(flatten)]
    input: EvaluationInput,
}

// ── API Server ────────────────────────────────────────────────────────────────

struct ApiServer {
    engine: Engine,
}

impl ApiServer {
    fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Route one request to its handler and build the response line.
    fn handle_request(&self, request: Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let op = match request.get("op").and_then(|m| m.as_str()) {
            Some(op) => op.to_string(),
            None => {
                return error_response(id, &TrainError::InvalidInput("missing op".into()));
            }
        };
        let actor: Option<Actor> = match request.get("actor") {
            None | Some(Value::Null) => None,
            Some(v) => match serde_json::from_value(v.clone()) {
                Ok(a) => Some(a),
                Err(e) => {
                    return error_response(
                        id,
                        &TrainError::InvalidInput(format!("bad actor: {e}")),
                    );
                }
            },
        };
        let params = request
            .get("params")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));

        let span = tracing::info_span!("request", op = %op);
        let _guard = span.enter();

        match self.dispatch(&op, actor.as_ref(), &params) {
            Ok(result) => {
                tracing::debug!("ok");
                ok_response(id, result)
            }
            Err(e) => {
                if e.code() == "internal" {
                    tracing::error!(error = %e, "request failed");
                } else {
                    tracing::info!(code = e.code(), "request rejected");
                }
                error_response(id, &e)
            }
        }
    }

    fn dispatch(&self, op: &str, actor: Option<&Actor>, p: &Value) -> OpResult {
        match op {
            "ping" => Ok(json!({ "pong": true, "version": env!("CARGO_PKG_VERSION") })),
            "certificate.verify" => self.certificate_verify(p),
            _ => {
                let actor = authenticated(actor)?;
                match op {
                    "gate.mark_step" => self.gate_mark_step(actor, p),
                    "progress.resume" => self.progress_resume(actor, p),
                    "exam.start" => self.exam_start(actor, p),
                    "exam.resume" => self.exam_resume(actor),
                    "exam.save" => self.exam_save(actor, p),
                    "exam.submit" => self.exam_submit(actor, p),
                    "quiz.publish" => self.quiz_publish(actor, p),
                    "eligibility.check" => self.eligibility_check(actor, p),
                    "certificate.issue" => self.certificate_issue(actor, p),
                    "recert.status" => self.recert_status(actor, p),
                    "evaluation.record" => self.evaluation_record(actor, p),
                    _ => Err(TrainError::InvalidInput(format!("unknown op: {op}"))),
                }
            }
        }
    }

    // ── Progress ──────────────────────────────────────────────────────────────

    fn gate_mark_step(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: MarkStepParams = params(p)?;
        let outcome = self
            .engine
            .mark_step(actor, &req.course, &req.module, &req.step)?;
        Ok(json!({
            "ok": true,
            "changed": outcome.changed,
            "progress_pct": outcome.progress_pct,
            "resume_order": outcome.resume_order,
            "state": outcome.state,
        }))
    }

    fn progress_resume(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: CourseParams = params(p)?;
        let learner = req.learner_id.as_deref().unwrap_or(&actor.user_id);
        let decision = self.engine.resume_order(actor, learner, &req.course)?;
        Ok(json!({ "order": decision.order, "tier": decision.tier }))
    }

    // ── Exams ─────────────────────────────────────────────────────────────────

    fn exam_start(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: StartExamParams = params(p)?;
        to_value(&self.engine.start_exam(actor, &req.course, &req.exam)?)
    }

    fn exam_resume(&self, actor: &Actor) -> OpResult {
        match self.engine.resume_exam(actor)? {
            Some(exam) => to_value(&exam),
            None => Ok(json!({ "exam_id": null })),
        }
    }

    fn exam_save(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: AnswersParams = params(p)?;
        to_value(&self.engine.save_exam(
            actor,
            &req.exam_id,
            req.answers,
            req.remaining_sec,
        )?)
    }

    fn exam_submit(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: AnswersParams = params(p)?;
        to_value(&self.engine.submit_exam(actor, &req.exam_id, req.answers)?)
    }

    // ── Content ───────────────────────────────────────────────────────────────

    fn quiz_publish(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: PublishParams = params(p)?;
        let item = self
            .engine
            .publish_item(actor, &req.item_id, req.expected_version)?;
        Ok(json!({ "ok": true, "version": item.version }))
    }

    // ── Credentials ───────────────────────────────────────────────────────────

    fn eligibility_check(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: CourseParams = params(p)?;
        let learner = req.learner_id.as_deref().unwrap_or(&actor.user_id);
        let verdict = self.engine.check_eligibility(actor, learner, &req.course)?;
        Ok(json!({ "eligible": verdict.eligible, "reasons": verdict.reasons }))
    }

    fn certificate_issue(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: IssueRequest = params(p)?;
        let issued = self.engine.issue_certificate(actor, &req)?;
        Ok(json!({
            "id": issued.id,
            "verification_code": issued.verification_code,
            "verification_url": issued.verification_url,
            "issued_at": issued.issued_at,
            "expires_at": issued.expires_at,
            "supersedes": issued.supersedes,
        }))
    }

    fn certificate_verify(&self, p: &Value) -> OpResult {
        let req: VerifyParams = params(p)?;
        to_value(&self.engine.verify_certificate(&req.code)?)
    }

    fn recert_status(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: LearnerParams = params(p)?;
        let learner = req.learner_id.as_deref().unwrap_or(&actor.user_id);
        let status = self.engine.recert_status(actor, learner)?;
        Ok(json!({
            "hasCertificate": status.has_certificate,
            "due": status.due,
            "currentUntil": status.current_until,
            "certificateId": status.certificate_id,
        }))
    }

    fn evaluation_record(&self, actor: &Actor, p: &Value) -> OpResult {
        let req: EvaluationParams = params(p)?;
        to_value(
            &self
                .engine
                .record_evaluation(actor, &req.learner_id, &req.course, &req.input)?,
        )
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "traincert-api", about = "Traincert JSON API over stdio", version)]
struct Args {
    /// Data directory (default: $TRAINCERT_HOME or ~/.traincert)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn open_engine(args: &Args) -> AnyResult<Engine> {
    let dir = config::data_dir(args.data_dir.as_deref())?;
    let passphrase = std::env::var(ENV_PASSPHRASE)
        .with_context(|| format!("{ENV_PASSPHRASE} must be set"))?;
    Engine::open(&dir, &passphrase)
        .with_context(|| format!("failed to open data directory {}", dir.display()))
}

fn main() {
    // Log to stderr (stdout is reserved for responses).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let engine = match open_engine(&args) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(1);
        }
    };
    tracing::info!(key_id = %engine.issuer().key_id(), "traincert-api ready");

    let server = ApiServer::new(engine);
    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("stdin read error: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(trimmed) {
            Ok(request) => server.handle_request(request),
            Err(e) => error_response(
                Value::Null,
                &TrainError::InvalidInput(format!("parse error: {e}")),
            ),
        };

        let mut out = stdout.lock();
        if let Err(e) = serde_json::to_writer(&mut out, &response) {
            tracing::error!("failed to write response: {e}");
            break;
        }
        if let Err(e) = out.write_all(b"\n").and_then(|_| out.flush()) {
            tracing::error!("failed to write response: {e}");
            break;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
