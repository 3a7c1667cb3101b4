//! The engine facade: authorization, clock and transaction boundaries over
//! the component modules.
//!
//! Every learner-facing call takes the calling [`Actor`]. Validation and
//! ownership checks happen before the store is touched.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;

use crate::auth::{Actor, Role};
use crate::catalog::{self, Course, Module, NewModule};
use crate::config::EngineConfig;
use crate::content::{self, ItemDraft, ItemEdit, QuizItem, QuizItemRevision};
use crate::credential::{
    self, Certificate, IssueRequest, IssuedCertificate, RecertStatus, Verification,
};
use crate::crypto::keys::IssuerKey;
use crate::eligibility::{self, Eligibility, DEFAULT_SIGNALS};
use crate::error::{Result, TrainError};
use crate::evaluation::{self, EmployerEvaluation, EvaluationInput};
use crate::exam::{self, ExamResult, ResumedExam, SavedProgress, StartExam, StartedExam};
use crate::gate::{self, GateState, GateStep, MarkOutcome, QuizAttempt};
use crate::ids::{ExamId, ItemId};
use crate::notify::{self, LogNotifier, Notification, Notifier};
use crate::progress::{self, Enrollment, ResumeDecision};
use crate::storage::{self, Database, DB_FILE};
use crate::time::{to_rfc3339, Clock, SystemClock};

const STAFF: [Role; 1] = [Role::Staff];

/// Training progression and credential engine.
pub struct Engine {
    db: Database,
    config: EngineConfig,
    issuer: IssuerKey,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig, issuer: IssuerKey) -> Self {
        Self {
            db,
            config,
            issuer,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Open the engine over a data directory: config, database and the
    /// passphrase-sealed issuer key.
    pub fn open(data_dir: &Path, passphrase: &str) -> Result<Self> {
        let config = EngineConfig::load(data_dir)?;
        let db = Database::open(&data_dir.join(DB_FILE))?;
        let issuer = storage::load_issuer_key(&data_dir.join(storage::key_file::KEY_FILE), passphrase)?;
        log::info!("engine opened at {} with key {}", data_dir.display(), issuer.key_id());
        Ok(Self::new(db, config, issuer))
    }

    /// Create a data directory with a fresh issuer key and empty database.
    /// Refuses to overwrite an existing key.
    pub fn init(data_dir: &Path, passphrase: &str) -> Result<Self> {
        let key_path = data_dir.join(storage::key_file::KEY_FILE);
        if key_path.exists() {
            return Err(TrainError::Conflict(format!(
                "{} already exists",
                key_path.display()
            )));
        }
        std::fs::create_dir_all(data_dir)?;
        let issuer = IssuerKey::generate();
        storage::save_issuer_key(&issuer, &key_path, passphrase, &to_rfc3339(Utc::now()))?;
        Self::open(data_dir, passphrase)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn issuer(&self) -> &IssuerKey {
        &self.issuer
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn notify(&self, notification: Notification) {
        notify::dispatch(self.notifier.as_ref(), notification);
    }

    // ── Catalog ──────────────────────────────────────────────────────────

    pub fn create_course(&self, actor: &Actor, slug: &str, title: &str) -> Result<Course> {
        actor.require_any(&STAFF)?;
        catalog::create_course(&self.db, self.clock.as_ref(), slug, title)
    }

    pub fn add_module(&self, actor: &Actor, course_slug: &str, module: NewModule) -> Result<Module> {
        actor.require_any(&STAFF)?;
        catalog::add_module(&self.db, course_slug, module)
    }

    /// Modules of a course; `DataIntegrity` when orders are not `1..=N`.
    pub fn course_modules(&self, course_slug: &str) -> Result<Vec<Module>> {
        self.db.read_retrying(|c| {
            let course = catalog::course_by_slug(c, course_slug)?;
            catalog::course_modules(c, &course.id)
        })
    }

    /// Enroll the actor in a course (no-op when already enrolled).
    pub fn enroll(&self, actor: &Actor, course_slug: &str) -> Result<Enrollment> {
        let now = to_rfc3339(self.now());
        self.db.with_conn(|c| {
            let course = catalog::course_by_slug(c, course_slug)?;
            progress::ensure_enrollment(c, &actor.user_id, &course.id, &now)
        })
    }

    /// A learner's enrollment. The learner or staff only.
    pub fn enrollment(&self, actor: &Actor, learner_id: &str, course_slug: &str) -> Result<Enrollment> {
        actor.require_owner(learner_id)?;
        self.db.read_retrying(|c| {
            let course = catalog::course_by_slug(c, course_slug)?;
            progress::find_enrollment(c, learner_id, &course.id)?
                .ok_or_else(|| TrainError::NotFound(format!("enrollment of {learner_id} in {course_slug}")))
        })
    }

    // ── Gates and progress ───────────────────────────────────────────────

    /// Mark a gate step for the actor. `step` is parsed before anything
    /// else, so an unknown step never reaches the store.
    pub fn mark_step(
        &self,
        actor: &Actor,
        course_slug: &str,
        module_key: &str,
        step: &str,
    ) -> Result<MarkOutcome> {
        let step: GateStep = step.parse()?;
        let now = to_rfc3339(self.now());
        self.db.with_tx(TransactionBehavior::Immediate, |tx| {
            let course = catalog::course_by_slug(tx, course_slug)?;
            let modules = catalog::course_modules(tx, &course.id)?;
            let enrollment = progress::ensure_enrollment(tx, &actor.user_id, &course.id, &now)?;
            gate::mark_step_done(tx, &enrollment, &modules, module_key, step, &now)
        })
    }

    /// Record a module quiz score for the actor.
    pub fn record_quiz_attempt(
        &self,
        actor: &Actor,
        course_slug: &str,
        module_key: &str,
        score_pct: u32,
    ) -> Result<(QuizAttempt, Option<MarkOutcome>)> {
        let now = to_rfc3339(self.now());
        let pass_pct = self.config.pass_pct;
        self.db.with_tx(TransactionBehavior::Immediate, |tx| {
            let course = catalog::course_by_slug(tx, course_slug)?;
            let modules = catalog::course_modules(tx, &course.id)?;
            let enrollment = progress::ensure_enrollment(tx, &actor.user_id, &course.id, &now)?;
            gate::record_quiz_attempt(tx, &enrollment, &modules, module_key, score_pct, pass_pct, &now)
        })
    }

    pub fn gate_states(&self, actor: &Actor, learner_id: &str, course_slug: &str) -> Result<Vec<GateState>> {
        let enrollment = self.enrollment(actor, learner_id, course_slug)?;
        self.db.read_retrying(|c| gate::gate_states(c, &enrollment.id))
    }

    /// Whether module `order` is unlocked for the learner.
    pub fn is_module_unlocked(
        &self,
        actor: &Actor,
        learner_id: &str,
        course_slug: &str,
        order: u32,
    ) -> Result<bool> {
        actor.require_owner(learner_id)?;
        self.db.read_retrying(|c| {
            let course = catalog::course_by_slug(c, course_slug)?;
            let modules = catalog::course_modules(c, &course.id)?;
            match progress::find_enrollment(c, learner_id, &course.id)? {
                Some(e) => gate::is_module_unlocked(c, &e.id, &modules, order),
                None if modules.iter().any(|m| m.order == order) => Ok(order == 1),
                None => Err(TrainError::NotFound(format!("module order {order}"))),
            }
        })
    }

    /// Where the learner should resume.
    pub fn resume_order(&self, actor: &Actor, learner_id: &str, course_slug: &str) -> Result<ResumeDecision> {
        actor.require_owner(learner_id)?;
        self.db
            .read_retrying(|c| progress::resolve_resume_order(c, course_slug, learner_id))
    }

    /// Atomically bump one of the actor's progress counters.
    pub fn increment_counter(
        &self,
        actor: &Actor,
        course_slug: &str,
        counter: &str,
        delta: i64,
    ) -> Result<i64> {
        if counter.trim().is_empty() {
            return Err(TrainError::InvalidInput("counter name is required".into()));
        }
        let now = to_rfc3339(self.now());
        self.db.with_conn(|c| {
            let course = catalog::course_by_slug(c, course_slug)?;
            let enrollment = progress::ensure_enrollment(c, &actor.user_id, &course.id, &now)?;
            progress::increment_counter(c, &enrollment.id, counter, delta)
        })
    }

    // ── Quiz content ─────────────────────────────────────────────────────

    pub fn create_item(&self, actor: &Actor, draft: ItemDraft) -> Result<QuizItem> {
        actor.require_any(&STAFF)?;
        content::create_item(&self.db, &actor.user_id, draft, &to_rfc3339(self.now()))
    }

    pub fn edit_item(
        &self,
        actor: &Actor,
        id: &ItemId,
        edit: ItemEdit,
        expected_version: Option<u32>,
    ) -> Result<QuizItem> {
        actor.require_any(&STAFF)?;
        content::edit_item(&self.db, id, &actor.user_id, edit, expected_version, &to_rfc3339(self.now()))
    }

    pub fn publish_item(&self, actor: &Actor, id: &ItemId, expected_version: Option<u32>) -> Result<QuizItem> {
        actor.require_any(&STAFF)?;
        content::publish_item(&self.db, id, &actor.user_id, expected_version, &to_rfc3339(self.now()))
    }

    pub fn unpublish_item(&self, actor: &Actor, id: &ItemId, expected_version: Option<u32>) -> Result<QuizItem> {
        actor.require_any(&STAFF)?;
        content::unpublish_item(&self.db, id, &actor.user_id, expected_version, &to_rfc3339(self.now()))
    }

    pub fn item_history(&self, actor: &Actor, id: &ItemId) -> Result<Vec<QuizItemRevision>> {
        actor.require_any(&STAFF)?;
        self.db.read_retrying(|c| content::item_history(c, id))
    }

    // ── Exams ────────────────────────────────────────────────────────────

    /// Start an exam for the actor in a course.
    pub fn start_exam(&self, actor: &Actor, course_slug: &str, req: &StartExam) -> Result<StartedExam> {
        let now = self.now();
        let enrollment = self.db.with_conn(|c| {
            let course = catalog::course_by_slug(c, course_slug)?;
            progress::ensure_enrollment(c, &actor.user_id, &course.id, &to_rfc3339(now))
        })?;
        exam::start_exam(
            &self.db,
            &enrollment,
            req,
            self.config.exam_duration_sec,
            now,
            &mut rand::thread_rng(),
        )
    }

    /// The actor's in-progress exam, if any.
    pub fn resume_exam(&self, actor: &Actor) -> Result<Option<ResumedExam>> {
        exam::resume_exam(&self.db, &actor.user_id, self.now())
    }

    pub fn save_exam(
        &self,
        actor: &Actor,
        exam_id: &ExamId,
        answers: BTreeMap<ItemId, u32>,
        remaining_sec: Option<i64>,
    ) -> Result<SavedProgress> {
        exam::save_exam_progress(&self.db, actor, exam_id, answers, remaining_sec, self.now())
    }

    pub fn submit_exam(
        &self,
        actor: &Actor,
        exam_id: &ExamId,
        answers: BTreeMap<ItemId, u32>,
    ) -> Result<ExamResult> {
        let result = exam::submit_exam(
            &self.db,
            actor,
            exam_id,
            answers,
            self.config.pass_pct,
            self.now(),
        )?;
        self.notify(Notification::ExamSubmitted {
            learner_id: actor.user_id.clone(),
            exam_id: result.exam_id.clone(),
            passed: result.passed,
            score_pct: result.score_pct,
        });
        Ok(result)
    }

    // ── Practical evaluation ─────────────────────────────────────────────

    /// Record the practical evaluation of a learner in a course.
    pub fn record_evaluation(
        &self,
        actor: &Actor,
        learner_id: &str,
        course_slug: &str,
        input: &EvaluationInput,
    ) -> Result<EmployerEvaluation> {
        actor.require_any(&evaluation::EVALUATOR_ROLES)?;
        let now = to_rfc3339(self.now());
        self.db.with_tx(TransactionBehavior::Immediate, |tx| {
            let course = catalog::course_by_slug(tx, course_slug)?;
            let enrollment = progress::find_enrollment(tx, learner_id, &course.id)?.ok_or_else(|| {
                TrainError::NotFound(format!("enrollment of {learner_id} in {course_slug}"))
            })?;
            evaluation::record_evaluation(tx, actor, &enrollment.id, input, &now)
        })
    }

    // ── Eligibility and credentials ──────────────────────────────────────

    pub fn check_eligibility(&self, actor: &Actor, learner_id: &str, course_slug: &str) -> Result<Eligibility> {
        actor.require_owner(learner_id)?;
        eligibility::check_eligibility(&self.db, &DEFAULT_SIGNALS, learner_id, course_slug)
    }

    /// Issue a certificate once every eligibility signal holds.
    pub fn issue_certificate(&self, actor: &Actor, req: &IssueRequest) -> Result<IssuedCertificate> {
        actor.require_any(&credential::ISSUER_ROLES)?;
        let verdict =
            eligibility::check_eligibility(&self.db, &DEFAULT_SIGNALS, &req.learner_id, &req.course_slug)?;
        if !verdict.eligible {
            return Err(TrainError::Ineligible {
                reasons: verdict.reasons,
            });
        }
        let issued = credential::issue_certificate(
            &self.db,
            &self.issuer,
            &self.config,
            actor,
            req,
            self.now(),
        )?;
        self.notify(Notification::CertificateIssued {
            learner_id: req.learner_id.clone(),
            certificate_id: issued.id.clone(),
            verification_url: issued.verification_url.clone(),
        });
        Ok(issued)
    }

    /// Public verification by code.
    pub fn verify_certificate(&self, code: &str) -> Result<Verification> {
        credential::verify_certificate(&self.db, &self.issuer, code, self.now())
    }

    pub fn revoke_certificate(&self, actor: &Actor, code: &str, reason: &str) -> Result<Certificate> {
        let cert = credential::revoke_certificate(&self.db, actor, code, reason, self.now())?;
        self.notify(Notification::CertificateRevoked {
            certificate_id: cert.id.clone(),
            reason: reason.to_string(),
        });
        Ok(cert)
    }

    /// Renewal status of the learner's latest certificate.
    pub fn recert_status(&self, actor: &Actor, learner_id: &str) -> Result<RecertStatus> {
        actor.require_owner(learner_id)?;
        let years = self.config.recert_years;
        let now = self.now();
        self.db
            .read_retrying(|c| credential::due_for_recert(c, learner_id, years, now))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db", &self.db)
            .field("key_id", &self.issuer.key_id())
            .finish()
    }
}
