//! Database schema definitions.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Create or migrate the schema.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current = get_schema_version(conn)?;

    if current == 0 {
        log::info!("creating database schema v{SCHEMA_VERSION}");
        conn.execute_batch(CATALOG_SCHEMA)?;
        conn.execute_batch(CONTENT_SCHEMA)?;
        conn.execute_batch(EXAM_SCHEMA)?;
        conn.execute_batch(CREDENTIAL_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current < SCHEMA_VERSION {
        log::info!("migrating schema from v{current} to v{SCHEMA_VERSION}");
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Current schema version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;
    let version = crate::storage::optional(conn.query_row(
        "SELECT version FROM schema_version LIMIT 1",
        [],
        |row| row.get(0),
    ))?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Courses, modules, enrollments and per-module gate progress.
const CATALOG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    id          TEXT PRIMARY KEY,
    slug        TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS modules (
    id           TEXT PRIMARY KEY,
    course_id    TEXT NOT NULL REFERENCES courses(id),
    ord          INTEGER NOT NULL,
    module_key   TEXT,
    title        TEXT NOT NULL,
    content_ref  TEXT NOT NULL,
    demo         INTEGER NOT NULL DEFAULT 1,
    UNIQUE (course_id, ord),
    UNIQUE (course_id, module_key)
);

CREATE TABLE IF NOT EXISTS enrollments (
    id            TEXT PRIMARY KEY,
    learner_id    TEXT NOT NULL,
    course_id     TEXT NOT NULL REFERENCES courses(id),
    progress_pct  INTEGER NOT NULL DEFAULT 0 CHECK (progress_pct BETWEEN 0 AND 100),
    resume_state  TEXT,
    passed        INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (learner_id, course_id)
);

CREATE TABLE IF NOT EXISTS gate_states (
    enrollment_id  TEXT NOT NULL REFERENCES enrollments(id),
    module_id      TEXT NOT NULL REFERENCES modules(id),
    content_read   INTEGER NOT NULL DEFAULT 0,
    practice_done  INTEGER NOT NULL DEFAULT 0,
    cards_done     INTEGER NOT NULL DEFAULT 0,
    quiz_passed    INTEGER NOT NULL DEFAULT 0,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (enrollment_id, module_id)
);

CREATE TABLE IF NOT EXISTS quiz_attempts (
    id             TEXT PRIMARY KEY,
    enrollment_id  TEXT NOT NULL REFERENCES enrollments(id),
    module_id      TEXT NOT NULL REFERENCES modules(id),
    score_pct      INTEGER NOT NULL,
    passed         INTEGER NOT NULL,
    attempted_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS progress_counters (
    enrollment_id  TEXT NOT NULL REFERENCES enrollments(id),
    counter        TEXT NOT NULL,
    count          INTEGER NOT NULL,
    PRIMARY KEY (enrollment_id, counter)
);

CREATE INDEX IF NOT EXISTS idx_quiz_attempts_enrollment ON quiz_attempts(enrollment_id, module_id);
"#;

/// Versioned quiz items and their append-only revision log.
const CONTENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS quiz_items (
    id              TEXT PRIMARY KEY,
    bank_id         TEXT NOT NULL,
    locale          TEXT NOT NULL,
    prompt          TEXT NOT NULL,
    choices         TEXT NOT NULL,
    correct_choice  INTEGER NOT NULL,
    status          TEXT NOT NULL CHECK (status IN ('draft', 'published')),
    version         INTEGER NOT NULL,
    updated_by      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz_item_revisions (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id       TEXT NOT NULL REFERENCES quiz_items(id),
    version       INTEGER NOT NULL,
    action        TEXT NOT NULL,
    actor         TEXT NOT NULL,
    before_state  TEXT,
    after_state   TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE (item_id, version)
);

CREATE INDEX IF NOT EXISTS idx_quiz_items_bank ON quiz_items(bank_id, status);
"#;

/// Exam papers and sessions. The partial unique index is the authoritative
/// "one in-progress exam per learner" guarantee.
const EXAM_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS exam_papers (
    id          TEXT PRIMARY KEY,
    bank_id     TEXT NOT NULL,
    course_id   TEXT NOT NULL REFERENCES courses(id),
    locale      TEXT NOT NULL,
    item_ids    TEXT NOT NULL,
    requested   INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exam_sessions (
    id             TEXT PRIMARY KEY,
    paper_id       TEXT NOT NULL REFERENCES exam_papers(id),
    learner_id     TEXT NOT NULL,
    enrollment_id  TEXT NOT NULL REFERENCES enrollments(id),
    status         TEXT NOT NULL CHECK (status IN ('in_progress', 'submitted', 'expired')),
    answers        TEXT NOT NULL,
    remaining_sec  INTEGER NOT NULL,
    started_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    submitted_at   TEXT,
    score          INTEGER,
    total          INTEGER,
    passed         INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_exam_sessions_one_in_progress
    ON exam_sessions(learner_id) WHERE status = 'in_progress';
CREATE INDEX IF NOT EXISTS idx_exam_sessions_enrollment ON exam_sessions(enrollment_id, status);
"#;

/// Practical evaluations, certificates and the audit log.
const CREDENTIAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS employer_evaluations (
    id                     TEXT PRIMARY KEY,
    enrollment_id          TEXT NOT NULL UNIQUE REFERENCES enrollments(id),
    evaluator_id           TEXT NOT NULL,
    evaluator_name         TEXT NOT NULL,
    evaluated_on           TEXT NOT NULL,
    practical_pass         INTEGER NOT NULL,
    evaluator_signature    TEXT,
    trainee_signature      TEXT,
    notes                  TEXT,
    recorded_by            TEXT NOT NULL,
    updated_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS certificates (
    id                 TEXT PRIMARY KEY,
    enrollment_id      TEXT NOT NULL REFERENCES enrollments(id),
    verification_code  TEXT NOT NULL UNIQUE,
    signed_payload     TEXT NOT NULL,
    signature          TEXT NOT NULL,
    key_id             TEXT NOT NULL,
    issued_at          TEXT NOT NULL,
    expires_at         TEXT NOT NULL,
    revoked            INTEGER NOT NULL DEFAULT 0,
    revoked_at         TEXT,
    revoked_reason     TEXT,
    supersedes         TEXT
);

CREATE TABLE IF NOT EXISTS audit_log (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind  TEXT NOT NULL,
    entity_id    TEXT NOT NULL,
    action       TEXT NOT NULL,
    actor        TEXT NOT NULL,
    detail       TEXT NOT NULL,
    at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_certificates_enrollment ON certificates(enrollment_id, issued_at);
CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_kind, entity_id);
"#;
