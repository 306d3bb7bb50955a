//! SQLite-backed store.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` to allow concurrent readers while writers append
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` to protect relational integrity
//!
//! Issue and comment rows store timestamps as integer microseconds. Audit
//! rows keep `recorded_at` as RFC 3339 text because the chain hash covers
//! the timestamp byte-for-byte; truncating it to column precision would
//! invalidate re-verification.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use redress_core::audit::{AuditAction, AuditDraft, AuditEntry, CHAIN_ROOT};
use redress_core::model::{
    Channel, Comment, CommentId, Issue, IssueCategory, IssueId, PrincipalId,
};

use super::{AuditStore, CommentStore, IssueStore, StoreError, Versioned};

/// Busy timeout for engine database connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS issues (
    issue_id TEXT PRIMARY KEY CHECK (issue_id LIKE 'gr-%'),
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    category_type TEXT NOT NULL CHECK (length(trim(category_type)) > 0),
    category_sub_type TEXT NOT NULL CHECK (length(trim(category_sub_type)) > 0),
    subject TEXT NOT NULL CHECK (length(trim(subject)) > 0),
    detail TEXT NOT NULL DEFAULT '',
    priority TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high', 'critical')),
    status TEXT NOT NULL CHECK (status IN ('open', 'in_progress', 'resolved', 'closed', 'escalated')),
    reporter TEXT NOT NULL CHECK (length(trim(reporter)) > 0),
    assignee TEXT,
    escalation_level INTEGER NOT NULL DEFAULT 0 CHECK (escalation_level >= 0),
    created_at_us INTEGER NOT NULL,
    assigned_at_us INTEGER,
    first_response_at_us INTEGER,
    resolved_at_us INTEGER,
    closed_at_us INTEGER,
    reopenable_until_us INTEGER,
    resolution_note TEXT,
    CHECK ((assignee IS NULL) = (assigned_at_us IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_issues_status_priority
    ON issues(status, priority);

CREATE INDEX IF NOT EXISTS idx_issues_assignee
    ON issues(assignee) WHERE assignee IS NOT NULL;

CREATE TABLE IF NOT EXISTS issue_comments (
    comment_id TEXT PRIMARY KEY CHECK (comment_id LIKE 'cm-%'),
    issue_id TEXT NOT NULL REFERENCES issues(issue_id) ON DELETE CASCADE,
    author TEXT NOT NULL CHECK (length(trim(author)) > 0),
    channel TEXT NOT NULL CHECK (channel IN ('external', 'internal')),
    body TEXT NOT NULL CHECK (length(trim(body)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_issue_comments_issue_created
    ON issue_comments(issue_id, created_at_us);

CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id TEXT NOT NULL,
    actor TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action LIKE 'issue.%'),
    before_json TEXT NOT NULL,
    after_json TEXT NOT NULL,
    reason TEXT,
    recorded_at TEXT NOT NULL,
    prev_hash TEXT NOT NULL,
    entry_hash TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_audit_log_issue_seq
    ON audit_log(issue_id, seq);
"#;

/// SQLite implementation of all three store traits behind one connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the engine database at `path`, apply runtime
    /// pragmas, and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or configured.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(anyhow::Error::new(e).context(format!(
                    "create engine db directory {}",
                    parent.display()
                )))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Backend(
                anyhow::Error::new(e).context(format!("open engine database {}", path.display())),
            )
        })?;
        Self::from_connection(conn)
    }

    /// Fully in-memory database, for tests and ephemeral runs.
    ///
    /// # Errors
    ///
    /// Returns an error when SQLite refuses the connection.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.into())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_col<T>(idx: usize, text: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    text.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn dt_from_us(idx: usize, us: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {us}").into(),
        )
    })
}

fn opt_dt_from_us(idx: usize, us: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    us.map(|v| dt_from_us(idx, v)).transpose()
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Versioned<Issue>> {
    let issue = Issue {
        id: IssueId::new(row.get::<_, String>(0)?),
        category: IssueCategory::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?),
        subject: row.get(4)?,
        detail: row.get(5)?,
        priority: parse_col(6, &row.get::<_, String>(6)?)?,
        status: parse_col(7, &row.get::<_, String>(7)?)?,
        reporter: PrincipalId::from(row.get::<_, String>(8)?),
        assignee: row.get::<_, Option<String>>(9)?.map(PrincipalId::from),
        escalation_level: row.get(10)?,
        created_at: dt_from_us(11, row.get(11)?)?,
        assigned_at: opt_dt_from_us(12, row.get(12)?)?,
        first_response_at: opt_dt_from_us(13, row.get(13)?)?,
        resolved_at: opt_dt_from_us(14, row.get(14)?)?,
        closed_at: opt_dt_from_us(15, row.get(15)?)?,
        reopenable_until: opt_dt_from_us(16, row.get(16)?)?,
        resolution_note: row.get(17)?,
    };
    Ok(Versioned {
        record: issue,
        version: row.get(1)?,
    })
}

const ISSUE_COLUMNS: &str = "issue_id, version, category_type, category_sub_type, subject, \
     detail, priority, status, reporter, assignee, escalation_level, created_at_us, \
     assigned_at_us, first_response_at_us, resolved_at_us, closed_at_us, \
     reopenable_until_us, resolution_note";

fn us(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

fn opt_us(dt: Option<DateTime<Utc>>) -> Option<i64> {
    dt.map(us)
}

fn json_col(idx: usize, text: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let recorded: String = row.get(7)?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);
    let action: String = row.get(3)?;
    Ok(AuditEntry {
        seq: row.get(0)?,
        issue_id: IssueId::new(row.get::<_, String>(1)?),
        actor: PrincipalId::from(row.get::<_, String>(2)?),
        action: parse_col::<AuditAction>(3, &action)?,
        before: json_col(4, &row.get::<_, String>(4)?)?,
        after: json_col(5, &row.get::<_, String>(5)?)?,
        reason: row.get(6)?,
        recorded_at,
        prev_hash: row.get(8)?,
        entry_hash: row.get(9)?,
    })
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl IssueStore for SqliteStore {
    fn create(&self, issue: &Issue) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let result = conn.execute(
            "INSERT INTO issues (issue_id, version, category_type, category_sub_type, subject, \
             detail, priority, status, reporter, assignee, escalation_level, created_at_us, \
             assigned_at_us, first_response_at_us, resolved_at_us, closed_at_us, \
             reopenable_until_us, resolution_note) \
             VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                issue.id.as_str(),
                issue.category.type_id,
                issue.category.sub_type_id,
                issue.subject,
                issue.detail,
                issue.priority.as_str(),
                issue.status.as_str(),
                issue.reporter.as_str(),
                issue.assignee.as_ref().map(PrincipalId::as_str),
                issue.escalation_level,
                us(issue.created_at),
                opt_us(issue.assigned_at),
                opt_us(issue.first_response_at),
                opt_us(issue.resolved_at),
                opt_us(issue.closed_at),
                opt_us(issue.reopenable_until),
                issue.resolution_note,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate {
                    id: issue.id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self, id: &IssueId) -> Result<Option<Versioned<Issue>>, StoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let found = conn
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?1"),
                [id.as_str()],
                issue_from_row,
            )
            .optional()?;
        Ok(found)
    }

    fn update(&self, expected: u64, issue: &Issue) -> Result<u64, StoreError> {
        let mut conn = self.conn.lock().expect("connection lock poisoned");
        let tx = conn.transaction()?;
        let affected = tx.execute(
            "UPDATE issues SET version = version + 1, category_type = ?1, \
             category_sub_type = ?2, subject = ?3, detail = ?4, priority = ?5, status = ?6, \
             reporter = ?7, assignee = ?8, escalation_level = ?9, created_at_us = ?10, \
             assigned_at_us = ?11, first_response_at_us = ?12, resolved_at_us = ?13, \
             closed_at_us = ?14, reopenable_until_us = ?15, resolution_note = ?16 \
             WHERE issue_id = ?17 AND version = ?18",
            params![
                issue.category.type_id,
                issue.category.sub_type_id,
                issue.subject,
                issue.detail,
                issue.priority.as_str(),
                issue.status.as_str(),
                issue.reporter.as_str(),
                issue.assignee.as_ref().map(PrincipalId::as_str),
                issue.escalation_level,
                us(issue.created_at),
                opt_us(issue.assigned_at),
                opt_us(issue.first_response_at),
                opt_us(issue.resolved_at),
                opt_us(issue.closed_at),
                opt_us(issue.reopenable_until),
                issue.resolution_note,
                issue.id.as_str(),
                expected,
            ],
        )?;
        if affected == 0 {
            let found: Option<u64> = tx
                .query_row(
                    "SELECT version FROM issues WHERE issue_id = ?1",
                    [issue.id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(found.map_or_else(
                || StoreError::Missing {
                    id: issue.id.to_string(),
                },
                |found| StoreError::VersionMismatch {
                    id: issue.id.to_string(),
                    expected,
                    found,
                },
            ));
        }
        tx.commit()?;
        Ok(expected + 1)
    }

    fn all(&self) -> Result<Vec<Versioned<Issue>>, StoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let mut stmt =
            conn.prepare(&format!("SELECT {ISSUE_COLUMNS} FROM issues ORDER BY created_at_us"))?;
        let rows = stmt.query_map([], issue_from_row)?;
        let mut issues = Vec::new();
        for row in rows {
            issues.push(row?);
        }
        Ok(issues)
    }
}

impl CommentStore for SqliteStore {
    fn append_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        conn.execute(
            "INSERT INTO issue_comments (comment_id, issue_id, author, channel, body, \
             created_at_us) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id.as_str(),
                comment.issue_id.as_str(),
                comment.author.as_str(),
                comment.channel.as_str(),
                comment.body,
                us(comment.created_at),
            ],
        )?;
        Ok(())
    }

    fn comments_for(&self, id: &IssueId) -> Result<Vec<Comment>, StoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT comment_id, issue_id, author, channel, body, created_at_us \
             FROM issue_comments WHERE issue_id = ?1 ORDER BY created_at_us, rowid",
        )?;
        let rows = stmt.query_map([id.as_str()], |row| {
            Ok(Comment {
                id: CommentId::new(row.get::<_, String>(0)?),
                issue_id: IssueId::new(row.get::<_, String>(1)?),
                author: PrincipalId::from(row.get::<_, String>(2)?),
                channel: parse_col::<Channel>(3, &row.get::<_, String>(3)?)?,
                body: row.get(4)?,
                created_at: dt_from_us(5, row.get(5)?)?,
            })
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}

impl AuditStore for SqliteStore {
    fn append_audit(&self, draft: AuditDraft) -> Result<AuditEntry, StoreError> {
        let mut conn = self.conn.lock().expect("connection lock poisoned");
        let tx = conn.transaction()?;
        let prev: Option<String> = tx
            .query_row(
                "SELECT entry_hash FROM audit_log WHERE issue_id = ?1 \
                 ORDER BY seq DESC LIMIT 1",
                [draft.issue_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let prev = prev.unwrap_or_else(|| CHAIN_ROOT.to_string());

        // Seq is assigned by the database; seal with a placeholder.
        let mut entry = draft.seal(0, &prev);
        tx.execute(
            "INSERT INTO audit_log (issue_id, actor, action, before_json, after_json, reason, \
             recorded_at, prev_hash, entry_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.issue_id.as_str(),
                entry.actor.as_str(),
                entry.action.as_str(),
                entry.before.to_string(),
                entry.after.to_string(),
                entry.reason,
                entry.recorded_at.to_rfc3339(),
                entry.prev_hash,
                entry.entry_hash,
            ],
        )?;
        entry.seq = u64::try_from(tx.last_insert_rowid())
            .map_err(|e| StoreError::Backend(anyhow::Error::new(e).context("audit seq")))?;
        tx.commit()?;
        Ok(entry)
    }

    fn audit_for(
        &self,
        id: &IssueId,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT seq, issue_id, actor, action, before_json, after_json, reason, recorded_at, \
             prev_hash, entry_hash FROM audit_log \
             WHERE issue_id = ?1 AND seq > ?2 ORDER BY seq LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![id.as_str(), after_seq, limit], entry_from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
