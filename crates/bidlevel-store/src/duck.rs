//! DuckDB storage for the bid registry, the processing-job queue and reports.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use bidlevel_core::dictionary::division_key;
use bidlevel_core::{ClaimedJob, CoreError, JobStatus, LevelingReport, ProcessingJob};
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::StoreError;

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS bid_seq START 1;
CREATE SEQUENCE IF NOT EXISTS document_seq START 1;
CREATE SEQUENCE IF NOT EXISTS job_seq START 1;
CREATE SEQUENCE IF NOT EXISTS report_seq START 1;

CREATE TABLE IF NOT EXISTS bids (
    bid_id          VARCHAR NOT NULL,
    seq             BIGINT DEFAULT nextval('bid_seq'),
    division        VARCHAR NOT NULL,
    division_key    VARCHAR NOT NULL,
    contractor_id   VARCHAR NOT NULL,
    contractor_name VARCHAR NOT NULL,
    created_at      VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS bid_documents (
    doc_id      VARCHAR NOT NULL,
    seq         BIGINT DEFAULT nextval('document_seq'),
    bid_id      VARCHAR NOT NULL,
    filename    VARCHAR NOT NULL,
    storage_ref VARCHAR NOT NULL,
    created_at  VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
    job_id        VARCHAR NOT NULL,
    seq           BIGINT DEFAULT nextval('job_seq'),
    division      VARCHAR NOT NULL,
    meta          VARCHAR NOT NULL,
    status        VARCHAR NOT NULL,
    progress      INTEGER NOT NULL,
    batches_total INTEGER NOT NULL,
    batches_done  INTEGER NOT NULL,
    error         VARCHAR,
    created_at    VARCHAR NOT NULL,
    started_at    VARCHAR,
    finished_at   VARCHAR
);

CREATE TABLE IF NOT EXISTS reports (
    report_id    VARCHAR NOT NULL,
    seq          BIGINT DEFAULT nextval('report_seq'),
    job_id       VARCHAR NOT NULL,
    division     VARCHAR NOT NULL,
    division_key VARCHAR NOT NULL,
    report       VARCHAR NOT NULL,
    created_at   VARCHAR NOT NULL
);
";

const JOB_COLUMNS: &str = "job_id, division, meta, status, progress, batches_total, batches_done, \
     error, created_at, started_at, finished_at";

/// One contractor's bid for one division.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bid_id: String,
    pub division: String,
    pub contractor_id: String,
    pub contractor_name: String,
    pub created_at: DateTime<Utc>,
}

/// A stored file attached to a bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidDocument {
    pub doc_id: String,
    pub bid_id: String,
    pub filename: String,
    /// Opaque reference understood by a [`DocumentStore`](crate::DocumentStore).
    pub storage_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub report_id: String,
    pub job_id: String,
    pub division: String,
    pub created_at: DateTime<Utc>,
    pub report: LevelingReport,
}

/// DuckDB store for bids, jobs and reports.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for a file that survives restarts. Every statement runs under one connection
/// mutex, so job state changes are serialised within a process; the claim itself
/// is a single conditional `UPDATE … RETURNING`, so concurrent processes sharing
/// the file cannot both win the same job.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    // ── Bid registry ──

    pub fn add_bid(
        &self,
        division: &str,
        contractor_id: &str,
        contractor_name: &str,
    ) -> Result<Bid, StoreError> {
        let bid = Bid {
            bid_id: new_id(),
            division: division.to_string(),
            contractor_id: contractor_id.to_string(),
            contractor_name: contractor_name.to_string(),
            created_at: Utc::now(),
        };
        self.conn()?.execute(
            "INSERT INTO bids (bid_id, division, division_key, contractor_id, contractor_name, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                bid.bid_id,
                bid.division,
                division_key(division),
                bid.contractor_id,
                bid.contractor_name,
                timestamp(&bid.created_at),
            ],
        )?;
        info!(bid_id = %bid.bid_id, division, contractor_id, "added bid");
        Ok(bid)
    }

    pub fn add_bid_document(
        &self,
        bid_id: &str,
        filename: &str,
        storage_ref: &str,
    ) -> Result<BidDocument, StoreError> {
        let conn = self.conn()?;
        let exists: i64 = conn.query_row(
            "SELECT count(*) FROM bids WHERE bid_id = ?",
            params![bid_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(StoreError::BidNotFound(bid_id.to_string()));
        }
        let document = BidDocument {
            doc_id: new_id(),
            bid_id: bid_id.to_string(),
            filename: filename.to_string(),
            storage_ref: storage_ref.to_string(),
        };
        conn.execute(
            "INSERT INTO bid_documents (doc_id, bid_id, filename, storage_ref, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                document.doc_id,
                document.bid_id,
                document.filename,
                document.storage_ref,
                timestamp(&Utc::now()),
            ],
        )?;
        info!(bid_id, filename, "added bid document");
        Ok(document)
    }

    /// Bids for a division in registration order. `"23"`, `"23 00 00"` and
    /// `"Division 23"` all address the same division.
    pub fn bids_for_division(&self, division: &str) -> Result<Vec<Bid>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT bid_id, division, contractor_id, contractor_name, created_at
             FROM bids WHERE division_key = ? ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![division_key(division)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(bid_id, division, contractor_id, contractor_name, created_at)| {
                Ok(Bid {
                    bid_id,
                    division,
                    contractor_id,
                    contractor_name,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    /// Documents attached to a bid, oldest first, at most `limit`.
    pub fn documents_for_bid(
        &self,
        bid_id: &str,
        limit: usize,
    ) -> Result<Vec<BidDocument>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT doc_id, bid_id, filename, storage_ref
             FROM bid_documents WHERE bid_id = ? ORDER BY seq LIMIT ?",
        )?;
        let documents = stmt
            .query_map(params![bid_id, limit as i64], |row| {
                Ok(BidDocument {
                    doc_id: row.get(0)?,
                    bid_id: row.get(1)?,
                    filename: row.get(2)?,
                    storage_ref: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    // ── Job queue ──

    pub fn enqueue_job(
        &self,
        division: &str,
        meta: &serde_json::Value,
    ) -> Result<ProcessingJob, StoreError> {
        let job = ProcessingJob {
            job_id: new_id(),
            division: division.to_string(),
            meta: meta.clone(),
            status: JobStatus::Queued,
            progress: 0,
            batches_total: 0,
            batches_done: 0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        self.conn()?.execute(
            "INSERT INTO jobs (job_id, division, meta, status, progress, batches_total, batches_done, created_at)
             VALUES (?, ?, ?, ?, 0, 0, 0, ?)",
            params![
                job.job_id,
                job.division,
                serde_json::to_string(meta)?,
                job.status.as_str(),
                timestamp(&job.created_at),
            ],
        )?;
        info!(job_id = %job.job_id, division, "enqueued job");
        Ok(job)
    }

    /// Claim the oldest queued job and mark it running, in one statement.
    ///
    /// Returns `None` when the queue is empty or another worker won the race.
    pub fn claim_next_job(&self) -> Result<Option<ClaimedJob>, StoreError> {
        let conn = self.conn()?;
        let claimed = conn.query_row(
            "UPDATE jobs SET status = 'running', started_at = ?
             WHERE job_id = (SELECT job_id FROM jobs WHERE status = 'queued' ORDER BY seq LIMIT 1)
               AND status = 'queued'
             RETURNING job_id, division, meta",
            params![timestamp(&Utc::now())],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        );
        match claimed {
            Ok((job_id, division, meta)) => {
                info!(job_id = %job_id, division = %division, "claimed job");
                Ok(Some(ClaimedJob {
                    job_id,
                    division,
                    meta: serde_json::from_str(&meta)?,
                }))
            }
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_batches_total(&self, job_id: &str, batches_total: u32) -> Result<(), StoreError> {
        let conn = self.conn()?;
        require_running(&conn, job_id)?;
        conn.execute(
            "UPDATE jobs SET batches_total = ? WHERE job_id = ?",
            params![batches_total as i64, job_id],
        )?;
        Ok(())
    }

    /// Record progress on a running job.
    pub fn update_job_progress(
        &self,
        job_id: &str,
        batches_done: u32,
        progress: u8,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        require_running(&conn, job_id)?;
        conn.execute(
            "UPDATE jobs SET batches_done = ?, progress = ? WHERE job_id = ? AND status = 'running'",
            params![batches_done as i64, progress.min(100) as i32, job_id],
        )?;
        Ok(())
    }

    pub fn finish_job_success(&self, job_id: &str) -> Result<(), StoreError> {
        self.finish(job_id, JobStatus::Success, None)
    }

    pub fn finish_job_failed(&self, job_id: &str, error: &str) -> Result<(), StoreError> {
        self.finish(job_id, JobStatus::Failed, Some(error))
    }

    fn finish(&self, job_id: &str, status: JobStatus, error: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let current = current_status(&conn, job_id)?;
        current.transition(status)?;
        let progress: Option<i32> = (status == JobStatus::Success).then_some(100);
        let changed = conn.execute(
            "UPDATE jobs SET status = ?, error = ?, finished_at = ?, progress = coalesce(?, progress)
             WHERE job_id = ? AND status = ?",
            params![
                status.as_str(),
                error,
                timestamp(&Utc::now()),
                progress,
                job_id,
                current.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::Conflict {
                job_id: job_id.to_string(),
            });
        }
        match status {
            JobStatus::Failed => warn!(job_id, error = error.unwrap_or_default(), "job failed"),
            _ => info!(job_id, status = %status, "job finished"),
        }
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<ProcessingJob, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ?");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![job_id], JobRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?
            .into_job()
    }

    /// Most recent jobs first.
    pub fn list_jobs(&self, limit: usize) -> Result<Vec<ProcessingJob>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY seq DESC LIMIT ?");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], JobRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    // ── Reports ──

    /// Store a report without touching its job. It stays hidden from
    /// [`latest_report`](Self::latest_report) until the job succeeds.
    pub fn save_report(
        &self,
        job_id: &str,
        division: &str,
        report: &LevelingReport,
    ) -> Result<String, StoreError> {
        let report_id = insert_report(&*self.conn()?, job_id, division, report)?;
        info!(report_id = %report_id, job_id, division, "saved report");
        Ok(report_id)
    }

    /// Save the report and move the job from running to success in one
    /// transaction. Either both land or neither does.
    pub fn complete_job(
        &self,
        job_id: &str,
        division: &str,
        report: &LevelingReport,
    ) -> Result<String, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        current_status(&tx, job_id)?.transition(JobStatus::Success)?;
        let report_id = insert_report(&tx, job_id, division, report)?;
        let changed = tx.execute(
            "UPDATE jobs SET status = 'success', error = NULL, finished_at = ?, progress = 100
             WHERE job_id = ? AND status = 'running'",
            params![timestamp(&Utc::now()), job_id],
        )?;
        if changed == 0 {
            // dropping the transaction rolls the insert back
            return Err(StoreError::Conflict {
                job_id: job_id.to_string(),
            });
        }
        tx.commit()?;
        info!(report_id = %report_id, job_id, division, "saved report, job finished");
        Ok(report_id)
    }

    /// The newest report for a division written by a job that succeeded.
    pub fn latest_report(&self, division: &str) -> Result<Option<StoredReport>, StoreError> {
        let conn = self.conn()?;
        let row = conn.query_row(
            "SELECT r.report_id, r.job_id, r.division, r.report, r.created_at
             FROM reports r JOIN jobs j ON j.job_id = r.job_id
             WHERE r.division_key = ? AND j.status = 'success'
             ORDER BY r.seq DESC LIMIT 1",
            params![division_key(division)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        );
        match row {
            Ok((report_id, job_id, division, report, created_at)) => Ok(Some(StoredReport {
                report_id,
                job_id,
                division,
                created_at: parse_timestamp(&created_at)?,
                report: serde_json::from_str(&report)?,
            })),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn report_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT count(*) FROM reports", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

struct JobRow {
    job_id: String,
    division: String,
    meta: String,
    status: String,
    progress: i32,
    batches_total: i32,
    batches_done: i32,
    error: Option<String>,
    created_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
}

impl JobRow {
    fn read(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            job_id: row.get(0)?,
            division: row.get(1)?,
            meta: row.get(2)?,
            status: row.get(3)?,
            progress: row.get(4)?,
            batches_total: row.get(5)?,
            batches_done: row.get(6)?,
            error: row.get(7)?,
            created_at: row.get(8)?,
            started_at: row.get(9)?,
            finished_at: row.get(10)?,
        })
    }

    fn into_job(self) -> Result<ProcessingJob, StoreError> {
        Ok(ProcessingJob {
            job_id: self.job_id,
            division: self.division,
            meta: serde_json::from_str(&self.meta)?,
            status: self.status.parse()?,
            progress: self.progress.clamp(0, 100) as u8,
            batches_total: self.batches_total.max(0) as u32,
            batches_done: self.batches_done.max(0) as u32,
            error: self.error,
            created_at: parse_timestamp(&self.created_at)?,
            started_at: self.started_at.as_deref().map(parse_timestamp).transpose()?,
            finished_at: self.finished_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn insert_report(
    conn: &Connection,
    job_id: &str,
    division: &str,
    report: &LevelingReport,
) -> Result<String, StoreError> {
    let report_id = new_id();
    conn.execute(
        "INSERT INTO reports (report_id, job_id, division, division_key, report, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            report_id,
            job_id,
            division,
            division_key(division),
            serde_json::to_string(report)?,
            timestamp(&Utc::now()),
        ],
    )?;
    Ok(report_id)
}

fn current_status(conn: &Connection, job_id: &str) -> Result<JobStatus, StoreError> {
    let status = conn.query_row(
        "SELECT status FROM jobs WHERE job_id = ?",
        params![job_id],
        |row| row.get::<_, String>(0),
    );
    match status {
        Ok(s) => Ok(s.parse()?),
        Err(duckdb::Error::QueryReturnedNoRows) => Err(StoreError::JobNotFound(job_id.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Progress updates are only legal on a running job.
fn require_running(conn: &Connection, job_id: &str) -> Result<(), StoreError> {
    match current_status(conn, job_id)? {
        JobStatus::Running => Ok(()),
        from => Err(CoreError::InvalidTransition {
            from,
            to: JobStatus::Running,
        }
        .into()),
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Other(format!("bad timestamp {s:?}: {e}")))
}
