//! Postgres-backed job store.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use vrec_models::{Job, JobId, JobStatus, NewJob, RuleSet, StorageStatus};

use crate::error::{DbError, DbResult};
use crate::repository::{repeat_exceeded_message, Claim, ClaimOutcome, JobRepository, SelectionPolicy};

/// Column list for `recognition_jobs` queries.
const COLUMNS: &str = "id, external_job_id, created_at, recognition_started_at, \
    recognition_completed_at, status, video_ref, recognition_text, storage_status, \
    storage_name, rule_set_json, exception_text, number_of_repeats";

/// Connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: StdDuration,
}

impl DbConfig {
    pub fn from_env() -> DbResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| DbError::config_error("DATABASE_URL is not set"))?;
        Ok(Self {
            database_url,
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            acquire_timeout: StdDuration::from_secs(
                std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        })
    }
}

/// Row shape of `recognition_jobs`.
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    external_job_id: String,
    created_at: DateTime<Utc>,
    recognition_started_at: Option<DateTime<Utc>>,
    recognition_completed_at: Option<DateTime<Utc>>,
    status: String,
    video_ref: String,
    recognition_text: Option<String>,
    storage_status: String,
    storage_name: String,
    rule_set_json: Option<String>,
    exception_text: Option<String>,
    number_of_repeats: i32,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e| DbError::invalid_row(row.id, format!("{}", e)))?;
        let storage_status: StorageStatus = row
            .storage_status
            .parse()
            .map_err(|e| DbError::invalid_row(row.id, format!("{}", e)))?;
        let rule_set = RuleSet::from_stored_json(row.rule_set_json.as_deref())
            .map_err(|e| DbError::invalid_row(row.id, format!("rule set: {}", e)))?;

        Ok(Job {
            id: JobId(row.id),
            external_job_id: row.external_job_id,
            status,
            storage_status,
            storage_name: row.storage_name,
            video_ref: row.video_ref,
            created_at: row.created_at,
            recognition_started_at: row.recognition_started_at,
            recognition_completed_at: row.recognition_completed_at,
            rule_set,
            recognition_text: row.recognition_text,
            exception_text: row.exception_text,
            number_of_repeats: u32::try_from(row.number_of_repeats).unwrap_or(0),
        })
    }
}

/// Postgres stores timestamps at microsecond precision; claims compare
/// timestamps for equality, so everything written is truncated first.
fn db_time(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(6)
}

/// Job store over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to job store");
        Ok(Self { pool })
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> DbResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn insert(&self, job: NewJob) -> DbResult<Job> {
        let query = format!(
            "INSERT INTO recognition_jobs \
                (external_job_id, status, storage_status, storage_name, video_ref, rule_set_json) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(&job.external_job_id)
            .bind(job.status.as_str())
            .bind(job.storage_status.as_str())
            .bind(&job.storage_name)
            .bind(&job.video_ref)
            .bind(job.rule_set.to_stored_json())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get(&self, id: JobId) -> DbResult<Option<Job>> {
        let query = format!("SELECT {COLUMNS} FROM recognition_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn select_eligible(&self, policy: &SelectionPolicy, now: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let query = format!(
            "SELECT {COLUMNS} FROM recognition_jobs \
             WHERE status = 'Uploaded' \
               AND storage_status = 'Uploaded' \
               AND (recognition_started_at IS NULL OR recognition_started_at < $1) \
               AND number_of_repeats <= $2 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(db_time(now - policy.stale_timeout))
            .bind(i32::try_from(policy.max_repeats).unwrap_or(i32::MAX))
            .bind(i64::try_from(policy.limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            match Job::try_from(row) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(error = %e, "Skipping unreadable job row"),
            }
        }
        Ok(jobs)
    }

    async fn try_claim(&self, job: &Job, max_repeats: u32, now: DateTime<Utc>) -> DbResult<ClaimOutcome> {
        let now = db_time(now);
        let seen_repeats = i32::try_from(job.number_of_repeats).unwrap_or(i32::MAX);

        if job.repeats_exhausted(max_repeats) {
            let result = sqlx::query(
                "UPDATE recognition_jobs \
                 SET status = 'Exception', exception_text = $2, recognition_completed_at = $3 \
                 WHERE id = $1 \
                   AND status = 'Uploaded' \
                   AND storage_status = 'Uploaded' \
                   AND recognition_started_at IS NOT DISTINCT FROM $4 \
                   AND number_of_repeats = $5",
            )
            .bind(job.id.get())
            .bind(repeat_exceeded_message(job.number_of_repeats, max_repeats))
            .bind(now)
            .bind(job.recognition_started_at)
            .bind(seen_repeats)
            .execute(&self.pool)
            .await?;

            return Ok(if result.rows_affected() == 1 {
                ClaimOutcome::RepeatExceeded {
                    repeats: job.number_of_repeats,
                    max_repeats,
                }
            } else {
                ClaimOutcome::Lost
            });
        }

        let result = sqlx::query(
            "UPDATE recognition_jobs \
             SET recognition_started_at = $2, number_of_repeats = number_of_repeats + 1 \
             WHERE id = $1 \
               AND status = 'Uploaded' \
               AND storage_status = 'Uploaded' \
               AND recognition_started_at IS NOT DISTINCT FROM $3 \
               AND number_of_repeats = $4",
        )
        .bind(job.id.get())
        .bind(now)
        .bind(job.recognition_started_at)
        .bind(seen_repeats)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() != 1 {
            return Ok(ClaimOutcome::Lost);
        }
        Ok(ClaimOutcome::Claimed(Claim {
            job_id: job.id,
            started_at: now,
            attempt: job.number_of_repeats + 1,
        }))
    }

    async fn complete(&self, claim: &Claim, recognition_text: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE recognition_jobs \
             SET status = 'Recognized', recognition_text = $3, recognition_completed_at = $4 \
             WHERE id = $1 AND status = 'Uploaded' AND recognition_started_at = $2",
        )
        .bind(claim.job_id.get())
        .bind(claim.started_at)
        .bind(recognition_text)
        .bind(db_time(now))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fail(&self, claim: &Claim, exception_text: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE recognition_jobs \
             SET status = 'Exception', exception_text = $3, recognition_completed_at = $4 \
             WHERE id = $1 AND status = 'Uploaded' AND recognition_started_at = $2",
        )
        .bind(claim.job_id.get())
        .bind(claim.started_at)
        .bind(exception_text)
        .bind(db_time(now))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
