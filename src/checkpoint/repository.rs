/*!
 * Repository for job, source block, and checkpoint persistence.
 *
 * All pipeline state flows through this type. Checkpoint upserts are keyed
 * on (job_id, block_index) so replaying a block during resume overwrites
 * rather than duplicates, and counter updates always follow the checkpoint
 * write they account for.
 */

use anyhow::{Context, Result, bail};
use log::{debug, info};
use rusqlite::{OptionalExtension, params};
use std::collections::HashMap;

use super::connection::DatabaseConnection;
use super::models::{BlockOutcome, CheckpointRecord, JobRecord, JobStatus, SourceBlockRecord};

/// Repository providing data access for the checkpoint store
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Access the underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // ===== Job operations =====

    /// Persist a new job record
    pub async fn create_job(&self, job: &JobRecord) -> Result<()> {
        let job = job.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO jobs (id, filename, file_hash, source_format, target_language,
                                       output_format, status, processed_blocks, blocks_skipped,
                                       blocks_translated, blocks_failed, languages_found,
                                       created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    params![
                        job.id,
                        job.filename,
                        job.file_hash,
                        job.source_format,
                        job.target_language,
                        job.output_format,
                        job.status.to_string(),
                        job.processed_blocks,
                        job.blocks_skipped,
                        job.blocks_translated,
                        job.blocks_failed,
                        serde_json::to_string(&job.languages_found)?,
                        job.created_at,
                        job.updated_at,
                    ],
                )
                .context("Failed to insert job")?;

                debug!("Created job {}", job.id);
                Ok(())
            })
            .await
    }

    /// Fetch a job by id
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let job = conn
                    .query_row(
                        "SELECT id, filename, file_hash, source_format, target_language,
                                output_format, status, total_blocks, processed_blocks,
                                blocks_skipped, blocks_translated, blocks_failed,
                                languages_found, error, created_at, updated_at,
                                completed_at, processing_time_ms
                         FROM jobs WHERE id = ?1",
                        params![job_id],
                        row_to_job,
                    )
                    .optional()
                    .context("Failed to query job")?;

                Ok(job)
            })
            .await
    }

    /// List jobs, newest first, optionally filtered by status
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobRecord>> {
        self.db
            .execute_async(move |conn| {
                let (sql, args): (&str, Vec<String>) = match status {
                    Some(s) => (
                        "SELECT id, filename, file_hash, source_format, target_language,
                                output_format, status, total_blocks, processed_blocks,
                                blocks_skipped, blocks_translated, blocks_failed,
                                languages_found, error, created_at, updated_at,
                                completed_at, processing_time_ms
                         FROM jobs WHERE status = ?1 ORDER BY created_at DESC",
                        vec![s.to_string()],
                    ),
                    None => (
                        "SELECT id, filename, file_hash, source_format, target_language,
                                output_format, status, total_blocks, processed_blocks,
                                blocks_skipped, blocks_translated, blocks_failed,
                                languages_found, error, created_at, updated_at,
                                completed_at, processing_time_ms
                         FROM jobs ORDER BY created_at DESC",
                        vec![],
                    ),
                };

                let mut stmt = conn.prepare(sql)?;
                let jobs = stmt
                    .query_map(rusqlite::params_from_iter(args.iter()), row_to_job)?
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to list jobs")?;

                Ok(jobs)
            })
            .await
    }

    /// Update a job's status, stamping completed_at when it turns terminal
    pub async fn update_status(&self, job_id: &str, status: JobStatus) -> Result<()> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let updated = if status.is_terminal() {
                    conn.execute(
                        "UPDATE jobs SET status = ?1, updated_at = ?2, completed_at = ?2 WHERE id = ?3",
                        params![status.to_string(), now, job_id],
                    )?
                } else {
                    conn.execute(
                        "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
                        params![status.to_string(), now, job_id],
                    )?
                };

                if updated == 0 {
                    bail!("Job not found: {}", job_id);
                }

                debug!("Job {} -> {}", job_id, status);
                Ok(())
            })
            .await
    }

    /// Mark a job failed with an error description
    pub async fn mark_failed(&self, job_id: &str, error: &str) -> Result<()> {
        let job_id = job_id.to_string();
        let error = error.to_string();

        self.db
            .execute_async(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let updated = conn.execute(
                    "UPDATE jobs SET status = 'failed', error = ?1, updated_at = ?2, completed_at = ?2
                     WHERE id = ?3",
                    params![error, now, job_id],
                )?;

                if updated == 0 {
                    bail!("Job not found: {}", job_id);
                }

                info!("Job {} failed: {}", job_id, error);
                Ok(())
            })
            .await
    }

    /// Mark a job completed, recording total wall-clock processing time
    pub async fn mark_completed(&self, job_id: &str, processing_time_ms: i64) -> Result<()> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let updated = conn.execute(
                    "UPDATE jobs SET status = 'completed', processing_time_ms = ?1,
                                     updated_at = ?2, completed_at = ?2
                     WHERE id = ?3",
                    params![processing_time_ms, now, job_id],
                )?;

                if updated == 0 {
                    bail!("Job not found: {}", job_id);
                }

                info!("Job {} completed in {}ms", job_id, processing_time_ms);
                Ok(())
            })
            .await
    }

    /// Record the block count established by extraction.
    ///
    /// The count is set exactly once. A second call for the same job fails
    /// rather than silently changing a value that block indices depend on.
    pub async fn set_total_blocks(&self, job_id: &str, total: i64) -> Result<()> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    "UPDATE jobs SET total_blocks = ?1, updated_at = ?2
                     WHERE id = ?3 AND total_blocks IS NULL",
                    params![total, chrono::Utc::now().to_rfc3339(), job_id],
                )?;

                if updated == 0 {
                    bail!("total_blocks already set or job not found: {}", job_id);
                }

                Ok(())
            })
            .await
    }

    /// Replace a job's progress counters
    pub async fn update_counters(
        &self,
        job_id: &str,
        processed: i64,
        skipped: i64,
        translated: i64,
        failed: i64,
    ) -> Result<()> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    "UPDATE jobs SET processed_blocks = ?1, blocks_skipped = ?2,
                                     blocks_translated = ?3, blocks_failed = ?4, updated_at = ?5
                     WHERE id = ?6",
                    params![
                        processed,
                        skipped,
                        translated,
                        failed,
                        chrono::Utc::now().to_rfc3339(),
                        job_id
                    ],
                )?;

                if updated == 0 {
                    bail!("Job not found: {}", job_id);
                }

                Ok(())
            })
            .await
    }

    /// Store the detected-language histogram for a job
    pub async fn set_languages_found(
        &self,
        job_id: &str,
        languages: &HashMap<String, i64>,
    ) -> Result<()> {
        let job_id = job_id.to_string();
        let json = serde_json::to_string(languages)?;

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    "UPDATE jobs SET languages_found = ?1, updated_at = ?2 WHERE id = ?3",
                    params![json, chrono::Utc::now().to_rfc3339(), job_id],
                )?;

                if updated == 0 {
                    bail!("Job not found: {}", job_id);
                }

                Ok(())
            })
            .await
    }

    /// Delete a job and, via cascade, its source blocks and checkpoints
    pub async fn delete_job(&self, job_id: &str) -> Result<bool> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![job_id])?;
                if deleted > 0 {
                    info!("Deleted job {}", job_id);
                }
                Ok(deleted > 0)
            })
            .await
    }

    // ===== Source block operations =====

    /// Store the complete extracted block list for a job, in one transaction
    pub async fn insert_source_blocks(&self, blocks: Vec<SourceBlockRecord>) -> Result<usize> {
        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare(
                    "INSERT INTO source_blocks (job_id, block_index, raw_text, page)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;

                let mut count = 0;
                for block in &blocks {
                    stmt.execute(params![
                        block.job_id,
                        block.block_index,
                        block.raw_text,
                        block.page
                    ])?;
                    count += 1;
                }

                debug!("Inserted {} source blocks", count);
                Ok(count)
            })
            .await
    }

    /// Load a job's source blocks in index order
    pub async fn get_source_blocks(&self, job_id: &str) -> Result<Vec<SourceBlockRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT job_id, block_index, raw_text, page
                     FROM source_blocks WHERE job_id = ?1 ORDER BY block_index",
                )?;

                let blocks = stmt
                    .query_map(params![job_id], |row| {
                        Ok(SourceBlockRecord {
                            job_id: row.get(0)?,
                            block_index: row.get(1)?,
                            raw_text: row.get(2)?,
                            page: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to load source blocks")?;

                Ok(blocks)
            })
            .await
    }

    // ===== Checkpoint operations =====

    /// Write or overwrite the checkpoint for one block.
    ///
    /// Idempotent on (job_id, block_index). The write commits before the
    /// caller advances any counter derived from it.
    pub async fn upsert_checkpoint(&self, checkpoint: &CheckpointRecord) -> Result<()> {
        let cp = checkpoint.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO block_checkpoints
                        (job_id, block_index, outcome, detected_language, translated_text, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(job_id, block_index) DO UPDATE SET
                        outcome = excluded.outcome,
                        detected_language = excluded.detected_language,
                        translated_text = excluded.translated_text,
                        updated_at = excluded.updated_at",
                    params![
                        cp.job_id,
                        cp.block_index,
                        cp.outcome.to_string(),
                        cp.detected_language,
                        cp.translated_text,
                        cp.updated_at,
                    ],
                )
                .context("Failed to upsert checkpoint")?;

                Ok(())
            })
            .await
    }

    /// Load a job's checkpoints in block index order
    pub async fn load_checkpoints(&self, job_id: &str) -> Result<Vec<CheckpointRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT job_id, block_index, outcome, detected_language, translated_text, updated_at
                     FROM block_checkpoints WHERE job_id = ?1 ORDER BY block_index",
                )?;

                let checkpoints = stmt
                    .query_map(params![job_id], |row| {
                        let outcome_str: String = row.get(2)?;
                        Ok((
                            CheckpointRecord {
                                job_id: row.get(0)?,
                                block_index: row.get(1)?,
                                outcome: BlockOutcome::Pending,
                                detected_language: row.get(3)?,
                                translated_text: row.get(4)?,
                                updated_at: row.get(5)?,
                            },
                            outcome_str,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to load checkpoints")?;

                checkpoints
                    .into_iter()
                    .map(|(mut cp, outcome_str)| {
                        cp.outcome = outcome_str.parse()?;
                        Ok(cp)
                    })
                    .collect()
            })
            .await
    }

    /// Recompute per-outcome counts from checkpoints, used at resume time
    pub async fn counters_from_checkpoints(&self, job_id: &str) -> Result<HashMap<BlockOutcome, i64>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT outcome, COUNT(*) FROM block_checkpoints
                     WHERE job_id = ?1 GROUP BY outcome",
                )?;

                let rows = stmt
                    .query_map(params![job_id], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to count checkpoints")?;

                let mut counts = HashMap::new();
                for (outcome_str, count) in rows {
                    counts.insert(outcome_str.parse::<BlockOutcome>()?, count);
                }

                Ok(counts)
            })
            .await
    }
}

/// Map a jobs table row to a JobRecord
fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
    let status_str: String = row.get(6)?;
    let languages_json: String = row.get(12)?;

    Ok(JobRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_hash: row.get(2)?,
        source_format: row.get(3)?,
        target_language: row.get(4)?,
        output_format: row.get(5)?,
        status: status_str.parse().unwrap_or(JobStatus::Failed),
        total_blocks: row.get(7)?,
        processed_blocks: row.get(8)?,
        blocks_skipped: row.get(9)?,
        blocks_translated: row.get(10)?,
        blocks_failed: row.get(11)?,
        languages_found: serde_json::from_str(&languages_json).unwrap_or_default(),
        error: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        completed_at: row.get(16)?,
        processing_time_ms: row.get(17)?,
    })
}
