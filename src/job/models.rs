use serde::Serialize;
use std::collections::HashMap;

use crate::checkpoint::{JobRecord, JobStatus};

/// Point-in-time view of a job for status queries
///
/// Everything a caller polling a job needs, derived from the persistent
/// record. Progress is a whole-number percentage that only ever climbs.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    /// Job identifier
    pub id: String,
    /// Original upload filename
    pub filename: String,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Completion percentage, 0-100, truncated
    pub progress: i64,
    /// Block count, absent until extraction succeeds
    pub total_blocks: Option<i64>,
    /// Blocks resolved so far
    pub processed_blocks: i64,
    /// Blocks skipped as already in the target language
    pub blocks_skipped: i64,
    /// Blocks translated
    pub blocks_translated: i64,
    /// Blocks that failed non-fatally
    pub blocks_failed: i64,
    /// Detected languages and how many blocks carried each
    pub languages_found: HashMap<String, i64>,
    /// Failure description when the job failed
    pub error: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Completion timestamp, if terminal
    pub completed_at: Option<String>,
    /// Wall-clock processing time in milliseconds, if completed
    pub processing_time_ms: Option<i64>,
}

impl From<&JobRecord> for JobSnapshot {
    fn from(record: &JobRecord) -> Self {
        Self {
            id: record.id.clone(),
            filename: record.filename.clone(),
            status: record.status,
            progress: record.progress(),
            total_blocks: record.total_blocks,
            processed_blocks: record.processed_blocks,
            blocks_skipped: record.blocks_skipped,
            blocks_translated: record.blocks_translated,
            blocks_failed: record.blocks_failed,
            languages_found: record.languages_found.clone(),
            error: record.error.clone(),
            created_at: record.created_at.clone(),
            completed_at: record.completed_at.clone(),
            processing_time_ms: record.processing_time_ms,
        }
    }
}
