/*!
 * Checkpoint store entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted job and block state.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job created, pipeline not started
    Pending,
    /// Block extraction in progress
    Extracting,
    /// Language classification in progress
    Classifying,
    /// Driving blocks through the translation engine
    Translating,
    /// All blocks resolved, output available
    Completed,
    /// Extraction failed or the job was aborted
    Failed,
}

impl JobStatus {
    /// Whether the job has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether an interrupted job in this state can be resumed
    pub fn is_resumable(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Extracting => write!(f, "extracting"),
            JobStatus::Classifying => write!(f, "classifying"),
            JobStatus::Translating => write!(f, "translating"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "extracting" => Ok(JobStatus::Extracting),
            "classifying" => Ok(JobStatus::Classifying),
            "translating" => Ok(JobStatus::Translating),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Outcome of processing a single block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOutcome {
    /// Block not yet resolved (in-memory only, never checkpointed)
    Pending,
    /// Block already in the target language, excluded from translation
    Skipped,
    /// Block successfully translated
    Translated,
    /// Translation failed after retries; original text is preserved
    Failed,
}

impl BlockOutcome {
    /// Whether this outcome counts toward `processed_blocks`
    pub fn is_resolved(&self) -> bool {
        !matches!(self, BlockOutcome::Pending)
    }
}

impl fmt::Display for BlockOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockOutcome::Pending => write!(f, "pending"),
            BlockOutcome::Skipped => write!(f, "skipped"),
            BlockOutcome::Translated => write!(f, "translated"),
            BlockOutcome::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BlockOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BlockOutcome::Pending),
            "skipped" => Ok(BlockOutcome::Skipped),
            "translated" => Ok(BlockOutcome::Translated),
            "failed" => Ok(BlockOutcome::Failed),
            _ => Err(anyhow::anyhow!("Invalid block outcome: {}", s)),
        }
    }
}

/// Persistent job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier (UUID)
    pub id: String,
    /// Original upload filename
    pub filename: String,
    /// SHA256 hash of the uploaded bytes
    pub file_hash: String,
    /// Declared source format (txt, md, csv, docx)
    pub source_format: String,
    /// Target language code
    pub target_language: String,
    /// Requested output representation (json, csv)
    pub output_format: String,
    /// Current job status
    pub status: JobStatus,
    /// Total number of blocks; None until extraction succeeds, then fixed
    pub total_blocks: Option<i64>,
    /// Number of resolved blocks
    pub processed_blocks: i64,
    /// Blocks skipped as already in the target language
    pub blocks_skipped: i64,
    /// Blocks successfully translated
    pub blocks_translated: i64,
    /// Blocks that failed non-fatally
    pub blocks_failed: i64,
    /// Histogram of detected languages, code -> block count
    pub languages_found: HashMap<String, i64>,
    /// Failure description, set only when status becomes failed
    pub error: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
    /// Completion timestamp (ISO 8601), if terminal
    pub completed_at: Option<String>,
    /// Wall-clock processing time in milliseconds, if completed
    pub processing_time_ms: Option<i64>,
}

impl JobRecord {
    /// Create a new pending job record
    pub fn new(
        id: String,
        filename: String,
        file_hash: String,
        source_format: String,
        target_language: String,
        output_format: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            filename,
            file_hash,
            source_format,
            target_language,
            output_format,
            status: JobStatus::Pending,
            total_blocks: None,
            processed_blocks: 0,
            blocks_skipped: 0,
            blocks_translated: 0,
            blocks_failed: 0,
            languages_found: HashMap::new(),
            error: None,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
            processing_time_ms: None,
        }
    }

    /// Completion percentage, truncated to a whole number.
    /// Zero until extraction has established the block count.
    pub fn progress(&self) -> i64 {
        match self.total_blocks {
            Some(total) if total > 0 => self.processed_blocks * 100 / total,
            _ => 0,
        }
    }
}

/// One extracted source block, immutable after extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBlockRecord {
    /// Job this block belongs to
    pub job_id: String,
    /// Stable zero-based block index
    pub block_index: i64,
    /// Raw extracted text
    pub raw_text: String,
    /// Structural marker (CSV row), if any
    pub page: Option<i64>,
}

impl SourceBlockRecord {
    /// Create a new source block record
    pub fn new(job_id: String, block_index: i64, raw_text: String, page: Option<i64>) -> Self {
        Self {
            job_id,
            block_index,
            raw_text,
            page,
        }
    }
}

/// Durable record of a block's processing outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Job this checkpoint belongs to
    pub job_id: String,
    /// Block index the outcome applies to
    pub block_index: i64,
    /// Resolved outcome (never Pending)
    pub outcome: BlockOutcome,
    /// Detected language label, if classification produced one
    pub detected_language: Option<String>,
    /// Translated text, present only when outcome is Translated
    pub translated_text: Option<String>,
    /// Write timestamp (ISO 8601)
    pub updated_at: String,
}

impl CheckpointRecord {
    /// Create a new checkpoint record
    pub fn new(
        job_id: String,
        block_index: i64,
        outcome: BlockOutcome,
        detected_language: Option<String>,
        translated_text: Option<String>,
    ) -> Self {
        Self {
            job_id,
            block_index,
            outcome,
            detected_language,
            translated_text,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
