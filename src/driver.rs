/*!
 * Translation driver.
 *
 * The driver takes a job's unresolved blocks and pushes them through the
 * engine with a bounded worker pool. Per-job concurrency is bounded by the
 * stream buffer; a global semaphore shared across jobs caps total in-flight
 * engine calls, since the engine's capacity does not grow with job count.
 *
 * Every resolved block is checkpointed before the job's counters advance,
 * so an interrupted run can resume without repeating finished work.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

use anyhow::Result;

use crate::app_config::EngineConfig;
use crate::checkpoint::{BlockOutcome, CheckpointRecord, Repository, SourceBlockRecord};
use crate::engine::{TranslationEngine, TranslationRequest};
use crate::errors::EngineError;
use crate::language_utils;

/// One unit of work for the driver: a source block plus its language label
#[derive(Debug, Clone)]
pub struct BlockTask {
    /// The extracted block
    pub block: SourceBlockRecord,
    /// Language label from classification, if any
    pub detected_language: Option<String>,
}

/// Counter baseline the driver starts from, nonzero when resuming
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterBaseline {
    pub skipped: i64,
    pub translated: i64,
    pub failed: i64,
}

impl CounterBaseline {
    /// Resolved block count this baseline represents
    pub fn processed(&self) -> i64 {
        self.skipped + self.translated + self.failed
    }
}

/// Outcome totals after a driver run
#[derive(Debug, Clone, Copy)]
pub struct DriverReport {
    /// Blocks skipped as already in the target language (including baseline)
    pub skipped: i64,
    /// Blocks translated (including baseline)
    pub translated: i64,
    /// Blocks that exhausted retries (including baseline)
    pub failed: i64,
    /// True when the run stopped early due to cancellation
    pub cancelled: bool,
}

/// Resolution of a single block inside the worker pool
enum BlockResolution {
    Resolved {
        block_index: i64,
        outcome: BlockOutcome,
        detected_language: Option<String>,
        translated_text: Option<String>,
    },
    Cancelled,
}

/// Worker pool that resolves a job's blocks against the engine
pub struct TranslationDriver {
    engine: Arc<dyn TranslationEngine>,
    repository: Repository,
    engine_config: EngineConfig,
    /// Per-job worker pool width
    job_concurrency: usize,
    /// Cross-job admission limit on in-flight engine calls
    global_limit: Arc<Semaphore>,
}

impl TranslationDriver {
    /// Create a new driver
    pub fn new(
        engine: Arc<dyn TranslationEngine>,
        repository: Repository,
        engine_config: EngineConfig,
        job_concurrency: usize,
        global_limit: Arc<Semaphore>,
    ) -> Self {
        Self {
            engine,
            repository,
            engine_config,
            job_concurrency,
            global_limit,
        }
    }

    /// Drive the given blocks to resolution.
    ///
    /// Blocks whose detected language matches the target are checkpointed
    /// as skipped without an engine call. A block that exhausts its retries
    /// is checkpointed as failed; it never fails the job. Setting the cancel
    /// flag stops new engine calls and discards in-flight results.
    pub async fn run(
        &self,
        job_id: &str,
        target_language: &str,
        tasks: Vec<BlockTask>,
        baseline: CounterBaseline,
        cancel: Arc<AtomicBool>,
    ) -> Result<DriverReport> {
        info!(
            "Driving {} blocks for job {} (concurrency {})",
            tasks.len(),
            job_id,
            self.job_concurrency
        );

        let mut skipped = baseline.skipped;
        let mut translated = baseline.translated;
        let mut failed = baseline.failed;

        let mut resolutions = stream::iter(tasks.into_iter().map(|task| {
            let cancel = Arc::clone(&cancel);
            async move { self.resolve_block(target_language, task, cancel).await }
        }))
        .buffer_unordered(self.job_concurrency.max(1));

        let mut was_cancelled = false;

        while let Some(resolution) = resolutions.next().await {
            if cancel.load(Ordering::SeqCst) {
                was_cancelled = true;
            }

            let (block_index, outcome, detected_language, translated_text) = match resolution {
                BlockResolution::Cancelled => {
                    was_cancelled = true;
                    continue;
                }
                // A result arriving after cancellation is discarded unresolved
                BlockResolution::Resolved { .. } if was_cancelled => continue,
                BlockResolution::Resolved {
                    block_index,
                    outcome,
                    detected_language,
                    translated_text,
                } => (block_index, outcome, detected_language, translated_text),
            };

            let checkpoint = CheckpointRecord::new(
                job_id.to_string(),
                block_index,
                outcome,
                detected_language,
                translated_text,
            );
            self.repository.upsert_checkpoint(&checkpoint).await?;

            match outcome {
                BlockOutcome::Skipped => skipped += 1,
                BlockOutcome::Translated => translated += 1,
                BlockOutcome::Failed => failed += 1,
                BlockOutcome::Pending => unreachable!("driver never resolves to pending"),
            }

            // Counters advance only after the checkpoint is durable
            let processed = skipped + translated + failed;
            self.repository
                .update_counters(job_id, processed, skipped, translated, failed)
                .await?;
        }

        if was_cancelled {
            info!("Driver run for job {} cancelled", job_id);
        }

        Ok(DriverReport {
            skipped,
            translated,
            failed,
            cancelled: was_cancelled,
        })
    }

    /// Resolve a single block: skip, translate with retries, or fail
    async fn resolve_block(
        &self,
        target_language: &str,
        task: BlockTask,
        cancel: Arc<AtomicBool>,
    ) -> BlockResolution {
        if cancel.load(Ordering::SeqCst) {
            return BlockResolution::Cancelled;
        }

        let block = task.block;
        let detected = task.detected_language;

        // Skip decision: a confident label matching the target language
        // means the engine never sees this block
        if let Some(lang) = &detected {
            if language_utils::codes_match(lang, target_language) {
                debug!(
                    "Block {} already in target language {}, skipping",
                    block.block_index, target_language
                );
                return BlockResolution::Resolved {
                    block_index: block.block_index,
                    outcome: BlockOutcome::Skipped,
                    detected_language: detected,
                    translated_text: None,
                };
            }
        }

        // Hold a global permit for the whole call including retries
        let _permit = match Arc::clone(&self.global_limit).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return BlockResolution::Cancelled,
        };

        if cancel.load(Ordering::SeqCst) {
            return BlockResolution::Cancelled;
        }

        match self
            .translate_with_retries(&block.raw_text, detected.as_deref(), target_language)
            .await
        {
            Ok(text) => BlockResolution::Resolved {
                block_index: block.block_index,
                outcome: BlockOutcome::Translated,
                detected_language: detected,
                translated_text: Some(text),
            },
            Err(e) => {
                warn!(
                    "Block {} failed after retries: {}",
                    block.block_index, e
                );
                BlockResolution::Resolved {
                    block_index: block.block_index,
                    outcome: BlockOutcome::Failed,
                    detected_language: detected,
                    translated_text: None,
                }
            }
        }
    }

    /// Call the engine with a per-attempt timeout and bounded retries.
    ///
    /// Only transient errors are retried; malformed input fails immediately.
    async fn translate_with_retries(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String, EngineError> {
        let timeout = Duration::from_secs(self.engine_config.timeout_secs);
        let max_attempts = self.engine_config.retry_count + 1;

        let mut last_error = EngineError::RequestFailed("no attempts made".to_string());

        for attempt in 1..=max_attempts {
            let request = TranslationRequest {
                text: text.to_string(),
                source_language: source_language.map(str::to_string),
                target_language: target_language.to_string(),
            };

            let result = tokio::time::timeout(timeout, self.engine.translate(request)).await;

            let error = match result {
                Ok(Ok(response)) => return Ok(response.translated_text),
                Ok(Err(e)) => e,
                Err(_) => EngineError::Timeout(self.engine_config.timeout_secs),
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt < max_attempts {
                debug!(
                    "Engine call failed (attempt {}/{}): {}, retrying",
                    attempt, max_attempts, error
                );
                tokio::time::sleep(Duration::from_millis(
                    self.engine_config.retry_backoff_ms * attempt as u64,
                ))
                .await;
            }

            last_error = error;
        }

        Err(last_error)
    }
}
