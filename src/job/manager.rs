/*!
 * Job manager: the pipeline's state machine.
 *
 * The manager creates jobs, runs them through extraction, classification,
 * and translation, and exposes status, resume, output, and deletion. A job
 * fails only when extraction fails; individual block failures during
 * translation are recorded and the job still completes.
 */

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::app_config::Config;
use crate::assembler::{self, OutputFormat};
use crate::checkpoint::{
    BlockOutcome, CheckpointRecord, JobRecord, JobStatus, Repository, SourceBlockRecord,
};
use crate::classifier::LanguageClassifier;
use crate::driver::{BlockTask, CounterBaseline, TranslationDriver};
use crate::engine::TranslationEngine;
use crate::errors::AppError;
use crate::extractor::{self, DocumentFormat};
use crate::file_utils;
use crate::job::models::JobSnapshot;

/// Orchestrates document translation jobs
pub struct JobManager {
    repository: Repository,
    engine: Arc<dyn TranslationEngine>,
    classifier: Arc<dyn LanguageClassifier>,
    config: Config,
    /// Cross-job admission limit, shared by every driver this manager creates
    global_limit: Arc<Semaphore>,
    /// Cancellation flags for jobs currently running
    cancel_flags: RwLock<HashMap<String, Arc<AtomicBool>>>,
}

impl JobManager {
    /// Create a new job manager
    pub fn new(
        repository: Repository,
        engine: Arc<dyn TranslationEngine>,
        classifier: Arc<dyn LanguageClassifier>,
        config: Config,
    ) -> Self {
        let global_limit = Arc::new(Semaphore::new(config.pipeline.global_concurrency.max(1)));
        Self {
            repository,
            engine,
            classifier,
            config,
            global_limit,
            cancel_flags: RwLock::new(HashMap::new()),
        }
    }

    /// Access the underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Register a document as a new pending job.
    ///
    /// The format is taken from the filename extension; an unsupported
    /// extension is rejected here, before anything is persisted.
    pub async fn create_job(
        &self,
        filename: &str,
        document: &[u8],
        target_language: Option<&str>,
        output_format: OutputFormat,
    ) -> Result<JobRecord> {
        let format = DocumentFormat::from_filename(filename)?;
        let target = target_language.unwrap_or(&self.config.target_language);

        let job = JobRecord::new(
            Uuid::new_v4().to_string(),
            filename.to_string(),
            file_utils::sha256_hex(document),
            format.to_string(),
            target.to_string(),
            output_format.to_string(),
        );

        self.repository.create_job(&job).await?;
        info!(
            "Created job {} for {} ({} -> {})",
            job.id, filename, format, target
        );

        Ok(job)
    }

    /// Run a pending job through the full pipeline
    pub async fn run_job(&self, job_id: &str, document: &[u8]) -> Result<JobRecord> {
        let job = self.require_job(job_id).await?;
        if job.status != JobStatus::Pending {
            bail!("Job {} is not pending (status: {})", job_id, job.status);
        }

        let cancel = self.register_cancel_flag(job_id);
        let started = Instant::now();

        let result = self.run_pipeline(&job, document, cancel).await;
        self.cancel_flags.write().remove(job_id);

        match result {
            Ok(outcome) => {
                if outcome == PipelineOutcome::Finished {
                    let elapsed = started.elapsed().as_millis() as i64;
                    self.repository.mark_completed(job_id, elapsed).await?;
                }
                self.require_job(job_id).await
            }
            Err(e) => {
                // Extraction and other fatal failures land here; the job
                // record carries the reason
                self.repository.mark_failed(job_id, &e.to_string()).await?;
                self.require_job(job_id).await
            }
        }
    }

    /// Resume an interrupted job, continuing from its checkpoints.
    ///
    /// Blocks with a resolved checkpoint are never reprocessed. Resumption
    /// requires that extraction completed before the interruption, since
    /// the original upload bytes are not retained.
    pub async fn resume_job(&self, job_id: &str) -> Result<JobRecord> {
        let job = self.require_job(job_id).await?;
        if !job.status.is_resumable() {
            bail!(
                "Job {} is {} and cannot be resumed",
                job_id,
                job.status
            );
        }

        let blocks = self.repository.get_source_blocks(job_id).await?;
        if blocks.is_empty() || job.total_blocks.is_none() {
            bail!(
                "Job {} was interrupted before extraction finished; submit the document again",
                job_id
            );
        }

        let checkpoints = self.repository.load_checkpoints(job_id).await?;
        let resolved: HashMap<i64, &CheckpointRecord> = checkpoints
            .iter()
            .filter(|cp| cp.outcome.is_resolved())
            .map(|cp| (cp.block_index, cp))
            .collect();

        let counts = self.repository.counters_from_checkpoints(job_id).await?;
        let baseline = CounterBaseline {
            skipped: counts.get(&BlockOutcome::Skipped).copied().unwrap_or(0),
            translated: counts.get(&BlockOutcome::Translated).copied().unwrap_or(0),
            failed: counts.get(&BlockOutcome::Failed).copied().unwrap_or(0),
        };

        // Reconcile counters with what the checkpoints actually say before
        // any new work starts
        self.repository
            .update_counters(
                job_id,
                baseline.processed(),
                baseline.skipped,
                baseline.translated,
                baseline.failed,
            )
            .await?;

        let remaining: Vec<BlockTask> = blocks
            .into_iter()
            .filter(|b| !resolved.contains_key(&b.block_index))
            .map(|block| {
                let detected_language = self.classifier.detect(&block.raw_text);
                BlockTask {
                    block,
                    detected_language,
                }
            })
            .collect();

        info!(
            "Resuming job {}: {} of {:?} blocks remaining",
            job_id,
            remaining.len(),
            job.total_blocks
        );

        let cancel = self.register_cancel_flag(job_id);
        let started = Instant::now();

        let result = self
            .translate_blocks(job_id, &job.target_language, remaining, baseline, cancel)
            .await;
        self.cancel_flags.write().remove(job_id);

        match result {
            Ok(PipelineOutcome::Finished) => {
                // The first run may have stopped before classification
                // stored its histogram; every checkpoint carries the label
                // its block was classified with, so rebuild it from those
                let checkpoints = self.repository.load_checkpoints(job_id).await?;
                let mut languages: HashMap<String, i64> = HashMap::new();
                for cp in &checkpoints {
                    let label = cp
                        .detected_language
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string());
                    *languages.entry(label).or_insert(0) += 1;
                }
                self.repository
                    .set_languages_found(job_id, &languages)
                    .await?;

                let elapsed = started.elapsed().as_millis() as i64;
                self.repository.mark_completed(job_id, elapsed).await?;
                self.require_job(job_id).await
            }
            Ok(PipelineOutcome::Cancelled) => self.require_job(job_id).await,
            Err(e) => {
                self.repository.mark_failed(job_id, &e.to_string()).await?;
                self.require_job(job_id).await
            }
        }
    }

    /// Point-in-time status view of a job
    pub async fn snapshot(&self, job_id: &str) -> Result<JobSnapshot> {
        let job = self.require_job(job_id).await?;
        Ok(JobSnapshot::from(&job))
    }

    /// List jobs, newest first, optionally filtered by status
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobSnapshot>> {
        let jobs = self.repository.list_jobs(status).await?;
        Ok(jobs.iter().map(JobSnapshot::from).collect())
    }

    /// Request cancellation of a running job.
    ///
    /// In-flight engine calls are discarded; already checkpointed blocks
    /// stay resolved and the job remains resumable.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        match self.cancel_flags.read().get(job_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!("Cancellation requested for job {}", job_id);
                true
            }
            None => false,
        }
    }

    /// Delete a job and all its persisted blocks and checkpoints
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.cancel_job(job_id);

        if !self.repository.delete_job(job_id).await? {
            return Err(anyhow!(AppError::JobNotFound(job_id.to_string())));
        }
        Ok(())
    }

    /// Render a completed job's output in its requested format
    pub async fn render_output(&self, job_id: &str) -> Result<String> {
        let job = self.require_job(job_id).await?;
        if job.status != JobStatus::Completed {
            bail!(
                "Job {} output is not available (status: {})",
                job_id,
                job.status
            );
        }

        let blocks = self.repository.get_source_blocks(job_id).await?;
        let checkpoints = self.repository.load_checkpoints(job_id).await?;

        let assembled = assembler::assemble(&blocks, &checkpoints)?;
        let format: OutputFormat = job.output_format.parse()?;
        assembler::render(&assembled, format)
    }

    // ===== Pipeline internals =====

    async fn run_pipeline(
        &self,
        job: &JobRecord,
        document: &[u8],
        cancel: Arc<AtomicBool>,
    ) -> Result<PipelineOutcome> {
        // Extraction is all-or-nothing: any failure here fails the job
        // and total_blocks stays unset
        self.repository
            .update_status(&job.id, JobStatus::Extracting)
            .await?;

        let format: DocumentFormat = job.source_format.parse()?;
        let blocks = extractor::extractor_for(format)
            .extract(document)
            .with_context(|| format!("Extraction failed for {}", job.filename))?;

        if blocks.is_empty() {
            bail!("Document contains no translatable blocks");
        }

        let total = blocks.len() as i64;
        let records: Vec<SourceBlockRecord> = blocks
            .iter()
            .map(|b| {
                SourceBlockRecord::new(
                    job.id.clone(),
                    b.index as i64,
                    b.text.clone(),
                    b.page.map(i64::from),
                )
            })
            .collect();

        self.repository.insert_source_blocks(records.clone()).await?;
        self.repository.set_total_blocks(&job.id, total).await?;
        debug!("Job {}: extracted {} blocks", job.id, total);

        // Classification labels blocks; the driver makes the skip decision
        self.repository
            .update_status(&job.id, JobStatus::Classifying)
            .await?;

        let mut languages: HashMap<String, i64> = HashMap::new();
        let tasks: Vec<BlockTask> = records
            .into_iter()
            .map(|block| {
                let detected_language = self.classifier.detect(&block.raw_text);
                let label = detected_language
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                *languages.entry(label).or_insert(0) += 1;
                BlockTask {
                    block,
                    detected_language,
                }
            })
            .collect();

        self.repository
            .set_languages_found(&job.id, &languages)
            .await?;

        self.translate_blocks(
            &job.id,
            &job.target_language,
            tasks,
            CounterBaseline::default(),
            cancel,
        )
        .await
    }

    async fn translate_blocks(
        &self,
        job_id: &str,
        target_language: &str,
        tasks: Vec<BlockTask>,
        baseline: CounterBaseline,
        cancel: Arc<AtomicBool>,
    ) -> Result<PipelineOutcome> {
        self.repository
            .update_status(job_id, JobStatus::Translating)
            .await?;

        let driver = TranslationDriver::new(
            Arc::clone(&self.engine),
            self.repository.clone(),
            self.config.engine.clone(),
            self.config.pipeline.job_concurrency,
            Arc::clone(&self.global_limit),
        );

        let report = driver
            .run(job_id, target_language, tasks, baseline, cancel)
            .await?;

        if report.cancelled {
            warn!("Job {} interrupted, resumable from checkpoints", job_id);
            return Ok(PipelineOutcome::Cancelled);
        }

        if report.failed > 0 {
            warn!(
                "Job {} completed with {} failed blocks",
                job_id, report.failed
            );
        }

        Ok(PipelineOutcome::Finished)
    }

    async fn require_job(&self, job_id: &str) -> Result<JobRecord> {
        self.repository
            .get_job(job_id)
            .await?
            .ok_or_else(|| anyhow!(AppError::JobNotFound(job_id.to_string())))
    }

    fn register_cancel_flag(&self, job_id: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .write()
            .insert(job_id.to_string(), Arc::clone(&flag));
        flag
    }
}

#[derive(Debug, PartialEq)]
enum PipelineOutcome {
    Finished,
    Cancelled,
}
