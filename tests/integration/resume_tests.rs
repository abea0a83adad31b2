/*!
 * Resume tests: interrupted jobs continue from their checkpoints without
 * repeating resolved blocks.
 */

use std::sync::Arc;
use std::time::Duration;

use doctrans::assembler::OutputFormat;
use doctrans::checkpoint::{
    BlockOutcome, CheckpointRecord, JobStatus, SourceBlockRecord,
};
use doctrans::engine::MockEngine;
use doctrans::job::JobManager;

use crate::common::{ScriptedClassifier, build_manager, numbered_document};

/// Put a job into the state an interruption mid-translation leaves behind:
/// extraction done, the first `resolved` blocks checkpointed, counters stale.
async fn simulate_interrupted_job(
    manager: &JobManager,
    document: &str,
    blocks: &[String],
    resolved: usize,
) -> String {
    let job = manager
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let repo = manager.repository();

    repo.update_status(&job.id, JobStatus::Extracting).await.unwrap();
    let records: Vec<SourceBlockRecord> = blocks
        .iter()
        .enumerate()
        .map(|(i, text)| SourceBlockRecord::new(job.id.clone(), i as i64, text.clone(), None))
        .collect();
    repo.insert_source_blocks(records).await.unwrap();
    repo.set_total_blocks(&job.id, blocks.len() as i64).await.unwrap();
    repo.update_status(&job.id, JobStatus::Translating).await.unwrap();

    for (i, text) in blocks.iter().take(resolved).enumerate() {
        let cp = CheckpointRecord::new(
            job.id.clone(),
            i as i64,
            BlockOutcome::Translated,
            Some("fr".to_string()),
            Some(MockEngine::expected_translation(text, "en")),
        );
        repo.upsert_checkpoint(&cp).await.unwrap();
    }

    // Counters deliberately left at zero: the crash happened between the
    // checkpoint write and the counter update

    job.id
}

#[tokio::test]
async fn test_resume_shouldOnlyProcessUnresolvedBlocks() {
    let (document, blocks) = numbered_document(10);
    let engine = MockEngine::working();
    let manager = build_manager(
        engine.clone(),
        ScriptedClassifier::uniform("fr", &blocks),
    );

    let job_id = simulate_interrupted_job(&manager, &document, &blocks, 4).await;

    let done = manager.resume_job(&job_id).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_blocks, Some(10));
    assert_eq!(done.processed_blocks, 10);
    assert_eq!(done.blocks_translated, 10);
    assert_eq!(done.progress(), 100);

    // Only the 6 unresolved blocks reached the engine
    let seen = engine.seen_texts();
    assert_eq!(seen.len(), 6);
    for text in &blocks[..4] {
        assert!(!seen.contains(text));
    }
    for text in &blocks[4..] {
        assert!(seen.contains(text));
    }
}

#[tokio::test]
async fn test_resume_shouldReconcileCountersFromCheckpoints() {
    let (document, blocks) = numbered_document(5);
    let engine = MockEngine::working();
    let manager = build_manager(
        engine,
        ScriptedClassifier::uniform("fr", &blocks),
    );

    let job_id = simulate_interrupted_job(&manager, &document, &blocks, 3).await;

    // Counters were stale at zero; progress from checkpoints is 3/5
    let stale = manager.snapshot(&job_id).await.unwrap();
    assert_eq!(stale.processed_blocks, 0);

    let done = manager.resume_job(&job_id).await.unwrap();

    // Reconciliation restored the 3 checkpointed blocks and progress never
    // moved backwards from there
    assert_eq!(done.processed_blocks, 5);
    assert_eq!(done.blocks_translated, 5);
}

#[tokio::test]
async fn test_resume_withAllBlocksResolved_shouldCompleteWithoutEngineCalls() {
    let (document, blocks) = numbered_document(4);
    let engine = MockEngine::working();
    let manager = build_manager(
        engine.clone(),
        ScriptedClassifier::uniform("fr", &blocks),
    );

    let job_id = simulate_interrupted_job(&manager, &document, &blocks, 4).await;

    let done = manager.resume_job(&job_id).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.processed_blocks, 4);
    assert_eq!(engine.request_count(), 0);

    // The assembled output is complete despite the interrupted first run
    let output = manager.render_output(&job_id).await.unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.len(), 4);
}

#[tokio::test]
async fn test_resume_fromClassifying_shouldRebuildLanguagesFound() {
    let (document, blocks) = numbered_document(3);
    let engine = MockEngine::working();
    // Two French blocks and one with no confident label
    let classifier = ScriptedClassifier::new()
        .with_label(&blocks[0], "fr")
        .with_label(&blocks[1], "fr");
    let manager = build_manager(engine, classifier);

    // Interrupted after extraction persisted the blocks but before the
    // classification pass stored its histogram
    let job_id = simulate_interrupted_job(&manager, &document, &blocks, 0).await;
    manager
        .repository()
        .update_status(&job_id, JobStatus::Classifying)
        .await
        .unwrap();

    let done = manager.resume_job(&job_id).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.blocks_translated, 3);
    assert_eq!(done.languages_found.get("fr"), Some(&2));
    assert_eq!(done.languages_found.get("unknown"), Some(&1));
}

#[tokio::test]
async fn test_resume_shouldProduceSameOutputAsUninterruptedRun() {
    let (document, blocks) = numbered_document(6);

    // Baseline: the same document translated in one uninterrupted run
    let baseline = build_manager(
        MockEngine::working(),
        ScriptedClassifier::uniform("fr", &blocks),
    );
    let job = baseline
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    baseline.run_job(&job.id, document.as_bytes()).await.unwrap();
    let expected = baseline.render_output(&job.id).await.unwrap();

    // The same document interrupted after 3 blocks, then resumed
    let manager = build_manager(
        MockEngine::working(),
        ScriptedClassifier::uniform("fr", &blocks),
    );
    let job_id = simulate_interrupted_job(&manager, &document, &blocks, 3).await;
    let done = manager.resume_job(&job_id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    let resumed = manager.render_output(&job_id).await.unwrap();
    assert_eq!(resumed, expected);
}

#[tokio::test]
async fn test_resume_withSkippableRemainingBlocks_shouldSkipThem() {
    let (document, blocks) = numbered_document(4);
    let engine = MockEngine::working();

    // Remaining blocks 2 and 3 turn out to be in the target language
    let classifier = ScriptedClassifier::new()
        .with_label(&blocks[2], "en")
        .with_label(&blocks[3], "en");
    let manager = build_manager(engine.clone(), classifier);

    let job_id = simulate_interrupted_job(&manager, &document, &blocks, 2).await;

    let done = manager.resume_job(&job_id).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.blocks_translated, 2);
    assert_eq!(done.blocks_skipped, 2);
    assert_eq!(engine.request_count(), 0);
}

#[tokio::test]
async fn test_cancelledJob_shouldStayResumableAndFinishOnResume() {
    let (document, blocks) = numbered_document(8);
    // Each engine call takes 100ms so cancellation lands mid-run
    let engine = MockEngine::slow(100);
    let manager = Arc::new(build_manager(
        engine.clone(),
        ScriptedClassifier::uniform("fr", &blocks),
    ));

    let job = manager
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();

    let runner = Arc::clone(&manager);
    let job_id = job.id.clone();
    let doc = document.clone();
    let handle = tokio::spawn(async move { runner.run_job(&job_id, doc.as_bytes()).await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(manager.cancel_job(&job.id));

    let interrupted = handle.await.unwrap().unwrap();
    assert_eq!(interrupted.status, JobStatus::Translating);
    assert!(interrupted.processed_blocks < 8);

    let done = manager.resume_job(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.processed_blocks, 8);
    assert_eq!(done.progress(), 100);
}

#[tokio::test]
async fn test_resume_onJobWithoutSourceBlocks_shouldFail() {
    let (document, blocks) = numbered_document(3);
    let manager = build_manager(
        MockEngine::working(),
        ScriptedClassifier::uniform("fr", &blocks),
    );

    let job = manager
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();

    // Interrupted before extraction persisted anything
    assert!(manager.resume_job(&job.id).await.is_err());
}
