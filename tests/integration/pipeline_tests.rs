/*!
 * End-to-end pipeline tests: extraction, classification, translation,
 * and output assembly against scripted engines and classifiers.
 */

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use doctrans::assembler::OutputFormat;
use doctrans::checkpoint::{BlockOutcome, JobStatus};
use doctrans::engine::{MockBehavior, MockEngine};

use crate::common::{
    ScriptedClassifier, build_manager, create_temp_dir, create_test_file, init_test_logging,
    numbered_document,
};

#[tokio::test]
async fn test_pipeline_fromFileOnDisk_shouldTranslateAndWriteOutput() {
    init_test_logging();
    let dir = create_temp_dir().unwrap();
    let (document, _) = numbered_document(3);
    let input = create_test_file(&dir.path().to_path_buf(), "report.txt", &document).unwrap();

    let engine = MockEngine::working();
    let manager = build_manager(engine, ScriptedClassifier::new());

    let bytes = doctrans::file_utils::read_bytes(&input).unwrap();
    let filename = doctrans::file_utils::file_name(&input);
    let job = manager
        .create_job(&filename, &bytes, Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let done = manager.run_job(&job.id, &bytes).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    let output_path = dir.path().join("report.json");
    let content = manager.render_output(&done.id).await.unwrap();
    doctrans::file_utils::write_atomic(&output_path, &content).unwrap();

    let parsed: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(parsed.len(), 3);
}

#[tokio::test]
async fn test_pipeline_withMixedLanguages_shouldSkipTargetLanguageBlocks() {
    let (document, blocks) = numbered_document(10);

    // Blocks 3 and 7 are already in the target language; the rest are French
    let mut classifier = ScriptedClassifier::uniform("fr", &blocks);
    classifier = classifier
        .with_label(&blocks[3], "en")
        .with_label(&blocks[7], "en");

    let engine = MockEngine::working();
    let manager = build_manager(engine.clone(), classifier);

    let job = manager
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let done = manager.run_job(&job.id, document.as_bytes()).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_blocks, Some(10));
    assert_eq!(done.blocks_skipped, 2);
    assert_eq!(done.blocks_translated, 8);
    assert_eq!(done.blocks_failed, 0);
    assert_eq!(done.progress(), 100);

    // The two skipped blocks never reached the engine
    let seen = engine.seen_texts();
    assert_eq!(seen.len(), 8);
    assert!(!seen.contains(&blocks[3]));
    assert!(!seen.contains(&blocks[7]));

    // Output has one entry per block, in index order, with originals for
    // the skipped blocks
    let output = manager.render_output(&done.id).await.unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.len(), 10);
    for (i, entry) in parsed.iter().enumerate() {
        assert_eq!(entry["index"], i as i64);
    }
    assert_eq!(parsed[3]["text"], blocks[3].as_str());
    assert_eq!(parsed[3]["outcome"], "skipped");
    assert_eq!(
        parsed[0]["text"],
        MockEngine::expected_translation(&blocks[0], "en")
    );

    assert_eq!(done.languages_found.get("fr"), Some(&8));
    assert_eq!(done.languages_found.get("en"), Some(&2));
}

#[tokio::test]
async fn test_pipeline_withOneTimingOutBlock_shouldCompleteWithFailedBlock() {
    let (document, blocks) = numbered_document(6);

    // Block 5 sleeps past the 1s per-attempt timeout on every attempt and
    // exhausts its retries; everything else translates normally
    let engine = MockEngine::working().with_override(
        &blocks[5],
        MockBehavior::Slow { delay_ms: 1300 },
    );
    let classifier = ScriptedClassifier::uniform("fr", &blocks);
    let manager = build_manager(engine.clone(), classifier);

    let job = manager
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let done = manager.run_job(&job.id, document.as_bytes()).await.unwrap();

    // The failed block does not fail the job
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.blocks_translated, 5);
    assert_eq!(done.blocks_failed, 1);
    assert_eq!(done.processed_blocks, 6);
    assert!(done.error.is_none());

    let checkpoints = manager.repository().load_checkpoints(&done.id).await.unwrap();
    let failed = checkpoints.iter().find(|cp| cp.block_index == 5).unwrap();
    assert_eq!(failed.outcome, BlockOutcome::Failed);

    // The output carries the original text for the failed block
    let output = manager.render_output(&done.id).await.unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.len(), 6);
    assert_eq!(parsed[5]["text"], blocks[5].as_str());
    assert_eq!(parsed[5]["outcome"], "failed");
}

#[tokio::test]
async fn test_pipeline_withCorruptDocument_shouldFailWithoutBlockState() {
    let engine = MockEngine::working();
    let manager = build_manager(engine.clone(), ScriptedClassifier::new());

    let garbage = b"this is not a valid docx container";
    let job = manager
        .create_job("broken.docx", garbage, Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let failed = manager.run_job(&job.id, garbage).await.unwrap();

    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.is_some());
    // Extraction never succeeded, so the block count was never established
    assert_eq!(failed.total_blocks, None);
    assert_eq!(failed.processed_blocks, 0);
    assert_eq!(failed.progress(), 0);

    assert!(
        manager
            .repository()
            .get_source_blocks(&job.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        manager
            .repository()
            .load_checkpoints(&job.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(engine.request_count(), 0);
}

#[tokio::test]
async fn test_pipeline_withUnclassifiableBlocks_shouldTranslateAnyway() {
    let (document, blocks) = numbered_document(3);

    // No labels at all: classification failure must not block translation
    let engine = MockEngine::working();
    let manager = build_manager(engine.clone(), ScriptedClassifier::new());

    let job = manager
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let done = manager.run_job(&job.id, document.as_bytes()).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.blocks_translated, 3);
    assert_eq!(done.blocks_skipped, 0);
    assert_eq!(engine.request_count(), blocks.len());
    assert_eq!(done.languages_found.get("unknown"), Some(&3));
}

#[tokio::test]
async fn test_pipeline_withCsvInput_shouldProduceCsvOutput() {
    let document = "title,description\nrow one,Une description assez longue pour un bloc\nrow two,Une autre description qui vaut la traduction";

    let engine = MockEngine::working();
    let classifier = ScriptedClassifier::new()
        .with_label("Une description assez longue pour un bloc", "fr")
        .with_label("Une autre description qui vaut la traduction", "fr");
    let manager = build_manager(engine, classifier);

    let job = manager
        .create_job("data.csv", document.as_bytes(), Some("en"), OutputFormat::Csv)
        .await
        .unwrap();
    let done = manager.run_job(&job.id, document.as_bytes()).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_blocks, Some(2));

    let output = manager.render_output(&done.id).await.unwrap();
    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("Page,Original,Language,Translated"));
    // CSV blocks carry their source row as the page marker
    let first_row = lines.next().unwrap();
    assert!(first_row.starts_with("1,"));
    assert!(first_row.contains("[en]"));
}

#[tokio::test]
async fn test_pipeline_withDocxInput_shouldExtractAndTranslate() {
    let mut body = String::from(
        r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    );
    for text in [
        "Der erste Absatz des Berichts.",
        "Der zweite Absatz mit weiteren Details.",
    ] {
        body.push_str(&format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text));
    }
    body.push_str("</w:body></w:document>");

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    let document = cursor.into_inner();

    let engine = MockEngine::working();
    let manager = build_manager(engine, ScriptedClassifier::new());

    let job = manager
        .create_job("bericht.docx", &document, Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let done = manager.run_job(&job.id, &document).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_blocks, Some(2));
    assert_eq!(done.blocks_translated, 2);
}

#[tokio::test]
async fn test_pipeline_progress_shouldNeverDecreaseDuringRun() {
    let (document, blocks) = numbered_document(8);
    // Slow engine calls keep the run alive long enough to watch it
    let engine = MockEngine::slow(50);
    let manager = Arc::new(build_manager(
        engine,
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

    let mut last_progress = 0;
    let mut last_processed = 0;
    let mut finished = false;
    for _ in 0..500 {
        let snap = manager.snapshot(&job.id).await.unwrap();
        assert!(
            snap.progress >= last_progress,
            "progress moved backwards: {} then {}",
            last_progress,
            snap.progress
        );
        assert!(snap.processed_blocks >= last_processed);
        last_progress = snap.progress;
        last_processed = snap.processed_blocks;
        if snap.status.is_terminal() {
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(finished);

    let done = handle.await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(last_progress, 100);
}

#[tokio::test]
async fn test_pipeline_progressAndCounters_shouldBeConsistentAtCompletion() {
    let (document, blocks) = numbered_document(7);

    let mut classifier = ScriptedClassifier::uniform("fr", &blocks);
    classifier = classifier.with_label(&blocks[2], "en");
    let engine = MockEngine::working().with_override(&blocks[4], MockBehavior::InvalidInput);
    let manager = build_manager(engine, classifier);

    let job = manager
        .create_job("report.txt", document.as_bytes(), Some("en"), OutputFormat::Json)
        .await
        .unwrap();
    let done = manager.run_job(&job.id, document.as_bytes()).await.unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    // skipped + translated + failed always equals processed
    assert_eq!(done.blocks_skipped, 1);
    assert_eq!(done.blocks_failed, 1);
    assert_eq!(done.blocks_translated, 5);
    assert_eq!(
        done.processed_blocks,
        done.blocks_skipped + done.blocks_translated + done.blocks_failed
    );
    assert_eq!(done.progress(), 100);
    assert!(done.processing_time_ms.is_some());
}
