/*!
 * Common test utilities for the doctrans test suite
 */

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use doctrans::app_config::Config;
use doctrans::checkpoint::Repository;
use doctrans::classifier::LanguageClassifier;
use doctrans::engine::{MockEngine, TranslationEngine};
use doctrans::job::JobManager;

/// Initialize logging for tests that want to see pipeline output
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &PathBuf, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Classifier scripted with exact text-to-language mappings.
///
/// Texts without a mapping come back as `None`, matching a real detector
/// that cannot produce a confident label.
pub struct ScriptedClassifier {
    labels: HashMap<String, String>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, text: &str, language: &str) -> Self {
        self.labels.insert(text.to_string(), language.to_string());
        self
    }

    /// Label every block with the same language
    pub fn uniform(language: &str, texts: &[String]) -> Self {
        let mut classifier = Self::new();
        for text in texts {
            classifier.labels.insert(text.clone(), language.to_string());
        }
        classifier
    }
}

impl LanguageClassifier for ScriptedClassifier {
    fn detect(&self, text: &str) -> Option<String> {
        self.labels.get(text).cloned()
    }
}

/// Fast engine and concurrency settings for tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.timeout_secs = 1;
    config.engine.retry_count = 2;
    config.engine.retry_backoff_ms = 1;
    config
}

/// Build a manager over an in-memory checkpoint store
pub fn build_manager(
    engine: MockEngine,
    classifier: impl LanguageClassifier + 'static,
) -> JobManager {
    build_manager_with_config(engine, classifier, test_config())
}

pub fn build_manager_with_config(
    engine: MockEngine,
    classifier: impl LanguageClassifier + 'static,
    config: Config,
) -> JobManager {
    let repository = Repository::new_in_memory().expect("Failed to create in-memory repository");
    let engine: Arc<dyn TranslationEngine> = Arc::new(engine);
    JobManager::new(repository, engine, Arc::new(classifier), config)
}

/// Generate a plain-text document of numbered paragraphs.
///
/// Returns the document plus the individual block texts as the extractor
/// will see them.
pub fn numbered_document(count: usize) -> (String, Vec<String>) {
    let blocks: Vec<String> = (0..count)
        .map(|i| format!("Paragraph number {} with enough text to form a block.", i))
        .collect();
    (blocks.join("\n\n"), blocks)
}
