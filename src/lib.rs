/*!
 * # doctrans - Document Translation Pipeline
 *
 * A Rust library for translating documents block by block through an
 * external translation engine, with durable per-block checkpoints.
 *
 * ## Features
 *
 * - Extract translatable blocks from txt, Markdown, CSV, and DOCX documents
 * - Classify block languages and skip blocks already in the target language
 * - Drive blocks through the engine with bounded concurrency, per-block
 *   timeouts, and retries for transient failures
 * - Checkpoint every resolved block so interrupted jobs resume without
 *   repeating finished work
 * - Assemble completed jobs into JSON or CSV output, one entry per block
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `extractor`: Per-format block extraction
 * - `classifier`: Language detection capability
 * - `engine`: Translation engine clients:
 *   - `engine::http`: HTTP engine client
 *   - `engine::mock`: Scripted engines for testing
 * - `driver`: Bounded worker pool over the engine
 * - `checkpoint`: SQLite-backed job and block persistence
 * - `job`: Job state machine and orchestration
 * - `assembler`: Output assembly and rendering
 * - `language_utils`: ISO language code utilities
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]

// Public modules
pub mod app_config;
pub mod assembler;
pub mod checkpoint;
pub mod classifier;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod extractor;
pub mod file_utils;
pub mod job;
pub mod language_utils;

// Re-export main types for easier usage
pub use app_config::Config;
pub use assembler::OutputFormat;
pub use checkpoint::{DatabaseConnection, JobStatus, Repository};
pub use engine::{HttpEngine, TranslationEngine};
pub use errors::{AppError, EngineError, ExtractError};
pub use extractor::DocumentFormat;
pub use job::{JobManager, JobSnapshot};
pub use language_utils::{codes_match, language_name, normalize_code};
