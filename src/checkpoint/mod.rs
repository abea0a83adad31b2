/*!
 * Durable checkpoint store for the translation pipeline.
 *
 * This module provides SQLite-backed persistence for jobs, their extracted
 * source blocks, and per-block outcome checkpoints. A checkpoint write is
 * committed before the in-memory job counters advance, so a crash mid-job
 * loses at most the in-flight block's work.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{BlockOutcome, CheckpointRecord, JobRecord, JobStatus, SourceBlockRecord};
pub use repository::Repository;
