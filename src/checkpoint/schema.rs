/*!
 * Checkpoint database schema definitions and migrations.
 *
 * This module contains the SQL schema for the jobs, source_blocks, and
 * block_checkpoints tables and handles schema migrations for upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // WAL mode keeps checkpoint writes durable across crashes without
    // serializing readers behind the writer. Both pragmas are per
    // connection, so they run on every open, not just on first creation.
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing checkpoint schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating checkpoint schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Checkpoint schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // total_blocks stays NULL until extraction succeeds; the repository
    // only ever sets it on a NULL row, making it immutable afterwards.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            source_format TEXT NOT NULL,
            target_language TEXT NOT NULL,
            output_format TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            total_blocks INTEGER,
            processed_blocks INTEGER NOT NULL DEFAULT 0,
            blocks_skipped INTEGER NOT NULL DEFAULT 0,
            blocks_translated INTEGER NOT NULL DEFAULT 0,
            blocks_failed INTEGER NOT NULL DEFAULT 0,
            languages_found TEXT NOT NULL DEFAULT '{}',
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT,
            processing_time_ms INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
        CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS source_blocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            block_index INTEGER NOT NULL,
            raw_text TEXT NOT NULL,
            page INTEGER,
            UNIQUE(job_id, block_index)
        );

        CREATE INDEX IF NOT EXISTS idx_source_blocks_job ON source_blocks(job_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS block_checkpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            block_index INTEGER NOT NULL,
            outcome TEXT NOT NULL,
            detected_language TEXT,
            translated_text TEXT,
            updated_at TEXT NOT NULL,
            UNIQUE(job_id, block_index)
        );

        CREATE INDEX IF NOT EXISTS idx_checkpoints_job ON block_checkpoints(job_id);
        CREATE INDEX IF NOT EXISTS idx_checkpoints_outcome ON block_checkpoints(outcome);
        "#,
    )?;

    info!("Checkpoint schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let current = from_version;

    if current < SCHEMA_VERSION {
        // Add migration steps here as the schema evolves
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            current
        ));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
