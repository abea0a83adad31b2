use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// File system utilities
///
/// Small helpers shared by the pipeline: reading uploads, content hashing
/// for job records, and crash-safe output writes.
/// Read a document's raw bytes
pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))
}

/// SHA256 hash of file content as a lowercase hex string
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write content to a file atomically.
///
/// Writes to a temporary file in the destination directory, then renames it
/// into place so readers never observe a half-written output.
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {:?}", dir))?;

    use std::io::Write;
    temp.write_all(content.as_bytes())
        .context("Failed to write output content")?;

    temp.persist(path)
        .with_context(|| format!("Failed to persist output to {:?}", path))?;

    Ok(())
}

/// Extract the filename component of a path, for job records
pub fn file_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
