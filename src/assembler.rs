/*!
 * Output assembly.
 *
 * Once every block of a job is resolved, the assembler joins source blocks
 * with their checkpoints in index order and renders the requested output
 * representation. Translated blocks carry the engine's text; skipped and
 * failed blocks carry the original, so the output always has exactly one
 * entry per extracted block.
 */

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::checkpoint::{BlockOutcome, CheckpointRecord, SourceBlockRecord};

/// Supported output representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON array of block objects
    Json,
    /// CSV with Page, Original, Language, Translated columns
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(anyhow::anyhow!("Unsupported output format: {}", other)),
        }
    }
}

/// One fully resolved block in the assembled output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledBlock {
    /// Block index within the document
    pub index: i64,
    /// Structural marker (CSV row), if the source had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Original extracted text
    pub original: String,
    /// Detected language label, "unknown" when classification had none
    pub language: String,
    /// How the block was resolved
    pub outcome: BlockOutcome,
    /// Output text: the translation where one exists, the original otherwise
    pub text: String,
}

/// Join source blocks with their checkpoints in index order.
///
/// Every block must have a resolved checkpoint; a gap means the job is not
/// actually complete and assembly refuses to produce partial output.
pub fn assemble(
    blocks: &[SourceBlockRecord],
    checkpoints: &[CheckpointRecord],
) -> Result<Vec<AssembledBlock>> {
    let by_index: HashMap<i64, &CheckpointRecord> = checkpoints
        .iter()
        .map(|cp| (cp.block_index, cp))
        .collect();

    let mut assembled = Vec::with_capacity(blocks.len());

    for block in blocks {
        let checkpoint = match by_index.get(&block.block_index) {
            Some(cp) => cp,
            None => bail!("Block {} has no checkpoint", block.block_index),
        };

        if !checkpoint.outcome.is_resolved() {
            bail!("Block {} is still unresolved", block.block_index);
        }

        let text = match (&checkpoint.outcome, &checkpoint.translated_text) {
            (BlockOutcome::Translated, Some(translated)) => translated.clone(),
            // Skipped and failed blocks fall back to the original text
            _ => block.raw_text.clone(),
        };

        assembled.push(AssembledBlock {
            index: block.block_index,
            page: block.page,
            original: block.raw_text.clone(),
            language: checkpoint
                .detected_language
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            outcome: checkpoint.outcome,
            text,
        });
    }

    assembled.sort_by_key(|b| b.index);
    Ok(assembled)
}

/// Render assembled blocks in the requested format
pub fn render(blocks: &[AssembledBlock], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(blocks),
        OutputFormat::Csv => render_csv(blocks),
    }
}

fn render_json(blocks: &[AssembledBlock]) -> Result<String> {
    Ok(serde_json::to_string_pretty(blocks)?)
}

fn render_csv(blocks: &[AssembledBlock]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(["Page", "Original", "Language", "Translated"])?;
    for block in blocks {
        writer.write_record([
            block.page.map(|p| p.to_string()).unwrap_or_default(),
            block.original.clone(),
            block.language.clone(),
            block.text.clone(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(String::from_utf8(bytes)?)
}
