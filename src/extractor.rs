use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ExtractError;

// @module: Block extraction from uploaded documents

// Blocks shorter than this are noise (page numbers, bullets, stray words)
// and are not worth an engine call.
const MIN_BLOCK_CHARS: usize = 10;

// @const: Markdown heading prefix
static HEADING_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+").unwrap());

/// Supported input document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Plain UTF-8 text, paragraphs separated by blank lines
    Txt,
    /// Markdown, treated as plain text with heading markers stripped
    Markdown,
    /// Comma-separated values, one block per translatable cell
    Csv,
    /// Office Open XML word processing document
    Docx,
    /// Portable Document Format
    Pdf,
}

impl DocumentFormat {
    /// Detect the format from a filename extension
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let ext = filename
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        match ext.as_str() {
            "txt" | "text" => Ok(DocumentFormat::Txt),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            "csv" => Ok(DocumentFormat::Csv),
            "docx" => Ok(DocumentFormat::Docx),
            "pdf" => Ok(DocumentFormat::Pdf),
            _ => Err(ExtractError::UnsupportedFormat(ext)),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentFormat::Txt => "txt",
            DocumentFormat::Markdown => "md",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pdf => "pdf",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "txt" | "text" => Ok(DocumentFormat::Txt),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            "csv" => Ok(DocumentFormat::Csv),
            "docx" => Ok(DocumentFormat::Docx),
            "pdf" => Ok(DocumentFormat::Pdf),
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One indexable unit of translatable text extracted from a document
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Stable zero-based index within the document
    pub index: usize,
    /// Raw extracted text
    pub text: String,
    /// Structural marker for reassembly (CSV row number, if any)
    pub page: Option<u32>,
}

/// Capability interface for per-format block extraction
///
/// Extraction is all-or-nothing: implementations return either the complete
/// ordered block list or an error, never a partial list. Block indices are
/// assigned here and stay fixed for the job's lifetime.
pub trait BlockExtractor: Send + Sync {
    /// Extract the ordered block sequence from raw document bytes
    fn extract(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractError>;
}

/// Get the extractor for a declared document format
pub fn extractor_for(format: DocumentFormat) -> Box<dyn BlockExtractor> {
    match format {
        DocumentFormat::Txt => Box::new(PlainTextExtractor),
        DocumentFormat::Markdown => Box::new(MarkdownExtractor),
        DocumentFormat::Csv => Box::new(CsvExtractor),
        DocumentFormat::Docx => Box::new(DocxExtractor),
        DocumentFormat::Pdf => Box::new(PdfExtractor),
    }
}

/// Extractor for plain text documents
pub struct PlainTextExtractor;

impl BlockExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractError> {
        let content = String::from_utf8_lossy(bytes).replace("\r\n", "\n");
        Ok(paragraphs_to_blocks(content.split("\n\n")))
    }
}

/// Extractor for Markdown documents
pub struct MarkdownExtractor;

impl BlockExtractor for MarkdownExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractError> {
        let content = String::from_utf8_lossy(bytes).replace("\r\n", "\n");

        let cleaned: Vec<String> = content
            .split("\n\n")
            .map(|para| {
                para.lines()
                    .filter(|line| !line.trim_start().starts_with("```"))
                    .map(|line| HEADING_REGEX.replace(line, "").into_owned())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect();

        Ok(paragraphs_to_blocks(cleaned.iter().map(|s| s.as_str())))
    }
}

/// Extractor for CSV documents, yielding one block per translatable cell
pub struct CsvExtractor;

impl BlockExtractor for CsvExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let mut blocks = Vec::new();
        let mut index = 0;

        for (row_num, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ExtractError::Corrupt {
                format: "csv".to_string(),
                reason: e.to_string(),
            })?;

            for field in record.iter() {
                let text = field.trim();
                if text.chars().count() > MIN_BLOCK_CHARS {
                    blocks.push(TextBlock {
                        index,
                        text: text.to_string(),
                        page: Some(row_num as u32 + 1),
                    });
                    index += 1;
                }
            }
        }

        Ok(blocks)
    }
}

/// Extractor for DOCX documents
///
/// Reads `word/document.xml` out of the OOXML zip container and collects
/// the text runs of each `w:p` paragraph into one block.
pub struct DocxExtractor;

impl BlockExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractError> {
        let corrupt = |reason: String| ExtractError::Corrupt {
            format: "docx".to_string(),
            reason,
        };

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| corrupt(format!("not a zip container: {}", e)))?;

        let mut document_xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| corrupt(format!("missing word/document.xml: {}", e)))?
            .read_to_string(&mut document_xml)
            .map_err(|e| corrupt(format!("unreadable document.xml: {}", e)))?;

        let mut xml_reader = Reader::from_str(&document_xml);
        let mut paragraphs: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut in_paragraph = false;

        loop {
            match xml_reader.read_event() {
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                Ok(Event::End(ref e)) if e.name().as_ref() == b"w:p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                Ok(Event::Text(ref t)) if in_paragraph => {
                    let text = t
                        .unescape()
                        .map_err(|e| corrupt(format!("invalid XML text: {}", e)))?;
                    current.push_str(&text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(corrupt(format!("invalid XML: {}", e))),
            }
        }

        Ok(paragraphs_to_blocks(paragraphs.iter().map(|s| s.as_str())))
    }
}

/// Extractor for PDF documents
///
/// Recovers the text layer with `pdf-extract`. Page breaks in the
/// recovered text become paragraph boundaries, so a block never spans
/// two pages.
pub struct PdfExtractor;

impl BlockExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<TextBlock>, ExtractError> {
        let content =
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Corrupt {
                format: "pdf".to_string(),
                reason: e.to_string(),
            })?;

        let normalized = content.replace('\u{c}', "\n\n").replace("\r\n", "\n");
        Ok(paragraphs_to_blocks(normalized.split("\n\n")))
    }
}

/// Assign stable indices to the non-trivial paragraphs of a document
fn paragraphs_to_blocks<'a>(paragraphs: impl Iterator<Item = &'a str>) -> Vec<TextBlock> {
    paragraphs
        .map(str::trim)
        .filter(|p| p.chars().count() > MIN_BLOCK_CHARS)
        .enumerate()
        .map(|(index, text)| TextBlock {
            index,
            text: text.to_string(),
            page: None,
        })
        .collect()
}
