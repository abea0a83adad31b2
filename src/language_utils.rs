use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// This module provides functions for normalizing and matching ISO 639-1
/// (2-letter) and ISO 639-3 (3-letter) language codes. The skip decision in
/// the pipeline compares detected-language labels against the job's target
/// language, so "en" and "eng" must be treated as the same language.
/// Normalize a language code to ISO 639-3 (3-letter) format
pub fn normalize_code(code: &str) -> Result<String> {
    let normalized = code.trim().to_lowercase();

    if normalized.len() == 2 {
        if let Some(lang) = Language::from_639_1(&normalized) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if normalized.len() == 3 {
        if Language::from_639_3(&normalized).is_some() {
            return Ok(normalized);
        }
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Check if two language codes refer to the same language,
/// regardless of whether they are 2-letter or 3-letter codes
pub fn codes_match(a: &str, b: &str) -> bool {
    match (normalize_code(a), normalize_code(b)) {
        (Ok(norm_a), Ok(norm_b)) => norm_a == norm_b,
        // Unrecognized codes only match on literal equality
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

/// Get the English name of a language from its code, for display
pub fn language_name(code: &str) -> Option<String> {
    let normalized = code.trim().to_lowercase();

    let lang = if normalized.len() == 2 {
        Language::from_639_1(&normalized)
    } else {
        Language::from_639_3(&normalized)
    };

    lang.map(|l| l.to_name().to_string())
}
