/*!
 * Language classification capability.
 *
 * The pipeline consumes language detection as a capability: the classifier
 * labels each block so the driver can skip blocks already in the target
 * language. Detection is a cost optimization only, so a miss is harmless
 * (the block is translated anyway) and detection failure maps to `None`.
 */

use std::collections::HashMap;

/// Capability interface for language detection
pub trait LanguageClassifier: Send + Sync {
    /// Detect the language of a text, returning an ISO 639-1 code,
    /// or `None` when the language cannot be determined
    fn detect(&self, text: &str) -> Option<String>;
}

/// Stopword tables for the built-in classifier, per ISO 639-1 code
const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "of", "to", "in", "is", "that", "it", "for", "was", "with", "are",
            "this", "not", "have",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "de", "que", "y", "en", "los", "del", "las", "por", "con", "una", "para",
            "es", "su",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "de", "et", "les", "des", "est", "dans", "que", "une", "pour", "qui",
            "sur", "pas", "avec",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "und", "das", "ist", "von", "den", "mit", "ein", "eine", "nicht",
            "auch", "auf", "sich", "werden",
        ],
    ),
    (
        "it",
        &[
            "il", "di", "che", "la", "per", "una", "sono", "con", "del", "non", "gli", "della",
            "questo", "come", "anche",
        ],
    ),
    (
        "pt",
        &[
            "o", "de", "que", "do", "da", "em", "um", "para", "com", "uma", "os", "no", "se",
            "na", "por",
        ],
    ),
];

// A single stopword hit is too weak a signal to act on.
const MIN_HITS: usize = 2;

/// Built-in stopword-frequency classifier
///
/// Good enough to route common European languages; anything it cannot
/// score confidently comes back as `None` and goes to the engine untouched.
pub struct StopwordClassifier;

impl LanguageClassifier for StopwordClassifier {
    fn detect(&self, text: &str) -> Option<String> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        if words.is_empty() {
            return None;
        }

        let mut scores: HashMap<&str, usize> = HashMap::new();
        for (code, stopwords) in STOPWORDS {
            let hits = words
                .iter()
                .filter(|w| stopwords.contains(&w.as_str()))
                .count();
            if hits > 0 {
                scores.insert(code, hits);
            }
        }

        let (best_code, best_hits) = scores.iter().max_by_key(|(_, hits)| **hits)?;

        if *best_hits < MIN_HITS {
            return None;
        }

        // Ambiguous between two languages means no confident label
        let runner_up = scores
            .iter()
            .filter(|(code, _)| *code != best_code)
            .map(|(_, hits)| *hits)
            .max()
            .unwrap_or(0);
        if runner_up == *best_hits {
            return None;
        }

        Some((*best_code).to_string())
    }
}
