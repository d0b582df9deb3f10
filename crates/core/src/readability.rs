use crate::error::IngestError;
use regex::Regex;
use std::collections::HashSet;

/// Function words used to estimate whether extracted text is English prose.
/// OCR garbage and binary noise score near zero against this set.
const COMMON_WORDS: [&str; 110] = [
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
    "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we",
    "say", "her", "she", "or", "an", "will", "my", "one", "all", "would", "there", "their",
    "what", "so", "up", "out", "if", "about", "who", "get", "which", "go", "me", "when", "make",
    "can", "like", "time", "no", "just", "him", "know", "take", "people", "into", "year", "your",
    "good", "some", "could", "them", "see", "other", "than", "then", "now", "look", "only",
    "come", "its", "over", "think", "also", "back", "after", "use", "two", "how", "our", "work",
    "first", "well", "way", "even", "new", "want", "because", "any", "these", "give", "day",
    "most", "us", "is", "was", "are", "been", "has", "had", "were", "said", "did", "made",
];

/// Thresholds for the readability gate. The source corpus was ingested with
/// slightly different values over time, so all of them are tunable rather
/// than fixed.
#[derive(Debug, Clone, Copy)]
pub struct ReadabilityConfig {
    pub min_text_chars: usize,
    pub min_word_count: usize,
    pub min_common_word_ratio: f64,
    pub min_alphanumeric_ratio: f64,
}

impl Default for ReadabilityConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            min_word_count: 5,
            min_common_word_ratio: 0.2,
            min_alphanumeric_ratio: 0.4,
        }
    }
}

/// Heuristic gate deciding whether extracted text is usable prose or noise.
/// Cheap and deterministic; a tunable filter, not a correctness guarantee.
pub struct ReadabilityGate {
    config: ReadabilityConfig,
    word_pattern: Regex,
    common_words: HashSet<&'static str>,
}

impl ReadabilityGate {
    pub fn new(config: ReadabilityConfig) -> Result<Self, IngestError> {
        Ok(Self {
            config,
            word_pattern: Regex::new(r"[a-z]{2,}")?,
            common_words: COMMON_WORDS.iter().copied().collect(),
        })
    }

    pub fn is_readable(&self, text: &str) -> bool {
        let char_count = text.chars().count();
        if char_count < self.config.min_text_chars {
            return false;
        }

        let lowered = text.to_lowercase();
        let words: Vec<&str> = self
            .word_pattern
            .find_iter(&lowered)
            .map(|found| found.as_str())
            .collect();
        if words.len() < self.config.min_word_count {
            return false;
        }

        let common = words
            .iter()
            .filter(|word| self.common_words.contains(**word))
            .count();
        let common_ratio = common as f64 / words.len() as f64;

        let alphanumeric = text.chars().filter(char::is_ascii_alphanumeric).count();
        let alphanumeric_ratio = alphanumeric as f64 / char_count as f64;

        common_ratio >= self.config.min_common_word_ratio
            && alphanumeric_ratio >= self.config.min_alphanumeric_ratio
    }
}
