// Cryptex Corpus Loading
// Parses plain-text frequency tables and embeds a small demo corpus

use rustc_hash::FxHashMap;
use std::path::Path;
use thiserror::Error;

/// Embedded demo word-frequency table
const WORDS_TEXT: &str = include_str!("../data/words.txt");

/// Embedded demo bigram-frequency table
const BIGRAMS_TEXT: &str = include_str!("../data/bigrams.txt");

/// Frequency-file parsing errors
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record at line {line}: expected word(s) and a count")]
    InvalidRecord { line: usize },

    #[error("invalid count at line {line}")]
    InvalidCount { line: usize },

    #[error("non-alphabetic word at line {line}")]
    InvalidWord { line: usize },
}

/// Normalize one word field, rejecting non-alphabetic content
fn parse_word(field: &str, line: usize) -> Result<String, CorpusError> {
    let up = field.to_ascii_uppercase();
    if up.is_empty() || !up.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(CorpusError::InvalidWord { line });
    }
    Ok(up)
}

/// Parse a word-frequency table: one `WORD COUNT` record per line
///
/// Blank lines and `#` comments are skipped; duplicate words accumulate.
pub fn parse_word_counts(text: &str) -> Result<FxHashMap<String, u64>, CorpusError> {
    let mut counts: FxHashMap<String, u64> = FxHashMap::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let record = raw.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        let mut fields = record.split_whitespace();
        let word = fields
            .next()
            .ok_or(CorpusError::InvalidRecord { line })?;
        let count = fields
            .next()
            .ok_or(CorpusError::InvalidRecord { line })?;
        if fields.next().is_some() {
            return Err(CorpusError::InvalidRecord { line });
        }
        let word = parse_word(word, line)?;
        let count: u64 = count
            .parse()
            .map_err(|_| CorpusError::InvalidCount { line })?;
        *counts.entry(word).or_default() += count;
    }
    Ok(counts)
}

/// Parse a bigram-frequency table: one `FIRST SECOND COUNT` record per line
pub fn parse_bigram_counts(
    text: &str,
) -> Result<FxHashMap<(String, String), u64>, CorpusError> {
    let mut counts: FxHashMap<(String, String), u64> = FxHashMap::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let record = raw.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = record.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(CorpusError::InvalidRecord { line });
        }
        let first = parse_word(fields[0], line)?;
        let second = parse_word(fields[1], line)?;
        let count: u64 = fields[2]
            .parse()
            .map_err(|_| CorpusError::InvalidCount { line })?;
        *counts.entry((first, second)).or_default() += count;
    }
    Ok(counts)
}

/// Load a word-frequency table from a file
pub fn load_word_counts(path: &Path) -> Result<FxHashMap<String, u64>, CorpusError> {
    parse_word_counts(&std::fs::read_to_string(path)?)
}

/// Load a bigram-frequency table from a file
pub fn load_bigram_counts(
    path: &Path,
) -> Result<FxHashMap<(String, String), u64>, CorpusError> {
    parse_bigram_counts(&std::fs::read_to_string(path)?)
}

/// Word counts of the embedded demo corpus
pub fn demo_word_counts() -> FxHashMap<String, u64> {
    parse_word_counts(WORDS_TEXT).expect("embedded word table is well-formed")
}

/// Bigram counts of the embedded demo corpus
pub fn demo_bigram_counts() -> FxHashMap<(String, String), u64> {
    parse_bigram_counts(BIGRAMS_TEXT).expect("embedded bigram table is well-formed")
}
