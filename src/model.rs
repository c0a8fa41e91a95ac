// Cryptex Prior Model
// Corpus-backed next-token distribution with bounded memoization

use crate::types::{TokenProbs, WORD_DELIM};
use rustc_hash::FxHashMap;
use std::sync::RwLock;

/// Extra weight a known (previous word, candidate) bigram adds per pair
/// occurrence when blending with plain word counts
const BIGRAM_WEIGHT: f64 = 50.0;

/// Longest prefix whose distribution is memoized; longer prefixes form an
/// unbounded key space and are recomputed instead of cached
const MEMO_PREFIX_LEN: usize = 2;

/// Language model estimating the next token from corpus frequencies
///
/// Given the in-progress prefix of the current word and the previously
/// completed word (when any), every dictionary word extending the prefix
/// votes its count for the letter it would contribute next, or for the
/// word delimiter when the prefix is itself a complete word. Known bigram
/// continuations of the previous word get an additional weighted vote.
///
/// The frequency tables are read-only after construction, and the memo
/// cache tolerates concurrent recomputation of the same key (the
/// distribution is a pure function of it), so the model can be shared
/// across `solve` calls running on parallel threads.
pub struct PriorModel {
    /// Word-frequency table, sorted by word for prefix-range scans
    words: Vec<(String, u64)>,

    /// previous word -> (next word -> pair count)
    bigrams: FxHashMap<String, FxHashMap<String, u64>>,

    /// Memoized distributions for short prefixes
    memo: RwLock<FxHashMap<(Option<String>, String), TokenProbs>>,
}

impl PriorModel {
    /// Build a model from word and word-pair frequency tables
    ///
    /// Words are folded to uppercase; entries containing non-alphabetic
    /// characters are dropped.
    pub fn from_tables(
        word_counts: FxHashMap<String, u64>,
        bigram_counts: FxHashMap<(String, String), u64>,
    ) -> Self {
        let clean = |w: &str| -> Option<String> {
            let up = w.to_ascii_uppercase();
            up.chars().all(|c| c.is_ascii_uppercase()).then_some(up)
        };

        let mut words: Vec<(String, u64)> = word_counts
            .into_iter()
            .filter_map(|(w, c)| clean(&w).map(|w| (w, c)))
            .collect();
        words.sort_unstable();

        let mut bigrams: FxHashMap<String, FxHashMap<String, u64>> = FxHashMap::default();
        for ((first, second), count) in bigram_counts {
            if let (Some(first), Some(second)) = (clean(&first), clean(&second)) {
                *bigrams.entry(first).or_default().entry(second).or_default() += count;
            }
        }

        Self {
            words,
            bigrams,
            memo: RwLock::new(FxHashMap::default()),
        }
    }

    /// Model backed by the embedded demo corpus
    pub fn demo() -> Self {
        Self::from_tables(
            crate::data::demo_word_counts(),
            crate::data::demo_bigram_counts(),
        )
    }

    /// Number of distinct words in the table
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Whether the table contains a word (case-insensitive)
    pub fn contains(&self, word: &str) -> bool {
        let up = word.to_ascii_uppercase();
        self.words
            .binary_search_by(|(w, _)| w.as_str().cmp(up.as_str()))
            .is_ok()
    }

    /// Distribution over the next token given the decode history
    ///
    /// `prev` is the most recently completed word, `prefix` the letters of
    /// the current word so far. Distributions for prefixes of length
    /// ≤ 2 are memoized; a racing recomputation inserts the same value.
    pub fn probabilities(&self, prev: Option<&str>, prefix: &str) -> TokenProbs {
        if prefix.len() > MEMO_PREFIX_LEN {
            return self.distribution(prev, prefix);
        }

        let key = (prev.map(str::to_string), prefix.to_string());
        if let Ok(cache) = self.memo.read() {
            if let Some(probs) = cache.get(&key) {
                return *probs;
            }
        }

        let probs = self.distribution(prev, prefix);
        if let Ok(mut cache) = self.memo.write() {
            cache.entry(key).or_insert(probs);
        }
        probs
    }

    /// Uncached distribution computation
    fn distribution(&self, prev: Option<&str>, prefix: &str) -> TokenProbs {
        let mut probs = TokenProbs::zeros();
        let pair_counts = prev.and_then(|p| self.bigrams.get(&p.to_ascii_uppercase()));

        let start = self.words.partition_point(|(w, _)| w.as_str() < prefix);
        for (word, count) in &self.words[start..] {
            if !word.starts_with(prefix) {
                break;
            }
            let mut weight = *count as f64;
            if let Some(pair) = pair_counts.and_then(|m| m.get(word)) {
                weight += BIGRAM_WEIGHT * *pair as f64;
            }
            if word.len() == prefix.len() {
                probs.0[WORD_DELIM as usize] += weight;
            } else {
                let letter = word.as_bytes()[prefix.len()];
                probs.0[(letter - b'A' + 1) as usize] += weight;
            }
        }

        probs.normalize()
    }
}
