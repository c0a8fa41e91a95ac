// Cryptex Type Definitions
// Token alphabet, probability vectors, decode context, and error types

use thiserror::Error;

/// A decoded token: 0 is the word delimiter, 1..=26 are the letters A..Z
pub type Token = u8;

/// The word-delimiter token
pub const WORD_DELIM: Token = 0;

/// Number of letters in the alphabet
pub const NUM_LETTERS: usize = 26;

/// Alphabet size including the word delimiter
pub const NUM_TOKENS: usize = 27;

/// A probability vector over the 27-token alphabet
///
/// Used both for posterior emissions (from pattern structure) and for
/// prior distributions (from the language model). Vectors are not required
/// to be normalized; [`TokenProbs::normalize`] produces a distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenProbs(pub [f64; NUM_TOKENS]);

impl TokenProbs {
    /// All-zero vector
    pub fn zeros() -> Self {
        TokenProbs([0.0; NUM_TOKENS])
    }

    /// All mass on a single token
    pub fn certain(token: Token) -> Self {
        let mut p = Self::zeros();
        p.0[token as usize] = 1.0;
        p
    }

    /// `confidence` on the given letter, the remainder spread uniformly
    /// over the other 25 letters
    pub fn noisy(letter: Token, confidence: f64) -> Self {
        let mut p = Self::zeros();
        let rest = (1.0 - confidence) / (NUM_LETTERS - 1) as f64;
        for t in 1..NUM_TOKENS {
            p.0[t] = if t == letter as usize { confidence } else { rest };
        }
        p
    }

    /// Uniform over the 26 letters (the delimiter gets no mass)
    pub fn any_letter() -> Self {
        let mut p = Self::zeros();
        for t in 1..NUM_TOKENS {
            p.0[t] = 1.0 / NUM_LETTERS as f64;
        }
        p
    }

    /// Probability of one token
    #[inline]
    pub fn get(&self, token: Token) -> f64 {
        self.0[token as usize]
    }

    /// Elementwise product of two vectors
    pub fn product(&self, other: &TokenProbs) -> TokenProbs {
        let mut p = Self::zeros();
        for t in 0..NUM_TOKENS {
            p.0[t] = self.0[t] * other.0[t];
        }
        p
    }

    /// Total mass
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Scale to a valid distribution; a zero vector stays zero
    pub fn normalize(&self) -> TokenProbs {
        let total = self.sum();
        if total <= 0.0 {
            return Self::zeros();
        }
        let mut p = *self;
        for t in 0..NUM_TOKENS {
            p.0[t] /= total;
        }
        p
    }
}

/// Static admission-control ceilings checked before any search work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum pattern size (proxy for raw pattern length)
    pub max_pattern_len: usize,

    /// Maximum static complexity estimate
    pub max_complexity: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_pattern_len: 500,
            max_complexity: 2000,
        }
    }
}

/// Decode context threaded through the search alongside each state
///
/// Tracks the words completed so far, the in-progress prefix of the current
/// word, the quote-nesting depth (word boundaries are suppressed while it is
/// nonzero), an optional queue of target word lengths, and the total number
/// of consumed tokens (the progress counter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeCtx {
    /// Completed words, in order
    pub words: Vec<String>,

    /// Letters of the current, unfinished word
    pub prefix: String,

    /// Quote nesting depth; > 0 suppresses word-close transitions
    pub quote_depth: u32,

    /// Remaining target word lengths (front is the current word's target)
    pub lengths: Option<Vec<usize>>,

    /// Total tokens consumed so far
    pub consumed: usize,
}

impl DecodeCtx {
    /// Fresh context, optionally constrained to the given word lengths
    pub fn new(lengths: Option<Vec<usize>>) -> Self {
        Self {
            words: Vec::new(),
            prefix: String::new(),
            quote_depth: 0,
            lengths,
            consumed: 0,
        }
    }

    /// The most recently completed word, if any
    pub fn prev_word(&self) -> Option<&str> {
        self.words.last().map(|w| w.as_str())
    }

    /// Whether a word-close transition may be offered here
    ///
    /// Requires a nonempty prefix and no enclosing quote. With a length
    /// queue present, the current word must sit at exactly its target
    /// length.
    pub fn can_close(&self) -> bool {
        !self.prefix.is_empty() && self.quote_depth == 0 && self.length_satisfied()
    }

    /// Whether the current prefix sits at the front target length
    /// (vacuously true without a length queue)
    pub fn length_satisfied(&self) -> bool {
        match &self.lengths {
            Some(lens) => lens.first() == Some(&self.prefix.len()),
            None => true,
        }
    }

    /// Apply a consumed token, producing the successor context
    ///
    /// Returns `None` when the token is forbidden here: a delimiter with an
    /// empty prefix or at a non-prescribed point of the length queue, or a
    /// letter that would overrun the current target length (or appear after
    /// the queue is spent).
    pub fn apply(&self, token: Token) -> Option<DecodeCtx> {
        let mut next = self.clone();
        next.consumed += 1;

        if token == WORD_DELIM {
            if next.prefix.is_empty() {
                return None;
            }
            if let Some(lens) = &mut next.lengths {
                if lens.first() != Some(&next.prefix.len()) {
                    return None;
                }
                lens.remove(0);
            }
            let word = std::mem::take(&mut next.prefix);
            next.words.push(word);
        } else {
            if let Some(lens) = &next.lengths {
                match lens.first() {
                    // All prescribed words already produced
                    None => return None,
                    // Current word already at its target length
                    Some(&target) if next.prefix.len() >= target => return None,
                    _ => {}
                }
            }
            next.prefix.push(crate::vocab::token_char(token)?);
        }

        Some(next)
    }
}

/// One ranked decoding: the space-joined message and its natural-log score
///
/// Scores are comparable only within a single `solve` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Space-joined decoded words
    pub message: String,

    /// Cumulative log score (not a probability)
    pub score: f64,
}

/// Pattern admission and compilation errors
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("pattern too long: size {actual} exceeds maximum of {limit}")]
    PatternTooLong { actual: usize, limit: usize },

    #[error("pattern too complex: estimate {actual} exceeds maximum of {limit}")]
    PatternTooComplex { actual: u64, limit: u64 },

    #[error("malformed pattern: {0}")]
    MalformedPattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ TokenProbs Tests ============

    #[test]
    fn test_certain_mass() {
        let p = TokenProbs::certain(5);
        assert_eq!(p.get(5), 1.0);
        assert_eq!(p.sum(), 1.0);
    }

    #[test]
    fn test_noisy_distribution() {
        let p = TokenProbs::noisy(1, 0.8);
        assert_eq!(p.get(1), 0.8);
        assert!((p.get(2) - 0.2 / 25.0).abs() < 1e-12);
        assert_eq!(p.get(WORD_DELIM), 0.0);
        assert!((p.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_any_letter_uniform() {
        let p = TokenProbs::any_letter();
        assert_eq!(p.get(WORD_DELIM), 0.0);
        assert!((p.sum() - 1.0).abs() < 1e-9);
        assert_eq!(p.get(1), p.get(26));
    }

    #[test]
    fn test_product_and_zero_sum() {
        let a = TokenProbs::certain(3);
        let b = TokenProbs::certain(4);
        assert_eq!(a.product(&b).sum(), 0.0);
        assert_eq!(a.product(&a).get(3), 1.0);
    }

    #[test]
    fn test_normalize_zero_stays_zero() {
        let z = TokenProbs::zeros().normalize();
        assert_eq!(z.sum(), 0.0);
    }

    // ============ DecodeCtx Tests ============

    #[test]
    fn test_apply_letter_then_close() {
        let ctx = DecodeCtx::new(None);
        let ctx = ctx.apply(3).unwrap(); // C
        assert_eq!(ctx.prefix, "C");
        assert_eq!(ctx.consumed, 1);

        let ctx = ctx.apply(WORD_DELIM).unwrap();
        assert_eq!(ctx.words, vec!["C"]);
        assert!(ctx.prefix.is_empty());
        assert_eq!(ctx.consumed, 2);
    }

    #[test]
    fn test_delimiter_requires_prefix() {
        let ctx = DecodeCtx::new(None);
        assert!(ctx.apply(WORD_DELIM).is_none());
    }

    #[test]
    fn test_length_queue_bounds_word() {
        let ctx = DecodeCtx::new(Some(vec![2]));
        let ctx = ctx.apply(1).unwrap();
        assert!(!ctx.length_satisfied());
        let ctx = ctx.apply(2).unwrap();
        assert!(ctx.length_satisfied());

        // A third letter would overshoot the target
        assert!(ctx.apply(3).is_none());

        let ctx = ctx.apply(WORD_DELIM).unwrap();
        assert_eq!(ctx.words, vec!["AB"]);
        // Queue spent: no more letters allowed
        assert!(ctx.apply(1).is_none());
    }

    #[test]
    fn test_length_queue_forbids_early_close() {
        let ctx = DecodeCtx::new(Some(vec![3]));
        let ctx = ctx.apply(1).unwrap();
        assert!(ctx.apply(WORD_DELIM).is_none());
    }

    #[test]
    fn test_quote_depth_blocks_close_offer() {
        let mut ctx = DecodeCtx::new(None).apply(1).unwrap();
        assert!(ctx.can_close());
        ctx.quote_depth = 1;
        assert!(!ctx.can_close());
    }

    // ============ Error Display Tests ============

    #[test]
    fn test_error_display() {
        let err = DecodeError::PatternTooComplex {
            actual: 5000,
            limit: 2000,
        };
        assert!(err.to_string().contains("5000"));
    }
}
