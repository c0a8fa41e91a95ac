// Cryptex Pattern AST
// Immutable pattern nodes with static complexity estimation

use crate::types::{DecodeError, Token, NUM_LETTERS};
use crate::vocab::letter_token;
use std::rc::Rc;

/// Shared reference to an immutable pattern node
pub type NodeRef = Rc<PatternNode>;

/// Character class of a single-symbol constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Exactly this letter
    Exact(Token),

    /// Probably this letter, with residual mass on the other 25
    Noisy(Token),

    /// Any letter
    Wildcard,
}

/// One node of the extended pattern language
///
/// Patterns are built once per query and immutable afterwards; children are
/// `Rc`-shared so compiled states can reference them without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternNode {
    /// A single letter slot
    Symbol(CharClass),

    /// Children matched once each, in any order
    Anagram(Vec<NodeRef>),

    /// Exactly one child matched
    Choice(Vec<NodeRef>),

    /// Child matched exactly `n` times
    Count(NodeRef, usize),

    /// Children matched in order
    List(Vec<NodeRef>),

    /// Child matched zero or one time
    Maybe(NodeRef),

    /// Child matched `at_least` or more times
    OrMore(NodeRef, usize),

    /// Like List, but word boundaries are suppressed inside
    Quote(Vec<NodeRef>),

    /// Two ordered lists merged in any interleaving
    Interleave(Vec<NodeRef>, Vec<NodeRef>),

    /// Children as a ring: any starting child, either direction
    Chain(Vec<NodeRef>),

    /// Both children must match the same token sequence
    And(NodeRef, NodeRef),

    /// An explicit word delimiter
    WordBoundary,
}

impl PatternNode {
    // ============ Builders ============

    /// Exact-letter symbol; non-alphabetic input yields an invalid token
    /// rejected later by [`validate`]
    pub fn exact(ch: char) -> NodeRef {
        Rc::new(PatternNode::Symbol(CharClass::Exact(
            letter_token(ch).unwrap_or(0),
        )))
    }

    /// Noisy-letter symbol
    pub fn noisy(ch: char) -> NodeRef {
        Rc::new(PatternNode::Symbol(CharClass::Noisy(
            letter_token(ch).unwrap_or(0),
        )))
    }

    /// Wildcard symbol
    pub fn wildcard() -> NodeRef {
        Rc::new(PatternNode::Symbol(CharClass::Wildcard))
    }

    /// Explicit word boundary
    pub fn word_boundary() -> NodeRef {
        Rc::new(PatternNode::WordBoundary)
    }

    pub fn anagram(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(PatternNode::Anagram(children))
    }

    pub fn choice(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(PatternNode::Choice(children))
    }

    pub fn count(child: NodeRef, n: usize) -> NodeRef {
        Rc::new(PatternNode::Count(child, n))
    }

    pub fn list(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(PatternNode::List(children))
    }

    pub fn maybe(child: NodeRef) -> NodeRef {
        Rc::new(PatternNode::Maybe(child))
    }

    pub fn or_more(child: NodeRef, at_least: usize) -> NodeRef {
        Rc::new(PatternNode::OrMore(child, at_least))
    }

    pub fn quote(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(PatternNode::Quote(children))
    }

    pub fn interleave(a: Vec<NodeRef>, b: Vec<NodeRef>) -> NodeRef {
        Rc::new(PatternNode::Interleave(a, b))
    }

    pub fn chain(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(PatternNode::Chain(children))
    }

    pub fn and(left: NodeRef, right: NodeRef) -> NodeRef {
        Rc::new(PatternNode::And(left, right))
    }

    /// List of exact symbols spelling out a word
    pub fn exact_word(word: &str) -> NodeRef {
        Self::list(word.chars().map(Self::exact).collect())
    }

    /// Anagram over the exact letters of a word
    pub fn anagram_of(word: &str) -> NodeRef {
        Self::anagram(word.chars().map(Self::exact).collect())
    }
}

/// Static complexity estimate used for pre-search admission control
///
/// Leaves cost 1; sequencing and choice add, repetition and conjunction
/// multiply, and order-free operators pay for the orders they can take
/// (child count for Anagram, rotations times directions for Chain).
pub fn complexity(node: &PatternNode) -> u64 {
    let sum = |cs: &[NodeRef]| cs.iter().map(|c| complexity(c)).sum::<u64>();
    match node {
        PatternNode::Symbol(_) | PatternNode::WordBoundary => 1,
        PatternNode::List(cs) | PatternNode::Quote(cs) | PatternNode::Choice(cs) => sum(cs).max(1),
        PatternNode::Maybe(c) => complexity(c) + 1,
        PatternNode::Count(c, n) => complexity(c).saturating_mul((*n).max(1) as u64),
        PatternNode::OrMore(c, at_least) => {
            complexity(c).saturating_mul(*at_least as u64 + 2)
        }
        PatternNode::Anagram(cs) => sum(cs).saturating_mul(cs.len().max(1) as u64),
        PatternNode::Chain(cs) => sum(cs).saturating_mul((2 * cs.len()).max(1) as u64),
        PatternNode::Interleave(a, b) => (sum(a) + sum(b)).saturating_mul(2).max(1),
        PatternNode::And(l, r) => complexity(l).saturating_mul(complexity(r)),
    }
}

/// Pattern size, a proxy for the raw textual pattern length
///
/// One unit per leaf, two units of bracketing overhead per composite.
pub fn size(node: &PatternNode) -> usize {
    let sum = |cs: &[NodeRef]| cs.iter().map(|c| size(c)).sum::<usize>();
    match node {
        PatternNode::Symbol(_) | PatternNode::WordBoundary => 1,
        PatternNode::List(cs)
        | PatternNode::Quote(cs)
        | PatternNode::Choice(cs)
        | PatternNode::Anagram(cs)
        | PatternNode::Chain(cs) => 2 + sum(cs),
        PatternNode::Maybe(c) => 2 + size(c),
        PatternNode::Count(c, _) | PatternNode::OrMore(c, _) => 2 + size(c),
        PatternNode::Interleave(a, b) => 2 + sum(a) + sum(b),
        PatternNode::And(l, r) => 2 + size(l) + size(r),
    }
}

/// Structural validation of an externally built AST
///
/// The grammar parser lives with the caller; this is the last line of
/// defense against ASTs it should never hand over.
pub fn validate(node: &PatternNode) -> Result<(), DecodeError> {
    let check_letter = |t: Token| {
        if (1..=NUM_LETTERS as u8).contains(&t) {
            Ok(())
        } else {
            Err(DecodeError::MalformedPattern(format!(
                "letter token {} out of range 1..=26",
                t
            )))
        }
    };
    match node {
        PatternNode::Symbol(CharClass::Exact(t)) | PatternNode::Symbol(CharClass::Noisy(t)) => {
            check_letter(*t)
        }
        PatternNode::Symbol(CharClass::Wildcard) | PatternNode::WordBoundary => Ok(()),
        PatternNode::Choice(cs) => {
            if cs.is_empty() {
                return Err(DecodeError::MalformedPattern(
                    "choice with no alternatives".into(),
                ));
            }
            cs.iter().try_for_each(|c| validate(c))
        }
        PatternNode::Anagram(cs) | PatternNode::Chain(cs) => {
            // Used-children tracking is a 64-bit set
            if cs.len() > 64 {
                return Err(DecodeError::MalformedPattern(format!(
                    "{} children exceed the 64-child limit",
                    cs.len()
                )));
            }
            cs.iter().try_for_each(|c| validate(c))
        }
        PatternNode::List(cs) | PatternNode::Quote(cs) => {
            cs.iter().try_for_each(|c| validate(c))
        }
        PatternNode::Interleave(a, b) => {
            a.iter().try_for_each(|c| validate(c))?;
            b.iter().try_for_each(|c| validate(c))
        }
        PatternNode::Maybe(c) | PatternNode::Count(c, _) | PatternNode::OrMore(c, _) => {
            validate(c)
        }
        PatternNode::And(l, r) => {
            validate(l)?;
            validate(r)
        }
    }
}
