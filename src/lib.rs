//! # Cryptex: Pattern-Driven Probabilistic Decoder
//!
//! Decodes hidden word sequences from structural pattern constraints,
//! ranking candidates with a corpus-backed language model.
//!
//! ## How a Decode Works
//!
//! 1. **Pattern** - An AST of structural constraints (exact/noisy letters,
//!    wildcards, anagrams, chains, interleavings, conjunctions, quotes)
//! 2. **Compile** - The AST becomes a graph of continuation-carrying
//!    states, gated by static length/complexity ceilings
//! 3. **Search** - A best-first engine walks the states, weighing each
//!    structural emission against the prior model, and keeps the top-K
//!    distinct messages
//!
//! ## Example Usage
//!
//! ```ignore
//! use cryptex::{Decoder, PatternNode, PriorModel};
//!
//! let decoder = Decoder::new(PriorModel::demo());
//!
//! // The letters of LISTEN, in any order
//! let pattern = PatternNode::anagram_of("LISTEN");
//! let results = decoder.solve(&pattern, None)?;
//!
//! for r in &results {
//!     println!("{}  ({:.2})", r.message, r.score);
//! }
//! # Ok::<(), cryptex::DecodeError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Pattern AST** - Immutable, `Rc`-shared constraint nodes
//! - **State Compiler** - One state kind per operator, continuations as
//!   explicit values (no host call stack)
//! - **Transition Semantics** - Per-state successor rules with epsilon and
//!   token-emitting moves
//! - **Prior Model** - Word/bigram frequency tables with memoized
//!   short-prefix distributions
//! - **Search Engine** - Two-frontier best-first rounds with an adaptive,
//!   sampled pruning threshold

pub mod data;
pub mod model;
pub mod pattern;
pub mod search;
pub mod state;
pub mod types;
pub mod vocab;

// Re-export main types and functions for convenience
pub use data::CorpusError;
pub use model::PriorModel;
pub use pattern::{complexity, CharClass, NodeRef, PatternNode};
pub use search::{Decoder, SearchParams, SearchStats};
pub use state::{compile, Cont, State, StateRef, Step};
pub use types::{DecodeCtx, DecodeError, Limits, SolveResult, Token, TokenProbs};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
