// Cryptex Decode CLI
// Demo front end over the decoder; accepts a flat symbol notation only.
// The full pattern grammar is the business of external callers. This
// tool maps single characters straight to symbol nodes:
//   A-Z  exact letter        a-z  noisy letter
//   .    wildcard            /    explicit word boundary
//   <..> anagram of the enclosed symbols (not nestable)

use clap::Parser;
use cryptex::{Decoder, NodeRef, PatternNode, PriorModel, SearchParams};
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Cryptex - decode hidden word sequences from letter patterns
#[derive(Parser, Debug)]
#[command(name = "decode")]
#[command(about = "Decode a letter pattern into ranked candidate messages", long_about = None)]
struct Args {
    /// Flat pattern: A-Z exact, a-z noisy, '.' wildcard, '/' boundary,
    /// '<...>' anagram group
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// Comma-separated target word lengths (e.g. "3,6")
    #[arg(short = 'w', long)]
    lengths: Option<String>,

    /// Maximum number of results to display
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Show log scores for each result
    #[arg(short, long)]
    scores: bool,

    /// Seed for the adaptive-threshold sampling
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Word-frequency file (defaults to the embedded demo corpus)
    #[arg(long)]
    words_file: Option<PathBuf>,

    /// Bigram-frequency file
    #[arg(long)]
    bigrams_file: Option<PathBuf>,

    /// Show detailed information
    #[arg(short, long)]
    verbose: bool,
}

/// Build a pattern node for one flat symbol character
fn symbol_node(ch: char) -> Result<NodeRef, String> {
    match ch {
        'A'..='Z' => Ok(PatternNode::exact(ch)),
        'a'..='z' => Ok(PatternNode::noisy(ch)),
        '.' => Ok(PatternNode::wildcard()),
        '/' => Ok(PatternNode::word_boundary()),
        other => Err(format!("unsupported pattern character '{}'", other)),
    }
}

/// Map the flat demo notation onto a pattern AST
fn parse_flat_pattern(text: &str) -> Result<NodeRef, String> {
    let mut nodes: Vec<NodeRef> = Vec::new();
    let mut group: Option<Vec<NodeRef>> = None;

    for ch in text.chars() {
        match ch {
            '<' => {
                if group.is_some() {
                    return Err("anagram groups cannot nest".into());
                }
                group = Some(Vec::new());
            }
            '>' => match group.take() {
                Some(children) => nodes.push(PatternNode::anagram(children)),
                None => return Err("'>' without a matching '<'".into()),
            },
            _ => {
                let node = symbol_node(ch)?;
                match &mut group {
                    Some(children) => children.push(node),
                    None => nodes.push(node),
                }
            }
        }
    }
    if group.is_some() {
        return Err("unclosed anagram group".into());
    }
    if nodes.is_empty() {
        return Err("empty pattern".into());
    }
    Ok(PatternNode::list(nodes))
}

/// Parse the --lengths argument
fn parse_lengths(text: &str) -> Result<Vec<usize>, String> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid word length '{}'", part))
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let pattern = parse_flat_pattern(&args.pattern)?;
    let lengths = args.lengths.as_deref().map(parse_lengths).transpose()?;

    let word_counts = match &args.words_file {
        Some(path) => cryptex::data::load_word_counts(path)?,
        None => cryptex::data::demo_word_counts(),
    };
    let bigram_counts = match &args.bigrams_file {
        Some(path) => cryptex::data::load_bigram_counts(path)?,
        None if args.words_file.is_none() => cryptex::data::demo_bigram_counts(),
        None => FxHashMap::default(),
    };

    let model = PriorModel::from_tables(word_counts, bigram_counts);
    if args.verbose {
        println!("📚 Corpus loaded: {} words\n", model.word_count());
    }

    let decoder = Decoder::with_params(
        model,
        Default::default(),
        SearchParams {
            seed: args.seed,
            ..SearchParams::default()
        },
    );

    if args.verbose {
        println!("🔎 Decoding pattern: {}", args.pattern);
        println!("─────────────────────────────────────────────────\n");
    }

    let mut results = decoder.solve(&pattern, lengths)?;
    results.truncate(args.limit);

    if results.is_empty() {
        println!("❌ No decodings found.");
        return Ok(());
    }

    println!("✅ Found {} decodings:\n", results.len());
    for (idx, result) in results.iter().enumerate() {
        if args.scores {
            println!("{}. {:<30} (score {:.3})", idx + 1, result.message, result.score);
        } else {
            println!("{}. {}", idx + 1, result.message);
        }
    }

    if args.verbose {
        println!("\n─────────────────────────────────────────────────");
        println!("✨ Decode completed.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptex::PatternNode as P;

    #[test]
    fn test_flat_symbols() {
        let p = parse_flat_pattern("Ab.").unwrap();
        let expected = P::list(vec![P::exact('A'), P::noisy('B'), P::wildcard()]);
        assert_eq!(p, expected);
    }

    #[test]
    fn test_anagram_group() {
        let p = parse_flat_pattern("<CAT>").unwrap();
        assert_eq!(p, P::list(vec![P::anagram_of("CAT")]));
    }

    #[test]
    fn test_boundary_symbol() {
        let p = parse_flat_pattern("A/B").unwrap();
        let expected = P::list(vec![P::exact('A'), P::word_boundary(), P::exact('B')]);
        assert_eq!(p, expected);
    }

    #[test]
    fn test_rejects_nested_group() {
        assert!(parse_flat_pattern("<A<B>>").is_err());
        assert!(parse_flat_pattern("<AB").is_err());
        assert!(parse_flat_pattern("A>").is_err());
        assert!(parse_flat_pattern("").is_err());
        assert!(parse_flat_pattern("A-B").is_err());
    }

    #[test]
    fn test_parse_lengths() {
        assert_eq!(parse_lengths("3,6").unwrap(), vec![3, 6]);
        assert!(parse_lengths("3,x").is_err());
    }
}
