// Cryptex Vocabulary
// Maps the 27-symbol token alphabet to and from characters

use crate::types::{Token, NUM_LETTERS, WORD_DELIM};

/// Token for an uppercase ASCII letter
///
/// Lowercase input is accepted and folded to uppercase.
#[inline]
pub fn letter_token(ch: char) -> Option<Token> {
    let up = ch.to_ascii_uppercase();
    if up.is_ascii_uppercase() {
        Some((up as u8 - b'A' + 1) as Token)
    } else {
        None
    }
}

/// Character for a letter token; the delimiter has no character
#[inline]
pub fn token_char(token: Token) -> Option<char> {
    if (1..=NUM_LETTERS as u8).contains(&token) {
        Some((b'A' + token - 1) as char)
    } else {
        None
    }
}

/// Encode a single word into letter tokens
///
/// Fails on any non-alphabetic character.
pub fn encode_word(word: &str) -> Option<Vec<Token>> {
    word.chars().map(letter_token).collect()
}

/// Decode a token sequence into a space-joined message
///
/// Delimiters become word breaks; a trailing unfinished word is kept.
pub fn decode(tokens: &[Token]) -> String {
    let mut out = String::new();
    for &t in tokens {
        if t == WORD_DELIM {
            if !out.ends_with(' ') && !out.is_empty() {
                out.push(' ');
            }
        } else if let Some(ch) = token_char(t) {
            out.push(ch);
        }
    }
    out.trim_end().to_string()
}
