use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[a-z]+").expect("valid regex");
}

/// Tokenize text into lowercase runs of ASCII letters.
///
/// Digits, punctuation, whitespace and non-ASCII characters are delimiters.
/// No stemming and no stop-word removal.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    RE.find_iter(&lowered).map(|m| m.as_str().to_string()).collect()
}

/// Occurrence count of each distinct token.
pub fn term_counts<S: AsRef<str>>(tokens: &[S]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}
