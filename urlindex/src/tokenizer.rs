use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+").expect("valid regex");
}

/// Normalize text prior to tokenization or querying: NFKC fold, then lowercase.
pub fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Split text into its set of unique words. A word is a maximal run of
/// letters and digits; punctuation and whitespace separate words, so a URL
/// like `http://www.example.com/` yields `{com, example, http, www}`.
pub fn word_set(text: &str) -> BTreeSet<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The unique characters of a word, in order of first appearance.
pub fn char_sequence(word: &str) -> Vec<char> {
    let mut seen = BTreeSet::new();
    let mut chars = Vec::new();
    for ch in word.chars() {
        if seen.insert(ch) {
            chars.push(ch);
        }
    }
    chars
}
