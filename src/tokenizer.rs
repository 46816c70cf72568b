//! Bilingual tokenization of transcript text.
//!
//! Latin-script words come from Unicode word boundaries (UAX #29) over the
//! lowercased text. Chinese words come from jieba segmentation over the
//! original text. Both streams are filtered and merged into one set.

use std::collections::BTreeSet;

use jieba_rs::Jieba;
use once_cell::sync::Lazy;
use unicode_segmentation::UnicodeSegmentation;

static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Returns `true` for characters in the CJK Unified Ideographs block.
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}')
}

/// Check if text contains at least one CJK ideograph.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Normalize `text` into the set of index keys it contributes.
///
/// The result is deterministic and deduplicated. Empty or punctuation-only
/// input yields an empty set.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = latin_words(text);
    tokens.extend(chinese_words(text));
    tokens
}

fn latin_words(text: &str) -> BTreeSet<String> {
    // Ideographs are split one per character by UAX #29, so they are left
    // to the segmenter.
    text.to_lowercase()
        .unicode_words()
        .filter(|word| word.chars().any(char::is_alphabetic))
        .filter(|word| !contains_cjk(word))
        .map(str::to_string)
        .collect()
}

fn chinese_words(text: &str) -> BTreeSet<String> {
    if !contains_cjk(text) {
        return BTreeSet::new();
    }

    JIEBA
        .cut(text, true)
        .into_iter()
        .map(str::trim)
        .filter(|word| contains_cjk(word))
        .map(str::to_string)
        .collect()
}
