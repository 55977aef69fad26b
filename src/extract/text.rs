use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Accent/case folding used everywhere a token or query word is
/// compared: compatibility-decompose, drop everything outside ASCII,
/// lowercase.
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Distinct normalized tokens of a text. Tokens shorter than 2 or
/// longer than 19 characters carry no signal and are dropped.
pub fn words(text: &str) -> BTreeSet<String> {
    text.unicode_words()
        .map(fold)
        .map(|w| w.trim().to_string())
        .filter(|w| (2..=19).contains(&w.len()))
        .collect()
}
