use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const SOFT_HYPHEN: char = '\u{00AD}';

static RE_HYPHEN_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-\s+").unwrap());

/// Canonicalizes text before any comparison.
///
/// Steps, in order: soft-hyphen removal, joining of words split by a hyphen
/// followed by whitespace (line-break hyphenation), lower-casing, NFD
/// decomposition with combining marks dropped, whitespace collapse.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, text: &str) -> String {
        let text: String = text.chars().filter(|c| *c != SOFT_HYPHEN).collect();
        let text = self.join_hyphenated(&text);
        let folded: String = text
            .to_lowercase()
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .collect();
        collapse_whitespace(&folded)
    }

    /// Removes `-<whitespace>` only when it sits between two word characters.
    fn join_hyphenated(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in RE_HYPHEN_BREAK.find_iter(text) {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            if before.is_some_and(is_word_char) && after.is_some_and(is_word_char) {
                out.push_str(&text[last..m.start()]);
                last = m.end();
            }
        }
        out.push_str(&text[last..]);
        out
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
