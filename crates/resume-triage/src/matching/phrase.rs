use regex::Regex;
use strsim::jaro_winkler;

use super::normalize::TextNormalizer;

/// A phrase compiled for repeated word-boundary lookups in normalized text.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    phrase: String,
    pattern: Regex,
    word_count: usize,
}

impl PhraseMatcher {
    /// Compiles `phrase`. Returns `None` when it normalizes to nothing.
    pub fn new(phrase: &str) -> Option<Self> {
        let phrase = TextNormalizer::new().normalize(phrase);
        let first = phrase.chars().next()?;
        let last = phrase.chars().next_back()?;

        // `\b` only works next to a word character; phrases such as "c++"
        // need an explicit "not followed by a word character" guard instead.
        let head = if is_word_char(first) { r"\b" } else { r"(?:^|\W)" };
        let tail = if is_word_char(last) { r"\b" } else { r"(?:\W|$)" };
        let pattern = Regex::new(&format!("{}{}{}", head, regex::escape(&phrase), tail)).ok()?;
        let word_count = phrase.split(' ').count();

        Some(Self {
            phrase,
            pattern,
            word_count,
        })
    }

    /// The normalized phrase.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Exact lookup. `text` must already be normalized.
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Exact lookup, or else a Jaro-Winkler comparison against every window of
    /// `word_count` consecutive words. `text` must already be normalized.
    pub fn is_fuzzy_match(&self, text: &str, threshold: f64) -> bool {
        if self.is_match(text) {
            return true;
        }

        let words: Vec<&str> = text
            .split(' ')
            .map(|w| w.trim_matches(|c: char| !is_word_char(c)))
            .filter(|w| !w.is_empty())
            .collect();
        if words.len() < self.word_count {
            return false;
        }

        words
            .windows(self.word_count)
            .any(|window| jaro_winkler(&window.join(" "), &self.phrase) >= threshold)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `phrase` occurs in `text` at word boundaries once both are
/// normalized. Empty phrases never match.
pub fn exact_phrase_match(text: &str, phrase: &str) -> bool {
    match PhraseMatcher::new(phrase) {
        Some(matcher) => matcher.is_match(&TextNormalizer::new().normalize(text)),
        None => false,
    }
}
