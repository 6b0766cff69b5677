use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Terms are runs of two or more word characters.
static RE_TERM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for m in RE_TERM.find_iter(text) {
        *tf.entry(m.as_str().to_lowercase()).or_insert(0.0) += 1.0;
    }
    tf
}

/// TF-IDF similarity against a fixed reference document (the job
/// description).
///
/// The IDF is fitted on the two-document corpus `{reference, candidate}`
/// with smoothing, `ln((1 + n) / (1 + df)) + 1`, and both vectors are
/// L2-normalized, so the result is a cosine in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct SemanticModel {
    reference: HashMap<String, f64>,
}

impl SemanticModel {
    pub fn new(reference: &str) -> Self {
        Self {
            reference: term_frequencies(reference),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    pub fn similarity(&self, text: &str) -> f64 {
        let candidate = term_frequencies(text);
        if self.reference.is_empty() || candidate.is_empty() {
            return 0.0;
        }

        const DOCS: f64 = 2.0;
        let idf = |term: &str| {
            let df = f64::from(u8::from(self.reference.contains_key(term)))
                + f64::from(u8::from(candidate.contains_key(term)));
            ((1.0 + DOCS) / (1.0 + df)).ln() + 1.0
        };

        let mut dot = 0.0;
        let mut norm_ref = 0.0;
        for (term, tf) in &self.reference {
            let w = tf * idf(term);
            norm_ref += w * w;
            if let Some(ctf) = candidate.get(term) {
                dot += w * ctf * idf(term);
            }
        }
        let norm_cand: f64 = candidate
            .iter()
            .map(|(term, tf)| {
                let w = tf * idf(term);
                w * w
            })
            .sum();

        if norm_ref == 0.0 || norm_cand == 0.0 {
            return 0.0;
        }
        (dot / (norm_ref.sqrt() * norm_cand.sqrt())).clamp(0.0, 1.0)
    }
}
