use std::collections::{BTreeMap, BTreeSet};

use super::normalize::TextNormalizer;

/// Built-in synonym groups for common formations, keyed by canonical term.
pub fn default_synonyms() -> BTreeMap<String, Vec<String>> {
    let groups: [(&str, &[&str]); 3] = [
        (
            "farmacia",
            &["farmacia", "farmácia", "farmaceutico", "farmacêutico", "pharmacy"],
        ),
        ("biomedicina", &["biomedicina", "biomédico", "biomédica"]),
        (
            "quimica",
            &["quimica", "química", "quimico", "química industrial", "chemistry"],
        ),
    ];

    groups
        .iter()
        .map(|(key, syns)| {
            (
                key.to_string(),
                syns.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

/// Matches education/formation terms by substring containment after
/// expanding each configured term through its synonym group.
///
/// Looser than keyword matching: "farmacia" is found inside "biofarmacia"
/// as well as in "farmacia-bioquimica".
#[derive(Debug, Clone, Default)]
pub struct FormationMatcher {
    terms: BTreeSet<String>,
}

impl FormationMatcher {
    /// Expands `formations` through `synonyms`. A configured term pulls in a
    /// whole group when it equals the group key or any member of the group.
    pub fn new(formations: &[String], synonyms: &BTreeMap<String, Vec<String>>) -> Self {
        let normalizer = TextNormalizer::new();
        let groups: Vec<(String, Vec<String>)> = synonyms
            .iter()
            .map(|(key, syns)| {
                (
                    normalizer.normalize(key),
                    syns.iter().map(|s| normalizer.normalize(s)).collect(),
                )
            })
            .collect();

        let mut terms = BTreeSet::new();
        for formation in formations {
            let term = normalizer.normalize(formation);
            if term.is_empty() {
                continue;
            }
            for (key, syns) in &groups {
                if *key == term || syns.contains(&term) {
                    terms.insert(key.clone());
                    terms.extend(syns.iter().filter(|s| !s.is_empty()).cloned());
                }
            }
            terms.insert(term);
        }

        Self { terms }
    }

    /// True when no formation was configured; the formation condition is then
    /// vacuously satisfied.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// Expanded terms contained in `text`, which must already be normalized.
    pub fn find(&self, text: &str) -> Vec<String> {
        self.terms
            .iter()
            .filter(|term| text.contains(term.as_str()))
            .cloned()
            .collect()
    }
}
