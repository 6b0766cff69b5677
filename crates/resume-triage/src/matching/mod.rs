//! Text normalization and the three matching modes used for triage:
//! exact phrases at word boundaries, optional fuzzy phrases, and
//! synonym-expanded formation containment.

pub mod formation;
pub mod normalize;
pub mod phrase;

pub use formation::{default_synonyms, FormationMatcher};
pub use normalize::TextNormalizer;
pub use phrase::{exact_phrase_match, PhraseMatcher};
