pub mod scorer;
pub mod tfidf;

pub use scorer::{CandidateScorer, Decision, Evaluation, RejectReason, ScoreBreakdown};
pub use tfidf::SemanticModel;
