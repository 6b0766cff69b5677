pub mod dedup;
pub mod filesystem;

pub use dedup::{content_hash, DedupCache};
pub use filesystem::FileStorage;
