//! Persistent match index.
//!
//! A flat CSV table keyed by `match_id`, read by the later scraping stages.

pub mod merge;
pub mod repository;

pub use repository::{CommitSummary, MatchIndexRepository};
