//! In-memory full-text index over a user's URL history, built for
//! per-keystroke omnibox autocomplete.
//!
//! The index keeps an append-only word table, a character-level posting map
//! (char -> word ids) and a word-level posting map (word id -> history ids),
//! plus the denormalized row data needed to score and display matches.
//! Queries resolve each term through cached character intersections, so
//! extending a term by one typed character costs a single intersection, then
//! rank the surviving rows by term order, match position, completeness,
//! recency, and visit/typed counts.
//!
//! The whole index snapshots to a single self-validating binary cache file
//! ([`save_cache`]/[`load_cache`]); a blob that fails validation is rejected
//! whole and the caller rebuilds from the authoritative history store.
//!
//! The index is a single owned state object with no internal locking: run
//! all mutations and queries through one owner.

pub mod index;
pub mod persist;
pub mod query;
pub mod score;
pub mod tokenizer;

pub use index::{HistoryId, HistoryInfo, QualificationPolicy, UrlIndex, WordId};
pub use persist::{load_cache, save_cache, CacheError};
pub use score::ScoredMatch;

pub(crate) fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
