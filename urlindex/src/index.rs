use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::tokenizer;

/// Key of a row in the external history store. Opaque to the index.
pub type HistoryId = u64;
/// Index-local id of one unique indexed word. Stable once assigned.
pub type WordId = u32;

/// Denormalized history row data kept for scoring and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryInfo {
    pub history_id: HistoryId,
    /// Normalized (NFKC, lowercased) URL text; this is the text that was
    /// tokenized into the index and the text terms are matched against.
    pub url: String,
    pub title: String,
    pub visit_count: u32,
    pub typed_count: u32,
    /// Unix timestamp in seconds.
    pub last_visit: i64,
}

/// Decides whether a history row is significant enough to index.
///
/// A row qualifies when it was typed more than `typed_limit` times, visited
/// more than `visit_limit` times, or visited within the last
/// `age_limit_days` days.
#[derive(Debug, Clone)]
pub struct QualificationPolicy {
    pub typed_limit: u32,
    pub visit_limit: u32,
    pub age_limit_days: i64,
}

impl Default for QualificationPolicy {
    fn default() -> Self {
        Self {
            typed_limit: 1,
            visit_limit: 4,
            age_limit_days: 3,
        }
    }
}

impl QualificationPolicy {
    /// A policy that admits every row, for tooling and tests.
    pub fn keep_all() -> Self {
        Self {
            typed_limit: 0,
            visit_limit: 0,
            age_limit_days: i64::MAX / 86_400,
        }
    }

    pub fn recent_threshold(&self, now: i64) -> i64 {
        now.saturating_sub(self.age_limit_days.saturating_mul(86_400))
    }

    pub fn qualifies(&self, row: &HistoryInfo, now: i64) -> bool {
        row.typed_count > self.typed_limit
            || row.visit_count > self.visit_limit
            || row.last_visit >= self.recent_threshold(now)
    }
}

/// One slot of the term resolution cache: the cumulative intersection of
/// char-posting lookups for the query term's characters up to and including
/// `ch`.
#[derive(Debug, Clone)]
pub(crate) struct TermCharEntry {
    pub ch: char,
    pub word_ids: BTreeSet<WordId>,
    pub used: bool,
}

/// In-memory inverted index over the URLs a user has visited.
///
/// The word table is append-only and posting maps are additive: deleting a
/// row removes only its `HistoryInfo` entry, and stale postings are filtered
/// out at query time by the history-info lookup. Reclaiming that space takes
/// a full rebuild. All structures assume a single owner; callers running
/// mutations and queries from different contexts must serialize them.
#[derive(Debug, Default)]
pub struct UrlIndex {
    pub(crate) word_list: Vec<String>,
    pub(crate) word_map: HashMap<String, WordId>,
    pub(crate) char_word_map: HashMap<char, BTreeSet<WordId>>,
    pub(crate) word_history_map: HashMap<WordId, BTreeSet<HistoryId>>,
    pub(crate) history_info_map: HashMap<HistoryId, HistoryInfo>,
    pub(crate) term_char_cache: Vec<TermCharEntry>,
    pub(crate) history_item_count: u32,
    languages: String,
}

impl UrlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// `languages` is a display-formatting hint owned by the caller (e.g. for
    /// IDN handling); the built-in normalizer applies NFKC and lowercasing
    /// regardless.
    pub fn with_languages(languages: &str) -> Self {
        Self {
            languages: languages.to_string(),
            ..Self::default()
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    /// Number of history rows currently indexed.
    pub fn history_item_count(&self) -> u32 {
        self.history_item_count
    }

    /// Number of unique words ever indexed.
    pub fn word_count(&self) -> usize {
        self.word_list.len()
    }

    pub fn word(&self, word_id: WordId) -> Option<&str> {
        self.word_list.get(word_id as usize).map(String::as_str)
    }

    pub fn word_id(&self, word: &str) -> Option<WordId> {
        self.word_map.get(word).copied()
    }

    pub fn get(&self, history_id: HistoryId) -> Option<&HistoryInfo> {
        self.history_info_map.get(&history_id)
    }

    /// Drop everything and bulk-load the qualifying rows of a full history
    /// enumeration. This is the cold-start path when no usable cache exists.
    pub fn rebuild_from_rows<I>(&mut self, rows: I, policy: &QualificationPolicy, now: i64)
    where
        I: IntoIterator<Item = HistoryInfo>,
    {
        self.clear();
        for row in rows {
            if policy.qualifies(&row, now) {
                self.index_row(row);
            }
        }
        tracing::info!(
            items = self.history_item_count,
            words = self.word_list.len(),
            "rebuilt url index from history rows"
        );
    }

    pub fn clear(&mut self) {
        self.word_list.clear();
        self.word_map.clear();
        self.char_word_map.clear();
        self.word_history_map.clear();
        self.history_info_map.clear();
        self.term_char_cache.clear();
        self.history_item_count = 0;
    }

    /// Add one row to the index: store its info for scoring/display and post
    /// every word of its normalized URL text.
    pub fn index_row(&mut self, row: HistoryInfo) {
        let url = tokenizer::normalize(&row.url);
        let history_id = row.history_id;
        let stored = HistoryInfo { url: url.clone(), ..row };
        if self.history_info_map.insert(history_id, stored).is_none() {
            self.history_item_count += 1;
        }
        for word in tokenizer::word_set(&url) {
            self.add_word_to_index(&word, history_id);
        }
        self.term_char_cache.clear();
    }

    /// Apply an external row mutation. A still-qualifying row that is already
    /// indexed gets its metadata refreshed; words from its originally indexed
    /// text are kept as-is. A newly qualifying row is indexed, and a row that
    /// no longer qualifies is de-indexed.
    pub fn update_url(&mut self, row: HistoryInfo, policy: &QualificationPolicy, now: i64) {
        if !policy.qualifies(&row, now) {
            self.delete_url(row.history_id);
            return;
        }
        match self.history_info_map.get_mut(&row.history_id) {
            Some(existing) => {
                existing.title = row.title;
                existing.visit_count = row.visit_count;
                existing.typed_count = row.typed_count;
                existing.last_visit = row.last_visit;
                self.term_char_cache.clear();
            }
            None => self.index_row(row),
        }
    }

    /// Remove a row from the history-info store. Postings referencing it are
    /// left in place and filtered out of query results by the store lookup.
    pub fn delete_url(&mut self, history_id: HistoryId) {
        if self.history_info_map.remove(&history_id).is_some() {
            self.history_item_count = self.history_item_count.saturating_sub(1);
        }
        self.term_char_cache.clear();
    }

    fn add_word_to_index(&mut self, word: &str, history_id: HistoryId) {
        match self.word_map.get(word) {
            Some(&word_id) => {
                self.word_history_map
                    .entry(word_id)
                    .or_default()
                    .insert(history_id);
            }
            None => self.add_word_history(word, history_id),
        }
        debug_assert_eq!(self.word_list.len(), self.word_map.len());
    }

    /// Register a previously unseen word: append it to the word table, open
    /// its posting set, and post its characters. Word ids are never reused.
    fn add_word_history(&mut self, word: &str, history_id: HistoryId) {
        let word_id = self.word_list.len() as WordId;
        self.word_list.push(word.to_string());
        self.word_map.insert(word.to_string(), word_id);
        self.word_history_map
            .insert(word_id, BTreeSet::from([history_id]));
        for ch in tokenizer::char_sequence(word) {
            self.char_word_map.entry(ch).or_default().insert(word_id);
        }
    }

    /// Resolve a term's unique-character sequence to the set of word ids
    /// whose words contain every one of those characters.
    ///
    /// Cached cumulative intersections are reused for as long as the cached
    /// characters match the term's prefix — extending the previous term by
    /// one typed character costs a single intersection. A diverging character
    /// invalidates the cached tail; each newly computed intersection is
    /// appended so the next keystroke starts from here.
    pub(crate) fn word_ids_for_term_chars(&mut self, chars: &[char]) -> BTreeSet<WordId> {
        let mut matched = 0;
        while matched < chars.len()
            && matched < self.term_char_cache.len()
            && self.term_char_cache[matched].ch == chars[matched]
        {
            self.term_char_cache[matched].used = true;
            matched += 1;
        }
        if matched == chars.len() {
            return match matched {
                0 => BTreeSet::new(),
                n => self.term_char_cache[n - 1].word_ids.clone(),
            };
        }
        self.term_char_cache.truncate(matched);

        let mut word_ids = match matched {
            0 => BTreeSet::new(),
            n => self.term_char_cache[n - 1].word_ids.clone(),
        };
        for (i, &ch) in chars.iter().enumerate().skip(matched) {
            word_ids = match self.char_word_map.get(&ch) {
                // A character absent from every indexed word: no word can
                // contain this term.
                None => BTreeSet::new(),
                Some(posted) if i == 0 => posted.clone(),
                Some(posted) => word_ids.intersection(posted).copied().collect(),
            };
            self.term_char_cache.push(TermCharEntry {
                ch,
                word_ids: word_ids.clone(),
                used: true,
            });
            if word_ids.is_empty() {
                break;
            }
        }
        word_ids
    }

    pub(crate) fn reset_term_cache_flags(&mut self) {
        for entry in &mut self.term_char_cache {
            entry.used = false;
        }
    }

    /// Mark-and-sweep: entries not touched by the query that just ran are
    /// dropped, bounding the cache to the longest term actually queried.
    pub(crate) fn prune_term_cache(&mut self) {
        self.term_char_cache.retain(|entry| entry.used);
    }
}
