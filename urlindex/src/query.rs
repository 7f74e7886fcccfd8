use std::collections::BTreeSet;

use crate::index::{HistoryId, UrlIndex};
use crate::score::{raw_score_for_url, ScoredMatch};
use crate::tokenizer;

/// Result lists are trimmed to this many entries.
const MAX_MATCHES: usize = 10;

impl UrlIndex {
    /// Return the ranked history matches for a query, best first.
    pub fn history_items_for_terms(&mut self, query: &str) -> Vec<ScoredMatch> {
        self.history_items_for_terms_at(query, crate::unix_now())
    }

    /// As [`UrlIndex::history_items_for_terms`], with an explicit clock for
    /// deterministic recency scoring.
    pub fn history_items_for_terms_at(&mut self, query: &str, now: i64) -> Vec<ScoredMatch> {
        let lowered = tokenizer::normalize(query);
        // Scoring matches the user's terms as typed; candidate retrieval
        // works on the index words of the whole string, so a single term
        // like "http://example.com" is looked up as "http", "example", "com".
        let terms: Vec<String> = lowered.split_whitespace().map(str::to_string).collect();
        if terms.is_empty() {
            return Vec::new();
        }

        self.reset_term_cache_flags();
        let history_ids = self.history_id_set_from_words(&lowered);

        let mut scored: Vec<ScoredMatch> = Vec::new();
        for history_id in history_ids {
            // A posting may outlive its row; absence from the info store
            // means the row was deleted.
            let Some(row) = self.get(history_id) else {
                continue;
            };
            let Some(m) = raw_score_for_url(row, &terms, now) else {
                continue;
            };
            let position = scored.iter().position(|s| s.raw_score <= m.raw_score);
            if scored.len() < MAX_MATCHES || position.is_some() {
                scored.insert(position.unwrap_or(scored.len()), m);
                scored.truncate(MAX_MATCHES);
            }
        }

        self.prune_term_cache();
        scored
    }

    /// Intersect the candidate sets of every word in the query string. An
    /// empty word list, or any word with no candidates, yields the empty set.
    fn history_id_set_from_words(&mut self, text: &str) -> BTreeSet<HistoryId> {
        let mut history_ids: Option<BTreeSet<HistoryId>> = None;
        for word in tokenizer::word_set(text) {
            let term_ids = self.history_ids_for_term(&word);
            history_ids = Some(match history_ids {
                None => term_ids,
                Some(acc) => acc.intersection(&term_ids).copied().collect(),
            });
        }
        history_ids.unwrap_or_default()
    }

    /// Candidates for a single term: words containing all of the term's
    /// characters, unioned over their history postings.
    fn history_ids_for_term(&mut self, term: &str) -> BTreeSet<HistoryId> {
        let chars = tokenizer::char_sequence(term);
        let word_ids = self.word_ids_for_term_chars(&chars);
        let mut history_ids = BTreeSet::new();
        for word_id in word_ids {
            if let Some(posted) = self.word_history_map.get(&word_id) {
                history_ids.extend(posted.iter().copied());
            }
        }
        history_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::HistoryInfo;

    const NOW: i64 = 1_700_000_000;

    fn row(history_id: HistoryId, url: &str) -> HistoryInfo {
        HistoryInfo {
            history_id,
            url: url.to_string(),
            title: String::new(),
            visit_count: 3,
            typed_count: 1,
            last_visit: NOW - 3_600,
        }
    }

    #[test]
    fn empty_query_returns_nothing() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://example.com/"));
        assert!(index.history_items_for_terms_at("", NOW).is_empty());
        assert!(index.history_items_for_terms_at("   ", NOW).is_empty());
    }

    #[test]
    fn unknown_term_returns_nothing() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://example.com/"));
        assert!(index.history_items_for_terms_at("zebra", NOW).is_empty());
    }

    #[test]
    fn query_is_case_insensitive() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://Example.COM/"));
        let matches = index.history_items_for_terms_at("EXAMPLE", NOW);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].history_id, 1);
    }

    #[test]
    fn multi_word_single_term_matches_like_a_url() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://www.example.com/"));
        let matches = index.history_items_for_terms_at("http://www.example.com", NOW);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn all_terms_must_match() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://mail.example.com/"));
        index.index_row(row(2, "http://news.example.com/"));

        let both = index.history_items_for_terms_at("example", NOW);
        assert_eq!(both.len(), 2);

        let narrowed = index.history_items_for_terms_at("example mail", NOW);
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].history_id, 1);

        assert!(index
            .history_items_for_terms_at("example zebra", NOW)
            .is_empty());
    }

    #[test]
    fn intersection_agrees_with_per_term_candidates() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://mail.example.com/"));
        index.index_row(row(2, "http://news.example.com/"));
        index.index_row(row(3, "http://mail.news.org/"));

        let ids = |index: &mut UrlIndex, q: &str| -> BTreeSet<HistoryId> {
            index
                .history_items_for_terms_at(q, NOW)
                .into_iter()
                .map(|m| m.history_id)
                .collect()
        };
        let mail = ids(&mut index, "mail");
        let news = ids(&mut index, "news");
        let both = ids(&mut index, "mail news");
        assert_eq!(
            both,
            mail.intersection(&news).copied().collect::<BTreeSet<_>>()
        );
        assert_eq!(both, BTreeSet::from([3]));
    }

    #[test]
    fn partial_words_match_through_the_char_index() {
        let mut index = UrlIndex::new();
        index.index_row(row(3, "http://chromium.org/"));
        let matches = index.history_items_for_terms_at("chrom", NOW);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].history_id, 3);
    }

    #[test]
    fn typed_and_visit_counts_break_the_tie() {
        let mut index = UrlIndex::new();
        let mut favored = row(1, "http://example.com/foo");
        favored.visit_count = 5;
        favored.typed_count = 2;
        let mut ignored = row(2, "http://example.org/foo");
        ignored.visit_count = 1;
        ignored.typed_count = 0;
        index.index_row(favored);
        index.index_row(ignored);

        let matches = index.history_items_for_terms_at("foo", NOW);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].history_id, 1);
        assert_eq!(matches[1].history_id, 2);
        assert!(matches[0].raw_score > matches[1].raw_score);
    }

    #[test]
    fn deleted_rows_never_come_back() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://example.com/"));
        index.index_row(row(2, "http://example.org/"));
        index.delete_url(1);

        let matches = index.history_items_for_terms_at("example", NOW);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].history_id, 2);
    }

    #[test]
    fn results_are_capped_at_ten() {
        let mut index = UrlIndex::new();
        for i in 0..25 {
            index.index_row(row(i, &format!("http://site{i}.example.com/")));
        }
        let matches = index.history_items_for_terms_at("example", NOW);
        assert_eq!(matches.len(), 10);
        // Best first.
        for pair in matches.windows(2) {
            assert!(pair[0].raw_score >= pair[1].raw_score);
        }
    }

    #[test]
    fn mutations_between_queries_are_observed() {
        let mut index = UrlIndex::new();
        index.index_row(row(1, "http://example.com/"));
        let before = index.history_items_for_terms_at("example", NOW);
        assert_eq!(before.len(), 1);

        // "examples" is a new word containing every character of the query;
        // the second query must not reuse intersections cached before it
        // existed.
        index.index_row(row(2, "http://examples.org/"));
        let after = index.history_items_for_terms_at("example", NOW);
        assert_eq!(after.len(), 2);

        index.delete_url(2);
        let after_delete = index.history_items_for_terms_at("example", NOW);
        assert_eq!(after_delete.len(), 1);
    }
}
