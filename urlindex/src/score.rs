use url::Url;

use crate::index::{HistoryId, HistoryInfo};

/// One ranked query result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub history_id: HistoryId,
    pub url: String,
    pub title: String,
    /// Relevance on a 0..=1000 scale.
    pub raw_score: u32,
    /// Byte offset of the first query term in `url`, for highlighting.
    pub first_term_offset: usize,
}

const ORDER_MAX: f32 = 10.0;
const START_MAX: f32 = 10.0;
const COMPLETE_MAX: f32 = 10.0;
const RECENCY_MAX: f32 = 10.0;
const VISIT_MAX: f32 = 10.0;
const TYPED_MAX: f32 = 20.0;
const MAX_RAW_SCORE: f32 = 1000.0;

/// Start offsets past this point stop mattering.
const MAX_SIGNIFICANT_START: usize = 20;
/// Recency decays linearly over this window, in seconds.
const MAX_SIGNIFICANT_AGE: i64 = 30 * 86_400;
/// Visit and typed counts saturate here.
const MAX_SIGNIFICANT_VISITS: u32 = 10;
const MAX_SIGNIFICANT_TYPED: u32 = 10;

/// Score a candidate row against the lowercased query terms.
///
/// Every term must occur as a substring of the row's URL text and the URL
/// must parse; otherwise the row scores 0 and is dropped. The sum of the
/// weighted components (term order, match start, completeness, recency,
/// visit count, typed count) is renormalized onto 0..=1000.
pub fn raw_score_for_url(row: &HistoryInfo, terms: &[String], now: i64) -> Option<ScoredMatch> {
    if terms.is_empty() || Url::parse(&row.url).is_err() {
        return None;
    }
    let url = &row.url;

    let mut term_locations: Vec<usize> = Vec::with_capacity(terms.len());
    let mut out_of_order = 0usize;
    let mut start_total = 0usize;
    let mut term_length_total = 0usize;
    let mut first_term_offset = 0usize;
    for (i, term) in terms.iter().enumerate() {
        // The candidate was reached through the posting maps, but those only
        // prove its words contain the term's characters.
        let location = url.find(term.as_str())?;
        if i == 0 {
            first_term_offset = location;
        } else {
            out_of_order += term_locations
                .iter()
                .filter(|&&earlier| location <= earlier)
                .count();
        }
        term_locations.push(location);
        start_total += location;
        term_length_total += term.len();
    }

    let order_value = if terms.len() > 1 {
        let max_out_of_order = terms.len() * (terms.len() - 1) / 2;
        (max_out_of_order - out_of_order) as f32 / max_out_of_order as f32 * ORDER_MAX
    } else {
        ORDER_MAX
    };

    let average_start = start_total / terms.len();
    let start_value = (MAX_SIGNIFICANT_START - average_start.min(MAX_SIGNIFICANT_START)) as f32
        / MAX_SIGNIFICANT_START as f32
        * START_MAX;

    let complete_value = term_length_total as f32 / url.len() as f32 * COMPLETE_MAX;

    let age = (now - row.last_visit).clamp(0, MAX_SIGNIFICANT_AGE);
    let recency_value = (MAX_SIGNIFICANT_AGE - age) as f32 / MAX_SIGNIFICANT_AGE as f32 * RECENCY_MAX;

    let visit_value = row.visit_count.min(MAX_SIGNIFICANT_VISITS) as f32
        / MAX_SIGNIFICANT_VISITS as f32
        * VISIT_MAX;
    let typed_value = row.typed_count.min(MAX_SIGNIFICANT_TYPED) as f32
        / MAX_SIGNIFICANT_TYPED as f32
        * TYPED_MAX;

    let component_max = ORDER_MAX + START_MAX + COMPLETE_MAX + RECENCY_MAX + VISIT_MAX + TYPED_MAX;
    let raw = (order_value + start_value + complete_value + recency_value + visit_value
        + typed_value)
        / component_max
        * MAX_RAW_SCORE;
    let raw_score = raw as u32;
    if raw_score == 0 {
        return None;
    }

    Some(ScoredMatch {
        history_id: row.history_id,
        url: row.url.clone(),
        title: row.title.clone(),
        raw_score,
        first_term_offset,
    })
}
