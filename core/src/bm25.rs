//! Okapi BM25 over an [`InvertedIndex`].

use crate::index::{DocId, InvertedIndex};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// idf = ln((N - df + 0.5) / (df + 0.5) + 1). Not clamped.
pub fn idf(doc_count: u32, df: usize) -> f64 {
    let n = f64::from(doc_count);
    let df = df as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Score every document; index position is the document id and a document
/// with no matching term scores exactly 0.0.
///
/// Query terms are not deduplicated: a repeated term is scored once per occurrence.
pub fn score<S: AsRef<str>>(query_terms: &[S], index: &InvertedIndex, params: Bm25Params) -> Vec<f64> {
    let mut scores = vec![0.0f64; index.doc_count as usize];
    let Bm25Params { k1, b } = params;

    for term in query_terms {
        let Some(plist) = index.postings.get(term.as_ref()) else { continue };
        let df = plist.len();
        if df == 0 {
            continue;
        }
        let idf = idf(index.doc_count, df);
        for p in plist {
            let dl = f64::from(index.doc_len(p.doc_id));
            let tf = f64::from(p.tf);
            let denom = tf + k1 * (1.0 - b + b * dl / index.avgdl);
            if let Some(s) = scores.get_mut(p.doc_id as usize) {
                *s += idf * tf * (k1 + 1.0) / denom;
            }
        }
    }
    scores
}

/// Tokenize `query`, score, and return the `topk` best `(doc_id, score)` pairs.
///
/// Ties keep document order. Zero-score documents are included when fewer
/// than `topk` documents match.
pub fn search(index: &InvertedIndex, query: &str, topk: usize, params: Bm25Params) -> Vec<(DocId, f64)> {
    search_with(index, &Tokenizer::default(), query, topk, params)
}

/// [`search`] with the tokenizer the index was built with.
pub fn search_with(
    index: &InvertedIndex,
    tokenizer: &Tokenizer,
    query: &str,
    topk: usize,
    params: Bm25Params,
) -> Vec<(DocId, f64)> {
    let terms = tokenizer.tokenize(query);
    let mut ranked: Vec<(DocId, f64)> = score(&terms, index, params)
        .into_iter()
        .enumerate()
        .map(|(i, s)| (i as DocId, s))
        .collect();
    // stable: equal scores stay in enumeration order
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(topk);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> InvertedIndex {
        InvertedIndex::build(&["狩人 狩人 冬", "狩人 夏", "女神 秋"])
    }

    #[test]
    fn non_matching_doc_scores_zero() {
        let idx = corpus();
        let s = score(&["狩人"], &idx, Bm25Params::default());
        assert_eq!(s.len(), 3);
        assert_eq!(s[2], 0.0);
        assert!(s[0] > 0.0 && s[1] > 0.0);
    }

    #[test]
    fn out_of_vocabulary_term_contributes_nothing() {
        let idx = corpus();
        let with = score(&["狩人", "ゼウス"], &idx, Bm25Params::default());
        let without = score(&["狩人"], &idx, Bm25Params::default());
        assert_eq!(with, without);
        assert!(score(&["ゼウス"], &idx, Bm25Params::default()).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn token_order_does_not_matter() {
        let idx = corpus();
        let a = score(&["狩人", "女神"], &idx, Bm25Params::default());
        let b = score(&["女神", "狩人"], &idx, Bm25Params::default());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn duplicate_token_doubles_contribution() {
        let idx = corpus();
        let once = score(&["女神"], &idx, Bm25Params::default());
        let twice = score(&["女神", "女神"], &idx, Bm25Params::default());
        assert!(twice[2] > once[2]);
        assert!((twice[2] - 2.0 * once[2]).abs() < 1e-12);
    }

    #[test]
    fn idf_shrinks_as_df_grows() {
        assert!(idf(3, 2) > 0.0);
        assert!(idf(3, 2) < idf(3, 1));
        assert_eq!(idf(0, 0), (0.5f64 / 0.5 + 1.0).ln());
    }

    #[test]
    fn search_ranks_and_truncates() {
        let idx = corpus();
        let hits = search(&idx, "狩人", 2, Bm25Params::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0, "higher tf ranks first");
        assert_eq!(hits[1].0, 1);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let idx = corpus();
        let hits = search(&idx, "ゼウス", 3, Bm25Params::default());
        let ids: Vec<DocId> = hits.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = InvertedIndex::new();
        assert!(search(&idx, "狩人", 5, Bm25Params::default()).is_empty());
    }
}
