//! Reciprocal Rank Fusion of a lexical and a semantic result list.
//!
//! rrf(d) = sum over lists of 1 / (k + rank(d)), rank 1-based.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrfParams {
    /// Smoothing constant; larger values discount low ranks less.
    pub k: f64,
}

impl Default for RrfParams {
    fn default() -> Self { Self { k: 60.0 } }
}

/// One entry of a ranked list as produced by a single scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: Option<String>,
    pub jp_name: String,
    pub score: f64,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: String,
    pub jp_name: String,
    pub snippet: String,
    pub bm25_score: f64,
    pub vec_score: f64,
    pub rrf_score: f64,
}

/// Merge two best-first lists by document id. Entries without an id are skipped.
///
/// Ties in `rrf_score` keep first-seen order (lexical list first).
pub fn fuse(lexical: &[Hit], semantic: &[Hit], params: RrfParams) -> Vec<FusedHit> {
    let mut merged: Vec<FusedHit> = Vec::with_capacity(lexical.len() + semantic.len());
    let mut pos: HashMap<String, usize> = HashMap::with_capacity(lexical.len() + semantic.len());

    for (rank, hit) in lexical.iter().enumerate() {
        let Some(id) = hit.id.as_deref() else { continue };
        let i = *pos.entry(id.to_string()).or_insert_with(|| {
            merged.push(FusedHit {
                id: id.to_string(),
                jp_name: hit.jp_name.clone(),
                snippet: hit.snippet.clone(),
                bm25_score: hit.score,
                vec_score: 0.0,
                rrf_score: 0.0,
            });
            merged.len() - 1
        });
        merged[i].rrf_score += 1.0 / (params.k + rank as f64 + 1.0);
    }

    for (rank, hit) in semantic.iter().enumerate() {
        let Some(id) = hit.id.as_deref() else { continue };
        match pos.get(id) {
            Some(&i) => merged[i].vec_score = hit.score,
            None => {
                pos.insert(id.to_string(), merged.len());
                merged.push(FusedHit {
                    id: id.to_string(),
                    jp_name: hit.jp_name.clone(),
                    snippet: hit.snippet.clone(),
                    bm25_score: 0.0,
                    vec_score: hit.score,
                    rrf_score: 0.0,
                });
            }
        }
        let i = pos[id];
        merged[i].rrf_score += 1.0 / (params.k + rank as f64 + 1.0);
    }

    merged.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f64) -> Hit {
        Hit { id: Some(id.into()), jp_name: id.into(), score, snippet: String::new() }
    }

    #[test]
    fn fusing_a_list_with_itself() {
        let a = vec![hit("x", 3.0), hit("y", 1.0)];
        let fused = fuse(&a, &a, RrfParams::default());
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].id, "x");
        assert_eq!(fused[1].id, "y");
        assert!((fused[0].rrf_score - 2.0 / 61.0).abs() < 1e-12);
        assert!((fused[1].rrf_score - 2.0 / 62.0).abs() < 1e-12);
        assert_eq!(fused[0].bm25_score, 3.0);
        assert_eq!(fused[0].vec_score, 3.0);
    }

    #[test]
    fn disjoint_lists_keep_source_scores() {
        let fused = fuse(&[hit("a", 7.0)], &[hit("b", 0.9)], RrfParams::default());
        assert_eq!(fused.len(), 2);
        // equal rrf: lexical entry first
        assert_eq!(fused[0].id, "a");
        assert_eq!((fused[0].bm25_score, fused[0].vec_score), (7.0, 0.0));
        assert_eq!((fused[1].bm25_score, fused[1].vec_score), (0.0, 0.9));
    }

    #[test]
    fn shared_document_outranks_single_list_hits() {
        let lexical = vec![hit("a", 5.0), hit("shared", 4.0)];
        let semantic = vec![hit("b", 0.9), hit("shared", 0.8)];
        let fused = fuse(&lexical, &semantic, RrfParams::default());
        assert_eq!(fused[0].id, "shared");
    }

    #[test]
    fn missing_ids_are_skipped_but_still_take_a_rank() {
        let anon = Hit { id: None, jp_name: "(unknown)".into(), score: 0.99, snippet: String::new() };
        let fused = fuse(&[], &[anon, hit("b", 0.5)], RrfParams::default());
        assert_eq!(fused.len(), 1);
        assert!((fused[0].rrf_score - 1.0 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn k_is_configurable() {
        let fused = fuse(&[hit("a", 1.0)], &[], RrfParams { k: 0.0 });
        assert_eq!(fused[0].rrf_score, 1.0);
    }
}
