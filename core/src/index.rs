use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Term-frequency inverted index with the corpus statistics BM25 needs.
///
/// Built in one pass by [`InvertedIndex::build`]; there is no incremental
/// add/remove, so postings, lengths and avgdl always describe the same corpus.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub postings: HashMap<String, Vec<Posting>>, // postings sorted by doc_id
    pub vocab: Vec<String>,
    pub doc_lens: Vec<u32>,
    pub doc_count: u32,
    pub avgdl: f64,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Build from documents in order with the default tokenizer.
    pub fn build<S: AsRef<str>>(docs: &[S]) -> Self {
        Self::build_with(docs, &Tokenizer::default())
    }

    /// Build from documents in order; the ordinal position is the document id.
    /// Queries against the result must be tokenized by the same `tokenizer`.
    pub fn build_with<S: AsRef<str>>(docs: &[S], tokenizer: &Tokenizer) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut vocab: BTreeSet<String> = BTreeSet::new();
        let mut doc_lens: Vec<u32> = Vec::with_capacity(docs.len());

        for (doc_id, doc) in docs.iter().enumerate() {
            let tokens = tokenizer.tokenize(doc.as_ref());
            doc_lens.push(tokens.len() as u32);

            let mut tf_counts: HashMap<String, u32> = HashMap::new();
            for t in tokens {
                *tf_counts.entry(t).or_insert(0) += 1;
            }
            for (term, tf) in tf_counts {
                vocab.insert(term.clone());
                postings.entry(term).or_default().push(Posting { doc_id: doc_id as DocId, tf });
            }
        }

        for plist in postings.values_mut() {
            plist.sort_by_key(|p| p.doc_id);
        }
        let avgdl = mean_length(&doc_lens);

        Self {
            postings,
            vocab: vocab.into_iter().collect(),
            doc_count: doc_lens.len() as u32,
            doc_lens,
            avgdl,
        }
    }

    pub fn is_empty(&self) -> bool { self.doc_count == 0 }

    /// Number of documents containing `term`.
    pub fn df(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    pub fn doc_len(&self, doc_id: DocId) -> u32 {
        self.doc_lens.get(doc_id as usize).copied().unwrap_or(0)
    }
}

/// sum(lengths) / max(1, count)
pub fn mean_length(doc_lens: &[u32]) -> f64 {
    let total: u64 = doc_lens.iter().map(|&l| u64::from(l)).sum();
    total as f64 / doc_lens.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_frequency_counted_once_per_doc() {
        let idx = InvertedIndex::build(&["狩人 狩人 狩人 怪物"]);
        let plist = &idx.postings["狩人"];
        assert_eq!(plist.len(), 1);
        assert_eq!(plist[0], Posting { doc_id: 0, tf: 3 });
        assert_eq!(idx.doc_lens, vec![4]);
    }

    #[test]
    fn postings_sorted_by_doc_id() {
        let idx = InvertedIndex::build(&["女神 王", "王", "怪物", "王 王"]);
        let ids: Vec<DocId> = idx.postings["王"].iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![0, 1, 3]);
        assert_eq!(idx.df("王"), 3);
        assert_eq!(idx.df("ゼウス"), 0);
    }

    #[test]
    fn avgdl_is_mean_of_lengths() {
        let idx = InvertedIndex::build(&["女神 王", "王", "怪物 狩人 勇者"]);
        assert_eq!(idx.doc_lens, vec![2, 1, 3]);
        assert!((idx.avgdl - 2.0).abs() < 1e-12);
        assert_eq!(idx.vocab, {
            let mut v = vec!["女神", "王", "怪物", "狩人", "勇者"];
            v.sort();
            v
        });
    }

    #[test]
    fn empty_corpus_is_legal() {
        let idx = InvertedIndex::build::<&str>(&[]);
        assert!(idx.is_empty());
        assert!(idx.postings.is_empty());
        assert_eq!(idx.avgdl, 0.0);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let docs = ["冬の狩人", "夏の女神", "秋の王女"];
        let a = InvertedIndex::build(&docs);
        let b = InvertedIndex::build(&docs);
        assert_eq!(a.doc_lens, b.doc_lens);
        assert_eq!(a.avgdl, b.avgdl);
        assert_eq!(a.vocab, b.vocab);
        assert_eq!(a.postings, b.postings);
    }
}
