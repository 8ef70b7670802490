use crate::bm25::{self, Bm25Params};
use crate::fusion::Hit;
use crate::index::{mean_length, DocId, InvertedIndex};
use crate::record::{index_text, RecordStore};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const SNIPPET_CHARS: usize = 120;

/// BM25 index plus the parallel arrays that map document ids back to records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LexicalIndex {
    pub index: InvertedIndex,
    /// Index text per document id.
    pub docs: Vec<String>,
    /// Record id per document id.
    pub keys: Vec<String>,
    /// Record id -> display name.
    pub titles: HashMap<String, String>,
    #[serde(skip)]
    doc_ids: HashMap<String, DocId>,
    /// Shared by index build and query time; not persisted.
    #[serde(skip)]
    tokenizer: Arc<Tokenizer>,
}

impl LexicalIndex {
    pub fn build(store: &RecordStore) -> Self {
        Self::build_with(store, Arc::new(Tokenizer::default()))
    }

    pub fn build_with(store: &RecordStore, tokenizer: Arc<Tokenizer>) -> Self {
        let mut docs = Vec::with_capacity(store.len());
        let mut keys = Vec::with_capacity(store.len());
        let mut titles = HashMap::with_capacity(store.len());
        for c in store.iter() {
            docs.push(index_text(c));
            keys.push(c.id.clone());
            titles.insert(c.id.clone(), c.display_name().to_string());
        }
        let index = InvertedIndex::build_with(&docs, &tokenizer);
        tracing::info!(num_docs = index.doc_count, num_terms = index.vocab.len(), avgdl = index.avgdl, "built lexical index");
        let mut this = Self { index, docs, keys, titles, doc_ids: HashMap::new(), tokenizer };
        this.rebuild_lookup();
        this
    }

    /// Attach the tokenizer a loaded artifact was built with. Artifacts load
    /// with the default tokenizer.
    pub fn with_tokenizer(mut self, tokenizer: Arc<Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub(crate) fn rebuild_lookup(&mut self) {
        self.doc_ids = self.keys.iter().enumerate().map(|(i, k)| (k.clone(), i as DocId)).collect();
    }

    /// Internal consistency of a decoded artifact; `Err` names the first violation.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.index.doc_count as usize;
        if self.index.doc_lens.len() != n || self.docs.len() != n || self.keys.len() != n {
            return Err(format!(
                "parallel arrays disagree: doc_count={n} doc_lens={} docs={} keys={}",
                self.index.doc_lens.len(),
                self.docs.len(),
                self.keys.len()
            ));
        }
        let expected = mean_length(&self.index.doc_lens);
        if (expected - self.index.avgdl).abs() > 1e-9 {
            return Err(format!("avgdl {} does not match lengths (expected {expected})", self.index.avgdl));
        }
        for (term, plist) in &self.index.postings {
            if let Some(p) = plist.iter().find(|p| p.doc_id as usize >= n) {
                return Err(format!("posting for {term:?} points at doc {} of {n}", p.doc_id));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize { self.keys.len() }

    pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    pub fn doc_id(&self, id: &str) -> Option<DocId> { self.doc_ids.get(id).copied() }

    pub fn title(&self, id: &str) -> Option<&str> { self.titles.get(id).map(String::as_str) }

    /// First 120 characters of a document's index text, newlines removed.
    pub fn snippet(&self, doc_id: DocId) -> String {
        self.docs
            .get(doc_id as usize)
            .map(|d| d.chars().filter(|&c| c != '\n' && c != '\r').take(SNIPPET_CHARS).collect())
            .unwrap_or_default()
    }

    pub fn search(&self, query: &str, k: usize, params: Bm25Params) -> Vec<Hit> {
        bm25::search_with(&self.index, &self.tokenizer, query, k, params)
            .into_iter()
            .filter_map(|(doc_id, score)| {
                let id = self.keys.get(doc_id as usize)?;
                Some(Hit {
                    id: Some(id.clone()),
                    jp_name: self.title(id).unwrap_or(id).to_string(),
                    score,
                    snippet: self.snippet(doc_id),
                })
            })
            .collect()
    }

    /// Resolve a semantic-store id against this index, filling in name and snippet.
    pub fn describe(&self, id: Option<String>, score: f64) -> Hit {
        match id.as_deref().and_then(|i| self.doc_id(i).map(|d| (i, d))) {
            Some((i, doc_id)) => Hit {
                jp_name: self.title(i).unwrap_or(i).to_string(),
                snippet: self.snippet(doc_id),
                id,
                score,
            },
            None => Hit {
                jp_name: id.clone().unwrap_or_else(|| "(unknown)".to_string()),
                snippet: String::new(),
                id,
                score,
            },
        }
    }
}
