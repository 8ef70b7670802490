//! Interchangeable retrieval strategies behind one [`Retriever`] seam.
//!
//! Each strategy reports scores on its own scale; callers compare scores only
//! within one [`Retrieval`].

use crate::bm25::Bm25Params;
use crate::error::{CollaboratorError, SearchWarning};
use crate::expand::RuleBasedExpander;
use crate::fusion::{fuse, Hit, RrfParams};
use crate::handle::SearchIndex;
use crate::query::{QueryInput, QueryTextConfig};
use crate::semantic::SemanticSearch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedHit {
    pub id: String,
    pub jp_name: String,
    pub score: f64,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vec_score: Option<f64>,
}

impl RetrievedHit {
    fn from_lexical(hit: Hit) -> Option<Self> {
        Some(Self {
            id: hit.id?,
            jp_name: hit.jp_name,
            score: hit.score,
            snippet: hit.snippet,
            bm25_score: Some(hit.score),
            vec_score: None,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    pub hits: Vec<RetrievedHit>,
    pub warnings: Vec<SearchWarning>,
}

pub trait Retriever: Send + Sync {
    /// At most `top_k` hits, best first.
    fn retrieve(&self, query: &QueryInput, top_k: usize) -> Retrieval;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Candidates taken from BM25 before fusion.
    pub k_lexical: usize,
    /// Candidates requested from the semantic store before fusion.
    pub k_semantic: usize,
    pub bm25: Bm25Params,
    pub rrf: RrfParams,
    pub query_text: QueryTextConfig,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            k_lexical: 20,
            k_semantic: 20,
            bm25: Bm25Params::default(),
            rrf: RrfParams::default(),
            query_text: QueryTextConfig::default(),
        }
    }
}

/// BM25 and semantic search fused with RRF; lexical only when the semantic side fails.
pub struct HybridRetriever {
    index: Arc<SearchIndex>,
    semantic: Option<Arc<dyn SemanticSearch>>,
    config: HybridConfig,
}

impl HybridRetriever {
    pub fn new(index: Arc<SearchIndex>, semantic: Option<Arc<dyn SemanticSearch>>, config: HybridConfig) -> Self {
        Self { index, semantic, config }
    }
}

impl Retriever for HybridRetriever {
    fn retrieve(&self, query: &QueryInput, top_k: usize) -> Retrieval {
        let text = query.query_text(self.config.query_text);
        let lexical = self.index.lexical.search(&text, self.config.k_lexical.max(top_k), self.config.bm25);

        let semantic = match &self.semantic {
            None => Err(CollaboratorError::NotConfigured("semantic search".into())),
            Some(s) => s.search(&text, self.config.k_semantic),
        };
        match semantic {
            Ok(found) => {
                let semantic: Vec<Hit> = found
                    .into_iter()
                    .take(self.config.k_semantic)
                    .map(|h| self.index.lexical.describe(h.id, h.score))
                    .collect();
                let hits = fuse(&lexical, &semantic, self.config.rrf)
                    .into_iter()
                    .take(top_k)
                    .map(|f| RetrievedHit {
                        id: f.id,
                        jp_name: f.jp_name,
                        score: f.rrf_score,
                        snippet: f.snippet,
                        bm25_score: Some(f.bm25_score),
                        vec_score: Some(f.vec_score),
                    })
                    .collect();
                Retrieval { hits, warnings: Vec::new() }
            }
            Err(e) => {
                tracing::warn!(error = %e, "semantic search unavailable, degrading to lexical");
                Retrieval {
                    hits: lexical.into_iter().take(top_k).filter_map(RetrievedHit::from_lexical).collect(),
                    warnings: vec![SearchWarning::LexicalOnly(e.to_string())],
                }
            }
        }
    }
}

/// BM25 only.
pub struct LexicalRetriever {
    index: Arc<SearchIndex>,
    config: HybridConfig,
}

impl LexicalRetriever {
    pub fn new(index: Arc<SearchIndex>, config: HybridConfig) -> Self {
        Self { index, config }
    }
}

impl Retriever for LexicalRetriever {
    fn retrieve(&self, query: &QueryInput, top_k: usize) -> Retrieval {
        let text = query.query_text(self.config.query_text);
        let hits = self
            .index
            .lexical
            .search(&text, top_k, self.config.bm25)
            .into_iter()
            .filter_map(RetrievedHit::from_lexical)
            .collect();
        Retrieval { hits, warnings: Vec::new() }
    }
}

/// Fixed-weight attribute scoring. Plain-text queries are first approximated
/// into an expanded query by [`RuleBasedExpander`].
pub struct AttributeRetriever {
    index: Arc<SearchIndex>,
}

impl AttributeRetriever {
    pub fn new(index: Arc<SearchIndex>) -> Self {
        Self { index }
    }
}

impl Retriever for AttributeRetriever {
    fn retrieve(&self, query: &QueryInput, top_k: usize) -> Retrieval {
        let approximated;
        let expanded = match query {
            QueryInput::Expanded(q) => q,
            QueryInput::Text(t) => {
                approximated = RuleBasedExpander.approximate(t);
                &approximated
            }
        };
        let hits = self
            .index
            .attributes
            .search(expanded, top_k, &self.index.store)
            .into_iter()
            .map(|(c, score)| RetrievedHit {
                id: c.id.clone(),
                jp_name: c.display_name().to_string(),
                score,
                snippet: self.index.lexical.doc_id(&c.id).map(|d| self.index.lexical.snippet(d)).unwrap_or_default(),
                bm25_score: None,
                vec_score: None,
            })
            .collect();
        Retrieval { hits, warnings: Vec::new() }
    }
}
