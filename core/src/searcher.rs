use crate::error::SearchWarning;
use crate::handle::SearchIndex;
use crate::query::QueryInput;
use crate::record::Constellation;
use crate::retrieve::{Retrieval, Retriever};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecord {
    pub record: Constellation,
    pub score: f64,
    pub snippet: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<RankedRecord>,
    pub warnings: Vec<SearchWarning>,
}

/// Runs a [`Retriever`] and resolves its ids against the record store.
pub struct Searcher {
    index: Arc<SearchIndex>,
    retriever: Arc<dyn Retriever>,
}

impl Searcher {
    pub fn new(index: Arc<SearchIndex>, retriever: Arc<dyn Retriever>) -> Self {
        Self { index, retriever }
    }

    /// At most `top_k` records in the retriever's order. Ids the store does
    /// not know come back as stand-in records rather than being dropped.
    pub fn search(&self, query: &QueryInput, top_k: usize) -> SearchOutcome {
        if top_k == 0 {
            return SearchOutcome::default();
        }
        let Retrieval { hits, warnings } = self.retriever.retrieve(query, top_k);
        let results = hits
            .into_iter()
            .take(top_k)
            .map(|h| {
                let record = match self.index.store.get(&h.id) {
                    Some(c) => c.clone(),
                    None => {
                        tracing::warn!(id = %h.id, "scored id missing from record store");
                        Constellation::stand_in(&h.id, Some(h.jp_name.as_str()))
                    }
                };
                RankedRecord { record, score: h.score, snippet: h.snippet }
            })
            .collect();
        SearchOutcome { results, warnings }
    }

    /// Records similar to `id`, using its myth summary as the query. The
    /// record itself is removed before truncating to `count`.
    pub fn related(&self, id: &str, count: usize) -> SearchOutcome {
        let Some(record) = self.index.store.get(id) else { return SearchOutcome::default() };
        if count == 0 {
            return SearchOutcome::default();
        }
        let text = if record.myth_summary.is_empty() { record.display_name() } else { record.myth_summary.as_str() };
        let mut outcome = self.search(&QueryInput::Text(text.to_string()), count.saturating_add(1));
        outcome.results.retain(|r| r.record.id != id);
        outcome.results.truncate(count);
        outcome
    }

    pub fn get(&self, id: &str) -> Option<&Constellation> {
        self.index.store.get(id)
    }

    /// Records listed in `id`'s `related` field that exist in the store.
    pub fn linked(&self, id: &str) -> Vec<&Constellation> {
        self.get(id)
            .map(|c| c.related.iter().filter_map(|r| self.index.store.get(r)).collect())
            .unwrap_or_default()
    }

    pub fn by_month(&self, month: u8) -> Vec<&Constellation> {
        self.index
            .attributes
            .by_month(month)
            .into_iter()
            .filter_map(|id| self.index.store.get(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordStore;
    use crate::retrieve::{HybridConfig, LexicalRetriever, RetrievedHit};

    fn index() -> Arc<SearchIndex> {
        let rec = |id: &str, myth: &str, related: &[&str]| Constellation {
            id: id.into(),
            jp_name: format!("{id}座"),
            myth_summary: myth.into(),
            best_months: vec![1],
            related: related.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Arc::new(SearchIndex::build(RecordStore::new(vec![
            rec("Orion", "狩人 の 物語", &["Scorpius", "Nowhere"]),
            rec("Scorpius", "狩人 を 刺す", &[]),
            rec("Lepus", "狩人 に 追われる", &[]),
            rec("Lyra", "竪琴", &[]),
        ])))
    }

    fn lexical_searcher(index: Arc<SearchIndex>) -> Searcher {
        let retriever = Arc::new(LexicalRetriever::new(Arc::clone(&index), HybridConfig::default()));
        Searcher::new(index, retriever)
    }

    struct Canned(Vec<RetrievedHit>);
    impl Retriever for Canned {
        fn retrieve(&self, _: &QueryInput, top_k: usize) -> Retrieval {
            Retrieval { hits: self.0.iter().take(top_k).cloned().collect(), warnings: vec![] }
        }
    }

    #[test]
    fn related_excludes_self_before_truncating() {
        let s = lexical_searcher(index());
        let out = s.related("Orion", 2);
        assert_eq!(out.results.len(), 2);
        assert!(out.results.iter().all(|r| r.record.id != "Orion"));

        let all = s.related("Orion", 10);
        assert_eq!(all.results.len(), 3);
        assert!(s.related("Nowhere", 3).results.is_empty());
    }

    #[test]
    fn related_with_unbounded_count_returns_every_other_record() {
        let s = lexical_searcher(index());
        let out = s.related("Lyra", usize::MAX);
        assert_eq!(out.results.len(), 3);
        assert!(out.results.iter().all(|r| r.record.id != "Lyra"));
    }

    #[test]
    fn unknown_ids_become_stand_ins() {
        let hit = |id: &str, name: &str| RetrievedHit {
            id: id.into(),
            jp_name: name.into(),
            score: 1.0,
            snippet: String::new(),
            bm25_score: None,
            vec_score: None,
        };
        let idx = index();
        let s = Searcher::new(Arc::clone(&idx), Arc::new(Canned(vec![hit("Lyra", "こと座"), hit("Vela", "ほ座")])));
        let out = s.search(&"竪琴".into(), 5);
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].record.myth_summary, "竪琴");
        assert_eq!(out.results[1].record.id, "Vela");
        assert_eq!(out.results[1].record.jp_name, "ほ座");
        assert_eq!(s.search(&"竪琴".into(), 1).results.len(), 1);
    }

    #[test]
    fn linked_and_by_month() {
        let s = lexical_searcher(index());
        let linked: Vec<&str> = s.linked("Orion").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(linked, vec!["Scorpius"]);
        assert_eq!(s.by_month(1).len(), 4);
        assert!(s.by_month(6).is_empty());
    }
}
