//! Keyword/attribute index: discrete tokens (names, months, seasons, myth
//! keywords, asterisms) mapped straight to record ids, scored by fixed
//! per-field weights.
//!
//! This is an alternative to BM25, not a variant of it. Scores are weighted
//! hit counts and are not comparable with BM25 magnitudes.

use crate::query::{ExpandedQuery, Season};
use crate::record::{Constellation, RecordStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MONTH_WEIGHT: f64 = 3.0;
pub const SEASON_WEIGHT: f64 = 2.0;
pub const KEYWORD_WEIGHT: f64 = 1.0;
pub const HINT_EXACT_WEIGHT: f64 = 5.0;
pub const HINT_PARTIAL_WEIGHT: f64 = 3.0;

/// Suffix stripped from names ("オリオン座" is also indexed as "オリオン").
pub const NAME_SUFFIX: char = '座';

pub const MYTH_KEYWORDS: &[&str] = &[
    "ゼウス", "ヘラ", "アポロン", "アルテミス", "ポセイドン", "ハデス",
    "ヘルクレス", "ペルセウス", "オリオン", "アンドロメダ",
    "勇者", "狩人", "怪物", "王", "王女", "神", "女神",
    "ヒドラ", "サソリ", "ライオン", "牡牛", "馬", "鳥", "魚",
    "愛", "戦い", "冒険", "神話", "伝説",
];

pub const ASTERISMS: &[(&str, &[&str])] = &[
    ("冬の大三角", &["Orion", "Canis Major", "Canis Minor"]),
    ("夏の大三角", &["Lyra", "Cygnus", "Aquila"]),
    ("春の大三角", &["Leo", "Virgo", "Bootes"]),
    ("春の大曲線", &["UrsaMajor", "Bootes", "Virgo"]),
];

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AttributeIndex {
    keys: BTreeMap<String, BTreeSet<String>>,
}

impl AttributeIndex {
    pub fn build(store: &RecordStore) -> Self {
        let mut idx = Self::default();
        for c in store.iter() {
            idx.index_record(c);
        }
        for (asterism, ids) in ASTERISMS {
            for id in *ids {
                idx.insert(asterism, id);
            }
        }
        tracing::debug!(num_keys = idx.keys.len(), num_records = store.len(), "built attribute index");
        idx
    }

    fn index_record(&mut self, c: &Constellation) {
        let id = c.id.as_str();
        if !c.jp_name.is_empty() {
            self.insert(&c.jp_name, id);
            if let Some(base) = c.jp_name.strip_suffix(NAME_SUFFIX).filter(|b| !b.is_empty()) {
                self.insert(base, id);
            }
        }
        self.insert(id, id);
        self.insert(&id.to_lowercase(), id);

        for m in &c.best_months {
            self.insert(&m.to_string(), id);
            self.insert(&format!("{m}月"), id);
        }
        for season in Season::ALL {
            if season.months().iter().any(|m| c.best_months.contains(m)) {
                self.insert(season.label(), id);
            }
        }
        for kw in MYTH_KEYWORDS {
            if c.myth_summary.contains(kw) {
                self.insert(kw, id);
            }
        }
        for kw in &c.keywords {
            self.insert(kw, id);
        }
    }

    fn insert(&mut self, key: &str, id: &str) {
        if key.is_empty() {
            return;
        }
        self.keys.entry(key.to_string()).or_default().insert(id.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&BTreeSet<String>> { self.keys.get(key) }

    pub fn num_keys(&self) -> usize { self.keys.len() }

    /// Record ids indexed under a month, in id order.
    pub fn by_month(&self, month: u8) -> Vec<&str> {
        self.ids(&month.to_string()).collect()
    }

    fn ids<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.keys.get(key).into_iter().flatten().map(String::as_str)
    }

    /// Accumulated weights per record id. Only ids with at least one hit appear.
    pub fn scores(&self, q: &ExpandedQuery) -> BTreeMap<String, f64> {
        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        let mut add = |id: &str, w: f64| *scores.entry(id.to_string()).or_insert(0.0) += w;

        for m in &q.months {
            for id in self.ids(&m.to_string()) {
                add(id, MONTH_WEIGHT);
            }
        }
        if let Some(season) = q.season {
            let matched: BTreeSet<&str> = season.index_keys().iter().flat_map(|k| self.ids(k)).collect();
            for id in matched {
                add(id, SEASON_WEIGHT);
            }
        }
        for kw in &q.keywords {
            for id in self.ids(kw) {
                add(id, KEYWORD_WEIGHT);
            }
        }
        for hint in &q.constellation_hints {
            for id in self.ids(hint) {
                add(id, HINT_EXACT_WEIGHT);
            }
            let base = hint.strip_suffix(NAME_SUFFIX).unwrap_or(hint);
            if base.is_empty() {
                continue;
            }
            for (key, ids) in &self.keys {
                if key.contains(base) {
                    for id in ids {
                        add(id, HINT_PARTIAL_WEIGHT);
                    }
                }
            }
        }
        scores
    }

    /// Best-first `(record, score)` pairs, at most `top_k`, skipping ids the store cannot resolve.
    pub fn search<'s>(&self, q: &ExpandedQuery, top_k: usize, store: &'s RecordStore) -> Vec<(&'s Constellation, f64)> {
        let mut ranked: Vec<(String, f64)> = self.scores(q).into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
            .into_iter()
            .filter_map(|(id, score)| match store.get(&id) {
                Some(c) => Some((c, score)),
                None => {
                    tracing::debug!(%id, "attribute hit without record");
                    None
                }
            })
            .take(top_k)
            .collect()
    }

    /// Records per season, for index statistics.
    pub fn season_counts(&self) -> Vec<(Season, usize)> {
        Season::ALL.into_iter().map(|s| (s, self.keys.get(s.label()).map_or(0, BTreeSet::len))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, jp: &str, months: &[u8], keywords: &[&str], myth: &str) -> Constellation {
        Constellation {
            id: id.into(),
            jp_name: jp.into(),
            myth_summary: myth.into(),
            best_months: months.to_vec(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            related: vec![],
        }
    }

    fn store() -> RecordStore {
        RecordStore::new(vec![
            rec("Orion", "オリオン座", &[1], &["狩人"], "ポセイドンの息子オリオン"),
            rec("Scorpius", "さそり座", &[7], &["狩人"], "オリオンを刺したサソリ"),
            rec("Lyra", "こと座", &[8], &["竪琴"], "オルフェウスの竪琴"),
        ])
    }

    #[test]
    fn indexes_names_with_and_without_suffix() {
        let idx = AttributeIndex::build(&store());
        assert!(idx.get("オリオン座").unwrap().contains("Orion"));
        assert!(idx.get("オリオン").unwrap().contains("Orion"));
        assert!(idx.get("orion").unwrap().contains("Orion"));
        assert!(idx.get("1月").unwrap().contains("Orion"));
        assert!(idx.get("冬").unwrap().contains("Orion"));
        assert!(idx.get("ポセイドン").unwrap().contains("Orion"));
        assert!(idx.get("夏の大三角").unwrap().contains("Lyra"));
    }

    #[test]
    fn single_keyword_scores_one() {
        let idx = AttributeIndex::build(&store());
        let q = ExpandedQuery { keywords: vec!["竪琴".into()], ..Default::default() };
        let scores = idx.scores(&q);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores["Lyra"], 1.0);
    }

    #[test]
    fn month_season_keyword_scores_six() {
        let idx = AttributeIndex::build(&store());
        let q = ExpandedQuery {
            season: Some(Season::Winter),
            months: vec![1],
            keywords: vec!["狩人".into()],
            ..Default::default()
        };
        let scores = idx.scores(&q);
        assert_eq!(scores["Orion"], 6.0);
        assert_eq!(scores["Scorpius"], 1.0);
        assert!(!scores.contains_key("Lyra"), "zero-score records never appear");
    }

    #[test]
    fn hint_scores_exact_and_partial() {
        let idx = AttributeIndex::build(&store());
        let q = ExpandedQuery { constellation_hints: vec!["オリオン座".into()], ..Default::default() };
        let scores = idx.scores(&q);
        // exact "オリオン座" (5) + partial on keys "オリオン座" and "オリオン" (3 + 3).
        // Scorpius mentions オリオン in its myth, so it shares the "オリオン" key.
        assert_eq!(scores["Orion"], 11.0);
        assert_eq!(scores["Scorpius"], 3.0);
    }

    #[test]
    fn spring_autumn_counts_once() {
        let s = RecordStore::new(vec![rec("Pegasus", "ペガスス座", &[5, 10], &[], "")]);
        let idx = AttributeIndex::build(&s);
        let q = ExpandedQuery { season: Some(Season::SpringAutumn), ..Default::default() };
        assert_eq!(idx.scores(&q)["Pegasus"], SEASON_WEIGHT);
    }

    #[test]
    fn search_drops_unknown_ids_and_truncates() {
        let s = store();
        let idx = AttributeIndex::build(&s);
        // "冬の大三角" names Canis Major/Minor, which are not in the store
        let q = ExpandedQuery { keywords: vec!["冬の大三角".into(), "狩人".into()], ..Default::default() };
        let hits = idx.search(&q, 10, &s);
        let ids: Vec<&str> = hits.iter().map(|(c, _)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Orion", "Scorpius"]);
        assert_eq!(hits[0].1, 2.0);
        assert_eq!(idx.search(&q, 1, &s).len(), 1);
    }

    #[test]
    fn by_month_lists_ids() {
        let idx = AttributeIndex::build(&store());
        assert_eq!(idx.by_month(7), vec!["Scorpius"]);
        assert!(idx.by_month(3).is_empty());
    }
}
