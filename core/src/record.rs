use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One constellation from the record snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Constellation {
    pub id: String,
    #[serde(default)]
    pub jp_name: String,
    #[serde(default)]
    pub myth_summary: String,
    #[serde(default)]
    pub best_months: Vec<u8>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub related: Vec<String>,
}

impl Constellation {
    /// Minimal stand-in for a scored id the store does not know.
    pub fn stand_in(id: &str, jp_name: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            jp_name: jp_name.filter(|n| !n.is_empty()).unwrap_or(id).to_string(),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> &str {
        if self.jp_name.is_empty() { &self.id } else { &self.jp_name }
    }
}

/// Text fed to the lexical index: myth summary, keywords, and months as `"{m}月"`, joined by `"。"`.
pub fn index_text(record: &Constellation) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !record.myth_summary.is_empty() {
        parts.push(record.myth_summary.clone());
    }
    if !record.keywords.is_empty() {
        parts.push(record.keywords.join(" "));
    }
    if !record.best_months.is_empty() {
        let months: Vec<String> = record.best_months.iter().map(|m| format!("{m}月")).collect();
        parts.push(months.join(" "));
    }
    parts.join("。")
}

/// Read-only record collection loaded once from a JSON snapshot.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    records: Vec<Constellation>,
    by_id: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new(records: Vec<Constellation>) -> Self {
        let mut kept: Vec<Constellation> = Vec::with_capacity(records.len());
        let mut by_id: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for r in records {
            if r.id.is_empty() {
                tracing::warn!("skipping record without id");
                continue;
            }
            match by_id.get(&r.id) {
                Some(&pos) => {
                    tracing::warn!(id = %r.id, "duplicate record id, keeping the later one");
                    kept[pos] = r;
                }
                None => {
                    by_id.insert(r.id.clone(), kept.len());
                    kept.push(r);
                }
            }
        }
        Self { records: kept, by_id }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let buf = std::fs::read_to_string(path)
            .map_err(|source| RecordError::Io { path: path.to_path_buf(), source })?;
        let records: Vec<Constellation> = serde_json::from_str(&buf)
            .map_err(|source| RecordError::Parse { path: path.to_path_buf(), source })?;
        tracing::info!(path = %path.display(), num_records = records.len(), "loaded records");
        Ok(Self::new(records))
    }

    /// Like [`RecordStore::load`] but an unreadable snapshot yields an empty store.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(error = %e, "using empty record store");
                Self::default()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Constellation> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &str) -> bool { self.by_id.contains_key(id) }

    pub fn iter(&self) -> impl Iterator<Item = &Constellation> + '_ { self.records.iter() }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn orion() -> Constellation {
        Constellation {
            id: "Orion".into(),
            jp_name: "オリオン座".into(),
            myth_summary: "狩人オリオンの物語".into(),
            best_months: vec![12, 1],
            keywords: vec!["狩人".into(), "冬の大三角".into()],
            related: vec!["Scorpius".into()],
        }
    }

    #[test]
    fn index_text_joins_parts() {
        assert_eq!(index_text(&orion()), "狩人オリオンの物語。狩人 冬の大三角。12月 1月");
    }

    #[test]
    fn index_text_skips_empty_parts() {
        let c = Constellation { id: "X".into(), best_months: vec![3], ..Default::default() };
        assert_eq!(index_text(&c), "3月");
    }

    #[test]
    fn duplicate_ids_keep_later_record() {
        let mut second = orion();
        second.jp_name = "オリオン".into();
        let store = RecordStore::new(vec![orion(), second]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("Orion").map(|c| c.jp_name.as_str()), Some("オリオン"));
    }

    #[test]
    fn load_tolerates_missing_optional_fields() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"[{{"id":"Lyra","jp_name":"こと座","best_months":[8]}}]"#).unwrap();
        let store = RecordStore::load(f.path()).unwrap();
        let lyra = store.get("Lyra").unwrap();
        assert!(lyra.keywords.is_empty());
        assert!(lyra.related.is_empty());
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let store = RecordStore::load_or_empty("/nonexistent/constellations.json");
        assert!(store.is_empty());
        assert!(matches!(RecordStore::load("/nonexistent/constellations.json"), Err(RecordError::Io { .. })));
    }

    #[test]
    fn stand_in_falls_back_to_id() {
        assert_eq!(Constellation::stand_in("Vela", None).jp_name, "Vela");
        assert_eq!(Constellation::stand_in("Vela", Some("ほ座")).display_name(), "ほ座");
    }
}
