//! Query shapes accepted by the retrieval core.
//!
//! [`ExpandedQuery`] comes from an external text-expansion step and is
//! untrusted: every field is optional, wrongly-typed values are dropped, and
//! unknown fields are ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Season {
    #[serde(rename = "春")]
    Spring,
    #[serde(rename = "夏")]
    Summer,
    #[serde(rename = "秋")]
    Autumn,
    #[serde(rename = "冬")]
    Winter,
    /// Mild weather that could be either spring or autumn.
    #[serde(rename = "春秋")]
    SpringAutumn,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    pub fn label(self) -> &'static str {
        match self {
            Season::Spring => "春",
            Season::Summer => "夏",
            Season::Autumn => "秋",
            Season::Winter => "冬",
            Season::SpringAutumn => "春秋",
        }
    }

    pub fn months(self) -> &'static [u8] {
        match self {
            Season::Spring => &[3, 4, 5],
            Season::Summer => &[6, 7, 8],
            Season::Autumn => &[9, 10, 11],
            Season::Winter => &[12, 1, 2],
            Season::SpringAutumn => &[3, 4, 5, 9, 10, 11],
        }
    }

    /// The single-season index keys this season matches.
    pub fn index_keys(self) -> &'static [&'static str] {
        match self {
            Season::Spring => &["春"],
            Season::Summer => &["夏"],
            Season::Autumn => &["秋"],
            Season::Winter => &["冬"],
            Season::SpringAutumn => &["春", "秋"],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "春" | "spring" | "Spring" => Some(Season::Spring),
            "夏" | "summer" | "Summer" => Some(Season::Summer),
            "秋" | "autumn" | "Autumn" | "fall" | "Fall" => Some(Season::Autumn),
            "冬" | "winter" | "Winter" => Some(Season::Winter),
            "春秋" => Some(Season::SpringAutumn),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Season {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Season::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("unknown season {s:?}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawExpandedQuery")]
pub struct ExpandedQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
    pub months: Vec<u8>,
    pub keywords: Vec<String>,
    pub constellation_hints: Vec<String>,
    /// The user's text before expansion, when the expander echoes it back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
}

/// Wire shape of an expansion. `original` may arrive under any of three
/// names; the first non-empty one in `original`, `query`, `raw_query` order wins.
#[derive(Deserialize)]
struct RawExpandedQuery {
    #[serde(default, deserialize_with = "lenient_season")]
    season: Option<Season>,
    #[serde(default, deserialize_with = "lenient_months")]
    months: Vec<u8>,
    #[serde(default, deserialize_with = "lenient_strings")]
    keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    constellation_hints: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    original: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    query: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    raw_query: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    tokens: Vec<String>,
}

impl From<RawExpandedQuery> for ExpandedQuery {
    fn from(raw: RawExpandedQuery) -> Self {
        let original = [raw.original, raw.query, raw.raw_query]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty());
        Self {
            season: raw.season,
            months: raw.months,
            keywords: raw.keywords,
            constellation_hints: raw.constellation_hints,
            original,
            tokens: raw.tokens,
        }
    }
}

/// Either a plain query string or a structured expansion of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryInput {
    Text(String),
    Expanded(ExpandedQuery),
}

impl From<&str> for QueryInput {
    fn from(s: &str) -> Self { QueryInput::Text(s.to_string()) }
}

impl From<String> for QueryInput {
    fn from(s: String) -> Self { QueryInput::Text(s) }
}

impl From<ExpandedQuery> for QueryInput {
    fn from(q: ExpandedQuery) -> Self { QueryInput::Expanded(q) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTextConfig {
    /// Cap on keyword/token fields joined into the query string.
    pub max_tokens: usize,
}

impl Default for QueryTextConfig {
    fn default() -> Self { Self { max_tokens: 10 } }
}

impl QueryInput {
    /// Derive the single query string handed to text scorers.
    ///
    /// Precedence: plain text verbatim; then `original`; then `tokens`
    /// followed by `keywords`, capped at `max_tokens`; then every remaining
    /// field stringified (season, months, hints).
    pub fn query_text(&self, cfg: QueryTextConfig) -> String {
        let q = match self {
            QueryInput::Text(s) => return s.clone(),
            QueryInput::Expanded(q) => q,
        };
        if let Some(original) = q.original.as_deref().filter(|s| !s.trim().is_empty()) {
            return original.to_string();
        }
        let listed: Vec<&str> = q
            .tokens
            .iter()
            .chain(q.keywords.iter())
            .map(String::as_str)
            .take(cfg.max_tokens)
            .collect();
        if !listed.is_empty() {
            return listed.join(" ");
        }
        let mut parts: Vec<String> = Vec::new();
        if let Some(season) = q.season {
            parts.push(season.label().to_string());
        }
        parts.extend(q.months.iter().map(u8::to_string));
        parts.extend(q.constellation_hints.iter().cloned());
        parts.join(" ")
    }
}

fn lenient_season<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Season>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Season::parse(&s),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn scalar_to_string(v: Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        v @ Value::String(_) => scalar_to_string(v).into_iter().collect(),
        _ => Vec::new(),
    })
}

fn lenient_months<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let items = match Value::deserialize(d)? {
        Value::Array(items) => items,
        v => vec![v],
    };
    let mut months: Vec<u8> = Vec::new();
    for v in items {
        let m = match &v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().trim_end_matches('月').parse::<u64>().ok(),
            _ => None,
        };
        if let Some(m) = m.filter(|m| (1..=12).contains(m)).map(|m| m as u8) {
            if !months.contains(&m) {
                months.push(m);
            }
        }
    }
    Ok(months)
}
