//! Query expansion: the external expander contract and the local rule-based
//! approximation used when it fails.

use crate::error::{CollaboratorError, SearchWarning};
use crate::query::{ExpandedQuery, Season};
use crate::tokenizer::normalize;
use lazy_static::lazy_static;
use regex::Regex;

pub trait QueryExpander: Send + Sync {
    fn expand(&self, text: &str) -> Result<ExpandedQuery, CollaboratorError>;
}

lazy_static! {
    static ref TEMPERATURE: Regex = Regex::new(r"([-−]?\d+)\s*(?:度|°)").expect("valid regex");
}

/// Checked in order; the first season with a matching word wins.
const SEASON_WORDS: &[(Season, &[&str], [&str; 2])] = &[
    (Season::Winter, &["冬", "寒い", "冷たい"], ["冬", "寒い"]),
    (Season::Summer, &["夏", "暑い", "熱い"], ["夏", "暑い"]),
    (Season::Spring, &["春", "暖かい", "桜"], ["春", "暖かい"]),
    (Season::Autumn, &["秋", "涼しい", "紅葉"], ["秋", "涼しい"]),
];

/// Temperature in degrees to the season it suggests.
pub fn season_for_temperature(degrees: i32) -> Season {
    if degrees <= 10 {
        Season::Winter
    } else if degrees <= 20 {
        Season::SpringAutumn
    } else {
        Season::Summer
    }
}

/// Keyword and temperature matching over the raw text. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedExpander;

impl RuleBasedExpander {
    pub fn approximate(&self, text: &str) -> ExpandedQuery {
        let normalized = normalize(text);
        let mut q = ExpandedQuery::default();

        if let Some((season, _, keywords)) =
            SEASON_WORDS.iter().find(|(_, words, _)| words.iter().any(|w| normalized.contains(w)))
        {
            q.season = Some(*season);
            q.keywords.extend(keywords.iter().map(|k| k.to_string()));
        }
        if let Some(degrees) = TEMPERATURE
            .captures(&normalized)
            .and_then(|c| c[1].replace('−', "-").parse::<i32>().ok())
        {
            q.season = Some(season_for_temperature(degrees));
        }
        if let Some(season) = q.season {
            q.months = season.months().to_vec();
        }
        if !normalized.is_empty() {
            q.original = Some(normalized);
        }
        q
    }
}

impl QueryExpander for RuleBasedExpander {
    fn expand(&self, text: &str) -> Result<ExpandedQuery, CollaboratorError> {
        Ok(self.approximate(text))
    }
}

/// Expand with the external expander when present, falling back to
/// [`RuleBasedExpander`] on any failure.
pub fn expand_with_fallback(expander: Option<&dyn QueryExpander>, text: &str) -> (ExpandedQuery, Option<SearchWarning>) {
    let Some(expander) = expander else { return (RuleBasedExpander.approximate(text), None) };
    match expander.expand(text) {
        Ok(q) => (q, None),
        Err(e) => {
            tracing::warn!(error = %e, "query expansion failed, using rule-based fallback");
            (RuleBasedExpander.approximate(text), Some(SearchWarning::ExpansionFallback(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_words() {
        let q = RuleBasedExpander.approximate("夏の暑い夜に見える星座は？");
        assert_eq!(q.season, Some(Season::Summer));
        assert_eq!(q.months, vec![6, 7, 8]);
        assert_eq!(q.keywords, vec!["夏", "暑い"]);
    }

    #[test]
    fn temperature_overrides_words() {
        let q = RuleBasedExpander.approximate("冬の寒い日、最高気温１５度くらい");
        assert_eq!(q.season, Some(Season::SpringAutumn));
        assert_eq!(q.months, vec![3, 4, 5, 9, 10, 11]);
        assert_eq!(q.keywords, vec!["冬", "寒い"], "keywords still come from the words");
    }

    #[test]
    fn temperature_thresholds() {
        assert_eq!(season_for_temperature(-3), Season::Winter);
        assert_eq!(season_for_temperature(10), Season::Winter);
        assert_eq!(season_for_temperature(11), Season::SpringAutumn);
        assert_eq!(season_for_temperature(20), Season::SpringAutumn);
        assert_eq!(season_for_temperature(21), Season::Summer);
        assert_eq!(season_for_temperature(35), Season::Summer);
        assert_eq!(RuleBasedExpander.approximate("a cold night around 10°C").season, Some(Season::Winter));
    }

    #[test]
    fn nothing_recognized() {
        let q = RuleBasedExpander.approximate("オリオン座が見たい");
        assert_eq!(q.season, None);
        assert!(q.months.is_empty());
        assert_eq!(q.original.as_deref(), Some("オリオン座が見たい"));
    }

    struct Broken;
    impl QueryExpander for Broken {
        fn expand(&self, _: &str) -> Result<ExpandedQuery, CollaboratorError> {
            Err(CollaboratorError::Timeout(std::time::Duration::from_secs(3)))
        }
    }

    #[test]
    fn failure_falls_back_with_warning() {
        let (q, warning) = expand_with_fallback(Some(&Broken), "寒い");
        assert_eq!(q.season, Some(Season::Winter));
        assert!(matches!(warning, Some(SearchWarning::ExpansionFallback(_))));
    }
}
