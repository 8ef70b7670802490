use crate::error::{CollaboratorError, SearchWarning};
use crate::record::Constellation;

/// Produces a short descriptive text for a record. Cosmetic only.
pub trait NarrativeGenerator: Send + Sync {
    fn narrate(&self, record: &Constellation, related: &[&Constellation]) -> Result<String, CollaboratorError>;
}

/// The stored myth summary, or a one-line stand-in when there is none.
pub fn summary_of(record: &Constellation) -> String {
    if record.myth_summary.is_empty() {
        format!("{}の星座です。", record.display_name())
    } else {
        record.myth_summary.clone()
    }
}

pub fn narrate_or_summary(
    generator: Option<&dyn NarrativeGenerator>,
    record: &Constellation,
    related: &[&Constellation],
) -> (String, Option<SearchWarning>) {
    let Some(generator) = generator else { return (summary_of(record), None) };
    match generator.narrate(record, related) {
        Ok(text) if !text.trim().is_empty() => (text, None),
        Ok(_) => (summary_of(record), Some(SearchWarning::NarrationFallback("empty narration".into()))),
        Err(e) => {
            tracing::warn!(id = %record.id, error = %e, "narration failed");
            (summary_of(record), Some(SearchWarning::NarrationFallback(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Down;
    impl NarrativeGenerator for Down {
        fn narrate(&self, _: &Constellation, _: &[&Constellation]) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Unavailable("503".into()))
        }
    }

    #[test]
    fn falls_back_to_summary() {
        let c = Constellation { id: "Lyra".into(), jp_name: "こと座".into(), myth_summary: "竪琴".into(), ..Default::default() };
        let (text, warning) = narrate_or_summary(Some(&Down), &c, &[]);
        assert_eq!(text, "竪琴");
        assert!(matches!(warning, Some(SearchWarning::NarrationFallback(_))));

        let bare = Constellation { id: "Vela".into(), jp_name: "ほ座".into(), ..Default::default() };
        assert_eq!(narrate_or_summary(None, &bare, &[]).0, "ほ座の星座です。");
    }
}
