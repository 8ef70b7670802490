use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SPACES: Regex = Regex::new(r"[\s\u{3000}]+").expect("valid regex");
    // One match per word unit: a run of kanji, a run of katakana, a run of
    // hiragana, or a run of any other letters/digits.
    static ref WORD: Regex = Regex::new(
        r"(?u)[\p{Han}々〆ヶ]+|[\p{Katakana}ー]+|\p{Hiragana}+|[[\p{L}\p{N}\p{M}_']&&[^\p{Han}\p{Katakana}\p{Hiragana}々〆ヶー]]+"
    )
    .expect("valid regex");
    static ref ASCII_NOISE: Regex = Regex::new(r"^[0-9A-Za-z!-/:-@\[-`{-~]+$").expect("valid regex");
}

/// Splits normalized text into word units.
///
/// The default [`ScriptRunSegmenter`] cuts at script changes, which is the
/// closest word boundary available for Japanese without a morphological
/// dictionary. A dictionary-backed analyzer can be plugged in through
/// [`Tokenizer::with_segmenter`].
pub trait Segmenter: Send + Sync {
    fn segment<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptRunSegmenter;

impl Segmenter for ScriptRunSegmenter {
    fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        WORD.find_iter(text).map(|m| m.as_str()).collect()
    }
}

pub struct Tokenizer {
    segmenter: Box<dyn Segmenter>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self { segmenter: Box::new(ScriptRunSegmenter) }
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").finish_non_exhaustive()
    }
}

impl Tokenizer {
    pub fn with_segmenter<S: Segmenter + 'static>(segmenter: S) -> Self {
        Self { segmenter: Box::new(segmenter) }
    }

    /// Normalize, segment and drop tokens made only of ASCII letters, digits or punctuation.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        self.segmenter
            .segment(&normalized)
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !ASCII_NOISE.is_match(t))
            .map(str::to_string)
            .collect()
    }
}

lazy_static! {
    static ref DEFAULT_TOKENIZER: Tokenizer = Tokenizer::default();
}

/// NFKC-normalize and collapse every whitespace variant (full-width space,
/// tabs, newlines, runs of spaces) into a single ASCII space.
pub fn normalize(text: &str) -> String {
    let nfkc = text.nfkc().collect::<String>();
    SPACES.replace_all(&nfkc, " ").trim().to_string()
}

/// Tokenize with the default segmenter. Index build and query time both go through here.
pub fn tokenize(text: &str) -> Vec<String> {
    DEFAULT_TOKENIZER.tokenize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("オリオン座の狩人");
        assert_eq!(t, vec!["オリオン", "座", "の", "狩人"]);
    }

    #[test]
    fn normalizes_whitespace_variants() {
        assert_eq!(normalize("\u{3000}冬\t\t夏\n\n  秋  "), "冬 夏 秋");
    }

    #[test]
    fn month_tokens_keep_the_kanji() {
        // NFKC folds full-width digits, then the ASCII run is dropped as noise.
        assert_eq!(tokenize("１２月"), vec!["月"]);
    }

    #[test]
    fn custom_segmenter_is_used() {
        struct Chars;
        impl Segmenter for Chars {
            fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
                text.char_indices()
                    .map(|(i, c)| &text[i..i + c.len_utf8()])
                    .filter(|s| !s.trim().is_empty())
                    .collect()
            }
        }
        let t = Tokenizer::with_segmenter(Chars).tokenize("星座 a");
        assert_eq!(t, vec!["星", "座"]);
    }
}
