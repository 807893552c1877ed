//! Text normalization and n-gram tokenization.

use std::sync::LazyLock;

use regex::Regex;

use crate::stopwords::StopWords;

/// Sentence terminators followed by a space.
static TERMINATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+ ").expect("valid regex"));

/// Normalize raw OCR text: lower-case, re-join words hyphenated across line
/// breaks, turn the remaining newlines into spaces and drop sentence
/// terminators that precede a space.
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").to_lowercase();
    let text = text.replace("-\n", "").replace('\n', " ");
    TERMINATOR_RE.replace_all(&text, " ").into_owned()
}

/// Words of `text` after normalization, with empty tokens and stop words removed.
pub fn words(text: &str, stop_words: Option<&StopWords>) -> Vec<String> {
    normalize(text)
        .split(' ')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .filter(|w| stop_words.is_none_or(|stop| !stop.contains(w)))
        .map(str::to_string)
        .collect()
}

/// Contiguous `n`-word windows of `text`, joined by a single space.
///
/// Yields `len - n + 1` terms, or none when fewer than `n` words survive
/// filtering. `n == 0` is treated as 1.
pub fn ngrams(text: &str, n: usize, stop_words: Option<&StopWords>) -> Vec<String> {
    let words = words(text, stop_words);
    let n = n.max(1);
    if n == 1 {
        return words;
    }
    words.windows(n).map(|window| window.join(" ")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_joins_hyphenated_line_breaks() {
        assert_eq!(normalize("Ham-\nster Wheel\r\nTurns"), "hamster wheel turns");
    }

    #[test]
    fn normalize_drops_terminators_before_spaces() {
        assert_eq!(normalize("Stop. Go! Why? Now."), "stop go why now.");
        assert_eq!(normalize("wait?! next"), "wait next");
    }

    #[test]
    fn unigrams_keep_every_word() {
        let terms = ngrams("The cat  sat. On the mat", 1, None);
        assert_eq!(terms, ["the", "cat", "sat", "on", "the", "mat"]);
    }

    #[test]
    fn bigrams_skip_stop_words() {
        let stop = StopWords::standard();
        let terms = ngrams("be be water be a small a any the melon be", 2, Some(&stop));
        assert_eq!(terms, ["water small", "small melon"]);
    }

    #[test]
    fn short_input_yields_no_ngrams() {
        assert!(ngrams("lonely", 2, None).is_empty());
        assert!(ngrams("", 1, None).is_empty());
        assert_eq!(ngrams("a b c d", 3, None).len(), 2);
    }

    #[test]
    fn tokenization_is_restartable() {
        let text = "one two three two one";
        assert_eq!(ngrams(text, 2, None), ngrams(text, 2, None));
    }
}
