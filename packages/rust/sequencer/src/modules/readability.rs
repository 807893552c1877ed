use serde_json::{Value, json};

use bookgenome_shared::Result;

use super::{InputKind, Module, Unit, unsupported};

/// Sentence, word and syllable counts with the Flesch scores derived from them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingStats {
    pub sentences: usize,
    pub words: usize,
    pub syllables: usize,
}

impl ReadingStats {
    pub fn measure(text: &str) -> Self {
        let mut stats = Self::default();
        let mut pending_sentence = false;

        for token in text.split_whitespace() {
            if token.chars().any(char::is_alphabetic) {
                stats.words += 1;
                stats.syllables += syllables(token);
                pending_sentence = true;
            }
            if pending_sentence && token.ends_with(['.', '!', '?']) {
                stats.sentences += 1;
                pending_sentence = false;
            }
        }
        if pending_sentence {
            stats.sentences += 1;
        }
        stats
    }

    pub fn flesch_reading_ease(&self) -> f64 {
        if self.words == 0 {
            return 0.0;
        }
        206.835 - 1.015 * self.words_per_sentence() - 84.6 * self.syllables_per_word()
    }

    pub fn flesch_kincaid_grade(&self) -> f64 {
        if self.words == 0 {
            return 0.0;
        }
        0.39 * self.words_per_sentence() + 11.8 * self.syllables_per_word() - 15.59
    }

    fn words_per_sentence(&self) -> f64 {
        self.words as f64 / self.sentences.max(1) as f64
    }

    fn syllables_per_word(&self) -> f64 {
        self.syllables as f64 / self.words.max(1) as f64
    }
}

/// Vowel-group syllable estimate with a silent trailing `e`; at least 1.
fn syllables(word: &str) -> usize {
    let letters: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');

    let mut groups = 0;
    let mut previous_vowel = false;
    for &c in &letters {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            groups += 1;
        }
        previous_vowel = vowel;
    }

    let silent_e = letters.len() > 2
        && letters.last() == Some(&'e')
        && !letters.ends_with(&['l', 'e'])
        && letters.get(letters.len() - 2).is_some_and(|c| !is_vowel(*c));
    if silent_e && groups > 1 {
        groups -= 1;
    }
    groups.max(1)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reading-level scores over the whole full text.
#[derive(Debug, Default)]
pub struct ReadabilityScorer {
    stats: ReadingStats,
}

impl ReadabilityScorer {
    pub fn stats(&self) -> ReadingStats {
        self.stats
    }
}

impl Module for ReadabilityScorer {
    fn input(&self) -> InputKind {
        InputKind::Text
    }

    fn consume(&mut self, unit: &Unit<'_>) -> Result<()> {
        let Unit::Text(text) = unit else {
            return Err(unsupported(InputKind::Text, unit));
        };
        let measured = ReadingStats::measure(text);
        self.stats.sentences += measured.sentences;
        self.stats.words += measured.words;
        self.stats.syllables += measured.syllables;
        Ok(())
    }

    fn results(&self) -> Value {
        json!({
            "sentences": self.stats.sentences,
            "words": self.stats.words,
            "syllables": self.stats.syllables,
            "flesch_reading_ease": round2(self.stats.flesch_reading_ease()),
            "flesch_kincaid_grade": round2(self.stats.flesch_kincaid_grade()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllable_heuristic() {
        assert_eq!(syllables("cat"), 1);
        assert_eq!(syllables("make"), 1);
        assert_eq!(syllables("table"), 2);
        assert_eq!(syllables("reading"), 2);
        assert_eq!(syllables("the"), 1);
        assert_eq!(syllables("rhythm"), 1);
    }

    #[test]
    fn counts_sentences_and_words() {
        let stats = ReadingStats::measure("The cat sat. The dog ran! Did it? 42 ...");
        assert_eq!(stats.sentences, 3);
        assert_eq!(stats.words, 8);
    }

    #[test]
    fn unterminated_text_is_one_sentence() {
        let stats = ReadingStats::measure("no full stop here");
        assert_eq!(stats.sentences, 1);
        assert_eq!(stats.words, 4);
    }

    #[test]
    fn empty_text_scores_zero() {
        let mut scorer = ReadabilityScorer::default();
        scorer.consume(&Unit::Text("  12 34 ")).expect("consume");
        assert_eq!(
            scorer.results(),
            json!({
                "sentences": 0,
                "words": 0,
                "syllables": 0,
                "flesch_reading_ease": 0.0,
                "flesch_kincaid_grade": 0.0,
            })
        );
    }

    #[test]
    fn simple_prose_reads_easily() {
        let mut scorer = ReadabilityScorer::default();
        scorer
            .consume(&Unit::Text("The cat sat on the mat. The dog ran."))
            .expect("consume");
        let stats = scorer.stats();
        assert_eq!((stats.sentences, stats.words, stats.syllables), (2, 9, 9));
        // 206.835 - 1.015 * 4.5 - 84.6 * 1.0
        assert_eq!(scorer.results()["flesch_reading_ease"], json!(117.67));
    }
}
