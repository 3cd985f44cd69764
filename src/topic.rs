//! Keyword-frequency topic labels.
//!
//! A topic is a retrieval hint, not a classification: the most frequent long
//! words of the utterance joined with `_`.

#[derive(Debug, Clone, Copy)]
pub struct TopicExtractor {
    /// Words shorter than this are dropped (crude stop-word filter).
    pub min_word_len: usize,
    pub max_words: usize,
}

impl Default for TopicExtractor {
    fn default() -> Self {
        Self {
            min_word_len: 4,
            max_words: 2,
        }
    }
}

impl TopicExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&self, input: &str) -> String {
        let normalized: String = input
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();

        // (word, count) in first-seen order
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for word in normalized
            .split_whitespace()
            .filter(|w| w.chars().count() >= self.min_word_len)
        {
            match counts.iter_mut().find(|(w, _)| *w == word) {
                Some((_, count)) => *count += 1,
                None => counts.push((word, 1)),
            }
        }

        // Stable sort keeps first-seen order among ties
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        counts
            .iter()
            .take(self.max_words)
            .map(|(w, _)| *w)
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Extract a topic with the default settings.
pub fn extract_topic(input: &str) -> String {
    TopicExtractor::default().extract(input)
}
