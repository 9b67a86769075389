//! Find credential-shaped tokens in free-form operator messages

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEnvelope {
    pub prefix: String,
    pub length: usize,
}

impl Default for KeyEnvelope {
    fn default() -> Self {
        Self {
            prefix: "RGAPI-".to_string(),
            length: 42,
        }
    }
}

impl KeyEnvelope {
    pub fn new(prefix: impl Into<String>, length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            length,
        }
    }

    pub fn matches(&self, token: &str) -> bool {
        token.starts_with(&self.prefix)
            && token.len() == self.length
            && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    }

    /// Every distinct token in `text` that fits the envelope, in order.
    ///
    /// Surrounding quotes, backticks and punctuation are trimmed so keys
    /// pasted in code blocks or sentences are still found.
    pub fn scan(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        text.split_whitespace()
            .map(|word| word.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '-')))
            .filter(|token| self.matches(token))
            .filter(|token| seen.insert(token.to_string()))
            .map(str::to_string)
            .collect()
    }
}
