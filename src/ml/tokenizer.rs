use crate::error::{AppError, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Characters replaced by the split string before a text is broken into words
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Word-index tokenizer fitted on the training corpus.
///
/// Indices start at 1; 0 is reserved for padding.
#[derive(Debug, Clone, Deserialize)]
pub struct WordTokenizer {
    word_index: HashMap<String, usize>,

    /// Keep only indices strictly below this bound
    #[serde(default)]
    num_words: Option<usize>,

    #[serde(default)]
    oov_token: Option<String>,

    #[serde(default = "default_lower")]
    lower: bool,

    #[serde(default = "default_filters")]
    filters: String,

    #[serde(default = "default_split")]
    split: String,
}

fn default_lower() -> bool {
    true
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_string()
}

fn default_split() -> String {
    " ".to_string()
}

impl WordTokenizer {
    pub fn new(word_index: HashMap<String, usize>) -> Self {
        Self {
            word_index,
            num_words: None,
            oov_token: None,
            lower: default_lower(),
            filters: default_filters(),
            split: default_split(),
        }
    }

    pub fn with_num_words(mut self, num_words: usize) -> Self {
        self.num_words = Some(num_words);
        self
    }

    pub fn with_oov_token(mut self, token: impl Into<String>) -> Self {
        self.oov_token = Some(token.into());
        self
    }

    /// Reject exports that would produce the padding index for a real word
    pub fn validate(&self) -> Result<()> {
        if self.split.is_empty() {
            return Err(AppError::Inference("split must not be empty".to_string()));
        }
        if let Some((word, _)) = self.word_index.iter().find(|&(_, &index)| index == 0) {
            return Err(AppError::Inference(format!(
                "word '{}' maps to reserved index 0",
                word
            )));
        }
        if let Some(token) = &self.oov_token {
            if !self.word_index.contains_key(token) {
                return Err(AppError::Inference(format!(
                    "oov_token '{}' is missing from word_index",
                    token
                )));
            }
        }
        Ok(())
    }

    /// Largest index this tokenizer can emit
    pub fn max_index(&self) -> usize {
        let largest = self.word_index.values().copied().max().unwrap_or(0);
        match self.effective_num_words() {
            Some(bound) => largest.min(bound.saturating_sub(1)).max(self.oov_index().unwrap_or(0)),
            None => largest,
        }
    }

    fn effective_num_words(&self) -> Option<usize> {
        self.num_words.filter(|&n| n > 0)
    }

    fn oov_index(&self) -> Option<usize> {
        self.oov_token
            .as_ref()
            .and_then(|token| self.word_index.get(token).copied())
    }

    /// Lowercase, replace filter characters with the split string, split, drop empties
    pub fn text_to_words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut cleaned = String::with_capacity(text.len());
        for ch in text.chars() {
            if self.filters.contains(ch) {
                cleaned.push_str(&self.split);
            } else {
                cleaned.push(ch);
            }
        }

        cleaned
            .split(self.split.as_str())
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Map a text to its word indices
    pub fn text_to_sequence(&self, text: &str) -> Vec<usize> {
        let oov_index = self.oov_index();
        let num_words = self.effective_num_words();

        let mut sequence = Vec::new();
        for word in self.text_to_words(text) {
            match self.word_index.get(&word) {
                Some(&index) if num_words.map_or(true, |bound| index < bound) => {
                    sequence.push(index)
                }
                _ => {
                    if let Some(oov) = oov_index {
                        sequence.push(oov);
                    }
                }
            }
        }
        sequence
    }
}

/// Fit a sequence to exactly `max_len` entries.
///
/// Short sequences are padded with `value` at the end; long ones keep their
/// first `max_len` entries.
pub fn pad_sequence(sequence: &[usize], max_len: usize, value: usize) -> Vec<usize> {
    let mut padded: Vec<usize> = sequence.iter().copied().take(max_len).collect();
    padded.resize(max_len, value);
    padded
}
