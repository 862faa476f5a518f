use crate::error::{AppError, Result};
use ndarray::Array2;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};

/// Row normalization applied after weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// Exported state of a fitted bag-of-words vectorizer
#[derive(Debug, Clone, Deserialize)]
pub struct VectorizerArtifact {
    pub vocabulary: HashMap<String, usize>,

    #[serde(default = "default_true")]
    pub lowercase: bool,

    #[serde(default = "default_token_pattern")]
    pub token_pattern: String,

    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    #[serde(default)]
    pub stop_words: Vec<String>,

    #[serde(default)]
    pub binary: bool,

    #[serde(default)]
    pub idf: Option<Vec<f64>>,

    #[serde(default)]
    pub sublinear_tf: bool,

    /// `None` when the field is absent, `Some(None)` when it is explicitly null
    #[serde(default, deserialize_with = "explicit_null")]
    pub norm: Option<Option<Norm>>,
}

fn explicit_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<Norm>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Norm>::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

fn default_token_pattern() -> String {
    r"(?u)\b\w\w+\b".to_string()
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

/// Maps raw text to a single row of term weights.
///
/// Reproduces the transform side of a count / TF-IDF vectorizer: regex
/// tokenization, stop-word removal, word n-grams, optional binary counts,
/// sublinear tf, idf weighting and row normalization.
#[derive(Debug, Clone)]
pub struct TextVectorizer {
    vocabulary: HashMap<String, usize>,
    lowercase: bool,
    token_pattern: Regex,
    ngram_range: (usize, usize),
    stop_words: HashSet<String>,
    binary: bool,
    idf: Option<Vec<f64>>,
    sublinear_tf: bool,
    norm: Option<Norm>,
}

impl TextVectorizer {
    /// Validate an exported vectorizer and compile its token pattern
    pub fn from_artifact(artifact: VectorizerArtifact) -> Result<Self> {
        let n_features = artifact.vocabulary.len();
        if n_features == 0 {
            return Err(AppError::Inference("vocabulary is empty".to_string()));
        }

        if let Some((term, index)) = artifact
            .vocabulary
            .iter()
            .find(|&(_, &index)| index >= n_features)
        {
            return Err(AppError::Inference(format!(
                "vocabulary index {} for '{}' exceeds feature count {}",
                index, term, n_features
            )));
        }

        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(AppError::Inference(format!(
                "invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }

        if let Some(idf) = &artifact.idf {
            if idf.len() != n_features {
                return Err(AppError::Inference(format!(
                    "idf has {} entries but vocabulary has {}",
                    idf.len(),
                    n_features
                )));
            }
        }

        let token_pattern = Regex::new(&artifact.token_pattern)
            .map_err(|e| AppError::Inference(format!("invalid token_pattern: {}", e)))?;
        if token_pattern.captures_len() > 2 {
            return Err(AppError::Inference(
                "token_pattern may contain at most one capturing group".to_string(),
            ));
        }

        let norm = match artifact.norm {
            Some(explicit) => explicit,
            None if artifact.idf.is_some() => Some(Norm::L2),
            None => None,
        };

        Ok(Self {
            vocabulary: artifact.vocabulary,
            lowercase: artifact.lowercase,
            token_pattern,
            ngram_range: artifact.ngram_range,
            stop_words: artifact.stop_words.into_iter().collect(),
            binary: artifact.binary,
            idf: artifact.idf,
            sublinear_tf: artifact.sublinear_tf,
            norm,
        })
    }

    /// Width of the produced feature rows
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Split text into vocabulary candidates (unigrams and n-grams)
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let tokens: Vec<&str> = if self.token_pattern.captures_len() == 2 {
            self.token_pattern
                .captures_iter(&text)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
                .collect()
        } else {
            self.token_pattern
                .find_iter(&text)
                .map(|m| m.as_str())
                .collect()
        };

        let tokens: Vec<&str> = tokens
            .into_iter()
            .filter(|token| !self.stop_words.contains(*token))
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n..=max_n.min(tokens.len()) {
            terms.extend(tokens.windows(n).map(|window| window.join(" ")));
        }
        terms
    }

    /// Transform texts into a (n_texts, n_features) matrix
    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Result<Array2<f64>> {
        let mut matrix = Array2::<f64>::zeros((texts.len(), self.n_features()));

        for (row_idx, text) in texts.iter().enumerate() {
            let mut row = matrix.row_mut(row_idx);

            for term in self.analyze(text.as_ref()) {
                if let Some(&index) = self.vocabulary.get(&term) {
                    row[index] += 1.0;
                }
            }

            if self.binary {
                row.mapv_inplace(|count| if count > 0.0 { 1.0 } else { 0.0 });
            }
            if self.sublinear_tf {
                row.mapv_inplace(|count| if count > 0.0 { 1.0 + count.ln() } else { 0.0 });
            }
            if let Some(idf) = &self.idf {
                row.iter_mut()
                    .zip(idf.iter())
                    .for_each(|(value, weight)| *value *= weight);
            }

            let length = match self.norm {
                Some(Norm::L1) => row.iter().map(|v| v.abs()).sum::<f64>(),
                Some(Norm::L2) => row.iter().map(|v| v * v).sum::<f64>().sqrt(),
                None => 0.0,
            };
            if length > 0.0 {
                row.mapv_inplace(|v| v / length);
            }
        }

        Ok(matrix)
    }
}
