//! HTTP prediction service for a pre-trained spam/ham text classifier.
//!
//! Two scorer variants are supported:
//! - `vectorizer`: bag-of-words / TF-IDF features into naive Bayes or logistic regression
//! - `sequence`: word-index tokenizer into a padded ONNX sequence model with a sigmoid output
//!
//! Vectorizer, classifier and tokenizer artifacts are JSON exports of the
//! fitted objects; the sequence network is an ONNX export. Everything is
//! loaded on the first prediction request.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;

pub use config::{Config, ModelConfig, ModelVariant};
pub use error::{AppError, Result};
