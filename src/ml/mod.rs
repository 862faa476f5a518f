//! Inference for the spam classifier
//!
//! - Bag-of-words / TF-IDF vectorizer feeding a naive Bayes or logistic classifier
//! - Word-index tokenizer feeding a padded ONNX sequence model
//! - One-time artifact loading shared across requests

pub mod classifier;
pub mod loader;
pub mod models;
pub mod onnx;
pub mod scorer;
pub mod tokenizer;
pub mod vectorizer;

pub use classifier::{
    Classifier, ClassifierArtifact, LogisticRegressionClassifier, ModelType,
    MultinomialNbClassifier,
};
pub use loader::{build_scorer, ResourceLoader};
pub use models::{round_to, ClassLabel, SpamLabel, Verdict};
pub use onnx::{OnnxSequenceModel, SequenceModel};
pub use scorer::{Scorer, SequenceScorer, VectorizerScorer};
pub use tokenizer::{pad_sequence, WordTokenizer};
pub use vectorizer::{TextVectorizer, VectorizerArtifact};
