use crate::config::ModelVariant;
use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::models::{round_to, SpamLabel, Verdict};
use crate::ml::onnx::SequenceModel;
use crate::ml::tokenizer::{pad_sequence, WordTokenizer};
use crate::ml::vectorizer::TextVectorizer;

/// Index used to pad short sequences
const PADDING_INDEX: usize = 0;

/// Turns a raw message into a verdict
pub trait Scorer: Send + Sync {
    /// Score a single message
    fn score(&self, text: &str) -> Result<Verdict>;

    /// Which variant this scorer implements
    fn variant(&self) -> ModelVariant;
}

/// Bag-of-words vectorizer feeding a discrete classifier
pub struct VectorizerScorer {
    vectorizer: TextVectorizer,
    classifier: Box<dyn Classifier>,
}

impl VectorizerScorer {
    pub fn new(vectorizer: TextVectorizer, classifier: Box<dyn Classifier>) -> Result<Self> {
        if vectorizer.n_features() != classifier.n_features() {
            return Err(AppError::Inference(format!(
                "vectorizer produces {} features but {} classifier expects {}",
                vectorizer.n_features(),
                classifier.model_type(),
                classifier.n_features()
            )));
        }
        Ok(Self {
            vectorizer,
            classifier,
        })
    }
}

impl Scorer for VectorizerScorer {
    fn score(&self, text: &str) -> Result<Verdict> {
        let features = self.vectorizer.transform(&[text])?;

        let predicted = self
            .classifier
            .predict(&features)?
            .first()
            .copied()
            .ok_or_else(|| AppError::Inference("classifier returned no prediction".to_string()))?;
        let label = self
            .classifier
            .classes()
            .get(predicted)
            .ok_or_else(|| {
                AppError::Inference(format!("predicted class index {} out of range", predicted))
            })?
            .to_string();

        let proba = self.classifier.predict_proba(&features)?;
        let confidence = proba
            .row(0)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        Ok(Verdict::Class {
            prediction: label,
            confidence: round_to(confidence, 4),
        })
    }

    fn variant(&self) -> ModelVariant {
        ModelVariant::Vectorizer
    }
}

/// Word-index tokenizer feeding a sequence model with one sigmoid output
pub struct SequenceScorer {
    tokenizer: WordTokenizer,
    model: Box<dyn SequenceModel>,
    max_len: usize,
    threshold: f64,
}

impl SequenceScorer {
    /// Pair a tokenizer with a model and check that they fit together.
    ///
    /// One padded sequence holding the tokenizer's largest index is run through
    /// the model, so a width or vocabulary mismatch fails here instead of on
    /// every request.
    pub fn new(
        tokenizer: WordTokenizer,
        model: Box<dyn SequenceModel>,
        max_len: usize,
        threshold: f64,
    ) -> Result<Self> {
        let mut sample = vec![PADDING_INDEX; max_len];
        if let Some(first) = sample.first_mut() {
            *first = tokenizer.max_index();
        }
        model.predict(&sample).map_err(|e| {
            AppError::Inference(format!(
                "model rejects a sequence of {} indices up to {}: {}",
                max_len,
                tokenizer.max_index(),
                e
            ))
        })?;

        Ok(Self {
            tokenizer,
            model,
            max_len,
            threshold,
        })
    }
}

impl Scorer for SequenceScorer {
    fn score(&self, text: &str) -> Result<Verdict> {
        let sequence = self.tokenizer.text_to_sequence(text);
        let padded = pad_sequence(&sequence, self.max_len, PADDING_INDEX);
        let probability = self.model.predict(&padded)?;

        Ok(Verdict::Probability {
            prediction: SpamLabel::from_probability(probability, self.threshold),
            probability,
        })
    }

    fn variant(&self) -> ModelVariant {
        ModelVariant::Sequence
    }
}
