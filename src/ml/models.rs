use serde::{Deserialize, Serialize};
use std::fmt;

/// Class label as exported by the training pipeline.
///
/// Labels are rendered the way the training side stringifies them, so a
/// boolean class prints as `True`/`False`, an integer class as its digits and
/// a float class keeps its fractional part (`1.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Bool(true) => f.write_str("True"),
            ClassLabel::Bool(false) => f.write_str("False"),
            ClassLabel::Int(value) => write!(f, "{}", value),
            ClassLabel::Float(value) => f.write_str(&float_repr(*value)),
            ClassLabel::Text(value) => f.write_str(value),
        }
    }
}

/// Shortest round-trip float text with an explicit `.0` on whole numbers and
/// scientific notation outside `[1e-4, 1e16)`
fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            let exponent: i32 = exponent.parse().unwrap_or_default();
            let sign = if exponent < 0 { '-' } else { '+' };
            return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
        }
        return formatted;
    }

    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Binary outcome of the sequence scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamLabel {
    Ham,
    Spam,
}

impl SpamLabel {
    /// Strictly above the threshold is spam; at or below is ham.
    #[inline]
    #[must_use]
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            SpamLabel::Spam
        } else {
            SpamLabel::Ham
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpamLabel::Ham => "ham",
            SpamLabel::Spam => "spam",
        }
    }
}

impl fmt::Display for SpamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of scoring one message.
///
/// Serializes directly into the `/predict` response body; the field names
/// depend on which scorer produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Verdict {
    /// Discrete classifier: native class label and the top class probability
    Class { prediction: String, confidence: f64 },

    /// Sequence model: thresholded label and the raw spam probability
    Probability {
        prediction: SpamLabel,
        probability: f64,
    },
}

impl Verdict {
    pub fn label(&self) -> &str {
        match self {
            Verdict::Class { prediction, .. } => prediction,
            Verdict::Probability { prediction, .. } => prediction.as_str(),
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Verdict::Class { confidence, .. } => *confidence,
            Verdict::Probability { probability, .. } => *probability,
        }
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_label_display() {
        assert_eq!(ClassLabel::Text("spam".to_string()).to_string(), "spam");
        assert_eq!(ClassLabel::Int(1).to_string(), "1");
        assert_eq!(ClassLabel::Bool(true).to_string(), "True");
    }

    #[test]
    fn test_float_class_labels() {
        let labels: Vec<ClassLabel> = serde_json::from_str("[0.0, 1.0, 2.5, 1e-5, 1e16]").unwrap();
        assert_eq!(labels[0], ClassLabel::Float(0.0));

        let rendered: Vec<String> = labels.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["0.0", "1.0", "2.5", "1e-05", "1e+16"]);
        assert_eq!(ClassLabel::Float(-3.0).to_string(), "-3.0");
        assert_eq!(ClassLabel::Float(0.1).to_string(), "0.1");
    }

    #[test]
    fn test_class_label_deserialize() {
        let labels: Vec<ClassLabel> = serde_json::from_str(r#"["ham", 1, false, 1.0]"#).unwrap();
        assert_eq!(
            labels,
            vec![
                ClassLabel::Text("ham".to_string()),
                ClassLabel::Int(1),
                ClassLabel::Bool(false),
                ClassLabel::Float(1.0),
            ]
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(SpamLabel::from_probability(0.5, 0.5), SpamLabel::Ham);
        assert_eq!(SpamLabel::from_probability(0.4999, 0.5), SpamLabel::Ham);
        assert_eq!(SpamLabel::from_probability(0.5001, 0.5), SpamLabel::Spam);
        assert_eq!(SpamLabel::from_probability(1.0, 0.5), SpamLabel::Spam);
    }

    #[test]
    fn test_verdict_serialization() {
        let class = Verdict::Class {
            prediction: "spam".to_string(),
            confidence: 0.9731,
        };
        assert_eq!(
            serde_json::to_value(&class).unwrap(),
            serde_json::json!({"prediction": "spam", "confidence": 0.9731})
        );

        let probability = Verdict::Probability {
            prediction: SpamLabel::Spam,
            probability: 0.93,
        };
        assert_eq!(
            serde_json::to_value(&probability).unwrap(),
            serde_json::json!({"prediction": "spam", "probability": 0.93})
        );
        assert_eq!(probability.label(), "spam");
        assert_eq!(probability.confidence(), 0.93);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.987_654, 4), 0.9877);
        assert_eq!(round_to(0.5, 4), 0.5);
        assert_eq!(round_to(1.0, 4), 1.0);
    }
}
