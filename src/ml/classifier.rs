use crate::error::{AppError, Result};
use crate::ml::models::ClassLabel;
use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;
use std::fmt;

/// Trait for pre-trained discrete classifiers
pub trait Classifier: Send + Sync {
    /// Class labels in column order of `predict_proba`
    fn classes(&self) -> &[ClassLabel];

    /// Expected width of the feature rows
    fn n_features(&self) -> usize;

    /// Predict class probabilities, one row per sample
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class indices into `classes()`
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row.iter())).collect())
    }

    /// Get model type
    fn model_type(&self) -> ModelType;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    MultinomialNb,
    LogisticRegression,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::MultinomialNb => write!(f, "multinomial_nb"),
            ModelType::LogisticRegression => write!(f, "logistic_regression"),
        }
    }
}

/// Exported classifier state, tagged by `kind`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    MultinomialNb {
        classes: Vec<ClassLabel>,
        class_log_prior: Vec<f64>,
        feature_log_prob: Vec<Vec<f64>>,
    },
    LogisticRegression {
        classes: Vec<ClassLabel>,
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },
}

impl ClassifierArtifact {
    /// Validate shapes and build the classifier
    pub fn build(self) -> Result<Box<dyn Classifier>> {
        match self {
            ClassifierArtifact::MultinomialNb {
                classes,
                class_log_prior,
                feature_log_prob,
            } => Ok(Box::new(MultinomialNbClassifier::new(
                classes,
                class_log_prior,
                feature_log_prob,
            )?)),
            ClassifierArtifact::LogisticRegression {
                classes,
                coef,
                intercept,
            } => Ok(Box::new(LogisticRegressionClassifier::new(
                classes, coef, intercept,
            )?)),
        }
    }
}

/// Multinomial naive Bayes over term counts or weights
#[derive(Debug, Clone)]
pub struct MultinomialNbClassifier {
    classes: Vec<ClassLabel>,
    class_log_prior: Array1<f64>,
    /// (n_classes, n_features)
    feature_log_prob: Array2<f64>,
}

impl MultinomialNbClassifier {
    pub fn new(
        classes: Vec<ClassLabel>,
        class_log_prior: Vec<f64>,
        feature_log_prob: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if classes.is_empty() {
            return Err(AppError::Inference("classifier has no classes".to_string()));
        }
        if class_log_prior.len() != classes.len() {
            return Err(AppError::Inference(format!(
                "class_log_prior has {} entries for {} classes",
                class_log_prior.len(),
                classes.len()
            )));
        }
        let feature_log_prob = to_matrix(feature_log_prob, "feature_log_prob")?;
        if feature_log_prob.nrows() != classes.len() {
            return Err(AppError::Inference(format!(
                "feature_log_prob has {} rows for {} classes",
                feature_log_prob.nrows(),
                classes.len()
            )));
        }

        Ok(Self {
            classes,
            class_log_prior: Array1::from(class_log_prior),
            feature_log_prob,
        })
    }

    /// Joint log likelihood per class
    fn joint_log_likelihood(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(features, self.n_features())?;
        Ok(features.dot(&self.feature_log_prob.t()) + &self.class_log_prior)
    }
}

impl Classifier for MultinomialNbClassifier {
    fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.feature_log_prob.ncols()
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let mut jll = self.joint_log_likelihood(features)?;
        jll.rows_mut().into_iter().for_each(softmax_inplace);
        Ok(jll)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let jll = self.joint_log_likelihood(features)?;
        Ok(jll.rows().into_iter().map(|row| argmax(row.iter())).collect())
    }

    fn model_type(&self) -> ModelType {
        ModelType::MultinomialNb
    }
}

/// Linear model with a logistic link
#[derive(Debug, Clone)]
pub struct LogisticRegressionClassifier {
    classes: Vec<ClassLabel>,
    /// (1, n_features) for two classes, (n_classes, n_features) otherwise
    coef: Array2<f64>,
    intercept: Array1<f64>,
}

impl LogisticRegressionClassifier {
    pub fn new(classes: Vec<ClassLabel>, coef: Vec<Vec<f64>>, intercept: Vec<f64>) -> Result<Self> {
        if classes.len() < 2 {
            return Err(AppError::Inference(format!(
                "logistic regression needs at least 2 classes, got {}",
                classes.len()
            )));
        }
        let coef = to_matrix(coef, "coef")?;
        let expected_rows = if classes.len() == 2 { 1 } else { classes.len() };
        if coef.nrows() != expected_rows || intercept.len() != expected_rows {
            return Err(AppError::Inference(format!(
                "expected {} coefficient rows and intercepts for {} classes, got {} and {}",
                expected_rows,
                classes.len(),
                coef.nrows(),
                intercept.len()
            )));
        }

        Ok(Self {
            classes,
            coef,
            intercept: Array1::from(intercept),
        })
    }

    fn decision_function(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(features, self.n_features())?;
        Ok(features.dot(&self.coef.t()) + &self.intercept)
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.coef.ncols()
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let mut scores = self.decision_function(features)?;

        if self.classes.len() == 2 {
            let positive = scores.column(0).mapv(sigmoid);
            let mut proba = Array2::<f64>::zeros((scores.nrows(), 2));
            proba.column_mut(0).assign(&positive.mapv(|p| 1.0 - p));
            proba.column_mut(1).assign(&positive);
            return Ok(proba);
        }

        scores.rows_mut().into_iter().for_each(softmax_inplace);
        Ok(scores)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }
}

/// Convert nested rows into a matrix, rejecting ragged input
pub(crate) fn to_matrix(rows: Vec<Vec<f64>>, name: &str) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if n_rows == 0 || n_cols == 0 {
        return Err(AppError::Inference(format!("{} is empty", name)));
    }
    if rows.iter().any(|row| row.len() != n_cols) {
        return Err(AppError::Inference(format!("{} has rows of unequal length", name)));
    }

    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((n_rows, n_cols), flat)?)
}

fn check_width(features: &Array2<f64>, expected: usize) -> Result<()> {
    if features.len_of(Axis(1)) != expected {
        return Err(AppError::Inference(format!(
            "expected {} features, got {}",
            expected,
            features.ncols()
        )));
    }
    Ok(())
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub(crate) fn softmax_inplace(mut row: ndarray::ArrayViewMut1<f64>) {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    row.mapv_inplace(|v| v / sum);
}

/// Index of the first maximum
fn argmax<'a>(values: impl Iterator<Item = &'a f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (idx, &value) in values.enumerate() {
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}
