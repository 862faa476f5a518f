//! Sequence model backed by ONNX Runtime
//!
//! The exported network takes one row of token indices, shaped `[1, max_len]`,
//! and returns a single spam probability. Whatever layers sit in between
//! (masking, recurrent, convolutional) are evaluated by the runtime.

use crate::error::{AppError, Result};
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    tensor::TensorElementType,
    value::{DynValue, Tensor, ValueType},
};
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

/// Model that maps a padded index sequence to a spam probability
pub trait SequenceModel: Send + Sync {
    /// Probability of spam for one padded sequence
    fn predict(&self, sequence: &[usize]) -> Result<f64>;
}

/// ONNX export of the trained sequence network
pub struct OnnxSequenceModel {
    session: Mutex<Session>,
    input_name: String,
    input_type: TensorElementType,
}

impl OnnxSequenceModel {
    /// Build a session from an `.onnx` file
    pub fn from_file(path: &Path, intra_threads: usize) -> Result<Self> {
        let attribute = |err: AppError| match err {
            AppError::Inference(message) => AppError::artifact(path, message),
            other => other,
        };
        let session = session_builder(intra_threads)
            .map_err(attribute)?
            .commit_from_file(path)
            .map_err(|e| AppError::artifact(path, e.to_string()))?;
        Self::from_session(session).map_err(attribute)
    }

    /// Build a session from an in-memory model
    pub fn from_memory(bytes: &[u8], intra_threads: usize) -> Result<Self> {
        let session = session_builder(intra_threads)?
            .commit_from_memory(bytes)
            .map_err(runtime_error)?;
        Self::from_session(session)
    }

    fn from_session(session: Session) -> Result<Self> {
        if session.inputs.len() != 1 {
            return Err(AppError::Inference(format!(
                "sequence model must take exactly one input, found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(AppError::Inference("sequence model has no outputs".to_string()));
        }

        let input = &session.inputs[0];
        let input_type = match &input.input_type {
            ValueType::Tensor { ty, .. } => match ty {
                TensorElementType::Int64 | TensorElementType::Int32 | TensorElementType::Float32 => {
                    *ty
                }
                other => {
                    return Err(AppError::Inference(format!(
                        "unsupported input element type {:?} for '{}'",
                        other, input.name
                    )))
                }
            },
            other => {
                return Err(AppError::Inference(format!(
                    "input '{}' must be a tensor, found {:?}",
                    input.name, other
                )))
            }
        };
        let input_name = input.name.clone();

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            input_type,
        })
    }

    /// Shape the sequence as a `[1, len]` tensor of the input's element type.
    ///
    /// Keras exports often declare float inputs for the embedding lookup.
    fn prepare_input(&self, sequence: &[usize]) -> Result<DynValue> {
        let shape = vec![1, sequence.len()];
        let value = match self.input_type {
            TensorElementType::Int64 => {
                let data: Vec<i64> = sequence.iter().map(|&index| index as i64).collect();
                Tensor::from_array((shape, data.into_boxed_slice()))?.into_dyn()
            }
            TensorElementType::Int32 => {
                let data = sequence
                    .iter()
                    .map(|&index| {
                        i32::try_from(index).map_err(|_| {
                            AppError::Inference(format!("token index {} overflows int32", index))
                        })
                    })
                    .collect::<Result<Vec<i32>>>()?;
                Tensor::from_array((shape, data.into_boxed_slice()))?.into_dyn()
            }
            _ => {
                let data: Vec<f32> = sequence.iter().map(|&index| index as f32).collect();
                Tensor::from_array((shape, data.into_boxed_slice()))?.into_dyn()
            }
        };
        Ok(value)
    }
}

fn session_builder(intra_threads: usize) -> Result<SessionBuilder> {
    Session::builder()
        .map_err(runtime_error)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(runtime_error)?
        .with_intra_threads(intra_threads)
        .map_err(runtime_error)
}

fn runtime_error(err: impl fmt::Display) -> AppError {
    AppError::Inference(err.to_string())
}

impl SequenceModel for OnnxSequenceModel {
    fn predict(&self, sequence: &[usize]) -> Result<f64> {
        let input = self.prepare_input(sequence)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Internal("ONNX session lock poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
        let (_, values) = outputs[0].try_extract_tensor::<f32>()?;

        match values {
            [probability] => Ok(f64::from(*probability)),
            _ => Err(AppError::Inference(format!(
                "sequence model must produce one probability, got {} values",
                values.len()
            ))),
        }
    }
}
