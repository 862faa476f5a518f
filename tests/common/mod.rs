//! Common test utilities
//!
//! Fixture artifacts for both scorer variants, router construction and
//! request helpers shared by the integration suites.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use spam_detection_api::{
    api::{build_router, AppState},
    config::{ModelConfig, ModelVariant},
    ml::ResourceLoader,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const MODEL_FILE: &str = "model.json";
pub const ONNX_MODEL_FILE: &str = "model.onnx";

/// Artifact directory plus the model configuration pointing into it
pub struct Fixture {
    pub dir: TempDir,
    pub config: ModelConfig,
}

impl Fixture {
    /// Configuration for `variant` with no artifacts written yet
    pub fn empty(variant: ModelVariant) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let model_file = match variant {
            ModelVariant::Vectorizer => MODEL_FILE,
            ModelVariant::Sequence => ONNX_MODEL_FILE,
        };
        let config = ModelConfig {
            variant,
            tokenizer_path: dir.path().join(TOKENIZER_FILE),
            model_path: dir.path().join(model_file),
            intra_threads: 1,
            ..ModelConfig::default()
        };
        Self { dir, config }
    }

    pub fn vectorizer() -> Self {
        let fixture = Self::empty(ModelVariant::Vectorizer);
        fixture.write_artifacts();
        fixture
    }

    pub fn sequence() -> Self {
        let fixture = Self::empty(ModelVariant::Sequence);
        fixture.write_artifacts();
        fixture
    }

    /// Write the artifacts matching the configured variant
    pub fn write_artifacts(&self) {
        match self.config.variant {
            ModelVariant::Vectorizer => write_vectorizer_artifacts(self.dir.path()),
            ModelVariant::Sequence => write_sequence_artifacts(self.dir.path()),
        }
    }

    /// Router over a fresh loader, plus a handle to inspect the loader
    pub fn router(&self) -> (Router, Arc<ResourceLoader>) {
        let loader = Arc::new(ResourceLoader::new(self.config.clone()));
        let router = build_router(AppState::new(loader.clone()));
        (router, loader)
    }
}

const SPAM_WORDS: [&str; 4] = ["free", "win", "prize", "cash"];
const HAM_WORDS: [&str; 3] = ["meeting", "lunch", "tomorrow"];

/// Count vectorizer + multinomial naive Bayes with a 60/40 ham prior
pub fn write_vectorizer_artifacts(dir: &Path) {
    let vocabulary: HashMap<&str, usize> = SPAM_WORDS
        .iter()
        .chain(HAM_WORDS.iter())
        .enumerate()
        .map(|(index, word)| (*word, index))
        .collect();

    let tokenizer = json!({ "vocabulary": vocabulary });
    let model = json!({
        "kind": "multinomial_nb",
        "classes": ["ham", "spam"],
        "class_log_prior": [0.6f64.ln(), 0.4f64.ln()],
        "feature_log_prob": [
            [-4.0, -4.0, -4.0, -4.0, -1.0, -1.0, -1.0],
            [-1.0, -1.0, -1.0, -1.0, -4.0, -4.0, -4.0]
        ]
    });

    fs::write(dir.join(TOKENIZER_FILE), tokenizer.to_string()).expect("write tokenizer");
    fs::write(dir.join(MODEL_FILE), model.to_string()).expect("write model");
}

/// Word-index tokenizer + embedding/average-pooling/sigmoid ONNX network.
///
/// Spam words embed to +2, ham words to -2 and padding to 0; the pooled mean
/// is scaled by 50 before the sigmoid.
pub fn write_sequence_artifacts(dir: &Path) {
    let tokenizer = json!({ "word_index": sequence_word_index() });
    fs::write(dir.join(TOKENIZER_FILE), tokenizer.to_string()).expect("write tokenizer");
    fs::write(
        dir.join(ONNX_MODEL_FILE),
        mean_embedding_onnx(&sequence_embedding(), 50.0, None),
    )
    .expect("write model");
}

pub fn sequence_word_index() -> HashMap<String, usize> {
    SPAM_WORDS
        .iter()
        .chain(HAM_WORDS.iter())
        .enumerate()
        .map(|(index, word)| (word.to_string(), index + 1))
        .collect()
}

/// One weight per index: padding, then spam words, then ham words
pub fn sequence_embedding() -> Vec<f32> {
    let mut embedding = vec![0.0];
    embedding.extend(SPAM_WORDS.iter().map(|_| 2.0));
    embedding.extend(HAM_WORDS.iter().map(|_| -2.0));
    embedding
}

/// Serialized ONNX graph computing `sigmoid(scale * mean(embedding[input_ids]))`.
///
/// Input `input_ids` is int64 `[1, sequence_len]`, symbolic when
/// `sequence_len` is `None`; output `probability` is float `[1, 1]`.
pub fn mean_embedding_onnx(embedding: &[f32], scale: f32, sequence_len: Option<i64>) -> Vec<u8> {
    const FLOAT: u64 = 1;
    const INT64: u64 = 7;
    const ATTRIBUTE_INT: u64 = 2;
    const ATTRIBUTE_INTS: u64 = 7;

    let fixed_dim = |size: i64| Proto::default().varint(1, size as u64);
    let tensor_type = |element: u64, dims: Vec<Proto>| {
        let shape = dims
            .into_iter()
            .fold(Proto::default(), |shape, dim| shape.message(1, dim));
        Proto::default().message(1, Proto::default().varint(1, element).message(2, shape))
    };
    let value_info = |name: &str, kind: Proto| Proto::default().string(1, name).message(2, kind);
    let node = |name: &str, op: &str, inputs: &[&str], output: &str| {
        inputs
            .iter()
            .fold(Proto::default(), |node, input| node.string(1, input))
            .string(2, output)
            .string(3, name)
            .string(4, op)
    };
    let float_tensor = |name: &str, dims: &[i64], values: &[f32]| {
        dims.iter()
            .fold(Proto::default(), |tensor, &dim| tensor.varint(1, dim as u64))
            .varint(2, FLOAT)
            .packed_floats(4, values)
            .string(8, name)
    };

    let sequence_dim = match sequence_len {
        Some(size) => fixed_dim(size),
        None => Proto::default().string(2, "sequence_length"),
    };

    let reduce_mean = node("pool", "ReduceMean", &["embedded"], "pooled")
        .message(
            5,
            Proto::default()
                .string(1, "axes")
                .varint(8, 1)
                .varint(20, ATTRIBUTE_INTS),
        )
        .message(
            5,
            Proto::default()
                .string(1, "keepdims")
                .varint(3, 0)
                .varint(20, ATTRIBUTE_INT),
        );

    let graph = Proto::default()
        .message(1, node("lookup", "Gather", &["embedding", "input_ids"], "embedded"))
        .message(1, reduce_mean)
        .message(1, node("dense", "Mul", &["pooled", "scale"], "logit"))
        .message(1, node("activation", "Sigmoid", &["logit"], "probability"))
        .string(2, "spam_sequence")
        .message(
            5,
            float_tensor("embedding", &[embedding.len() as i64, 1], embedding),
        )
        .message(5, float_tensor("scale", &[1], &[scale]))
        .message(
            11,
            value_info("input_ids", tensor_type(INT64, vec![fixed_dim(1), sequence_dim])),
        )
        .message(
            12,
            value_info("probability", tensor_type(FLOAT, vec![fixed_dim(1), fixed_dim(1)])),
        );

    Proto::default()
        .varint(1, 7)
        .string(2, "spam-detection-api-tests")
        .message(7, graph)
        .message(8, Proto::default().varint(2, 13))
        .into_bytes()
}

/// Protobuf wire-format writer covering the field kinds ONNX models use
#[derive(Default)]
struct Proto(Vec<u8>);

impl Proto {
    fn varint(mut self, field: u32, value: u64) -> Self {
        self.key(field, 0);
        self.put_varint(value);
        self
    }

    fn bytes(mut self, field: u32, value: &[u8]) -> Self {
        self.key(field, 2);
        self.put_varint(value.len() as u64);
        self.0.extend_from_slice(value);
        self
    }

    fn string(self, field: u32, value: &str) -> Self {
        self.bytes(field, value.as_bytes())
    }

    fn message(self, field: u32, message: Proto) -> Self {
        self.bytes(field, &message.0)
    }

    fn packed_floats(self, field: u32, values: &[f32]) -> Self {
        let raw: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        self.bytes(field, &raw)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    fn key(&mut self, field: u32, wire_type: u64) {
        self.put_varint((u64::from(field) << 3) | wire_type);
    }

    fn put_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.0.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.0.push(value as u8);
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

pub fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .expect("build request")
}

pub fn predict(message: &str) -> Request<Body> {
    post_json("/predict", json!({ "message": message }).to_string())
}

/// Send one request through the router and collect the response body
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, body.to_vec())
}

pub async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    let value = serde_json::from_slice(&body).expect("response is JSON");
    (status, value)
}

/// Helper function to parse Prometheus exposition format
/// Returns a map of metric name to its HELP/TYPE and sample lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines() {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
