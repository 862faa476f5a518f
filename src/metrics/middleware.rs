//! HTTP middleware for tracking request/response metrics
//!
//! Records request count, duration and in-flight requests for every route
//! except the excluded ones (by default the `/metrics` scrape itself).

use super::*;
use axum::{
    extract::{MatchedPath, Request},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Label used for requests that matched no route
const UNMATCHED_PATH: &str = "unmatched";

/// Entry point for building the metrics layer
#[derive(Clone, Default)]
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Create the middleware as a tower layer, skipping `/metrics`
    pub fn layer() -> MetricsLayer {
        Self::layer_excluding(vec!["/metrics".to_string()])
    }

    /// Create the middleware as a tower layer skipping the given paths
    pub fn layer_excluding(excluded_paths: Vec<String>) -> MetricsLayer {
        MetricsLayer {
            excluded_paths: Arc::new(excluded_paths),
        }
    }
}

/// Tower layer for metrics middleware
#[derive(Clone)]
pub struct MetricsLayer {
    excluded_paths: Arc<Vec<String>>,
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            excluded_paths: self.excluded_paths.clone(),
        }
    }
}

/// Holds one slot of the in-flight gauge until dropped
struct InFlightGuard;

impl InFlightGuard {
    fn acquire() -> Self {
        HTTP_REQUESTS_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        HTTP_REQUESTS_IN_FLIGHT.dec();
    }
}

/// Tower service for metrics collection
#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    excluded_paths: Arc<Vec<String>>,
}

impl<S> Service<Request> for MetricsService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().to_string();
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| UNMATCHED_PATH.to_string());

        if self.excluded_paths.iter().any(|excluded| *excluded == path) {
            return Box::pin(self.inner.call(req));
        }

        let guard = InFlightGuard::acquire();
        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            drop(guard);

            if let Ok(response) = &result {
                let duration = start.elapsed().as_secs_f64();
                let status = response.status().as_u16().to_string();

                HTTP_REQUESTS_TOTAL
                    .with_label_values(&[&method, &path, &status])
                    .inc();
                HTTP_REQUEST_DURATION_SECONDS
                    .with_label_values(&[&method, &path])
                    .observe(duration);
            }

            result
        })
    }
}
