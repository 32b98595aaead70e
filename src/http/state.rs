use crate::audio::CaptureEngine;
use crate::pipeline::PipelineSynchronizer;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Capture engine; one active session per process.
    pub engine: Arc<CaptureEngine>,
    /// Pipeline synchronizer over the object store.
    pub synchronizer: Arc<PipelineSynchronizer>,
    /// Bucket used when a request does not name one.
    pub default_bucket: Option<String>,
    /// Default TTL for generated access URLs.
    pub url_ttl: Duration,
    /// Channel count requested from the capture engine.
    pub channels: u16,
}

impl AppState {
    /// Resolve the bucket for a request, preferring the request's own.
    pub fn bucket<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.default_bucket.as_deref())
    }
}
